//! 帧级渲染配置与基础图形类型
//!
//! `GfxFormat` / `Extent2D` 放在 interface 层，这样 gfx 之下的各层
//! 都可以引用，而不需要依赖设备层。

use std::fmt::Display;

/// 纹理 / 渲染目标格式
///
/// 只列出渲染核心会用到的格式；资产格式不在范围内。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GfxFormat {
    #[default]
    Unknown,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Rg16Float,
    R32Float,
    D32Float,
    D24UnormS8Uint,
}

impl GfxFormat {
    /// 是否为深度（或深度模板）格式
    #[inline]
    pub fn is_depth(self) -> bool {
        matches!(self, Self::D32Float | Self::D24UnormS8Uint)
    }

    /// 是否带有模板面
    #[inline]
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::D24UnormS8Uint)
    }
}

/// 二维尺寸（宽 x 高，像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// 渲染器默认配置
pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const DEFAULT_COLOR_FORMAT: GfxFormat = GfxFormat::Rgba8UnormSrgb;
    pub const DEFAULT_HDR_FORMAT: GfxFormat = GfxFormat::Rgba16Float;
    pub const DEFAULT_DEPTH_FORMAT: GfxFormat = GfxFormat::D32Float;
}

/// 帧级渲染配置
#[derive(Copy, Clone, Default)]
pub struct FrameSettings {
    pub color_format: GfxFormat,
    pub depth_format: GfxFormat,
    pub frame_extent: Extent2D,
}

/// 帧标签（A/B/C）
///
/// 表示当前处于 Frames in Flight 的哪一帧。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    A,
    B,
    C,
}

impl FrameLabel {
    #[inline]
    pub fn from_usize(index: usize) -> Self {
        match index {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => panic!("invalid frame label index: {}", index),
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl Display for FrameLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}
