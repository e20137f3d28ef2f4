//! GPU 资源描述
//!
//! 资源本体存放在 `GfxDevice` 的资源池中，外部只持有
//! `GfxResourceHandle`。视图（SRV/RTV/...）由设备按需创建并缓存在
//! 资源上，资源销毁时一并失效。

use glam::Vec4;

use crate::basic::resource_state::GfxResourceStates;
use basalt_render_interface::pipeline_settings::{Extent2D, GfxFormat};

bitflags::bitflags! {
    /// 纹理的用途标记，决定它允许创建哪些视图
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct GfxTextureFlags: u32 {
        const RENDER_TARGET    = 1 << 0;
        const DEPTH_STENCIL    = 1 << 1;
        const UNORDERED_ACCESS = 1 << 2;
    }
}

/// 清屏值，创建渲染目标 / 深度纹理时指定
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GfxClearValue {
    Color(Vec4),
    DepthStencil { depth: f32, stencil: u8 },
}

/// 资源的种类与尺寸
#[derive(Clone, Debug, PartialEq)]
pub enum GfxResourceKind {
    Buffer {
        size: u64,
    },
    Texture {
        extent: Extent2D,
        format: GfxFormat,
        flags: GfxTextureFlags,
        clear_value: Option<GfxClearValue>,
    },
}

/// 资源创建描述
#[derive(Clone, Debug)]
pub struct GfxResourceDesc {
    pub name: String,
    pub kind: GfxResourceKind,
    /// 创建后资源所处的初始状态
    pub initial_state: GfxResourceStates,
}

// 构造辅助
impl GfxResourceDesc {
    /// 普通 GPU buffer，初始为 COMMON
    pub fn buffer(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: GfxResourceKind::Buffer { size },
            initial_state: GfxResourceStates::COMMON,
        }
    }

    /// 上传堆 buffer，固定处于 GENERIC_READ
    pub fn upload_buffer(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: GfxResourceKind::Buffer { size },
            initial_state: GfxResourceStates::GENERIC_READ,
        }
    }

    /// 2D 纹理
    pub fn texture_2d(
        name: impl Into<String>,
        extent: Extent2D,
        format: GfxFormat,
        flags: GfxTextureFlags,
        clear_value: Option<GfxClearValue>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: GfxResourceKind::Texture { extent, format, flags, clear_value },
            initial_state: GfxResourceStates::COMMON,
        }
    }
}

// getters
impl GfxResourceDesc {
    #[inline]
    pub fn is_texture(&self) -> bool {
        matches!(self.kind, GfxResourceKind::Texture { .. })
    }

    /// 纹理格式；buffer 返回 None
    #[inline]
    pub fn format(&self) -> Option<GfxFormat> {
        match &self.kind {
            GfxResourceKind::Texture { format, .. } => Some(*format),
            GfxResourceKind::Buffer { .. } => None,
        }
    }
}
