//! 管线状态对象
//!
//! 虚拟设备不编译 shader，PSO 只保留绑定布局相关的信息：根签名、
//! 渲染目标格式。真正起作用的是根签名，PassCommandRecorder 靠它
//! 做按名字绑定。

use std::rc::Rc;

use basalt_render_interface::pipeline_settings::GfxFormat;

use crate::pipeline::root_signature::GfxRootSignature;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GfxPipelineKind {
    Graphics,
    Compute,
}

pub struct GfxPipelineState {
    name: String,
    kind: GfxPipelineKind,
    root_signature: Rc<GfxRootSignature>,
    /// 图形管线的 RTV 格式，按绑定槽排列
    rtv_formats: Vec<GfxFormat>,
    dsv_format: Option<GfxFormat>,
}

impl GfxPipelineState {
    pub fn graphics(
        name: impl Into<String>,
        root_signature: Rc<GfxRootSignature>,
        rtv_formats: Vec<GfxFormat>,
        dsv_format: Option<GfxFormat>,
    ) -> Self {
        Self { name: name.into(), kind: GfxPipelineKind::Graphics, root_signature, rtv_formats, dsv_format }
    }

    pub fn compute(name: impl Into<String>, root_signature: Rc<GfxRootSignature>) -> Self {
        Self {
            name: name.into(),
            kind: GfxPipelineKind::Compute,
            root_signature,
            rtv_formats: Vec::new(),
            dsv_format: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[inline]
    pub fn kind(&self) -> &GfxPipelineKind {
        &self.kind
    }
    #[inline]
    pub fn is_graphics(&self) -> bool {
        self.kind == GfxPipelineKind::Graphics
    }
    #[inline]
    pub fn root_signature(&self) -> &Rc<GfxRootSignature> {
        &self.root_signature
    }
    #[inline]
    pub fn rtv_formats(&self) -> &[GfxFormat] {
        &self.rtv_formats
    }
    #[inline]
    pub fn dsv_format(&self) -> Option<GfxFormat> {
        self.dsv_format
    }
}
