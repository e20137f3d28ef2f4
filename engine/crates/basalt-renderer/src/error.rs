use basalt_gfx::error::GfxError;
use basalt_render_graph::RgGraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error(transparent)]
    Graph(#[from] RgGraphError),

    #[error(transparent)]
    Gfx(#[from] GfxError),

    /// 录制时引用了没注册过的管线
    #[error("pipeline `{name}` is not registered")]
    UnknownPipeline { name: String },
}
