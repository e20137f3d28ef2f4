//! 内置 pass
//!
//! 一条最小的前向管线：depth 预写、forward 着色、skybox 补天、
//! tonemap 输出到后备缓冲。名字约定：深度目标叫 `depth`，HDR
//! 颜色目标叫 `hdr`。

pub mod depth;
pub mod forward;
pub mod skybox;
pub mod tonemap;

pub use depth::DepthPass;
pub use forward::ForwardPass;
pub use skybox::SkyboxPass;
pub use tonemap::ToneMapPass;

/// 深度目标的约定名
pub const DEPTH_TARGET: &str = "depth";
/// HDR 颜色目标的约定名
pub const HDR_TARGET: &str = "hdr";
