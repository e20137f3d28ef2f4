//! 渲染 pass 的抽象
//!
//! 一个 pass 每帧走两个阶段：
//!
//! 1. **setup**: 通过 [`ResourcePlanner`] 申请资源，在传入的
//!    [`RgPassBuilder`] 上声明读写访问；
//! 2. **record**: 图编译后按执行计划回调，在 [`PassContext`] 上
//!    录制命令。声明过的资源由 Renderer 先转到声明的状态。

use basalt_gfx::commands::queue::GfxQueueKind;
use basalt_render_graph::{RgPassBuilder, RgPassHandle};

use crate::error::RendererError;
use crate::recorder::PassContext;
use crate::resource_planner::ResourcePlanner;

pub trait RenderPass {
    fn name(&self) -> &str;

    fn queue(&self) -> GfxQueueKind {
        GfxQueueKind::Direct
    }

    /// 申请资源并声明访问，返回 `pass.finish()`
    fn setup(&mut self, planner: &mut ResourcePlanner, pass: RgPassBuilder<'_>) -> RgPassHandle;

    /// 录制本 pass 的命令
    fn record(&mut self, ctx: &mut PassContext<'_>) -> Result<(), RendererError>;
}
