//! 深度预写 pass

use std::rc::Rc;

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::pipeline::pipeline_state::GfxPipelineState;
use basalt_gfx::pipeline::root_signature::{GfxRootParameter, GfxRootSignature};
use basalt_gfx::resources::resource::{GfxClearValue, GfxTextureFlags};
use basalt_render_graph::{RgPassBuilder, RgPassHandle};
use basalt_render_interface::handles::GfxResourceHandle;
use basalt_render_interface::pipeline_settings::DefaultRendererSettings;

use crate::error::RendererError;
use crate::pass::RenderPass;
use crate::passes::DEPTH_TARGET;
use crate::pipelines::PipelineRegistry;
use crate::recorder::PassContext;
use crate::resource_planner::{FrameResourceProvider, ResourcePlanner};

const PIPELINE: &str = "depth-prepass-pso";

pub struct DepthPass {
    depth: GfxResourceHandle,
    /// 每帧要画的顶点数，由场景侧喂进来
    vertex_count: u32,
}

impl DepthPass {
    pub fn new(pipelines: &mut PipelineRegistry, vertex_count: u32) -> Result<Self, RendererError> {
        let root_signature = Rc::new(GfxRootSignature::new(
            "depth-prepass-rs",
            vec![GfxRootParameter::constants(16, 0, 0)],
        )?);
        pipelines.register(GfxPipelineState::graphics(
            PIPELINE,
            root_signature,
            vec![],
            Some(DefaultRendererSettings::DEFAULT_DEPTH_FORMAT),
        ));
        Ok(Self { depth: GfxResourceHandle::default(), vertex_count })
    }
}

impl RenderPass for DepthPass {
    fn name(&self) -> &str {
        "depth-prepass"
    }

    fn setup(&mut self, planner: &mut ResourcePlanner, pass: RgPassBuilder<'_>) -> RgPassHandle {
        self.depth = planner.texture_2d(
            DEPTH_TARGET,
            planner.frame_extent(),
            DefaultRendererSettings::DEFAULT_DEPTH_FORMAT,
            GfxTextureFlags::DEPTH_STENCIL,
            Some(GfxClearValue::DepthStencil { depth: 1.0, stencil: 0 }),
        );
        pass.write(self.depth, GfxResourceStates::DEPTH_WRITE).finish()
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> Result<(), RendererError> {
        ctx.bind_render_targets(&[], Some(self.depth))?;
        ctx.clear_depth_stencil(self.depth, 1.0, 0)?;

        let view_proj = glam::Mat4::IDENTITY.to_cols_array();
        let mut recorder = ctx.bind_pipeline(PIPELINE)?;
        recorder.set_constants(0, 0, bytemuck::cast_slice(&view_proj))?;
        recorder.draw(self.vertex_count, 1);
        Ok(())
    }
}
