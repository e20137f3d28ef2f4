//! 天空盒 pass
//!
//! 在 forward 之后补画天空。HDR 目标与此前读方存在 placed
//! resource 别名，写访问声明为别名写，保证排在所有读方之后。

use std::rc::Rc;

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::pipeline::pipeline_state::GfxPipelineState;
use basalt_gfx::pipeline::root_signature::{GfxRootParameter, GfxRootSignature};
use basalt_render_graph::{RgPassBuilder, RgPassHandle};
use basalt_render_interface::handles::GfxResourceHandle;
use basalt_render_interface::pipeline_settings::DefaultRendererSettings;

use crate::error::RendererError;
use crate::pass::RenderPass;
use crate::passes::{DEPTH_TARGET, HDR_TARGET};
use crate::pipelines::PipelineRegistry;
use crate::recorder::PassContext;
use crate::resource_planner::{FrameResourceProvider, ResourcePlanner};

const PIPELINE: &str = "skybox-pso";

pub struct SkyboxPass {
    depth: GfxResourceHandle,
    hdr: GfxResourceHandle,
}

impl SkyboxPass {
    pub fn new(pipelines: &mut PipelineRegistry) -> Result<Self, RendererError> {
        let root_signature = Rc::new(GfxRootSignature::new(
            "skybox-rs",
            vec![GfxRootParameter::constants(16, 0, 0)],
        )?);
        pipelines.register(GfxPipelineState::graphics(
            PIPELINE,
            root_signature,
            vec![DefaultRendererSettings::DEFAULT_HDR_FORMAT],
            Some(DefaultRendererSettings::DEFAULT_DEPTH_FORMAT),
        ));
        Ok(Self { depth: GfxResourceHandle::default(), hdr: GfxResourceHandle::default() })
    }
}

impl RenderPass for SkyboxPass {
    fn name(&self) -> &str {
        "skybox"
    }

    fn setup(&mut self, planner: &mut ResourcePlanner, pass: RgPassBuilder<'_>) -> RgPassHandle {
        self.hdr = planner.find_texture(HDR_TARGET).expect("forward must run before skybox");
        self.depth = planner.find_texture(DEPTH_TARGET).expect("depth-prepass must run before skybox");
        pass.read(self.depth, GfxResourceStates::DEPTH_READ)
            .write_aliased(self.hdr, GfxResourceStates::RENDER_TARGET)
            .finish()
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> Result<(), RendererError> {
        ctx.bind_render_targets(&[self.hdr], Some(self.depth))?;

        let view_rotation = glam::Mat4::IDENTITY.to_cols_array();
        let mut recorder = ctx.bind_pipeline(PIPELINE)?;
        recorder.set_constants(0, 0, bytemuck::cast_slice(&view_rotation))?;
        // 立方体 36 个顶点
        recorder.draw(36, 1);
        Ok(())
    }
}
