//! 前向着色 pass
//!
//! 读 depth 预写的结果做等值测试，颜色写进 HDR 目标。

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
use crate::passes::{DEPTH_TARGET, HDR_TARGET};
use crate::pipelines::PipelineRegistry;
use crate::recorder::PassContext;
use crate::resource_planner::{FrameResourceProvider, ResourcePlanner};

const PIPELINE: &str = "forward-pso";

/// 每帧常量，上传缓冲里的布局
#[repr(C)]
#[derive(Clone, Copy, bytemuck::NoUninit)]
struct ForwardFrameData {
    view_proj: [f32; 16],
    camera_pos: [f32; 4],
}

pub struct ForwardPass {
    depth: GfxResourceHandle,
    hdr: GfxResourceHandle,
    vertex_buffer: Option<GfxResourceHandle>,
    vertex_count: u32,
}

impl ForwardPass {
    pub fn new(pipelines: &mut PipelineRegistry, vertex_count: u32) -> Result<Self, RendererError> {
        let root_signature = Rc::new(GfxRootSignature::new(
            "forward-rs",
            vec![
                // b0: 每帧常量（根描述符，直接指上传缓冲）
                GfxRootParameter::cbv(0, 0),
            ],
        )?);
        pipelines.register(GfxPipelineState::graphics(
            PIPELINE,
            root_signature,
            vec![DefaultRendererSettings::DEFAULT_HDR_FORMAT],
            Some(DefaultRendererSettings::DEFAULT_DEPTH_FORMAT),
        ));
        Ok(Self {
            depth: GfxResourceHandle::default(),
            hdr: GfxResourceHandle::default(),
            vertex_buffer: None,
            vertex_count,
        })
    }

    /// 绑定一块已上传的顶点缓冲；不设置时直接按顶点序号画
    pub fn with_vertex_buffer(mut self, buffer: GfxResourceHandle) -> Self {
        self.vertex_buffer = Some(buffer);
        self
    }
}

impl RenderPass for ForwardPass {
    fn name(&self) -> &str {
        "forward"
    }

    fn setup(&mut self, planner: &mut ResourcePlanner, pass: RgPassBuilder<'_>) -> RgPassHandle {
        self.hdr = planner.texture_2d(
            HDR_TARGET,
            planner.frame_extent(),
            DefaultRendererSettings::DEFAULT_HDR_FORMAT,
            GfxTextureFlags::RENDER_TARGET,
            Some(GfxClearValue::Color(glam::Vec4::ZERO)),
        );
        self.depth = planner.find_texture(DEPTH_TARGET).expect("depth-prepass must run before forward");
        let mut pass = pass
            .read(self.depth, GfxResourceStates::DEPTH_READ)
            .write(self.hdr, GfxResourceStates::RENDER_TARGET);
        if let Some(vb) = self.vertex_buffer {
            pass = pass.read(vb, GfxResourceStates::VERTEX_AND_CONSTANT_BUFFER);
        }
        pass.finish()
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> Result<(), RendererError> {
        ctx.bind_render_targets(&[self.hdr], Some(self.depth))?;
        ctx.clear_render_target(self.hdr, glam::Vec4::ZERO)?;

        let frame_data = ForwardFrameData {
            view_proj: glam::Mat4::IDENTITY.to_cols_array(),
            camera_pos: [0.0; 4],
        };
        let constants = ctx.upload_constants(&frame_data)?;

        let mut recorder = ctx.bind_pipeline(PIPELINE)?;
        recorder.bind_cbv(0, 0, constants.resource)?;
        if let Some(vb) = self.vertex_buffer {
            recorder.set_vertex_buffer(0, vb);
        }
        recorder.draw(self.vertex_count, 1);
        Ok(())
    }
}
