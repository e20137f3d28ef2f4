//! 色调映射 pass
//!
//! HDR 目标过曲线后写进后备缓冲，帧内最后一个颜色 pass。
//! HDR 作为 SRV 走描述符表，顺带压一遍动态描述符堆的路径。
//!
//! 可选接一个平均亮度 buffer 做自动曝光；声明成读访问之后，
//! 帧图会自动把本 pass 排在亮度归约之后（跨队列时附带同步点）。

use std::rc::Rc;

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::pipeline::pipeline_state::GfxPipelineState;
use basalt_gfx::pipeline::root_signature::{GfxRegisterKind, GfxRootParameter, GfxRootSignature};
use basalt_render_graph::{RgPassBuilder, RgPassHandle};
use basalt_render_interface::handles::GfxResourceHandle;
use basalt_render_interface::pipeline_settings::DefaultRendererSettings;

use crate::error::RendererError;
use crate::pass::RenderPass;
use crate::passes::HDR_TARGET;
use crate::pipelines::PipelineRegistry;
use crate::recorder::PassContext;
use crate::resource_planner::{FrameResourceProvider, ResourcePlanner};

const PIPELINE: &str = "tonemap-pso";

pub struct ToneMapPass {
    hdr: GfxResourceHandle,
    back_buffer: GfxResourceHandle,
    /// 自动曝光输入的 buffer 名，不设则用固定曝光
    exposure_input: Option<String>,
    luminance: Option<GfxResourceHandle>,
    pub exposure: f32,
}

impl ToneMapPass {
    pub fn new(pipelines: &mut PipelineRegistry) -> Result<Self, RendererError> {
        let root_signature = Rc::new(GfxRootSignature::new(
            "tonemap-rs",
            vec![
                // b0: exposure
                GfxRootParameter::constants(1, 0, 0),
                // t0: HDR 输入，走描述符表
                GfxRootParameter::descriptor_table(GfxRegisterKind::Srv, 1, 0, 0),
                // t1: 平均亮度 buffer（根描述符，可以不绑）
                GfxRootParameter::srv(1, 0),
            ],
        )?);
        pipelines.register(GfxPipelineState::graphics(
            PIPELINE,
            root_signature,
            vec![DefaultRendererSettings::DEFAULT_COLOR_FORMAT],
            None,
        ));
        Ok(Self {
            hdr: GfxResourceHandle::default(),
            back_buffer: GfxResourceHandle::default(),
            exposure_input: None,
            luminance: None,
            exposure: 1.0,
        })
    }

    /// 启用自动曝光，读某个 pass 产出的平均亮度 buffer
    pub fn with_exposure_input(mut self, name: impl Into<String>) -> Self {
        self.exposure_input = Some(name.into());
        self
    }
}

impl RenderPass for ToneMapPass {
    fn name(&self) -> &str {
        "tonemap"
    }

    fn setup(&mut self, planner: &mut ResourcePlanner, pass: RgPassBuilder<'_>) -> RgPassHandle {
        self.hdr = planner.find_texture(HDR_TARGET).expect("forward must run before tonemap");
        self.back_buffer = planner.back_buffer();
        self.luminance = self.exposure_input.as_deref().and_then(|name| planner.find_buffer(name));

        let mut pass = pass.read(self.hdr, GfxResourceStates::PIXEL_SHADER_RESOURCE);
        if let Some(luminance) = self.luminance {
            pass = pass.read(luminance, GfxResourceStates::PIXEL_SHADER_RESOURCE);
        }
        pass.write(self.back_buffer, GfxResourceStates::RENDER_TARGET).finish()
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> Result<(), RendererError> {
        ctx.bind_render_targets(&[self.back_buffer], None)?;

        let mut recorder = ctx.bind_pipeline(PIPELINE)?;
        recorder.set_constants(0, 0, &[self.exposure.to_bits()])?;
        recorder.bind_srv(0, 0, self.hdr)?;
        if let Some(luminance) = self.luminance {
            recorder.bind_srv(1, 0, luminance)?;
        }
        // 全屏三角形
        recorder.draw(3, 1);
        Ok(())
    }
}
