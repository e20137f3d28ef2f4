//! 无头帧循环集成测试
//!
//! 跑一条完整管线（depth / forward / skybox / 异步 compute 求
//! 亮度 / tonemap），验证：
//!
//! - 执行状态校验器没有记录任何 barrier hazard
//! - 跨队列同步让 compute 的 dispatch 落在生产者 draw 之后
//! - 拷贝队列上传先于图形队列的首个 draw
//! - 帧尾 fence 单调推进
//! - resize 之后继续出帧仍然干净

use std::rc::Rc;

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::commands::queue::GfxQueueKind;
use basalt_gfx::foundation::device::GfxTraceKind;
use basalt_gfx::pipeline::pipeline_state::GfxPipelineState;
use basalt_gfx::resources::resource::GfxResourceDesc;
use basalt_gfx::pipeline::root_signature::{GfxRegisterKind, GfxRootParameter, GfxRootSignature};
use basalt_render_graph::{RgPassBuilder, RgPassHandle};
use basalt_render_interface::handles::GfxResourceHandle;
use basalt_render_interface::pipeline_settings::Extent2D;
use basalt_renderer::error::RendererError;
use basalt_renderer::pass::RenderPass;
use basalt_renderer::passes::{DepthPass, ForwardPass, SkyboxPass, ToneMapPass, HDR_TARGET};
use basalt_renderer::pipelines::PipelineRegistry;
use basalt_renderer::recorder::PassContext;
use basalt_renderer::render_context::RenderContext;
use basalt_renderer::renderer::Renderer;
use basalt_renderer::resource_planner::{FrameResourceProvider, ResourcePlanner};

const LUMINANCE_PIPELINE: &str = "luminance-pso";
const LUMINANCE_REDUCE_PIPELINE: &str = "luminance-reduce-pso";
const LUMINANCE_RESULT: &str = "luminance-result";

/// 异步 compute：对 HDR 目标做平均亮度归约。分两级 dispatch，
/// per-tile 直方图和最终归约写同一块 UAV，中间隔 UAV 屏障
struct LuminancePass {
    hdr: GfxResourceHandle,
    result: GfxResourceHandle,
}

impl LuminancePass {
    fn new(pipelines: &mut PipelineRegistry) -> Result<Self, RendererError> {
        let root_signature = Rc::new(GfxRootSignature::new(
            "luminance-rs",
            vec![
                GfxRootParameter::constants(2, 0, 0),
                GfxRootParameter::descriptor_table(GfxRegisterKind::Srv, 1, 0, 0),
                GfxRootParameter::uav(0, 0),
            ],
        )?);
        pipelines.register(GfxPipelineState::compute(LUMINANCE_PIPELINE, root_signature.clone()));
        pipelines.register(GfxPipelineState::compute(LUMINANCE_REDUCE_PIPELINE, root_signature));
        Ok(Self { hdr: GfxResourceHandle::default(), result: GfxResourceHandle::default() })
    }
}

impl RenderPass for LuminancePass {
    fn name(&self) -> &str {
        "luminance"
    }

    fn queue(&self) -> GfxQueueKind {
        GfxQueueKind::Compute
    }

    fn setup(&mut self, planner: &mut ResourcePlanner, pass: RgPassBuilder<'_>) -> RgPassHandle {
        self.hdr = planner.find_texture(HDR_TARGET).expect("forward must run before luminance");
        self.result = planner.buffer(LUMINANCE_RESULT, 256);
        pass.read(self.hdr, GfxResourceStates::NON_PIXEL_SHADER_RESOURCE)
            .write(self.result, GfxResourceStates::UNORDERED_ACCESS)
            .finish()
    }

    fn record(&mut self, ctx: &mut PassContext<'_>) -> Result<(), RendererError> {
        let extent = ctx.frame_extent;
        {
            let mut recorder = ctx.bind_pipeline(LUMINANCE_PIPELINE)?;
            recorder.set_constants(0, 0, &[extent.width, extent.height])?;
            recorder.bind_srv(0, 0, self.hdr)?;
            recorder.bind_uav(0, 0, self.result)?;
            recorder.dispatch(extent.width.div_ceil(8), extent.height.div_ceil(8), 1);
        }

        // 归约要读到 per-tile 的 UAV 写
        ctx.uav_barrier(Some(self.result));

        let mut recorder = ctx.bind_pipeline(LUMINANCE_REDUCE_PIPELINE)?;
        recorder.set_constants(0, 0, &[extent.width, extent.height])?;
        recorder.bind_srv(0, 0, self.hdr)?;
        recorder.bind_uav(0, 0, self.result)?;
        recorder.dispatch(1, 1, 1);
        Ok(())
    }
}

fn build_renderer(ctx: &RenderContext) -> Renderer {
    let mut renderer = Renderer::new(ctx);
    let depth = DepthPass::new(&mut renderer.pipelines, 3 * 12).unwrap();
    let forward = ForwardPass::new(&mut renderer.pipelines, 3 * 12).unwrap();
    let skybox = SkyboxPass::new(&mut renderer.pipelines).unwrap();
    let luminance = LuminancePass::new(&mut renderer.pipelines).unwrap();
    // 自动曝光让 tonemap 依赖 compute 的亮度结果，跨队列同步点
    // 由帧图剪除后插入
    let tonemap = ToneMapPass::new(&mut renderer.pipelines)
        .unwrap()
        .with_exposure_input(LUMINANCE_RESULT);
    renderer.add_pass(Box::new(depth));
    renderer.add_pass(Box::new(forward));
    renderer.add_pass(Box::new(skybox));
    renderer.add_pass(Box::new(luminance));
    renderer.add_pass(Box::new(tonemap));
    renderer
}

fn render_frames(ctx: &mut RenderContext, renderer: &mut Renderer, count: usize) {
    for _ in 0..count {
        ctx.begin_frame();
        renderer.render_frame(ctx).unwrap();
        ctx.end_frame();
    }
}

#[test]
fn test_three_frames_no_hazards() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut ctx = RenderContext::new(Extent2D::new(800, 600));
    let mut renderer = build_renderer(&ctx);
    render_frames(&mut ctx, &mut renderer, 3);
    ctx.flush_all();

    let hazards = ctx.device.take_hazards();
    assert!(hazards.is_empty(), "barrier hazards: {:?}", hazards);

    let trace = ctx.device.trace_snapshot();
    let draws = trace.iter().filter(|e| matches!(e.kind, GfxTraceKind::Draw)).count();
    let dispatches = trace.iter().filter(|e| matches!(e.kind, GfxTraceKind::Dispatch)).count();
    assert_eq!(draws, 4 * 3);
    assert_eq!(dispatches, 2 * 3);

    // 两级归约之间隔着 UAV 屏障
    let uav_barriers = trace.iter().filter(|e| matches!(e.kind, GfxTraceKind::UavBarrier)).count();
    assert_eq!(uav_barriers, 3);
    let dispatch_positions: Vec<usize> = trace
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e.kind, GfxTraceKind::Dispatch))
        .map(|(i, _)| i)
        .collect();
    let first_barrier = trace.iter().position(|e| matches!(e.kind, GfxTraceKind::UavBarrier)).unwrap();
    assert!(dispatch_positions[0] < first_barrier && first_barrier < dispatch_positions[1]);

    // compute 在 direct 的生产者之后：第一个 dispatch 前至少有
    // depth / forward / skybox 三次 draw
    let first_dispatch = trace.iter().position(|e| matches!(e.kind, GfxTraceKind::Dispatch)).unwrap();
    let draws_before = trace[..first_dispatch]
        .iter()
        .filter(|e| matches!(e.kind, GfxTraceKind::Draw))
        .count();
    assert!(draws_before >= 3, "dispatch ran before its producers ({} draws)", draws_before);
}

#[test]
fn test_upload_lands_before_first_draw() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut ctx = RenderContext::new(Extent2D::new(256, 256));
    let mut renderer = Renderer::new(&ctx);

    // 场景顶点缓冲：默认堆资源，内容走拷贝队列上传
    let vertices = ctx.device.create_resource(GfxResourceDesc::buffer("scene-vertices", 36 * 32));
    ctx.global_state.borrow_mut().track_resource(vertices, GfxResourceStates::COMMON);

    let depth = DepthPass::new(&mut renderer.pipelines, 36).unwrap();
    let forward = ForwardPass::new(&mut renderer.pipelines, 36)
        .unwrap()
        .with_vertex_buffer(vertices);
    let skybox = SkyboxPass::new(&mut renderer.pipelines).unwrap();
    let tonemap = ToneMapPass::new(&mut renderer.pipelines).unwrap();
    renderer.add_pass(Box::new(depth));
    renderer.add_pass(Box::new(forward));
    renderer.add_pass(Box::new(skybox));
    renderer.add_pass(Box::new(tonemap));

    renderer.stage_upload(&ctx, vertices, &[0u8; 36 * 32]);
    renderer.upload_resources(&ctx).unwrap();

    render_frames(&mut ctx, &mut renderer, 2);
    ctx.flush_all();

    let hazards = ctx.device.take_hazards();
    assert!(hazards.is_empty(), "barrier hazards: {:?}", hazards);

    // 图形队列等拷贝 fence：copy 事件必须先于第一个 draw
    let trace = ctx.device.trace_snapshot();
    let first_copy = trace.iter().position(|e| matches!(e.kind, GfxTraceKind::Copy)).unwrap();
    let first_draw = trace.iter().position(|e| matches!(e.kind, GfxTraceKind::Draw)).unwrap();
    assert!(first_copy < first_draw, "copy at {} but first draw at {}", first_copy, first_draw);

    // 没有新数据时不提交任何东西，staging 随已完成的 fence 回收
    let events_before = ctx.device.trace_snapshot().len();
    renderer.upload_resources(&ctx).unwrap();
    ctx.flush_all();
    assert_eq!(ctx.device.trace_snapshot().len(), events_before);
}

#[test]
fn test_frame_fences_advance() {
    let mut ctx = RenderContext::new(Extent2D::new(64, 64));
    let mut renderer = build_renderer(&ctx);
    render_frames(&mut ctx, &mut renderer, 4);
    ctx.flush_all();

    // 四帧之后每个槽位都 signal 过；槽位 0 被第 4 帧复用，值最大
    let values: Vec<u64> = ctx.rings.iter().map(|r| r.fence_value).collect();
    assert!(values.iter().all(|&v| v > 0));
    assert!(values[0] > values[1] && values[0] > values[2]);
    assert!(ctx.queue(GfxQueueKind::Direct).is_fence_complete(values[0]));
}

#[test]
fn test_resize_mid_loop() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut ctx = RenderContext::new(Extent2D::new(800, 600));
    let mut renderer = build_renderer(&ctx);
    render_frames(&mut ctx, &mut renderer, 2);

    ctx.resize(Extent2D::new(1280, 720));
    render_frames(&mut ctx, &mut renderer, 2);
    ctx.flush_all();

    let hazards = ctx.device.take_hazards();
    assert!(hazards.is_empty(), "barrier hazards after resize: {:?}", hazards);

    // 瞬态目标跟着新尺寸重建了
    let hdr = renderer.planner().find_texture(HDR_TARGET).unwrap();
    let desc = ctx.device.resource_desc(hdr).unwrap();
    assert_eq!(
        desc.kind,
        basalt_gfx::resources::resource::GfxResourceKind::Texture {
            extent: Extent2D::new(1280, 720),
            format: desc.format().unwrap(),
            flags: basalt_gfx::resources::resource::GfxTextureFlags::RENDER_TARGET,
            clear_value: Some(basalt_gfx::resources::resource::GfxClearValue::Color(glam::Vec4::ZERO)),
        }
    );
}
