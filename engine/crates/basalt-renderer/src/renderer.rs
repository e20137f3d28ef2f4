//! 渲染器
//!
//! 每帧的编排者：
//!
//! 1. 收集各 pass 的 setup 声明，搭出帧图并编译；
//! 2. 按全局执行顺序逐 pass 录制。声明过的资源先通过状态追踪器
//!    转到声明的状态；
//! 3. 提交前给队列插入剪除后的跨队列等待；补全 barrier 的前置
//!    命令列表只在非空时提交；每个 pass 提交后 signal 一次，
//!    fence 值记下来给后续 pass 的等待用。
//!
//! 帧循环之外，stage 过的资源数据由 [`Renderer::upload_resources`]
//! 经拷贝队列统一送上去，图形队列等拷贝 fence。

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::commands::command_list::GfxCommandList;
use basalt_gfx::commands::queue::GfxQueueKind;
use basalt_gfx::resources::resource::GfxResourceDesc;
use basalt_gfx::state_tracker::GfxResourceStateTracker;
use basalt_render_graph::RgGraphBuilder;
use basalt_render_interface::handles::GfxResourceHandle;

use crate::error::RendererError;
use crate::pass::RenderPass;
use crate::pipelines::PipelineRegistry;
use crate::recorder::PassContext;
use crate::render_context::RenderContext;
use crate::resource_planner::ResourcePlanner;

/// 一份等待拷贝的资源数据：staging 缓冲建在上传堆上，
/// 拷贝提交后随 fence 延迟销毁
struct StagedUpload {
    src: GfxResourceHandle,
    dst: GfxResourceHandle,
    size: u64,
}

pub struct Renderer {
    passes: Vec<Box<dyn RenderPass>>,
    pub pipelines: PipelineRegistry,
    planner: ResourcePlanner,
    pending_uploads: Vec<StagedUpload>,
    staging_in_flight: Vec<(u64, GfxResourceHandle)>,
    staging_serial: u64,
}

// new & init
impl Renderer {
    pub fn new(ctx: &RenderContext) -> Self {
        Self {
            passes: Vec::new(),
            pipelines: PipelineRegistry::new(),
            planner: ResourcePlanner::new(ctx.device.clone(), ctx.global_state.clone()),
            pending_uploads: Vec::new(),
            staging_in_flight: Vec::new(),
            staging_serial: 0,
        }
    }

    /// pass 按加入顺序声明，声明顺序决定依赖推导
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) {
        self.passes.push(pass);
    }

    #[inline]
    pub fn planner(&self) -> &ResourcePlanner {
        &self.planner
    }
}

// 资源上传
impl Renderer {
    /// 登记一份要拷到 `dst` 的数据，staging 缓冲立即创建，
    /// 拷贝命令等 [`Self::upload_resources`] 统一提交
    pub fn stage_upload(&mut self, ctx: &RenderContext, dst: GfxResourceHandle, data: &[u8]) {
        let size = data.len() as u64;
        self.staging_serial += 1;
        let src = ctx
            .device
            .create_resource(GfxResourceDesc::upload_buffer(format!("staging-{}", self.staging_serial), size));
        self.pending_uploads.push(StagedUpload { src, dst, size });
    }

    /// 把登记过的数据通过拷贝队列送上去。目标资源先转到 COPY_DEST；
    /// 没有待上传数据就什么都不提交。图形队列会插一个对拷贝 fence
    /// 的等待，保证后续绘制看得到数据。
    pub fn upload_resources(&mut self, ctx: &RenderContext) -> Result<(), RendererError> {
        let copy_queue = ctx.queue(GfxQueueKind::Copy);

        // 回收拷贝已完成的 staging 缓冲
        let device = &ctx.device;
        self.staging_in_flight.retain(|&(fence_value, staging)| {
            if copy_queue.is_fence_complete(fence_value) {
                device.destroy_resource(staging);
                false
            } else {
                true
            }
        });

        if self.pending_uploads.is_empty() {
            return Ok(());
        }

        let mut cmd = GfxCommandList::new(GfxQueueKind::Copy, "upload");
        cmd.begin_label("upload");
        let mut tracker = GfxResourceStateTracker::new();
        for upload in &self.pending_uploads {
            tracker.transition_resource(upload.dst, GfxResourceStates::COPY_DEST);
            cmd.copy_buffer_region(upload.src, 0, upload.dst, 0, upload.size);
        }
        cmd.end_label();
        tracker.flush_barriers(&mut cmd);

        let mut pre = GfxCommandList::new(GfxQueueKind::Copy, "upload-pre");
        let barrier_count = {
            let global = ctx.global_state.borrow();
            tracker.flush_pending_barriers(&mut pre, &global)
        };
        tracker.commit_final_resource_states(&mut ctx.global_state.borrow_mut());

        if barrier_count > 0 {
            copy_queue.execute_command_lists(vec![pre, cmd]);
        } else {
            copy_queue.execute_command_lists(vec![cmd]);
        }
        let fence_value = copy_queue.signal();

        let copy_fence = copy_queue.fence();
        ctx.queue(GfxQueueKind::Direct).queue_wait(&copy_fence, fence_value);

        log::debug!("uploaded {} resource(s), copy fence = {}", self.pending_uploads.len(), fence_value);
        for upload in self.pending_uploads.drain(..) {
            self.staging_in_flight.push((fence_value, upload.src));
        }
        Ok(())
    }
}

// 帧渲染
impl Renderer {
    pub fn render_frame(&mut self, ctx: &mut RenderContext) -> Result<(), RendererError> {
        let Self { passes, pipelines, planner, .. } = self;

        planner.begin_frame(ctx.swapchain.current_back_buffer(), ctx.frame_extent());

        // setup: 声明阶段
        let mut builder = RgGraphBuilder::new();
        for pass in passes.iter_mut() {
            let name = pass.name().to_string();
            let queue = pass.queue();
            let declared = pass.setup(planner, builder.add_pass(name, queue));
            // add_pass 的顺序就是 passes 的顺序
            debug_assert_eq!(declared.index(), builder.pass_count() - 1);
        }

        let graph = builder.compile()?;
        graph.log_execution_plan();

        // record + submit: 按执行计划推进
        let ring_index = ctx.ring_index();
        let frame_label = ctx.frame_counter.frame_label();
        let mut fence_values = vec![0u64; graph.len()];
        for &handle in graph.execution_order() {
            let node = graph.node(handle);

            // 跨队列同步点
            for &sync in &node.syncs {
                let target = ctx.queue(graph.node(sync).queue);
                let fence = target.fence();
                ctx.queue(node.queue).queue_wait(&fence, fence_values[sync.index()]);
            }

            let mut cmd = GfxCommandList::new(node.queue, node.name.clone());
            cmd.begin_label(&node.name);

            let mut tracker = GfxResourceStateTracker::new();
            for access in &node.accesses {
                tracker.transition_resource(access.resource, access.state);
            }

            {
                let ring = &mut ctx.rings[ring_index];
                let mut pass_ctx = PassContext {
                    device: &ctx.device,
                    cmd: &mut cmd,
                    tracker: &mut tracker,
                    allocators: &mut ctx.allocators,
                    dynamic_heap: &mut ring.dynamic_heap,
                    sampler_heap: &mut ring.sampler_heap,
                    upload: &mut ring.upload,
                    pipelines,
                    frame_extent: ctx.frame_settings.frame_extent,
                    frame_label,
                };
                passes[handle.index()].record(&mut pass_ctx)?;
            }
            cmd.end_label();
            tracker.flush_barriers(&mut cmd);

            // 补全 before 未知的 barrier，单独一条前置列表
            let mut pre = GfxCommandList::new(node.queue, format!("{}-pre", node.name));
            let barrier_count = {
                let global = ctx.global_state.borrow();
                tracker.flush_pending_barriers(&mut pre, &global)
            };
            tracker.commit_final_resource_states(&mut ctx.global_state.borrow_mut());

            let queue = ctx.queue(node.queue);
            if barrier_count > 0 {
                queue.execute_command_lists(vec![pre, cmd]);
            } else {
                queue.execute_command_lists(vec![cmd]);
            }
            fence_values[handle.index()] = queue.signal();
        }

        Ok(())
    }
}
