//! 渲染上下文
//!
//! 一帧之外的长生命周期对象都在这里：设备、三条命令队列、交换链、
//! 全局资源状态表、CPU 侧描述符分配器，以及 frames-in-flight 的
//! 每帧资源环（上传缓冲、动态描述符堆、帧尾 fence 值）。
//!
//! 帧循环协议：
//! ```text
//! loop {
//!     ctx.begin_frame();          // 等本槽位上一轮的 fence，回收资源
//!     renderer.render_frame(ctx)?;
//!     ctx.end_frame();            // 后备缓冲转 PRESENT，signal + present
//! }
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::commands::command_list::GfxCommandList;
use basalt_gfx::commands::queue::{GfxCommandQueue, GfxQueueKind};
use basalt_gfx::descriptors::allocator::GfxDescriptorAllocator;
use basalt_gfx::descriptors::dynamic_heap::GfxDynamicDescriptorHeap;
use basalt_gfx::descriptors::GfxDescriptorHeapKind;
use basalt_gfx::foundation::device::{GfxDevice, GfxViewKind};
use basalt_gfx::resources::upload_buffer::GfxUploadBuffer;
use basalt_gfx::state_tracker::{GfxGlobalResourceStateTracker, GfxResourceStateTracker};
use basalt_gfx::swapchain::GfxSwapchain;
use basalt_render_interface::frame_counter::FrameCounter;
use basalt_render_interface::pipeline_settings::{DefaultRendererSettings, Extent2D, FrameSettings};

/// 四种 CPU 侧描述符分配器
pub struct CpuDescriptorAllocators {
    pub cbv_srv_uav: GfxDescriptorAllocator,
    pub sampler: GfxDescriptorAllocator,
    pub rtv: GfxDescriptorAllocator,
    pub dsv: GfxDescriptorAllocator,
}

impl CpuDescriptorAllocators {
    fn new(device: &GfxDevice) -> Self {
        let make = |kind| {
            GfxDescriptorAllocator::new(
                device.clone(),
                kind,
                GfxDescriptorAllocator::DEFAULT_DESCRIPTORS_PER_PAGE,
            )
        };
        Self {
            cbv_srv_uav: make(GfxDescriptorHeapKind::CbvSrvUav),
            sampler: make(GfxDescriptorHeapKind::Sampler),
            rtv: make(GfxDescriptorHeapKind::Rtv),
            dsv: make(GfxDescriptorHeapKind::Dsv),
        }
    }

    /// 某种视图的描述符归哪个分配器管
    pub fn for_view(&mut self, kind: GfxViewKind) -> &mut GfxDescriptorAllocator {
        match kind {
            GfxViewKind::Cbv | GfxViewKind::Srv | GfxViewKind::Uav => &mut self.cbv_srv_uav,
            GfxViewKind::Rtv => &mut self.rtv,
            GfxViewKind::Dsv => &mut self.dsv,
        }
    }

    fn set_current_frame(&mut self, frame: u64) {
        self.cbv_srv_uav.set_current_frame(frame);
        self.sampler.set_current_frame(frame);
        self.rtv.set_current_frame(frame);
        self.dsv.set_current_frame(frame);
    }

    fn release_stale_descriptors(&mut self, completed_frame: u64) {
        self.cbv_srv_uav.release_stale_descriptors(completed_frame);
        self.sampler.release_stale_descriptors(completed_frame);
        self.rtv.release_stale_descriptors(completed_frame);
        self.dsv.release_stale_descriptors(completed_frame);
    }
}

/// 每帧一份的资源环
pub struct FrameRing {
    pub upload: GfxUploadBuffer,
    pub dynamic_heap: GfxDynamicDescriptorHeap,
    pub sampler_heap: GfxDynamicDescriptorHeap,
    /// 本环上一轮帧尾在 direct 队列 signal 的值
    pub fence_value: u64,
    /// 本环上一轮服务的帧号
    retired_frame: Option<u64>,
}

pub struct RenderContext {
    pub device: GfxDevice,
    queues: [GfxCommandQueue; 3],
    pub global_state: Rc<RefCell<GfxGlobalResourceStateTracker>>,
    pub allocators: CpuDescriptorAllocators,
    pub swapchain: GfxSwapchain,
    pub frame_counter: FrameCounter,
    pub frame_settings: FrameSettings,
    pub rings: Vec<FrameRing>,
}

// new & init
impl RenderContext {
    pub fn new(extent: Extent2D) -> Self {
        let device = GfxDevice::new();
        let exec = device.exec_state();
        let queues = [
            GfxCommandQueue::new(GfxQueueKind::Direct, exec.clone(), "direct-queue"),
            GfxCommandQueue::new(GfxQueueKind::Compute, exec.clone(), "compute-queue"),
            GfxCommandQueue::new(GfxQueueKind::Copy, exec, "copy-queue"),
        ];

        let swapchain = GfxSwapchain::new(
            device.clone(),
            extent,
            DefaultRendererSettings::DEFAULT_COLOR_FORMAT,
            FrameCounter::fif_count(),
        );

        // 后备缓冲初始处于 PRESENT
        let global_state = Rc::new(RefCell::new(GfxGlobalResourceStateTracker::new()));
        {
            let mut global = global_state.borrow_mut();
            for &handle in swapchain.back_buffers() {
                global.track_resource(handle, GfxResourceStates::PRESENT);
            }
        }

        let rings = FrameCounter::frame_labels()
            .into_iter()
            .map(|label| FrameRing {
                upload: GfxUploadBuffer::new(
                    device.clone(),
                    format!("upload-{}", label),
                    GfxUploadBuffer::DEFAULT_PAGE_SIZE,
                ),
                dynamic_heap: GfxDynamicDescriptorHeap::new(
                    device.clone(),
                    GfxDescriptorHeapKind::CbvSrvUav,
                    GfxDynamicDescriptorHeap::DEFAULT_DESCRIPTORS_PER_HEAP,
                ),
                sampler_heap: GfxDynamicDescriptorHeap::new(
                    device.clone(),
                    GfxDescriptorHeapKind::Sampler,
                    GfxDynamicDescriptorHeap::DEFAULT_DESCRIPTORS_PER_HEAP,
                ),
                fence_value: 0,
                retired_frame: None,
            })
            .collect();

        let frame_settings = FrameSettings {
            color_format: DefaultRendererSettings::DEFAULT_COLOR_FORMAT,
            depth_format: DefaultRendererSettings::DEFAULT_DEPTH_FORMAT,
            frame_extent: extent,
        };

        Self {
            allocators: CpuDescriptorAllocators::new(&device),
            device,
            queues,
            global_state,
            swapchain,
            frame_counter: FrameCounter::new(0),
            frame_settings,
            rings,
        }
    }
}

// getters
impl RenderContext {
    #[inline]
    pub fn queue(&self, kind: GfxQueueKind) -> &GfxCommandQueue {
        &self.queues[kind.index()]
    }

    #[inline]
    pub fn ring_index(&self) -> usize {
        self.frame_counter.frame_label().index()
    }

    #[inline]
    pub fn frame_extent(&self) -> Extent2D {
        self.frame_settings.frame_extent
    }
}

// 帧循环
impl RenderContext {
    /// 等待本槽位上一轮帧的 GPU 工作完成，回收该帧的资源。
    ///
    /// 只看 direct 队列的帧尾 fence。前提：异步队列的产出最终都被
    /// direct 上的某个 pass 消费，剪除后的跨队列等待把它们排在帧尾
    /// signal 之前。产出没人消费的 compute pass 不满足这个前提，
    /// 它的 ring 资源可能在还没执行完时就被重置。
    pub fn begin_frame(&mut self) {
        let frame_id = self.frame_counter.frame_id();
        let ring_index = self.ring_index();

        let fence_value = self.rings[ring_index].fence_value;
        self.queue(GfxQueueKind::Direct).wait_for_fence_value(fence_value);

        if let Some(retired) = self.rings[ring_index].retired_frame {
            self.allocators.release_stale_descriptors(retired);
        }
        self.allocators.set_current_frame(frame_id);

        let ring = &mut self.rings[ring_index];
        ring.retired_frame = Some(frame_id);
        ring.upload.reset();
        ring.dynamic_heap.reset();
        ring.sampler_heap.reset();

        log::debug!("{} begin", self.frame_counter.frame_name());
    }

    /// 后备缓冲转 PRESENT、signal 帧尾 fence、轮转交换链
    pub fn end_frame(&mut self) {
        let back_buffer = self.swapchain.current_back_buffer();

        let mut tracker = GfxResourceStateTracker::new();
        tracker.transition_resource(back_buffer, GfxResourceStates::PRESENT);
        let mut cmd = GfxCommandList::new(GfxQueueKind::Direct, "present-transition");
        let barrier_count = {
            let global = self.global_state.borrow();
            tracker.flush_pending_barriers(&mut cmd, &global)
        };
        tracker.commit_final_resource_states(&mut self.global_state.borrow_mut());
        if barrier_count > 0 {
            self.queue(GfxQueueKind::Direct).execute_command_lists(vec![cmd]);
        }

        let ring_index = self.ring_index();
        self.rings[ring_index].fence_value = self.queue(GfxQueueKind::Direct).signal();

        log::debug!("{} end", self.frame_counter.frame_name());
        self.swapchain.present();
        self.frame_counter.next_frame();
    }

    /// CPU 阻塞到三条队列全部到底
    pub fn flush_all(&self) {
        for queue in &self.queues {
            queue.flush();
        }
    }

    /// 重建交换链；会先把 GPU 清空
    pub fn resize(&mut self, extent: Extent2D) {
        self.flush_all();
        let old = self.swapchain.resize(extent);
        let mut global = self.global_state.borrow_mut();
        for handle in old {
            global.untrack_resource(handle);
        }
        for &handle in self.swapchain.back_buffers() {
            global.track_resource(handle, GfxResourceStates::PRESENT);
        }
        self.frame_settings.frame_extent = extent;
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.flush_all();
    }
}
