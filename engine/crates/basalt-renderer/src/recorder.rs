//! pass 录制入口
//!
//! [`PassContext`] 聚合了录制一个 pass 需要的一切：命令列表、状态
//! 追踪、描述符分配器、动态堆、上传缓冲、管线注册表。
//!
//! [`PassCommandRecorder`] 在绑定了某条管线之后拿到，负责按
//! (register, space) 做参数绑定：根参数直接下发，描述符表先暂存
//! 进动态堆，draw/dispatch 时统一提交。

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::commands::command_list::{GfxCommandList, GfxRect, GfxViewport};
use basalt_gfx::descriptors::dynamic_heap::GfxDynamicDescriptorHeap;
use basalt_gfx::error::GfxError;
use basalt_gfx::foundation::device::{GfxDevice, GfxViewKind};
use basalt_gfx::pipeline::pipeline_state::GfxPipelineState;
use basalt_gfx::pipeline::root_signature::{GfxRegisterKind, GfxRootParameterKind};
use basalt_gfx::resources::upload_buffer::{GfxUploadAllocation, GfxUploadBuffer};
use basalt_gfx::state_tracker::GfxResourceStateTracker;
use basalt_render_interface::handles::GfxResourceHandle;
use basalt_render_interface::pipeline_settings::{Extent2D, FrameLabel};

use std::rc::Rc;

use crate::error::RendererError;
use crate::pipelines::PipelineRegistry;
use crate::render_context::CpuDescriptorAllocators;

pub struct PassContext<'a> {
    pub device: &'a GfxDevice,
    pub cmd: &'a mut GfxCommandList,
    pub tracker: &'a mut GfxResourceStateTracker,
    pub allocators: &'a mut CpuDescriptorAllocators,
    pub dynamic_heap: &'a mut GfxDynamicDescriptorHeap,
    pub sampler_heap: &'a mut GfxDynamicDescriptorHeap,
    pub upload: &'a mut GfxUploadBuffer,
    pub pipelines: &'a PipelineRegistry,
    pub frame_extent: Extent2D,
    pub frame_label: FrameLabel,
}

impl<'a> PassContext<'a> {
    /// 请求一次状态转换。before 已知的 barrier 立刻写进命令列表，
    /// 未知的留到 pass 提交前的补全列表。
    pub fn transition(&mut self, resource: GfxResourceHandle, state: GfxResourceStates) {
        self.tracker.transition_resource(resource, state);
        self.tracker.flush_barriers(self.cmd);
    }

    /// 同一资源两次 UAV 访问之间的可见性屏障；`None` 对所有
    /// UAV 访问生效
    pub fn uav_barrier(&mut self, resource: Option<GfxResourceHandle>) {
        self.cmd.uav_barrier(resource);
    }

    /// 绑定渲染目标并铺满视口
    pub fn bind_render_targets(
        &mut self,
        rtvs: &[GfxResourceHandle],
        dsv: Option<GfxResourceHandle>,
    ) -> Result<(), GfxError> {
        let mut rtv_views = Vec::with_capacity(rtvs.len());
        for &resource in rtvs {
            rtv_views.push(self.view(resource, GfxViewKind::Rtv)?);
        }
        let dsv_view = match dsv {
            Some(resource) => Some(self.view(resource, GfxViewKind::Dsv)?),
            None => None,
        };
        self.cmd.set_render_targets(rtv_views, dsv_view);
        self.cmd.set_viewport(GfxViewport::full(self.frame_extent.width, self.frame_extent.height));
        self.cmd.set_scissor(GfxRect::full(self.frame_extent.width, self.frame_extent.height));
        Ok(())
    }

    pub fn clear_render_target(
        &mut self,
        resource: GfxResourceHandle,
        color: glam::Vec4,
    ) -> Result<(), GfxError> {
        let rtv = self.view(resource, GfxViewKind::Rtv)?;
        self.cmd.clear_render_target(rtv, color);
        Ok(())
    }

    pub fn clear_depth_stencil(
        &mut self,
        resource: GfxResourceHandle,
        depth: f32,
        stencil: u8,
    ) -> Result<(), GfxError> {
        let dsv = self.view(resource, GfxViewKind::Dsv)?;
        self.cmd.clear_depth_stencil(dsv, depth, stencil);
        Ok(())
    }

    /// 把一份常量数据放进本帧的上传缓冲
    pub fn upload_constants<T: bytemuck::NoUninit>(
        &mut self,
        value: &T,
    ) -> Result<GfxUploadAllocation, GfxError> {
        // 虚拟设备没有可写内存，只占位；真实后端在这里 memcpy
        let _ = bytemuck::bytes_of(value);
        // D3D12 常量缓冲对齐
        self.upload.allocate(std::mem::size_of::<T>() as u64, 256)
    }

    /// 绑定管线，进入按 (register, space) 绑定参数的录制阶段
    pub fn bind_pipeline<'b>(
        &'b mut self,
        name: &str,
    ) -> Result<PassCommandRecorder<'a, 'b>, RendererError> {
        let pipeline = self
            .pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| RendererError::UnknownPipeline { name: name.to_string() })?;

        let root_signature = pipeline.root_signature().clone();
        self.cmd.set_pipeline_state(pipeline.name());
        self.cmd.set_root_signature(root_signature.name(), pipeline.is_graphics());
        self.dynamic_heap.parse_root_signature(&root_signature)?;
        self.sampler_heap.parse_root_signature(&root_signature)?;

        Ok(PassCommandRecorder { ctx: self, pipeline })
    }

    fn view(&mut self, resource: GfxResourceHandle, kind: GfxViewKind) -> Result<basalt_gfx::descriptors::GfxDescriptorHandle, GfxError> {
        self.device.get_or_create_view(resource, kind, self.allocators.for_view(kind))
    }
}

pub struct PassCommandRecorder<'a, 'b> {
    ctx: &'b mut PassContext<'a>,
    pipeline: Rc<GfxPipelineState>,
}

impl PassCommandRecorder<'_, '_> {
    #[inline]
    fn graphics(&self) -> bool {
        self.pipeline.is_graphics()
    }

    /// 下发根常量到 (b{register}, space{space})
    pub fn set_constants(&mut self, register: u32, space: u32, data: &[u32]) -> Result<(), RendererError> {
        let rs = self.pipeline.root_signature();
        let bind = rs.find_bind_point(GfxRegisterKind::Cbv, register, space)?;
        match rs.parameter(bind.param).map(|p| &p.kind) {
            Some(GfxRootParameterKind::Constants { num_values }) => {
                debug_assert!(data.len() as u32 <= *num_values);
                self.ctx.cmd.set_root_constants(bind.param, data.to_vec(), self.graphics());
                Ok(())
            }
            _ => Err(GfxError::InvalidRootParameter {
                index: bind.param,
                reason: "expected 32-bit root constants",
            }
            .into()),
        }
    }

    pub fn bind_cbv(&mut self, register: u32, space: u32, resource: GfxResourceHandle) -> Result<(), RendererError> {
        self.bind(GfxRegisterKind::Cbv, GfxViewKind::Cbv, register, space, resource)
    }

    pub fn bind_srv(&mut self, register: u32, space: u32, resource: GfxResourceHandle) -> Result<(), RendererError> {
        self.bind(GfxRegisterKind::Srv, GfxViewKind::Srv, register, space, resource)
    }

    pub fn bind_uav(&mut self, register: u32, space: u32, resource: GfxResourceHandle) -> Result<(), RendererError> {
        self.bind(GfxRegisterKind::Uav, GfxViewKind::Uav, register, space, resource)
    }

    fn bind(
        &mut self,
        register_kind: GfxRegisterKind,
        view_kind: GfxViewKind,
        register: u32,
        space: u32,
        resource: GfxResourceHandle,
    ) -> Result<(), RendererError> {
        let rs = self.pipeline.root_signature().clone();
        let bind = rs.find_bind_point(register_kind, register, space)?;
        match rs.parameter(bind.param).map(|p| &p.kind) {
            Some(GfxRootParameterKind::DescriptorTable { .. }) => {
                let view = self.ctx.view(resource, view_kind)?;
                let heap = match register_kind {
                    GfxRegisterKind::Sampler => &mut self.ctx.sampler_heap,
                    _ => &mut self.ctx.dynamic_heap,
                };
                heap.stage_descriptors(bind.param, bind.offset, &[view])?;
                Ok(())
            }
            Some(GfxRootParameterKind::Cbv | GfxRootParameterKind::Srv | GfxRootParameterKind::Uav) => {
                self.ctx.cmd.set_root_descriptor(bind.param, resource, self.graphics());
                Ok(())
            }
            _ => Err(GfxError::InvalidRootParameter {
                index: bind.param,
                reason: "root constants cannot bind a resource",
            }
            .into()),
        }
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, resource: GfxResourceHandle) {
        self.ctx.cmd.set_vertex_buffer(slot, resource);
    }

    pub fn set_index_buffer(&mut self, resource: GfxResourceHandle) {
        self.ctx.cmd.set_index_buffer(resource);
    }

    /// commit 暂存的描述符表后下发 draw
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.commit();
        self.ctx.cmd.draw(vertex_count, instance_count);
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.commit();
        self.ctx.cmd.draw_indexed(index_count, instance_count);
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commit();
        self.ctx.cmd.dispatch(x, y, z);
    }

    fn commit(&mut self) {
        let graphics = self.graphics();
        self.ctx.dynamic_heap.commit_staged_descriptors(self.ctx.cmd, graphics);
        self.ctx.sampler_heap.commit_staged_descriptors(self.ctx.cmd, graphics);
    }
}
