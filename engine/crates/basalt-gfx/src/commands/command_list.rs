//! 命令列表
//!
//! 单线程录制、整体提交到某个队列。命令是纯数据，由队列的工作线程
//! 按提交顺序解释执行。`barrier_count` 供调用方做"零 barrier 则不
//! 提交"的判断。

use glam::Vec4;

use basalt_render_interface::handles::{GfxHeapHandle, GfxResourceHandle};

use crate::commands::barrier::GfxTransitionBarrier;
use crate::commands::queue::GfxQueueKind;
use crate::descriptors::GfxDescriptorHandle;

/// 视口（像素坐标 + 深度范围）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GfxViewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl GfxViewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 裁剪矩形
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl GfxRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self { left: 0, top: 0, right: width as i32, bottom: height as i32 }
    }
}

/// 命令流中的一条命令
#[derive(Clone, Debug)]
pub enum GfxCommand {
    BeginLabel(String),
    EndLabel,
    Transition(GfxTransitionBarrier),
    /// resource 为 None 表示对所有 UAV 访问生效
    UavBarrier(Option<GfxResourceHandle>),
    CopyBufferRegion {
        src: GfxResourceHandle,
        src_offset: u64,
        dst: GfxResourceHandle,
        dst_offset: u64,
        size: u64,
    },
    CopyResource {
        src: GfxResourceHandle,
        dst: GfxResourceHandle,
    },
    SetViewport(GfxViewport),
    SetScissor(GfxRect),
    SetRenderTargets {
        rtvs: Vec<GfxDescriptorHandle>,
        dsv: Option<GfxDescriptorHandle>,
    },
    ClearRenderTarget {
        rtv: GfxDescriptorHandle,
        color: Vec4,
    },
    ClearDepthStencil {
        dsv: GfxDescriptorHandle,
        depth: f32,
        stencil: u8,
    },
    SetPipelineState(String),
    SetRootSignature {
        name: String,
        graphics: bool,
    },
    SetDescriptorHeap(GfxHeapHandle),
    SetRootConstants {
        param: u32,
        data: Vec<u32>,
        graphics: bool,
    },
    SetRootDescriptor {
        param: u32,
        resource: GfxResourceHandle,
        graphics: bool,
    },
    SetRootDescriptorTable {
        param: u32,
        base: GfxDescriptorHandle,
        graphics: bool,
    },
    SetVertexBuffer {
        slot: u32,
        resource: GfxResourceHandle,
    },
    SetIndexBuffer {
        resource: GfxResourceHandle,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
}

/// 命令列表
pub struct GfxCommandList {
    name: String,
    queue_kind: GfxQueueKind,
    commands: Vec<GfxCommand>,
    barrier_count: usize,
}

// new & init
impl GfxCommandList {
    pub fn new(queue_kind: GfxQueueKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue_kind,
            commands: Vec::new(),
            barrier_count: 0,
        }
    }
}

// getters
impl GfxCommandList {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    #[inline]
    pub fn queue_kind(&self) -> GfxQueueKind {
        self.queue_kind
    }
    #[inline]
    pub fn commands(&self) -> &[GfxCommand] {
        &self.commands
    }
    /// 已录制的 barrier 条数（transition + uav）
    #[inline]
    pub fn barrier_count(&self) -> usize {
        self.barrier_count
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// 录制
impl GfxCommandList {
    #[inline]
    fn push(&mut self, cmd: GfxCommand) {
        self.commands.push(cmd);
    }

    pub fn begin_label(&mut self, label: impl Into<String>) {
        self.push(GfxCommand::BeginLabel(label.into()));
    }
    pub fn end_label(&mut self) {
        self.push(GfxCommand::EndLabel);
    }

    pub fn transition(&mut self, barrier: GfxTransitionBarrier) {
        debug_assert!(!barrier.is_redundant());
        self.barrier_count += 1;
        self.push(GfxCommand::Transition(barrier));
    }

    pub fn uav_barrier(&mut self, resource: Option<GfxResourceHandle>) {
        self.barrier_count += 1;
        self.push(GfxCommand::UavBarrier(resource));
    }

    pub fn copy_buffer_region(
        &mut self,
        src: GfxResourceHandle,
        src_offset: u64,
        dst: GfxResourceHandle,
        dst_offset: u64,
        size: u64,
    ) {
        self.push(GfxCommand::CopyBufferRegion { src, src_offset, dst, dst_offset, size });
    }

    pub fn copy_resource(&mut self, src: GfxResourceHandle, dst: GfxResourceHandle) {
        self.push(GfxCommand::CopyResource { src, dst });
    }

    pub fn set_viewport(&mut self, viewport: GfxViewport) {
        self.push(GfxCommand::SetViewport(viewport));
    }
    pub fn set_scissor(&mut self, rect: GfxRect) {
        self.push(GfxCommand::SetScissor(rect));
    }

    pub fn set_render_targets(&mut self, rtvs: Vec<GfxDescriptorHandle>, dsv: Option<GfxDescriptorHandle>) {
        self.push(GfxCommand::SetRenderTargets { rtvs, dsv });
    }

    pub fn clear_render_target(&mut self, rtv: GfxDescriptorHandle, color: Vec4) {
        self.push(GfxCommand::ClearRenderTarget { rtv, color });
    }

    pub fn clear_depth_stencil(&mut self, dsv: GfxDescriptorHandle, depth: f32, stencil: u8) {
        self.push(GfxCommand::ClearDepthStencil { dsv, depth, stencil });
    }

    pub fn set_pipeline_state(&mut self, name: impl Into<String>) {
        self.push(GfxCommand::SetPipelineState(name.into()));
    }

    pub fn set_root_signature(&mut self, name: impl Into<String>, graphics: bool) {
        self.push(GfxCommand::SetRootSignature { name: name.into(), graphics });
    }

    pub fn set_descriptor_heap(&mut self, heap: GfxHeapHandle) {
        self.push(GfxCommand::SetDescriptorHeap(heap));
    }

    pub fn set_root_constants(&mut self, param: u32, data: Vec<u32>, graphics: bool) {
        self.push(GfxCommand::SetRootConstants { param, data, graphics });
    }

    pub fn set_root_descriptor(&mut self, param: u32, resource: GfxResourceHandle, graphics: bool) {
        self.push(GfxCommand::SetRootDescriptor { param, resource, graphics });
    }

    pub fn set_root_descriptor_table(&mut self, param: u32, base: GfxDescriptorHandle, graphics: bool) {
        self.push(GfxCommand::SetRootDescriptorTable { param, base, graphics });
    }

    pub fn set_vertex_buffer(&mut self, slot: u32, resource: GfxResourceHandle) {
        self.push(GfxCommand::SetVertexBuffer { slot, resource });
    }

    pub fn set_index_buffer(&mut self, resource: GfxResourceHandle) {
        self.push(GfxCommand::SetIndexBuffer { resource });
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.push(GfxCommand::Draw { vertex_count, instance_count });
    }

    pub fn draw_indexed(&mut self, index_count: u32, instance_count: u32) {
        self.push(GfxCommand::DrawIndexed { index_count, instance_count });
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(GfxCommand::Dispatch { x, y, z });
    }
}
