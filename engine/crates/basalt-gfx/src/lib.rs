//! basalt-gfx - 设备与命令层
//!
//! 提供渲染核心所需的 GPU 抽象：
//!
//! - **GfxDevice**: 资源池与虚拟执行状态（barrier 校验、执行轨迹）
//! - **GfxCommandQueue / GfxFence**: 带独立工作线程的队列与单调 fence
//! - **GfxCommandList**: 命令录制
//! - **GfxDescriptorAllocator 家族**: 描述符子分配与延迟回收
//! - **GfxDynamicDescriptorHeap**: 每帧 shader 可见描述符的暂存与提交
//! - **GfxResourceStateTracker**: 资源状态跟踪与最小 barrier 生成
//!
//! 原生图形 API 是外部协作者：此处的设备按命令流语义执行并校验
//! 每一条 transition barrier，真实后端在 `GfxCommandQueue` 的执行
//! 路径上替换接入。

pub mod basic;
pub mod commands;
pub mod descriptors;
pub mod error;
pub mod foundation;
pub mod pipeline;
pub mod resources;
pub mod state_tracker;
pub mod swapchain;
