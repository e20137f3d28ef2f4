//! 命令队列
//!
//! 每个队列持有一个独立的工作线程，按提交顺序执行命令列表。
//! 同一队列内命令列表按提交顺序执行；跨队列只有显式插入
//! `queue_wait`（对应 InsertWaitForQueue）之后才有顺序保证。
//!
//! fence 值协议：`signal()` 返回本次将要到达的值，代表此前提交的
//! 所有工作完成；`wait_for_fence_value` 阻塞 CPU；`queue_wait` 阻塞
//! 队列自身（后续提交不会执行，直到目标 fence 到值）。

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::commands::command_list::{GfxCommand, GfxCommandList};
use crate::commands::fence::GfxFence;
use crate::foundation::device::{GfxExecState, GfxTraceKind};

/// 队列种类（图形 / 计算 / 拷贝）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GfxQueueKind {
    Direct,
    Compute,
    Copy,
}

impl GfxQueueKind {
    pub const ALL: [Self; 3] = [Self::Direct, Self::Compute, Self::Copy];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Direct,
            1 => Self::Compute,
            2 => Self::Copy,
            _ => panic!("invalid queue index: {}", index),
        }
    }
}

impl Display for GfxQueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Compute => write!(f, "compute"),
            Self::Copy => write!(f, "copy"),
        }
    }
}

enum QueueTask {
    Execute(Vec<GfxCommandList>),
    Signal(GfxFence, u64),
    Wait(GfxFence, u64),
}

/// 命令队列
pub struct GfxCommandQueue {
    kind: GfxQueueKind,
    name: String,
    fence: GfxFence,
    /// 下一次 signal 返回的值
    next_fence_value: AtomicU64,
    sender: Option<Sender<QueueTask>>,
    worker: Option<JoinHandle<()>>,
}

// new & init
impl GfxCommandQueue {
    pub fn new(kind: GfxQueueKind, exec: Arc<Mutex<GfxExecState>>, name: impl Into<String>) -> Self {
        let name = name.into();
        let fence = GfxFence::new(format!("{}-fence", name));
        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker_name = name.clone();
        let worker = std::thread::Builder::new()
            .name(worker_name.clone())
            .spawn(move || Self::worker_main(kind, exec, receiver))
            .unwrap_or_else(|e| panic!("failed to spawn worker for queue `{}`: {}", worker_name, e));

        Self {
            kind,
            name,
            fence,
            next_fence_value: AtomicU64::new(1),
            sender: Some(sender),
            worker: Some(worker),
        }
    }
}

// getters
impl GfxCommandQueue {
    #[inline]
    pub fn kind(&self) -> GfxQueueKind {
        self.kind
    }
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// 队列的 fence，供其他队列做跨队列等待
    #[inline]
    pub fn fence(&self) -> GfxFence {
        self.fence.clone()
    }
}

// 提交与同步
impl GfxCommandQueue {
    #[inline]
    fn send(&self, task: QueueTask) {
        // sender 只在 Drop 里被取走
        self.sender.as_ref().unwrap().send(task).expect("queue worker exited unexpectedly");
    }

    /// 提交一批命令列表
    pub fn execute_command_lists(&self, lists: Vec<GfxCommandList>) {
        debug_assert!(lists.iter().all(|l| l.queue_kind() == self.kind));
        if lists.is_empty() {
            return;
        }
        self.send(QueueTask::Execute(lists));
    }

    /// 入队一次 signal，返回此前全部工作完成时 fence 将到达的值
    pub fn signal(&self) -> u64 {
        let value = self.next_fence_value.fetch_add(1, Ordering::SeqCst);
        self.send(QueueTask::Signal(self.fence.clone(), value));
        value
    }

    #[inline]
    pub fn is_fence_complete(&self, value: u64) -> bool {
        self.fence.is_complete(value)
    }

    /// CPU 阻塞等待
    #[inline]
    pub fn wait_for_fence_value(&self, value: u64) {
        self.fence.wait(value);
    }

    /// 让本队列等待另一个队列的 fence 到值（队列间同步，CPU 不阻塞）
    pub fn queue_wait(&self, fence: &GfxFence, value: u64) {
        self.send(QueueTask::Wait(fence.clone(), value));
    }

    /// signal + CPU 等待，清空队列上全部已提交的工作
    pub fn flush(&self) {
        let value = self.signal();
        self.wait_for_fence_value(value);
    }
}

// 工作线程
impl GfxCommandQueue {
    fn worker_main(kind: GfxQueueKind, exec: Arc<Mutex<GfxExecState>>, receiver: Receiver<QueueTask>) {
        while let Ok(task) = receiver.recv() {
            match task {
                QueueTask::Execute(lists) => {
                    for list in &lists {
                        Self::execute_list(kind, &exec, list);
                    }
                }
                QueueTask::Signal(fence, value) => fence.signal(value),
                QueueTask::Wait(fence, value) => fence.wait(value),
            }
        }
    }

    /// 解释执行一条命令列表；逐条加锁，让多队列的轨迹真实交错
    fn execute_list(kind: GfxQueueKind, exec: &Arc<Mutex<GfxExecState>>, list: &GfxCommandList) {
        for command in list.commands() {
            let mut exec = exec.lock().unwrap();
            match command {
                GfxCommand::BeginLabel(label) => exec.push_event(kind, GfxTraceKind::BeginLabel(label.clone())),
                GfxCommand::EndLabel => exec.push_event(kind, GfxTraceKind::EndLabel),
                GfxCommand::Transition(barrier) => {
                    exec.apply_transition(kind, barrier.resource, barrier.before, barrier.after);
                }
                GfxCommand::UavBarrier(_) => exec.push_event(kind, GfxTraceKind::UavBarrier),
                GfxCommand::CopyBufferRegion { .. } | GfxCommand::CopyResource { .. } => {
                    exec.push_event(kind, GfxTraceKind::Copy);
                }
                GfxCommand::Draw { .. } | GfxCommand::DrawIndexed { .. } => {
                    exec.push_event(kind, GfxTraceKind::Draw);
                }
                GfxCommand::Dispatch { .. } => exec.push_event(kind, GfxTraceKind::Dispatch),
                // 其余命令只改变绑定，不产生可观测事件
                _ => {}
            }
        }
    }
}

impl Drop for GfxCommandQueue {
    fn drop(&mut self) {
        // 关闭通道后工作线程退出
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
