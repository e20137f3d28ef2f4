//! 设备与虚拟执行状态
//!
//! `GfxDevice` 管理所有 GPU 资源与描述符堆，使用 SlotMap 存储资源，
//! 对外提供轻量级的 Handle。
//!
//! 设备同时持有一份跨线程共享的 **执行状态** (`GfxExecState`)：队列
//! 工作线程按提交顺序执行命令流时，在这里校验每条 transition barrier
//! 的 before 状态是否与资源的真实状态一致（不一致记为 hazard），并
//! 追加一条全局有序的执行轨迹。渲染核心的正确性测试全部建立在这份
//! 轨迹与 hazard 记录之上；接入真实后端时替换的也是这一层。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use slotmap::SlotMap;

use basalt_render_interface::handles::{GfxHeapHandle, GfxResourceHandle};

use crate::basic::resource_state::GfxResourceStates;
use crate::commands::queue::GfxQueueKind;
use crate::descriptors::allocation::GfxDescriptorAllocation;
use crate::descriptors::allocator::GfxDescriptorAllocator;
use crate::descriptors::{GfxDescriptorHandle, GfxDescriptorHeapKind};
use crate::error::GfxError;
use crate::resources::resource::GfxResourceDesc;

/// 资源视图的种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxViewKind {
    Cbv,
    Srv,
    Uav,
    Rtv,
    Dsv,
}

/// 描述符堆信息
#[derive(Clone, Debug)]
pub struct GfxDescriptorHeapInfo {
    pub kind: GfxDescriptorHeapKind,
    pub capacity: u32,
    pub shader_visible: bool,
    pub name: String,
}

/// 执行轨迹中的一条事件
#[derive(Clone, Debug)]
pub struct GfxTraceEvent {
    pub queue: GfxQueueKind,
    pub kind: GfxTraceKind,
}

#[derive(Clone, Debug)]
pub enum GfxTraceKind {
    BeginLabel(String),
    EndLabel,
    Transition {
        resource: GfxResourceHandle,
        before: GfxResourceStates,
        after: GfxResourceStates,
    },
    UavBarrier,
    Copy,
    Draw,
    Dispatch,
}

/// GPU 侧的真实状态，由队列工作线程串行修改
#[derive(Default)]
pub struct GfxExecState {
    /// 每个资源的真实状态（最后一次成功 transition 的目标状态）
    resource_states: HashMap<GfxResourceHandle, GfxResourceStates>,
    /// 资源调试名，用于 hazard 诊断
    resource_names: HashMap<GfxResourceHandle, String>,
    /// 全局有序的执行轨迹
    trace: Vec<GfxTraceEvent>,
    /// barrier 校验失败的记录；正确的调度下永远为空
    hazards: Vec<String>,
}

impl GfxExecState {
    pub(crate) fn register_resource(
        &mut self,
        handle: GfxResourceHandle,
        name: &str,
        initial_state: GfxResourceStates,
    ) {
        self.resource_states.insert(handle, initial_state);
        self.resource_names.insert(handle, name.to_string());
    }

    pub(crate) fn unregister_resource(&mut self, handle: GfxResourceHandle) {
        self.resource_states.remove(&handle);
        self.resource_names.remove(&handle);
    }

    /// 执行一条 transition，校验 before 状态
    pub(crate) fn apply_transition(
        &mut self,
        queue: GfxQueueKind,
        resource: GfxResourceHandle,
        before: GfxResourceStates,
        after: GfxResourceStates,
    ) {
        let name = self.resource_names.get(&resource).cloned().unwrap_or_else(|| "<unknown>".into());
        match self.resource_states.get_mut(&resource) {
            Some(actual) => {
                if *actual != before {
                    self.hazards.push(format!(
                        "transition of `{}` on {} queue declares before={:?}, actual={:?}",
                        name, queue, before, actual
                    ));
                }
                *actual = after;
            }
            None => {
                self.hazards.push(format!("transition of destroyed resource `{}` on {} queue", name, queue));
            }
        }
        self.trace.push(GfxTraceEvent {
            queue,
            kind: GfxTraceKind::Transition { resource, before, after },
        });
    }

    #[inline]
    pub(crate) fn push_event(&mut self, queue: GfxQueueKind, kind: GfxTraceKind) {
        self.trace.push(GfxTraceEvent { queue, kind });
    }

    #[inline]
    pub fn resource_state(&self, handle: GfxResourceHandle) -> Option<GfxResourceStates> {
        self.resource_states.get(&handle).copied()
    }
}

struct GfxResourceEntry {
    desc: GfxResourceDesc,
    /// 惰性创建的视图缓存，资源销毁时随 entry 一起丢弃
    views: HashMap<GfxViewKind, GfxDescriptorAllocation>,
}

struct GfxDeviceInner {
    resources: SlotMap<GfxResourceHandle, GfxResourceEntry>,
    heaps: SlotMap<GfxHeapHandle, GfxDescriptorHeapInfo>,
}

/// 虚拟设备
///
/// 录制线程内通过 `Rc` 共享；执行状态单独用 `Arc<Mutex>` 包装，
/// 供各队列的工作线程访问。
#[derive(Clone)]
pub struct GfxDevice {
    inner: Rc<RefCell<GfxDeviceInner>>,
    exec: Arc<Mutex<GfxExecState>>,
}

impl Default for GfxDevice {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl GfxDevice {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(GfxDeviceInner {
                resources: SlotMap::with_key(),
                heaps: SlotMap::with_key(),
            })),
            exec: Arc::new(Mutex::new(GfxExecState::default())),
        }
    }
}

// 资源管理
impl GfxDevice {
    /// 创建资源并在执行状态中登记其初始状态
    pub fn create_resource(&self, desc: GfxResourceDesc) -> GfxResourceHandle {
        let mut inner = self.inner.borrow_mut();
        let name = desc.name.clone();
        let initial_state = desc.initial_state;
        let handle = inner.resources.insert(GfxResourceEntry { desc, views: HashMap::new() });
        self.exec.lock().unwrap().register_resource(handle, &name, initial_state);
        log::debug!("create resource `{}` ({:?})", name, handle);
        handle
    }

    /// 立即销毁资源；调用方需保证 GPU 已不再引用它
    /// （resize / 关停路径都先 flush 了所有队列）
    pub fn destroy_resource(&self, handle: GfxResourceHandle) {
        let entry = self.inner.borrow_mut().resources.remove(handle);
        if let Some(entry) = entry {
            log::debug!("destroy resource `{}`", entry.desc.name);
            // views 的 DescriptorAllocation 随 entry drop 时延迟归还
        }
        self.exec.lock().unwrap().unregister_resource(handle);
    }

    #[inline]
    pub fn is_alive(&self, handle: GfxResourceHandle) -> bool {
        self.inner.borrow().resources.contains_key(handle)
    }

    pub fn resource_desc(&self, handle: GfxResourceHandle) -> Option<GfxResourceDesc> {
        self.inner.borrow().resources.get(handle).map(|e| e.desc.clone())
    }
}

// 描述符堆与视图
impl GfxDevice {
    pub fn create_descriptor_heap(
        &self,
        kind: GfxDescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
        name: impl Into<String>,
    ) -> GfxHeapHandle {
        debug_assert!(!shader_visible || kind.can_be_shader_visible());
        self.inner.borrow_mut().heaps.insert(GfxDescriptorHeapInfo {
            kind,
            capacity,
            shader_visible,
            name: name.into(),
        })
    }

    pub fn heap_info(&self, heap: GfxHeapHandle) -> Option<GfxDescriptorHeapInfo> {
        self.inner.borrow().heaps.get(heap).cloned()
    }

    /// 取出资源上某种视图，没有则通过 allocator 创建并缓存
    pub fn get_or_create_view(
        &self,
        handle: GfxResourceHandle,
        view_kind: GfxViewKind,
        allocator: &mut GfxDescriptorAllocator,
    ) -> Result<GfxDescriptorHandle, GfxError> {
        {
            let inner = self.inner.borrow();
            let entry = inner.resources.get(handle).ok_or(GfxError::ResourceNotAlive(handle))?;
            if let Some(allocation) = entry.views.get(&view_kind) {
                return Ok(allocation.base());
            }
        }
        // 单个描述符的分配不会失败：allocator 会按需增长页
        let allocation = allocator.allocate(1);
        debug_assert!(!allocation.is_null());
        let base = allocation.base();
        self.inner
            .borrow_mut()
            .resources
            .get_mut(handle)
            .ok_or(GfxError::ResourceNotAlive(handle))?
            .views
            .insert(view_kind, allocation);
        Ok(base)
    }
}

// 执行状态访问
impl GfxDevice {
    #[inline]
    pub fn exec_state(&self) -> Arc<Mutex<GfxExecState>> {
        self.exec.clone()
    }

    /// GPU 真实状态（最后一次 transition 的目标）
    pub fn actual_resource_state(&self, handle: GfxResourceHandle) -> Option<GfxResourceStates> {
        self.exec.lock().unwrap().resource_state(handle)
    }

    /// 取走 hazard 记录；正确的一帧之后应当为空
    pub fn take_hazards(&self) -> Vec<String> {
        std::mem::take(&mut self.exec.lock().unwrap().hazards)
    }

    /// 执行轨迹快照
    pub fn trace_snapshot(&self) -> Vec<GfxTraceEvent> {
        self.exec.lock().unwrap().trace.clone()
    }

    pub fn clear_trace(&self) {
        self.exec.lock().unwrap().trace.clear();
    }
}
