//! Barrier 描述
//!
//! Transition barrier 声明资源从一个状态迁移到另一个状态；
//! UAV barrier 只分隔同一资源上的两次无序访问，不改变状态。

use basalt_render_interface::handles::GfxResourceHandle;

use crate::basic::resource_state::GfxResourceStates;

/// 状态迁移 barrier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GfxTransitionBarrier {
    pub resource: GfxResourceHandle,
    pub before: GfxResourceStates,
    pub after: GfxResourceStates,
}

impl GfxTransitionBarrier {
    #[inline]
    pub fn new(resource: GfxResourceHandle, before: GfxResourceStates, after: GfxResourceStates) -> Self {
        Self { resource, before, after }
    }

    /// before == after 的迁移不需要真正的 barrier
    #[inline]
    pub fn is_redundant(&self) -> bool {
        self.before == self.after
    }
}
