//! 资源状态追踪
//!
//! 两级追踪：
//! - `GfxGlobalResourceStateTracker` 记录每个资源提交侧的真实状态，
//!   是唯一权威来源；
//! - `GfxResourceStateTracker` 附着在单个 pass 的录制过程上，起始
//!   状态未知的 transition 先进 pending，待录制完成后用全局状态
//!   补全 before。
//!
//! 提交协议（按序）：
//! 1. `flush_pending_barriers` 写入一条前置命令列表，返回补全的
//!    barrier 数；为 0 时该前置列表不必提交；
//! 2. 提交 pass 自身的命令列表；
//! 3. `commit_final_resource_states` 把本 pass 的末态写回全局，
//!    每个 tracker 只能做一次。

use std::collections::HashMap;

use basalt_render_interface::handles::GfxResourceHandle;

use crate::basic::resource_state::GfxResourceStates;
use crate::commands::barrier::GfxTransitionBarrier;
use crate::commands::command_list::GfxCommandList;

/// 全局资源状态表，记录已提交工作完成后各资源所处的状态
#[derive(Default)]
pub struct GfxGlobalResourceStateTracker {
    states: HashMap<GfxResourceHandle, GfxResourceStates>,
}

impl GfxGlobalResourceStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册资源的初始状态；重复注册不覆盖已有记录
    pub fn track_resource(&mut self, resource: GfxResourceHandle, state: GfxResourceStates) {
        self.states.entry(resource).or_insert(state);
    }

    /// 资源销毁或重建（resize）时移除记录
    pub fn untrack_resource(&mut self, resource: GfxResourceHandle) {
        self.states.remove(&resource);
    }

    #[inline]
    pub fn resource_state(&self, resource: GfxResourceHandle) -> Option<GfxResourceStates> {
        self.states.get(&resource).copied()
    }

    #[inline]
    pub fn set_resource_state(&mut self, resource: GfxResourceHandle, state: GfxResourceStates) {
        self.states.insert(resource, state);
    }
}

/// 未决 barrier：录制时不知道资源此刻的真实状态，只记下目标状态
struct PendingBarrier {
    resource: GfxResourceHandle,
    after: GfxResourceStates,
}

/// 单个 pass 录制期间的局部状态追踪
#[derive(Default)]
pub struct GfxResourceStateTracker {
    /// 本 pass 内已知的资源末态
    final_states: HashMap<GfxResourceHandle, GfxResourceStates>,
    /// before 未知的 barrier，flush_pending_barriers 时补全
    pending_barriers: Vec<PendingBarrier>,
    /// before 已知的 barrier，随 pass 命令一起写入
    barriers: Vec<GfxTransitionBarrier>,
}

impl GfxResourceStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求把资源转换到 `after` 状态
    pub fn transition_resource(&mut self, resource: GfxResourceHandle, after: GfxResourceStates) {
        match self.final_states.get(&resource) {
            Some(&before) => {
                if before != after {
                    self.barriers.push(GfxTransitionBarrier::new(resource, before, after));
                }
            }
            None => {
                self.pending_barriers.push(PendingBarrier { resource, after });
            }
        }
        self.final_states.insert(resource, after);
    }

    /// 用全局状态补全 pending barrier 的 before，写入 `cmd`。
    /// 返回写入的 barrier 数；为 0 时 `cmd` 不必提交。
    pub fn flush_pending_barriers(
        &mut self,
        cmd: &mut GfxCommandList,
        global: &GfxGlobalResourceStateTracker,
    ) -> usize {
        let mut count = 0;
        for pending in self.pending_barriers.drain(..) {
            let before = match global.resource_state(pending.resource) {
                Some(state) => state,
                None => {
                    // 未注册的资源按 COMMON 处理；正常流程不应走到这里
                    log::warn!(
                        "resource {:?} not tracked globally, assuming COMMON as before state",
                        pending.resource
                    );
                    GfxResourceStates::COMMON
                }
            };
            if before != pending.after {
                cmd.transition(GfxTransitionBarrier::new(pending.resource, before, pending.after));
                count += 1;
            }
        }
        count
    }

    /// 把录制期间产生的已知 barrier 写入 `cmd`
    pub fn flush_barriers(&mut self, cmd: &mut GfxCommandList) {
        for barrier in self.barriers.drain(..) {
            cmd.transition(barrier);
        }
    }

    /// 把本 pass 的资源末态写回全局。必须在 flush_pending_barriers
    /// 之后调用，且每个 tracker 只调用一次。
    pub fn commit_final_resource_states(self, global: &mut GfxGlobalResourceStateTracker) {
        debug_assert!(self.pending_barriers.is_empty(), "pending barriers not flushed");
        for (resource, state) in self.final_states {
            global.set_resource_state(resource, state);
        }
    }

    #[inline]
    pub fn has_pending_barriers(&self) -> bool {
        !self.pending_barriers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::queue::GfxQueueKind;

    fn handle() -> GfxResourceHandle {
        use slotmap::SlotMap;
        let mut map: SlotMap<GfxResourceHandle, ()> = SlotMap::with_key();
        map.insert(())
    }

    #[test]
    fn test_first_transition_goes_pending() {
        let mut tracker = GfxResourceStateTracker::new();
        let res = handle();
        tracker.transition_resource(res, GfxResourceStates::RENDER_TARGET);
        assert!(tracker.has_pending_barriers());

        let mut global = GfxGlobalResourceStateTracker::new();
        global.track_resource(res, GfxResourceStates::COMMON);

        let mut cmd = GfxCommandList::new(GfxQueueKind::Direct, "pre");
        let flushed = tracker.flush_pending_barriers(&mut cmd, &global);
        assert_eq!(flushed, 1);
        assert_eq!(cmd.barrier_count(), 1);

        tracker.commit_final_resource_states(&mut global);
        assert_eq!(global.resource_state(res), Some(GfxResourceStates::RENDER_TARGET));
    }

    #[test]
    fn test_pending_matching_global_state_is_elided() {
        let mut tracker = GfxResourceStateTracker::new();
        let res = handle();
        tracker.transition_resource(res, GfxResourceStates::PIXEL_SHADER_RESOURCE);

        let mut global = GfxGlobalResourceStateTracker::new();
        global.track_resource(res, GfxResourceStates::PIXEL_SHADER_RESOURCE);

        let mut cmd = GfxCommandList::new(GfxQueueKind::Direct, "pre");
        assert_eq!(tracker.flush_pending_barriers(&mut cmd, &global), 0);
        assert_eq!(cmd.barrier_count(), 0);
    }

    #[test]
    fn test_known_state_transitions_are_local() {
        let mut tracker = GfxResourceStateTracker::new();
        let res = handle();
        tracker.transition_resource(res, GfxResourceStates::COPY_DEST);
        tracker.transition_resource(res, GfxResourceStates::PIXEL_SHADER_RESOURCE);
        // 第二次转换的 before 已知，不进 pending
        assert_eq!(tracker.pending_barriers.len(), 1);
        assert_eq!(tracker.barriers.len(), 1);

        let mut cmd = GfxCommandList::new(GfxQueueKind::Direct, "main");
        tracker.flush_barriers(&mut cmd);
        assert_eq!(cmd.barrier_count(), 1);

        let mut global = GfxGlobalResourceStateTracker::new();
        global.track_resource(res, GfxResourceStates::COMMON);
        let mut pre = GfxCommandList::new(GfxQueueKind::Direct, "pre");
        tracker.flush_pending_barriers(&mut pre, &global);
        tracker.commit_final_resource_states(&mut global);
        assert_eq!(global.resource_state(res), Some(GfxResourceStates::PIXEL_SHADER_RESOURCE));
    }

    #[test]
    fn test_same_state_twice_no_barrier() {
        let mut tracker = GfxResourceStateTracker::new();
        let res = handle();
        tracker.transition_resource(res, GfxResourceStates::DEPTH_WRITE);
        tracker.transition_resource(res, GfxResourceStates::DEPTH_WRITE);
        assert_eq!(tracker.barriers.len(), 0);
        assert_eq!(tracker.pending_barriers.len(), 1);
    }

    #[test]
    fn test_track_resource_does_not_overwrite() {
        let mut global = GfxGlobalResourceStateTracker::new();
        let res = handle();
        global.track_resource(res, GfxResourceStates::COMMON);
        global.set_resource_state(res, GfxResourceStates::RENDER_TARGET);
        global.track_resource(res, GfxResourceStates::COMMON);
        assert_eq!(global.resource_state(res), Some(GfxResourceStates::RENDER_TARGET));
    }

    #[test]
    fn test_untrack_removes_state() {
        let mut global = GfxGlobalResourceStateTracker::new();
        let res = handle();
        global.track_resource(res, GfxResourceStates::COMMON);
        global.untrack_resource(res);
        assert_eq!(global.resource_state(res), None);
    }
}
