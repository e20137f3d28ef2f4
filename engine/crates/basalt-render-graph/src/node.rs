//! pass 节点与资源访问声明

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::commands::queue::GfxQueueKind;
use basalt_render_interface::handles::GfxResourceHandle;

/// 图内 pass 的句柄，即节点数组下标
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RgPassHandle(pub(crate) usize);

impl RgPassHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// 单次资源访问声明
#[derive(Clone, Copy, Debug)]
pub struct RgResourceAccess {
    pub resource: GfxResourceHandle,
    /// pass 执行期间资源需要处于的状态
    pub state: GfxResourceStates,
    /// 写访问复用了此前读方还在引用的内存（placed resource 别名）。
    /// 只有这种写才对此前的读方产生执行依赖。
    pub aliased: bool,
}

impl RgResourceAccess {
    #[inline]
    pub fn is_write(&self) -> bool {
        self.state.is_write()
    }
}

/// 编译前的 pass 声明
pub(crate) struct RgPassNode {
    pub name: String,
    pub queue: GfxQueueKind,
    pub accesses: Vec<RgResourceAccess>,
}
