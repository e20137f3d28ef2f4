pub mod allocation;
pub mod allocator;
pub mod allocator_page;
pub mod dynamic_heap;

use basalt_render_interface::handles::GfxHeapHandle;
use slotmap::Key;

/// 描述符堆的种类
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxDescriptorHeapKind {
    CbvSrvUav,
    Sampler,
    Rtv,
    Dsv,
}

impl GfxDescriptorHeapKind {
    pub const ALL: [Self; 4] = [Self::CbvSrvUav, Self::Sampler, Self::Rtv, Self::Dsv];

    /// 该种类的堆是否允许 shader 可见
    #[inline]
    pub fn can_be_shader_visible(self) -> bool {
        matches!(self, Self::CbvSrvUav | Self::Sampler)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// 指向某个描述符堆内单个槽位的句柄
///
/// 对应 CPU/GPU descriptor handle：虚拟设备里两者同构，只有
/// (堆, 槽位下标) 两个要素。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct GfxDescriptorHandle {
    pub heap: GfxHeapHandle,
    pub index: u32,
}

impl GfxDescriptorHandle {
    #[inline]
    pub fn new(heap: GfxHeapHandle, index: u32) -> Self {
        Self { heap, index }
    }

    /// 空句柄，不指向任何堆
    #[inline]
    pub fn null() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.heap.is_null()
    }

    /// 堆内偏移 n 个槽位后的句柄
    #[inline]
    pub fn offset(&self, n: u32) -> Self {
        Self { heap: self.heap, index: self.index + n }
    }
}
