//! 描述符分配结果
//!
//! move-only 的 RAII 对象：drop 时把槽位按当前帧延迟归还给所属页。

use std::cell::RefCell;
use std::rc::Rc;

use crate::descriptors::allocator_page::GfxDescriptorAllocatorPage;
use crate::descriptors::GfxDescriptorHandle;

pub struct GfxDescriptorAllocation {
    base: GfxDescriptorHandle,
    count: u32,
    /// None 表示空分配
    page: Option<Rc<RefCell<GfxDescriptorAllocatorPage>>>,
}

impl GfxDescriptorAllocation {
    pub(crate) fn new(
        base: GfxDescriptorHandle,
        count: u32,
        page: Rc<RefCell<GfxDescriptorAllocatorPage>>,
    ) -> Self {
        Self { base, count, page: Some(page) }
    }

    /// 空分配，不指向任何槽位
    pub fn null() -> Self {
        Self { base: GfxDescriptorHandle::null(), count: 0, page: None }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.page.is_none()
    }

    #[inline]
    pub fn base(&self) -> GfxDescriptorHandle {
        self.base
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// 第 i 个槽位的句柄
    #[inline]
    pub fn handle(&self, i: u32) -> GfxDescriptorHandle {
        debug_assert!(i < self.count);
        self.base.offset(i)
    }

    /// 显式归还，与 drop 等价
    pub fn free(self) {}
}

impl Drop for GfxDescriptorAllocation {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            page.borrow_mut().free_deferred(self.base, self.count);
        }
    }
}

impl std::fmt::Debug for GfxDescriptorAllocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GfxDescriptorAllocation")
            .field("base", &self.base)
            .field("count", &self.count)
            .field("null", &self.is_null())
            .finish()
    }
}
