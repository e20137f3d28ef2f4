//! CPU 侧描述符分配器
//!
//! 每个实例管理一种堆（CbvSrvUav / Sampler / Rtv / Dsv），内部是
//! 若干固定容量的页，页满了就新开一页。超过单页容量的请求直接
//! 返回空分配。
//!
//! 仅供录制线程使用，不做跨线程同步。

use std::cell::RefCell;
use std::rc::Rc;

use crate::descriptors::allocation::GfxDescriptorAllocation;
use crate::descriptors::allocator_page::GfxDescriptorAllocatorPage;
use crate::descriptors::GfxDescriptorHeapKind;
use crate::foundation::device::GfxDevice;

pub struct GfxDescriptorAllocator {
    device: GfxDevice,
    kind: GfxDescriptorHeapKind,
    descriptors_per_page: u32,
    pages: Vec<Rc<RefCell<GfxDescriptorAllocatorPage>>>,
}

// new & init
impl GfxDescriptorAllocator {
    pub const DEFAULT_DESCRIPTORS_PER_PAGE: u32 = 256;

    pub fn new(device: GfxDevice, kind: GfxDescriptorHeapKind, descriptors_per_page: u32) -> Self {
        debug_assert!(descriptors_per_page > 0);
        Self { device, kind, descriptors_per_page, pages: Vec::new() }
    }
}

// getters
impl GfxDescriptorAllocator {
    #[inline]
    pub fn kind(&self) -> GfxDescriptorHeapKind {
        self.kind
    }
    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

// 分配
impl GfxDescriptorAllocator {
    /// 分配 `count` 个连续槽位；超过单页容量时返回空分配
    pub fn allocate(&mut self, count: u32) -> GfxDescriptorAllocation {
        if count == 0 || count > self.descriptors_per_page {
            return GfxDescriptorAllocation::null();
        }
        for page in &self.pages {
            let handle = page.borrow_mut().allocate(count);
            if let Some(handle) = handle {
                return GfxDescriptorAllocation::new(handle, count, page.clone());
            }
        }
        // 现有页都放不下，新开一页
        let page = Rc::new(RefCell::new(GfxDescriptorAllocatorPage::new(
            &self.device,
            self.kind,
            self.descriptors_per_page,
        )));
        let handle = page.borrow_mut().allocate(count).unwrap();
        self.pages.push(page.clone());
        GfxDescriptorAllocation::new(handle, count, page)
    }

    /// 帧推进：后续 drop 的分配以新帧号做时间戳
    pub fn set_current_frame(&mut self, frame: u64) {
        for page in &self.pages {
            page.borrow_mut().set_current_frame(frame);
        }
    }

    /// 归还所有在 `completed_frame` 及之前帧释放的槽位
    pub fn release_stale_descriptors(&mut self, completed_frame: u64) {
        for page in &self.pages {
            page.borrow_mut().release_stale_descriptors(completed_frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_allocator(per_page: u32) -> GfxDescriptorAllocator {
        GfxDescriptorAllocator::new(GfxDevice::new(), GfxDescriptorHeapKind::CbvSrvUav, per_page)
    }

    #[test]
    fn test_grows_new_page_when_full() {
        let mut alloc = make_allocator(4);
        let a = alloc.allocate(4);
        assert!(!a.is_null());
        assert_eq!(alloc.page_count(), 1);
        let b = alloc.allocate(4);
        assert!(!b.is_null());
        assert_eq!(alloc.page_count(), 2);
        assert_ne!(a.base().heap, b.base().heap);
    }

    #[test]
    fn test_oversized_request_returns_null() {
        let mut alloc = make_allocator(4);
        assert!(alloc.allocate(5).is_null());
        assert!(alloc.allocate(0).is_null());
        assert_eq!(alloc.page_count(), 0);
    }

    #[test]
    fn test_drop_then_release_reuses_slots() {
        let mut alloc = make_allocator(4);
        let a = alloc.allocate(4);
        let base = a.base();
        drop(a);
        // 未 release 前页仍然是满的，会新开一页
        let b = alloc.allocate(4);
        assert_eq!(alloc.page_count(), 2);
        drop(b);
        alloc.release_stale_descriptors(0);
        let c = alloc.allocate(4);
        assert_eq!(alloc.page_count(), 2);
        assert_eq!(c.base().heap, base.heap);
    }
}
