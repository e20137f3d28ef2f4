//! 上传缓冲
//!
//! 每帧一个的线性分配器：从上传堆 buffer 里顺序切分小块，给
//! 常量数据和资源上传用。页内游标只前进不回退，帧开始时整体
//! `reset`。依赖外层的 frames-in-flight fence，保证 reset 时 GPU
//! 已不再引用上一轮的数据。

use basalt_render_interface::handles::GfxResourceHandle;

use crate::error::GfxError;
use crate::foundation::device::GfxDevice;
use crate::resources::resource::GfxResourceDesc;

/// 一次上传分配：buffer 内的一段区间
#[derive(Clone, Copy, Debug)]
pub struct GfxUploadAllocation {
    pub resource: GfxResourceHandle,
    pub offset: u64,
    pub size: u64,
}

struct UploadPage {
    resource: GfxResourceHandle,
    cursor: u64,
}

pub struct GfxUploadBuffer {
    device: GfxDevice,
    name: String,
    page_size: u64,
    pages: Vec<UploadPage>,
    /// 当前写入页的下标
    current_page: usize,
}

// new & init
impl GfxUploadBuffer {
    pub const DEFAULT_PAGE_SIZE: u64 = 2 * 1024 * 1024;

    pub fn new(device: GfxDevice, name: impl Into<String>, page_size: u64) -> Self {
        debug_assert!(page_size > 0);
        Self { device, name: name.into(), page_size, pages: Vec::new(), current_page: 0 }
    }

    #[inline]
    pub fn page_size(&self) -> u64 {
        self.page_size
    }
    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

// 分配
impl GfxUploadBuffer {
    /// 分配 `size` 字节，按 `alignment` 对齐
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Result<GfxUploadAllocation, GfxError> {
        debug_assert!(alignment.is_power_of_two());
        if size > self.page_size {
            return Err(GfxError::UploadAllocationTooLarge { size, page_size: self.page_size });
        }

        loop {
            if self.current_page == self.pages.len() {
                let resource = self.device.create_resource(GfxResourceDesc::upload_buffer(
                    format!("{}-page-{}", self.name, self.pages.len()),
                    self.page_size,
                ));
                self.pages.push(UploadPage { resource, cursor: 0 });
            }
            let page = &mut self.pages[self.current_page];
            let offset = (page.cursor + alignment - 1) & !(alignment - 1);
            if offset + size <= self.page_size {
                page.cursor = offset + size;
                return Ok(GfxUploadAllocation { resource: page.resource, offset, size });
            }
            // 本页放不下，换下一页
            self.current_page += 1;
        }
    }

    /// 帧开始时调用，回退全部游标
    pub fn reset(&mut self) {
        for page in &mut self.pages {
            page.cursor = 0;
        }
        self.current_page = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_and_rollover() {
        let device = GfxDevice::new();
        let mut upload = GfxUploadBuffer::new(device, "test", 256);

        let a = upload.allocate(100, 1).unwrap();
        assert_eq!(a.offset, 0);
        let b = upload.allocate(16, 64).unwrap();
        assert_eq!(b.offset, 128);
        assert_eq!(a.resource, b.resource);

        // 剩 112 字节，放不下 200，翻到新页
        let c = upload.allocate(200, 1).unwrap();
        assert_ne!(c.resource, a.resource);
        assert_eq!(c.offset, 0);
        assert_eq!(upload.page_count(), 2);
    }

    #[test]
    fn test_oversized_allocation_fails() {
        let device = GfxDevice::new();
        let mut upload = GfxUploadBuffer::new(device, "test", 64);
        assert!(matches!(
            upload.allocate(65, 1),
            Err(GfxError::UploadAllocationTooLarge { size: 65, page_size: 64 })
        ));
    }

    #[test]
    fn test_reset_reuses_pages() {
        let device = GfxDevice::new();
        let mut upload = GfxUploadBuffer::new(device, "test", 64);
        upload.allocate(64, 1).unwrap();
        upload.allocate(64, 1).unwrap();
        assert_eq!(upload.page_count(), 2);
        upload.reset();
        upload.allocate(64, 1).unwrap();
        upload.allocate(64, 1).unwrap();
        assert_eq!(upload.page_count(), 2);
    }
}
