//! 描述符堆页
//!
//! 单页对应一个 CPU 侧描述符堆，内部用双索引 free-list 管理：
//! - `free_by_offset`: offset -> size，用于相邻块合并；
//! - `free_by_size`: size -> {offset}，用于 best-fit 查找。
//!
//! 释放是帧延迟的：`free_deferred` 只把块挂到 stale 列表，待
//! `release_stale_descriptors(frame)` 确认该帧 GPU 工作完成后才
//! 真正归还并合并。

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use basalt_render_interface::handles::GfxHeapHandle;

use crate::descriptors::{GfxDescriptorHandle, GfxDescriptorHeapKind};
use crate::foundation::device::GfxDevice;

struct StaleAllocation {
    offset: u32,
    size: u32,
    /// 归还时所处的帧号；该帧完成后才可复用
    frame: u64,
}

pub struct GfxDescriptorAllocatorPage {
    heap: GfxHeapHandle,
    kind: GfxDescriptorHeapKind,
    capacity: u32,
    free_by_offset: BTreeMap<u32, u32>,
    free_by_size: BTreeMap<u32, BTreeSet<u32>>,
    stale: VecDeque<StaleAllocation>,
    free_handle_count: u32,
    /// 当前帧号，free_deferred 以它为时间戳
    current_frame: u64,
}

// new & init
impl GfxDescriptorAllocatorPage {
    pub fn new(device: &GfxDevice, kind: GfxDescriptorHeapKind, capacity: u32) -> Self {
        let heap = device.create_descriptor_heap(kind, capacity, false, format!("alloc-page-{:?}", kind));
        let mut page = Self {
            heap,
            kind,
            capacity,
            free_by_offset: BTreeMap::new(),
            free_by_size: BTreeMap::new(),
            stale: VecDeque::new(),
            free_handle_count: 0,
            current_frame: 0,
        };
        page.add_free_block(0, capacity);
        page
    }
}

// getters
impl GfxDescriptorAllocatorPage {
    #[inline]
    pub fn kind(&self) -> GfxDescriptorHeapKind {
        self.kind
    }
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
    #[inline]
    pub fn free_handle_count(&self) -> u32 {
        self.free_handle_count
    }
    #[inline]
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }
    #[inline]
    pub fn has_space(&self, count: u32) -> bool {
        self.free_by_size.range(count..).next().is_some()
    }
}

// 分配与释放
impl GfxDescriptorAllocatorPage {
    /// best-fit 分配 `count` 个连续槽位，失败返回 None
    pub fn allocate(&mut self, count: u32) -> Option<GfxDescriptorHandle> {
        let (&block_size, offsets) = self.free_by_size.range(count..).next()?;
        let offset = *offsets.iter().next().unwrap();

        self.remove_free_block(offset, block_size);

        // 剩余部分作为新空闲块放回
        let remainder = block_size - count;
        if remainder > 0 {
            self.insert_free_block(offset + count, remainder);
        }
        Some(GfxDescriptorHandle::new(self.heap, offset))
    }

    /// 延迟释放：块在当前帧结束、GPU 走完该帧之前不可复用
    pub fn free_deferred(&mut self, handle: GfxDescriptorHandle, count: u32) {
        debug_assert_eq!(handle.heap, self.heap);
        self.stale.push_back(StaleAllocation { offset: handle.index, size: count, frame: self.current_frame });
    }

    pub fn set_current_frame(&mut self, frame: u64) {
        self.current_frame = frame;
    }

    /// 归还所有 `frame <= completed_frame` 的 stale 块
    pub fn release_stale_descriptors(&mut self, completed_frame: u64) {
        while let Some(front) = self.stale.front() {
            if front.frame > completed_frame {
                break;
            }
            let stale = self.stale.pop_front().unwrap();
            self.add_free_block(stale.offset, stale.size);
        }
    }

    /// 插入空闲块并与左右相邻块合并
    fn add_free_block(&mut self, mut offset: u32, mut size: u32) {
        // 左邻：prev_offset + prev_size == offset
        if let Some((&prev_offset, &prev_size)) = self.free_by_offset.range(..offset).next_back() {
            if prev_offset + prev_size == offset {
                self.remove_free_block(prev_offset, prev_size);
                offset = prev_offset;
                size += prev_size;
            }
        }
        // 右邻：offset + size == next_offset
        if let Some(&next_size) = self.free_by_offset.get(&(offset + size)) {
            self.remove_free_block(offset + size, next_size);
            size += next_size;
        }
        self.insert_free_block(offset, size);
    }

    fn insert_free_block(&mut self, offset: u32, size: u32) {
        self.free_by_offset.insert(offset, size);
        self.free_by_size.entry(size).or_default().insert(offset);
        self.free_handle_count += size;
    }

    fn remove_free_block(&mut self, offset: u32, size: u32) {
        self.free_by_offset.remove(&offset);
        let offsets = self.free_by_size.get_mut(&size).unwrap();
        offsets.remove(&offset);
        if offsets.is_empty() {
            self.free_by_size.remove(&size);
        }
        self.free_handle_count -= size;
    }
}
