//! 动态描述符堆
//!
//! D3D12 的描述符表要求 draw/dispatch 之前，表里引用的描述符必须
//! 位于当前绑定的 shader 可见堆内。做法：
//!
//! 1. `parse_root_signature` 解析描述符表布局（位图 + 各表容量）；
//! 2. `stage_descriptors` 把 CPU 侧描述符句柄暂存进对应表；
//! 3. draw/dispatch 之前 `commit_staged_descriptors` 把 stale 的表
//!    拷贝进 GPU 可见堆并下发 set_root_descriptor_table。
//!
//! GPU 可见堆从内部池里取；commit 发现剩余空间不足就换新堆，
//! 换堆意味着之前下发的所有表失效，全部表重新置 stale。

use basalt_render_interface::handles::GfxHeapHandle;

use crate::commands::command_list::GfxCommandList;
use crate::descriptors::{GfxDescriptorHandle, GfxDescriptorHeapKind};
use crate::error::GfxError;
use crate::foundation::device::GfxDevice;
use crate::pipeline::root_signature::GfxRootSignature;

/// 根参数位图是 u32，根参数最多 32 个
pub const MAX_ROOT_PARAMETERS: u32 = 32;

#[derive(Default, Clone)]
struct TableCache {
    /// 暂存区内该表的起始下标
    staging_base: u32,
    num_descriptors: u32,
}

pub struct GfxDynamicDescriptorHeap {
    device: GfxDevice,
    heap_kind: GfxDescriptorHeapKind,
    descriptors_per_heap: u32,

    /// 暂存的 CPU 侧描述符句柄，按表布局平铺
    staged: Vec<GfxDescriptorHandle>,
    tables: Vec<TableCache>,
    /// 哪些根参数是本堆种类的描述符表
    table_bitmask: u32,
    /// 哪些表暂存后还没 commit
    stale_bitmask: u32,

    /// 当前绑定的 GPU 可见堆及写入游标
    current_heap: Option<GfxHeapHandle>,
    current_offset: u32,
    /// 本帧用过的堆，reset 时归还
    used_heaps: Vec<GfxHeapHandle>,
    available_heaps: Vec<GfxHeapHandle>,
}

// new & init
impl GfxDynamicDescriptorHeap {
    pub const DEFAULT_DESCRIPTORS_PER_HEAP: u32 = 1024;

    pub fn new(device: GfxDevice, heap_kind: GfxDescriptorHeapKind, descriptors_per_heap: u32) -> Self {
        debug_assert!(heap_kind.can_be_shader_visible());
        Self {
            device,
            heap_kind,
            descriptors_per_heap,
            staged: Vec::new(),
            tables: vec![TableCache::default(); MAX_ROOT_PARAMETERS as usize],
            table_bitmask: 0,
            stale_bitmask: 0,
            current_heap: None,
            current_offset: 0,
            used_heaps: Vec::new(),
            available_heaps: Vec::new(),
        }
    }
}

// 根签名解析
impl GfxDynamicDescriptorHeap {
    /// 按根签名重建暂存区布局；换根签名后已暂存的内容作废
    pub fn parse_root_signature(&mut self, root_signature: &GfxRootSignature) -> Result<(), GfxError> {
        debug_assert!(root_signature.parameters().len() <= MAX_ROOT_PARAMETERS as usize);

        self.table_bitmask = root_signature.descriptor_table_bitmask(self.heap_kind);
        for table in &mut self.tables {
            *table = TableCache::default();
        }

        let mut staging_base = 0u32;
        let mut bitmask = self.table_bitmask;
        while bitmask != 0 {
            let param = bitmask.trailing_zeros();
            let num_descriptors = root_signature.num_descriptors_in_table(param);
            self.tables[param as usize] = TableCache { staging_base, num_descriptors };
            staging_base += num_descriptors;
            bitmask &= bitmask - 1;
        }

        if staging_base > self.descriptors_per_heap {
            return Err(GfxError::RootSignatureTooLarge {
                root_signature: root_signature.name().to_string(),
                required: staging_base,
                capacity: self.descriptors_per_heap,
            });
        }

        self.staged.clear();
        self.staged.resize(staging_base as usize, GfxDescriptorHandle::null());
        self.stale_bitmask = 0;
        Ok(())
    }
}

// 暂存与提交
impl GfxDynamicDescriptorHeap {
    /// 把一段 CPU 描述符暂存进根参数 `param` 的表，表内偏移 `offset`
    pub fn stage_descriptors(
        &mut self,
        param: u32,
        offset: u32,
        handles: &[GfxDescriptorHandle],
    ) -> Result<(), GfxError> {
        if param >= MAX_ROOT_PARAMETERS || self.table_bitmask & (1 << param) == 0 {
            return Err(GfxError::InvalidRootParameter {
                index: param,
                reason: "not a descriptor table of this heap kind",
            });
        }
        let table = &self.tables[param as usize];
        if offset + handles.len() as u32 > table.num_descriptors {
            return Err(GfxError::DescriptorTableOverflow {
                param,
                offset,
                requested: handles.len() as u32,
                capacity: table.num_descriptors,
            });
        }
        let base = (table.staging_base + offset) as usize;
        self.staged[base..base + handles.len()].copy_from_slice(handles);
        self.stale_bitmask |= 1 << param;
        Ok(())
    }

    /// 把 stale 的表写进 GPU 可见堆并绑定。draw/dispatch 前调用。
    pub fn commit_staged_descriptors(&mut self, cmd: &mut GfxCommandList, graphics: bool) {
        if self.stale_bitmask == 0 {
            return;
        }

        let needed: u32 = {
            let mut sum = 0;
            let mut bitmask = self.stale_bitmask;
            while bitmask != 0 {
                sum += self.tables[bitmask.trailing_zeros() as usize].num_descriptors;
                bitmask &= bitmask - 1;
            }
            sum
        };

        // 空间不足或还没绑过堆：换新堆，所有表重新下发
        if self.current_heap.is_none() || self.descriptors_per_heap - self.current_offset < needed {
            let heap = self.acquire_heap();
            cmd.set_descriptor_heap(heap);
            self.current_heap = Some(heap);
            self.current_offset = 0;
            self.stale_bitmask = self.table_bitmask;
        }
        let heap = self.current_heap.unwrap();

        let mut bitmask = self.stale_bitmask;
        while bitmask != 0 {
            let param = bitmask.trailing_zeros();
            let table = &self.tables[param as usize];
            // 虚拟设备不真正拷贝描述符，只要基址落在当前堆内即可
            let base = GfxDescriptorHandle::new(heap, self.current_offset);
            cmd.set_root_descriptor_table(param, base, graphics);
            self.current_offset += table.num_descriptors;
            bitmask &= bitmask - 1;
        }
        self.stale_bitmask = 0;
    }

    fn acquire_heap(&mut self) -> GfxHeapHandle {
        let heap = self.available_heaps.pop().unwrap_or_else(|| {
            self.device.create_descriptor_heap(
                self.heap_kind,
                self.descriptors_per_heap,
                true,
                format!("dynamic-heap-{:?}", self.heap_kind),
            )
        });
        self.used_heaps.push(heap);
        heap
    }

    /// 帧结束后调用：归还本帧用过的堆，清空暂存状态
    pub fn reset(&mut self) {
        self.available_heaps.append(&mut self.used_heaps);
        self.current_heap = None;
        self.current_offset = 0;
        self.stale_bitmask = 0;
        self.table_bitmask = 0;
        self.staged.clear();
        for table in &mut self.tables {
            *table = TableCache::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::command_list::GfxCommand;
    use crate::commands::queue::GfxQueueKind;
    use crate::pipeline::root_signature::{GfxRegisterKind, GfxRootParameter};

    fn root_signature() -> GfxRootSignature {
        GfxRootSignature::new(
            "test",
            vec![
                GfxRootParameter::constants(4, 0, 0),
                GfxRootParameter::descriptor_table(GfxRegisterKind::Srv, 2, 0, 0),
                GfxRootParameter::descriptor_table(GfxRegisterKind::Uav, 1, 0, 0),
            ],
        )
        .unwrap()
    }

    fn table_binds(cmd: &GfxCommandList) -> Vec<u32> {
        cmd.commands()
            .iter()
            .filter_map(|c| match c {
                GfxCommand::SetRootDescriptorTable { param, .. } => Some(*param),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_commit_binds_only_stale_tables() {
        let device = GfxDevice::new();
        let mut heap = GfxDynamicDescriptorHeap::new(device, GfxDescriptorHeapKind::CbvSrvUav, 16);
        let rs = root_signature();
        heap.parse_root_signature(&rs).unwrap();

        let mut cmd = GfxCommandList::new(GfxQueueKind::Direct, "cmd");
        heap.stage_descriptors(1, 0, &[GfxDescriptorHandle::null(), GfxDescriptorHandle::null()]).unwrap();
        heap.stage_descriptors(2, 0, &[GfxDescriptorHandle::null()]).unwrap();
        heap.commit_staged_descriptors(&mut cmd, true);
        // 首次 commit 绑新堆，全部表下发
        assert_eq!(table_binds(&cmd), vec![1, 2]);

        // 只重暂存表 2，表 1 不再下发
        let mut cmd2 = GfxCommandList::new(GfxQueueKind::Direct, "cmd2");
        heap.stage_descriptors(2, 0, &[GfxDescriptorHandle::null()]).unwrap();
        heap.commit_staged_descriptors(&mut cmd2, true);
        assert_eq!(table_binds(&cmd2), vec![2]);
    }

    #[test]
    fn test_heap_exhaustion_rebinds_all_tables() {
        let device = GfxDevice::new();
        // 堆容量 4，每次 commit 用 3 个，第二次放不下
        let mut heap = GfxDynamicDescriptorHeap::new(device, GfxDescriptorHeapKind::CbvSrvUav, 4);
        let rs = root_signature();
        heap.parse_root_signature(&rs).unwrap();

        let mut cmd = GfxCommandList::new(GfxQueueKind::Direct, "cmd");
        heap.stage_descriptors(1, 0, &[GfxDescriptorHandle::null(); 2]).unwrap();
        heap.stage_descriptors(2, 0, &[GfxDescriptorHandle::null()]).unwrap();
        heap.commit_staged_descriptors(&mut cmd, true);

        heap.stage_descriptors(1, 0, &[GfxDescriptorHandle::null(); 2]).unwrap();
        heap.stage_descriptors(2, 0, &[GfxDescriptorHandle::null()]).unwrap();
        heap.commit_staged_descriptors(&mut cmd, true);

        let heap_binds = cmd
            .commands()
            .iter()
            .filter(|c| matches!(c, GfxCommand::SetDescriptorHeap(_)))
            .count();
        assert_eq!(heap_binds, 2);
        // 两次 commit 都下发了全部表
        assert_eq!(table_binds(&cmd), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_stage_errors() {
        let device = GfxDevice::new();
        let mut heap = GfxDynamicDescriptorHeap::new(device, GfxDescriptorHeapKind::CbvSrvUav, 16);
        let rs = root_signature();
        heap.parse_root_signature(&rs).unwrap();

        // 参数 0 是根常量，不是表
        assert!(matches!(
            heap.stage_descriptors(0, 0, &[GfxDescriptorHandle::null()]),
            Err(GfxError::InvalidRootParameter { .. })
        ));
        // 表 2 容量 1，偏移 1 处再放 1 个就越界
        assert!(matches!(
            heap.stage_descriptors(2, 1, &[GfxDescriptorHandle::null()]),
            Err(GfxError::DescriptorTableOverflow { .. })
        ));
    }

    #[test]
    fn test_oversized_root_signature_rejected() {
        let device = GfxDevice::new();
        let mut heap = GfxDynamicDescriptorHeap::new(device, GfxDescriptorHeapKind::CbvSrvUav, 2);
        let rs = root_signature();
        assert!(matches!(
            heap.parse_root_signature(&rs),
            Err(GfxError::RootSignatureTooLarge { required: 3, .. })
        ));
    }
}
