//! 图的构建与编译
//!
//! 编译分四步：
//!
//! 1. 按声明顺序推导依赖边（写后读 / 写后写 / 别名写的读后写），
//!    叠加显式声明的边；
//! 2. 迭代 DFS 拓扑排序，栈上回边即环，报 [`RgGraphError`]；
//! 3. 松弛出层号：layer(v) = max(layer(u) + 1)，无前驱为 0；
//! 4. 逐层扫描得到全局执行顺序（层内保持声明顺序），同时给每个
//!    pass 编队列内下标、记同队列前驱，并做跨队列同步剪除。
//!
//! 同步剪除利用传递可达：pass 从同队列前驱继承一份"各队列已确认
//! 完成到哪个下标"的覆盖表，先按队列把原始依赖折叠成最新一个，
//! 再按全局顺序从后往前贪心，凡是已被覆盖表（含已保留同步点的
//! 覆盖表）盖住的依赖全部丢弃。

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;

use basalt_gfx::basic::resource_state::GfxResourceStates;
use basalt_gfx::commands::queue::GfxQueueKind;
use basalt_render_interface::handles::GfxResourceHandle;

use crate::error::RgGraphError;
use crate::node::{RgPassHandle, RgPassNode, RgResourceAccess};

const QUEUE_COUNT: usize = GfxQueueKind::ALL.len();

/// 编译后的单个 pass
pub struct RgCompiledNode {
    pub name: String,
    pub queue: GfxQueueKind,
    pub accesses: Vec<RgResourceAccess>,
    /// 依赖层号，无前驱为 0
    pub layer: u32,
    /// 全局执行顺序中的下标
    pub global_index: usize,
    /// 所在队列的提交顺序下标
    pub queue_local_index: usize,
    /// 同队列的前一个 pass
    pub queue_predecessor: Option<RgPassHandle>,
    /// 剪除后保留的跨队列同步点：执行前必须等这些 pass 完成
    pub syncs: Vec<RgPassHandle>,
}

/// 编译结果
pub struct RgCompiledGraph {
    nodes: Vec<RgCompiledNode>,
    execution_order: Vec<RgPassHandle>,
}

impl RgCompiledGraph {
    #[inline]
    pub fn node(&self, handle: RgPassHandle) -> &RgCompiledNode {
        &self.nodes[handle.0]
    }

    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = (RgPassHandle, &RgCompiledNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (RgPassHandle(i), n))
    }

    #[inline]
    pub fn execution_order(&self) -> &[RgPassHandle] {
        &self.execution_order
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 打出执行计划，调试用
    pub fn log_execution_plan(&self) {
        log::debug!("execution plan ({} passes):", self.nodes.len());
        for &handle in &self.execution_order {
            let node = self.node(handle);
            let syncs = node.syncs.iter().map(|&s| self.node(s).name.as_str()).join(", ");
            log::debug!(
                "  [{}] L{} {}#{} `{}`{}",
                node.global_index,
                node.layer,
                node.queue,
                node.queue_local_index,
                node.name,
                if syncs.is_empty() { String::new() } else { format!(" waits on [{}]", syncs) },
            );
        }
    }
}

/// 单个 pass 的声明构建器
pub struct RgPassBuilder<'a> {
    graph: &'a mut RgGraphBuilder,
    index: usize,
}

impl RgPassBuilder<'_> {
    fn access(self, resource: GfxResourceHandle, state: GfxResourceStates, aliased: bool) -> Self {
        self.graph.nodes[self.index].accesses.push(RgResourceAccess { resource, state, aliased });
        self
    }

    /// 以只读状态访问资源
    pub fn read(self, resource: GfxResourceHandle, state: GfxResourceStates) -> Self {
        debug_assert!(!state.is_write(), "read access declared with a write state");
        self.access(resource, state, false)
    }

    /// 以可写状态访问资源
    pub fn write(self, resource: GfxResourceHandle, state: GfxResourceStates) -> Self {
        debug_assert!(state.is_write(), "write access declared with a read-only state");
        self.access(resource, state, false)
    }

    /// 写一块与此前读方存在内存别名的资源（placed resource 复用）。
    /// 与普通写的区别：对别名内存上所有更早的读方产生执行依赖。
    pub fn write_aliased(self, resource: GfxResourceHandle, state: GfxResourceStates) -> Self {
        debug_assert!(state.is_write());
        self.access(resource, state, true)
    }

    pub fn finish(self) -> RgPassHandle {
        RgPassHandle(self.index)
    }
}

/// 帧图构建器，每帧重新构建
#[derive(Default)]
pub struct RgGraphBuilder {
    nodes: Vec<RgPassNode>,
    /// 显式声明的依赖边 (from, to)
    explicit_edges: Vec<(usize, usize)>,
}

// 声明
impl RgGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pass(&mut self, name: impl Into<String>, queue: GfxQueueKind) -> RgPassBuilder<'_> {
        let index = self.nodes.len();
        self.nodes.push(RgPassNode { name: name.into(), queue, accesses: Vec::new() });
        RgPassBuilder { graph: self, index }
    }

    /// 显式依赖：`to` 必须在 `from` 之后执行。用于资源访问表达
    /// 不了的顺序约束（比如 query 回读）。
    ///
    /// 注意：读方与读方之间不推导边。两个队列以不同状态读同一个
    /// 资源时，状态转换谁先谁后没有保证，必须靠数据依赖或这里的
    /// 显式边排序。
    pub fn add_dependency(&mut self, from: RgPassHandle, to: RgPassHandle) {
        debug_assert_ne!(from, to);
        self.explicit_edges.push((from.0, to.0));
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.nodes.len()
    }
}

// 编译
impl RgGraphBuilder {
    pub fn compile(self) -> Result<RgCompiledGraph, RgGraphError> {
        let n = self.nodes.len();
        let adjacency = self.derive_edges();
        let topo_order = self.topo_sort(&adjacency)?;

        // 层号松弛
        let mut layer = vec![0u32; n];
        for &u in &topo_order {
            for &v in &adjacency[u] {
                layer[v] = layer[v].max(layer[u] + 1);
            }
        }

        // 逐层扫描：层内保持声明顺序
        let mut exec: Vec<usize> = (0..n).collect();
        exec.sort_by_key(|&v| (layer[v], v));

        // 队列内下标与同队列前驱
        let mut global_index = vec![0usize; n];
        let mut queue_local = vec![0usize; n];
        let mut queue_predecessor: Vec<Option<usize>> = vec![None; n];
        let mut last_on_queue: [Option<usize>; QUEUE_COUNT] = [None; QUEUE_COUNT];
        for (g, &v) in exec.iter().enumerate() {
            let q = self.nodes[v].queue.index();
            global_index[v] = g;
            queue_local[v] = last_on_queue[q].map_or(0, |p| queue_local[p] + 1);
            queue_predecessor[v] = last_on_queue[q];
            last_on_queue[q] = Some(v);
        }

        // 原始跨队列依赖
        let mut raw_syncs: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (u, targets) in adjacency.iter().enumerate() {
            for &v in targets {
                if self.nodes[u].queue != self.nodes[v].queue {
                    raw_syncs[v].push(u);
                }
            }
        }

        // 同步剪除。reach[v][q]: v 完成时队列 q 上保证已完成的
        // 最大队列内下标（-1 表示没有保证）。
        let mut reach = vec![[-1i64; QUEUE_COUNT]; n];
        let mut syncs: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &v in &exec {
            let qv = self.nodes[v].queue.index();
            let mut covered = queue_predecessor[v].map_or([-1i64; QUEUE_COUNT], |p| reach[p]);

            // 每个队列只留全局顺序最靠后的那个依赖
            let mut latest: [Option<usize>; QUEUE_COUNT] = [None; QUEUE_COUNT];
            for &u in &raw_syncs[v] {
                let qu = self.nodes[u].queue.index();
                if latest[qu].is_none_or(|cur| global_index[u] > global_index[cur]) {
                    latest[qu] = Some(u);
                }
            }

            // 从后往前贪心：靠后的依赖传递覆盖面最大
            let mut candidates: Vec<usize> = latest.iter().flatten().copied().collect();
            candidates.sort_by_key(|&u| std::cmp::Reverse(global_index[u]));
            for u in candidates {
                let qu = self.nodes[u].queue.index();
                if (queue_local[u] as i64) <= covered[qu] {
                    continue;
                }
                syncs[v].push(u);
                for q in 0..QUEUE_COUNT {
                    covered[q] = covered[q].max(reach[u][q]);
                }
                covered[qu] = covered[qu].max(queue_local[u] as i64);
            }
            covered[qv] = queue_local[v] as i64;
            reach[v] = covered;
        }

        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(v, node)| RgCompiledNode {
                name: node.name,
                queue: node.queue,
                accesses: node.accesses,
                layer: layer[v],
                global_index: global_index[v],
                queue_local_index: queue_local[v],
                queue_predecessor: queue_predecessor[v].map(RgPassHandle),
                syncs: syncs[v].iter().copied().map(RgPassHandle).collect(),
            })
            .collect();

        Ok(RgCompiledGraph { nodes, execution_order: exec.into_iter().map(RgPassHandle).collect() })
    }

    /// 按声明顺序推导依赖边，返回去重后的邻接表
    fn derive_edges(&self) -> Vec<Vec<usize>> {
        let n = self.nodes.len();
        let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        // 每个资源最近一次写的 pass，以及该写之后的全部读方
        let mut last_writer: HashMap<GfxResourceHandle, usize> = HashMap::new();
        let mut readers_since_write: HashMap<GfxResourceHandle, Vec<usize>> = HashMap::new();

        for (v, node) in self.nodes.iter().enumerate() {
            for access in &node.accesses {
                let resource = access.resource;
                if access.is_write() {
                    // 写后写
                    if let Some(&u) = last_writer.get(&resource) {
                        if u != v {
                            adjacency[u].insert(v);
                        }
                    }
                    // 别名写对更早的读方也成边（读后写）
                    if access.aliased {
                        for &u in readers_since_write.get(&resource).map_or(&[][..], |r| r) {
                            if u != v {
                                adjacency[u].insert(v);
                            }
                        }
                    }
                    last_writer.insert(resource, v);
                    readers_since_write.insert(resource, Vec::new());
                } else {
                    // 写后读
                    if let Some(&u) = last_writer.get(&resource) {
                        if u != v {
                            adjacency[u].insert(v);
                        }
                    }
                    readers_since_write.entry(resource).or_default().push(v);
                }
            }
        }

        for &(u, v) in &self.explicit_edges {
            if u != v {
                adjacency[u].insert(v);
            }
        }
        adjacency.into_iter().map(|set| set.into_iter().collect()).collect()
    }

    /// 迭代 DFS 拓扑排序；发现栈上回边即报环
    fn topo_sort(&self, adjacency: &[Vec<usize>]) -> Result<Vec<usize>, RgGraphError> {
        const UNVISITED: u8 = 0;
        const ON_STACK: u8 = 1;
        const DONE: u8 = 2;

        let n = self.nodes.len();
        let mut state = vec![UNVISITED; n];
        let mut post_order = Vec::with_capacity(n);

        for root in 0..n {
            if state[root] != UNVISITED {
                continue;
            }
            state[root] = ON_STACK;
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(frame) = stack.last_mut() {
                let v = frame.0;
                if frame.1 < adjacency[v].len() {
                    let w = adjacency[v][frame.1];
                    frame.1 += 1;
                    match state[w] {
                        UNVISITED => {
                            state[w] = ON_STACK;
                            stack.push((w, 0));
                        }
                        ON_STACK => {
                            // 回边，抽出栈上的环路径
                            let pos = stack.iter().position(|&(x, _)| x == w).unwrap();
                            let mut passes: Vec<String> =
                                stack[pos..].iter().map(|&(x, _)| self.nodes[x].name.clone()).collect();
                            passes.push(self.nodes[w].name.clone());
                            return Err(RgGraphError::CyclicDependency { passes });
                        }
                        _ => {}
                    }
                } else {
                    state[v] = DONE;
                    post_order.push(v);
                    stack.pop();
                }
            }
        }
        post_order.reverse();
        Ok(post_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_gfx::foundation::device::GfxDevice;
    use basalt_gfx::resources::resource::GfxResourceDesc;

    fn make_resources(count: usize) -> (GfxDevice, Vec<GfxResourceHandle>) {
        let device = GfxDevice::new();
        let handles = (0..count)
            .map(|i| device.create_resource(GfxResourceDesc::buffer(format!("r{}", i), 64)))
            .collect();
        (device, handles)
    }

    #[test]
    fn test_write_read_chain_layers() {
        let (_device, r) = make_resources(2);
        let mut builder = RgGraphBuilder::new();
        let a = builder
            .add_pass("a", GfxQueueKind::Direct)
            .write(r[0], GfxResourceStates::RENDER_TARGET)
            .finish();
        let b = builder
            .add_pass("b", GfxQueueKind::Direct)
            .read(r[0], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .write(r[1], GfxResourceStates::RENDER_TARGET)
            .finish();
        let c = builder
            .add_pass("c", GfxQueueKind::Direct)
            .read(r[1], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .finish();

        let graph = builder.compile().unwrap();
        assert_eq!(graph.node(a).layer, 0);
        assert_eq!(graph.node(b).layer, 1);
        assert_eq!(graph.node(c).layer, 2);
        // 同队列靠提交顺序保序，不需要同步点
        assert!(graph.node(b).syncs.is_empty());
        assert!(graph.node(c).syncs.is_empty());
        assert_eq!(graph.node(b).queue_predecessor, Some(a));
        assert_eq!(graph.node(c).queue_predecessor, Some(b));
    }

    #[test]
    fn test_cross_queue_chain_gets_minimal_syncs() {
        let (_device, r) = make_resources(2);
        let mut builder = RgGraphBuilder::new();
        let a = builder
            .add_pass("a", GfxQueueKind::Direct)
            .write(r[0], GfxResourceStates::RENDER_TARGET)
            .finish();
        let b = builder
            .add_pass("b", GfxQueueKind::Compute)
            .read(r[0], GfxResourceStates::NON_PIXEL_SHADER_RESOURCE)
            .write(r[1], GfxResourceStates::UNORDERED_ACCESS)
            .finish();
        let c = builder
            .add_pass("c", GfxQueueKind::Direct)
            .read(r[1], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .finish();

        let graph = builder.compile().unwrap();
        assert_eq!(graph.node(b).syncs, vec![a]);
        // c 等 b 即可，b 已经等过 a
        assert_eq!(graph.node(c).syncs, vec![b]);
        assert_eq!(graph.node(b).queue_local_index, 0);
        assert_eq!(graph.node(c).queue_local_index, 1);
    }

    #[test]
    fn test_redundant_sync_culled_via_same_queue_predecessor() {
        // d(direct) 依赖 a(compute) 和 b(compute)，b 又在 a 之后：
        // d 只需要等 b；e(direct) 同样依赖 a 和 b，和 d 同层且声明
        // 在后，同队列前驱 d 已经等过 b（覆盖 a、b），e 一个同步点
        // 都不要。
        let (_device, r) = make_resources(3);
        let mut builder = RgGraphBuilder::new();
        let _a = builder
            .add_pass("a", GfxQueueKind::Compute)
            .write(r[0], GfxResourceStates::UNORDERED_ACCESS)
            .finish();
        let b = builder
            .add_pass("b", GfxQueueKind::Compute)
            .read(r[0], GfxResourceStates::NON_PIXEL_SHADER_RESOURCE)
            .write(r[1], GfxResourceStates::UNORDERED_ACCESS)
            .finish();
        let d = builder
            .add_pass("d", GfxQueueKind::Direct)
            .read(r[0], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .read(r[1], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .finish();
        let e = builder
            .add_pass("e", GfxQueueKind::Direct)
            .read(r[0], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .read(r[1], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .finish();

        let graph = builder.compile().unwrap();
        assert_eq!(graph.node(d).layer, graph.node(e).layer);
        assert_eq!(graph.node(d).syncs, vec![b]);
        assert!(graph.node(e).syncs.is_empty());
        assert_eq!(graph.node(e).queue_predecessor, Some(d));
    }

    #[test]
    fn test_war_edge_only_for_aliased_write() {
        let (_device, r) = make_resources(2);

        // 普通写不依赖此前的读方
        let mut builder = RgGraphBuilder::new();
        builder
            .add_pass("reader", GfxQueueKind::Direct)
            .read(r[0], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .finish();
        let w = builder
            .add_pass("writer", GfxQueueKind::Direct)
            .write(r[0], GfxResourceStates::RENDER_TARGET)
            .finish();
        let graph = builder.compile().unwrap();
        assert_eq!(graph.node(w).layer, 0);

        // 别名写必须排在读方之后
        let mut builder = RgGraphBuilder::new();
        builder
            .add_pass("reader", GfxQueueKind::Direct)
            .read(r[1], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .finish();
        let w = builder
            .add_pass("writer", GfxQueueKind::Direct)
            .write_aliased(r[1], GfxResourceStates::RENDER_TARGET)
            .finish();
        let graph = builder.compile().unwrap();
        assert_eq!(graph.node(w).layer, 1);
    }

    #[test]
    fn test_cycle_is_reported() {
        let (_device, r) = make_resources(1);
        let mut builder = RgGraphBuilder::new();
        let a = builder
            .add_pass("a", GfxQueueKind::Direct)
            .write(r[0], GfxResourceStates::RENDER_TARGET)
            .finish();
        let b = builder
            .add_pass("b", GfxQueueKind::Direct)
            .read(r[0], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .finish();
        builder.add_dependency(b, a);

        match builder.compile() {
            Err(RgGraphError::CyclicDependency { passes }) => {
                assert!(passes.len() >= 2);
                assert!(passes.contains(&"a".to_string()));
                assert!(passes.contains(&"b".to_string()));
            }
            _ => panic!("expected cycle error"),
        }
    }

    #[test]
    fn test_execution_order_is_topological() {
        let (_device, r) = make_resources(4);
        let mut builder = RgGraphBuilder::new();
        let a = builder
            .add_pass("a", GfxQueueKind::Direct)
            .write(r[0], GfxResourceStates::RENDER_TARGET)
            .finish();
        let b = builder
            .add_pass("b", GfxQueueKind::Compute)
            .write(r[1], GfxResourceStates::UNORDERED_ACCESS)
            .finish();
        let c = builder
            .add_pass("c", GfxQueueKind::Direct)
            .read(r[0], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .read(r[1], GfxResourceStates::PIXEL_SHADER_RESOURCE)
            .write(r[2], GfxResourceStates::RENDER_TARGET)
            .finish();

        let graph = builder.compile().unwrap();
        let pos = |h: RgPassHandle| graph.node(h).global_index;
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(c));
        // 无依赖的 a、b 同层，层内保持声明顺序
        assert_eq!(graph.node(a).layer, graph.node(b).layer);
        assert!(pos(a) < pos(b));
    }

    /// 随机 DAG 上验证：剪除后保留的同步点加上同队列保序，仍然
    /// 覆盖每一条跨队列依赖；且保留的同步点互不冗余。
    #[test]
    fn test_sync_culling_preserves_all_dependencies() {
        use rand::prelude::*;
        let _ = env_logger::builder().is_test(true).try_init();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let n = rng.gen_range(2..24);
            let mut builder = RgGraphBuilder::new();
            let mut handles = Vec::with_capacity(n);
            for i in 0..n {
                let queue = GfxQueueKind::from_index(rng.gen_range(0..3));
                handles.push(builder.add_pass(format!("p{}", i), queue).finish());
            }
            // 只生成声明顺序向前的边，保证无环
            let mut edges = Vec::new();
            for v in 1..n {
                for u in 0..v {
                    if rng.gen_bool(0.25) {
                        builder.add_dependency(handles[u], handles[v]);
                        edges.push((u, v));
                    }
                }
            }

            let graph = builder.compile().unwrap();

            // happens-before 闭包：同队列前驱 + 保留同步点
            let mut hb = vec![0u64; n];
            for &handle in graph.execution_order() {
                let node = graph.node(handle);
                let mut set = 0u64;
                if let Some(p) = node.queue_predecessor {
                    set |= hb[p.index()] | (1 << p.index());
                }
                for &s in &node.syncs {
                    set |= hb[s.index()] | (1 << s.index());
                }
                hb[handle.index()] = set;
            }

            for &(u, v) in &edges {
                if graph.node(handles[u]).queue != graph.node(handles[v]).queue {
                    assert!(
                        hb[v] & (1 << u) != 0,
                        "cross-queue dependency p{} -> p{} not covered",
                        u,
                        v
                    );
                }
            }

            // 任一保留的同步点都不被其余覆盖来源盖住
            for &handle in graph.execution_order() {
                let node = graph.node(handle);
                for (i, &s) in node.syncs.iter().enumerate() {
                    let mut set = 0u64;
                    if let Some(p) = node.queue_predecessor {
                        set |= hb[p.index()] | (1 << p.index());
                    }
                    for (j, &other) in node.syncs.iter().enumerate() {
                        if i != j {
                            set |= hb[other.index()] | (1 << other.index());
                        }
                    }
                    assert!(
                        set & (1 << s.index()) == 0,
                        "sync on `{}` kept by `{}` is redundant",
                        graph.node(s).name,
                        node.name
                    );
                }
            }
        }
    }
}
