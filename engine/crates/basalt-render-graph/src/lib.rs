//! basalt-render-graph - 帧图调度
//!
//! 输入：每个 pass 声明自己跑在哪个队列、以什么状态访问哪些
//! 资源。输出：一份编译结果，包含
//!
//! - 拓扑合法的全局执行顺序（按层推进，层内保持声明顺序）
//! - 每个 pass 的队列内下标与同队列前驱
//! - 剪除冗余后的最小跨队列同步点集合
//!
//! 依赖边完全由声明顺序推导：写后读、写后写必然成边；读后写只在
//! 写方声明为别名复用时成边。环视为调用方的 bug，编译时报错。

mod error;
mod graph;
mod node;

pub use error::RgGraphError;
pub use graph::{RgCompiledGraph, RgCompiledNode, RgGraphBuilder, RgPassBuilder};
pub use node::{RgPassHandle, RgResourceAccess};
