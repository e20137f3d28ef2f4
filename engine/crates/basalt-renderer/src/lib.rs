//! basalt-renderer - 渲染编排
//!
//! 在 gfx 与 render-graph 之上把一帧组织起来：
//!
//! - **RenderContext**: 设备、三条队列、交换链、全局状态表与
//!   frames-in-flight 的每帧资源环
//! - **ResourcePlanner**: 按名字管理瞬态渲染目标，resize 时重建
//! - **Renderer**: 每帧收集 pass 声明、编译帧图、按执行计划录制
//!   提交，并插入剪除后的跨队列同步
//! - **PassContext / PassCommandRecorder**: pass 录制入口，按
//!   (register, space) 做绑定，draw/dispatch 前自动提交描述符表

pub mod error;
pub mod pass;
pub mod passes;
pub mod pipelines;
pub mod recorder;
pub mod render_context;
pub mod renderer;
pub mod resource_planner;
