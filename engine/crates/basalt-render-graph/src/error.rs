use thiserror::Error;

#[derive(Debug, Error)]
pub enum RgGraphError {
    /// pass 声明之间出现了循环依赖
    #[error("render graph has a dependency cycle through passes: {}", passes.join(" -> "))]
    CyclicDependency { passes: Vec<String> },
}
