//! 管线注册表
//!
//! 按名字存放 PSO。pass 在构造时注册自己的根签名和管线，录制时
//! recorder 按名字取。

use std::collections::HashMap;
use std::rc::Rc;

use basalt_gfx::pipeline::pipeline_state::GfxPipelineState;

#[derive(Default)]
pub struct PipelineRegistry {
    pipelines: HashMap<String, Rc<GfxPipelineState>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pipeline: GfxPipelineState) -> Rc<GfxPipelineState> {
        let pipeline = Rc::new(pipeline);
        let prev = self.pipelines.insert(pipeline.name().to_string(), pipeline.clone());
        debug_assert!(prev.is_none(), "pipeline `{}` registered twice", pipeline.name());
        pipeline
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Rc<GfxPipelineState>> {
        self.pipelines.get(name)
    }
}
