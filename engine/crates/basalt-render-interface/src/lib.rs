//! 渲染器各层共享的基础类型：资源句柄、帧计数器、帧级配置。

pub mod frame_counter;
pub mod handles;
pub mod pipeline_settings;
