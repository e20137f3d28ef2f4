//! GPU 资源句柄定义
//!
//! 使用 SlotMap 的代际 key 作为轻量级句柄，物理资源统一存放在
//! `GfxDevice` 的资源池中。句柄失效后访问会得到 `None`，而不是悬垂引用。

slotmap::new_key_type! {
    /// GPU 资源（Buffer 或 Texture）的句柄
    pub struct GfxResourceHandle;
}

slotmap::new_key_type! {
    /// 描述符堆的句柄
    pub struct GfxHeapHandle;
}
