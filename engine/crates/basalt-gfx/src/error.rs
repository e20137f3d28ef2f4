//! 错误分类
//!
//! 区分两类错误：
//!
//! - **硬错误**（配置期写错的代码）：未知的 register、描述符表越界、
//!   根签名超出堆容量等。通过 `GfxError` 一路 `?` 到应用边界，
//!   由边界决定终止进程。
//! - **软条件**：描述符池分配失败返回空的 `GfxDescriptorAllocation`，
//!   不是错误，调用方应当增长后备池。

use basalt_render_interface::handles::GfxResourceHandle;

use crate::pipeline::root_signature::GfxRegisterKind;

#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    /// 根签名中找不到请求的 (register, space)
    #[error("root signature `{root_signature}` has no {kind:?} at register {register}, space {space}")]
    UnknownRegister {
        root_signature: String,
        kind: GfxRegisterKind,
        register: u32,
        space: u32,
    },

    /// 同一个 (register, space) 在根签名中声明了两次
    #[error("root signature `{root_signature}` declares {kind:?} register {register}, space {space} twice")]
    DuplicateRegister {
        root_signature: String,
        kind: GfxRegisterKind,
        register: u32,
        space: u32,
    },

    /// 根参数索引越界，或参数不是描述符表
    #[error("root parameter {index} is invalid: {reason}")]
    InvalidRootParameter { index: u32, reason: &'static str },

    /// 暂存的描述符数量超过了描述符表的容量
    #[error("staging {requested} descriptors at offset {offset} overflows table of root parameter {param} (capacity {capacity})")]
    DescriptorTableOverflow {
        param: u32,
        offset: u32,
        requested: u32,
        capacity: u32,
    },

    /// 根签名的描述符表总量超过了动态堆的单页容量
    #[error("root signature `{root_signature}` needs {required} descriptors per commit, dynamic heap page holds {capacity}")]
    RootSignatureTooLarge {
        root_signature: String,
        required: u32,
        capacity: u32,
    },

    /// 上传分配超过了上传缓冲的单页大小
    #[error("upload allocation of {size} bytes exceeds upload page size {page_size}")]
    UploadAllocationTooLarge { size: u64, page_size: u64 },

    /// 句柄指向的资源已销毁或从未存在
    #[error("resource handle {0:?} is not alive")]
    ResourceNotAlive(GfxResourceHandle),
}
