//! 资源状态定义
//!
//! 资源状态描述某个资源当前以何种方式被 GPU 使用，用于计算
//! transition barrier。空值即 COMMON，与 PRESENT 同值。

use bitflags::bitflags;

bitflags! {
    /// 资源使用状态
    ///
    /// 组合位：一个资源可以同时处于多个只读状态
    /// （例如 PIXEL_SHADER_RESOURCE | NON_PIXEL_SHADER_RESOURCE），
    /// 但写状态之间互斥，由状态跟踪器保证。
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct GfxResourceStates: u32 {
        const VERTEX_AND_CONSTANT_BUFFER = 1 << 0;
        const INDEX_BUFFER               = 1 << 1;
        const RENDER_TARGET              = 1 << 2;
        const UNORDERED_ACCESS           = 1 << 3;
        const DEPTH_WRITE                = 1 << 4;
        const DEPTH_READ                 = 1 << 5;
        const NON_PIXEL_SHADER_RESOURCE  = 1 << 6;
        const PIXEL_SHADER_RESOURCE      = 1 << 7;
        const INDIRECT_ARGUMENT          = 1 << 8;
        const COPY_DEST                  = 1 << 9;
        const COPY_SOURCE                = 1 << 10;
    }
}

// 常量定义
impl GfxResourceStates {
    /// 初始 / 空闲状态
    pub const COMMON: Self = Self::empty();

    /// 呈现状态，与 COMMON 同值
    pub const PRESENT: Self = Self::empty();

    /// 上传堆资源的固定状态
    pub const GENERIC_READ: Self = Self::VERTEX_AND_CONSTANT_BUFFER
        .union(Self::INDEX_BUFFER)
        .union(Self::NON_PIXEL_SHADER_RESOURCE)
        .union(Self::PIXEL_SHADER_RESOURCE)
        .union(Self::INDIRECT_ARGUMENT)
        .union(Self::COPY_SOURCE);

    /// 任意着色器阶段可采样
    pub const ALL_SHADER_RESOURCE: Self =
        Self::NON_PIXEL_SHADER_RESOURCE.union(Self::PIXEL_SHADER_RESOURCE);
}

// 辅助方法
impl GfxResourceStates {
    /// 写操作的状态位
    const WRITE_STATES: Self = Self::RENDER_TARGET
        .union(Self::UNORDERED_ACCESS)
        .union(Self::DEPTH_WRITE)
        .union(Self::COPY_DEST);

    /// 检查是否为写操作
    #[inline]
    pub fn is_write(&self) -> bool {
        self.intersects(Self::WRITE_STATES)
    }

    /// 检查是否为只读操作
    #[inline]
    pub fn is_read_only(&self) -> bool {
        !self.is_write()
    }
}
