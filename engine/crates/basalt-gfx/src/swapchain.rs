//! 交换链
//!
//! 虚拟交换链：一组后备缓冲纹理加一个轮转下标。present 只做
//! 轮转，不产生真实显示；后备缓冲在 present 前必须处于 PRESENT
//! 状态，这一点由执行状态校验兜底。

use basalt_render_interface::handles::GfxResourceHandle;
use basalt_render_interface::pipeline_settings::{Extent2D, GfxFormat};

use crate::foundation::device::GfxDevice;
use crate::resources::resource::{GfxClearValue, GfxResourceDesc, GfxTextureFlags};

pub struct GfxSwapchain {
    device: GfxDevice,
    extent: Extent2D,
    format: GfxFormat,
    back_buffers: Vec<GfxResourceHandle>,
    current_index: usize,
}

// new & init
impl GfxSwapchain {
    pub fn new(device: GfxDevice, extent: Extent2D, format: GfxFormat, buffer_count: usize) -> Self {
        debug_assert!(buffer_count >= 2);
        let back_buffers = Self::create_back_buffers(&device, extent, format, buffer_count);
        Self { device, extent, format, back_buffers, current_index: 0 }
    }

    fn create_back_buffers(
        device: &GfxDevice,
        extent: Extent2D,
        format: GfxFormat,
        buffer_count: usize,
    ) -> Vec<GfxResourceHandle> {
        (0..buffer_count)
            .map(|i| {
                device.create_resource(GfxResourceDesc::texture_2d(
                    format!("backbuffer-{}", i),
                    extent,
                    format,
                    GfxTextureFlags::RENDER_TARGET,
                    Some(GfxClearValue::Color(glam::Vec4::ZERO)),
                ))
            })
            .collect()
    }
}

// getters
impl GfxSwapchain {
    #[inline]
    pub fn extent(&self) -> Extent2D {
        self.extent
    }
    #[inline]
    pub fn format(&self) -> GfxFormat {
        self.format
    }
    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.back_buffers.len()
    }
    #[inline]
    pub fn back_buffers(&self) -> &[GfxResourceHandle] {
        &self.back_buffers
    }
    #[inline]
    pub fn current_back_buffer(&self) -> GfxResourceHandle {
        self.back_buffers[self.current_index]
    }
    #[inline]
    pub fn current_index(&self) -> usize {
        self.current_index
    }
}

// present & resize
impl GfxSwapchain {
    /// 轮转到下一张后备缓冲
    pub fn present(&mut self) {
        self.current_index = (self.current_index + 1) % self.back_buffers.len();
    }

    /// 重建后备缓冲，返回被销毁的旧句柄，调用方负责解除状态追踪。
    /// 调用前必须保证 GPU 空闲。
    pub fn resize(&mut self, extent: Extent2D) -> Vec<GfxResourceHandle> {
        let buffer_count = self.back_buffers.len();
        let old = std::mem::replace(
            &mut self.back_buffers,
            Self::create_back_buffers(&self.device, extent, self.format, buffer_count),
        );
        for &handle in &old {
            self.device.destroy_resource(handle);
        }
        self.extent = extent;
        self.current_index = 0;
        log::info!("swapchain resized to {}x{}", extent.width, extent.height);
        old
    }
}
