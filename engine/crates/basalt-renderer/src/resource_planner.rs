//! 瞬态资源规划
//!
//! pass 在 setup 阶段按名字申请渲染目标。同名资源跨帧复用；尺寸
//! 或格式变了（典型是窗口 resize）就销毁重建，并同步更新全局状态
//! 表。后备缓冲由 Renderer 在每帧开头注入。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use basalt_gfx::foundation::device::GfxDevice;
use basalt_gfx::resources::resource::{GfxClearValue, GfxResourceDesc, GfxTextureFlags};
use basalt_gfx::state_tracker::GfxGlobalResourceStateTracker;
use basalt_render_interface::handles::GfxResourceHandle;
use basalt_render_interface::pipeline_settings::{Extent2D, GfxFormat};

/// pass 在 setup / record 阶段查询帧资源的入口
pub trait FrameResourceProvider {
    /// 之前某个 pass 申请过的命名纹理
    fn find_texture(&self, name: &str) -> Option<GfxResourceHandle>;
    /// 之前某个 pass 申请过的命名 buffer
    fn find_buffer(&self, name: &str) -> Option<GfxResourceHandle>;
    /// 本帧的后备缓冲
    fn back_buffer(&self) -> GfxResourceHandle;
    fn frame_extent(&self) -> Extent2D;
}

struct TransientTexture {
    handle: GfxResourceHandle,
    extent: Extent2D,
    format: GfxFormat,
    flags: GfxTextureFlags,
}

struct TransientBuffer {
    handle: GfxResourceHandle,
    size: u64,
}

pub struct ResourcePlanner {
    device: GfxDevice,
    global_state: Rc<RefCell<GfxGlobalResourceStateTracker>>,
    textures: HashMap<String, TransientTexture>,
    buffers: HashMap<String, TransientBuffer>,
    back_buffer: GfxResourceHandle,
    extent: Extent2D,
}

// new & init
impl ResourcePlanner {
    pub fn new(device: GfxDevice, global_state: Rc<RefCell<GfxGlobalResourceStateTracker>>) -> Self {
        Self {
            device,
            global_state,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            back_buffer: GfxResourceHandle::default(),
            extent: Extent2D::default(),
        }
    }

    /// 每帧 setup 之前由 Renderer 调用
    pub fn begin_frame(&mut self, back_buffer: GfxResourceHandle, extent: Extent2D) {
        self.back_buffer = back_buffer;
        self.extent = extent;
    }
}

// 资源申请
impl ResourcePlanner {
    /// 取或建一张命名 2D 纹理；描述变化时销毁重建
    pub fn texture_2d(
        &mut self,
        name: &str,
        extent: Extent2D,
        format: GfxFormat,
        flags: GfxTextureFlags,
        clear_value: Option<GfxClearValue>,
    ) -> GfxResourceHandle {
        if let Some(existing) = self.textures.get(name) {
            if existing.extent == extent && existing.format == format && existing.flags == flags {
                return existing.handle;
            }
            log::debug!("transient texture `{}` changed, recreating", name);
            self.global_state.borrow_mut().untrack_resource(existing.handle);
            self.device.destroy_resource(existing.handle);
        }

        let desc = GfxResourceDesc::texture_2d(name, extent, format, flags, clear_value);
        let initial_state = desc.initial_state;
        let handle = self.device.create_resource(desc);
        self.global_state.borrow_mut().track_resource(handle, initial_state);
        self.textures.insert(
            name.to_string(),
            TransientTexture { handle, extent, format, flags },
        );
        handle
    }

    /// 取或建一个命名 buffer；大小变化时销毁重建
    pub fn buffer(&mut self, name: &str, size: u64) -> GfxResourceHandle {
        if let Some(existing) = self.buffers.get(name) {
            if existing.size == size {
                return existing.handle;
            }
            log::debug!("transient buffer `{}` resized, recreating", name);
            self.global_state.borrow_mut().untrack_resource(existing.handle);
            self.device.destroy_resource(existing.handle);
        }

        let desc = GfxResourceDesc::buffer(name, size);
        let initial_state = desc.initial_state;
        let handle = self.device.create_resource(desc);
        self.global_state.borrow_mut().track_resource(handle, initial_state);
        self.buffers.insert(name.to_string(), TransientBuffer { handle, size });
        handle
    }
}

impl FrameResourceProvider for ResourcePlanner {
    fn find_texture(&self, name: &str) -> Option<GfxResourceHandle> {
        self.textures.get(name).map(|t| t.handle)
    }

    fn find_buffer(&self, name: &str) -> Option<GfxResourceHandle> {
        self.buffers.get(name).map(|b| b.handle)
    }

    fn back_buffer(&self) -> GfxResourceHandle {
        self.back_buffer
    }

    fn frame_extent(&self) -> Extent2D {
        self.extent
    }
}
