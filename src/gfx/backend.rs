//! 图形后端的统一抽象接口
//!
//! 本模块定义了所有图形后端（Vulkan、OpenGL）必须实现的统一接口。
//! 帧驱动只通过这些 trait 与 GPU 交互，因此同一份帧生命周期逻辑
//! 可以驱动两种结构完全不同的 API。
//!
//! # 对象关系
//!
//! ```text
//! BackendDevice ──creates──> Queue, Framebuffer, Pipeline, CommandBuffer
//!       │
//!       └──acquire_drawable──> Drawable ──wrapped by──> Framebuffer
//!                                 │
//!                                 └──consumed by──> CommandBuffer::present
//! ```

use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::window::Window;

use crate::core::error::{Result, SurfaceError};
use crate::core::runtime::BackendKind;
use super::types::{
    Color, CommandQueueType, Extent, PrimitiveType, RenderPassDesc, RenderPipelineDesc,
    ScissorRect, TextureFormat, Viewport,
};

/// 原生窗口句柄
///
/// 后端持有窗口的一份 `Arc`，保证表面在设备释放之前一直有效。
pub type SurfaceHandle = Arc<Window>;

/// 检查窗口是否暴露了有效的原生句柄
pub fn validate_surface_handle(window: &Window) -> Result<()> {
    window
        .window_handle()
        .map_err(|e| SurfaceError::InvalidHandle(format!("window handle: {}", e)))?;
    window
        .display_handle()
        .map_err(|e| SurfaceError::InvalidHandle(format!("display handle: {}", e)))?;
    Ok(())
}

/// 表面当前可呈现的图像
///
/// 每帧获取一次，只在这一帧内有效。
pub trait Drawable {
    fn extent(&self) -> Extent;
    fn format(&self) -> TextureFormat;
}

/// 帧缓冲：渲染目标附件的绑定
pub trait Framebuffer {
    type Drawable: Drawable;

    /// 颜色附件尺寸，总是等于最近一次同步的 drawable 尺寸
    fn color_attachment_extent(&self) -> Extent;

    fn color_attachment_format(&self) -> TextureFormat;

    fn depth_attachment_format(&self) -> Option<TextureFormat> {
        None
    }

    /// 把颜色附件重新绑定到新的 drawable（尺寸必须相同）
    fn update_drawable(&mut self, drawable: &Self::Drawable) -> Result<()>;
}

/// 一次提交的命令录制
///
/// 调用顺序固定为：`begin_render_pass` → 绑定/绘制 → `end_render_pass` → `present`。
pub trait CommandBuffer {
    type Drawable: Drawable;
    type Framebuffer: Framebuffer<Drawable = Self::Drawable>;
    type Pipeline;

    fn begin_render_pass(&mut self, desc: &RenderPassDesc, framebuffer: &Self::Framebuffer) -> Result<()>;

    fn bind_render_pipeline(&mut self, pipeline: &Self::Pipeline) -> Result<()>;

    fn bind_viewport(&mut self, viewport: Viewport) -> Result<()>;

    fn bind_scissor_rect(&mut self, rect: ScissorRect) -> Result<()>;

    /// 调试标签（在 RenderDoc 等工具中可见），不支持的后端忽略
    fn push_debug_group(&mut self, label: &str, color: Color);

    fn pop_debug_group(&mut self);

    fn draw(&mut self, primitive: PrimitiveType, vertex_start: u32, vertex_count: u32) -> Result<()>;

    fn end_render_pass(&mut self) -> Result<()>;

    /// 标记 drawable 在提交后呈现
    fn present(&mut self, drawable: Self::Drawable);
}

/// 后端设备
///
/// 每个进程只创建一个。设备先于所有 drawable、帧缓冲和管线创建，
/// 并且在它们全部释放之后才释放。
pub trait BackendDevice: Sized {
    type Queue;
    type Drawable: Drawable;
    type Framebuffer: Framebuffer<Drawable = Self::Drawable>;
    type Pipeline;
    type CommandBuffer: CommandBuffer<
        Drawable = Self::Drawable,
        Framebuffer = Self::Framebuffer,
        Pipeline = Self::Pipeline,
    >;

    /// 后端所属的 API 类别
    const KIND: BackendKind;

    /// 后端名称（用于日志）
    const NAME: &'static str;

    fn create_command_queue(&mut self, queue_type: CommandQueueType) -> Result<Self::Queue>;

    /// 获取下一张可呈现图像
    ///
    /// 交换链过期时返回 `GraphicsError::DrawableUnavailable`，调用方应跳过本帧；
    /// 其余错误都是致命的。
    fn acquire_drawable(&mut self, extent: Extent) -> Result<Self::Drawable>;

    /// 按新尺寸重建交换链（只有显式后端需要）
    fn reinit_swapchain(&mut self, _extent: Extent) -> Result<()> {
        Ok(())
    }

    fn create_framebuffer(&mut self, drawable: &Self::Drawable) -> Result<Self::Framebuffer>;

    fn create_render_pipeline(&mut self, desc: &RenderPipelineDesc) -> Result<Self::Pipeline>;

    fn create_command_buffer(&mut self, queue: &Self::Queue) -> Result<Self::CommandBuffer>;

    fn submit(&mut self, queue: &Self::Queue, commands: Self::CommandBuffer) -> Result<()>;

    fn release_pipeline(&mut self, pipeline: Self::Pipeline) -> Result<()> {
        drop(pipeline);
        Ok(())
    }

    fn release_framebuffer(&mut self, framebuffer: Self::Framebuffer) -> Result<()> {
        drop(framebuffer);
        Ok(())
    }

    fn release_queue(&mut self, queue: Self::Queue) -> Result<()> {
        drop(queue);
        Ok(())
    }

    /// 等待 GPU 空闲并释放设备
    fn release(self) -> Result<()>;
}

/// 能够绑定到真实窗口的后端设备
pub trait NativeDevice: BackendDevice {
    /// 在窗口表面上创建设备
    fn initialize(surface: &SurfaceHandle, extent: Extent) -> Result<Self>;
}
