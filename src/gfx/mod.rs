//! 图形后端模块
//!
//! 本模块封装了不同图形 API 的底层实现：
//! - Vulkan：显式 API，基于 vulkano（动态渲染，无 RenderPass 对象）
//! - OpenGL：即时 API，基于 wgpu 的 GL 后端
//!
//! 两个后端都实现了统一的 `BackendDevice` trait，由 cargo feature 决定是否编译。

pub mod backend;
pub mod gpu;
pub mod types;
#[cfg(feature = "vulkan")]
pub mod vulkan;
#[cfg(feature = "opengl")]
pub mod opengl;

pub use backend::{
    validate_surface_handle, BackendDevice, CommandBuffer, Drawable, Framebuffer, NativeDevice,
    SurfaceHandle,
};
pub use gpu::{select_gpu, GpuType};
pub use types::{
    Color, ColorAttachmentDesc, CommandQueueType, DepthAttachmentDesc, Extent, LoadAction,
    PrimitiveType, RenderPassDesc, RenderPipelineDesc, RenderTargetDesc, ScissorRect,
    StoreAction, TextureFormat, Viewport,
};
#[cfg(feature = "vulkan")]
pub use vulkan::VulkanDevice;
#[cfg(feature = "opengl")]
pub use opengl::GlDevice;
