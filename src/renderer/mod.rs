//! 帧生命周期管理
//!
//! 本模块负责与表面尺寸相关的 GPU 对象的惰性创建和重建，并驱动每帧的
//! 获取 → 录制 → 提交 → 呈现流程。它只依赖 `gfx` 中的后端 trait，
//! 因此对 Vulkan 和 OpenGL 两个后端完全相同。
//!
//! - `framebuffer`：帧缓冲缓存，尺寸变化时重建
//! - `pipeline`：管线缓存，只构建一次
//! - `frame`：帧驱动和生命周期状态机

pub mod framebuffer;
pub mod pipeline;
pub mod frame;

pub use framebuffer::FramebufferCache;
pub use pipeline::PipelineCache;
pub use frame::{FrameOutcome, Renderer, RendererState, SkipReason};
