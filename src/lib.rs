//! TriRender - 单三角形帧生命周期管理器
//!
//! 在一个与图形 API 无关的后端抽象之上，驱动一个窗口中一个彩色三角形的完整帧生命周期：
//! 设备初始化、帧缓冲和管线的惰性创建、每帧录制与呈现、窗口尺寸变化、有序关闭。
//! 同一份帧逻辑可以驱动显式后端（Vulkan）和即时后端（OpenGL）。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理、事件系统、后端选择）
//! - `gfx`: 图形后端抽象层及 Vulkan / OpenGL 实现
//! - `renderer`: 帧缓冲缓存、管线缓存和帧驱动
//! - `window`: 窗口表面
//! - `app`: 应用主循环
//!
//! # 使用示例
//!
//! ```no_run
//! use tri_render::core::event::*;
//!
//! // 创建窗口调整大小事件
//! let mut event = WindowResizeEvent::new(1920, 1080);
//!
//! // 创建事件分发器
//! let mut dispatcher = EventDispatcher::new(&mut event);
//!
//! // 分发事件
//! dispatcher.dispatch(EventType::WindowResize, |e| {
//!     println!("窗口调整为: {}", e.detail());
//!     true
//! });
//! ```

pub mod core;
pub mod gfx;
pub mod renderer;
pub mod window;
pub mod app;

#[cfg(test)]
mod testing;
