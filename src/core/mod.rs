//! 核心功能模块
//!
//! 本模块提供与图形 API 无关的基础功能：日志系统、配置管理、错误处理、
//! 事件系统以及进程级的后端选择记录。
//!
//! # 模块组织
//!
//! - `log`：日志系统，提供结构化的日志记录功能
//! - `config`：配置管理，支持从配置文件加载窗口、后端和日志设置
//! - `error`：错误处理，定义统一的错误类型
//! - `event`：事件系统，窗口事件与同步事件队列
//! - `runtime`：后端选择记录，保证每个进程只初始化一个后端

pub mod log;
pub mod config;
pub mod error;
pub mod event;
pub mod runtime;

// 重新导出常用类型，方便使用
pub use error::{Result, TriRenderError, ConfigError, GraphicsError, SurfaceError};
pub use config::{Config, GraphicsBackend};
pub use event::{
    Event, EventType, EventDispatcher, EventQueue,
    WindowResizeEvent, WindowCloseEvent,
    KeyboardEvent, KeyCode,
};
pub use runtime::BackendKind;
