//! 错误处理模块
//!
//! 定义了渲染器中使用的统一错误类型。
//!
//! # 错误分类
//!
//! - 初始化阶段的错误（表面、设备、着色器、配置）全部是致命错误，不做重试
//! - 运行阶段只有 [`GraphicsError::DrawableUnavailable`] 是瞬时错误，
//!   帧驱动会跳过当前帧并在下一帧重新获取；其余错误会终止主循环

use std::fmt;

/// 统一的 Result 类型
pub type Result<T> = std::result::Result<T, TriRenderError>;

/// 渲染器的错误类型
#[derive(Debug)]
pub enum TriRenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// 窗口表面错误
    Surface(SurfaceError),

    /// IO 错误
    Io(std::io::Error),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备或上下文创建失败
    DeviceCreation(String),

    /// 没有可用的独立或集成显卡
    NoSuitableGpu,

    /// 交换链错误
    SwapchainError(String),

    /// 获取可呈现图像失败（致命）
    DrawableAcquisition(String),

    /// 可呈现图像暂时不可用（交换链过期或丢失），下一帧重试
    DrawableUnavailable(String),

    /// 着色器编译失败
    ShaderCompilation(String),

    /// 附件格式不受支持
    UnsupportedFormat(String),

    /// 资源创建失败
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),
}

/// 窗口表面相关的错误
#[derive(Debug)]
pub enum SurfaceError {
    /// 窗口或事件循环创建失败
    Creation(String),

    /// 原生窗口句柄无效
    InvalidHandle(String),

    /// 窗口销毁失败
    Teardown(String),
}

impl GraphicsError {
    /// 是否为可在下一帧恢复的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphicsError::DrawableUnavailable(_))
    }
}

impl TriRenderError {
    /// 是否为可在下一帧恢复的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, TriRenderError::Graphics(e) if e.is_transient())
    }
}

impl fmt::Display for TriRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            TriRenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            TriRenderError::Surface(e) => write!(f, "Surface error: {}", e),
            TriRenderError::Io(e) => write!(f, "IO error: {}", e),
            TriRenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            TriRenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::NoSuitableGpu => write!(f, "No discrete or integrated GPU found"),
            GraphicsError::SwapchainError(msg) => write!(f, "Swapchain error: {}", msg),
            GraphicsError::DrawableAcquisition(msg) => write!(f, "Failed to acquire drawable: {}", msg),
            GraphicsError::DrawableUnavailable(msg) => write!(f, "Drawable temporarily unavailable: {}", msg),
            GraphicsError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            GraphicsError::UnsupportedFormat(msg) => write!(f, "Unsupported attachment format: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
        }
    }
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::Creation(msg) => write!(f, "Surface creation failed: {}", msg),
            SurfaceError::InvalidHandle(msg) => write!(f, "Invalid surface handle: {}", msg),
            SurfaceError::Teardown(msg) => write!(f, "Surface teardown failed: {}", msg),
        }
    }
}

impl std::error::Error for TriRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TriRenderError::Config(e) => Some(e),
            TriRenderError::Graphics(e) => Some(e),
            TriRenderError::Surface(e) => Some(e),
            TriRenderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}
impl std::error::Error for SurfaceError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for TriRenderError {
    fn from(err: std::io::Error) -> Self {
        TriRenderError::Io(err)
    }
}

impl From<ConfigError> for TriRenderError {
    fn from(err: ConfigError) -> Self {
        TriRenderError::Config(err)
    }
}

impl From<GraphicsError> for TriRenderError {
    fn from(err: GraphicsError) -> Self {
        TriRenderError::Graphics(err)
    }
}

impl From<SurfaceError> for TriRenderError {
    fn from(err: SurfaceError) -> Self {
        TriRenderError::Surface(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_drawable_is_transient() {
        let err: TriRenderError = GraphicsError::DrawableUnavailable("out of date".into()).into();
        assert!(err.is_transient());

        let err: TriRenderError = GraphicsError::DrawableAcquisition("device lost".into()).into();
        assert!(!err.is_transient());

        let err = TriRenderError::Runtime("boom".into());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err: TriRenderError = ConfigError::InvalidValue {
            field: "window.width".into(),
            reason: "must be greater than 0".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value for 'window.width': must be greater than 0"
        );

        let err: TriRenderError = GraphicsError::NoSuitableGpu.into();
        assert_eq!(err.to_string(), "Graphics error: No discrete or integrated GPU found");

        let err: TriRenderError = SurfaceError::Teardown("window busy".into()).into();
        assert_eq!(err.to_string(), "Surface error: Surface teardown failed: window busy");
    }
}
