//! 配置管理模块
//!
//! 提供渲染器配置的加载、解析和校验。配置文件是可选的，
//! 文件不存在时使用默认值（800x600 窗口，Vulkan 后端）。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [window]
//! width = 800
//! height = 600
//! title = "Vulkan Triangle"   # 可省略，省略时按后端生成
//! resizable = true
//!
//! [graphics]
//! backend = "vulkan"  # 或 "opengl"
//!
//! [logging]
//! level = "info"      # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::error::{ConfigError, Result, TriRenderError};
use super::runtime::BackendKind;

/// 渲染器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 图形配置
    #[serde(default)]
    pub graphics: GraphicsConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口宽度
    #[serde(default = "default_width")]
    pub width: u32,

    /// 窗口高度
    #[serde(default = "default_height")]
    pub height: u32,

    /// 窗口标题，`None` 时使用 "<后端> Triangle"
    #[serde(default)]
    pub title: Option<String>,

    /// 是否可调整大小
    #[serde(default = "default_resizable")]
    pub resizable: bool,
}

/// 图形配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// 图形后端选择
    #[serde(default = "default_backend")]
    pub backend: GraphicsBackend,
}

/// 图形后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsBackend {
    /// Vulkan 后端（显式 API）
    Vulkan,
    /// OpenGL 后端（即时 API）
    OpenGl,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }
fn default_resizable() -> bool { true }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "tri_render.log".to_string() }

fn default_backend() -> GraphicsBackend {
    if cfg!(feature = "vulkan") {
        GraphicsBackend::Vulkan
    } else {
        GraphicsBackend::OpenGl
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            title: None,
            resizable: default_resizable(),
        }
    }
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 示例
    ///
    /// ```no_run
    /// use tri_render::core::Config;
    ///
    /// let config = Config::from_file("config.toml")?;
    /// # Ok::<(), tri_render::core::TriRenderError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TriRenderError::Config(ConfigError::FileNotFound(path_str)),
            _ => TriRenderError::Io(e),
        })?;

        Self::from_toml_str(&contents)
    }

    /// 从 TOML 文本解析配置
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 加载配置文件，文件不存在时使用默认配置
    ///
    /// 与 `from_file` 不同，文件存在但内容无效时返回解析错误，而不是静默回退。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        // 验证窗口尺寸
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "window.width/height".to_string(),
                reason: "Window dimensions must be greater than 0".to_string(),
            }.into());
        }

        if !self.graphics.backend.is_available() {
            return Err(ConfigError::InvalidValue {
                field: "graphics.backend".to_string(),
                reason: format!(
                    "{} backend is not compiled into this build",
                    self.graphics.backend.name()
                ),
            }.into());
        }

        Ok(())
    }

    /// 窗口标题，未配置时按后端生成（如 "Vulkan Triangle"）
    pub fn window_title(&self) -> String {
        self.window
            .title
            .clone()
            .unwrap_or_else(|| format!("{} Triangle", self.graphics.backend.name()))
    }
}

impl GraphicsBackend {
    /// 获取后端名称
    pub fn name(&self) -> &'static str {
        match self {
            GraphicsBackend::Vulkan => "Vulkan",
            GraphicsBackend::OpenGl => "OpenGL",
        }
    }

    /// 后端所属的 API 类别
    pub fn kind(&self) -> BackendKind {
        match self {
            GraphicsBackend::Vulkan => BackendKind::Explicit,
            GraphicsBackend::OpenGl => BackendKind::Immediate,
        }
    }

    /// 该后端是否被编译进当前构建
    pub fn is_available(&self) -> bool {
        match self {
            GraphicsBackend::Vulkan => cfg!(feature = "vulkan"),
            GraphicsBackend::OpenGl => cfg!(feature = "opengl"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert!(config.window.title.is_none());
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[cfg(feature = "vulkan")]
    #[test]
    fn test_default_backend_is_vulkan() {
        let config = Config::default();
        assert_eq!(config.graphics.backend, GraphicsBackend::Vulkan);
        assert_eq!(config.window_title(), "Vulkan Triangle");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.window.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::from_toml_str(
            r#"
            [window]
            width = 1024

            [graphics]
            backend = "opengl"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.backend, GraphicsBackend::OpenGl);
        assert_eq!(config.window_title(), "OpenGL Triangle");
        assert!(!config.logging.file_output);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = Config::from_toml_str("[graphics]\nbackend = \"dx12\"\n").unwrap_err();
        assert!(matches!(
            err,
            TriRenderError::Config(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = Config::from_file("definitely/not/here/config.toml").unwrap_err();
        assert!(matches!(err, TriRenderError::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_unreadable_file_keeps_io_error() {
        // 目录存在但不能作为文件读取
        let err = Config::from_file(std::env::temp_dir()).unwrap_err();
        assert!(matches!(err, TriRenderError::Io(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("definitely/not/here/config.toml").unwrap();
        assert_eq!(config.window.width, 800);
    }

    #[test]
    fn test_explicit_title_wins() {
        let mut config = Config::default();
        config.window.title = Some("Hello".to_string());
        assert_eq!(config.window_title(), "Hello");
    }

    #[test]
    fn test_backend_kind() {
        assert_eq!(GraphicsBackend::Vulkan.kind(), BackendKind::Explicit);
        assert_eq!(GraphicsBackend::OpenGl.kind(), BackendKind::Immediate);
    }
}
