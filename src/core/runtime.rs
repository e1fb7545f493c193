//! 后端选择记录
//!
//! 每个进程只允许初始化一个后端设备。启动时通过 [`select_backend`] 记录选择，
//! 第二次选择会返回错误。

use std::fmt;
use std::sync::OnceLock;

use super::error::{Result, TriRenderError};

/// 图形 API 类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// 显式 API：设备、队列、交换链均需手动管理（Vulkan）
    Explicit,
    /// 即时 API：状态绑定在上下文上（OpenGL）
    Immediate,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Explicit => write!(f, "explicit"),
            BackendKind::Immediate => write!(f, "immediate"),
        }
    }
}

static SELECTED_BACKEND: OnceLock<BackendKind> = OnceLock::new();

/// 记录本进程使用的后端，只能成功调用一次
pub fn select_backend(kind: BackendKind) -> Result<()> {
    SELECTED_BACKEND.set(kind).map_err(|_| {
        TriRenderError::Initialization(format!(
            "backend already selected ({}), refusing to select {}",
            selected_backend().map_or_else(|| "unknown".to_string(), |k| k.to_string()),
            kind
        ))
    })
}

/// 已选择的后端
pub fn selected_backend() -> Option<BackendKind> {
    SELECTED_BACKEND.get().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    // 全局状态在整个测试进程中共享，因此只在这一个测试中写入
    #[test]
    fn test_backend_can_only_be_selected_once() {
        assert!(select_backend(BackendKind::Explicit).is_ok());
        assert_eq!(selected_backend(), Some(BackendKind::Explicit));

        assert!(select_backend(BackendKind::Immediate).is_err());
        assert_eq!(selected_backend(), Some(BackendKind::Explicit));
    }
}
