//! TriRender - 单三角形渲染程序
//!
//! 读取可选的 `config.toml`，按其中的 `graphics.backend` 选择 Vulkan 或 OpenGL 后端，
//! 在窗口中持续绘制一个三角形，直到窗口关闭或按下 Escape。
//!
//! # 使用方法
//!
//! ```bash
//! # 使用默认配置（Vulkan，800x600）
//! cargo run
//!
//! # 使用 OpenGL：在 config.toml 中设置
//! # [graphics]
//! # backend = "opengl"
//! ```
//!
//! 正常退出返回 0，任何致命错误返回 1。

use anyhow::Context;
use tracing::{error, info};

use tri_render::core::{log, Config};

fn main() {
    if let Err(e) = try_main() {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// # 初始化流程
///
/// 1. 加载配置文件（config.toml，不存在时使用默认值）
/// 2. 验证配置
/// 3. 初始化日志系统
/// 4. 创建窗口和后端设备，运行主循环
fn try_main() -> anyhow::Result<()> {
    // 1. 加载配置（在初始化日志之前）
    let config = Config::load_or_default("config.toml").context("Failed to load config.toml")?;

    // 2. 验证配置
    config.validate().context("Invalid configuration")?;

    // 3. 初始化日志系统（使用配置中的设置）
    let log_file = if config.logging.file_output {
        Some(config.logging.log_file.as_str())
    } else {
        None
    };
    log::init_logger(config.logging.level, config.logging.file_output, log_file);
    info!(version = env!("CARGO_PKG_VERSION"), "TriRender starting...");

    info!(
        backend = config.graphics.backend.name(),
        width = config.window.width,
        height = config.window.height,
        "Graphics configuration"
    );

    // 4. 运行直到窗口关闭
    tri_render::app::run(&config)
        .with_context(|| format!("{} renderer failed", config.graphics.backend.name()))?;

    info!("TriRender exited cleanly");
    Ok(())
}
