//! 应用主循环
//!
//! 每次迭代：渲染一帧 → 轮询窗口事件 → 分发事件 → 检查关闭请求。
//! 退出时先关闭渲染器（释放全部 GPU 对象和设备），再销毁窗口表面。

use tracing::{error, info, trace};

use crate::core::config::{Config, GraphicsBackend};
use crate::core::error::{Result, TriRenderError};
use crate::core::event::{Event, EventQueue, EventType, KeyCode, KeyboardEvent, WindowResizeEvent};
use crate::core::runtime;
use crate::gfx::{BackendDevice, Extent, NativeDevice};
use crate::renderer::{FrameOutcome, Renderer};
use crate::window::{SurfaceProvider, WindowSurface};

/// 事件处理函数可以修改的状态
struct LoopContext<D: BackendDevice> {
    renderer: Renderer<D>,
    close_requested: bool,
    error: Option<TriRenderError>,
}

/// 一个窗口表面加一个后端设备组成的应用
pub struct App<S: SurfaceProvider, D: BackendDevice + 'static> {
    surface: S,
    events: EventQueue<LoopContext<D>>,
    ctx: LoopContext<D>,
}

impl<S: SurfaceProvider, D: BackendDevice + 'static> App<S, D> {
    /// 用已初始化的设备创建渲染器并注册窗口事件处理函数
    pub fn new(surface: S, device: D) -> Result<Self> {
        let renderer = Renderer::new(device, surface.extent())?;

        let mut events = EventQueue::new();

        events.subscribe(EventType::WindowResize, |event: &mut dyn Event, ctx: &mut LoopContext<D>| {
            let Some(resize) = event.as_any().downcast_ref::<WindowResizeEvent>() else {
                return false;
            };
            if let Err(e) = ctx.renderer.on_resize(Extent::new(resize.width, resize.height)) {
                ctx.error.get_or_insert(e);
            }
            true
        });

        events.subscribe(EventType::WindowClose, |_event: &mut dyn Event, ctx: &mut LoopContext<D>| {
            info!("Window close requested");
            ctx.close_requested = true;
            true
        });

        events.subscribe(EventType::KeyDown, |event: &mut dyn Event, ctx: &mut LoopContext<D>| {
            let escape = event
                .as_any()
                .downcast_ref::<KeyboardEvent>()
                .is_some_and(|key| key.key_code == KeyCode::Escape);
            if escape {
                info!("Escape pressed, closing");
                ctx.close_requested = true;
            }
            escape
        });

        Ok(Self {
            surface,
            events,
            ctx: LoopContext {
                renderer,
                close_requested: false,
                error: None,
            },
        })
    }

    /// 运行到窗口关闭或出现致命错误，然后按顺序释放所有资源
    ///
    /// 返回主循环中的第一个错误；主循环正常结束时返回释放过程中的第一个错误。
    pub fn run(self) -> Result<()> {
        let App {
            mut surface,
            mut events,
            mut ctx,
        } = self;

        let result = Self::main_loop(&mut surface, &mut events, &mut ctx);
        if let Err(e) = &result {
            error!(error = %e, "Main loop aborted");
        }

        let frames = ctx.renderer.frames_presented();
        let mut first_error = result.err();

        if let Err(e) = ctx.renderer.shutdown() {
            first_error.get_or_insert(e);
        }
        if let Err(e) = surface.destroy() {
            error!(error = %e, "Failed to destroy window surface");
            first_error.get_or_insert(e);
        }

        info!(frames, "Application exited");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn main_loop(
        surface: &mut S,
        events: &mut EventQueue<LoopContext<D>>,
        ctx: &mut LoopContext<D>,
    ) -> Result<()> {
        ctx.renderer.prepare()?;
        info!(backend = D::NAME, kind = %D::KIND, "Entering main loop");

        loop {
            if let FrameOutcome::Skipped(reason) = ctx.renderer.render_frame()? {
                trace!(?reason, "Frame skipped");
            }

            for event in surface.poll_events() {
                events.push(event);
            }
            events.drain(ctx);

            if let Some(e) = ctx.error.take() {
                return Err(e);
            }
            if ctx.close_requested {
                surface.request_close();
            }
            if surface.should_close() {
                return Ok(());
            }
        }
    }
}

/// 按配置选择后端并运行，直到窗口关闭
pub fn run(config: &Config) -> Result<()> {
    let backend = config.graphics.backend;
    runtime::select_backend(backend.kind())?;

    match backend {
        #[cfg(feature = "vulkan")]
        GraphicsBackend::Vulkan => run_native::<crate::gfx::VulkanDevice>(config),
        #[cfg(feature = "opengl")]
        GraphicsBackend::OpenGl => run_native::<crate::gfx::GlDevice>(config),
        #[allow(unreachable_patterns)]
        other => Err(TriRenderError::Initialization(format!(
            "{} backend is not compiled into this build",
            other.name()
        ))),
    }
}

fn run_native<D: NativeDevice + 'static>(config: &Config) -> Result<()> {
    let title = config.window_title();
    let surface = WindowSurface::create(&config.window, &title)?;
    let device = D::initialize(&surface.handle(), surface.extent())?;
    info!(backend = D::NAME, "Backend device initialized");

    App::new(surface, device)?.run()
}
