//! 基于 winit 的窗口表面
//!
//! 主循环由应用驱动，因此这里不使用 `EventLoop::run`，而是每帧调用一次
//! `pump_events` 非阻塞地取出积压的事件。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event as WinitEvent, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::platform::scancode::PhysicalKeyExtScancode;
use winit::window::{Window, WindowBuilder};

use super::SurfaceProvider;
use crate::core::config::WindowConfig;
use crate::core::error::{Result, SurfaceError};
use crate::core::event::{Event, KeyCode, KeyboardEvent, WindowCloseEvent, WindowResizeEvent};
use crate::gfx::{validate_surface_handle, Extent, SurfaceHandle};

/// 原生窗口及其事件循环
pub struct WindowSurface {
    window: Arc<Window>,
    event_loop: EventLoop<()>,
    close_requested: bool,
}

impl WindowSurface {
    /// 创建窗口并检查原生句柄
    pub fn create(config: &WindowConfig, title: &str) -> Result<Self> {
        let event_loop = EventLoop::new()
            .map_err(|e| SurfaceError::Creation(format!("Failed to create event loop: {}", e)))?;

        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .with_resizable(config.resizable)
            .build(&event_loop)
            .map_err(|e| SurfaceError::Creation(format!("Failed to create window: {}", e)))?;

        validate_surface_handle(&window)?;

        let size = window.inner_size();
        info!(
            title,
            width = size.width,
            height = size.height,
            "Window created"
        );

        Ok(Self {
            window: Arc::new(window),
            event_loop,
            close_requested: false,
        })
    }

    /// 交给后端创建表面的窗口句柄
    pub fn handle(&self) -> SurfaceHandle {
        self.window.clone()
    }
}

/// winit 物理按键 → 应用按键
pub(crate) fn map_key(key: PhysicalKey) -> KeyCode {
    match key {
        PhysicalKey::Code(WinitKeyCode::Escape) => KeyCode::Escape,
        other => KeyCode::Other(other.to_scancode().unwrap_or(0)),
    }
}

fn keyboard_event(event: &KeyEvent) -> KeyboardEvent {
    let key_code = map_key(event.physical_key);
    let keyboard = match event.state {
        ElementState::Pressed => KeyboardEvent::pressed(key_code),
        ElementState::Released => KeyboardEvent::released(key_code),
    };
    keyboard.with_repeat(event.repeat)
}

impl SurfaceProvider for WindowSurface {
    fn extent(&self) -> Extent {
        self.window.inner_size().into()
    }

    fn poll_events(&mut self) -> Vec<Box<dyn Event>> {
        let window_id = self.window.id();
        let mut events: Vec<Box<dyn Event>> = Vec::new();

        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _target| {
                let WinitEvent::WindowEvent { window_id: id, event } = event else {
                    return;
                };
                if id != window_id {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested => {
                        events.push(Box::new(WindowCloseEvent::new()));
                    }
                    WindowEvent::Resized(size) => {
                        events.push(Box::new(WindowResizeEvent::new(size.width, size.height)));
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        events.push(Box::new(keyboard_event(&event)));
                    }
                    _ => {}
                }
            });

        if let PumpStatus::Exit(code) = status {
            debug!(code, "Event loop exited");
            self.close_requested = true;
        }
        events
    }

    fn should_close(&self) -> bool {
        self.close_requested
    }

    fn request_close(&mut self) {
        self.close_requested = true;
    }

    fn destroy(self) -> Result<()> {
        let WindowSurface { window, event_loop, .. } = self;
        ensure_released(&window)?;
        drop(window);
        drop(event_loop);
        info!("Window destroyed");
        Ok(())
    }
}

/// 窗口只能在图形设备放开全部引用后销毁
fn ensure_released<T>(window: &Arc<T>) -> Result<()> {
    if Arc::strong_count(window) > 1 {
        return Err(SurfaceError::Teardown(
            "window is still referenced by a graphics device".to_string(),
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TriRenderError;

    #[test]
    fn test_shared_window_cannot_be_destroyed() {
        let window = Arc::new(());
        let device_ref = window.clone();
        assert!(matches!(
            ensure_released(&window),
            Err(TriRenderError::Surface(SurfaceError::Teardown(_)))
        ));

        drop(device_ref);
        assert!(ensure_released(&window).is_ok());
    }

    #[test]
    fn test_escape_maps_to_escape() {
        assert_eq!(map_key(PhysicalKey::Code(WinitKeyCode::Escape)), KeyCode::Escape);
    }

    #[test]
    fn test_other_keys_map_to_scancode() {
        assert!(matches!(
            map_key(PhysicalKey::Code(WinitKeyCode::KeyA)),
            KeyCode::Other(_)
        ));
    }
}
