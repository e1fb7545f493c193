//! 窗口表面
//!
//! `SurfaceProvider` 是主循环与窗口系统之间的接口：它报告表面尺寸，
//! 把原生窗口事件翻译成 `core::event` 中的事件，并在最后销毁窗口。
//! 真实实现基于 winit，测试中可以替换为脚本化的假表面。

mod surface;

pub use surface::WindowSurface;

use crate::core::error::Result;
use crate::core::event::Event;
use crate::gfx::Extent;

/// 可呈现的窗口表面
pub trait SurfaceProvider {
    /// 当前表面尺寸（像素）
    fn extent(&self) -> Extent;

    /// 非阻塞地取出自上次调用以来的所有窗口事件
    fn poll_events(&mut self) -> Vec<Box<dyn Event>>;

    /// 窗口系统或应用是否已要求关闭
    fn should_close(&self) -> bool;

    fn request_close(&mut self);

    /// 销毁窗口，必须在设备释放之后调用
    fn destroy(self) -> Result<()>;
}
