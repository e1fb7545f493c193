//! OpenGL 图形后端实现
//!
//! 即时 API：通过 wgpu 的 GL 后端驱动，交换链和帧同步由驱动隐式管理。
//! 渲染通道在 wgpu 中借用编码器，不能跨越多次 trait 调用存活，
//! 因此命令先被记录下来，在 `end_render_pass` 时一次性回放。

mod commands;
mod device;

pub use commands::{GlCommandBuffer, GlDrawable, GlFramebuffer, GlQueue};
pub use device::GlDevice;

use crate::gfx::{GpuType, TextureFormat};

pub(crate) fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Rgb10A2Unorm => wgpu::TextureFormat::Rgb10a2Unorm,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

pub(crate) fn texture_format(format: wgpu::TextureFormat) -> Option<TextureFormat> {
    match format {
        wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
        wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Rgb10a2Unorm => Some(TextureFormat::Rgb10A2Unorm),
        wgpu::TextureFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
        wgpu::TextureFormat::Depth32Float => Some(TextureFormat::Depth32Float),
        _ => None,
    }
}

pub(crate) fn gpu_type(device_type: wgpu::DeviceType) -> GpuType {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => GpuType::Discrete,
        wgpu::DeviceType::IntegratedGpu => GpuType::Integrated,
        wgpu::DeviceType::VirtualGpu => GpuType::Virtual,
        wgpu::DeviceType::Cpu => GpuType::Cpu,
        wgpu::DeviceType::Other => GpuType::Other,
    }
}

/// 接受窗口层 GL 上下文暴露的第一个适配器
///
/// GL 驱动常把桌面 GPU 报告为 `Other`、软件渲染器报告为 `Cpu`，
/// 因此这里不按设备类型筛选。
pub(crate) fn select_context_adapter<T>(
    candidates: impl IntoIterator<Item = (T, GpuType)>,
) -> Option<(T, GpuType)> {
    candidates.into_iter().next()
}

/// 从表面支持的格式中选择颜色格式，sRGB 优先
pub(crate) fn choose_surface_format(
    formats: &[wgpu::TextureFormat],
) -> Option<(wgpu::TextureFormat, TextureFormat)> {
    let known = || {
        formats
            .iter()
            .filter_map(|f| texture_format(*f).filter(|t| !t.is_depth()).map(|t| (*f, t)))
    };
    known().find(|(f, _)| f.is_srgb()).or_else(|| known().next())
}
