//! Vulkan 图形后端实现
//!
//! 显式 API：交换链、图像视图和帧同步都由本模块手动管理。
//! 渲染使用动态渲染（`khr_dynamic_rendering` / Vulkan 1.3），因此帧缓冲
//! 只是一个颜色附件视图的绑定，不需要 RenderPass 或 Framebuffer 对象。
//!
//! # 主要组件
//!
//! - `VulkanDevice`：实例、设备、队列、交换链和帧同步
//! - `VulkanCommandBuffer`：基于 `AutoCommandBufferBuilder` 的一次性命令录制
//! - `shaders`：编译期由 vulkano_shaders 生成的 SPIR-V

mod commands;
mod device;
mod shaders;

pub use commands::{VulkanCommandBuffer, VulkanDrawable, VulkanFramebuffer, VulkanQueue};
pub use device::VulkanDevice;

use vulkano::device::physical::PhysicalDeviceType;
use vulkano::format::Format;

use crate::gfx::{GpuType, TextureFormat};

/// 后端无关格式 → Vulkan 格式
pub(crate) fn vk_format(format: TextureFormat) -> Format {
    match format {
        TextureFormat::Bgra8Unorm => Format::B8G8R8A8_UNORM,
        TextureFormat::Bgra8UnormSrgb => Format::B8G8R8A8_SRGB,
        TextureFormat::Rgba8Unorm => Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8UnormSrgb => Format::R8G8B8A8_SRGB,
        TextureFormat::Rgb10A2Unorm => Format::A2B10G10R10_UNORM_PACK32,
        TextureFormat::Rgba16Float => Format::R16G16B16A16_SFLOAT,
        TextureFormat::Depth32Float => Format::D32_SFLOAT,
    }
}

/// Vulkan 格式 → 后端无关格式，不认识的格式返回 `None`
pub(crate) fn texture_format(format: Format) -> Option<TextureFormat> {
    match format {
        Format::B8G8R8A8_UNORM => Some(TextureFormat::Bgra8Unorm),
        Format::B8G8R8A8_SRGB => Some(TextureFormat::Bgra8UnormSrgb),
        Format::R8G8B8A8_UNORM => Some(TextureFormat::Rgba8Unorm),
        Format::R8G8B8A8_SRGB => Some(TextureFormat::Rgba8UnormSrgb),
        Format::A2B10G10R10_UNORM_PACK32 => Some(TextureFormat::Rgb10A2Unorm),
        Format::R16G16B16A16_SFLOAT => Some(TextureFormat::Rgba16Float),
        Format::D32_SFLOAT => Some(TextureFormat::Depth32Float),
        _ => None,
    }
}

pub(crate) fn gpu_type(device_type: PhysicalDeviceType) -> GpuType {
    match device_type {
        PhysicalDeviceType::DiscreteGpu => GpuType::Discrete,
        PhysicalDeviceType::IntegratedGpu => GpuType::Integrated,
        PhysicalDeviceType::VirtualGpu => GpuType::Virtual,
        PhysicalDeviceType::Cpu => GpuType::Cpu,
        _ => GpuType::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mapping_is_reversible() {
        let formats = [
            TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Rgb10A2Unorm,
            TextureFormat::Rgba16Float,
            TextureFormat::Depth32Float,
        ];
        for format in formats {
            assert_eq!(texture_format(vk_format(format)), Some(format));
        }
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert_eq!(texture_format(Format::R8_UNORM), None);
    }

    #[test]
    fn test_gpu_type_mapping() {
        assert_eq!(gpu_type(PhysicalDeviceType::DiscreteGpu), GpuType::Discrete);
        assert_eq!(gpu_type(PhysicalDeviceType::IntegratedGpu), GpuType::Integrated);
        assert_eq!(gpu_type(PhysicalDeviceType::Other), GpuType::Other);
    }
}
