//! Vulkan 设备
//!
//! # 初始化流程
//!
//! 1. 加载 Vulkan 库并创建实例（包含窗口表面所需的实例扩展）
//! 2. 从窗口创建表面
//! 3. 选择物理设备（独立显卡优先）和支持呈现的图形队列族
//! 4. 创建逻辑设备，开启交换链扩展和动态渲染
//! 5. 创建交换链及其图像视图

use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use vulkano::command_buffer::allocator::{
    StandardCommandBufferAllocator, StandardCommandBufferAllocatorCreateInfo,
};
use vulkano::command_buffer::{AutoCommandBufferBuilder, CommandBufferUsage};
use vulkano::device::physical::PhysicalDevice;
use vulkano::device::{
    Device, DeviceCreateInfo, DeviceExtensions, Features, Queue, QueueCreateInfo, QueueFlags,
};
use vulkano::format::FormatFeatures;
use vulkano::image::view::ImageView;
use vulkano::image::{Image, ImageUsage};
use vulkano::instance::{Instance, InstanceCreateFlags, InstanceCreateInfo};
use vulkano::pipeline::graphics::color_blend::{ColorBlendAttachmentState, ColorBlendState};
use vulkano::pipeline::graphics::depth_stencil::DepthStencilState;
use vulkano::pipeline::graphics::input_assembly::InputAssemblyState;
use vulkano::pipeline::graphics::multisample::MultisampleState;
use vulkano::pipeline::graphics::rasterization::RasterizationState;
use vulkano::pipeline::graphics::subpass::PipelineRenderingCreateInfo;
use vulkano::pipeline::graphics::vertex_input::VertexInputState;
use vulkano::pipeline::graphics::viewport::ViewportState;
use vulkano::pipeline::graphics::GraphicsPipelineCreateInfo;
use vulkano::pipeline::layout::PipelineDescriptorSetLayoutCreateInfo;
use vulkano::pipeline::{
    DynamicState, GraphicsPipeline, PipelineLayout, PipelineShaderStageCreateInfo,
};
use vulkano::swapchain::{
    acquire_next_image, Surface, Swapchain, SwapchainCreateInfo, SwapchainPresentInfo,
};
use vulkano::sync::{self, GpuFuture};
use vulkano::{Validated, Version, VulkanError, VulkanLibrary};

use super::commands::{VulkanCommandBuffer, VulkanDrawable, VulkanFramebuffer, VulkanQueue};
use super::{gpu_type, shaders, texture_format, vk_format};
use crate::core::error::{GraphicsError, Result, SurfaceError, TriRenderError};
use crate::core::runtime::BackendKind;
use crate::gfx::{
    select_gpu, BackendDevice, CommandQueueType, Extent, NativeDevice, RenderPipelineDesc,
    SurfaceHandle, TextureFormat,
};

fn graphics_error(error: GraphicsError) -> TriRenderError {
    TriRenderError::Graphics(error)
}

/// Vulkan 图形后端
///
/// 字段按释放顺序排列：先等待帧同步，再释放交换链资源，最后释放设备和实例。
pub struct VulkanDevice {
    /// 上一帧提交的 future，用于帧间同步
    previous_frame_end: Option<Box<dyn GpuFuture>>,
    image_views: Vec<Arc<ImageView>>,
    swapchain: Arc<Swapchain>,
    swapchain_extent: Extent,
    swapchain_format: TextureFormat,
    /// 交换链过期或次优，下次获取前需要重建
    swapchain_stale: bool,
    command_buffer_allocator: StandardCommandBufferAllocator,
    queue: Arc<Queue>,
    device: Arc<Device>,
    /// 表面和实例必须比交换链活得更久
    #[allow(dead_code)]
    surface: Arc<Surface>,
    #[allow(dead_code)]
    instance: Arc<Instance>,
    debug_labels: bool,
}

impl VulkanDevice {
    fn create_instance(window: &SurfaceHandle) -> Result<(Arc<Instance>, bool)> {
        let library = VulkanLibrary::new().map_err(|e| {
            graphics_error(GraphicsError::DeviceCreation(format!(
                "Failed to load Vulkan library: {:?}",
                e
            )))
        })?;

        let mut enabled_extensions = Surface::required_extensions(&**window);
        let debug_labels = cfg!(debug_assertions) && library.supported_extensions().ext_debug_utils;
        enabled_extensions.ext_debug_utils = debug_labels;

        let instance = Instance::new(
            library,
            InstanceCreateInfo {
                flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
                enabled_extensions,
                ..Default::default()
            },
        )
        .map_err(|e| {
            graphics_error(GraphicsError::DeviceCreation(format!(
                "Failed to create Vulkan instance: {:?}",
                e
            )))
        })?;

        debug!(debug_labels, "Vulkan instance created");
        Ok((instance, debug_labels))
    }

    /// 选择物理设备和图形队列族
    fn pick_physical_device(
        instance: &Arc<Instance>,
        surface: &Arc<Surface>,
        device_extensions: &DeviceExtensions,
    ) -> Result<(Arc<PhysicalDevice>, u32)> {
        let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
            graphics_error(GraphicsError::DeviceCreation(format!(
                "Failed to enumerate physical devices: {:?}",
                e
            )))
        })?;

        let candidates = physical_devices
            .filter(|p| {
                p.api_version() >= Version::V1_3 || p.supported_extensions().khr_dynamic_rendering
            })
            .filter(|p| p.supported_extensions().contains(device_extensions))
            .filter_map(|p| {
                let family = p
                    .queue_family_properties()
                    .iter()
                    .enumerate()
                    .position(|(i, q)| {
                        q.queue_flags.intersects(QueueFlags::GRAPHICS)
                            && p.surface_support(i as u32, surface).unwrap_or(false)
                    })?;
                let kind = gpu_type(p.properties().device_type);
                Some(((p, family as u32), kind))
            })
            .collect::<Vec<_>>();

        trace!(candidates = candidates.len(), "Physical devices enumerated");
        select_gpu(candidates).ok_or(graphics_error(GraphicsError::NoSuitableGpu))
    }

    /// 创建交换链，图像格式取表面支持的第一个已知颜色格式
    fn create_swapchain(
        device: &Arc<Device>,
        surface: &Arc<Surface>,
        extent: Extent,
    ) -> Result<(Arc<Swapchain>, Vec<Arc<Image>>, TextureFormat)> {
        let physical_device = device.physical_device();
        let surface_capabilities = physical_device
            .surface_capabilities(surface, Default::default())
            .map_err(|e| {
                graphics_error(GraphicsError::SwapchainError(format!(
                    "Failed to get surface capabilities: {:?}",
                    e
                )))
            })?;

        let surface_formats = physical_device
            .surface_formats(surface, Default::default())
            .map_err(|e| {
                graphics_error(GraphicsError::SwapchainError(format!(
                    "Failed to get surface formats: {:?}",
                    e
                )))
            })?;

        let (image_format, format) = surface_formats
            .iter()
            .find_map(|(f, _)| {
                texture_format(*f)
                    .filter(|t| !t.is_depth())
                    .map(|t| (*f, t))
            })
            .ok_or_else(|| {
                graphics_error(GraphicsError::UnsupportedFormat(format!(
                    "No supported surface format among {:?}",
                    surface_formats
                )))
            })?;

        let composite_alpha = surface_capabilities
            .supported_composite_alpha
            .into_iter()
            .next()
            .ok_or_else(|| {
                graphics_error(GraphicsError::SwapchainError(
                    "No supported composite alpha modes".to_string(),
                ))
            })?;

        let (swapchain, images) = Swapchain::new(
            device.clone(),
            surface.clone(),
            SwapchainCreateInfo {
                min_image_count: surface_capabilities.min_image_count.max(2),
                image_format,
                image_extent: extent.into(),
                image_usage: ImageUsage::COLOR_ATTACHMENT,
                composite_alpha,
                ..Default::default()
            },
        )
        .map_err(|e| {
            graphics_error(GraphicsError::SwapchainError(format!(
                "Failed to create swapchain: {:?}",
                e
            )))
        })?;

        info!(
            extent = %extent,
            images = images.len(),
            format = ?format,
            "Swapchain created"
        );
        Ok((swapchain, images, format))
    }

    fn create_image_views(images: Vec<Arc<Image>>) -> Result<Vec<Arc<ImageView>>> {
        images
            .into_iter()
            .map(|image| {
                ImageView::new_default(image).map_err(|e| {
                    graphics_error(GraphicsError::ResourceCreation(format!(
                        "Failed to create swapchain image view: {:?}",
                        e
                    )))
                })
            })
            .collect()
    }

    fn reset_frame_sync(&mut self) {
        self.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
    }
}

impl NativeDevice for VulkanDevice {
    fn initialize(surface: &SurfaceHandle, extent: Extent) -> Result<Self> {
        let (instance, debug_labels) = Self::create_instance(surface)?;

        let vk_surface = Surface::from_window(instance.clone(), surface.clone())
            .map_err(|e| TriRenderError::Surface(SurfaceError::Creation(format!("{:?}", e))))?;

        let mut device_extensions = DeviceExtensions {
            khr_swapchain: true,
            ..DeviceExtensions::empty()
        };
        let (physical_device, queue_family_index) =
            Self::pick_physical_device(&instance, &vk_surface, &device_extensions)?;

        info!(
            device = %physical_device.properties().device_name,
            device_type = ?physical_device.properties().device_type,
            api_version = %physical_device.api_version(),
            "Using physical device"
        );

        // Vulkan 1.3 之前动态渲染是扩展
        if physical_device.api_version() < Version::V1_3 {
            device_extensions.khr_dynamic_rendering = true;
        }

        let (device, mut queues) = Device::new(
            physical_device,
            DeviceCreateInfo {
                enabled_extensions: device_extensions,
                enabled_features: Features {
                    dynamic_rendering: true,
                    ..Features::empty()
                },
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .map_err(|e| {
            graphics_error(GraphicsError::DeviceCreation(format!(
                "Failed to create logical device: {:?}",
                e
            )))
        })?;

        let queue = queues.next().ok_or_else(|| {
            graphics_error(GraphicsError::DeviceCreation("No queue available".to_string()))
        })?;

        let (swapchain, images, swapchain_format) =
            Self::create_swapchain(&device, &vk_surface, extent)?;
        let image_views = Self::create_image_views(images)?;

        let command_buffer_allocator = StandardCommandBufferAllocator::new(
            device.clone(),
            StandardCommandBufferAllocatorCreateInfo::default(),
        );

        info!("Vulkan device initialized");

        Ok(Self {
            previous_frame_end: Some(sync::now(device.clone()).boxed()),
            image_views,
            swapchain,
            swapchain_extent: extent,
            swapchain_format,
            swapchain_stale: false,
            command_buffer_allocator,
            queue,
            device,
            surface: vk_surface,
            instance,
            debug_labels,
        })
    }
}

impl BackendDevice for VulkanDevice {
    type Queue = VulkanQueue;
    type Drawable = VulkanDrawable;
    type Framebuffer = VulkanFramebuffer;
    type Pipeline = Arc<GraphicsPipeline>;
    type CommandBuffer = VulkanCommandBuffer;

    const KIND: BackendKind = BackendKind::Explicit;
    const NAME: &'static str = "Vulkan";

    fn create_command_queue(&mut self, queue_type: CommandQueueType) -> Result<VulkanQueue> {
        let flags = self.device.physical_device().queue_family_properties()
            [self.queue.queue_family_index() as usize]
            .queue_flags;

        // 图形队列隐含传输能力
        let supported = match queue_type {
            CommandQueueType::Graphics | CommandQueueType::Transfer => true,
            CommandQueueType::Compute => flags.intersects(QueueFlags::COMPUTE),
        };
        if !supported {
            return Err(graphics_error(GraphicsError::ResourceCreation(format!(
                "Queue family does not support {:?} commands",
                queue_type
            ))));
        }

        debug!(queue_type = ?queue_type, "Command queue created");
        Ok(VulkanQueue::new(self.queue.clone(), queue_type))
    }

    fn acquire_drawable(&mut self, extent: Extent) -> Result<VulkanDrawable> {
        if extent.is_zero_area() {
            return Err(graphics_error(GraphicsError::DrawableUnavailable(
                "surface has zero area".to_string(),
            )));
        }

        if let Some(future) = self.previous_frame_end.as_mut() {
            future.cleanup_finished();
        }

        if self.swapchain_stale || extent != self.swapchain_extent {
            self.reinit_swapchain(extent)?;
        }
        if self.swapchain_stale {
            return Err(graphics_error(GraphicsError::DrawableUnavailable(
                "swapchain could not be recreated yet".to_string(),
            )));
        }

        let (image_index, suboptimal, acquire_future) =
            match acquire_next_image(self.swapchain.clone(), None) {
                Ok(r) => r,
                Err(Validated::Error(VulkanError::OutOfDate)) => {
                    debug!("Swapchain out of date, will recreate");
                    self.swapchain_stale = true;
                    return Err(graphics_error(GraphicsError::DrawableUnavailable(
                        "swapchain out of date".to_string(),
                    )));
                }
                Err(e) => {
                    return Err(graphics_error(GraphicsError::DrawableAcquisition(format!(
                        "Failed to acquire next image: {:?}",
                        e
                    ))));
                }
            };

        if suboptimal {
            debug!("Swapchain suboptimal, will recreate next frame");
            self.swapchain_stale = true;
        }

        trace!(image_index, "Acquired swapchain image");

        let view = self
            .image_views
            .get(image_index as usize)
            .cloned()
            .ok_or_else(|| {
                graphics_error(GraphicsError::DrawableAcquisition(format!(
                    "Image index {} out of range",
                    image_index
                )))
            })?;

        Ok(VulkanDrawable::new(
            image_index,
            view,
            self.swapchain.clone(),
            acquire_future,
            self.swapchain_extent,
            self.swapchain_format,
        ))
    }

    fn reinit_swapchain(&mut self, extent: Extent) -> Result<()> {
        if extent.is_zero_area() {
            return Ok(());
        }

        let result = self.swapchain.recreate(SwapchainCreateInfo {
            image_extent: extent.into(),
            ..self.swapchain.create_info()
        });

        let (swapchain, images) = match result {
            Ok(r) => r,
            Err(Validated::ValidationError(e)) => {
                // 窗口正在调整大小时表面尺寸可能暂时不被接受
                warn!("Swapchain recreation deferred: {}", e);
                self.swapchain_stale = true;
                return Ok(());
            }
            Err(Validated::Error(e)) => {
                return Err(graphics_error(GraphicsError::SwapchainError(format!(
                    "Failed to recreate swapchain: {:?}",
                    e
                ))));
            }
        };

        self.image_views = Self::create_image_views(images)?;
        self.swapchain = swapchain;
        self.swapchain_extent = extent;
        self.swapchain_stale = false;
        self.reset_frame_sync();

        debug!(
            extent = %extent,
            images = self.image_views.len(),
            "Swapchain recreated"
        );
        Ok(())
    }

    fn create_framebuffer(&mut self, drawable: &VulkanDrawable) -> Result<VulkanFramebuffer> {
        Ok(VulkanFramebuffer::new(drawable))
    }

    fn create_render_pipeline(&mut self, desc: &RenderPipelineDesc) -> Result<Arc<GraphicsPipeline>> {
        let color_format = vk_format(desc.target.color_format);
        let depth_format = desc.target.depth_format.map(vk_format);

        let properties = self
            .device
            .physical_device()
            .format_properties(color_format)
            .map_err(|e| {
                graphics_error(GraphicsError::UnsupportedFormat(format!(
                    "Failed to query {:?}: {:?}",
                    color_format, e
                )))
            })?;
        if !properties
            .optimal_tiling_features
            .intersects(FormatFeatures::COLOR_ATTACHMENT)
        {
            return Err(graphics_error(GraphicsError::UnsupportedFormat(format!(
                "{:?} cannot be used as a color attachment",
                color_format
            ))));
        }

        let vs = shaders::vs::load(self.device.clone())
            .map_err(|e| {
                graphics_error(GraphicsError::ShaderCompilation(format!(
                    "Failed to load vertex shader: {:?}",
                    e
                )))
            })?
            .entry_point(desc.vertex_entry)
            .ok_or_else(|| {
                graphics_error(GraphicsError::ShaderCompilation(format!(
                    "Vertex entry point '{}' not found",
                    desc.vertex_entry
                )))
            })?;
        let fs = shaders::fs::load(self.device.clone())
            .map_err(|e| {
                graphics_error(GraphicsError::ShaderCompilation(format!(
                    "Failed to load fragment shader: {:?}",
                    e
                )))
            })?
            .entry_point(desc.fragment_entry)
            .ok_or_else(|| {
                graphics_error(GraphicsError::ShaderCompilation(format!(
                    "Fragment entry point '{}' not found",
                    desc.fragment_entry
                )))
            })?;

        let stages = [
            PipelineShaderStageCreateInfo::new(vs),
            PipelineShaderStageCreateInfo::new(fs),
        ];

        let layout = PipelineLayout::new(
            self.device.clone(),
            PipelineDescriptorSetLayoutCreateInfo::from_stages(&stages)
                .into_pipeline_layout_create_info(self.device.clone())
                .map_err(|e| {
                    graphics_error(GraphicsError::ResourceCreation(format!(
                        "Failed to derive pipeline layout: {:?}",
                        e
                    )))
                })?,
        )
        .map_err(|e| {
            graphics_error(GraphicsError::ResourceCreation(format!(
                "Failed to create pipeline layout: {:?}",
                e
            )))
        })?;

        let subpass = PipelineRenderingCreateInfo {
            color_attachment_formats: vec![Some(color_format)],
            depth_attachment_format: depth_format,
            ..Default::default()
        };

        let pipeline = GraphicsPipeline::new(
            self.device.clone(),
            None,
            GraphicsPipelineCreateInfo {
                stages: stages.into_iter().collect(),
                vertex_input_state: Some(VertexInputState::default()),
                input_assembly_state: Some(InputAssemblyState::default()),
                viewport_state: Some(ViewportState::default()),
                rasterization_state: Some(RasterizationState::default()),
                multisample_state: Some(MultisampleState::default()),
                color_blend_state: Some(ColorBlendState::with_attachment_states(
                    subpass.color_attachment_formats.len() as u32,
                    ColorBlendAttachmentState::default(),
                )),
                depth_stencil_state: depth_format.map(|_| DepthStencilState::default()),
                dynamic_state: [DynamicState::Viewport, DynamicState::Scissor]
                    .into_iter()
                    .collect(),
                subpass: Some(subpass.into()),
                ..GraphicsPipelineCreateInfo::layout(layout)
            },
        )
        .map_err(|e| {
            graphics_error(GraphicsError::ShaderCompilation(format!(
                "Failed to create graphics pipeline '{}': {:?}",
                desc.debug_name, e
            )))
        })?;

        debug!(name = desc.debug_name, "Graphics pipeline created");
        Ok(pipeline)
    }

    fn create_command_buffer(&mut self, queue: &VulkanQueue) -> Result<VulkanCommandBuffer> {
        let builder = AutoCommandBufferBuilder::primary(
            &self.command_buffer_allocator,
            queue.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .map_err(|e| {
            graphics_error(GraphicsError::ResourceCreation(format!(
                "Failed to create command buffer: {:?}",
                e
            )))
        })?;

        Ok(VulkanCommandBuffer::new(builder, self.debug_labels))
    }

    fn submit(&mut self, queue: &VulkanQueue, commands: VulkanCommandBuffer) -> Result<()> {
        let VulkanCommandBuffer { builder, drawable, .. } = commands;

        let drawable = drawable.ok_or_else(|| {
            graphics_error(GraphicsError::CommandExecution(
                "Command buffer submitted without a drawable".to_string(),
            ))
        })?;

        let command_buffer = builder.build().map_err(|e| {
            graphics_error(GraphicsError::CommandExecution(format!(
                "Failed to build command buffer: {:?}",
                e
            )))
        })?;

        let previous_frame = self
            .previous_frame_end
            .take()
            .unwrap_or_else(|| sync::now(self.device.clone()).boxed());

        let future = previous_frame
            .join(drawable.acquire_future)
            .then_execute(queue.queue.clone(), command_buffer)
            .map_err(|e| {
                graphics_error(GraphicsError::CommandExecution(format!(
                    "Failed to execute command buffer: {:?}",
                    e
                )))
            })?
            .then_swapchain_present(
                queue.queue.clone(),
                SwapchainPresentInfo::swapchain_image_index(drawable.swapchain, drawable.image_index),
            )
            .then_signal_fence_and_flush();

        match future {
            Ok(future) => {
                trace!("Frame presented successfully");
                self.previous_frame_end = Some(future.boxed());
                Ok(())
            }
            Err(Validated::Error(VulkanError::OutOfDate)) => {
                debug!("Flush error: swapchain out of date");
                self.swapchain_stale = true;
                self.reset_frame_sync();
                Ok(())
            }
            Err(e) => {
                self.reset_frame_sync();
                Err(graphics_error(GraphicsError::CommandExecution(format!(
                    "Failed to flush frame: {:?}",
                    e
                ))))
            }
        }
    }

    fn release(mut self) -> Result<()> {
        if let Some(mut future) = self.previous_frame_end.take() {
            future.cleanup_finished();
        }

        // 不再有其他线程访问这些队列
        unsafe { self.device.wait_idle() }.map_err(|e| {
            graphics_error(GraphicsError::CommandExecution(format!(
                "Failed to wait for device idle: {:?}",
                e
            )))
        })?;

        debug!("Vulkan device released");
        Ok(())
    }
}
