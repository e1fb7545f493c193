//! Vulkan 命令录制与帧资源
//!
//! drawable 是交换链中的一张图像加上它的获取 future；帧缓冲只持有颜色附件的
//! 图像视图。命令直接录制到 `AutoCommandBufferBuilder`，提交时由设备构建并执行。

use std::sync::Arc;

use tracing::{trace, warn};
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, PrimaryAutoCommandBuffer, RenderingAttachmentInfo, RenderingInfo,
};
use vulkano::device::Queue;
use vulkano::format::ClearValue;
use vulkano::image::view::ImageView;
use vulkano::instance::debug::DebugUtilsLabel;
use vulkano::pipeline::graphics::viewport::{Scissor, Viewport as VkViewport};
use vulkano::pipeline::GraphicsPipeline;
use vulkano::render_pass::{AttachmentLoadOp, AttachmentStoreOp};
use vulkano::swapchain::{Swapchain, SwapchainAcquireFuture};

use crate::core::error::{GraphicsError, Result, TriRenderError};
use crate::gfx::{
    Color, CommandBuffer, CommandQueueType, Drawable, Extent, Framebuffer, LoadAction,
    PrimitiveType, RenderPassDesc, ScissorRect, StoreAction, TextureFormat, Viewport,
};

/// 命令队列
///
/// 设备只创建一个图形队列，所有类型的命令队列共享它。
pub struct VulkanQueue {
    pub(super) queue: Arc<Queue>,
    queue_type: CommandQueueType,
}

impl VulkanQueue {
    pub(super) fn new(queue: Arc<Queue>, queue_type: CommandQueueType) -> Self {
        Self { queue, queue_type }
    }

    pub fn queue_type(&self) -> CommandQueueType {
        self.queue_type
    }
}

/// 交换链图像
pub struct VulkanDrawable {
    pub(super) image_index: u32,
    pub(super) view: Arc<ImageView>,
    pub(super) swapchain: Arc<Swapchain>,
    pub(super) acquire_future: SwapchainAcquireFuture,
    extent: Extent,
    format: TextureFormat,
}

impl VulkanDrawable {
    pub(super) fn new(
        image_index: u32,
        view: Arc<ImageView>,
        swapchain: Arc<Swapchain>,
        acquire_future: SwapchainAcquireFuture,
        extent: Extent,
        format: TextureFormat,
    ) -> Self {
        Self {
            image_index,
            view,
            swapchain,
            acquire_future,
            extent,
            format,
        }
    }
}

impl Drawable for VulkanDrawable {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

/// 颜色附件绑定
pub struct VulkanFramebuffer {
    view: Arc<ImageView>,
    extent: Extent,
    format: TextureFormat,
}

impl VulkanFramebuffer {
    pub(super) fn new(drawable: &VulkanDrawable) -> Self {
        Self {
            view: drawable.view.clone(),
            extent: drawable.extent,
            format: drawable.format,
        }
    }
}

impl Framebuffer for VulkanFramebuffer {
    type Drawable = VulkanDrawable;

    fn color_attachment_extent(&self) -> Extent {
        self.extent
    }

    fn color_attachment_format(&self) -> TextureFormat {
        self.format
    }

    fn update_drawable(&mut self, drawable: &VulkanDrawable) -> Result<()> {
        if drawable.extent != self.extent {
            return Err(TriRenderError::Graphics(GraphicsError::ResourceCreation(format!(
                "Cannot rebind {} framebuffer to {} drawable",
                self.extent, drawable.extent
            ))));
        }
        self.view = drawable.view.clone();
        self.format = drawable.format;
        Ok(())
    }
}

/// 一帧的命令录制
pub struct VulkanCommandBuffer {
    pub(super) builder: AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    pub(super) drawable: Option<VulkanDrawable>,
    debug_labels: bool,
    open_labels: u32,
}

impl VulkanCommandBuffer {
    pub(super) fn new(builder: AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>, debug_labels: bool) -> Self {
        Self {
            builder,
            drawable: None,
            debug_labels,
            open_labels: 0,
        }
    }
}

fn command_error(what: &str, e: impl std::fmt::Debug) -> TriRenderError {
    TriRenderError::Graphics(GraphicsError::CommandExecution(format!("{}: {:?}", what, e)))
}

fn load_op(action: LoadAction) -> AttachmentLoadOp {
    match action {
        LoadAction::DontCare => AttachmentLoadOp::DontCare,
        LoadAction::Load => AttachmentLoadOp::Load,
        LoadAction::Clear => AttachmentLoadOp::Clear,
    }
}

fn store_op(action: StoreAction) -> AttachmentStoreOp {
    match action {
        StoreAction::DontCare => AttachmentStoreOp::DontCare,
        StoreAction::Store => AttachmentStoreOp::Store,
    }
}

impl CommandBuffer for VulkanCommandBuffer {
    type Drawable = VulkanDrawable;
    type Framebuffer = VulkanFramebuffer;
    type Pipeline = Arc<GraphicsPipeline>;

    fn begin_render_pass(&mut self, desc: &RenderPassDesc, framebuffer: &VulkanFramebuffer) -> Result<()> {
        let clear_value = match desc.color.load_action {
            LoadAction::Clear => Some(ClearValue::Float(desc.color.clear_color.into())),
            _ => None,
        };

        self.builder
            .begin_rendering(RenderingInfo {
                color_attachments: vec![Some(RenderingAttachmentInfo {
                    load_op: load_op(desc.color.load_action),
                    store_op: store_op(desc.color.store_action),
                    clear_value,
                    ..RenderingAttachmentInfo::image_view(framebuffer.view.clone())
                })],
                ..Default::default()
            })
            .map_err(|e| command_error("Failed to begin rendering", e))?;
        Ok(())
    }

    fn bind_render_pipeline(&mut self, pipeline: &Arc<GraphicsPipeline>) -> Result<()> {
        self.builder
            .bind_pipeline_graphics(pipeline.clone())
            .map_err(|e| command_error("Failed to bind pipeline", e))?;
        Ok(())
    }

    fn bind_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let viewport = VkViewport {
            offset: [viewport.x, viewport.y],
            extent: [viewport.width, viewport.height],
            depth_range: viewport.min_depth..=viewport.max_depth,
        };
        self.builder
            .set_viewport(0, [viewport].into_iter().collect())
            .map_err(|e| command_error("Failed to set viewport", e))?;
        Ok(())
    }

    fn bind_scissor_rect(&mut self, rect: ScissorRect) -> Result<()> {
        let scissor = Scissor {
            offset: [rect.x, rect.y],
            extent: [rect.width, rect.height],
        };
        self.builder
            .set_scissor(0, [scissor].into_iter().collect())
            .map_err(|e| command_error("Failed to set scissor", e))?;
        Ok(())
    }

    fn push_debug_group(&mut self, label: &str, color: Color) {
        if !self.debug_labels {
            return;
        }

        let result = self.builder.begin_debug_utils_label(DebugUtilsLabel {
            label_name: label.to_string(),
            color: color.into(),
            ..Default::default()
        });
        match result {
            Ok(_) => self.open_labels += 1,
            Err(e) => warn!("Failed to begin debug label '{}': {:?}", label, e),
        }
    }

    fn pop_debug_group(&mut self) {
        if self.open_labels == 0 {
            return;
        }

        // 只结束本命令缓冲中打开的标签
        if let Err(e) = unsafe { self.builder.end_debug_utils_label() } {
            warn!("Failed to end debug label: {:?}", e);
        }
        self.open_labels -= 1;
    }

    fn draw(&mut self, primitive: PrimitiveType, vertex_start: u32, vertex_count: u32) -> Result<()> {
        // 管线的输入装配固定为三角形列表
        let PrimitiveType::Triangle = primitive;
        self.builder
            .draw(vertex_count, 1, vertex_start, 0)
            .map_err(|e| command_error("Failed to record draw", e))?;
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.builder
            .end_rendering()
            .map_err(|e| command_error("Failed to end rendering", e))?;
        Ok(())
    }

    fn present(&mut self, drawable: VulkanDrawable) {
        trace!(image_index = drawable.image_index, "Drawable scheduled for present");
        self.drawable = Some(drawable);
    }
}
