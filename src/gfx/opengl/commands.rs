//! OpenGL 命令录制与帧资源
//!
//! `wgpu::RenderPass` 借用编码器和所有绑定的资源，生命周期只能在一个函数内。
//! `begin_render_pass` 到 `end_render_pass` 之间的调用先存成 `PassCommand`，
//! 结束时在一个真正的 wgpu 渲染通道里回放。

use std::ops::Range;
use std::sync::{Arc, Weak};

use tracing::{trace, warn};

use crate::core::error::{GraphicsError, Result, TriRenderError};
use crate::gfx::{
    Color, CommandBuffer, CommandQueueType, Drawable, Extent, Framebuffer, LoadAction,
    PrimitiveType, RenderPassDesc, ScissorRect, StoreAction, TextureFormat, Viewport,
};

/// 命令队列
///
/// GL 上下文只有一个隐式队列，所有命令队列共享同一个 `wgpu::Queue`。
pub struct GlQueue {
    pub(super) queue: Arc<wgpu::Queue>,
    queue_type: CommandQueueType,
}

impl GlQueue {
    pub(super) fn new(queue: Arc<wgpu::Queue>, queue_type: CommandQueueType) -> Self {
        Self { queue, queue_type }
    }

    pub fn queue_type(&self) -> CommandQueueType {
        self.queue_type
    }
}

/// 表面当前帧的纹理
pub struct GlDrawable {
    texture: wgpu::SurfaceTexture,
    view: Arc<wgpu::TextureView>,
    extent: Extent,
    format: TextureFormat,
}

impl GlDrawable {
    pub(super) fn new(texture: wgpu::SurfaceTexture, format: TextureFormat) -> Self {
        let extent = Extent::new(texture.texture.width(), texture.texture.height());
        let view = Arc::new(
            texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        );
        Self {
            texture,
            view,
            extent,
            format,
        }
    }

    /// 呈现前先释放视图，帧缓冲只持有弱引用
    pub(super) fn present(self) {
        let GlDrawable { texture, view, .. } = self;
        drop(view);
        texture.present();
    }
}

impl Drawable for GlDrawable {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

/// 颜色附件绑定
///
/// 表面纹理每帧都会更换，帧缓冲不能延长它的生命周期。
pub struct GlFramebuffer {
    view: Weak<wgpu::TextureView>,
    extent: Extent,
    format: TextureFormat,
}

impl GlFramebuffer {
    pub(super) fn new(drawable: &GlDrawable) -> Self {
        Self {
            view: Arc::downgrade(&drawable.view),
            extent: drawable.extent,
            format: drawable.format,
        }
    }
}

impl Framebuffer for GlFramebuffer {
    type Drawable = GlDrawable;

    fn color_attachment_extent(&self) -> Extent {
        self.extent
    }

    fn color_attachment_format(&self) -> TextureFormat {
        self.format
    }

    fn update_drawable(&mut self, drawable: &GlDrawable) -> Result<()> {
        if drawable.extent != self.extent {
            return Err(TriRenderError::Graphics(GraphicsError::ResourceCreation(format!(
                "Cannot rebind {} framebuffer to {} drawable",
                self.extent, drawable.extent
            ))));
        }
        self.view = Arc::downgrade(&drawable.view);
        self.format = drawable.format;
        Ok(())
    }
}

enum PassCommand {
    SetPipeline(Arc<wgpu::RenderPipeline>),
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    PushDebugGroup(String),
    PopDebugGroup,
    Draw(Range<u32>),
}

struct PendingPass {
    target: Arc<wgpu::TextureView>,
    extent: Extent,
    ops: wgpu::Operations<wgpu::Color>,
    commands: Vec<PassCommand>,
    open_groups: u32,
}

/// 一帧的命令录制
pub struct GlCommandBuffer {
    pub(super) encoder: wgpu::CommandEncoder,
    pub(super) drawable: Option<GlDrawable>,
    pass: Option<PendingPass>,
}

impl GlCommandBuffer {
    pub(super) fn new(encoder: wgpu::CommandEncoder) -> Self {
        Self {
            encoder,
            drawable: None,
            pass: None,
        }
    }

    pub(super) fn has_open_pass(&self) -> bool {
        self.pass.is_some()
    }

    fn pass_mut(&mut self) -> Result<&mut PendingPass> {
        self.pass.as_mut().ok_or_else(|| {
            TriRenderError::Graphics(GraphicsError::CommandExecution(
                "No render pass in progress".to_string(),
            ))
        })
    }
}

/// 视口限制在渲染目标内，深度范围限制在 0..1
pub(crate) fn clamp_viewport(viewport: Viewport, extent: Extent) -> Viewport {
    let width = extent.width as f32;
    let height = extent.height as f32;
    let x = viewport.x.clamp(0.0, width);
    let y = viewport.y.clamp(0.0, height);
    let min_depth = viewport.min_depth.clamp(0.0, 1.0);
    Viewport {
        x,
        y,
        width: viewport.width.clamp(0.0, width - x),
        height: viewport.height.clamp(0.0, height - y),
        min_depth,
        max_depth: viewport.max_depth.clamp(min_depth, 1.0),
    }
}

pub(crate) fn clamp_scissor(rect: ScissorRect, extent: Extent) -> ScissorRect {
    let x = rect.x.min(extent.width);
    let y = rect.y.min(extent.height);
    ScissorRect {
        x,
        y,
        width: rect.width.min(extent.width - x),
        height: rect.height.min(extent.height - y),
    }
}

fn color_ops(desc: &RenderPassDesc) -> wgpu::Operations<wgpu::Color> {
    let c = desc.color.clear_color;
    let load = match desc.color.load_action {
        LoadAction::Clear => wgpu::LoadOp::Clear(wgpu::Color {
            r: c.r as f64,
            g: c.g as f64,
            b: c.b as f64,
            a: c.a as f64,
        }),
        // wgpu 没有 DontCare，加载旧内容是安全的替代
        LoadAction::Load | LoadAction::DontCare => wgpu::LoadOp::Load,
    };
    let store = match desc.color.store_action {
        StoreAction::Store => wgpu::StoreOp::Store,
        StoreAction::DontCare => wgpu::StoreOp::Discard,
    };
    wgpu::Operations { load, store }
}

impl CommandBuffer for GlCommandBuffer {
    type Drawable = GlDrawable;
    type Framebuffer = GlFramebuffer;
    type Pipeline = Arc<wgpu::RenderPipeline>;

    fn begin_render_pass(&mut self, desc: &RenderPassDesc, framebuffer: &GlFramebuffer) -> Result<()> {
        if self.pass.is_some() {
            return Err(TriRenderError::Graphics(GraphicsError::CommandExecution(
                "Render pass already in progress".to_string(),
            )));
        }

        let target = framebuffer.view.upgrade().ok_or_else(|| {
            TriRenderError::Graphics(GraphicsError::CommandExecution(
                "Framebuffer is not bound to a live drawable".to_string(),
            ))
        })?;

        self.pass = Some(PendingPass {
            target,
            extent: framebuffer.extent,
            ops: color_ops(desc),
            commands: Vec::new(),
            open_groups: 0,
        });
        Ok(())
    }

    fn bind_render_pipeline(&mut self, pipeline: &Arc<wgpu::RenderPipeline>) -> Result<()> {
        self.pass_mut()?
            .commands
            .push(PassCommand::SetPipeline(pipeline.clone()));
        Ok(())
    }

    fn bind_viewport(&mut self, viewport: Viewport) -> Result<()> {
        let pass = self.pass_mut()?;
        let clamped = clamp_viewport(viewport, pass.extent);
        if clamped != viewport {
            trace!(?viewport, ?clamped, "Viewport clamped to render target");
        }
        pass.commands.push(PassCommand::SetViewport(clamped));
        Ok(())
    }

    fn bind_scissor_rect(&mut self, rect: ScissorRect) -> Result<()> {
        let pass = self.pass_mut()?;
        let clamped = clamp_scissor(rect, pass.extent);
        if clamped != rect {
            trace!(?rect, ?clamped, "Scissor clamped to render target");
        }
        pass.commands.push(PassCommand::SetScissor(clamped));
        Ok(())
    }

    fn push_debug_group(&mut self, label: &str, _color: Color) {
        match self.pass.as_mut() {
            Some(pass) => {
                pass.commands.push(PassCommand::PushDebugGroup(label.to_string()));
                pass.open_groups += 1;
            }
            None => self.encoder.push_debug_group(label),
        }
    }

    fn pop_debug_group(&mut self) {
        match self.pass.as_mut() {
            Some(pass) if pass.open_groups > 0 => {
                pass.commands.push(PassCommand::PopDebugGroup);
                pass.open_groups -= 1;
            }
            Some(_) => warn!("pop_debug_group without matching push"),
            None => self.encoder.pop_debug_group(),
        }
    }

    fn draw(&mut self, primitive: PrimitiveType, vertex_start: u32, vertex_count: u32) -> Result<()> {
        let PrimitiveType::Triangle = primitive;
        self.pass_mut()?
            .commands
            .push(PassCommand::Draw(vertex_start..vertex_start + vertex_count));
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        let pass = self.pass.take().ok_or_else(|| {
            TriRenderError::Graphics(GraphicsError::CommandExecution(
                "No render pass in progress".to_string(),
            ))
        })?;

        let mut render_pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Triangle Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &pass.target,
                resolve_target: None,
                ops: pass.ops,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for command in &pass.commands {
            match command {
                PassCommand::SetPipeline(pipeline) => render_pass.set_pipeline(pipeline),
                PassCommand::SetViewport(v) => {
                    render_pass.set_viewport(v.x, v.y, v.width, v.height, v.min_depth, v.max_depth)
                }
                PassCommand::SetScissor(r) => {
                    render_pass.set_scissor_rect(r.x, r.y, r.width, r.height)
                }
                PassCommand::PushDebugGroup(label) => render_pass.push_debug_group(label),
                PassCommand::PopDebugGroup => render_pass.pop_debug_group(),
                PassCommand::Draw(vertices) => render_pass.draw(vertices.clone(), 0..1),
            }
        }
        for _ in 0..pass.open_groups {
            render_pass.pop_debug_group();
        }

        trace!(commands = pass.commands.len(), "Render pass replayed");
        Ok(())
    }

    fn present(&mut self, drawable: GlDrawable) {
        self.drawable = Some(drawable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_inside_target_is_unchanged() {
        let extent = Extent::new(800, 600);
        let viewport = Viewport::from_extent(extent);
        assert_eq!(clamp_viewport(viewport, extent), viewport);
    }

    #[test]
    fn test_viewport_clamped_after_shrink() {
        let viewport = Viewport::from_extent(Extent::new(800, 600));
        let clamped = clamp_viewport(viewport, Extent::new(400, 300));
        assert_eq!(clamped, Viewport::from_extent(Extent::new(400, 300)));
    }

    #[test]
    fn test_scissor_clamped_to_target() {
        let rect = ScissorRect {
            x: 100,
            y: 50,
            width: 800,
            height: 600,
        };
        let clamped = clamp_scissor(rect, Extent::new(400, 300));
        assert_eq!(
            clamped,
            ScissorRect {
                x: 100,
                y: 50,
                width: 300,
                height: 250,
            }
        );
    }

    #[test]
    fn test_scissor_origin_outside_target() {
        let rect = ScissorRect {
            x: 500,
            y: 0,
            width: 10,
            height: 10,
        };
        let clamped = clamp_scissor(rect, Extent::new(400, 300));
        assert_eq!(clamped.x, 400);
        assert_eq!(clamped.width, 0);
    }

    #[test]
    fn test_clear_color_maps_to_load_op() {
        let ops = color_ops(&RenderPassDesc::default());
        assert_eq!(ops.load, wgpu::LoadOp::Clear(wgpu::Color::WHITE));
        assert_eq!(ops.store, wgpu::StoreOp::Store);
    }
}
