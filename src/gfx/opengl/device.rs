//! OpenGL 设备（wgpu GL 后端）

use std::borrow::Cow;
use std::sync::Arc;

use tracing::{debug, info, trace};

use super::commands::{GlCommandBuffer, GlDrawable, GlFramebuffer, GlQueue};
use super::{choose_surface_format, gpu_type, select_context_adapter, wgpu_format};
use crate::core::error::{GraphicsError, Result, SurfaceError, TriRenderError};
use crate::core::runtime::BackendKind;
use crate::gfx::{
    BackendDevice, CommandQueueType, Extent, NativeDevice, RenderPipelineDesc,
    SurfaceHandle, TextureFormat,
};

const VERTEX_SHADER: &str = include_str!("shaders/vertex.wgsl");
const FRAGMENT_SHADER: &str = include_str!("shaders/fragment.wgsl");

/// OpenGL 图形后端
pub struct GlDevice {
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    surface_format: TextureFormat,
    /// 表面尺寸已变化，下次获取前重新配置
    surface_dirty: bool,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: Arc<wgpu::Queue>,
    #[allow(dead_code)]
    instance: wgpu::Instance,
}

impl GlDevice {
    fn configure_surface(&mut self) {
        self.surface.configure(&self.device, &self.surface_config);
        self.surface_dirty = false;
        debug!(
            width = self.surface_config.width,
            height = self.surface_config.height,
            "Surface configured"
        );
    }

    fn shader_module(&self, label: &str, source: &'static str) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        })
    }
}

impl NativeDevice for GlDevice {
    fn initialize(window: &SurfaceHandle, extent: Extent) -> Result<Self> {
        info!("Initializing OpenGL backend");

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::GL,
            dx12_shader_compiler: Default::default(),
            flags: wgpu::InstanceFlags::from_build_config(),
            gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
        });

        debug!("Creating surface");
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| SurfaceError::Creation(format!("Failed to create surface: {}", e)))?;

        let candidates = instance
            .enumerate_adapters(wgpu::Backends::GL)
            .into_iter()
            .filter(|adapter| adapter.is_surface_supported(&surface))
            .map(|adapter| {
                let kind = gpu_type(adapter.get_info().device_type);
                (adapter, kind)
            });
        let (adapter, kind) = select_context_adapter(candidates).ok_or_else(|| {
            GraphicsError::DeviceCreation("No GL adapter supports the window surface".to_string())
        })?;

        info!(gpu_type = ?kind, "Selected adapter: {:?}", adapter.get_info());

        debug!("Requesting device and queue");
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Main Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
            },
            None,
        ))
        .map_err(|e| GraphicsError::DeviceCreation(format!("Failed to create device: {}", e)))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let (format, surface_format) = choose_surface_format(&surface_caps.formats).ok_or_else(|| {
            GraphicsError::UnsupportedFormat(format!(
                "No supported surface format among {:?}",
                surface_caps.formats
            ))
        })?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        debug!("Surface format: {:?}", format);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: extent.width,
            height: extent.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let mut gl = Self {
            surface,
            surface_config,
            surface_format,
            surface_dirty: true,
            adapter,
            device,
            queue: Arc::new(queue),
            instance,
        };
        if !extent.is_zero_area() {
            gl.configure_surface();
        }

        info!("OpenGL backend initialized successfully");
        Ok(gl)
    }
}

impl BackendDevice for GlDevice {
    type Queue = GlQueue;
    type Drawable = GlDrawable;
    type Framebuffer = GlFramebuffer;
    type Pipeline = Arc<wgpu::RenderPipeline>;
    type CommandBuffer = GlCommandBuffer;

    const KIND: BackendKind = BackendKind::Immediate;
    const NAME: &'static str = "OpenGL";

    fn create_command_queue(&mut self, queue_type: CommandQueueType) -> Result<GlQueue> {
        debug!(queue_type = ?queue_type, "Command queue created on shared GL queue");
        Ok(GlQueue::new(self.queue.clone(), queue_type))
    }

    fn acquire_drawable(&mut self, extent: Extent) -> Result<GlDrawable> {
        if extent.is_zero_area() {
            return Err(GraphicsError::DrawableUnavailable("surface has zero area".to_string()).into());
        }

        if self.surface_config.width != extent.width || self.surface_config.height != extent.height {
            self.surface_config.width = extent.width;
            self.surface_config.height = extent.height;
            self.surface_dirty = true;
        }
        if self.surface_dirty {
            self.configure_surface();
        }

        let texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(e @ (wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost)) => {
                debug!("Surface texture unavailable: {}", e);
                self.surface_dirty = true;
                return Err(GraphicsError::DrawableUnavailable(e.to_string()).into());
            }
            Err(e) => {
                return Err(GraphicsError::DrawableAcquisition(format!(
                    "Failed to get current texture: {}",
                    e
                ))
                .into());
            }
        };

        if texture.suboptimal {
            trace!("Surface texture suboptimal, will reconfigure");
            self.surface_dirty = true;
        }

        Ok(GlDrawable::new(texture, self.surface_format))
    }

    /// 即时 API 没有交换链，只记录新尺寸，下次获取时再配置表面
    fn reinit_swapchain(&mut self, extent: Extent) -> Result<()> {
        if !extent.is_zero_area() {
            self.surface_config.width = extent.width;
            self.surface_config.height = extent.height;
            self.surface_dirty = true;
        }
        Ok(())
    }

    fn create_framebuffer(&mut self, drawable: &GlDrawable) -> Result<GlFramebuffer> {
        Ok(GlFramebuffer::new(drawable))
    }

    fn create_render_pipeline(&mut self, desc: &RenderPipelineDesc) -> Result<Arc<wgpu::RenderPipeline>> {
        let color_format = wgpu_format(desc.target.color_format);
        let features = self.adapter.get_texture_format_features(color_format);
        if !features
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return Err(GraphicsError::UnsupportedFormat(format!(
                "{:?} cannot be used as a render attachment",
                color_format
            ))
            .into());
        }

        let depth_stencil = desc.target.depth_format.map(|format| wgpu::DepthStencilState {
            format: wgpu_format(format),
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        // 着色器编译错误在 GL 上是异步报告的，用错误作用域收集
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vs_module = self.shader_module("Triangle Vertex Shader", VERTEX_SHADER);
        let fs_module = self.shader_module("Triangle Fragment Shader", FRAGMENT_SHADER);

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Triangle Pipeline Layout"),
                bind_group_layouts: &[],
                push_constant_ranges: &[],
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.debug_name),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &vs_module,
                    entry_point: desc.vertex_entry,
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fs_module,
                    entry_point: desc.fragment_entry,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(TriRenderError::Graphics(GraphicsError::ShaderCompilation(format!(
                "Failed to create render pipeline '{}': {}",
                desc.debug_name, error
            ))));
        }

        debug!(name = desc.debug_name, "Render pipeline created");
        Ok(Arc::new(pipeline))
    }

    fn create_command_buffer(&mut self, _queue: &GlQueue) -> Result<GlCommandBuffer> {
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        Ok(GlCommandBuffer::new(encoder))
    }

    fn submit(&mut self, queue: &GlQueue, commands: GlCommandBuffer) -> Result<()> {
        if commands.has_open_pass() {
            return Err(GraphicsError::CommandExecution(
                "Command buffer submitted with an open render pass".to_string(),
            )
            .into());
        }

        let GlCommandBuffer { encoder, drawable, .. } = commands;
        queue.queue.submit(std::iter::once(encoder.finish()));

        if let Some(drawable) = drawable {
            drawable.present();
            trace!("Frame presented successfully");
        }
        Ok(())
    }

    fn release(self) -> Result<()> {
        let _ = self.device.poll(wgpu::Maintain::Wait);
        debug!("OpenGL device released");
        Ok(())
    }
}
