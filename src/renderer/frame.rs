//! 帧驱动
//!
//! `Renderer` 持有设备、命令队列、帧缓冲缓存、管线缓存和表面尺寸，
//! 每帧严格按照 获取 drawable → 同步帧缓冲 → 确保管线 → 录制 → 提交/呈现 的顺序执行。
//!
//! # 生命周期
//!
//! ```text
//! Uninitialized ─new─> DeviceReady ─prepare─> FramebufferReady ─> PipelineReady
//!                                                                      │
//!                                          render_frame (循环) <───────┘
//!                                                  │
//!                              shutdown ─> ShuttingDown ─> Terminated
//! ```
//!
//! 字段按获取顺序的逆序声明，隐式 drop 时同样先释放管线、帧缓冲，再释放队列和设备。

use tracing::{debug, error, info, trace, warn};

use crate::core::error::{Result, TriRenderError};
use crate::gfx::{
    BackendDevice, Color, CommandBuffer, CommandQueueType, Drawable, Extent, PrimitiveType,
    RenderPassDesc, ScissorRect, Viewport,
};
use super::framebuffer::FramebufferCache;
use super::pipeline::PipelineCache;

/// 调试标签名
const DEBUG_GROUP_LABEL: &str = "Render Triangle";

/// 渲染器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    DeviceReady,
    FramebufferReady,
    PipelineReady,
    Rendering,
    ShuttingDown,
    Terminated,
}

/// 一帧的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 命令已提交，drawable 已呈现
    Presented,
    /// 本帧被跳过
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 表面面积为 0（窗口最小化）
    ZeroArea,
    /// 交换链过期，已重建，下一帧重试
    DrawableUnavailable,
}

pub struct Renderer<D: BackendDevice> {
    state: RendererState,
    surface_extent: Extent,
    render_pass: RenderPassDesc,
    frames_presented: u64,
    pipelines: PipelineCache<D>,
    framebuffers: FramebufferCache<D>,
    pending_drawable: Option<D::Drawable>,
    queue: D::Queue,
    device: D,
}

impl<D: BackendDevice> Renderer<D> {
    /// 接管已初始化的设备并创建图形命令队列
    pub fn new(mut device: D, surface_extent: Extent) -> Result<Self> {
        let queue = device.create_command_queue(CommandQueueType::Graphics)?;

        info!(
            backend = D::NAME,
            kind = %D::KIND,
            extent = %surface_extent,
            "Renderer created"
        );

        let mut renderer = Self {
            state: RendererState::Uninitialized,
            surface_extent,
            render_pass: RenderPassDesc::default(),
            frames_presented: 0,
            pipelines: PipelineCache::new(),
            framebuffers: FramebufferCache::new(),
            pending_drawable: None,
            queue,
            device,
        };
        renderer.transition(RendererState::DeviceReady);
        Ok(renderer)
    }

    /// 启动阶段：获取首个 drawable，建立帧缓冲并编译管线
    ///
    /// 获取到的 drawable 会留给第一帧使用，不会被丢弃。
    pub fn prepare(&mut self) -> Result<()> {
        if self.state != RendererState::DeviceReady {
            return Err(TriRenderError::Runtime(format!(
                "prepare called in state {:?}",
                self.state
            )));
        }
        if self.surface_extent.is_zero_area() {
            return Err(TriRenderError::Initialization(
                "cannot prepare a zero-area surface".to_string(),
            ));
        }

        let drawable = match self.device.acquire_drawable(self.surface_extent) {
            Ok(drawable) => drawable,
            Err(e) if e.is_transient() => {
                debug!(error = %e, "Startup drawable unavailable, retrying once");
                self.device.reinit_swapchain(self.surface_extent)?;
                self.device.acquire_drawable(self.surface_extent)?
            }
            Err(e) => return Err(e),
        };

        let framebuffer = self.framebuffers.sync(&mut self.device, &drawable)?;
        self.state = RendererState::FramebufferReady;
        debug!(state = ?self.state, "Renderer state changed");

        self.pipelines.ensure(&mut self.device, framebuffer)?;
        self.pending_drawable = Some(drawable);
        self.transition(RendererState::PipelineReady);
        Ok(())
    }

    /// 渲染一帧
    pub fn render_frame(&mut self) -> Result<FrameOutcome> {
        if !matches!(self.state, RendererState::PipelineReady | RendererState::Rendering) {
            return Err(TriRenderError::Runtime(format!(
                "cannot render a frame in state {:?}",
                self.state
            )));
        }

        let extent = self.surface_extent;
        if extent.is_zero_area() {
            trace!("Surface has zero area, skipping frame");
            return Ok(FrameOutcome::Skipped(SkipReason::ZeroArea));
        }

        // 1. 获取 drawable
        let drawable = match self.pending_drawable.take() {
            Some(drawable) => drawable,
            None => match self.device.acquire_drawable(extent) {
                Ok(drawable) => drawable,
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Skipping frame");
                    self.device.reinit_swapchain(extent)?;
                    return Ok(FrameOutcome::Skipped(SkipReason::DrawableUnavailable));
                }
                Err(e) => {
                    error!(error = %e, "Failed to acquire drawable");
                    return Err(e);
                }
            },
        };

        // 2. 同步帧缓冲  3. 确保管线
        let framebuffer = self.framebuffers.sync(&mut self.device, &drawable)?;
        let pipeline = self.pipelines.ensure(&mut self.device, framebuffer)?;

        // 4. 视口和裁剪矩形每帧按当前表面尺寸计算
        if drawable.extent() != extent {
            warn!(
                drawable = %drawable.extent(),
                surface = %extent,
                "Drawable size differs from surface size, a resize may have been missed"
            );
        }
        let viewport = Viewport::from_extent(extent);
        let scissor = ScissorRect::from_extent(extent);

        // 5-6. 录制渲染通道
        let mut commands = self.device.create_command_buffer(&self.queue)?;
        commands.begin_render_pass(&self.render_pass, framebuffer)?;
        commands.bind_render_pipeline(pipeline)?;
        commands.bind_viewport(viewport)?;
        commands.bind_scissor_rect(scissor)?;
        commands.push_debug_group(DEBUG_GROUP_LABEL, Color::RED);
        commands.draw(PrimitiveType::Triangle, 0, 3)?;
        commands.pop_debug_group();
        commands.end_render_pass()?;

        // 7. 呈现并提交
        commands.present(drawable);
        self.device.submit(&self.queue, commands)?;

        self.frames_presented += 1;
        trace!(frame = self.frames_presented, extent = %extent, "Frame submitted");
        if self.state != RendererState::Rendering {
            self.transition(RendererState::Rendering);
        }
        Ok(FrameOutcome::Presented)
    }

    /// 表面尺寸变化
    ///
    /// 更新共享尺寸；显式后端同步重建交换链。尺寸为 0 时推迟到下一次非零尺寸。
    pub fn on_resize(&mut self, extent: Extent) -> Result<()> {
        if extent == self.surface_extent {
            return Ok(());
        }

        debug!(from = %self.surface_extent, to = %extent, "Surface resized");
        self.surface_extent = extent;

        if self.pending_drawable.take().is_some() {
            debug!("Discarding drawable acquired before resize");
        }

        if extent.is_zero_area() {
            return Ok(());
        }
        self.device.reinit_swapchain(extent)
    }

    /// 按获取顺序的逆序释放所有资源：管线 → 帧缓冲 → 队列 → 设备
    ///
    /// 某一步失败不会跳过后续步骤，所有错误都会记录，返回第一个错误。
    pub fn shutdown(mut self) -> Result<()> {
        self.transition(RendererState::ShuttingDown);

        let Renderer {
            mut pipelines,
            mut framebuffers,
            pending_drawable,
            queue,
            mut device,
            frames_presented,
            ..
        } = self;

        drop(pending_drawable);

        let mut first_error: Option<TriRenderError> = None;
        let mut record = |stage: &str, result: Result<()>| {
            if let Err(e) = result {
                error!(stage, error = %e, "Release failed");
                first_error.get_or_insert(e);
            }
        };

        if let Some(pipeline) = pipelines.take() {
            record("pipeline", device.release_pipeline(pipeline));
        }
        if let Some(framebuffer) = framebuffers.take() {
            record("framebuffer", device.release_framebuffer(framebuffer));
        }
        record("queue", device.release_queue(queue));
        record("device", device.release());

        debug!(state = ?RendererState::Terminated, frames_presented, "Renderer state changed");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn transition(&mut self, next: RendererState) {
        debug!(from = ?self.state, to = ?next, "Renderer state changed");
        self.state = next;
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn surface_extent(&self) -> Extent {
        self.surface_extent
    }

    pub fn render_pass(&self) -> &RenderPassDesc {
        &self.render_pass
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn framebuffer(&self) -> Option<&D::Framebuffer> {
        self.framebuffers.current()
    }

    pub fn framebuffers_constructed(&self) -> usize {
        self.framebuffers.constructed()
    }

    pub fn pipeline(&self) -> Option<&D::Pipeline> {
        self.pipelines.current()
    }

    pub fn pipelines_constructed(&self) -> usize {
        self.pipelines.constructed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GraphicsError;
    use crate::gfx::Framebuffer;
    use crate::testing::{Acquire, Call, CallLog, FakeDevice};

    fn ready_renderer(extent: Extent) -> (Renderer<FakeDevice>, CallLog) {
        let device = FakeDevice::new();
        let log = device.log();
        let mut renderer = Renderer::new(device, extent).unwrap();
        renderer.prepare().unwrap();
        (renderer, log)
    }

    fn position(calls: &[Call], wanted: impl Fn(&Call) -> bool) -> usize {
        calls.iter().position(wanted).unwrap()
    }

    #[test]
    fn test_prepare_builds_framebuffer_and_pipeline() {
        let (renderer, log) = ready_renderer(Extent::new(800, 600));

        assert_eq!(renderer.state(), RendererState::PipelineReady);
        assert_eq!(renderer.framebuffers_constructed(), 1);
        assert_eq!(renderer.pipelines_constructed(), 1);
        assert_eq!(
            *log.borrow(),
            [
                Call::CreateQueue(CommandQueueType::Graphics),
                Call::Acquire(Extent::new(800, 600)),
                Call::CreateFramebuffer(Extent::new(800, 600)),
                Call::CreatePipeline(crate::gfx::RenderTargetDesc {
                    color_format: crate::gfx::TextureFormat::Bgra8UnormSrgb,
                    depth_format: None,
                }),
            ]
        );
    }

    #[test]
    fn test_first_frame_reuses_startup_drawable() {
        let (mut renderer, log) = ready_renderer(Extent::new(800, 600));
        assert_eq!(renderer.render_frame().unwrap(), FrameOutcome::Presented);

        let acquires = log
            .borrow()
            .iter()
            .filter(|call| matches!(call, Call::Acquire(_)))
            .count();
        assert_eq!(acquires, 1);
    }

    #[test]
    fn test_frame_records_commands_in_order() {
        let (mut renderer, log) = ready_renderer(Extent::new(800, 600));
        renderer.render_frame().unwrap();
        log.borrow_mut().clear();

        renderer.render_frame().unwrap();
        assert_eq!(
            *log.borrow(),
            [
                Call::Acquire(Extent::new(800, 600)),
                Call::UpdateDrawable(Extent::new(800, 600)),
                Call::CreateCommandBuffer,
                Call::BeginRenderPass(Extent::new(800, 600)),
                Call::BindPipeline(0),
                Call::BindViewport(Viewport::from_extent(Extent::new(800, 600))),
                Call::BindScissor(ScissorRect::from_extent(Extent::new(800, 600))),
                Call::PushDebugGroup("Render Triangle".to_string()),
                Call::Draw { primitive: PrimitiveType::Triangle, start: 0, count: 3 },
                Call::PopDebugGroup,
                Call::EndRenderPass,
                Call::Present(Extent::new(800, 600)),
                Call::Submit,
            ]
        );
    }

    #[test]
    fn test_call_order_holds_for_every_frame() {
        let (mut renderer, log) = ready_renderer(Extent::new(800, 600));
        // 第一帧使用启动时获取的 drawable
        renderer.render_frame().unwrap();
        log.borrow_mut().clear();

        for frame in 0..100 {
            if frame == 40 {
                renderer.on_resize(Extent::new(1024, 768)).unwrap();
            }
            if frame == 70 {
                renderer.on_resize(Extent::new(640, 480)).unwrap();
            }

            log.borrow_mut().clear();
            assert_eq!(renderer.render_frame().unwrap(), FrameOutcome::Presented);

            let calls = log.borrow();
            let acquire = position(&calls, |c| matches!(c, Call::Acquire(_)));
            let sync = position(&calls, |c| {
                matches!(c, Call::UpdateDrawable(_) | Call::CreateFramebuffer(_))
            });
            let bind = position(&calls, |c| matches!(c, Call::BindPipeline(_)));
            let submit = position(&calls, |c| matches!(c, Call::Submit));

            assert!(acquire < sync, "frame {}: {:?}", frame, calls);
            assert!(sync < bind, "frame {}: {:?}", frame, calls);
            assert!(bind < submit, "frame {}: {:?}", frame, calls);
        }

        assert_eq!(renderer.frames_presented(), 101);
        assert_eq!(renderer.pipelines_constructed(), 1);
        assert_eq!(renderer.framebuffers_constructed(), 3);
    }

    #[test]
    fn test_resize_without_explicit_rebuild() {
        let (mut renderer, log) = ready_renderer(Extent::new(800, 600));
        renderer.render_frame().unwrap();

        renderer.on_resize(Extent::new(1024, 768)).unwrap();
        assert!(log.borrow().contains(&Call::ReinitSwapchain(Extent::new(1024, 768))));

        log.borrow_mut().clear();
        renderer.render_frame().unwrap();

        let framebuffer = renderer.framebuffer().unwrap();
        assert_eq!(framebuffer.color_attachment_extent(), Extent::new(1024, 768));

        let calls = log.borrow();
        assert!(calls.contains(&Call::CreateFramebuffer(Extent::new(1024, 768))));
        assert!(calls.contains(&Call::BindViewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: 1024.0,
            height: 768.0,
            min_depth: 0.0,
            max_depth: 1.0,
        })));
        assert!(calls.contains(&Call::BindScissor(ScissorRect {
            x: 0,
            y: 0,
            width: 1024,
            height: 768,
        })));
    }

    #[test]
    fn test_zero_area_frame_is_skipped() {
        let (mut renderer, log) = ready_renderer(Extent::new(800, 600));
        renderer.render_frame().unwrap();

        renderer.on_resize(Extent::new(0, 0)).unwrap();
        log.borrow_mut().clear();

        assert_eq!(
            renderer.render_frame().unwrap(),
            FrameOutcome::Skipped(SkipReason::ZeroArea)
        );
        assert!(log.borrow().is_empty());

        renderer.on_resize(Extent::new(800, 600)).unwrap();
        assert_eq!(renderer.render_frame().unwrap(), FrameOutcome::Presented);
    }

    #[test]
    fn test_unavailable_drawable_skips_and_retries() {
        let (mut renderer, log) = ready_renderer(Extent::new(800, 600));
        renderer.render_frame().unwrap();

        renderer.device.script_acquire(Acquire::Unavailable);
        log.borrow_mut().clear();

        assert_eq!(
            renderer.render_frame().unwrap(),
            FrameOutcome::Skipped(SkipReason::DrawableUnavailable)
        );
        assert_eq!(
            *log.borrow(),
            [
                Call::Acquire(Extent::new(800, 600)),
                Call::ReinitSwapchain(Extent::new(800, 600)),
            ]
        );

        assert_eq!(renderer.render_frame().unwrap(), FrameOutcome::Presented);
    }

    #[test]
    fn test_fatal_acquisition_error_propagates() {
        let (mut renderer, _log) = ready_renderer(Extent::new(800, 600));
        renderer.render_frame().unwrap();

        renderer.device.script_acquire(Acquire::Fatal);
        let err = renderer.render_frame().unwrap_err();
        assert!(matches!(
            err,
            TriRenderError::Graphics(GraphicsError::DrawableAcquisition(_))
        ));
    }

    #[test]
    fn test_render_before_prepare_is_rejected() {
        let mut renderer = Renderer::new(FakeDevice::new(), Extent::new(800, 600)).unwrap();
        assert_eq!(renderer.state(), RendererState::DeviceReady);
        assert!(matches!(renderer.render_frame(), Err(TriRenderError::Runtime(_))));
    }

    #[test]
    fn test_shutdown_releases_in_reverse_order() {
        let (mut renderer, log) = ready_renderer(Extent::new(800, 600));
        renderer.render_frame().unwrap();
        log.borrow_mut().clear();

        renderer.shutdown().unwrap();
        assert_eq!(
            *log.borrow(),
            [
                Call::ReleasePipeline,
                Call::ReleaseFramebuffer,
                Call::ReleaseQueue,
                Call::ReleaseDevice,
            ]
        );
    }

    #[test]
    fn test_shutdown_continues_after_failure() {
        let (mut renderer, log) = ready_renderer(Extent::new(800, 600));
        renderer.device.fail_release(Call::ReleaseFramebuffer);
        log.borrow_mut().clear();

        let err = renderer.shutdown().unwrap_err();
        assert!(matches!(err, TriRenderError::Runtime(_)));
        assert_eq!(
            *log.borrow(),
            [
                Call::ReleasePipeline,
                Call::ReleaseFramebuffer,
                Call::ReleaseQueue,
                Call::ReleaseDevice,
            ]
        );
    }
}
