//! 测试替身：记录调用顺序的假设备与假窗口表面

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::core::error::{GraphicsError, Result, TriRenderError};
use crate::core::event::{Event, WindowResizeEvent};
use crate::core::runtime::BackendKind;
use crate::gfx::{
    BackendDevice, Color, CommandBuffer, CommandQueueType, Drawable, Extent, Framebuffer,
    PrimitiveType, RenderPassDesc, RenderPipelineDesc, RenderTargetDesc, ScissorRect,
    TextureFormat, Viewport,
};
use crate::window::SurfaceProvider;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateQueue(CommandQueueType),
    Acquire(Extent),
    ReinitSwapchain(Extent),
    CreateFramebuffer(Extent),
    UpdateDrawable(Extent),
    CreatePipeline(RenderTargetDesc),
    CreateCommandBuffer,
    BeginRenderPass(Extent),
    BindPipeline(usize),
    BindViewport(Viewport),
    BindScissor(ScissorRect),
    PushDebugGroup(String),
    PopDebugGroup,
    Draw { primitive: PrimitiveType, start: u32, count: u32 },
    EndRenderPass,
    Present(Extent),
    Submit,
    ReleasePipeline,
    ReleaseFramebuffer,
    ReleaseQueue,
    ReleaseDevice,
    PollEvents,
    DestroySurface,
}

pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// 下一次 `acquire_drawable` 的脚本化结果
#[derive(Debug, Clone, Copy)]
pub enum Acquire {
    Size(Extent),
    Unavailable,
    Fatal,
}

#[derive(Debug)]
pub struct FakeDrawable {
    extent: Extent,
    format: TextureFormat,
}

impl FakeDrawable {
    pub fn new(extent: Extent) -> Self {
        Self {
            extent,
            format: TextureFormat::Bgra8UnormSrgb,
        }
    }

    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }
}

impl Drawable for FakeDrawable {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }
}

#[derive(Debug)]
pub struct FakeFramebuffer {
    extent: Extent,
    format: TextureFormat,
    log: CallLog,
}

impl Framebuffer for FakeFramebuffer {
    type Drawable = FakeDrawable;

    fn color_attachment_extent(&self) -> Extent {
        self.extent
    }

    fn color_attachment_format(&self) -> TextureFormat {
        self.format
    }

    fn update_drawable(&mut self, drawable: &FakeDrawable) -> Result<()> {
        self.log.borrow_mut().push(Call::UpdateDrawable(drawable.extent));
        self.format = drawable.format;
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakePipeline {
    pub id: usize,
}

#[derive(Debug)]
pub struct FakeQueue {
    pub queue_type: CommandQueueType,
}

pub struct FakeCommandBuffer {
    log: CallLog,
}

impl FakeCommandBuffer {
    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }
}

impl CommandBuffer for FakeCommandBuffer {
    type Drawable = FakeDrawable;
    type Framebuffer = FakeFramebuffer;
    type Pipeline = FakePipeline;

    fn begin_render_pass(&mut self, _desc: &RenderPassDesc, framebuffer: &FakeFramebuffer) -> Result<()> {
        self.record(Call::BeginRenderPass(framebuffer.extent));
        Ok(())
    }

    fn bind_render_pipeline(&mut self, pipeline: &FakePipeline) -> Result<()> {
        self.record(Call::BindPipeline(pipeline.id));
        Ok(())
    }

    fn bind_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(Call::BindViewport(viewport));
        Ok(())
    }

    fn bind_scissor_rect(&mut self, rect: ScissorRect) -> Result<()> {
        self.record(Call::BindScissor(rect));
        Ok(())
    }

    fn push_debug_group(&mut self, label: &str, _color: Color) {
        self.record(Call::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.record(Call::PopDebugGroup);
    }

    fn draw(&mut self, primitive: PrimitiveType, vertex_start: u32, vertex_count: u32) -> Result<()> {
        self.record(Call::Draw { primitive, start: vertex_start, count: vertex_count });
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.record(Call::EndRenderPass);
        Ok(())
    }

    fn present(&mut self, drawable: FakeDrawable) {
        self.record(Call::Present(drawable.extent));
    }
}

/// 记录所有调用的假设备
pub struct FakeDevice {
    log: CallLog,
    acquire_script: VecDeque<Acquire>,
    pipeline_error: Option<GraphicsError>,
    failing_release: Option<Call>,
    next_pipeline_id: usize,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::with_log(CallLog::default())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            acquire_script: VecDeque::new(),
            pipeline_error: None,
            failing_release: None,
            next_pipeline_id: 0,
        }
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// 脚本耗尽后按请求的尺寸返回 drawable
    pub fn script_acquire(&mut self, acquire: Acquire) {
        self.acquire_script.push_back(acquire);
    }

    pub fn fail_pipeline(&mut self, error: GraphicsError) {
        self.pipeline_error = Some(error);
    }

    /// 让某个 release 调用返回错误（调用仍会被记录）
    pub fn fail_release(&mut self, call: Call) {
        self.failing_release = Some(call);
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn release_result(&self, call: Call) -> Result<()> {
        self.record(call.clone());
        if self.failing_release.as_ref() == Some(&call) {
            Err(TriRenderError::Runtime(format!("injected failure in {:?}", call)))
        } else {
            Ok(())
        }
    }
}

impl BackendDevice for FakeDevice {
    type Queue = FakeQueue;
    type Drawable = FakeDrawable;
    type Framebuffer = FakeFramebuffer;
    type Pipeline = FakePipeline;
    type CommandBuffer = FakeCommandBuffer;

    const KIND: BackendKind = BackendKind::Explicit;
    const NAME: &'static str = "Fake";

    fn create_command_queue(&mut self, queue_type: CommandQueueType) -> Result<FakeQueue> {
        self.record(Call::CreateQueue(queue_type));
        Ok(FakeQueue { queue_type })
    }

    fn acquire_drawable(&mut self, extent: Extent) -> Result<FakeDrawable> {
        self.record(Call::Acquire(extent));
        match self.acquire_script.pop_front() {
            None => Ok(FakeDrawable::new(extent)),
            Some(Acquire::Size(size)) => Ok(FakeDrawable::new(size)),
            Some(Acquire::Unavailable) => {
                Err(GraphicsError::DrawableUnavailable("swapchain out of date".to_string()).into())
            }
            Some(Acquire::Fatal) => {
                Err(GraphicsError::DrawableAcquisition("device lost".to_string()).into())
            }
        }
    }

    fn reinit_swapchain(&mut self, extent: Extent) -> Result<()> {
        self.record(Call::ReinitSwapchain(extent));
        Ok(())
    }

    fn create_framebuffer(&mut self, drawable: &FakeDrawable) -> Result<FakeFramebuffer> {
        self.record(Call::CreateFramebuffer(drawable.extent));
        Ok(FakeFramebuffer {
            extent: drawable.extent,
            format: drawable.format,
            log: self.log.clone(),
        })
    }

    fn create_render_pipeline(&mut self, desc: &RenderPipelineDesc) -> Result<FakePipeline> {
        self.record(Call::CreatePipeline(desc.target));
        if let Some(error) = self.pipeline_error.take() {
            return Err(error.into());
        }
        let id = self.next_pipeline_id;
        self.next_pipeline_id += 1;
        Ok(FakePipeline { id })
    }

    fn create_command_buffer(&mut self, _queue: &FakeQueue) -> Result<FakeCommandBuffer> {
        self.record(Call::CreateCommandBuffer);
        Ok(FakeCommandBuffer { log: self.log.clone() })
    }

    fn submit(&mut self, _queue: &FakeQueue, _commands: FakeCommandBuffer) -> Result<()> {
        self.record(Call::Submit);
        Ok(())
    }

    fn release_pipeline(&mut self, _pipeline: FakePipeline) -> Result<()> {
        self.release_result(Call::ReleasePipeline)
    }

    fn release_framebuffer(&mut self, _framebuffer: FakeFramebuffer) -> Result<()> {
        self.release_result(Call::ReleaseFramebuffer)
    }

    fn release_queue(&mut self, _queue: FakeQueue) -> Result<()> {
        self.release_result(Call::ReleaseQueue)
    }

    fn release(self) -> Result<()> {
        self.release_result(Call::ReleaseDevice)
    }
}

/// 按脚本逐次返回事件的假窗口表面
///
/// 每次 `poll_events` 弹出一批事件；脚本耗尽后表面报告关闭，保证主循环结束。
pub struct FakeSurface {
    log: CallLog,
    extent: Extent,
    script: VecDeque<Vec<Box<dyn Event>>>,
    close_requested: bool,
}

impl FakeSurface {
    pub fn new(log: CallLog, extent: Extent) -> Self {
        Self {
            log,
            extent,
            script: VecDeque::new(),
            close_requested: false,
        }
    }

    /// 追加一次轮询返回的事件
    pub fn then(mut self, events: Vec<Box<dyn Event>>) -> Self {
        self.script.push_back(events);
        self
    }

    /// 追加若干次没有事件的轮询
    pub fn idle(mut self, polls: usize) -> Self {
        for _ in 0..polls {
            self.script.push_back(Vec::new());
        }
        self
    }
}

impl SurfaceProvider for FakeSurface {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn poll_events(&mut self) -> Vec<Box<dyn Event>> {
        self.log.borrow_mut().push(Call::PollEvents);
        let Some(events) = self.script.pop_front() else {
            self.close_requested = true;
            return Vec::new();
        };

        for event in &events {
            if let Some(resize) = event.as_any().downcast_ref::<WindowResizeEvent>() {
                self.extent = Extent::new(resize.width, resize.height);
            }
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
        self.log.borrow_mut().push(Call::DestroySurface);
        Ok(())
    }
}
