//! 渲染管线缓存
//!
//! 第一次拿到帧缓冲时按其附件格式编译三角形管线，之后一直复用。

use tracing::{info, warn};

use crate::core::error::{Result, TriRenderError};
use crate::gfx::{BackendDevice, Framebuffer, RenderPipelineDesc, RenderTargetDesc};

pub struct PipelineCache<D: BackendDevice> {
    pipeline: Option<D::Pipeline>,
    target: Option<RenderTargetDesc>,
    constructed: usize,
}

impl<D: BackendDevice> PipelineCache<D> {
    pub fn new() -> Self {
        Self {
            pipeline: None,
            target: None,
            constructed: 0,
        }
    }

    /// 返回缓存的管线，不存在时按帧缓冲的附件格式创建
    pub fn ensure(&mut self, device: &mut D, framebuffer: &D::Framebuffer) -> Result<&D::Pipeline> {
        let target = RenderTargetDesc {
            color_format: framebuffer.color_attachment_format(),
            depth_format: framebuffer.depth_attachment_format(),
        };

        if self.pipeline.is_none() {
            let desc = RenderPipelineDesc::triangle(target);
            let pipeline = device.create_render_pipeline(&desc)?;
            self.constructed += 1;
            info!(
                color_format = ?target.color_format,
                depth_format = ?target.depth_format,
                "Render pipeline created"
            );
            self.target = Some(target);
            self.pipeline = Some(pipeline);
        } else if self.target != Some(target) {
            warn!(
                built_for = ?self.target,
                framebuffer = ?target,
                "Framebuffer formats differ from the cached pipeline"
            );
        }

        self.pipeline
            .as_ref()
            .ok_or_else(|| TriRenderError::Runtime("pipeline missing after creation".to_string()))
    }

    pub fn current(&self) -> Option<&D::Pipeline> {
        self.pipeline.as_ref()
    }

    /// 累计构造的管线数量
    pub fn constructed(&self) -> usize {
        self.constructed
    }

    /// 取出管线用于释放
    pub fn take(&mut self) -> Option<D::Pipeline> {
        self.pipeline.take()
    }
}

impl<D: BackendDevice> Default for PipelineCache<D> {
    fn default() -> Self {
        Self::new()
    }
}
