//! 帧缓冲缓存
//!
//! 最多持有一个帧缓冲。drawable 尺寸不变时只重新绑定颜色附件，
//! 尺寸变化时释放旧的帧缓冲并按新尺寸重建。

use tracing::{debug, trace};

use crate::core::error::{Result, TriRenderError};
use crate::gfx::{BackendDevice, Drawable, Framebuffer};

pub struct FramebufferCache<D: BackendDevice> {
    framebuffer: Option<D::Framebuffer>,
    constructed: usize,
}

impl<D: BackendDevice> FramebufferCache<D> {
    pub fn new() -> Self {
        Self {
            framebuffer: None,
            constructed: 0,
        }
    }

    /// 让缓存的帧缓冲与 `drawable` 保持一致
    ///
    /// 返回后帧缓冲的颜色附件尺寸等于 `drawable` 的尺寸。
    pub fn sync(&mut self, device: &mut D, drawable: &D::Drawable) -> Result<&D::Framebuffer> {
        let target = drawable.extent();
        let reusable = self
            .framebuffer
            .as_ref()
            .is_some_and(|fb| fb.color_attachment_extent() == target);

        if reusable {
            if let Some(framebuffer) = self.framebuffer.as_mut() {
                framebuffer.update_drawable(drawable)?;
                trace!(extent = %target, "Framebuffer rebound to new drawable");
            }
        } else {
            if let Some(stale) = self.framebuffer.take() {
                debug!(
                    from = %stale.color_attachment_extent(),
                    to = %target,
                    "Drawable size changed, rebuilding framebuffer"
                );
                device.release_framebuffer(stale)?;
            }

            let framebuffer = device.create_framebuffer(drawable)?;
            self.constructed += 1;
            debug!(extent = %target, count = self.constructed, "Framebuffer created");
            self.framebuffer = Some(framebuffer);
        }

        self.framebuffer
            .as_ref()
            .ok_or_else(|| TriRenderError::Runtime("framebuffer missing after sync".to_string()))
    }

    /// 当前缓存的帧缓冲
    pub fn current(&self) -> Option<&D::Framebuffer> {
        self.framebuffer.as_ref()
    }

    /// 累计构造的帧缓冲数量
    pub fn constructed(&self) -> usize {
        self.constructed
    }

    /// 取出帧缓冲用于释放
    pub fn take(&mut self) -> Option<D::Framebuffer> {
        self.framebuffer.take()
    }
}

impl<D: BackendDevice> Default for FramebufferCache<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::Extent;
    use crate::testing::{Call, FakeDevice, FakeDrawable};

    #[test]
    fn test_rebuilds_only_when_size_changes() {
        let mut device = FakeDevice::new();
        let mut cache = FramebufferCache::<FakeDevice>::new();

        let sizes = [
            Extent::new(800, 600),
            Extent::new(800, 600),
            Extent::new(1024, 768),
            Extent::new(1024, 768),
            Extent::new(640, 480),
        ];

        let mut constructed_on = Vec::new();
        for (call, size) in sizes.iter().enumerate() {
            let before = cache.constructed();
            let framebuffer = cache.sync(&mut device, &FakeDrawable::new(*size)).unwrap();
            assert_eq!(framebuffer.color_attachment_extent(), *size);
            if cache.constructed() > before {
                constructed_on.push(call + 1);
            }
        }

        assert_eq!(constructed_on, [1, 3, 5]);
        assert_eq!(cache.constructed(), 3);
    }

    #[test]
    fn test_reuse_rebinds_drawable() {
        let mut device = FakeDevice::new();
        let log = device.log();
        let mut cache = FramebufferCache::<FakeDevice>::new();

        cache.sync(&mut device, &FakeDrawable::new(Extent::new(800, 600))).unwrap();
        cache.sync(&mut device, &FakeDrawable::new(Extent::new(800, 600))).unwrap();

        assert_eq!(
            *log.borrow(),
            [
                Call::CreateFramebuffer(Extent::new(800, 600)),
                Call::UpdateDrawable(Extent::new(800, 600)),
            ]
        );
    }

    #[test]
    fn test_stale_framebuffer_released_before_rebuild() {
        let mut device = FakeDevice::new();
        let log = device.log();
        let mut cache = FramebufferCache::<FakeDevice>::new();

        cache.sync(&mut device, &FakeDrawable::new(Extent::new(800, 600))).unwrap();
        cache.sync(&mut device, &FakeDrawable::new(Extent::new(400, 300))).unwrap();

        assert_eq!(
            *log.borrow(),
            [
                Call::CreateFramebuffer(Extent::new(800, 600)),
                Call::ReleaseFramebuffer,
                Call::CreateFramebuffer(Extent::new(400, 300)),
            ]
        );
        assert_eq!(
            cache.current().map(|fb| fb.color_attachment_extent()),
            Some(Extent::new(400, 300))
        );
    }
}
