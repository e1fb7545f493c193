//! 后端无关的图形数据类型
//!
//! 这些类型只描述"要做什么"（尺寸、格式、加载/存储动作、管线目标格式），
//! 具体后端负责把它们翻译成 vulkano 或 wgpu 的对象。

use std::fmt;

/// 二维尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 宽或高为 0（例如窗口最小化）
    pub fn is_zero_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for Extent {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

impl From<Extent> for [u32; 2] {
    fn from(extent: Extent) -> Self {
        [extent.width, extent.height]
    }
}

/// 纹理像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgb10A2Unorm,
    Rgba16Float,
    Depth32Float,
}

impl TextureFormat {
    /// 是否为深度格式
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

/// 视口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// 覆盖整个表面的视口，深度范围 0..1
    pub fn from_extent(extent: Extent) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// 裁剪矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn from_extent(extent: Extent) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }
}

/// 附件在渲染通道开始时的加载动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadAction {
    DontCare,
    Load,
    Clear,
}

/// 附件在渲染通道结束时的存储动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    DontCare,
    Store,
}

/// RGBA 颜色
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl From<Color> for [f32; 4] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}

/// 颜色附件描述
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachmentDesc {
    pub load_action: LoadAction,
    pub store_action: StoreAction,
    pub clear_color: Color,
}

/// 深度附件描述
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachmentDesc {
    pub load_action: LoadAction,
    pub store_action: StoreAction,
    pub clear_depth: f32,
}

/// 渲染通道描述
///
/// 初始化时构造一次，之后不再修改。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassDesc {
    pub color: ColorAttachmentDesc,
    pub depth: DepthAttachmentDesc,
}

impl Default for RenderPassDesc {
    /// 清屏为不透明白色并保存结果，深度附件不关心
    fn default() -> Self {
        Self {
            color: ColorAttachmentDesc {
                load_action: LoadAction::Clear,
                store_action: StoreAction::Store,
                clear_color: Color::WHITE,
            },
            depth: DepthAttachmentDesc {
                load_action: LoadAction::DontCare,
                store_action: StoreAction::DontCare,
                clear_depth: 1.0,
            },
        }
    }
}

/// 管线的目标附件格式签名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetDesc {
    pub color_format: TextureFormat,
    pub depth_format: Option<TextureFormat>,
}

/// 渲染管线描述
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipelineDesc {
    pub target: RenderTargetDesc,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    pub debug_name: &'static str,
}

impl RenderPipelineDesc {
    /// 三角形管线，入口函数均为 `main`
    pub fn triangle(target: RenderTargetDesc) -> Self {
        Self {
            target,
            vertex_entry: "main",
            fragment_entry: "main",
            debug_name: "Triangle Pipeline",
        }
    }
}

/// 命令队列类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandQueueType {
    Graphics,
    Compute,
    Transfer,
}

/// 图元类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    /// 三角形列表
    Triangle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_covers_extent() {
        let viewport = Viewport::from_extent(Extent::new(400, 300));
        assert_eq!(viewport.x, 0.0);
        assert_eq!(viewport.y, 0.0);
        assert_eq!(viewport.width, 400.0);
        assert_eq!(viewport.height, 300.0);
        assert_eq!((viewport.min_depth, viewport.max_depth), (0.0, 1.0));

        let scissor = ScissorRect::from_extent(Extent::new(400, 300));
        assert_eq!(scissor, ScissorRect { x: 0, y: 0, width: 400, height: 300 });
    }

    #[test]
    fn test_default_render_pass() {
        let desc = RenderPassDesc::default();
        assert_eq!(desc.color.load_action, LoadAction::Clear);
        assert_eq!(desc.color.store_action, StoreAction::Store);
        assert_eq!(desc.color.clear_color, Color::WHITE);
        assert_eq!(desc.depth.load_action, LoadAction::DontCare);
    }

    #[test]
    fn test_zero_area() {
        assert!(Extent::new(0, 600).is_zero_area());
        assert!(Extent::new(800, 0).is_zero_area());
        assert!(!Extent::new(1, 1).is_zero_area());
        assert_eq!(Extent::new(1024, 768).to_string(), "1024x768");
    }
}
