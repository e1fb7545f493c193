/// Build script for tri_render
///
/// # Shader Compilation Strategy:
/// - Vulkan: GLSL shaders compiled at build time via the vulkano_shaders macro
/// - OpenGL: WGSL shaders embedded with include_str! and compiled by wgpu at startup
fn main() {
    // Trigger rebuild if shader files change
    println!("cargo:rerun-if-changed=src/gfx/vulkan/shaders/vertex.glsl");
    println!("cargo:rerun-if-changed=src/gfx/vulkan/shaders/fragment.glsl");
    println!("cargo:rerun-if-changed=src/gfx/opengl/shaders/vertex.wgsl");
    println!("cargo:rerun-if-changed=src/gfx/opengl/shaders/fragment.wgsl");
}
