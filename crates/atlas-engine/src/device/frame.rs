/// One acquired swapchain image with its command encoder.
///
/// Holding it blocks acquisition of the next image; submit it through
/// [`Gpu::submit`](super::Gpu::submit) within the frame.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
    /// Physical size of `view`.
    pub size: (u32, u32),
}
