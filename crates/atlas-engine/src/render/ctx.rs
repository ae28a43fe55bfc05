use crate::coords::Viewport;

/// Per-frame view of the GPU handed to code that encodes draws.
pub struct RenderCtx<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub surface_format: wgpu::TextureFormat,
    /// Logical screen size used for the pixel → NDC mapping.
    pub viewport: Viewport,
    pub scale_factor: f32,
}

impl<'a> RenderCtx<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        viewport: Viewport,
        scale_factor: f32,
    ) -> Self {
        Self { device, queue, surface_format, viewport, scale_factor }
    }
}

/// Encoder and color attachment of the frame being recorded.
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
    /// Attachment size in physical pixels; depth buffers are matched to it.
    pub size: (u32, u32),
}

impl<'a> RenderTarget<'a> {
    #[inline]
    pub fn new(
        encoder: &'a mut wgpu::CommandEncoder,
        color_view: &'a wgpu::TextureView,
        size: (u32, u32),
    ) -> Self {
        Self { encoder, color_view, size }
    }
}
