/// GPU bring-up options.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Pick an sRGB swapchain format when the surface offers one. The batch
    /// shader outputs linear color and relies on the format to encode it.
    pub prefer_srgb: bool,

    /// `Fifo` is vsync and always available.
    pub present_mode: wgpu::PresentMode,

    /// Ignored when the surface does not support it.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub power_preference: wgpu::PowerPreference,
    pub required_limits: wgpu::Limits,
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_limits: wgpu::Limits::downlevel_defaults(),
            desired_maximum_frame_latency: 2,
        }
    }
}
