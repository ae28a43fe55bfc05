use winit::dpi::PhysicalSize;

/// What the caller should do after a failed surface acquire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// The surface was reconfigured; try again next frame.
    Reconfigured,
    SkipFrame,
    /// Unrecoverable (out of memory); shut down.
    Fatal,
}

pub(crate) fn choose_surface_format(
    formats: &[wgpu::TextureFormat],
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    let first = formats.first().copied()?;
    if !prefer_srgb {
        return Some(first);
    }
    Some(formats.iter().copied().find(|f| f.is_srgb()).unwrap_or(first))
}

pub(crate) fn choose_alpha_mode(
    supported: &[wgpu::CompositeAlphaMode],
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| supported.contains(m))
        .or_else(|| supported.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Applies a new window size to `config`. Returns `false` for a zero-sized
/// (minimised) window, which must not be configured.
pub(crate) fn resize_config(config: &mut wgpu::SurfaceConfiguration, size: PhysicalSize<u32>) -> bool {
    if size.width == 0 || size.height == 0 {
        return false;
    }
    config.width = size.width;
    config.height = size.height;
    true
}

pub(crate) fn classify_surface_error(err: &wgpu::SurfaceError) -> SurfaceErrorAction {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
        wgpu::SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => SurfaceErrorAction::SkipFrame,
    }
}
