use anyhow::Result;

use crate::render::WgpuDevice;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application driven by [`Runtime`](crate::window::Runtime).
pub trait App {
    /// Called once the GPU is up, before the first frame. Textures and the
    /// glyph atlas are created here; an error aborts startup.
    fn on_start(&mut self, device: &mut WgpuDevice) -> Result<()>;

    /// Called once per redraw.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
