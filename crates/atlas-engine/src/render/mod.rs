//! Batch geometry engine.
//!
//! Draw requests are triangulated by the emitters into per-(texture, state)
//! geometry buffers, which the [`FrameRenderer`] uploads and draws once per
//! frame through a [`RenderDevice`].
//!
//! Convention:
//! - CPU geometry is in logical pixels (top-left origin, +Y down).
//! - Vertex shader converts to NDC using a viewport uniform.

mod batch;
mod ctx;
mod device;
mod emit;
mod frame;
mod vertex;
mod wgpu_device;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchKey, BatchStore, BufferHandle, GeometryBuffer};
pub use ctx::{RenderCtx, RenderTarget};
pub use device::{
    check_pixels, BufferCapacity, BufferSlot, DeviceError, RenderDevice, RenderState,
    TextureFormat, TextureId, TextureSize,
};
pub use emit::{emit_circle, emit_glyph_run, emit_rect, normalized_uv};
pub use frame::{FrameError, FramePhase, FrameRenderer, FrameStats, RendererConfig, Sprite};
pub use vertex::Vertex;
pub use wgpu_device::WgpuDevice;
