//! wgpu instance, device and surface ownership.
//!
//! [`Gpu`] is bound to one window. It hands out [`GpuFrame`]s (surface
//! texture + encoder) and maps surface errors to a [`SurfaceErrorAction`].

mod context;
mod frame;
mod init;
mod surface;

pub use context::Gpu;
pub use frame::GpuFrame;
pub use init::GpuInit;
pub use surface::SurfaceErrorAction;
