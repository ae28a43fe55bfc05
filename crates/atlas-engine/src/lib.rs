//! Immediate-mode 2D batch renderer.
//!
//! - `render`: batch geometry engine (emitters, batch store, frame renderer,
//!   device seam and its wgpu implementation)
//! - `text`: glyph atlas packing and font rasterization
//! - `device`, `window`, `core`: wgpu/winit runtime hosting an [`App`](crate::core::App)
//! - `input`, `time`, `logging`: per-frame services

pub mod coords;
pub mod core;
pub mod device;
pub mod input;
pub mod logging;
pub mod paint;
pub mod render;
pub mod text;
pub mod time;
pub mod window;
