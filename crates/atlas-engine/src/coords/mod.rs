//! Coordinate and geometry types shared by the emitters and the atlas packer.
//!
//! Canonical CPU space:
//! - Logical pixels (DPI-aware)
//! - Origin top-left
//! - +X right, +Y down
//!
//! The batch shader converts to NDC using a viewport uniform. Atlas
//! rectangles live in integer texel space (`PixelRect`).

mod rect;
mod vec2;
mod viewport;

pub use rect::PixelRect;
pub use vec2::Vec2;
pub use viewport::Viewport;
