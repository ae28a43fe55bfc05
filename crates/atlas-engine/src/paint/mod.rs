//! Color model shared by the emitters and the device.
//!
//! Vertex colors are linear, premultiplied RGBA so that the alpha-blended
//! pipeline can use `One, OneMinusSrcAlpha` without fringes.

mod color;

pub use color::Color;
