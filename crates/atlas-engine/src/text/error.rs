use crate::render::DeviceError;

/// Error returned when a font file cannot be parsed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("font load error: {0}")]
pub struct FontLoadError(pub String);

/// Error returned by atlas construction.
///
/// Every variant is fatal to the build: no partially packed atlas is ever
/// exposed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AtlasError {
    #[error("invalid atlas configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("duplicate glyph for {0:?}")]
    DuplicateGlyph(char),

    #[error("bitmap for {ch:?} holds {actual} bytes, expected {expected}")]
    BitmapSize { ch: char, expected: usize, actual: usize },

    #[error("glyph {ch:?} is {glyph_width}px wide and cannot fit a {atlas_width}px atlas row")]
    GlyphTooWide { ch: char, glyph_width: u32, atlas_width: u32 },

    #[error("glyph atlas overflow at {ch:?}: no room left in {width}x{height}")]
    Overflow { ch: char, width: u32, height: u32 },

    #[error(transparent)]
    Device(#[from] DeviceError),
}
