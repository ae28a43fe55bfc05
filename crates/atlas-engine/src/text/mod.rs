//! Glyph atlas construction.
//!
//! - `glyph`: bitmap input records and packed glyph metrics
//! - `packer`: shelf packing into a fixed-size atlas
//! - `atlas`: the device-resident atlas and character lookup
//! - `rasterizer`: `fontdue`-backed glyph source

mod atlas;
mod error;
mod glyph;
mod packer;
mod rasterizer;

pub use atlas::GlyphAtlas;
pub use error::{AtlasError, FontLoadError};
pub use glyph::{Glyph, GlyphBitmap, GlyphSource, PRINTABLE_ASCII};
pub use packer::{pack_glyphs, AtlasConfig, PackedAtlas, ShelfPacker};
pub use rasterizer::FontRasterizer;
