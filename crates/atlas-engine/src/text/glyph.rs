use std::ops::RangeInclusive;

use crate::coords::{PixelRect, Vec2};

/// Printable ASCII, the character set requested from glyph sources by default.
pub const PRINTABLE_ASCII: RangeInclusive<char> = ' '..='~';

/// A rasterized glyph as delivered by a [`GlyphSource`].
///
/// `pixels` holds `width * height` coverage bytes, rows top-down.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphBitmap {
    pub ch: char,
    pub width: u32,
    pub height: u32,
    /// Horizontal offset from the pen to the bitmap's left edge.
    pub bearing_x: i32,
    /// Vertical offset from the baseline up to the bitmap's top edge.
    pub bearing_y: i32,
    /// Horizontal pen movement after the glyph, in pixels.
    pub advance: f32,
    pub pixels: Vec<u8>,
}

impl GlyphBitmap {
    /// A glyph with no visible pixels (e.g. space) that only advances the pen.
    pub fn blank(ch: char, advance: f32) -> Self {
        Self { ch, width: 0, height: 0, bearing_x: 0, bearing_y: 0, advance, pixels: Vec::new() }
    }
}

/// Supplier of glyph bitmaps for atlas construction.
pub trait GlyphSource {
    /// Returns one bitmap per character. Order does not matter; the packer
    /// sorts by character code.
    fn glyph_bitmaps(&self) -> Vec<GlyphBitmap>;
}

impl GlyphSource for [GlyphBitmap] {
    fn glyph_bitmaps(&self) -> Vec<GlyphBitmap> {
        self.to_vec()
    }
}

impl GlyphSource for Vec<GlyphBitmap> {
    fn glyph_bitmaps(&self) -> Vec<GlyphBitmap> {
        self.clone()
    }
}

/// Immutable metrics of one packed glyph.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
    ch: char,
    width: u32,
    height: u32,
    bearing_x: i32,
    bearing_y: i32,
    advance: f32,
    atlas_x: u32,
    atlas_y: u32,
}

impl Glyph {
    pub(crate) fn new(bitmap: &GlyphBitmap, atlas_rect: PixelRect) -> Self {
        Self {
            ch: bitmap.ch,
            width: bitmap.width,
            height: bitmap.height,
            bearing_x: bitmap.bearing_x,
            bearing_y: bitmap.bearing_y,
            advance: bitmap.advance,
            atlas_x: atlas_rect.x,
            atlas_y: atlas_rect.y,
        }
    }

    #[inline]
    pub fn ch(&self) -> char {
        self.ch
    }

    /// Bitmap size in pixels.
    #[inline]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    #[inline]
    pub fn bearing(&self) -> Vec2 {
        Vec2::new(self.bearing_x as f32, self.bearing_y as f32)
    }

    #[inline]
    pub fn advance(&self) -> f32 {
        self.advance
    }

    /// Top-left texel of the bitmap inside the atlas.
    #[inline]
    pub fn atlas_position(&self) -> (u32, u32) {
        (self.atlas_x, self.atlas_y)
    }

    #[inline]
    pub fn atlas_rect(&self) -> PixelRect {
        PixelRect::new(self.atlas_x, self.atlas_y, self.width, self.height)
    }

    #[inline]
    pub fn has_bitmap(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
