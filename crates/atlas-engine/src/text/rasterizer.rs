use std::ops::RangeInclusive;

use super::{FontLoadError, GlyphBitmap, GlyphSource, PRINTABLE_ASCII};

/// Glyph source backed by a TrueType/OpenType font rasterized with `fontdue`.
///
/// Produces one bitmap per character of its charset at a fixed pixel size.
pub struct FontRasterizer {
    font: fontdue::Font,
    px: f32,
    charset: RangeInclusive<char>,
}

impl FontRasterizer {
    /// Parses a font from raw bytes and rasterizes printable ASCII at `px`.
    pub fn from_bytes(bytes: &[u8], px: f32) -> Result<Self, FontLoadError> {
        if !(px.is_finite() && px > 0.0) {
            return Err(FontLoadError(format!("invalid pixel size {px}")));
        }
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| FontLoadError(e.to_string()))?;
        Ok(Self { font, px, charset: PRINTABLE_ASCII })
    }

    /// Replaces the rasterized character range.
    pub fn with_charset(mut self, charset: RangeInclusive<char>) -> Self {
        self.charset = charset;
        self
    }

    #[inline]
    pub fn px(&self) -> f32 {
        self.px
    }

    /// Recommended baseline-to-baseline distance, if the font provides it.
    pub fn line_height(&self) -> Option<f32> {
        self.font
            .horizontal_line_metrics(self.px)
            .map(|m| m.new_line_size)
    }
}

impl GlyphSource for FontRasterizer {
    fn glyph_bitmaps(&self) -> Vec<GlyphBitmap> {
        self.charset
            .clone()
            .map(|ch| {
                let (m, pixels) = self.font.rasterize(ch, self.px);
                GlyphBitmap {
                    ch,
                    width: m.width as u32,
                    height: m.height as u32,
                    bearing_x: m.xmin,
                    // fontdue reports the bitmap's bottom edge relative to the baseline.
                    bearing_y: m.ymin + m.height as i32,
                    advance: m.advance_width,
                    pixels,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(FontRasterizer::from_bytes(&[0, 1, 2, 3], 16.0).is_err());
    }

    #[test]
    fn non_positive_size_is_rejected() {
        let err = FontRasterizer::from_bytes(&[], 0.0).err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("font load error: invalid pixel size 0"));
    }
}
