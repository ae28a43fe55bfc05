//! Shelf packing of glyph bitmaps into a fixed-size atlas.
//!
//! Glyphs are placed left to right along a shelf; when the next glyph does
//! not fit the remaining width a new shelf is opened below the tallest glyph
//! of the current one. Single pass, no backtracking: the same input always
//! yields the same layout.

use std::collections::BTreeMap;

use crate::coords::PixelRect;

use super::{AtlasError, Glyph, GlyphBitmap};

/// Atlas dimensions and inter-glyph gutter.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AtlasConfig {
    pub width: u32,
    pub height: u32,
    /// Empty texels kept right of and below every glyph so bilinear sampling
    /// never picks up a neighbour. Must be at least 1.
    pub padding: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self { width: 512, height: 512, padding: 1 }
    }
}

impl AtlasConfig {
    pub fn validate(self) -> Result<Self, AtlasError> {
        if self.width == 0 || self.height == 0 {
            return Err(AtlasError::InvalidConfig("atlas width and height must be non-zero"));
        }
        if self.padding == 0 {
            return Err(AtlasError::InvalidConfig("glyph padding must be at least 1px"));
        }
        Ok(self)
    }
}

/// Packing cursor.
#[derive(Debug, Clone)]
pub struct ShelfPacker {
    config: AtlasConfig,
    x: u32,
    y: u32,
    row_height: u32,
}

impl ShelfPacker {
    pub fn new(config: AtlasConfig) -> Result<Self, AtlasError> {
        Ok(Self { config: config.validate()?, x: 0, y: 0, row_height: 0 })
    }

    /// Reserves a `width` × `height` rectangle for `ch`.
    ///
    /// Empty bitmaps take no space and come back as an empty rectangle at
    /// the origin.
    pub fn place(&mut self, ch: char, width: u32, height: u32) -> Result<PixelRect, AtlasError> {
        if width == 0 || height == 0 {
            return Ok(PixelRect::default());
        }

        let AtlasConfig { width: atlas_w, height: atlas_h, padding } = self.config;

        if width + padding > atlas_w {
            return Err(AtlasError::GlyphTooWide { ch, glyph_width: width, atlas_width: atlas_w });
        }

        if self.x + width + padding > atlas_w {
            self.x = 0;
            self.y += self.row_height + padding;
            self.row_height = 0;
        }

        if self.y + height > atlas_h {
            return Err(AtlasError::Overflow { ch, width: atlas_w, height: atlas_h });
        }

        let rect = PixelRect::new(self.x, self.y, width, height);
        self.x += width + padding;
        self.row_height = self.row_height.max(height);
        Ok(rect)
    }

    /// Rows of the atlas touched so far.
    #[inline]
    pub fn used_height(&self) -> u32 {
        self.y + self.row_height
    }
}

/// CPU-side result of a successful pack: glyph records plus the R8 atlas
/// image with every bitmap copied to its slot.
#[derive(Debug, Clone)]
pub struct PackedAtlas {
    pub config: AtlasConfig,
    pub glyphs: BTreeMap<char, Glyph>,
    pub pixels: Vec<u8>,
    pub used_height: u32,
}

/// Packs `bitmaps` in increasing character-code order.
///
/// Fails on the first glyph that cannot be placed, naming it; nothing is
/// returned in that case.
pub fn pack_glyphs(
    mut bitmaps: Vec<GlyphBitmap>,
    config: AtlasConfig,
) -> Result<PackedAtlas, AtlasError> {
    let mut packer = ShelfPacker::new(config)?;

    bitmaps.sort_by_key(|b| b.ch);
    if let Some(pair) = bitmaps.windows(2).find(|w| w[0].ch == w[1].ch) {
        return Err(AtlasError::DuplicateGlyph(pair[0].ch));
    }

    let mut pixels = vec![0u8; config.width as usize * config.height as usize];
    let mut glyphs = BTreeMap::new();

    for bitmap in &bitmaps {
        let expected = bitmap.width as usize * bitmap.height as usize;
        if bitmap.pixels.len() != expected {
            return Err(AtlasError::BitmapSize {
                ch: bitmap.ch,
                expected,
                actual: bitmap.pixels.len(),
            });
        }

        let rect = packer.place(bitmap.ch, bitmap.width, bitmap.height)?;
        blit(&mut pixels, config.width, rect, &bitmap.pixels);
        glyphs.insert(bitmap.ch, Glyph::new(bitmap, rect));
    }

    let used_height = packer.used_height();
    log::debug!(
        "packed {} glyphs into {}x{} atlas ({} rows used)",
        glyphs.len(),
        config.width,
        config.height,
        used_height
    );

    Ok(PackedAtlas { config, glyphs, pixels, used_height })
}

/// Copies a tightly packed single-channel bitmap into `dst` at `rect`.
fn blit(dst: &mut [u8], dst_width: u32, rect: PixelRect, src: &[u8]) {
    if rect.is_empty() {
        return;
    }
    let w = rect.width as usize;
    for (row, src_row) in src.chunks_exact(w).enumerate() {
        let start = (rect.y as usize + row) * dst_width as usize + rect.x as usize;
        dst[start..start + w].copy_from_slice(src_row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(ch: char, w: u32, h: u32) -> GlyphBitmap {
        GlyphBitmap {
            ch,
            width: w,
            height: h,
            bearing_x: 0,
            bearing_y: h as i32,
            advance: w as f32,
            pixels: vec![ch as u8; (w * h) as usize],
        }
    }

    fn config(width: u32, height: u32) -> AtlasConfig {
        AtlasConfig { width, height, padding: 1 }
    }

    // ── shelf placement ───────────────────────────────────────────────────

    #[test]
    fn second_glyph_follows_first_after_padding() {
        let packed = pack_glyphs(vec![bitmap('A', 10, 12), bitmap('B', 10, 12)], config(22, 64)).unwrap();
        assert_eq!(packed.glyphs[&'A'].atlas_position(), (0, 0));
        assert_eq!(packed.glyphs[&'B'].atlas_position(), (11, 0));
    }

    #[test]
    fn third_glyph_opens_new_shelf_below_tallest() {
        let packed = pack_glyphs(
            vec![bitmap('A', 10, 12), bitmap('B', 10, 12), bitmap('C', 10, 12)],
            config(22, 64),
        )
        .unwrap();
        assert_eq!(packed.glyphs[&'C'].atlas_position(), (0, 13));
        assert_eq!(packed.used_height, 25);
    }

    #[test]
    fn shelf_height_tracks_tallest_glyph() {
        let packed = pack_glyphs(
            vec![bitmap('a', 4, 5), bitmap('b', 4, 9), bitmap('c', 4, 3), bitmap('d', 4, 4)],
            config(16, 64),
        )
        .unwrap();
        // a, b, c fill the first shelf (x = 0, 5, 10); d wraps below b's 9 rows.
        assert_eq!(packed.glyphs[&'c'].atlas_position(), (10, 0));
        assert_eq!(packed.glyphs[&'d'].atlas_position(), (0, 10));
    }

    #[test]
    fn input_order_does_not_matter() {
        let forward = pack_glyphs(vec![bitmap('A', 3, 3), bitmap('B', 5, 2), bitmap('C', 7, 4)], config(12, 32)).unwrap();
        let reversed = pack_glyphs(vec![bitmap('C', 7, 4), bitmap('B', 5, 2), bitmap('A', 3, 3)], config(12, 32)).unwrap();
        assert_eq!(forward.glyphs, reversed.glyphs);
        assert_eq!(forward.pixels, reversed.pixels);
    }

    #[test]
    fn blank_glyphs_take_no_space() {
        let packed = pack_glyphs(
            vec![GlyphBitmap::blank(' ', 4.0), bitmap('!', 2, 8)],
            config(16, 16),
        )
        .unwrap();
        assert!(!packed.glyphs[&' '].has_bitmap());
        assert_eq!(packed.glyphs[&'!'].atlas_position(), (0, 0));
    }

    // ── properties ────────────────────────────────────────────────────────

    fn varied_set() -> Vec<GlyphBitmap> {
        (b'!'..=b'~')
            .map(|c| {
                let n = c as u32;
                bitmap(c as char, 3 + n % 9, 4 + (n * 7) % 13)
            })
            .collect()
    }

    #[test]
    fn packing_is_deterministic() {
        let a = pack_glyphs(varied_set(), config(128, 128)).unwrap();
        let b = pack_glyphs(varied_set(), config(128, 128)).unwrap();
        assert_eq!(a.glyphs, b.glyphs);
        assert_eq!(a.pixels, b.pixels);
    }

    #[test]
    fn padded_rects_never_overlap_and_stay_in_bounds() {
        let cfg = config(128, 128);
        let packed = pack_glyphs(varied_set(), cfg).unwrap();
        let rects: Vec<PixelRect> = packed.glyphs.values().map(|g| g.atlas_rect()).collect();
        let bounds = PixelRect::new(0, 0, cfg.width, cfg.height);

        for (i, a) in rects.iter().enumerate() {
            assert!(bounds.contains_rect(*a), "{a:?} escapes the atlas");
            for b in &rects[i + 1..] {
                assert!(!a.padded(cfg.padding).intersects(*b), "{a:?} overlaps {b:?}");
                assert!(!b.padded(cfg.padding).intersects(*a), "{b:?} overlaps {a:?}");
            }
        }
    }

    #[test]
    fn bitmaps_are_copied_to_their_slot() {
        let packed = pack_glyphs(vec![bitmap('A', 2, 2), bitmap('B', 2, 2)], config(8, 4)).unwrap();
        let at = |x: usize, y: usize| packed.pixels[y * 8 + x];
        assert_eq!((at(0, 0), at(1, 1)), (b'A', b'A'));
        assert_eq!(at(2, 0), 0); // gutter
        assert_eq!((at(3, 0), at(4, 1)), (b'B', b'B'));
    }

    // ── failures ──────────────────────────────────────────────────────────

    #[test]
    fn overflow_names_the_offending_glyph() {
        let err = pack_glyphs(
            vec![bitmap('A', 10, 12), bitmap('B', 10, 12), bitmap('C', 10, 12)],
            config(22, 20),
        )
        .unwrap_err();
        assert_eq!(err, AtlasError::Overflow { ch: 'C', width: 22, height: 20 });
    }

    #[test]
    fn glyph_wider_than_atlas_is_rejected() {
        let err = pack_glyphs(vec![bitmap('W', 32, 4)], config(32, 32)).unwrap_err();
        assert_eq!(err, AtlasError::GlyphTooWide { ch: 'W', glyph_width: 32, atlas_width: 32 });
    }

    #[test]
    fn zero_padding_is_rejected() {
        let cfg = AtlasConfig { width: 16, height: 16, padding: 0 };
        assert!(matches!(pack_glyphs(Vec::new(), cfg), Err(AtlasError::InvalidConfig(_))));
    }

    #[test]
    fn duplicate_characters_are_rejected() {
        let err = pack_glyphs(vec![bitmap('A', 2, 2), bitmap('A', 3, 3)], config(16, 16)).unwrap_err();
        assert_eq!(err, AtlasError::DuplicateGlyph('A'));
    }

    #[test]
    fn short_bitmap_is_rejected() {
        let mut bad = bitmap('A', 4, 4);
        bad.pixels.truncate(3);
        let err = pack_glyphs(vec![bad], config(16, 16)).unwrap_err();
        assert_eq!(err, AtlasError::BitmapSize { ch: 'A', expected: 16, actual: 3 });
    }
}
