use std::collections::BTreeMap;

use crate::render::{RenderDevice, TextureFormat, TextureId, TextureSize};

use super::packer::{pack_glyphs, AtlasConfig, PackedAtlas};
use super::{AtlasError, Glyph, GlyphSource};

/// A font's glyphs packed into one device texture.
///
/// Built once at startup and kept for the application's lifetime; rebuilt
/// only through [`reload`](Self::reload). The layout and the full atlas
/// image are computed before any device call, so a failed build never
/// leaves a texture behind.
#[derive(Debug)]
pub struct GlyphAtlas {
    texture: TextureId,
    config: AtlasConfig,
    glyphs: BTreeMap<char, Glyph>,
}

impl GlyphAtlas {
    /// Packs every glyph of `source` and uploads the result as an R8 texture.
    pub fn build<D, S>(device: &mut D, source: &S, config: AtlasConfig) -> Result<Self, AtlasError>
    where
        D: RenderDevice + ?Sized,
        S: GlyphSource + ?Sized,
    {
        let packed = pack_glyphs(source.glyph_bitmaps(), config)?;
        let texture =
            device.create_texture(&packed.pixels, config.width, config.height, TextureFormat::R8)?;

        log::info!(
            "glyph atlas {texture:?}: {} glyphs, {}x{}",
            packed.glyphs.len(),
            config.width,
            config.height
        );

        Ok(Self { texture, config, glyphs: packed.glyphs })
    }

    /// Rebuilds the atlas from a new source.
    ///
    /// The existing texture is rewritten in place when the dimensions are
    /// unchanged; otherwise a new texture replaces it and the destroyed id is
    /// returned, to be passed to
    /// [`FrameRenderer::rebind_atlas`](crate::render::FrameRenderer::rebind_atlas).
    /// On error the atlas is left exactly as it was.
    pub fn reload<D, S>(
        &mut self,
        device: &mut D,
        source: &S,
        config: AtlasConfig,
    ) -> Result<Option<TextureId>, AtlasError>
    where
        D: RenderDevice + ?Sized,
        S: GlyphSource + ?Sized,
    {
        let PackedAtlas { glyphs, pixels, .. } = pack_glyphs(source.glyph_bitmaps(), config)?;

        let replaced = if (config.width, config.height) == (self.config.width, self.config.height) {
            device.update_texture_region(self.texture, self.size().full_rect(), &pixels)?;
            None
        } else {
            let texture =
                device.create_texture(&pixels, config.width, config.height, TextureFormat::R8)?;
            device.destroy_texture(self.texture);
            Some(std::mem::replace(&mut self.texture, texture))
        };

        log::info!("glyph atlas {:?} reloaded: {} glyphs", self.texture, glyphs.len());
        self.config = config;
        self.glyphs = glyphs;
        Ok(replaced)
    }

    /// Releases the atlas texture.
    pub fn release<D: RenderDevice + ?Sized>(self, device: &mut D) {
        device.destroy_texture(self.texture);
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    #[inline]
    pub fn size(&self) -> TextureSize {
        TextureSize::new(self.config.width, self.config.height)
    }

    #[inline]
    pub fn config(&self) -> AtlasConfig {
        self.config
    }

    #[inline]
    pub fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs.get(&ch)
    }

    /// Glyphs in character-code order.
    #[inline]
    pub fn glyphs(&self) -> impl Iterator<Item = &Glyph> {
        self.glyphs.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Pen advance of `text` at `scale`, skipping characters without a glyph.
    pub fn measure(&self, text: &str, scale: f32) -> f32 {
        text.chars()
            .filter_map(|ch| self.glyph(ch))
            .map(|g| g.advance() * scale)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{DeviceCall, RecordingDevice};
    use crate::text::GlyphBitmap;

    fn bitmap(ch: char, w: u32, h: u32, advance: f32) -> GlyphBitmap {
        GlyphBitmap {
            ch,
            width: w,
            height: h,
            bearing_x: 1,
            bearing_y: h as i32,
            advance,
            pixels: vec![255; (w * h) as usize],
        }
    }

    fn source() -> Vec<GlyphBitmap> {
        vec![GlyphBitmap::blank(' ', 4.0), bitmap('A', 10, 12, 11.0), bitmap('B', 10, 12, 10.0)]
    }

    fn config() -> AtlasConfig {
        AtlasConfig { width: 32, height: 32, padding: 1 }
    }

    // ── build ─────────────────────────────────────────────────────────────

    #[test]
    fn build_uploads_one_r8_texture() {
        let mut device = RecordingDevice::new();
        let atlas = GlyphAtlas::build(&mut device, &source(), config()).unwrap();

        assert_eq!(atlas.len(), 3);
        assert_eq!(atlas.size(), TextureSize::new(32, 32));
        assert_eq!(device.texture_format(atlas.texture()), Some(TextureFormat::R8));
        assert_eq!(device.calls(), &[DeviceCall::CreateTexture(atlas.texture(), TextureSize::new(32, 32))]);
        assert_eq!(atlas.glyph('B').map(|g| g.atlas_position()), Some((11, 0)));
        assert!(atlas.glyph('Z').is_none());
    }

    #[test]
    fn failed_build_allocates_nothing() {
        let mut device = RecordingDevice::new();
        let tiny = AtlasConfig { width: 16, height: 8, padding: 1 };
        let err = GlyphAtlas::build(&mut device, &source(), tiny).unwrap_err();

        assert_eq!(err, AtlasError::Overflow { ch: 'A', width: 16, height: 8 });
        assert!(device.calls().is_empty());
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn measure_sums_known_advances() {
        let mut device = RecordingDevice::new();
        let atlas = GlyphAtlas::build(&mut device, &source(), config()).unwrap();
        assert_eq!(atlas.measure("AB A", 2.0), (11.0 + 10.0 + 4.0 + 11.0) * 2.0);
        assert_eq!(atlas.measure("A\u{e9}B", 1.0), 21.0);
    }

    // ── reload ────────────────────────────────────────────────────────────

    #[test]
    fn reload_with_same_size_rewrites_texture_in_place() {
        let mut device = RecordingDevice::new();
        let mut atlas = GlyphAtlas::build(&mut device, &source(), config()).unwrap();
        let texture = atlas.texture();

        let mut bigger = source();
        bigger.push(bitmap('C', 6, 6, 7.0));
        assert_eq!(atlas.reload(&mut device, &bigger, config()).unwrap(), None);

        assert_eq!(atlas.texture(), texture);
        assert_eq!(atlas.len(), 4);
        assert_eq!(
            device.calls().last(),
            Some(&DeviceCall::UpdateTextureRegion(texture, atlas.size().full_rect()))
        );
    }

    #[test]
    fn reload_with_new_size_replaces_texture() {
        let mut device = RecordingDevice::new();
        let mut atlas = GlyphAtlas::build(&mut device, &source(), config()).unwrap();
        let old = atlas.texture();

        let larger = AtlasConfig { width: 64, height: 64, padding: 2 };
        assert_eq!(atlas.reload(&mut device, &source(), larger).unwrap(), Some(old));

        assert_ne!(atlas.texture(), old);
        assert_eq!(atlas.size(), TextureSize::new(64, 64));
        assert!(device.calls().contains(&DeviceCall::DestroyTexture(old)));
        assert_eq!(device.live_textures(), 1);
        assert_eq!(atlas.glyph('B').map(|g| g.atlas_position()), Some((12, 0)));
    }

    #[test]
    fn failed_reload_keeps_previous_atlas() {
        let mut device = RecordingDevice::new();
        let mut atlas = GlyphAtlas::build(&mut device, &source(), config()).unwrap();
        let before = atlas.glyph('A').copied();

        let huge = vec![bitmap('X', 40, 4, 1.0)];
        assert!(atlas.reload(&mut device, &huge, config()).is_err());

        assert_eq!(atlas.glyph('A').copied(), before);
        assert!(atlas.glyph('X').is_none());
        assert_eq!(device.calls().len(), 1);
    }
}
