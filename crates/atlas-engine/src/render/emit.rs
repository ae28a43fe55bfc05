//! Geometry emitters.
//!
//! Stateless functions that triangulate draw requests into a
//! [`GeometryBuffer`]. Positions are logical pixels (top-left origin, +Y
//! down) at depth 0; UVs are normalised against the buffer's texture size.

use std::f32::consts::TAU;

use crate::coords::{PixelRect, Vec2};
use crate::paint::Color;
use crate::text::GlyphAtlas;

use super::{GeometryBuffer, TextureSize, Vertex};

/// Normalised `(u0, v0, u1, v1)` of `rect` inside a texture of `size`.
#[inline]
pub fn normalized_uv(rect: PixelRect, size: TextureSize) -> [f32; 4] {
    let w = size.width.max(1) as f32;
    let h = size.height.max(1) as f32;
    [
        rect.x as f32 / w,
        rect.y as f32 / h,
        rect.right() as f32 / w,
        rect.bottom() as f32 / h,
    ]
}

/// Appends one textured quad covering `top_left .. top_left + size`.
///
/// `flip_x` / `flip_y` mirror the sampled region by swapping UV pairs; the
/// positions are never touched. Zero or negative sizes still append a
/// (degenerate) quad.
pub fn emit_rect(
    buffer: &mut GeometryBuffer,
    top_left: Vec2,
    size: Vec2,
    atlas_rect: PixelRect,
    color: Color,
    flip_x: bool,
    flip_y: bool,
) {
    let [mut u0, mut v0, mut u1, mut v1] = normalized_uv(atlas_rect, buffer.texture_size());
    if flip_x {
        std::mem::swap(&mut u0, &mut u1);
    }
    if flip_y {
        std::mem::swap(&mut v0, &mut v1);
    }

    let (x0, y0) = (top_left.x, top_left.y);
    let (x1, y1) = (x0 + size.x, y0 + size.y);
    let c = color.to_array();

    buffer.append_quad([
        Vertex::new([x0, y0, 0.0], [u0, v0], c),
        Vertex::new([x0, y1, 0.0], [u0, v1], c),
        Vertex::new([x1, y1, 0.0], [u1, v1], c),
        Vertex::new([x1, y0, 0.0], [u1, v0], c),
    ]);
}

/// Appends a filled circle as a fan of `segments` triangles around a center
/// vertex.
///
/// UVs map the circle's bounding square onto the full texture.
///
/// # Panics
/// In debug builds, if `segments < 3`. Release builds log and emit nothing.
pub fn emit_circle(
    buffer: &mut GeometryBuffer,
    center: Vec2,
    radius: f32,
    segments: u32,
    color: Color,
) {
    if segments < 3 {
        debug_assert!(segments >= 3, "emit_circle needs at least 3 segments, got {segments}");
        log::warn!("emit_circle called with {segments} segments, nothing emitted");
        return;
    }

    let c = color.to_array();
    let n = segments as usize;

    let mut vertices = Vec::with_capacity(n + 1);
    vertices.push(Vertex::new(center.extend(0.0), [0.5, 0.5], c));
    for i in 0..n {
        let (sin, cos) = (TAU * i as f32 / n as f32).sin_cos();
        vertices.push(Vertex::new(
            [center.x + radius * cos, center.y - radius * sin, 0.0],
            [0.5 + 0.5 * cos, 0.5 - 0.5 * sin],
            c,
        ));
    }

    let mut indices = Vec::with_capacity(n * 3);
    for i in 0..segments {
        indices.extend_from_slice(&[0, 1 + i, 1 + (i + 1) % segments]);
    }

    buffer.append_triangles(&vertices, &indices);
}

/// Lays `text` out on a single baseline starting at `pen` and appends one
/// quad per visible glyph. Returns the pen position after the last glyph.
///
/// Characters missing from the atlas are skipped without moving the pen.
/// Blank glyphs (space) only advance it. No wrapping, no kerning.
pub fn emit_glyph_run(
    buffer: &mut GeometryBuffer,
    atlas: &GlyphAtlas,
    text: &str,
    mut pen: Vec2,
    scale: f32,
    color: Color,
) -> Vec2 {
    debug_assert_eq!(buffer.texture(), atlas.texture(), "glyph run batched against a foreign texture");

    for ch in text.chars() {
        let Some(glyph) = atlas.glyph(ch) else {
            log::trace!("no glyph for {ch:?}, skipped");
            continue;
        };

        if glyph.has_bitmap() {
            let bearing = glyph.bearing();
            let top_left = Vec2::new(pen.x + bearing.x * scale, pen.y - bearing.y * scale);
            emit_rect(buffer, top_left, glyph.size() * scale, glyph.atlas_rect(), color, false, false);
        }

        pen.x += glyph.advance() * scale;
    }

    pen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::RecordingDevice;
    use crate::render::{BatchKey, RenderState, TextureId};
    use crate::text::{AtlasConfig, GlyphBitmap};

    fn buffer(texture: TextureId, size: TextureSize) -> GeometryBuffer {
        GeometryBuffer::new(BatchKey::new(texture, RenderState::AlphaBlended), size)
    }

    fn positions(buffer: &GeometryBuffer) -> Vec<[f32; 3]> {
        buffer.vertices().iter().map(|v| v.position).collect()
    }

    fn uvs(buffer: &GeometryBuffer) -> Vec<[f32; 2]> {
        buffer.vertices().iter().map(|v| v.uv).collect()
    }

    // ── emit_rect ─────────────────────────────────────────────────────────

    #[test]
    fn rect_normalises_uvs_against_texture_size() {
        let mut b = buffer(TextureId::new(0), TextureSize::new(64, 32));
        emit_rect(&mut b, Vec2::new(10.0, 20.0), Vec2::new(16.0, 8.0), PixelRect::new(16, 8, 32, 16), Color::WHITE, false, false);

        assert_eq!(
            positions(&b),
            vec![[10.0, 20.0, 0.0], [10.0, 28.0, 0.0], [26.0, 28.0, 0.0], [26.0, 20.0, 0.0]]
        );
        assert_eq!(uvs(&b), vec![[0.25, 0.25], [0.25, 0.75], [0.75, 0.75], [0.75, 0.25]]);
        assert_eq!(b.indices(), &[0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn flip_x_swaps_only_horizontal_uvs() {
        let src = PixelRect::new(0, 0, 32, 32);
        let mut plain = buffer(TextureId::new(0), TextureSize::new(64, 64));
        let mut flipped = buffer(TextureId::new(0), TextureSize::new(64, 64));
        emit_rect(&mut plain, Vec2::new(5.0, 5.0), Vec2::splat(10.0), src, Color::WHITE, false, false);
        emit_rect(&mut flipped, Vec2::new(5.0, 5.0), Vec2::splat(10.0), src, Color::WHITE, true, false);

        assert_eq!(positions(&plain), positions(&flipped));
        for (p, f) in uvs(&plain).iter().zip(uvs(&flipped)) {
            assert_eq!(p[1], f[1]);
            assert_eq!(p[0], 0.5 - f[0]);
        }
    }

    #[test]
    fn flip_y_swaps_only_vertical_uvs() {
        let mut b = buffer(TextureId::new(0), TextureSize::new(4, 4));
        emit_rect(&mut b, Vec2::zero(), Vec2::splat(4.0), PixelRect::new(0, 0, 4, 4), Color::WHITE, false, true);
        assert_eq!(uvs(&b), vec![[0.0, 1.0], [0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
        assert_eq!(positions(&b)[0], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn degenerate_rect_is_still_appended() {
        let mut b = buffer(TextureId::new(0), TextureSize::new(1, 1));
        emit_rect(&mut b, Vec2::new(3.0, 3.0), Vec2::zero(), PixelRect::new(0, 0, 1, 1), Color::WHITE, false, false);
        emit_rect(&mut b, Vec2::new(3.0, 3.0), Vec2::new(-2.0, 4.0), PixelRect::new(0, 0, 1, 1), Color::WHITE, false, false);
        assert_eq!(b.vertex_count(), 8);
        assert_eq!(b.index_count(), 12);
    }

    #[test]
    fn rect_carries_premultiplied_color() {
        let mut b = buffer(TextureId::new(0), TextureSize::new(1, 1));
        let color = Color::from_straight(1.0, 0.0, 0.0, 0.5);
        emit_rect(&mut b, Vec2::zero(), Vec2::splat(1.0), PixelRect::new(0, 0, 1, 1), color, false, false);
        assert!(b.vertices().iter().all(|v| v.color == [0.5, 0.0, 0.0, 0.5]));
    }

    // ── emit_circle ───────────────────────────────────────────────────────

    #[test]
    fn circle_of_eight_is_a_fan_around_center() {
        let mut b = buffer(TextureId::new(0), TextureSize::new(1, 1));
        emit_circle(&mut b, Vec2::new(50.0, 50.0), 10.0, 8, Color::WHITE);

        assert_eq!(b.vertex_count(), 9);
        assert_eq!(b.index_count(), 24);
        for tri in b.indices().chunks_exact(3) {
            assert_eq!(tri[0], 0);
        }
        assert_eq!(&b.indices()[21..], &[0, 8, 1]);
        assert_eq!(b.vertices()[0].position, [50.0, 50.0, 0.0]);
    }

    #[test]
    fn circle_rim_starts_right_and_turns_up_screen() {
        let mut b = buffer(TextureId::new(0), TextureSize::new(1, 1));
        emit_circle(&mut b, Vec2::new(0.0, 0.0), 10.0, 4, Color::WHITE);

        let rim = &b.vertices()[1..];
        let close = |a: [f32; 3], b: [f32; 2]| (a[0] - b[0]).abs() < 1e-4 && (a[1] - b[1]).abs() < 1e-4;
        assert!(close(rim[0].position, [10.0, 0.0]));
        assert!(close(rim[1].position, [0.0, -10.0]));
        assert!(close(rim[2].position, [-10.0, 0.0]));
        assert!(close(rim[3].position, [0.0, 10.0]));
    }

    #[test]
    fn circle_appends_after_existing_geometry() {
        let mut b = buffer(TextureId::new(0), TextureSize::new(1, 1));
        emit_rect(&mut b, Vec2::zero(), Vec2::splat(1.0), PixelRect::new(0, 0, 1, 1), Color::WHITE, false, false);
        emit_circle(&mut b, Vec2::zero(), 1.0, 3, Color::WHITE);
        assert_eq!(&b.indices()[6..9], &[4, 5, 6]);
        assert!(b.indices().iter().all(|&i| (i as usize) < b.vertex_count()));
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "at least 3 segments"))]
    fn circle_with_two_segments_is_rejected() {
        let mut b = buffer(TextureId::new(0), TextureSize::new(1, 1));
        emit_circle(&mut b, Vec2::zero(), 1.0, 2, Color::WHITE);
        assert!(b.is_empty());
    }

    // ── emit_glyph_run ────────────────────────────────────────────────────

    fn atlas(device: &mut RecordingDevice) -> GlyphAtlas {
        let a = GlyphBitmap {
            ch: 'A',
            width: 10,
            height: 12,
            bearing_x: 1,
            bearing_y: 12,
            advance: 11.0,
            pixels: vec![255; 120],
        };
        let source = vec![GlyphBitmap::blank(' ', 4.0), a];
        GlyphAtlas::build(device, &source, AtlasConfig { width: 32, height: 32, padding: 1 }).unwrap()
    }

    #[test]
    fn glyph_quad_sits_on_baseline() {
        let mut device = RecordingDevice::new();
        let atlas = atlas(&mut device);
        let mut b = buffer(atlas.texture(), atlas.size());

        let pen = emit_glyph_run(&mut b, &atlas, "A", Vec2::new(100.0, 50.0), 2.0, Color::WHITE);

        assert_eq!(pen, Vec2::new(122.0, 50.0));
        assert_eq!(positions(&b)[0], [102.0, 26.0, 0.0]);
        assert_eq!(positions(&b)[2], [122.0, 50.0, 0.0]);
        assert_eq!(uvs(&b)[2], [10.0 / 32.0, 12.0 / 32.0]);
    }

    #[test]
    fn blank_glyph_advances_without_geometry() {
        let mut device = RecordingDevice::new();
        let atlas = atlas(&mut device);
        let mut b = buffer(atlas.texture(), atlas.size());

        let pen = emit_glyph_run(&mut b, &atlas, "A A", Vec2::zero(), 1.0, Color::WHITE);

        assert_eq!(pen.x, 11.0 + 4.0 + 11.0);
        assert_eq!(b.vertex_count(), 8);
        assert_eq!(positions(&b)[4][0], 16.0);
    }

    #[test]
    fn missing_glyph_is_skipped_and_pen_holds() {
        let mut device = RecordingDevice::new();
        let atlas = atlas(&mut device);
        let mut b = buffer(atlas.texture(), atlas.size());

        let pen = emit_glyph_run(&mut b, &atlas, "\u{e9}A\u{7f}", Vec2::new(1.0, 2.0), 1.0, Color::WHITE);

        assert_eq!(pen, Vec2::new(12.0, 2.0));
        assert_eq!(b.vertex_count(), 4);
        assert_eq!(b.index_count() * 2, b.vertex_count() * 3);
    }

    #[test]
    fn empty_text_returns_origin() {
        let mut device = RecordingDevice::new();
        let atlas = atlas(&mut device);
        let mut b = buffer(atlas.texture(), atlas.size());
        assert_eq!(emit_glyph_run(&mut b, &atlas, "", Vec2::new(7.0, 9.0), 3.0, Color::WHITE), Vec2::new(7.0, 9.0));
        assert!(b.is_empty());
    }
}
