use std::collections::HashMap;

use crate::coords::{PixelRect, Vec2};
use crate::paint::Color;
use crate::text::GlyphAtlas;

use super::emit::{emit_circle, emit_glyph_run, emit_rect};
use super::{
    BatchStore, BufferHandle, BufferSlot, DeviceError, GeometryBuffer, RenderDevice, RenderState,
    TextureFormat, TextureId, TextureSize,
};

/// Where a [`FrameRenderer`] is in its per-frame cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FramePhase {
    Idle,
    Accumulating,
    Uploading,
    Drawing,
    Cleared,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RendererConfig {
    /// Rim vertices used by [`FrameRenderer::draw_circle`].
    pub circle_segments: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self { circle_segments: 32 }
    }
}

/// Counters for one submitted frame.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FrameStats {
    pub draw_calls: usize,
    pub vertices: usize,
    pub indices: usize,
    /// Device buffers reallocated because the frame outgrew them.
    pub buffers_grown: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to grow geometry buffer {slot:?}")]
    Resize {
        slot: BufferSlot,
        #[source]
        source: DeviceError,
    },

    #[error("failed to upload geometry buffer {slot:?}")]
    Upload {
        slot: BufferSlot,
        #[source]
        source: DeviceError,
    },
}

/// A sprite draw: a sub-rectangle of a bound texture stretched over a
/// screen-space quad.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sprite {
    pub texture: TextureId,
    /// Source region in texels.
    pub src: PixelRect,
    pub top_left: Vec2,
    pub size: Vec2,
    pub color: Color,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Sprite {
    pub fn new(texture: TextureId, src: PixelRect, top_left: Vec2, size: Vec2) -> Self {
        Self { texture, src, top_left, size, color: Color::WHITE, flip_x: false, flip_y: false }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn flipped(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }
}

/// Immediate-mode batch renderer.
///
/// Owns the [`BatchStore`] and the registry of textures it may batch
/// against. Each frame runs `begin_frame` → draw calls → `end_frame`, which
/// uploads every non-empty batch, draws them in the order they were first
/// used this frame and empties them again.
///
/// Device slots are allocated by the device, so several renderers may share
/// one.
#[derive(Debug)]
pub struct FrameRenderer {
    config: RendererConfig,
    batches: BatchStore,
    textures: HashMap<TextureId, TextureSize>,
    white: TextureId,
    phase: FramePhase,
    last_stats: FrameStats,

    /// Slots of dropped batches, released at the next `end_frame`.
    retired: Vec<BufferSlot>,
}

impl FrameRenderer {
    /// Creates the renderer along with its 1×1 white texture used by
    /// untextured primitives.
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        config: RendererConfig,
    ) -> Result<Self, DeviceError> {
        let white = device.create_texture(&[255; 4], 1, 1, TextureFormat::Rgba8)?;
        let mut textures = HashMap::new();
        textures.insert(white, TextureSize::new(1, 1));

        Ok(Self {
            config,
            batches: BatchStore::new(),
            textures,
            white,
            phase: FramePhase::Idle,
            last_stats: FrameStats::default(),
            retired: Vec::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> RendererConfig {
        self.config
    }

    #[inline]
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    #[inline]
    pub fn white_texture(&self) -> TextureId {
        self.white
    }

    #[inline]
    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Makes `texture` available for batching. Binding a known id again
    /// updates its size.
    pub fn bind_texture(&mut self, texture: TextureId, size: TextureSize) {
        self.textures.insert(texture, size);
    }

    /// Binds the atlas texture so text can be batched against it.
    pub fn bind_atlas(&mut self, atlas: &GlyphAtlas) {
        self.bind_texture(atlas.texture(), atlas.size());
    }

    /// Follows a [`GlyphAtlas::reload`]: drops `previous` and its batches
    /// when the atlas moved to a new texture, then binds the atlas at its
    /// current size.
    pub fn rebind_atlas(&mut self, previous: TextureId, atlas: &GlyphAtlas) {
        if previous != atlas.texture() {
            self.unbind_texture(previous);
        }
        self.bind_atlas(atlas);
    }

    /// Removes `texture` from the registry and drops its batches. Their
    /// device slots are released at the next [`end_frame`](Self::end_frame).
    ///
    /// # Panics
    /// During a frame.
    pub fn unbind_texture(&mut self, texture: TextureId) {
        self.expect_between_frames("unbind_texture");
        if texture == self.white {
            return;
        }
        self.textures.remove(&texture);
        self.retired.extend(self.batches.remove_texture(texture));
    }

    #[inline]
    pub fn is_bound(&self, texture: TextureId) -> bool {
        self.textures.contains_key(&texture)
    }

    pub fn begin_frame(&mut self) {
        if self.phase == FramePhase::Cleared {
            self.phase = FramePhase::Idle;
        }
        assert_eq!(self.phase, FramePhase::Idle, "begin_frame called while a frame is in flight");
        self.phase = FramePhase::Accumulating;
    }

    /// Buffer for `(texture, state)`. The first request in a frame places it
    /// at the end of this frame's draw order.
    ///
    /// # Panics
    /// Outside of a frame, or if `texture` was never bound.
    pub fn batch(&mut self, texture: TextureId, state: RenderState) -> BufferHandle {
        self.expect_phase(FramePhase::Accumulating, "batch");
        let Some(&size) = self.textures.get(&texture) else {
            panic!("batch requested for unbound texture {texture:?}");
        };
        self.batches.get_or_create(texture, size, state)
    }

    /// # Panics
    /// Outside of a frame, or if `handle` predates [`reset_batches`](Self::reset_batches).
    pub fn buffer_mut(&mut self, handle: BufferHandle) -> &mut GeometryBuffer {
        self.expect_phase(FramePhase::Accumulating, "buffer_mut");
        self.batches.get_mut(handle)
    }

    #[inline]
    pub fn batches(&self) -> &BatchStore {
        &self.batches
    }

    pub fn draw_sprite(&mut self, state: RenderState, sprite: &Sprite) {
        let handle = self.batch(sprite.texture, state);
        emit_rect(
            self.batches.get_mut(handle),
            sprite.top_left,
            sprite.size,
            sprite.src,
            sprite.color,
            sprite.flip_x,
            sprite.flip_y,
        );
    }

    pub fn draw_solid_rect(&mut self, state: RenderState, top_left: Vec2, size: Vec2, color: Color) {
        let handle = self.batch(self.white, state);
        let full = TextureSize::new(1, 1).full_rect();
        emit_rect(self.batches.get_mut(handle), top_left, size, full, color, false, false);
    }

    pub fn draw_circle(&mut self, state: RenderState, center: Vec2, radius: f32, color: Color) {
        let handle = self.batch(self.white, state);
        let segments = self.config.circle_segments;
        emit_circle(self.batches.get_mut(handle), center, radius, segments, color);
    }

    /// Draws `text` with its baseline at `pen.y`. Returns the pen position
    /// after the run.
    ///
    /// # Panics
    /// If the atlas texture was not bound with [`bind_atlas`](Self::bind_atlas).
    pub fn draw_text(
        &mut self,
        state: RenderState,
        atlas: &GlyphAtlas,
        text: &str,
        pen: Vec2,
        scale: f32,
        color: Color,
    ) -> Vec2 {
        let handle = self.batch(atlas.texture(), state);
        emit_glyph_run(self.batches.get_mut(handle), atlas, text, pen, scale, color)
    }

    /// Uploads and draws everything accumulated since
    /// [`begin_frame`](Self::begin_frame), then empties every batch.
    ///
    /// Batches are drawn in the order they were first requested this frame;
    /// empty ones issue no calls. The geometry is discarded even when the
    /// device reports an error.
    pub fn end_frame<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<FrameStats, FrameError> {
        self.expect_phase(FramePhase::Accumulating, "end_frame");

        self.phase = FramePhase::Uploading;
        let result = match self.upload(device) {
            Ok(mut stats) => {
                self.phase = FramePhase::Drawing;
                stats.draw_calls = self.draw(device);
                log::debug!(
                    "frame: {} draws, {} vertices, {} indices, {} buffers grown",
                    stats.draw_calls,
                    stats.vertices,
                    stats.indices,
                    stats.buffers_grown
                );
                self.last_stats = stats;
                Ok(stats)
            }
            err => err,
        };

        self.batches.clear_all();
        self.phase = FramePhase::Cleared;
        result
    }

    /// Drops every batch. Their device slots are released at the next
    /// [`end_frame`](Self::end_frame).
    ///
    /// # Panics
    /// During a frame.
    pub fn reset_batches(&mut self) {
        self.expect_between_frames("reset_batches");
        self.retired.extend(self.batches.reset());
    }

    fn upload<D: RenderDevice + ?Sized>(&mut self, device: &mut D) -> Result<FrameStats, FrameError> {
        for slot in self.retired.drain(..) {
            device.destroy_buffer_slot(slot);
        }

        let mut stats = FrameStats::default();
        for position in 0..self.batches.frame_len() {
            let buffer = self.batches.frame_buffer_mut(position);
            if buffer.is_empty() {
                continue;
            }
            let slot = buffer.slot_or_create(|| device.create_buffer_slot());

            if let Some(capacity) = buffer.reserve_gpu() {
                log::debug!("growing {slot:?} to {capacity:?}");
                if let Err(source) = device.resize_buffer(slot, capacity) {
                    buffer.forget_gpu();
                    return Err(FrameError::Resize { slot, source });
                }
                stats.buffers_grown += 1;
            }

            device
                .upload_buffer(slot, buffer.texture(), buffer.vertices(), buffer.indices())
                .map_err(|source| FrameError::Upload { slot, source })?;

            stats.vertices += buffer.vertex_count();
            stats.indices += buffer.index_count();
        }

        Ok(stats)
    }

    fn draw<D: RenderDevice + ?Sized>(&self, device: &mut D) -> usize {
        let mut draws = 0;
        for buffer in self.batches.frame_iter() {
            let Some(slot) = buffer.gpu_slot().filter(|_| !buffer.is_empty()) else {
                continue;
            };
            device.set_render_state(buffer.state(), buffer.texture());
            device.draw_indexed(slot, buffer.index_count() as u32);
            draws += 1;
        }
        draws
    }

    #[inline]
    fn expect_phase(&self, expected: FramePhase, op: &str) {
        assert_eq!(self.phase, expected, "{op} called in phase {:?}", self.phase);
    }

    #[inline]
    fn expect_between_frames(&self, op: &str) {
        assert!(
            matches!(self.phase, FramePhase::Idle | FramePhase::Cleared),
            "{op} called during a frame ({:?})",
            self.phase
        );
    }
}
