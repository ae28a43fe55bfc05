//! Device binding seam.
//!
//! The batch engine never talks to wgpu directly; it drives a
//! [`RenderDevice`]. [`WgpuDevice`](super::WgpuDevice) is the production
//! implementation, tests use a recording double.

use crate::coords::PixelRect;

use super::Vertex;

/// Opaque handle to a texture owned by a [`RenderDevice`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureId(u32);

impl TextureId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Texture dimensions in texels.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct TextureSize {
    pub width: u32,
    pub height: u32,
}

impl TextureSize {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The whole texture as a rectangle.
    #[inline]
    pub const fn full_rect(self) -> PixelRect {
        PixelRect::new(0, 0, self.width, self.height)
    }
}

/// Pixel layout of texture uploads.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    /// Premultiplied RGBA, 4 bytes per texel.
    Rgba8,
    /// Single coverage channel, 1 byte per texel (glyph atlases).
    R8,
}

impl TextureFormat {
    #[inline]
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::R8 => 1,
        }
    }
}

/// Render-state tag carried by every batch.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RenderState {
    /// World layer: no blending, depth-tested (`LessEqual`) and depth-written.
    Opaque,
    /// UI / text layer: premultiplied alpha blending, no depth test or write.
    AlphaBlended,
}

impl RenderState {
    #[inline]
    pub const fn depth_tested(self) -> bool {
        matches!(self, RenderState::Opaque)
    }

    #[inline]
    pub const fn blended(self) -> bool {
        matches!(self, RenderState::AlphaBlended)
    }
}

/// Device-side geometry buffer slot, handed out by
/// [`RenderDevice::create_buffer_slot`]. Unique per device, so several
/// renderers can share one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BufferSlot(pub usize);

/// Element capacity of a device-side geometry buffer.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BufferCapacity {
    pub vertices: usize,
    pub indices: usize,
}

impl BufferCapacity {
    /// Smallest allocation ever requested, in elements.
    pub const MIN_ELEMENTS: usize = 64;

    #[inline]
    pub const fn new(vertices: usize, indices: usize) -> Self {
        Self { vertices, indices }
    }

    #[inline]
    pub const fn fits(self, vertices: usize, indices: usize) -> bool {
        vertices <= self.vertices && indices <= self.indices
    }

    /// Capacity needed to hold `vertices` / `indices`, never smaller than `self`.
    ///
    /// Each side grows to the next power of two so that slowly growing frames
    /// trigger a logarithmic number of reallocations.
    pub fn grown_for(self, vertices: usize, indices: usize) -> Self {
        let grow = |current: usize, required: usize| {
            if required <= current {
                current
            } else {
                required.next_power_of_two().max(Self::MIN_ELEMENTS)
            }
        };
        Self {
            vertices: grow(self.vertices, vertices),
            indices: grow(self.indices, indices),
        }
    }
}

/// Errors reported by a [`RenderDevice`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    #[error("texture must have a non-zero size, got {width}x{height}")]
    EmptyTexture { width: u32, height: u32 },

    #[error("pixel data is {actual} bytes, expected {expected}")]
    PixelSizeMismatch { expected: usize, actual: usize },

    #[error("region {region:?} lies outside texture {texture:?}")]
    RegionOutOfBounds { texture: TextureId, region: PixelRect },

    #[error("unknown buffer slot {0:?}")]
    UnknownSlot(BufferSlot),

    #[error("upload of {vertices} vertices / {indices} indices exceeds {slot:?} capacity {capacity:?}")]
    CapacityExceeded {
        slot: BufferSlot,
        capacity: BufferCapacity,
        vertices: usize,
        indices: usize,
    },
}

/// Checks that `pixels` holds exactly `width * height` texels of `format`.
pub fn check_pixels(
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: &[u8],
) -> Result<(), DeviceError> {
    let expected = width as usize * height as usize * format.bytes_per_texel();
    if pixels.len() != expected {
        return Err(DeviceError::PixelSizeMismatch { expected, actual: pixels.len() });
    }
    Ok(())
}

/// Graphics device capabilities consumed by the batch engine.
///
/// Calls happen on the thread that owns the device; nothing here is
/// reentrant.
pub trait RenderDevice {
    /// Creates a texture initialised with `pixels` (tightly packed rows).
    fn create_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureId, DeviceError>;

    /// Overwrites `region` of an existing texture. `pixels` uses the
    /// texture's own format.
    fn update_texture_region(
        &mut self,
        texture: TextureId,
        region: PixelRect,
        pixels: &[u8],
    ) -> Result<(), DeviceError>;

    /// Releases a texture. Unknown ids are ignored.
    fn destroy_texture(&mut self, texture: TextureId);

    /// Reserves a geometry slot owned by the caller. It has no storage until
    /// the first [`resize_buffer`](Self::resize_buffer).
    fn create_buffer_slot(&mut self) -> BufferSlot;

    /// Releases a slot and its storage. Unknown slots are ignored.
    fn destroy_buffer_slot(&mut self, slot: BufferSlot);

    /// (Re)allocates the geometry buffer behind `slot`. Previous contents
    /// are discarded.
    fn resize_buffer(&mut self, slot: BufferSlot, capacity: BufferCapacity)
        -> Result<(), DeviceError>;

    /// Writes geometry into the existing allocation of `slot`.
    fn upload_buffer(
        &mut self,
        slot: BufferSlot,
        texture: TextureId,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), DeviceError>;

    /// Selects pipeline state and texture for subsequent draws.
    fn set_render_state(&mut self, state: RenderState, texture: TextureId);

    /// Issues an indexed triangle-list draw of the first `index_count`
    /// indices in `slot`.
    fn draw_indexed(&mut self, slot: BufferSlot, index_count: u32);
}
