//! In-memory [`RenderDevice`] that records every call.
//!
//! Slot ids are never reused, so a released slot showing up again is a bug.

use std::collections::{HashMap, HashSet};

use crate::coords::PixelRect;

use super::{
    check_pixels, BufferCapacity, BufferSlot, DeviceError, RenderDevice, RenderState, TextureFormat,
    TextureId, TextureSize, Vertex,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeviceCall {
    CreateTexture(TextureId, TextureSize),
    UpdateTextureRegion(TextureId, PixelRect),
    DestroyTexture(TextureId),
    CreateBufferSlot(BufferSlot),
    DestroyBufferSlot(BufferSlot),
    ResizeBuffer(BufferSlot, BufferCapacity),
    UploadBuffer { slot: BufferSlot, texture: TextureId, vertices: usize, indices: usize },
    SetRenderState(RenderState, TextureId),
    DrawIndexed(BufferSlot, u32),
}

struct RecordedTexture {
    size: TextureSize,
    format: TextureFormat,
}

#[derive(Default)]
pub(crate) struct RecordingDevice {
    calls: Vec<DeviceCall>,
    textures: HashMap<TextureId, RecordedTexture>,
    slots: HashSet<BufferSlot>,
    buffers: HashMap<BufferSlot, BufferCapacity>,
    next_texture: u32,
    next_slot: usize,
}

impl RecordingDevice {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub(crate) fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    pub(crate) fn texture_format(&self, id: TextureId) -> Option<TextureFormat> {
        self.textures.get(&id).map(|t| t.format)
    }

    pub(crate) fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub(crate) fn live_slots(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn draw_calls(&self) -> Vec<(BufferSlot, u32)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::DrawIndexed(slot, n) => Some((*slot, *n)),
                _ => None,
            })
            .collect()
    }
}

impl RenderDevice for RecordingDevice {
    fn create_texture(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<TextureId, DeviceError> {
        if width == 0 || height == 0 {
            return Err(DeviceError::EmptyTexture { width, height });
        }
        check_pixels(width, height, format, pixels)?;

        let id = TextureId::new(self.next_texture);
        self.next_texture += 1;
        let size = TextureSize::new(width, height);
        self.textures.insert(id, RecordedTexture { size, format });
        self.calls.push(DeviceCall::CreateTexture(id, size));
        Ok(id)
    }

    fn update_texture_region(
        &mut self,
        texture: TextureId,
        region: PixelRect,
        pixels: &[u8],
    ) -> Result<(), DeviceError> {
        let tex = self.textures.get(&texture).ok_or(DeviceError::UnknownTexture(texture))?;
        if !tex.size.full_rect().contains_rect(region) {
            return Err(DeviceError::RegionOutOfBounds { texture, region });
        }
        check_pixels(region.width, region.height, tex.format, pixels)?;
        self.calls.push(DeviceCall::UpdateTextureRegion(texture, region));
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
        self.calls.push(DeviceCall::DestroyTexture(texture));
    }

    fn create_buffer_slot(&mut self) -> BufferSlot {
        let slot = BufferSlot(self.next_slot);
        self.next_slot += 1;
        self.slots.insert(slot);
        self.calls.push(DeviceCall::CreateBufferSlot(slot));
        slot
    }

    fn destroy_buffer_slot(&mut self, slot: BufferSlot) {
        self.slots.remove(&slot);
        self.buffers.remove(&slot);
        self.calls.push(DeviceCall::DestroyBufferSlot(slot));
    }

    fn resize_buffer(
        &mut self,
        slot: BufferSlot,
        capacity: BufferCapacity,
    ) -> Result<(), DeviceError> {
        if !self.slots.contains(&slot) {
            return Err(DeviceError::UnknownSlot(slot));
        }
        self.buffers.insert(slot, capacity);
        self.calls.push(DeviceCall::ResizeBuffer(slot, capacity));
        Ok(())
    }

    fn upload_buffer(
        &mut self,
        slot: BufferSlot,
        texture: TextureId,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), DeviceError> {
        if !self.slots.contains(&slot) {
            return Err(DeviceError::UnknownSlot(slot));
        }
        let capacity = self.buffers.get(&slot).copied().unwrap_or_default();
        if !capacity.fits(vertices.len(), indices.len()) {
            return Err(DeviceError::CapacityExceeded {
                slot,
                capacity,
                vertices: vertices.len(),
                indices: indices.len(),
            });
        }
        if !self.textures.contains_key(&texture) {
            return Err(DeviceError::UnknownTexture(texture));
        }
        assert!(
            indices.iter().all(|&i| (i as usize) < vertices.len()),
            "uploaded index out of vertex range"
        );
        self.calls.push(DeviceCall::UploadBuffer {
            slot,
            texture,
            vertices: vertices.len(),
            indices: indices.len(),
        });
        Ok(())
    }

    fn set_render_state(&mut self, state: RenderState, texture: TextureId) {
        self.calls.push(DeviceCall::SetRenderState(state, texture));
    }

    fn draw_indexed(&mut self, slot: BufferSlot, index_count: u32) {
        self.calls.push(DeviceCall::DrawIndexed(slot, index_count));
    }
}
