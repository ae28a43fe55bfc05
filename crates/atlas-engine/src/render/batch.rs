use std::collections::HashMap;

use super::{BufferCapacity, BufferSlot, RenderState, TextureId, TextureSize, Vertex};

/// Identity of a batch: one geometry buffer per (texture, render state).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BatchKey {
    pub texture: TextureId,
    pub state: RenderState,
}

impl BatchKey {
    #[inline]
    pub const fn new(texture: TextureId, state: RenderState) -> Self {
        Self { texture, state }
    }
}

/// Handle to a buffer inside a [`BatchStore`].
///
/// Valid until the store is [`reset`](BatchStore::reset); using it afterwards
/// panics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferHandle {
    index: u32,
    generation: u32,
}

impl BufferHandle {
    /// Storage index of the buffer. Stable until the store is reset or a
    /// texture's batches are removed; unrelated to draw order.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

/// Growable vertex/index lists for one batch.
///
/// Indices are local to this buffer: every append offsets them by the
/// buffer's own vertex count, so independent buffers never share numbering.
#[derive(Debug)]
pub struct GeometryBuffer {
    key: BatchKey,
    texture_size: TextureSize,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,

    /// Device slot and capacity of the allocation backing this batch.
    gpu_slot: Option<BufferSlot>,
    gpu_capacity: BufferCapacity,

    /// Set once the batch has been requested in the current frame.
    in_frame: bool,
}

impl GeometryBuffer {
    pub fn new(key: BatchKey, texture_size: TextureSize) -> Self {
        Self {
            key,
            texture_size,
            vertices: Vec::new(),
            indices: Vec::new(),
            gpu_slot: None,
            gpu_capacity: BufferCapacity::default(),
            in_frame: false,
        }
    }

    #[inline]
    pub fn key(&self) -> BatchKey {
        self.key
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.key.texture
    }

    #[inline]
    pub fn state(&self) -> RenderState {
        self.key.state
    }

    /// Pixel size of the bound texture, used to normalise UVs.
    #[inline]
    pub fn texture_size(&self) -> TextureSize {
        self.texture_size
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn gpu_slot(&self) -> Option<BufferSlot> {
        self.gpu_slot
    }

    #[inline]
    pub fn gpu_capacity(&self) -> BufferCapacity {
        self.gpu_capacity
    }

    /// Appends a quad as two triangles `(0,1,2)` and `(2,3,0)`.
    ///
    /// Corners are expected in counter-clockwise screen order
    /// (top-left, bottom-left, bottom-right, top-right).
    pub fn append_quad(&mut self, quad: [Vertex; 4]) {
        self.append_triangles(&quad, &[0, 1, 2, 2, 3, 0]);
    }

    /// Appends arbitrary triangles. `local_indices` refer to `vertices`
    /// starting at zero and are rebased onto this buffer's vertex count.
    pub fn append_triangles(&mut self, vertices: &[Vertex], local_indices: &[u32]) {
        debug_assert!(local_indices.len() % 3 == 0, "triangle list needs a multiple of 3 indices");
        debug_assert!(
            local_indices.iter().all(|&i| (i as usize) < vertices.len()),
            "local index out of range"
        );

        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);
        self.indices.extend(local_indices.iter().map(|&i| base + i));
    }

    /// Empties the geometry. CPU and device capacity are kept for the next
    /// frame.
    #[inline]
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// Returns the grown capacity if the current geometry does not fit the
    /// device allocation, recording it as the new capacity.
    pub(crate) fn reserve_gpu(&mut self) -> Option<BufferCapacity> {
        let (v, i) = (self.vertices.len(), self.indices.len());
        if self.gpu_capacity.fits(v, i) {
            return None;
        }
        self.gpu_capacity = self.gpu_capacity.grown_for(v, i);
        Some(self.gpu_capacity)
    }

    /// Device slot of this batch, reserved through `create` on first use.
    pub(crate) fn slot_or_create(&mut self, create: impl FnOnce() -> BufferSlot) -> BufferSlot {
        *self.gpu_slot.get_or_insert_with(create)
    }

    /// Marks the device allocation as lost so the next upload reallocates.
    pub(crate) fn forget_gpu(&mut self) {
        self.gpu_capacity = BufferCapacity::default();
    }
}

/// Set of geometry buffers, one per [`BatchKey`].
///
/// Buffers survive across frames empty so their device allocations can be
/// reused. Draw order is rebuilt every frame: a buffer joins the frame order
/// the first time it is requested after [`clear_all`](Self::clear_all)
/// (painter's algorithm).
#[derive(Debug, Default)]
pub struct BatchStore {
    buffers: Vec<GeometryBuffer>,
    lookup: HashMap<BatchKey, u32>,
    frame_order: Vec<u32>,
    generation: u32,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Returns the buffer for `(texture, state)`, creating it if needed, and
    /// appends it to this frame's draw order on its first request.
    ///
    /// `texture_size` replaces the recorded size of an existing buffer, so a
    /// texture rebound at a new size normalises UVs against the new one.
    pub fn get_or_create(
        &mut self,
        texture: TextureId,
        texture_size: TextureSize,
        state: RenderState,
    ) -> BufferHandle {
        let key = BatchKey::new(texture, state);
        let index = match self.lookup.get(&key) {
            Some(&index) => {
                self.buffers[index as usize].texture_size = texture_size;
                index
            }
            None => {
                let index = self.buffers.len() as u32;
                self.buffers.push(GeometryBuffer::new(key, texture_size));
                self.lookup.insert(key, index);
                log::trace!("batch {index} created for {key:?}");
                index
            }
        };

        let buffer = &mut self.buffers[index as usize];
        if !buffer.in_frame {
            buffer.in_frame = true;
            self.frame_order.push(index);
        }
        self.handle(index)
    }

    /// Looks up an existing buffer without creating one.
    pub fn find(&self, texture: TextureId, state: RenderState) -> Option<BufferHandle> {
        self.lookup
            .get(&BatchKey::new(texture, state))
            .map(|&index| self.handle(index))
    }

    /// # Panics
    /// Panics if `handle` predates the last [`reset`](Self::reset).
    pub fn get(&self, handle: BufferHandle) -> &GeometryBuffer {
        self.check(handle);
        &self.buffers[handle.index()]
    }

    /// # Panics
    /// Panics if `handle` predates the last [`reset`](Self::reset).
    pub fn get_mut(&mut self, handle: BufferHandle) -> &mut GeometryBuffer {
        self.check(handle);
        &mut self.buffers[handle.index()]
    }

    #[inline]
    pub fn append_quad(&mut self, handle: BufferHandle, quad: [Vertex; 4]) {
        self.get_mut(handle).append_quad(quad);
    }

    #[inline]
    pub fn clear(&mut self, handle: BufferHandle) {
        self.get_mut(handle).clear();
    }

    /// Empties every buffer and starts a new frame order. Buffers, handles
    /// and capacity are kept.
    pub fn clear_all(&mut self) {
        for buffer in &mut self.buffers {
            buffer.clear();
            buffer.in_frame = false;
        }
        self.frame_order.clear();
    }

    /// Drops every buffer. Outstanding handles become invalid.
    ///
    /// Returns the device slots the dropped buffers held.
    pub fn reset(&mut self) -> Vec<BufferSlot> {
        let released = self.buffers.iter().filter_map(GeometryBuffer::gpu_slot).collect();
        self.buffers.clear();
        self.lookup.clear();
        self.frame_order.clear();
        self.generation = self.generation.wrapping_add(1);
        released
    }

    /// Drops every buffer batched against `texture`. Outstanding handles
    /// become invalid.
    ///
    /// Returns the device slots the dropped buffers held.
    pub fn remove_texture(&mut self, texture: TextureId) -> Vec<BufferSlot> {
        if !self.buffers.iter().any(|b| b.texture() == texture) {
            return Vec::new();
        }

        let mut released = Vec::new();
        let mut remap = Vec::with_capacity(self.buffers.len());
        self.lookup.clear();

        for buffer in std::mem::take(&mut self.buffers) {
            if buffer.texture() == texture {
                released.extend(buffer.gpu_slot);
                remap.push(None);
                continue;
            }
            let index = self.buffers.len() as u32;
            self.lookup.insert(buffer.key, index);
            self.buffers.push(buffer);
            remap.push(Some(index));
        }

        self.frame_order = self.frame_order.iter().filter_map(|&i| remap[i as usize]).collect();
        self.generation = self.generation.wrapping_add(1);
        log::trace!("removed batches of {texture:?}, releasing {} slots", released.len());
        released
    }

    /// All buffers, in storage order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &GeometryBuffer> {
        self.buffers.iter()
    }

    /// Buffers requested since the last [`clear_all`](Self::clear_all), in
    /// draw order.
    pub fn frame_iter(&self) -> impl Iterator<Item = &GeometryBuffer> {
        self.frame_order.iter().map(|&i| &self.buffers[i as usize])
    }

    #[inline]
    pub(crate) fn frame_len(&self) -> usize {
        self.frame_order.len()
    }

    /// The `position`-th buffer of this frame's draw order.
    #[inline]
    pub(crate) fn frame_buffer_mut(&mut self, position: usize) -> &mut GeometryBuffer {
        let index = self.frame_order[position] as usize;
        &mut self.buffers[index]
    }

    #[inline]
    fn handle(&self, index: u32) -> BufferHandle {
        BufferHandle { index, generation: self.generation }
    }

    #[inline]
    fn check(&self, handle: BufferHandle) {
        assert!(
            handle.generation == self.generation && handle.index() < self.buffers.len(),
            "stale BufferHandle {handle:?} used after its batches were dropped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: TextureSize = TextureSize::new(64, 64);

    fn v(x: f32, y: f32) -> Vertex {
        Vertex::new([x, y, 0.0], [0.0, 0.0], [1.0; 4])
    }

    fn quad() -> [Vertex; 4] {
        [v(0.0, 0.0), v(0.0, 1.0), v(1.0, 1.0), v(1.0, 0.0)]
    }

    // ── get_or_create ─────────────────────────────────────────────────────

    #[test]
    fn same_key_returns_same_handle() {
        let mut store = BatchStore::new();
        let a = store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        let b = store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn distinct_keys_are_kept_in_creation_order() {
        let mut store = BatchStore::new();
        let world = store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        let ui = store.get_or_create(TextureId::new(1), SIZE, RenderState::AlphaBlended);
        let text = store.get_or_create(TextureId::new(2), SIZE, RenderState::AlphaBlended);

        assert_eq!((world.index(), ui.index(), text.index()), (0, 1, 2));
        let states: Vec<_> = store.iter().map(|b| b.key()).collect();
        assert_eq!(states[0], BatchKey::new(TextureId::new(1), RenderState::Opaque));
        assert_eq!(states[2], BatchKey::new(TextureId::new(2), RenderState::AlphaBlended));
        assert_eq!(store.find(TextureId::new(2), RenderState::AlphaBlended), Some(text));
        assert_eq!(store.find(TextureId::new(2), RenderState::Opaque), None);
    }

    // ── append_quad ───────────────────────────────────────────────────────

    #[test]
    fn quad_indices_are_offset_by_own_vertex_count() {
        let mut store = BatchStore::new();
        let a = store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        let b = store.get_or_create(TextureId::new(2), SIZE, RenderState::Opaque);

        store.append_quad(a, quad());
        store.append_quad(a, quad());
        store.append_quad(b, quad());

        assert_eq!(store.get(a).indices(), &[0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4]);
        // Second buffer starts from zero, not from a global count.
        assert_eq!(store.get(b).indices(), &[0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn quad_index_count_is_one_and_a_half_vertices() {
        let mut buffer = GeometryBuffer::new(BatchKey::new(TextureId::new(1), RenderState::Opaque), SIZE);
        for n in 1..=5 {
            buffer.append_quad(quad());
            assert_eq!(buffer.index_count() * 2, buffer.vertex_count() * 3);
            assert_eq!(buffer.vertex_count(), n * 4);
            assert!(buffer.indices().iter().all(|&i| (i as usize) < buffer.vertex_count()));
        }
    }

    // ── clear / reset ─────────────────────────────────────────────────────

    #[test]
    fn clear_keeps_gpu_capacity() {
        let mut buffer = GeometryBuffer::new(BatchKey::new(TextureId::new(1), RenderState::Opaque), SIZE);
        buffer.append_quad(quad());
        let grown = buffer.reserve_gpu();
        assert_eq!(grown, Some(BufferCapacity::new(64, 64)));

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.vertex_count(), 0);
        assert_eq!(buffer.gpu_capacity(), BufferCapacity::new(64, 64));

        buffer.append_quad(quad());
        assert_eq!(buffer.reserve_gpu(), None);
    }

    #[test]
    fn clear_all_keeps_order() {
        let mut store = BatchStore::new();
        let a = store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        let b = store.get_or_create(TextureId::new(2), SIZE, RenderState::Opaque);
        store.append_quad(b, quad());
        store.clear_all();

        assert!(store.iter().all(GeometryBuffer::is_empty));
        assert_eq!(store.get_or_create(TextureId::new(2), SIZE, RenderState::Opaque), b);
        assert_eq!(store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque), a);
    }

    // ── frame order ───────────────────────────────────────────────────────

    fn frame_keys(store: &BatchStore) -> Vec<BatchKey> {
        store.frame_iter().map(GeometryBuffer::key).collect()
    }

    #[test]
    fn frame_order_follows_first_request_in_each_frame() {
        let mut store = BatchStore::new();
        let ui = BatchKey::new(TextureId::new(1), RenderState::AlphaBlended);
        let world = BatchKey::new(TextureId::new(2), RenderState::Opaque);

        store.get_or_create(ui.texture, SIZE, ui.state);
        assert_eq!(frame_keys(&store), vec![ui]);
        store.clear_all();

        store.get_or_create(world.texture, SIZE, world.state);
        store.get_or_create(ui.texture, SIZE, ui.state);
        store.get_or_create(world.texture, SIZE, world.state);
        assert_eq!(frame_keys(&store), vec![world, ui]);
        // Storage keeps the original creation order.
        assert_eq!(store.iter().map(GeometryBuffer::key).collect::<Vec<_>>(), vec![ui, world]);

        store.clear_all();
        assert_eq!(store.frame_iter().count(), 0);
    }

    #[test]
    fn lookup_updates_texture_size() {
        let mut store = BatchStore::new();
        let a = store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        let b = store.get_or_create(TextureId::new(1), TextureSize::new(128, 32), RenderState::Opaque);
        assert_eq!(a, b);
        assert_eq!(store.get(a).texture_size(), TextureSize::new(128, 32));
    }

    #[test]
    fn remove_texture_releases_slots_and_keeps_other_batches() {
        let mut store = BatchStore::new();
        let a = store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        let b = store.get_or_create(TextureId::new(2), SIZE, RenderState::Opaque);
        let c = store.get_or_create(TextureId::new(1), SIZE, RenderState::AlphaBlended);
        store.get_mut(a).slot_or_create(|| BufferSlot(7));
        store.get_mut(b).slot_or_create(|| BufferSlot(8));
        store.get_mut(c).slot_or_create(|| BufferSlot(9));

        assert_eq!(store.remove_texture(TextureId::new(1)), vec![BufferSlot(7), BufferSlot(9)]);
        assert_eq!(store.len(), 1);
        assert_eq!(frame_keys(&store), vec![BatchKey::new(TextureId::new(2), RenderState::Opaque)]);

        let b = store.find(TextureId::new(2), RenderState::Opaque).unwrap();
        assert_eq!(store.get(b).gpu_slot(), Some(BufferSlot(8)));
        assert!(store.remove_texture(TextureId::new(1)).is_empty());
    }

    #[test]
    #[should_panic(expected = "stale BufferHandle")]
    fn handle_from_before_texture_removal_panics() {
        let mut store = BatchStore::new();
        let a = store.get_or_create(TextureId::new(2), SIZE, RenderState::Opaque);
        store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        store.remove_texture(TextureId::new(1));
        store.append_quad(a, quad());
    }

    #[test]
    #[should_panic(expected = "stale BufferHandle")]
    fn handle_from_before_reset_panics() {
        let mut store = BatchStore::new();
        let a = store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        store.reset();
        store.get_or_create(TextureId::new(1), SIZE, RenderState::Opaque);
        store.append_quad(a, quad());
    }
}
