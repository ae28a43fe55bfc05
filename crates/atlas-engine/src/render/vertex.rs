use bytemuck::{Pod, Zeroable};

/// Per-vertex data shared by every batch.
///
/// Layout (36 bytes):
///
///  offset  0  position [f32; 3]   loc 0
///  offset 12  uv       [f32; 2]   loc 1
///  offset 20  color    [f32; 4]   loc 2  (premultiplied)
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    #[inline]
    pub const fn new(position: [f32; 3], uv: [f32; 2], color: [f32; 4]) -> Self {
        Self { position, uv, color }
    }

    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x2, // uv
        2 => Float32x4  // color
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}
