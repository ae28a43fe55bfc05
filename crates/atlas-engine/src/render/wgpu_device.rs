use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::coords::PixelRect;

use super::{
    check_pixels, BufferCapacity, BufferSlot, DeviceError, RenderCtx, RenderDevice, RenderState,
    RenderTarget, TextureFormat, TextureId, TextureSize, Vertex,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ── blend ─────────────────────────────────────────────────────────────────

fn premul_alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

// ── viewport uniform ──────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ViewportUniform {
    viewport: [f32; 2],
    _pad: [f32; 2], // 16-byte alignment
}

// ── resources ─────────────────────────────────────────────────────────────

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: TextureSize,
    format: TextureFormat,
}

struct GpuGeometry {
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
    capacity: BufferCapacity,
}

enum GeometrySlot {
    Free,
    Reserved,
    Allocated(GpuGeometry),
}

impl GeometrySlot {
    fn geometry(&self) -> Option<&GpuGeometry> {
        match self {
            GeometrySlot::Allocated(geometry) => Some(geometry),
            _ => None,
        }
    }
}

struct DepthTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

#[derive(Debug, Copy, Clone)]
struct PendingDraw {
    state: RenderState,
    texture: TextureId,
    slot: BufferSlot,
    index_count: u32,
}

/// [`RenderDevice`] backed by wgpu.
///
/// Texture and buffer calls go straight to the queue. Draw calls are
/// recorded and replayed into a single render pass by [`encode`](Self::encode)
/// once the frame's command encoder is available.
///
/// Every texture is stored as RGBA8: `Rgba8` uploads are sRGB colour data,
/// `R8` coverage is expanded to premultiplied white so one shader serves
/// sprites and glyphs alike.
///
/// Buffer slots are handed out by the device and reused once released, so
/// any number of [`FrameRenderer`](super::FrameRenderer)s can share it.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,

    // pipeline
    surface_format: wgpu::TextureFormat,
    pipelines: HashMap<RenderState, wgpu::RenderPipeline>,
    pipeline_layout: wgpu::PipelineLayout,
    shader: wgpu::ShaderModule,

    // bindings
    texture_bgl: wgpu::BindGroupLayout,
    viewport_bind_group: wgpu::BindGroup,
    viewport_ubo: wgpu::Buffer,
    sampler: wgpu::Sampler,

    // resources
    textures: Vec<Option<GpuTexture>>,
    buffers: Vec<GeometrySlot>,
    depth: Option<DepthTarget>,

    // recorded draws
    current: Option<(RenderState, TextureId)>,
    pending: Vec<PendingDraw>,
}

impl WgpuDevice {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, surface_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("atlas batch shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/batch.wgsl").into()),
        });

        let viewport_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas viewport bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ViewportUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("atlas batch pipeline layout"),
            bind_group_layouts: &[&viewport_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let viewport_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("atlas viewport ubo"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let viewport_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas viewport bind group"),
            layout: &viewport_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_ubo.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("atlas sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device: device.clone(),
            queue: queue.clone(),
            surface_format,
            pipelines: HashMap::new(),
            pipeline_layout,
            shader,
            texture_bgl,
            viewport_bind_group,
            viewport_ubo,
            sampler,
            textures: Vec::new(),
            buffers: Vec::new(),
            depth: None,
            current: None,
            pending: Vec::new(),
        }
    }

    /// Draws recorded since the last [`encode`](Self::encode).
    #[inline]
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    /// Replays the recorded draws into one render pass on `target`.
    ///
    /// The color attachment is loaded, not cleared; the depth attachment is
    /// cleared to the far plane.
    pub fn encode(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>) {
        let pending = std::mem::take(&mut self.pending);
        self.current = None;

        if pending.is_empty() {
            self.pending = pending;
            return;
        }

        if ctx.surface_format != self.surface_format {
            log::debug!("surface format changed to {:?}, rebuilding pipelines", ctx.surface_format);
            self.surface_format = ctx.surface_format;
            self.pipelines.clear();
        }

        self.ensure_depth(target.size);
        for draw in &pending {
            self.ensure_pipeline(draw.state);
        }
        self.write_viewport_uniform(ctx);

        let Some(depth) = self.depth.as_ref() else {
            self.pending = pending;
            return;
        };

        {
            let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("atlas batch pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_bind_group(0, &self.viewport_bind_group, &[]);

            for draw in &pending {
                let Some(pipeline) = self.pipelines.get(&draw.state) else { continue; };
                let Some(texture) = self.texture(draw.texture) else {
                    log::warn!("draw skipped: texture {:?} no longer exists", draw.texture);
                    continue;
                };
                let Some(geometry) = self.buffers.get(draw.slot.0).and_then(GeometrySlot::geometry) else {
                    log::warn!("draw skipped: {:?} has no storage", draw.slot);
                    continue;
                };

                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(1, &texture.bind_group, &[]);
                rpass.set_vertex_buffer(0, geometry.vbo.slice(..));
                rpass.set_index_buffer(geometry.ibo.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        let mut pending = pending;
        pending.clear();
        self.pending = pending;
    }

    // ── lazy-init helpers ──────────────────────────────────────────────────

    fn ensure_pipeline(&mut self, state: RenderState) {
        if self.pipelines.contains_key(&state) {
            return;
        }

        let (label, blend) = match state {
            RenderState::Opaque => ("atlas opaque pipeline", None),
            RenderState::AlphaBlended => ("atlas blended pipeline", Some(premul_alpha_blend())),
        };

        let depth_compare = if state.depth_tested() {
            wgpu::CompareFunction::LessEqual
        } else {
            wgpu::CompareFunction::Always
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.surface_format,
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: state.depth_tested(),
                depth_compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::debug!("created {label} for {:?}", self.surface_format);
        self.pipelines.insert(state, pipeline);
    }

    fn ensure_depth(&mut self, size: (u32, u32)) {
        let size = (size.0.max(1), size.1.max(1));
        if self.depth.as_ref().is_some_and(|d| d.size == size) {
            return;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas depth"),
            size: wgpu::Extent3d { width: size.0, height: size.1, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.depth = Some(DepthTarget { _texture: texture, view, size });
    }

    fn write_viewport_uniform(&self, ctx: &RenderCtx<'_>) {
        self.queue.write_buffer(
            &self.viewport_ubo,
            0,
            bytemuck::bytes_of(&ViewportUniform { viewport: ctx.viewport.clamped(), _pad: [0.0; 2] }),
        );
    }

    // ── texture helpers ────────────────────────────────────────────────────

    fn texture(&self, id: TextureId) -> Option<&GpuTexture> {
        self.textures.get(id.raw() as usize).and_then(Option::as_ref)
    }

    fn write_region(&self, texture: &wgpu::Texture, region: PixelRect, format: TextureFormat, pixels: &[u8]) {
        let rgba = match format {
            TextureFormat::Rgba8 => std::borrow::Cow::Borrowed(pixels),
            TextureFormat::R8 => std::borrow::Cow::Owned(expand_coverage(pixels)),
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x: region.x, y: region.y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.width * 4),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d { width: region.width, height: region.height, depth_or_array_layers: 1 },
        );
    }
}

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::R8 => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// Coverage `a` → premultiplied white `[a, a, a, a]`.
fn expand_coverage(coverage: &[u8]) -> Vec<u8> {
    coverage.iter().flat_map(|&a| [a; 4]).collect()
}

impl RenderDevice for WgpuDevice {
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

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas texture"),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let size = TextureSize::new(width, height);
        self.write_region(&texture, size.full_rect(), format, pixels);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas texture bind group"),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let id = TextureId::new(self.textures.len() as u32);
        self.textures.push(Some(GpuTexture { texture, bind_group, size, format }));
        log::debug!("texture {id:?} created: {width}x{height} {format:?}");
        Ok(id)
    }

    fn update_texture_region(
        &mut self,
        texture: TextureId,
        region: PixelRect,
        pixels: &[u8],
    ) -> Result<(), DeviceError> {
        let gpu = self.texture(texture).ok_or(DeviceError::UnknownTexture(texture))?;
        if !gpu.size.full_rect().contains_rect(region) {
            return Err(DeviceError::RegionOutOfBounds { texture, region });
        }
        check_pixels(region.width, region.height, gpu.format, pixels)?;
        if region.is_empty() {
            return Ok(());
        }

        self.write_region(&gpu.texture, region, gpu.format, pixels);
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(slot) = self.textures.get_mut(texture.raw() as usize) {
            if slot.take().is_some() {
                log::debug!("texture {texture:?} destroyed");
            }
        }
    }

    fn create_buffer_slot(&mut self) -> BufferSlot {
        let index = match self.buffers.iter().position(|s| matches!(s, GeometrySlot::Free)) {
            Some(index) => {
                self.buffers[index] = GeometrySlot::Reserved;
                index
            }
            None => {
                self.buffers.push(GeometrySlot::Reserved);
                self.buffers.len() - 1
            }
        };
        BufferSlot(index)
    }

    fn destroy_buffer_slot(&mut self, slot: BufferSlot) {
        if let Some(entry) = self.buffers.get_mut(slot.0) {
            *entry = GeometrySlot::Free;
        }
    }

    fn resize_buffer(&mut self, slot: BufferSlot, capacity: BufferCapacity) -> Result<(), DeviceError> {
        if matches!(self.buffers.get(slot.0), None | Some(GeometrySlot::Free)) {
            return Err(DeviceError::UnknownSlot(slot));
        }

        let vbo = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("atlas batch vbo"),
            size: (capacity.vertices * std::mem::size_of::<Vertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let ibo = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("atlas batch ibo"),
            size: (capacity.indices * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!("{slot:?} allocated for {capacity:?}");
        self.buffers[slot.0] = GeometrySlot::Allocated(GpuGeometry { vbo, ibo, capacity });
        Ok(())
    }

    fn upload_buffer(
        &mut self,
        slot: BufferSlot,
        texture: TextureId,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<(), DeviceError> {
        if self.texture(texture).is_none() {
            return Err(DeviceError::UnknownTexture(texture));
        }

        let geometry = match self.buffers.get(slot.0) {
            Some(GeometrySlot::Allocated(geometry)) => geometry,
            Some(GeometrySlot::Reserved) => {
                return Err(DeviceError::CapacityExceeded {
                    slot,
                    capacity: BufferCapacity::default(),
                    vertices: vertices.len(),
                    indices: indices.len(),
                });
            }
            _ => return Err(DeviceError::UnknownSlot(slot)),
        };
        if !geometry.capacity.fits(vertices.len(), indices.len()) {
            return Err(DeviceError::CapacityExceeded {
                slot,
                capacity: geometry.capacity,
                vertices: vertices.len(),
                indices: indices.len(),
            });
        }

        self.queue.write_buffer(&geometry.vbo, 0, bytemuck::cast_slice(vertices));
        self.queue.write_buffer(&geometry.ibo, 0, bytemuck::cast_slice(indices));
        Ok(())
    }

    fn set_render_state(&mut self, state: RenderState, texture: TextureId) {
        self.current = Some((state, texture));
    }

    fn draw_indexed(&mut self, slot: BufferSlot, index_count: u32) {
        let Some((state, texture)) = self.current else {
            log::warn!("draw_indexed on {slot:?} without a render state, ignored");
            return;
        };
        if index_count == 0 {
            return;
        }
        self.pending.push(PendingDraw { state, texture, slot, index_count });
    }
}
