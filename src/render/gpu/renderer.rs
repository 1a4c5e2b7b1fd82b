//! Offscreen wgpu renderer
//!
//! Draws the scene into an RGBA texture. Each frame the scene is traversed
//! into a [`BatchBuilder`], the textures the batches need are made resident,
//! the memory budget is enforced, and one render pass issues a draw per
//! batch. Shader and texture binds are skipped when already current.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::batch::{BatchBuilder, SpriteVertex};
use super::shader::{Bound, ShaderCompiler, ShaderId, ShaderRegistry, ShaderSource};
use super::texture::{GpuTexture, TextureManager, WgpuUploader};
use crate::assets::{AtlasId, AtlasStore};
use crate::render::{Camera2D, Color, RenderError, RenderStats, traverse};
use crate::scene::SceneGraph;

/// Colour format of the offscreen target
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Initial vertex buffer size in vertices
const INITIAL_VERTEX_CAPACITY: u64 = 6 * 256;

/// Uniform buffer for camera data
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
        }
    }

    fn update(&mut self, camera: &Camera2D) {
        self.view_proj = camera.view_projection().to_cols_array_2d();
    }
}

/// Builds render pipelines for registered shader sources
struct PipelineCompiler<'a> {
    device: &'a wgpu::Device,
    textured_layout: &'a wgpu::PipelineLayout,
    solid_layout: &'a wgpu::PipelineLayout,
}

impl ShaderCompiler for PipelineCompiler<'_> {
    type Program = wgpu::RenderPipeline;

    fn compile(&mut self, source: &ShaderSource) -> Result<wgpu::RenderPipeline, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(source.label.as_ref()),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.clone()),
            });

        let layout = if source.textured {
            self.textured_layout
        } else {
            self.solid_layout
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(source.label.as_ref()),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(source.vertex_entry),
                    buffers: &[SpriteVertex::layout()],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(source.fragment_entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(pipeline),
        }
    }
}

/// Renders a scene graph with wgpu into an offscreen texture
pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    size: (u32, u32),

    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    textured_layout: wgpu::PipelineLayout,
    solid_layout: wgpu::PipelineLayout,

    shaders: ShaderRegistry<wgpu::RenderPipeline>,
    textures: TextureManager<GpuTexture>,

    vertex_buffer: wgpu::Buffer,
    vertex_capacity: u64,

    background: Color,
    frame: u64,
}

impl GpuRenderer {
    /// Create a renderer with a `width` x `height` target
    ///
    /// # Errors
    ///
    /// Returns an error if no adapter or device is available
    pub fn new(
        width: u32,
        height: u32,
        background: Color,
        max_texture_mem: u64,
    ) -> Result<Self, RenderError> {
        pollster::block_on(Self::new_async(width, height, background, max_texture_mem))
    }

    async fn new_async(
        width: u32,
        height: u32,
        background: Color,
        max_texture_mem: u64,
    ) -> Result<Self, RenderError> {
        let size = (width.max(1), height.max(1));

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;

        log::info!("Using GPU: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("scene2d device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::Device(e.to_string()))?;

        let (target, target_view) = Self::create_target(&device, size);

        // Camera
        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // Textures
        let texture_layout = GpuTexture::bind_group_layout(&device);
        let sampler = GpuTexture::create_sampler(&device);

        let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sprite Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let solid_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Solid Pipeline Layout"),
            bind_group_layouts: &[&camera_layout],
            push_constant_ranges: &[],
        });

        let mut shaders = ShaderRegistry::new();
        shaders.register(
            ShaderId::TEXTURED,
            ShaderSource::new("sprite", include_str!("shaders/sprite.wgsl")).textured(),
        );
        shaders.register(
            ShaderId::SOLID,
            ShaderSource::new("solid", include_str!("shaders/solid.wgsl")),
        );

        let vertex_capacity = INITIAL_VERTEX_CAPACITY;
        let vertex_buffer = Self::create_vertex_buffer(&device, vertex_capacity);

        Ok(Self {
            device,
            queue,
            target,
            target_view,
            size,
            camera_uniform,
            camera_buffer,
            camera_bind_group,
            texture_layout,
            sampler,
            textured_layout,
            solid_layout,
            shaders,
            textures: TextureManager::new(max_texture_mem),
            vertex_buffer,
            vertex_capacity,
            background,
            frame: 0,
        })
    }

    fn create_target(device: &wgpu::Device, size: (u32, u32)) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Target"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_vertex_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sprite Vertex Buffer"),
            size: capacity * std::mem::size_of::<SpriteVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Render one frame
    pub fn render(
        &mut self,
        graph: &SceneGraph,
        atlases: &mut AtlasStore,
        camera: &Camera2D,
    ) -> RenderStats {
        self.frame += 1;
        let frame = self.frame;

        let mut batcher = BatchBuilder::new(atlases);
        let mut stats = traverse(graph, &mut batcher);
        let (vertices, batches) = batcher.finish();

        // Residency and budget
        let mut uploader = WgpuUploader {
            device: &self.device,
            queue: &self.queue,
            layout: &self.texture_layout,
            sampler: &self.sampler,
        };
        let uploads_before = self.textures.upload_count();
        for id in batches.iter().filter_map(|b| b.texture) {
            let dirty = atlases.take_dirty(id);
            let Some(atlas) = atlases.get(id) else {
                continue;
            };
            self.textures.bind(id, atlas, dirty, frame, &mut uploader);
        }
        stats.texture_uploads = (self.textures.upload_count() - uploads_before) as u32;
        stats.texture_evictions = self.textures.enforce_budget(frame, &mut uploader);

        // Per-frame buffers
        self.camera_uniform.update(camera);
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[self.camera_uniform]),
        );
        self.upload_vertices(&vertices);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background.into()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if !batches.is_empty() {
                pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            }

            self.shaders.unbind_all();
            let binds_before = self.shaders.use_program_count();
            let mut compiler = PipelineCompiler {
                device: &self.device,
                textured_layout: &self.textured_layout,
                solid_layout: &self.solid_layout,
            };
            let mut bound_texture: Option<AtlasId> = None;

            for batch in &batches {
                match self.shaders.bind(&mut compiler, batch.shader) {
                    Ok(Bound::Bind(pipeline)) => {
                        pass.set_pipeline(pipeline);
                        pass.set_bind_group(0, &self.camera_bind_group, &[]);
                        bound_texture = None;
                    }
                    Ok(Bound::AlreadyBound) => {}
                    Err(_) => continue,
                }

                if let Some(id) = batch.texture
                    && bound_texture != Some(id)
                {
                    let Some(texture) = self.textures.handle(id) else {
                        log::warn!("Texture {id:?} not resident; skipping batch");
                        continue;
                    };
                    pass.set_bind_group(1, &texture.bind_group, &[]);
                    bound_texture = Some(id);
                    stats.texture_binds += 1;
                }

                pass.draw(batch.vertices.clone(), 0..1);
                stats.draw_calls += 1;
            }
            stats.shader_binds = (self.shaders.use_program_count() - binds_before) as u32;
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        log::trace!("GPU frame {frame}: {}", stats.summary());
        stats
    }

    fn upload_vertices(&mut self, vertices: &[SpriteVertex]) {
        if vertices.is_empty() {
            return;
        }
        let needed = vertices.len() as u64;
        if needed > self.vertex_capacity {
            self.vertex_capacity = needed.next_power_of_two();
            self.vertex_buffer = Self::create_vertex_buffer(&self.device, self.vertex_capacity);
            log::debug!("Vertex buffer grown to {} vertices", self.vertex_capacity);
        }
        self.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
    }

    /// Copy the last frame back to the CPU
    ///
    /// # Errors
    ///
    /// Returns an error if the readback buffer cannot be mapped
    pub fn read_pixels(&self) -> Result<RgbaImage, RenderError> {
        let (width, height) = self.size;
        let unpadded = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: u64::from(padded) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| RenderError::Readback(e.to_string()))?
            .map_err(|e| RenderError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded as usize]);
            }
        }
        buffer.unmap();

        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| RenderError::Readback("pixel buffer size mismatch".to_string()))
    }

    /// Free the GPU texture of an atlas, e.g. after removing it from the store
    pub fn release_texture(&mut self, id: AtlasId) -> bool {
        let mut uploader = WgpuUploader {
            device: &self.device,
            queue: &self.queue,
            layout: &self.texture_layout,
            sampler: &self.sampler,
        };
        self.textures.remove(id, &mut uploader)
    }

    #[must_use]
    pub fn textures(&self) -> &TextureManager<GpuTexture> {
        &self.textures
    }

    #[must_use]
    pub fn shaders(&self) -> &ShaderRegistry<wgpu::RenderPipeline> {
        &self.shaders
    }

    /// Target size in pixels
    #[must_use]
    pub const fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Frames rendered so far
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub const fn background(&self) -> Color {
        self.background
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
