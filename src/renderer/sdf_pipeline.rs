//! SDF-based WebGPU render pipeline
//!
//! Raymarches the whole scene in the fragment shader from a uniform array of
//! primitives.

use bytemuck::{Pod, Zeroable};
use thiserror::Error;
use wgpu::util::DeviceExt;

use super::{Material, Primitive, SceneObject};
use crate::assets::TextureImage;
use crate::camera::Camera;

/// Maximum primitives per frame (ground, player and ten notes fit easily)
pub const MAX_OBJECTS: usize = 16;

/// Scene lighting
const LIGHT_DIRECTION: [f32; 3] = [5.0, 10.0, 7.5];
const AMBIENT: f32 = 0.5;

/// Ground tile repeats across the 30 unit floor
const GROUND_TILE_REPEAT: f32 = 4.0;

/// Which sampled image a texture upload replaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    Ground,
    Background,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
}

// ============================================================================
// GPU DATA STRUCTURES (must match shader)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Globals {
    resolution: [f32; 2], // offset 0
    time: f32,            // offset 8
    object_count: u32,    // offset 12
    eye: [f32; 4],        // offset 16, w = tan(fov_y / 2)
    look_at: [f32; 4],    // offset 32, w = aspect
    light: [f32; 4],      // offset 48, xyz = direction to light, w = ambient
    textures: [f32; 4],   // offset 64, x = ground ready, y = background ready, z = tile repeat
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ObjectData {
    pos: [f32; 3],
    shape: u32, // 0 = box, 1 = note
    size: [f32; 3],
    material: u32, // 0 = plain, 1 = tiled
    color: [f32; 4],
    params: [f32; 4], // x = box rounding, y = roughness, z = metalness
}

impl ObjectData {
    fn from_scene(object: &SceneObject) -> Self {
        let (shape, size, rounding) = match object.shape {
            Primitive::RoundBox {
                half_extents,
                rounding,
            } => (0, half_extents.to_array(), rounding),
            Primitive::Note {
                head_radius,
                stem_height,
            } => (1, [head_radius, stem_height, 0.0], 0.0),
        };
        Self {
            pos: object.position.to_array(),
            shape,
            size,
            material: match object.material {
                Material::Plain => 0,
                Material::Tiled => 1,
            },
            color: object.color,
            params: [
                rounding,
                object.roughness.clamp(0.0, 1.0),
                object.metalness.clamp(0.0, 1.0),
                0.0,
            ],
        }
    }
}

/// Upload RGBA8 pixels as a sampled sRGB texture
fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    width: u32,
    height: u32,
    data: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

// ============================================================================
// SCENE RENDERER
// ============================================================================

pub struct SceneRenderer {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    objects_buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    ground_view: wgpu::TextureView,
    background_view: wgpu::TextureView,
    /// Set once a real image replaced the placeholder
    ground_ready: bool,
    background_ready: bool,

    pub size: (u32, u32),
}

impl SceneRenderer {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("scene-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(adapter);
        log::info!("Surface formats: {:?}", surface_caps.formats);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderError::NoSurfaceFormat)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        log::info!("Using surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sdf_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("sdf_shader.wgsl").into()),
        });

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let objects_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("objects"),
            size: (std::mem::size_of::<ObjectData>() * MAX_OBJECTS) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                texture_entry(2),
                texture_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scene_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // 1x1 white until the real images arrive
        let white = [255u8; 4];
        let ground_view = create_texture(&device, &queue, "ground_placeholder", 1, 1, &white);
        let background_view =
            create_texture(&device, &queue, "background_placeholder", 1, 1, &white);

        let bind_group = create_bind_group(
            &device,
            &bind_group_layout,
            &globals_buffer,
            &objects_buffer,
            &ground_view,
            &background_view,
            &sampler,
        );

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[], // No vertex buffers - fullscreen triangle
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: None,
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
            multiview_mask: None,
            cache: None,
        });

        log::info!("Scene renderer ready ({}x{})", config.width, config.height);

        Ok(Self {
            surface,
            device,
            queue,
            size: (config.width, config.height),
            config,
            pipeline,
            globals_buffer,
            objects_buffer,
            bind_group_layout,
            bind_group,
            sampler,
            ground_view,
            background_view,
            ground_ready: false,
            background_ready: false,
        })
    }

    /// Replace a placeholder with a decoded image
    pub fn set_texture(&mut self, slot: TextureSlot, image: &TextureImage) {
        let view = create_texture(
            &self.device,
            &self.queue,
            match slot {
                TextureSlot::Ground => "ground_texture",
                TextureSlot::Background => "background_texture",
            },
            image.width,
            image.height,
            &image.data,
        );
        match slot {
            TextureSlot::Ground => {
                self.ground_view = view;
                self.ground_ready = true;
            }
            TextureSlot::Background => {
                self.background_view = view;
                self.background_ready = true;
            }
        }
        self.bind_group = create_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.globals_buffer,
            &self.objects_buffer,
            &self.ground_view,
            &self.background_view,
            &self.sampler,
        );
        log::info!("Uploaded {:?} texture ({}x{})", slot, image.width, image.height);
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.size = (new_width, new_height);
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Upload the scene and draw one frame
    ///
    /// `time` is the requestAnimationFrame timestamp in milliseconds.
    pub fn render(
        &mut self,
        scene: &[SceneObject],
        camera: &Camera,
        time: f64,
    ) -> Result<(), wgpu::SurfaceError> {
        if scene.len() > MAX_OBJECTS {
            log::warn!("Scene has {} objects, drawing {}", scene.len(), MAX_OBJECTS);
        }

        let mut objects = [ObjectData::zeroed(); MAX_OBJECTS];
        for (slot, object) in objects.iter_mut().zip(scene) {
            *slot = ObjectData::from_scene(object);
        }
        let object_count = scene.len().min(MAX_OBJECTS) as u32;

        let light = glam::Vec3::from(LIGHT_DIRECTION).normalize();
        let globals = Globals {
            resolution: [self.size.0 as f32, self.size.1 as f32],
            time: (time / 1000.0) as f32,
            object_count,
            eye: camera.position.extend(camera.half_fov_tan()).to_array(),
            look_at: camera.target.extend(camera.aspect).to_array(),
            light: light.extend(AMBIENT).to_array(),
            textures: [
                if self.ground_ready { 1.0 } else { 0.0 },
                if self.background_ready { 1.0 } else { 0.0 },
                GROUND_TILE_REPEAT,
                0.0,
            ],
        };
        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&globals));
        self.queue
            .write_buffer(&self.objects_buffer, 0, bytemuck::cast_slice(&objects));

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.draw(0..3, 0..1); // Fullscreen triangle
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    globals: &wgpu::Buffer,
    objects: &wgpu::Buffer,
    ground: &wgpu::TextureView,
    background: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("scene_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: objects.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(ground),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(background),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_layouts_match_shader() {
        assert_eq!(std::mem::size_of::<Globals>(), 80);
        assert_eq!(std::mem::size_of::<ObjectData>(), 64);
    }

    #[test]
    fn test_object_packing() {
        let object = SceneObject {
            position: Vec3::new(1.0, 2.0, 3.0),
            shape: Primitive::RoundBox {
                half_extents: Vec3::splat(0.4),
                rounding: 0.05,
            },
            color: [1.0, 0.0, 0.0, 1.0],
            roughness: 0.3,
            metalness: 0.1,
            material: Material::Plain,
        };
        let data = ObjectData::from_scene(&object);
        assert_eq!(data.shape, 0);
        assert_eq!(data.size, [0.4, 0.4, 0.4]);
        assert_eq!(data.params, [0.05, 0.3, 0.1, 0.0]);
        assert_eq!(data.pos, [1.0, 2.0, 3.0]);

        let note = SceneObject {
            shape: Primitive::Note {
                head_radius: 0.2,
                stem_height: 0.5,
            },
            material: Material::Tiled,
            ..object
        };
        let data = ObjectData::from_scene(&note);
        assert_eq!(data.shape, 1);
        assert_eq!(data.material, 1);
        assert_eq!(data.size[..2], [0.2, 0.5]);
    }

    #[test]
    fn test_material_factors_are_clamped() {
        let object = SceneObject {
            position: Vec3::ZERO,
            shape: Primitive::Note {
                head_radius: 0.1,
                stem_height: 0.3,
            },
            color: [1.0; 4],
            roughness: 1.7,
            metalness: -0.2,
            material: Material::Plain,
        };
        let data = ObjectData::from_scene(&object);
        assert_eq!(data.params[1], 1.0);
        assert_eq!(data.params[2], 0.0);
    }
}
