//! wgpu renderer for relic scenes
//!
//! Each frame runs a shadow depth pass for the shadow-casting directional
//! light, then one multisampled color pass: opaque meshes, the starfield
//! points, and transparent meshes sorted back to front.
//!
//! GPU buffers are cached per [`GeometryId`]; geometry that is no longer in
//! the scene is released at the end of the frame.

use crate::ShellError;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use relic::{Geometry, GeometryId, LightKind, ObjectKind, PerspectiveCamera, RendererSettings, Scene, Shading};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const MAX_DIRECTIONAL: usize = 4;
const MAX_POINT: usize = 4;
pub const SHADOW_MAP_SIZE: u32 = 2048;
const MSAA_SAMPLES: u32 = 4;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Half width of the orthographic shadow frustum; covers the ground disk
const SHADOW_EXTENT: f32 = 16.0;
const SHADOW_DISTANCE: f32 = 30.0;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    fog: [f32; 4],
    ambient: [f32; 4],
    dir_directions: [[f32; 4]; MAX_DIRECTIONAL],
    dir_colors: [[f32; 4]; MAX_DIRECTIONAL],
    point_positions: [[f32; 4]; MAX_POINT],
    point_colors: [[f32; 4]; MAX_POINT],
    counts: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct DrawUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    color: [f32; 4],
    surface: [f32; 4],
}

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    index_count: u32,
    vertex_count: u32,
}

impl GpuGeometry {
    fn upload(device: &wgpu::Device, geometry: &Geometry) -> Self {
        let vertices: Vec<Vertex> = geometry
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| Vertex {
                position: *position,
                normal: geometry.normals.get(i).copied().unwrap_or([0.0, 0.0, 0.0]),
            })
            .collect();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("Vertex Buffer {}", geometry.id())),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = (!geometry.indices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("Index Buffer {}", geometry.id())),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });

        log::debug!(
            "Uploaded geometry {} ({} vertices, {} indices)",
            geometry.id(),
            vertices.len(),
            geometry.indices.len()
        );

        Self {
            vertex_buffer,
            index_buffer,
            index_count: geometry.indices.len() as u32,
            vertex_count: vertices.len() as u32,
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        match &self.index_buffer {
            Some(index_buffer) => {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
            None => pass.draw(0..self.vertex_count, 0..1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawPass {
    Opaque,
    DoubleSided,
    Transparent,
    Points,
}

struct DrawItem {
    geometry: Arc<Geometry>,
    uniforms: DrawUniforms,
    pass: DrawPass,
    cast_shadow: bool,
    /// Distance from the camera, for sorting transparent draws
    depth: f32,
}

struct PipelineSpec<'a> {
    label: &'a str,
    vs: &'a str,
    fs: &'a str,
    topology: wgpu::PrimitiveTopology,
    cull_mode: Option<wgpu::Face>,
    blend: wgpu::BlendState,
    depth_write: bool,
}

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    settings: RendererSettings,
    sample_count: u32,
    opaque_pipeline: wgpu::RenderPipeline,
    double_sided_pipeline: wgpu::RenderPipeline,
    transparent_pipeline: wgpu::RenderPipeline,
    points_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
    draw_layout: wgpu::BindGroupLayout,
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    draw_stride: u64,
    draw_capacity: usize,
    shadow_view: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
    depth_view: wgpu::TextureView,
    geometries: HashMap<GeometryId, GpuGeometry>,
}

impl Renderer {
    /// Create a renderer drawing into `target` (a winit window or a canvas).
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        settings: RendererSettings,
        backends: wgpu::Backends,
    ) -> Result<Self, ShellError> {
        let instance = wgpu::Instance::new(&instance_descriptor(backends));
        Self::with_instance(instance, target, settings).await
    }

    /// Create a renderer on an existing instance.
    ///
    /// Browsers should pass an instance from
    /// [`wgpu::util::new_instance_with_webgpu_detection`] so a missing
    /// WebGPU adapter falls back to WebGL.
    pub async fn with_instance(
        instance: wgpu::Instance,
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        settings: RendererSettings,
    ) -> Result<Self, ShellError> {
        let surface = instance.create_surface(target)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;

        log::info!("Adapter acquired: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                label: None,
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
                experimental_features: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(ShellError::UnsupportedSurface)?;

        let alpha_mode = if settings.transparent
            && surface_caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let (width, height) = settings.physical_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let msaa_supported = adapter
            .get_texture_format_features(surface_format)
            .flags
            .sample_count_supported(MSAA_SAMPLES)
            && adapter
                .get_texture_format_features(DEPTH_FORMAT)
                .flags
                .sample_count_supported(MSAA_SAMPLES);
        let sample_count = if settings.antialias && msaa_supported { MSAA_SAMPLES } else { 1 };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        // Group 0: per-frame uniforms plus the shadow map
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                uniform_entry(0, false, None),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        // The shadow pass writes the shadow map, so it gets a layout without it
        let shadow_frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow Frame Bind Group Layout"),
            entries: &[uniform_entry(0, false, None)],
        });

        let draw_size = std::mem::size_of::<DrawUniforms>() as u64;
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Bind Group Layout"),
            entries: &[uniform_entry(0, true, NonZeroU64::new(draw_size))],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let shadow_view = create_shadow_texture(&device);
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_sampler),
                },
            ],
        });

        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Frame Bind Group"),
            layout: &shadow_frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let draw_stride = draw_size.div_ceil(alignment) * alignment;
        let draw_capacity = 64;
        let (draw_buffer, draw_bind_group) =
            create_draw_buffer(&device, &draw_layout, draw_stride, draw_size, draw_capacity);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let build = |spec: PipelineSpec| {
            create_scene_pipeline(&device, &pipeline_layout, &shader, surface_format, sample_count, spec)
        };

        let opaque_pipeline = build(PipelineSpec {
            label: "Opaque Pipeline",
            vs: "vs_main",
            fs: "fs_main",
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            blend: wgpu::BlendState::REPLACE,
            depth_write: true,
        });
        let double_sided_pipeline = build(PipelineSpec {
            label: "Double Sided Pipeline",
            vs: "vs_main",
            fs: "fs_main",
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            blend: wgpu::BlendState::REPLACE,
            depth_write: true,
        });
        let transparent_pipeline = build(PipelineSpec {
            label: "Transparent Pipeline",
            vs: "vs_main",
            fs: "fs_main",
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            blend: wgpu::BlendState::ALPHA_BLENDING,
            depth_write: false,
        });
        let points_pipeline = build(PipelineSpec {
            label: "Points Pipeline",
            vs: "vs_points",
            fs: "fs_points",
            topology: wgpu::PrimitiveTopology::PointList,
            cull_mode: None,
            blend: wgpu::BlendState::REPLACE,
            depth_write: true,
        });

        let shadow_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&shadow_frame_layout, &draw_layout],
            push_constant_ranges: &[],
        });

        let shadow_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&shadow_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_shadow"),
                buffers: &[Vertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: None,
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
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let depth_view = create_depth_texture(&device, &config, sample_count);
        let msaa_view = (sample_count > 1).then(|| create_msaa_texture(&device, &config, sample_count));

        log::info!(
            "Renderer ready: {}x{} {:?}, {}x MSAA, shadows {}",
            width,
            height,
            surface_format,
            sample_count,
            if settings.shadows { "on" } else { "off" }
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            settings,
            sample_count,
            opaque_pipeline,
            double_sided_pipeline,
            transparent_pipeline,
            points_pipeline,
            shadow_pipeline,
            frame_buffer,
            frame_bind_group,
            shadow_bind_group,
            draw_layout,
            draw_buffer,
            draw_bind_group,
            draw_stride,
            draw_capacity,
            shadow_view,
            msaa_view,
            depth_view,
            geometries: HashMap::new(),
        })
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Apply new settings. Only size and pixel ratio can change after creation.
    pub fn configure(&mut self, settings: RendererSettings) {
        self.resize(settings.width, settings.height, settings.pixel_ratio);
    }

    /// Resize to a CSS-pixel size at the given pixel ratio.
    pub fn resize(&mut self, width: u32, height: u32, pixel_ratio: f32) {
        if width == 0 || height == 0 {
            return;
        }
        self.settings.width = width;
        self.settings.height = height;
        self.settings.pixel_ratio = pixel_ratio;

        let (physical_width, physical_height) = self.settings.physical_size();
        self.config.width = physical_width;
        self.config.height = physical_height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_texture(&self.device, &self.config, self.sample_count);
        self.msaa_view = (self.sample_count > 1).then(|| create_msaa_texture(&self.device, &self.config, self.sample_count));
    }

    pub fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), ShellError> {
        let draws = collect_draws(scene, camera.position);

        // Upload new geometry, release geometry that left the scene
        let mut seen = HashSet::new();
        for draw in &draws {
            let id = draw.geometry.id();
            seen.insert(id);
            if !self.geometries.contains_key(&id) {
                self.geometries.insert(id, GpuGeometry::upload(&self.device, &draw.geometry));
            }
        }
        self.geometries.retain(|id, _| seen.contains(id));

        self.write_draw_uniforms(&draws);
        let shadows = self.write_frame_uniforms(scene, camera);

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface texture timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(ShellError::Surface(e)),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        // Uniform slots follow collection order; sorting only changes draw order
        let mut order: Vec<(u32, &DrawItem)> = draws.iter().enumerate().map(|(i, d)| (i as u32, d)).collect();

        if shadows {
            let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.shadow_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            shadow_pass.set_pipeline(&self.shadow_pipeline);
            shadow_pass.set_bind_group(0, &self.shadow_bind_group, &[]);
            for (slot, draw) in &order {
                if !draw.cast_shadow || draw.pass == DrawPass::Points {
                    continue;
                }
                if let Some(gpu) = self.geometries.get(&draw.geometry.id()) {
                    shadow_pass.set_bind_group(1, &self.draw_bind_group, &[self.offset(*slot)]);
                    gpu.draw(&mut shadow_pass);
                }
            }
        }

        order.sort_by(|(_, a), (_, b)| {
            pass_rank(a.pass)
                .cmp(&pass_rank(b.pass))
                .then_with(|| match a.pass {
                    DrawPass::Transparent => b.depth.total_cmp(&a.depth),
                    _ => std::cmp::Ordering::Equal,
                })
        });

        {
            let [r, g, b] = scene.background;
            let (color_view, resolve_target, store) = match &self.msaa_view {
                Some(msaa) => (msaa, Some(&view), wgpu::StoreOp::Discard),
                None => (&view, None, wgpu::StoreOp::Store),
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: 1.0,
                        }),
                        store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.frame_bind_group, &[]);

            let mut current = None;
            for (slot, draw) in &order {
                let Some(gpu) = self.geometries.get(&draw.geometry.id()) else {
                    continue;
                };
                if current != Some(draw.pass) {
                    render_pass.set_pipeline(match draw.pass {
                        DrawPass::Opaque => &self.opaque_pipeline,
                        DrawPass::DoubleSided => &self.double_sided_pipeline,
                        DrawPass::Transparent => &self.transparent_pipeline,
                        DrawPass::Points => &self.points_pipeline,
                    });
                    current = Some(draw.pass);
                }
                render_pass.set_bind_group(1, &self.draw_bind_group, &[self.offset(*slot)]);
                gpu.draw(&mut render_pass);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn offset(&self, slot: u32) -> u32 {
        (slot as u64 * self.draw_stride) as u32
    }

    fn write_draw_uniforms(&mut self, draws: &[DrawItem]) {
        if draws.is_empty() {
            return;
        }
        if draws.len() > self.draw_capacity {
            self.draw_capacity = draws.len().next_power_of_two();
            let draw_size = std::mem::size_of::<DrawUniforms>() as u64;
            let (buffer, bind_group) =
                create_draw_buffer(&self.device, &self.draw_layout, self.draw_stride, draw_size, self.draw_capacity);
            self.draw_buffer = buffer;
            self.draw_bind_group = bind_group;
            log::debug!("Grew draw uniform buffer to {} slots", self.draw_capacity);
        }

        let stride = self.draw_stride as usize;
        let mut bytes = vec![0u8; draws.len() * stride];
        for (i, draw) in draws.iter().enumerate() {
            let data = bytemuck::bytes_of(&draw.uniforms);
            bytes[i * stride..i * stride + data.len()].copy_from_slice(data);
        }
        self.queue.write_buffer(&self.draw_buffer, 0, &bytes);
    }

    /// Returns whether the shadow pass should run.
    fn write_frame_uniforms(&self, scene: &Scene, camera: &PerspectiveCamera) -> bool {
        let mut uniforms = FrameUniforms::zeroed();
        uniforms.view_proj = camera.view_projection().to_cols_array_2d();
        uniforms.camera_pos = camera.position.extend(1.0).to_array();
        if let Some(fog) = &scene.fog {
            let [r, g, b] = fog.color;
            uniforms.fog = [r, g, b, fog.density];
        }

        let mut ambient = Vec3::ZERO;
        let mut directional = 0;
        let mut points = 0;
        let mut shadow_light = None;

        for light in scene.lights() {
            let color = Vec3::from_array(light.color) * light.intensity;
            match light.kind {
                LightKind::Ambient => ambient += color,
                LightKind::Directional if directional < MAX_DIRECTIONAL => {
                    let direction = light.position.normalize_or_zero();
                    let casts = self.settings.shadows && light.cast_shadow && shadow_light.is_none();
                    if casts {
                        shadow_light = Some(direction);
                    }
                    uniforms.dir_directions[directional] = direction.extend(if casts { 1.0 } else { 0.0 }).to_array();
                    uniforms.dir_colors[directional] = color.extend(1.0).to_array();
                    directional += 1;
                }
                LightKind::Point if points < MAX_POINT => {
                    uniforms.point_positions[points] = light.position.extend(1.0).to_array();
                    uniforms.point_colors[points] = color.extend(1.0).to_array();
                    points += 1;
                }
                _ => log::warn!("Light limit reached, ignoring {:?} light", light.kind),
            }
        }

        uniforms.ambient = ambient.extend(1.0).to_array();
        if let Some(direction) = shadow_light {
            uniforms.light_view_proj = light_view_projection(direction).to_cols_array_2d();
        }
        uniforms.counts = [
            directional as f32,
            points as f32,
            if shadow_light.is_some() { 1.0 } else { 0.0 },
            1.0 / SHADOW_MAP_SIZE as f32,
        ];

        self.queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));
        shadow_light.is_some()
    }
}

fn collect_draws(scene: &Scene, eye: Vec3) -> Vec<DrawItem> {
    let mut draws = Vec::new();
    for root in scene.iter_roots() {
        root.traverse_world(Mat4::IDENTITY, &mut |world, object| {
            let (geometry, color, surface, pass) = match &object.kind {
                ObjectKind::Group => return,
                ObjectKind::Mesh(mesh) => {
                    let material = &mesh.material;
                    let [r, g, b] = material.color;
                    let unlit = if material.shading == Shading::Unlit { 1.0 } else { 0.0 };
                    let receive = if object.receive_shadow { 1.0 } else { 0.0 };
                    let pass = if material.transparent {
                        DrawPass::Transparent
                    } else if material.double_sided {
                        DrawPass::DoubleSided
                    } else {
                        DrawPass::Opaque
                    };
                    (
                        &mesh.geometry,
                        [r, g, b, material.opacity],
                        [material.metalness, material.roughness, unlit, receive],
                        pass,
                    )
                }
                ObjectKind::Points(points) => {
                    let [r, g, b] = points.material.color;
                    (&points.geometry, [r, g, b, 1.0], [0.0, 1.0, 1.0, 0.0], DrawPass::Points)
                }
            };
            if geometry.vertex_count() == 0 {
                return;
            }
            draws.push(DrawItem {
                geometry: Arc::clone(geometry),
                uniforms: DrawUniforms {
                    model: world.to_cols_array_2d(),
                    normal_matrix: world.inverse().transpose().to_cols_array_2d(),
                    color,
                    surface,
                },
                pass,
                cast_shadow: object.cast_shadow,
                depth: world.transform_point3(Vec3::ZERO).distance(eye),
            });
        });
    }
    draws
}

fn pass_rank(pass: DrawPass) -> u8 {
    match pass {
        DrawPass::Opaque => 0,
        DrawPass::DoubleSided => 1,
        DrawPass::Points => 2,
        DrawPass::Transparent => 3,
    }
}

/// Orthographic projection looking from the light toward the origin.
fn light_view_projection(direction: Vec3) -> Mat4 {
    let up = if direction.abs_diff_eq(Vec3::Y, 1e-3) || direction.abs_diff_eq(-Vec3::Y, 1e-3) {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(direction * SHADOW_DISTANCE, Vec3::ZERO, up);
    let projection = Mat4::orthographic_rh(
        -SHADOW_EXTENT,
        SHADOW_EXTENT,
        -SHADOW_EXTENT,
        SHADOW_EXTENT,
        0.1,
        SHADOW_DISTANCE * 2.0,
    );
    projection * view
}

/// Instance descriptor for `backends` with default flags.
pub fn instance_descriptor(backends: wgpu::Backends) -> wgpu::InstanceDescriptor {
    wgpu::InstanceDescriptor {
        backends,
        ..Default::default()
    }
}

fn uniform_entry(binding: u32, dynamic: bool, min_binding_size: Option<NonZeroU64>) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size,
        },
        count: None,
    }
}

fn create_draw_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    size: u64,
    capacity: usize,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniform Buffer"),
        size: stride * capacity as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(size),
            }),
        }],
    });
    (buffer, bind_group)
}

fn create_scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    sample_count: u32,
    spec: PipelineSpec,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(spec.vs),
            buffers: &[Vertex::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(spec.fs),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(spec.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: spec.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: spec.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: sample_count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

fn create_shadow_texture(device: &wgpu::Device) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Shadow Map"),
        size: wgpu::Extent3d {
            width: SHADOW_MAP_SIZE,
            height: SHADOW_MAP_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_depth_texture(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration, sample_count: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_msaa_texture(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration, sample_count: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("MSAA Color Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relic::environment::{add_environment, add_lights, create_scene};
    use relic::placeholder::create_placeholder;
    use rand::SeedableRng;

    #[test]
    fn test_instance_descriptor_keeps_webgl_alongside_webgpu() {
        let desc = instance_descriptor(wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL);
        assert!(desc.backends.contains(wgpu::Backends::GL));
        assert!(desc.backends.contains(wgpu::Backends::BROWSER_WEBGPU));
    }

    #[test]
    fn test_uniform_layout_matches_shader() {
        // WGSL uniform structs are 16-byte aligned
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 448);
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 160);
    }

    #[test]
    fn test_collect_draws_covers_scene() {
        let mut scene = create_scene();
        add_lights(&mut scene);
        add_environment(&mut scene, 100, &mut rand::rngs::StdRng::seed_from_u64(9));
        scene.set_subject(create_placeholder());

        let draws = collect_draws(&scene, Vec3::new(0.0, 1.5, 5.0));
        assert_eq!(draws.len(), 3 + 4);
        assert_eq!(draws.iter().filter(|d| d.pass == DrawPass::Points).count(), 1);
        assert_eq!(draws.iter().filter(|d| d.pass == DrawPass::Transparent).count(), 1);
    }

    #[test]
    fn test_empty_starfield_is_skipped() {
        let mut scene = create_scene();
        add_environment(&mut scene, 0, &mut rand::rngs::StdRng::seed_from_u64(1));
        let draws = collect_draws(&scene, Vec3::ZERO);
        assert!(draws.iter().all(|d| d.pass != DrawPass::Points));
    }

    #[test]
    fn test_transparent_draws_last() {
        assert!(pass_rank(DrawPass::Transparent) > pass_rank(DrawPass::Points));
        assert!(pass_rank(DrawPass::Points) > pass_rank(DrawPass::Opaque));
    }

    #[test]
    fn test_shadow_frustum_contains_ground() {
        let light = light_view_projection(Vec3::new(5.0, 5.0, 5.0).normalize());
        for p in [Vec3::new(15.0, -1.5, 0.0), Vec3::new(-15.0, -1.5, 0.0), Vec3::new(0.0, 3.7, 0.0)] {
            let ndc = light.project_point3(p);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
            assert!((0.0..=1.0).contains(&ndc.z));
        }
    }
}
