// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

use std::num::NonZeroU64;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::agents::AgentRecord;
use crate::backend::{
    Backend, BackendLimits, CanvasDescriptor, CanvasFilter, CanvasFormat, ComputeProgramDescriptor,
};
use crate::error::GpuInitError;

const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const COMPUTE_ENTRY: &str = "main";
const VERTEX_ENTRY: &str = "vs_main";
const FRAGMENT_ENTRY: &str = "fs_main";

pub struct GpuCanvas {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct GpuAgentBuffer {
    buffer: wgpu::Buffer,
}

pub struct GpuComputeProgram {
    label: String,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
    uses_agents: bool,
}

pub struct GpuDisplayProgram {
    label: String,
    pipeline: wgpu::RenderPipeline,
    bind_group: Option<wgpu::BindGroup>,
}

/// Command encoder for one frame plus the swapchain view it draws into.
pub struct GpuFrame {
    pub encoder: wgpu::CommandEncoder,
    pub view: wgpu::TextureView,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    display_bind_group_layout: wgpu::BindGroupLayout,
    display_pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
}

pub struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl SurfaceState {
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, device: &wgpu::Device, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(device, &self.config);
        }
    }

    pub fn acquire(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }
}

/// Bring up adapter, device and surface for `window`.
pub async fn init(window: Arc<Window>) -> Result<(WgpuBackend, SurfaceState), GpuInitError> {
    let size = window.inner_size();

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        ..Default::default()
    });
    let surface = instance.create_surface(window)?;

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GpuInitError::NoAdapter)?;
    log::info!("Using adapter {:?}", adapter.get_info().name);

    // rgba32float is only read_write-storable behind adapter specific format features.
    let format_features = adapter.get_texture_format_features(CANVAS_FORMAT);
    if !adapter
        .features()
        .contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
        || !format_features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::STORAGE_READ_WRITE)
    {
        return Err(GpuInitError::MissingFeature(CANVAS_FORMAT));
    }

    let adapter_limits = adapter.limits();
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("GPU Device"),
                required_features: wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES,
                required_limits: wgpu::Limits {
                    max_texture_dimension_2d: adapter_limits.max_texture_dimension_2d,
                    max_storage_buffer_binding_size: adapter_limits
                        .max_storage_buffer_binding_size,
                    max_buffer_size: adapter_limits.max_buffer_size,
                    ..wgpu::Limits::default()
                },
                memory_hints: Default::default(),
            },
            None,
        )
        .await?;

    let caps = surface.get_capabilities(&adapter);
    let surface_format = caps
        .formats
        .iter()
        .copied()
        .find(|f| !f.is_srgb())
        .or_else(|| caps.formats.first().copied())
        .ok_or(GpuInitError::NoAdapter)?;

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    let backend = WgpuBackend::new(device, queue, surface_format);
    Ok((backend, SurfaceState { surface, config }))
}

// The uniform binding carries the pass's own block size, so a shader expecting a
// larger block fails at pipeline creation rather than at dispatch.
fn compute_layout_entries(
    with_agents: bool,
    uniform_size: u64,
) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = vec![
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::ReadWrite,
                format: CANVAS_FORMAT,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(uniform_size),
            },
            count: None,
        },
    ];
    if with_agents {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    entries
}

impl WgpuBackend {
    fn new(device: wgpu::Device, queue: wgpu::Queue, surface_format: wgpu::TextureFormat) -> Self {
        let display_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Display Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });
        let display_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Display Pipeline Layout"),
                bind_group_layouts: &[&display_bind_group_layout],
                push_constant_ranges: &[],
            });

        // Canvas is never repeated or interpolated.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Canvas Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            surface_format,
            display_bind_group_layout,
            display_pipeline_layout,
            sampler,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn begin_frame(&self, view: wgpu::TextureView) -> GpuFrame {
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        GpuFrame { encoder, view }
    }

    pub fn submit(&self, frame: GpuFrame) {
        self.queue.submit(std::iter::once(frame.encoder.finish()));
    }

    /// Run `build` inside a validation error scope and report what it caught.
    fn validated<T>(&self, build: impl FnOnce() -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }
}

impl Backend for WgpuBackend {
    type Canvas = GpuCanvas;
    type AgentBuffer = GpuAgentBuffer;
    type ComputeProgram = GpuComputeProgram;
    type DisplayProgram = GpuDisplayProgram;
    type Frame = GpuFrame;

    fn limits(&self) -> BackendLimits {
        let limits = self.device.limits();
        BackendLimits {
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
            max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size as u64,
        }
    }

    fn create_canvas(&self, desc: &CanvasDescriptor) -> GpuCanvas {
        let format = match desc.format {
            CanvasFormat::Rgba32Float => CANVAS_FORMAT,
        };
        // Sampling is always nearest; the shared sampler covers it.
        let CanvasFilter::Nearest = desc.filter;

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Canvas Texture"),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuCanvas {
            _texture: texture,
            view,
        }
    }

    fn create_agent_buffer(&self, agents: &[AgentRecord]) -> GpuAgentBuffer {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Agent Buffer"),
                contents: bytemuck::cast_slice(agents),
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            });
        GpuAgentBuffer { buffer }
    }

    fn compile_compute(
        &self,
        desc: &ComputeProgramDescriptor<'_>,
    ) -> Result<GpuComputeProgram, String> {
        let (bind_group_layout, pipeline) = self.validated(|| {
            let bind_group_layout =
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some(desc.label),
                        entries: &compute_layout_entries(desc.uses_agents, desc.uniform_size),
                    });
            let layout = self
                .device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(desc.label),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });
            let module = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(desc.label),
                    source: wgpu::ShaderSource::Wgsl(desc.source.into()),
                });
            let pipeline = self
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(desc.label),
                    layout: Some(&layout),
                    module: &module,
                    entry_point: COMPUTE_ENTRY,
                    compilation_options: Default::default(),
                    cache: None,
                });
            (bind_group_layout, pipeline)
        })?;

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(GpuComputeProgram {
            label: desc.label.to_string(),
            pipeline,
            bind_group_layout,
            uniform_buffer,
            bind_group: None,
            uses_agents: desc.uses_agents,
        })
    }

    fn compile_display(
        &self,
        label: &str,
        vertex: &str,
        fragment: &str,
    ) -> Result<GpuDisplayProgram, String> {
        let pipeline = self.validated(|| {
            let vs = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(vertex.into()),
                });
            let fs = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(fragment.into()),
                });
            self.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
                    layout: Some(&self.display_pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &vs,
                        entry_point: VERTEX_ENTRY,
                        compilation_options: Default::default(),
                        buffers: &[],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &fs,
                        entry_point: FRAGMENT_ENTRY,
                        compilation_options: Default::default(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: self.surface_format,
                            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
        })?;

        Ok(GpuDisplayProgram {
            label: label.to_string(),
            pipeline,
            bind_group: None,
        })
    }

    fn bind_compute(
        &self,
        program: &mut GpuComputeProgram,
        canvas: &GpuCanvas,
        agents: Option<&GpuAgentBuffer>,
    ) {
        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&canvas.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: program.uniform_buffer.as_entire_binding(),
            },
        ];
        match (program.uses_agents, agents) {
            (true, Some(agents)) => entries.push(wgpu::BindGroupEntry {
                binding: 2,
                resource: agents.buffer.as_entire_binding(),
            }),
            (true, None) => {
                log::error!("{} needs an agent buffer but none exists", program.label);
                program.bind_group = None;
                return;
            }
            (false, _) => {}
        }

        program.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.label),
            layout: &program.bind_group_layout,
            entries: &entries,
        }));
    }

    fn bind_display(&self, program: &mut GpuDisplayProgram, canvas: &GpuCanvas) {
        program.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.label),
            layout: &self.display_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&canvas.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        }));
    }

    fn write_uniforms(&self, program: &GpuComputeProgram, bytes: &[u8]) {
        self.queue.write_buffer(&program.uniform_buffer, 0, bytes);
    }

    fn dispatch(&self, frame: &mut GpuFrame, program: &GpuComputeProgram, workgroups: [u32; 3]) {
        let Some(bind_group) = &program.bind_group else {
            return;
        };
        if workgroups.contains(&0) {
            return;
        }
        let mut pass = frame
            .encoder
            .begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(&program.label),
                timestamp_writes: None,
            });
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
    }

    fn draw(&self, frame: &mut GpuFrame, program: &GpuDisplayProgram, clear: [f32; 3]) {
        let [r, g, b] = clear.map(f64::from);
        let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&program.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 1.0 }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some(bind_group) = &program.bind_group {
            rpass.set_pipeline(&program.pipeline);
            rpass.set_bind_group(0, bind_group, &[]);
            rpass.draw(0..6, 0..1);
        }
    }
}
