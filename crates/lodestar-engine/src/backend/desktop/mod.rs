//! winit + wgpu backend.
//!
//! One device serves every window. Each window gets its own surface; each
//! pipeline its own render pipeline and depth/stencil target.

mod frame;
mod shader;
mod surface;
mod window;

use std::sync::Arc;

use anyhow::{Context, Result};
use wgpu::util::DeviceExt;

use super::{Backend, PipelineSetup, ShaderStage};
use crate::descriptor::CullMode;

pub use frame::{DepthTarget, DesktopFrame, DesktopPipelineState};
pub use shader::{BindingDecl, BindingKind, LibraryError, LibraryIndex, ShaderLibrary};
pub use surface::DesktopSurface;
pub use window::DesktopWindow;

/// Initialization parameters for the device and its surfaces.
#[derive(Debug, Clone)]
pub struct DesktopInit {
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// FIFO is broadly supported and paces presentation to the display.
    pub present_mode: wgpu::PresentMode,

    /// If provided but unsupported on a surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_features: wgpu::Features,
    pub required_limits: wgpu::Limits,

    /// Hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for DesktopInit {
    fn default() -> Self {
        Self {
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

const BUFFER_USAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::UNIFORM)
    .union(wgpu::BufferUsages::VERTEX)
    .union(wgpu::BufferUsages::COPY_DST);

fn align4(n: u64) -> u64 {
    n.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}

/// Owns wgpu core objects and the compiled shader library.
pub struct DesktopBackend {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    library: ShaderLibrary,
    init: DesktopInit,
}

impl DesktopBackend {
    /// Creates the device and compiles `shader_source`.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu; this blocks on it.
    pub fn new(init: DesktopInit, shader_source: &str) -> Result<Self> {
        pollster::block_on(Self::new_async(init, shader_source))
    }

    pub async fn new_async(init: DesktopInit, shader_source: &str) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lodestar device"),
                required_features: init.required_features,
                required_limits: init.required_limits.clone(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        log::info!("using adapter {:?}", adapter.get_info().name);

        let library = ShaderLibrary::compile(&device, shader_source)?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            library,
            init,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn library(&self) -> &ShaderLibrary {
        &self.library
    }

    fn bind_group_layout(&self, group: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayout {
        let entries: Vec<_> = self
            .library
            .index
            .bindings_in(group)
            .into_iter()
            .map(|decl| wgpu::BindGroupLayoutEntry {
                binding: decl.binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: match decl.kind {
                        BindingKind::Uniform => wgpu::BufferBindingType::Uniform,
                        BindingKind::Storage => wgpu::BufferBindingType::Storage { read_only: true },
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lodestar bind group layout"),
                entries: &entries,
            })
    }
}

fn alpha_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

impl Backend for DesktopBackend {
    type Window = DesktopWindow;
    type Buffer = wgpu::Buffer;
    type Surface = DesktopSurface;
    type PipelineState = DesktopPipelineState;
    type Frame = DesktopFrame;

    fn create_buffer_with_data(&self, label: &str, contents: &[u8]) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: BUFFER_USAGE,
        })
    }

    fn create_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: align4(size),
            usage: BUFFER_USAGE,
            mapped_at_creation: false,
        })
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, data: &[u8]) {
        if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(buffer, 0, data);
            return;
        }
        let mut padded = data.to_vec();
        padded.resize(align4(data.len() as u64) as usize, 0);
        self.queue.write_buffer(buffer, 0, &padded);
    }

    fn has_function(&self, stage: ShaderStage, name: &str) -> bool {
        self.library.index.has_function(stage, name)
    }

    fn create_surface(&self, window: &DesktopWindow) -> Result<DesktopSurface> {
        DesktopSurface::new(
            &self.instance,
            &self.adapter,
            &self.device,
            Arc::clone(window.window()),
            &self.init,
        )
    }

    fn resize_surface(&self, surface: &mut DesktopSurface, width: u32, height: u32) {
        surface.resize(&self.device, width, height);
    }

    fn create_pipeline_state(
        &self,
        surface: &DesktopSurface,
        setup: &PipelineSetup<'_>,
    ) -> Result<DesktopPipelineState> {
        // Layout or pipeline validation failures become errors here.
        let scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let layouts = [
            self.bind_group_layout(0, wgpu::ShaderStages::VERTEX),
            self.bind_group_layout(1, wgpu::ShaderStages::FRAGMENT),
        ];

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("lodestar pipeline layout"),
                bind_group_layouts: &[&layouts[0], &layouts[1]],
                immediate_size: 0,
            });

        let module = &self.library.module;
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("lodestar pipeline"),
                layout: Some(&pipeline_layout),

                // Vertices are pulled from bound buffers; no fixed-function input.
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(setup.vertex),
                    compilation_options: Default::default(),
                    buffers: &[],
                },

                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(setup.fragment),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface.format(),
                        blend: Some(alpha_blend()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),

                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(match setup.culling {
                        CullMode::Back => wgpu::Face::Back,
                        CullMode::Front => wgpu::Face::Front,
                    }),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },

                depth_stencil: Some(wgpu::DepthStencilState {
                    format: frame::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });

        if let Some(err) = pollster::block_on(scope.pop()) {
            return Err(err).with_context(|| {
                format!("pipeline {}/{} failed validation", setup.vertex, setup.fragment)
            });
        }

        let index = &self.library.index;
        Ok(DesktopPipelineState {
            pipeline,
            layouts,
            bindings: [index.bindings_in(0), index.bindings_in(1)],
            depth: DepthTarget::new(&self.device, surface.size()),
        })
    }

    fn begin_frame(
        &self,
        surface: &DesktopSurface,
        state: &mut DesktopPipelineState,
        clear_color: [f32; 4],
    ) -> Option<DesktopFrame> {
        self.maintain();

        let surface_texture = surface.acquire(&self.device)?;
        let color_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if state.depth.size != surface.size() {
            state.depth = DepthTarget::new(&self.device, surface.size());
        }

        Some(DesktopFrame {
            device: self.device.clone(),
            queue: self.queue.clone(),
            surface_texture,
            color_view,
            depth_view: state.depth.view.clone(),
            pipeline: state.pipeline.clone(),
            layouts: state.layouts.clone(),
            bindings: state.bindings.clone(),
            clear_color,
            ops: Vec::new(),
            completions: Vec::new(),
        })
    }

    fn maintain(&self) {
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("device poll failed: {e}");
        }
    }
}
