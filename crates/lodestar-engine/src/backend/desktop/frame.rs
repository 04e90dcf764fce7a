use std::collections::BTreeMap;
use std::ops::Range;

use crate::backend::{CompletionCallback, FrameEncoder, ShaderStage};

use super::shader::BindingDecl;

pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Combined depth+stencil target sized to the drawable.
pub struct DepthTarget {
    pub size: (u32, u32),
    pub view: wgpu::TextureView,
}

impl DepthTarget {
    pub(super) fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("lodestar depth/stencil"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            size,
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }
}

/// Native state behind one pipeline.
pub struct DesktopPipelineState {
    pub(super) pipeline: wgpu::RenderPipeline,
    /// Group 0 holds vertex-stage buffers, group 1 fragment-stage buffers.
    pub(super) layouts: [wgpu::BindGroupLayout; 2],
    pub(super) bindings: [Vec<BindingDecl>; 2],
    pub(super) depth: DepthTarget,
}

pub(super) enum Op {
    Bind {
        group: usize,
        index: u32,
        buffer: wgpu::Buffer,
    },
    Draw(Range<u32>),
}

/// Records binds and draws, replayed into a single render pass on commit.
pub struct DesktopFrame {
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
    pub(super) surface_texture: wgpu::SurfaceTexture,
    pub(super) color_view: wgpu::TextureView,
    pub(super) depth_view: wgpu::TextureView,
    pub(super) pipeline: wgpu::RenderPipeline,
    pub(super) layouts: [wgpu::BindGroupLayout; 2],
    pub(super) bindings: [Vec<BindingDecl>; 2],
    pub(super) clear_color: [f32; 4],
    pub(super) ops: Vec<Op>,
    pub(super) completions: Vec<CompletionCallback>,
}

impl DesktopFrame {
    /// Builds the bind group for `group` from the currently bound buffers.
    ///
    /// `None` if a binding the library declares has nothing bound.
    fn bind_group(
        &self,
        group: usize,
        bound: &BTreeMap<u32, wgpu::Buffer>,
    ) -> Option<wgpu::BindGroup> {
        let mut entries = Vec::with_capacity(self.bindings[group].len());
        for decl in &self.bindings[group] {
            let buffer = bound.get(&decl.binding)?;
            entries.push(wgpu::BindGroupEntry {
                binding: decl.binding,
                resource: buffer.as_entire_binding(),
            });
        }

        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lodestar frame bind group"),
            layout: &self.layouts[group],
            entries: &entries,
        }))
    }
}

impl FrameEncoder for DesktopFrame {
    type Buffer = wgpu::Buffer;

    fn set_buffer(&mut self, stage: ShaderStage, index: u32, buffer: &wgpu::Buffer) {
        let group = match stage {
            ShaderStage::Vertex => 0,
            ShaderStage::Fragment => 1,
        };
        self.ops.push(Op::Bind {
            group,
            index,
            buffer: buffer.clone(),
        });
    }

    fn draw_triangles(&mut self, vertices: Range<u32>) {
        self.ops.push(Op::Draw(vertices));
    }

    fn on_completed(&mut self, callback: CompletionCallback) {
        self.completions.push(callback);
    }

    fn commit(mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lodestar frame encoder"),
            });

        let ops = std::mem::take(&mut self.ops);
        {
            let [r, g, b, a] = self.clear_color;
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lodestar render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&self.pipeline);

            let mut bound: [BTreeMap<u32, wgpu::Buffer>; 2] = Default::default();
            let mut dirty = [true, true];
            let mut warned = false;

            for op in ops {
                match op {
                    Op::Bind { group, index, buffer } => {
                        bound[group].insert(index, buffer);
                        dirty[group] = true;
                    }
                    Op::Draw(range) => {
                        let mut complete = true;
                        for group in 0..2 {
                            if !dirty[group] {
                                continue;
                            }
                            match self.bind_group(group, &bound[group]) {
                                Some(bg) => {
                                    rpass.set_bind_group(group as u32, &bg, &[]);
                                    dirty[group] = false;
                                }
                                None => complete = false,
                            }
                        }
                        if !complete {
                            if !warned {
                                log::warn!("draw skipped: not every declared buffer binding is bound");
                                warned = true;
                            }
                            continue;
                        }
                        rpass.draw(range, 0..1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        for cb in self.completions.drain(..) {
            self.queue.on_submitted_work_done(cb);
        }

        self.surface_texture.present();
    }
}
