use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};

use lodestar_engine::backend::desktop::{DesktopBackend, DesktopInit};
use lodestar_engine::config::EngineConfig;
use lodestar_engine::descriptor::BufferDescriptor;
use lodestar_engine::logging::{init_logging, LoggingConfig};
use lodestar_engine::runtime::{Host, HostCtx, Runtime};
use lodestar_engine::time::FrameTime;
use lodestar_engine::Handle;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct Vertex {
    position: [f32; 4],
    color: [f32; 4],
}

// Counter-clockwise, so back-face culling keeps it.
const TRIANGLE: [Vertex; 3] = [
    Vertex { position: [0.0, 0.6, 0.0, 1.0], color: [1.0, 0.35, 0.2, 1.0] },
    Vertex { position: [-0.55, -0.4, 0.0, 1.0], color: [0.2, 0.8, 0.4, 1.0] },
    Vertex { position: [0.55, -0.4, 0.0, 1.0], color: [0.25, 0.45, 1.0, 1.0] },
];

/// Per-frame uniform; 16 bytes to satisfy uniform layout rules.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FrameUniform {
    time: f32,
    aspect: f32,
    _pad: [f32; 2],
}

struct Scene {
    window: Handle,
    vertices: BufferDescriptor,
    uniform: BufferDescriptor,
}

/// Spins one triangle in every configured window.
#[derive(Default)]
struct TriangleHost {
    scenes: Vec<Scene>,
    elapsed: f32,
    skipped: u64,
}

impl TriangleHost {
    fn draw(ctx: &mut HostCtx<'_>, scene: &Scene, uniform: &FrameUniform) -> lodestar_engine::Result<bool> {
        let context = ctx.context();

        // Acquire the drawable before taking a pool slot.
        match context.render_pass(scene.window) {
            Ok(_) => {}
            Err(e) if e.is_recoverable() => return Ok(false),
            Err(e) => return Err(e),
        }

        let mut frame = scene.uniform;
        frame.identifier = match context.assign_buffer(&frame, bytemuck::bytes_of(uniform)) {
            Ok(id) => id,
            Err(e) if e.is_recoverable() => {
                // Present the clear so the pass does not linger.
                context.commit_render_pass(scene.window)?;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        context.set_vertex_buffer_at(scene.window, &scene.vertices, 0)?;
        context.set_vertex_buffer_at(scene.window, &frame, 1)?;
        context.set_fragment_buffer_at(scene.window, &frame, 0)?;
        context.render_triangles(scene.window, TRIANGLE.len() as u32, 0)?;
        context.commit_render_pass(scene.window)?;
        Ok(true)
    }
}

impl Host for TriangleHost {
    fn on_start(&mut self, ctx: &mut HostCtx<'_>) -> bool {
        let handles = ctx.server().handles();
        let context = ctx.context();

        for window in handles {
            let Ok(pipeline) = context.query_pipeline(window) else {
                log::warn!("window {window} has no pipeline; nothing to draw");
                continue;
            };
            let manager = pipeline.buffer_manager;

            let vertices = context.allocate_buffer(
                &BufferDescriptor::immutable(manager, size_of::<Vertex>() as u32, TRIANGLE.len() as u32),
                bytemuck::cast_slice(&TRIANGLE),
            );
            let uniform = context.allocate_buffer(
                &BufferDescriptor::mutable(manager, size_of::<FrameUniform>() as u32, 1),
                &[],
            );

            match (vertices, uniform) {
                (Ok(vertices), Ok(uniform)) => self.scenes.push(Scene { window, vertices, uniform }),
                (Err(e), _) | (_, Err(e)) => {
                    log::error!("window {window}: buffer setup failed: {e}");
                    return false;
                }
            }
        }

        !self.scenes.is_empty()
    }

    fn on_frame(&mut self, ctx: &mut HostCtx<'_>, time: FrameTime) -> bool {
        self.elapsed += time.dt;

        // Windows the user closed take their scene with them.
        let open = ctx.server().handles();
        self.scenes.retain(|s| open.contains(&s.window));

        for scene in &self.scenes {
            let aspect = ctx
                .context()
                .query_window(scene.window)
                .map(|d| d.frame.w / d.frame.h.max(1.0))
                .unwrap_or(1.0);
            let uniform = FrameUniform { time: self.elapsed, aspect, _pad: [0.0; 2] };

            match Self::draw(ctx, scene, &uniform) {
                Ok(true) => {}
                Ok(false) => self.skipped += 1,
                Err(e) => {
                    log::error!("window {}: frame failed: {} ({e})", scene.window, e.kind());
                    return false;
                }
            }
        }

        !self.scenes.is_empty()
    }

    fn on_close(&mut self, _ctx: &mut HostCtx<'_>) {
        log::info!("studio closing after {:.1}s ({} frames skipped)", self.elapsed, self.skipped);
    }
}

fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("lodestar.toml"))
}

fn main() -> Result<()> {
    let path = config_path();
    let config = EngineConfig::load(&path)?;
    init_logging(LoggingConfig::with_filter(config.engine.log_filter.clone()));
    log::info!("config loaded from {}", path.display());

    let shader_source = match &config.engine.shader_library {
        Some(lib) => {
            let lib = path.parent().unwrap_or(Path::new(".")).join(lib);
            std::fs::read_to_string(&lib)
                .with_context(|| format!("failed to read shader library {}", lib.display()))?
        }
        None => include_str!("../shaders/library.wgsl").to_string(),
    };

    let gpu = DesktopBackend::new(DesktopInit::default(), &shader_source)?;
    Runtime::run(config, Arc::new(gpu), TriangleHost::default())
}
