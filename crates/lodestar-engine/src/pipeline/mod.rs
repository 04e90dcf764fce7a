//! Render pipelines, one per window.

mod registry;

use std::sync::Arc;

use crate::backend::Backend;
use crate::buffer::BufferManager;
use crate::descriptor::{CullMode, PipelineDescriptor};
use crate::error::Result;
use crate::handle::Handle;
use crate::render_pass::{PassState, RenderPass};

pub use registry::PipelineRegistry;

/// Pipeline attached to a window.
///
/// Holds no reference to the window itself; the surface is looked up by
/// handle each frame, so a pipeline never keeps its window alive.
pub struct Pipeline<B: Backend> {
    window: Handle,
    vertex: String,
    fragment: String,
    clear_color: [f32; 4],
    culling: CullMode,
    manager_handle: Handle,
    manager: Arc<BufferManager<B>>,
    state: B::PipelineState,
    pass: Option<RenderPass<B>>,
}

impl<B: Backend> Pipeline<B> {
    pub fn window(&self) -> Handle {
        self.window
    }

    pub fn manager(&self) -> &Arc<BufferManager<B>> {
        &self.manager
    }

    pub fn descriptor(&self) -> PipelineDescriptor {
        PipelineDescriptor {
            window: self.window,
            vertex: self.vertex.clone(),
            fragment: self.fragment.clone(),
            clear_color: self.clear_color,
            buffer_manager: self.manager_handle,
            culling: self.culling,
        }
    }

    /// The encoding pass, opening one on `surface` if none is.
    pub fn render_pass(&mut self, gpu: &B, surface: &B::Surface) -> Result<&mut RenderPass<B>> {
        let pass = match self.pass.take() {
            Some(p) if !p.is_committed() => p,
            _ => {
                let p = RenderPass::begin(gpu, surface, &mut self.state, self.clear_color)?;
                log::trace!("window {}: render pass opened", self.window);
                p
            }
        };
        Ok(self.pass.insert(pass))
    }

    /// Most recent pass, encoding or committed. Never opens one.
    pub fn current_pass(&mut self) -> Option<&mut RenderPass<B>> {
        self.pass.as_mut()
    }

    /// Commits the encoding pass. `false` if there is none.
    pub fn commit_render_pass(&mut self) -> bool {
        self.pass.as_mut().is_some_and(|p| p.commit())
    }

    pub fn pass_state(&self) -> PassState {
        self.pass.as_ref().map_or(PassState::Uninitialized, |p| p.state())
    }
}
