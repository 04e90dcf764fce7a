//! Process-wide engine context.
//!
//! Owns the GPU device, the window registry and the pipeline registry, and
//! routes buffer and render-pass calls to the manager or pipeline a
//! descriptor names. Everything is driven from one thread; only buffer pools
//! are touched from completion callbacks.

use std::sync::Arc;

use crate::backend::{Backend, NativeWindow, Toolkit};
use crate::buffer::{BufferManager, PoolSettings};
use crate::descriptor::{BufferDescriptor, PipelineDescriptor, WindowDescriptor};
use crate::error::{RenderError, Result};
use crate::handle::Handle;
use crate::pipeline::PipelineRegistry;
use crate::render_pass::{PassState, RenderPass};
use crate::window::WindowRegistry;

pub struct RenderContext<B: Backend> {
    gpu: Arc<B>,
    windows: WindowRegistry<B>,
    pipelines: PipelineRegistry<B>,
}

impl<B: Backend> RenderContext<B> {
    pub fn new(gpu: Arc<B>, settings: PoolSettings) -> Self {
        Self {
            gpu,
            windows: WindowRegistry::new(),
            pipelines: PipelineRegistry::new(settings),
        }
    }

    pub fn gpu(&self) -> &Arc<B> {
        &self.gpu
    }

    pub fn windows(&self) -> &WindowRegistry<B> {
        &self.windows
    }

    pub fn pipelines(&self) -> &PipelineRegistry<B> {
        &self.pipelines
    }

    // ── windows ───────────────────────────────────────────────────────────

    pub fn create_window<T>(&mut self, toolkit: &T, desc: &WindowDescriptor) -> Result<WindowDescriptor>
    where
        T: Toolkit<Window = B::Window> + ?Sized,
    {
        self.windows.create(toolkit, &*self.gpu, desc)
    }

    pub fn query_window(&self, handle: Handle) -> Result<WindowDescriptor> {
        self.windows.query(handle)
    }

    pub fn update_window(&mut self, handle: Handle, desc: &WindowDescriptor) -> Result<WindowDescriptor> {
        self.windows.update(handle, desc)
    }

    /// Detaches the window's pipeline, then destroys the window.
    ///
    /// Host calls and toolkit close requests both end up here.
    pub fn close_window(&mut self, handle: Handle) -> Result<()> {
        self.pipelines.detach(handle);
        self.windows.close(handle)
    }

    /// Handles a close request the toolkit delivered for `id`.
    pub fn close_native_window(&mut self, id: <B::Window as NativeWindow>::Id) -> Option<Handle> {
        let handle = self.windows.handle_of(id)?;
        self.close_window(handle).ok()?;
        Some(handle)
    }

    pub fn resize_window(&mut self, handle: Handle, width: u32, height: u32) -> Result<()> {
        self.windows.resize(&*self.gpu, handle, width, height)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    // ── pipelines ─────────────────────────────────────────────────────────

    pub fn create_pipeline(&mut self, desc: &PipelineDescriptor) -> Result<PipelineDescriptor> {
        self.pipelines.create(&self.gpu, &self.windows, desc)
    }

    pub fn query_pipeline(&self, window: Handle) -> Result<PipelineDescriptor> {
        self.pipelines.query(window)
    }

    pub fn update_pipeline(&mut self, window: Handle, desc: &PipelineDescriptor) -> Result<PipelineDescriptor> {
        self.pipelines.update(window, desc)
    }

    pub fn close_pipeline(&mut self, window: Handle) {
        self.pipelines.close(window);
    }

    // ── buffers ───────────────────────────────────────────────────────────

    /// The manager `handle` names: the shared one or a window's private one.
    pub fn manager(&self, handle: Handle) -> Result<Arc<BufferManager<B>>> {
        self.pipelines
            .resolve_manager(&self.gpu, handle)
            .ok_or(RenderError::PoolUnresolved)
    }

    pub fn allocate_buffer(&self, desc: &BufferDescriptor, bytes: &[u8]) -> Result<BufferDescriptor> {
        self.manager(desc.manager)?.allocate(desc, bytes)
    }

    /// Writes `bytes` into the next pooled buffer; may block.
    pub fn assign_buffer(&self, desc: &BufferDescriptor, bytes: &[u8]) -> Result<Handle> {
        self.manager(desc.manager)?.assign_mutable(desc, bytes)
    }

    pub fn try_assign_buffer(&self, desc: &BufferDescriptor, bytes: &[u8]) -> Result<Option<Handle>> {
        self.manager(desc.manager)?.try_assign_mutable(desc, bytes)
    }

    pub fn free_buffer(&self, desc: &BufferDescriptor) -> Result<()> {
        self.manager(desc.manager)?.free(desc)
    }

    // ── render passes ─────────────────────────────────────────────────────

    /// The window's encoding pass, opened on first access after a commit.
    pub fn render_pass(&mut self, window: Handle) -> Result<&mut RenderPass<B>> {
        let surface = self.windows.surface(window).ok_or(RenderError::NotFound)?;
        let pipeline = self.pipelines.get_mut(window).ok_or(RenderError::NotFound)?;
        pipeline.render_pass(&*self.gpu, surface)
    }

    pub fn pass_state(&self, window: Handle) -> PassState {
        self.pipelines
            .get(window)
            .map_or(PassState::Uninitialized, |p| p.pass_state())
    }

    /// Binds a buffer to the vertex stage of the window's current pass.
    ///
    /// Does not open a pass; `PassCommitted` once it has been committed.
    pub fn set_vertex_buffer_at(&mut self, window: Handle, desc: &BufferDescriptor, index: u32) -> Result<()> {
        let manager = self.manager(desc.manager)?;
        self.current_pass(window)?.set_vertex_buffer_at(&manager, desc, index)
    }

    pub fn set_fragment_buffer_at(&mut self, window: Handle, desc: &BufferDescriptor, index: u32) -> Result<()> {
        let manager = self.manager(desc.manager)?;
        self.current_pass(window)?.set_fragment_buffer_at(&manager, desc, index)
    }

    pub fn render_triangles(&mut self, window: Handle, count: u32, from: u32) -> Result<()> {
        self.current_pass(window)?.render_triangles(count, from)
    }

    /// `Ok(false)` when the pass was already committed.
    pub fn commit_render_pass(&mut self, window: Handle) -> Result<bool> {
        let pipeline = self.pipelines.get_mut(window).ok_or(RenderError::NotFound)?;
        Ok(pipeline.commit_render_pass())
    }

    fn current_pass(&mut self, window: Handle) -> Result<&mut RenderPass<B>> {
        self.pipelines
            .get_mut(window)
            .and_then(|p| p.current_pass())
            .ok_or(RenderError::NotFound)
    }
}
