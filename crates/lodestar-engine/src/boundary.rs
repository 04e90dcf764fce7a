//! Host-facing entry points.
//!
//! Nothing here returns an error. Failures come back as the sentinel values
//! hosts already understand (identifier 0, window 0, slot 0, `false`) and are
//! logged with their kind.

use crate::backend::{Backend, Toolkit};
use crate::context::RenderContext;
use crate::descriptor::{BufferDescriptor, BufferKind, PipelineDescriptor, WindowDescriptor};
use crate::error::{RenderError, Result};
use crate::handle::{Handle, INVALID_HANDLE};

fn report<T>(op: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e @ (RenderError::NoDrawableAvailable | RenderError::NotFound)) => {
            log::debug!("{op}: {} ({e})", e.kind());
            None
        }
        Err(e) => {
            log::error!("{op} failed: {} ({e})", e.kind());
            None
        }
    }
}

impl<B: Backend> RenderContext<B> {
    pub fn window_create<T>(&mut self, toolkit: &T, desc: &WindowDescriptor) -> WindowDescriptor
    where
        T: Toolkit<Window = B::Window> + ?Sized,
    {
        report("window_create", self.create_window(toolkit, desc)).unwrap_or_else(WindowDescriptor::invalid)
    }

    pub fn window_query(&self, handle: Handle) -> WindowDescriptor {
        report("window_query", self.query_window(handle)).unwrap_or_else(WindowDescriptor::invalid)
    }

    pub fn window_update(&mut self, handle: Handle, desc: &WindowDescriptor) -> WindowDescriptor {
        report("window_update", self.update_window(handle, desc)).unwrap_or_else(WindowDescriptor::invalid)
    }

    /// Unknown handles are accepted silently.
    pub fn window_close(&mut self, handle: Handle) {
        report("window_close", self.close_window(handle));
    }

    pub fn pipeline_create(&mut self, desc: &PipelineDescriptor) -> PipelineDescriptor {
        report("pipeline_create", self.create_pipeline(desc)).unwrap_or_else(PipelineDescriptor::invalid)
    }

    pub fn pipeline_query(&self, window: Handle) -> PipelineDescriptor {
        report("pipeline_query", self.query_pipeline(window)).unwrap_or_else(PipelineDescriptor::invalid)
    }

    pub fn pipeline_update(&mut self, window: Handle, desc: &PipelineDescriptor) -> PipelineDescriptor {
        report("pipeline_update", self.update_pipeline(window, desc)).unwrap_or_else(PipelineDescriptor::invalid)
    }

    pub fn pipeline_close(&mut self, window: Handle) {
        self.close_pipeline(window);
    }

    /// Immutable: uploads `bytes` and returns the descriptor with its
    /// identifier. Mutable: makes sure the pool exists.
    pub fn buffer_allocate(&self, desc: &BufferDescriptor, bytes: &[u8]) -> BufferDescriptor {
        report("buffer_allocate", self.allocate_buffer(desc, bytes)).unwrap_or_else(BufferDescriptor::invalid)
    }

    /// Writes `bytes` into the next pooled slot and stores its identifier in
    /// `desc`. Returns the identifier, `0` on failure. May block.
    /// Only a mutable descriptor has its identifier overwritten.
    pub fn buffer_assign(&self, desc: &mut BufferDescriptor, bytes: &[u8]) -> Handle {
        let slot = report("buffer_assign", self.assign_buffer(desc, bytes)).unwrap_or(INVALID_HANDLE);
        if desc.kind == BufferKind::Mutable {
            desc.identifier = slot;
        }
        slot
    }

    pub fn buffer_free(&self, desc: &BufferDescriptor) {
        report("buffer_free", self.free_buffer(desc));
    }

    /// Opens the window's render pass if none is encoding.
    pub fn pass_create(&mut self, window: Handle) -> bool {
        report("pass_create", self.render_pass(window).map(|_| ())).is_some()
    }

    pub fn pass_set_vertex_buffer_at(&mut self, window: Handle, desc: &BufferDescriptor, index: u32) -> bool {
        report("pass_set_vertex_buffer_at", self.set_vertex_buffer_at(window, desc, index)).is_some()
    }

    pub fn pass_set_fragment_buffer_at(&mut self, window: Handle, desc: &BufferDescriptor, index: u32) -> bool {
        report("pass_set_fragment_buffer_at", self.set_fragment_buffer_at(window, desc, index)).is_some()
    }

    pub fn pass_render_triangles(&mut self, window: Handle, count: u32, from: u32) -> bool {
        report("pass_render_triangles", self.render_triangles(window, count, from)).is_some()
    }

    /// `false` if there was nothing to commit.
    pub fn pass_commit(&mut self, window: Handle) -> bool {
        report("pass_commit", self.commit_render_pass(window)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::backend::headless::{HeadlessBackend, HeadlessToolkit};
    use crate::buffer::PoolSettings;
    use crate::context::RenderContext;
    use crate::descriptor::{BufferDescriptor, PipelineDescriptor, Rect, WindowDescriptor, WindowFlags};

    fn context() -> RenderContext<HeadlessBackend> {
        RenderContext::new(Arc::new(HeadlessBackend::with_default_library()), PoolSettings::default())
    }

    #[test]
    fn failures_become_invalid_descriptors() {
        let mut ctx = context();
        let tk = HeadlessToolkit::default();

        assert!(!ctx.window_query(5).is_valid());
        assert!(!ctx.window_update(5, &WindowDescriptor::invalid()).is_valid());
        assert!(!ctx.window_create(&tk, &WindowDescriptor::invalid()).is_valid());
        assert!(!ctx.pipeline_create(&PipelineDescriptor::new(5, "vs_main", "fs_main")).is_valid());
        assert!(!ctx.pipeline_query(5).is_valid());
        assert!(!ctx.buffer_allocate(&BufferDescriptor::mutable(5, 4, 4), &[]).is_valid());

        let mut d = BufferDescriptor::mutable(5, 4, 4);
        assert_eq!(ctx.buffer_assign(&mut d, &[0; 16]), 0);
        assert_eq!(d.identifier, 0);

        assert!(!ctx.pass_create(5));
        assert!(!ctx.pass_commit(5));
        ctx.window_close(5);
        ctx.pipeline_close(5);
        ctx.buffer_free(&d);
    }

    #[test]
    fn happy_path_through_the_boundary() {
        let mut ctx = context();
        let tk = HeadlessToolkit::default();

        let w = ctx
            .window_create(&tk, &WindowDescriptor::new(Rect::new(0.0, 0.0, 50.0, 50.0), WindowFlags::DEFAULT))
            .identifier;
        assert_eq!(w, 1);
        assert_eq!(ctx.pipeline_create(&PipelineDescriptor::new(w, "vs_main", "fs_main")).window, w);

        let pool = ctx.buffer_allocate(&BufferDescriptor::mutable(w, 16, 1), &[]);
        let mut frame = pool;
        assert_eq!(ctx.buffer_assign(&mut frame, &[0; 16]), 1);

        assert!(ctx.pass_create(w));
        assert!(ctx.pass_set_vertex_buffer_at(w, &frame, 0));
        assert!(ctx.pass_render_triangles(w, 3, 0));
        assert!(ctx.pass_commit(w));
        assert!(!ctx.pass_commit(w));
        assert!(!ctx.pass_render_triangles(w, 3, 0));
    }

    #[test]
    fn assigning_an_immutable_descriptor_leaves_it_intact() {
        let mut ctx = context();
        let tk = HeadlessToolkit::default();
        let w = ctx
            .window_create(&tk, &WindowDescriptor::new(Rect::new(0.0, 0.0, 50.0, 50.0), WindowFlags::DEFAULT))
            .identifier;
        ctx.pipeline_create(&PipelineDescriptor::new(w, "vs_main", "fs_main"));

        let pool = ctx.buffer_allocate(&BufferDescriptor::mutable(w, 16, 1), &[]);
        let mut verts = ctx.buffer_allocate(&BufferDescriptor::immutable(w, 16, 1), &[7; 16]);
        assert_eq!(verts.identifier, 1);

        assert_eq!(ctx.buffer_assign(&mut verts, &[0; 16]), 0);
        assert_eq!(verts.identifier, 1);
        assert_eq!(ctx.manager(w).unwrap().in_flight(pool.shape()), 0);
    }
}
