use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::backend::{Backend, PipelineSetup, ShaderStage};
use crate::buffer::{BufferManager, PoolSettings};
use crate::descriptor::{PipelineDescriptor, SHARED_MANAGER};
use crate::error::{RenderError, Result};
use crate::handle::Handle;
use crate::window::WindowRegistry;

use super::Pipeline;

/// Pipelines keyed by the handle of the window they draw into.
pub struct PipelineRegistry<B: Backend> {
    pipelines: HashMap<Handle, Pipeline<B>>,
    shared: OnceLock<Arc<BufferManager<B>>>,
    settings: PoolSettings,
}

impl<B: Backend> PipelineRegistry<B> {
    pub fn new(settings: PoolSettings) -> Self {
        Self {
            pipelines: HashMap::new(),
            shared: OnceLock::new(),
            settings,
        }
    }

    /// The process-wide manager, built by whoever asks first.
    pub fn shared_manager(&self, gpu: &Arc<B>) -> Arc<BufferManager<B>> {
        Arc::clone(self.shared.get_or_init(|| {
            log::debug!("shared buffer manager created");
            Arc::new(BufferManager::new(Arc::clone(gpu), SHARED_MANAGER, self.settings))
        }))
    }

    /// Attaches a pipeline to `desc.window`.
    ///
    /// A pipeline already attached to that window is released first.
    pub fn create(
        &mut self,
        gpu: &Arc<B>,
        windows: &WindowRegistry<B>,
        desc: &PipelineDescriptor,
    ) -> Result<PipelineDescriptor> {
        let surface = windows
            .surface(desc.window)
            .ok_or(RenderError::InvalidWindowReference(desc.window))?;
        if !gpu.has_function(ShaderStage::Vertex, &desc.vertex) {
            return Err(RenderError::InvalidVertexFunction(desc.vertex.clone()));
        }
        if !gpu.has_function(ShaderStage::Fragment, &desc.fragment) {
            return Err(RenderError::InvalidFragmentFunction(desc.fragment.clone()));
        }

        if self.detach(desc.window).is_some() {
            log::warn!("window {}: replacing its pipeline", desc.window);
        }

        let state = gpu.create_pipeline_state(
            surface,
            &PipelineSetup {
                vertex: &desc.vertex,
                fragment: &desc.fragment,
                culling: desc.culling,
            },
        )?;

        let (manager_handle, manager) = if desc.buffer_manager == SHARED_MANAGER {
            (SHARED_MANAGER, self.shared_manager(gpu))
        } else {
            // Private managers are addressed by their window's handle.
            let m = BufferManager::new(Arc::clone(gpu), desc.window, self.settings);
            (desc.window, Arc::new(m))
        };

        let pipeline = Pipeline {
            window: desc.window,
            vertex: desc.vertex.clone(),
            fragment: desc.fragment.clone(),
            clear_color: desc.clear_color,
            culling: desc.culling,
            manager_handle,
            manager,
            state,
            pass: None,
        };
        let out = pipeline.descriptor();
        self.pipelines.insert(desc.window, pipeline);

        log::info!(
            "window {}: pipeline {}/{} attached (manager {manager_handle})",
            desc.window,
            desc.vertex,
            desc.fragment
        );
        Ok(out)
    }

    pub fn query(&self, window: Handle) -> Result<PipelineDescriptor> {
        self.pipelines
            .get(&window)
            .map(Pipeline::descriptor)
            .ok_or(RenderError::NotFound)
    }

    /// Accepted without effect; reports the live configuration.
    pub fn update(&mut self, window: Handle, _desc: &PipelineDescriptor) -> Result<PipelineDescriptor> {
        log::debug!("window {window}: pipeline update is a no-op");
        self.query(window)
    }

    /// Accepted without effect. Pipelines go away with their window.
    pub fn close(&mut self, window: Handle) {
        log::debug!("window {window}: pipeline close is a no-op");
    }

    /// Removes the window's pipeline, committing any open pass so its
    /// pooled buffers still get released.
    pub fn detach(&mut self, window: Handle) -> Option<Pipeline<B>> {
        let mut pipeline = self.pipelines.remove(&window)?;
        if pipeline.commit_render_pass() {
            log::debug!("window {window}: open render pass committed on detach");
        }
        Some(pipeline)
    }

    pub fn get(&self, window: Handle) -> Option<&Pipeline<B>> {
        self.pipelines.get(&window)
    }

    pub fn get_mut(&mut self, window: Handle) -> Option<&mut Pipeline<B>> {
        self.pipelines.get_mut(&window)
    }

    /// Resolves a manager handle: the shared one, or a window's private one.
    pub fn resolve_manager(&self, gpu: &Arc<B>, handle: Handle) -> Option<Arc<BufferManager<B>>> {
        if handle == SHARED_MANAGER {
            return Some(self.shared_manager(gpu));
        }
        self.pipelines
            .get(&handle)
            .filter(|p| p.manager_handle == handle)
            .map(|p| Arc::clone(&p.manager))
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessBackend, HeadlessToolkit};
    use crate::descriptor::{CullMode, Rect, WindowDescriptor, WindowFlags};
    use crate::render_pass::PassState;

    struct Rig {
        gpu: Arc<HeadlessBackend>,
        windows: WindowRegistry<HeadlessBackend>,
        pipelines: PipelineRegistry<HeadlessBackend>,
        window: Handle,
    }

    fn rig() -> Rig {
        let gpu = Arc::new(HeadlessBackend::with_default_library());
        let mut windows = WindowRegistry::new();
        let window = windows
            .create(
                &HeadlessToolkit::default(),
                &*gpu,
                &WindowDescriptor::new(Rect::new(0.0, 0.0, 320.0, 240.0), WindowFlags::DEFAULT),
            )
            .unwrap()
            .identifier;
        Rig {
            gpu,
            windows,
            pipelines: PipelineRegistry::new(PoolSettings::default()),
            window,
        }
    }

    #[test]
    fn create_and_query() {
        let mut r = rig();
        let desc = PipelineDescriptor::new(r.window, "vs_main", "fs_main")
            .with_clear_color([0.2, 0.3, 0.4, 1.0])
            .with_culling(CullMode::Back);

        let created = r.pipelines.create(&r.gpu, &r.windows, &desc).unwrap();
        assert_eq!(created.window, 1);
        assert_eq!(created.buffer_manager, r.window);
        assert_eq!(r.pipelines.query(r.window).unwrap(), created);
        assert_eq!(created.culling, CullMode::Back);
    }

    #[test]
    fn unknown_window_is_rejected() {
        let mut r = rig();
        for window in [0, 9] {
            let err = r
                .pipelines
                .create(&r.gpu, &r.windows, &PipelineDescriptor::new(window, "vs_main", "fs_main"))
                .unwrap_err();
            assert!(matches!(err, RenderError::InvalidWindowReference(w) if w == window));
        }
        assert!(r.pipelines.is_empty());
    }

    #[test]
    fn missing_shader_functions_have_distinct_errors() {
        let mut r = rig();
        let vs = r
            .pipelines
            .create(&r.gpu, &r.windows, &PipelineDescriptor::new(r.window, "nope", "fs_main"))
            .unwrap_err();
        assert!(matches!(vs, RenderError::InvalidVertexFunction(_)));

        let fs = r
            .pipelines
            .create(&r.gpu, &r.windows, &PipelineDescriptor::new(r.window, "vs_main", "does_not_exist"))
            .unwrap_err();
        assert!(matches!(fs, RenderError::InvalidFragmentFunction(ref n) if n == "does_not_exist"));
        assert!(matches!(r.pipelines.query(r.window), Err(RenderError::NotFound)));
    }

    #[test]
    fn shared_manager_is_a_singleton() {
        let mut r = rig();
        let desc = PipelineDescriptor::new(r.window, "vs_main", "fs_main").with_buffer_manager(SHARED_MANAGER);
        let created = r.pipelines.create(&r.gpu, &r.windows, &desc).unwrap();
        assert_eq!(created.buffer_manager, SHARED_MANAGER);

        let a = r.pipelines.resolve_manager(&r.gpu, SHARED_MANAGER).unwrap();
        let b = r.pipelines.get(r.window).unwrap().manager().clone();
        assert!(Arc::ptr_eq(&a, &b));
        // The window has no private manager.
        assert!(r.pipelines.resolve_manager(&r.gpu, r.window).is_none());
    }

    #[test]
    fn reattach_replaces_and_commits_open_pass() {
        let mut r = rig();
        let desc = PipelineDescriptor::new(r.window, "vs_main", "fs_main");
        r.pipelines.create(&r.gpu, &r.windows, &desc).unwrap();

        let surface = r.windows.surface(r.window).unwrap();
        let p = r.pipelines.get_mut(r.window).unwrap();
        p.render_pass(&*r.gpu, surface).unwrap();
        assert_eq!(p.pass_state(), PassState::Encoding);

        let again = desc.clone().with_clear_color([1.0, 0.0, 0.0, 1.0]);
        r.pipelines.create(&r.gpu, &r.windows, &again).unwrap();

        assert_eq!(r.pipelines.len(), 1);
        assert_eq!(r.gpu.pending_submissions(), 1);
        assert_eq!(r.pipelines.query(r.window).unwrap().clear_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(r.pipelines.get(r.window).unwrap().pass_state(), PassState::Uninitialized);
    }

    #[test]
    fn update_and_close_are_permissive() {
        let mut r = rig();
        let desc = PipelineDescriptor::new(r.window, "vs_main", "fs_main");
        let created = r.pipelines.create(&r.gpu, &r.windows, &desc).unwrap();

        let changed = desc.clone().with_culling(CullMode::Back);
        assert_eq!(r.pipelines.update(r.window, &changed).unwrap(), created);
        assert!(matches!(r.pipelines.update(42, &changed), Err(RenderError::NotFound)));

        r.pipelines.close(r.window);
        r.pipelines.close(42);
        assert_eq!(r.pipelines.len(), 1);
    }

    #[test]
    fn next_access_after_commit_opens_a_fresh_pass() {
        let mut r = rig();
        r.pipelines
            .create(&r.gpu, &r.windows, &PipelineDescriptor::new(r.window, "vs_main", "fs_main"))
            .unwrap();
        let surface = r.windows.surface(r.window).unwrap();
        let p = r.pipelines.get_mut(r.window).unwrap();

        p.render_pass(&*r.gpu, surface).unwrap();
        assert!(p.commit_render_pass());
        assert!(!p.commit_render_pass());
        assert_eq!(p.pass_state(), PassState::Committed);

        let pass = p.render_pass(&*r.gpu, surface).unwrap();
        assert_eq!(pass.state(), PassState::Encoding);
    }
}
