//! Config-driven setup on top of [`RenderContext`].

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::backend::{Backend, NativeWindow, Toolkit};
use crate::buffer::PoolSettings;
use crate::config::{ConfigError, EngineConfig, PipelineConfig, WindowConfig};
use crate::context::RenderContext;
use crate::descriptor::PipelineDescriptor;
use crate::error::{RenderError, Result};
use crate::handle::Handle;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("window `{0}` already exists")]
    DuplicateWindow(String),

    #[error("pipeline refers to unknown window `{0}`")]
    UnknownWindow(String),

    #[error("window `{id}`: {source}")]
    Window {
        id: String,
        #[source]
        source: RenderError,
    },

    #[error("pipeline for window `{id}`: {source}")]
    Pipeline {
        id: String,
        #[source]
        source: RenderError,
    },
}

/// A [`RenderContext`] whose windows are also known by name.
pub struct RenderServer<B: Backend> {
    context: RenderContext<B>,
    names: HashMap<String, Handle>,
}

impl<B: Backend> RenderServer<B> {
    pub fn new(gpu: Arc<B>, settings: PoolSettings) -> Self {
        Self::from_context(RenderContext::new(gpu, settings))
    }

    pub fn from_context(context: RenderContext<B>) -> Self {
        Self {
            context,
            names: HashMap::new(),
        }
    }

    pub fn context(&self) -> &RenderContext<B> {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut RenderContext<B> {
        &mut self.context
    }

    /// Creates every configured window, then every configured pipeline.
    pub fn setup<T>(&mut self, toolkit: &T, config: &EngineConfig) -> Result<(), SetupError>
    where
        T: Toolkit<Window = B::Window> + ?Sized,
    {
        for w in &config.windows {
            self.add_window(toolkit, w)?;
        }
        for p in &config.pipelines {
            self.add_pipeline(p)?;
        }
        log::info!(
            "render server ready: {} windows, {} pipelines",
            config.windows.len(),
            config.pipelines.len()
        );
        Ok(())
    }

    pub fn add_window<T>(&mut self, toolkit: &T, config: &WindowConfig) -> Result<Handle, SetupError>
    where
        T: Toolkit<Window = B::Window> + ?Sized,
    {
        if self.names.contains_key(&config.id) {
            return Err(SetupError::DuplicateWindow(config.id.clone()));
        }

        let desc = config.descriptor()?;
        let handle = self
            .context
            .create_window(toolkit, &desc)
            .map_err(|source| SetupError::Window {
                id: config.id.clone(),
                source,
            })?
            .identifier;

        self.names.insert(config.id.clone(), handle);
        log::debug!("window `{}` -> {handle}", config.id);
        Ok(handle)
    }

    pub fn add_pipeline(&mut self, config: &PipelineConfig) -> Result<PipelineDescriptor, SetupError> {
        let window = self
            .window(&config.window)
            .ok_or_else(|| SetupError::UnknownWindow(config.window.clone()))?;

        let desc = config.descriptor(window)?;
        self.context
            .create_pipeline(&desc)
            .map_err(|source| SetupError::Pipeline {
                id: config.window.clone(),
                source,
            })
    }

    pub fn window(&self, id: &str) -> Option<Handle> {
        self.names.get(id).copied()
    }

    pub fn name_of(&self, handle: Handle) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(name, _)| name.as_str())
    }

    pub fn close_window(&mut self, id: &str) -> Result<()> {
        let handle = self.names.remove(id).ok_or(RenderError::NotFound)?;
        self.context.close_window(handle)
    }

    /// Handles a toolkit close request; returns the closed window's handle.
    pub fn close_native_window(&mut self, id: <B::Window as NativeWindow>::Id) -> Option<Handle> {
        let handle = self.context.close_native_window(id)?;
        self.names.retain(|_, h| *h != handle);
        Some(handle)
    }

    /// Window handles in no particular order.
    pub fn handles(&self) -> Vec<Handle> {
        self.context.windows().handles().collect()
    }

    pub fn window_count(&self) -> usize {
        self.context.window_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessBackend, HeadlessToolkit};
    use crate::descriptor::SHARED_MANAGER;

    const CONFIG: &str = r#"
[[window]]
id = "main"
rect = { w = 640, h = 480 }

[[window]]
id = "aux"
rect = { w = 320, h = 240 }

[[pipeline]]
window = "main"
vertex = "vs_main"
fragment = "fs_main"
shared = true

[[pipeline]]
window = "aux"
vertex = "vs_main"
fragment = "fs_main"
"#;

    fn server() -> RenderServer<HeadlessBackend> {
        RenderServer::new(Arc::new(HeadlessBackend::with_default_library()), PoolSettings::default())
    }

    #[test]
    fn setup_creates_windows_then_pipelines() {
        let mut s = server();
        let tk = HeadlessToolkit::default();
        s.setup(&tk, &EngineConfig::from_toml_str(CONFIG).unwrap()).unwrap();

        let main = s.window("main").unwrap();
        let aux = s.window("aux").unwrap();
        assert_eq!((main, aux), (1, 2));
        assert_eq!(s.name_of(aux), Some("aux"));
        assert_eq!(s.context().query_pipeline(main).unwrap().buffer_manager, SHARED_MANAGER);
        assert_eq!(s.context().query_pipeline(aux).unwrap().buffer_manager, aux);
    }

    #[test]
    fn duplicate_window_id_fails() {
        let mut s = server();
        let tk = HeadlessToolkit::default();
        let config = EngineConfig::from_toml_str(CONFIG).unwrap();
        s.setup(&tk, &config).unwrap();

        let err = s.add_window(&tk, &config.windows[0]).unwrap_err();
        assert!(matches!(err, SetupError::DuplicateWindow(ref id) if id == "main"));
        assert_eq!(s.window_count(), 2);
    }

    #[test]
    fn bad_shader_names_surface_the_kind() {
        let mut s = server();
        let tk = HeadlessToolkit::default();
        let config = EngineConfig::from_toml_str(
            "[[window]]\nid = \"w\"\nrect = { w = 10, h = 10 }\n[[pipeline]]\nwindow = \"w\"\nvertex = \"vs_main\"\nfragment = \"does_not_exist\"\n",
        )
        .unwrap();

        let err = s.setup(&tk, &config).unwrap_err();
        assert!(matches!(
            err,
            SetupError::Pipeline { source: RenderError::InvalidFragmentFunction(_), .. }
        ));
    }

    #[test]
    fn closing_by_name_forgets_the_name() {
        let mut s = server();
        let tk = HeadlessToolkit::default();
        s.setup(&tk, &EngineConfig::from_toml_str(CONFIG).unwrap()).unwrap();

        s.close_window("aux").unwrap();
        assert_eq!(s.window("aux"), None);
        assert!(matches!(s.close_window("aux"), Err(RenderError::NotFound)));
        assert_eq!(tk.open_windows(), 1);

        let id = s.context().windows().get(1).unwrap().native.id();
        assert_eq!(s.close_native_window(id), Some(1));
        assert_eq!(s.window("main"), None);
        assert_eq!(s.window_count(), 0);
    }
}
