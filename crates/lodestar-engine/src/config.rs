//! TOML engine configuration.
//!
//! ```toml
//! [engine]
//! pool_size = 25
//! tick_hz = 60
//! shader_library = "shaders/library.wgsl"
//!
//! [[window]]
//! id = "main"
//! title = "Lodestar"
//! rect = { x = 100, y = 100, w = 1280, h = 720 }
//! flags = ["Closable", "Resizable"]
//!
//! [[pipeline]]
//! window = "main"
//! vertex = "vs_main"
//! fragment = "fs_main"
//! clear_color = [0.05, 0.05, 0.08, 1.0]
//! culling = "back"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::buffer::{PoolSettings, DEFAULT_POOL_SIZE};
use crate::descriptor::{CullMode, PipelineDescriptor, Rect, WindowDescriptor, WindowFlags, SHARED_MANAGER};
use crate::handle::{Handle, INVALID_HANDLE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("window `{0}` is declared twice")]
    DuplicateWindow(String),

    #[error("pipeline refers to unknown window `{0}`")]
    UnknownWindow(String),

    #[error("unknown window flag `{0}`")]
    UnknownFlag(String),

    #[error("unknown culling mode `{0}` (expected \"front\" or \"back\")")]
    UnknownCulling(String),

    #[error("invalid value: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    pub pool_size: usize,
    /// Absent: a blocked buffer assign waits forever.
    pub gate_timeout_ms: Option<u64>,
    pub tick_hz: u32,
    pub shader_library: Option<PathBuf>,
    /// `env_logger` filter; overrides `RUST_LOG`.
    pub log_filter: Option<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            gate_timeout_ms: None,
            tick_hz: 60,
            shader_library: None,
            log_filter: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RectConfig {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    pub id: String,
    pub title: Option<String>,
    pub rect: RectConfig,
    /// Flag names; empty means the default set.
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub screen: u32,
}

impl WindowConfig {
    pub fn flags(&self) -> Result<WindowFlags, ConfigError> {
        if self.flags.is_empty() {
            return Ok(WindowFlags::DEFAULT);
        }
        self.flags.iter().try_fold(WindowFlags::empty(), |acc, name| {
            WindowFlags::from_config_name(name)
                .map(|f| acc | f)
                .ok_or_else(|| ConfigError::UnknownFlag(name.clone()))
        })
    }

    pub fn descriptor(&self) -> Result<WindowDescriptor, ConfigError> {
        let RectConfig { x, y, w, h } = self.rect;
        let mut desc = WindowDescriptor::new(Rect::new(x, y, w, h), self.flags()?).on_screen(self.screen);
        desc.title = Some(self.title.clone().unwrap_or_else(|| self.id.clone()));
        Ok(desc)
    }
}

fn default_clear_color() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Id of a `[[window]]` entry.
    pub window: String,
    pub vertex: String,
    pub fragment: String,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    /// Use the process-wide buffer manager instead of a private one.
    #[serde(default)]
    pub shared: bool,
    pub culling: Option<String>,
}

impl PipelineConfig {
    pub fn culling(&self) -> Result<CullMode, ConfigError> {
        match self.culling.as_deref() {
            None => Ok(CullMode::default()),
            Some(s) if s.eq_ignore_ascii_case("front") || s.eq_ignore_ascii_case("back") => {
                Ok(CullMode::from_name(s))
            }
            Some(s) => Err(ConfigError::UnknownCulling(s.to_owned())),
        }
    }

    pub fn descriptor(&self, window: Handle) -> Result<PipelineDescriptor, ConfigError> {
        let manager = if self.shared { SHARED_MANAGER } else { INVALID_HANDLE };
        Ok(PipelineDescriptor::new(window, &self.vertex, &self.fragment)
            .with_clear_color(self.clear_color)
            .with_buffer_manager(manager)
            .with_culling(self.culling()?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub engine: EngineSection,
    #[serde(rename = "window")]
    pub windows: Vec<WindowConfig>,
    #[serde(rename = "pipeline")]
    pub pipelines: Vec<PipelineConfig>,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Parses and validates.
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.pool_size == 0 {
            return Err(ConfigError::Invalid("engine.pool_size must be at least 1"));
        }
        if self.engine.tick_hz == 0 {
            return Err(ConfigError::Invalid("engine.tick_hz must be at least 1"));
        }

        let mut ids = HashSet::new();
        for w in &self.windows {
            if !ids.insert(w.id.as_str()) {
                return Err(ConfigError::DuplicateWindow(w.id.clone()));
            }
            w.flags()?;
        }
        for p in &self.pipelines {
            if !ids.contains(p.window.as_str()) {
                return Err(ConfigError::UnknownWindow(p.window.clone()));
            }
            p.culling()?;
        }
        Ok(())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            pool_size: self.engine.pool_size,
            gate_timeout: self.engine.gate_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Interval between frame ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.engine.tick_hz.max(1)))
    }
}
