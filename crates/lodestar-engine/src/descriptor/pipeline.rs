use crate::handle::{Handle, INVALID_HANDLE};

/// Face culled while rasterizing.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    Back = 1,
    #[default]
    Front = 2,
}

impl CullMode {
    /// Parses `"front"` / `"back"`; anything else is front-face culling.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("back") {
            Self::Back
        } else {
            Self::Front
        }
    }
}

/// Pipeline record.
///
/// A pipeline is identified by the window it is bound to; `window == 0`
/// marks the invalid descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    pub window: Handle,
    /// Vertex function name in the compiled shader library.
    pub vertex: String,
    /// Fragment function name in the compiled shader library.
    pub fragment: String,
    pub clear_color: [f32; 4],
    /// Owning buffer manager; [`super::SHARED_MANAGER`] opts into the shared one.
    pub buffer_manager: Handle,
    pub culling: CullMode,
}

impl PipelineDescriptor {
    pub fn new(window: Handle, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            window,
            vertex: vertex.into(),
            fragment: fragment.into(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            buffer_manager: INVALID_HANDLE,
            culling: CullMode::Front,
        }
    }

    pub fn with_clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.clear_color = rgba;
        self
    }

    pub fn with_buffer_manager(mut self, manager: Handle) -> Self {
        self.buffer_manager = manager;
        self
    }

    pub fn with_culling(mut self, culling: CullMode) -> Self {
        self.culling = culling;
        self
    }

    /// The record returned by failed pipeline operations.
    pub fn invalid() -> Self {
        Self {
            clear_color: [0.0; 4],
            ..Self::new(INVALID_HANDLE, String::new(), String::new())
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.window != INVALID_HANDLE
    }
}

impl Default for PipelineDescriptor {
    fn default() -> Self {
        Self::invalid()
    }
}
