//! Error kinds reported by the registries, the buffer manager and the render
//! pass.
//!
//! Internally every operation returns [`Result`]; the `boundary` module turns
//! failures into the invalid-descriptor sentinels the host expects.

use thiserror::Error;

use crate::handle::Handle;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Pipeline creation named a window that does not exist.
    #[error("no window with handle {0}")]
    InvalidWindowReference(Handle),

    #[error("vertex function `{0}` not found in the shader library")]
    InvalidVertexFunction(String),

    #[error("fragment function `{0}` not found in the shader library")]
    InvalidFragmentFunction(String),

    /// Query/update/bind against an unknown handle or identifier.
    #[error("resource not found")]
    NotFound,

    /// The surface has no presentable frame ready; skip this frame.
    #[error("no drawable available")]
    NoDrawableAvailable,

    /// Buffer operation against a manager or pool that was never allocated.
    #[error("buffer manager or pool was never allocated")]
    PoolUnresolved,

    /// Binding or drawing on a pass that was already committed.
    #[error("render pass already committed")]
    PassCommitted,

    /// A bounded wait on a pool slot expired.
    #[error("timed out waiting for a free pool slot")]
    GateTimeout,

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(&'static str),

    #[error("handle space exhausted")]
    HandlesExhausted,

    /// Native toolkit or GPU failure.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl RenderError {
    /// Whether the caller can simply skip the frame and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoDrawableAvailable | Self::GateTimeout)
    }

    /// Short stable name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidWindowReference(_) => "InvalidWindowReference",
            Self::InvalidVertexFunction(_) => "InvalidVertexFunction",
            Self::InvalidFragmentFunction(_) => "InvalidFragmentFunction",
            Self::NotFound => "NotFound",
            Self::NoDrawableAvailable => "NoDrawableAvailable",
            Self::PoolUnresolved => "PoolUnresolved",
            Self::PassCommitted => "PassCommitted",
            Self::GateTimeout => "GateTimeout",
            Self::InvalidDescriptor(_) => "InvalidDescriptor",
            Self::HandlesExhausted => "HandlesExhausted",
            Self::Backend(_) => "Backend",
        }
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
