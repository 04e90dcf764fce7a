//! Lodestar engine crate.
//!
//! Sits between a host engine and the platform's windowing + GPU facilities.
//! Hosts talk to it through opaque integer handles and flat descriptors; the
//! crate owns the window and pipeline registries, the pooled GPU buffers and
//! the per-frame render pass.

pub mod backend;
pub mod boundary;
pub mod buffer;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod logging;
pub mod pipeline;
pub mod render_pass;
pub mod runtime;
pub mod server;
pub mod time;
pub mod window;

pub use context::RenderContext;
pub use error::{RenderError, Result};
pub use handle::{Handle, INVALID_HANDLE};
