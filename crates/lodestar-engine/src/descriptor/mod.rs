//! Flat descriptor records exchanged across the host boundary.
//!
//! Every descriptor uses the same validity convention: an identifier (or
//! window handle, for pipelines) of `0` marks the record as invalid. Failed
//! operations at the boundary return these all-zero records instead of
//! raising an error.

mod buffer;
mod pipeline;
mod rect;
mod window;

pub use buffer::{BufferDescriptor, BufferKind, PoolKey, SHARED_MANAGER};
pub use pipeline::{CullMode, PipelineDescriptor};
pub use rect::Rect;
pub use window::{WindowDescriptor, WindowFlags};
