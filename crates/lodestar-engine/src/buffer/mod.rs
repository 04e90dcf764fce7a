//! GPU buffer storage.
//!
//! Immutable buffers are uploaded once and kept in an append-only list.
//! Mutable buffers are rewritten every frame and come from fixed rings of
//! same-shape buffers; a gate per ring bounds how many are in flight so the
//! CPU never overwrites a buffer the GPU is still reading.

mod gate;
mod manager;
mod pool;

pub use gate::ResourceGate;
pub use manager::{BufferManager, PoolSettings, DEFAULT_POOL_SIZE};
pub use pool::BufferPool;
