//! Fixed-rate frame driver on top of winit.
//!
//! Owns the event loop, builds the configured windows and pipelines once the
//! platform is ready, then calls the [`Host`] once per tick.

mod event_loop;
mod host;

pub use event_loop::Runtime;
pub use host::{Host, HostCtx};
