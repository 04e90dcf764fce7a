//! Window lifecycle.
//!
//! The registry owns every native window and its surface, keyed by a handle
//! that is never reused.

mod registry;

pub use registry::{WindowEntry, WindowRegistry};
