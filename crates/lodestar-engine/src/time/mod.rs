//! Frame timing.
//!
//! - [`FrameClock`]: clamped delta time between consecutive frames
//! - [`FixedTick`]: deadlines for a fixed-rate frame driver

mod fixed_tick;
mod frame_clock;

pub use fixed_tick::FixedTick;
pub use frame_clock::{FrameClock, FrameTime};
