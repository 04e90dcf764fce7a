//! Opaque handles exchanged with the host.

/// Opaque resource handle.
///
/// `0` is reserved and never refers to a live object.
pub type Handle = u32;

/// The reserved "invalid / none" handle.
pub const INVALID_HANDLE: Handle = 0;

/// Largest value a registry hands out. `u32::MAX` is reserved for the shared
/// buffer manager (see [`crate::descriptor::SHARED_MANAGER`]).
const LAST_ALLOCATABLE: Handle = u32::MAX - 1;

/// Monotonic handle source.
///
/// Handles are never reused: once released, a handle stays stale for the
/// lifetime of the allocator.
#[derive(Debug, Default)]
pub struct HandleAllocator {
    last: Handle,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next handle, or `None` once the handle space is exhausted.
    pub fn next(&mut self) -> Option<Handle> {
        if self.last >= LAST_ALLOCATABLE {
            return None;
        }
        self.last += 1;
        Some(self.last)
    }
}
