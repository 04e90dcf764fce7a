use crate::handle::{Handle, INVALID_HANDLE};

/// Manager handle selecting the process-wide shared buffer manager.
pub const SHARED_MANAGER: Handle = u32::MAX;

/// Storage discipline of a buffer.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BufferKind {
    #[default]
    Invalid = 0,
    /// Uploaded once; identifier indexes the manager's append-only list.
    Immutable = 1,
    /// Rewritten per frame; identifier is a slot inside its shape's pool.
    Mutable = 2,
}

/// Shape of a pooled buffer.
///
/// Descriptors with the same `(object_size, object_count)` share one pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub object_size: u32,
    pub object_count: u32,
}

impl PoolKey {
    #[inline]
    pub const fn new(object_size: u32, object_count: u32) -> Self {
        Self { object_size, object_count }
    }

    /// Size in bytes of one buffer of this shape.
    #[inline]
    pub fn byte_len(self) -> u64 {
        u64::from(self.object_size) * u64::from(self.object_count)
    }
}

/// Buffer record.
///
/// For immutable buffers `identifier` is the 1-based position in the
/// manager's list; for mutable buffers it is the 1-based slot inside the pool
/// selected by `(object_size, object_count)`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BufferDescriptor {
    pub manager: Handle,
    pub identifier: Handle,
    pub object_count: u32,
    pub object_size: u32,
    pub kind: BufferKind,
}

impl BufferDescriptor {
    pub fn immutable(manager: Handle, object_size: u32, object_count: u32) -> Self {
        Self {
            manager,
            identifier: INVALID_HANDLE,
            object_count,
            object_size,
            kind: BufferKind::Immutable,
        }
    }

    pub fn mutable(manager: Handle, object_size: u32, object_count: u32) -> Self {
        Self {
            kind: BufferKind::Mutable,
            ..Self::immutable(manager, object_size, object_count)
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }

    #[inline]
    pub fn shape(&self) -> PoolKey {
        PoolKey::new(self.object_size, self.object_count)
    }

    #[inline]
    pub fn byte_len(&self) -> u64 {
        self.shape().byte_len()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.identifier != INVALID_HANDLE && self.kind != BufferKind::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_with_equal_product_are_distinct() {
        assert_ne!(PoolKey::new(64, 100), PoolKey::new(100, 64));
        assert_eq!(PoolKey::new(64, 100).byte_len(), PoolKey::new(100, 64).byte_len());
    }

    #[test]
    fn byte_len_does_not_overflow() {
        assert_eq!(PoolKey::new(u32::MAX, 2).byte_len(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn fresh_descriptor_is_not_valid_until_assigned() {
        let mut d = BufferDescriptor::mutable(1, 16, 4);
        assert!(!d.is_valid());
        d.identifier = 3;
        assert!(d.is_valid());
        assert!(!BufferDescriptor::invalid().is_valid());
    }
}
