use crate::descriptor::PoolKey;
use crate::handle::Handle;

use super::gate::ResourceGate;

/// Fixed ring of same-shape GPU buffers guarded by a [`ResourceGate`].
///
/// Slot identifiers exposed to callers are 1-based.
#[derive(Debug)]
pub struct BufferPool<Buf> {
    key: PoolKey,
    buffers: Vec<Buf>,
    gate: ResourceGate,
}

impl<Buf> BufferPool<Buf> {
    pub fn new(key: PoolKey, buffers: Vec<Buf>) -> Self {
        let gate = ResourceGate::new(buffers.len());
        Self { key, buffers, gate }
    }

    pub fn key(&self) -> PoolKey {
        self.key
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Buffer behind a 1-based slot identifier.
    pub fn buffer(&self, identifier: Handle) -> Option<&Buf> {
        let slot = (identifier as usize).checked_sub(1)?;
        self.buffers.get(slot)
    }

    pub fn gate(&self) -> &ResourceGate {
        &self.gate
    }

    /// Returns the slot behind `identifier` to the ring.
    pub fn release(&self, identifier: Handle) -> bool {
        match (identifier as usize).checked_sub(1) {
            Some(slot) => {
                let released = self.gate.release(slot);
                if released {
                    log::debug!("pool {:?}: slot {identifier} released", self.key);
                }
                released
            }
            None => false,
        }
    }

    /// Slots currently checked out.
    pub fn in_flight(&self) -> usize {
        self.gate.outstanding()
    }
}
