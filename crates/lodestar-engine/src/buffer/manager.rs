use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::backend::Backend;
use crate::descriptor::{BufferDescriptor, BufferKind, PoolKey};
use crate::error::{RenderError, Result};
use crate::handle::Handle;

use super::pool::BufferPool;

/// Buffers per mutable pool unless configured otherwise.
pub const DEFAULT_POOL_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Buffers allocated per shape; also the in-flight bound.
    pub pool_size: usize,
    /// Upper bound on a blocking assign. `None` waits forever.
    pub gate_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            gate_timeout: None,
        }
    }
}

/// Immutable buffer list plus mutable pools keyed by shape.
///
/// Shared between the driving thread and completion callbacks; every method
/// takes `&self`.
pub struct BufferManager<B: Backend> {
    gpu: Arc<B>,
    handle: Handle,
    settings: PoolSettings,
    immutables: RwLock<Vec<B::Buffer>>,
    pools: RwLock<HashMap<PoolKey, Arc<BufferPool<B::Buffer>>>>,
}

fn check_shape(desc: &BufferDescriptor) -> Result<()> {
    if desc.object_size == 0 || desc.object_count == 0 {
        return Err(RenderError::InvalidDescriptor("buffer shape has a zero dimension"));
    }
    Ok(())
}

fn check_mutable(desc: &BufferDescriptor) -> Result<()> {
    if desc.kind != BufferKind::Mutable {
        return Err(RenderError::InvalidDescriptor("pooled operation on a non-mutable buffer"));
    }
    Ok(())
}

impl<B: Backend> BufferManager<B> {
    pub fn new(gpu: Arc<B>, handle: Handle, settings: PoolSettings) -> Self {
        Self {
            gpu,
            handle,
            settings,
            immutables: RwLock::new(Vec::new()),
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Handle callers put in `BufferDescriptor::manager` to reach this manager.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    /// Dispatches on `desc.kind`: immutables upload `bytes`, mutables make
    /// sure their pool exists and ignore `bytes`.
    pub fn allocate(&self, desc: &BufferDescriptor, bytes: &[u8]) -> Result<BufferDescriptor> {
        match desc.kind {
            BufferKind::Immutable => self.allocate_immutable(bytes, desc),
            BufferKind::Mutable => self.allocate_mutable_pool(desc),
            BufferKind::Invalid => Err(RenderError::InvalidDescriptor("buffer kind is invalid")),
        }
    }

    /// Uploads `bytes` once; the returned identifier is the buffer's 1-based
    /// position in the list.
    pub fn allocate_immutable(&self, bytes: &[u8], desc: &BufferDescriptor) -> Result<BufferDescriptor> {
        check_shape(desc)?;
        if bytes.len() as u64 != desc.byte_len() {
            return Err(RenderError::InvalidDescriptor(
                "byte length does not match object_size * object_count",
            ));
        }

        let buffer = self.gpu.create_buffer_with_data("lodestar immutable buffer", bytes);
        let mut list = self.immutables.write().unwrap_or_else(PoisonError::into_inner);
        list.push(buffer);
        let identifier = list.len() as Handle;

        log::debug!("manager {}: immutable buffer {identifier} ({} bytes)", self.handle, bytes.len());
        Ok(BufferDescriptor {
            manager: self.handle,
            identifier,
            kind: BufferKind::Immutable,
            ..*desc
        })
    }

    /// Creates the pool for `desc`'s shape unless it exists already.
    pub fn allocate_mutable_pool(&self, desc: &BufferDescriptor) -> Result<BufferDescriptor> {
        check_shape(desc)?;
        if self.settings.pool_size == 0 {
            log::error!("manager {}: pool size is 0; no pool for {:?}", self.handle, desc.shape());
            return Err(RenderError::PoolUnresolved);
        }
        let key = desc.shape();

        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        if !pools.contains_key(&key) {
            let buffers = (0..self.settings.pool_size)
                .map(|_| self.gpu.create_buffer("lodestar pooled buffer", key.byte_len()))
                .collect();
            pools.insert(key, Arc::new(BufferPool::new(key, buffers)));
            log::debug!(
                "manager {}: pool {key:?} created with {} buffers",
                self.handle,
                self.settings.pool_size
            );
        }

        Ok(BufferDescriptor {
            manager: self.handle,
            kind: BufferKind::Mutable,
            ..*desc
        })
    }

    pub fn pool(&self, key: PoolKey) -> Option<Arc<BufferPool<B::Buffer>>> {
        self.pools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn writable_pool(&self, desc: &BufferDescriptor, bytes: &[u8]) -> Result<Arc<BufferPool<B::Buffer>>> {
        check_mutable(desc)?;
        let pool = self.pool(desc.shape()).ok_or(RenderError::PoolUnresolved)?;
        if bytes.len() as u64 > desc.byte_len() {
            return Err(RenderError::InvalidDescriptor("write is larger than the pooled buffer"));
        }
        Ok(pool)
    }

    fn write_slot(&self, pool: &BufferPool<B::Buffer>, slot: usize, bytes: &[u8]) -> Result<Handle> {
        let identifier = slot as Handle + 1;
        let Some(buffer) = pool.buffer(identifier) else {
            pool.release(identifier);
            return Err(RenderError::PoolUnresolved);
        };
        self.gpu.write_buffer(buffer, bytes);
        log::debug!("manager {}: pool {:?} slot {identifier} assigned", self.handle, pool.key());
        Ok(identifier)
    }

    /// Writes `bytes` into the next slot of the pool for `desc`'s shape and
    /// returns its 1-based identifier.
    ///
    /// Blocks while that slot is still in flight. Fails with `GateTimeout`
    /// if a gate timeout is configured and expires first.
    pub fn assign_mutable(&self, desc: &BufferDescriptor, bytes: &[u8]) -> Result<Handle> {
        let pool = self.writable_pool(desc, bytes)?;
        let slot = pool
            .gate()
            .acquire(self.settings.gate_timeout, || self.gpu.maintain())
            .ok_or(RenderError::GateTimeout)?;
        self.write_slot(&pool, slot, bytes)
    }

    /// Like [`assign_mutable`](Self::assign_mutable) but returns `None`
    /// instead of waiting.
    pub fn try_assign_mutable(&self, desc: &BufferDescriptor, bytes: &[u8]) -> Result<Option<Handle>> {
        let pool = self.writable_pool(desc, bytes)?;
        pool.gate()
            .try_acquire()
            .map(|slot| self.write_slot(&pool, slot, bytes))
            .transpose()
    }

    pub fn immutable(&self, desc: &BufferDescriptor) -> Result<B::Buffer> {
        let list = self.immutables.read().unwrap_or_else(PoisonError::into_inner);
        (desc.identifier as usize)
            .checked_sub(1)
            .and_then(|i| list.get(i))
            .cloned()
            .ok_or(RenderError::NotFound)
    }

    pub fn mutable(&self, desc: &BufferDescriptor) -> Result<B::Buffer> {
        let pool = self.pool(desc.shape()).ok_or(RenderError::PoolUnresolved)?;
        pool.buffer(desc.identifier).cloned().ok_or(RenderError::NotFound)
    }

    /// Returns the slot named by `desc` to its pool.
    ///
    /// Only call once the GPU is done reading the slot.
    pub fn free(&self, desc: &BufferDescriptor) -> Result<()> {
        check_mutable(desc)?;
        let pool = self.pool(desc.shape()).ok_or(RenderError::PoolUnresolved)?;
        pool.release(desc.identifier);
        Ok(())
    }

    pub fn pool_count(&self) -> usize {
        self.pools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn immutable_count(&self) -> usize {
        self.immutables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Slots of `key`'s pool currently checked out (0 if no such pool).
    pub fn in_flight(&self, key: PoolKey) -> usize {
        self.pool(key).map_or(0, |p| p.in_flight())
    }
}
