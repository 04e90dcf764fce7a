use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How long a blocked acquire sleeps before running its idle hook again.
const IDLE_SLICE: Duration = Duration::from_millis(2);

#[derive(Debug)]
struct SlotRing {
    /// Slot handed out by the next acquire.
    next: usize,
    checked_out: Vec<bool>,
    outstanding: usize,
}

impl SlotRing {
    fn take(&mut self) -> Option<usize> {
        if self.checked_out[self.next] {
            return None;
        }
        let slot = self.next;
        self.checked_out[slot] = true;
        self.outstanding += 1;
        self.next = (slot + 1) % self.checked_out.len();
        Some(slot)
    }
}

/// Counting gate over a fixed ring of slots.
///
/// Slots are handed out in strict circular order. At most `capacity` slots
/// are checked out at once; when the next slot in order is still checked
/// out, acquire waits for that slot in particular, so it never skips ahead
/// past a slot the GPU has not finished with.
#[derive(Debug)]
pub struct ResourceGate {
    ring: Mutex<SlotRing>,
    freed: Condvar,
}

impl ResourceGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(SlotRing {
                next: 0,
                checked_out: vec![false; capacity.max(1)],
                outstanding: 0,
            }),
            freed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotRing> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.lock().checked_out.len()
    }

    /// Slots currently checked out.
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Takes the next slot if it is free, without waiting.
    pub fn try_acquire(&self) -> Option<usize> {
        self.lock().take()
    }

    /// Takes the next slot, waiting for it to be released if necessary.
    ///
    /// `idle` runs without the gate lock held each time the wait wakes up
    /// empty-handed; it lets the caller pump whatever delivers releases.
    /// Returns `None` once `timeout` (if any) expires.
    pub fn acquire(&self, timeout: Option<Duration>, mut idle: impl FnMut()) -> Option<usize> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let ring = self.lock();
            let slice = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        let mut ring = ring;
                        return ring.take();
                    }
                    (d - now).min(IDLE_SLICE)
                }
                None => IDLE_SLICE,
            };

            let (mut ring, _) = self
                .freed
                .wait_timeout_while(ring, slice, |r| r.checked_out[r.next])
                .unwrap_or_else(PoisonError::into_inner);

            if let Some(slot) = ring.take() {
                return Some(slot);
            }
            drop(ring);
            idle();
        }
    }

    /// Returns `slot` to the ring.
    ///
    /// Releasing a slot that is not checked out is ignored, so a stray
    /// duplicate release can never inflate the gate past its capacity.
    pub fn release(&self, slot: usize) -> bool {
        let mut ring = self.lock();
        match ring.checked_out.get_mut(slot) {
            Some(taken) if *taken => {
                *taken = false;
                ring.outstanding -= 1;
                drop(ring);
                self.freed.notify_all();
                true
            }
            _ => {
                log::warn!("ignoring release of slot {slot}: not checked out");
                false
            }
        }
    }
}
