//! Single-producer multiple-consumer lock-free ring.
//!
//! The producer side is identical to the SPSC ring. Consumers compete
//! for `tail` with a `compare_exchange_weak` loop (release on success,
//! relaxed on failure): exactly one consumer wins each slot and reads
//! it after the claim. The producer is wait-free; consumers are
//! lock-free.

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded SPMC ring buffer.
///
/// One thread calls `push`; any number of threads may call `pop`.
pub struct SpmcQueue<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Producer cursor: producer stores (release), consumers load
    /// (acquire).
    head: CachePadded<AtomicUsize>,
    /// Consumer cursor: consumers CAS (release on success), producer
    /// loads (acquire).
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: each slot is written by the single producer before the
// release store of head, and claimed by exactly one consumer through
// the CAS on tail.
unsafe impl<T: Send> Send for SpmcQueue<T> {}
unsafe impl<T: Send> Sync for SpmcQueue<T> {}

impl<T> SpmcQueue<T> {
    /// Ring with at least `capacity` slots, rounded up to a power of
    /// two.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            buffer,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Producer side: enqueues `item`, or returns it back when the
    /// queue is full. Identical to the SPSC producer.
    pub fn push(&self, item: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let next_head = (head + 1) & self.mask;

        if next_head == self.tail.load(Ordering::Acquire) {
            return Err(item);
        }

        // SAFETY: the slot at `head` is unpublished; no consumer can
        // claim it before the release store below.
        unsafe { (*self.buffer[head].get()).write(item) };
        self.head.store(next_head, Ordering::Release);
        Ok(())
    }

    /// Consumer side: competes for the oldest item. `None` when empty.
    pub fn pop(&self) -> Option<T> {
        let mut tail = self.tail.load(Ordering::Relaxed);
        loop {
            // Acquire pairs with the producer's release of head and
            // makes the claimed slot's payload visible.
            let head = self.head.load(Ordering::Acquire);
            if tail == head {
                return None;
            }
            let next_tail = (tail + 1) & self.mask;

            // Claim the slot: exactly one consumer succeeds per item.
            // compare_exchange_weak updates `tail` on failure, so the
            // loop restarts with the freshest value.
            match self.tail.compare_exchange_weak(
                tail,
                next_tail,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    // SAFETY: we won the CAS for this slot; the payload
                    // was published before head covered it.
                    return Some(unsafe { (*self.buffer[tail].get()).assume_init_read() });
                }
                Err(observed) => tail = observed,
            }
        }
    }

    /// Snapshot emptiness check; may be stale immediately.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Acquire) == self.head.load(Ordering::Acquire)
    }

    /// Approximate occupancy; may be stale immediately.
    #[must_use]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail) & self.mask
    }

    /// Slot count (power of two); usable occupancy is one less.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl<T> Drop for SpmcQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}
