//! Single-producer single-consumer lock-free ring.
//!
//! Bounded ring with capacity rounded up to a power of two; one slot is
//! sacrificed to distinguish empty from full, so `len <= capacity - 1`.
//! The producer owns `head`, the consumer owns `tail`, each on its own
//! cache line. Publication is an acquire/release pair on the index: the
//! producer's release store of `head` makes the slot write visible to
//! the consumer's acquire load. Wait-free on both sides.

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded SPSC ring buffer.
///
/// The type is `Sync` so one producer thread and one consumer thread
/// can share it behind an `Arc`; the single-producer/single-consumer
/// contract is the caller's to uphold (exactly one thread calls `push`,
/// exactly one calls `pop`).
pub struct SpscQueue<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Producer cursor: producer stores (release), consumer loads
    /// (acquire).
    head: CachePadded<AtomicUsize>,
    /// Consumer cursor: consumer stores (release), producer loads
    /// (acquire).
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: slots are transferred between exactly one producer and one
// consumer through the acquire/release index handshake.
unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T> SpscQueue<T> {
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
    /// queue is full.
    pub fn push(&self, item: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let next_head = (head + 1) & self.mask;

        // Full when head would catch the consumer. Acquire pairs with
        // the consumer's release store of tail.
        if next_head == self.tail.load(Ordering::Acquire) {
            return Err(item);
        }

        // SAFETY: the slot at `head` is outside the consumer's visible
        // range until the release store below publishes it.
        unsafe { (*self.buffer[head].get()).write(item) };
        self.head.store(next_head, Ordering::Release);
        Ok(())
    }

    /// Consumer side: dequeues the oldest item, or `None` when empty.
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);

        // Empty when the consumer has caught the producer. Acquire
        // pairs with the producer's release store of head and makes the
        // slot write visible.
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: head != tail, so the slot at `tail` was published by
        // the producer and is not yet released back.
        let item = unsafe { (*self.buffer[tail].get()).assume_init_read() };
        self.tail.store((tail + 1) & self.mask, Ordering::Release);
        Some(item)
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

impl<T> Drop for SpscQueue<T> {
    fn drop(&mut self) {
        // Drain undelivered items so their destructors run.
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn capacity_rounds_to_power_of_two() {
        assert_eq!(SpscQueue::<u32>::new(5).capacity(), 8);
        assert_eq!(SpscQueue::<u32>::new(8).capacity(), 8);
        assert_eq!(SpscQueue::<u32>::new(0).capacity(), 2);
    }

    #[test]
    fn fifo_order() {
        let queue = SpscQueue::new(8);
        for i in 0..5 {
            queue.push(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn full_queue_rejects_and_returns_item() {
        let queue = SpscQueue::new(4); // 3 usable slots
        assert!(queue.push(1).is_ok());
        assert!(queue.push(2).is_ok());
        assert!(queue.push(3).is_ok());
        assert_eq!(queue.push(4), Err(4));
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.pop(), Some(1));
        assert!(queue.push(4).is_ok());
    }

    #[test]
    fn wraps_around() {
        let queue = SpscQueue::new(4);
        for round in 0..10 {
            queue.push(round * 2).unwrap();
            queue.push(round * 2 + 1).unwrap();
            assert_eq!(queue.pop(), Some(round * 2));
            assert_eq!(queue.pop(), Some(round * 2 + 1));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn drop_releases_queued_items() {
        use std::rc::Rc;
        let counter = Rc::new(());
        {
            let queue = SpscQueue::new(8);
            queue.push(Rc::clone(&counter)).unwrap();
            queue.push(Rc::clone(&counter)).unwrap();
            assert_eq!(Rc::strong_count(&counter), 3);
        }
        assert_eq!(Rc::strong_count(&counter), 1);
    }

    #[test]
    fn cross_thread_handoff_preserves_everything() {
        let queue = Arc::new(SpscQueue::<u64>::new(1024));
        const COUNT: u64 = 100_000;

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut next = 0u64;
                while next < COUNT {
                    if queue.push(next).is_ok() {
                        next += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut expected = 0u64;
                let mut sum = 0u64;
                while expected < COUNT {
                    match queue.pop() {
                        Some(value) => {
                            // SPSC preserves order exactly.
                            assert_eq!(value, expected);
                            sum += value;
                            expected += 1;
                        }
                        None => std::hint::spin_loop(),
                    }
                }
                sum
            })
        };

        producer.join().unwrap();
        let sum = consumer.join().unwrap();
        assert_eq!(sum, COUNT * (COUNT - 1) / 2);
        assert!(queue.is_empty());
    }
}
