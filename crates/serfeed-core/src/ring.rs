//! Fixed-capacity single-producer/single-consumer byte ring.
//!
//! The receive context owns a [`Producer`], the drain task owns a [`Consumer`].
//! Both are obtained once from [`RingBuffer::split`], which borrows the ring
//! mutably, so a second writer or reader cannot exist while they are alive.
//!
//! Positions run over `0..2N` instead of `0..N`. That keeps "full" and
//! "empty" distinguishable without a shared counter, and works for any
//! capacity, not only powers of two.
//!
//! The write position is stored only by the producer and the read position
//! only by the consumer. Each side publishes with `Release` and observes the
//! other side with `Acquire`, so slot contents are visible before the
//! position that covers them.

use core::cell::UnsafeCell;
use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::BufferFull;

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    /// The ring held no bytes before this push.
    WasEmpty,
    /// The ring already held unread bytes.
    Appended,
}

pub struct RingBuffer<const N: usize> {
    slots: UnsafeCell<[u8; N]>,
    /// Next write position. Stored only by the producer.
    head: AtomicUsize,
    /// Next read position. Stored only by the consumer.
    tail: AtomicUsize,
}

// SAFETY: slot writes happen only through the single `Producer`, slot reads
// only through the single `Consumer`, and a slot is never read and written at
// the same time because the positions hand it over with Release/Acquire.
// Shared `&RingBuffer` access only loads the positions.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    const CAPACITY_OK: () = assert!(N > 0 && N <= usize::MAX / 2, "ring capacity must be non-zero");

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        Self {
            slots: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Split into the write and read handles.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let ring: &RingBuffer<N> = self;
        (Producer { ring }, Consumer { ring })
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn len(&self) -> usize {
        distance::<N>(
            self.head.load(Ordering::Acquire),
            self.tail.load(Ordering::Acquire),
        )
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    /// Push from a context that owns the whole ring.
    pub fn push(&mut self, byte: u8) -> Result<Pushed, BufferFull> {
        self.split().0.push(byte)
    }

    /// Pop from a context that owns the whole ring.
    pub fn pop(&mut self) -> Option<u8> {
        self.split().1.pop()
    }

    pub fn pop_batch(&mut self, out: &mut [u8]) -> usize {
        self.split().1.pop_batch(out)
    }

    #[inline]
    fn slot_ptr(&self, pos: usize) -> *mut u8 {
        // SAFETY: `index::<N>` is always below N.
        unsafe { self.slots.get().cast::<u8>().add(index::<N>(pos)) }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for RingBuffer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("len", &self.len())
            .field("capacity", &N)
            .finish()
    }
}

/// Write half of a [`RingBuffer`].
pub struct Producer<'a, const N: usize> {
    ring: &'a RingBuffer<N>,
}

impl<'a, const N: usize> Producer<'a, N> {
    /// Store one byte in the oldest free slot.
    ///
    /// A full ring rejects the byte and is left untouched; the caller decides
    /// what an overrun means.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<Pushed, BufferFull> {
        let head = self.ring.head.load(Ordering::Relaxed);
        let tail = self.ring.tail.load(Ordering::Acquire);
        let len = distance::<N>(head, tail);
        if len >= N {
            return Err(BufferFull(byte));
        }

        // SAFETY: the slot at `head` is outside the readable window
        // `tail..head`, and only this handle writes slots.
        unsafe { ptr::write(self.ring.slot_ptr(head), byte) };
        self.ring.head.store(advance::<N>(head, 1), Ordering::Release);

        Ok(if len == 0 {
            Pushed::WasEmpty
        } else {
            Pushed::Appended
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

/// Read half of a [`RingBuffer`].
pub struct Consumer<'a, const N: usize> {
    ring: &'a RingBuffer<N>,
}

impl<'a, const N: usize> Consumer<'a, N> {
    /// Remove the oldest unread byte.
    #[inline]
    pub fn pop(&mut self) -> Option<u8> {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: `tail` is inside the published window and only this handle
        // reads slots or moves `tail`.
        let byte = unsafe { ptr::read(self.ring.slot_ptr(tail)) };
        self.ring.tail.store(advance::<N>(tail, 1), Ordering::Release);
        Some(byte)
    }

    /// Remove up to `out.len()` bytes in FIFO order and return how many were taken.
    pub fn pop_batch(&mut self, out: &mut [u8]) -> usize {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        let count = distance::<N>(head, tail).min(out.len()).min(N);
        if count == 0 {
            return 0;
        }

        let start = index::<N>(tail);
        let first = count.min(N - start);
        // SAFETY: both runs lie inside the published window `tail..head`,
        // which the producer does not touch until `tail` moves past it.
        unsafe {
            let base = self.ring.slots.get().cast::<u8>();
            ptr::copy_nonoverlapping(base.add(start), out.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(base, out.as_mut_ptr().add(first), count - first);
        }
        self.ring.tail.store(advance::<N>(tail, count), Ordering::Release);
        count
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

#[inline]
const fn index<const N: usize>(pos: usize) -> usize {
    if pos >= N {
        pos - N
    } else {
        pos
    }
}

#[inline]
const fn advance<const N: usize>(pos: usize, by: usize) -> usize {
    let next = pos + by;
    if next >= 2 * N {
        next - 2 * N
    } else {
        next
    }
}

#[inline]
const fn distance<const N: usize>(head: usize, tail: usize) -> usize {
    if head >= tail {
        head - tail
    } else {
        head + 2 * N - tail
    }
}
