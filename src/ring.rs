//! Lock-free single-producer/single-consumer ring buffer.
//!
//! Power-of-two capacity, one atomic cursor per side: the producer owns
//! `head` (release on publish), the consumer owns `tail` (release on
//! consume); each side reads the other cursor with an acquire load. No
//! locks, no CAS. Batched push/pop copy into the free region with at
//! most one wrap.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

pub struct SpscRing<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T: Copy> SpscRing<T> {
    /// Create a ring holding up to `capacity` items.
    ///
    /// # Panics
    /// Panics unless `capacity` is a power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity >= 2,
            "ring capacity must be a power of two"
        );
        let mut buf = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            buf.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Self {
            buf: buf.into_boxed_slice(),
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline]
    fn slot(&self, pos: usize) -> *mut T {
        self.buf[pos & self.mask].get().cast::<T>()
    }

    /// Producer side. Returns the item back when the ring is full.
    #[inline]
    pub fn push(&self, value: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) > self.mask {
            return Err(value);
        }
        unsafe { self.slot(head).write(value) };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Producer side. Writes as much of `items` as fits, in order, and
    /// returns the count accepted; the remainder is the caller's to
    /// account for. At most one wrap, so at most two copies.
    pub fn push_batch(&self, items: &[T]) -> usize {
        if items.is_empty() {
            return 0;
        }
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        let used = head.wrapping_sub(tail);
        let available = self.capacity() - used;
        let to_write = items.len().min(available);
        if to_write == 0 {
            return 0;
        }

        let write_idx = head & self.mask;
        let first_chunk = (self.capacity() - write_idx).min(to_write);
        unsafe {
            ptr::copy_nonoverlapping(items.as_ptr(), self.slot(write_idx), first_chunk);
            if to_write > first_chunk {
                ptr::copy_nonoverlapping(
                    items.as_ptr().add(first_chunk),
                    self.slot(0),
                    to_write - first_chunk,
                );
            }
        }

        self.head.store(head.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Consumer side.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let value = unsafe { self.slot(tail).read() };
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Consumer side. Drains up to `out.len()` items, returning the
    /// count read.
    pub fn pop_batch(&self, out: &mut [T]) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);

        let available = head.wrapping_sub(tail);
        let to_read = out.len().min(available);
        if to_read == 0 {
            return 0;
        }

        let read_idx = tail & self.mask;
        let first_chunk = (self.capacity() - read_idx).min(to_read);
        unsafe {
            ptr::copy_nonoverlapping(self.slot(read_idx), out.as_mut_ptr(), first_chunk);
            if to_read > first_chunk {
                ptr::copy_nonoverlapping(
                    self.slot(0),
                    out.as_mut_ptr().add(first_chunk),
                    to_read - first_chunk,
                );
            }
        }

        self.tail.store(tail.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Approximate occupancy; exact only on the calling side's thread.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
