//! Bump-allocating arena for hot-path temporaries.
//!
//! Allocates from cache-line-aligned chunks (64 KiB by default) by
//! bumping an offset; allocations larger than a chunk go to a side list
//! and are freed individually on [`Arena::reset`]. Not thread-safe;
//! intended to live one-per-thread.

use std::alloc::{Layout, alloc, dealloc};
use std::fmt;
use std::ptr::NonNull;

/// Cache line size assumed for alignment.
pub const CACHE_LINE_SIZE: usize = 64;

/// Default chunk size (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Arena failure: the underlying allocator refused the request.
#[derive(Debug, PartialEq, Eq)]
pub struct ArenaExhausted {
    /// Requested size in bytes.
    pub size: usize,
}

impl fmt::Display for ArenaExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arena allocation of {} bytes failed", self.size)
    }
}

impl std::error::Error for ArenaExhausted {}

/// Bump allocator with chunked backing storage.
///
/// Values constructed in the arena are **not** dropped on `reset` or on
/// the arena's own drop; only the backing memory is released. Restrict
/// `construct` to types without meaningful `Drop` impls, or drop them in
/// place manually before resetting.
pub struct Arena {
    chunk_size: usize,
    chunks: Vec<NonNull<u8>>,
    large_allocations: Vec<(NonNull<u8>, Layout)>,
    current_offset: usize,
    total_allocated: usize,
    allocation_count: usize,
}

impl Arena {
    /// Arena with the default 64 KiB chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    /// Arena with a custom chunk size (at least 1 KiB).
    ///
    /// # Panics
    /// Panics if `chunk_size < 1024` or the first chunk cannot be
    /// allocated.
    #[must_use]
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size >= 1024, "chunk size must be at least 1 KiB");
        let mut arena = Self {
            chunk_size,
            chunks: Vec::new(),
            large_allocations: Vec::new(),
            current_offset: 0,
            total_allocated: 0,
            allocation_count: 0,
        };
        arena
            .push_chunk()
            .expect("initial arena chunk allocation failed");
        arena
    }

    fn chunk_layout(&self) -> Layout {
        Layout::from_size_align(self.chunk_size, CACHE_LINE_SIZE).expect("valid chunk layout")
    }

    fn push_chunk(&mut self) -> Result<(), ArenaExhausted> {
        let layout = self.chunk_layout();
        // SAFETY: layout has non-zero size (>= 1024).
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or(ArenaExhausted {
            size: self.chunk_size,
        })?;
        self.chunks.push(ptr);
        self.current_offset = 0;
        Ok(())
    }

    fn allocate_large(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, ArenaExhausted> {
        let layout =
            Layout::from_size_align(size, align).map_err(|_| ArenaExhausted { size })?;
        // SAFETY: size is non-zero (checked by caller).
        let ptr = unsafe { alloc(layout) };
        let ptr = NonNull::new(ptr).ok_or(ArenaExhausted { size })?;
        self.large_allocations.push((ptr, layout));
        self.total_allocated += size;
        self.allocation_count += 1;
        Ok(ptr)
    }

    /// Allocates `size` bytes at `align`. Alignment is capped at the
    /// cache line; sizes above the chunk size take the large-allocation
    /// path.
    pub fn allocate(&mut self, size: usize, align: usize) -> Result<NonNull<u8>, ArenaExhausted> {
        if size == 0 {
            return Ok(NonNull::dangling());
        }
        let align = align.clamp(1, CACHE_LINE_SIZE).next_power_of_two();

        if size > self.chunk_size {
            return self.allocate_large(size, align);
        }

        let aligned_offset = (self.current_offset + align - 1) & !(align - 1);
        let end = aligned_offset + size;
        if end > self.chunk_size {
            self.push_chunk()?;
            return self.allocate(size, align);
        }

        let chunk = *self.chunks.last().expect("arena has a chunk");
        // SAFETY: aligned_offset + size <= chunk_size, inside the chunk
        // allocation.
        let ptr = unsafe { NonNull::new_unchecked(chunk.as_ptr().add(aligned_offset)) };
        self.current_offset = end;
        self.total_allocated += size;
        self.allocation_count += 1;
        Ok(ptr)
    }

    /// Moves `value` into arena storage and returns a pointer valid
    /// until the next [`Arena::reset`] (or the arena's drop).
    pub fn construct<T>(&mut self, value: T) -> Result<NonNull<T>, ArenaExhausted> {
        let ptr = self
            .allocate(std::mem::size_of::<T>(), std::mem::align_of::<T>())?
            .cast::<T>();
        // SAFETY: freshly allocated, properly aligned and sized for T.
        unsafe { ptr.as_ptr().write(value) };
        Ok(ptr)
    }

    /// Frees all but the first chunk and every large allocation, and
    /// rewinds the bump offset. Constructed values are not dropped.
    pub fn reset(&mut self) {
        let layout = self.chunk_layout();
        for chunk in self.chunks.drain(1..) {
            // SAFETY: allocated with this exact layout in push_chunk.
            unsafe { dealloc(chunk.as_ptr(), layout) };
        }
        for (ptr, layout) in self.large_allocations.drain(..) {
            // SAFETY: allocated with this exact layout in allocate_large.
            unsafe { dealloc(ptr.as_ptr(), layout) };
        }
        self.current_offset = 0;
        self.total_allocated = 0;
        self.allocation_count = 0;
    }

    /// Bytes handed out since the last reset.
    #[must_use]
    pub fn total_allocated(&self) -> usize {
        self.total_allocated
    }

    /// Allocations served since the last reset.
    #[must_use]
    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }

    /// Chunks currently held.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Backing memory held, in bytes.
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.chunks.len() * self.chunk_size
            + self
                .large_allocations
                .iter()
                .map(|(_, layout)| layout.size())
                .sum::<usize>()
    }

    /// Fraction of held chunk memory handed out, as a percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        let held = self.memory_usage();
        if held == 0 {
            return 0.0;
        }
        100.0 * self.total_allocated as f64 / held as f64
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        let layout = self.chunk_layout();
        for chunk in &self.chunks {
            // SAFETY: allocated with this exact layout in push_chunk.
            unsafe { dealloc(chunk.as_ptr(), layout) };
        }
        for (ptr, layout) in &self.large_allocations {
            // SAFETY: allocated with this exact layout in allocate_large.
            unsafe { dealloc(ptr.as_ptr(), *layout) };
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
