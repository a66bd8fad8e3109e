//! Memory resource injected into an [`Instance`](crate::Instance).
//!
//! The engine never allocates frame or payload storage on its own: every TX
//! frame and every RX payload buffer is obtained from the [`Allocator`] and
//! returned to it when the engine is done with it. Buffers handed over to the
//! application (popped TX frames, reassembled transfers) should be returned
//! through `Instance::release` so that bounded allocators stay balanced.

use bytes::BytesMut;

/// Source of byte buffers.
pub trait Allocator {
    /// A zero-filled buffer of exactly `size` bytes, or None if exhausted.
    fn allocate(&mut self, size: usize) -> Option<BytesMut>;

    /// Take back a buffer previously produced by `allocate`.
    fn free(&mut self, buffer: BytesMut);
}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    fn allocate(&mut self, size: usize) -> Option<BytesMut> {
        (**self).allocate(size)
    }

    fn free(&mut self, buffer: BytesMut) {
        (**self).free(buffer)
    }
}

/// Unbounded allocator backed by the global heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn allocate(&mut self, size: usize) -> Option<BytesMut> {
        Some(BytesMut::zeroed(size))
    }

    fn free(&mut self, buffer: BytesMut) {
        drop(buffer);
    }
}

/// Heap allocator with a hard ceiling on outstanding bytes.
///
/// Keeps enough bookkeeping to verify that everything handed out was
/// returned, which makes it the allocator of choice for tests and for
/// deployments that need a fixed memory budget. Buffers are accounted by
/// capacity, so truncating a buffer before returning it is fine.
#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    ceiling: usize,
    allocated_bytes: usize,
    fragments: usize,
    peak_bytes: usize,
    rejected: usize,
}

impl BudgetAllocator {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            allocated_bytes: 0,
            fragments: 0,
            peak_bytes: 0,
            rejected: 0,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    pub fn set_ceiling(&mut self, ceiling: usize) {
        self.ceiling = ceiling;
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Bytes currently outstanding.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes
    }

    /// Non-empty buffers currently outstanding.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes
    }

    /// Requests refused because of the ceiling.
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

impl Default for BudgetAllocator {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl Allocator for BudgetAllocator {
    fn allocate(&mut self, size: usize) -> Option<BytesMut> {
        if size == 0 {
            return Some(BytesMut::new());
        }
        let within_budget = self
            .allocated_bytes
            .checked_add(size)
            .is_some_and(|total| total <= self.ceiling);
        if !within_budget {
            self.rejected += 1;
            tracing::trace!(
                size,
                allocated = self.allocated_bytes,
                ceiling = self.ceiling,
                "allocation refused"
            );
            return None;
        }
        let buffer = BytesMut::zeroed(size);
        self.allocated_bytes += buffer.capacity();
        self.fragments += 1;
        self.peak_bytes = self.peak_bytes.max(self.allocated_bytes);
        Some(buffer)
    }

    fn free(&mut self, buffer: BytesMut) {
        let size = buffer.capacity();
        if size == 0 {
            return;
        }
        debug_assert!(self.fragments > 0, "free without matching allocate");
        self.allocated_bytes = self.allocated_bytes.saturating_sub(size);
        self.fragments = self.fragments.saturating_sub(1);
    }
}
