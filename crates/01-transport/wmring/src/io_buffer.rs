//! Flat staging buffer for byte streams moving from a source to a sink.
//!
//! Unlike the ring, an [`IoBuffer`] is single-threaded and keeps its live
//! bytes contiguous: when a `prepare` does not fit behind the live data, the
//! live data is moved back to the front first.
//!
//! ```
//! use wmring::IoBuffer;
//!
//! let mut buf = IoBuffer::new(64).unwrap();
//! let slab = buf.prepare(5);
//! slab.copy_from_slice(b"bytes");
//! buf.commit(5);
//! assert_eq!(buf.data(), b"bytes");
//! buf.consume(5);
//! assert!(buf.is_empty());
//! ```

use crate::config::MAX_CAPACITY;
use crate::region::{RegionInit, SharedRegion};
use crate::{RingError, RingResult};

/// Owned linear buffer with `prepare`/`commit`/`consume` semantics.
#[derive(Debug)]
pub struct IoBuffer {
    region: SharedRegion,
    head: usize,
    tail: usize,
}

impl IoBuffer {
    pub fn new(capacity: usize) -> RingResult<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(RingError::InvalidCapacity {
                requested: capacity,
                maximum: MAX_CAPACITY,
            });
        }
        let region = SharedRegion::new_aligned(capacity, 64, RegionInit::Zeroed)?;
        Ok(Self {
            region,
            head: 0,
            tail: 0,
        })
    }

    /// Returns a writable slab of up to `n` bytes directly behind the live data.
    ///
    /// Compacts the buffer when `n` exceeds [`IoBuffer::free_size`]. The slab
    /// is shorter than `n` when even a compacted buffer cannot hold it.
    pub fn prepare(&mut self, n: usize) -> &mut [u8] {
        if n > self.free_size() {
            let len = self.len();
            self.region.as_mut_slice().copy_within(self.head..self.tail, 0);
            self.head = 0;
            self.tail = len;
        }
        let n = n.min(self.available());
        let tail = self.tail;
        &mut self.region.as_mut_slice()[tail..tail + n]
    }

    /// Marks `n` bytes of the last prepared slab as written.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the space behind the live data.
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.free_size(),
            "commit of {n} bytes exceeds free space {}",
            self.free_size()
        );
        self.tail += n;
    }

    /// Retires `n` bytes from the front. Consuming everything resets the buffer.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`IoBuffer::len`].
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.len(),
            "consume of {n} bytes exceeds buffered {}",
            self.len()
        );
        self.head += n;
        if self.head >= self.tail {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Live bytes, oldest first.
    pub fn data(&self) -> &[u8] {
        &self.region.as_slice()[self.head..self.tail]
    }

    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Bytes that can be committed without compaction.
    pub fn free_size(&self) -> usize {
        self.region.len() - self.tail
    }

    /// Bytes that can be prepared, compacting if needed.
    pub fn available(&self) -> usize {
        self.region.len() - self.len()
    }

    pub fn capacity(&self) -> usize {
        self.region.len()
    }
}
