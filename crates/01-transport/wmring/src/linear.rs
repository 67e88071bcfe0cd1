//! Byte ring whose storage is mapped twice, back to back.
//!
//! Offsets `i` and `i + capacity` name the same physical byte, so the
//! readable and writable regions are always single contiguous slices, even
//! when they run over the end of the buffer. Single-threaded, like
//! [`IoBuffer`](crate::IoBuffer), but without ever compacting.
//!
//! ```
//! use wmring::LinearRing;
//!
//! let mut ring = LinearRing::new(4096).unwrap();
//! let n = ring.capacity();
//! ring.commit(n - 2);
//! ring.consume(n - 2);
//!
//! // Starts two bytes before the end and continues at the front.
//! ring.write_head()[..5].copy_from_slice(b"edges");
//! ring.commit(5);
//! assert_eq!(ring.read_head(), b"edges");
//! ```

use crate::config::MAX_CAPACITY;
use crate::{RingError, RingResult};
use log::debug;
use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd};
use std::ptr::NonNull;

const MEMFD_NAME: &[u8] = b"wmring-linear\0";

/// Fixed-capacity byte ring backed by a doubly mapped memfd.
#[derive(Debug)]
pub struct LinearRing {
    base: NonNull<u8>,
    capacity: usize,
    head: usize,
    size: usize,
    // Owns the `2 * capacity` reservation; both file mappings live inside it.
    _map: MmapMut,
}

// SAFETY: the ring owns its mappings outright and all access goes through
// `&self`/`&mut self`.
unsafe impl Send for LinearRing {}

impl LinearRing {
    /// Creates a ring of at least `min_capacity` bytes, rounded up to whole pages.
    pub fn new(min_capacity: usize) -> RingResult<Self> {
        if min_capacity == 0 || min_capacity > MAX_CAPACITY {
            return Err(RingError::InvalidCapacity {
                requested: min_capacity,
                maximum: MAX_CAPACITY,
            });
        }
        let capacity = min_capacity.next_multiple_of(page_size());

        let fd = unsafe { libc::memfd_create(MEMFD_NAME.as_ptr().cast(), libc::MFD_CLOEXEC) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            return Err(mirror_error(capacity, "memfd_create", &err));
        }
        // SAFETY: `fd` was just returned by memfd_create and nothing else owns it.
        let file = unsafe { File::from_raw_fd(fd) };
        file.set_len(capacity as u64)
            .map_err(|err| mirror_error(capacity, "ftruncate", &err))?;

        let mut map = MmapOptions::new()
            .len(capacity * 2)
            .map_anon()
            .map_err(|err| mirror_error(capacity, "mmap reserve", &err))?;
        let base = map.as_mut_ptr();

        for half in 0..2 {
            let mapped = unsafe {
                // SAFETY: both halves lie inside the reservation owned by `map`,
                // which unmaps the whole range on drop.
                libc::mmap(
                    base.add(half * capacity).cast(),
                    capacity,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_SHARED | libc::MAP_FIXED,
                    file.as_raw_fd(),
                    0,
                )
            };
            if mapped == libc::MAP_FAILED {
                let err = io::Error::last_os_error();
                return Err(mirror_error(capacity, "mmap fixed", &err));
            }
        }

        let base = NonNull::new(base).ok_or(RingError::AllocationFailed {
            size: capacity * 2,
            alignment: page_size(),
        })?;
        debug!("linear ring created: capacity={capacity} base={base:p}");

        Ok(Self {
            base,
            capacity,
            head: 0,
            size: 0,
            _map: map,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Committed, unconsumed bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn free_size(&self) -> usize {
        self.capacity - self.size
    }

    /// Committed bytes, oldest first, as one slice.
    pub fn read_head(&self) -> &[u8] {
        // SAFETY: `head < capacity` and `size <= capacity`, so the range stays
        // inside the doubled mapping.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(self.head), self.size) }
    }

    /// Free space behind the committed bytes, as one slice.
    pub fn write_head(&mut self) -> &mut [u8] {
        let tail = (self.head + self.size) % self.capacity;
        // SAFETY: `tail < capacity` and the free run is disjoint from the
        // committed run modulo `capacity`.
        unsafe {
            std::slice::from_raw_parts_mut(self.base.as_ptr().add(tail), self.free_size())
        }
    }

    /// Marks `n` bytes at the write head as committed.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`LinearRing::free_size`].
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.free_size(),
            "commit of {n} bytes exceeds free space {}",
            self.free_size()
        );
        self.size += n;
    }

    /// Retires `n` bytes from the read head.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [`LinearRing::size`].
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.size,
            "consume of {n} bytes exceeds buffered {}",
            self.size
        );
        self.head = (self.head + n) % self.capacity;
        self.size -= n;
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.size = 0;
    }
}

fn page_size() -> usize {
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page > 0 {
        page as usize
    } else {
        4096
    }
}

fn mirror_error(size: usize, op: &'static str, err: &io::Error) -> RingError {
    debug!("linear ring {op} failed: {err}");
    RingError::MirrorFailed {
        size,
        op,
        errno: err.raw_os_error().unwrap_or(0),
    }
}
