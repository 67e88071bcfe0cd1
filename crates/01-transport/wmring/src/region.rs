//! Backing memory for the ring and the staging buffer.
//!
//! A [`SharedRegion`] is a fixed-size, contiguous, byte-addressable allocation
//! that never moves or grows. Native targets can satisfy it with an anonymous
//! `mmap`; every target can fall back to an aligned heap allocation. The base
//! address is captured once at construction so that both halves of a ring can
//! derive disjoint slices from a shared reference.

use crate::{RingError, RingResult};
use serde::{Deserialize, Serialize};
use std::alloc::{alloc, alloc_zeroed, dealloc, Layout};
use std::ptr::{self, NonNull};

/// Specifies how memory in a [`SharedRegion`] should be initialised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionInit {
    /// Zero the entire region after allocation.
    #[default]
    Zeroed,
    /// Leave the region uninitialised.
    Uninitialized,
}

/// Allocation strategy for a region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backing {
    /// Prefer an anonymous mapping, fall back to the heap when unavailable
    /// or misaligned.
    #[default]
    Auto,
    /// Always use the global allocator.
    Heap,
    /// Require an anonymous mapping; fail instead of falling back.
    Mmap,
}

#[cfg(not(target_arch = "wasm32"))]
type NativeMap = memmap2::MmapMut;

#[derive(Debug)]
enum Storage {
    #[cfg(not(target_arch = "wasm32"))]
    Native(#[allow(dead_code)] NativeMap),
    Owned { layout: Layout },
}

/// Owned, fixed-length, aligned byte allocation.
#[derive(Debug)]
pub struct SharedRegion {
    base: NonNull<u8>,
    len: usize,
    alignment: usize,
    storage: Storage,
}

// SAFETY: the region owns its allocation outright; concurrent access to the
// bytes is coordinated by the structures built on top of it.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Allocates a new region of `len` bytes aligned to `alignment` using the
    /// [`Backing::Auto`] strategy.
    pub fn new_aligned(len: usize, alignment: usize, init: RegionInit) -> RingResult<Self> {
        Self::with_backing(len, alignment, init, Backing::Auto)
    }

    /// Allocates a new region using an explicit strategy.
    ///
    /// `Auto` first tries an anonymous mapping (page aligned). If the mapping
    /// fails or the returned pointer is not suitably aligned, it transparently
    /// falls back to the heap.
    pub fn with_backing(
        len: usize,
        alignment: usize,
        init: RegionInit,
        backing: Backing,
    ) -> RingResult<Self> {
        let failed = RingError::AllocationFailed {
            size: len,
            alignment,
        };
        if len == 0 || alignment == 0 || !alignment.is_power_of_two() {
            return Err(failed);
        }

        match backing {
            Backing::Heap => Self::heap_backed(len, alignment, init),
            #[cfg(not(target_arch = "wasm32"))]
            Backing::Mmap => Self::mmap_backed(len, alignment, init)?.ok_or(failed),
            #[cfg(target_arch = "wasm32")]
            Backing::Mmap => Err(failed),
            Backing::Auto => {
                #[cfg(not(target_arch = "wasm32"))]
                {
                    if let Ok(Some(region)) = Self::mmap_backed(len, alignment, init) {
                        return Ok(region);
                    }
                }
                Self::heap_backed(len, alignment, init)
            }
        }
    }

    fn heap_backed(len: usize, alignment: usize, init: RegionInit) -> RingResult<Self> {
        let layout =
            Layout::from_size_align(len, alignment).map_err(|_| RingError::AllocationFailed {
                size: len,
                alignment,
            })?;

        let ptr = unsafe {
            // SAFETY: `layout` has a non-zero size, checked by the caller.
            match init {
                RegionInit::Zeroed => alloc_zeroed(layout),
                RegionInit::Uninitialized => alloc(layout),
            }
        };

        let base = NonNull::new(ptr).ok_or(RingError::AllocationFailed {
            size: len,
            alignment,
        })?;
        Ok(Self {
            base,
            len,
            alignment,
            storage: Storage::Owned { layout },
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn mmap_backed(len: usize, alignment: usize, init: RegionInit) -> RingResult<Option<Self>> {
        let mut map = memmap2::MmapOptions::new()
            .len(len)
            .map_anon()
            .map_err(|_| RingError::AllocationFailed {
                size: len,
                alignment,
            })?;

        let ptr = map.as_mut_ptr();
        if ptr as usize % alignment != 0 {
            return Ok(None);
        }

        if matches!(init, RegionInit::Zeroed) {
            unsafe {
                // SAFETY: the anonymous mapping exposes `len` writable bytes.
                ptr::write_bytes(ptr, 0, len)
            };
        }

        let Some(base) = NonNull::new(ptr) else {
            return Ok(None);
        };
        Ok(Some(Self {
            base,
            len,
            alignment,
            storage: Storage::Native(map),
        }))
    }

    /// Total number of bytes managed by this region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when the region has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the alignment the region was allocated with.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Whether the region is backed by an anonymous mapping.
    pub fn is_mapped(&self) -> bool {
        match self.storage {
            #[cfg(not(target_arch = "wasm32"))]
            Storage::Native(_) => true,
            Storage::Owned { .. } => false,
        }
    }

    /// Borrow the region as a const pointer.
    pub fn as_ptr(&self) -> *const u8 {
        self.base.as_ptr()
    }

    /// Borrow the region as a mut pointer.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// View the full region as an immutable slice.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// View the full region as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }

    /// Shared view of `[offset, offset + len)`.
    ///
    /// # Safety
    ///
    /// The range must lie inside the region and no mutable view of any
    /// overlapping byte may be alive for the returned lifetime.
    pub(crate) unsafe fn slice(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.len);
        std::slice::from_raw_parts(self.base.as_ptr().add(offset), len)
    }

    /// Exclusive view of `[offset, offset + len)` derived from a shared reference.
    ///
    /// # Safety
    ///
    /// The range must lie inside the region and the caller must be the only
    /// party accessing any byte of it for the returned lifetime.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slice_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.len);
        std::slice::from_raw_parts_mut(self.base.as_ptr().add(offset), len)
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if let Storage::Owned { layout } = &self.storage {
            unsafe {
                dealloc(self.base.as_ptr(), *layout);
            }
        }
    }
}
