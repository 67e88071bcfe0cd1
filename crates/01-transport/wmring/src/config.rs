//! Construction-time configuration for a [`WatermarkRing`](crate::WatermarkRing).

use crate::region::{Backing, RegionInit};
use crate::{RingError, RingResult};
use serde::{Deserialize, Serialize};

/// Alignment of the ring's data region. Matches the cache-line padding of the
/// cursors so payloads never share a line with anything else.
pub const DATA_ALIGNMENT: usize = 128;

/// Largest capacity a ring accepts. Cursor arithmetic stays comfortably clear
/// of `usize` overflow and the region layout stays representable.
pub const MAX_CAPACITY: usize = isize::MAX as usize / 2;

/// Shape and allocation strategy of a ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Usable bytes in the data region.
    pub capacity: usize,
    /// How the data region is allocated.
    pub backing: Backing,
    /// Initial contents of the data region.
    pub init: RegionInit,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 64 * 1024,
            backing: Backing::Auto,
            init: RegionInit::Zeroed,
        }
    }
}

impl RingConfig {
    /// Configuration with the given capacity and default strategy.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn backing(mut self, backing: Backing) -> Self {
        self.backing = backing;
        self
    }

    pub fn init(mut self, init: RegionInit) -> Self {
        self.init = init;
        self
    }

    /// Checks the configuration before any memory is allocated.
    pub fn validate(&self) -> RingResult<()> {
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(RingError::InvalidCapacity {
                requested: self.capacity,
                maximum: MAX_CAPACITY,
            });
        }
        #[cfg(target_arch = "wasm32")]
        if self.backing == Backing::Mmap {
            return Err(RingError::InvalidConfig(
                "mmap backing is unavailable on wasm32",
            ));
        }
        Ok(())
    }
}
