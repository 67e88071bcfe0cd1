//! Lock-free single-producer/single-consumer ring for variable-length byte runs.
//!
//! This crate exposes:
//! * [`WatermarkRing`] – fixed-capacity ring split into a [`Producer`] and a [`Consumer`].
//! * [`Claim`] / [`ReadGrant`] – borrowed views that turn claim→commit and
//!   read→consume into structural pairs.
//! * [`SharedRegion`] – contiguous, aligned memory (heap or anonymous `mmap`).
//! * [`IoBuffer`] – single-threaded flat staging buffer.
//! * `LinearRing` (Linux) – single-threaded ring mapped twice so reads and
//!   writes that cross the end stay contiguous.
//! * [`RingError`] – small error surface for construction and caller misuse.
//!
//! ```
//! use wmring::WatermarkRing;
//!
//! let (mut producer, mut consumer) = WatermarkRing::new(1024).unwrap().split();
//!
//! let mut claim = producer.try_claim(5).expect("room for 5 bytes");
//! claim.payload().copy_from_slice(b"hello");
//! claim.commit();
//!
//! let mut grant = consumer.try_read();
//! assert_eq!(grant.as_slice(), b"hello");
//! grant.consume(5).unwrap();
//! ```

mod config;
mod error;
mod io_buffer;
#[cfg(target_os = "linux")]
mod linear;
mod region;
mod ring;

pub use config::{RingConfig, DATA_ALIGNMENT, MAX_CAPACITY};
pub use error::{RingError, RingResult};
pub use io_buffer::IoBuffer;
#[cfg(target_os = "linux")]
pub use linear::LinearRing;
pub use region::{Backing, RegionInit, SharedRegion};
pub use ring::{Claim, Consumer, Producer, ReadGrant, WatermarkRing};

mod sync {
    #[cfg(feature = "loom")]
    pub(crate) use loom::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    #[cfg(not(feature = "loom"))]
    pub(crate) use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
}
