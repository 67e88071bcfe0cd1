//! Single-producer/single-consumer variable-length byte ring.
//!
//! Layout:
//!
//! ```text
//! +---------------------------------------------------------------+
//! | data region (capacity bytes, 128B aligned)                     |
//! +---------------------------------------------------------------+
//!   ^ read           ^ write            ^ watermark      ^ capacity
//!   [ published, unconsumed )  [ free ]  [ dead tail ]
//! ```
//!
//! Cursors are byte offsets into the region. The producer reserves a
//! contiguous run with [`Producer::try_claim`], fills it through the returned
//! [`Claim`] and publishes it with [`Claim::commit`]. When the tail of the
//! region is too short for a claim but the front is free, the claim starts
//! over at offset zero and the commit lowers the shared `watermark` to the
//! old `write` position so the consumer knows where the previous run ended.
//!
//! The consumer polls with [`Consumer::try_read`], reads the returned
//! [`ReadGrant`] in place and retires bytes with [`ReadGrant::consume`]. It
//! drains up to the watermark before following the producer back to the
//! front.
//!
//! Synchronisation uses exactly three atomics, each on its own cache line:
//! `write` (Release in commit / Acquire in try_read) publishes payload bytes,
//! `read` (Release in consume / Acquire in try_claim) hands space back, and
//! `watermark` is Relaxed because it is stored before `write` on the producer
//! and loaded after `write` on the consumer.

use crate::config::{RingConfig, DATA_ALIGNMENT};
use crate::region::SharedRegion;
use crate::sync::{Arc, AtomicUsize, Ordering};
use crate::{RingError, RingResult};
use crossbeam_utils::CachePadded;
use log::{debug, trace};
use std::ops::Range;

#[derive(Debug)]
struct RingShared {
    region: SharedRegion,
    capacity: usize,
    read: CachePadded<AtomicUsize>,
    write: CachePadded<AtomicUsize>,
    watermark: CachePadded<AtomicUsize>,
}

impl RingShared {
    /// # Safety
    ///
    /// `range` must be published and not yet consumed, and only the consumer
    /// may call this.
    unsafe fn published(&self, range: Range<usize>) -> &[u8] {
        self.region.slice(range.start, range.end - range.start)
    }

    /// # Safety
    ///
    /// `range` must be the producer's outstanding claim.
    #[allow(clippy::mut_from_ref)]
    unsafe fn claimed(&self, range: Range<usize>) -> &mut [u8] {
        self.region.slice_mut(range.start, range.end - range.start)
    }
}

/// Fixed-capacity ring before it is split into its two halves.
#[derive(Debug)]
pub struct WatermarkRing {
    shared: Arc<RingShared>,
}

impl WatermarkRing {
    /// Creates a ring with `capacity` data bytes and the default allocation strategy.
    pub fn new(capacity: usize) -> RingResult<Self> {
        Self::with_config(RingConfig::with_capacity(capacity))
    }

    /// Creates a ring from an explicit configuration.
    pub fn with_config(config: RingConfig) -> RingResult<Self> {
        config.validate()?;
        let region = SharedRegion::with_backing(
            config.capacity,
            DATA_ALIGNMENT,
            config.init,
            config.backing,
        )?;
        debug!(
            "watermark ring created: capacity={} backing={:?} mapped={}",
            config.capacity,
            config.backing,
            region.is_mapped()
        );

        let capacity = config.capacity;
        Ok(Self {
            shared: Arc::new(RingShared {
                region,
                capacity,
                read: CachePadded::new(AtomicUsize::new(0)),
                write: CachePadded::new(AtomicUsize::new(0)),
                watermark: CachePadded::new(AtomicUsize::new(capacity)),
            }),
        })
    }

    /// Splits the ring into its producer and consumer halves.
    pub fn split(self) -> (Producer, Consumer) {
        let capacity = self.shared.capacity;
        let producer = Producer {
            shared: Arc::clone(&self.shared),
            write: 0,
            claimed: 0,
        };
        let consumer = Consumer {
            shared: self.shared,
            read: 0,
            prev_write: 0,
            prev_watermark: capacity,
        };
        (producer, consumer)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Base address of the data region.
    pub fn as_ptr(&self) -> *const u8 {
        self.shared.region.as_ptr()
    }

    /// Whether the data region is an anonymous mapping rather than heap memory.
    pub fn is_mapped(&self) -> bool {
        self.shared.region.is_mapped()
    }
}

/// Writing half of a [`WatermarkRing`].
#[derive(Debug)]
pub struct Producer {
    shared: Arc<RingShared>,
    write: usize,
    claimed: usize,
}

impl Producer {
    /// Attempts to reserve `size` contiguous bytes.
    ///
    /// `None` means the ring is currently too full for a run of that size;
    /// poll again once the consumer has made progress.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or larger than the ring's capacity. Use
    /// [`Producer::claim_checked`] when sizes come from untrusted input.
    pub fn try_claim(&mut self, size: usize) -> Option<Claim<'_>> {
        assert!(size != 0, "claim size must be non-zero");
        assert!(
            size <= self.shared.capacity,
            "claim of {size} bytes exceeds ring capacity {}",
            self.shared.capacity
        );

        let start = self.reserve(size)?;
        Some(Claim {
            producer: self,
            start,
            len: size,
            committed: false,
        })
    }

    /// Variant of [`Producer::try_claim`] that reports invalid sizes as errors.
    pub fn claim_checked(&mut self, size: usize) -> RingResult<Option<Claim<'_>>> {
        if size == 0 || size > self.shared.capacity {
            return Err(RingError::InvalidClaim {
                requested: size,
                capacity: self.shared.capacity,
            });
        }
        Ok(self.try_claim(size))
    }

    /// Copies `bytes` into the ring as one contiguous run and publishes it.
    ///
    /// Returns `false` when the ring has no room for the run right now. An
    /// empty slice is trivially published.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than the ring's capacity.
    pub fn try_push(&mut self, bytes: &[u8]) -> bool {
        if bytes.is_empty() {
            return true;
        }
        match self.try_claim(bytes.len()) {
            Some(mut claim) => {
                claim.payload().copy_from_slice(bytes);
                claim.commit();
                true
            }
            None => false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Base address of the data region.
    pub fn as_ptr(&self) -> *const u8 {
        self.shared.region.as_ptr()
    }

    /// Offset at which the next non-wrapping claim would start.
    pub fn position(&self) -> usize {
        self.write
    }

    /// Decision table for a new claim. Only touches the private `claimed` cursor.
    fn reserve(&mut self, size: usize) -> Option<usize> {
        debug_assert_eq!(self.write, self.claimed, "claim already outstanding");

        let capacity = self.shared.capacity;
        let read = self.shared.read.load(Ordering::Acquire);
        let write = self.write;

        let start = if write >= read {
            if capacity - write >= size {
                write
            } else if read > size {
                0
            } else {
                return None;
            }
        } else if read - write > size {
            write
        } else {
            return None;
        };

        self.claimed = start + size;
        Some(start)
    }

    fn commit(&mut self) {
        if self.claimed == self.write {
            return;
        }
        if self.claimed < self.write {
            self.shared.watermark.store(self.write, Ordering::Relaxed);
            trace!("producer wrapped: watermark={}", self.write);
        }
        self.write = self.claimed;
        self.shared.write.store(self.write, Ordering::Release);
    }

    fn abandon(&mut self) {
        if self.claimed != self.write {
            trace!(
                "claim abandoned: write={} claimed={}",
                self.write,
                self.claimed
            );
            self.claimed = self.write;
        }
    }
}

/// Outstanding reservation handed out by [`Producer::try_claim`].
///
/// The claim mutably borrows its producer, so a second claim cannot be taken
/// until this one is committed or dropped. Dropping without committing
/// abandons the reservation; nothing becomes visible to the consumer.
#[derive(Debug)]
pub struct Claim<'a> {
    producer: &'a mut Producer,
    start: usize,
    len: usize,
    committed: bool,
}

impl Claim<'_> {
    /// Writable view over the reserved bytes.
    pub fn payload(&mut self) -> &mut [u8] {
        unsafe {
            // SAFETY: `[start, start + len)` is the producer's outstanding claim; the
            // consumer never reads past the published `write`, and the claim is
            // reachable only through this exclusive borrow.
            self.producer.shared.claimed(self.start..self.start + self.len)
        }
    }

    /// Offset of the reservation from the base of the data region.
    pub fn offset(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this reservation restarted at the front of the region.
    pub fn wrapped(&self) -> bool {
        self.start < self.producer.write
    }

    /// Publishes the reservation to the consumer.
    pub fn commit(mut self) {
        self.producer.commit();
        self.committed = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.producer.abandon();
        }
    }
}

/// Reading half of a [`WatermarkRing`].
#[derive(Debug)]
pub struct Consumer {
    shared: Arc<RingShared>,
    read: usize,
    prev_write: usize,
    prev_watermark: usize,
}

impl Consumer {
    /// Polls for published bytes.
    ///
    /// The returned grant is empty when nothing new has been committed. A
    /// non-empty grant covers one contiguous run; after the run that ends at
    /// the watermark has been consumed the next poll continues at offset zero.
    pub fn try_read(&mut self) -> ReadGrant<'_> {
        let range = self.poll();
        ReadGrant {
            start: range.start,
            end: range.end,
            consumer: self,
        }
    }

    /// Copies up to `max` readable bytes onto the end of `out` and retires them.
    ///
    /// Returns the number of bytes moved; zero when nothing was readable.
    pub fn read_into(&mut self, out: &mut Vec<u8>, max: usize) -> usize {
        let mut grant = self.try_read();
        let n = grant.len().min(max);
        if n == 0 {
            return 0;
        }
        out.extend_from_slice(&grant.as_slice()[..n]);
        let consumed = grant.consume(n);
        debug_assert!(consumed.is_ok());
        n
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Base address of the data region.
    pub fn as_ptr(&self) -> *const u8 {
        self.shared.region.as_ptr()
    }

    /// Offset of the next byte to consume.
    pub fn position(&self) -> usize {
        self.read
    }

    fn poll(&mut self) -> Range<usize> {
        self.prev_write = self.shared.write.load(Ordering::Acquire);
        if self.prev_write >= self.read {
            return self.read..self.prev_write;
        }

        self.prev_watermark = self.shared.watermark.load(Ordering::Relaxed);
        if self.read == self.prev_watermark {
            trace!("consumer wrapped: watermark={}", self.prev_watermark);
            self.read = 0;
            0..self.prev_write
        } else {
            self.read..self.prev_watermark
        }
    }

    fn consume(&mut self, size: usize) -> RingResult<()> {
        if self.prev_write >= self.read {
            let readable = self.prev_write - self.read;
            if size > readable {
                return Err(self.over_consume(size, readable));
            }
            self.read += size;
        } else {
            let remaining = self.prev_watermark - self.read;
            if size > remaining {
                return Err(self.over_consume(size, remaining));
            }
            if size == remaining {
                self.read = 0;
            } else {
                self.read += size;
            }
        }

        self.shared.read.store(self.read, Ordering::Release);
        Ok(())
    }

    fn over_consume(&self, requested: usize, available: usize) -> RingError {
        trace!("rejected consume of {requested} bytes ({available} available)");
        RingError::OverConsume {
            requested,
            available,
        }
    }
}

/// Readable run returned by [`Consumer::try_read`].
///
/// Bytes may be consumed all at once or in several smaller steps; each
/// successful [`ReadGrant::consume`] hands the space back to the producer.
#[derive(Debug)]
pub struct ReadGrant<'a> {
    consumer: &'a mut Consumer,
    start: usize,
    end: usize,
}

impl ReadGrant<'_> {
    /// Remaining unconsumed bytes of this grant, in place.
    pub fn as_slice(&self) -> &[u8] {
        unsafe {
            // SAFETY: the range was published by a Release store of `write` that
            // `poll` observed with Acquire, and the producer never reclaims bytes
            // before `read` moves past them.
            self.consumer.shared.published(self.start..self.end)
        }
    }

    /// Offsets of the remaining bytes within the data region.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Retires the first `size` remaining bytes of the grant.
    ///
    /// Requesting more than [`ReadGrant::len`] fails with
    /// [`RingError::OverConsume`] and changes nothing.
    pub fn consume(&mut self, size: usize) -> RingResult<()> {
        if size > self.len() {
            return Err(self.consumer.over_consume(size, self.len()));
        }
        self.consumer.consume(size)?;
        self.start += size;
        Ok(())
    }

    /// Retires every remaining byte and returns how many that was.
    pub fn consume_all(mut self) -> usize {
        let n = self.len();
        let consumed = self.consume(n);
        debug_assert!(consumed.is_ok());
        n
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    //! Unit coverage for the watermark ring.
    use super::*;
    use crate::region::{Backing, RegionInit};
    use rand::prelude::*;
    use std::collections::VecDeque;

    fn ring(capacity: usize) -> (Producer, Consumer) {
        WatermarkRing::with_config(RingConfig::with_capacity(capacity).backing(Backing::Heap))
            .expect("create ring")
            .split()
    }

    fn push(producer: &mut Producer, len: usize, byte: u8) -> usize {
        let mut claim = producer.try_claim(len).expect("claim");
        claim.payload().fill(byte);
        let offset = claim.offset();
        claim.commit();
        offset
    }

    fn shared_read(consumer: &Consumer) -> usize {
        consumer.shared.read.load(Ordering::Acquire)
    }

    fn shared_watermark(producer: &Producer) -> usize {
        producer.shared.watermark.load(Ordering::Acquire)
    }

    /// Smoke test: one payload round-trips through claim/commit/read/consume.
    #[test]
    fn single_record_round_trip() {
        let (mut producer, mut consumer) = ring(256);
        assert!(producer.try_push(b"hello watermark"));

        let mut grant = consumer.try_read();
        assert_eq!(grant.as_slice(), b"hello watermark");
        assert_eq!(grant.range(), 0..15);
        grant.consume(15).unwrap();
        drop(grant);

        assert!(consumer.try_read().is_empty());
        assert_eq!(shared_read(&consumer), 15);
    }

    #[test]
    fn fresh_ring_reads_empty() {
        let (producer, mut consumer) = ring(64);
        assert_eq!(producer.capacity(), 64);
        assert_eq!(producer.as_ptr(), consumer.as_ptr());
        assert_eq!(consumer.as_ptr() as usize % DATA_ALIGNMENT, 0);
        let grant = consumer.try_read();
        assert!(grant.is_empty());
        assert_eq!(grant.range(), 0..0);
    }

    #[test]
    fn uninitialized_ring_reads_only_committed_bytes() {
        let config = RingConfig::with_capacity(64)
            .backing(Backing::Heap)
            .init(RegionInit::Uninitialized);
        let (mut producer, mut consumer) = WatermarkRing::with_config(config)
            .expect("create ring")
            .split();
        assert!(consumer.try_read().is_empty());

        assert!(producer.try_push(b"fresh"));
        let grant = consumer.try_read();
        assert_eq!(grant.as_slice(), b"fresh");
        assert_eq!(grant.consume_all(), 5);
    }

    /// Worked example on a 16 byte ring covering all three claim branches.
    #[test]
    fn sixteen_byte_walkthrough() {
        let (mut producer, mut consumer) = ring(16);

        assert_eq!(push(&mut producer, 10, 0xA0), 0);
        assert_eq!(producer.position(), 10);

        // Tail holds 6, front check `0 > 10` fails.
        assert!(producer.try_claim(10).is_none());

        let mut grant = consumer.try_read();
        assert_eq!(grant.range(), 0..10);
        grant.consume(4).unwrap();
        drop(grant);
        assert_eq!(shared_read(&consumer), 4);

        // Front check `4 > 10` still fails; a 3 byte run fits the tail.
        assert!(producer.try_claim(10).is_none());
        assert_eq!(push(&mut producer, 3, 0xA1), 10);
        assert_eq!(producer.position(), 13);

        let mut grant = consumer.try_read();
        assert_eq!(grant.range(), 4..13);
        grant.consume(9).unwrap();
        drop(grant);
        assert_eq!(shared_read(&consumer), 13);

        // `13 > 10`: the claim restarts at the front and the tail dies.
        let claim = producer.try_claim(10).expect("wrap claim");
        assert_eq!(claim.offset(), 0);
        assert!(claim.wrapped());
        claim.commit();
        assert_eq!(shared_watermark(&producer), 13);
        assert_eq!(producer.position(), 10);

        // Wrapped write: `13 - 10 > 3` fails, `13 - 10 > 2` succeeds.
        assert!(producer.try_claim(3).is_none());
        assert_eq!(push(&mut producer, 2, 0xA2), 10);

        // Consumer sits exactly on the watermark and follows to the front.
        let grant = consumer.try_read();
        assert_eq!(grant.range(), 0..12);
        assert_eq!(grant.consume_all(), 12);
        assert_eq!(shared_read(&consumer), 12);
        assert!(consumer.try_read().is_empty());
    }

    /// Wrap test: the consumer drains up to the watermark before wrapping.
    #[test]
    fn consumer_stops_at_watermark() {
        let (mut producer, mut consumer) = ring(16);
        push(&mut producer, 6, 0x11);
        push(&mut producer, 6, 0x22);
        consumer.try_read().consume(6).unwrap();

        let offset = push(&mut producer, 5, 0x33);
        assert_eq!(offset, 0);
        assert_eq!(shared_watermark(&producer), 12);

        let mut grant = consumer.try_read();
        assert_eq!(grant.range(), 6..12);
        assert!(grant.as_slice().iter().all(|b| *b == 0x22));
        grant.consume(3).unwrap();
        drop(grant);
        assert_eq!(consumer.position(), 9);

        let mut grant = consumer.try_read();
        assert_eq!(grant.range(), 9..12);
        grant.consume(3).unwrap();
        drop(grant);
        assert_eq!(consumer.position(), 0);
        assert_eq!(shared_read(&consumer), 0);

        let grant = consumer.try_read();
        assert_eq!(grant.range(), 0..5);
        assert!(grant.as_slice().iter().all(|b| *b == 0x33));
    }

    #[test]
    fn tail_claim_may_fill_to_the_end() {
        let (mut producer, mut consumer) = ring(16);
        assert_eq!(push(&mut producer, 16, 0x44), 0);
        assert_eq!(producer.position(), 16);
        assert!(producer.try_claim(1).is_none());

        assert_eq!(consumer.try_read().consume_all(), 16);
        // Front room equals the request: the strict check refuses it.
        assert!(producer.try_claim(16).is_none());
        let claim = producer.try_claim(15).expect("wrap claim");
        assert_eq!(claim.offset(), 0);
        claim.commit();
        assert_eq!(shared_watermark(&producer), 16);

        let grant = consumer.try_read();
        assert_eq!(grant.range(), 0..15);
    }

    #[test]
    fn front_room_equal_to_request_is_refused() {
        let (mut producer, mut consumer) = ring(16);
        push(&mut producer, 10, 0x55);
        consumer.try_read().consume(10).unwrap();
        assert!(producer.try_claim(10).is_none());
        assert_eq!(producer.try_claim(9).expect("fits").offset(), 0);
    }

    /// Capacity test: a wrapped full ring takes exactly one more message per consume.
    #[test]
    fn full_ring_accepts_one_message_per_consume() {
        let (mut producer, mut consumer) = ring(64);
        for _ in 0..8 {
            push(&mut producer, 8, 0x66);
        }
        assert!(producer.try_claim(8).is_none());

        consumer.try_read().consume(16).unwrap();
        assert_eq!(push(&mut producer, 8, 0x67), 0);
        // `16 - 8 > 8` fails: one free byte of separation is always kept.
        assert!(producer.try_claim(8).is_none());

        consumer.try_read().consume(8).unwrap();
        assert_eq!(push(&mut producer, 8, 0x68), 8);
        assert!(producer.try_claim(8).is_none());
    }

    #[test]
    fn over_consume_is_rejected_without_side_effects() {
        let (mut producer, mut consumer) = ring(32);
        push(&mut producer, 7, 0x77);

        let mut grant = consumer.try_read();
        assert_eq!(
            grant.consume(8),
            Err(RingError::OverConsume {
                requested: 8,
                available: 7
            })
        );
        drop(grant);
        assert_eq!(shared_read(&consumer), 0);
        assert_eq!(consumer.position(), 0);

        let mut grant = consumer.try_read();
        grant.consume(7).unwrap();
        assert!(grant.consume(1).is_err());
    }

    #[test]
    fn over_consume_past_watermark_is_rejected() {
        let (mut producer, mut consumer) = ring(16);
        push(&mut producer, 6, 0x11);
        push(&mut producer, 6, 0x22);
        consumer.try_read().consume(6).unwrap();
        push(&mut producer, 5, 0x33);

        let mut grant = consumer.try_read();
        assert_eq!(grant.range(), 6..12);
        assert_eq!(
            grant.consume(7),
            Err(RingError::OverConsume {
                requested: 7,
                available: 6
            })
        );
        drop(grant);
        assert_eq!(shared_read(&consumer), 6);
    }

    #[test]
    fn dropped_claim_publishes_nothing() {
        let (mut producer, mut consumer) = ring(32);
        {
            let mut claim = producer.try_claim(12).expect("claim");
            claim.payload().fill(0xEE);
        }
        assert_eq!(producer.position(), 0);
        assert!(consumer.try_read().is_empty());

        // The abandoned bytes are handed out again.
        assert_eq!(push(&mut producer, 4, 0x01), 0);
        assert_eq!(consumer.try_read().as_slice(), &[0x01; 4]);
    }

    #[test]
    fn dropped_wrapping_claim_leaves_watermark_alone() {
        let (mut producer, mut consumer) = ring(16);
        push(&mut producer, 12, 0x10);
        consumer.try_read().consume_all();
        {
            let claim = producer.try_claim(6).expect("wrap claim");
            assert!(claim.wrapped());
        }
        assert_eq!(shared_watermark(&producer), 16);
        assert_eq!(producer.position(), 12);
        assert_eq!(push(&mut producer, 4, 0x20), 12);
    }

    #[test]
    #[should_panic(expected = "claim size must be non-zero")]
    fn zero_sized_claim_panics() {
        let (mut producer, _consumer) = ring(16);
        let _ = producer.try_claim(0);
    }

    #[test]
    #[should_panic(expected = "exceeds ring capacity")]
    fn oversized_claim_panics() {
        let (mut producer, _consumer) = ring(16);
        let _ = producer.try_claim(17);
    }

    #[test]
    fn checked_claim_reports_misuse() {
        let (mut producer, _consumer) = ring(16);
        assert_eq!(
            producer.claim_checked(0).unwrap_err(),
            RingError::InvalidClaim {
                requested: 0,
                capacity: 16
            }
        );
        assert!(producer.claim_checked(17).is_err());
        assert!(producer.claim_checked(16).unwrap().is_some());
    }

    #[test]
    fn read_into_respects_max() {
        let (mut producer, mut consumer) = ring(32);
        assert!(producer.try_push(b"abcdef"));
        let mut out = Vec::new();
        assert_eq!(consumer.read_into(&mut out, 4), 4);
        assert_eq!(consumer.read_into(&mut out, 4), 2);
        assert_eq!(consumer.read_into(&mut out, 4), 0);
        assert_eq!(out, b"abcdef");
    }

    /// Shadow model shared by the randomised and property tests.
    ///
    /// Tracks which bytes of the region are live (committed, not consumed)
    /// and the FIFO stream of committed bytes.
    struct Shadow {
        live: Vec<bool>,
        pending: VecDeque<u8>,
        next: u8,
    }

    impl Shadow {
        fn new(capacity: usize) -> Self {
            Self {
                live: vec![false; capacity],
                pending: VecDeque::new(),
                next: 0,
            }
        }

        fn produce(&mut self, producer: &mut Producer, len: usize) -> bool {
            let Some(mut claim) = producer.try_claim(len) else {
                return false;
            };
            let range = claim.offset()..claim.offset() + len;
            assert!(
                self.live[range.clone()].iter().all(|live| !live),
                "claim {range:?} overlaps unconsumed bytes"
            );
            for byte in claim.payload() {
                *byte = self.next;
                self.pending.push_back(self.next);
                self.next = self.next.wrapping_add(1);
            }
            claim.commit();
            self.live[range].fill(true);
            true
        }

        fn consume(&mut self, consumer: &mut Consumer, max: usize) -> usize {
            let mut grant = consumer.try_read();
            let n = grant.len().min(max);
            let start = grant.range().start;
            for (idx, byte) in grant.as_slice()[..n].iter().enumerate() {
                assert!(self.live[start + idx], "read unpublished byte");
                assert_eq!(Some(*byte), self.pending.pop_front(), "FIFO order broken");
            }
            grant.consume(n).unwrap();
            self.live[start..start + n].fill(false);
            n
        }
    }

    /// Randomised stress covering wrap-around, FIFO order and no-overlap.
    #[test]
    fn var_len_stress() {
        let capacity = 509;
        let (mut producer, mut consumer) = ring(capacity);
        let mut shadow = Shadow::new(capacity);
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);

        for _ in 0..20_000 {
            if rng.gen_bool(0.55) {
                let len = rng.gen_range(1..=capacity / 3);
                shadow.produce(&mut producer, len);
            } else {
                let max = rng.gen_range(1..=capacity);
                shadow.consume(&mut consumer, max);
            }
        }

        while shadow.consume(&mut consumer, capacity) > 0 {}
        assert!(shadow.pending.is_empty());
        assert!(shadow.live.iter().all(|live| !live));
    }

    /// An empty ring always accepts any claim up to the last position's headroom.
    #[test]
    fn drained_ring_never_starves_small_claims() {
        let capacity = 97;
        let (mut producer, mut consumer) = ring(capacity);
        let mut shadow = Shadow::new(capacity);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5_000 {
            let len = rng.gen_range(1..=capacity / 2);
            if !shadow.produce(&mut producer, len) {
                while shadow.consume(&mut consumer, capacity) > 0 {}
                assert!(
                    shadow.produce(&mut producer, len),
                    "{len} bytes rejected by a drained ring"
                );
            }
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Claim(usize),
            Consume(usize),
            Abandon(usize),
        }

        fn op(capacity: usize) -> impl Strategy<Value = Op> {
            prop_oneof![
                (1..=capacity).prop_map(Op::Claim),
                (0..=capacity).prop_map(Op::Consume),
                (1..=capacity).prop_map(Op::Abandon),
            ]
        }

        proptest! {
            #[test]
            fn ops_preserve_fifo_and_no_overlap(
                capacity in 1usize..96,
                seed_ops in proptest::collection::vec(op(96), 1..200),
            ) {
                let (mut producer, mut consumer) = ring(capacity);
                let mut shadow = Shadow::new(capacity);
                for op in seed_ops {
                    match op {
                        Op::Claim(len) => {
                            shadow.produce(&mut producer, len.min(capacity));
                        }
                        Op::Consume(max) => {
                            shadow.consume(&mut consumer, max);
                        }
                        Op::Abandon(len) => {
                            let _ = producer.try_claim(len.min(capacity));
                        }
                    }
                    let read = shared_read(&consumer);
                    prop_assert!(read <= capacity);
                    prop_assert!(producer.position() <= capacity);
                }
                while shadow.consume(&mut consumer, capacity) > 0 {}
                prop_assert!(shadow.pending.is_empty());
            }
        }
    }
}
