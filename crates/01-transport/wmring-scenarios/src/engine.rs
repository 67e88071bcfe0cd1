use crate::checks::DrainReport;
use crate::config::{ScenarioConfig, ScenarioKind, BURST_PAUSE, CONSUMER_DELAY};
use crate::error::{ScenarioError, ScenarioResult};
use crate::frame::{self, MessageDigest, FRAME_HEADER_LEN};
use crate::stats::{ScenarioStats, StatsSink};
use crossbeam_utils::Backoff;
use log::{debug, info};
use rand::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use wmring::{Consumer, Producer, WatermarkRing};

/// Outcome of one scenario run.
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub kind: ScenarioKind,
    pub sent: Vec<MessageDigest>,
    pub received: Vec<MessageDigest>,
    pub elapsed: Duration,
    /// Whether the ring ended up on an anonymous mapping.
    pub mapped: bool,
}

impl ScenarioReport {
    pub fn drain(&self) -> DrainReport<'_> {
        DrainReport {
            sent: &self.sent,
            received: &self.received,
        }
    }
}

/// Runs `config` on a fresh ring with one producer and one consumer thread.
///
/// Counters from both threads are merged into `stats` when they finish.
pub fn run_scenario<S: StatsSink>(
    config: &ScenarioConfig,
    stats: &S,
) -> ScenarioResult<ScenarioReport> {
    config.validate()?;
    let ring = WatermarkRing::with_config(config.ring)?;
    let mapped = ring.is_mapped();
    let (producer, consumer) = ring.split();
    let abort_flag = AtomicBool::new(false);
    let abort = &abort_flag;

    info!(
        "scenario {} starting: messages={} capacity={} payload={}..={}",
        config.kind.name(),
        config.kind.total_messages(),
        config.ring.capacity,
        config.min_len,
        config.max_len
    );

    let started = Instant::now();
    let (sent, received) = thread::scope(|scope| {
        let producer_stats = stats.clone();
        let producer_thread = scope.spawn(move || {
            let _guard = AbortGuard::on_panic(abort);
            let mut engine = ProducerEngine::new(producer, config);
            engine.run(abort);
            let sender = engine.sender;
            debug!("producer finished: {:?}", sender.stats);
            producer_stats.with_stats(|total| total.merge(&sender.stats));
            sender.sent
        });

        let consumer_stats = stats.clone();
        let consumer_thread = scope.spawn(move || {
            let _guard = AbortGuard::always(abort);
            let mut receiver = Receiver::new(consumer, config);
            let result = receiver.run(abort);
            debug!("consumer finished: {:?}", receiver.stats);
            consumer_stats.with_stats(|total| total.merge(&receiver.stats));
            result.map(|()| receiver.received)
        });

        let received = consumer_thread
            .join()
            .map_err(|_| ScenarioError::ThreadPanicked("consumer"))?;
        let sent = producer_thread
            .join()
            .map_err(|_| ScenarioError::ThreadPanicked("producer"))?;
        Ok::<_, ScenarioError>((sent, received?))
    })?;
    let elapsed = started.elapsed();

    info!(
        "scenario {} finished: sent={} received={} elapsed={:?}",
        config.kind.name(),
        sent.len(),
        received.len(),
        elapsed
    );

    Ok(ScenarioReport {
        kind: config.kind,
        sent,
        received,
        elapsed,
        mapped,
    })
}

/// Raises the abort flag when a scenario thread exits early.
struct AbortGuard<'a> {
    flag: &'a AtomicBool,
    always: bool,
}

impl<'a> AbortGuard<'a> {
    fn on_panic(flag: &'a AtomicBool) -> Self {
        Self {
            flag,
            always: false,
        }
    }

    fn always(flag: &'a AtomicBool) -> Self {
        Self { flag, always: true }
    }
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if self.always || thread::panicking() {
            self.flag.store(true, Ordering::Release);
        }
    }
}

struct ProducerEngine {
    sender: Sender,
    state: ScenarioState,
}

enum ScenarioState {
    Flood {
        messages: u32,
        current: u32,
    },
    Burst {
        bursts: u32,
        burst_size: u32,
        current_burst: u32,
    },
    Backpressure {
        messages: u32,
        produced: u32,
    },
}

/// Producer-side half of the harness: picks payloads and pushes frames.
struct Sender {
    producer: Producer,
    rng: StdRng,
    min_len: u32,
    max_len: u32,
    payload: Vec<u8>,
    next_seq: u32,
    sent: Vec<MessageDigest>,
    stats: ScenarioStats,
}

impl Sender {
    /// Pushes one frame, polling until the ring has room. Returns `false`
    /// if the run was aborted while waiting.
    fn produce_message(&mut self, abort: &AtomicBool) -> bool {
        let len = self.rng.gen_range(self.min_len..=self.max_len) as usize;
        self.payload.resize(len, 0);
        self.rng.fill_bytes(&mut self.payload);
        let seq = self.next_seq;

        let backoff = Backoff::new();
        loop {
            if let Some(mut claim) = self.producer.try_claim(FRAME_HEADER_LEN + len) {
                if claim.wrapped() {
                    self.stats.producer_wraps = self.stats.producer_wraps.wrapping_add(1);
                }
                frame::encode(claim.payload(), seq, &self.payload);
                claim.commit();
                break;
            }
            self.stats.claim_failures = self.stats.claim_failures.wrapping_add(1);
            if abort.load(Ordering::Acquire) {
                return false;
            }
            backoff.snooze();
        }

        self.sent.push(MessageDigest {
            seq,
            len: len as u32,
            checksum: frame::checksum(&self.payload),
        });
        self.next_seq = self.next_seq.wrapping_add(1);
        self.stats.produced = self.stats.produced.wrapping_add(1);
        self.stats.bytes_produced = self.stats.bytes_produced.wrapping_add(len as u64);
        true
    }
}

impl ProducerEngine {
    fn new(producer: Producer, config: &ScenarioConfig) -> Self {
        let state = match config.kind {
            ScenarioKind::Flood { messages } => ScenarioState::Flood {
                messages,
                current: 0,
            },
            ScenarioKind::Burst { bursts, burst_size } => ScenarioState::Burst {
                bursts,
                burst_size,
                current_burst: 0,
            },
            ScenarioKind::Backpressure { messages } => ScenarioState::Backpressure {
                messages,
                produced: 0,
            },
        };

        Self {
            sender: Sender {
                producer,
                rng: StdRng::seed_from_u64(config.seed),
                min_len: config.min_len,
                max_len: config.max_len,
                payload: Vec::with_capacity(config.max_len as usize),
                next_seq: 0,
                sent: Vec::with_capacity(config.kind.total_messages() as usize),
                stats: ScenarioStats::default(),
            },
            state,
        }
    }

    fn run(&mut self, abort: &AtomicBool) {
        while !self.is_done() {
            if self.poll(abort) == 0 && abort.load(Ordering::Acquire) {
                break;
            }
        }
    }

    fn is_done(&self) -> bool {
        match self.state {
            ScenarioState::Flood { messages, current } => current >= messages,
            ScenarioState::Burst {
                bursts,
                current_burst,
                ..
            } => current_burst >= bursts,
            ScenarioState::Backpressure { messages, produced } => produced >= messages,
        }
    }

    /// Advances the scenario by a bounded amount of work.
    fn poll(&mut self, abort: &AtomicBool) -> usize {
        let sender = &mut self.sender;
        match &mut self.state {
            ScenarioState::Flood { messages, current } => {
                let mut work = 0usize;
                while *current < *messages && work < 100 {
                    if !sender.produce_message(abort) {
                        break;
                    }
                    *current += 1;
                    work += 1;
                }
                work
            }
            ScenarioState::Burst {
                bursts,
                burst_size,
                current_burst,
            } => {
                if *current_burst >= *bursts {
                    return 0;
                }
                let mut work = 0usize;
                while work < *burst_size as usize {
                    if !sender.produce_message(abort) {
                        return work;
                    }
                    work += 1;
                }
                *current_burst += 1;
                thread::sleep(BURST_PAUSE);
                work
            }
            ScenarioState::Backpressure { messages, produced } => {
                let mut work = 0usize;
                while *produced < *messages && work < 50 {
                    if !sender.produce_message(abort) {
                        break;
                    }
                    *produced += 1;
                    work += 1;
                }
                work
            }
        }
    }
}

/// Consumer-side half of the harness: splits readable runs back into frames.
struct Receiver {
    consumer: Consumer,
    expected: usize,
    delay: Option<Duration>,
    last_offset: Option<usize>,
    received: Vec<MessageDigest>,
    stats: ScenarioStats,
}

impl Receiver {
    fn new(consumer: Consumer, config: &ScenarioConfig) -> Self {
        let expected = config.kind.total_messages() as usize;
        let delay = match config.kind {
            ScenarioKind::Backpressure { .. } => Some(CONSUMER_DELAY),
            _ => None,
        };
        Self {
            consumer,
            expected,
            delay,
            last_offset: None,
            received: Vec::with_capacity(expected),
            stats: ScenarioStats::default(),
        }
    }

    fn run(&mut self, abort: &AtomicBool) -> ScenarioResult<()> {
        let backoff = Backoff::new();
        while self.received.len() < self.expected {
            let mut grant = self.consumer.try_read();
            if grant.is_empty() {
                self.stats.empty_polls = self.stats.empty_polls.wrapping_add(1);
                if abort.load(Ordering::Acquire) {
                    break;
                }
                backoff.snooze();
                continue;
            }
            backoff.reset();

            // Commits only ever publish whole frames, so a grant never ends mid-frame.
            while !grant.is_empty() {
                let offset = grant.range().start;
                let (digest, frame_len) = frame::decode(grant.as_slice(), offset)?;
                grant.consume(frame_len)?;

                if self.last_offset.is_some_and(|last| offset <= last) {
                    self.stats.consumer_wraps = self.stats.consumer_wraps.wrapping_add(1);
                }
                self.last_offset = Some(offset);
                self.received.push(digest);
                self.stats.consumed = self.stats.consumed.wrapping_add(1);
                self.stats.bytes_consumed =
                    self.stats.bytes_consumed.wrapping_add(u64::from(digest.len));

                if let Some(delay) = self.delay {
                    thread::sleep(delay);
                }
            }
        }
        Ok(())
    }
}
