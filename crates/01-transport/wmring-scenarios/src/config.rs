use serde::{Deserialize, Serialize};
use std::time::Duration;
use wmring::RingConfig;

use crate::error::{ScenarioError, ScenarioResult};
use crate::frame::FRAME_HEADER_LEN;

/// Pause the producer takes between bursts.
pub const BURST_PAUSE: Duration = Duration::from_micros(200);

/// Delay the consumer takes after each message in the backpressure scenario.
pub const CONSUMER_DELAY: Duration = Duration::from_micros(20);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioKind {
    Flood { messages: u32 },
    Burst { bursts: u32, burst_size: u32 },
    Backpressure { messages: u32 },
}

impl ScenarioKind {
    pub fn total_messages(&self) -> u32 {
        match *self {
            ScenarioKind::Flood { messages } => messages,
            ScenarioKind::Burst { bursts, burst_size } => bursts.saturating_mul(burst_size),
            ScenarioKind::Backpressure { messages } => messages,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Flood { .. } => "flood",
            ScenarioKind::Burst { .. } => "burst",
            ScenarioKind::Backpressure { .. } => "backpressure",
        }
    }
}

/// Everything needed to run one producer/consumer scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub kind: ScenarioKind,
    #[serde(default)]
    pub ring: RingConfig,
    /// Smallest payload, excluding the frame header.
    #[serde(default = "default_min_len")]
    pub min_len: u32,
    /// Largest payload, excluding the frame header.
    #[serde(default = "default_max_len")]
    pub max_len: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_min_len() -> u32 {
    1
}

fn default_max_len() -> u32 {
    256
}

fn default_seed() -> u64 {
    0x5EED
}

impl ScenarioConfig {
    pub fn new(kind: ScenarioKind, ring: RingConfig) -> Self {
        Self {
            kind,
            ring,
            min_len: default_min_len(),
            max_len: default_max_len(),
            seed: default_seed(),
        }
    }

    pub fn flood(messages: u32) -> Self {
        Self::new(ScenarioKind::Flood { messages }, RingConfig::default())
    }

    pub fn burst(bursts: u32, burst_size: u32) -> Self {
        Self::new(
            ScenarioKind::Burst { bursts, burst_size },
            RingConfig::default(),
        )
    }

    pub fn backpressure(messages: u32) -> Self {
        Self::new(
            ScenarioKind::Backpressure { messages },
            RingConfig::with_capacity(4 * 1024),
        )
    }

    pub fn with_ring(mut self, ring: RingConfig) -> Self {
        self.ring = ring;
        self
    }

    pub fn with_lengths(mut self, min_len: u32, max_len: u32) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Largest contiguous run a single message occupies in the ring.
    pub fn max_frame_len(&self) -> usize {
        FRAME_HEADER_LEN + self.max_len as usize
    }

    /// Rejects configurations that could leave the producer waiting forever.
    ///
    /// A drained ring always accepts a run of at most half its capacity, so
    /// the largest frame must fit in that.
    pub fn validate(&self) -> ScenarioResult<()> {
        self.ring.validate()?;
        if self.min_len == 0 || self.min_len > self.max_len {
            return Err(ScenarioError::config(format!(
                "payload lengths must satisfy 1 <= min ({}) <= max ({})",
                self.min_len, self.max_len
            )));
        }
        if self.max_frame_len() > self.ring.capacity / 2 {
            return Err(ScenarioError::config(format!(
                "frames of up to {} bytes need a ring of at least {} bytes (have {})",
                self.max_frame_len(),
                self.max_frame_len() * 2,
                self.ring.capacity
            )));
        }
        if self.kind.total_messages() == 0 {
            return Err(ScenarioError::config("scenario sends no messages"));
        }
        Ok(())
    }
}
