//! Producer/consumer scenarios that drive a [`wmring::WatermarkRing`] from two
//! threads and check what comes out the other end.

mod checks;
mod config;
mod engine;
mod error;
pub mod frame;
mod stats;

pub use checks::{
    verify, verify_backpressure, verify_burst, verify_flood, CheckResult, DrainReport,
};
pub use config::{ScenarioConfig, ScenarioKind, BURST_PAUSE, CONSUMER_DELAY};
pub use engine::{run_scenario, ScenarioReport};
pub use error::{ScenarioError, ScenarioResult};
pub use frame::MessageDigest;
pub use stats::{ArcStatsSink, ScenarioStats, StatsSink};
