//! Command-line driver for the watermark ring scenarios.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};
use wmring::Backing;
use wmring_scenarios::{
    run_scenario, verify, ArcStatsSink, ScenarioConfig, ScenarioKind, ScenarioReport,
    ScenarioStats, StatsSink,
};

const DEFAULT_MESSAGES: u32 = 100_000;
const DEFAULT_BURST_SIZE: u32 = 64;

/// Summary text printed after a run.
mod render {
    use wmring_scenarios::{ScenarioReport, ScenarioStats};

    pub fn summary(report: &ScenarioReport, stats: &ScenarioStats) -> String {
        let secs = report.elapsed.as_secs_f64();
        let mib_per_sec = if secs > 0.0 {
            stats.bytes_consumed as f64 / (1024.0 * 1024.0) / secs
        } else {
            0.0
        };
        format!(
            "{kind}: {received}/{sent} messages, {bytes} payload bytes in {elapsed:.3?} \
             ({mib_per_sec:.1} MiB/s)\n\
             claim failures={claims} empty polls={polls} wraps={wraps} backing={backing}",
            kind = report.kind.name(),
            received = report.received.len(),
            sent = report.sent.len(),
            bytes = stats.bytes_consumed,
            elapsed = report.elapsed,
            claims = stats.claim_failures,
            polls = stats.empty_polls,
            wraps = stats.producer_wraps,
            backing = if report.mapped { "mmap" } else { "heap" },
        )
    }
}

/// Drive a single-producer/single-consumer watermark ring.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run watermark ring scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scenario, verify what arrived and print a summary.
    Run(RunArgs),
}

/// Flags override values loaded from `--config`.
#[derive(clap::Args, Debug)]
struct RunArgs {
    /// JSON scenario configuration to start from.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Scenario to run (defaults to flood).
    #[arg(long, value_enum)]
    kind: Option<KindArg>,
    /// Ring capacity in bytes.
    #[arg(long)]
    capacity: Option<usize>,
    /// Total messages to send. Burst runs round up to whole bursts.
    #[arg(long)]
    messages: Option<u32>,
    /// Messages per burst.
    #[arg(long)]
    burst_size: Option<u32>,
    /// Smallest payload in bytes.
    #[arg(long)]
    min_len: Option<u32>,
    /// Largest payload in bytes.
    #[arg(long)]
    max_len: Option<u32>,
    /// Seed for payload lengths and contents.
    #[arg(long)]
    seed: Option<u64>,
    /// Memory backing the ring.
    #[arg(long, value_enum)]
    backing: Option<BackingArg>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Flood,
    Burst,
    Backpressure,
}

impl KindArg {
    fn of(kind: &ScenarioKind) -> Self {
        match kind {
            ScenarioKind::Flood { .. } => KindArg::Flood,
            ScenarioKind::Burst { .. } => KindArg::Burst,
            ScenarioKind::Backpressure { .. } => KindArg::Backpressure,
        }
    }

    fn default_config(self) -> ScenarioConfig {
        match self {
            KindArg::Flood => ScenarioConfig::flood(DEFAULT_MESSAGES),
            KindArg::Burst => ScenarioConfig::burst(
                DEFAULT_MESSAGES / DEFAULT_BURST_SIZE,
                DEFAULT_BURST_SIZE,
            ),
            KindArg::Backpressure => ScenarioConfig::backpressure(DEFAULT_MESSAGES / 10),
        }
    }

    fn scenario(self, messages: u32, burst_size: u32) -> ScenarioKind {
        match self {
            KindArg::Flood => ScenarioKind::Flood { messages },
            KindArg::Burst => ScenarioKind::Burst {
                bursts: messages.div_ceil(burst_size.max(1)),
                burst_size,
            },
            KindArg::Backpressure => ScenarioKind::Backpressure { messages },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackingArg {
    /// Anonymous mapping, falling back to the heap.
    Auto,
    Heap,
    Mmap,
}

impl From<BackingArg> for Backing {
    fn from(arg: BackingArg) -> Self {
        match arg {
            BackingArg::Auto => Backing::Auto,
            BackingArg::Heap => Backing::Heap,
            BackingArg::Mmap => Backing::Mmap,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let config = build_config(&args)?;
            let (report, stats) = execute(&config)?;
            println!("{}", render::summary(&report, &stats));
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn load_config(path: &Path) -> Result<ScenarioConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read config {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse config {path:?}"))
}

/// Resolves the file (if any) and the flags into one validated configuration.
fn build_config(args: &RunArgs) -> Result<ScenarioConfig> {
    let file = args.config.as_deref().map(load_config).transpose()?;
    let kind = args
        .kind
        .or_else(|| file.as_ref().map(|config| KindArg::of(&config.kind)))
        .unwrap_or(KindArg::Flood);
    let mut config = file.unwrap_or_else(|| kind.default_config());

    let messages = args
        .messages
        .unwrap_or_else(|| config.kind.total_messages());
    let burst_size = args
        .burst_size
        .or(match config.kind {
            ScenarioKind::Burst { burst_size, .. } => Some(burst_size),
            _ => None,
        })
        .unwrap_or(DEFAULT_BURST_SIZE);
    config.kind = kind.scenario(messages, burst_size);

    if let Some(capacity) = args.capacity {
        config.ring.capacity = capacity;
    }
    if let Some(backing) = args.backing {
        config.ring.backing = backing.into();
    }
    if let Some(min_len) = args.min_len {
        config.min_len = min_len;
    }
    if let Some(max_len) = args.max_len {
        config.max_len = max_len;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    config.validate().context("invalid scenario configuration")?;
    debug!("resolved configuration: {config:?}");
    Ok(config)
}

fn execute(config: &ScenarioConfig) -> Result<(ScenarioReport, ScenarioStats)> {
    let sink = ArcStatsSink::default();
    let report = run_scenario(config, &sink)
        .with_context(|| format!("{} scenario failed", config.kind.name()))?;
    let stats = sink.snapshot();

    verify(&report, &stats).map_err(|msg| anyhow!("verification failed: {msg}"))?;
    info!(
        "{} scenario verified: {} messages, {} bytes, {} claim failures",
        config.kind.name(),
        report.received.len(),
        stats.bytes_consumed,
        stats.claim_failures
    );
    Ok((report, stats))
}
