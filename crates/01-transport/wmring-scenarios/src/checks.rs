use crate::config::ScenarioKind;
use crate::engine::ScenarioReport;
use crate::frame::MessageDigest;
use crate::stats::ScenarioStats;

/// Borrowed view over what one scenario sent and received.
pub struct DrainReport<'a> {
    pub sent: &'a [MessageDigest],
    pub received: &'a [MessageDigest],
}

pub type CheckResult = Result<(), String>;

/// Dispatches to the check matching the report's scenario kind.
pub fn verify(report: &ScenarioReport, stats: &ScenarioStats) -> CheckResult {
    let drain = report.drain();
    match report.kind {
        ScenarioKind::Flood { messages } => verify_flood(&drain, stats, messages),
        ScenarioKind::Burst { bursts, burst_size } => {
            verify_burst(&drain, stats, bursts, burst_size)
        }
        ScenarioKind::Backpressure { messages } => verify_backpressure(&drain, stats, messages),
    }
}

pub fn verify_flood(
    drain: &DrainReport<'_>,
    stats: &ScenarioStats,
    expected_messages: u32,
) -> CheckResult {
    let expected = expected_messages as usize;
    if drain.sent.len() != expected {
        return Err(format!(
            "sent {} messages (expected {})",
            drain.sent.len(),
            expected
        ));
    }
    if drain.received.len() != expected {
        return Err(format!(
            "received {} messages (expected {})",
            drain.received.len(),
            expected
        ));
    }
    if let Some(idx) = drain
        .sent
        .iter()
        .zip(drain.received)
        .position(|(sent, received)| sent != received)
    {
        return Err(format!(
            "message {idx} diverged: sent {:?}, received {:?}",
            drain.sent[idx], drain.received[idx]
        ));
    }
    if let Some(idx) = drain
        .received
        .iter()
        .enumerate()
        .position(|(idx, digest)| digest.seq as usize != idx)
    {
        return Err(format!(
            "message {idx} arrived out of order (seq {})",
            drain.received[idx].seq
        ));
    }
    if stats.produced != expected as u64 || stats.consumed != expected as u64 {
        return Err(format!(
            "stats report {} produced / {} consumed (expected {})",
            stats.produced, stats.consumed, expected
        ));
    }
    if stats.bytes_produced != stats.bytes_consumed {
        return Err(format!(
            "stats report {} bytes produced but {} consumed",
            stats.bytes_produced, stats.bytes_consumed
        ));
    }
    if stats.producer_wraps != stats.consumer_wraps {
        return Err(format!(
            "producer wrapped {} times but consumer followed {} times",
            stats.producer_wraps, stats.consumer_wraps
        ));
    }
    Ok(())
}

pub fn verify_burst(
    drain: &DrainReport<'_>,
    stats: &ScenarioStats,
    bursts: u32,
    burst_size: u32,
) -> CheckResult {
    verify_flood(drain, stats, bursts.saturating_mul(burst_size))
}

pub fn verify_backpressure(
    drain: &DrainReport<'_>,
    stats: &ScenarioStats,
    expected_messages: u32,
) -> CheckResult {
    verify_flood(drain, stats, expected_messages)?;
    if stats.claim_failures == 0 {
        return Err(
            "backpressure scenario expected the producer to find the ring full, it never did"
                .into(),
        );
    }
    Ok(())
}
