#![cfg(not(target_arch = "wasm32"))]

use parking_lot::Mutex;
use std::sync::Arc;
use wmring::{Backing, RingConfig};
use wmring_scenarios::{
    run_scenario, verify, verify_backpressure, verify_burst, verify_flood, ArcStatsSink,
    ScenarioConfig, ScenarioError, ScenarioStats, StatsSink,
};

fn sink() -> (Arc<Mutex<ScenarioStats>>, ArcStatsSink) {
    let stats = Arc::new(Mutex::new(ScenarioStats::default()));
    let sink = ArcStatsSink::new(Arc::clone(&stats));
    (stats, sink)
}

#[test]
fn flood_delivers_every_message_in_order() {
    const MESSAGES: u32 = 20_000;
    let (stats, sink) = sink();
    let config = ScenarioConfig::flood(MESSAGES)
        .with_ring(RingConfig::with_capacity(8 * 1024).backing(Backing::Heap))
        .with_lengths(1, 512)
        .with_seed(7);

    let report = run_scenario(&config, &sink).expect("flood run");
    let stats = *stats.lock();
    verify_flood(&report.drain(), &stats, MESSAGES).expect("flood checks");
    assert!(stats.producer_wraps > 0, "flood never wrapped: {stats:?}");
    assert!(!report.mapped);
}

#[test]
fn burst_pauses_between_batches() {
    const BURSTS: u32 = 20;
    const BURST_SIZE: u32 = 64;
    let (stats, sink) = sink();
    let config = ScenarioConfig::burst(BURSTS, BURST_SIZE)
        .with_ring(RingConfig::with_capacity(2048).backing(Backing::Heap))
        .with_lengths(4, 96);

    let report = run_scenario(&config, &sink).expect("burst run");
    let stats = *stats.lock();
    verify_burst(&report.drain(), &stats, BURSTS, BURST_SIZE).expect("burst checks");
    assert_eq!(report.received.len(), (BURSTS * BURST_SIZE) as usize);
}

#[test]
fn backpressure_fills_the_ring() {
    const MESSAGES: u32 = 2_000;
    let (stats, sink) = sink();
    let config = ScenarioConfig::backpressure(MESSAGES);

    let report = run_scenario(&config, &sink).expect("backpressure run");
    let stats = *stats.lock();
    verify_backpressure(&report.drain(), &stats, MESSAGES).expect("backpressure checks");
    assert!(stats.claim_failures > 0);
}

#[test]
fn mapped_ring_passes_the_generic_check() {
    let (_, sink) = sink();
    let config = ScenarioConfig::flood(5_000)
        .with_ring(RingConfig::with_capacity(4096).backing(Backing::Auto))
        .with_lengths(16, 128);

    let report = run_scenario(&config, &sink).expect("mapped run");
    verify(&report, &sink.snapshot()).expect("generic checks");
}

#[test]
fn tiny_frames_on_a_tiny_ring() {
    let (_, sink) = sink();
    let config = ScenarioConfig::flood(10_000)
        .with_ring(RingConfig::with_capacity(40).backing(Backing::Heap))
        .with_lengths(1, 12);

    let report = run_scenario(&config, &sink).expect("tiny run");
    verify(&report, &sink.snapshot()).expect("tiny checks");
}

#[test]
fn invalid_config_is_rejected_before_spawning() {
    let (stats, sink) = sink();
    let config = ScenarioConfig::flood(10)
        .with_ring(RingConfig::with_capacity(64).backing(Backing::Heap))
        .with_lengths(1, 200);

    assert!(matches!(
        run_scenario(&config, &sink),
        Err(ScenarioError::InvalidConfig(_))
    ));
    assert_eq!(*stats.lock(), ScenarioStats::default());
}
