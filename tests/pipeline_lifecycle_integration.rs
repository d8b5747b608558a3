//! Integration tests for pipeline lifecycle
//!
//! These tests validate the scheduler end to end with small test elements:
//! - Exactly-once delivery through a replicated stage
//! - Coordinated stop with items in flight
//! - Startup failure and cleanup guarantees

mod common;

use blink_input::pipeline::{ElementState, Pipeline, PipelineError, Stage};
use common::mock_helpers::{Collect, Counter, Relay, SlowOpen, Unavailable};
use common::test_timeout;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Tally {
    seen: Arc<Mutex<Vec<u64>>>,
    cleanups: Arc<AtomicUsize>,
}

impl Tally {
    fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            cleanups: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn collect(&self) -> impl FnMut(u16) -> Collect {
        let (seen, cleanups) = (self.seen.clone(), self.cleanups.clone());
        move |_| Collect {
            seen: seen.clone(),
            cleanups: cleanups.clone(),
        }
    }

    fn sorted(&self) -> Vec<u64> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort_unstable();
        seen
    }
}

fn relay_stage(
    name: &str,
    replicas: u16,
    delay: Option<Duration>,
    cleanups: &Arc<AtomicUsize>,
) -> Stage<Relay> {
    let cleanups = cleanups.clone();
    Stage::transform(name, replicas, 2, move |_| Relay {
        delay,
        cleanups: cleanups.clone(),
    })
}

/// counter -> relay x `replicas` -> collect
fn run_pool(items: u64, replicas: u16) -> (Vec<u64>, usize) {
    let tally = Tally::new();
    let relay_cleanups = Arc::new(AtomicUsize::new(0));

    let mut source = Stage::source("counter", Counter::finite(items));
    let mut relay = relay_stage("relay", replicas, None, &relay_cleanups);
    let sink = Stage::sink("collect", 1, 2, tally.collect());
    source.link(&relay).unwrap();
    relay.link(&sink).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add(source).unwrap().add(relay).unwrap().add(sink).unwrap();
    let mut handle = pipeline.start().unwrap();
    handle.wait_timeout(test_timeout()).unwrap();

    assert_eq!(tally.cleanups.load(Ordering::SeqCst), 1);
    (tally.sorted(), relay_cleanups.load(Ordering::SeqCst))
}

#[test]
fn test_pool_delivers_every_item_once() {
    for replicas in [1, 2, 4, 8] {
        let (seen, cleanups) = run_pool(200, replicas);
        assert_eq!(seen, (0..200).collect::<Vec<_>>(), "replicas = {}", replicas);
        assert_eq!(cleanups, replicas as usize);
    }
}

#[test]
fn test_pool_with_replicas_reports_per_replica_topology() {
    let tally = Tally::new();
    let cleanups = Arc::new(AtomicUsize::new(0));
    let mut source = Stage::source("counter", Counter::finite(10));
    let mut relay = relay_stage("relay", 3, None, &cleanups);
    let sink = Stage::sink("collect", 1, 2, tally.collect());
    source.link(&relay).unwrap();
    relay.link(&sink).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add(source).unwrap().add(relay).unwrap().add(sink).unwrap();
    let mut handle = pipeline.start().unwrap();

    let topology = handle.topology();
    assert_eq!(topology.stage("relay").map(|s| s.replicas), Some(3));
    assert_eq!(topology.instance_count(), 5);
    assert_eq!(topology.consumers_of("counter"), vec!["relay"]);

    handle.wait_timeout(test_timeout()).unwrap();
    assert_eq!(handle.stage_stats("relay").consumed, 10);
    assert_eq!(handle.stage_stats("collect").consumed, 10);
}

#[test]
fn test_stop_with_items_in_flight() {
    let tally = Tally::new();
    let relay_cleanups = Arc::new(AtomicUsize::new(0));

    let mut source = Stage::source("counter", Counter::endless());
    let mut relay = relay_stage("relay", 3, Some(Duration::from_millis(1)), &relay_cleanups);
    let sink = Stage::sink("collect", 1, 1, tally.collect());
    source.link(&relay).unwrap();
    relay.link(&sink).unwrap();

    let mut pipeline = Pipeline::new().with_stop_timeout(Some(test_timeout()));
    pipeline.add(source).unwrap().add(relay).unwrap().add(sink).unwrap();
    let mut handle = pipeline.start().unwrap();

    std::thread::sleep(Duration::from_millis(50));
    let stop = handle.stop_handle();
    assert!(stop.stop());
    assert!(!stop.stop());
    handle.stop().unwrap();

    assert!(handle.is_finished());
    assert!(handle
        .states()
        .iter()
        .all(|(_, state)| *state == ElementState::Stopped));
    assert!(handle.stats().iter().all(|(_, stats)| stats.cleanups == 1));
    assert_eq!(relay_cleanups.load(Ordering::SeqCst), 3);
    assert_eq!(tally.cleanups.load(Ordering::SeqCst), 1);

    // Nothing is duplicated, even when cut short.
    let seen = tally.sorted();
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_stop_from_another_thread() {
    let tally = Tally::new();
    let mut source = Stage::source("counter", Counter::endless());
    let sink = Stage::sink("collect", 1, 1, tally.collect());
    source.link(&sink).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add(source).unwrap().add(sink).unwrap();
    let mut handle = pipeline.start().unwrap();

    let stop = handle.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        stop.stop();
    });
    handle.wait();
    stopper.join().unwrap();

    assert!(handle.is_finished());
    assert_eq!(tally.cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_startup_failure_cleans_up_every_instance() {
    let tally = Tally::new();
    let relay_cleanups = Arc::new(AtomicUsize::new(0));

    let mut source = Stage::source("counter", Counter::endless());
    let mut relay = relay_stage("relay", 2, None, &relay_cleanups);
    let sink = Stage::sink("collect", 1, 1, tally.collect());
    let broken = Stage::sink("speaker", 1, 1, |_| Unavailable);
    source.link(&relay).unwrap();
    relay.link(&sink).unwrap().link(&broken).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(source)
        .unwrap()
        .add(relay)
        .unwrap()
        .add(sink)
        .unwrap()
        .add(broken)
        .unwrap();

    match pipeline.start() {
        Err(PipelineError::StartupFailure { element, .. }) => assert_eq!(element, "speaker"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("startup should fail"),
    }
    assert!(tally.sorted().is_empty());
    assert_eq!(relay_cleanups.load(Ordering::SeqCst), 2);
    assert_eq!(tally.cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_during_slow_prepare_aborts_startup() {
    let tally = Tally::new();
    let open_cleanups = Arc::new(AtomicUsize::new(0));

    let mut source = Stage::source("counter", Counter::endless());
    let sink = Stage::sink("collect", 1, 1, tally.collect());
    let cleanups = open_cleanups.clone();
    let device = Stage::sink("device", 1, 1, move |_| SlowOpen {
        delay: Duration::from_millis(300),
        cleanups: cleanups.clone(),
    });
    source.link(&sink).unwrap().link(&device).unwrap();

    let mut pipeline = Pipeline::new().with_stop_timeout(Some(test_timeout()));
    pipeline.add(source).unwrap().add(sink).unwrap().add(device).unwrap();

    // Requested before start returns, as an interrupt handler would.
    let stop = pipeline.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.stop();
    });

    assert!(matches!(
        pipeline.start(),
        Err(PipelineError::StartupInterrupted)
    ));
    stopper.join().unwrap();

    // Nothing ran, but every instance was cleaned up once its prepare returned.
    assert!(tally.sorted().is_empty());
    assert_eq!(tally.cleanups.load(Ordering::SeqCst), 1);
    assert_eq!(open_cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cycle_is_rejected_before_start() {
    let cleanups = Arc::new(AtomicUsize::new(0));
    let mut a = relay_stage("a", 1, None, &cleanups);
    let mut b = relay_stage("b", 1, None, &cleanups);
    a.link(&b).unwrap();
    b.link(&a).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add(a).unwrap().add(b).unwrap();
    assert!(matches!(
        pipeline.start(),
        Err(PipelineError::CycleDetected)
    ));
    // Nothing was launched, so nothing was cleaned up.
    assert_eq!(cleanups.load(Ordering::SeqCst), 0);
}

#[test]
fn test_empty_pipeline_is_rejected() {
    assert!(matches!(
        Pipeline::new().start(),
        Err(PipelineError::EmptyPipeline)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_pool_exactly_once(items in 0u64..300, replicas in 1u16..6) {
        let (seen, cleanups) = run_pool(items, replicas);
        prop_assert_eq!(seen, (0..items).collect::<Vec<_>>());
        prop_assert_eq!(cleanups, replicas as usize);
    }
}
