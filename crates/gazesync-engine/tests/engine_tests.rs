//! Tests for gazesync-engine: accumulator transitions, liveness, resolver

use gazesync_core::*;
use gazesync_engine::*;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

const TOL: f64 = 1e-9;

/// Deterministic clock for liveness and recency assertions.
struct ManualClock(AtomicI64);

impl ManualClock {
    fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(start_ms)))
    }

    fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn setup() -> (Accumulator, Arc<ManualClock>) {
    let clock = ManualClock::new(1_000_000);
    let accumulator = Accumulator::new(
        Arc::new(SectionCatalog::builtin()),
        MonitorConfig::default(),
        clock.clone(),
    );
    (accumulator, clock)
}

fn gaze(section: &str, page: &str, timestamp: i64) -> Envelope {
    Envelope::gaze(100.0, 100.0, timestamp, Some(section.into()), Some(page.into()))
}

// ===========================================================================
// Dwell accumulation
// ===========================================================================

#[test]
fn dwell_equals_sample_interval_times_count() {
    let (mut acc, _) = setup();
    for i in 0..37 {
        acc.apply(&gaze("fee-info", "productJoin", 1000 + i * 100));
    }
    let state = acc.section_state("productJoin", "fee-info").unwrap();
    assert!((state.dwell_secs - 3.7).abs() < TOL);
    assert!(state.viewed);
    assert_eq!(state.last_sample_at, Some(1000 + 36 * 100));
}

#[test]
fn dwell_is_monotonically_non_decreasing() {
    let (mut acc, _) = setup();
    let mut previous = 0.0;
    for i in 0..50 {
        acc.apply(&gaze("risk-warning", "productJoin", i));
        let dwell = acc
            .section_state("productJoin", "risk-warning")
            .unwrap()
            .dwell_secs;
        assert!(dwell >= previous);
        previous = dwell;
    }
}

#[test]
fn risk_warning_scenario_80_then_20_samples() {
    // 80 samples (8s) against a 10s requirement: 80%, incomplete
    let (mut acc, _) = setup();
    for i in 0..80 {
        acc.apply(&gaze("risk-warning", "productJoin", i * 100));
    }
    let progress = acc.section_progress("productJoin", "risk-warning").unwrap();
    assert!((progress - 80.0).abs() < TOL);
    assert_eq!(acc.section_completed("productJoin", "risk-warning"), Some(false));

    // 20 more (10s total) completes it; progress clamps at 100
    for i in 80..100 {
        acc.apply(&gaze("risk-warning", "productJoin", i * 100));
    }
    assert_eq!(acc.section_completed("productJoin", "risk-warning"), Some(true));
    assert!((acc.section_progress("productJoin", "risk-warning").unwrap() - 100.0).abs() < TOL);

    // Overshoot still clamps
    for i in 100..120 {
        acc.apply(&gaze("risk-warning", "productJoin", i * 100));
    }
    assert!((acc.section_progress("productJoin", "risk-warning").unwrap() - 100.0).abs() < TOL);
}

#[test]
fn completion_flips_at_the_exact_sample_boundary() {
    // 10s requirement at 0.1s per sample: sample 100 completes, not 101
    let (mut acc, _) = setup();
    for i in 0..99 {
        acc.apply(&gaze("risk-warning", "productJoin", i));
    }
    assert_eq!(acc.section_completed("productJoin", "risk-warning"), Some(false));

    acc.apply(&gaze("risk-warning", "productJoin", 99));
    assert_eq!(acc.section_completed("productJoin", "risk-warning"), Some(true));
    let state = acc.section_state("productJoin", "risk-warning").unwrap();
    assert_eq!(state.sample_count, 100);
    assert!((state.dwell_secs - 10.0).abs() < TOL);
}

#[test]
fn completion_latches_against_later_foreign_samples() {
    let (mut acc, _) = setup();
    for i in 0..100 {
        acc.apply(&gaze("risk-warning", "productJoin", i));
    }
    assert_eq!(acc.section_completed("productJoin", "risk-warning"), Some(true));
    let dwell_before = acc
        .section_state("productJoin", "risk-warning")
        .unwrap()
        .dwell_secs;

    for i in 100..200 {
        acc.apply(&gaze("fee-info", "productJoin", i));
    }
    let state = acc.section_state("productJoin", "risk-warning").unwrap();
    assert!(state.dwell_secs >= dwell_before);
    assert_eq!(acc.section_completed("productJoin", "risk-warning"), Some(true));
}

#[test]
fn viewed_flag_never_reverts() {
    let (mut acc, _) = setup();
    acc.apply(&gaze("fee-info", "productJoin", 1));
    assert!(acc.section_state("productJoin", "fee-info").unwrap().viewed);

    // Page re-entry does not reset anything
    acc.apply(&Envelope::page_change("productJoin", 2));
    let state = acc.section_state("productJoin", "fee-info").unwrap();
    assert!(state.viewed);
    assert!(state.dwell_secs > 0.0);
}

// ===========================================================================
// Page progress
// ===========================================================================

#[test]
fn page_progress_is_mean_of_clamped_sections() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::page_change("productJoin", 0));

    // risk-warning: 40 samples = 4s of 10s -> 40%
    for i in 0..40 {
        acc.apply(&gaze("risk-warning", "productJoin", i));
    }
    // fee-info: 100 samples = 10s of 8s -> clamped 100%
    for i in 0..100 {
        acc.apply(&gaze("fee-info", "productJoin", i));
    }
    // withdrawal-right untouched but instantiated -> 0%

    let expected = (40.0 + 100.0 + 0.0) / 3.0;
    assert!((acc.page_progress("productJoin") - expected).abs() < TOL);
}

#[test]
fn page_progress_stays_within_bounds() {
    let (mut acc, _) = setup();
    assert_eq!(acc.page_progress("productJoin"), 0.0);

    acc.apply(&Envelope::page_change("productJoin", 0));
    for i in 0..2000 {
        acc.apply(&gaze("risk-warning", "productJoin", i));
        let progress = acc.page_progress("productJoin");
        assert!((0.0..=100.0).contains(&progress));
    }
}

#[test]
fn untouched_page_has_zero_progress() {
    let (acc, _) = setup();
    assert_eq!(acc.page_progress("productComparison"), 0.0);
}

// ===========================================================================
// Page instantiation
// ===========================================================================

#[test]
fn page_change_instantiates_full_checklist_before_any_sample() {
    let (mut acc, _) = setup();
    assert!(acc.section_state("productDetail", "product-overview").is_none());

    acc.apply(&Envelope::page_change("productDetail", 1));

    for id in ["product-overview", "investment-strategy", "subscription-info"] {
        let state = acc.section_state("productDetail", id).unwrap();
        assert_eq!(state.dwell_secs, 0.0);
        assert!(!state.viewed);
        assert!(state.last_sample_at.is_none());
    }
    assert_eq!(acc.current_page(), Some("productDetail"));
    assert_eq!(acc.page_progress("productDetail"), 0.0);
}

#[test]
fn cross_page_scenario_leaves_other_pages_untouched() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::page_change("productDetail", 0));
    for i in 0..50 {
        acc.apply(&gaze("product-overview", "productDetail", 1 + i));
    }

    // 50 samples = 5s of 5s -> 100%, complete
    assert!((acc.section_progress("productDetail", "product-overview").unwrap() - 100.0).abs() < TOL);
    assert_eq!(acc.section_completed("productDetail", "product-overview"), Some(true));

    // productJoin never referenced: not instantiated, zero progress
    assert!(acc.section_state("productJoin", "risk-warning").is_none());
    assert_eq!(acc.page_progress("productJoin"), 0.0);
}

#[test]
fn snapshot_lists_only_instantiated_pages() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::page_change("productJoin", 0));
    acc.apply(&gaze("risk-warning", "productJoin", 1));

    let snapshot = acc.snapshot();
    assert_eq!(snapshot.pages.len(), 1);
    assert_eq!(snapshot.pages[0].id, "productJoin");
    assert_eq!(snapshot.pages[0].sections.len(), 3);
    assert_eq!(snapshot.last_active_section.as_deref(), Some("risk-warning"));
    let risk = &snapshot.pages[0].sections[0];
    assert_eq!(risk.id, "risk-warning");
    assert!(risk.viewed && !risk.completed);
}

// ===========================================================================
// Current-page authority and reordering
// ===========================================================================

#[test]
fn page_change_is_authoritative_over_stale_sample_tag() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::page_change("productDetail", 5000));

    // A reordered sample produced before the navigation: its page state
    // still accumulates, but it cannot undo the navigation
    acc.apply(&gaze("fee-info", "productJoin", 4900));
    assert_eq!(acc.current_page(), Some("productDetail"));
    let state = acc.section_state("productJoin", "fee-info").unwrap();
    assert!(state.dwell_secs > 0.0);
}

#[test]
fn newer_sample_tag_moves_current_page() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::page_change("productJoin", 1000));
    acc.apply(&gaze("product-overview", "productDetail", 2000));
    assert_eq!(acc.current_page(), Some("productDetail"));
}

#[test]
fn untagged_sample_attributes_to_current_page() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::page_change("productJoin", 0));
    acc.apply(&Envelope::GazeData(GazeData {
        x: 1.0,
        y: 1.0,
        timestamp: 10,
        section_id: Some("risk-warning".into()),
        current_page: None,
    }));
    assert!(acc.section_state("productJoin", "risk-warning").unwrap().dwell_secs > 0.0);
}

// ===========================================================================
// Drops and recency-only events
// ===========================================================================

#[test]
fn unknown_section_is_dropped_not_fatal() {
    let (mut acc, clock) = setup();
    clock.advance(500);
    acc.apply(&gaze("not-a-section", "productJoin", 1));

    // Recency still updated, nothing accumulated
    assert_eq!(acc.last_event_at(), clock.now_ms());
    assert!(acc.section_state("productJoin", "not-a-section").is_none());
    assert!(acc.last_active_section().is_none());
}

#[test]
fn unknown_page_change_is_dropped() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::page_change("not-a-page", 1));
    assert_eq!(acc.current_page(), None);
}

#[test]
fn null_section_sample_bumps_recency_only() {
    let (mut acc, clock) = setup();
    acc.apply(&Envelope::page_change("productJoin", 0));
    let progress_before = acc.page_progress("productJoin");

    clock.advance(700);
    acc.apply(&Envelope::GazeData(GazeData {
        x: 3.0,
        y: 4.0,
        timestamp: 100,
        section_id: None,
        current_page: Some("productJoin".into()),
    }));

    assert_eq!(acc.last_event_at(), clock.now_ms());
    assert_eq!(acc.page_progress("productJoin"), progress_before);
}

#[test]
fn untagged_sample_before_any_page_uses_owning_page_fallback() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::GazeData(GazeData {
        x: 1.0,
        y: 1.0,
        timestamp: 1,
        section_id: Some("risk-warning".into()),
        current_page: None,
    }));
    // Attributed to the section's catalog page without navigating
    assert!(acc.section_state("productJoin", "risk-warning").unwrap().dwell_secs > 0.0);
    assert_eq!(acc.current_page(), None);
}

#[test]
fn unknown_section_with_no_page_at_all_is_dropped() {
    let (mut acc, _) = setup();
    acc.apply(&Envelope::GazeData(GazeData {
        x: 1.0,
        y: 1.0,
        timestamp: 1,
        section_id: Some("not-a-section".into()),
        current_page: None,
    }));
    assert!(acc.last_active_section().is_none());
    assert!(acc.snapshot().pages.is_empty());
}

#[test]
fn client_count_and_error_events_bump_recency() {
    let (mut acc, clock) = setup();
    clock.advance(100);
    acc.apply(&Envelope::client_count(2, 1));
    assert_eq!(acc.last_event_at(), clock.now_ms());

    clock.advance(100);
    acc.apply(&Envelope::error("relay hiccup"));
    assert_eq!(acc.last_event_at(), clock.now_ms());
}

// ===========================================================================
// Liveness
// ===========================================================================

#[test]
fn inactivity_flips_on_tick_and_sample_flips_back() {
    let (mut acc, clock) = setup();
    let monitor = LivenessMonitor::new(&MonitorConfig::default(), clock.clone());

    acc.apply(&gaze("risk-warning", "productJoin", 1));
    assert!(monitor.evaluate(&mut acc));

    // 2.9s of silence: still active
    clock.advance(2900);
    assert!(monitor.evaluate(&mut acc));

    // Threshold met: inactive on the next tick
    clock.advance(100);
    assert!(!monitor.evaluate(&mut acc));
    assert!(!acc.subject_active());

    // The very next qualifying sample flips it back
    acc.apply(&gaze("risk-warning", "productJoin", 2));
    assert!(acc.subject_active());
    assert!(monitor.evaluate(&mut acc));
}

#[test]
fn threshold_is_tunable() {
    let clock = ManualClock::new(0);
    let config = MonitorConfig {
        inactivity_threshold_ms: 10_000,
        ..MonitorConfig::default()
    };
    let mut acc = Accumulator::new(
        Arc::new(SectionCatalog::builtin()),
        config.clone(),
        clock.clone(),
    );
    let monitor = LivenessMonitor::new(&config, clock.clone());

    acc.apply(&gaze("risk-warning", "productJoin", 1));
    clock.advance(5000);
    assert!(monitor.evaluate(&mut acc));
    clock.advance(5000);
    assert!(!monitor.evaluate(&mut acc));
}

#[test]
fn needs_attention_is_or_of_disconnect_and_inactivity() {
    let (mut acc, clock) = setup();
    let monitor = LivenessMonitor::new(&MonitorConfig::default(), clock.clone());

    acc.set_connection_status(ConnectionStatus::Connected);
    acc.apply(&gaze("risk-warning", "productJoin", 1));
    monitor.evaluate(&mut acc);
    assert!(!acc.needs_attention());

    // Disconnection surfaces even with recent activity
    acc.set_connection_status(ConnectionStatus::Disconnected);
    assert!(acc.needs_attention());

    // Reconnect with a stale subject still needs attention
    acc.set_connection_status(ConnectionStatus::Connected);
    clock.advance(4000);
    monitor.evaluate(&mut acc);
    assert!(acc.needs_attention());
}

#[test]
fn dwell_survives_reconnect() {
    let (mut acc, _) = setup();
    for i in 0..30 {
        acc.apply(&gaze("risk-warning", "productJoin", i));
    }
    let dwell = acc.section_state("productJoin", "risk-warning").unwrap().dwell_secs;

    acc.set_connection_status(ConnectionStatus::Disconnected);
    acc.set_connection_status(ConnectionStatus::Connected);

    assert_eq!(
        acc.section_state("productJoin", "risk-warning").unwrap().dwell_secs,
        dwell
    );
}

// ===========================================================================
// Resolver
// ===========================================================================

#[test]
fn layout_resolver_finds_enclosing_section() {
    let resolver = LayoutResolver::stacked(
        "productJoin",
        &["risk-warning", "fee-info", "withdrawal-right"],
        500.0,
        200.0,
    );
    assert_eq!(resolver.resolve("productJoin", 250.0, 50.0), Some("risk-warning"));
    assert_eq!(resolver.resolve("productJoin", 250.0, 350.0), Some("fee-info"));
    assert_eq!(resolver.resolve("productJoin", 250.0, 599.0), Some("withdrawal-right"));
}

#[test]
fn layout_resolver_miss_is_none() {
    let resolver = LayoutResolver::stacked("productJoin", &["risk-warning"], 500.0, 200.0);
    // Outside every band, and an unknown page
    assert_eq!(resolver.resolve("productJoin", 250.0, 900.0), None);
    assert_eq!(resolver.resolve("productJoin", 600.0, 50.0), None);
    assert_eq!(resolver.resolve("productDetail", 250.0, 50.0), None);
}

#[test]
fn layout_resolver_first_match_wins_on_overlap() {
    let resolver = LayoutResolver::new().with_page(
        "p",
        vec![
            SectionBounds { id: "a".into(), x: 0.0, y: 0.0, width: 100.0, height: 100.0 },
            SectionBounds { id: "b".into(), x: 50.0, y: 50.0, width: 100.0, height: 100.0 },
        ],
    );
    assert_eq!(resolver.resolve("p", 75.0, 75.0), Some("a"));
}
