//! Integration tests for the migraine-insight analytics engine
//!
//! These tests load the exported history in `tests/fixtures/history.json`
//! and drive the public API end to end: snapshot computation, MOH risk,
//! treatment and cycle correlation, and the background recompute scheduler.

use migraine_core::analytics::cycle::CyclePhase;
use migraine_core::analytics::filter::filter_in_range;
use migraine_core::analytics::{
    AnalyticsEngine, MohRiskLevel, PhaseWindows, SnapshotOptions, TreatmentKind,
};
use migraine_core::config::AnalyticsConfig;
use migraine_core::{
    Calendar, Config, DateRange, Error, HealthHistory, RecomputeRequest, RecomputeScheduler,
};
use chrono::{TimeZone, Utc};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load_history() -> HealthHistory {
    HealthHistory::load_json(&fixture_path("history.json")).expect("fixture should parse")
}

fn utc_engine(history: HealthHistory) -> AnalyticsEngine {
    AnalyticsEngine::new(
        AnalyticsConfig::default(),
        PhaseWindows::default(),
        Calendar::utc(),
        Arc::new(history),
    )
}

fn month(year: i32, month: u32) -> DateRange {
    Calendar::utc().month_range(year, month).unwrap()
}

// ============================================
// Snapshot Tests
// ============================================

#[test]
fn test_january_snapshot() {
    let engine = utc_engine(load_history());
    let snap = engine.compute(&month(2024, 1)).expect("compute should succeed");

    assert_eq!(snap.totals.attacks, 4);
    assert_eq!(snap.totals.attack_days, 4);
    assert_eq!(snap.totals.ongoing_attacks, 1);
    // The only surgery is in December
    assert_eq!(snap.totals.health_events, 0);

    // Ongoing attack excluded: 4h, 6h, 3h
    assert_eq!(snap.duration.completed_attacks, 3);
    assert!((snap.duration.average_hours - 13.0 / 3.0).abs() < 1e-9);
    assert!((snap.duration.shortest_hours - 3.0).abs() < 1e-9);
    assert!((snap.duration.longest_hours - 6.0).abs() < 1e-9);

    assert_eq!(snap.intensity.severe, 2);
    assert_eq!(snap.intensity.moderate, 1);
    assert_eq!(snap.intensity.unrated, 1);
    assert!((snap.intensity.average - 20.0 / 3.0).abs() < 1e-9);

    assert_eq!(snap.locations.entries[0].label, "left temple");
    assert_eq!(snap.locations.denominator, 4);
    assert!((snap.locations.percentage_sum() - 100.0).abs() < 0.1);
    assert_eq!(snap.locations.denominator_label("locations"), "of 4 locations");

    assert_eq!(snap.symptoms.denominator, 4);
    assert!((snap.symptoms.entries[0].percentage - 50.0).abs() < 1e-9);

    let acute = &snap.medication.acute;
    assert_eq!(acute.total_uses, 4);
    assert_eq!(acute.usage_days, 3);
    assert_eq!(acute.categories.count_of("triptan"), 2);
    assert_eq!(acute.categories.count_of("other"), 1);
    assert_eq!(acute.top_medications.entries[0].label, "Sumatriptan");
    assert!((acute.efficacy.percentage_sum() - 100.0).abs() < 0.1);
    assert_eq!(snap.medication.preventive.total_uses, 0);

    // All hours tie at one onset; the earliest wins
    assert_eq!(snap.time_patterns.peak_hour, Some(6));
    assert_eq!(snap.aura.attacks_with_aura, 1);
    assert!((snap.aura.percentage - 25.0).abs() < 1e-9);
    assert_eq!(snap.weather.high_risk_attacks, 1);

    assert_eq!(snap.monthly.len(), 1);
    assert_eq!(snap.monthly[0].acute_medication_days, 3);
}

#[test]
fn test_february_health_events() {
    let engine = utc_engine(load_history());
    let snap = engine.compute(&month(2024, 2)).unwrap();

    assert_eq!(snap.totals.attacks, 2);
    assert_eq!(snap.totals.health_events, 3);
    assert_eq!(snap.medication.preventive.total_uses, 2);
    assert_eq!(snap.medication.preventive.usage_days, 2);
    assert_eq!(snap.adherence.total_days, 29);
    assert_eq!(snap.adherence.missed_days, 27);
    assert_eq!(snap.treatments.tcm_treatments, 1);
    assert_eq!(snap.health_events.tcm.types.count_of("acupuncture"), 1);
    assert_eq!(snap.health_events.tcm.average_duration_minutes, Some(30.0));
    assert!(snap.health_events.surgeries.is_empty());
}

#[test]
fn test_snapshot_serializes_and_is_deterministic() {
    let history = load_history();
    let options = SnapshotOptions::default();
    let range = month(2024, 1);
    let first = migraine_core::analytics::snapshot::compute(
        &history.attacks,
        &history.health_events,
        &range,
        &Calendar::utc(),
        &options,
    );
    let second = migraine_core::analytics::snapshot::compute(
        &history.attacks,
        &history.health_events,
        &range,
        &Calendar::utc(),
        &options,
    );
    assert_eq!(first, second);

    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json["totals"]["attacks"], 4);
    assert_eq!(json["symptoms"]["basis"]["kind"], "population");
}

#[test]
fn test_filter_is_monotonic_over_fixture() {
    let history = load_history();
    let narrow = month(2024, 1);
    let wide = DateRange::new(narrow.start, month(2024, 2).end);

    let narrow_ids: Vec<&str> = filter_in_range(&history.attacks, &narrow)
        .into_iter()
        .map(|a| a.id.as_str())
        .collect();
    let wide_ids: Vec<&str> = filter_in_range(&history.attacks, &wide)
        .into_iter()
        .map(|a| a.id.as_str())
        .collect();

    assert_eq!(narrow_ids.len(), 4);
    assert_eq!(wide_ids.len(), 6);
    assert!(narrow_ids.iter().all(|id| wide_ids.contains(id)));
}

// ============================================
// Risk and Correlation Tests
// ============================================

#[test]
fn test_moh_over_two_months() {
    let history = load_history();
    let engine = utc_engine(history.clone());
    let period = DateRange::new(month(2024, 1).start, month(2024, 2).end);

    let assessment = engine.check_moh_risk(&period, &history.attacks);
    assert_eq!(assessment.months_spanned, 2);
    // 3 January days + 1 February day, averaged over 2 months
    assert_eq!(assessment.total_usage_days, 4);
    assert_eq!(assessment.display_days, 2);
    assert_eq!(assessment.risk_level, MohRiskLevel::None);
    assert!(assessment.limit_breaches.is_empty());
}

#[test]
fn test_preventive_medication_correlation() {
    let engine = utc_engine(load_history());
    let result = engine
        .analyze_correlation(TreatmentKind::Medication, 30, 30)
        .unwrap()
        .expect("propranolol start should be found");

    assert_eq!(result.treatment_day.to_string(), "2024-02-01");
    assert_eq!(result.before_attack_days, 4);
    assert_eq!(result.after_attack_days, 2);
    assert!(result.has_improvement);
    assert_eq!(result.attack_days_reduction, 2);
    assert!((result.before_average_intensity - 20.0 / 3.0).abs() < 1e-9);
    assert!((result.after_average_intensity - 3.5).abs() < 1e-9);
}

#[test]
fn test_tcm_correlation() {
    let engine = utc_engine(load_history());
    let result = engine
        .analyze_correlation(TreatmentKind::TcmTreatment, 30, 30)
        .unwrap()
        .unwrap();
    assert_eq!(result.before_attack_days, 3);
    assert_eq!(result.after_attack_days, 1);
}

#[test]
fn test_correlation_without_history_is_none() {
    let engine = utc_engine(HealthHistory::default());
    assert!(engine
        .analyze_correlation(TreatmentKind::TcmTreatment, 30, 30)
        .unwrap()
        .is_none());
}

#[test]
fn test_cycle_correlation_from_source() {
    let history = load_history();
    let engine = utc_engine(history.clone());
    let analysis = engine
        .analyze_cycles_from(&history)
        .unwrap()
        .expect("two complete cycles");

    assert_eq!(analysis.cycles_analyzed, 2);
    assert!((analysis.average_cycle_length - 28.0).abs() < 1e-9);
    assert_eq!(analysis.total_attacks_analyzed, 6);
    assert_eq!(analysis.attacks_outside_cycles, 0);
    assert_eq!(analysis.count_of(CyclePhase::Menstrual), 2);
    assert_eq!(analysis.count_of(CyclePhase::Follicular), 2);
    assert_eq!(analysis.count_of(CyclePhase::Luteal), 2);
    assert!(!analysis.is_menstrual_migraine);
}

#[test]
fn test_single_cycle_is_insufficient_data() {
    let mut history = load_history();
    history.cycle_samples.truncate(1);
    let engine = utc_engine(history.clone());
    assert!(engine.analyze_cycles_from(&history).unwrap().is_none());
}

// ============================================
// Configuration Tests
// ============================================

#[test]
fn test_engine_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[analytics]
top_medications = 1
utc_offset_minutes = 0

[cycle]
default_flow_days = 3
"#
    )
    .unwrap();

    let config = Config::load_from(file.path()).unwrap();
    let engine = AnalyticsEngine::from_config(&config, Arc::new(load_history())).unwrap();
    assert_eq!(engine.calendar().offset_minutes(), 0);

    let snap = engine.compute(&month(2024, 1)).unwrap();
    assert_eq!(snap.medication.acute.top_medications.entries.len(), 1);
}

#[test]
fn test_invalid_offset_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[analytics]\nutc_offset_minutes = 100000").unwrap();
    assert!(matches!(Config::load_from(file.path()), Err(Error::Config(_))));
}

// ============================================
// Scheduler Tests
// ============================================

#[tokio::test]
async fn test_scheduler_last_request_wins() {
    let history = load_history();
    let engine = utc_engine(HealthHistory::default());
    let scheduler = RecomputeScheduler::new(engine, Duration::from_millis(40)).unwrap();
    let mut updates = scheduler.subscribe();

    let request = |range: DateRange| {
        RecomputeRequest::new(history.attacks.clone(), history.health_events.clone(), range)
    };
    let all = DateRange::new(
        Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap(),
        month(2024, 2).end,
    );

    scheduler.schedule_recompute(request(month(2024, 1)));
    scheduler.schedule_recompute(request(month(2024, 2)));
    let last = scheduler.schedule_recompute(request(all));

    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .expect("scheduler should commit")
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let cached = scheduler.latest().unwrap();
    assert_eq!(cached.generation, last);
    assert_eq!(cached.snapshot.range, all);
    assert_eq!(cached.snapshot.totals.attacks, 6);
    assert_eq!(scheduler.stats().completed, 1);
}
