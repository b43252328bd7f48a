//! Batch analytics coordinator.
//!
//! Filters the record set once and runs every sub-analyzer over the
//! in-range subset, packaging the results into one immutable
//! [`AnalyticsSnapshot`]. The computation runs as a fixed sequence of
//! stages; the cancellable entry point checks its signal before each stage
//! and abandons the snapshot without returning partial results.
//!
//! | Stage | Produces |
//! |-------|----------|
//! | totals | counts, weather exposure |
//! | clinical | duration stats, intensity distribution |
//! | frequencies | locations, qualities, symptoms, triggers, aura |
//! | time patterns | circadian and weekday histograms |
//! | medication | acute/preventive usage, adherence |
//! | health events | TCM and surgery statistics |
//! | trends | monthly breakdown |

use super::clinical::{
    duration_stats, intensity_distribution, AverageIntensityPolicy, DurationStats,
    IntensityDistribution,
};
use super::filter::FilteredRecords;
use super::frequency::{aggregate, percentage, Basis, Distribution, FrequencyAggregator};
use super::medication::{analyze_medication_usage, medication_adherence, MedicationAdherence, MedicationUsageReport};
use super::trends::{monthly_breakdown, MonthlyStats};
use crate::calendar::Calendar;
use crate::config::AnalyticsConfig;
use crate::error::{Error, Result};
use crate::types::{AttackRecord, DateRange, HealthEvent, HealthEventPayload};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

/// Tuning knobs for a snapshot computation.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOptions {
    pub top_medications: usize,
    pub intensity_policy: AverageIntensityPolicy,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            top_medications: 5,
            intensity_policy: AverageIntensityPolicy::default(),
        }
    }
}

impl From<&AnalyticsConfig> for SnapshotOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            top_medications: config.top_medications,
            intensity_policy: config.average_intensity,
        }
    }
}

/// Cooperative cancellation check, polled between stages.
pub trait CancellationSignal {
    fn is_cancelled(&self) -> bool;
}

impl<F> CancellationSignal for F
where
    F: Fn() -> bool,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

// ============================================
// Snapshot parts
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub attacks: u32,
    /// Distinct local days with an attack onset
    pub attack_days: u32,
    pub ongoing_attacks: u32,
    pub health_events: u32,
}

/// Attack onsets by local hour and weekday.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimePatterns {
    pub hourly: [u32; 24],
    /// 0 = Sunday
    pub weekday: [u32; 7],
    /// Earliest hour with the most onsets; `None` without attacks
    pub peak_hour: Option<u8>,
    pub busiest_weekday: Option<u8>,
}

impl Default for TimePatterns {
    fn default() -> Self {
        Self {
            hourly: [0; 24],
            weekday: [0; 7],
            peak_hour: None,
            busiest_weekday: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuraStats {
    pub attacks_with_aura: u32,
    /// Of all attacks
    pub percentage: f64,
    /// Prevalence among attacks with aura
    pub types: Distribution,
    pub average_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherExposure {
    pub attacks_with_weather: u32,
    pub high_risk_attacks: u32,
    /// Of attacks with weather data
    pub high_risk_percentage: f64,
}

/// Dose and treatment counts across event kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TreatmentSummary {
    pub acute_doses: u32,
    pub acute_days: u32,
    pub preventive_doses: u32,
    pub preventive_days: u32,
    pub tcm_treatments: u32,
    pub surgeries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurgeryRecord {
    pub name: Option<String>,
    pub date: DateTime<Utc>,
    pub hospital: Option<String>,
    pub doctor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TcmStats {
    pub treatments: u32,
    /// Of treatments with a recorded type
    pub types: Distribution,
    pub average_duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthEventStats {
    pub medication_events: u32,
    pub tcm: TcmStats,
    /// Newest first
    pub surgeries: Vec<SurgeryRecord>,
}

/// Every statistic for one date range.
///
/// Two computations over identical input compare equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub range: DateRange,
    pub totals: Totals,
    pub duration: DurationStats,
    pub intensity: IntensityDistribution,
    /// Of location occurrences
    pub locations: Distribution,
    /// Of quality occurrences
    pub qualities: Distribution,
    /// Prevalence among all attacks
    pub symptoms: Distribution,
    /// Of trigger occurrences
    pub triggers: Distribution,
    pub trigger_categories: Distribution,
    pub time_patterns: TimePatterns,
    pub aura: AuraStats,
    pub weather: WeatherExposure,
    pub medication: MedicationUsageReport,
    pub treatments: TreatmentSummary,
    pub adherence: MedicationAdherence,
    pub health_events: HealthEventStats,
    pub monthly: Vec<MonthlyStats>,
}

impl AnalyticsSnapshot {
    /// Zero-valued snapshot for `range`.
    pub fn empty(range: DateRange) -> Self {
        Self {
            range,
            totals: Totals::default(),
            duration: DurationStats::default(),
            intensity: IntensityDistribution::default(),
            locations: Distribution::default(),
            qualities: Distribution::default(),
            symptoms: Distribution::default(),
            triggers: Distribution::default(),
            trigger_categories: Distribution::default(),
            time_patterns: TimePatterns::default(),
            aura: AuraStats::default(),
            weather: WeatherExposure::default(),
            medication: MedicationUsageReport::default(),
            treatments: TreatmentSummary::default(),
            adherence: MedicationAdherence::default(),
            health_events: HealthEventStats::default(),
            monthly: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.totals.attacks == 0 && self.totals.health_events == 0
    }
}

// ============================================
// Coordinator
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Totals,
    Clinical,
    Frequencies,
    TimePatterns,
    Medication,
    HealthEvents,
    Trends,
}

impl Stage {
    const ALL: [Stage; 7] = [
        Stage::Totals,
        Stage::Clinical,
        Stage::Frequencies,
        Stage::TimePatterns,
        Stage::Medication,
        Stage::HealthEvents,
        Stage::Trends,
    ];
}

struct SnapshotBuilder<'r, 'c> {
    records: FilteredRecords<'r>,
    calendar: &'c Calendar,
    options: &'c SnapshotOptions,
    snapshot: AnalyticsSnapshot,
}

impl<'r, 'c> SnapshotBuilder<'r, 'c> {
    fn new(
        attacks: &'r [AttackRecord],
        events: &'r [HealthEvent],
        range: &DateRange,
        calendar: &'c Calendar,
        options: &'c SnapshotOptions,
    ) -> Self {
        Self {
            records: FilteredRecords::select(attacks, events, range),
            calendar,
            options,
            snapshot: AnalyticsSnapshot::empty(*range),
        }
    }

    fn run(&mut self, stage: Stage) {
        match stage {
            Stage::Totals => self.totals(),
            Stage::Clinical => self.clinical(),
            Stage::Frequencies => self.frequencies(),
            Stage::TimePatterns => self.time_patterns(),
            Stage::Medication => self.medication(),
            Stage::HealthEvents => self.health_events(),
            Stage::Trends => self.trends(),
        }
    }

    fn attacks(&self) -> impl Iterator<Item = &'r AttackRecord> + '_ {
        self.records.attacks.iter().copied()
    }

    fn totals(&mut self) {
        let attack_days: BTreeSet<NaiveDate> = self
            .attacks()
            .map(|a| self.calendar.day_of(a.start_time))
            .collect();
        self.snapshot.totals = Totals {
            attacks: self.records.attacks.len() as u32,
            attack_days: attack_days.len() as u32,
            ongoing_attacks: self.attacks().filter(|a| a.is_ongoing()).count() as u32,
            health_events: self.records.events.len() as u32,
        };

        let mut weather = WeatherExposure::default();
        for snapshot in self.attacks().filter_map(|a| a.weather.as_ref()) {
            weather.attacks_with_weather += 1;
            if snapshot.is_high_risk() {
                weather.high_risk_attacks += 1;
            }
        }
        weather.high_risk_percentage = percentage(weather.high_risk_attacks, weather.attacks_with_weather);
        self.snapshot.weather = weather;
    }

    fn clinical(&mut self) {
        self.snapshot.duration = duration_stats(self.attacks());
        self.snapshot.intensity = intensity_distribution(self.attacks(), self.options.intensity_policy);
    }

    fn frequencies(&mut self) {
        let total = self.records.attacks.len() as u32;
        self.snapshot.locations = aggregate(
            self.attacks(),
            |a| a.pain_locations.iter().map(String::as_str),
            Basis::Occurrences,
        );
        self.snapshot.qualities = aggregate(
            self.attacks(),
            |a| a.pain_qualities.iter().map(String::as_str),
            Basis::Occurrences,
        );
        self.snapshot.symptoms = aggregate(
            self.attacks(),
            |a| a.symptoms.iter().map(|s| s.name.as_str()),
            Basis::Population(total),
        );
        self.snapshot.triggers = aggregate(
            self.attacks(),
            |a| a.triggers.iter().map(|t| t.name.as_str()),
            Basis::Occurrences,
        );
        self.snapshot.trigger_categories = aggregate(
            self.attacks(),
            |a| a.triggers.iter().map(|t| t.category.as_str()),
            Basis::Occurrences,
        );

        let mut aura_types = FrequencyAggregator::new();
        let mut aura_secs = 0.0;
        let mut aura_timed = 0u32;
        for attack in self.attacks().filter(|a| a.has_aura) {
            aura_types.observe(attack.aura_types.iter().map(String::as_str));
            if let Some(secs) = attack.aura_duration_secs.filter(|s| *s > 0.0) {
                aura_secs += secs;
                aura_timed += 1;
            }
        }
        let with_aura = aura_types.records();
        self.snapshot.aura = AuraStats {
            attacks_with_aura: with_aura,
            percentage: percentage(with_aura, total),
            types: aura_types.finish(Basis::Population(with_aura)),
            average_duration_minutes: (aura_timed > 0).then(|| aura_secs / aura_timed as f64 / 60.0),
        };
    }

    fn time_patterns(&mut self) {
        let mut patterns = TimePatterns::default();
        for attack in self.records.attacks.iter() {
            patterns.hourly[self.calendar.hour_of(attack.start_time) as usize] += 1;
            patterns.weekday[self.calendar.weekday_of(attack.start_time) as usize] += 1;
        }
        patterns.peak_hour = busiest_slot(&patterns.hourly);
        patterns.busiest_weekday = busiest_slot(&patterns.weekday);
        self.snapshot.time_patterns = patterns;
    }

    fn medication(&mut self) {
        let report = analyze_medication_usage(
            self.attacks(),
            self.records.events.iter().copied(),
            self.calendar,
            self.options.top_medications,
        );
        self.snapshot.adherence = medication_adherence(&report.preventive, &self.snapshot.range, self.calendar);
        self.snapshot.treatments.acute_doses = report.acute.total_uses;
        self.snapshot.treatments.acute_days = report.acute.usage_days;
        self.snapshot.treatments.preventive_doses = report.preventive.total_uses;
        self.snapshot.treatments.preventive_days = report.preventive.usage_days;
        self.snapshot.medication = report;
    }

    fn health_events(&mut self) {
        let mut stats = HealthEventStats::default();
        let mut tcm_types = FrequencyAggregator::new();
        let mut tcm_secs = 0.0;
        let mut tcm_timed = 0u32;

        for event in self.records.events.iter() {
            match &event.payload {
                HealthEventPayload::Medication { .. } => stats.medication_events += 1,
                HealthEventPayload::TcmTreatment {
                    treatment_type,
                    duration_secs,
                } => {
                    stats.tcm.treatments += 1;
                    if let Some(kind) = treatment_type.as_deref().filter(|t| !t.is_empty()) {
                        tcm_types.observe_one(kind);
                    }
                    if let Some(secs) = duration_secs.filter(|s| *s > 0.0) {
                        tcm_secs += secs;
                        tcm_timed += 1;
                    }
                }
                HealthEventPayload::Surgery {
                    name,
                    hospital,
                    doctor,
                } => stats.surgeries.push(SurgeryRecord {
                    name: name.clone(),
                    date: event.event_date,
                    hospital: hospital.clone(),
                    doctor: doctor.clone(),
                }),
            }
        }

        stats.tcm.types = tcm_types.finish(Basis::Occurrences);
        stats.tcm.average_duration_minutes = (tcm_timed > 0).then(|| tcm_secs / tcm_timed as f64 / 60.0);
        stats.surgeries.sort_by(|a, b| b.date.cmp(&a.date));

        self.snapshot.treatments.tcm_treatments = stats.tcm.treatments;
        self.snapshot.treatments.surgeries = stats.surgeries.len() as u32;
        self.snapshot.health_events = stats;
    }

    fn trends(&mut self) {
        self.snapshot.monthly = monthly_breakdown(
            self.attacks(),
            &self.snapshot.range,
            self.calendar,
            self.options.intensity_policy,
        );
    }

    fn finish(self) -> AnalyticsSnapshot {
        self.snapshot
    }
}

/// Index of the largest count, earliest on ties; `None` when all are zero.
fn busiest_slot(counts: &[u32]) -> Option<u8> {
    let max = counts.iter().copied().max().filter(|m| *m > 0)?;
    counts.iter().position(|c| *c == max).map(|i| i as u8)
}

/// Compute a snapshot over the records in `range`.
pub fn compute(
    attacks: &[AttackRecord],
    events: &[HealthEvent],
    range: &DateRange,
    calendar: &Calendar,
    options: &SnapshotOptions,
) -> AnalyticsSnapshot {
    let mut builder = SnapshotBuilder::new(attacks, events, range, calendar, options);
    for stage in Stage::ALL {
        builder.run(stage);
    }
    builder.finish()
}

/// Like [`compute`], but checks `cancel` before every stage.
///
/// Returns [`Error::Cancelled`] as soon as the signal fires; no partial
/// snapshot escapes.
pub fn compute_cancellable(
    attacks: &[AttackRecord],
    events: &[HealthEvent],
    range: &DateRange,
    calendar: &Calendar,
    options: &SnapshotOptions,
    cancel: &dyn CancellationSignal,
) -> Result<AnalyticsSnapshot> {
    let mut builder = SnapshotBuilder::new(attacks, events, range, calendar, options);
    for stage in Stage::ALL {
        if cancel.is_cancelled() {
            tracing::debug!(?stage, "Snapshot computation cancelled");
            return Err(Error::Cancelled);
        }
        builder.run(stage);
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Medication, MedicationCategory, MedicationEfficacy, MedicationLog, PressureTrend, Symptom,
        Trigger, WeatherSnapshot,
    };
    use chrono::{Duration, TimeZone};
    use std::cell::Cell;

    fn ts(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    fn march() -> DateRange {
        Calendar::utc().month_range(2024, 3).unwrap()
    }

    fn make_attack(id: &str, d: u32, h: u32) -> AttackRecord {
        let mut attack = AttackRecord::new(id, ts(d, h));
        attack.end_time = Some(ts(d, h) + Duration::hours(4));
        attack.pain_intensity = 6;
        attack.pain_locations = vec!["left temple".to_string()];
        attack
    }

    fn dose(name: &str, taken_at: DateTime<Utc>) -> MedicationLog {
        MedicationLog {
            medication: Some(Medication {
                id: name.to_lowercase(),
                name: name.to_string(),
                category: MedicationCategory::Nsaid,
                is_acute: true,
                monthly_limit: None,
            }),
            medication_name: None,
            dosage: 400.0,
            unit: "mg".to_string(),
            taken_at,
            efficacy: MedicationEfficacy::Partial,
        }
    }

    fn sample_history() -> (Vec<AttackRecord>, Vec<HealthEvent>) {
        let mut first = make_attack("a1", 4, 7);
        first.has_aura = true;
        first.aura_types = vec!["visual".to_string()];
        first.aura_duration_secs = Some(1200.0);
        first.symptoms = vec![
            Symptom {
                name: "nausea".to_string(),
                severity: 5,
            },
            Symptom {
                name: "photophobia".to_string(),
                severity: 7,
            },
        ];
        first.triggers = vec![Trigger {
            name: "poor sleep".to_string(),
            category: "lifestyle".to_string(),
            confidence: 0.8,
            timestamp: ts(3, 23),
        }];
        first.medication_logs = vec![dose("Ibuprofen", ts(4, 8))];
        first.weather = Some(WeatherSnapshot {
            temperature_c: 12.0,
            humidity: 85.0,
            pressure_hpa: 1002.0,
            pressure_trend: PressureTrend::Falling,
            condition: None,
        });

        let mut second = make_attack("a2", 11, 7);
        second.symptoms = vec![Symptom {
            name: "nausea".to_string(),
            severity: 3,
        }];
        second.pain_locations = vec!["left temple".to_string(), "neck".to_string()];

        let mut ongoing = make_attack("a3", 20, 22);
        ongoing.end_time = None;
        ongoing.pain_intensity = 0;

        // Outside the range
        let mut outside = make_attack("a4", 1, 7);
        outside.start_time = outside.start_time - Duration::days(40);
        outside.end_time = None;

        let events = vec![
            HealthEvent {
                id: "e1".to_string(),
                event_date: ts(5, 10),
                payload: HealthEventPayload::TcmTreatment {
                    treatment_type: Some("acupuncture".to_string()),
                    duration_secs: Some(1800.0),
                },
            },
            HealthEvent {
                id: "e2".to_string(),
                event_date: ts(2, 9),
                payload: HealthEventPayload::Surgery {
                    name: Some("Nerve decompression".to_string()),
                    hospital: None,
                    doctor: None,
                },
            },
            HealthEvent {
                id: "e3".to_string(),
                event_date: ts(15, 9),
                payload: HealthEventPayload::Surgery {
                    name: Some("Botox injection".to_string()),
                    hospital: Some("City Hospital".to_string()),
                    doctor: None,
                },
            },
        ];
        (vec![first, second, ongoing, outside], events)
    }

    #[test]
    fn test_compute_packages_every_view() {
        let (attacks, events) = sample_history();
        let snap = compute(&attacks, &events, &march(), &Calendar::utc(), &SnapshotOptions::default());

        assert_eq!(snap.totals.attacks, 3);
        assert_eq!(snap.totals.attack_days, 3);
        assert_eq!(snap.totals.ongoing_attacks, 1);
        assert_eq!(snap.totals.health_events, 3);

        assert_eq!(snap.duration.completed_attacks, 2);
        assert!((snap.duration.average_hours - 4.0).abs() < 1e-9);
        assert_eq!(snap.intensity.moderate, 2);
        assert_eq!(snap.intensity.unrated, 1);

        assert_eq!(snap.locations.count_of("left temple"), 3);
        assert_eq!(snap.locations.denominator, 4);
        assert!((snap.locations.percentage_sum() - 100.0).abs() < 0.1);
        assert_eq!(snap.symptoms.denominator, 3);
        assert_eq!(snap.symptoms.count_of("nausea"), 2);
        assert_eq!(snap.trigger_categories.count_of("lifestyle"), 1);

        assert_eq!(snap.time_patterns.peak_hour, Some(7));
        assert_eq!(snap.time_patterns.hourly[22], 1);

        assert_eq!(snap.aura.attacks_with_aura, 1);
        assert_eq!(snap.aura.average_duration_minutes, Some(20.0));

        assert_eq!(snap.weather.attacks_with_weather, 1);
        assert_eq!(snap.weather.high_risk_attacks, 1);

        assert_eq!(snap.treatments.acute_doses, 1);
        assert_eq!(snap.treatments.acute_days, 1);
        assert_eq!(snap.treatments.tcm_treatments, 1);
        assert_eq!(snap.treatments.surgeries, 2);
        assert_eq!(snap.health_events.tcm.average_duration_minutes, Some(30.0));
        assert_eq!(
            snap.health_events.surgeries[0].name.as_deref(),
            Some("Botox injection")
        );

        assert_eq!(snap.adherence.total_days, 31);
        assert_eq!(snap.monthly.len(), 1);
        assert_eq!(snap.monthly[0].attacks, 3);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let (attacks, events) = sample_history();
        let opts = SnapshotOptions::default();
        let cal = Calendar::utc();
        let first = compute(&attacks, &events, &march(), &cal, &opts);
        let second = compute(&attacks, &events, &march(), &cal, &opts);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_empty_and_inverted_ranges() {
        let (attacks, events) = sample_history();
        let cal = Calendar::utc();
        let inverted = DateRange::new(march().end, march().start);
        let snap = compute(&attacks, &events, &inverted, &cal, &SnapshotOptions::default());
        assert!(snap.is_empty());
        assert_eq!(snap.duration.average_hours, 0.0);
        assert!(snap.locations.is_empty());
        assert_eq!(snap.time_patterns.peak_hour, None);
        assert!(snap.monthly.is_empty());

        let nothing = compute(&[], &[], &march(), &cal, &SnapshotOptions::default());
        assert!(nothing.is_empty());
        assert_eq!(nothing.monthly.len(), 1);
    }

    #[test]
    fn test_cancellation_between_stages() {
        let (attacks, events) = sample_history();
        let polls = Cell::new(0);
        let cancel = || {
            polls.set(polls.get() + 1);
            polls.get() > 3
        };
        let result = compute_cancellable(
            &attacks,
            &events,
            &march(),
            &Calendar::utc(),
            &SnapshotOptions::default(),
            &cancel,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(polls.get(), 4);

        let never = || false;
        let done = compute_cancellable(
            &attacks,
            &events,
            &march(),
            &Calendar::utc(),
            &SnapshotOptions::default(),
            &never,
        )
        .unwrap();
        assert_eq!(done, compute(&attacks, &events, &march(), &Calendar::utc(), &SnapshotOptions::default()));
    }
}
