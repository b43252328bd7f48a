//! Analytics engine
//!
//! The entry point UI-layer callers hold. It owns the analytics settings,
//! the calendar and a handle to the record source; every analysis it runs
//! is a pure function of those plus the records passed in.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     ANALYTICS ENGINE                       │
//! │                                                            │
//! │   RecordSource ──► filter ──► snapshot stages ──► Snapshot │
//! │                                                            │
//! │   check_moh_risk ─────────────► MohAssessment              │
//! │   analyze_correlation ────────► Option<CorrelationResult>  │
//! │   analyze_cycle_correlation ──► Option<CycleAnalysis>      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use migraine_core::analytics::{AnalyticsEngine, TreatmentKind};
//!
//! let engine = AnalyticsEngine::from_config(&config, Arc::new(history))?;
//! let snapshot = engine.compute(&range)?;
//! let tcm = engine.analyze_correlation(TreatmentKind::TcmTreatment, 30, 30)?;
//! ```

use super::correlation::{self, CorrelationResult, CorrelationWindows, TreatmentKind};
use super::cycle::{self, CycleAnalysis, PhaseWindows};
use super::moh::{self, MohAssessment};
use super::snapshot::{self, AnalyticsSnapshot, CancellationSignal, SnapshotOptions};
use super::trends;
use crate::calendar::Calendar;
use crate::config::{AnalyticsConfig, Config};
use crate::error::Result;
use crate::types::{AttackRecord, CycleSource, DateRange, HealthEvent, MenstrualCycleSample, RecordSource};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;

/// Stateless analytics over an injected record source.
#[derive(Clone)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    phases: PhaseWindows,
    calendar: Calendar,
    options: SnapshotOptions,
    records: Arc<dyn RecordSource>,
}

impl std::fmt::Debug for AnalyticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsEngine")
            .field("config", &self.config)
            .field("phases", &self.phases)
            .field("calendar", &self.calendar)
            .finish_non_exhaustive()
    }
}

impl AnalyticsEngine {
    pub fn new(
        config: AnalyticsConfig,
        phases: PhaseWindows,
        calendar: Calendar,
        records: Arc<dyn RecordSource>,
    ) -> Self {
        let options = SnapshotOptions::from(&config);
        Self {
            config,
            phases,
            calendar,
            options,
            records,
        }
    }

    /// Build from loaded configuration, resolving the calendar.
    pub fn from_config(config: &Config, records: Arc<dyn RecordSource>) -> Result<Self> {
        config.analytics.validate()?;
        config.cycle.validate()?;
        let calendar = config.analytics.calendar()?;
        Ok(Self::new(
            config.analytics.clone(),
            config.cycle.phase_windows(),
            calendar,
            records,
        ))
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn options(&self) -> &SnapshotOptions {
        &self.options
    }

    pub fn records(&self) -> &Arc<dyn RecordSource> {
        &self.records
    }

    // ============================================
    // Snapshot
    // ============================================

    /// Snapshot over records already fetched by the caller.
    pub fn compute_records(
        &self,
        attacks: &[AttackRecord],
        events: &[HealthEvent],
        range: &DateRange,
    ) -> AnalyticsSnapshot {
        let start = Instant::now();
        tracing::debug!(
            attacks = attacks.len(),
            health_events = events.len(),
            "Computing analytics snapshot"
        );
        let snapshot = snapshot::compute(attacks, events, range, &self.calendar, &self.options);
        tracing::info!(
            attacks = snapshot.totals.attacks,
            health_events = snapshot.totals.health_events,
            duration_ms = start.elapsed().as_millis() as u64,
            "Analytics snapshot computed"
        );
        snapshot
    }

    /// Cancellable variant of [`compute_records`](Self::compute_records).
    pub fn compute_records_cancellable(
        &self,
        attacks: &[AttackRecord],
        events: &[HealthEvent],
        range: &DateRange,
        cancel: &dyn CancellationSignal,
    ) -> Result<AnalyticsSnapshot> {
        snapshot::compute_cancellable(attacks, events, range, &self.calendar, &self.options, cancel)
    }

    /// Snapshot over the record source's history.
    pub fn compute(&self, range: &DateRange) -> Result<AnalyticsSnapshot> {
        let attacks = self.records.attacks()?;
        let events = self.records.health_events()?;
        Ok(self.compute_records(&attacks, &events, range))
    }

    // ============================================
    // Risk and correlation
    // ============================================

    /// MOH risk from acute doses taken in `period`.
    pub fn check_moh_risk(&self, period: &DateRange, attacks: &[AttackRecord]) -> MohAssessment {
        moh::check_moh_risk(period, attacks, &self.calendar)
    }

    /// Attack-days around the first treatment of `kind` in the full history.
    ///
    /// `Ok(None)` when the history has no such treatment.
    pub fn analyze_correlation(
        &self,
        kind: TreatmentKind,
        before_days: u32,
        after_days: u32,
    ) -> Result<Option<CorrelationResult>> {
        let attacks = self.records.attacks()?;
        let events = self.records.health_events()?;
        let windows = CorrelationWindows {
            before_days,
            after_days,
        };
        let result = correlation::analyze_correlation(
            kind,
            windows,
            &attacks,
            &events,
            &self.calendar,
            self.config.average_intensity,
        );
        match &result {
            Some(r) => tracing::debug!(
                treatment = kind.as_str(),
                before = r.before_attack_days,
                after = r.after_attack_days,
                "Treatment correlation computed"
            ),
            None => tracing::debug!(treatment = kind.as_str(), "No treatment start found"),
        }
        Ok(result)
    }

    /// Correlation using the configured window sizes.
    pub fn analyze_correlation_default(&self, kind: TreatmentKind) -> Result<Option<CorrelationResult>> {
        let windows = self.config.correlation_windows();
        self.analyze_correlation(kind, windows.before_days, windows.after_days)
    }

    /// Map `attacks` onto the phases of `samples`.
    pub fn analyze_cycle_correlation(
        &self,
        samples: &[MenstrualCycleSample],
        attacks: &[AttackRecord],
    ) -> Option<CycleAnalysis> {
        cycle::analyze_cycle_correlation(samples, attacks, &self.calendar, &self.phases)
    }

    /// Cycle correlation with samples from `cycles` and attacks from the
    /// record source.
    pub fn analyze_cycles_from(&self, cycles: &dyn CycleSource) -> Result<Option<CycleAnalysis>> {
        let samples = cycles.cycle_samples()?;
        let attacks = self.records.attacks()?;
        Ok(self.analyze_cycle_correlation(&samples, &attacks))
    }

    /// Whole days since the last attack day on or before `today`.
    pub fn attack_free_streak(&self, today: NaiveDate) -> Result<Option<u32>> {
        let attacks = self.records.attacks()?;
        Ok(trends::attack_free_streak(&attacks, today, &self.calendar))
    }
}
