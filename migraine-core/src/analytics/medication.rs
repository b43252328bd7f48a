//! Medication usage: acute vs. daily/preventive populations.
//!
//! Every dose is assigned to exactly one population:
//!
//! | Dose | Resolved medication | Population |
//! |------|---------------------|------------|
//! | attack log | `is_acute = true` | acute |
//! | attack log | unresolved free text | acute |
//! | attack log | `is_acute = false` | preventive |
//! | medication event | any | preventive |
//!
//! Medication events are daily logging, so an acute-category drug logged
//! there still counts as preventive. MOH and the monthly breakdown read
//! attack logs only and must agree with the acute population.
//!
//! Percentages in category, name and efficacy breakdowns are relative to
//! the population's total uses.

use super::frequency::{Basis, Distribution, FrequencyAggregator};
use crate::calendar::Calendar;
use crate::types::{AttackRecord, DateRange, HealthEvent, MedicationLog};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

/// Category label for doses without a resolved medication.
pub const UNRESOLVED_CATEGORY: &str = "other";

/// Which population a dose belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    Acute,
    Preventive,
}

/// Where a medication log was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOrigin {
    Attack,
    MedicationEvent,
}

/// Assign a dose to its population.
pub fn classify(log: &MedicationLog, origin: LogOrigin) -> Population {
    match (origin, &log.medication) {
        (LogOrigin::MedicationEvent, _) => Population::Preventive,
        (LogOrigin::Attack, Some(med)) if !med.is_acute => Population::Preventive,
        (LogOrigin::Attack, _) => Population::Acute,
    }
}

/// Usage statistics for one population.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationUsage {
    pub population: Population,
    pub total_uses: u32,
    /// Distinct local days with at least one dose
    pub usage_days: u32,
    pub categories: Distribution,
    /// Top-N medications by use count
    pub top_medications: Distribution,
    pub efficacy: Distribution,
}

impl MedicationUsage {
    pub fn empty(population: Population) -> Self {
        Self {
            population,
            total_uses: 0,
            usage_days: 0,
            categories: Distribution::default(),
            top_medications: Distribution::default(),
            efficacy: Distribution::default(),
        }
    }
}

/// Acute and preventive usage side by side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationUsageReport {
    pub acute: MedicationUsage,
    pub preventive: MedicationUsage,
}

impl Default for MedicationUsageReport {
    fn default() -> Self {
        Self {
            acute: MedicationUsage::empty(Population::Acute),
            preventive: MedicationUsage::empty(Population::Preventive),
        }
    }
}

/// Accumulates one population's doses.
struct UsageAccumulator {
    population: Population,
    total_uses: u32,
    days: BTreeSet<NaiveDate>,
    categories: FrequencyAggregator,
    names: FrequencyAggregator,
    efficacy: FrequencyAggregator,
}

impl UsageAccumulator {
    fn new(population: Population) -> Self {
        Self {
            population,
            total_uses: 0,
            days: BTreeSet::new(),
            categories: FrequencyAggregator::new(),
            names: FrequencyAggregator::new(),
            efficacy: FrequencyAggregator::new(),
        }
    }

    fn record(&mut self, log: &MedicationLog, calendar: &Calendar) {
        self.total_uses += 1;
        self.days.insert(calendar.day_of(log.taken_at));
        let category = log
            .category()
            .map(|c| c.as_str())
            .unwrap_or(UNRESOLVED_CATEGORY);
        self.categories.observe_one(category);
        self.names.observe_one(log.display_name());
        self.efficacy.observe_one(log.efficacy.as_str());
    }

    fn finish(self, top_n: usize) -> MedicationUsage {
        MedicationUsage {
            population: self.population,
            total_uses: self.total_uses,
            usage_days: self.days.len() as u32,
            categories: self.categories.finish(Basis::Occurrences),
            top_medications: self.names.finish(Basis::Occurrences).truncated(top_n),
            efficacy: self.efficacy.finish(Basis::Occurrences),
        }
    }
}

/// Split doses from attacks and medication events into acute and
/// preventive populations and summarise each.
pub fn analyze_medication_usage<'a>(
    attacks: impl IntoIterator<Item = &'a AttackRecord>,
    events: impl IntoIterator<Item = &'a HealthEvent>,
    calendar: &Calendar,
    top_n: usize,
) -> MedicationUsageReport {
    let mut acute = UsageAccumulator::new(Population::Acute);
    let mut preventive = UsageAccumulator::new(Population::Preventive);

    let attack_logs = attacks
        .into_iter()
        .flat_map(|a| a.medication_logs.iter().map(|log| (log, LogOrigin::Attack)));
    let event_logs = events.into_iter().flat_map(|e| {
        e.medication_logs()
            .iter()
            .map(|log| (log, LogOrigin::MedicationEvent))
    });

    for (log, origin) in attack_logs.chain(event_logs) {
        match classify(log, origin) {
            Population::Acute => acute.record(log, calendar),
            Population::Preventive => preventive.record(log, calendar),
        }
    }

    MedicationUsageReport {
        acute: acute.finish(top_n),
        preventive: preventive.finish(top_n),
    }
}

// ============================================
// Adherence
// ============================================

/// How consistently daily medication was taken over a range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MedicationAdherence {
    /// Local days in the range
    pub total_days: u32,
    pub medication_days: u32,
    pub missed_days: u32,
    /// `medication_days / total_days` as a percentage
    pub adherence_rate: f64,
}

/// Adherence of the preventive population over `range`.
pub fn medication_adherence(
    preventive: &MedicationUsage,
    range: &DateRange,
    calendar: &Calendar,
) -> MedicationAdherence {
    let total_days = calendar.days_in(range);
    let medication_days = preventive.usage_days.min(total_days);
    MedicationAdherence {
        total_days,
        medication_days,
        missed_days: total_days - medication_days,
        adherence_rate: super::frequency::percentage(medication_days, total_days),
    }
}
