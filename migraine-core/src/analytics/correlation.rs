//! Treatment start vs. attack frequency.
//!
//! Compares distinct attack-days in a window before the first treatment of
//! a kind with the window after it. This is a paired-window comparison of
//! descriptive counts, not a significance test.
//!
//! Windows are counted in local calendar days relative to the treatment day
//! `T`:
//!
//! ```text
//!   before: T - before_days < day < T        (far boundary excluded)
//!   after:  T <= day < T + after_days        (treatment day counts as after)
//! ```
//!
//! With `before_days = 40` and a treatment on day 50, attacks on days 20
//! and 30 are "before" while an attack on day 10 falls on the excluded
//! boundary.

use super::clinical::{AverageIntensityPolicy, IntensityAverage};
use crate::calendar::Calendar;
use crate::types::{AttackRecord, HealthEvent, HealthEventType};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Treatment kinds that can be correlated with attacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentKind {
    Medication,
    TcmTreatment,
}

impl TreatmentKind {
    pub fn event_type(&self) -> HealthEventType {
        match self {
            TreatmentKind::Medication => HealthEventType::Medication,
            TreatmentKind::TcmTreatment => HealthEventType::TcmTreatment,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.event_type().as_str()
    }
}

impl std::str::FromStr for TreatmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<HealthEventType>()? {
            HealthEventType::Medication => Ok(TreatmentKind::Medication),
            HealthEventType::TcmTreatment => Ok(TreatmentKind::TcmTreatment),
            HealthEventType::Surgery => Err("surgery is not a correlatable treatment".to_string()),
        }
    }
}

/// Window sizes in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrelationWindows {
    pub before_days: u32,
    pub after_days: u32,
}

impl Default for CorrelationWindows {
    fn default() -> Self {
        Self {
            before_days: 30,
            after_days: 30,
        }
    }
}

/// Attack frequency before vs. after a treatment started.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationResult {
    pub treatment: TreatmentKind,
    pub treatment_start: DateTime<Utc>,
    pub treatment_day: NaiveDate,
    pub windows: CorrelationWindows,
    pub before_attack_days: u32,
    pub after_attack_days: u32,
    /// `after < before`
    pub has_improvement: bool,
    /// `max(0, before - after)`
    pub attack_days_reduction: u32,
    pub before_average_intensity: f64,
    pub after_average_intensity: f64,
    /// `before - after` average intensity; negative when pain worsened
    pub intensity_reduction: f64,
}

/// Earliest event of the treatment kind in `events`.
pub fn first_treatment<'a>(
    kind: TreatmentKind,
    events: impl IntoIterator<Item = &'a HealthEvent>,
) -> Option<&'a HealthEvent> {
    let event_type = kind.event_type();
    events
        .into_iter()
        .filter(|e| e.event_type() == event_type)
        .min_by_key(|e| e.event_date)
}

/// Compare attack-days around the first treatment of `kind`.
///
/// Returns `None` when the history holds no such treatment.
pub fn analyze_correlation<'a>(
    kind: TreatmentKind,
    windows: CorrelationWindows,
    attacks: impl IntoIterator<Item = &'a AttackRecord>,
    events: impl IntoIterator<Item = &'a HealthEvent>,
    calendar: &Calendar,
    policy: AverageIntensityPolicy,
) -> Option<CorrelationResult> {
    let treatment = first_treatment(kind, events)?;
    let treatment_day = calendar.day_of(treatment.event_date);
    let before_floor = treatment_day - Duration::days(windows.before_days as i64);
    let after_ceiling = treatment_day + Duration::days(windows.after_days as i64);

    let mut before_days: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut after_days: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut before_intensity = IntensityAverage::new(policy);
    let mut after_intensity = IntensityAverage::new(policy);

    for attack in attacks {
        let day = calendar.day_of(attack.start_time);
        if before_floor < day && day < treatment_day {
            before_days.insert(day);
            before_intensity.add(attack);
        } else if treatment_day <= day && day < after_ceiling {
            after_days.insert(day);
            after_intensity.add(attack);
        }
    }

    let before_attack_days = before_days.len() as u32;
    let after_attack_days = after_days.len() as u32;
    let before_average_intensity = before_intensity.value();
    let after_average_intensity = after_intensity.value();

    Some(CorrelationResult {
        treatment: kind,
        treatment_start: treatment.event_date,
        treatment_day,
        windows,
        before_attack_days,
        after_attack_days,
        has_improvement: after_attack_days < before_attack_days,
        attack_days_reduction: before_attack_days.saturating_sub(after_attack_days),
        before_average_intensity,
        after_average_intensity,
        intensity_reduction: before_average_intensity - after_average_intensity,
    })
}
