//! Menstrual-cycle phase vs. attack occurrence.
//!
//! Each attack is placed in the complete cycle whose `[start, start + length)`
//! contains its local day, and classified by its zero-based offset `o` in a
//! cycle of length `L`:
//!
//! | Phase        | Rule (first match wins)                  |
//! |--------------|------------------------------------------|
//! | menstrual    | `o < flow span` (default 5 days)         |
//! | premenstrual | `o >= L - premenstrual_days` (saturating) |
//! | ovulatory    | `abs(o - L/2) <= ovulation_half_window`  |
//! | follicular   | `o < L/2`                                |
//! | luteal       | otherwise                                |
//!
//! Attacks outside every known cycle are counted separately and never enter
//! a percentage. Fewer than two complete cycles yields `None`.

use super::frequency::percentage;
use crate::calendar::Calendar;
use crate::types::{AttackRecord, MenstrualCycleSample};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Minimum complete cycles needed for an analysis.
pub const MIN_COMPLETE_CYCLES: usize = 2;

/// Attacks needed before the menstrual-migraine flag can be raised.
pub const MENSTRUAL_MIGRAINE_MIN_ATTACKS: u32 = 3;

/// Period correlation (%) at or above which the flag is raised.
pub const MENSTRUAL_MIGRAINE_THRESHOLD: f64 = 50.0;

/// Flow days further apart than this start a new period.
const MAX_FLOW_GAP_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstrual,
    Premenstrual,
    Follicular,
    Ovulatory,
    Luteal,
}

impl CyclePhase {
    /// Every phase in cycle order.
    pub const ALL: [CyclePhase; 5] = [
        CyclePhase::Menstrual,
        CyclePhase::Follicular,
        CyclePhase::Ovulatory,
        CyclePhase::Luteal,
        CyclePhase::Premenstrual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Menstrual => "menstrual",
            CyclePhase::Premenstrual => "premenstrual",
            CyclePhase::Follicular => "follicular",
            CyclePhase::Ovulatory => "ovulatory",
            CyclePhase::Luteal => "luteal",
        }
    }

    /// Position in [`CyclePhase::ALL`].
    fn slot(self) -> usize {
        match self {
            CyclePhase::Menstrual => 0,
            CyclePhase::Follicular => 1,
            CyclePhase::Ovulatory => 2,
            CyclePhase::Luteal => 3,
            CyclePhase::Premenstrual => 4,
        }
    }

    /// Menstrual or premenstrual.
    pub fn is_perimenstrual(&self) -> bool {
        matches!(self, CyclePhase::Menstrual | CyclePhase::Premenstrual)
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase window sizes in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindows {
    /// Menstrual span when the cycle has no flow data
    pub default_flow_days: u32,
    pub premenstrual_days: u32,
    pub ovulation_half_window_days: u32,
}

impl Default for PhaseWindows {
    fn default() -> Self {
        Self {
            default_flow_days: 5,
            premenstrual_days: 2,
            ovulation_half_window_days: 1,
        }
    }
}

/// Number of leading cycle days that count as menstrual.
///
/// Uses the last recorded flow day in the first half of the cycle; later
/// flow days are treated as spotting.
pub fn flow_span(cycle: &MenstrualCycleSample, windows: &PhaseWindows) -> u32 {
    let half = cycle.length_days as i64 / 2;
    cycle
        .flow_days
        .as_deref()
        .and_then(|days| {
            days.iter()
                .map(|d| (*d - cycle.start).num_days())
                .filter(|offset| (0..=half.max(0)).contains(offset))
                .max()
        })
        .map(|last| last as u32 + 1)
        .unwrap_or(windows.default_flow_days)
}

/// Classify a zero-based day offset in a cycle of `length` days.
pub fn classify_phase(offset: u32, length: u32, flow_span: u32, windows: &PhaseWindows) -> CyclePhase {
    let midpoint = length / 2;
    if offset < flow_span {
        CyclePhase::Menstrual
    } else if offset >= length.saturating_sub(windows.premenstrual_days) {
        CyclePhase::Premenstrual
    } else if offset.abs_diff(midpoint) <= windows.ovulation_half_window_days {
        CyclePhase::Ovulatory
    } else if offset < midpoint {
        CyclePhase::Follicular
    } else {
        CyclePhase::Luteal
    }
}

/// Attack count in one phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseCount {
    pub phase: CyclePhase,
    pub attacks: u32,
    /// Of `total_attacks_analyzed`
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleAnalysis {
    pub cycles_analyzed: u32,
    pub average_cycle_length: f64,
    /// Attacks inside a known cycle; the denominator for every percentage
    pub total_attacks_analyzed: u32,
    pub attacks_outside_cycles: u32,
    /// One entry per phase, in [`CyclePhase::ALL`] order
    pub phases: Vec<PhaseCount>,
    /// Menstrual plus premenstrual
    pub period_correlation_percentage: f64,
    pub premenstrual_correlation_percentage: f64,
    /// Heuristic, not a diagnosis
    pub is_menstrual_migraine: bool,
}

impl CycleAnalysis {
    pub fn count_of(&self, phase: CyclePhase) -> u32 {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| p.attacks)
            .unwrap_or(0)
    }
}

/// Map attacks onto cycle phases.
///
/// Returns `None` when fewer than two complete cycles are available.
pub fn analyze_cycle_correlation<'a>(
    samples: &[MenstrualCycleSample],
    attacks: impl IntoIterator<Item = &'a AttackRecord>,
    calendar: &Calendar,
    windows: &PhaseWindows,
) -> Option<CycleAnalysis> {
    let mut cycles: Vec<&MenstrualCycleSample> = samples.iter().filter(|c| c.is_complete()).collect();
    if cycles.len() < MIN_COMPLETE_CYCLES {
        tracing::debug!(
            complete_cycles = cycles.len(),
            "Not enough cycle data for correlation"
        );
        return None;
    }
    cycles.sort_by_key(|c| c.start);

    let spans: Vec<u32> = cycles.iter().map(|c| flow_span(c, windows)).collect();
    let mut counts = [0u32; 5];
    let mut analyzed = 0u32;
    let mut outside = 0u32;

    for attack in attacks {
        let day = calendar.day_of(attack.start_time);
        match enclosing_cycle(&cycles, day) {
            Some(idx) => {
                let cycle = cycles[idx];
                let offset = (day - cycle.start).num_days() as u32;
                let phase = classify_phase(offset, cycle.length_days, spans[idx], windows);
                counts[phase.slot()] += 1;
                analyzed += 1;
            }
            None => outside += 1,
        }
    }

    let phases: Vec<PhaseCount> = CyclePhase::ALL
        .iter()
        .zip(counts)
        .map(|(phase, attacks)| PhaseCount {
            phase: *phase,
            attacks,
            percentage: percentage(attacks, analyzed),
        })
        .collect();

    let perimenstrual: u32 = phases
        .iter()
        .filter(|p| p.phase.is_perimenstrual())
        .map(|p| p.attacks)
        .sum();
    let premenstrual = phases
        .iter()
        .find(|p| p.phase == CyclePhase::Premenstrual)
        .map(|p| p.attacks)
        .unwrap_or(0);
    let period_correlation_percentage = percentage(perimenstrual, analyzed);

    let total_length: u64 = cycles.iter().map(|c| u64::from(c.length_days)).sum();

    Some(CycleAnalysis {
        cycles_analyzed: cycles.len() as u32,
        average_cycle_length: total_length as f64 / cycles.len() as f64,
        total_attacks_analyzed: analyzed,
        attacks_outside_cycles: outside,
        phases,
        period_correlation_percentage,
        premenstrual_correlation_percentage: percentage(premenstrual, analyzed),
        is_menstrual_migraine: analyzed >= MENSTRUAL_MIGRAINE_MIN_ATTACKS
            && period_correlation_percentage >= MENSTRUAL_MIGRAINE_THRESHOLD,
    })
}

/// Index of the latest-starting cycle containing `day`. `cycles` is sorted by start.
fn enclosing_cycle(cycles: &[&MenstrualCycleSample], day: NaiveDate) -> Option<usize> {
    let after = cycles.partition_point(|c| c.start <= day);
    (0..after).rev().find(|&i| cycles[i].contains(day))
}

/// Group raw flow days into cycles.
///
/// A gap of more than two days between flow days starts a new period. Each
/// period's cycle runs until the next period starts; the trailing period has
/// no successor and comes back with `length_days == 0`.
pub fn cycles_from_flow_days(flow_days: &[NaiveDate]) -> Vec<MenstrualCycleSample> {
    let mut days = flow_days.to_vec();
    days.sort_unstable();
    days.dedup();

    let mut periods: Vec<Vec<NaiveDate>> = Vec::new();
    for day in days {
        let continues = periods
            .last()
            .and_then(|period| period.last())
            .is_some_and(|last| day - *last <= Duration::days(MAX_FLOW_GAP_DAYS));
        match periods.last_mut() {
            Some(period) if continues => period.push(day),
            _ => periods.push(vec![day]),
        }
    }

    let starts: Vec<NaiveDate> = periods.iter().filter_map(|p| p.first().copied()).collect();
    periods
        .into_iter()
        .zip(starts.iter().enumerate())
        .map(|(period, (i, start))| {
            let length_days = starts
                .get(i + 1)
                .map(|next| (*next - *start).num_days() as u32)
                .unwrap_or(0);
            MenstrualCycleSample {
                start: *start,
                length_days,
                flow_days: Some(period),
            }
        })
        .collect()
}
