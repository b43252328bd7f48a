//! Month-by-month trends and attack-free streaks.

use super::clinical::{AverageIntensityPolicy, IntensityAverage};
use super::medication::{classify, LogOrigin, Population};
use crate::calendar::{Calendar, MonthKey};
use crate::types::{AttackRecord, DateRange};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Headache burden by attack-days per month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabilityLevel {
    /// 0-4 attack days
    #[default]
    Minimal,
    /// 5-10
    Mild,
    /// 11-14
    Moderate,
    /// 15 or more
    Chronic,
}

impl DisabilityLevel {
    pub fn from_attack_days(days: u32) -> Self {
        match days {
            0..=4 => DisabilityLevel::Minimal,
            5..=10 => DisabilityLevel::Mild,
            11..=14 => DisabilityLevel::Moderate,
            _ => DisabilityLevel::Chronic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisabilityLevel::Minimal => "minimal",
            DisabilityLevel::Mild => "mild",
            DisabilityLevel::Moderate => "moderate",
            DisabilityLevel::Chronic => "chronic",
        }
    }
}

/// One calendar month of attacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStats {
    pub month: MonthKey,
    pub attacks: u32,
    pub attack_days: u32,
    pub average_intensity: f64,
    pub acute_medication_days: u32,
    pub disability_level: DisabilityLevel,
}

#[derive(Default)]
struct MonthAccumulator {
    attacks: u32,
    attack_days: BTreeSet<NaiveDate>,
    intensity: IntensityAverage,
    medication_days: BTreeSet<NaiveDate>,
}

/// Per-month statistics for every calendar month `range` touches.
///
/// Months without attacks are included with zero counts. Attacks are
/// attributed to the month they started in, acute doses to the month they
/// were taken in.
pub fn monthly_breakdown<'a>(
    attacks: impl IntoIterator<Item = &'a AttackRecord>,
    range: &DateRange,
    calendar: &Calendar,
    policy: AverageIntensityPolicy,
) -> Vec<MonthlyStats> {
    let mut months: BTreeMap<MonthKey, MonthAccumulator> = calendar
        .months_in(range)
        .into_iter()
        .map(|m| {
            (
                m,
                MonthAccumulator {
                    intensity: IntensityAverage::new(policy),
                    ..Default::default()
                },
            )
        })
        .collect();

    for attack in attacks {
        if let Some(acc) = months.get_mut(&calendar.month_of(attack.start_time)) {
            acc.attacks += 1;
            acc.attack_days.insert(calendar.day_of(attack.start_time));
            acc.intensity.add(attack);
        }
        for log in &attack.medication_logs {
            if classify(log, LogOrigin::Attack) != Population::Acute {
                continue;
            }
            if let Some(acc) = months.get_mut(&calendar.month_of(log.taken_at)) {
                acc.medication_days.insert(calendar.day_of(log.taken_at));
            }
        }
    }

    months
        .into_iter()
        .map(|(month, acc)| {
            let attack_days = acc.attack_days.len() as u32;
            MonthlyStats {
                month,
                attacks: acc.attacks,
                attack_days,
                average_intensity: acc.intensity.value(),
                acute_medication_days: acc.medication_days.len() as u32,
                disability_level: DisabilityLevel::from_attack_days(attack_days),
            }
        })
        .collect()
}

/// Whole days between the most recent attack day and `today`.
///
/// 0 when an attack started today; `None` without any attack on or before
/// `today`.
pub fn attack_free_streak<'a>(
    attacks: impl IntoIterator<Item = &'a AttackRecord>,
    today: NaiveDate,
    calendar: &Calendar,
) -> Option<u32> {
    attacks
        .into_iter()
        .map(|a| calendar.day_of(a.start_time))
        .filter(|day| *day <= today)
        .max()
        .map(|last| (today - last).num_days() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Medication, MedicationCategory, MedicationEfficacy, MedicationLog};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, 12, 0, 0).unwrap()
    }

    fn make_attack(m: u32, d: u32, intensity: i32) -> AttackRecord {
        let mut attack = AttackRecord::new(format!("{}-{}", m, d), ts(m, d));
        attack.pain_intensity = intensity;
        attack
    }

    fn triptan_log(taken_at: DateTime<Utc>) -> MedicationLog {
        MedicationLog {
            medication: Some(Medication {
                id: "m1".to_string(),
                name: "Sumatriptan".to_string(),
                category: MedicationCategory::Triptan,
                is_acute: true,
                monthly_limit: None,
            }),
            medication_name: None,
            dosage: 50.0,
            unit: "mg".to_string(),
            taken_at,
            efficacy: MedicationEfficacy::NotEvaluated,
        }
    }

    #[test]
    fn test_disability_levels() {
        assert_eq!(DisabilityLevel::from_attack_days(0), DisabilityLevel::Minimal);
        assert_eq!(DisabilityLevel::from_attack_days(4), DisabilityLevel::Minimal);
        assert_eq!(DisabilityLevel::from_attack_days(5), DisabilityLevel::Mild);
        assert_eq!(DisabilityLevel::from_attack_days(10), DisabilityLevel::Mild);
        assert_eq!(DisabilityLevel::from_attack_days(11), DisabilityLevel::Moderate);
        assert_eq!(DisabilityLevel::from_attack_days(15), DisabilityLevel::Chronic);
    }

    #[test]
    fn test_monthly_breakdown_includes_empty_months() {
        let cal = Calendar::utc();
        let range = DateRange::new(ts(1, 1), ts(3, 31));
        let mut first = make_attack(1, 5, 6);
        first.medication_logs.push(triptan_log(ts(1, 5)));
        first.medication_logs.push(triptan_log(ts(1, 5) + Duration::hours(3)));
        let attacks = vec![first, make_attack(1, 5, 4), make_attack(1, 20, 8), make_attack(3, 2, 2)];

        let months = monthly_breakdown(&attacks, &range, &cal, AverageIntensityPolicy::RatedOnly);
        assert_eq!(months.len(), 3);

        assert_eq!(months[0].month.to_string(), "2024-01");
        assert_eq!(months[0].attacks, 3);
        assert_eq!(months[0].attack_days, 2);
        assert!((months[0].average_intensity - 6.0).abs() < 1e-9);
        assert_eq!(months[0].acute_medication_days, 1);

        assert_eq!(months[1].attacks, 0);
        assert_eq!(months[1].average_intensity, 0.0);
        assert_eq!(months[2].attacks, 1);
    }

    #[test]
    fn test_attack_free_streak() {
        let cal = Calendar::utc();
        let attacks = vec![make_attack(1, 5, 5), make_attack(1, 10, 5), make_attack(2, 1, 5)];
        let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        // February attack is after `today`
        assert_eq!(attack_free_streak(&attacks, today, &cal), Some(5));
        let jan10 = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(attack_free_streak(&attacks, jan10, &cal), Some(0));
        assert_eq!(attack_free_streak(&Vec::<AttackRecord>::new(), today, &cal), None);
    }
}
