//! Medication-overuse headache (MOH) risk.
//!
//! Risk is driven by the monthly count of acute-medication usage-days `d`:
//!
//! | `d` per month | Risk |
//! |---------------|------|
//! | < 8 | none |
//! | 8-9 | low |
//! | 10-14 | medium |
//! | >= 15 | high |
//!
//! For a window spanning several calendar months, `d` is the total divided
//! by the number of months touched (a partial trailing month counts as a
//! whole month), rounded to the nearest integer before classification.
//! Raw days are never summed across months.
//!
//! This is a single conservative threshold set, not the per-class clinical
//! definition (>= 10 days for triptans/ergotamines/opioids, >= 15 for simple
//! analgesics), and is advisory only. The per-class usage is reported
//! alongside for context.

use super::medication::{classify, LogOrigin, Population};
use crate::calendar::{Calendar, MonthKey};
use crate::types::{AttackRecord, DateRange, MedicationCategory};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const LOW_RISK_DAYS: u32 = 8;
pub const MEDIUM_RISK_DAYS: u32 = 10;
pub const HIGH_RISK_DAYS: u32 = 15;

const ADVISORY_NOTICE: &str =
    "Advisory only: based on usage-day counts, not a clinical diagnosis.";

/// MOH risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MohRiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl MohRiskLevel {
    /// Classify a monthly usage-day count.
    pub fn from_monthly_days(days: u32) -> Self {
        match days {
            d if d >= HIGH_RISK_DAYS => MohRiskLevel::High,
            d if d >= MEDIUM_RISK_DAYS => MohRiskLevel::Medium,
            d if d >= LOW_RISK_DAYS => MohRiskLevel::Low,
            _ => MohRiskLevel::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MohRiskLevel::None => "none",
            MohRiskLevel::Low => "low",
            MohRiskLevel::Medium => "medium",
            MohRiskLevel::High => "high",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            MohRiskLevel::None => "Medication frequency is within the usual range.",
            MohRiskLevel::Low => "Keep logging every dose and avoid crossing the safe threshold.",
            MohRiskLevel::Medium => {
                "Consider discussing preventive treatment with a neurologist."
            }
            MohRiskLevel::High => {
                "Seek medical advice promptly; medication withdrawal may be needed."
            }
        }
    }
}

/// Clinical grouping of acute medication classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MohClass {
    SimpleAnalgesic,
    TriptanOrErgot,
    Opioid,
}

impl MohClass {
    pub const ALL: [MohClass; 3] = [
        MohClass::SimpleAnalgesic,
        MohClass::TriptanOrErgot,
        MohClass::Opioid,
    ];

    pub fn of(category: MedicationCategory) -> Option<Self> {
        match category {
            MedicationCategory::Nsaid => Some(MohClass::SimpleAnalgesic),
            MedicationCategory::Triptan | MedicationCategory::Ergotamine => {
                Some(MohClass::TriptanOrErgot)
            }
            MedicationCategory::Opioid => Some(MohClass::Opioid),
            _ => None,
        }
    }

    /// Clinical usage-day limit per month.
    pub fn monthly_limit(&self) -> u32 {
        match self {
            MohClass::SimpleAnalgesic => 15,
            MohClass::TriptanOrErgot | MohClass::Opioid => 10,
        }
    }
}

/// Usage of one medication class over the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassUsage {
    pub class: MohClass,
    pub usage_days: u32,
    pub monthly_average: f64,
    pub monthly_limit: u32,
    /// `monthly_average / monthly_limit`, capped at 1.0
    pub progress: f64,
}

/// Acute usage-days in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyUsage {
    pub month: MonthKey,
    pub usage_days: u32,
}

/// A medication used on at least its own monthly limit of days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitBreach {
    pub medication: String,
    pub month: MonthKey,
    pub usage_days: u32,
    pub limit: u32,
}

/// Result of a MOH risk check.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MohAssessment {
    pub risk_level: MohRiskLevel,
    /// Usage-days for a single month; rounded monthly average otherwise
    pub display_days: u32,
    pub months_spanned: u32,
    pub total_usage_days: u32,
    pub monthly_usage: Vec<MonthlyUsage>,
    pub classes: Vec<ClassUsage>,
    pub limit_breaches: Vec<LimitBreach>,
    pub advisory: String,
}

impl MohAssessment {
    pub fn is_multi_month(&self) -> bool {
        self.months_spanned > 1
    }
}

/// Display value for a usage-day total over `months` months.
pub fn monthly_display_days(total_days: u32, months: u32) -> u32 {
    match months {
        0 => 0,
        1 => total_days,
        n => (total_days as f64 / n as f64).round() as u32,
    }
}

/// Assess MOH risk from acute doses taken within `period`.
///
/// Doses are attributed to the local day they were taken on. Attacks
/// outside `period` may be passed; only their in-period doses count.
pub fn check_moh_risk<'a>(
    period: &DateRange,
    attacks: impl IntoIterator<Item = &'a AttackRecord>,
    calendar: &Calendar,
) -> MohAssessment {
    let months = calendar.months_in(period);
    let months_spanned = months.len() as u32;

    let mut days: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut class_days: BTreeMap<MohClass, BTreeSet<NaiveDate>> = BTreeMap::new();
    let mut per_medication: BTreeMap<(MonthKey, String), (u32, BTreeSet<NaiveDate>)> =
        BTreeMap::new();

    for attack in attacks {
        for log in &attack.medication_logs {
            if !period.contains(log.taken_at)
                || classify(log, LogOrigin::Attack) != Population::Acute
            {
                continue;
            }
            let day = calendar.day_of(log.taken_at);
            days.insert(day);

            let Some(medication) = &log.medication else {
                continue;
            };
            if let Some(class) = MohClass::of(medication.category) {
                class_days.entry(class).or_default().insert(day);
            }
            if let Some(limit) = medication.effective_monthly_limit() {
                per_medication
                    .entry((MonthKey::of(day), medication.name.clone()))
                    .or_insert_with(|| (limit, BTreeSet::new()))
                    .1
                    .insert(day);
            }
        }
    }

    let total_usage_days = days.len() as u32;
    let display_days = monthly_display_days(total_usage_days, months_spanned);
    let risk_level = MohRiskLevel::from_monthly_days(display_days);

    let monthly_usage = months
        .iter()
        .map(|month| MonthlyUsage {
            month: *month,
            usage_days: days.iter().filter(|d| MonthKey::of(**d) == *month).count() as u32,
        })
        .collect();

    let classes = MohClass::ALL
        .iter()
        .map(|class| {
            let usage_days = class_days.get(class).map(|d| d.len() as u32).unwrap_or(0);
            let monthly_average = if months_spanned == 0 {
                0.0
            } else {
                usage_days as f64 / months_spanned as f64
            };
            let monthly_limit = class.monthly_limit();
            ClassUsage {
                class: *class,
                usage_days,
                monthly_average,
                monthly_limit,
                progress: (monthly_average / monthly_limit as f64).min(1.0),
            }
        })
        .collect();

    let limit_breaches = per_medication
        .into_iter()
        .filter_map(|((month, medication), (limit, days))| {
            let usage_days = days.len() as u32;
            (usage_days >= limit).then_some(LimitBreach {
                medication,
                month,
                usage_days,
                limit,
            })
        })
        .collect();

    tracing::debug!(
        months = months_spanned,
        total_usage_days,
        display_days,
        risk = risk_level.as_str(),
        "Assessed MOH risk"
    );

    MohAssessment {
        risk_level,
        display_days,
        months_spanned,
        total_usage_days,
        monthly_usage,
        classes,
        limit_breaches,
        advisory: format!("{} {}", risk_level.recommendation(), ADVISORY_NOTICE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Medication, MedicationEfficacy, MedicationLog};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 9, 0, 0).unwrap()
    }

    fn med(name: &str, category: MedicationCategory) -> Medication {
        Medication {
            id: name.to_lowercase(),
            name: name.to_string(),
            category,
            is_acute: true,
            monthly_limit: None,
        }
    }

    fn attack_with_dose(month: u32, day: u32, medication: &Medication) -> AttackRecord {
        let mut attack = AttackRecord::new(format!("a-{}-{}", month, day), ts(month, day));
        attack.medication_logs.push(MedicationLog {
            medication: Some(medication.clone()),
            medication_name: None,
            dosage: 1.0,
            unit: "tablet".to_string(),
            taken_at: ts(month, day),
            efficacy: MedicationEfficacy::NotEvaluated,
        });
        attack
    }

    fn attacks_on_days(month: u32, count: u32, medication: &Medication) -> Vec<AttackRecord> {
        (1..=count).map(|d| attack_with_dose(month, d, medication)).collect()
    }

    #[test]
    fn test_single_month_thresholds() {
        let cal = Calendar::utc();
        let april = cal.month_range(2024, 4).unwrap();
        let ibuprofen = med("Ibuprofen", MedicationCategory::Nsaid);
        let cases = [
            (7, MohRiskLevel::None),
            (8, MohRiskLevel::Low),
            (9, MohRiskLevel::Low),
            (10, MohRiskLevel::Medium),
            (14, MohRiskLevel::Medium),
            (15, MohRiskLevel::High),
        ];
        for (days, expected) in cases {
            let attacks = attacks_on_days(4, days, &ibuprofen);
            let assessment = check_moh_risk(&april, &attacks, &cal);
            assert_eq!(assessment.display_days, days, "days = {}", days);
            assert_eq!(assessment.risk_level, expected, "days = {}", days);
            assert!(!assessment.is_multi_month());
        }
    }

    #[test]
    fn test_multi_month_averages_not_sums() {
        let cal = Calendar::utc();
        let sumatriptan = med("Sumatriptan", MedicationCategory::Triptan);
        let mut attacks = attacks_on_days(1, 20, &sumatriptan);
        attacks.extend(attacks_on_days(2, 4, &sumatriptan));
        let period = DateRange::new(
            cal.month_range(2024, 1).unwrap().start,
            cal.month_range(2024, 2).unwrap().end,
        );

        let assessment = check_moh_risk(&period, &attacks, &cal);
        assert_eq!(assessment.months_spanned, 2);
        assert_eq!(assessment.total_usage_days, 24);
        assert_eq!(assessment.display_days, 12);
        assert_eq!(assessment.risk_level, MohRiskLevel::Medium);
        assert_eq!(assessment.monthly_usage[0].usage_days, 20);
        assert_eq!(assessment.monthly_usage[1].usage_days, 4);
    }

    #[test]
    fn test_partial_trailing_month_counts_whole() {
        let cal = Calendar::utc();
        let ibuprofen = med("Ibuprofen", MedicationCategory::Nsaid);
        let attacks = attacks_on_days(1, 16, &ibuprofen);
        // Jan 1 to Feb 3: two months touched
        let period = DateRange::new(ts(1, 1) - chrono::Duration::hours(9), ts(2, 3));
        let assessment = check_moh_risk(&period, &attacks, &cal);
        assert_eq!(assessment.months_spanned, 2);
        assert_eq!(assessment.display_days, 8);
        assert_eq!(assessment.risk_level, MohRiskLevel::Low);
    }

    #[test]
    fn test_multiple_doses_same_day_count_once() {
        let cal = Calendar::utc();
        let ibuprofen = med("Ibuprofen", MedicationCategory::Nsaid);
        let mut attack = attack_with_dose(4, 3, &ibuprofen);
        let mut second = attack.medication_logs[0].clone();
        second.taken_at = second.taken_at + chrono::Duration::hours(5);
        attack.medication_logs.push(second);

        let assessment = check_moh_risk(&cal.month_range(2024, 4).unwrap(), &[attack], &cal);
        assert_eq!(assessment.total_usage_days, 1);
    }

    #[test]
    fn test_preventive_doses_ignored() {
        let cal = Calendar::utc();
        let topiramate = Medication {
            is_acute: false,
            ..med("Topiramate", MedicationCategory::Preventive)
        };
        let attacks = attacks_on_days(4, 20, &topiramate);
        let assessment = check_moh_risk(&cal.month_range(2024, 4).unwrap(), &attacks, &cal);
        assert_eq!(assessment.total_usage_days, 0);
        assert_eq!(assessment.risk_level, MohRiskLevel::None);
    }

    #[test]
    fn test_class_usage_and_limit_breaches() {
        let cal = Calendar::utc();
        let sumatriptan = med("Sumatriptan", MedicationCategory::Triptan);
        let attacks = attacks_on_days(4, 10, &sumatriptan);
        let assessment = check_moh_risk(&cal.month_range(2024, 4).unwrap(), &attacks, &cal);

        let triptans = assessment
            .classes
            .iter()
            .find(|c| c.class == MohClass::TriptanOrErgot)
            .unwrap();
        assert_eq!(triptans.usage_days, 10);
        assert!((triptans.progress - 1.0).abs() < 1e-9);

        assert_eq!(assessment.limit_breaches.len(), 1);
        assert_eq!(assessment.limit_breaches[0].medication, "Sumatriptan");
        assert_eq!(assessment.limit_breaches[0].limit, 10);
        assert!(assessment.advisory.contains("Advisory only"));
    }

    #[test]
    fn test_empty_period() {
        let cal = Calendar::utc();
        let april = cal.month_range(2024, 4).unwrap();
        let inverted = DateRange::new(april.end, april.start);
        let ibuprofen = med("Ibuprofen", MedicationCategory::Nsaid);
        let assessment = check_moh_risk(&inverted, &attacks_on_days(4, 20, &ibuprofen), &cal);
        assert_eq!(assessment.months_spanned, 0);
        assert_eq!(assessment.display_days, 0);
        assert_eq!(assessment.risk_level, MohRiskLevel::None);
    }
}
