//! Attack duration and pain-intensity statistics.

use crate::types::AttackRecord;
use serde::{Deserialize, Serialize};

const SECS_PER_HOUR: f64 = 3600.0;

// ============================================
// Duration
// ============================================

/// Duration statistics over finished attacks.
///
/// Ongoing attacks are excluded from every field, including the count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DurationStats {
    pub average_hours: f64,
    pub shortest_hours: f64,
    pub longest_hours: f64,
    /// Number of finished attacks the statistics cover
    pub completed_attacks: u32,
}

/// Compute duration statistics. All zero when no attack has finished.
pub fn duration_stats<'a>(attacks: impl IntoIterator<Item = &'a AttackRecord>) -> DurationStats {
    let mut stats = DurationStats::default();
    let mut total_secs = 0i64;
    let mut shortest = i64::MAX;
    let mut longest = 0i64;

    for duration in attacks.into_iter().filter_map(|a| a.duration()) {
        let secs = duration.num_seconds();
        total_secs += secs;
        shortest = shortest.min(secs);
        longest = longest.max(secs);
        stats.completed_attacks += 1;
    }

    if stats.completed_attacks > 0 {
        stats.average_hours = total_secs as f64 / stats.completed_attacks as f64 / SECS_PER_HOUR;
        stats.shortest_hours = shortest as f64 / SECS_PER_HOUR;
        stats.longest_hours = longest as f64 / SECS_PER_HOUR;
    }
    stats
}

// ============================================
// Intensity
// ============================================

/// Which attacks count towards the average pain intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AverageIntensityPolicy {
    /// Only attacks with intensity >= 1
    #[default]
    RatedOnly,
    /// Every attack, unrated ones contributing 0
    AllRecords,
}

/// Pain-intensity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityBand {
    /// 1-3
    Mild,
    /// 4-6
    Moderate,
    /// 7-10
    Severe,
}

impl IntensityBand {
    /// Band for a clamped intensity; `None` for 0 (unrated).
    pub fn of(intensity: u8) -> Option<Self> {
        match intensity {
            0 => None,
            1..=3 => Some(IntensityBand::Mild),
            4..=6 => Some(IntensityBand::Moderate),
            _ => Some(IntensityBand::Severe),
        }
    }
}

/// Attacks bucketed by pain intensity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntensityDistribution {
    pub mild: u32,
    pub moderate: u32,
    pub severe: u32,
    /// Attacks with intensity 0, in no bucket
    pub unrated: u32,
    pub average: f64,
    pub policy: AverageIntensityPolicy,
}

impl IntensityDistribution {
    /// Attacks in any bucket; the denominator for band percentages.
    pub fn rated(&self) -> u32 {
        self.mild + self.moderate + self.severe
    }

    pub fn percentage_of(&self, band: IntensityBand) -> f64 {
        let count = match band {
            IntensityBand::Mild => self.mild,
            IntensityBand::Moderate => self.moderate,
            IntensityBand::Severe => self.severe,
        };
        super::frequency::percentage(count, self.rated())
    }
}

/// Running intensity average under a policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntensityAverage {
    policy: AverageIntensityPolicy,
    sum: u32,
    count: u32,
}

impl IntensityAverage {
    pub fn new(policy: AverageIntensityPolicy) -> Self {
        Self {
            policy,
            sum: 0,
            count: 0,
        }
    }

    pub fn add(&mut self, attack: &AttackRecord) {
        let intensity = attack.clamped_intensity();
        if intensity == 0 && self.policy == AverageIntensityPolicy::RatedOnly {
            return;
        }
        self.sum += intensity as u32;
        self.count += 1;
    }

    pub fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// Average clamped intensity of `attacks` under `policy`; 0 when nothing counts.
pub fn average_intensity<'a>(
    attacks: impl IntoIterator<Item = &'a AttackRecord>,
    policy: AverageIntensityPolicy,
) -> f64 {
    let mut average = IntensityAverage::new(policy);
    for attack in attacks {
        average.add(attack);
    }
    average.value()
}

/// Bucket attacks by clamped intensity and average them under `policy`.
pub fn intensity_distribution<'a>(
    attacks: impl IntoIterator<Item = &'a AttackRecord>,
    policy: AverageIntensityPolicy,
) -> IntensityDistribution {
    let mut dist = IntensityDistribution {
        policy,
        ..Default::default()
    };
    let mut average = IntensityAverage::new(policy);

    for attack in attacks {
        match IntensityBand::of(attack.clamped_intensity()) {
            Some(IntensityBand::Mild) => dist.mild += 1,
            Some(IntensityBand::Moderate) => dist.moderate += 1,
            Some(IntensityBand::Severe) => dist.severe += 1,
            None => dist.unrated += 1,
        }
        average.add(attack);
    }

    dist.average = average.value();
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn make_attack(intensity: i32, hours: Option<i64>) -> AttackRecord {
        let mut attack = AttackRecord::new("a", base());
        attack.pain_intensity = intensity;
        attack.end_time = hours.map(|h| base() + Duration::hours(h));
        attack
    }

    #[test]
    fn test_ongoing_attacks_do_not_affect_duration() {
        let attacks = vec![make_attack(5, Some(2)), make_attack(5, None), make_attack(5, Some(6))];
        let stats = duration_stats(&attacks);
        assert_eq!(stats.completed_attacks, 2);
        assert!((stats.average_hours - 4.0).abs() < 1e-9);
        assert!((stats.shortest_hours - 2.0).abs() < 1e-9);
        assert!((stats.longest_hours - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_ongoing_yields_zero() {
        let attacks = vec![make_attack(5, None), make_attack(7, None)];
        let stats = duration_stats(&attacks);
        assert_eq!(stats, DurationStats::default());
        assert_eq!(stats.average_hours, 0.0);
    }

    #[test]
    fn test_intensity_buckets() {
        let attacks: Vec<_> = [0, 1, 3, 4, 6, 7, 10, 12, -2]
            .iter()
            .map(|i| make_attack(*i, None))
            .collect();
        let dist = intensity_distribution(&attacks, AverageIntensityPolicy::RatedOnly);
        assert_eq!(dist.mild, 2);
        assert_eq!(dist.moderate, 2);
        // 12 clamps to 10
        assert_eq!(dist.severe, 3);
        // 0 and -2 (clamped to 0)
        assert_eq!(dist.unrated, 2);
        assert_eq!(dist.rated(), 7);
        let total: f64 = [IntensityBand::Mild, IntensityBand::Moderate, IntensityBand::Severe]
            .iter()
            .map(|b| dist.percentage_of(*b))
            .sum();
        assert!((total - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_average_policy() {
        let attacks = vec![make_attack(0, None), make_attack(4, None), make_attack(8, None)];
        let rated = intensity_distribution(&attacks, AverageIntensityPolicy::RatedOnly);
        assert!((rated.average - 6.0).abs() < 1e-9);
        let all = intensity_distribution(&attacks, AverageIntensityPolicy::AllRecords);
        assert!((all.average - 4.0).abs() < 1e-9);
        assert_eq!(average_intensity(&Vec::<AttackRecord>::new(), AverageIntensityPolicy::RatedOnly), 0.0);
    }
}
