//! Date-range selection of records.
//!
//! Attacks and health events are the two closed kinds of timestamped record.
//! [`RecordRef`] tags them so mixed collections can be filtered in one pass.

use crate::types::{AttackRecord, DateRange, HealthEvent};
use chrono::{DateTime, Utc};

/// A record with a primary timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timestamped for AttackRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.start_time
    }
}

impl Timestamped for HealthEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.event_date
    }
}

impl<T: Timestamped + ?Sized> Timestamped for &T {
    fn timestamp(&self) -> DateTime<Utc> {
        (**self).timestamp()
    }
}

/// Borrowed record of either kind.
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    Attack(&'a AttackRecord),
    Event(&'a HealthEvent),
}

impl Timestamped for RecordRef<'_> {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RecordRef::Attack(attack) => attack.start_time,
            RecordRef::Event(event) => event.event_date,
        }
    }
}

/// Records whose timestamp lies in `range`, inclusive on both ends.
///
/// Preserves input order. An inverted range selects nothing.
pub fn filter_in_range<'a, T: Timestamped>(records: &'a [T], range: &DateRange) -> Vec<&'a T> {
    if range.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|record| range.contains(record.timestamp()))
        .collect()
}

/// The in-range subset of one attack/event collection pair.
#[derive(Debug, Clone, Default)]
pub struct FilteredRecords<'a> {
    pub attacks: Vec<&'a AttackRecord>,
    pub events: Vec<&'a HealthEvent>,
}

impl<'a> FilteredRecords<'a> {
    /// Filter both collections in a single pass over the tagged records.
    pub fn select(
        attacks: &'a [AttackRecord],
        events: &'a [HealthEvent],
        range: &DateRange,
    ) -> Self {
        let records = attacks
            .iter()
            .map(RecordRef::Attack)
            .chain(events.iter().map(RecordRef::Event));
        Self::from_records(records, range)
    }

    /// Split a mixed stream of records, keeping those in `range`.
    pub fn from_records<I>(records: I, range: &DateRange) -> Self
    where
        I: IntoIterator<Item = RecordRef<'a>>,
    {
        let mut filtered = Self::default();
        if range.is_empty() {
            return filtered;
        }
        for record in records {
            if !range.contains(record.timestamp()) {
                continue;
            }
            match record {
                RecordRef::Attack(attack) => filtered.attacks.push(attack),
                RecordRef::Event(event) => filtered.events.push(event),
            }
        }
        filtered
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty() && self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HealthEventPayload;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn make_attacks(days: &[i64]) -> Vec<AttackRecord> {
        days.iter()
            .map(|d| AttackRecord::new(format!("a{}", d), day(*d)))
            .collect()
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let attacks = make_attacks(&[0, 5, 10]);
        let range = DateRange::new(day(0), day(10));
        assert_eq!(filter_in_range(&attacks, &range).len(), 3);

        let range = DateRange::new(day(0) + Duration::seconds(1), day(10) - Duration::seconds(1));
        let selected = filter_in_range(&attacks, &range);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "a5");
    }

    #[test]
    fn test_inverted_range_selects_nothing() {
        let attacks = make_attacks(&[0, 5, 10]);
        let range = DateRange::new(day(10), day(0));
        assert!(filter_in_range(&attacks, &range).is_empty());
        assert!(FilteredRecords::select(&attacks, &[], &range).is_empty());
    }

    #[test]
    fn test_widening_range_is_superset() {
        let attacks = make_attacks(&[0, 3, 7, 12, 20, 31, 45]);
        let ranges = [
            DateRange::new(day(5), day(15)),
            DateRange::new(day(3), day(20)),
            DateRange::new(day(0), day(31)),
            DateRange::new(day(-10), day(100)),
        ];
        for pair in ranges.windows(2) {
            assert!(pair[1].covers(&pair[0]));
            let narrow = filter_in_range(&attacks, &pair[0]);
            let wide = filter_in_range(&attacks, &pair[1]);
            for record in &narrow {
                assert!(wide.iter().any(|r| r.id == record.id));
            }
            assert!(wide.len() >= narrow.len());
        }
    }

    #[test]
    fn test_select_splits_by_kind() {
        let attacks = make_attacks(&[1, 2, 40]);
        let events = vec![
            HealthEvent {
                id: "e1".to_string(),
                event_date: day(3),
                payload: HealthEventPayload::Surgery {
                    name: None,
                    hospital: None,
                    doctor: None,
                },
            },
            HealthEvent {
                id: "e2".to_string(),
                event_date: day(50),
                payload: HealthEventPayload::Medication { logs: vec![] },
            },
        ];
        let filtered = FilteredRecords::select(&attacks, &events, &DateRange::new(day(0), day(30)));
        assert_eq!(filtered.attacks.len(), 2);
        assert_eq!(filtered.events.len(), 1);
        assert_eq!(filtered.events[0].id, "e1");
    }
}
