//! Single-pass categorical frequency counting.
//!
//! Every distribution states the denominator its percentages are taken
//! over, so "40%" can be rendered as "of 25 attacks" or "of 60 uses":
//!
//! | Basis | Denominator | Sums to 100% |
//! |-------|-------------|--------------|
//! | [`Basis::LabelledRecords`] | records exposing at least one label | only for single-label records |
//! | [`Basis::Occurrences`] | total label occurrences | always |
//! | [`Basis::Population`] | caller-supplied record count (e.g. all attacks) | no, prevalence |
//!
//! Labels are de-duplicated within a record; a record listing the same
//! tag twice counts once.

use serde::Serialize;
use std::collections::HashMap;

/// One label's count within a distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyEntry {
    pub label: String,
    pub count: u32,
    pub percentage: f64,
}

/// What a distribution's percentages are relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "records", rename_all = "snake_case")]
pub enum Basis {
    #[default]
    LabelledRecords,
    Occurrences,
    Population(u32),
}

/// Labels sorted by count descending, ties in first-seen order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Distribution {
    pub entries: Vec<FrequencyEntry>,
    pub basis: Basis,
    /// The number percentages are computed over
    pub denominator: u32,
}

impl Distribution {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first `n` entries.
    pub fn top(&self, n: usize) -> &[FrequencyEntry] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Keep only the first `n` entries. Percentages are unchanged.
    pub fn truncated(mut self, n: usize) -> Self {
        self.entries.truncate(n);
        self
    }

    pub fn count_of(&self, label: &str) -> u32 {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.count)
            .unwrap_or(0)
    }

    pub fn percentage_sum(&self) -> f64 {
        self.entries.iter().map(|e| e.percentage).sum()
    }

    /// Human-readable denominator, e.g. "of 12 attacks".
    pub fn denominator_label(&self, noun: &str) -> String {
        format!("of {} {}", self.denominator, noun)
    }
}

/// Accumulates labels record by record.
#[derive(Debug, Default)]
pub struct FrequencyAggregator {
    index: HashMap<String, usize>,
    counts: Vec<(String, u32)>,
    records: u32,
    labelled_records: u32,
    occurrences: u32,
}

impl FrequencyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one record's labels.
    pub fn observe<'l, I>(&mut self, labels: I)
    where
        I: IntoIterator<Item = &'l str>,
    {
        self.records += 1;
        let mut seen: Vec<&str> = Vec::new();
        for label in labels {
            if seen.contains(&label) {
                continue;
            }
            seen.push(label);
            match self.index.get(label) {
                Some(&slot) => self.counts[slot].1 += 1,
                None => {
                    self.index.insert(label.to_string(), self.counts.len());
                    self.counts.push((label.to_string(), 1));
                }
            }
        }
        if !seen.is_empty() {
            self.labelled_records += 1;
            self.occurrences += seen.len() as u32;
        }
    }

    /// Observe a record carrying exactly one label.
    pub fn observe_one(&mut self, label: &str) {
        self.observe(std::iter::once(label));
    }

    /// Number of records observed, labelled or not.
    pub fn records(&self) -> u32 {
        self.records
    }

    pub fn finish(self, basis: Basis) -> Distribution {
        let denominator = match basis {
            Basis::LabelledRecords => self.labelled_records,
            Basis::Occurrences => self.occurrences,
            Basis::Population(n) => n,
        };
        let mut entries: Vec<FrequencyEntry> = self
            .counts
            .into_iter()
            .map(|(label, count)| FrequencyEntry {
                label,
                count,
                percentage: percentage(count, denominator),
            })
            .collect();
        // Stable sort keeps first-seen order among equal counts
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        Distribution {
            entries,
            basis,
            denominator,
        }
    }
}

/// `100 * part / whole`, or 0 when `whole` is 0.
pub fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Count labels over `records` in one pass.
pub fn aggregate<'l, R, F, I>(records: impl IntoIterator<Item = R>, mut labels: F, basis: Basis) -> Distribution
where
    F: FnMut(R) -> I,
    I: IntoIterator<Item = &'l str>,
{
    let mut aggregator = FrequencyAggregator::new();
    for record in records {
        aggregator.observe(labels(record));
    }
    aggregator.finish(basis)
}
