//! Analytics module for migraine-insight
//!
//! Turns attack records and health events into statistics, distributions,
//! risk levels and correlation results:
//! - Record filtering by date range
//! - Frequency distributions with explicit denominators
//! - Duration and pain-intensity statistics
//! - Acute vs. preventive medication usage
//! - Medication-overuse headache (MOH) risk
//! - Treatment-start and menstrual-cycle correlation
//! - Monthly trends
//!
//! Every analyzer is a total function: empty input yields zero-valued
//! results, and "not enough data" is an explicit `None`.
//!
//! See [`snapshot`] for the batch coordinator and [`engine`] for the
//! service-level entry point.

pub mod clinical;
pub mod correlation;
pub mod cycle;
pub mod engine;
pub mod filter;
pub mod frequency;
pub mod medication;
pub mod moh;
pub mod snapshot;
pub mod trends;

pub use clinical::{AverageIntensityPolicy, DurationStats, IntensityBand, IntensityDistribution};
pub use correlation::{CorrelationResult, CorrelationWindows, TreatmentKind};
pub use cycle::{CycleAnalysis, CyclePhase, PhaseWindows};
pub use engine::AnalyticsEngine;
pub use filter::{filter_in_range, FilteredRecords, RecordRef};
pub use frequency::{Basis, Distribution, FrequencyAggregator, FrequencyEntry};
pub use medication::{MedicationAdherence, MedicationUsage, MedicationUsageReport, Population};
pub use moh::{MohAssessment, MohRiskLevel};
pub use snapshot::{AnalyticsSnapshot, CancellationSignal, SnapshotOptions};
pub use trends::{DisabilityLevel, MonthlyStats};
