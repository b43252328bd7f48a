//! Core domain types for migraine analytics
//!
//! These types mirror the records owned by the external record store. The
//! engine only ever reads them; every analytics result is a new value.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Attack** | One logged migraine episode ([`AttackRecord`]) |
//! | **Health event** | A non-attack occurrence: medication dose, TCM treatment, surgery ([`HealthEvent`]) |
//! | **Medication log** | One dose, attached to an attack or to a medication health event |
//! | **Usage-day** | A local calendar day with at least one qualifying dose |
//! | **Cycle sample** | One menstrual cycle read from an external health-data source |

use crate::error::{Error, Result};
use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================
// Date range
// ============================================

/// Closed interval `[start, end]` of instants.
///
/// A range with `end < start` is valid and contains nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when `end < start`.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Inclusive on both ends.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// True when every instant of `other` also lies in `self`.
    pub fn covers(&self, other: &DateRange) -> bool {
        other.is_empty() || (self.start <= other.start && other.end <= self.end)
    }
}

// ============================================
// Medication
// ============================================

/// Pharmacological category of a medication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationCategory {
    Nsaid,
    Triptan,
    Opioid,
    Ergotamine,
    Preventive,
    TcmHerbal,
    Other,
}

impl MedicationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicationCategory::Nsaid => "nsaid",
            MedicationCategory::Triptan => "triptan",
            MedicationCategory::Opioid => "opioid",
            MedicationCategory::Ergotamine => "ergotamine",
            MedicationCategory::Preventive => "preventive",
            MedicationCategory::TcmHerbal => "tcm_herbal",
            MedicationCategory::Other => "other",
        }
    }

    /// Whether drugs in this category are taken to abort an attack.
    pub fn is_acute(&self) -> bool {
        matches!(
            self,
            MedicationCategory::Nsaid
                | MedicationCategory::Triptan
                | MedicationCategory::Opioid
                | MedicationCategory::Ergotamine
        )
    }

    /// Clinical monthly usage-day limit for the category, if any.
    ///
    /// Simple analgesics: 15 days. Triptans, ergotamines, opioids: 10 days.
    pub fn default_monthly_limit(&self) -> Option<u32> {
        match self {
            MedicationCategory::Nsaid => Some(15),
            MedicationCategory::Triptan
            | MedicationCategory::Ergotamine
            | MedicationCategory::Opioid => Some(10),
            _ => None,
        }
    }
}

impl std::str::FromStr for MedicationCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "nsaid" => Ok(MedicationCategory::Nsaid),
            "triptan" => Ok(MedicationCategory::Triptan),
            "opioid" => Ok(MedicationCategory::Opioid),
            "ergotamine" => Ok(MedicationCategory::Ergotamine),
            "preventive" => Ok(MedicationCategory::Preventive),
            "tcm_herbal" => Ok(MedicationCategory::TcmHerbal),
            "other" => Ok(MedicationCategory::Other),
            _ => Err(format!("unknown medication category: {}", s)),
        }
    }
}

/// A medication from the user's cabinet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    pub category: MedicationCategory,
    pub is_acute: bool,
    /// Usage-day limit per month; `None` means no limit tracked
    #[serde(default)]
    pub monthly_limit: Option<u32>,
}

impl Medication {
    /// The explicit limit, falling back to the category's clinical limit
    /// for acute medications.
    pub fn effective_monthly_limit(&self) -> Option<u32> {
        self.monthly_limit.or_else(|| {
            if self.is_acute {
                self.category.default_monthly_limit()
            } else {
                None
            }
        })
    }
}

/// How well a dose worked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MedicationEfficacy {
    #[default]
    NotEvaluated,
    Complete,
    Partial,
    NoEffect,
}

impl MedicationEfficacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicationEfficacy::NotEvaluated => "not_evaluated",
            MedicationEfficacy::Complete => "complete",
            MedicationEfficacy::Partial => "partial",
            MedicationEfficacy::NoEffect => "no_effect",
        }
    }
}

/// One dose of a medication.
///
/// Either resolves to a [`Medication`] from the cabinet or carries only a
/// free-text name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationLog {
    #[serde(default)]
    pub medication: Option<Medication>,
    #[serde(default)]
    pub medication_name: Option<String>,
    #[serde(default)]
    pub dosage: f64,
    #[serde(default)]
    pub unit: String,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub efficacy: MedicationEfficacy,
}

impl MedicationLog {
    /// Display name: the resolved medication's name, else the free-text name.
    pub fn display_name(&self) -> &str {
        self.medication
            .as_ref()
            .map(|m| m.name.as_str())
            .or(self.medication_name.as_deref())
            .unwrap_or("Unknown")
    }

    /// Category of the resolved medication, if any.
    pub fn category(&self) -> Option<MedicationCategory> {
        self.medication.as_ref().map(|m| m.category)
    }
}

// ============================================
// Attack record
// ============================================

/// A symptom accompanying an attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub name: String,
    /// Severity 0-10
    #[serde(default)]
    pub severity: u8,
}

/// A suspected trigger for an attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub category: String,
    /// Confidence 0.0-1.0
    #[serde(default)]
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Direction of barometric pressure change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureTrend {
    Rising,
    #[default]
    Steady,
    Falling,
}

/// Weather conditions resolved by the platform at attack time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature_c: f64,
    /// Relative humidity in percent
    pub humidity: f64,
    pub pressure_hpa: f64,
    #[serde(default)]
    pub pressure_trend: PressureTrend,
    #[serde(default)]
    pub condition: Option<String>,
}

impl WeatherSnapshot {
    /// Conditions commonly associated with attack onset.
    pub fn is_high_risk(&self) -> bool {
        (self.pressure_trend == PressureTrend::Falling && self.pressure_hpa < 1010.0)
            || self.humidity > 80.0
            || self.temperature_c > 35.0
            || self.temperature_c < 0.0
    }
}

/// One logged migraine episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    pub id: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the attack is ongoing
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Pain intensity 0-10; 0 means unrated
    #[serde(default)]
    pub pain_intensity: i32,
    #[serde(default)]
    pub pain_locations: Vec<String>,
    #[serde(default)]
    pub pain_qualities: Vec<String>,
    #[serde(default)]
    pub has_aura: bool,
    #[serde(default)]
    pub aura_types: Vec<String>,
    #[serde(default)]
    pub aura_duration_secs: Option<f64>,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub medication_logs: Vec<MedicationLog>,
    #[serde(default)]
    pub weather: Option<WeatherSnapshot>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl AttackRecord {
    /// Minimal attack starting at `start_time`, for building records in code.
    pub fn new(id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start_time,
            end_time: None,
            pain_intensity: 0,
            pain_locations: Vec::new(),
            pain_qualities: Vec::new(),
            has_aura: false,
            aura_types: Vec::new(),
            aura_duration_secs: None,
            symptoms: Vec::new(),
            triggers: Vec::new(),
            medication_logs: Vec::new(),
            weather: None,
            notes: None,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        self.end_time.is_none()
    }

    /// Duration of a finished attack. A recorded end before the start is
    /// treated as zero length.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time
            .map(|end| (end - self.start_time).max(Duration::zero()))
    }

    /// Pain intensity clamped to 0-10.
    pub fn clamped_intensity(&self) -> u8 {
        self.pain_intensity.clamp(0, 10) as u8
    }
}

// ============================================
// Health events
// ============================================

/// Kind of a [`HealthEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthEventType {
    Medication,
    TcmTreatment,
    Surgery,
}

impl HealthEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthEventType::Medication => "medication",
            HealthEventType::TcmTreatment => "tcm_treatment",
            HealthEventType::Surgery => "surgery",
        }
    }
}

impl std::str::FromStr for HealthEventType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "medication" => Ok(HealthEventType::Medication),
            "tcm_treatment" | "tcm" => Ok(HealthEventType::TcmTreatment),
            "surgery" => Ok(HealthEventType::Surgery),
            _ => Err(format!("unknown health event type: {}", s)),
        }
    }
}

/// Type-specific data of a [`HealthEvent`].
///
/// The variant determines the event type, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HealthEventPayload {
    Medication {
        #[serde(default)]
        logs: Vec<MedicationLog>,
    },
    TcmTreatment {
        #[serde(default)]
        treatment_type: Option<String>,
        #[serde(default)]
        duration_secs: Option<f64>,
    },
    Surgery {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        hospital: Option<String>,
        #[serde(default)]
        doctor: Option<String>,
    },
}

/// A non-attack health occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub id: String,
    pub event_date: DateTime<Utc>,
    pub payload: HealthEventPayload,
}

impl HealthEvent {
    pub fn event_type(&self) -> HealthEventType {
        match self.payload {
            HealthEventPayload::Medication { .. } => HealthEventType::Medication,
            HealthEventPayload::TcmTreatment { .. } => HealthEventType::TcmTreatment,
            HealthEventPayload::Surgery { .. } => HealthEventType::Surgery,
        }
    }

    /// Medication logs carried by a medication event; empty otherwise.
    pub fn medication_logs(&self) -> &[MedicationLog] {
        match &self.payload {
            HealthEventPayload::Medication { logs } => logs,
            _ => &[],
        }
    }
}

// ============================================
// Menstrual cycle
// ============================================

/// One menstrual cycle from the external health-data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenstrualCycleSample {
    /// First day of bleeding
    pub start: NaiveDate,
    /// Days until the next cycle starts; 0 for a cycle still in progress
    pub length_days: u32,
    /// Days with recorded flow, if the source reports them
    #[serde(default)]
    pub flow_days: Option<Vec<NaiveDate>>,
}

impl MenstrualCycleSample {
    /// A cycle is complete once the next one has started.
    ///
    /// A length that runs past the last representable date is not.
    pub fn is_complete(&self) -> bool {
        self.length_days > 0 && self.next_start().is_some()
    }

    /// First day of the following cycle, `None` on date overflow.
    pub fn next_start(&self) -> Option<NaiveDate> {
        self.start
            .checked_add_days(Days::new(u64::from(self.length_days)))
    }

    /// Whether `day` falls in `[start, start + length)`.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && self.next_start().is_some_and(|next| day < next)
    }
}

// ============================================
// Record sources
// ============================================

/// Supplies already-fetched records from the external record store.
pub trait RecordSource: Send + Sync {
    /// Full attack history.
    fn attacks(&self) -> Result<Vec<AttackRecord>>;

    /// Full health-event history.
    fn health_events(&self) -> Result<Vec<HealthEvent>>;
}

/// Supplies menstrual cycle samples from an external health-data source.
pub trait CycleSource: Send + Sync {
    fn cycle_samples(&self) -> Result<Vec<MenstrualCycleSample>>;
}

/// In-memory record history.
///
/// Also the JSON export format read by the report CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthHistory {
    #[serde(default)]
    pub attacks: Vec<AttackRecord>,
    #[serde(default)]
    pub health_events: Vec<HealthEvent>,
    #[serde(default)]
    pub cycle_samples: Vec<MenstrualCycleSample>,
}

impl HealthHistory {
    /// Load a history exported as JSON.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let history = serde_json::from_str(&content)?;
        Ok(history)
    }
}

impl RecordSource for HealthHistory {
    fn attacks(&self) -> Result<Vec<AttackRecord>> {
        Ok(self.attacks.clone())
    }

    fn health_events(&self) -> Result<Vec<HealthEvent>> {
        Ok(self.health_events.clone())
    }
}

impl CycleSource for HealthHistory {
    fn cycle_samples(&self) -> Result<Vec<MenstrualCycleSample>> {
        if self.cycle_samples.iter().any(|c| c.length_days > 366) {
            return Err(Error::Source(
                "cycle sample longer than a year; check the export".to_string(),
            ));
        }
        Ok(self.cycle_samples.clone())
    }
}
