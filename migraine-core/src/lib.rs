//! # migraine-core
//!
//! Core library for migraine-insight - a migraine diary analytics engine.
//!
//! This library provides:
//! - Domain types for attack records, health events and menstrual cycles
//! - Analytics over an injected record source
//! - A debounced, cancellation-safe recompute scheduler
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Records flow in one direction:
//! - **Source:** an external store behind [`RecordSource`] / [`CycleSource`]
//! - **Analytics:** pure analyzers producing immutable value objects
//! - **Cache:** one [`AnalyticsSnapshot`] per scheduler, replaced wholesale
//!
//! ## Example
//!
//! ```rust,no_run
//! use migraine_core::{AnalyticsEngine, Config, HealthHistory};
//! use std::sync::Arc;
//!
//! let config = Config::load().expect("failed to load config");
//! let history = HealthHistory::load_json("history.json".as_ref()).expect("failed to read history");
//! let engine = AnalyticsEngine::from_config(&config, Arc::new(history)).expect("invalid config");
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{AnalyticsEngine, AnalyticsSnapshot};
pub use calendar::{Calendar, MonthKey};
pub use config::Config;
pub use error::{Error, Result};
pub use scheduler::{CachedSnapshot, RecomputeRequest, RecomputeScheduler};
pub use types::*;

// Public modules
pub mod analytics;
pub mod calendar;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod scheduler;
pub mod types;
