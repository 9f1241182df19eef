//! Isolate QC
//!
//! Quality-control verdicts for bacterial isolate whole-genome sequencing.
//!
//! This library provides:
//! - Metric definitions, thresholds and YAML configuration
//! - Field extraction from fastp, sylph, stringMLST and KAT outputs
//! - Per-metric threshold evaluation and status tables
//! - The PASSED / WARNING / FAILED sample verdict
//! - Flat per-sample CSV/JSON records

pub mod adapters;
pub mod aggregate;
pub mod config;
pub mod contamination;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod extract;
pub mod inputs;
pub mod kmer;
pub mod metrics;
pub mod quality;
pub mod reference;
pub mod reporting;
pub mod table;
pub mod typing;

pub use aggregate::{aggregate, OverallStatus, Verdict};
pub use config::{QcConfig, QcProfile};
pub use engine::{QcEngine, SampleReport};
pub use error::{ConfigError, InputError, SampleError};
pub use evaluate::{evaluate, Observation, QcStatus, Reading};
pub use extract::SampleInputs;
pub use metrics::{MetricCatalog, MetricClass, MetricDefinition, MetricId};
pub use reporting::SampleRecord;
