//! Error types
//!
//! Configuration problems are fatal at startup and name the offending metric.
//! Input problems belong to one sample and carry its identifier so a batch
//! driver can report them and move on to the next sample.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or unreadable QC configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("metric '{metric}' has neither a warn nor a fail threshold")]
    MissingThreshold { metric: &'static str },

    #[error("metric '{metric}' ({comparison}): warn threshold {warn} is on the wrong side of fail threshold {fail}")]
    InvertedThresholds {
        metric: &'static str,
        comparison: &'static str,
        warn: f64,
        fail: f64,
    },

    #[error("metric '{metric}': {field} is not a finite number")]
    NonFinite {
        metric: &'static str,
        field: &'static str,
    },

    #[error("setting '{setting}': {value} is not a fraction in [0, 1] (write \"{value}%\" for a percentage)")]
    FractionOutOfRange { setting: String, value: f64 },

    #[error("setting '{setting}': percentage '{value}' given for a value that is not a fraction")]
    UnexpectedPercent { setting: String, value: String },

    #[error("setting '{setting}': cannot parse '{value}' as a number or percentage")]
    InvalidThreshold { setting: String, value: String },

    #[error("metric '{metric}': range lower bound {lower} exceeds upper bound {upper}")]
    InvalidRange {
        metric: &'static str,
        lower: f64,
        upper: f64,
    },

    #[error("metric '{metric}': margin {margin} must not be negative")]
    NegativeMargin { metric: &'static str, margin: f64 },

    #[error("metric '{metric}' is defined more than once")]
    DuplicateMetric { metric: &'static str },
}

/// Failure to read or parse one upstream tool output
#[derive(Error, Debug)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid delimited record: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column '{column}' in {tool} output")]
    MissingColumn {
        tool: &'static str,
        column: &'static str,
    },

    #[error("malformed {tool} output: {details}")]
    Malformed { tool: &'static str, details: String },
}

/// An input failure attributed to a specific sample
#[derive(Error, Debug)]
#[error("sample '{sample_id}': {source}")]
pub struct SampleError {
    pub sample_id: String,
    #[source]
    pub source: InputError,
}

impl SampleError {
    pub fn new(sample_id: impl Into<String>, source: InputError) -> Self {
        Self {
            sample_id: sample_id.into(),
            source,
        }
    }
}
