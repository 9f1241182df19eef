//! Threshold evaluation
//!
//! One generic evaluator turns a metric reading into a status and a message,
//! branching only on the metric's comparison mode. The evaluator is a pure
//! function: the same definition and reading always give the same
//! observation, byte for byte.

use crate::metrics::{Band, Comparison, MetricDefinition, MetricId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome for a single metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QcStatus {
    Passed,
    Warning,
    Failed,
    Skipped,
}

impl QcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcStatus::Passed => "PASSED",
            QcStatus::Warning => "WARNING",
            QcStatus::Failed => "FAILED",
            QcStatus::Skipped => "SKIPPED",
        }
    }

    /// WARNING or FAILED
    pub fn is_concern(&self) -> bool {
        matches!(self, QcStatus::Warning | QcStatus::Failed)
    }
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw value handed to the evaluator, already in canonical units
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Not reported, or a prerequisite is absent; the reason ends up in the message
    Missing(String),
    Value(f64),
    Flag(bool),
    /// A value judged against a band resolved for this sample
    InBand { value: f64, band: Band },
}

impl Reading {
    pub fn missing(reason: impl Into<String>) -> Self {
        Reading::Missing(reason.into())
    }

    /// `Value` when present, otherwise `Missing` with the given reason
    pub fn from_option(value: Option<f64>, reason: &str) -> Self {
        match value {
            Some(v) => Reading::Value(v),
            None => Reading::missing(reason),
        }
    }
}

/// The judged state of one metric for one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    metric: MetricId,
    raw_value: Option<f64>,
    status: QcStatus,
    message: String,
}

impl Observation {
    pub fn skipped(metric: MetricId, reason: impl Into<String>) -> Self {
        Self {
            metric,
            raw_value: None,
            status: QcStatus::Skipped,
            message: reason.into(),
        }
    }

    fn judged(metric: MetricId, raw_value: f64, status: QcStatus, message: String) -> Self {
        Self {
            metric,
            raw_value: Some(raw_value),
            status,
            message,
        }
    }

    #[cfg(test)]
    pub(crate) fn fixture(metric: MetricId, status: QcStatus) -> Self {
        let raw_value = (status != QcStatus::Skipped).then_some(1.0);
        Self {
            metric,
            raw_value,
            status,
            message: format!("{} {}", metric, status),
        }
    }

    pub fn metric(&self) -> MetricId {
        self.metric
    }

    pub fn raw_value(&self) -> Option<f64> {
        self.raw_value
    }

    pub fn status(&self) -> QcStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Judge one reading against a metric definition
///
/// Missing readings are never an error; they come back as `SKIPPED`. A
/// reading whose kind does not fit the metric's comparison mode means the
/// extractor and the metric table disagree, and panics.
pub fn evaluate(definition: &MetricDefinition, reading: &Reading) -> Observation {
    let id = definition.id();
    match (id.comparison(), reading) {
        (_, Reading::Missing(reason)) => Observation::skipped(id, reason.clone()),
        (_, Reading::Value(v) | Reading::InBand { value: v, .. }) if !v.is_finite() => {
            Observation::skipped(id, format!("{} reported a non-numeric value.", id.info().label))
        }
        (Comparison::HigherIsBetter, Reading::Value(v)) => tiered(definition, *v, true),
        (Comparison::LowerIsBetter, Reading::Value(v)) => tiered(definition, *v, false),
        (Comparison::RangeBound, Reading::Value(v)) => match definition.band() {
            Some(band) => ranged(definition, *v, band),
            None => Observation::skipped(
                id,
                format!("No expected range available for {}.", id.info().label),
            ),
        },
        (Comparison::RangeBound, Reading::InBand { value, band }) => ranged(definition, *value, *band),
        (Comparison::BooleanFlag, Reading::Flag(flag)) => boolean(definition, *flag),
        (comparison, reading) => panic!(
            "metric '{}' is {} and cannot be evaluated from {:?}",
            id,
            comparison.as_str(),
            reading
        ),
    }
}

fn with_hint(message: String, hint: &str) -> String {
    if hint.is_empty() {
        format!("{}.", message)
    } else {
        format!("{}: {}.", message, hint)
    }
}

fn tiered(definition: &MetricDefinition, value: f64, higher_is_better: bool) -> Observation {
    let id = definition.id();
    let info = definition.info();
    let shown = definition.display(value);
    let passes = |threshold: f64| {
        if higher_is_better {
            value >= threshold
        } else {
            value <= threshold
        }
    };
    let (meets, beyond) = if higher_is_better {
        ("meets", "is below")
    } else {
        ("is within", "exceeds")
    };

    let (status, message) = match (definition.warn(), definition.fail()) {
        (Some(warn), Some(fail)) => {
            let warn_shown = definition.display(warn);
            let fail_shown = definition.display(fail);
            if passes(warn) {
                (
                    QcStatus::Passed,
                    format!("{} {} {} the warn threshold ({}).", info.label, shown, meets, warn_shown),
                )
            } else if passes(fail) {
                (
                    QcStatus::Warning,
                    with_hint(
                        format!(
                            "{} {} is between warn ({}) and fail ({}) thresholds",
                            info.label, shown, warn_shown, fail_shown
                        ),
                        info.warn_hint,
                    ),
                )
            } else {
                (
                    QcStatus::Failed,
                    with_hint(
                        format!("{} {} {} the fail threshold ({})", info.label, shown, beyond, fail_shown),
                        info.fail_hint,
                    ),
                )
            }
        }
        (Some(warn), None) => {
            let warn_shown = definition.display(warn);
            if passes(warn) {
                (
                    QcStatus::Passed,
                    format!("{} {} {} the threshold ({}).", info.label, shown, meets, warn_shown),
                )
            } else {
                (
                    QcStatus::Warning,
                    with_hint(
                        format!("{} {} {} the warn threshold ({})", info.label, shown, beyond, warn_shown),
                        info.warn_hint,
                    ),
                )
            }
        }
        (None, Some(fail)) => {
            let fail_shown = definition.display(fail);
            if passes(fail) {
                (
                    QcStatus::Passed,
                    format!("{} {} {} the threshold ({}).", info.label, shown, meets, fail_shown),
                )
            } else {
                (
                    QcStatus::Failed,
                    with_hint(
                        format!("{} {} {} the fail threshold ({})", info.label, shown, beyond, fail_shown),
                        info.fail_hint,
                    ),
                )
            }
        }
        (None, None) => {
            return Observation::skipped(id, format!("No thresholds configured for {}.", info.label));
        }
    };

    Observation::judged(id, value, status, message)
}

fn ranged(definition: &MetricDefinition, value: f64, band: Band) -> Observation {
    let info = definition.info();
    let shown = definition.display(value);
    let tolerated = band.widen(definition.margin());
    let range = format!("{}-{}", definition.display(band.lower), definition.display(band.upper));
    let tolerated_range = format!(
        "{}-{}",
        definition.display(tolerated.lower),
        definition.display(tolerated.upper)
    );

    let (status, message) = if band.contains(value) {
        (
            QcStatus::Passed,
            format!("{} {} is within the expected range ({}).", info.label, shown, range),
        )
    } else if tolerated.contains(value) {
        (
            QcStatus::Warning,
            with_hint(
                format!(
                    "{} {} is outside the expected range ({}) but within the tolerated range ({})",
                    info.label, shown, range, tolerated_range
                ),
                info.warn_hint,
            ),
        )
    } else {
        (
            QcStatus::Failed,
            with_hint(
                format!(
                    "{} {} is outside the tolerated range ({})",
                    info.label, shown, tolerated_range
                ),
                info.fail_hint,
            ),
        )
    };

    Observation::judged(definition.id(), value, status, message)
}

fn boolean(definition: &MetricDefinition, flag: bool) -> Observation {
    let info = definition.info();
    let raw = if flag { 1.0 } else { 0.0 };
    if flag {
        Observation::judged(definition.id(), raw, QcStatus::Passed, format!("{}: yes.", info.label))
    } else {
        Observation::judged(
            definition.id(),
            raw,
            QcStatus::Warning,
            with_hint(format!("{}: no", info.label), info.warn_hint),
        )
    }
}
