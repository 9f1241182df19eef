//! Metric identities, classification and definitions
//!
//! Every quantity the engine can judge has a fixed identity (`MetricId`), a
//! biological role (`MetricClass`) and a comparison mode. Thresholds come from
//! configuration and are bound into a `MetricDefinition`; the set of
//! definitions active for a run forms the `MetricCatalog`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a metric in the overall verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricClass {
    /// FAILED (or SKIPPED) here forces the sample to FAILED
    Critical,
    /// The paired coverage estimators, judged jointly
    Coverage,
    /// Can raise the verdict to WARNING, never to FAILED
    Advisory,
    /// Reported only
    Informational,
}

/// Direction in which a metric's value is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Comparison {
    HigherIsBetter,
    LowerIsBetter,
    RangeBound,
    BooleanFlag,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::HigherIsBetter => "higher-is-better",
            Comparison::LowerIsBetter => "lower-is-better",
            Comparison::RangeBound => "range-bound",
            Comparison::BooleanFlag => "boolean-flag",
        }
    }
}

/// Representation of a metric's value
///
/// `Percentage` and `Fraction` are both held internally as fractions in
/// `[0, 1]`; they differ only in how values are rendered in messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Float,
    Integer,
    Percentage,
    Fraction,
    Boolean,
}

impl ValueType {
    /// True when configuration values for this type are fractions
    pub fn is_fractional(&self) -> bool {
        matches!(self, ValueType::Percentage | ValueType::Fraction)
    }

    /// Render a value for a human-readable message
    pub fn format(&self, value: f64, unit: &str) -> String {
        match self {
            ValueType::Float => format!("{:.2}{}", value, unit),
            ValueType::Integer => format!("{:.0}{}", value, unit),
            ValueType::Percentage => format!("{:.2}%", value * 100.0),
            ValueType::Fraction => format!("{:.3}", value),
            ValueType::Boolean => {
                if value != 0.0 {
                    "yes".to_string()
                } else {
                    "no".to_string()
                }
            }
        }
    }
}

/// Closed set of metrics known to the engine
///
/// Declaration order is catalog order: it fixes the column order of output
/// records and the order of contributing metrics in a verdict. Optional
/// metrics come last so enabling them only appends columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricId {
    ReadQ30,
    ReadLength,
    Contamination,
    GcContent,
    Coverage,
    CoverageAlt,
    Duplication,
    NContent,
    AdapterDetection,
    AdapterOverrep,
    InsertSize,
    QualityTrend,
    FilteringPassRate,
    SpeciesCount,
    Mlst,
    KmerMainCoverage,
    KmerErrorProportion,
    KmerGcCoverage,
}

impl MetricId {
    pub const ALL: [MetricId; 18] = [
        MetricId::ReadQ30,
        MetricId::ReadLength,
        MetricId::Contamination,
        MetricId::GcContent,
        MetricId::Coverage,
        MetricId::CoverageAlt,
        MetricId::Duplication,
        MetricId::NContent,
        MetricId::AdapterDetection,
        MetricId::AdapterOverrep,
        MetricId::InsertSize,
        MetricId::QualityTrend,
        MetricId::FilteringPassRate,
        MetricId::SpeciesCount,
        MetricId::Mlst,
        MetricId::KmerMainCoverage,
        MetricId::KmerErrorProportion,
        MetricId::KmerGcCoverage,
    ];

    /// Metrics that only exist when k-mer analysis is enabled
    pub const KMER: [MetricId; 3] = [
        MetricId::KmerMainCoverage,
        MetricId::KmerErrorProportion,
        MetricId::KmerGcCoverage,
    ];

    pub fn info(&self) -> &'static MetricInfo {
        &METRIC_TABLE[*self as usize]
    }

    /// Stable record key prefix
    pub fn key(&self) -> &'static str {
        self.info().key
    }

    pub fn class(&self) -> MetricClass {
        self.info().class
    }

    pub fn comparison(&self) -> Comparison {
        self.info().comparison
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Static, configuration-independent facts about a metric
#[derive(Debug)]
pub struct MetricInfo {
    pub id: MetricId,
    pub key: &'static str,
    pub label: &'static str,
    pub class: MetricClass,
    pub comparison: Comparison,
    pub value_type: ValueType,
    pub unit: &'static str,
    /// What a WARNING means for this metric
    pub warn_hint: &'static str,
    /// What a FAILED means for this metric
    pub fail_hint: &'static str,
}

// Indexed by `MetricId as usize`; keep in declaration order.
static METRIC_TABLE: [MetricInfo; 18] = [
    MetricInfo {
        id: MetricId::ReadQ30,
        key: "read_q30",
        label: "Q30 rate",
        class: MetricClass::Critical,
        comparison: Comparison::HigherIsBetter,
        value_type: ValueType::Fraction,
        unit: "",
        warn_hint: "borderline base-call quality",
        fail_hint: "base-call quality too low for reliable analysis",
    },
    MetricInfo {
        id: MetricId::ReadLength,
        key: "read_length",
        label: "mean read length (shorter direction)",
        class: MetricClass::Critical,
        comparison: Comparison::HigherIsBetter,
        value_type: ValueType::Integer,
        unit: "bp",
        warn_hint: "reads shorter than expected",
        fail_hint: "reads too short for reliable analysis",
    },
    MetricInfo {
        id: MetricId::Contamination,
        key: "contamination",
        label: "contamination",
        class: MetricClass::Critical,
        comparison: Comparison::LowerIsBetter,
        value_type: ValueType::Percentage,
        unit: "",
        warn_hint: "reads from other species or unassigned reads present",
        fail_hint: "sample is not a pure isolate",
    },
    MetricInfo {
        id: MetricId::GcContent,
        key: "gc_content",
        label: "GC content",
        class: MetricClass::Critical,
        comparison: Comparison::RangeBound,
        value_type: ValueType::Percentage,
        unit: "",
        warn_hint: "near the expected range for the detected species",
        fail_hint: "inconsistent with the detected species",
    },
    MetricInfo {
        id: MetricId::Coverage,
        key: "coverage",
        label: "profiler coverage estimate",
        class: MetricClass::Coverage,
        comparison: Comparison::HigherIsBetter,
        value_type: ValueType::Float,
        unit: "x",
        warn_hint: "coverage is marginal",
        fail_hint: "insufficient coverage",
    },
    MetricInfo {
        id: MetricId::CoverageAlt,
        key: "coverage_alt",
        label: "bases / genome size coverage estimate",
        class: MetricClass::Coverage,
        comparison: Comparison::HigherIsBetter,
        value_type: ValueType::Float,
        unit: "x",
        warn_hint: "coverage is marginal",
        fail_hint: "insufficient coverage",
    },
    MetricInfo {
        id: MetricId::Duplication,
        key: "duplication",
        label: "duplication rate",
        class: MetricClass::Advisory,
        comparison: Comparison::LowerIsBetter,
        value_type: ValueType::Percentage,
        unit: "",
        warn_hint: "possible PCR bias or low library complexity",
        fail_hint: "high PCR bias",
    },
    MetricInfo {
        id: MetricId::NContent,
        key: "n_content",
        label: "N-content",
        class: MetricClass::Advisory,
        comparison: Comparison::LowerIsBetter,
        value_type: ValueType::Percentage,
        unit: "",
        warn_hint: "indicates base-calling uncertainty",
        fail_hint: "excessive base-calling uncertainty",
    },
    MetricInfo {
        id: MetricId::AdapterDetection,
        key: "adapter_detection",
        label: "adapter auto-detection enabled",
        class: MetricClass::Advisory,
        comparison: Comparison::BooleanFlag,
        value_type: ValueType::Boolean,
        unit: "",
        warn_hint: "adapter auto-detection was not enabled; adapters may remain in reads",
        fail_hint: "",
    },
    MetricInfo {
        id: MetricId::AdapterOverrep,
        key: "adapter_overrep",
        label: "overrepresented sequences",
        class: MetricClass::Advisory,
        comparison: Comparison::LowerIsBetter,
        value_type: ValueType::Integer,
        unit: "",
        warn_hint: "may indicate minor adapter contamination or repetitive sequences",
        fail_hint: "indicates significant adapter contamination or other contaminants",
    },
    MetricInfo {
        id: MetricId::InsertSize,
        key: "insert_size",
        label: "insert size peak",
        class: MetricClass::Advisory,
        comparison: Comparison::RangeBound,
        value_type: ValueType::Integer,
        unit: "bp",
        warn_hint: "unusual library fragment size",
        fail_hint: "library fragment size far outside the expected range",
    },
    MetricInfo {
        id: MetricId::QualityTrend,
        key: "quality_trend",
        label: "quality end-drop",
        class: MetricClass::Advisory,
        comparison: Comparison::LowerIsBetter,
        value_type: ValueType::Float,
        unit: " Phred",
        warn_hint: "end-drop detected; possible sequencer degradation",
        fail_hint: "severe end-drop; sequencer degradation",
    },
    MetricInfo {
        id: MetricId::FilteringPassRate,
        key: "filtering",
        label: "filtering pass rate",
        class: MetricClass::Advisory,
        comparison: Comparison::HigherIsBetter,
        value_type: ValueType::Percentage,
        unit: "",
        warn_hint: "a notable share of reads was filtered out",
        fail_hint: "most reads were filtered out",
    },
    MetricInfo {
        id: MetricId::SpeciesCount,
        key: "species_count",
        label: "detected species",
        class: MetricClass::Advisory,
        comparison: Comparison::LowerIsBetter,
        value_type: ValueType::Integer,
        unit: "",
        warn_hint: "multiple species detected; the top species is used downstream",
        fail_hint: "many species detected",
    },
    MetricInfo {
        id: MetricId::Mlst,
        key: "mlst",
        label: "valid sequence type",
        class: MetricClass::Informational,
        comparison: Comparison::BooleanFlag,
        value_type: ValueType::Boolean,
        unit: "",
        warn_hint: "no valid sequence type assigned",
        fail_hint: "",
    },
    MetricInfo {
        id: MetricId::KmerMainCoverage,
        key: "kmer_main_coverage",
        label: "k-mer main peak coverage",
        class: MetricClass::Advisory,
        comparison: Comparison::HigherIsBetter,
        value_type: ValueType::Float,
        unit: "x",
        warn_hint: "low k-mer coverage",
        fail_hint: "very low k-mer coverage",
    },
    MetricInfo {
        id: MetricId::KmerErrorProportion,
        key: "kmer_error_proportion",
        label: "k-mer error-region proportion",
        class: MetricClass::Advisory,
        comparison: Comparison::LowerIsBetter,
        value_type: ValueType::Percentage,
        unit: "",
        warn_hint: "elevated sequencing error k-mers",
        fail_hint: "excessive sequencing error k-mers",
    },
    MetricInfo {
        id: MetricId::KmerGcCoverage,
        key: "kmer_gc_coverage",
        label: "GC x coverage profile unimodal",
        class: MetricClass::Advisory,
        comparison: Comparison::BooleanFlag,
        value_type: ValueType::Boolean,
        unit: "",
        warn_hint: "k-mer GC x coverage profile suggests contamination",
        fail_hint: "",
    },
];

/// Closed interval `[lower, upper]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower: f64,
    pub upper: f64,
}

impl Band {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn widen(&self, margin: f64) -> Band {
        Band::new(self.lower - margin, self.upper + margin)
    }
}

/// A metric bound to its configured thresholds
///
/// Built once at startup through the validating constructors; immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    id: MetricId,
    warn: Option<f64>,
    fail: Option<f64>,
    band: Option<Band>,
    margin: f64,
}

impl MetricDefinition {
    /// Tiered definition for higher- or lower-is-better metrics
    pub fn tiered(id: MetricId, warn: Option<f64>, fail: Option<f64>) -> Result<Self, ConfigError> {
        let metric = id.key();
        let comparison = id.comparison();
        debug_assert!(matches!(
            comparison,
            Comparison::HigherIsBetter | Comparison::LowerIsBetter
        ));

        if warn.is_none() && fail.is_none() {
            return Err(ConfigError::MissingThreshold { metric });
        }
        if warn.is_some_and(|w| !w.is_finite()) {
            return Err(ConfigError::NonFinite { metric, field: "warn" });
        }
        if fail.is_some_and(|f| !f.is_finite()) {
            return Err(ConfigError::NonFinite { metric, field: "fail" });
        }
        if let (Some(warn), Some(fail)) = (warn, fail) {
            let inverted = match comparison {
                Comparison::LowerIsBetter => warn > fail,
                _ => warn < fail,
            };
            if inverted {
                return Err(ConfigError::InvertedThresholds {
                    metric,
                    comparison: comparison.as_str(),
                    warn,
                    fail,
                });
            }
        }

        Ok(Self {
            id,
            warn,
            fail,
            band: None,
            margin: 0.0,
        })
    }

    /// Range-bound definition; `band` is `None` when it is looked up per sample
    pub fn ranged(id: MetricId, band: Option<Band>, margin: f64) -> Result<Self, ConfigError> {
        let metric = id.key();
        debug_assert_eq!(id.comparison(), Comparison::RangeBound);

        if !margin.is_finite() {
            return Err(ConfigError::NonFinite { metric, field: "margin" });
        }
        if margin < 0.0 {
            return Err(ConfigError::NegativeMargin { metric, margin });
        }
        if let Some(band) = band {
            if !band.lower.is_finite() || !band.upper.is_finite() {
                return Err(ConfigError::NonFinite { metric, field: "range" });
            }
            if band.lower > band.upper {
                return Err(ConfigError::InvalidRange {
                    metric,
                    lower: band.lower,
                    upper: band.upper,
                });
            }
        }

        Ok(Self {
            id,
            warn: None,
            fail: None,
            band,
            margin,
        })
    }

    pub fn flag(id: MetricId) -> Self {
        debug_assert_eq!(id.comparison(), Comparison::BooleanFlag);
        Self {
            id,
            warn: None,
            fail: None,
            band: None,
            margin: 0.0,
        }
    }

    pub fn id(&self) -> MetricId {
        self.id
    }

    pub fn info(&self) -> &'static MetricInfo {
        self.id.info()
    }

    pub fn warn(&self) -> Option<f64> {
        self.warn
    }

    pub fn fail(&self) -> Option<f64> {
        self.fail
    }

    pub fn band(&self) -> Option<Band> {
        self.band
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Render a value in this metric's units
    pub fn display(&self, value: f64) -> String {
        let info = self.info();
        info.value_type.format(value, info.unit)
    }
}

/// The metric definitions active for one configuration profile
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    definitions: Vec<MetricDefinition>,
}

impl MetricCatalog {
    pub fn new(mut definitions: Vec<MetricDefinition>) -> Result<Self, ConfigError> {
        definitions.sort_by_key(|d| d.id());
        for pair in definitions.windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(ConfigError::DuplicateMetric {
                    metric: pair[0].id().key(),
                });
            }
        }
        Ok(Self { definitions })
    }

    pub fn get(&self, id: MetricId) -> Option<&MetricDefinition> {
        self.definitions
            .binary_search_by_key(&id, |d| d.id())
            .ok()
            .map(|idx| &self.definitions[idx])
    }

    pub fn contains(&self, id: MetricId) -> bool {
        self.get(id).is_some()
    }

    /// Definitions in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = MetricId> + '_ {
        self.definitions.iter().map(|d| d.id())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
