//! QC configuration
//!
//! Thresholds are read from one YAML document, validated once, and turned
//! into an immutable [`QcProfile`] that every sample is judged against.
//!
//! Fraction-valued settings (rates, proportions, contamination) are written
//! either as a plain number in `[0, 1]` or as a percentage string such as
//! `"5%"`. A bare number above 1 for such a setting is rejected rather than
//! guessed at.
//!
//! ```yaml
//! coverage: { warn: 30, fail: 20 }
//! contamination: { warn: "5%", fail: "10%" }
//! q30: { warn: 0.80, fail: 0.70 }
//! kmer:
//!   enabled: true
//! ```

use crate::error::ConfigError;
use crate::kmer::KmerThresholds;
use crate::metrics::{Band, MetricCatalog, MetricDefinition, MetricId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A threshold as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdValue {
    Number(f64),
    Text(String),
}

impl ThresholdValue {
    pub fn percent(value: f64) -> Self {
        ThresholdValue::Text(format!("{}%", value))
    }

    /// Convert to the canonical internal value
    ///
    /// Fractional settings come back in `[0, 1]`; everything else as written.
    pub fn resolve(&self, setting: &str, fractional: bool) -> Result<f64, ConfigError> {
        let value = match self {
            ThresholdValue::Number(v) => *v,
            ThresholdValue::Text(text) => {
                let text = text.trim();
                match text.strip_suffix('%') {
                    Some(number) => {
                        if !fractional {
                            return Err(ConfigError::UnexpectedPercent {
                                setting: setting.to_string(),
                                value: text.to_string(),
                            });
                        }
                        let pct: f64 = number.trim().parse().map_err(|_| ConfigError::InvalidThreshold {
                            setting: setting.to_string(),
                            value: text.to_string(),
                        })?;
                        pct / 100.0
                    }
                    None => text.parse().map_err(|_| ConfigError::InvalidThreshold {
                        setting: setting.to_string(),
                        value: text.to_string(),
                    })?,
                }
            }
        };

        if fractional && !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::FractionOutOfRange {
                setting: setting.to_string(),
                value,
            });
        }
        Ok(value)
    }
}

impl From<f64> for ThresholdValue {
    fn from(value: f64) -> Self {
        ThresholdValue::Number(value)
    }
}

/// WARN/FAIL pair; at least one must be set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierThresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warn: Option<ThresholdValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail: Option<ThresholdValue>,
}

impl TierThresholds {
    pub fn new(warn: Option<f64>, fail: Option<f64>) -> Self {
        Self {
            warn: warn.map(ThresholdValue::from),
            fail: fail.map(ThresholdValue::from),
        }
    }

    fn definition(&self, id: MetricId, group: &str) -> Result<MetricDefinition, ConfigError> {
        let fractional = id.info().value_type.is_fractional();
        let warn = self
            .warn
            .as_ref()
            .map(|v| v.resolve(&format!("{}.warn", group), fractional))
            .transpose()?;
        let fail = self
            .fail
            .as_ref()
            .map(|v| v.resolve(&format!("{}.fail", group), fractional))
            .transpose()?;
        MetricDefinition::tiered(id, warn, fail)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsertSizeConfig {
    pub min: f64,
    pub max: f64,
    pub margin: f64,
}

impl Default for InsertSizeConfig {
    fn default() -> Self {
        Self {
            min: 200.0,
            max: 600.0,
            margin: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KmerConfig {
    pub enabled: bool,
    /// Histogram coverage at or below which k-mers count as errors
    pub error_cov_cutoff: u32,
    pub error_prop_warn: ThresholdValue,
    pub main_cov_low: f64,
    pub multi_modal_bin_prop: ThresholdValue,
    pub lowcov_gc_prop_warn: ThresholdValue,
}

impl Default for KmerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            error_cov_cutoff: 4,
            error_prop_warn: 0.05.into(),
            main_cov_low: 10.0,
            multi_modal_bin_prop: 0.1.into(),
            lowcov_gc_prop_warn: 0.02.into(),
        }
    }
}

impl KmerConfig {
    pub fn thresholds(&self) -> Result<KmerThresholds, ConfigError> {
        if !self.main_cov_low.is_finite() || self.main_cov_low < 0.0 {
            return Err(ConfigError::NonFinite {
                metric: MetricId::KmerMainCoverage.key(),
                field: "main_cov_low",
            });
        }
        Ok(KmerThresholds {
            error_cov_cutoff: self.error_cov_cutoff,
            error_prop_warn: self.error_prop_warn.resolve("kmer.error_prop_warn", true)?,
            main_cov_low: self.main_cov_low,
            multi_modal_bin_prop: self
                .multi_modal_bin_prop
                .resolve("kmer.multi_modal_bin_prop", true)?,
            lowcov_gc_prop_warn: self
                .lowcov_gc_prop_warn
                .resolve("kmer.lowcov_gc_prop_warn", true)?,
        })
    }
}

/// Raw configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QcConfig {
    /// Post-filter reads required before read-derived metrics are judged
    pub min_reads: u64,
    pub coverage: TierThresholds,
    pub contamination: TierThresholds,
    pub q30: TierThresholds,
    pub read_length: TierThresholds,
    pub duplication: TierThresholds,
    /// Absolute tolerance around the species GC band
    pub gc_fail_margin: ThresholdValue,
    pub n_content: TierThresholds,
    pub adapter_overrep: TierThresholds,
    pub insert_size: InsertSizeConfig,
    pub quality_end_drop: TierThresholds,
    pub filtering_pass_rate: TierThresholds,
    pub species_count: TierThresholds,
    pub kmer: KmerConfig,
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            min_reads: 1,
            coverage: TierThresholds::new(Some(30.0), Some(20.0)),
            contamination: TierThresholds::new(Some(0.05), Some(0.10)),
            q30: TierThresholds::new(Some(0.80), Some(0.70)),
            read_length: TierThresholds::new(Some(100.0), Some(75.0)),
            duplication: TierThresholds::new(Some(0.20), Some(0.30)),
            gc_fail_margin: 0.025.into(),
            n_content: TierThresholds::new(Some(0.001), None),
            adapter_overrep: TierThresholds::new(Some(0.0), Some(5.0)),
            insert_size: InsertSizeConfig::default(),
            quality_end_drop: TierThresholds::new(Some(5.0), None),
            filtering_pass_rate: TierThresholds::new(Some(0.95), None),
            species_count: TierThresholds::new(Some(1.0), None),
            kmer: KmerConfig::default(),
        }
    }
}

impl QcConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Validate everything and build the immutable profile
    pub fn profile(&self) -> Result<QcProfile, ConfigError> {
        let gc_margin = self.gc_fail_margin.resolve("gc_fail_margin", true)?;

        let mut definitions = vec![
            self.q30.definition(MetricId::ReadQ30, "q30")?,
            self.read_length.definition(MetricId::ReadLength, "read_length")?,
            self.contamination.definition(MetricId::Contamination, "contamination")?,
            MetricDefinition::ranged(MetricId::GcContent, None, gc_margin)?,
            self.coverage.definition(MetricId::Coverage, "coverage")?,
            self.coverage.definition(MetricId::CoverageAlt, "coverage")?,
            self.duplication.definition(MetricId::Duplication, "duplication")?,
            self.n_content.definition(MetricId::NContent, "n_content")?,
            MetricDefinition::flag(MetricId::AdapterDetection),
            self.adapter_overrep.definition(MetricId::AdapterOverrep, "adapter_overrep")?,
            MetricDefinition::ranged(
                MetricId::InsertSize,
                Some(Band::new(self.insert_size.min, self.insert_size.max)),
                self.insert_size.margin,
            )?,
            self.quality_end_drop.definition(MetricId::QualityTrend, "quality_end_drop")?,
            self.filtering_pass_rate
                .definition(MetricId::FilteringPassRate, "filtering_pass_rate")?,
            self.species_count.definition(MetricId::SpeciesCount, "species_count")?,
            MetricDefinition::flag(MetricId::Mlst),
        ];

        let kmer = if self.kmer.enabled {
            let thresholds = self.kmer.thresholds()?;
            definitions.push(MetricDefinition::tiered(
                MetricId::KmerMainCoverage,
                Some(thresholds.main_cov_low),
                None,
            )?);
            definitions.push(MetricDefinition::tiered(
                MetricId::KmerErrorProportion,
                Some(thresholds.error_prop_warn),
                None,
            )?);
            definitions.push(MetricDefinition::flag(MetricId::KmerGcCoverage));
            Some(thresholds)
        } else {
            None
        };

        let catalog = MetricCatalog::new(definitions)?;
        debug!(
            "Built QC profile with {} metrics (k-mer analysis {})",
            catalog.len(),
            if kmer.is_some() { "enabled" } else { "disabled" }
        );

        Ok(QcProfile {
            catalog,
            min_reads: self.min_reads,
            kmer,
        })
    }
}

/// Validated, read-only configuration shared by all samples of a run
#[derive(Debug, Clone)]
pub struct QcProfile {
    pub catalog: MetricCatalog,
    pub min_reads: u64,
    /// Present only when k-mer analysis is enabled
    pub kmer: Option<KmerThresholds>,
}

impl QcProfile {
    pub fn default_profile() -> Result<Self, ConfigError> {
        QcConfig::default().profile()
    }
}
