//! Metric extraction
//!
//! Maps one sample's tool results onto a reading per catalog metric. Absent
//! inputs become `Reading::Missing` with the reason spelled out; nothing is
//! defaulted to zero. Only unit handling and simple ratios happen here, all
//! judging is left to the evaluator.

use crate::adapters::AdapterReport;
use crate::config::QcProfile;
use crate::contamination::ProfilerReport;
use crate::evaluate::Reading;
use crate::kmer::{KmerReport, KmerThresholds};
use crate::metrics::MetricId;
use crate::quality::{ReadQcReport, END_WINDOW};
use crate::reference::{ReferenceTable, SpeciesReference};
use crate::typing::TypingReport;
use serde::Serialize;
use std::collections::BTreeMap;

/// Parsed tool results for one sample
#[derive(Debug, Clone, Default)]
pub struct SampleInputs {
    pub sample_id: String,
    pub read_qc: Option<ReadQcReport>,
    pub profile: Option<ProfilerReport>,
    pub typing: Option<TypingReport>,
    pub kmer: Option<KmerReport>,
}

impl SampleInputs {
    pub fn new(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            ..Default::default()
        }
    }
}

/// Extracted fields that are reported but not judged
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleDetails {
    pub species: Vec<String>,
    pub species_abundance: Vec<f64>,
    pub species_coverage: Vec<Option<f64>>,
    pub genome_size_expected: Option<f64>,
    pub gc_content_lower: Option<f64>,
    pub gc_content_upper: Option<f64>,
    pub read_total_reads: Option<u64>,
    pub read_total_bases: Option<u64>,
    pub read_q20_rate: Option<f64>,
    pub read1_mean_length: Option<f64>,
    pub read2_mean_length: Option<f64>,
    pub mlst_st: Option<String>,
    pub kmer_total_kmers: Option<u64>,
    pub kmer_error_peak_cov: Option<u64>,
    pub kmer_mean_cov: Option<f64>,
    pub kmer_gcp_multi_modal: Option<bool>,
    pub kmer_gcp_lowcov_gc_prop: Option<f64>,
    pub kmer_flag_low_coverage: Option<bool>,
    pub kmer_flag_high_error: Option<bool>,
    pub kmer_flag_contamination: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Extraction {
    pub readings: BTreeMap<MetricId, Reading>,
    pub details: SampleDetails,
}

/// Everything derived once per sample before readings are built
struct Context<'a> {
    inputs: &'a SampleInputs,
    /// Read-QC result, only when it passes the read-count gate
    reads: Result<&'a ReadQcReport, String>,
    top_species: Option<&'a str>,
    reference: Option<&'a SpeciesReference>,
    adapters: Option<AdapterReport>,
}

pub struct MetricExtractor<'a> {
    profile: &'a QcProfile,
    reference: &'a ReferenceTable,
}

impl<'a> MetricExtractor<'a> {
    pub fn new(profile: &'a QcProfile, reference: &'a ReferenceTable) -> Self {
        Self { profile, reference }
    }

    /// One reading per catalog metric, plus descriptive fields
    pub fn extract(&self, inputs: &SampleInputs) -> Extraction {
        let reads = match &inputs.read_qc {
            None => Err("No read-QC result available.".to_string()),
            Some(qc) if !qc.has_reads(self.profile.min_reads) => Err(format!(
                "No reads processed ({} after filtering, {} required).",
                qc.total_reads.map_or("unknown".to_string(), |n| n.to_string()),
                self.profile.min_reads
            )),
            Some(qc) => Ok(qc),
        };
        let top_species = inputs
            .profile
            .as_ref()
            .and_then(|p| p.top())
            .map(|s| s.name.as_str());
        let ctx = Context {
            inputs,
            reads,
            top_species,
            reference: top_species.and_then(|s| self.reference.lookup(s)),
            adapters: inputs.read_qc.as_ref().map(AdapterReport::from_read_qc),
        };

        let readings = self
            .profile
            .catalog
            .ids()
            .map(|id| (id, self.reading(id, &ctx)))
            .collect();

        Extraction {
            readings,
            details: self.details(&ctx),
        }
    }

    fn reading(&self, id: MetricId, ctx: &Context) -> Reading {
        let label = id.info().label;
        match id {
            MetricId::ReadQ30 => read_metric(ctx, |qc| qc.q30_rate, label),
            MetricId::ReadLength => read_metric(ctx, |qc| qc.min_read_length(), label),
            MetricId::Duplication => read_metric(ctx, |qc| qc.duplication_rate, label),
            MetricId::NContent => read_metric(ctx, |qc| qc.n_content(), label),
            MetricId::InsertSize => read_metric(ctx, |qc| qc.insert_size_peak, label),
            MetricId::FilteringPassRate => read_metric(ctx, |qc| qc.filtering_pass_rate(), label),
            MetricId::QualityTrend => match &ctx.reads {
                Err(reason) => Reading::missing(reason.clone()),
                Ok(qc) => Reading::from_option(
                    qc.quality_end_drop(),
                    &format!("No per-cycle quality curve of at least {} cycles.", END_WINDOW),
                ),
            },
            MetricId::AdapterDetection | MetricId::AdapterOverrep => self.adapter_reading(id, ctx),

            MetricId::Contamination => match &ctx.inputs.profile {
                None => Reading::missing("No taxonomic profile available."),
                Some(profile) => Reading::from_option(
                    profile.contamination(),
                    "No species detected. Cannot determine contamination.",
                ),
            },
            MetricId::SpeciesCount => match &ctx.inputs.profile {
                None => Reading::missing("No taxonomic profile available."),
                Some(profile) => Reading::Value(profile.species_count() as f64),
            },
            MetricId::Coverage => match ctx.inputs.profile.as_ref().and_then(|p| p.top()) {
                None => Reading::missing("No species detected. Cannot estimate coverage."),
                Some(top) => Reading::from_option(
                    top.coverage,
                    &format!("Profiler reported no coverage for {}.", top.name),
                ),
            },
            MetricId::CoverageAlt => self.secondary_coverage(ctx),
            MetricId::GcContent => self.gc_content(ctx),

            MetricId::KmerMainCoverage | MetricId::KmerErrorProportion | MetricId::KmerGcCoverage => {
                self.kmer_reading(id, ctx)
            }

            MetricId::Mlst => match &ctx.inputs.typing {
                Some(typing) => Reading::Flag(typing.valid),
                None => Reading::missing("No sequence typing result."),
            },
        }
    }

    fn adapter_reading(&self, id: MetricId, ctx: &Context) -> Reading {
        if let Err(reason) = &ctx.reads {
            return Reading::missing(reason.clone());
        }
        let adapters = ctx.adapters.as_ref();
        match id {
            MetricId::AdapterDetection => match adapters.and_then(|a| a.detection_enabled) {
                Some(enabled) => Reading::Flag(enabled),
                None => Reading::missing("Read-QC command line was not recorded."),
            },
            _ => Reading::from_option(
                adapters.and_then(|a| a.overrepresented).map(|n| n as f64),
                "Read-QC result did not report overrepresented sequences.",
            ),
        }
    }

    /// Post-filter bases / expected genome size of the top species
    fn secondary_coverage(&self, ctx: &Context) -> Reading {
        let Some(species) = ctx.top_species else {
            return Reading::missing("No species detected. Cannot estimate genome size.");
        };
        let Some(genome_size) = ctx.reference.and_then(|r| r.genome_size).filter(|g| *g > 0.0) else {
            return Reading::missing(format!("No reference genome size for {}.", species));
        };
        match &ctx.reads {
            Err(reason) => Reading::missing(reason.clone()),
            Ok(qc) => match qc.total_bases {
                Some(bases) => Reading::Value(bases as f64 / genome_size),
                None => Reading::missing("Read-QC result did not report total bases."),
            },
        }
    }

    fn gc_content(&self, ctx: &Context) -> Reading {
        let Some(species) = ctx.top_species else {
            return Reading::missing("No species detected. Cannot determine expected GC content range.");
        };
        let Some(band) = ctx.reference.and_then(|r| r.gc_band) else {
            return Reading::missing(format!("No reference GC content range for {}.", species));
        };
        match &ctx.reads {
            Err(reason) => Reading::missing(reason.clone()),
            Ok(qc) => match qc.gc_content {
                Some(value) => Reading::InBand { value, band },
                None => Reading::missing("Read-QC result did not report GC content."),
            },
        }
    }

    fn kmer_reading(&self, id: MetricId, ctx: &Context) -> Reading {
        let Some(thresholds) = self.profile.kmer.as_ref() else {
            return Reading::missing("K-mer analysis is disabled.");
        };
        let Some(kmer) = &ctx.inputs.kmer else {
            return Reading::missing("No k-mer analysis result.");
        };
        match id {
            MetricId::KmerMainCoverage => match &kmer.histogram {
                None => Reading::missing("No k-mer histogram."),
                Some(hist) => Reading::from_option(
                    hist.main_peak_cov.map(|c| c as f64),
                    "No k-mer peak above the error region.",
                ),
            },
            MetricId::KmerErrorProportion => match &kmer.histogram {
                None => Reading::missing("No k-mer histogram."),
                Some(hist) => Reading::Value(hist.error_proportion),
            },
            _ => match kmer.contamination_suspected(thresholds) {
                None => Reading::missing("No k-mer GC x coverage matrix."),
                Some(suspected) => Reading::Flag(!suspected),
            },
        }
    }

    fn details(&self, ctx: &Context) -> SampleDetails {
        let inputs = ctx.inputs;
        let mut details = SampleDetails::default();

        if let Some(profile) = &inputs.profile {
            for species in profile.species() {
                details.species.push(species.name.clone());
                details.species_abundance.push(species.abundance);
                details.species_coverage.push(species.coverage);
            }
        }
        if let Some(reference) = ctx.reference {
            details.genome_size_expected = reference.genome_size;
            details.gc_content_lower = reference.gc_band.map(|b| b.lower);
            details.gc_content_upper = reference.gc_band.map(|b| b.upper);
        }
        if let Some(qc) = &inputs.read_qc {
            details.read_total_reads = qc.total_reads;
            details.read_total_bases = qc.total_bases;
            details.read_q20_rate = qc.q20_rate;
            details.read1_mean_length = qc.read1_mean_length;
            details.read2_mean_length = qc.read2_mean_length;
        }
        details.mlst_st = inputs.typing.as_ref().and_then(|t| t.st.clone());

        if let (Some(kmer), Some(thresholds)) = (&inputs.kmer, self.profile.kmer.as_ref()) {
            kmer_details(&mut details, kmer, thresholds);
        }
        details
    }
}

fn read_metric(ctx: &Context, field: impl Fn(&ReadQcReport) -> Option<f64>, label: &str) -> Reading {
    match &ctx.reads {
        Err(reason) => Reading::missing(reason.clone()),
        Ok(qc) => Reading::from_option(field(*qc), &format!("Read-QC result did not report {}.", label)),
    }
}

fn kmer_details(details: &mut SampleDetails, kmer: &KmerReport, thresholds: &KmerThresholds) {
    if let Some(hist) = &kmer.histogram {
        details.kmer_total_kmers = Some(hist.total_kmers);
        details.kmer_error_peak_cov = hist.error_peak_cov;
        details.kmer_mean_cov = Some(hist.mean_kmer_cov);
    }
    if let Some(gcp) = &kmer.gcp {
        details.kmer_gcp_multi_modal = Some(gcp.multi_modal);
        details.kmer_gcp_lowcov_gc_prop = Some(gcp.lowcov_gc_prop);
    }
    details.kmer_flag_low_coverage = kmer.low_coverage(thresholds);
    details.kmer_flag_high_error = kmer.high_error(thresholds);
    details.kmer_flag_contamination = kmer.contamination_suspected(thresholds);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QcConfig;
    use crate::contamination::{AbundanceBasis, SpeciesAbundance};
    use crate::kmer::HistogramSummary;
    use crate::metrics::Band;

    fn reference() -> ReferenceTable {
        let mut table = ReferenceTable::new();
        table.insert_genome_size("Escherichia coli", 4_500_000.0, 5_500_000.0);
        table.insert_gc_range("Escherichia coli", 50.0, 52.0);
        table.insert_genome_size("Unbanded species", 1_000_000.0, 1_000_000.0);
        table
    }

    fn read_qc() -> ReadQcReport {
        ReadQcReport {
            total_reads: Some(1_000_000),
            total_reads_before_filter: Some(1_050_000),
            total_bases: Some(240_000_000),
            q30_rate: Some(0.91),
            read1_mean_length: Some(150.0),
            read2_mean_length: Some(149.0),
            duplication_rate: Some(0.05),
            insert_size_peak: Some(350.0),
            too_many_n_reads: Some(10),
            gc_content: Some(0.507),
            command: Some("fastp --detect_adapter_for_pe".to_string()),
            overrepresented_sequences: Some(0),
            ..Default::default()
        }
    }

    fn profile(species: &str) -> ProfilerReport {
        ProfilerReport::new(
            vec![SpeciesAbundance::new(species, 97.0, Some(48.0))],
            None,
            AbundanceBasis::AllReads,
        )
    }

    fn inputs() -> SampleInputs {
        SampleInputs {
            read_qc: Some(read_qc()),
            profile: Some(profile("Escherichia coli")),
            typing: Some(TypingReport::from_st_call("131")),
            ..SampleInputs::new("s1")
        }
    }

    fn extract(inputs: &SampleInputs) -> Extraction {
        let profile = QcConfig::default().profile().unwrap();
        MetricExtractor::new(&profile, &reference()).extract(inputs)
    }

    #[test]
    fn test_every_catalog_metric_gets_a_reading() {
        let profile = QcConfig::default().profile().unwrap();
        let reference = reference();
        let extraction = MetricExtractor::new(&profile, &reference).extract(&inputs());
        let ids: Vec<MetricId> = extraction.readings.keys().copied().collect();
        let expected: Vec<MetricId> = profile.catalog.ids().collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_values_are_extracted_in_canonical_units() {
        let r = extract(&inputs()).readings;
        assert_eq!(r[&MetricId::ReadQ30], Reading::Value(0.91));
        assert_eq!(r[&MetricId::ReadLength], Reading::Value(149.0));
        assert_eq!(r[&MetricId::Coverage], Reading::Value(48.0));
        assert_eq!(r[&MetricId::CoverageAlt], Reading::Value(48.0));
        assert_eq!(
            r[&MetricId::GcContent],
            Reading::InBand { value: 0.507, band: Band::new(0.50, 0.52) }
        );
        assert_eq!(r[&MetricId::AdapterDetection], Reading::Flag(true));
        assert_eq!(r[&MetricId::AdapterOverrep], Reading::Value(0.0));
        assert_eq!(r[&MetricId::Mlst], Reading::Flag(true));
        assert_eq!(r[&MetricId::SpeciesCount], Reading::Value(1.0));
        match r[&MetricId::Contamination] {
            Reading::Value(v) => assert!((v - 0.03).abs() < 1e-12),
            ref other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_zero_reads_skip_read_metrics() {
        let mut inputs = inputs();
        inputs.read_qc = Some(ReadQcReport {
            total_reads: Some(0),
            ..read_qc()
        });
        let r = extract(&inputs).readings;
        for id in [
            MetricId::ReadQ30,
            MetricId::ReadLength,
            MetricId::Duplication,
            MetricId::NContent,
            MetricId::AdapterDetection,
            MetricId::AdapterOverrep,
            MetricId::InsertSize,
            MetricId::QualityTrend,
            MetricId::FilteringPassRate,
            MetricId::CoverageAlt,
            MetricId::GcContent,
        ] {
            match &r[&id] {
                Reading::Missing(reason) => assert!(reason.starts_with("No reads processed"), "{}", id),
                other => panic!("{} extracted {:?}", id, other),
            }
        }
        // Profiler-derived metrics do not depend on the read gate.
        assert_eq!(r[&MetricId::Coverage], Reading::Value(48.0));
    }

    #[test]
    fn test_unknown_species_skips_gc_and_secondary_coverage() {
        let mut inputs = inputs();
        inputs.profile = Some(profile("Bacillus subtilis"));
        let r = extract(&inputs).readings;
        assert!(matches!(&r[&MetricId::GcContent], Reading::Missing(m) if m.contains("Bacillus subtilis")));
        assert!(matches!(&r[&MetricId::CoverageAlt], Reading::Missing(m) if m.contains("genome size")));
    }

    #[test]
    fn test_species_without_gc_band() {
        let mut inputs = inputs();
        inputs.profile = Some(profile("Unbanded species"));
        let r = extract(&inputs).readings;
        assert!(matches!(r[&MetricId::GcContent], Reading::Missing(_)));
        assert_eq!(r[&MetricId::CoverageAlt], Reading::Value(240.0));
    }

    #[test]
    fn test_no_profile_at_all() {
        let mut inputs = inputs();
        inputs.profile = None;
        let r = extract(&inputs).readings;
        assert!(matches!(r[&MetricId::Contamination], Reading::Missing(_)));
        assert!(matches!(r[&MetricId::Coverage], Reading::Missing(_)));
        assert!(matches!(r[&MetricId::SpeciesCount], Reading::Missing(_)));
    }

    #[test]
    fn test_missing_fields_are_not_zero() {
        let mut inputs = inputs();
        inputs.read_qc = Some(ReadQcReport {
            duplication_rate: None,
            insert_size_peak: None,
            ..read_qc()
        });
        inputs.typing = None;
        let r = extract(&inputs).readings;
        assert!(matches!(r[&MetricId::Duplication], Reading::Missing(_)));
        assert!(matches!(r[&MetricId::InsertSize], Reading::Missing(_)));
        assert!(matches!(r[&MetricId::Mlst], Reading::Missing(_)));
    }

    #[test]
    fn test_kmer_readings_when_enabled() {
        let profile = QcConfig::from_yaml_str("kmer:\n  enabled: true\n")
            .unwrap()
            .profile()
            .unwrap();
        let reference = reference();
        let mut inputs = inputs();
        inputs.kmer = Some(KmerReport::new(
            HistogramSummary::from_rows(&[(1, 100), (30, 500)], 4),
            None,
        ));

        let extraction = MetricExtractor::new(&profile, &reference).extract(&inputs);
        let r = &extraction.readings;
        assert_eq!(r[&MetricId::KmerMainCoverage], Reading::Value(30.0));
        assert!(matches!(r[&MetricId::KmerErrorProportion], Reading::Value(_)));
        assert!(matches!(r[&MetricId::KmerGcCoverage], Reading::Missing(_)));
        assert_eq!(extraction.details.kmer_total_kmers, Some(600));
        assert_eq!(extraction.details.kmer_flag_low_coverage, Some(false));
    }

    #[test]
    fn test_details() {
        let details = extract(&inputs()).details;
        assert_eq!(details.species, vec!["Escherichia coli".to_string()]);
        assert_eq!(details.genome_size_expected, Some(5_000_000.0));
        assert_eq!(details.gc_content_lower, Some(0.50));
        assert_eq!(details.mlst_st.as_deref(), Some("131"));
        assert_eq!(details.read2_mean_length, Some(149.0));
        assert_eq!(details.kmer_total_kmers, None);
    }
}
