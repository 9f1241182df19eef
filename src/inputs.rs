//! Loading one sample's tool outputs from disk
//!
//! Any read or parse failure is tagged with the sample id so a batch driver
//! can report it and carry on with the other samples.

use crate::config::QcProfile;
use crate::contamination::ProfilerReport;
use crate::error::{InputError, SampleError};
use crate::extract::SampleInputs;
use crate::kmer::{GcpSummary, HistogramSummary, KmerReport};
use crate::quality::ReadQcReport;
use crate::typing::TypingReport;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where one sample's tool outputs live
#[derive(Debug, Clone, Default)]
pub struct SamplePaths {
    pub sample_id: String,
    pub fastp_json: Option<PathBuf>,
    pub sylph_tsv: Option<PathBuf>,
    pub mlst_tsv: Option<PathBuf>,
    pub kat_hist: Option<PathBuf>,
    pub kat_gcp: Option<PathBuf>,
}

impl SamplePaths {
    pub fn new(sample_id: impl Into<String>) -> Self {
        Self {
            sample_id: sample_id.into(),
            ..Default::default()
        }
    }

    /// Read and parse every file that is set
    pub fn load(&self, profile: &QcProfile) -> Result<SampleInputs, SampleError> {
        self.load_inner(profile)
            .map_err(|source| SampleError::new(self.sample_id.clone(), source))
    }

    fn load_inner(&self, profile: &QcProfile) -> Result<SampleInputs, InputError> {
        let mut inputs = SampleInputs::new(self.sample_id.clone());

        inputs.read_qc = self.fastp_json.as_deref().map(load_read_qc).transpose()?;
        inputs.profile = self
            .sylph_tsv
            .as_deref()
            .map(|path| ProfilerReport::from_sylph_tsv(open(path)?))
            .transpose()?;
        inputs.typing = self
            .mlst_tsv
            .as_deref()
            .map(|path| TypingReport::from_stringmlst_tsv(open(path)?))
            .transpose()?;

        match &profile.kmer {
            Some(thresholds) if self.kat_hist.is_some() || self.kat_gcp.is_some() => {
                let histogram = match &self.kat_hist {
                    Some(path) => HistogramSummary::parse(&read_text(path)?, thresholds.error_cov_cutoff),
                    None => None,
                };
                let gcp = match &self.kat_gcp {
                    Some(path) => GcpSummary::parse(&read_text(path)?, thresholds),
                    None => None,
                };
                inputs.kmer = Some(KmerReport::new(histogram, gcp));
            }
            None if self.kat_hist.is_some() || self.kat_gcp.is_some() => {
                debug!("K-mer analysis disabled; ignoring KAT outputs for {}", self.sample_id);
            }
            _ => {}
        }

        info!("Loaded tool outputs for sample {}", self.sample_id);
        Ok(inputs)
    }
}

fn open(path: &Path) -> Result<File, InputError> {
    File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_text(path: &Path) -> Result<String, InputError> {
    std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse a fastp JSON report
pub fn load_read_qc(path: &Path) -> Result<ReadQcReport, InputError> {
    let json: serde_json::Value =
        serde_json::from_reader(std::io::BufReader::new(open(path)?)).map_err(|source| InputError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(ReadQcReport::from_fastp_json(&json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QcConfig;
    use std::fs;

    const FASTP: &str = r#"{
        "summary": {
            "before_filtering": {"total_reads": 1000},
            "after_filtering": {"total_reads": 990, "total_bases": 148500, "q30_rate": 0.93,
                                "read1_mean_length": 150, "read2_mean_length": 150, "gc_content": 0.51}
        },
        "duplication": {"rate": 0.02},
        "command": "fastp --detect_adapter_for_pe"
    }"#;

    const SYLPH: &str = "Sample_file\tGenome_file\tTaxonomic_abundance\tSequence_abundance\tAdjusted_ANI\tEff_cov\tContig_name\n\
r1.fq\tg.fna\t100\t98.5\t99.9\t45.1\tNZ_CP000001.1 Escherichia coli K-12\n";

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_all_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SamplePaths {
            fastp_json: Some(write(dir.path(), "s1.fastp.json", FASTP)),
            sylph_tsv: Some(write(dir.path(), "s1.sylph.tsv", SYLPH)),
            mlst_tsv: Some(write(dir.path(), "s1.mlst.tsv", "Sample\tST\ns1\t73\n")),
            ..SamplePaths::new("s1")
        };
        let profile = QcConfig::default().profile().unwrap();
        let inputs = paths.load(&profile).unwrap();

        assert_eq!(inputs.sample_id, "s1");
        assert_eq!(inputs.read_qc.unwrap().q30_rate, Some(0.93));
        assert_eq!(inputs.profile.unwrap().top().unwrap().name, "Escherichia coli");
        assert_eq!(inputs.typing.unwrap().st.as_deref(), Some("73"));
        assert!(inputs.kmer.is_none());
    }

    #[test]
    fn test_kat_outputs_load_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SamplePaths {
            kat_hist: Some(write(dir.path(), "kat.hist", "1 100\n25 400\n")),
            kat_gcp: Some(write(dir.path(), "kat.gcp", "0.5 25 400\n")),
            ..SamplePaths::new("s1")
        };

        let disabled = QcConfig::default().profile().unwrap();
        assert!(paths.load(&disabled).unwrap().kmer.is_none());

        let enabled = QcConfig::from_yaml_str("kmer: {enabled: true}\n")
            .unwrap()
            .profile()
            .unwrap();
        let kmer = paths.load(&enabled).unwrap().kmer.unwrap();
        assert_eq!(kmer.histogram.unwrap().main_peak_cov, Some(25));
        assert!(!kmer.gcp.unwrap().multi_modal);
    }

    #[test]
    fn test_errors_carry_the_sample_id() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SamplePaths {
            fastp_json: Some(write(dir.path(), "bad.json", "{ not json")),
            ..SamplePaths::new("sample_042")
        };
        let profile = QcConfig::default().profile().unwrap();
        let err = paths.load(&profile).unwrap_err();
        assert_eq!(err.sample_id, "sample_042");
        assert!(matches!(err.source, InputError::Json { .. }));
        assert!(err.to_string().starts_with("sample 'sample_042'"));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SamplePaths {
            sylph_tsv: Some(dir.path().join("absent.tsv")),
            ..SamplePaths::new("s9")
        };
        let profile = QcConfig::default().profile().unwrap();
        let err = paths.load(&profile).unwrap_err();
        assert!(matches!(err.source, InputError::Io { .. }));
    }
}
