//! Per-sample result records
//!
//! A record is a flat, ordered list of named fields:
//!
//! 1. `sample_id`, `schema_version`, `final_status`, `final_status_reasons`
//! 2. `<metric>_value`, `<metric>_status`, `<metric>_message` for every
//!    catalog metric, in catalog order
//! 3. descriptive fields
//!
//! New fields are only ever appended; renaming or removing one bumps
//! [`SCHEMA_VERSION`].

use crate::aggregate::Verdict;
use crate::extract::SampleDetails;
use crate::table::SampleStatusTable;
use anyhow::{Context, Result};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::path::Path;

pub const SCHEMA_VERSION: u32 = 1;

/// Separator for multi-valued descriptive fields
const LIST_SEPARATOR: &str = ";";

#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    fields: Vec<(String, Value)>,
}

impl SampleRecord {
    pub fn build(
        sample_id: &str,
        table: &SampleStatusTable,
        verdict: &Verdict,
        details: &SampleDetails,
    ) -> Self {
        let mut record = Self { fields: Vec::new() };
        record.push("sample_id", sample_id);
        record.push("schema_version", SCHEMA_VERSION);
        record.push("final_status", verdict.status.as_str());
        record.push("final_status_reasons", verdict.contributor_keys().join(LIST_SEPARATOR));

        for obs in table.iter() {
            let key = obs.metric().key();
            record.push(format!("{}_value", key), obs.raw_value());
            record.push(format!("{}_status", key), obs.status().as_str());
            record.push(format!("{}_message", key), obs.message());
        }

        record.push_details(details);
        record
    }

    fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.push((key.into(), value.into()));
    }

    fn push_details(&mut self, d: &SampleDetails) {
        self.push("species_top", d.species.first().cloned());
        self.push("species_count", d.species.len());
        self.push("species", d.species.join(LIST_SEPARATOR));
        self.push("species_abundance", join(d.species_abundance.iter().map(|a| a.to_string())));
        self.push(
            "species_coverage",
            join(d.species_coverage.iter().map(|c| c.map(|c| c.to_string()).unwrap_or_default())),
        );
        self.push("genome_size_expected", d.genome_size_expected);
        self.push("gc_content_lower", d.gc_content_lower);
        self.push("gc_content_upper", d.gc_content_upper);
        self.push("read_total_reads", d.read_total_reads);
        self.push("read_total_bases", d.read_total_bases);
        self.push("read_q20_rate", d.read_q20_rate);
        self.push("read1_mean_length", d.read1_mean_length);
        self.push("read2_mean_length", d.read2_mean_length);
        self.push("mlst_st", d.mlst_st.clone());
        self.push("kmer_total_kmers", d.kmer_total_kmers);
        self.push("kmer_error_peak_cov", d.kmer_error_peak_cov);
        self.push("kmer_mean_cov", d.kmer_mean_cov);
        self.push("kmer_gcp_multi_modal", d.kmer_gcp_multi_modal);
        self.push("kmer_gcp_lowcov_gc_prop", d.kmer_gcp_lowcov_gc_prop);
        self.push("kmer_flag_low_coverage", d.kmer_flag_low_coverage);
        self.push("kmer_flag_high_error", d.kmer_flag_high_error);
        self.push("kmer_flag_contamination", d.kmer_flag_contamination);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Values rendered for CSV: null is empty, strings unquoted
    pub fn csv_values(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|(_, value)| match value {
                Value::Null => String::new(),
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    /// Write a header row and one value row
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(self.keys())?;
        writer.write_record(self.csv_values())?;
        writer.flush()?;
        Ok(())
    }

    /// Export record to JSON
    pub fn export_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json_content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json_content)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;
        Ok(())
    }
}

fn join(values: impl Iterator<Item = String>) -> String {
    values.collect::<Vec<_>>().join(LIST_SEPARATOR)
}

impl Serialize for SampleRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{OverallStatus, VerdictRule};
    use crate::evaluate::{Observation, QcStatus};
    use crate::metrics::MetricId;

    fn record() -> SampleRecord {
        let mut table = SampleStatusTable::new();
        table.record(Observation::fixture(MetricId::Duplication, QcStatus::Warning));
        table.record(Observation::fixture(MetricId::ReadQ30, QcStatus::Passed));
        table.record(Observation::skipped(MetricId::Mlst, "No sequence typing result."));
        let verdict = Verdict {
            status: OverallStatus::Warning,
            rule: VerdictRule::AdvisoryConcern,
            contributors: vec![MetricId::Duplication],
        };
        let details = SampleDetails {
            species: vec!["Escherichia coli".into(), "Salmonella enterica".into()],
            species_abundance: vec![92.1, 3.4],
            species_coverage: vec![Some(48.2), None],
            ..Default::default()
        };
        SampleRecord::build("s1", &table, &verdict, &details)
    }

    #[test]
    fn test_field_order() {
        let record = record();
        let keys: Vec<&str> = record.keys().take(10).collect();
        assert_eq!(
            keys,
            vec![
                "sample_id",
                "schema_version",
                "final_status",
                "final_status_reasons",
                "read_q30_value",
                "read_q30_status",
                "read_q30_message",
                "duplication_value",
                "duplication_status",
                "duplication_message",
            ]
        );
    }

    #[test]
    fn test_values() {
        let record = record();
        assert_eq!(record.get("final_status"), Some(&Value::from("WARNING")));
        assert_eq!(record.get("final_status_reasons"), Some(&Value::from("duplication")));
        assert_eq!(record.get("mlst_value"), Some(&Value::Null));
        assert_eq!(record.get("mlst_status"), Some(&Value::from("SKIPPED")));
        assert_eq!(record.get("species_top"), Some(&Value::from("Escherichia coli")));
        assert_eq!(record.get("species_abundance"), Some(&Value::from("92.1;3.4")));
        assert_eq!(record.get("species_coverage"), Some(&Value::from("48.2;")));
        assert_eq!(record.get("species_count"), Some(&Value::from(2)));
    }

    #[test]
    fn test_json_keeps_field_order() {
        let json = serde_json::to_string(&record()).unwrap();
        let sample = json.find("\"sample_id\"").unwrap();
        let status = json.find("\"final_status\"").unwrap();
        let q30 = json.find("\"read_q30_value\"").unwrap();
        assert!(sample < status && status < q30);
    }

    #[test]
    fn test_write_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let record = record();

        let csv_path = dir.path().join("s1_summary.csv");
        record.write_csv(&csv_path).unwrap();
        let mut rdr = csv::Reader::from_path(&csv_path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.len(), record.len());
        let row = rdr.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "s1");
        assert_eq!(&row[2], "WARNING");

        let json_path = dir.path().join("s1_summary.json");
        record.export_json(&json_path).unwrap();
        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed["sample_id"], "s1");
        assert_eq!(parsed["schema_version"], 1);
    }
}
