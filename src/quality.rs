//! Read-QC results from fastp
//!
//! Pulls the fields the engine needs out of a parsed fastp JSON report.
//! Fields fastp did not write stay `None`; zero is a real value for several
//! of them and is never used as a stand-in.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Number of trailing cycles inspected for quality end-drop
pub const END_WINDOW: usize = 20;

/// Read-QC tool result for one sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadQcReport {
    /// Post-filter read count
    pub total_reads: Option<u64>,
    pub total_reads_before_filter: Option<u64>,
    /// Post-filter base count
    pub total_bases: Option<u64>,
    pub q20_rate: Option<f64>,
    pub q30_rate: Option<f64>,
    pub read1_mean_length: Option<f64>,
    pub read2_mean_length: Option<f64>,
    pub duplication_rate: Option<f64>,
    pub insert_size_peak: Option<f64>,
    pub too_many_n_reads: Option<u64>,
    /// Post-filter GC content as a fraction
    pub gc_content: Option<f64>,
    /// Per-cycle mean quality, one curve per read direction
    pub quality_curves: Vec<Vec<f64>>,
    pub overrepresented_sequences: Option<usize>,
    /// Command line fastp was run with
    pub command: Option<String>,
}

fn u64_at(json: &Value, pointer: &str) -> Option<u64> {
    let value = json.pointer(pointer)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
}

fn f64_at(json: &Value, pointer: &str) -> Option<f64> {
    json.pointer(pointer)?.as_f64()
}

fn curve_at(json: &Value, pointer: &str) -> Option<Vec<f64>> {
    let values = json.pointer(pointer)?.as_array()?;
    values.iter().map(Value::as_f64).collect()
}

impl ReadQcReport {
    /// Extract the read-QC fields from a fastp JSON report
    pub fn from_fastp_json(json: &Value) -> Self {
        let mut quality_curves: Vec<Vec<f64>> = [
            "/read1_after_filtering/quality_curves/mean",
            "/read2_after_filtering/quality_curves/mean",
        ]
        .iter()
        .filter_map(|pointer| curve_at(json, pointer))
        .collect();
        if quality_curves.is_empty() {
            quality_curves.extend(curve_at(json, "/quality_curves/mean"));
        }

        let overrepresented_sequences = json
            .pointer("/read1_before_filtering/overrepresented_sequences")
            .and_then(|seqs| match seqs {
                Value::Object(map) => Some(map.len()),
                Value::Array(list) => Some(list.len()),
                _ => None,
            });

        let report = Self {
            total_reads: u64_at(json, "/summary/after_filtering/total_reads"),
            total_reads_before_filter: u64_at(json, "/summary/before_filtering/total_reads")
                .or_else(|| u64_at(json, "/filtering_result/total_reads")),
            total_bases: u64_at(json, "/summary/after_filtering/total_bases"),
            q20_rate: f64_at(json, "/summary/after_filtering/q20_rate"),
            q30_rate: f64_at(json, "/summary/after_filtering/q30_rate"),
            read1_mean_length: f64_at(json, "/summary/after_filtering/read1_mean_length"),
            read2_mean_length: f64_at(json, "/summary/after_filtering/read2_mean_length"),
            duplication_rate: f64_at(json, "/duplication/rate"),
            insert_size_peak: f64_at(json, "/insert_size/peak"),
            too_many_n_reads: u64_at(json, "/filtering_result/too_many_N_reads")
                .or_else(|| u64_at(json, "/filtering_result/too_many_N")),
            gc_content: f64_at(json, "/summary/after_filtering/gc_content"),
            quality_curves,
            overrepresented_sequences,
            command: json.pointer("/command").and_then(Value::as_str).map(str::to_string),
        };

        debug!(
            "fastp report: {:?} reads after filtering, {} quality curve(s)",
            report.total_reads,
            report.quality_curves.len()
        );
        report
    }

    /// True when post-filter reads are known and at least `min_reads`
    pub fn has_reads(&self, min_reads: u64) -> bool {
        self.total_reads.is_some_and(|n| n > 0 && n >= min_reads)
    }

    /// Mean length of the shorter read direction
    pub fn min_read_length(&self) -> Option<f64> {
        match (self.read1_mean_length, self.read2_mean_length) {
            (Some(r1), Some(r2)) => Some(r1.min(r2)),
            (r1, r2) => r1.or(r2),
        }
    }

    /// Post-filter reads / pre-filter reads
    pub fn filtering_pass_rate(&self) -> Option<f64> {
        let before = self.total_reads_before_filter.filter(|n| *n > 0)?;
        Some(self.total_reads? as f64 / before as f64)
    }

    /// Reads dropped for too many Ns / pre-filter reads
    pub fn n_content(&self) -> Option<f64> {
        let before = self.total_reads_before_filter.filter(|n| *n > 0)?;
        Some(self.too_many_n_reads? as f64 / before as f64)
    }

    /// Largest quality end-drop over all read directions
    pub fn quality_end_drop(&self) -> Option<f64> {
        self.quality_curves
            .iter()
            .filter_map(|curve| end_drop(curve))
            .fold(None, |worst: Option<f64>, drop| Some(worst.map_or(drop, |w| w.max(drop))))
    }
}

/// Quality at the start of the last `END_WINDOW` cycles minus quality at the
/// final cycle; `None` for shorter curves
pub fn end_drop(curve: &[f64]) -> Option<f64> {
    if curve.len() < END_WINDOW {
        return None;
    }
    let start = curve[curve.len() - END_WINDOW];
    let end = *curve.last()?;
    Some(start - end)
}
