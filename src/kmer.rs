//! K-mer spectrum metrics from KAT outputs
//!
//! Two inputs are understood:
//! - the k-mer histogram (`coverage count` per line)
//! - the GC x coverage matrix (`gc coverage count` per line)
//!
//! Comment lines (`#`) and lines that do not parse are ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Validated k-mer thresholds, taken from the QC profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KmerThresholds {
    /// Histogram coverage at or below which k-mers belong to the error region
    pub error_cov_cutoff: u32,
    pub error_prop_warn: f64,
    pub main_cov_low: f64,
    pub multi_modal_bin_prop: f64,
    pub lowcov_gc_prop_warn: f64,
}

impl Default for KmerThresholds {
    fn default() -> Self {
        Self {
            error_cov_cutoff: 4,
            error_prop_warn: 0.05,
            main_cov_low: 10.0,
            multi_modal_bin_prop: 0.1,
            lowcov_gc_prop_warn: 0.02,
        }
    }
}

/// GC fraction below/above which a bin counts as extreme
const EXTREME_GC_LOW: f64 = 0.25;
const EXTREME_GC_HIGH: f64 = 0.75;
/// Low-coverage bins sit below this share of `main_cov_low`
const LOWCOV_SHARE: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub total_kmers: u64,
    pub total_instances: u64,
    pub error_peak_cov: Option<u64>,
    /// Share of k-mer instances in the error region
    pub error_proportion: f64,
    /// Mode of the histogram above the error region
    pub main_peak_cov: Option<u64>,
    pub main_peak_height: u64,
    pub unique_kmers_prop: f64,
    pub mean_kmer_cov: f64,
    pub median_kmer_cov: u64,
}

impl HistogramSummary {
    /// Summarize `(coverage, count)` rows; `None` when the histogram is empty
    pub fn from_rows(rows: &[(u64, u64)], error_cov_cutoff: u32) -> Option<Self> {
        let total_kmers: u64 = rows.iter().map(|(_, count)| count).sum();
        let total_instances: u64 = rows.iter().map(|(cov, count)| cov * count).sum();
        if total_kmers == 0 || total_instances == 0 {
            return None;
        }

        let cutoff = u64::from(error_cov_cutoff);
        let error_instances: u64 = rows
            .iter()
            .filter(|(cov, _)| *cov <= cutoff)
            .map(|(cov, count)| cov * count)
            .sum();

        // Ties go to the first row, as the histogram is read.
        let mode = |keep: &dyn Fn(u64) -> bool| {
            rows.iter()
                .filter(|(cov, _)| keep(*cov))
                .fold(None, |best: Option<(u64, u64)>, &(cov, count)| match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((cov, count)),
                })
        };
        let error_peak = mode(&|cov| cov <= cutoff);
        let main_peak = mode(&|cov| cov > cutoff);

        let singletons: u64 = rows.iter().filter(|(cov, _)| *cov == 1).map(|(_, c)| c).sum();

        let mut sorted = rows.to_vec();
        sorted.sort_by_key(|(cov, _)| *cov);
        let half = total_kmers as f64 / 2.0;
        let mut cumulative = 0u64;
        let mut median = 0u64;
        for (cov, count) in sorted {
            cumulative += count;
            if cumulative as f64 >= half {
                median = cov;
                break;
            }
        }

        Some(Self {
            total_kmers,
            total_instances,
            error_peak_cov: error_peak.map(|(cov, _)| cov),
            error_proportion: error_instances as f64 / total_instances as f64,
            main_peak_cov: main_peak.map(|(cov, _)| cov),
            main_peak_height: main_peak.map(|(_, count)| count).unwrap_or(0),
            unique_kmers_prop: singletons as f64 / total_kmers as f64,
            mean_kmer_cov: total_instances as f64 / total_kmers as f64,
            median_kmer_cov: median,
        })
    }

    pub fn parse(text: &str, error_cov_cutoff: u32) -> Option<Self> {
        let rows: Vec<(u64, u64)> = data_lines(text)
            .filter_map(|fields| {
                let cov = fields.first()?.parse().ok()?;
                let count = fields.get(1)?.parse().ok()?;
                Some((cov, count))
            })
            .collect();
        let summary = Self::from_rows(&rows, error_cov_cutoff);
        if summary.is_none() {
            warn!("K-mer histogram has no usable rows");
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcpSummary {
    pub bins: usize,
    pub top_bin_prop: f64,
    /// At least two bins each hold `multi_modal_bin_prop` of all instances
    pub multi_modal: bool,
    /// Share of instances in low-coverage bins with extreme GC
    pub lowcov_gc_prop: f64,
}

impl GcpSummary {
    /// Summarize `(gc, coverage, count)` bins
    ///
    /// GC is a fraction in `[0, 1]`. Repeated bins keep the last count.
    pub fn from_bins(bins: &[(f64, f64, u64)], thresholds: &KmerThresholds) -> Option<Self> {
        // Keyed on bit patterns; `+ 0.0` folds -0.0 into 0.0.
        let mut counts: HashMap<(u64, u64), u64> = HashMap::with_capacity(bins.len());
        for &(gc, cov, count) in bins {
            counts.insert(((gc + 0.0).to_bits(), (cov + 0.0).to_bits()), count);
        }
        let merged: Vec<(f64, f64, u64)> = counts
            .into_iter()
            .map(|((gc, cov), count)| (f64::from_bits(gc), f64::from_bits(cov), count))
            .collect();
        if merged.is_empty() {
            return None;
        }

        let total: u64 = merged.iter().map(|(_, _, count)| count).sum();
        if total == 0 {
            return Some(Self {
                bins: merged.len(),
                top_bin_prop: 0.0,
                multi_modal: false,
                lowcov_gc_prop: 0.0,
            });
        }
        let share = |count: u64| count as f64 / total as f64;

        let top = merged.iter().map(|(_, _, count)| *count).max().unwrap_or(0);
        let high_bins = merged
            .iter()
            .filter(|(_, _, count)| share(*count) >= thresholds.multi_modal_bin_prop)
            .count();

        let lowcov_limit = thresholds.main_cov_low * LOWCOV_SHARE;
        let lowcov_extreme: u64 = merged
            .iter()
            .filter(|(gc, cov, _)| *cov < lowcov_limit && (*gc < EXTREME_GC_LOW || *gc > EXTREME_GC_HIGH))
            .map(|(_, _, count)| count)
            .sum();

        Some(Self {
            bins: merged.len(),
            top_bin_prop: share(top),
            multi_modal: high_bins >= 2,
            lowcov_gc_prop: share(lowcov_extreme),
        })
    }

    pub fn parse(text: &str, thresholds: &KmerThresholds) -> Option<Self> {
        let bins: Vec<(f64, f64, u64)> = data_lines(text)
            .filter_map(|fields| {
                let gc = fields.first()?.parse().ok()?;
                let cov = fields.get(1)?.parse().ok()?;
                let count = fields.get(2)?.parse().ok()?;
                Some((gc, cov, count))
            })
            .collect();
        let summary = Self::from_bins(&bins, thresholds);
        if summary.is_none() {
            warn!("K-mer GC x coverage matrix has no usable rows");
        }
        summary
    }
}

fn data_lines(text: &str) -> impl Iterator<Item = Vec<&str>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split_whitespace().collect())
}

/// Combined k-mer results for one sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KmerReport {
    pub histogram: Option<HistogramSummary>,
    pub gcp: Option<GcpSummary>,
}

impl KmerReport {
    pub fn new(histogram: Option<HistogramSummary>, gcp: Option<GcpSummary>) -> Self {
        debug!(
            "K-mer report: histogram={}, gcp={}",
            histogram.is_some(),
            gcp.is_some()
        );
        Self { histogram, gcp }
    }

    pub fn low_coverage(&self, thresholds: &KmerThresholds) -> Option<bool> {
        let hist = self.histogram.as_ref()?;
        let main = hist.main_peak_cov.map(|c| c as f64).unwrap_or(0.0);
        Some(main < thresholds.main_cov_low)
    }

    pub fn high_error(&self, thresholds: &KmerThresholds) -> Option<bool> {
        let hist = self.histogram.as_ref()?;
        Some(hist.error_proportion > thresholds.error_prop_warn)
    }

    /// Multi-modal GC x coverage profile or too much low-coverage extreme-GC signal
    pub fn contamination_suspected(&self, thresholds: &KmerThresholds) -> Option<bool> {
        let gcp = self.gcp.as_ref()?;
        Some(gcp.multi_modal || gcp.lowcov_gc_prop > thresholds.lowcov_gc_prop_warn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIST: &str = "\
# Title:27-mer spectra
# Columns:2
1 5000
2 800
3 100
4 20
5 10
20 150
25 400
30 300
";

    #[test]
    fn test_histogram_summary() {
        let hist = HistogramSummary::parse(HIST, 4).unwrap();
        assert_eq!(hist.total_kmers, 6780);
        // 5000 + 1600 + 300 + 80 + 50 + 3000 + 10000 + 9000
        assert_eq!(hist.total_instances, 29030);
        assert_eq!(hist.error_peak_cov, Some(1));
        assert_eq!(hist.main_peak_cov, Some(25));
        assert_eq!(hist.main_peak_height, 400);
        let expected_error = (5000.0 + 1600.0 + 300.0 + 80.0) / 29030.0;
        assert!((hist.error_proportion - expected_error).abs() < 1e-12);
        assert_eq!(hist.median_kmer_cov, 1);
    }

    #[test]
    fn test_histogram_ignores_garbage_and_empty() {
        assert!(HistogramSummary::parse("# only comments\n\nfoo bar\n", 4).is_none());
        let hist = HistogramSummary::parse("x y\n10 5\n", 4).unwrap();
        assert_eq!(hist.total_kmers, 5);
        assert_eq!(hist.error_peak_cov, None);
    }

    #[test]
    fn test_gcp_multi_modal() {
        let t = KmerThresholds::default();
        let bins = [(0.50, 30.0, 500), (0.30, 8.0, 300), (0.52, 31.0, 50)];
        let gcp = GcpSummary::from_bins(&bins, &t).unwrap();
        assert_eq!(gcp.bins, 3);
        assert!(gcp.multi_modal);
        assert!((gcp.top_bin_prop - 500.0 / 850.0).abs() < 1e-12);
    }

    #[test]
    fn test_gcp_repeated_bin_keeps_last_count() {
        let t = KmerThresholds::default();
        let bins = [(0.50, 30.0, 100), (0.40, 20.0, 100), (0.50, 30.0, 300)];
        let gcp = GcpSummary::from_bins(&bins, &t).unwrap();
        assert_eq!(gcp.bins, 2);
        assert!((gcp.top_bin_prop - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_gcp_large_matrix() {
        let t = KmerThresholds::default();
        let bins: Vec<(f64, f64, u64)> = (0..200)
            .flat_map(|g| (0..500).map(move |c| (g as f64 / 200.0, c as f64, 1)))
            .collect();
        let start = std::time::Instant::now();
        let gcp = GcpSummary::from_bins(&bins, &t).unwrap();
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(gcp.bins, 100_000);
        assert!(!gcp.multi_modal);
        assert!((gcp.top_bin_prop - 1.0 / 100_000.0).abs() < 1e-15);
    }

    #[test]
    fn test_gcp_lowcov_extreme_gc() {
        let t = KmerThresholds::default();
        // Low coverage limit is 2.0 with main_cov_low 10.
        let text = "0.50 30 970\n0.80 1 30\n0.20 5 0\n";
        let gcp = GcpSummary::parse(text, &t).unwrap();
        assert!(!gcp.multi_modal);
        assert!((gcp.lowcov_gc_prop - 0.03).abs() < 1e-12);

        let report = KmerReport::new(None, Some(gcp));
        assert_eq!(report.contamination_suspected(&t), Some(true));
    }

    #[test]
    fn test_flags_need_their_inputs() {
        let t = KmerThresholds::default();
        let report = KmerReport::default();
        assert_eq!(report.low_coverage(&t), None);
        assert_eq!(report.high_error(&t), None);
        assert_eq!(report.contamination_suspected(&t), None);
    }

    #[test]
    fn test_histogram_flags() {
        let t = KmerThresholds::default();
        let report = KmerReport::new(HistogramSummary::parse(HIST, t.error_cov_cutoff), None);
        assert_eq!(report.low_coverage(&t), Some(false));
        assert_eq!(report.high_error(&t), Some(true));
    }
}
