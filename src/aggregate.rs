//! Overall verdict
//!
//! Reduces a complete sample status table to PASSED / WARNING / FAILED.
//! Rules are applied in a fixed order and the first match wins:
//!
//! 1. any CRITICAL metric FAILED or SKIPPED → FAILED
//! 2. both COVERAGE estimators FAILED → FAILED; exactly one FAILED → WARNING
//! 3. any ADVISORY or COVERAGE metric WARNING/FAILED → WARNING
//! 4. any CRITICAL metric WARNING → WARNING
//! 5. otherwise PASSED
//!
//! INFORMATIONAL metrics never take part. SKIPPED non-critical metrics are
//! ignored.

use crate::evaluate::QcStatus;
use crate::metrics::{MetricCatalog, MetricClass, MetricId};
use crate::table::SampleStatusTable;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Passed,
    Warning,
    Failed,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Passed => "PASSED",
            OverallStatus::Warning => "WARNING",
            OverallStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule decided the verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictRule {
    CriticalFailure,
    CoverageBothFailed,
    CoverageDisagreement,
    AdvisoryConcern,
    CriticalWarning,
    AllPassed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub status: OverallStatus,
    pub rule: VerdictRule,
    /// Metrics behind the verdict, in catalog order
    pub contributors: Vec<MetricId>,
}

impl Verdict {
    pub fn contributor_keys(&self) -> Vec<&'static str> {
        self.contributors.iter().map(|id| id.key()).collect()
    }
}

/// Compute the overall verdict for one sample
///
/// # Panics
/// If the table does not hold exactly one observation per catalog metric.
pub fn aggregate(table: &SampleStatusTable, catalog: &MetricCatalog) -> Verdict {
    table.assert_complete(catalog);

    let in_class = |class: MetricClass| -> Vec<(MetricId, QcStatus)> {
        catalog
            .ids()
            .filter(|id| id.class() == class)
            .map(|id| (id, table.status(id)))
            .collect()
    };
    let critical = in_class(MetricClass::Critical);
    let coverage = in_class(MetricClass::Coverage);
    let advisory = in_class(MetricClass::Advisory);

    // No data cannot pass: SKIPPED counts as FAILED for critical metrics.
    let critical_failures: Vec<MetricId> = critical
        .iter()
        .filter(|(_, s)| matches!(s, QcStatus::Failed | QcStatus::Skipped))
        .map(|(id, _)| *id)
        .collect();
    if !critical_failures.is_empty() {
        return Verdict {
            status: OverallStatus::Failed,
            rule: VerdictRule::CriticalFailure,
            contributors: critical_failures,
        };
    }

    let coverage_failures: Vec<MetricId> = coverage
        .iter()
        .filter(|(_, s)| *s == QcStatus::Failed)
        .map(|(id, _)| *id)
        .collect();
    if coverage_failures.len() >= 2 {
        return Verdict {
            status: OverallStatus::Failed,
            rule: VerdictRule::CoverageBothFailed,
            contributors: coverage_failures,
        };
    }

    // Every WARNING verdict reports all concerns, whichever rule fired first.
    let mut concerns: Vec<MetricId> = critical
        .iter()
        .chain(coverage.iter())
        .chain(advisory.iter())
        .filter(|(_, s)| s.is_concern())
        .map(|(id, _)| *id)
        .collect();
    concerns.sort();

    let rule = if coverage_failures.len() == 1 {
        Some(VerdictRule::CoverageDisagreement)
    } else if coverage.iter().chain(advisory.iter()).any(|(_, s)| s.is_concern()) {
        Some(VerdictRule::AdvisoryConcern)
    } else if critical.iter().any(|(_, s)| *s == QcStatus::Warning) {
        Some(VerdictRule::CriticalWarning)
    } else {
        None
    };

    match rule {
        Some(rule) => Verdict {
            status: OverallStatus::Warning,
            rule,
            contributors: concerns,
        },
        None => Verdict {
            status: OverallStatus::Passed,
            rule: VerdictRule::AllPassed,
            contributors: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::Observation;
    use crate::metrics::MetricDefinition;

    fn catalog() -> MetricCatalog {
        MetricCatalog::new(vec![
            MetricDefinition::tiered(MetricId::ReadQ30, Some(0.8), Some(0.7)).unwrap(),
            MetricDefinition::tiered(MetricId::Contamination, Some(0.05), Some(0.10)).unwrap(),
            MetricDefinition::tiered(MetricId::Coverage, Some(30.0), Some(20.0)).unwrap(),
            MetricDefinition::tiered(MetricId::CoverageAlt, Some(30.0), Some(20.0)).unwrap(),
            MetricDefinition::tiered(MetricId::Duplication, Some(0.2), Some(0.3)).unwrap(),
            MetricDefinition::flag(MetricId::Mlst),
        ])
        .unwrap()
    }

    /// Table with every metric PASSED except the given overrides
    fn table(overrides: &[(MetricId, QcStatus)]) -> SampleStatusTable {
        let mut table = SampleStatusTable::new();
        for id in catalog().ids() {
            let status = overrides
                .iter()
                .find(|(m, _)| *m == id)
                .map(|(_, s)| *s)
                .unwrap_or(QcStatus::Passed);
            table.record(Observation::fixture(id, status));
        }
        table
    }

    fn verdict(overrides: &[(MetricId, QcStatus)]) -> Verdict {
        aggregate(&table(overrides), &catalog())
    }

    #[test]
    fn test_all_passed() {
        let v = verdict(&[]);
        assert_eq!(v.status, OverallStatus::Passed);
        assert_eq!(v.rule, VerdictRule::AllPassed);
        assert!(v.contributors.is_empty());
    }

    #[test]
    fn test_critical_failure_wins_over_advisory_failure() {
        let v = verdict(&[
            (MetricId::ReadQ30, QcStatus::Failed),
            (MetricId::Duplication, QcStatus::Failed),
        ]);
        assert_eq!(v.status, OverallStatus::Failed);
        assert_eq!(v.rule, VerdictRule::CriticalFailure);
        assert_eq!(v.contributors, vec![MetricId::ReadQ30]);

        let only_critical = verdict(&[(MetricId::ReadQ30, QcStatus::Failed)]);
        assert_eq!(only_critical.status, v.status);
    }

    #[test]
    fn test_skipped_critical_counts_as_failed() {
        let v = verdict(&[(MetricId::Contamination, QcStatus::Skipped)]);
        assert_eq!(v.status, OverallStatus::Failed);
        assert_eq!(v.contributors, vec![MetricId::Contamination]);
    }

    #[test]
    fn test_coverage_one_failed_is_warning() {
        let v = verdict(&[(MetricId::CoverageAlt, QcStatus::Failed)]);
        assert_eq!(v.status, OverallStatus::Warning);
        assert_eq!(v.rule, VerdictRule::CoverageDisagreement);
        assert_eq!(v.contributors, vec![MetricId::CoverageAlt]);
    }

    #[test]
    fn test_coverage_both_failed_is_failed() {
        let v = verdict(&[
            (MetricId::Coverage, QcStatus::Failed),
            (MetricId::CoverageAlt, QcStatus::Failed),
        ]);
        assert_eq!(v.status, OverallStatus::Failed);
        assert_eq!(v.rule, VerdictRule::CoverageBothFailed);
        assert_eq!(v.contributors, vec![MetricId::Coverage, MetricId::CoverageAlt]);
    }

    #[test]
    fn test_coverage_warning_falls_through_to_advisory_rule() {
        let v = verdict(&[(MetricId::Coverage, QcStatus::Warning)]);
        assert_eq!(v.status, OverallStatus::Warning);
        assert_eq!(v.rule, VerdictRule::AdvisoryConcern);
    }

    #[test]
    fn test_coverage_failed_with_other_skipped_is_warning() {
        let v = verdict(&[
            (MetricId::Coverage, QcStatus::Failed),
            (MetricId::CoverageAlt, QcStatus::Skipped),
        ]);
        assert_eq!(v.status, OverallStatus::Warning);
    }

    #[test]
    fn test_advisory_failure_only_warns() {
        let v = verdict(&[(MetricId::Duplication, QcStatus::Failed)]);
        assert_eq!(v.status, OverallStatus::Warning);
        assert_eq!(v.rule, VerdictRule::AdvisoryConcern);
        assert_eq!(v.contributors, vec![MetricId::Duplication]);
    }

    #[test]
    fn test_skipped_advisory_is_ignored() {
        let v = verdict(&[
            (MetricId::Duplication, QcStatus::Skipped),
            (MetricId::Coverage, QcStatus::Skipped),
            (MetricId::CoverageAlt, QcStatus::Skipped),
        ]);
        assert_eq!(v.status, OverallStatus::Passed);
    }

    #[test]
    fn test_critical_warning() {
        let v = verdict(&[(MetricId::ReadQ30, QcStatus::Warning)]);
        assert_eq!(v.status, OverallStatus::Warning);
        assert_eq!(v.rule, VerdictRule::CriticalWarning);
        assert_eq!(v.contributor_keys(), vec!["read_q30"]);
    }

    #[test]
    fn test_warning_lists_all_concerns_in_catalog_order() {
        let v = verdict(&[
            (MetricId::Duplication, QcStatus::Warning),
            (MetricId::ReadQ30, QcStatus::Warning),
            (MetricId::Coverage, QcStatus::Failed),
        ]);
        assert_eq!(v.rule, VerdictRule::CoverageDisagreement);
        assert_eq!(
            v.contributors,
            vec![MetricId::ReadQ30, MetricId::Coverage, MetricId::Duplication]
        );
    }

    #[test]
    fn test_informational_never_counts() {
        let v = verdict(&[(MetricId::Mlst, QcStatus::Warning)]);
        assert_eq!(v.status, OverallStatus::Passed);
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let overrides = [
            (MetricId::Coverage, QcStatus::Warning),
            (MetricId::Duplication, QcStatus::Failed),
        ];
        assert_eq!(verdict(&overrides), verdict(&overrides));
    }

    #[test]
    #[should_panic(expected = "missing metrics")]
    fn test_partial_table_panics() {
        let mut table = SampleStatusTable::new();
        table.record(Observation::fixture(MetricId::ReadQ30, QcStatus::Passed));
        aggregate(&table, &catalog());
    }
}
