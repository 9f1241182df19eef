//! Per-sample status table
//!
//! Holds exactly one observation per catalog metric for one sample. The table
//! is filled incrementally while tool results are evaluated and is
//! append-only: recording a metric twice, or recording a metric the catalog
//! does not define, is a programming error.

use crate::evaluate::{Observation, QcStatus};
use crate::metrics::{MetricCatalog, MetricId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleStatusTable {
    observations: BTreeMap<MetricId, Observation>,
}

impl SampleStatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observation
    ///
    /// # Panics
    /// If the metric already has an observation in this table.
    pub fn record(&mut self, observation: Observation) {
        let metric = observation.metric();
        if self.observations.insert(metric, observation).is_some() {
            panic!("metric '{}' recorded twice in one sample status table", metric);
        }
    }

    pub fn get(&self, metric: MetricId) -> Option<&Observation> {
        self.observations.get(&metric)
    }

    /// Status of a metric that must be present
    ///
    /// # Panics
    /// If the table has no observation for the metric.
    pub fn status(&self, metric: MetricId) -> QcStatus {
        match self.observations.get(&metric) {
            Some(obs) => obs.status(),
            None => panic!("sample status table has no observation for metric '{}'", metric),
        }
    }

    /// Observations in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.values()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Check that the table covers exactly the catalog's metrics
    ///
    /// # Panics
    /// On any missing or extra metric; the extractor and the metric
    /// definitions have drifted apart.
    pub fn assert_complete(&self, catalog: &MetricCatalog) {
        let missing: Vec<&str> = catalog
            .ids()
            .filter(|id| !self.observations.contains_key(id))
            .map(|id| id.key())
            .collect();
        if !missing.is_empty() {
            panic!("sample status table is missing metrics: {}", missing.join(", "));
        }

        let extra: Vec<&str> = self
            .observations
            .keys()
            .filter(|id| !catalog.contains(**id))
            .map(|id| id.key())
            .collect();
        if !extra.is_empty() {
            panic!("sample status table has metrics outside the catalog: {}", extra.join(", "));
        }
    }
}
