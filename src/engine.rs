//! Per-sample QC run
//!
//! The engine owns the validated profile and the reference table. Both are
//! read-only, so one engine can be shared by any number of worker threads;
//! every call to [`QcEngine::evaluate_sample`] builds its own status table.

use crate::aggregate::{aggregate, Verdict};
use crate::config::QcProfile;
use crate::evaluate::evaluate;
use crate::extract::{MetricExtractor, SampleDetails, SampleInputs};
use crate::reference::ReferenceTable;
use crate::reporting::SampleRecord;
use crate::table::SampleStatusTable;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct QcEngine {
    profile: QcProfile,
    reference: ReferenceTable,
}

/// Everything known about one evaluated sample
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub sample_id: String,
    pub table: SampleStatusTable,
    pub verdict: Verdict,
    pub details: SampleDetails,
}

impl SampleReport {
    pub fn record(&self) -> SampleRecord {
        SampleRecord::build(&self.sample_id, &self.table, &self.verdict, &self.details)
    }
}

impl QcEngine {
    pub fn new(profile: QcProfile, reference: ReferenceTable) -> Self {
        Self { profile, reference }
    }

    pub fn profile(&self) -> &QcProfile {
        &self.profile
    }

    /// Extract, evaluate and aggregate one sample
    pub fn evaluate_sample(&self, inputs: &SampleInputs) -> SampleReport {
        let catalog = &self.profile.catalog;
        let mut extraction = MetricExtractor::new(&self.profile, &self.reference).extract(inputs);

        let mut table = SampleStatusTable::new();
        for definition in catalog.iter() {
            let id = definition.id();
            let Some(reading) = extraction.readings.remove(&id) else {
                panic!("extractor produced no reading for metric '{}'", id);
            };
            let observation = evaluate(definition, &reading);
            debug!(
                "{} {}: {} ({})",
                inputs.sample_id,
                id,
                observation.status(),
                observation.message()
            );
            table.record(observation);
        }

        let verdict = aggregate(&table, catalog);
        info!(
            "Sample {} {} [{}]",
            inputs.sample_id,
            verdict.status,
            verdict.contributor_keys().join(", ")
        );

        SampleReport {
            sample_id: inputs.sample_id.clone(),
            table,
            verdict,
            details: extraction.details,
        }
    }
}
