//! Adapter handling signals from the read-QC run
//!
//! Two things are checked:
//! - whether fastp was told to find or trim adapters (parsed from its command)
//! - how many overrepresented sequences it saw before filtering

use crate::quality::ReadQcReport;
use serde::{Deserialize, Serialize};

/// Command-line options that enable adapter trimming in fastp
pub const ADAPTER_OPTIONS: [&str; 4] = [
    "--detect_adapter_for_pe",
    "--adapter_sequence",
    "--adapter_sequence_r2",
    "-a",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdapterReport {
    /// `None` when the command line was not recorded
    pub detection_enabled: Option<bool>,
    pub overrepresented: Option<usize>,
}

impl AdapterReport {
    pub fn from_read_qc(report: &ReadQcReport) -> Self {
        Self {
            detection_enabled: report.command.as_deref().map(adapter_detection_enabled),
            overrepresented: report.overrepresented_sequences,
        }
    }
}

/// True if the command enables adapter detection or passes an adapter sequence
pub fn adapter_detection_enabled(command: &str) -> bool {
    command.split_whitespace().any(|token| {
        let option = token.split('=').next().unwrap_or(token);
        ADAPTER_OPTIONS.contains(&option)
    })
}
