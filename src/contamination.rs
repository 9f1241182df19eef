//! Taxonomic profile and contamination
//!
//! Contamination is the share of reads not attributed to the most abundant
//! species. Reads the profiler left unassigned count as contamination: a
//! profile of 75% A, 15% B and 10% unassigned is 25% contaminated.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::{debug, warn};

/// What the reported abundances are relative to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbundanceBasis {
    /// Percent of all reads; the remainder is unassigned
    #[default]
    AllReads,
    /// Percent of assigned reads only
    AssignedReads,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesAbundance {
    pub name: String,
    /// Percent, on the report's basis
    pub abundance: f64,
    /// Coverage implied by the profiler
    pub coverage: Option<f64>,
}

impl SpeciesAbundance {
    pub fn new(name: impl Into<String>, abundance: f64, coverage: Option<f64>) -> Self {
        Self {
            name: name.into(),
            abundance,
            coverage,
        }
    }
}

/// Taxonomic profiler result for one sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilerReport {
    /// Most abundant first
    species: Vec<SpeciesAbundance>,
    /// Percent of all reads left unassigned, when the profiler reports it
    unassigned_percent: Option<f64>,
    basis: AbundanceBasis,
}

impl ProfilerReport {
    pub fn new(
        mut species: Vec<SpeciesAbundance>,
        unassigned_percent: Option<f64>,
        basis: AbundanceBasis,
    ) -> Self {
        species.sort_by(|a, b| b.abundance.total_cmp(&a.abundance));
        Self {
            species,
            unassigned_percent,
            basis,
        }
    }

    pub fn species(&self) -> &[SpeciesAbundance] {
        &self.species
    }

    pub fn top(&self) -> Option<&SpeciesAbundance> {
        self.species.first()
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    /// Unassigned fraction of all reads, inferred from the abundances when not reported
    pub fn unassigned_fraction(&self) -> f64 {
        let percent = match (self.unassigned_percent, self.basis) {
            (Some(p), _) => p,
            (None, AbundanceBasis::AllReads) => {
                100.0 - self.species.iter().map(|s| s.abundance).sum::<f64>()
            }
            (None, AbundanceBasis::AssignedReads) => 0.0,
        };
        (percent / 100.0).clamp(0.0, 1.0)
    }

    /// Fraction of all reads belonging to the top species
    pub fn top_fraction(&self) -> Option<f64> {
        let top = self.top()?.abundance / 100.0;
        let share = match self.basis {
            AbundanceBasis::AllReads => top,
            AbundanceBasis::AssignedReads => top * (1.0 - self.unassigned_fraction()),
        };
        Some(share.clamp(0.0, 1.0))
    }

    /// Fraction of reads not from the top species; `None` when no species was detected
    pub fn contamination(&self) -> Option<f64> {
        self.top_fraction().map(|top| 1.0 - top)
    }

    /// Parse a sylph profile TSV
    ///
    /// Uses `Sequence_abundance` (percent of all reads), `Eff_cov` and the
    /// genus and species words of `Contig_name`. Rows whose contig name is
    /// too short to carry a species are dropped.
    pub fn from_sylph_tsv<R: Read>(reader: R) -> Result<Self, InputError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let column = |name: &'static str| -> Result<usize, InputError> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or(InputError::MissingColumn { tool: "sylph", column: name })
        };
        let abundance_col = column("Sequence_abundance")?;
        let coverage_col = column("Eff_cov")?;
        let contig_col = column("Contig_name")?;

        let mut species = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let Some(contig) = record.get(contig_col) else {
                warn!("Dropping sylph row without a contig name");
                continue;
            };
            let words: Vec<&str> = contig.split_whitespace().collect();
            if words.len() < 3 {
                warn!("Dropping sylph row with unparseable contig name '{}'", contig);
                continue;
            }
            let name = format!("{} {}", words[1], words[2]);

            let abundance_field = record.get(abundance_col).unwrap_or("");
            let abundance: f64 = abundance_field.trim().parse().map_err(|_| InputError::Malformed {
                tool: "sylph",
                details: format!("abundance '{}' for {} is not a number", abundance_field, name),
            })?;
            let coverage = record.get(coverage_col).and_then(|v| v.trim().parse().ok());

            species.push(SpeciesAbundance::new(name, abundance, coverage));
        }

        debug!("Parsed {} species from sylph profile", species.len());
        Ok(Self::new(species, None, AbundanceBasis::AllReads))
    }
}
