//! Species reference table
//!
//! Expected genome size and GC band per species, read from a headerless CSV:
//!
//! ```text
//! Escherichia_coli,Genome_Size,4500000,5500000
//! Escherichia_coli,GC_Content,50,52
//! ```
//!
//! Species names are matched after mapping spaces and dots to underscores.
//! GC bounds are written in percent and held as fractions.

use crate::error::InputError;
use crate::metrics::Band;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeciesReference {
    /// Midpoint of the expected genome size range
    pub genome_size: Option<f64>,
    pub gc_band: Option<Band>,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    entries: HashMap<String, SpeciesReference>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized lookup key for a species name
    pub fn species_key(name: &str) -> String {
        name.trim().replace([' ', '.'], "_")
    }

    pub fn insert_genome_size(&mut self, species: &str, lower: f64, upper: f64) {
        self.entries
            .entry(Self::species_key(species))
            .or_default()
            .genome_size = Some((lower + upper) / 2.0);
    }

    /// Bounds in percent
    pub fn insert_gc_range(&mut self, species: &str, lower_pct: f64, upper_pct: f64) {
        self.entries
            .entry(Self::species_key(species))
            .or_default()
            .gc_band = Some(Band::new(lower_pct / 100.0, upper_pct / 100.0));
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, InputError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut table = Self::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() < 4 {
                warn!("Skipping reference row {} with {} fields", line + 1, record.len());
                continue;
            }
            let species = &record[0];
            let bound = |idx: usize| -> Result<f64, InputError> {
                record[idx].parse().map_err(|_| InputError::Malformed {
                    tool: "reference table",
                    details: format!("row {}: '{}' is not a number", line + 1, &record[idx]),
                })
            };

            match &record[1] {
                "Genome_Size" => table.insert_genome_size(species, bound(2)?, bound(3)?),
                "GC_Content" => table.insert_gc_range(species, bound(2)?, bound(3)?),
                other => debug!("Ignoring reference attribute '{}' for {}", other, species),
            }
        }

        debug!("Loaded reference data for {} species", table.len());
        Ok(table)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, InputError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| InputError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn lookup(&self, species: &str) -> Option<&SpeciesReference> {
        let found = self.entries.get(&Self::species_key(species));
        if found.is_none() {
            warn!("No reference data for species '{}'", species);
        }
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
