//! Sequence typing result
//!
//! An ST that parses as a non-negative integer is valid; `0` marks a novel
//! allele combination. Anything else (negative, `-`, `N/A`, empty) means no
//! valid type was assigned.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypingReport {
    /// Sequence type as reported, `None` when empty
    pub st: Option<String>,
    pub valid: bool,
}

impl TypingReport {
    pub fn from_st_call(st: &str) -> Self {
        let st = st.trim();
        let valid = st.parse::<i64>().is_ok_and(|n| n >= 0);
        Self {
            st: (!st.is_empty()).then(|| st.to_string()),
            valid,
        }
    }

    /// Parse stringMLST output: a header row and one result row with an `ST` column
    pub fn from_stringmlst_tsv<R: Read>(reader: R) -> Result<Self, InputError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let st_col = headers
            .iter()
            .position(|h| h.trim() == "ST")
            .ok_or(InputError::MissingColumn { tool: "stringMLST", column: "ST" })?;

        let record = rdr.records().next().transpose()?.ok_or_else(|| InputError::Malformed {
            tool: "stringMLST",
            details: "no result row".to_string(),
        })?;

        Ok(Self::from_st_call(record.get(st_col).unwrap_or("")))
    }
}
