//! Symbol to instrument id resolution
//!
//! Reads the Databento `symbology.json` side-car shipped next to the tick
//! containers.

use super::InstrumentId;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// One validity interval of a symbol mapping
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolMapping {
    /// First date the mapping is valid
    #[serde(default)]
    pub d0: Option<NaiveDate>,
    /// Last date the mapping is valid
    #[serde(default)]
    pub d1: Option<NaiveDate>,
    /// Instrument id as a string
    pub s: String,
}

impl SymbolMapping {
    fn overlaps(&self, from: NaiveDate, to: NaiveDate) -> bool {
        let starts_before_end = self.d0.map_or(true, |d0| d0 <= to);
        let ends_after_start = self.d1.map_or(true, |d1| d1 >= from);
        starts_before_end && ends_after_start
    }

    fn instrument_id(&self) -> Option<InstrumentId> {
        self.s.trim().parse().ok()
    }
}

/// Symbology table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Symbology {
    #[serde(default)]
    result: BTreeMap<String, Vec<SymbolMapping>>,
}

impl Symbology {
    /// Load a symbology table from a JSON file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse a symbology table from JSON text
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Resolve the instrument id of `symbol` for a date window
    ///
    /// Prefers a mapping whose interval overlaps the window and falls back to
    /// the first mapping with a numeric id.
    pub fn resolve(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Option<InstrumentId> {
        let mappings = self.result.get(symbol)?;
        mappings
            .iter()
            .filter(|m| m.overlaps(from, to))
            .find_map(SymbolMapping::instrument_id)
            .or_else(|| mappings.iter().find_map(SymbolMapping::instrument_id))
    }

    /// All symbols in the table, sorted
    pub fn symbols(&self) -> Vec<String> {
        self.result.keys().cloned().collect()
    }
}
