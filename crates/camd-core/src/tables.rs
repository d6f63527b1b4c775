//! Candidate and seed tables keyed by identifier.
//!
//! Both tables preserve insertion order so iteration (and therefore any
//! downstream ranking tie-break or serialization) is deterministic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entries::{CandidateEntry, SeedEntry};
use crate::errors::{CampError, ErrorInfo};

fn duplicate(identifier: &str, table: &str) -> CampError {
    CampError::InvalidInput(
        ErrorInfo::new("duplicate-identifier", "identifier already present")
            .with_context("identifier", identifier)
            .with_context("table", table),
    )
}

/// Pool of entries that have not been evaluated yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CandidateEntry>", into = "Vec<CandidateEntry>")]
pub struct CandidateTable {
    entries: IndexMap<String, CandidateEntry>,
}

impl CandidateTable {
    /// Builds a table, rejecting duplicate identifiers and malformed rows.
    pub fn new(entries: Vec<CandidateEntry>) -> Result<Self, CampError> {
        let mut map = IndexMap::with_capacity(entries.len());
        for entry in entries {
            entry.validate()?;
            if map.contains_key(&entry.identifier) {
                return Err(duplicate(&entry.identifier, "candidates"));
            }
            map.insert(entry.identifier.clone(), entry);
        }
        Ok(Self { entries: map })
    }

    /// Number of remaining candidates.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no candidates remain.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a candidate by identifier.
    pub fn get(&self, identifier: &str) -> Option<&CandidateEntry> {
        self.entries.get(identifier)
    }

    /// True when the identifier is still in the pool.
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Iterates candidates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &CandidateEntry> + '_ {
        self.entries.values()
    }

    /// Identifiers in insertion order.
    pub fn identifiers(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Removes and returns the named candidates, in the order given.
    ///
    /// The removal is all-or-nothing: an unknown identifier leaves the table untouched.
    pub fn take(&mut self, identifiers: &[String]) -> Result<Vec<CandidateEntry>, CampError> {
        for identifier in identifiers {
            if !self.entries.contains_key(identifier) {
                return Err(CampError::InvalidInput(
                    ErrorInfo::new("unknown-candidate", "identifier not in candidate table")
                        .with_context("identifier", identifier.clone()),
                ));
            }
        }
        let mut seen = std::collections::BTreeSet::new();
        for identifier in identifiers {
            if !seen.insert(identifier) {
                return Err(duplicate(identifier, "batch"));
            }
        }
        Ok(identifiers
            .iter()
            .filter_map(|identifier| self.entries.shift_remove(identifier))
            .collect())
    }
}

impl TryFrom<Vec<CandidateEntry>> for CandidateTable {
    type Error = CampError;

    fn try_from(value: Vec<CandidateEntry>) -> Result<Self, Self::Error> {
        CandidateTable::new(value)
    }
}

impl From<CandidateTable> for Vec<CandidateEntry> {
    fn from(value: CandidateTable) -> Self {
        value.entries.into_values().collect()
    }
}

/// Append-only table of evaluated entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SeedEntry>", into = "Vec<SeedEntry>")]
pub struct SeedTable {
    entries: IndexMap<String, SeedEntry>,
}

impl SeedTable {
    /// Builds a table, rejecting duplicate identifiers and malformed rows.
    pub fn new(entries: Vec<SeedEntry>) -> Result<Self, CampError> {
        let mut table = Self::default();
        for entry in entries {
            table.insert(entry)?;
        }
        Ok(table)
    }

    /// Appends a row. Duplicates are rejected, never merged.
    pub fn insert(&mut self, entry: SeedEntry) -> Result<(), CampError> {
        entry.validate()?;
        if self.entries.contains_key(&entry.identifier) {
            return Err(duplicate(&entry.identifier, "seed"));
        }
        self.entries.insert(entry.identifier.clone(), entry);
        Ok(())
    }

    /// Number of evaluated rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no rows have been evaluated yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a row by identifier.
    pub fn get(&self, identifier: &str) -> Option<&SeedEntry> {
        self.entries.get(identifier)
    }

    /// True when the identifier has been evaluated.
    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Iterates rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SeedEntry> + '_ {
        self.entries.values()
    }

    /// Number of rows supplied before the campaign started.
    pub fn initial_len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_campaign_entry())
            .count()
    }
}

impl TryFrom<Vec<SeedEntry>> for SeedTable {
    type Error = CampError;

    fn try_from(value: Vec<SeedEntry>) -> Result<Self, Self::Error> {
        SeedTable::new(value)
    }
}

impl From<SeedTable> for Vec<SeedEntry> {
    fn from(value: SeedTable) -> Self {
        value.entries.into_values().collect()
    }
}

/// Checks that no identifier lives in both tables.
pub fn ensure_disjoint(candidates: &CandidateTable, seed: &SeedTable) -> Result<(), CampError> {
    match candidates.iter().find(|entry| seed.contains(&entry.identifier)) {
        Some(entry) => Err(CampError::InvalidInput(
            ErrorInfo::new(
                "identifier-overlap",
                "identifier present in both candidate and seed tables",
            )
            .with_context("identifier", entry.identifier.clone()),
        )),
        None => Ok(()),
    }
}

/// Common width of the feature vectors in both tables, if they agree.
pub fn feature_width(candidates: &CandidateTable, seed: &SeedTable) -> Result<usize, CampError> {
    let mut widths = candidates
        .iter()
        .map(|entry| (&entry.identifier, entry.features.len()))
        .chain(seed.iter().map(|entry| (&entry.identifier, entry.features.len())));
    let Some((_, width)) = widths.next() else {
        return Ok(0);
    };
    for (identifier, other) in widths {
        if other != width {
            return Err(CampError::InvalidInput(
                ErrorInfo::new("feature-width", "feature vectors differ in length")
                    .with_context("identifier", identifier.clone())
                    .with_context("expected", width.to_string())
                    .with_context("found", other.to_string()),
            ));
        }
    }
    Ok(width)
}
