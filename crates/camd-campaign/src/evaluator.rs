//! Ground-truth evaluator contract and a lookup-table implementation.

use std::collections::{BTreeMap, BTreeSet};

use camd_core::errors::{CampError, ErrorInfo};
use camd_core::{CandidateEntry, EvaluationResult, SeedEntry};
use serde_json::json;
use tracing::debug;

/// Backend computing formation energies for submitted candidates.
///
/// The orchestrator calls `submit`, then `monitor`, then `get_results` once
/// per batch. `monitor` blocks until every submitted row is resolved; there is
/// no partial return. An `Err` from any method is an unrecoverable fault of the
/// backend; per-row failures belong in the returned results instead.
pub trait Evaluator {
    /// Starts evaluating `batch`.
    fn submit(&mut self, batch: &[CandidateEntry]) -> Result<(), CampError>;

    /// Blocks until the submitted batch is resolved.
    fn monitor(&mut self) -> Result<(), CampError>;

    /// One result per submitted candidate.
    fn get_results(&mut self) -> Result<Vec<EvaluationResult>, CampError>;
}

fn protocol_error(code: &str, message: &str) -> CampError {
    CampError::Collaborator(ErrorInfo::new(code, message))
}

/// Evaluator answering from a table of known energies.
///
/// Useful for simulating a campaign over an already computed dataset.
/// Identifiers missing from the table, or marked failing, resolve as failed.
#[derive(Debug, Clone, Default)]
pub struct LookupEvaluator {
    energies: BTreeMap<String, f64>,
    failing: BTreeSet<String>,
    submitted: Vec<String>,
    resolved: bool,
    submissions: usize,
}

impl LookupEvaluator {
    /// Creates an evaluator over `(identifier, formation energy)` pairs.
    pub fn new<I, S>(energies: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            energies: energies
                .into_iter()
                .map(|(identifier, energy)| (identifier.into(), energy))
                .collect(),
            ..Self::default()
        }
    }

    /// Creates an evaluator reporting the energies of existing rows.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a SeedEntry>,
    {
        Self::new(
            entries
                .into_iter()
                .map(|entry| (entry.identifier.clone(), entry.formation_energy)),
        )
    }

    /// Marks identifiers whose evaluation always fails.
    pub fn with_failures<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing
            .extend(identifiers.into_iter().map(Into::into));
        self
    }

    /// Number of batches submitted so far.
    pub fn submissions(&self) -> usize {
        self.submissions
    }
}

impl Evaluator for LookupEvaluator {
    fn submit(&mut self, batch: &[CandidateEntry]) -> Result<(), CampError> {
        if !self.submitted.is_empty() {
            return Err(protocol_error(
                "evaluator-busy",
                "a batch is already pending; collect its results first",
            ));
        }
        self.submitted = batch
            .iter()
            .map(|candidate| candidate.identifier.clone())
            .collect();
        self.resolved = false;
        self.submissions += 1;
        debug!(rows = batch.len(), "lookup evaluator accepted batch");
        Ok(())
    }

    fn monitor(&mut self) -> Result<(), CampError> {
        self.resolved = true;
        Ok(())
    }

    fn get_results(&mut self) -> Result<Vec<EvaluationResult>, CampError> {
        if !self.resolved {
            return Err(protocol_error(
                "evaluator-unresolved",
                "results requested before monitor returned",
            ));
        }
        self.resolved = false;
        Ok(std::mem::take(&mut self.submitted)
            .into_iter()
            .map(|identifier| {
                if self.failing.contains(&identifier) {
                    return EvaluationResult::failed(identifier, "evaluation marked failing");
                }
                match self.energies.get(&identifier) {
                    Some(&energy) => EvaluationResult::succeeded(identifier, energy)
                        .with_payload(json!({ "source": "lookup" })),
                    None => EvaluationResult::failed(identifier, "no reference energy"),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camd_core::{Composition, EvaluationStatus};

    fn candidate(id: &str) -> CandidateEntry {
        CandidateEntry::new(id, Composition::from_pairs(&[("X", 1.0)]).unwrap(), vec![]).unwrap()
    }

    #[test]
    fn resolves_known_unknown_and_failing_rows() {
        let mut evaluator = LookupEvaluator::new([("a", -0.2), ("b", 0.1)]).with_failures(["b"]);
        evaluator
            .submit(&[candidate("a"), candidate("b"), candidate("c")])
            .unwrap();
        evaluator.monitor().unwrap();
        let results = evaluator.get_results().unwrap();
        assert_eq!(results[0].formation_energy(), Some(-0.2));
        assert_eq!(results[1].status(), EvaluationStatus::Failed);
        assert_eq!(results[2].status(), EvaluationStatus::Failed);
        assert_eq!(evaluator.submissions(), 1);
    }

    #[test]
    fn results_require_monitor() {
        let mut evaluator = LookupEvaluator::new([("a", 0.0)]);
        evaluator.submit(&[candidate("a")]).unwrap();
        let err = evaluator.get_results().unwrap_err();
        assert_eq!(err.info().code, "evaluator-unresolved");
        assert!(err.is_fatal());
    }
}
