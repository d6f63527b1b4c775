//! Selection-policy contract and the batch-split helpers shared by agents.
//!
//! A policy receives read-only views of the candidate pool and the seed table
//! and returns a [`Proposal`]: the identifiers to evaluate next, split into an
//! exploitation and an exploration part, plus one [`CandidatePrediction`] per
//! row of the pool. All randomness is drawn from the [`RngHandle`] handed in by
//! the caller so identical inputs and seed yield identical proposals.

use camd_core::errors::{CampError, ErrorInfo};
use camd_core::{CandidateEntry, CandidateTable, RngHandle, SeedTable};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Prediction reported for one candidate, selected or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePrediction {
    /// Candidate identifier.
    pub identifier: String,
    /// Predicted formation energy per atom.
    pub mean: Option<f64>,
    /// Dispersion of the prediction.
    pub uncertainty: Option<f64>,
    /// Predicted energy above the current hull.
    pub hull_distance: Option<f64>,
    /// Predicted hull distance within the agent threshold.
    pub is_stable: bool,
    /// Acquisition score; lower ranks first.
    pub score: Option<f64>,
}

impl CandidatePrediction {
    /// Report for a row the policy did not model.
    pub fn unknown(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            mean: None,
            uncertainty: None,
            hull_distance: None,
            is_stable: false,
            score: None,
        }
    }

    /// Report built from the prediction cached on the candidate, if any.
    pub fn from_cached(candidate: &CandidateEntry) -> Self {
        let mut report = Self::unknown(candidate.identifier.clone());
        if let Some(prediction) = candidate.prediction {
            report.mean = Some(prediction.mean);
            report.uncertainty = Some(prediction.uncertainty);
        }
        report
    }
}

/// Batch proposed for evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Top-ranked identifiers, best first.
    pub exploit: Vec<String>,
    /// Identifiers sampled uniformly from the rest of the pool.
    pub explore: Vec<String>,
    /// One report per candidate in the pool, in pool order.
    pub predictions: Vec<CandidatePrediction>,
}

impl Proposal {
    /// Exploit identifiers followed by explore identifiers.
    pub fn selected(&self) -> Vec<String> {
        self.exploit
            .iter()
            .chain(self.explore.iter())
            .cloned()
            .collect()
    }

    /// Number of selected identifiers.
    pub fn len(&self) -> usize {
        self.exploit.len() + self.explore.len()
    }

    /// True when nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decides which candidates to evaluate next.
pub trait SelectionPolicy {
    /// Short policy name used in logs.
    fn name(&self) -> &str;

    /// Configured batch size.
    fn batch_size(&self) -> usize;

    /// Proposes at most `n_query` distinct identifiers from `candidates`.
    ///
    /// Fails with [`CampError::Exhausted`] when the pool is empty. Neither
    /// table is modified.
    fn propose(
        &self,
        candidates: &CandidateTable,
        seed: &SeedTable,
        n_query: usize,
        rng: &mut RngHandle,
    ) -> Result<Proposal, CampError>;
}

/// Checks the preconditions every policy shares.
pub fn ensure_proposable(candidates: &CandidateTable, n_query: usize) -> Result<(), CampError> {
    if n_query == 0 {
        return Err(CampError::InvalidInput(
            ErrorInfo::new("agent-n-query", "n_query must be > 0")
                .with_context("n_query", "0"),
        ));
    }
    if candidates.is_empty() {
        return Err(CampError::Exhausted(
            ErrorInfo::new("candidates-exhausted", "candidate table is empty")
                .with_hint("finalize the campaign; no candidates remain"),
        ));
    }
    Ok(())
}

/// Splits a batch into `(exploit, explore)` counts.
///
/// The batch is capped at the pool size; the exploit share is
/// `round(n_query * exploit_fraction)`, itself capped at the batch.
pub fn batch_split(n_query: usize, exploit_fraction: f64, available: usize) -> (usize, usize) {
    let batch = n_query.min(available);
    let wanted = (n_query as f64 * exploit_fraction.clamp(0.0, 1.0)).round() as usize;
    let exploit = wanted.min(batch);
    (exploit, batch - exploit)
}

/// Draws `count` identifiers uniformly without replacement.
///
/// The pool is sorted first so the draw depends only on its contents.
pub fn sample_uniform(pool: &[String], count: usize, rng: &mut RngHandle) -> Vec<String> {
    let mut sorted: Vec<&String> = pool.iter().collect();
    sorted.sort();
    sorted
        .choose_multiple(rng.inner_mut(), count.min(sorted.len()))
        .map(|identifier| (*identifier).clone())
        .collect()
}

/// Orders identifiers by ascending score, breaking ties by identifier.
pub fn rank_by_score(scored: &mut [(String, f64)]) {
    scored.sort_by(|(id_a, a), (id_b, b)| a.total_cmp(b).then_with(|| id_a.cmp(id_b)));
}
