use serde::{Deserialize, Serialize};

/// Summary of one completed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Candidates submitted to the evaluator this iteration.
    pub new_candidates: usize,
    /// Stable compositions first seen this iteration.
    pub new_discovery: usize,
    /// Stable compositions discovered since the campaign started.
    pub total_discovery: usize,
}

/// A candidate whose evaluation produced no usable energy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Iteration whose batch contained the candidate.
    pub iteration: usize,
    /// Candidate identifier.
    pub identifier: String,
    /// Reason reported by the evaluator or the orchestrator.
    pub reason: String,
}

/// Append-only campaign history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignHistory {
    /// One record per completed iteration.
    pub iterations: Vec<IterationRecord>,
    /// Every failed evaluation, in the order observed.
    pub failures: Vec<FailureRecord>,
}

impl CampaignHistory {
    /// Number of completed iterations.
    pub fn completed(&self) -> usize {
        self.iterations.len()
    }

    /// Most recent iteration record.
    pub fn last(&self) -> Option<&IterationRecord> {
        self.iterations.last()
    }

    /// Failures recorded for `iteration`.
    pub fn failures_in(&self, iteration: usize) -> impl Iterator<Item = &FailureRecord> + '_ {
        self.failures
            .iter()
            .filter(move |failure| failure.iteration == iteration)
    }
}
