use camd_core::errors::{CampError, ErrorInfo};
use camd_core::{CandidateTable, RngHandle, SeedTable};
use tracing::debug;

use crate::policy::{
    ensure_proposable, sample_uniform, CandidatePrediction, Proposal, SelectionPolicy,
};

/// Baseline agent sampling the whole batch uniformly.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    n_query: usize,
}

impl RandomAgent {
    /// Creates the agent for batches of `n_query`.
    pub fn new(n_query: usize) -> Result<Self, CampError> {
        if n_query == 0 {
            return Err(CampError::InvalidInput(
                ErrorInfo::new("agent-n-query", "n_query must be > 0")
                    .with_context("n_query", "0"),
            ));
        }
        Ok(Self { n_query })
    }
}

impl SelectionPolicy for RandomAgent {
    fn name(&self) -> &str {
        "random"
    }

    fn batch_size(&self) -> usize {
        self.n_query
    }

    fn propose(
        &self,
        candidates: &CandidateTable,
        _seed: &SeedTable,
        n_query: usize,
        rng: &mut RngHandle,
    ) -> Result<Proposal, CampError> {
        ensure_proposable(candidates, n_query)?;
        let explore = sample_uniform(&candidates.identifiers(), n_query, rng);
        debug!(batch = explore.len(), "random agent proposal");
        Ok(Proposal {
            exploit: Vec::new(),
            explore,
            predictions: candidates.iter().map(CandidatePrediction::from_cached).collect(),
        })
    }
}
