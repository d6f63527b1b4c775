//! Persisted campaign state and the phases of the iteration loop.

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use camd_agent::CandidatePrediction;
use camd_core::{CandidateEntry, CandidateTable, EvaluationResult, SeedTable};
use camd_hull::Analysis;
use serde::{Deserialize, Serialize};

use crate::history::CampaignHistory;

/// Phase of the campaign state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CampaignPhase {
    /// Inputs accepted, nothing persisted yet.
    Initializing,
    /// Next step asks the policy for a batch.
    Hypothesizing,
    /// Next step hands the pending batch to the evaluator.
    RunningExperiments,
    /// Next step merges the evaluator results into the seed table.
    GettingResults,
    /// Next step recomputes hull stability.
    Analyzing,
    /// Terminal.
    Finalized,
}

impl CampaignPhase {
    /// Kebab-case name used in logs and snapshot file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignPhase::Initializing => "initializing",
            CampaignPhase::Hypothesizing => "hypothesizing",
            CampaignPhase::RunningExperiments => "running-experiments",
            CampaignPhase::GettingResults => "getting-results",
            CampaignPhase::Analyzing => "analyzing",
            CampaignPhase::Finalized => "finalized",
        }
    }
}

impl Display for CampaignPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the campaign reached [`CampaignPhase::Finalized`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum TerminalReason {
    /// The configured iteration budget was spent.
    BudgetReached,
    /// The policy reported an empty candidate pool.
    Exhausted,
    /// An evaluator fault aborted the campaign.
    Fault {
        /// Error code of the fault.
        code: String,
        /// Diagnostic message of the fault.
        message: String,
    },
}

/// Batch selected by the policy and not yet analysed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBatch {
    /// Iteration the batch belongs to.
    pub iteration: usize,
    /// Identifiers chosen by ranking.
    pub exploit: Vec<String>,
    /// Identifiers chosen by random sampling.
    pub explore: Vec<String>,
    /// Candidate rows removed from the pool, in submission order.
    pub candidates: Vec<CandidateEntry>,
    /// Policy predictions for the whole pool at selection time.
    pub predictions: Vec<CandidatePrediction>,
    /// Evaluator results, stored before they are merged.
    #[serde(default)]
    pub results: Option<Vec<EvaluationResult>>,
}

/// Everything needed to continue a campaign after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignState {
    /// Current phase.
    pub phase: CampaignPhase,
    /// Index of the iteration in progress.
    pub iteration: usize,
    /// Number of transitions taken so far.
    pub transitions: u64,
    /// Candidates not yet selected.
    pub candidates: CandidateTable,
    /// Evaluated rows.
    pub seed: SeedTable,
    /// Size of the seed table before the first iteration.
    pub initial_seed_size: usize,
    /// Batch in flight, if any.
    #[serde(default)]
    pub batch: Option<PendingBatch>,
    /// Iteration and failure records.
    #[serde(default)]
    pub history: CampaignHistory,
    /// Reduced formulas of stable compositions found by the loop.
    #[serde(default)]
    pub discovered: BTreeSet<String>,
    /// Output of the most recent analysis pass.
    #[serde(default)]
    pub last_analysis: Option<Analysis>,
    /// Set once the campaign is finalized.
    #[serde(default)]
    pub terminal: Option<TerminalReason>,
}

impl CampaignState {
    /// Fresh state for validated inputs.
    pub fn new(candidates: CandidateTable, seed: SeedTable) -> Self {
        let initial_seed_size = seed.len();
        Self {
            phase: CampaignPhase::Initializing,
            iteration: 0,
            transitions: 0,
            candidates,
            seed,
            initial_seed_size,
            batch: None,
            history: CampaignHistory::default(),
            discovered: BTreeSet::new(),
            last_analysis: None,
            terminal: None,
        }
    }

    /// True once no further transitions are possible.
    pub fn is_finalized(&self) -> bool {
        self.phase == CampaignPhase::Finalized
    }
}
