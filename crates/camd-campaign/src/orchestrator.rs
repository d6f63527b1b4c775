//! Campaign state machine.
//!
//! Each call to [`Campaign::step`] performs exactly one transition and
//! persists the resulting state. Evaluator results are written into the
//! checkpoint before they are merged, so a resumed campaign never contacts the
//! evaluator again for a batch that already resolved. Replies naming unknown
//! or repeated identifiers are rejected before they reach the checkpoint.
//!
//! Fatal errors from any collaborator finalize the campaign in memory.
//! Recoverable ones leave the phase untouched, so the step can be retried.

use std::collections::{BTreeMap, BTreeSet};

use camd_agent::{SelectionPolicy, StabilityAgent};
use camd_core::errors::{CampError, ErrorInfo};
use camd_core::{
    ensure_disjoint, feature_width, CandidateEntry, CandidateTable, EvaluationOutcome,
    EvaluationResult, RngHandle, SeedEntry, SeedTable,
};
use camd_hull::{hull_entries, StabilityAnalysis, StabilityAnalyzer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::CampaignConfig;
use crate::evaluator::Evaluator;
use crate::history::{CampaignHistory, FailureRecord, IterationRecord};
use crate::state::{CampaignPhase, CampaignState, PendingBatch, TerminalReason};

const MISSING_RESULT: &str = "no result reported";
const NON_FINITE_ENERGY: &str = "non-finite formation energy";

/// Report on a campaign, finished or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    /// Completed iterations.
    pub iterations: usize,
    /// Current phase.
    pub phase: CampaignPhase,
    /// Why the campaign finished, if it did.
    pub terminal: Option<TerminalReason>,
    /// Rows in the seed table before the first iteration.
    pub initial_seed_size: usize,
    /// Rows in the seed table now.
    pub seed_size: usize,
    /// Candidates never selected.
    pub remaining_candidates: usize,
    /// Failed evaluations recorded in history.
    pub failures: usize,
    /// Stable compositions discovered by the loop.
    pub total_discovery: usize,
    /// Reduced formulas of the discoveries, alphabetical.
    pub discovered: Vec<String>,
}

/// Closed-loop stability-discovery campaign.
pub struct Campaign<P, A, E> {
    config: CampaignConfig,
    policy: P,
    analyzer: A,
    evaluator: E,
    state: CampaignState,
    store: CheckpointStore,
}

impl<E: Evaluator> Campaign<StabilityAgent, StabilityAnalyzer, E> {
    /// Campaign using the stability agent and analyzer described by `config`.
    pub fn from_config(
        config: CampaignConfig,
        candidates: CandidateTable,
        seed: SeedTable,
        evaluator: E,
    ) -> Result<Self, CampError> {
        let policy = StabilityAgent::new(config.agent.clone())?;
        let analyzer = StabilityAnalyzer::new(config.analyzer)?;
        Self::new(config, candidates, seed, policy, analyzer, evaluator)
    }
}

impl<P, A, E> Campaign<P, A, E>
where
    P: SelectionPolicy,
    A: StabilityAnalysis,
    E: Evaluator,
{
    /// Validates the inputs and prepares a campaign in the initializing phase.
    pub fn new(
        config: CampaignConfig,
        candidates: CandidateTable,
        seed: SeedTable,
        policy: P,
        analyzer: A,
        evaluator: E,
    ) -> Result<Self, CampError> {
        config.validate()?;
        if candidates.is_empty() {
            return Err(CampError::InvalidInput(
                ErrorInfo::new("candidates-empty", "a campaign needs at least one candidate")
                    .with_hint("generate candidates before starting the campaign"),
            ));
        }
        ensure_disjoint(&candidates, &seed)?;
        feature_width(&candidates, &seed)?;
        let store = CheckpointStore::new(&config.checkpoint, config.config_hash()?);
        Ok(Self {
            config,
            policy,
            analyzer,
            evaluator,
            state: CampaignState::new(candidates, seed),
            store,
        })
    }

    /// Continues from the checkpoint named by `config.checkpoint`.
    pub fn resume(
        config: CampaignConfig,
        policy: P,
        analyzer: A,
        evaluator: E,
    ) -> Result<Self, CampError> {
        config.validate()?;
        let store = CheckpointStore::new(&config.checkpoint, config.config_hash()?);
        let checkpoint = store.load()?;
        Self::restore(config, checkpoint, store, policy, analyzer, evaluator)
    }

    /// Continues from an in-memory checkpoint.
    pub fn from_checkpoint(
        config: CampaignConfig,
        checkpoint: Checkpoint,
        policy: P,
        analyzer: A,
        evaluator: E,
    ) -> Result<Self, CampError> {
        config.validate()?;
        let hash = config.config_hash()?;
        checkpoint.verify(&hash)?;
        let store = CheckpointStore::new(&config.checkpoint, hash);
        Self::restore(config, checkpoint, store, policy, analyzer, evaluator)
    }

    fn restore(
        config: CampaignConfig,
        checkpoint: Checkpoint,
        store: CheckpointStore,
        policy: P,
        analyzer: A,
        evaluator: E,
    ) -> Result<Self, CampError> {
        let state = checkpoint.state;
        info!(
            phase = %state.phase,
            iteration = state.iteration,
            completed = state.history.completed(),
            "campaign resumed from checkpoint"
        );
        Ok(Self {
            config,
            policy,
            analyzer,
            evaluator,
            state,
            store,
        })
    }

    /// Current state.
    pub fn state(&self) -> &CampaignState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> CampaignPhase {
        self.state.phase
    }

    /// Campaign history.
    pub fn history(&self) -> &CampaignHistory {
        &self.state.history
    }

    /// Candidates not yet selected.
    pub fn candidates(&self) -> &CandidateTable {
        &self.state.candidates
    }

    /// Evaluated rows.
    pub fn seed(&self) -> &SeedTable {
        &self.state.seed
    }

    /// Checkpoint store.
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Evaluator backend.
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Configuration the campaign runs with.
    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    /// True once no further transitions are possible.
    pub fn is_finalized(&self) -> bool {
        self.state.is_finalized()
    }

    /// Steps until the campaign is finalized.
    pub fn run(&mut self) -> Result<CampaignSummary, CampError> {
        while !self.is_finalized() {
            self.step()?;
        }
        let summary = self.summary();
        info!(
            iterations = summary.iterations,
            seed_size = summary.seed_size,
            total_discovery = summary.total_discovery,
            "campaign finished"
        );
        Ok(summary)
    }

    /// Performs one transition and persists the resulting state.
    ///
    /// Returns the phase the campaign moved to.
    pub fn step(&mut self) -> Result<CampaignPhase, CampError> {
        let from = self.state.phase;
        match from {
            CampaignPhase::Initializing => self.initialize(),
            CampaignPhase::Hypothesizing => self.hypothesize()?,
            CampaignPhase::RunningExperiments => self.run_experiments()?,
            CampaignPhase::GettingResults => self.get_results()?,
            CampaignPhase::Analyzing => self.analyze()?,
            CampaignPhase::Finalized => {
                return Err(CampError::InvalidInput(ErrorInfo::new(
                    "campaign-finalized",
                    "a finalized campaign accepts no further transitions",
                )))
            }
        }
        self.state.transitions += 1;
        self.store.save(&self.state)?;
        debug!(
            from = %from,
            to = %self.state.phase,
            iteration = self.state.iteration,
            "transition"
        );
        Ok(self.state.phase)
    }

    /// Snapshot of the campaign's progress.
    pub fn summary(&self) -> CampaignSummary {
        CampaignSummary {
            iterations: self.state.history.completed(),
            phase: self.state.phase,
            terminal: self.state.terminal.clone(),
            initial_seed_size: self.state.initial_seed_size,
            seed_size: self.state.seed.len(),
            remaining_candidates: self.state.candidates.len(),
            failures: self.state.history.failures.len(),
            total_discovery: self.state.discovered.len(),
            discovered: self.state.discovered.iter().cloned().collect(),
        }
    }

    fn finalize(&mut self, reason: TerminalReason) {
        info!(?reason, iteration = self.state.iteration, "campaign finalized");
        self.state.phase = CampaignPhase::Finalized;
        self.state.terminal = Some(reason);
    }

    /// Ends the in-memory campaign on an unrecoverable error from `source`.
    /// Nothing is persisted, so the checkpoint keeps the state from before
    /// the step.
    fn fault(&mut self, source: &'static str, err: CampError) -> CampError {
        warn!(source, error = %err, iteration = self.state.iteration, "campaign fault");
        self.finalize(TerminalReason::Fault {
            code: err.info().code.clone(),
            message: err.info().message.clone(),
        });
        err
    }

    fn budget_spent(&self) -> bool {
        self.config
            .iterations
            .map(|budget| self.state.history.completed() >= budget)
            .unwrap_or(false)
    }

    fn initialize(&mut self) {
        info!(
            candidates = self.state.candidates.len(),
            seed = self.state.seed.len(),
            policy = self.policy.name(),
            budget = ?self.config.iterations,
            "campaign initialized"
        );
        if self.budget_spent() {
            self.finalize(TerminalReason::BudgetReached);
        } else {
            self.state.phase = CampaignPhase::Hypothesizing;
        }
    }

    fn hypothesize(&mut self) -> Result<(), CampError> {
        let iteration = self.state.iteration;
        let mut rng = RngHandle::substream(self.config.seed_policy.master_seed, iteration as u64);
        let proposal = match self.policy.propose(
            &self.state.candidates,
            &self.state.seed,
            self.policy.batch_size(),
            &mut rng,
        ) {
            Ok(proposal) if !proposal.is_empty() => proposal,
            Ok(_) | Err(CampError::Exhausted(_)) => {
                self.finalize(TerminalReason::Exhausted);
                return Ok(());
            }
            Err(err) if err.is_fatal() => return Err(self.fault("policy", err)),
            Err(err) => return Err(err),
        };

        let candidates = self.state.candidates.take(&proposal.selected())?;
        info!(
            iteration,
            exploit = proposal.exploit.len(),
            explore = proposal.explore.len(),
            remaining = self.state.candidates.len(),
            "batch selected"
        );
        self.state.batch = Some(PendingBatch {
            iteration,
            exploit: proposal.exploit,
            explore: proposal.explore,
            candidates,
            predictions: proposal.predictions,
            results: None,
        });
        self.state.phase = CampaignPhase::RunningExperiments;
        Ok(())
    }

    fn run_experiments(&mut self) -> Result<(), CampError> {
        let batch = self.pending_batch()?;
        let submitted = batch.candidates.clone();
        let results = match self.evaluate(&submitted) {
            Ok(results) => results,
            Err(err) => return Err(self.fault("evaluator", err)),
        };
        if let Err(err) = check_results(&submitted, &results) {
            return Err(self.fault("evaluator", err));
        }
        let results = results.into_iter().map(sanitize).collect();
        if let Some(batch) = self.state.batch.as_mut() {
            batch.results = Some(results);
        }
        self.state.phase = CampaignPhase::GettingResults;
        Ok(())
    }

    fn evaluate(&mut self, batch: &[CandidateEntry]) -> Result<Vec<EvaluationResult>, CampError> {
        let stage = |stage: &'static str| {
            move |err: CampError| match err {
                CampError::Collaborator(info) => {
                    CampError::Collaborator(info.with_context("stage", stage))
                }
                other => CampError::Collaborator(
                    ErrorInfo::new("evaluator-fault", other.to_string())
                        .with_context("stage", stage),
                ),
            }
        };
        self.evaluator.submit(batch).map_err(stage("submit"))?;
        self.evaluator.monitor().map_err(stage("monitor"))?;
        self.evaluator.get_results().map_err(stage("get-results"))
    }

    fn get_results(&mut self) -> Result<(), CampError> {
        let iteration = self.state.iteration;
        let batch = self.pending_batch()?;
        let mut by_id: BTreeMap<String, EvaluationOutcome> = batch
            .results
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|result| (result.identifier, result.outcome))
            .collect();

        let candidates = batch.candidates.clone();
        let mut succeeded = 0usize;
        let mut failures = Vec::new();
        for candidate in candidates {
            match by_id.remove(&candidate.identifier) {
                Some(EvaluationOutcome::Succeeded { formation_energy }) => {
                    let entry = SeedEntry::from_candidate(candidate, formation_energy, iteration)?;
                    self.state.seed.insert(entry)?;
                    succeeded += 1;
                }
                Some(EvaluationOutcome::Failed { reason }) => failures.push(FailureRecord {
                    iteration,
                    identifier: candidate.identifier,
                    reason,
                }),
                None => failures.push(FailureRecord {
                    iteration,
                    identifier: candidate.identifier,
                    reason: MISSING_RESULT.to_string(),
                }),
            }
        }
        if !failures.is_empty() {
            warn!(iteration, failed = failures.len(), "evaluations failed");
        }
        info!(iteration, succeeded, seed = self.state.seed.len(), "results merged");
        self.state.history.failures.extend(failures);
        if let Some(batch) = self.state.batch.as_mut() {
            batch.results = None;
        }
        self.state.phase = CampaignPhase::Analyzing;
        Ok(())
    }

    fn analyze(&mut self) -> Result<(), CampError> {
        let iteration = self.state.iteration;
        let analysis = match self.analyzer.analyze(&hull_entries(&self.state.seed)) {
            Ok(analysis) => analysis,
            Err(err) if err.is_fatal() => return Err(self.fault("analyzer", err)),
            Err(err) => return Err(err),
        };
        let mut new_discovery = 0usize;
        for judgment in analysis.stable() {
            let found_by_loop = self
                .state
                .seed
                .get(&judgment.identifier)
                .map(SeedEntry::is_campaign_entry)
                .unwrap_or(false);
            if found_by_loop && self.state.discovered.insert(judgment.reduced_formula.clone()) {
                new_discovery += 1;
            }
        }
        let new_candidates = self
            .state
            .batch
            .take()
            .map(|batch| batch.candidates.len())
            .unwrap_or(0);
        let record = IterationRecord {
            iteration,
            new_candidates,
            new_discovery,
            total_discovery: self.state.discovered.len(),
        };
        info!(
            iteration,
            new_candidates,
            new_discovery,
            total_discovery = record.total_discovery,
            "iteration analysed"
        );
        self.state.history.iterations.push(record);
        self.state.last_analysis = Some(analysis);

        if self.budget_spent() {
            self.finalize(TerminalReason::BudgetReached);
        } else {
            self.state.iteration += 1;
            self.state.phase = CampaignPhase::Hypothesizing;
        }
        Ok(())
    }

    fn pending_batch(&self) -> Result<&PendingBatch, CampError> {
        self.state.batch.as_ref().ok_or_else(|| {
            CampError::Serde(
                ErrorInfo::new("batch-missing", "phase requires a pending batch")
                    .with_context("phase", self.state.phase.as_str()),
            )
        })
    }
}

/// Rejects results naming an identifier outside the batch or naming one twice.
fn check_results(
    submitted: &[CandidateEntry],
    results: &[EvaluationResult],
) -> Result<(), CampError> {
    let submitted: BTreeSet<&str> = submitted
        .iter()
        .map(|candidate| candidate.identifier.as_str())
        .collect();
    let mut seen = BTreeSet::new();
    for result in results {
        let problem = if !submitted.contains(result.identifier.as_str()) {
            Some(("result-unknown", "evaluator reported an identifier never submitted"))
        } else if !seen.insert(result.identifier.as_str()) {
            Some(("result-duplicate", "evaluator reported an identifier twice"))
        } else {
            None
        };
        if let Some((code, message)) = problem {
            return Err(CampError::Collaborator(
                ErrorInfo::new(code, message)
                    .with_context("identifier", result.identifier.clone()),
            ));
        }
    }
    Ok(())
}

fn sanitize(result: EvaluationResult) -> EvaluationResult {
    match result.outcome {
        EvaluationOutcome::Succeeded { formation_energy } if !formation_energy.is_finite() => {
            EvaluationResult {
                identifier: result.identifier,
                outcome: EvaluationOutcome::Failed {
                    reason: NON_FINITE_ENERGY.to_string(),
                },
                payload: result.payload,
            }
        }
        _ => result,
    }
}
