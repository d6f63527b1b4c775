use camd_core::errors::CampError;
use camd_core::{feature_width, CandidateTable, RngHandle, SeedTable};
use camd_hull::{hull_entries, AnalyzerConfig, HullEntry, StabilityAnalyzer};
use rand::RngCore;
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::ensemble::RidgeEnsemble;
use crate::policy::{
    batch_split, ensure_proposable, rank_by_score, sample_uniform, CandidatePrediction, Proposal,
    SelectionPolicy,
};

/// Agent ranking candidates by predicted hull distance with an uncertainty bonus.
///
/// The acquisition score is `margin - alpha * std`, where `margin` is the
/// predicted energy minus the current hull energy at the candidate's
/// composition (negative below the hull). Where no bounded hull covers a
/// candidate the predicted formation energy itself stands in, i.e. the margin
/// against the elemental references at zero.
#[derive(Debug, Clone)]
pub struct StabilityAgent {
    config: AgentConfig,
    analyzer: StabilityAnalyzer,
}

impl StabilityAgent {
    /// Validates `config` and builds the agent.
    pub fn new(config: AgentConfig) -> Result<Self, CampError> {
        config.validate()?;
        let analyzer = StabilityAnalyzer::new(AnalyzerConfig {
            hull_distance: config.hull_distance,
        })?;
        Ok(Self { config, analyzer })
    }

    /// Agent configuration.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn acquisition(&self, margin: f64, std: f64) -> f64 {
        if self.config.uncertainty {
            margin - self.config.alpha * std
        } else {
            margin
        }
    }

    fn cold_start(
        &self,
        candidates: &CandidateTable,
        batch: usize,
        rng: &mut RngHandle,
    ) -> Proposal {
        info!(batch, pool = candidates.len(), "empty seed table; sampling uniformly");
        Proposal {
            exploit: Vec::new(),
            explore: sample_uniform(&candidates.identifiers(), batch, rng),
            predictions: candidates.iter().map(CandidatePrediction::from_cached).collect(),
        }
    }
}

impl SelectionPolicy for StabilityAgent {
    fn name(&self) -> &str {
        "stability"
    }

    fn batch_size(&self) -> usize {
        self.config.n_query
    }

    fn propose(
        &self,
        candidates: &CandidateTable,
        seed: &SeedTable,
        n_query: usize,
        rng: &mut RngHandle,
    ) -> Result<Proposal, CampError> {
        ensure_proposable(candidates, n_query)?;
        let (exploit_count, explore_count) =
            batch_split(n_query, self.config.exploit_fraction, candidates.len());
        if seed.is_empty() {
            return Ok(self.cold_start(candidates, exploit_count + explore_count, rng));
        }
        feature_width(candidates, seed)?;

        let features: Vec<Vec<f64>> = seed.iter().map(|entry| entry.features.clone()).collect();
        let targets: Vec<f64> = seed.iter().map(|entry| entry.formation_energy).collect();
        let model = RidgeEnsemble::fit(&features, &targets, &self.config.model, rng.next_u64())?;

        let mut estimates = Vec::with_capacity(candidates.len());
        let mut queries = Vec::with_capacity(candidates.len());
        for candidate in candidates.iter() {
            let estimate = model.predict(&candidate.features)?;
            queries.push(HullEntry::new(
                candidate.identifier.clone(),
                candidate.composition.clone(),
                estimate.mean,
            ));
            estimates.push(estimate);
        }
        let scores = self
            .analyzer
            .score_candidates(&hull_entries(seed), &queries)?;

        let mut predictions = Vec::with_capacity(candidates.len());
        let mut ranked = Vec::with_capacity(candidates.len());
        for ((candidate, estimate), scored) in candidates.iter().zip(&estimates).zip(scores) {
            let score = self.acquisition(scored.margin.unwrap_or(estimate.mean), estimate.std);
            ranked.push((candidate.identifier.clone(), score));
            predictions.push(CandidatePrediction {
                identifier: candidate.identifier.clone(),
                mean: Some(estimate.mean),
                uncertainty: Some(estimate.std),
                hull_distance: scored.judgment.hull_distance,
                is_stable: scored.judgment.is_stable,
                score: Some(score),
            });
        }
        rank_by_score(&mut ranked);

        let rest: Vec<String> = ranked
            .iter()
            .skip(exploit_count)
            .map(|(identifier, _)| identifier.clone())
            .collect();
        let exploit: Vec<String> = ranked
            .into_iter()
            .take(exploit_count)
            .map(|(identifier, _)| identifier)
            .collect();
        let explore = sample_uniform(&rest, explore_count, rng);

        debug!(
            exploit = exploit.len(),
            explore = explore.len(),
            predicted_stable = predictions.iter().filter(|p| p.is_stable).count(),
            "stability agent proposal"
        );
        Ok(Proposal {
            exploit,
            explore,
            predictions,
        })
    }
}
