#![allow(dead_code)]

use std::collections::BTreeMap;
use std::f64::consts::PI;

use camd_agent::{Proposal, SelectionPolicy};
use camd_campaign::{CampaignConfig, Evaluator, LookupEvaluator};
use camd_core::errors::{CampError, ErrorInfo};
use camd_core::{
    CandidateEntry, CandidateTable, Composition, EvaluationResult, RngHandle, SeedEntry,
    SeedTable,
};
use camd_hull::{Analysis, HullEntry, StabilityAnalysis};

fn features(x: f64) -> Vec<f64> {
    vec![x, x * x]
}

/// Ground-truth energy of `X_a Y_b`: a shallow concave bowl with deep wells
/// at `XY` and `XY3`, which therefore sit on the hull.
pub fn truth(a: u32, b: u32) -> f64 {
    let x = a as f64 / (a + b) as f64;
    let well = if (x - 0.25).abs() < 1e-9 || (x - 0.5).abs() < 1e-9 {
        -0.3
    } else {
        0.0
    };
    -0.4 * (PI * x).sin() + well
}

/// Candidate pool of distinct binary compositions `X_a Y_b` with `a, b` in `1..=6`.
pub fn pool() -> CandidateTable {
    let mut seen = BTreeMap::new();
    for a in 1..=6u32 {
        for b in 1..=6u32 {
            let x = a as f64 / (a + b) as f64;
            let key = (x * 1e6).round() as i64;
            seen.entry(key).or_insert((a, b));
        }
    }
    let rows = seen
        .values()
        .map(|&(a, b)| {
            let composition = Composition::from_pairs(&[("X", a as f64), ("Y", b as f64)])
                .expect("composition");
            let x = a as f64 / (a + b) as f64;
            CandidateEntry::new(format!("X{a}Y{b}"), composition, features(x)).expect("candidate")
        })
        .collect();
    CandidateTable::new(rows).expect("pool")
}

/// Elemental end-members at zero formation energy.
pub fn seed() -> SeedTable {
    let x = Composition::from_pairs(&[("X", 1.0)]).expect("X");
    let y = Composition::from_pairs(&[("Y", 1.0)]).expect("Y");
    SeedTable::new(vec![
        SeedEntry::new("X", x, 0.0, features(1.0)).expect("seed X"),
        SeedEntry::new("Y", y, 0.0, features(0.0)).expect("seed Y"),
    ])
    .expect("seed")
}

/// Lookup evaluator answering with [`truth`] for every pool row.
pub fn evaluator() -> LookupEvaluator {
    let energies: Vec<(String, f64)> = pool()
        .iter()
        .map(|candidate| {
            let a = candidate.composition.amounts()["X"] as u32;
            let b = candidate.composition.amounts()["Y"] as u32;
            (candidate.identifier.clone(), truth(a, b))
        })
        .collect();
    LookupEvaluator::new(energies)
}

pub fn config(n_query: usize, iterations: Option<usize>) -> CampaignConfig {
    let mut config = CampaignConfig::default();
    config.iterations = iterations;
    config.agent.n_query = n_query;
    config.agent.model.members = 4;
    config.seed_policy.master_seed = 2024;
    config
}

/// Wraps a lookup evaluator and fails `submit` from the given batch on.
pub struct FaultyEvaluator {
    inner: LookupEvaluator,
    fail_from: usize,
    submitted: usize,
}

impl FaultyEvaluator {
    pub fn new(inner: LookupEvaluator, fail_from: usize) -> Self {
        Self {
            inner,
            fail_from,
            submitted: 0,
        }
    }
}

impl Evaluator for FaultyEvaluator {
    fn submit(&mut self, batch: &[CandidateEntry]) -> Result<(), CampError> {
        self.submitted += 1;
        if self.submitted >= self.fail_from {
            return Err(CampError::Collaborator(ErrorInfo::new(
                "backend-down",
                "cannot reach the evaluation backend",
            )));
        }
        self.inner.submit(batch)
    }

    fn monitor(&mut self) -> Result<(), CampError> {
        self.inner.monitor()
    }

    fn get_results(&mut self) -> Result<Vec<EvaluationResult>, CampError> {
        self.inner.get_results()
    }
}

/// Evaluator reporting an identifier that was never submitted.
pub struct StrayEvaluator;

impl Evaluator for StrayEvaluator {
    fn submit(&mut self, _batch: &[CandidateEntry]) -> Result<(), CampError> {
        Ok(())
    }

    fn monitor(&mut self) -> Result<(), CampError> {
        Ok(())
    }

    fn get_results(&mut self) -> Result<Vec<EvaluationResult>, CampError> {
        Ok(vec![EvaluationResult::succeeded("stranger", -1.0)])
    }
}

/// Evaluator answering every submitted row twice.
pub struct EchoTwiceEvaluator {
    inner: LookupEvaluator,
}

impl EchoTwiceEvaluator {
    pub fn new(inner: LookupEvaluator) -> Self {
        Self { inner }
    }
}

impl Evaluator for EchoTwiceEvaluator {
    fn submit(&mut self, batch: &[CandidateEntry]) -> Result<(), CampError> {
        self.inner.submit(batch)
    }

    fn monitor(&mut self) -> Result<(), CampError> {
        self.inner.monitor()
    }

    fn get_results(&mut self) -> Result<Vec<EvaluationResult>, CampError> {
        let results = self.inner.get_results()?;
        Ok(results.clone().into_iter().chain(results).collect())
    }
}

/// Policy that always fails with the given error.
pub struct BrokenPolicy(pub CampError);

impl SelectionPolicy for BrokenPolicy {
    fn name(&self) -> &str {
        "broken"
    }

    fn batch_size(&self) -> usize {
        1
    }

    fn propose(
        &self,
        _candidates: &CandidateTable,
        _seed: &SeedTable,
        _n_query: usize,
        _rng: &mut RngHandle,
    ) -> Result<Proposal, CampError> {
        Err(self.0.clone())
    }
}

/// Analyzer that always fails with the given error.
pub struct BrokenAnalyzer(pub CampError);

impl StabilityAnalysis for BrokenAnalyzer {
    fn hull_distance(&self) -> f64 {
        0.05
    }

    fn analyze(&self, _dataset: &[HullEntry]) -> Result<Analysis, CampError> {
        Err(self.0.clone())
    }
}
