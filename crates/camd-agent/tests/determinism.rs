use camd_agent::{AgentConfig, CandidatePrediction, RandomAgent, SelectionPolicy, StabilityAgent};
use camd_core::{
    CandidateEntry, CandidateTable, Composition, Prediction, RngHandle, SeedEntry, SeedTable,
};

fn ternary(x: f64, y: f64, z: f64) -> Composition {
    Composition::from_pairs(&[("X", x), ("Y", y), ("Z", z)]).unwrap()
}

fn pool() -> CandidateTable {
    let mut rows = Vec::new();
    for x in 0..4 {
        for y in 0..4 {
            let z = 3 - x.min(3);
            let composition = match Composition::from_pairs(&[("X", x as f64), ("Y", y as f64), ("Z", z as f64)]) {
                Ok(composition) => composition,
                Err(_) => continue,
            };
            let features = vec![x as f64, y as f64, z as f64, (x * y) as f64];
            rows.push(CandidateEntry::new(format!("p-{x}{y}"), composition, features).unwrap());
        }
    }
    CandidateTable::new(rows).unwrap()
}

fn seed() -> SeedTable {
    SeedTable::new(vec![
        SeedEntry::new("X", ternary(1.0, 0.0, 0.0), 0.0, vec![1.0, 0.0, 0.0, 0.0]).unwrap(),
        SeedEntry::new("Y", ternary(0.0, 1.0, 0.0), 0.0, vec![0.0, 1.0, 0.0, 0.0]).unwrap(),
        SeedEntry::new("Z", ternary(0.0, 0.0, 1.0), 0.0, vec![0.0, 0.0, 1.0, 0.0]).unwrap(),
        SeedEntry::new("XY", ternary(1.0, 1.0, 0.0), -0.3, vec![1.0, 1.0, 0.0, 1.0]).unwrap(),
        SeedEntry::new("XZ2", ternary(1.0, 0.0, 2.0), -0.2, vec![1.0, 0.0, 2.0, 0.0]).unwrap(),
    ])
    .unwrap()
}

#[test]
fn same_seed_same_batch() {
    let agent = StabilityAgent::new(AgentConfig {
        n_query: 6,
        exploit_fraction: 0.5,
        ..AgentConfig::default()
    })
    .unwrap();
    let (pool, seed) = (pool(), seed());
    let first = agent
        .propose(&pool, &seed, 6, &mut RngHandle::substream(7, 3))
        .unwrap();
    let second = agent
        .propose(&pool, &seed, 6, &mut RngHandle::substream(7, 3))
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 6);
}

#[test]
fn inputs_are_left_untouched() {
    let agent = StabilityAgent::new(AgentConfig::default()).unwrap();
    let (pool, seed) = (pool(), seed());
    let before = (pool.clone(), seed.clone());
    agent
        .propose(&pool, &seed, 4, &mut RngHandle::from_seed(11))
        .unwrap();
    assert_eq!((pool, seed), before);
}

#[test]
fn cold_start_samples_uniformly() {
    let agent = StabilityAgent::new(AgentConfig {
        n_query: 5,
        exploit_fraction: 1.0,
        ..AgentConfig::default()
    })
    .unwrap();
    let pool = pool();
    let empty = SeedTable::default();
    let proposal = agent
        .propose(&pool, &empty, 5, &mut RngHandle::from_seed(4))
        .unwrap();
    assert!(proposal.exploit.is_empty());
    assert_eq!(proposal.explore.len(), 5);
    assert!(proposal.predictions.iter().all(|p| p.mean.is_none()));

    let again = agent
        .propose(&pool, &empty, 5, &mut RngHandle::from_seed(4))
        .unwrap();
    assert_eq!(proposal, again);
}

#[test]
fn cold_start_reports_cached_predictions() {
    let composition = ternary(1.0, 1.0, 1.0);
    let pool = CandidateTable::new(vec![CandidateEntry::new("cached", composition, vec![0.0])
        .unwrap()
        .with_prediction(Prediction {
            mean: -0.2,
            uncertainty: 0.05,
        })])
    .unwrap();
    let proposal = StabilityAgent::new(AgentConfig::default())
        .unwrap()
        .propose(&pool, &SeedTable::default(), 3, &mut RngHandle::from_seed(0))
        .unwrap();
    assert_eq!(proposal.selected(), vec!["cached".to_string()]);
    assert_eq!(proposal.predictions[0].mean, Some(-0.2));
    assert_eq!(proposal.predictions[0].score, None);
}

#[test]
fn uncertainty_bonus_reorders_scores() {
    let pool = pool();
    let seed = seed();
    let plain = StabilityAgent::new(AgentConfig {
        uncertainty: false,
        ..AgentConfig::default()
    })
    .unwrap()
    .propose(&pool, &seed, 4, &mut RngHandle::from_seed(8))
    .unwrap();
    let bonus = StabilityAgent::new(AgentConfig {
        uncertainty: true,
        alpha: 2.0,
        ..AgentConfig::default()
    })
    .unwrap()
    .propose(&pool, &seed, 4, &mut RngHandle::from_seed(8))
    .unwrap();
    for (a, b) in plain.predictions.iter().zip(&bonus.predictions) {
        let std = b.uncertainty.unwrap();
        assert!((a.score.unwrap() - 2.0 * std - b.score.unwrap()).abs() < 1e-9);
    }
}

#[test]
fn random_agent_is_deterministic_and_unranked() {
    let agent = RandomAgent::new(3).unwrap();
    assert_eq!(agent.batch_size(), 3);
    let pool = pool();
    let a = agent
        .propose(&pool, &seed(), 3, &mut RngHandle::from_seed(21))
        .unwrap();
    let b = agent
        .propose(&pool, &seed(), 3, &mut RngHandle::from_seed(21))
        .unwrap();
    assert_eq!(a, b);
    assert!(a.exploit.is_empty());
    assert_eq!(a.explore.len(), 3);
    assert!(a
        .predictions
        .iter()
        .all(|p| *p == CandidatePrediction::unknown(p.identifier.clone())));
    assert!(RandomAgent::new(0).is_err());
}
