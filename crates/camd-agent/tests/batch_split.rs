use std::collections::BTreeSet;

use camd_agent::{AgentConfig, ModelConfig, SelectionPolicy, StabilityAgent};
use camd_core::{
    CampError, CandidateEntry, CandidateTable, Composition, RngHandle, SeedEntry, SeedTable,
};
use proptest::prelude::*;

fn composition(x: f64, y: f64) -> Composition {
    Composition::from_pairs(&[("X", x), ("Y", y)]).unwrap()
}

fn features(x: f64, y: f64) -> Vec<f64> {
    let total = x + y;
    vec![x / total, y / total]
}

fn binary_seed() -> SeedTable {
    SeedTable::new(vec![
        SeedEntry::new("A", composition(1.0, 0.0), 0.0, features(1.0, 0.0)).unwrap(),
        SeedEntry::new("B", composition(0.0, 1.0), 0.0, features(0.0, 1.0)).unwrap(),
        SeedEntry::new("C", composition(1.0, 1.0), -0.5, features(1.0, 1.0)).unwrap(),
    ])
    .unwrap()
}

fn candidates(count: usize) -> CandidateTable {
    let rows = (0..count)
        .map(|index| {
            let x = 1.0 + (index % 4) as f64;
            let y = 1.0 + (index / 4) as f64;
            CandidateEntry::new(format!("cand-{index:02}"), composition(x, y), features(x, y))
                .unwrap()
        })
        .collect();
    CandidateTable::new(rows).unwrap()
}

fn agent(n_query: usize, exploit_fraction: f64) -> StabilityAgent {
    StabilityAgent::new(AgentConfig {
        n_query,
        exploit_fraction,
        model: ModelConfig {
            members: 4,
            ..ModelConfig::default()
        },
        ..AgentConfig::default()
    })
    .unwrap()
}

#[test]
fn five_rows_split_four_and_one() {
    let pool = candidates(5);
    let policy = agent(5, 0.8);
    let proposal = policy
        .propose(&pool, &binary_seed(), 5, &mut RngHandle::from_seed(1))
        .unwrap();
    assert_eq!(proposal.exploit.len(), 4);
    assert_eq!(proposal.explore.len(), 1);
    let selected: BTreeSet<String> = proposal.selected().into_iter().collect();
    assert_eq!(selected.len(), 5);
    assert_eq!(proposal.predictions.len(), 5);
    assert!(proposal
        .predictions
        .iter()
        .all(|p| p.mean.is_some() && p.uncertainty.is_some() && p.score.is_some()));
}

#[test]
fn exploit_part_follows_the_score_order() {
    let pool = candidates(12);
    let proposal = agent(4, 1.0)
        .propose(&pool, &binary_seed(), 4, &mut RngHandle::from_seed(5))
        .unwrap();
    let mut scored: Vec<(String, f64)> = proposal
        .predictions
        .iter()
        .map(|p| (p.identifier.clone(), p.score.unwrap()))
        .collect();
    camd_agent::rank_by_score(&mut scored);
    let expected: Vec<String> = scored.into_iter().take(4).map(|(id, _)| id).collect();
    assert_eq!(proposal.exploit, expected);
    assert!(proposal.explore.is_empty());
}

#[test]
fn oversized_request_is_capped() {
    let pool = candidates(3);
    let proposal = agent(10, 0.5)
        .propose(&pool, &binary_seed(), 10, &mut RngHandle::from_seed(2))
        .unwrap();
    assert_eq!(proposal.len(), 3);
}

#[test]
fn empty_pool_is_exhausted() {
    let err = agent(3, 0.5)
        .propose(
            &CandidateTable::default(),
            &binary_seed(),
            3,
            &mut RngHandle::from_seed(0),
        )
        .unwrap_err();
    assert!(matches!(err, CampError::Exhausted(_)));
    assert!(!err.is_fatal());
}

#[test]
fn mismatched_feature_width_is_rejected() {
    let pool = CandidateTable::new(vec![CandidateEntry::new(
        "odd",
        composition(1.0, 2.0),
        vec![0.1, 0.2, 0.3],
    )
    .unwrap()])
    .unwrap();
    let err = agent(1, 1.0)
        .propose(&pool, &binary_seed(), 1, &mut RngHandle::from_seed(0))
        .unwrap_err();
    assert_eq!(err.info().code, "feature-width");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn split_sizes_hold(
        pool_size in 1usize..16,
        n_query in 1usize..10,
        exploit_fraction in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let pool = candidates(pool_size);
        let proposal = agent(n_query, exploit_fraction)
            .propose(&pool, &binary_seed(), n_query, &mut RngHandle::from_seed(seed))
            .unwrap();
        let batch = n_query.min(pool_size);
        prop_assert_eq!(proposal.exploit.len() + proposal.explore.len(), batch);
        let wanted = (n_query as f64 * exploit_fraction).round() as usize;
        if wanted <= batch {
            prop_assert_eq!(proposal.exploit.len(), wanted);
        }
        let selected: BTreeSet<String> = proposal.selected().into_iter().collect();
        prop_assert_eq!(selected.len(), batch);
        for identifier in &selected {
            prop_assert!(pool.contains(identifier));
        }
        prop_assert_eq!(proposal.predictions.len(), pool_size);
    }
}
