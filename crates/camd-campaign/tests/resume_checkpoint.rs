mod common;

use camd_agent::StabilityAgent;
use camd_campaign::{
    Campaign, CampaignConfig, CampaignPhase, Checkpoint, LookupEvaluator, TerminalReason,
};
use camd_core::CampError;
use camd_hull::StabilityAnalyzer;

fn durable_config(
    dir: &std::path::Path,
    n_query: usize,
    iterations: Option<usize>,
) -> CampaignConfig {
    let mut config = common::config(n_query, iterations);
    config.checkpoint.directory = Some(dir.to_path_buf());
    config
}

fn resume_with<E: camd_campaign::Evaluator>(
    config: CampaignConfig,
    evaluator: E,
) -> Result<Campaign<StabilityAgent, StabilityAnalyzer, E>, CampError> {
    let policy = StabilityAgent::new(config.agent.clone())?;
    let analyzer = StabilityAnalyzer::new(config.analyzer)?;
    Campaign::resume(config, policy, analyzer, evaluator)
}

fn step_until<E: camd_campaign::Evaluator>(
    campaign: &mut Campaign<StabilityAgent, StabilityAnalyzer, E>,
    iteration: usize,
    phase: CampaignPhase,
) {
    while !(campaign.state().iteration == iteration && campaign.phase() == phase) {
        campaign.step().expect("step");
    }
}

#[test]
fn resume_after_results_reproduces_analysis() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let config = durable_config(temp.path(), 3, Some(3));

    let mut reference = Campaign::from_config(
        common::config(3, Some(3)),
        common::pool(),
        common::seed(),
        common::evaluator(),
    )
    .expect("reference");
    step_until(&mut reference, 1, CampaignPhase::Analyzing);
    reference.step().expect("analyze");

    let mut interrupted =
        Campaign::from_config(config.clone(), common::pool(), common::seed(), common::evaluator())
            .expect("campaign");
    step_until(&mut interrupted, 1, CampaignPhase::Analyzing);
    drop(interrupted);

    let mut resumed = resume_with(config, LookupEvaluator::default()).expect("resume");
    assert_eq!(resumed.phase(), CampaignPhase::Analyzing);
    resumed.step().expect("analyze");
    assert_eq!(resumed.evaluator().submissions(), 0);
    assert_eq!(resumed.state().last_analysis, reference.state().last_analysis);
    assert_eq!(resumed.history(), reference.history());
}

#[test]
fn interrupted_run_matches_uninterrupted_run() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let config = durable_config(temp.path(), 4, Some(4));

    let mut straight = Campaign::from_config(
        common::config(4, Some(4)),
        common::pool(),
        common::seed(),
        common::evaluator(),
    )
    .expect("straight");
    let expected = straight.run().expect("run");

    let mut first =
        Campaign::from_config(config.clone(), common::pool(), common::seed(), common::evaluator())
            .expect("first");
    step_until(&mut first, 2, CampaignPhase::RunningExperiments);
    drop(first);

    let mut second = resume_with(config, common::evaluator()).expect("resume");
    let summary = second.run().expect("run");
    assert_eq!(summary, expected);
    assert_eq!(second.seed(), straight.seed());
    assert_eq!(second.history(), straight.history());
}

#[test]
fn collaborator_fault_keeps_last_checkpoint() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let config = durable_config(temp.path(), 3, None);
    let evaluator = common::FaultyEvaluator::new(common::evaluator(), 2);
    let mut campaign =
        Campaign::from_config(config.clone(), common::pool(), common::seed(), evaluator)
            .expect("campaign");

    let err = campaign.run().expect_err("backend fault");
    assert!(matches!(err, CampError::Collaborator(_)));
    assert_eq!(err.info().code, "backend-down");
    assert_eq!(err.info().context.get("stage").map(String::as_str), Some("submit"));
    assert!(campaign.is_finalized());
    assert!(matches!(
        campaign.state().terminal,
        Some(TerminalReason::Fault { .. })
    ));
    let selected_before: Vec<String> = campaign
        .state()
        .batch
        .as_ref()
        .expect("pending batch")
        .candidates
        .iter()
        .map(|candidate| candidate.identifier.clone())
        .collect();

    let on_disk = campaign.store().load().expect("checkpoint");
    assert_eq!(on_disk.state.phase, CampaignPhase::RunningExperiments);
    assert_eq!(on_disk.state.history.completed(), 1);
    assert!(on_disk.state.terminal.is_none());

    let mut resumed = resume_with(config, common::evaluator()).expect("resume");
    assert_eq!(resumed.step().expect("step"), CampaignPhase::GettingResults);
    let submitted: Vec<String> = resumed
        .state()
        .batch
        .as_ref()
        .expect("batch")
        .candidates
        .iter()
        .map(|candidate| candidate.identifier.clone())
        .collect();
    assert_eq!(submitted, selected_before);

    let summary = resumed.run().expect("run");
    assert_eq!(summary.terminal, Some(TerminalReason::Exhausted));
    assert_eq!(summary.seed_size, summary.initial_seed_size + common::pool().len());
}

#[test]
fn mismatched_configuration_is_rejected() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let config = durable_config(temp.path(), 2, Some(1));
    let mut campaign =
        Campaign::from_config(config.clone(), common::pool(), common::seed(), common::evaluator())
            .expect("campaign");
    campaign.run().expect("run");

    let mut other = config;
    other.seed_policy.master_seed += 1;
    let err = resume_with(other, common::evaluator())
        .err()
        .expect("hash mismatch");
    assert_eq!(err.info().code, "checkpoint-config");
}

#[test]
fn missing_checkpoint_is_a_serde_error() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let err = resume_with(durable_config(temp.path(), 2, None), common::evaluator())
        .err()
        .expect("no checkpoint");
    assert_eq!(err.info().code, "checkpoint-read");
}

#[test]
fn snapshots_are_pruned() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let mut config = durable_config(temp.path(), 2, Some(3));
    config.checkpoint.keep_history = 3;
    let mut campaign =
        Campaign::from_config(config, common::pool(), common::seed(), common::evaluator())
            .expect("campaign");
    campaign.run().expect("run");

    let snapshots = campaign.store().snapshots().expect("snapshots");
    assert_eq!(snapshots.len(), 3);
    let last = snapshots.last().expect("last snapshot");
    let checkpoint = Checkpoint::load(last).expect("load snapshot");
    assert_eq!(checkpoint.state.phase, CampaignPhase::Finalized);
    assert!(temp.path().join("campaign.json").exists());
}

#[test]
fn in_memory_checkpoint_resumes() {
    let config = common::config(3, Some(2));
    let mut campaign =
        Campaign::from_config(config.clone(), common::pool(), common::seed(), common::evaluator())
            .expect("campaign");
    step_until(&mut campaign, 0, CampaignPhase::GettingResults);
    let checkpoint = campaign.store().latest().cloned().expect("latest");
    assert!(campaign.store().path().is_none());

    let policy = StabilityAgent::new(config.agent.clone()).expect("agent");
    let analyzer = StabilityAnalyzer::new(config.analyzer).expect("analyzer");
    let evaluator = LookupEvaluator::default();
    let mut resumed = Campaign::from_checkpoint(config, checkpoint, policy, analyzer, evaluator)
        .expect("resume");
    resumed.step().expect("merge stored results");
    assert_eq!(resumed.seed().len(), common::seed().len() + 3);
}
