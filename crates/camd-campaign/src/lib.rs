#![deny(missing_docs)]
#![doc = "Closed-loop CAMD stability-discovery campaigns with checkpointed resume."]

/// Checkpoint payloads and their on-disk store.
pub mod checkpoint;
/// YAML campaign configuration.
pub mod config;
pub mod evaluator;
/// Iteration and failure records.
pub mod history;
pub mod orchestrator;
pub mod state;
pub mod telemetry;

pub use checkpoint::{Checkpoint, CheckpointStore, CHECKPOINT_SCHEMA};
pub use config::{CampaignConfig, CheckpointConfig, SeedPolicy};
pub use evaluator::{Evaluator, LookupEvaluator};
pub use history::{CampaignHistory, FailureRecord, IterationRecord};
pub use orchestrator::{Campaign, CampaignSummary};
pub use state::{CampaignPhase, CampaignState, PendingBatch, TerminalReason};
pub use telemetry::init_tracing;
