#![deny(missing_docs)]
#![doc = "Selection policies proposing evaluation batches for CAMD campaigns."]

/// Agent and model configuration.
pub mod config;
/// Bagged ridge regression committee.
pub mod ensemble;
pub mod policy;
/// Uniform-random baseline agent.
pub mod random;
/// Hull-aware stability agent.
pub mod stability;

pub use config::{AgentConfig, ModelConfig};
pub use ensemble::{EnsemblePrediction, RidgeEnsemble};
pub use policy::{
    batch_split, ensure_proposable, rank_by_score, sample_uniform, CandidatePrediction, Proposal,
    SelectionPolicy,
};
pub use random::RandomAgent;
pub use stability::StabilityAgent;
