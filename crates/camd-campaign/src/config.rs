use std::fs;
use std::path::{Path, PathBuf};

use camd_agent::AgentConfig;
use camd_core::errors::{CampError, ErrorInfo};
use camd_core::stable_hash_string;
use camd_hull::AnalyzerConfig;
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Iteration budget; `None` runs until the pool is exhausted.
    #[serde(default)]
    pub iterations: Option<usize>,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Selection policy settings.
    #[serde(default)]
    pub agent: AgentConfig,
    /// Stability analyzer settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            iterations: None,
            seed_policy: SeedPolicy::default(),
            agent: AgentConfig::default(),
            analyzer: AnalyzerConfig::default(),
            checkpoint: CheckpointConfig::default(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed; iteration `i` draws from substream `i`.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Free-form label recorded with the run.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x0CA3_D5EE_D000_0001_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Checkpointing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory holding the checkpoint; `None` keeps checkpoints in memory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Name of the current checkpoint inside `directory`.
    #[serde(default = "default_checkpoint_file")]
    pub file_name: String,
    /// Number of per-transition snapshots retained under `history/`.
    #[serde(default = "default_keep_history")]
    pub keep_history: usize,
}

fn default_checkpoint_file() -> String {
    "campaign.json".to_string()
}

fn default_keep_history() -> usize {
    8
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_name: default_checkpoint_file(),
            keep_history: default_keep_history(),
        }
    }
}

#[derive(Serialize)]
struct HashedConfig<'a> {
    seed_policy: &'a SeedPolicy,
    agent: &'a AgentConfig,
    analyzer: &'a AnalyzerConfig,
}

impl CampaignConfig {
    /// Reads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, CampError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CampError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let config = Self::from_yaml_str(&contents).map_err(|err| match err {
            CampError::Serde(info) => {
                CampError::Serde(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })?;
        Ok(config)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, CampError> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|err| CampError::Serde(ErrorInfo::new("config-parse", err.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the campaign cannot run with.
    pub fn validate(&self) -> Result<(), CampError> {
        self.agent.validate()?;
        self.analyzer.validate()?;
        if self.checkpoint.file_name.trim().is_empty() {
            return Err(CampError::InvalidInput(ErrorInfo::new(
                "checkpoint-file-name",
                "checkpoint file name must not be empty",
            )));
        }
        Ok(())
    }

    /// Stable hash of the settings that shape selection and judgment.
    ///
    /// The iteration budget and checkpoint location are left out so a resumed
    /// campaign may extend its budget or move its directory.
    pub fn config_hash(&self) -> Result<String, CampError> {
        stable_hash_string(&HashedConfig {
            seed_policy: &self.seed_policy,
            agent: &self.agent,
            analyzer: &self.analyzer,
        })
    }
}
