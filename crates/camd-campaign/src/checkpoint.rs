use std::fs;
use std::path::{Path, PathBuf};

use camd_core::errors::{CampError, ErrorInfo};
use camd_core::serde::{from_json_slice, to_canonical_json_pretty};
use camd_core::SchemaVersion;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CheckpointConfig;
use crate::state::CampaignState;

/// Schema of checkpoints written by this crate.
pub const CHECKPOINT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

const HISTORY_DIR: &str = "history";

fn io_error(code: &str, err: impl ToString, path: &Path) -> CampError {
    CampError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Versioned snapshot of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Schema the payload was written with.
    pub schema_version: SchemaVersion,
    /// RFC 3339 timestamp of the write.
    pub created_at: String,
    /// Hash of the configuration that produced the state.
    pub config_hash: String,
    /// Campaign state after the last completed transition.
    pub state: CampaignState,
}

impl Checkpoint {
    /// Wraps `state` for persistence.
    pub fn new(state: CampaignState, config_hash: impl Into<String>) -> Self {
        Self {
            schema_version: CHECKPOINT_SCHEMA,
            created_at: chrono::Utc::now().to_rfc3339(),
            config_hash: config_hash.into(),
            state,
        }
    }

    /// Reads a checkpoint file without verifying it.
    pub fn load(path: &Path) -> Result<Self, CampError> {
        let bytes = fs::read(path).map_err(|err| io_error("checkpoint-read", err, path))?;
        from_json_slice(&bytes).map_err(|err| match err {
            CampError::Serde(info) => CampError::Serde(
                ErrorInfo::new("checkpoint-parse", info.message)
                    .with_context("path", path.display().to_string()),
            ),
            other => other,
        })
    }

    /// Writes the checkpoint through a temporary sibling and a rename.
    pub fn store(&self, path: &Path) -> Result<(), CampError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error("checkpoint-mkdir", err, parent))?;
        }
        let bytes = to_canonical_json_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|err| io_error("checkpoint-write", err, &tmp))?;
        fs::rename(&tmp, path).map_err(|err| io_error("checkpoint-rename", err, path))
    }

    /// Checks schema compatibility and the configuration hash.
    pub fn verify(&self, config_hash: &str) -> Result<(), CampError> {
        if !CHECKPOINT_SCHEMA.is_compatible_with(&self.schema_version) {
            return Err(CampError::Serde(
                ErrorInfo::new("checkpoint-schema", "checkpoint schema is not supported")
                    .with_context("found", self.schema_version.to_string())
                    .with_context("supported", CHECKPOINT_SCHEMA.to_string()),
            ));
        }
        if self.config_hash != config_hash {
            return Err(CampError::Serde(
                ErrorInfo::new(
                    "checkpoint-config",
                    "checkpoint was written with a different configuration",
                )
                .with_context("expected", config_hash.to_string())
                .with_context("found", self.config_hash.clone())
                .with_hint("resume with the configuration that started the campaign"),
            ));
        }
        Ok(())
    }
}

/// Durable home of the campaign checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    directory: Option<PathBuf>,
    file_name: String,
    keep_history: usize,
    config_hash: String,
    latest: Option<Checkpoint>,
}

impl CheckpointStore {
    /// Store laid out according to `config`.
    pub fn new(config: &CheckpointConfig, config_hash: impl Into<String>) -> Self {
        Self {
            directory: config.directory.clone(),
            file_name: config.file_name.clone(),
            keep_history: config.keep_history,
            config_hash: config_hash.into(),
            latest: None,
        }
    }

    /// Store that never touches the filesystem.
    pub fn in_memory(config_hash: impl Into<String>) -> Self {
        Self::new(&CheckpointConfig::default(), config_hash)
    }

    /// Path of the current checkpoint, when the store is durable.
    pub fn path(&self) -> Option<PathBuf> {
        self.directory
            .as_ref()
            .map(|directory| directory.join(&self.file_name))
    }

    /// Most recent checkpoint written through this store.
    pub fn latest(&self) -> Option<&Checkpoint> {
        self.latest.as_ref()
    }

    /// Persists `state` as the current checkpoint.
    pub fn save(&mut self, state: &CampaignState) -> Result<(), CampError> {
        let checkpoint = Checkpoint::new(state.clone(), self.config_hash.clone());
        if let (Some(directory), Some(path)) = (self.directory.clone(), self.path()) {
            checkpoint.store(&path)?;
            if self.keep_history > 0 {
                let snapshot = directory.join(HISTORY_DIR).join(format!(
                    "ckpt_{:06}_{:05}_{}.json",
                    state.transitions,
                    state.iteration,
                    state.phase.as_str()
                ));
                checkpoint.store(&snapshot)?;
                self.prune(&directory.join(HISTORY_DIR))?;
            }
            debug!(
                path = %path.display(),
                phase = %state.phase,
                iteration = state.iteration,
                "checkpoint written"
            );
        }
        self.latest = Some(checkpoint);
        Ok(())
    }

    /// Loads and verifies the current checkpoint.
    pub fn load(&self) -> Result<Checkpoint, CampError> {
        let checkpoint = match self.path() {
            Some(path) => Checkpoint::load(&path)?,
            None => self.latest.clone().ok_or_else(|| {
                CampError::Serde(ErrorInfo::new(
                    "checkpoint-missing",
                    "no checkpoint has been written",
                ))
            })?,
        };
        checkpoint.verify(&self.config_hash)?;
        Ok(checkpoint)
    }

    /// Retained per-transition snapshots, oldest first.
    pub fn snapshots(&self) -> Result<Vec<PathBuf>, CampError> {
        let Some(directory) = &self.directory else {
            return Ok(Vec::new());
        };
        list_snapshots(&directory.join(HISTORY_DIR))
    }

    fn prune(&self, history: &Path) -> Result<(), CampError> {
        let snapshots = list_snapshots(history)?;
        let excess = snapshots.len().saturating_sub(self.keep_history);
        for path in snapshots.into_iter().take(excess) {
            fs::remove_file(&path).map_err(|err| io_error("checkpoint-prune", err, &path))?;
        }
        Ok(())
    }
}

fn list_snapshots(history: &Path) -> Result<Vec<PathBuf>, CampError> {
    if !history.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(history).map_err(|err| io_error("checkpoint-list", err, history))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| io_error("checkpoint-list", err, history))?;
        let path = entry.path();
        let is_snapshot = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("ckpt_") && name.ends_with(".json"))
            .unwrap_or(false);
        if is_snapshot {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
