use camd_core::errors::{CampError, ErrorInfo};
use serde::{Deserialize, Serialize};

fn invalid(code: &str, message: &str, key: &str, value: impl ToString) -> CampError {
    CampError::InvalidInput(ErrorInfo::new(code, message).with_context(key, value.to_string()))
}

/// Hyperparameters of the bagged ridge committee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of committee members.
    #[serde(default = "default_members")]
    pub members: usize,
    /// L2 penalty applied to the standardized weights.
    #[serde(default = "default_ridge")]
    pub ridge: f64,
    /// Bootstrap sample size as a fraction of the seed table.
    #[serde(default = "default_bootstrap_fraction")]
    pub bootstrap_fraction: f64,
}

fn default_members() -> usize {
    8
}

fn default_ridge() -> f64 {
    1e-3
}

fn default_bootstrap_fraction() -> f64 {
    1.0
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            members: default_members(),
            ridge: default_ridge(),
            bootstrap_fraction: default_bootstrap_fraction(),
        }
    }
}

impl ModelConfig {
    /// Validates the committee hyperparameters.
    pub fn validate(&self) -> Result<(), CampError> {
        if self.members == 0 {
            return Err(invalid("model-members", "members must be > 0", "members", 0));
        }
        if !(self.ridge.is_finite() && self.ridge >= 0.0) {
            return Err(invalid(
                "model-ridge",
                "ridge must be finite and >= 0",
                "ridge",
                self.ridge,
            ));
        }
        if !(self.bootstrap_fraction > 0.0 && self.bootstrap_fraction <= 1.0) {
            return Err(invalid(
                "model-bootstrap",
                "bootstrap_fraction must lie in (0, 1]",
                "bootstrap_fraction",
                self.bootstrap_fraction,
            ));
        }
        Ok(())
    }
}

/// Configuration of the stability agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Requested batch size per iteration.
    #[serde(default = "default_n_query")]
    pub n_query: usize,
    /// Predicted hull distance under which a candidate is predicted stable.
    #[serde(default = "default_hull_distance")]
    pub hull_distance: f64,
    /// Share of the batch chosen by ranking rather than random sampling.
    #[serde(default = "default_exploit_fraction")]
    pub exploit_fraction: f64,
    /// Whether the committee dispersion enters the acquisition score.
    #[serde(default = "default_uncertainty")]
    pub uncertainty: bool,
    /// Weight of the uncertainty bonus in the acquisition score.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Regression committee hyperparameters.
    #[serde(default)]
    pub model: ModelConfig,
}

fn default_n_query() -> usize {
    10
}

fn default_hull_distance() -> f64 {
    0.05
}

fn default_exploit_fraction() -> f64 {
    0.5
}

fn default_uncertainty() -> bool {
    true
}

fn default_alpha() -> f64 {
    0.5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            n_query: default_n_query(),
            hull_distance: default_hull_distance(),
            exploit_fraction: default_exploit_fraction(),
            uncertainty: default_uncertainty(),
            alpha: default_alpha(),
            model: ModelConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Validates the agent configuration.
    pub fn validate(&self) -> Result<(), CampError> {
        if self.n_query == 0 {
            return Err(invalid("agent-n-query", "n_query must be > 0", "n_query", 0));
        }
        if !(self.hull_distance.is_finite() && self.hull_distance > 0.0) {
            return Err(invalid(
                "hull-distance",
                "hull_distance must be finite and > 0",
                "hull_distance",
                self.hull_distance,
            ));
        }
        if !(0.0..=1.0).contains(&self.exploit_fraction) {
            return Err(invalid(
                "agent-exploit-fraction",
                "exploit_fraction must lie in [0, 1]",
                "exploit_fraction",
                self.exploit_fraction,
            ));
        }
        if !(self.alpha.is_finite() && self.alpha >= 0.0) {
            return Err(invalid(
                "agent-alpha",
                "alpha must be finite and >= 0",
                "alpha",
                self.alpha,
            ));
        }
        self.model.validate()
    }
}
