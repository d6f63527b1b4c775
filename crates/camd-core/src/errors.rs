//! Error taxonomy of a campaign.
//!
//! Every failure carries an [`ErrorInfo`] with a stable `code` that tests and
//! callers match on. The enum variant decides whether the loop may absorb the
//! error ([`CampError::is_fatal`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code, message and context of a [`CampError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Kebab-case code, stable across releases.
    pub code: String,
    /// What went wrong.
    pub message: String,
    /// Identifiers, sizes and paths involved.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Suggested remedy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with empty context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records `key = value`; a repeated key keeps the last value.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a remedy.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        let pairs: Vec<String> = self
            .context
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        if !pairs.is_empty() {
            write!(f, " ({})", pairs.join(", "))?;
        }
        match &self.hint {
            Some(hint) => write!(f, "; hint: {hint}"),
            None => Ok(()),
        }
    }
}

/// Every failure a campaign component can report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CampError {
    /// No candidates remain to propose.
    #[error("candidate pool exhausted: {0}")]
    Exhausted(ErrorInfo),
    /// One evaluation failed; the row is recorded and dropped.
    #[error("evaluation failed: {0}")]
    Evaluation(ErrorInfo),
    /// A chemical system cannot be bounded or a model cannot be fit.
    #[error("insufficient data: {0}")]
    InsufficientData(ErrorInfo),
    /// The evaluator backend broke its contract or went away.
    #[error("collaborator fault: {0}")]
    Collaborator(ErrorInfo),
    /// Rejected input or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(ErrorInfo),
    /// Regression failure.
    #[error("model failure: {0}")]
    Model(ErrorInfo),
    /// Configuration or checkpoint I/O and parsing.
    #[error("serialization: {0}")]
    Serde(ErrorInfo),
}

impl CampError {
    /// Payload of any variant.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            Self::Exhausted(info)
            | Self::Evaluation(info)
            | Self::InsufficientData(info)
            | Self::Collaborator(info)
            | Self::InvalidInput(info)
            | Self::Model(info)
            | Self::Serde(info) => info,
        }
    }

    /// True for errors that end the campaign.
    ///
    /// Exhaustion, single evaluation failures and insufficient data are
    /// absorbed by the loop.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Exhausted(_) | Self::Evaluation(_) | Self::InsufficientData(_)
        )
    }

    pub(crate) fn invalid(code: &str, message: impl Into<String>) -> Self {
        Self::InvalidInput(ErrorInfo::new(code, message))
    }
}
