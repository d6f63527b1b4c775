//! Typed rows flowing between the campaign, its policy and its evaluator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::composition::Composition;
use crate::errors::{CampError, ErrorInfo};

/// Cached model prediction attached to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted formation energy per atom.
    pub mean: f64,
    /// Dispersion-based uncertainty of the prediction.
    pub uncertainty: f64,
}

/// Not-yet-evaluated entry in the candidate pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    /// Unique key (structure or prototype tag).
    pub identifier: String,
    /// Element to stoichiometric count mapping.
    pub composition: Composition,
    /// Ordered numeric descriptors used by the regression model.
    pub features: Vec<f64>,
    /// Optional cached prediction supplied by the candidate generator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
}

impl CandidateEntry {
    /// Creates a candidate without a cached prediction.
    pub fn new(
        identifier: impl Into<String>,
        composition: Composition,
        features: Vec<f64>,
    ) -> Result<Self, CampError> {
        let entry = Self {
            identifier: identifier.into(),
            composition,
            features,
            prediction: None,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Attaches a cached prediction.
    pub fn with_prediction(mut self, prediction: Prediction) -> Self {
        self.prediction = Some(prediction);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), CampError> {
        validate_identifier(&self.identifier)?;
        validate_features(&self.identifier, &self.features)
    }
}

/// Where a seed row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EntrySource {
    /// Part of the data the campaign started from.
    InitialSeed,
    /// Added by the loop after a successful evaluation.
    Campaign {
        /// Iteration whose batch produced the row.
        iteration: usize,
    },
}

/// Evaluated entry carrying a ground-truth formation energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedEntry {
    /// Unique key shared with the candidate it originated from.
    pub identifier: String,
    /// Element to stoichiometric count mapping.
    pub composition: Composition,
    /// Ground-truth formation energy per atom.
    pub formation_energy: f64,
    /// Ordered numeric descriptors used by the regression model.
    pub features: Vec<f64>,
    /// Provenance flag.
    pub source: EntrySource,
}

impl SeedEntry {
    /// Creates an initial-seed row.
    pub fn new(
        identifier: impl Into<String>,
        composition: Composition,
        formation_energy: f64,
        features: Vec<f64>,
    ) -> Result<Self, CampError> {
        let entry = Self {
            identifier: identifier.into(),
            composition,
            formation_energy,
            features,
            source: EntrySource::InitialSeed,
        };
        entry.validate()?;
        Ok(entry)
    }

    /// Promotes an evaluated candidate into a seed row.
    pub fn from_candidate(
        candidate: CandidateEntry,
        formation_energy: f64,
        iteration: usize,
    ) -> Result<Self, CampError> {
        let entry = Self {
            identifier: candidate.identifier,
            composition: candidate.composition,
            formation_energy,
            features: candidate.features,
            source: EntrySource::Campaign { iteration },
        };
        entry.validate()?;
        Ok(entry)
    }

    /// True for rows added by the loop rather than supplied up front.
    pub fn is_campaign_entry(&self) -> bool {
        matches!(self.source, EntrySource::Campaign { .. })
    }

    pub(crate) fn validate(&self) -> Result<(), CampError> {
        validate_identifier(&self.identifier)?;
        validate_features(&self.identifier, &self.features)?;
        if !self.formation_energy.is_finite() {
            return Err(CampError::InvalidInput(
                ErrorInfo::new("seed-energy", "formation energy must be finite")
                    .with_context("identifier", self.identifier.clone()),
            ));
        }
        Ok(())
    }
}

/// Coarse status reported for an evaluated row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
    /// The evaluator produced a formation energy.
    Succeeded,
    /// The evaluator could not produce a formation energy.
    Failed,
}

/// Outcome of a single evaluation; the energy exists only on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EvaluationOutcome {
    /// Successful evaluation.
    Succeeded {
        /// Formation energy per atom.
        formation_energy: f64,
    },
    /// Failed evaluation.
    Failed {
        /// Evaluator supplied reason.
        reason: String,
    },
}

/// One row reported by an evaluator per submitted candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Identifier of the submitted candidate.
    pub identifier: String,
    /// Status together with the energy or failure reason.
    #[serde(flatten)]
    pub outcome: EvaluationOutcome,
    /// Raw evaluator payload, opaque to the campaign.
    #[serde(default)]
    pub payload: Value,
}

impl EvaluationResult {
    /// Successful result.
    pub fn succeeded(identifier: impl Into<String>, formation_energy: f64) -> Self {
        Self {
            identifier: identifier.into(),
            outcome: EvaluationOutcome::Succeeded { formation_energy },
            payload: Value::Null,
        }
    }

    /// Failed result.
    pub fn failed(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            outcome: EvaluationOutcome::Failed {
                reason: reason.into(),
            },
            payload: Value::Null,
        }
    }

    /// Attaches an opaque evaluator payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Coarse status of the row.
    pub fn status(&self) -> EvaluationStatus {
        match self.outcome {
            EvaluationOutcome::Succeeded { .. } => EvaluationStatus::Succeeded,
            EvaluationOutcome::Failed { .. } => EvaluationStatus::Failed,
        }
    }

    /// Formation energy, present iff the evaluation succeeded.
    pub fn formation_energy(&self) -> Option<f64> {
        match self.outcome {
            EvaluationOutcome::Succeeded { formation_energy } => Some(formation_energy),
            EvaluationOutcome::Failed { .. } => None,
        }
    }
}

fn validate_identifier(identifier: &str) -> Result<(), CampError> {
    if identifier.trim().is_empty() {
        return Err(CampError::invalid(
            "empty-identifier",
            "entry identifiers must not be empty",
        ));
    }
    Ok(())
}

fn validate_features(identifier: &str, features: &[f64]) -> Result<(), CampError> {
    if let Some(position) = features.iter().position(|value| !value.is_finite()) {
        return Err(CampError::InvalidInput(
            ErrorInfo::new("feature-non-finite", "feature vectors must be finite")
                .with_context("identifier", identifier)
                .with_context("position", position.to_string()),
        ));
    }
    Ok(())
}
