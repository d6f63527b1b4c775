//! Bagged ridge-regression committee.
//!
//! Every member is fit on its own bootstrap resample of the seed table, drawn
//! from a substream of the supplied seed, so a fit is reproducible no matter
//! how rayon schedules the members.

use camd_core::errors::{CampError, ErrorInfo};
use camd_core::rng::{derive_substream_seed, RngHandle};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rayon::prelude::*;

use crate::config::ModelConfig;

fn model_error(code: &str, message: impl Into<String>) -> CampError {
    CampError::Model(ErrorInfo::new(code, message))
}

fn shape_error(code: &str, message: &str, expected: usize, found: usize) -> CampError {
    CampError::Model(
        ErrorInfo::new(code, message)
            .with_context("expected", expected.to_string())
            .with_context("found", found.to_string()),
    )
}

/// Smallest penalty used even when the configured ridge is zero.
const MIN_RIDGE: f64 = 1e-10;

#[derive(Debug, Clone)]
struct Member {
    intercept: f64,
    weights: Vec<f64>,
}

impl Member {
    fn predict(&self, standardized: &[f64]) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(standardized)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

/// Committee of ridge regressors sharing one feature standardization.
#[derive(Debug, Clone)]
pub struct RidgeEnsemble {
    means: Vec<f64>,
    scales: Vec<f64>,
    members: Vec<Member>,
}

/// Mean and committee dispersion for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsemblePrediction {
    /// Average member prediction.
    pub mean: f64,
    /// Population standard deviation across members.
    pub std: f64,
}

impl RidgeEnsemble {
    /// Fits the committee on `features -> targets`.
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[f64],
        config: &ModelConfig,
        seed: u64,
    ) -> Result<Self, CampError> {
        config.validate()?;
        if features.is_empty() {
            return Err(CampError::InsufficientData(ErrorInfo::new(
                "model-empty",
                "cannot fit a regression model without rows",
            )));
        }
        if features.len() != targets.len() {
            return Err(shape_error(
                "model-shape",
                "features and targets differ in length",
                features.len(),
                targets.len(),
            ));
        }
        let width = features[0].len();
        if features.iter().any(|row| row.len() != width) {
            return Err(model_error("model-shape", "ragged feature matrix"));
        }

        let rows = features.len();
        let means: Vec<f64> = (0..width)
            .map(|col| features.iter().map(|row| row[col]).sum::<f64>() / rows as f64)
            .collect();
        let scales: Vec<f64> = (0..width)
            .map(|col| {
                let var = features
                    .iter()
                    .map(|row| (row[col] - means[col]).powi(2))
                    .sum::<f64>()
                    / rows as f64;
                let std = var.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        let standardized: Vec<Vec<f64>> = features
            .iter()
            .map(|row| standardize(row, &means, &scales))
            .collect();

        let sample_size = ((rows as f64 * config.bootstrap_fraction).round() as usize).max(1);
        let ridge = config.ridge.max(MIN_RIDGE);
        let members = (0..config.members)
            .into_par_iter()
            .map(|index| {
                let mut rng = RngHandle::from_seed(derive_substream_seed(seed, index as u64));
                let sample: Vec<usize> = (0..sample_size).map(|_| rng.gen_range(0..rows)).collect();
                fit_member(&standardized, targets, &sample, width, ridge)
            })
            .collect::<Result<Vec<_>, CampError>>()?;

        Ok(Self {
            means,
            scales,
            members,
        })
    }

    /// Number of features the committee expects.
    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Predicts mean and dispersion for one feature vector.
    pub fn predict(&self, features: &[f64]) -> Result<EnsemblePrediction, CampError> {
        if features.len() != self.width() {
            return Err(shape_error(
                "model-width",
                "feature vector has the wrong width",
                self.width(),
                features.len(),
            ));
        }
        let standardized = standardize(features, &self.means, &self.scales);
        let outputs: Vec<f64> = self
            .members
            .iter()
            .map(|member| member.predict(&standardized))
            .collect();
        let count = outputs.len() as f64;
        let mean = outputs.iter().sum::<f64>() / count;
        let variance = outputs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
        Ok(EnsemblePrediction {
            mean,
            std: variance.max(0.0).sqrt(),
        })
    }
}

fn standardize(row: &[f64], means: &[f64], scales: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(means.iter().zip(scales))
        .map(|(value, (mean, scale))| (value - mean) / scale)
        .collect()
}

fn fit_member(
    standardized: &[Vec<f64>],
    targets: &[f64],
    sample: &[usize],
    width: usize,
    ridge: f64,
) -> Result<Member, CampError> {
    let n = sample.len();
    let x_mean: Vec<f64> = (0..width)
        .map(|col| sample.iter().map(|&i| standardized[i][col]).sum::<f64>() / n as f64)
        .collect();
    let y_mean = sample.iter().map(|&i| targets[i]).sum::<f64>() / n as f64;
    if width == 0 {
        return Ok(Member {
            intercept: y_mean,
            weights: Vec::new(),
        });
    }

    let x = DMatrix::from_fn(n, width, |r, c| standardized[sample[r]][c] - x_mean[c]);
    let y = DVector::from_iterator(n, sample.iter().map(|&i| targets[i] - y_mean));
    let mut gram = x.transpose() * &x;
    for d in 0..width {
        gram[(d, d)] += ridge;
    }
    let rhs = x.transpose() * y;
    let cholesky = gram.cholesky().ok_or_else(|| {
        model_error("model-singular", "normal equations are not positive definite")
    })?;
    let solution = cholesky.solve(&rhs);
    let weights: Vec<f64> = solution.iter().copied().collect();
    if weights.iter().any(|w| !w.is_finite()) {
        return Err(model_error("model-non-finite", "ridge solution is not finite"));
    }
    let intercept = y_mean
        - weights
            .iter()
            .zip(&x_mean)
            .map(|(w, m)| w * m)
            .sum::<f64>();
    Ok(Member { intercept, weights })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let targets = features.iter().map(|row| 0.5 * row[0] - 0.2 * row[1] + 1.0).collect();
        (features, targets)
    }

    #[test]
    fn recovers_linear_relation() {
        let (features, targets) = linear_data();
        let config = ModelConfig {
            members: 4,
            ridge: 1e-8,
            bootstrap_fraction: 1.0,
        };
        let model = RidgeEnsemble::fit(&features, &targets, &config, 3).unwrap();
        let prediction = model.predict(&[10.0, 1.0]).unwrap();
        assert!((prediction.mean - 5.8).abs() < 1e-4);
        assert!(prediction.std < 1e-4);
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let (features, targets) = linear_data();
        let noisy: Vec<f64> = targets
            .iter()
            .enumerate()
            .map(|(i, t)| t + if i % 2 == 0 { 0.3 } else { -0.3 })
            .collect();
        let config = ModelConfig {
            members: 6,
            ridge: 0.1,
            bootstrap_fraction: 0.7,
        };
        let a = RidgeEnsemble::fit(&features, &noisy, &config, 42).unwrap();
        let b = RidgeEnsemble::fit(&features, &noisy, &config, 42).unwrap();
        assert_eq!(a.predict(&[3.0, 2.0]).unwrap(), b.predict(&[3.0, 2.0]).unwrap());
        assert!(a.predict(&[3.0, 2.0]).unwrap().std > 0.0);
    }

    #[test]
    fn featureless_rows_predict_the_mean() {
        let features = vec![Vec::new(), Vec::new()];
        let config = ModelConfig {
            members: 1,
            ..ModelConfig::default()
        };
        let model = RidgeEnsemble::fit(&features, &[1.0, 3.0], &config, 0).unwrap();
        let prediction = model.predict(&[]).unwrap();
        assert!(prediction.mean >= 1.0 && prediction.mean <= 3.0);
    }

    #[test]
    fn wrong_width_is_rejected() {
        let (features, targets) = linear_data();
        let model = RidgeEnsemble::fit(&features, &targets, &ModelConfig::default(), 1).unwrap();
        let err = model.predict(&[1.0]).unwrap_err();
        assert_eq!(err.info().code, "model-width");
    }
}
