//! A-posteriori statistics, model validation and blunder screening.
//!
//! After the solve, the residuals `v = A·x̂ - f` carry everything needed to
//! judge the stochastic model: the a-posteriori variance `σ₀² = vᵀPv / r`,
//! the chi-square test of the unit weight, and the normalized residuals
//! `r̂ᵢ = vᵢ / (σ₀·√qᵥᵥᵢ)` screened against the Student-t critical value.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, StudentsT};

use crate::levelnet_errors::{LevelnetError, Result};

use super::matrix_builder::MatrixSystem;
use super::solver::Solution;

const STAGE: &str = "statistical analysis";

/// Quality statistics of one compensation run.
///
/// Units: `sigma_0_mm` in millimeters; the chi-square fields are unitless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompensationStatistics {
    pub sigma_0_mm: f64,
    pub degrees_of_freedom: usize,
    pub chi2_statistic: f64,
    pub chi2_critical_value: f64,
    /// True when the chi-square test does not reject the stochastic model.
    pub chi2_passed: bool,
    pub max_normalized_residual: f64,
    /// Student-t critical value used for blunder screening.
    pub blunder_threshold: f64,
}

/// One observation flagged by the blunder screening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlunderSuspect {
    pub observation_id: String,
    pub index: usize,
    pub normalized_residual: f64,
    /// `|normalized residual| / threshold`; above 1 by construction.
    pub significance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlunderReport {
    pub total_observations: usize,
    pub suspects: Vec<BlunderSuspect>,
    pub threshold: f64,
    pub max_normalized_residual: f64,
}

impl BlunderReport {
    pub fn blunders_detected(&self) -> bool {
        !self.suspects.is_empty()
    }
}

/// Everything the analyzer derives from one solved system.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutput {
    pub statistics: CompensationStatistics,
    /// Observation residuals `v = A·x̂ - f`, in millimeters.
    pub residuals: DVector<f64>,
    pub normalized_residuals: Vec<f64>,
    pub blunder_report: BlunderReport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticalAnalyzer {
    confidence_level: f64,
}

impl StatisticalAnalyzer {
    pub fn new(confidence_level: f64) -> Self {
        StatisticalAnalyzer { confidence_level }
    }

    /// Full statistical analysis of a solved system.
    ///
    /// Fails when the degrees of freedom are not strictly positive; every
    /// statistical anomaly past that point is reported, never raised.
    pub fn analyze(&self, system: &MatrixSystem, solution: &Solution) -> Result<AnalysisOutput> {
        let n_observations = system.observation_count();
        let n_unknowns = system.unknown_count();
        if n_observations <= n_unknowns {
            return Err(LevelnetError::InsufficientRedundancy {
                observations: n_observations,
                unknowns: n_unknowns,
            });
        }
        let degrees_of_freedom = n_observations - n_unknowns;

        let residuals = &system.design * &solution.corrections - &system.misclosure;
        let vt_p_v = (residuals.transpose() * &system.weights * &residuals)[(0, 0)];
        let sigma_0_mm = (vt_p_v / degrees_of_freedom as f64).sqrt();

        let chi2_critical_value = ChiSquared::new(degrees_of_freedom as f64)
            .map_err(|e| LevelnetError::calculation(STAGE, e.to_string()))?
            .inverse_cdf(self.confidence_level);
        let chi2_passed = vt_p_v <= chi2_critical_value;

        let alpha = 1.0 - self.confidence_level;
        let blunder_threshold = StudentsT::new(0.0, 1.0, degrees_of_freedom as f64)
            .map_err(|e| LevelnetError::calculation(STAGE, e.to_string()))?
            .inverse_cdf(1.0 - alpha / 2.0);

        let normalized_residuals =
            normalized_residuals(&residuals, system, &solution.covariance, sigma_0_mm);
        let max_normalized_residual = normalized_residuals
            .iter()
            .map(|r| r.abs())
            .fold(0.0, f64::max);

        let statistics = CompensationStatistics {
            sigma_0_mm,
            degrees_of_freedom,
            chi2_statistic: vt_p_v,
            chi2_critical_value,
            chi2_passed,
            max_normalized_residual,
            blunder_threshold,
        };
        let blunder_report = self.detect_blunders(
            &normalized_residuals,
            blunder_threshold,
            &system.observation_ids,
        );

        Ok(AnalysisOutput {
            statistics,
            residuals,
            normalized_residuals,
            blunder_report,
        })
    }

    /// Flag every observation whose normalized residual exceeds the
    /// Student-t critical value.
    pub fn detect_blunders(
        &self,
        normalized_residuals: &[f64],
        threshold: f64,
        observation_ids: &[String],
    ) -> BlunderReport {
        let suspects = normalized_residuals
            .iter()
            .enumerate()
            .filter(|(_, residual)| residual.abs() > threshold)
            .map(|(index, residual)| BlunderSuspect {
                observation_id: observation_ids
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| format!("obs_{}", index + 1)),
                index,
                normalized_residual: *residual,
                significance: residual.abs() / threshold,
            })
            .collect();

        BlunderReport {
            total_observations: normalized_residuals.len(),
            suspects,
            threshold,
            max_normalized_residual: normalized_residuals
                .iter()
                .map(|r| r.abs())
                .fold(0.0, f64::max),
        }
    }
}

/// `r̂ᵢ = vᵢ / (σ₀·√qᵥᵥᵢ)` with `qᵥᵥ = diag(P⁻¹ - A·Qx·Aᵀ)`.
///
/// Entries with a non-positive cofactor (fully constrained observations)
/// get a zero normalized residual instead of a division by zero.
fn normalized_residuals(
    residuals: &DVector<f64>,
    system: &MatrixSystem,
    covariance: &DMatrix<f64>,
    sigma_0_mm: f64,
) -> Vec<f64> {
    let weight_inverse = system.weights.diagonal().map(|w| 1.0 / w);
    let hat = &system.design * covariance * system.design.transpose();

    residuals
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let q_vv = weight_inverse[i] - hat[(i, i)];
            if q_vv > 0.0 && sigma_0_mm > 0.0 {
                v / (sigma_0_mm * q_vv.sqrt())
            } else {
                0.0
            }
        })
        .collect()
}
