//! Weighted least-squares solvers with conditioning-driven dispatch.
//!
//! The strategy is a pure classification of the assembled system: the SVD
//! pseudo-inverse for ill-conditioned designs, QR for large systems, and the
//! normal equations (through Cholesky, with trace-scaled ridge regularization
//! when the normal matrix degrades) for everything else.

use std::fmt;

use nalgebra::{Cholesky, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::constants::{
    FATAL_CORRECTION_MM, ILL_CONDITIONED_DESIGN, ILL_CONDITIONED_NORMAL, LARGE_SYSTEM_UNKNOWNS,
    NOTABLE_CORRECTION_MM, RIDGE_SCALE, SUSPICIOUS_CORRECTION_MM, SVD_RANK_TOLERANCE,
};
use crate::diagnostics::{push_info, push_warning, Diagnostic};
use crate::levelnet_errors::{LevelnetError, Result};

use super::matrix_builder::MatrixSystem;

/// Resolution strategy chosen for one adjustment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMethod {
    /// Normal equations solved by LU, the fallback when Cholesky fails.
    NormalEquations,
    /// Normal equations solved by Cholesky factorization.
    Cholesky,
    /// QR on the weighted design, for large unknown counts.
    Qr,
    /// SVD pseudo-inverse, for ill-conditioned designs.
    Svd,
}

impl fmt::Display for SolverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverMethod::NormalEquations => write!(f, "normal_equations"),
            SolverMethod::Cholesky => write!(f, "cholesky"),
            SolverMethod::Qr => write!(f, "qr"),
            SolverMethod::Svd => write!(f, "svd"),
        }
    }
}

/// Corrections and their cofactor matrix.
///
/// Units: `corrections` in millimeters, `covariance` in mm².
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub corrections: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub method: SolverMethod,
    pub condition_number: f64,
}

/// Two-norm condition number from the singular values.
pub fn condition_number(matrix: &DMatrix<f64>) -> f64 {
    let singular_values = matrix.clone().svd(false, false).singular_values;
    let max = singular_values.max();
    let min = singular_values.min();
    if min <= 0.0 {
        f64::INFINITY
    } else {
        max / min
    }
}

/// Pure classification of the resolution strategy.
pub fn classify_system(design: &DMatrix<f64>) -> (SolverMethod, f64) {
    let condition = condition_number(design);
    let method = if !condition.is_finite() || condition > ILL_CONDITIONED_DESIGN {
        SolverMethod::Svd
    } else if design.ncols() > LARGE_SYSTEM_UNKNOWNS {
        SolverMethod::Qr
    } else {
        SolverMethod::Cholesky
    };
    (method, condition)
}

/// Solves the weighted problem `min ||√P(Ax - f)||²`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquaresSolver;

impl LeastSquaresSolver {
    pub fn new() -> Self {
        LeastSquaresSolver
    }

    /// Solve with the automatically classified strategy.
    pub fn solve(
        &self,
        system: &MatrixSystem,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Solution> {
        let (method, condition) = classify_system(&system.design);
        log::debug!(
            "solver dispatch: {} ({}x{}, condition {:.3e})",
            method,
            system.observation_count(),
            system.unknown_count(),
            condition
        );
        self.solve_with(system, method, condition, diagnostics)
    }

    /// Solve with an explicitly chosen strategy.
    pub fn solve_with(
        &self,
        system: &MatrixSystem,
        method: SolverMethod,
        condition_number: f64,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Solution> {
        let (corrections, covariance, method) = match method {
            SolverMethod::NormalEquations | SolverMethod::Cholesky => {
                self.solve_normal_equations(system, diagnostics)?
            }
            SolverMethod::Qr => self.solve_qr(system)?,
            SolverMethod::Svd => self.solve_svd(system)?,
        };

        let solution = Solution {
            corrections,
            covariance,
            method,
            condition_number,
        };
        self.validate_solution(&solution, diagnostics)?;
        Ok(solution)
    }

    /// `N = AᵀPA`, `b = AᵀPf`, solved by Cholesky with ridge regularization
    /// when `cond(N)` exceeds the normal-matrix threshold.
    fn solve_normal_equations(
        &self,
        system: &MatrixSystem,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(DVector<f64>, DMatrix<f64>, SolverMethod)> {
        let at_p = system.design.transpose() * &system.weights;
        let mut normal = &at_p * &system.design;
        let rhs = &at_p * &system.misclosure;

        let normal_condition = condition_number(&normal);
        if !normal_condition.is_finite() || normal_condition > ILL_CONDITIONED_NORMAL {
            let ridge = normal.trace() * RIDGE_SCALE;
            push_info(
                diagnostics,
                "solver",
                format!(
                    "normal matrix condition {normal_condition:.3e}: \
                     ridge regularization {ridge:.3e} applied"
                ),
            );
            let n = normal.nrows();
            normal += DMatrix::identity(n, n) * ridge;
        }

        match Cholesky::new(normal.clone()) {
            Some(cholesky) => {
                let corrections = cholesky.solve(&rhs);
                let covariance = cholesky.inverse();
                Ok((corrections, covariance, SolverMethod::Cholesky))
            }
            None => {
                // Not positive definite despite the ridge; plain LU still
                // solves the normal equations when N is invertible.
                let lu = normal.clone().lu();
                let corrections = lu.solve(&rhs).ok_or_else(|| {
                    LevelnetError::matrix(
                        "N",
                        normal.shape(),
                        "normal-equation solve",
                        "normal matrix is singular",
                    )
                })?;
                let covariance = lu.try_inverse().ok_or_else(|| {
                    LevelnetError::matrix(
                        "N",
                        normal.shape(),
                        "covariance inversion",
                        "normal matrix is singular",
                    )
                })?;
                Ok((corrections, covariance, SolverMethod::NormalEquations))
            }
        }
    }

    /// QR on the weighted design; covariance from the triangular factor.
    fn solve_qr(
        &self,
        system: &MatrixSystem,
    ) -> Result<(DVector<f64>, DMatrix<f64>, SolverMethod)> {
        let (weighted_design, weighted_misclosure) = weight_system(system);
        let n = weighted_design.ncols();
        let qr = weighted_design.qr();
        let r = qr.r();
        let q = qr.q();

        let projected = q.transpose() * weighted_misclosure;
        let corrections = r.solve_upper_triangular(&projected).ok_or_else(|| {
            LevelnetError::matrix(
                "R",
                r.shape(),
                "triangular solve",
                "triangular factor is singular",
            )
        })?;
        let r_inverse = r
            .solve_upper_triangular(&DMatrix::identity(n, n))
            .ok_or_else(|| {
                LevelnetError::matrix(
                    "R",
                    r.shape(),
                    "triangular inversion",
                    "triangular factor is singular",
                )
            })?;
        let covariance = &r_inverse * r_inverse.transpose();
        Ok((corrections, covariance, SolverMethod::Qr))
    }

    /// SVD pseudo-inverse with a relative singular-value threshold.
    fn solve_svd(
        &self,
        system: &MatrixSystem,
    ) -> Result<(DVector<f64>, DMatrix<f64>, SolverMethod)> {
        let (weighted_design, weighted_misclosure) = weight_system(system);
        let shape = weighted_design.shape();
        let svd = weighted_design.svd(true, true);
        let threshold = svd.singular_values.max() * SVD_RANK_TOLERANCE;

        let corrections = svd
            .solve(&weighted_misclosure, threshold)
            .map_err(|message| LevelnetError::matrix("A", shape, "svd solve", message))?;

        let v_t = svd
            .v_t
            .as_ref()
            .ok_or_else(|| LevelnetError::matrix("A", shape, "svd solve", "missing V factor"))?;
        let inverse_squares = DVector::from_iterator(
            svd.singular_values.len(),
            svd.singular_values.iter().map(|&sigma| {
                if sigma > threshold {
                    1.0 / (sigma * sigma)
                } else {
                    0.0
                }
            }),
        );
        let covariance =
            v_t.transpose() * DMatrix::from_diagonal(&inverse_squares) * v_t;
        Ok((corrections, covariance, SolverMethod::Svd))
    }

    /// Non-finite output or a correction past the physical sanity bound is
    /// fatal; large but plausible corrections are loud diagnostics.
    fn validate_solution(
        &self,
        solution: &Solution,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        if solution.corrections.iter().any(|x| !x.is_finite()) {
            return Err(LevelnetError::Precision {
                message: "solver produced a non-finite correction".to_string(),
                value_mm: f64::NAN,
            });
        }

        let max_correction_mm = solution.corrections.amax();
        if max_correction_mm > FATAL_CORRECTION_MM {
            return Err(LevelnetError::Precision {
                message: "corrections exceed the physical sanity bound; input data is \
                          likely corrupted"
                    .to_string(),
                value_mm: max_correction_mm,
            });
        }
        if max_correction_mm > SUSPICIOUS_CORRECTION_MM {
            push_warning(
                diagnostics,
                "solver",
                format!(
                    "maximum correction {max_correction_mm:.1} mm exceeds 1 m: check the \
                     reference elevations and the unit consistency of the observations"
                ),
            );
        } else if max_correction_mm > NOTABLE_CORRECTION_MM {
            push_info(
                diagnostics,
                "solver",
                format!("maximum correction {max_correction_mm:.1} mm exceeds 10 cm"),
            );
        }
        Ok(())
    }
}

/// Scale rows by the square root of the weights: `√P·A`, `√P·f`.
fn weight_system(system: &MatrixSystem) -> (DMatrix<f64>, DVector<f64>) {
    let sqrt_weights = system.weights.diagonal().map(f64::sqrt);
    let sqrt_p = DMatrix::from_diagonal(&sqrt_weights);
    (&sqrt_p * &system.design, &sqrt_p * &system.misclosure)
}

#[cfg(test)]
mod test_solver {
    use super::*;
    use approx::assert_relative_eq;

    /// 3 observations over 2 unknowns with unit-ish weights.
    fn small_system() -> MatrixSystem {
        let design = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, -1.0, 1.0, 1.0, 0.0]);
        let weights = DMatrix::from_diagonal(&DVector::from_vec(vec![0.5, 0.8, 0.5]));
        let misclosure = DVector::from_vec(vec![1.0, -0.5, 1.2]);
        MatrixSystem {
            design,
            weights,
            misclosure,
            point_ids: vec!["R1".into(), "P1".into(), "P2".into()],
            unknown_ids: vec!["P1".into(), "P2".into()],
            observation_ids: vec!["obs_1".into(), "obs_2".into(), "obs_3".into()],
        }
    }

    #[test]
    fn test_classification_prefers_cholesky_for_small_systems() {
        let system = small_system();
        let (method, condition) = classify_system(&system.design);
        assert_eq!(method, SolverMethod::Cholesky);
        assert!(condition < ILL_CONDITIONED_DESIGN);
    }

    #[test]
    fn test_classification_svd_for_rank_deficient() {
        // duplicated column: condition number is infinite
        let design = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, -1.0, -1.0, 1.0, 1.0]);
        let (method, condition) = classify_system(&design);
        assert_eq!(method, SolverMethod::Svd);
        assert!(!condition.is_finite() || condition > ILL_CONDITIONED_DESIGN);
    }

    #[test]
    fn test_normal_equations_and_qr_agree() {
        let system = small_system();
        let solver = LeastSquaresSolver::new();
        let mut diagnostics = Vec::new();

        let by_normal = solver
            .solve_with(&system, SolverMethod::Cholesky, 10.0, &mut diagnostics)
            .unwrap();
        let by_qr = solver
            .solve_with(&system, SolverMethod::Qr, 10.0, &mut diagnostics)
            .unwrap();

        for i in 0..2 {
            assert_relative_eq!(
                by_normal.corrections[i],
                by_qr.corrections[i],
                max_relative = 1e-6
            );
            assert_relative_eq!(
                by_normal.covariance[(i, i)],
                by_qr.covariance[(i, i)],
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn test_svd_agrees_on_well_conditioned_system() {
        let system = small_system();
        let solver = LeastSquaresSolver::new();
        let mut diagnostics = Vec::new();

        let by_normal = solver
            .solve_with(&system, SolverMethod::Cholesky, 10.0, &mut diagnostics)
            .unwrap();
        let by_svd = solver
            .solve_with(&system, SolverMethod::Svd, 10.0, &mut diagnostics)
            .unwrap();
        for i in 0..2 {
            assert_relative_eq!(
                by_normal.corrections[i],
                by_svd.corrections[i],
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn test_zero_misclosure_gives_zero_corrections() {
        let mut system = small_system();
        system.misclosure = DVector::zeros(3);
        let solver = LeastSquaresSolver::new();
        let mut diagnostics = Vec::new();
        let solution = solver.solve(&system, &mut diagnostics).unwrap();
        assert_relative_eq!(solution.corrections.amax(), 0.0);
    }

    #[test]
    fn test_extreme_corrections_are_fatal() {
        let mut system = small_system();
        // 20 m misclosure drives the corrections past the 10 m bound
        system.misclosure = DVector::from_vec(vec![20_000.0, 0.0, 20_000.0]);
        let solver = LeastSquaresSolver::new();
        let mut diagnostics = Vec::new();
        let err = solver.solve(&system, &mut diagnostics).unwrap_err();
        assert!(matches!(err, LevelnetError::Precision { .. }));
    }

    #[test]
    fn test_large_corrections_warn_but_pass() {
        let mut system = small_system();
        // around 2 m: accepted with a loud diagnostic
        system.misclosure = DVector::from_vec(vec![2_000.0, 0.0, 2_000.0]);
        let solver = LeastSquaresSolver::new();
        let mut diagnostics = Vec::new();
        let solution = solver.solve(&system, &mut diagnostics).unwrap();
        assert!(solution.corrections.amax() > SUSPICIOUS_CORRECTION_MM);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("reference elevations")));
    }
}
