//! Assembly of the design matrix, weight matrix and misclosure vector.
//!
//! Every individual channel observation becomes one row constraining the two
//! point corrections of its segment: `-1` on the departure point, `+1` on the
//! arrival point, with the reference point excluded from the unknowns. The
//! misclosure of a row is the observed height difference minus the value
//! implied by the propagated elevations, in millimeters.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use crate::altitude::AltitudeCalculation;
use crate::constants::SVD_RANK_TOLERANCE;
use crate::diagnostics::{push_info, Diagnostic};
use crate::height_difference::HeightDifference;
use crate::levelnet_errors::{LevelnetError, Result};
use crate::weights::WeightCalculator;

const STAGE: &str = "matrix assembly";

/// The weighted linear system `A·x = f` of one adjustment run.
///
/// Ephemeral: rebuilt for every run and discarded once the compensation
/// results are produced.
///
/// Units:
/// * `design`: unitless incidence coefficients (m rows × n unknowns)
/// * `weights`: diagonal, 1/mm²
/// * `misclosure`: millimeters
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixSystem {
    pub design: DMatrix<f64>,
    pub weights: DMatrix<f64>,
    pub misclosure: DVector<f64>,
    /// All traverse point identifiers, in order.
    pub point_ids: Vec<String>,
    /// Identifiers of the unknown points, one per design-matrix column.
    pub unknown_ids: Vec<String>,
    pub observation_ids: Vec<String>,
}

impl MatrixSystem {
    pub fn observation_count(&self) -> usize {
        self.design.nrows()
    }

    pub fn unknown_count(&self) -> usize {
        self.design.ncols()
    }
}

/// Builds the [`MatrixSystem`] from the preliminary calculation products.
#[derive(Debug, Clone, Copy)]
pub struct MatrixBuilder {
    weight_calculator: WeightCalculator,
}

impl MatrixBuilder {
    pub fn new(instrumental_error_mm: f64, kilometric_error_mm: f64) -> Self {
        MatrixBuilder {
            weight_calculator: WeightCalculator::new(instrumental_error_mm, kilometric_error_mm),
        }
    }

    /// Assemble and validate the linear system.
    ///
    /// `segment_distances_m` supplies one optional mean sighting distance per
    /// segment for the stochastic model. When the individual observations
    /// carry no redundancy over the segments, the builder falls back to the
    /// per-segment averages and records a diagnostic.
    pub fn build(
        &self,
        differences: &[HeightDifference],
        altitudes: &[AltitudeCalculation],
        segment_distances_m: &[Option<f64>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<MatrixSystem> {
        let n_points = altitudes.len();
        if n_points < 2 || differences.len() != n_points - 1 {
            return Err(LevelnetError::calculation(
                STAGE,
                format!(
                    "{} altitudes for {} height differences",
                    n_points,
                    differences.len()
                ),
            ));
        }
        let n_segments = differences.len();

        // Unknowns: every distinct point id except the reference. A closed
        // loop maps its terminal occurrence back onto the reference column.
        let reference_id = &altitudes[0].point_id;
        let mut unknown_ids: Vec<String> = Vec::new();
        let mut column_of: HashMap<&str, usize> = HashMap::new();
        for altitude in altitudes {
            let id = altitude.point_id.as_str();
            if id != reference_id && !column_of.contains_key(id) {
                column_of.insert(id, unknown_ids.len());
                unknown_ids.push(altitude.point_id.clone());
            }
        }
        let n_unknowns = unknown_ids.len();
        if n_unknowns == 0 {
            return Err(LevelnetError::matrix(
                "A",
                (n_segments, 0),
                "construction",
                "every point coincides with the reference; nothing to adjust",
            ));
        }

        // One observation per valid channel reading.
        let mut observations: Vec<(usize, f64)> = Vec::with_capacity(2 * n_segments);
        for (segment, difference) in differences.iter().enumerate() {
            for channel in &difference.channels {
                observations.push((segment, channel.delta_h_m));
            }
        }
        if observations.len() == n_segments {
            // No redundancy over the segments: per-segment averaging changes
            // nothing numerically but keeps the system well defined.
            push_info(
                diagnostics,
                STAGE,
                format!(
                    "{} observations for {n_segments} segments: no channel redundancy, \
                     falling back to per-segment averages",
                    observations.len()
                ),
            );
            observations = differences
                .iter()
                .enumerate()
                .map(|(segment, difference)| (segment, difference.delta_h_m))
                .collect();
        }
        let n_observations = observations.len();

        let mut design = DMatrix::zeros(n_observations, n_unknowns);
        let mut misclosure = DVector::zeros(n_observations);
        let mut weight_diagonal = DVector::zeros(n_observations);
        let mut observation_ids = Vec::with_capacity(n_observations);

        // A recurring reference point keeps its reference elevation in the
        // implied deltas; this is what carries the loop misclosure into the
        // right-hand side instead of letting the propagated terminal absorb it.
        let reference_altitude_m = altitudes[0].altitude_m;
        let effective_altitude = |point: &AltitudeCalculation| {
            if point.point_id == *reference_id {
                reference_altitude_m
            } else {
                point.altitude_m
            }
        };

        for (row, (segment, observed_delta_m)) in observations.iter().enumerate() {
            let from = &altitudes[*segment];
            let to = &altitudes[*segment + 1];

            if let Some(&column) = column_of.get(from.point_id.as_str()) {
                design[(row, column)] = -1.0;
            }
            if let Some(&column) = column_of.get(to.point_id.as_str()) {
                design[(row, column)] = 1.0;
            }

            let implied_delta_m = effective_altitude(to) - effective_altitude(from);
            misclosure[row] = (observed_delta_m - implied_delta_m) * 1000.0;

            let distance = segment_distances_m.get(*segment).copied().flatten();
            weight_diagonal[row] = self.weight_calculator.weight(distance)?;

            observation_ids.push(format!("obs_{}_{}", segment + 1, row + 1));
        }

        let system = MatrixSystem {
            design,
            weights: DMatrix::from_diagonal(&weight_diagonal),
            misclosure,
            point_ids: altitudes.iter().map(|a| a.point_id.clone()).collect(),
            unknown_ids,
            observation_ids,
        };
        validate_system(&system)?;
        Ok(system)
    }
}

/// Rank and positivity checks; either failure is fatal.
pub(crate) fn validate_system(system: &MatrixSystem) -> Result<()> {
    let shape = system.design.shape();

    for (i, weight) in system.weights.diagonal().iter().enumerate() {
        if !weight.is_finite() || *weight <= 0.0 {
            return Err(LevelnetError::matrix(
                "P",
                system.weights.shape(),
                "positivity validation",
                format!("weight {weight} at observation {i} is not strictly positive"),
            ));
        }
    }

    let svd = system.design.clone().svd(false, false);
    let max_singular = svd.singular_values.max();
    let rank = svd.rank(max_singular * SVD_RANK_TOLERANCE);
    if rank < system.unknown_count() {
        return Err(LevelnetError::matrix(
            "A",
            shape,
            "rank validation",
            format!(
                "column rank {rank} is below the unknown count {}",
                system.unknown_count()
            ),
        ));
    }
    Ok(())
}
