//! Traverse closure analysis.
//!
//! The closure error is the discrepancy between the propagated terminal
//! elevation and its known value, compared against the geodetic tolerance
//! `T = 4·√K` millimeters for a K-kilometer traverse.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::altitude::AltitudeCalculation;
use crate::constants::{CLOSURE_TOLERANCE_COEFFICIENT_MM, MAX_TRAVERSE_LENGTH_KM};
use crate::levelnet_errors::{LevelnetError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraverseType {
    /// First and last point identifiers match: the loop closes on itself.
    Closed,
    /// A known terminal elevation was supplied.
    Open,
    /// Neither condition holds; no closure can be evaluated.
    Unknown,
}

impl fmt::Display for TraverseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraverseType::Closed => write!(f, "closed"),
            TraverseType::Open => write!(f, "open"),
            TraverseType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Traverse-level closure aggregate.
///
/// Units:
/// * `closure_error_m`: meters; `closure_error_mm`, `tolerance_mm`: millimeters
/// * `total_distance_km`: kilometers
/// * `precision_ratio`: `|error| / tolerance`, 0 when the tolerance is 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosureAnalysis {
    pub traverse_type: TraverseType,
    pub closure_error_m: f64,
    pub closure_error_mm: f64,
    pub tolerance_mm: f64,
    pub total_distance_km: f64,
    pub is_acceptable: bool,
    pub precision_ratio: f64,
}

/// Pure closure check; no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosureCalculator;

impl ClosureCalculator {
    pub fn new() -> Self {
        ClosureCalculator
    }

    pub fn analyze(
        &self,
        altitudes: &[AltitudeCalculation],
        total_distance_km: f64,
        known_final_altitude_m: Option<f64>,
    ) -> Result<ClosureAnalysis> {
        let (Some(first), Some(last)) = (altitudes.first(), altitudes.last()) else {
            return Err(LevelnetError::DataValidation(
                "closure analysis requires at least one propagated altitude".to_string(),
            ));
        };
        if !total_distance_km.is_finite() || total_distance_km < 0.0 {
            return Err(LevelnetError::DataValidation(format!(
                "total distance must be finite and non-negative, got {total_distance_km} km"
            )));
        }
        if total_distance_km > MAX_TRAVERSE_LENGTH_KM {
            return Err(LevelnetError::DataValidation(format!(
                "total distance {total_distance_km} km exceeds the \
                 {MAX_TRAVERSE_LENGTH_KM} km plausibility bound"
            )));
        }

        let (traverse_type, reference_altitude_m) = if first.point_id == last.point_id {
            (TraverseType::Closed, Some(first.altitude_m))
        } else if let Some(known) = known_final_altitude_m {
            (TraverseType::Open, Some(known))
        } else {
            (TraverseType::Unknown, None)
        };

        let closure_error_m = reference_altitude_m
            .map(|reference| last.altitude_m - reference)
            .unwrap_or(0.0);
        let closure_error_mm = closure_error_m * 1000.0;
        let tolerance_mm = CLOSURE_TOLERANCE_COEFFICIENT_MM * total_distance_km.sqrt();
        let precision_ratio = if tolerance_mm > 0.0 {
            closure_error_mm.abs() / tolerance_mm
        } else {
            0.0
        };

        Ok(ClosureAnalysis {
            traverse_type,
            closure_error_m,
            closure_error_mm,
            tolerance_mm,
            total_distance_km,
            is_acceptable: closure_error_mm.abs() <= tolerance_mm,
            precision_ratio,
        })
    }
}
