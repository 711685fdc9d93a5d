//! Elevation propagation from the reference point.

use serde::{Deserialize, Serialize};

use crate::height_difference::HeightDifference;
use crate::levelnet_errors::{LevelnetError, Result};

/// Per-point elevation record.
///
/// Units:
/// * `altitude_m`: meters, rounded to the millimeter during propagation
/// * `cumulative_delta_h_m`: meters from the reference point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudeCalculation {
    pub point_id: String,
    pub altitude_m: f64,
    pub cumulative_delta_h_m: f64,
    pub is_reference: bool,
}

/// Propagates elevations by cumulative summation of the height differences.
#[derive(Debug, Clone, Copy, Default)]
pub struct AltitudeCalculator;

impl AltitudeCalculator {
    pub fn new() -> Self {
        AltitudeCalculator
    }

    /// One [`AltitudeCalculation`] per point; the first point is the
    /// reference with zero cumulative delta. The point count must equal
    /// `differences.len() + 1`.
    pub fn compute(
        &self,
        initial_altitude_m: f64,
        differences: &[HeightDifference],
        point_ids: &[String],
    ) -> Result<Vec<AltitudeCalculation>> {
        if !initial_altitude_m.is_finite() {
            return Err(LevelnetError::DataValidation(format!(
                "reference altitude must be finite, got {initial_altitude_m}"
            )));
        }
        if point_ids.len() != differences.len() + 1 {
            return Err(LevelnetError::calculation(
                "altitude propagation",
                format!(
                    "{} points for {} height differences (expected N points for N-1 differences)",
                    point_ids.len(),
                    differences.len()
                ),
            ));
        }

        let mut altitudes = Vec::with_capacity(point_ids.len());
        altitudes.push(AltitudeCalculation {
            point_id: point_ids[0].clone(),
            altitude_m: round_mm(initial_altitude_m),
            cumulative_delta_h_m: 0.0,
            is_reference: true,
        });

        let mut current = initial_altitude_m;
        let mut cumulative = 0.0;
        for (difference, point_id) in differences.iter().zip(&point_ids[1..]) {
            current += difference.delta_h_m;
            cumulative += difference.delta_h_m;
            altitudes.push(AltitudeCalculation {
                point_id: point_id.clone(),
                altitude_m: round_mm(current),
                cumulative_delta_h_m: round_mm(cumulative),
                is_reference: false,
            });
        }

        Ok(altitudes)
    }
}

/// Round to the millimeter (3 decimals).
pub(crate) fn round_mm(value_m: f64) -> f64 {
    (value_m * 1000.0).round() / 1000.0
}

/// Round to a tenth of a millimeter (4 decimals), used for adjusted values.
pub(crate) fn round_tenth_mm(value_m: f64) -> f64 {
    (value_m * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod test_altitude {
    use super::*;
    use approx::assert_relative_eq;
    use smallvec::SmallVec;

    fn difference(delta_h_m: f64) -> HeightDifference {
        HeightDifference {
            delta_h_m,
            channels: SmallVec::new(),
            is_valid: true,
            control_residual_m: None,
        }
    }

    #[test]
    fn test_propagation() {
        let ids: Vec<String> = ["R1", "P1", "P2"].iter().map(|s| s.to_string()).collect();
        let differences = vec![difference(0.302), difference(-0.102)];
        let altitudes = AltitudeCalculator::new()
            .compute(100.0, &differences, &ids)
            .unwrap();

        assert_eq!(altitudes.len(), 3);
        assert!(altitudes[0].is_reference);
        assert_relative_eq!(altitudes[0].altitude_m, 100.0);
        assert_relative_eq!(altitudes[0].cumulative_delta_h_m, 0.0);
        assert_relative_eq!(altitudes[1].altitude_m, 100.302, epsilon = 1e-12);
        assert_relative_eq!(altitudes[2].altitude_m, 100.2, epsilon = 1e-12);
        assert_relative_eq!(altitudes[2].cumulative_delta_h_m, 0.2, epsilon = 1e-12);
        assert!(!altitudes[2].is_reference);
    }

    #[test]
    fn test_count_mismatch_is_fatal() {
        let ids: Vec<String> = ["R1", "P1"].iter().map(|s| s.to_string()).collect();
        let differences = vec![difference(0.1), difference(0.2)];
        let err = AltitudeCalculator::new()
            .compute(100.0, &differences, &ids)
            .unwrap_err();
        assert!(matches!(err, LevelnetError::Calculation { .. }));
    }

    #[test]
    fn test_non_finite_reference_rejected() {
        let ids: Vec<String> = ["R1", "P1"].iter().map(|s| s.to_string()).collect();
        let differences = vec![difference(0.1)];
        assert!(AltitudeCalculator::new()
            .compute(f64::NAN, &differences, &ids)
            .is_err());
    }
}
