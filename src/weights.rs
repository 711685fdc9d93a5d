//! Observation weights from the two-term geodetic error model.
//!
//! The theoretical variance of a leveling observation over distance `d` is
//! `σ² = a² + (b·d_km)²` in mm², with `a` the instrumental error and `b` the
//! kilometric error. The weight is the inverse variance.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_WEIGHT_DISTANCE_M;
use crate::levelnet_errors::{LevelnetError, Result};

/// Summary over a weight batch; weights are in 1/mm².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightStatistics {
    pub min_weight: f64,
    pub max_weight: f64,
    pub mean_weight: f64,
    pub std_dev: f64,
    pub max_min_ratio: f64,
}

/// Derives observation weights from sighting distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightCalculator {
    instrumental_error_mm: f64,
    kilometric_error_mm: f64,
}

impl WeightCalculator {
    pub fn new(instrumental_error_mm: f64, kilometric_error_mm: f64) -> Self {
        WeightCalculator {
            instrumental_error_mm,
            kilometric_error_mm,
        }
    }

    /// Weight of one observation over `distance_m`.
    ///
    /// Missing or non-positive distances fall back to 10 m; a distance that
    /// is still non-finite after defaulting rejects the batch.
    pub fn weight(&self, distance_m: Option<f64>) -> Result<f64> {
        let distance_m = match distance_m {
            None => DEFAULT_WEIGHT_DISTANCE_M,
            Some(d) if d <= 0.0 => DEFAULT_WEIGHT_DISTANCE_M,
            Some(d) => d,
        };
        if !distance_m.is_finite() {
            return Err(LevelnetError::DataValidation(format!(
                "non-finite sighting distance {distance_m} in weight computation"
            )));
        }

        let distance_km = distance_m / 1000.0;
        let variance_mm2 = self.instrumental_error_mm.powi(2)
            + (self.kilometric_error_mm * distance_km).powi(2);
        Ok(1.0 / variance_mm2)
    }

    /// Weights for a whole batch of per-observation distances.
    pub fn weights(&self, distances_m: &[Option<f64>]) -> Result<Vec<f64>> {
        distances_m.iter().map(|d| self.weight(*d)).collect()
    }

    pub fn statistics(weights: &[f64]) -> Option<WeightStatistics> {
        if weights.is_empty() {
            return None;
        }
        let min = weights.iter().copied().fold(f64::INFINITY, f64::min);
        let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        let variance =
            weights.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / weights.len() as f64;
        Some(WeightStatistics {
            min_weight: min,
            max_weight: max,
            mean_weight: mean,
            std_dev: variance.sqrt(),
            max_min_ratio: max / min,
        })
    }
}

#[cfg(test)]
mod test_weights {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reference_scenario() {
        // d = 1 km, a = 1 mm, b = 1 mm/sqrt(km): variance 2 mm², weight 0.5
        let calculator = WeightCalculator::new(1.0, 1.0);
        let weight = calculator.weight(Some(1000.0)).unwrap();
        assert_relative_eq!(weight, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_monotonically_non_increasing_in_distance() {
        let calculator = WeightCalculator::new(1.0, 1.0);
        let mut previous = f64::INFINITY;
        for distance in [10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0] {
            let weight = calculator.weight(Some(distance)).unwrap();
            assert!(weight > 0.0);
            assert!(weight <= previous);
            previous = weight;
        }
    }

    #[test]
    fn test_defaulting_and_rejection() {
        let calculator = WeightCalculator::new(1.0, 1.0);
        let default_weight = calculator.weight(Some(DEFAULT_WEIGHT_DISTANCE_M)).unwrap();
        assert_relative_eq!(calculator.weight(None).unwrap(), default_weight);
        assert_relative_eq!(calculator.weight(Some(-3.0)).unwrap(), default_weight);
        assert_relative_eq!(calculator.weight(Some(0.0)).unwrap(), default_weight);

        assert!(calculator.weight(Some(f64::NAN)).is_err());
        assert!(calculator.weight(Some(f64::INFINITY)).is_err());
        assert!(calculator
            .weights(&[Some(100.0), Some(f64::NAN)])
            .is_err());
    }

    #[test]
    fn test_statistics() {
        let calculator = WeightCalculator::new(1.0, 1.0);
        let weights = calculator
            .weights(&[Some(100.0), Some(1000.0), Some(2000.0)])
            .unwrap();
        let stats = WeightCalculator::statistics(&weights).unwrap();
        assert!(stats.min_weight < stats.max_weight);
        assert!(stats.max_min_ratio > 1.0);
        assert!(WeightCalculator::statistics(&[]).is_none());
    }
}
