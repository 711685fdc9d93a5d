//! Refraction and Earth-curvature corrections for a single sighting.
//!
//! Formulas:
//! * curvature: `c1 = d² / (2R)`
//! * refraction: `c2 = -r · d² / (2R)`
//! * level-apparent: `n.a = (1 - r) · d² / (2R)`
//!
//! where `d` is the sighting distance, `R` the mean Earth radius and `r` the
//! refraction coefficient adjusted to the ambient conditions. The corrected
//! elevation difference is `raw + (c1 + c2) + n.a`.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::AtmosphericConditions;
use crate::constants::{
    EARTH_RADIUS_M, REFRACTION_COEFFICIENT_MAX, REFRACTION_COEFFICIENT_MIN,
    STANDARD_REFRACTION_COEFFICIENT,
};
use crate::levelnet_errors::{LevelnetError, Result};

/// Per-sighting correction breakdown.
///
/// Units:
/// * `distance_m`, `raw_delta_h_m`, `corrected_delta_h_m`: meters
/// * all `*_mm` fields: millimeters
/// * `refraction_coefficient`: unitless, clamped to `[0.05, 0.25]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefractionCorrection {
    pub distance_m: f64,
    pub raw_delta_h_m: f64,
    pub curvature_correction_mm: f64,
    pub refraction_correction_mm: f64,
    pub level_apparent_correction_mm: f64,
    pub total_correction_mm: f64,
    pub corrected_delta_h_m: f64,
    pub refraction_coefficient: f64,
}

impl RefractionCorrection {
    /// Full correction applied to the raw value, in meters.
    pub fn applied_correction_m(&self) -> f64 {
        (self.total_correction_mm + self.level_apparent_correction_mm) / 1000.0
    }
}

/// Magnitude grade of a total atmospheric correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrectionSignificance {
    Negligible,
    Weak,
    Moderate,
    Important,
}

impl CorrectionSignificance {
    pub fn from_total_mm(total_correction_mm: f64) -> Self {
        let magnitude = total_correction_mm.abs();
        if magnitude < 0.1 {
            CorrectionSignificance::Negligible
        } else if magnitude < 1.0 {
            CorrectionSignificance::Weak
        } else if magnitude < 5.0 {
            CorrectionSignificance::Moderate
        } else {
            CorrectionSignificance::Important
        }
    }
}

impl fmt::Display for CorrectionSignificance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionSignificance::Negligible => write!(f, "negligible"),
            CorrectionSignificance::Weak => write!(f, "weak"),
            CorrectionSignificance::Moderate => write!(f, "moderate"),
            CorrectionSignificance::Important => write!(f, "important"),
        }
    }
}

/// Summary of the corrections applied over a whole traverse.
///
/// All fields are in millimeters except `count`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionSummary {
    pub count: usize,
    pub min_mm: f64,
    pub max_mm: f64,
    pub mean_mm: f64,
    pub total_mm: f64,
    pub std_dev_mm: f64,
    pub rms_mm: f64,
}

impl CorrectionSummary {
    pub fn from_corrections(corrections: &[RefractionCorrection]) -> Option<Self> {
        if corrections.is_empty() {
            return None;
        }
        let totals: Vec<f64> = corrections.iter().map(|c| c.total_correction_mm).collect();
        let count = totals.len();
        let sum: f64 = totals.iter().sum();
        let mean = sum / count as f64;
        let variance = totals.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / count as f64;
        let rms = (totals.iter().map(|t| t * t).sum::<f64>() / count as f64).sqrt();
        Some(CorrectionSummary {
            count,
            min_mm: totals.iter().copied().fold(f64::INFINITY, f64::min),
            max_mm: totals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean_mm: mean,
            total_mm: sum,
            std_dev_mm: variance.sqrt(),
            rms_mm: rms,
        })
    }
}

/// Stateless corrector for refraction and Earth curvature.
///
/// Callable independently of the full pipeline; each call is a pure function
/// of its inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosphericCorrector {
    earth_radius_m: f64,
    standard_refraction: f64,
}

impl Default for AtmosphericCorrector {
    fn default() -> Self {
        AtmosphericCorrector {
            earth_radius_m: EARTH_RADIUS_M,
            standard_refraction: STANDARD_REFRACTION_COEFFICIENT,
        }
    }
}

impl AtmosphericCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refraction coefficient adjusted to the ambient conditions.
    ///
    /// Empirical model around the standard coefficient:
    /// * temperature: `-(T - 15.0) · 0.004`
    /// * pressure: `(P - 1013.25) · 0.0001`
    /// * humidity: `(H - 60.0) · 0.0002`
    /// * time of day: `+0.02` for hours 10–16, `-0.01` for hours ≤ 8 or ≥ 18
    ///
    /// The result is clamped to `[0.05, 0.25]`.
    pub fn refraction_coefficient(&self, conditions: &AtmosphericConditions) -> f64 {
        let temperature_term = -(conditions.temperature_c - 15.0) * 0.004;
        let pressure_term = (conditions.pressure_hpa - 1013.25) * 0.0001;
        let humidity_term = (conditions.humidity_percent - 60.0) * 0.0002;
        let time_term = match conditions.measurement_hour() {
            Some(hour) if (10..=16).contains(&hour) => 0.02,
            Some(hour) if hour <= 8 || hour >= 18 => -0.01,
            _ => 0.0,
        };

        (self.standard_refraction + temperature_term + pressure_term + humidity_term + time_term)
            .clamp(REFRACTION_COEFFICIENT_MIN, REFRACTION_COEFFICIENT_MAX)
    }

    /// Correct a raw elevation difference for curvature and refraction.
    ///
    /// `distance_m` must be strictly positive and finite.
    pub fn correct(
        &self,
        distance_m: f64,
        raw_delta_h_m: f64,
        conditions: &AtmosphericConditions,
    ) -> Result<RefractionCorrection> {
        if !distance_m.is_finite() || distance_m <= 0.0 {
            return Err(LevelnetError::DataValidation(format!(
                "sighting distance must be strictly positive, got {distance_m}"
            )));
        }

        let r = self.refraction_coefficient(conditions);
        let d_squared = distance_m * distance_m;
        let two_r = 2.0 * self.earth_radius_m;

        let curvature_m = d_squared / two_r;
        let refraction_m = -r * d_squared / two_r;
        let total_m = curvature_m + refraction_m;
        let level_apparent_m = (1.0 - r) * d_squared / two_r;

        Ok(RefractionCorrection {
            distance_m,
            raw_delta_h_m,
            curvature_correction_mm: curvature_m * 1000.0,
            refraction_correction_mm: refraction_m * 1000.0,
            level_apparent_correction_mm: level_apparent_m * 1000.0,
            total_correction_mm: total_m * 1000.0,
            corrected_delta_h_m: raw_delta_h_m + total_m + level_apparent_m,
            refraction_coefficient: r,
        })
    }
}
