//! Configuration threaded through the pipelines.
//!
//! All defaults live here as an explicit immutable value; nothing in the
//! crate reads ambient state. Hosts construct a [`LevelingParams`] once
//! (usually via [`LevelingParamsBuilder`]) and hand it to the orchestrators.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::atmosphere::AtmosphericConditions;
use crate::levelnet_errors::{LevelnetError, Result};

/// Immutable configuration of a leveling computation.
///
/// Units:
/// * `target_precision_mm`: millimeters
/// * `instrumental_error_mm`: millimeters (the `a` term of the weight model)
/// * `kilometric_error_mm`: mm/√km (the `b` term of the weight model)
/// * `confidence_level`: probability in `(0, 1)` for the statistical tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelingParams {
    pub target_precision_mm: f64,
    pub instrumental_error_mm: f64,
    pub kilometric_error_mm: f64,
    pub confidence_level: f64,
    pub apply_atmospheric_corrections: bool,
    pub atmospheric_conditions: AtmosphericConditions,
}

impl Default for LevelingParams {
    fn default() -> Self {
        LevelingParams {
            target_precision_mm: 2.0,
            instrumental_error_mm: 1.0,
            kilometric_error_mm: 1.0,
            confidence_level: 0.95,
            apply_atmospheric_corrections: true,
            atmospheric_conditions: AtmosphericConditions::default(),
        }
    }
}

impl LevelingParams {
    pub fn builder() -> LevelingParamsBuilder {
        LevelingParamsBuilder::default()
    }
}

impl fmt::Display for LevelingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "leveling parameters:")?;
            writeln!(f, "  target precision: {} mm", self.target_precision_mm)?;
            writeln!(f, "  instrumental error: {} mm", self.instrumental_error_mm)?;
            writeln!(f, "  kilometric error: {} mm/sqrt(km)", self.kilometric_error_mm)?;
            writeln!(f, "  confidence level: {}", self.confidence_level)?;
            write!(
                f,
                "  atmospheric corrections: {}",
                if self.apply_atmospheric_corrections {
                    "on"
                } else {
                    "off"
                }
            )
        } else {
            write!(
                f,
                "target {} mm, a = {} mm, b = {} mm/sqrt(km), confidence {}",
                self.target_precision_mm,
                self.instrumental_error_mm,
                self.kilometric_error_mm,
                self.confidence_level
            )
        }
    }
}

/// Fluent builder with NaN-safe validation at `build()` time.
#[derive(Debug, Clone)]
pub struct LevelingParamsBuilder {
    params: LevelingParams,
}

impl Default for LevelingParamsBuilder {
    fn default() -> Self {
        LevelingParamsBuilder {
            params: LevelingParams::default(),
        }
    }
}

impl LevelingParamsBuilder {
    pub fn target_precision_mm(mut self, value: f64) -> Self {
        self.params.target_precision_mm = value;
        self
    }

    pub fn instrumental_error_mm(mut self, value: f64) -> Self {
        self.params.instrumental_error_mm = value;
        self
    }

    pub fn kilometric_error_mm(mut self, value: f64) -> Self {
        self.params.kilometric_error_mm = value;
        self
    }

    pub fn confidence_level(mut self, value: f64) -> Self {
        self.params.confidence_level = value;
        self
    }

    pub fn apply_atmospheric_corrections(mut self, enabled: bool) -> Self {
        self.params.apply_atmospheric_corrections = enabled;
        self
    }

    pub fn atmospheric_conditions(mut self, conditions: AtmosphericConditions) -> Self {
        self.params.atmospheric_conditions = conditions;
        self
    }

    pub fn build(self) -> Result<LevelingParams> {
        let p = &self.params;
        check_positive("target_precision_mm", p.target_precision_mm)?;
        check_positive("instrumental_error_mm", p.instrumental_error_mm)?;
        if !p.kilometric_error_mm.is_finite() || p.kilometric_error_mm < 0.0 {
            return Err(LevelnetError::InvalidParameters(format!(
                "kilometric_error_mm must be finite and non-negative, got {}",
                p.kilometric_error_mm
            )));
        }
        if !p.confidence_level.is_finite()
            || p.confidence_level <= 0.0
            || p.confidence_level >= 1.0
        {
            return Err(LevelnetError::InvalidParameters(format!(
                "confidence_level must be in (0, 1), got {}",
                p.confidence_level
            )));
        }
        let c = &p.atmospheric_conditions;
        for (name, value) in [
            ("temperature_c", c.temperature_c),
            ("pressure_hpa", c.pressure_hpa),
            ("humidity_percent", c.humidity_percent),
        ] {
            if !value.is_finite() {
                return Err(LevelnetError::InvalidParameters(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        Ok(self.params)
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LevelnetError::InvalidParameters(format!(
            "{name} must be finite and strictly positive, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test_params {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = LevelingParams::default();
        assert_eq!(params.target_precision_mm, 2.0);
        assert_eq!(params.instrumental_error_mm, 1.0);
        assert_eq!(params.kilometric_error_mm, 1.0);
        assert_eq!(params.confidence_level, 0.95);
        assert!(params.apply_atmospheric_corrections);
    }

    #[test]
    fn test_builder_validation() {
        assert!(LevelingParams::builder()
            .target_precision_mm(f64::NAN)
            .build()
            .is_err());
        assert!(LevelingParams::builder()
            .instrumental_error_mm(0.0)
            .build()
            .is_err());
        assert!(LevelingParams::builder()
            .confidence_level(1.0)
            .build()
            .is_err());
        assert!(LevelingParams::builder()
            .kilometric_error_mm(-0.1)
            .build()
            .is_err());

        let params = LevelingParams::builder()
            .target_precision_mm(1.0)
            .confidence_level(0.99)
            .apply_atmospheric_corrections(false)
            .build()
            .unwrap();
        assert_eq!(params.target_precision_mm, 1.0);
        assert_eq!(params.confidence_level, 0.99);
        assert!(!params.apply_atmospheric_corrections);
    }

    #[test]
    fn test_display_alternate() {
        let rendered = format!("{:#}", LevelingParams::default());
        assert!(rendered.contains("target precision: 2 mm"));
        assert!(rendered.contains("atmospheric corrections: on"));
    }
}
