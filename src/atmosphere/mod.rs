//! Atmospheric model for refraction and Earth-curvature corrections.
//!
//! The refraction coefficient applied to a sighting depends on the ambient
//! conditions at measurement time. [`AtmosphericConditions`] is the immutable
//! snapshot consumed by the [`refraction::AtmosphericCorrector`];
//! [`ClimatePreset`] provides named constructors for common deployments.

pub mod refraction;

use std::fmt;
use std::str::FromStr;

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::levelnet_errors::LevelnetError;

/// Environmental snapshot used to derive the refraction coefficient.
///
/// Units:
/// * `temperature_c`: degrees Celsius
/// * `pressure_hpa`: hectopascals
/// * `humidity_percent`: relative humidity, 0–100
/// * `measured_at`: optional measurement epoch; drives the thermal-gradient
///   term of the refraction model when present
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericConditions {
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub humidity_percent: f64,
    pub measured_at: Option<Epoch>,
}

impl Default for AtmosphericConditions {
    fn default() -> Self {
        AtmosphericConditions {
            temperature_c: 15.0,
            pressure_hpa: 1013.25,
            humidity_percent: 60.0,
            measured_at: None,
        }
    }
}

impl AtmosphericConditions {
    pub fn new(temperature_c: f64, pressure_hpa: f64, humidity_percent: f64) -> Self {
        AtmosphericConditions {
            temperature_c,
            pressure_hpa,
            humidity_percent,
            measured_at: None,
        }
    }

    pub fn with_measurement_epoch(mut self, epoch: Epoch) -> Self {
        self.measured_at = Some(epoch);
        self
    }

    /// UTC hour of the measurement, if an epoch was supplied.
    pub(crate) fn measurement_hour(&self) -> Option<u8> {
        self.measured_at.map(|epoch| {
            let (_, _, _, hour, _, _, _) = epoch.to_gregorian_utc();
            hour
        })
    }
}

/// Named atmospheric condition sets for common deployment climates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClimatePreset {
    /// 15.0 °C, 1013.25 hPa, 60 % — the model reference point.
    Standard,
    /// Temperate mid-latitude conditions (15.0 °C, 1013.25 hPa, 65 %).
    TemperateFrance,
    /// Hot dry-season conditions (28.0 °C, 1010.0 hPa, 45 %).
    Sahel,
}

impl ClimatePreset {
    pub fn conditions(&self) -> AtmosphericConditions {
        match self {
            ClimatePreset::Standard => AtmosphericConditions::default(),
            ClimatePreset::TemperateFrance => AtmosphericConditions::new(15.0, 1013.25, 65.0),
            ClimatePreset::Sahel => AtmosphericConditions::new(28.0, 1010.0, 45.0),
        }
    }
}

impl fmt::Display for ClimatePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClimatePreset::Standard => write!(f, "standard"),
            ClimatePreset::TemperateFrance => write!(f, "temperate_france"),
            ClimatePreset::Sahel => write!(f, "sahel"),
        }
    }
}

impl FromStr for ClimatePreset {
    type Err = LevelnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(ClimatePreset::Standard),
            "temperate_france" | "france" => Ok(ClimatePreset::TemperateFrance),
            "sahel" => Ok(ClimatePreset::Sahel),
            other => Err(LevelnetError::InvalidParameters(format!(
                "unknown climate preset: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod test_conditions {
    use super::*;

    #[test]
    fn test_default_is_model_reference() {
        let c = AtmosphericConditions::default();
        assert_eq!(c.temperature_c, 15.0);
        assert_eq!(c.pressure_hpa, 1013.25);
        assert_eq!(c.humidity_percent, 60.0);
        assert!(c.measured_at.is_none());
    }

    #[test]
    fn test_preset_round_trip() {
        for preset in [
            ClimatePreset::Standard,
            ClimatePreset::TemperateFrance,
            ClimatePreset::Sahel,
        ] {
            let parsed: ClimatePreset = preset.to_string().parse().unwrap();
            assert_eq!(parsed, preset);
        }
        assert!("mars".parse::<ClimatePreset>().is_err());
    }

    #[test]
    fn test_measurement_hour() {
        let noon = Epoch::from_gregorian_utc(2026, 6, 15, 12, 30, 0, 0);
        let c = AtmosphericConditions::default().with_measurement_epoch(noon);
        assert_eq!(c.measurement_hour(), Some(12));
        assert_eq!(AtmosphericConditions::default().measurement_hour(), None);
    }
}
