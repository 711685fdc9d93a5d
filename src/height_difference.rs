//! Elevation differences between consecutive points.
//!
//! The fundamental observation of geometric leveling is
//! `Δh = backsight(previous) - foresight(current)`, measured once per
//! instrument channel. The two channel values of a segment are averaged into
//! one [`HeightDifference`] and their disagreement feeds the
//! inter-instrument control check.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::constants::{
    CONTROL_GOOD_MM, CONTROL_TOLERANCE_MM, READING_FATAL_LIMIT_M, READING_WARNING_LIMIT_M,
};
use crate::diagnostics::{push_warning, Diagnostic};
use crate::levelnet_errors::{LevelnetError, Result};
use crate::records::{LevelingRecord, CHANNEL_COUNT};

const STAGE: &str = "height differences";

/// One channel's contribution to a segment.
///
/// Units: meters throughout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelDelta {
    /// Instrument channel index, 0 or 1.
    pub channel: usize,
    pub backsight_m: f64,
    pub foresight_m: f64,
    pub delta_h_m: f64,
}

/// Averaged elevation difference of one traverse segment.
///
/// `control_residual_m` is half the difference between the two channel
/// values; it is `None` when only one channel produced a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightDifference {
    pub delta_h_m: f64,
    pub channels: SmallVec<[ChannelDelta; CHANNEL_COUNT]>,
    pub is_valid: bool,
    pub control_residual_m: Option<f64>,
}

impl HeightDifference {
    /// Shift the averaged value and every channel value by the same
    /// correction (used when the atmospheric pass is applied).
    pub(crate) fn apply_correction_m(&mut self, correction_m: f64) {
        self.delta_h_m += correction_m;
        for channel in &mut self.channels {
            channel.delta_h_m += correction_m;
        }
    }
}

/// Grade of the inter-instrument control over a whole traverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlQuality {
    Good,
    Warning,
}

impl fmt::Display for ControlQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlQuality::Good => write!(f, "good"),
            ControlQuality::Warning => write!(f, "warning"),
        }
    }
}

/// Aggregate of the inter-channel control residuals.
///
/// All residual fields are in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlStatistics {
    pub residual_count: usize,
    pub max_residual_mm: f64,
    pub mean_residual_mm: f64,
    pub std_dev_mm: f64,
    pub segments_exceeding_tolerance: usize,
    pub quality: ControlQuality,
}

impl ControlStatistics {
    pub fn empty() -> Self {
        ControlStatistics {
            residual_count: 0,
            max_residual_mm: 0.0,
            mean_residual_mm: 0.0,
            std_dev_mm: 0.0,
            segments_exceeding_tolerance: 0,
            quality: ControlQuality::Good,
        }
    }
}

/// Turns the raw record set into averaged per-segment height differences.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeightDifferenceCalculator;

impl HeightDifferenceCalculator {
    pub fn new() -> Self {
        HeightDifferenceCalculator
    }

    /// Compute the N-1 averaged height differences of an N-record traverse.
    ///
    /// A missing reading drops that channel from the segment's average only;
    /// a segment with no valid channel at all is fatal. Channel disagreements
    /// above the 5 mm control tolerance are recorded as warnings, never
    /// raised.
    pub fn compute(
        &self,
        records: &[LevelingRecord],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<HeightDifference>> {
        if records.len() < 2 {
            return Err(LevelnetError::DataValidation(format!(
                "at least 2 records are required to form a segment, got {}",
                records.len()
            )));
        }
        self.check_channels_present(records)?;

        let mut differences = Vec::with_capacity(records.len() - 1);

        for (segment_index, (previous, current)) in records.iter().tuple_windows().enumerate() {
            let mut channels: SmallVec<[ChannelDelta; CHANNEL_COUNT]> = SmallVec::new();

            for channel in 0..CHANNEL_COUNT {
                let (Some(backsight), Some(foresight)) =
                    (previous.backsight_m[channel], current.foresight_m[channel])
                else {
                    continue;
                };
                self.validate_reading(backsight, segment_index, diagnostics)?;
                self.validate_reading(foresight, segment_index, diagnostics)?;
                channels.push(ChannelDelta {
                    channel,
                    backsight_m: backsight,
                    foresight_m: foresight,
                    delta_h_m: backsight - foresight,
                });
            }

            if channels.is_empty() {
                return Err(LevelnetError::calculation(
                    STAGE,
                    format!(
                        "no valid channel reading for segment {} ({} -> {})",
                        segment_index + 1,
                        previous.point_id,
                        current.point_id
                    ),
                ));
            }

            let mean =
                channels.iter().map(|c| c.delta_h_m).sum::<f64>() / channels.len() as f64;

            let control_residual_m = if channels.len() == CHANNEL_COUNT {
                let spread_m = channels[0].delta_h_m - channels[1].delta_h_m;
                if spread_m.abs() * 1000.0 > CONTROL_TOLERANCE_MM {
                    push_warning(
                        diagnostics,
                        STAGE,
                        format!(
                            "segment {} ({} -> {}): channel disagreement {:.1} mm exceeds {:.1} mm",
                            segment_index + 1,
                            previous.point_id,
                            current.point_id,
                            spread_m.abs() * 1000.0,
                            CONTROL_TOLERANCE_MM
                        ),
                    );
                }
                Some(spread_m / 2.0)
            } else {
                push_warning(
                    diagnostics,
                    STAGE,
                    format!(
                        "segment {}: single channel only, no inter-instrument control",
                        segment_index + 1
                    ),
                );
                None
            };

            differences.push(HeightDifference {
                delta_h_m: mean,
                channels,
                is_valid: true,
                control_residual_m,
            });
        }

        Ok(differences)
    }

    /// Aggregate the control residuals of a computed traverse.
    pub fn control_statistics(differences: &[HeightDifference]) -> ControlStatistics {
        let residuals_mm: Vec<f64> = differences
            .iter()
            .filter_map(|d| d.control_residual_m)
            .map(|r| r * 1000.0)
            .collect();

        if residuals_mm.is_empty() {
            return ControlStatistics::empty();
        }

        let count = residuals_mm.len();
        let max_abs = residuals_mm.iter().map(|r| r.abs()).fold(0.0, f64::max);
        let mean_abs = residuals_mm.iter().map(|r| r.abs()).sum::<f64>() / count as f64;
        let mean = residuals_mm.iter().sum::<f64>() / count as f64;
        let variance =
            residuals_mm.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / count as f64;
        let exceeding = residuals_mm
            .iter()
            .filter(|r| r.abs() > CONTROL_TOLERANCE_MM)
            .count();

        ControlStatistics {
            residual_count: count,
            max_residual_mm: max_abs,
            mean_residual_mm: mean_abs,
            std_dev_mm: variance.sqrt(),
            segments_exceeding_tolerance: exceeding,
            quality: if max_abs <= CONTROL_GOOD_MM {
                ControlQuality::Good
            } else {
                ControlQuality::Warning
            },
        }
    }

    /// The cross-check is derived for exactly two channels; a channel with no
    /// reading anywhere in the record set is a configuration error.
    fn check_channels_present(&self, records: &[LevelingRecord]) -> Result<()> {
        for channel in 0..CHANNEL_COUNT {
            let seen = records.iter().any(|r| {
                r.backsight_m[channel].is_some() || r.foresight_m[channel].is_some()
            });
            if !seen {
                return Err(LevelnetError::DataValidation(format!(
                    "instrument channel {} carries no reading; the inter-instrument \
                     cross-check requires exactly {} channels",
                    channel + 1,
                    CHANNEL_COUNT
                )));
            }
        }
        Ok(())
    }

    fn validate_reading(
        &self,
        reading_m: f64,
        segment_index: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<()> {
        if !reading_m.is_finite() || reading_m.abs() > READING_FATAL_LIMIT_M {
            return Err(LevelnetError::calculation(
                STAGE,
                format!(
                    "rod reading {reading_m} m at segment {} is outside the \
                     physical bound of +/-{READING_FATAL_LIMIT_M} m",
                    segment_index + 1
                ),
            ));
        }
        if reading_m.abs() > READING_WARNING_LIMIT_M {
            push_warning(
                diagnostics,
                STAGE,
                format!(
                    "rod reading {reading_m} m at segment {} is unusually large",
                    segment_index + 1
                ),
            );
        }
        Ok(())
    }
}
