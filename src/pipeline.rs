//! Pipeline orchestrators.
//!
//! [`CalculationPipeline`] runs the preliminary computation: height
//! differences, optional atmospheric pass, elevation propagation and closure
//! analysis. [`CompensationPipeline`] consumes those results and runs the
//! least-squares adjustment with its statistical validation. Both are
//! deterministic, synchronous functions of their inputs; hosts may run
//! independent pipelines concurrently as long as each gets its own
//! parameters.

use std::collections::HashMap;

use hifitime::Epoch;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::adjustment::{
    BlunderReport, CompensationStatistics, LeastSquaresSolver, MatrixBuilder, SolverMethod,
    StatisticalAnalyzer,
};
use crate::altitude::{round_tenth_mm, AltitudeCalculation, AltitudeCalculator};
use crate::atmosphere::refraction::{AtmosphericCorrector, CorrectionSummary, RefractionCorrection};
use crate::atmosphere::AtmosphericConditions;
use crate::closure::{ClosureAnalysis, ClosureCalculator};
use crate::constants::{
    DEFAULT_SEGMENT_DISTANCE_M, LONG_SIGHT_WARNING_M, LONG_TRAVERSE_WARNING_KM,
    SHORT_SIGHT_WARNING_M,
};
use crate::diagnostics::{push_info, push_warning, Diagnostic};
use crate::height_difference::{ControlStatistics, HeightDifference, HeightDifferenceCalculator};
use crate::levelnet_errors::Result;
use crate::params::LevelingParams;
use crate::records::LevelingRecord;

/// Metadata attached to the preliminary calculation results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationMetadata {
    pub timestamp: Option<Epoch>,
    pub point_count: usize,
    /// Individual channel observations, summed over the segments.
    pub observation_count: usize,
    pub atmospheric_corrections_applied: bool,
    pub atmospheric_conditions: Option<AtmosphericConditions>,
    pub target_precision_mm: f64,
}

/// Aggregate produced by the calculation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResults {
    pub height_differences: Vec<HeightDifference>,
    pub altitudes: Vec<AltitudeCalculation>,
    pub closure: ClosureAnalysis,
    pub control_statistics: ControlStatistics,
    /// Per-segment mean sighting distances, `None` when no distance field
    /// covered the segment.
    pub segment_distances_m: Vec<Option<f64>>,
    pub total_distance_km: f64,
    /// Corrections of the atmospheric pass, empty when disabled.
    pub atmospheric_corrections: Vec<RefractionCorrection>,
    pub diagnostics: Vec<Diagnostic>,
    pub metadata: CalculationMetadata,
}

/// Preliminary computation: differences, atmospheric pass, propagation,
/// closure.
#[derive(Debug, Clone)]
pub struct CalculationPipeline {
    params: LevelingParams,
}

impl CalculationPipeline {
    pub fn new(params: LevelingParams) -> Self {
        CalculationPipeline { params }
    }

    pub fn params(&self) -> &LevelingParams {
        &self.params
    }

    /// Run the full preliminary computation over a record set.
    ///
    /// `known_final_altitude_m` marks an open traverse checked against a
    /// known terminal elevation.
    pub fn run(
        &self,
        records: &[LevelingRecord],
        initial_altitude_m: f64,
        known_final_altitude_m: Option<f64>,
    ) -> Result<CalculationResults> {
        let mut diagnostics = Vec::new();

        let mut height_differences =
            HeightDifferenceCalculator::new().compute(records, &mut diagnostics)?;
        let segment_distances_m = segment_distances(records);
        self.screen_distances(&segment_distances_m, &mut diagnostics);

        let atmospheric_corrections = if self.params.apply_atmospheric_corrections {
            self.apply_atmospheric_pass(
                &mut height_differences,
                &segment_distances_m,
                &mut diagnostics,
            )?
        } else {
            log::debug!("atmospheric corrections disabled");
            Vec::new()
        };

        let point_ids: Vec<String> = records.iter().map(|r| r.point_id.clone()).collect();
        let altitudes = AltitudeCalculator::new().compute(
            initial_altitude_m,
            &height_differences,
            &point_ids,
        )?;

        let total_distance_km = segment_distances_m
            .iter()
            .map(|d| d.unwrap_or(DEFAULT_SEGMENT_DISTANCE_M))
            .sum::<f64>()
            / 1000.0;
        if total_distance_km > LONG_TRAVERSE_WARNING_KM {
            push_warning(
                &mut diagnostics,
                "closure",
                format!("very long traverse: {total_distance_km:.1} km"),
            );
        }

        let closure = ClosureCalculator::new().analyze(
            &altitudes,
            total_distance_km,
            known_final_altitude_m,
        )?;
        if !closure.is_acceptable {
            // the adjustment is expected to absorb the overrun, so this is a
            // warning rather than a failure
            push_warning(
                &mut diagnostics,
                "closure",
                format!(
                    "closure error {:.2} mm exceeds the {:.2} mm tolerance",
                    closure.closure_error_mm, closure.tolerance_mm
                ),
            );
        }

        let control_statistics =
            HeightDifferenceCalculator::control_statistics(&height_differences);
        let observation_count = height_differences
            .iter()
            .map(|d| d.channels.len())
            .sum::<usize>();

        Ok(CalculationResults {
            height_differences,
            altitudes,
            closure,
            control_statistics,
            segment_distances_m,
            total_distance_km,
            atmospheric_corrections,
            diagnostics,
            metadata: CalculationMetadata {
                timestamp: Epoch::now().ok(),
                point_count: records.len(),
                observation_count,
                atmospheric_corrections_applied: self.params.apply_atmospheric_corrections,
                atmospheric_conditions: self
                    .params
                    .apply_atmospheric_corrections
                    .then_some(self.params.atmospheric_conditions),
                target_precision_mm: self.params.target_precision_mm,
            },
        })
    }

    /// Correct every segment (average and channel values alike) for
    /// curvature, refraction and the level-apparent term.
    fn apply_atmospheric_pass(
        &self,
        height_differences: &mut [HeightDifference],
        segment_distances_m: &[Option<f64>],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<RefractionCorrection>> {
        let corrector = AtmosphericCorrector::new();
        let conditions = &self.params.atmospheric_conditions;
        let mut corrections = Vec::with_capacity(height_differences.len());

        for (difference, distance) in height_differences.iter_mut().zip(segment_distances_m) {
            let distance_m = distance.unwrap_or(DEFAULT_SEGMENT_DISTANCE_M);
            let correction = corrector.correct(distance_m, difference.delta_h_m, conditions)?;
            difference.apply_correction_m(correction.applied_correction_m());
            corrections.push(correction);
        }

        if let Some(summary) = CorrectionSummary::from_corrections(&corrections) {
            push_info(
                diagnostics,
                "atmospheric corrections",
                format!(
                    "{} segments corrected, mean {:.2} mm, total {:.2} mm",
                    summary.count, summary.mean_mm, summary.total_mm
                ),
            );
        }
        Ok(corrections)
    }

    fn screen_distances(
        &self,
        segment_distances_m: &[Option<f64>],
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for (segment, distance) in segment_distances_m.iter().enumerate() {
            let Some(distance_m) = distance else { continue };
            if *distance_m < SHORT_SIGHT_WARNING_M {
                push_warning(
                    diagnostics,
                    "distance screening",
                    format!("segment {}: sight of {distance_m} m is implausibly short", segment + 1),
                );
            } else if *distance_m > LONG_SIGHT_WARNING_M {
                push_warning(
                    diagnostics,
                    "distance screening",
                    format!("segment {}: sight of {distance_m} m is unusually long", segment + 1),
                );
            }
        }
    }
}

/// Mean sighting distance of each segment, taken from the arrival record's
/// distance readings with the departure record as fallback.
fn segment_distances(records: &[LevelingRecord]) -> Vec<Option<f64>> {
    records
        .windows(2)
        .map(|pair| {
            pair[1]
                .sighting_distance_m()
                .or_else(|| pair[0].sighting_distance_m())
        })
        .collect()
}

/// Verdict against the configured millimeter target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    /// True iff both the maximum correction and the a-posteriori sigma fall
    /// under the target precision.
    pub precision_met: bool,
    pub max_correction_mm: f64,
    pub sigma_0_mm: f64,
    /// `max(σ₀, largest point standard deviation)` in millimeters.
    pub estimated_precision_mm: f64,
    pub chi2_passed: bool,
    pub blunder_count: usize,
    pub target_precision_mm: f64,
}

/// Metadata attached to the compensation results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationMetadata {
    pub timestamp: Option<Epoch>,
    pub observation_count: usize,
    pub unknown_count: usize,
    pub condition_number: f64,
    pub max_correction_mm: f64,
}

/// Aggregate produced by the compensation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationResults {
    /// Estimated point corrections in meters, one per unknown.
    pub corrections_m: DVector<f64>,
    /// Identifiers of the unknown points, aligned with `corrections_m`.
    pub unknown_ids: Vec<String>,
    pub adjusted_altitudes: Vec<AltitudeCalculation>,
    /// Observation residuals in millimeters.
    pub residuals_mm: DVector<f64>,
    /// Cofactor matrix of the unknowns, in mm².
    pub covariance_mm2: DMatrix<f64>,
    pub statistics: CompensationStatistics,
    pub solver_method: SolverMethod,
    pub blunder_report: BlunderReport,
    pub verdict: QualityVerdict,
    pub diagnostics: Vec<Diagnostic>,
    pub metadata: CompensationMetadata,
}

/// Least-squares adjustment: matrix assembly, solve, statistics, verdict.
#[derive(Debug, Clone)]
pub struct CompensationPipeline {
    params: LevelingParams,
}

impl CompensationPipeline {
    pub fn new(params: LevelingParams) -> Self {
        CompensationPipeline { params }
    }

    pub fn params(&self) -> &LevelingParams {
        &self.params
    }

    pub fn run(&self, calculation: &CalculationResults) -> Result<CompensationResults> {
        let mut diagnostics = Vec::new();

        let system = MatrixBuilder::new(
            self.params.instrumental_error_mm,
            self.params.kilometric_error_mm,
        )
        .build(
            &calculation.height_differences,
            &calculation.altitudes,
            &calculation.segment_distances_m,
            &mut diagnostics,
        )?;

        let solution = LeastSquaresSolver::new().solve(&system, &mut diagnostics)?;
        let analysis =
            StatisticalAnalyzer::new(self.params.confidence_level).analyze(&system, &solution)?;

        if !analysis.statistics.chi2_passed {
            push_warning(
                &mut diagnostics,
                "statistical analysis",
                format!(
                    "chi-square test rejected the stochastic model: {:.2} > {:.2}",
                    analysis.statistics.chi2_statistic, analysis.statistics.chi2_critical_value
                ),
            );
        }
        if analysis.blunder_report.blunders_detected() {
            push_warning(
                &mut diagnostics,
                "statistical analysis",
                format!(
                    "{} observation(s) flagged as blunder suspects",
                    analysis.blunder_report.suspects.len()
                ),
            );
        }

        let adjusted_altitudes =
            adjusted_altitudes(&calculation.altitudes, &system.unknown_ids, &solution.corrections);

        let max_correction_mm = solution.corrections.amax();
        let sigma_0_mm = analysis.statistics.sigma_0_mm;
        let max_point_std_mm = solution
            .covariance
            .diagonal()
            .iter()
            .map(|q| q.max(0.0).sqrt())
            .fold(0.0, f64::max);
        let verdict = QualityVerdict {
            precision_met: max_correction_mm <= self.params.target_precision_mm
                && sigma_0_mm <= self.params.target_precision_mm,
            max_correction_mm,
            sigma_0_mm,
            estimated_precision_mm: sigma_0_mm.max(max_point_std_mm),
            chi2_passed: analysis.statistics.chi2_passed,
            blunder_count: analysis.blunder_report.suspects.len(),
            target_precision_mm: self.params.target_precision_mm,
        };

        Ok(CompensationResults {
            corrections_m: &solution.corrections / 1000.0,
            unknown_ids: system.unknown_ids.clone(),
            adjusted_altitudes,
            residuals_mm: analysis.residuals,
            covariance_mm2: solution.covariance.clone(),
            statistics: analysis.statistics,
            solver_method: solution.method,
            blunder_report: analysis.blunder_report,
            verdict,
            diagnostics,
            metadata: CompensationMetadata {
                timestamp: Epoch::now().ok(),
                observation_count: system.observation_count(),
                unknown_count: system.unknown_count(),
                condition_number: solution.condition_number,
                max_correction_mm,
            },
        })
    }
}

/// Apply the estimated corrections: every occurrence of the reference point
/// keeps the reference elevation (the terminal of a closed loop included),
/// every other point moves by its correction, rounded to a tenth of a
/// millimeter.
fn adjusted_altitudes(
    altitudes: &[AltitudeCalculation],
    unknown_ids: &[String],
    corrections_mm: &DVector<f64>,
) -> Vec<AltitudeCalculation> {
    let column_of: HashMap<&str, usize> = unknown_ids
        .iter()
        .enumerate()
        .map(|(column, id)| (id.as_str(), column))
        .collect();
    let reference_altitude_m = altitudes.first().map(|a| a.altitude_m).unwrap_or(0.0);

    altitudes
        .iter()
        .map(|altitude| match column_of.get(altitude.point_id.as_str()) {
            Some(&column) => AltitudeCalculation {
                point_id: altitude.point_id.clone(),
                altitude_m: round_tenth_mm(altitude.altitude_m + corrections_mm[column] / 1000.0),
                cumulative_delta_h_m: altitude.cumulative_delta_h_m,
                is_reference: false,
            },
            None => AltitudeCalculation {
                point_id: altitude.point_id.clone(),
                altitude_m: reference_altitude_m,
                cumulative_delta_h_m: altitude.cumulative_delta_h_m,
                is_reference: true,
            },
        })
        .collect()
}
