//! # Constants and shared thresholds for Levelnet
//!
//! This module centralizes the **geodetic constants** and **quality
//! thresholds** used throughout the `levelnet` library.
//!
//! ## Overview
//!
//! - Physical constants for the curvature/refraction model
//! - Tolerances for traverse closure and inter-instrument control
//! - Sanity bounds on rod readings, sighting distances and corrections
//! - Conditioning thresholds steering the least-squares solver dispatch
//!
//! These definitions are used by all main modules, including the height
//! difference computation, the atmospheric corrector and the adjustment.

// -------------------------------------------------------------------------------------------------
// Geodetic constants
// -------------------------------------------------------------------------------------------------

/// Mean Earth radius in meters, used by the curvature and refraction terms
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Standard atmospheric refraction coefficient (temperate conditions)
pub const STANDARD_REFRACTION_COEFFICIENT: f64 = 0.13;

/// Lower clamp of the adjusted refraction coefficient
pub const REFRACTION_COEFFICIENT_MIN: f64 = 0.05;

/// Upper clamp of the adjusted refraction coefficient
pub const REFRACTION_COEFFICIENT_MAX: f64 = 0.25;

// -------------------------------------------------------------------------------------------------
// Tolerances and sanity bounds
// -------------------------------------------------------------------------------------------------

/// Closure tolerance coefficient: T = 4·√K millimeters for K kilometers
pub const CLOSURE_TOLERANCE_COEFFICIENT_MM: f64 = 4.0;

/// Maximum allowed disagreement between the two instrument channels (mm)
pub const CONTROL_TOLERANCE_MM: f64 = 5.0;

/// Control residual bound below which the traverse control is graded good (mm)
pub const CONTROL_GOOD_MM: f64 = 3.0;

/// Rod reading magnitude above which a soft warning is emitted (m)
pub const READING_WARNING_LIMIT_M: f64 = 50.0;

/// Rod reading magnitude above which the computation aborts (m)
pub const READING_FATAL_LIMIT_M: f64 = 100.0;

/// Fallback sighting distance used by the weight model (m)
pub const DEFAULT_WEIGHT_DISTANCE_M: f64 = 10.0;

/// Fallback per-segment distance used by the atmospheric corrector and the
/// total-distance estimate when no distance field exists (m)
pub const DEFAULT_SEGMENT_DISTANCE_M: f64 = 100.0;

/// Shortest sight considered plausible before warning (m)
pub const SHORT_SIGHT_WARNING_M: f64 = 1.0;

/// Longest sight considered plausible before warning (m)
pub const LONG_SIGHT_WARNING_M: f64 = 300.0;

/// Traverse length above which a warning is emitted (km)
pub const LONG_TRAVERSE_WARNING_KM: f64 = 50.0;

/// Traverse length above which the input is rejected (km)
pub const MAX_TRAVERSE_LENGTH_KM: f64 = 1_000.0;

// -------------------------------------------------------------------------------------------------
// Solver dispatch and correction screening
// -------------------------------------------------------------------------------------------------

/// Design-matrix condition number above which the SVD pseudo-inverse is used
pub const ILL_CONDITIONED_DESIGN: f64 = 1e12;

/// Normal-matrix condition number above which ridge regularization kicks in
pub const ILL_CONDITIONED_NORMAL: f64 = 1e10;

/// Ridge regularization scale, applied as `trace(N) · RIDGE_SCALE`
pub const RIDGE_SCALE: f64 = 1e-12;

/// Relative singular-value threshold of the SVD pseudo-inverse
pub const SVD_RANK_TOLERANCE: f64 = 1e-10;

/// Unknown count above which the QR path is preferred over normal equations
pub const LARGE_SYSTEM_UNKNOWNS: usize = 500;

/// Correction magnitude treated as a fatal precision breach (mm)
pub const FATAL_CORRECTION_MM: f64 = 10_000.0;

/// Correction magnitude flagged as a likely upstream reference/unit error (mm)
pub const SUSPICIOUS_CORRECTION_MM: f64 = 1_000.0;

/// Correction magnitude worth an informational diagnostic (mm)
pub const NOTABLE_CORRECTION_MM: f64 = 100.0;
