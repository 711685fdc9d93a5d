//! Weighted least-squares adjustment of a leveling traverse.
//!
//! The linear system is assembled in millimeters so that `vᵀPv` is a proper
//! chi-square statistic under the mm²-based weight model: the misclosure
//! vector is scaled by 1000 and the weights are inverse variances in 1/mm².
//! Corrections therefore come out of the solver in millimeters; the public
//! result converts them to meters.

pub mod matrix_builder;
pub mod solver;
pub mod statistics;

pub use matrix_builder::{MatrixBuilder, MatrixSystem};
pub use solver::{classify_system, LeastSquaresSolver, Solution, SolverMethod};
pub use statistics::{
    BlunderReport, BlunderSuspect, CompensationStatistics, StatisticalAnalyzer,
};
