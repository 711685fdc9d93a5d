//! Precise elevation computation for geometric leveling traverses.
//!
//! The crate takes raw backsight/foresight rod readings measured with two
//! redundant instrument channels, propagates elevations along the traverse,
//! checks the closure against a distance-scaled tolerance and redistributes
//! the residual misclosure by weighted least-squares adjustment. The adjusted
//! elevations come with a full statistical validation (a-posteriori variance,
//! chi-square model test, studentized blunder screening) against a
//! millimeter-level precision target.
//!
//! Entry points are [`pipeline::CalculationPipeline`] for the preliminary
//! computation and [`pipeline::CompensationPipeline`] for the least-squares
//! adjustment. Both are configured with a [`params::LevelingParams`] value.

pub mod adjustment;
pub mod altitude;
pub mod atmosphere;
pub mod closure;
pub mod constants;
pub mod diagnostics;
pub mod height_difference;
pub mod levelnet_errors;
pub mod params;
pub mod pipeline;
pub mod records;
pub mod weights;

pub use levelnet_errors::{LevelnetError, Result};
pub use params::{LevelingParams, LevelingParamsBuilder};
pub use pipeline::{CalculationPipeline, CompensationPipeline};
pub use records::LevelingRecord;
