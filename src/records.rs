//! Input contract of the leveling core.
//!
//! An external importer (out of scope here) supplies one [`LevelingRecord`]
//! per surveyed point: a point identifier, the backsight/foresight readings
//! of the two instrument channels and zero or more sighting distances.
//! Records with a missing identifier are expected to be dropped before
//! reaching the core.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Number of redundant instrument channels the cross-check is derived for.
pub const CHANNEL_COUNT: usize = 2;

/// One surveyed point with its raw rod readings.
///
/// Units:
/// * `backsight_m`, `foresight_m`: meters, one slot per instrument channel
/// * `distances_m`: sighting distances in meters, typically one per channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelingRecord {
    pub point_id: String,
    pub backsight_m: [Option<f64>; CHANNEL_COUNT],
    pub foresight_m: [Option<f64>; CHANNEL_COUNT],
    pub distances_m: SmallVec<[f64; CHANNEL_COUNT]>,
}

impl LevelingRecord {
    pub fn new(point_id: impl Into<String>) -> Self {
        LevelingRecord {
            point_id: point_id.into(),
            backsight_m: [None; CHANNEL_COUNT],
            foresight_m: [None; CHANNEL_COUNT],
            distances_m: SmallVec::new(),
        }
    }

    /// Record with identical readings on both channels, the common case when
    /// building synthetic traverses.
    pub fn with_paired_readings(
        point_id: impl Into<String>,
        backsight_m: f64,
        foresight_m: f64,
    ) -> Self {
        LevelingRecord {
            point_id: point_id.into(),
            backsight_m: [Some(backsight_m); CHANNEL_COUNT],
            foresight_m: [Some(foresight_m); CHANNEL_COUNT],
            distances_m: SmallVec::new(),
        }
    }

    pub fn backsight(mut self, channel: usize, reading_m: f64) -> Self {
        self.backsight_m[channel] = Some(reading_m);
        self
    }

    pub fn foresight(mut self, channel: usize, reading_m: f64) -> Self {
        self.foresight_m[channel] = Some(reading_m);
        self
    }

    pub fn distance(mut self, distance_m: f64) -> Self {
        self.distances_m.push(distance_m);
        self
    }

    /// Mean of the distance readings carried by this record, if any.
    pub fn sighting_distance_m(&self) -> Option<f64> {
        if self.distances_m.is_empty() {
            None
        } else {
            Some(self.distances_m.iter().sum::<f64>() / self.distances_m.len() as f64)
        }
    }
}

#[cfg(test)]
mod test_records {
    use super::*;

    #[test]
    fn test_sighting_distance_is_channel_mean() {
        let record = LevelingRecord::new("P1").distance(90.0).distance(110.0);
        assert_eq!(record.sighting_distance_m(), Some(100.0));
        assert_eq!(LevelingRecord::new("P2").sighting_distance_m(), None);
    }

    #[test]
    fn test_builder_fills_channels() {
        let record = LevelingRecord::new("P1")
            .backsight(0, 1.5)
            .backsight(1, 1.501)
            .foresight(0, 1.2);
        assert_eq!(record.backsight_m, [Some(1.5), Some(1.501)]);
        assert_eq!(record.foresight_m, [Some(1.2), None]);
    }
}
