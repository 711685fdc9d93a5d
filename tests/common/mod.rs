use levelnet::records::LevelingRecord;
use levelnet::LevelingParams;

/// Parameters with the atmospheric pass disabled, so synthetic traverses
/// with exact readings stay exact.
pub fn raw_params() -> LevelingParams {
    LevelingParams::builder()
        .apply_atmospheric_corrections(false)
        .build()
        .unwrap()
}

fn with_distance(mut record: LevelingRecord, distance_m: f64) -> LevelingRecord {
    record.distances_m.push(distance_m);
    record.distances_m.push(distance_m);
    record
}

/// Closed loop R1 -> P1 -> P2 -> P3 -> R1 over four 100 m segments with
/// consistent readings on both channels. Deltas: +0.200, -0.050, -0.050,
/// -0.100 m, summing to zero.
pub fn closed_loop() -> Vec<LevelingRecord> {
    vec![
        with_distance(LevelingRecord::with_paired_readings("R1", 1.600, 1.400), 100.0),
        with_distance(LevelingRecord::with_paired_readings("P1", 1.500, 1.400), 100.0),
        with_distance(LevelingRecord::with_paired_readings("P2", 1.450, 1.550), 100.0),
        with_distance(LevelingRecord::with_paired_readings("P3", 1.300, 1.500), 100.0),
        with_distance(LevelingRecord::with_paired_readings("R1", 1.000, 1.400), 100.0),
    ]
}

/// Same loop with 4 mm added to the terminal foresight of both channels,
/// so the loop misses closure by exactly -4 mm.
pub fn misclosed_loop() -> Vec<LevelingRecord> {
    let mut records = closed_loop();
    let last = records.last_mut().unwrap();
    last.foresight_m = [Some(1.404), Some(1.404)];
    records
}

/// Open traverse R1 -> P1 -> P2 with 100 m segments and consistent
/// readings; terminal elevation 100.150 m from a 100.000 m reference.
pub fn open_traverse() -> Vec<LevelingRecord> {
    vec![
        with_distance(LevelingRecord::with_paired_readings("R1", 1.600, 1.000), 100.0),
        with_distance(LevelingRecord::with_paired_readings("P1", 1.450, 1.400), 100.0),
        with_distance(LevelingRecord::with_paired_readings("P2", 1.000, 1.500), 100.0),
    ]
}
