mod common;

use approx::assert_relative_eq;
use levelnet::closure::TraverseType;
use levelnet::diagnostics::Severity;
use levelnet::height_difference::ControlQuality;
use levelnet::CalculationPipeline;
use levelnet::LevelingParams;

use common::{closed_loop, misclosed_loop, open_traverse, raw_params};

#[test]
fn closed_loop_with_exact_readings_closes_to_zero() {
    let results = CalculationPipeline::new(raw_params())
        .run(&closed_loop(), 100.0, None)
        .unwrap();

    assert_eq!(results.closure.traverse_type, TraverseType::Closed);
    assert_relative_eq!(results.closure.closure_error_mm, 0.0, epsilon = 1e-9);
    // T = 4 * sqrt(0.4 km) = 2.5298 mm
    assert_relative_eq!(results.closure.tolerance_mm, 2.529_822, epsilon = 1e-6);
    assert!(results.closure.is_acceptable);
    assert_relative_eq!(results.total_distance_km, 0.4, epsilon = 1e-12);

    assert_eq!(results.altitudes.len(), 5);
    assert_relative_eq!(results.altitudes[1].altitude_m, 100.200, epsilon = 1e-9);
    assert_relative_eq!(results.altitudes[4].altitude_m, 100.000, epsilon = 1e-9);
    assert_eq!(results.control_statistics.quality, ControlQuality::Good);
    assert!(results
        .diagnostics
        .iter()
        .all(|d| d.severity != Severity::Warning));
}

#[test]
fn misclosed_loop_is_flagged_but_completes() {
    let results = CalculationPipeline::new(raw_params())
        .run(&misclosed_loop(), 100.0, None)
        .unwrap();

    assert_relative_eq!(results.closure.closure_error_mm, -4.0, epsilon = 1e-9);
    assert!(!results.closure.is_acceptable);
    assert!(results.closure.precision_ratio > 1.0);
    assert!(results
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning && d.stage == "closure"));
}

#[test]
fn open_traverse_against_known_terminal() {
    let results = CalculationPipeline::new(raw_params())
        .run(&open_traverse(), 100.0, Some(100.151))
        .unwrap();

    assert_eq!(results.closure.traverse_type, TraverseType::Open);
    // propagated terminal 100.150 m against the known 100.151 m;
    // T = 4 * sqrt(0.2 km) = 1.789 mm
    assert_relative_eq!(results.closure.closure_error_mm, -1.0, epsilon = 1e-9);
    assert!(results.closure.is_acceptable);
}

#[test]
fn channel_disagreement_surfaces_as_control_warning() {
    let mut records = closed_loop();
    // 12 mm disagreement on the first segment's foresight: 6 mm control
    // residual, past both the good grade and the 5 mm residual tolerance
    records[1].foresight_m[1] = Some(1.412);

    let results = CalculationPipeline::new(raw_params())
        .run(&records, 100.0, None)
        .unwrap();

    assert_eq!(results.control_statistics.quality, ControlQuality::Warning);
    assert_eq!(results.control_statistics.segments_exceeding_tolerance, 1);
    assert_eq!(
        results
            .diagnostics
            .iter()
            .filter(|d| d.message.contains("channel disagreement"))
            .count(),
        1
    );
}

#[test]
fn atmospheric_pass_reports_per_segment_corrections() {
    let results = CalculationPipeline::new(LevelingParams::default())
        .run(&closed_loop(), 100.0, None)
        .unwrap();

    assert_eq!(results.atmospheric_corrections.len(), 4);
    for correction in &results.atmospheric_corrections {
        assert_relative_eq!(correction.distance_m, 100.0, epsilon = 1e-12);
        // both 100 m terms together are worth about 1.4 mm
        let applied_mm = correction.applied_correction_m() * 1000.0;
        assert!(applied_mm > 1.0 && applied_mm < 2.0);
    }
    assert!(results.metadata.atmospheric_conditions.is_some());
}

#[test]
fn short_sight_is_screened() {
    let mut records = closed_loop();
    records[1].distances_m.clear();
    records[1].distances_m.push(0.5);

    let results = CalculationPipeline::new(raw_params())
        .run(&records, 100.0, None)
        .unwrap();
    assert!(results
        .diagnostics
        .iter()
        .any(|d| d.stage == "distance screening" && d.message.contains("short")));
}

#[test]
fn long_sight_is_screened() {
    let mut records = closed_loop();
    records[2].distances_m.clear();
    records[2].distances_m.push(350.0);

    let results = CalculationPipeline::new(raw_params())
        .run(&records, 100.0, None)
        .unwrap();
    assert!(results
        .diagnostics
        .iter()
        .any(|d| d.stage == "distance screening" && d.message.contains("unusually long")));
}

#[test]
fn very_long_traverse_is_screened() {
    let mut records = closed_loop();
    for record in &mut records {
        record.distances_m.clear();
        record.distances_m.push(15_000.0);
    }

    let results = CalculationPipeline::new(raw_params())
        .run(&records, 100.0, None)
        .unwrap();

    assert_relative_eq!(results.total_distance_km, 60.0, epsilon = 1e-9);
    assert!(results
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning
            && d.stage == "closure"
            && d.message.contains("very long traverse")));
    // the readings are still consistent, so the closure itself holds
    assert_relative_eq!(results.closure.closure_error_mm, 0.0, epsilon = 1e-9);
    assert!(results.closure.is_acceptable);
}

#[test]
fn runs_are_deterministic() {
    let pipeline = CalculationPipeline::new(raw_params());
    let first = pipeline.run(&closed_loop(), 100.0, None).unwrap();
    let second = pipeline.run(&closed_loop(), 100.0, None).unwrap();

    assert_eq!(first.height_differences, second.height_differences);
    assert_eq!(first.altitudes, second.altitudes);
    assert_eq!(first.closure, second.closure);
    assert_eq!(first.diagnostics, second.diagnostics);
}
