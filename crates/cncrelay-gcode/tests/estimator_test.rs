use cncrelay_gcode::{
    AxisLimits, EstimatorConfig, MotionEstimator, MoveType, Overrides, ProgressTracker,
};
use proptest::prelude::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn test_single_feed_move_from_origin() {
    let plan = MotionEstimator::default().parse("G1 X10 F600");
    assert!(close(plan.per_line_sec()[0], 1.0));
}

#[test]
fn test_rapid_uses_configured_default_rate() {
    let estimator = MotionEstimator::new(EstimatorConfig {
        default_rapid_rate: 3000.0,
        ..Default::default()
    });
    let plan = estimator.parse("G0 X10");
    assert!(close(plan.total_sec(), 0.2));
}

#[test]
fn test_rapid_uses_axis_rate_limits() {
    let estimator = MotionEstimator::new(EstimatorConfig {
        max_rate: AxisLimits {
            x: Some(6000.0),
            y: Some(3000.0),
            z: Some(600.0),
        },
        ..Default::default()
    });
    let plan = estimator.parse("G0 Z-10\nG0 X100 Z-10");
    assert!(close(plan.per_line_sec()[0], 1.0));
    assert!(close(plan.per_line_sec()[1], 1.0));
}

#[test]
fn test_feed_is_capped_by_axis_rate() {
    let estimator = MotionEstimator::new(EstimatorConfig {
        max_rate: AxisLimits::uniform(300.0),
        ..Default::default()
    });
    let plan = estimator.parse("G1 X10 F6000");
    assert!(close(plan.total_sec(), 2.0));
    assert!(close(plan.target_speeds()[0], 5.0));
}

#[test]
fn test_incremental_moves() {
    let plan = MotionEstimator::default().parse("G91\nG1 X10 F600\nX10\nX-20");
    assert!(close(plan.total_sec(), 4.0));
}

#[test]
fn test_type_breakdown() {
    let plan = MotionEstimator::default().parse("G0 X10\nG1 X20 F600\nG2 X30 R5\nG4 P0.5");
    assert_eq!(
        plan.per_line_type(),
        &[
            Some(MoveType::Rapid),
            Some(MoveType::Linear),
            Some(MoveType::Arc),
            Some(MoveType::Dwell),
        ]
    );
    assert!(close(plan.total_for(MoveType::Rapid), 0.6));
    assert!(close(plan.total_for(MoveType::Dwell), 0.5));
}

#[test]
fn test_overrides_at_full_speed_change_nothing() {
    let plan = MotionEstimator::default().parse("G0 X10\nG1 X20 F600\nG1 X30");
    let plain = plan.estimate(1, None);
    let scaled = plan.estimate(1, Some(Overrides::default()));
    assert!(close(plain.remaining_sec, scaled.remaining_sec));
}

#[test]
fn test_tracker_keeps_plan_between_loads() {
    let tracker = ProgressTracker::default();
    tracker.load("G1 X10 F600\nX20\nX30");
    let estimate = tracker.estimate(2, None).unwrap();
    assert!(close(estimate.remaining_sec, 1.0));
    assert_eq!(estimate.progress_percent, 67);
}

proptest! {
    #[test]
    fn prop_prefix_sums_are_monotonic(moves in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0, 1.0f64..5000.0), 1..50)) {
        let program: Vec<String> = moves
            .iter()
            .map(|(x, y, f)| format!("G1 X{:.3} Y{:.3} F{:.1}", x, y, f))
            .collect();
        let plan = MotionEstimator::default().parse(&program.join("\n"));
        let mut last = 0.0;
        for line in 0..=plan.line_count() {
            let executed = plan.executed_sec(line);
            prop_assert!(executed >= last);
            last = executed;
        }
        prop_assert!(close(last, plan.total_sec()));
    }

    #[test]
    fn prop_cornering_never_shortens(moves in prop::collection::vec((-50.0f64..50.0, -50.0f64..50.0), 2..20)) {
        let program: Vec<String> = moves
            .iter()
            .map(|(x, y)| format!("G1 X{:.3} Y{:.3} F1200", x, y))
            .collect();
        let program = program.join("\n");
        let base = EstimatorConfig {
            max_accel: AxisLimits::uniform(200.0),
            ..Default::default()
        };
        let cornering = EstimatorConfig {
            junction_deviation: Some(0.02),
            ..base.clone()
        };
        let without = MotionEstimator::new(base).parse(&program).total_sec();
        let with = MotionEstimator::new(cornering).parse(&program).total_sec();
        prop_assert!(with + 1e-9 >= without);
    }

    #[test]
    fn prop_progress_stays_in_range(lines_done in 0usize..100, feed in 1.0f64..300.0, rapid in 1.0f64..300.0) {
        let plan = MotionEstimator::default().parse("G0 X10\nG1 X20 F600\nG2 X30 R5\nG4 P1");
        let estimate = plan.estimate(lines_done, Some(Overrides { feed, rapid }));
        prop_assert!(estimate.progress_percent <= 100);
        prop_assert!(estimate.remaining_sec >= 0.0);
    }
}
