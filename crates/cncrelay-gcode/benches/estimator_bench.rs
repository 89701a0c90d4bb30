use cncrelay_gcode::{analyze_to_line, AxisLimits, EstimatorConfig, MotionEstimator};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

// Concentric pocket: alternating linear moves and arcs, about 20k lines
fn sample_program() -> String {
    let mut program = String::from("G21 G90 G17\nM3 S12000\nG0 X0 Y0 Z5\nG1 Z-1 F300\nF1200\n");
    for ring in 1..=2500 {
        let r = ring as f64 * 0.02;
        program.push_str(&format!("G1 X{:.3} Y0\n", r));
        program.push_str(&format!("G2 X{:.3} Y0 I{:.3} J0\n", -r, -r));
        program.push_str(&format!("G2 X{:.3} Y0 R{:.3}\n", r, r));
        program.push_str(&format!("G0 Z1\nG1 Z-1\nG4 P0.1\nG1 X0 Y{:.3}\n", r));
    }
    program.push_str("M5\nM30\n");
    program
}

fn bench_parse(c: &mut Criterion) {
    let program = sample_program();
    let plain = MotionEstimator::default();
    let kinematic = MotionEstimator::new(EstimatorConfig {
        max_rate: AxisLimits::uniform(5000.0),
        max_accel: AxisLimits::uniform(500.0),
        junction_deviation: Some(0.01),
        ..Default::default()
    });

    c.bench_function("estimator_parse_constant_speed", |b| {
        b.iter(|| black_box(plain.parse(black_box(&program))))
    });
    c.bench_function("estimator_parse_kinematic", |b| {
        b.iter(|| black_box(kinematic.parse(black_box(&program))))
    });
}

fn bench_estimate(c: &mut Criterion) {
    let program = sample_program();
    let plan = MotionEstimator::default().parse(&program);
    let middle = plan.line_count() / 2;

    c.bench_function("estimator_live_estimate", |b| {
        b.iter(|| black_box(plan.estimate(black_box(middle), None)))
    });
}

fn bench_analyze(c: &mut Criterion) {
    let program = sample_program();
    let target = program.lines().count() - 1;

    c.bench_function("modal_analyze_to_line", |b| {
        b.iter(|| black_box(analyze_to_line(black_box(&program), black_box(target))))
    });
}

criterion_group!(benches, bench_parse, bench_estimate, bench_analyze);
criterion_main!(benches);
