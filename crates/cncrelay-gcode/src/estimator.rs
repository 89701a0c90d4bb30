//! Static motion-time estimator
//!
//! Builds a per-line motion plan from program text: duration, move type,
//! direction, target speed, and effective acceleration for every source line,
//! plus prefix sums so the time executed up to any line cursor is O(1).
//!
//! The model is approximate: trapezoidal velocity profiles with a simple
//! junction-deviation cornering penalty, no jerk limiting, no planner
//! look-ahead. Distances are in millimetres, rates in mm/min, accelerations in
//! mm/s², and durations in seconds.

use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

use crate::modal::{Plane, Units};
use crate::words::{find_word as find, parse_words, Word};

const EPSILON: f64 = 1e-9;

/// Kind of motion a line performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveType {
    /// G0
    Rapid,
    /// G1
    Linear,
    /// G2/G3
    Arc,
    /// G4, unaffected by overrides
    Dwell,
}

/// Optional per-axis limit
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisLimits {
    /// X axis limit
    pub x: Option<f64>,
    /// Y axis limit
    pub y: Option<f64>,
    /// Z axis limit
    pub z: Option<f64>,
}

impl AxisLimits {
    /// Same limit on every axis
    pub fn uniform(value: f64) -> Self {
        Self {
            x: Some(value),
            y: Some(value),
            z: Some(value),
        }
    }

    fn as_array(&self) -> [Option<f64>; 3] {
        [self.x, self.y, self.z]
    }

    /// Largest shared speed along `unit` that keeps every limited axis within its limit
    ///
    /// The axis demanding the lowest vector speed is binding. `None` when no
    /// axis that participates in the move has a limit.
    pub fn project(&self, unit: [f64; 3]) -> Option<f64> {
        self.as_array()
            .iter()
            .zip(unit)
            .filter_map(|(limit, component)| {
                let limit = (*limit)?;
                (component.abs() > EPSILON && limit > 0.0).then(|| limit / component.abs())
            })
            .reduce(f64::min)
    }
}

/// Estimator tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Rapid rate used when no axis rate limits are configured (mm/min)
    pub default_rapid_rate: f64,
    /// Feed used for feed moves before any `F` word (mm/min)
    pub default_feed_rate: f64,
    /// Per-axis maximum rate (mm/min)
    pub max_rate: AxisLimits,
    /// Per-axis maximum acceleration (mm/s²)
    pub max_accel: AxisLimits,
    /// Junction deviation tolerance (mm); cornering is ignored when unset
    pub junction_deviation: Option<f64>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            default_rapid_rate: 1000.0,
            default_feed_rate: 500.0,
            max_rate: AxisLimits::default(),
            max_accel: AxisLimits::default(),
            junction_deviation: None,
        }
    }
}

/// Live override percentages (100 = programmed speed)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overrides {
    /// Feed override, applies to linear and arc moves
    pub feed: f64,
    /// Rapid override, applies to G0 moves
    pub rapid: f64,
}

impl Default for Overrides {
    fn default() -> Self {
        Self {
            feed: 100.0,
            rapid: 100.0,
        }
    }
}

/// Remaining time and progress at a line cursor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    /// Time spent on lines already executed
    pub executed_sec: f64,
    /// Time left, scaled by overrides when given
    pub remaining_sec: f64,
    /// `executed / (executed + remaining)`, rounded
    pub progress_percent: u8,
}

/// Per-line motion plan
///
/// All arrays are indexed by zero-based source line (line `n` is index `n - 1`).
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlan {
    durations: Vec<f64>,
    move_types: Vec<Option<MoveType>>,
    unit_vectors: Vec<[f64; 3]>,
    target_speeds: Vec<f64>,
    effective_accels: Vec<Option<f64>>,
    prefix_total: Vec<f64>,
    prefix_rapid: Vec<f64>,
    prefix_dwell: Vec<f64>,
}

impl Default for MotionPlan {
    fn default() -> Self {
        Self {
            durations: Vec::new(),
            move_types: Vec::new(),
            unit_vectors: Vec::new(),
            target_speeds: Vec::new(),
            effective_accels: Vec::new(),
            prefix_total: vec![0.0],
            prefix_rapid: vec![0.0],
            prefix_dwell: vec![0.0],
        }
    }
}

impl MotionPlan {
    /// Number of source lines covered
    pub fn line_count(&self) -> usize {
        self.durations.len()
    }

    /// Whole-program duration in seconds
    pub fn total_sec(&self) -> f64 {
        self.prefix_total.last().copied().unwrap_or(0.0)
    }

    /// Duration of every line
    pub fn per_line_sec(&self) -> &[f64] {
        &self.durations
    }

    /// Move type of every line, `None` for lines without motion
    pub fn per_line_type(&self) -> &[Option<MoveType>] {
        &self.move_types
    }

    /// Direction of every line's move; zero for lines without a direction
    pub fn unit_vectors(&self) -> &[[f64; 3]] {
        &self.unit_vectors
    }

    /// Target speed of every line in mm/s
    pub fn target_speeds(&self) -> &[f64] {
        &self.target_speeds
    }

    /// Effective acceleration of every line in mm/s²
    pub fn effective_accels(&self) -> &[Option<f64>] {
        &self.effective_accels
    }

    /// Total time spent in moves of one type
    pub fn total_for(&self, move_type: MoveType) -> f64 {
        self.durations
            .iter()
            .zip(&self.move_types)
            .filter(|(_, t)| **t == Some(move_type))
            .map(|(d, _)| d)
            .sum()
    }

    /// Time executed once `lines_done` lines have completed
    pub fn executed_sec(&self, lines_done: usize) -> f64 {
        self.prefix_total[lines_done.min(self.line_count())]
    }

    /// Remaining time and progress after `lines_done` lines have completed
    ///
    /// With overrides, the remaining rapid and feed time are rescaled
    /// independently by `100 / override%`; dwells are never rescaled.
    pub fn estimate(&self, lines_done: usize, overrides: Option<Overrides>) -> Estimate {
        let cursor = lines_done.min(self.line_count());
        let total = self.total_sec();
        let executed = self.prefix_total[cursor];
        let unscaled_remaining = (total - executed).max(0.0);

        let remaining = match overrides {
            Some(overrides) => {
                let rapid = self.prefix_rapid[self.line_count()] - self.prefix_rapid[cursor];
                let dwell = self.prefix_dwell[self.line_count()] - self.prefix_dwell[cursor];
                let feed = (unscaled_remaining - rapid - dwell).max(0.0);
                rescale(rapid, overrides.rapid) + rescale(feed, overrides.feed) + dwell
            }
            None => unscaled_remaining,
        };

        let span = executed + remaining;
        let progress_percent = if span > EPSILON {
            ((executed / span) * 100.0).round().clamp(0.0, 100.0) as u8
        } else if cursor > 0 && cursor == self.line_count() {
            100
        } else {
            0
        };

        Estimate {
            executed_sec: executed,
            remaining_sec: remaining,
            progress_percent,
        }
    }

    fn push(&mut self, line: LineMotion) {
        let previous = self.line_count();
        let is = |t: MoveType| line.move_type == Some(t);
        self.prefix_total
            .push(self.prefix_total[previous] + line.duration);
        self.prefix_rapid.push(
            self.prefix_rapid[previous] + if is(MoveType::Rapid) { line.duration } else { 0.0 },
        );
        self.prefix_dwell.push(
            self.prefix_dwell[previous] + if is(MoveType::Dwell) { line.duration } else { 0.0 },
        );
        self.durations.push(line.duration);
        self.move_types.push(line.move_type);
        self.unit_vectors.push(line.unit);
        self.target_speeds.push(line.speed);
        self.effective_accels.push(line.accel);
    }
}

fn rescale(seconds: f64, percent: f64) -> f64 {
    if percent > 0.0 {
        seconds * 100.0 / percent
    } else {
        seconds
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LineMotion {
    duration: f64,
    move_type: Option<MoveType>,
    unit: [f64; 3],
    speed: f64,
    accel: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Rapid,
    Linear,
    ArcCw,
    ArcCcw,
}

/// Words that make the axis words on a line something other than a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NonModal {
    Dwell,
    SetPosition,
    Consume,
}

/// Parses program text into a [`MotionPlan`]
#[derive(Debug, Clone, Default)]
pub struct MotionEstimator {
    config: EstimatorConfig,
}

impl MotionEstimator {
    /// Create an estimator with the given configuration
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Estimator configuration
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Build the motion plan for a whole program
    ///
    /// The machine is assumed to start at the origin in G90/G21/G17 with G0 active.
    pub fn parse(&self, text: &str) -> MotionPlan {
        let mut plan = MotionPlan::default();

        let mut position = [0.0_f64; 3];
        let mut motion = Motion::Rapid;
        let mut incremental = false;
        let mut units = Units::Millimeters;
        let mut plane = Plane::Xy;
        let mut feed = self.config.default_feed_rate;
        let mut previous: Option<LineMotion> = None;

        for line in text.lines() {
            let words = parse_words(line);
            let mut non_modal = None;
            for word in words.iter().filter(|w| w.letter == 'G') {
                match word.code() {
                    Some(0) => motion = Motion::Rapid,
                    Some(1) => motion = Motion::Linear,
                    Some(2) => motion = Motion::ArcCw,
                    Some(3) => motion = Motion::ArcCcw,
                    Some(4) => non_modal = Some(NonModal::Dwell),
                    Some(10) | Some(28) | Some(30) => non_modal = Some(NonModal::Consume),
                    Some(17) => plane = Plane::Xy,
                    Some(18) => plane = Plane::Zx,
                    Some(19) => plane = Plane::Yz,
                    Some(20) => units = Units::Inches,
                    Some(21) => units = Units::Millimeters,
                    Some(90) => incremental = false,
                    Some(91) => incremental = true,
                    Some(92) => non_modal = Some(NonModal::SetPosition),
                    _ => {}
                }
            }
            let scale = units.to_mm();
            if let Some(f) = find(&words, 'F') {
                if f > 0.0 {
                    feed = f * scale;
                }
            }

            let mut line_motion = LineMotion::default();
            let axes = [find(&words, 'X'), find(&words, 'Y'), find(&words, 'Z')];
            let has_axes = axes.iter().any(Option::is_some);

            match non_modal {
                Some(NonModal::Dwell) => {
                    line_motion.duration = find(&words, 'P').unwrap_or(0.0).max(0.0);
                    line_motion.move_type = Some(MoveType::Dwell);
                    previous = None;
                }
                Some(NonModal::SetPosition) => {
                    for (axis, value) in axes.iter().enumerate() {
                        if let Some(value) = value {
                            position[axis] = value * scale;
                        }
                    }
                }
                Some(NonModal::Consume) => {}
                None if has_axes => {
                    let mut target = position;
                    for (axis, value) in axes.iter().enumerate() {
                        if let Some(value) = value {
                            let value = value * scale;
                            target[axis] = if incremental {
                                position[axis] + value
                            } else {
                                value
                            };
                        }
                    }
                    if let Some(computed) =
                        self.plan_move(&words, motion, plane, scale, position, target, feed)
                    {
                        line_motion = computed;
                        if let Some(prev) = previous {
                            line_motion.duration += self.cornering_penalty(&prev, &line_motion);
                        }
                        previous = Some(line_motion);
                    }
                    position = target;
                }
                None => {}
            }

            plan.push(line_motion);
        }

        tracing::debug!(
            "Motion plan built: {} lines, {:.1}s total",
            plan.line_count(),
            plan.total_sec()
        );
        plan
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_move(
        &self,
        words: &[Word],
        motion: Motion,
        plane: Plane,
        scale: f64,
        start: [f64; 3],
        end: [f64; 3],
        feed: f64,
    ) -> Option<LineMotion> {
        let delta = [end[0] - start[0], end[1] - start[1], end[2] - start[2]];
        let chord = norm(delta);

        let (distance, move_type) = match motion {
            Motion::Rapid => (chord, MoveType::Rapid),
            Motion::Linear => (chord, MoveType::Linear),
            Motion::ArcCw | Motion::ArcCcw => (
                arc_length(
                    words,
                    plane,
                    scale,
                    start,
                    end,
                    motion == Motion::ArcCw,
                ),
                MoveType::Arc,
            ),
        };
        if distance < EPSILON {
            return None;
        }

        let unit = if chord > EPSILON {
            [delta[0] / chord, delta[1] / chord, delta[2] / chord]
        } else {
            [0.0; 3]
        };

        let ceiling = self.config.max_rate.project(unit);
        let rate = match move_type {
            MoveType::Rapid => ceiling.unwrap_or(self.config.default_rapid_rate),
            _ => ceiling.map_or(feed, |c| c.min(feed)),
        };
        if rate <= 0.0 {
            return None;
        }
        let speed = rate / 60.0;
        let accel = self.config.max_accel.project(unit);

        Some(LineMotion {
            duration: move_time(distance, speed, accel),
            move_type: Some(move_type),
            unit,
            speed,
            accel,
        })
    }

    /// Extra decelerate/reaccelerate time at the junction into `current`
    fn cornering_penalty(&self, previous: &LineMotion, current: &LineMotion) -> f64 {
        let Some(deviation) = self.config.junction_deviation else {
            return 0.0;
        };
        let (Some(prev_accel), Some(cur_accel)) = (previous.accel, current.accel) else {
            return 0.0;
        };
        if norm(previous.unit) < EPSILON || norm(current.unit) < EPSILON {
            return 0.0;
        }

        // theta is PI for a straight continuation and 0 for a full reversal.
        let cos_theta = -dot(previous.unit, current.unit);
        let theta = cos_theta.clamp(-1.0, 1.0).acos();
        if PI - theta < 1e-6 {
            return 0.0;
        }

        let limit = previous.speed.min(current.speed);
        let corner =
            (prev_accel.min(cur_accel) * deviation * (theta / 2.0).tan()).max(0.0).sqrt();
        if corner >= limit {
            return 0.0;
        }
        let lost = limit - corner;
        lost / prev_accel + lost / cur_accel
    }
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

/// Time to cover `distance` at up to `speed`, starting and ending at rest
///
/// Trapezoidal profile when acceleration is known, triangular when the move
/// is too short to reach cruise speed, constant speed otherwise.
pub fn move_time(distance: f64, speed: f64, accel: Option<f64>) -> f64 {
    if speed <= 0.0 {
        return 0.0;
    }
    match accel {
        Some(accel) if accel > 0.0 => {
            let ramp_distance = speed * speed / (2.0 * accel);
            if 2.0 * ramp_distance <= distance {
                2.0 * speed / accel + (distance - 2.0 * ramp_distance) / speed
            } else {
                2.0 * (distance / accel).sqrt()
            }
        }
        _ => distance / speed,
    }
}

/// Arc length between `start` and `end` for a G2/G3 line
///
/// Center format (I/J/K) averages the start and end radii; R format derives
/// the sweep from the chord, taking the long arc when R is negative. Falls
/// back to the straight chord when neither form resolves.
fn arc_length(
    words: &[Word],
    plane: Plane,
    scale: f64,
    start: [f64; 3],
    end: [f64; 3],
    clockwise: bool,
) -> f64 {
    // (first axis, second axis, linear axis) and the matching offset letters
    let ((a, b, n), (oa, ob)) = match plane {
        Plane::Xy => ((0, 1, 2), ('I', 'J')),
        Plane::Zx => ((2, 0, 1), ('K', 'I')),
        Plane::Yz => ((1, 2, 0), ('J', 'K')),
    };
    let chord_3d = norm([end[0] - start[0], end[1] - start[1], end[2] - start[2]]);
    let linear = end[n] - start[n];
    let (da, db) = (end[a] - start[a], end[b] - start[b]);
    let chord = (da * da + db * db).sqrt();

    let offset_a = find(words, oa);
    let offset_b = find(words, ob);
    let sweep_and_radius = if offset_a.is_some() || offset_b.is_some() {
        let ca = start[a] + offset_a.unwrap_or(0.0) * scale;
        let cb = start[b] + offset_b.unwrap_or(0.0) * scale;
        let r1 = (start[a] - ca).hypot(start[b] - cb);
        let r2 = (end[a] - ca).hypot(end[b] - cb);
        let radius = (r1 + r2) / 2.0;
        let start_angle = (start[b] - cb).atan2(start[a] - ca);
        let end_angle = (end[b] - cb).atan2(end[a] - ca);
        let mut sweep = if clockwise {
            start_angle - end_angle
        } else {
            end_angle - start_angle
        };
        if sweep <= EPSILON {
            sweep += TAU;
        }
        (radius > EPSILON).then_some((sweep, radius))
    } else if let Some(r) = find(words, 'R') {
        let radius = r.abs() * scale;
        if radius > EPSILON && chord > EPSILON && chord <= 2.0 * radius + 1e-6 {
            let short = 2.0 * (chord / (2.0 * radius)).min(1.0).asin();
            let sweep = if r < 0.0 { TAU - short } else { short };
            Some((sweep, radius))
        } else {
            None
        }
    } else {
        None
    };

    match sweep_and_radius {
        Some((sweep, radius)) => (radius * sweep).hypot(linear),
        None => chord_3d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_linear_feed_move() {
        let plan = MotionEstimator::default().parse("G1 X10 F600");
        assert!(approx(plan.total_sec(), 1.0));
        assert_eq!(plan.per_line_type(), &[Some(MoveType::Linear)]);
    }

    #[test]
    fn test_rapid_uses_default_rate() {
        let plan = MotionEstimator::default().parse("G0 X10");
        assert!(approx(plan.total_sec(), 0.6));
    }

    #[test]
    fn test_inches_are_normalized() {
        let plan = MotionEstimator::default().parse("G20\nG1 X1 F60");
        // 25.4 mm at 1524 mm/min
        assert!(approx(plan.total_sec(), 1.0));
    }

    #[test]
    fn test_axis_limits_bind_on_slowest_axis() {
        let limits = AxisLimits {
            x: Some(6000.0),
            y: Some(600.0),
            z: None,
        };
        let unit = [0.6, 0.8, 0.0];
        assert!(approx(limits.project(unit).unwrap_or(0.0), 750.0));
        assert_eq!(AxisLimits::default().project(unit), None);
    }

    #[test]
    fn test_trapezoid_and_triangle() {
        // accelerate to 10 mm/s over 0.5 mm at 100 mm/s², cruise 9 mm
        assert!(approx(move_time(10.0, 10.0, Some(100.0)), 0.2 + 0.9));
        // too short to reach cruise
        assert!(approx(move_time(0.25, 10.0, Some(100.0)), 0.1));
        assert!(approx(move_time(10.0, 10.0, None), 1.0));
    }

    #[test]
    fn test_center_format_arc() {
        let plan = MotionEstimator::default().parse("G1 F600\nG2 X10 Y0 I5 J0");
        let half_circle = PI * 5.0;
        assert!(approx(plan.per_line_sec()[1], half_circle / 10.0));
        assert_eq!(plan.per_line_type()[1], Some(MoveType::Arc));
    }

    #[test]
    fn test_full_circle_arc() {
        let plan = MotionEstimator::default().parse("G0 X5\nG1 F600\nG3 X5 Y0 I-5 J0");
        assert!(approx(plan.per_line_sec()[2], TAU * 5.0 / 10.0));
    }

    #[test]
    fn test_radius_format_long_arc() {
        let short = MotionEstimator::default().parse("G1 F600\nG2 X10 R5");
        let long = MotionEstimator::default().parse("G1 F600\nG2 X10 Y10 R-10");
        assert!(approx(short.per_line_sec()[1], PI * 5.0 / 10.0));
        let chord = 200.0_f64.sqrt();
        let minor = 2.0 * (chord / 20.0).asin();
        assert!(approx(long.per_line_sec()[1], (TAU - minor) * 10.0 / 10.0));
    }

    #[test]
    fn test_unresolvable_arc_uses_chord() {
        let plan = MotionEstimator::default().parse("G1 F600\nG2 X10 R1");
        assert!(approx(plan.per_line_sec()[1], 1.0));
    }

    #[test]
    fn test_cornering_penalty_on_right_angle() {
        let config = EstimatorConfig {
            max_accel: AxisLimits::uniform(100.0),
            junction_deviation: Some(0.01),
            ..Default::default()
        };
        let straight = MotionEstimator::new(config.clone()).parse("G1 X10 F600\nX20");
        let corner = MotionEstimator::new(config).parse("G1 X10 F600\nY10");
        assert!(approx(straight.per_line_sec()[1], straight.per_line_sec()[0]));
        assert!(corner.per_line_sec()[1] > corner.per_line_sec()[0]);
        assert!(approx(corner.per_line_sec()[0], straight.per_line_sec()[0]));
    }

    #[test]
    fn test_cornering_penalty_with_unequal_accelerations() {
        let config = EstimatorConfig {
            max_accel: AxisLimits {
                x: Some(100.0),
                y: Some(400.0),
                z: None,
            },
            junction_deviation: Some(0.01),
            ..Default::default()
        };
        let estimator = MotionEstimator::new(config);

        // 10 mm/s into a right angle: corner speed sqrt(100 * 0.01 * tan(45°)) = 1 mm/s.
        // Decelerating on X costs 9/100 s, re-accelerating on Y costs 9/400 s.
        let plan = estimator.parse("G1 X10 F600\nY10");
        assert_eq!(plan.effective_accels(), &[Some(100.0), Some(400.0)]);
        let y_move = move_time(10.0, 10.0, Some(400.0));
        assert!(approx(plan.per_line_sec()[1], y_move + 0.09 + 0.0225));

        // Each side of the corner ramps at its own rate, whichever comes first
        let reversed = estimator.parse("G1 Y10 F600\nX10");
        let x_move = move_time(10.0, 10.0, Some(100.0));
        assert!(approx(reversed.per_line_sec()[1], x_move + 0.0225 + 0.09));
    }

    #[test]
    fn test_dwell_and_non_motion_lines() {
        let program = "(setup)\nM3 S1000\nG4 P2\nG92 X50\nG1 X60 F600";
        let plan = MotionEstimator::default().parse(program);
        assert_eq!(plan.line_count(), 5);
        assert_eq!(plan.per_line_type()[0], None);
        assert_eq!(plan.per_line_type()[2], Some(MoveType::Dwell));
        assert!(approx(plan.per_line_sec()[2], 2.0));
        assert_eq!(plan.per_line_sec()[3], 0.0);
        assert!(approx(plan.per_line_sec()[4], 1.0));
    }

    #[test]
    fn test_estimate_progress() {
        let plan = MotionEstimator::default().parse("G1 X10 F600\nX20\nX30\nX40");
        let estimate = plan.estimate(1, None);
        assert!(approx(estimate.executed_sec, 1.0));
        assert!(approx(estimate.remaining_sec, 3.0));
        assert_eq!(estimate.progress_percent, 25);
        assert_eq!(plan.estimate(99, None).progress_percent, 100);
        assert_eq!(plan.estimate(0, None).progress_percent, 0);
    }

    #[test]
    fn test_overrides_scale_buckets_independently() {
        let plan = MotionEstimator::default().parse("G0 X10\nG1 X20 F600\nG4 P1");
        let estimate = plan.estimate(
            0,
            Some(Overrides {
                feed: 50.0,
                rapid: 200.0,
            }),
        );
        // rapid 0.6s -> 0.3s, feed 1s -> 2s, dwell unchanged
        assert!(approx(estimate.remaining_sec, 0.3 + 2.0 + 1.0));
    }

    #[test]
    fn test_empty_program() {
        let plan = MotionEstimator::default().parse("");
        assert_eq!(plan.total_sec(), 0.0);
        assert_eq!(plan.estimate(0, None).progress_percent, 0);
    }
}
