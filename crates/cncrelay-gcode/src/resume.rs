//! Resume-from-line planning
//!
//! Turns a reconstructed [`ModalState`] into the command sequence that puts
//! the machine back into that state before streaming resumes. This is a
//! best-effort reconstruction: it restores what the program text determines
//! and nothing more.

use cncrelay_core::GcodeError;
use serde::{Deserialize, Serialize};

use crate::modal::{analyze_to_line, ModalState, PositioningMode};
use crate::tool_change::is_tool_change;
use crate::words::format_number;

/// Retract to machine Z0, ignoring every work offset
pub const SAFE_RETRACT: &str = "G53 G0 Z0";

/// How the resume sequence approaches the work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeOptions {
    /// Clearance above the target Z for the rapid approach
    pub safe_height: f64,
    /// Feed for the final plunge to the target Z
    pub plunge_feed: f64,
    /// Dwell after starting the spindle, in seconds (0 disables)
    pub spindle_delay_sec: f64,
    /// Tool currently in the spindle, when known
    #[serde(skip)]
    pub current_tool: Option<u32>,
    /// The resume line itself is a tool change
    #[serde(skip)]
    pub resume_at_tool_change: bool,
}

impl Default for ResumeOptions {
    fn default() -> Self {
        Self {
            safe_height: 5.0,
            plunge_feed: 100.0,
            spindle_delay_sec: 0.0,
            current_tool: None,
            resume_at_tool_change: false,
        }
    }
}

impl ResumeOptions {
    /// Builder method to set the tool currently loaded
    pub fn with_current_tool(mut self, tool: Option<u32>) -> Self {
        self.current_tool = tool;
        self
    }

    /// Builder method to set the spindle spin-up dwell
    pub fn with_spindle_delay(mut self, seconds: f64) -> Self {
        self.spindle_delay_sec = seconds;
        self
    }
}

/// Tool mismatch between the program and the machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolMismatch {
    /// Tool the program expects at the resume point
    pub expected: u32,
    /// Tool the machine reports
    pub current: u32,
    /// Operator-facing warning
    pub message: String,
}

/// Flag a tool mismatch for the caller to surface; never blocks a resume
pub fn compare_tool_state(expected: Option<u32>, current: Option<u32>) -> Option<ToolMismatch> {
    match (expected, current) {
        (Some(expected), Some(current)) if expected != current => Some(ToolMismatch {
            expected,
            current,
            message: format!(
                "Program expects T{} at the resume point but T{} is loaded",
                expected, current
            ),
        }),
        _ => None,
    }
}

/// Build the ordered command list restoring `target`
pub fn generate_resume_sequence(target: &ModalState, options: &ResumeOptions) -> Vec<String> {
    let mut commands = vec![SAFE_RETRACT.to_string()];

    if let (Some(expected), Some(current)) = (target.tool, options.current_tool) {
        if expected != current {
            commands.push(format!("M6 T{}", expected));
        }
    }

    // The upcoming tool change re-establishes spindle, coolant, and position.
    if options.resume_at_tool_change {
        return commands;
    }

    // Z cleared by a replayed tool change: nothing below can be asserted safely.
    if target.tool_change_replayed {
        tracing::debug!("Z unknown after tool change, resume sequence stops at the retract");
        return commands;
    }

    // Repositioning always runs absolute; incremental mode is restored last.
    commands.push(format!(
        "{} {} {} {}",
        target.units.gcode(),
        PositioningMode::Absolute.gcode(),
        target.plane.gcode(),
        target.wcs_gcode()
    ));

    let position = target.position;
    let position_known = position.is_complete();
    if let (true, Some(x), Some(y)) = (position_known, position.x, position.y) {
        commands.push(format!("G0 X{} Y{}", format_number(x), format_number(y)));
    }

    if let Some(direction) = target.spindle_state.mcode() {
        commands.push(format!(
            "S{} {}",
            format_number(target.spindle_speed),
            direction
        ));
        if options.spindle_delay_sec > 0.0 {
            commands.push(format!("G4 P{}", format_number(options.spindle_delay_sec)));
        }
    }

    if target.coolant_flood {
        commands.push("M8".to_string());
    }
    if target.coolant_mist {
        commands.push("M7".to_string());
    }

    for (port, _) in target.aux_outputs.iter().filter(|(_, on)| **on) {
        commands.push(format!("M64 P{}", port));
    }

    if let (true, Some(z)) = (position_known, position.z) {
        commands.push(format!("G0 Z{}", format_number(z + options.safe_height)));
        commands.push(format!(
            "G1 Z{} F{}",
            format_number(z),
            format_number(options.plunge_feed)
        ));
    }

    if target.positioning_mode == PositioningMode::Incremental {
        commands.push(PositioningMode::Incremental.gcode().to_string());
    }

    if let Some(feed) = target.feed_rate {
        commands.push(format!("F{}", format_number(feed)));
    }

    commands
}

/// Everything needed to resume a program at a line
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePlan {
    /// Line streaming resumes at (1-based)
    pub resume_line: usize,
    /// State in effect just before the resume line
    pub state: ModalState,
    /// Commands to send before resuming
    pub commands: Vec<String>,
    /// Tool mismatch warning, if any
    pub tool_warning: Option<ToolMismatch>,
}

/// Analyze `text` up to `line` and plan the resume sequence
///
/// Whether the resume line is itself a tool change is detected from the text
/// and overrides `options.resume_at_tool_change`.
pub fn plan_resume(
    text: &str,
    line: usize,
    options: &ResumeOptions,
) -> Result<ResumePlan, GcodeError> {
    if line == 0 {
        return Err(GcodeError::InvalidLine { line });
    }

    let state = analyze_to_line(text, line);
    let resume_at_tool_change = text
        .lines()
        .nth(line - 1)
        .is_some_and(is_tool_change);

    let options = ResumeOptions {
        resume_at_tool_change,
        ..options.clone()
    };
    let commands = generate_resume_sequence(&state, &options);
    let tool_warning = compare_tool_state(state.tool, options.current_tool);

    tracing::debug!(
        "Resume plan for line {}: {} commands{}",
        line,
        commands.len(),
        if resume_at_tool_change {
            " (tool change line)"
        } else {
            ""
        }
    );

    Ok(ResumePlan {
        resume_line: line,
        state,
        commands,
        tool_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modal::SpindleState;

    #[test]
    fn test_retract_always_first() {
        let commands = generate_resume_sequence(&ModalState::new(), &ResumeOptions::default());
        assert_eq!(commands[0], SAFE_RETRACT);
        assert_eq!(commands[1], "G21 G90 G17 G54");
        assert_eq!(commands.len(), 2);
    }

    #[test]
    fn test_full_restore_order() {
        let mut state = ModalState::new();
        state.position.x = Some(10.0);
        state.position.y = Some(20.0);
        state.position.z = Some(-1.5);
        state.spindle_state = SpindleState::Clockwise;
        state.spindle_speed = 12000.0;
        state.coolant_flood = true;
        state.aux_outputs.insert("3".to_string(), true);
        state.aux_outputs.insert("4".to_string(), false);
        state.feed_rate = Some(800.0);

        let options = ResumeOptions::default().with_spindle_delay(2.0);
        let commands = generate_resume_sequence(&state, &options);
        assert_eq!(
            commands,
            vec![
                "G53 G0 Z0",
                "G21 G90 G17 G54",
                "G0 X10 Y20",
                "S12000 M3",
                "G4 P2",
                "M8",
                "M64 P3",
                "G0 Z3.5",
                "G1 Z-1.5 F100",
                "F800",
            ]
        );
    }

    #[test]
    fn test_unknown_z_skips_positioning() {
        let mut state = ModalState::new();
        state.position.x = Some(1.0);
        state.position.y = Some(2.0);
        let commands = generate_resume_sequence(&state, &ResumeOptions::default());
        assert!(commands.iter().all(|c| !c.starts_with("G0 X")));
        assert!(commands.iter().all(|c| !c.starts_with("G1 Z")));
    }

    #[test]
    fn test_z_lost_to_tool_change_stops_sequence() {
        let state = analyze_to_line("G20\nG0 X1 Y1 Z1\nT3 M6\nM3 S9000\nG0 X2 Y2", 6);
        assert_eq!(state.position.z, None);

        let options = ResumeOptions::default().with_current_tool(Some(1));
        let commands = generate_resume_sequence(&state, &options);
        assert_eq!(commands, vec!["G53 G0 Z0", "M6 T3"]);

        let options = ResumeOptions::default().with_current_tool(Some(3));
        let commands = generate_resume_sequence(&state, &options);
        assert_eq!(commands, vec!["G53 G0 Z0"]);
    }

    #[test]
    fn test_bare_m6_stops_sequence() {
        let state = analyze_to_line("G0 X1 Y1 Z5\nM6\nM3 S9000\nG0 X2 Y2", 5);
        assert_eq!(state.tool, None);
        let commands = generate_resume_sequence(&state, &ResumeOptions::default());
        assert_eq!(commands, vec!["G53 G0 Z0"]);
    }

    #[test]
    fn test_tool_mismatch_inserts_change() {
        let mut state = ModalState::new();
        state.tool = Some(2);
        let options = ResumeOptions::default().with_current_tool(Some(1));
        let commands = generate_resume_sequence(&state, &options);
        assert_eq!(commands[1], "M6 T2");

        let options = ResumeOptions::default().with_current_tool(Some(2));
        let commands = generate_resume_sequence(&state, &options);
        assert!(!commands.contains(&"M6 T2".to_string()));
    }

    #[test]
    fn test_stop_at_tool_change_line() {
        let mut state = ModalState::new();
        state.tool = Some(2);
        state.position.x = Some(1.0);
        state.position.y = Some(1.0);
        state.position.z = Some(1.0);
        let options = ResumeOptions {
            current_tool: Some(1),
            resume_at_tool_change: true,
            ..Default::default()
        };
        let commands = generate_resume_sequence(&state, &options);
        assert_eq!(commands, vec!["G53 G0 Z0", "M6 T2"]);
    }

    #[test]
    fn test_compare_tool_state() {
        assert!(compare_tool_state(Some(1), Some(1)).is_none());
        assert!(compare_tool_state(None, Some(1)).is_none());
        assert!(compare_tool_state(Some(1), None).is_none());
        let warning = compare_tool_state(Some(3), Some(1)).unwrap();
        assert_eq!(warning.expected, 3);
        assert_eq!(warning.current, 1);
    }

    #[test]
    fn test_plan_resume_rejects_line_zero() {
        assert_eq!(
            plan_resume("G0 X1", 0, &ResumeOptions::default()),
            Err(GcodeError::InvalidLine { line: 0 })
        );
    }

    #[test]
    fn test_incremental_mode_restored_after_positioning() {
        let state = analyze_to_line("G0 X1 Y1 Z1\nG91", 3);
        let commands = generate_resume_sequence(&state, &ResumeOptions::default());
        assert_eq!(commands.last().map(String::as_str), Some("G91"));
    }
}
