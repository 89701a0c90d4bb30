//! # CNCRelay G-code
//!
//! Program-text analysis for CNCRelay: tokenizer, canonical tool-change
//! matcher, modal-state reconstruction, resume planning, and the static
//! motion-time estimator behind live progress/ETA.

pub mod estimator;
pub mod modal;
pub mod progress;
pub mod resume;
pub mod tool_change;
pub mod words;

pub use estimator::{
    move_time, AxisLimits, Estimate, EstimatorConfig, MotionEstimator, MotionPlan, MoveType,
    Overrides,
};
pub use modal::{
    analyze_to_line, AxisPosition, ModalState, MotionMode, Plane, PositioningMode, SpindleState,
    Units, AUX_OUTPUT_OFF, AUX_OUTPUT_ON,
};
pub use progress::ProgressTracker;
pub use resume::{
    compare_tool_state, generate_resume_sequence, plan_resume, ResumeOptions, ResumePlan,
    ToolMismatch, SAFE_RETRACT,
};
pub use tool_change::{is_tool_change, parse_tool_change, ToolChange};
pub use words::{format_number, parse_words, strip_comments, Word};
