//! G-code modal state reconstruction
//!
//! Replays program text from the top to rebuild the interpreter context in
//! effect at an arbitrary line. Every call starts from a fresh default state,
//! so the result is a pure function of `(text, target_line)`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tool_change::parse_tool_change_words;
use crate::words::{find_word, format_number, parse_words, Word};

/// Motion mode - Group 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionMode {
    /// G0 rapid positioning
    #[default]
    Rapid,
    /// G1 linear interpolation
    Linear,
    /// G2 clockwise arc
    ArcCw,
    /// G3 counter-clockwise arc
    ArcCcw,
}

impl MotionMode {
    /// Map a G code to a motion mode
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Rapid),
            1 => Some(Self::Linear),
            2 => Some(Self::ArcCw),
            3 => Some(Self::ArcCcw),
            _ => None,
        }
    }

    /// G word for this mode
    pub fn gcode(&self) -> &'static str {
        match self {
            Self::Rapid => "G0",
            Self::Linear => "G1",
            Self::ArcCw => "G2",
            Self::ArcCcw => "G3",
        }
    }
}

/// Distance mode - Group 3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PositioningMode {
    /// G90
    #[default]
    Absolute,
    /// G91
    Incremental,
}

impl PositioningMode {
    /// G word for this mode
    pub fn gcode(&self) -> &'static str {
        match self {
            Self::Absolute => "G90",
            Self::Incremental => "G91",
        }
    }
}

/// Units - Group 6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    /// G21
    #[default]
    Millimeters,
    /// G20
    Inches,
}

impl Units {
    /// G word for these units
    pub fn gcode(&self) -> &'static str {
        match self {
            Self::Millimeters => "G21",
            Self::Inches => "G20",
        }
    }

    /// Factor converting program units to millimetres
    pub fn to_mm(&self) -> f64 {
        match self {
            Self::Millimeters => 1.0,
            Self::Inches => 25.4,
        }
    }
}

/// Plane selection - Group 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Plane {
    /// G17
    #[default]
    Xy,
    /// G18
    Zx,
    /// G19
    Yz,
}

impl Plane {
    /// G word for this plane
    pub fn gcode(&self) -> &'static str {
        match self {
            Self::Xy => "G17",
            Self::Zx => "G18",
            Self::Yz => "G19",
        }
    }
}

/// Spindle state - Group 7 (M)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpindleState {
    /// M5
    #[default]
    Off,
    /// M3
    Clockwise,
    /// M4
    CounterClockwise,
}

impl SpindleState {
    /// M word starting the spindle in this direction, `None` when off
    pub fn mcode(&self) -> Option<&'static str> {
        match self {
            Self::Off => None,
            Self::Clockwise => Some("M3"),
            Self::CounterClockwise => Some("M4"),
        }
    }
}

/// Programmed position; `None` means the axis value cannot be derived from the text
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisPosition {
    /// X in program units
    pub x: Option<f64>,
    /// Y in program units
    pub y: Option<f64>,
    /// Z in program units, cleared by every tool change
    pub z: Option<f64>,
}

impl AxisPosition {
    /// Whether X, Y, and Z are all known
    pub fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some() && self.z.is_some()
    }
}

/// M code switching an auxiliary output on
pub const AUX_OUTPUT_ON: u32 = 64;
/// M code switching an auxiliary output off
pub const AUX_OUTPUT_OFF: u32 = 65;

/// Interpreter context at a given program line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalState {
    /// Tool loaded by the last replayed tool change
    pub tool: Option<u32>,
    /// Tool staged by a `T` word, loaded by the next `M6`
    pub pending_tool: Option<u32>,
    /// Active motion mode
    pub motion_mode: MotionMode,
    /// Absolute or incremental positioning
    pub positioning_mode: PositioningMode,
    /// Program units
    pub units: Units,
    /// Arc plane
    pub plane: Plane,
    /// Last programmed feed
    pub feed_rate: Option<f64>,
    /// Spindle direction
    pub spindle_state: SpindleState,
    /// Last programmed spindle speed
    pub spindle_speed: f64,
    /// M8
    pub coolant_flood: bool,
    /// M7
    pub coolant_mist: bool,
    /// Active work coordinate system (54..=59)
    pub wcs: u32,
    /// Programmed position
    pub position: AxisPosition,
    /// Auxiliary outputs by output number
    pub aux_outputs: BTreeMap<String, bool>,
    /// A replayed `M6` cleared Z and no later Z word has set it again
    #[serde(default)]
    pub tool_change_replayed: bool,
}

impl Default for ModalState {
    fn default() -> Self {
        Self {
            tool: None,
            pending_tool: None,
            motion_mode: MotionMode::Rapid,
            positioning_mode: PositioningMode::Absolute,
            units: Units::Millimeters,
            plane: Plane::Xy,
            feed_rate: None,
            spindle_state: SpindleState::Off,
            spindle_speed: 0.0,
            coolant_flood: false,
            coolant_mist: false,
            wcs: 54,
            position: AxisPosition::default(),
            aux_outputs: BTreeMap::new(),
            tool_change_replayed: false,
        }
    }
}

impl ModalState {
    /// Create a new state with power-on defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// WCS selector word (`G54`..`G59`)
    pub fn wcs_gcode(&self) -> String {
        format!("G{}", self.wcs)
    }

    /// Apply one program line
    ///
    /// Words are applied left to right, so `G91 X10` moves incrementally.
    pub fn apply_line(&mut self, line: &str) {
        let words = parse_words(line);
        for word in &words {
            self.apply_word(word, &words);
        }
    }

    fn apply_word(&mut self, word: &Word, line_words: &[Word]) {
        match word.letter {
            'G' => {
                let Some(code) = word.code() else { return };
                match code {
                    0..=3 => {
                        if let Some(mode) = MotionMode::from_code(code) {
                            self.motion_mode = mode;
                        }
                    }
                    17 => self.plane = Plane::Xy,
                    18 => self.plane = Plane::Zx,
                    19 => self.plane = Plane::Yz,
                    20 => self.units = Units::Inches,
                    21 => self.units = Units::Millimeters,
                    54..=59 => self.wcs = code,
                    90 => self.positioning_mode = PositioningMode::Absolute,
                    91 => self.positioning_mode = PositioningMode::Incremental,
                    _ => {}
                }
            }
            'M' => {
                let Some(code) = word.code() else { return };
                match code {
                    3 => self.spindle_state = SpindleState::Clockwise,
                    4 => self.spindle_state = SpindleState::CounterClockwise,
                    5 => self.spindle_state = SpindleState::Off,
                    6 => self.apply_tool_change(line_words),
                    7 => self.coolant_mist = true,
                    8 => self.coolant_flood = true,
                    9 => {
                        self.coolant_mist = false;
                        self.coolant_flood = false;
                    }
                    AUX_OUTPUT_ON | AUX_OUTPUT_OFF => {
                        if let Some(port) = find_word(line_words, 'P') {
                            self.aux_outputs
                                .insert(format_number(port), code == AUX_OUTPUT_ON);
                        }
                    }
                    _ => {}
                }
            }
            'T' => {
                if let Some(tool) = word.code() {
                    self.pending_tool = Some(tool);
                }
            }
            'S' => {
                if word.value >= 0.0 {
                    self.spindle_speed = word.value;
                }
            }
            'F' => {
                if word.value > 0.0 {
                    self.feed_rate = Some(word.value);
                }
            }
            'X' => self.position.x = self.next_axis_value(self.position.x, word.value),
            'Y' => self.position.y = self.next_axis_value(self.position.y, word.value),
            'Z' => {
                self.position.z = self.next_axis_value(self.position.z, word.value);
                self.tool_change_replayed = false;
            }
            _ => {}
        }
    }

    fn next_axis_value(&self, current: Option<f64>, value: f64) -> Option<f64> {
        match (self.positioning_mode, current) {
            (PositioningMode::Incremental, Some(current)) => Some(current + value),
            _ => Some(value),
        }
    }

    // Physical state after a swap cannot be derived from the program text.
    fn apply_tool_change(&mut self, line_words: &[Word]) {
        let change = parse_tool_change_words(line_words);
        if let Some(tool) = change.tool_number.or(self.pending_tool) {
            self.tool = Some(tool);
            self.pending_tool = Some(tool);
        }
        self.position.z = None;
        self.tool_change_replayed = true;
        self.spindle_state = SpindleState::Off;
        self.spindle_speed = 0.0;
    }
}

/// Rebuild the modal state in effect just before `target_line` executes
///
/// Lines are 1-based; lines `1..target_line` are replayed. A target past the
/// end of the program replays the whole program.
pub fn analyze_to_line(text: &str, target_line: usize) -> ModalState {
    let mut state = ModalState::new();
    for line in text.lines().take(target_line.saturating_sub(1)) {
        state.apply_line(line);
    }
    state
}
