//! Configuration for a stamping run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default format string for stamp lines (Heidenhain `FN 0` assignment).
pub const DEFAULT_STAMP_FORMAT: &str = "FN 0: {variable} = {value}";

/// Default milestone trigger frequency in minutes.
pub const DEFAULT_MILESTONE_FREQUENCY_MINUTES: f64 = 10.0;

/// Scale used to fold elapsed minutes into the fractional part of a
/// sequence stamp value when no dedicated milestone variable exists.
pub const MILESTONE_FRACTION_SCALE: f64 = 0.001;

/// Fraction digits required to render a folded milestone value.
pub const MILESTONE_FRACTION_DIGITS: u8 = 3;

/// Default capacity of the pipe's pending line channel.
pub const DEFAULT_PIPE_CAPACITY: usize = 256;

/// Unit of measurement declared by the program header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    Millimeters,
    Inches,
}

impl Unit {
    /// Parse the unit suffix of a `BEGIN PGM` block.
    pub fn from_program_header(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "MM" => Some(Unit::Millimeters),
            "INCH" => Some(Unit::Inches),
            _ => None,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Millimeters => write!(f, "mm"),
            Unit::Inches => write!(f, "inch"),
        }
    }
}

/// Names of the controller variables that receive stamp values.
///
/// Supplied once per run and never mutated by the pipeline. A variable
/// left unset disables the corresponding stamp kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampVariableSet {
    /// Variable receiving sequence stamps (e.g. `Q5`).
    pub sequence_stamp_variable: Option<String>,
    /// Variable receiving the start-cycle stamp.
    pub start_cycle_variable: Option<String>,
    /// Variable receiving the stop-cycle stamp.
    pub stop_cycle_variable: Option<String>,
    /// Dedicated milestone variable; when unset, milestones are folded
    /// into the fractional part of the sequence stamp value.
    pub milestone_variable: Option<String>,
}

impl StampVariableSet {
    /// True when no variable at all is configured.
    pub fn is_empty(&self) -> bool {
        self.sequence_stamp_variable.is_none()
            && self.start_cycle_variable.is_none()
            && self.stop_cycle_variable.is_none()
            && self.milestone_variable.is_none()
    }

    /// All configured variable names, for existing-stamp detection.
    pub fn configured_variables(&self) -> Vec<&str> {
        [
            self.sequence_stamp_variable.as_deref(),
            self.start_cycle_variable.as_deref(),
            self.stop_cycle_variable.as_deref(),
            self.milestone_variable.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Run-scoped time policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Minimum machining time between two milestone stamps, in minutes.
    pub milestone_frequency_minutes: f64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            milestone_frequency_minutes: DEFAULT_MILESTONE_FREQUENCY_MINUTES,
        }
    }
}

impl TimeConfig {
    /// Milestone trigger frequency as a duration.
    pub fn milestone_frequency(&self) -> Duration {
        Duration::from_secs_f64(self.milestone_frequency_minutes.max(0.0) * 60.0)
    }
}

/// Options controlling how stamp lines are rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Format string with `{variable}` and `{value}` placeholders.
    pub format: String,
    /// Number of fractional digits kept after rounding.
    pub fraction_digits: u8,
    /// Multiplier applied to the value before rounding.
    pub multiplier: f64,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_STAMP_FORMAT.to_string(),
            fraction_digits: 0,
            multiplier: 1.0,
        }
    }
}

/// Full configuration of a stamping run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampingConfig {
    /// Stamp variable names.
    pub variables: StampVariableSet,
    /// Time policy (milestone frequency).
    pub time: TimeConfig,
    /// Stamp line rendering options.
    pub formatter: FormatterConfig,
    /// Line-ending convention for the instrumented program.
    pub line_ending: crate::stamper::LineEnding,
    /// Delay the sequence stamp until the first machining instruction of
    /// the sequence, so empty sequences are never stamped.
    pub defer_sequence_stamp: bool,
    /// Drop stamp lines already present in the input (re-stamping).
    pub strip_existing_stamps: bool,
}

impl StampingConfig {
    /// Create a configuration stamping sequences into `variable`.
    pub fn with_sequence_variable(variable: impl Into<String>) -> Self {
        Self {
            variables: StampVariableSet {
                sequence_stamp_variable: Some(variable.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
