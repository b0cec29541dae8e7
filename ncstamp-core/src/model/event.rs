//! Stamping events raised by the parser and consumed by the handler
//! pipeline.

use std::time::Duration;

use super::line::Position;

/// Kind of machining sequence opened by a `StartSequence` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceKind {
    /// Regular machining with a tool engaged.
    #[default]
    Machining,
    /// Auxiliary operations (measurement, pallet handling, ...).
    NonMachining,
}

impl std::fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceKind::Machining => write!(f, "machining"),
            SequenceKind::NonMachining => write!(f, "non-machining"),
        }
    }
}

/// A recognized machining construct.
///
/// Events are ephemeral: the parser creates them, the handler pipeline
/// consumes them synchronously, then they are discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum StampingEventKind {
    /// A program header was recognized.
    StartProgram {
        /// Program name from the header, when present.
        name: Option<String>,
    },
    /// The program ended (`END PGM` or end of input).
    EndProgram {
        /// True when raised because the input ran out without an explicit
        /// program end block.
        end_of_file: bool,
    },
    /// A machining cycle begins.
    StartCycle,
    /// A machining cycle ends.
    StopCycle,
    /// A tool change was recognized.
    ToolChange {
        /// Tool identifier as written in the program.
        tool_number: String,
    },
    /// A new machining sequence begins.
    StartSequence { kind: SequenceKind },
    /// The current machining sequence ends.
    EndSequence,
    /// First non-trivial machining instruction of the current sequence.
    Machining,
    /// Machining time contributed by the current block.
    MachiningTime { elapsed: Duration },
    /// A program comment.
    Comment { text: String },
    /// Generic marker with an arbitrary payload.
    Data {
        key: String,
        value: serde_json::Value,
    },
}

impl StampingEventKind {
    /// Short label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            StampingEventKind::StartProgram { .. } => "start-program",
            StampingEventKind::EndProgram { .. } => "end-program",
            StampingEventKind::StartCycle => "start-cycle",
            StampingEventKind::StopCycle => "stop-cycle",
            StampingEventKind::ToolChange { .. } => "tool-change",
            StampingEventKind::StartSequence { .. } => "start-sequence",
            StampingEventKind::EndSequence => "end-sequence",
            StampingEventKind::Machining => "machining",
            StampingEventKind::MachiningTime { .. } => "machining-time",
            StampingEventKind::Comment { .. } => "comment",
            StampingEventKind::Data { .. } => "data",
        }
    }
}

/// An event together with the position of the line that triggered it.
#[derive(Debug, Clone, PartialEq)]
pub struct StampingEvent {
    /// Position of the originating line.
    pub position: Position,
    /// What was recognized.
    pub kind: StampingEventKind,
}

impl StampingEvent {
    /// Create an event at the given position.
    pub fn new(position: Position, kind: StampingEventKind) -> Self {
        Self { position, kind }
    }
}
