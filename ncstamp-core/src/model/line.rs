//! Line and position types for the streaming pipe.

use serde::{Deserialize, Serialize};

/// Offset of a line in the stamping stream.
///
/// Positions are assigned sequentially as lines are accepted by the pipe
/// and stay stable for the lifetime of a run. The pipe only ever moves
/// its resolved position forward, so holders of a `Position` can rely on
/// it addressing the same line until the run completes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    /// Position of the first line of a stream.
    pub const START: Position = Position(0);

    /// Create a position from a raw offset.
    pub fn new(offset: u64) -> Self {
        Position(offset)
    }

    /// Raw offset value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// Position of the following line.
    pub fn next(self) -> Self {
        Position(self.0 + 1)
    }

    /// Number of lines between `earlier` and `self`.
    ///
    /// Returns zero when `earlier` is not actually earlier.
    pub fn lines_since(self, earlier: Position) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One logical line of program text, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Offset of this line in the stream.
    pub position: Position,
    /// Raw line content.
    pub text: String,
}

impl Line {
    /// Create a line at the given position.
    pub fn new(position: Position, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        let a = Position::START;
        let b = a.next();
        assert!(a < b);
        assert_eq!(b.value(), 1);
        assert_eq!(b.lines_since(a), 1);
        assert_eq!(a.lines_since(b), 0);
    }
}
