//! Run-scoped state shared by the event handlers.

use std::collections::HashMap;
use std::time::Duration;

/// Shared accumulator for one stamping run.
///
/// Handlers never talk to each other directly; whatever has to cross a
/// handler boundary goes through this structure. It is owned by the
/// orchestrator and handed to the pipeline one event dispatch at a time.
#[derive(Debug, Default)]
pub struct StampingData {
    source: Option<String>,
    destination: Option<String>,
    tool_number: Option<String>,
    next_stamp_value: u64,
    sequence_stamp_value: Option<f64>,
    sequence_count: u32,
    machining_time: Duration,
    parse_errors: u32,
    tags: HashMap<String, serde_json::Value>,
}

impl StampingData {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the source program, when known.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    /// Name of the instrumented destination, when known.
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    pub fn set_destination(&mut self, destination: impl Into<String>) {
        self.destination = Some(destination.into());
    }

    /// Tool currently engaged.
    pub fn tool_number(&self) -> Option<&str> {
        self.tool_number.as_deref()
    }

    pub fn set_tool_number(&mut self, tool_number: impl Into<String>) {
        self.tool_number = Some(tool_number.into());
    }

    /// Allocate the next stamp value. Values start at 1 and are shared by
    /// sequence and cycle stamps so every stamp in a run is unique.
    pub fn allocate_stamp_value(&mut self) -> u64 {
        self.next_stamp_value += 1;
        self.next_stamp_value
    }

    /// Value of the active sequence stamp, if a sequence is open.
    pub fn sequence_stamp_value(&self) -> Option<f64> {
        self.sequence_stamp_value
    }

    pub fn set_sequence_stamp_value(&mut self, value: f64) {
        self.sequence_stamp_value = Some(value);
        self.sequence_count += 1;
    }

    pub fn clear_sequence_stamp_value(&mut self) {
        self.sequence_stamp_value = None;
    }

    /// Number of sequences stamped so far.
    pub fn sequence_count(&self) -> u32 {
        self.sequence_count
    }

    /// Total machining time recorded for the run.
    pub fn machining_time(&self) -> Duration {
        self.machining_time
    }

    pub fn add_machining_time(&mut self, elapsed: Duration) {
        self.machining_time += elapsed;
    }

    /// Number of recoverable parse errors encountered.
    pub fn parse_errors(&self) -> u32 {
        self.parse_errors
    }

    pub fn record_parse_error(&mut self) {
        self.parse_errors += 1;
    }

    /// Store a cross-reference tag for later correlation.
    pub fn set_tag(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.tags.insert(key.into(), value);
    }

    /// Look up a tag by key.
    pub fn tag(&self, key: &str) -> Option<&serde_json::Value> {
        self.tags.get(key)
    }

    /// All recorded tags.
    pub fn tags(&self) -> &HashMap<String, serde_json::Value> {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_value_allocation() {
        let mut data = StampingData::new();
        assert_eq!(data.allocate_stamp_value(), 1);
        assert_eq!(data.allocate_stamp_value(), 2);
        assert!(data.sequence_stamp_value().is_none());

        data.set_sequence_stamp_value(3.0);
        assert_eq!(data.sequence_stamp_value(), Some(3.0));
        assert_eq!(data.sequence_count(), 1);

        data.clear_sequence_stamp_value();
        assert!(data.sequence_stamp_value().is_none());
        assert_eq!(data.sequence_count(), 1);
    }
}
