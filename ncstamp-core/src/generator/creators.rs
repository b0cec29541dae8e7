//! Sequence and cycle stamp line creators.

use crate::config::{FormatterConfig, StampVariableSet};
use crate::model::StampingData;

use super::formatter::StampLineFormatter;

/// Creates sequence stamp lines.
///
/// Each created stamp allocates the next run-wide stamp value and records
/// it as the active sequence stamp value, so the milestone creators can
/// reference it later.
#[derive(Debug, Clone)]
pub struct SequenceStampLineCreator {
    variable: Option<String>,
    formatter: StampLineFormatter,
}

impl SequenceStampLineCreator {
    /// Build from the run configuration.
    pub fn new(variables: &StampVariableSet, formatter: &FormatterConfig) -> Self {
        Self {
            variable: variables.sequence_stamp_variable.clone(),
            formatter: StampLineFormatter::from_config(formatter),
        }
    }

    /// Create the stamp line opening a new sequence.
    ///
    /// Returns `None` when no sequence variable is configured; no stamp
    /// value is allocated in that case.
    pub fn create_sequence_stamp_line(&self, data: &mut StampingData) -> Option<String> {
        let variable = self.variable.as_deref()?;
        let value = data.allocate_stamp_value() as f64;
        data.set_sequence_stamp_value(value);
        Some(self.formatter.format_line(variable, value))
    }
}

/// Creates start-cycle and stop-cycle stamp lines.
#[derive(Debug, Clone)]
pub struct CycleStampLineCreator {
    start_variable: Option<String>,
    stop_variable: Option<String>,
    formatter: StampLineFormatter,
}

impl CycleStampLineCreator {
    /// Build from the run configuration.
    pub fn new(variables: &StampVariableSet, formatter: &FormatterConfig) -> Self {
        Self {
            start_variable: variables.start_cycle_variable.clone(),
            stop_variable: variables.stop_cycle_variable.clone(),
            formatter: StampLineFormatter::from_config(formatter),
        }
    }

    /// Create the stamp line marking a cycle start.
    pub fn create_start_cycle_stamp_line(&self, data: &mut StampingData) -> Option<String> {
        let variable = self.start_variable.as_deref()?;
        let value = data.allocate_stamp_value() as f64;
        Some(self.formatter.format_line(variable, value))
    }

    /// Create the stamp line marking a cycle stop.
    pub fn create_stop_cycle_stamp_line(&self, data: &mut StampingData) -> Option<String> {
        let variable = self.stop_variable.as_deref()?;
        let value = data.allocate_stamp_value() as f64;
        Some(self.formatter.format_line(variable, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variables() -> StampVariableSet {
        StampVariableSet {
            sequence_stamp_variable: Some("Q5".to_string()),
            start_cycle_variable: Some("Q10".to_string()),
            stop_cycle_variable: None,
            milestone_variable: None,
        }
    }

    #[test]
    fn test_sequence_stamp_records_active_value() {
        let creator = SequenceStampLineCreator::new(&variables(), &FormatterConfig::default());
        let mut data = StampingData::new();

        let line = creator.create_sequence_stamp_line(&mut data).unwrap();
        assert_eq!(line, "FN 0: Q5 = 1");
        assert_eq!(data.sequence_stamp_value(), Some(1.0));

        let line = creator.create_sequence_stamp_line(&mut data).unwrap();
        assert_eq!(line, "FN 0: Q5 = 2");
    }

    #[test]
    fn test_missing_variable_creates_nothing() {
        let creator =
            SequenceStampLineCreator::new(&StampVariableSet::default(), &FormatterConfig::default());
        let mut data = StampingData::new();
        assert!(creator.create_sequence_stamp_line(&mut data).is_none());
        // No value may be allocated for a stamp that is never emitted.
        assert_eq!(data.allocate_stamp_value(), 1);
    }

    #[test]
    fn test_cycle_stamps() {
        let creator = CycleStampLineCreator::new(&variables(), &FormatterConfig::default());
        let mut data = StampingData::new();

        let line = creator.create_start_cycle_stamp_line(&mut data).unwrap();
        assert_eq!(line, "FN 0: Q10 = 1");
        assert!(creator.create_stop_cycle_stamp_line(&mut data).is_none());
    }
}
