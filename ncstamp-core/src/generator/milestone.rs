//! Milestone stamp line strategies.
//!
//! A milestone stamp reports elapsed machining time back to the
//! monitoring system while a sequence is running. Two strategies exist:
//! a dedicated milestone variable, or folding the elapsed minutes into
//! the fractional part of the current sequence stamp value. The strategy
//! is selected once per run; the two are not interchangeable mid-stream.

use std::time::Duration;

use crate::config::{
    FormatterConfig, StampVariableSet, MILESTONE_FRACTION_DIGITS, MILESTONE_FRACTION_SCALE,
};
use crate::model::StampingData;

use super::formatter::StampLineFormatter;

fn elapsed_minutes(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() / 60.0
}

/// Milestone stamps written to a dedicated variable.
#[derive(Debug, Clone)]
pub struct MilestoneWithVariable {
    variable: String,
    formatter: StampLineFormatter,
}

impl MilestoneWithVariable {
    pub fn new(variable: impl Into<String>, formatter: &FormatterConfig) -> Self {
        Self {
            variable: variable.into(),
            formatter: StampLineFormatter::from_config(formatter),
        }
    }

    /// Milestone line carrying the elapsed minutes, rounded.
    pub fn create_milestone_stamp_line(
        &self,
        elapsed: Duration,
        data: &StampingData,
    ) -> Option<String> {
        // Without an active sequence stamp the milestone cannot be
        // correlated to anything; emit nothing.
        data.sequence_stamp_value()?;
        Some(
            self.formatter
                .format_line(&self.variable, elapsed_minutes(elapsed)),
        )
    }

    /// Line resetting the milestone variable to zero.
    pub fn create_reset_milestone_line(&self) -> Option<String> {
        Some(self.formatter.format_line(&self.variable, 0.0))
    }
}

/// Milestone folded into the fractional part of the sequence stamp.
///
/// The integral part of the emitted value stays the sequence stamp id;
/// the fractional part encodes the elapsed minutes scaled by
/// [`MILESTONE_FRACTION_SCALE`].
#[derive(Debug, Clone)]
pub struct MilestoneWithStamp {
    sequence_variable: String,
    formatter: StampLineFormatter,
}

impl MilestoneWithStamp {
    pub fn new(sequence_variable: impl Into<String>, formatter: &FormatterConfig) -> Self {
        let formatter = StampLineFormatter::from_config(formatter)
            .with_fraction_digits(MILESTONE_FRACTION_DIGITS);
        Self {
            sequence_variable: sequence_variable.into(),
            formatter,
        }
    }

    /// Milestone line re-assigning the sequence variable with the elapsed
    /// minutes folded into the fractional part.
    pub fn create_milestone_stamp_line(
        &self,
        elapsed: Duration,
        data: &StampingData,
    ) -> Option<String> {
        let sequence_value = data.sequence_stamp_value()?;
        let minutes = elapsed_minutes(elapsed).round();
        let value = sequence_value + minutes * MILESTONE_FRACTION_SCALE;
        Some(self.formatter.format_line(&self.sequence_variable, value))
    }

    /// This strategy has no reset line.
    pub fn create_reset_milestone_line(&self) -> Option<String> {
        None
    }
}

/// Run-scoped milestone strategy, selected once at startup.
#[derive(Debug, Clone)]
pub enum MilestoneStampLineCreator {
    WithVariable(MilestoneWithVariable),
    WithStamp(MilestoneWithStamp),
}

impl MilestoneStampLineCreator {
    /// Pick the strategy the configuration supports: the dedicated
    /// variable when one is configured, the sequence-stamp fold
    /// otherwise. `None` when neither variable exists.
    pub fn auto(variables: &StampVariableSet, formatter: &FormatterConfig) -> Option<Self> {
        if let Some(variable) = &variables.milestone_variable {
            Some(Self::WithVariable(MilestoneWithVariable::new(
                variable, formatter,
            )))
        } else {
            variables
                .sequence_stamp_variable
                .as_ref()
                .map(|sequence| Self::WithStamp(MilestoneWithStamp::new(sequence, formatter)))
        }
    }

    /// Create a milestone stamp line for the elapsed sequence time.
    pub fn create_milestone_stamp_line(
        &self,
        elapsed: Duration,
        data: &StampingData,
    ) -> Option<String> {
        match self {
            Self::WithVariable(creator) => creator.create_milestone_stamp_line(elapsed, data),
            Self::WithStamp(creator) => creator.create_milestone_stamp_line(elapsed, data),
        }
    }

    /// Create the reset line for the strategy, when it has one.
    pub fn create_reset_milestone_line(&self) -> Option<String> {
        match self {
            Self::WithVariable(creator) => creator.create_reset_milestone_line(),
            Self::WithStamp(creator) => creator.create_reset_milestone_line(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn test_with_variable_strategy() {
        let variables = StampVariableSet {
            sequence_stamp_variable: Some("Q5".to_string()),
            milestone_variable: Some("Q6".to_string()),
            ..Default::default()
        };
        let creator =
            MilestoneStampLineCreator::auto(&variables, &FormatterConfig::default()).unwrap();
        assert!(matches!(
            creator,
            MilestoneStampLineCreator::WithVariable(_)
        ));

        let mut data = StampingData::new();
        data.set_sequence_stamp_value(1.0);

        let line = creator
            .create_milestone_stamp_line(minutes(12), &data)
            .unwrap();
        assert_eq!(line, "FN 0: Q6 = 12");
        assert_eq!(
            creator.create_reset_milestone_line().unwrap(),
            "FN 0: Q6 = 0"
        );
    }

    #[test]
    fn test_with_stamp_strategy_folds_minutes() {
        let variables = StampVariableSet {
            sequence_stamp_variable: Some("Q5".to_string()),
            ..Default::default()
        };
        let creator =
            MilestoneStampLineCreator::auto(&variables, &FormatterConfig::default()).unwrap();
        assert!(matches!(creator, MilestoneStampLineCreator::WithStamp(_)));

        let mut data = StampingData::new();
        data.set_sequence_stamp_value(3.0);

        let line = creator
            .create_milestone_stamp_line(minutes(10), &data)
            .unwrap();
        assert_eq!(line, "FN 0: Q5 = 3.01");

        let line = creator
            .create_milestone_stamp_line(minutes(30), &data)
            .unwrap();
        assert_eq!(line, "FN 0: Q5 = 3.03");

        assert!(creator.create_reset_milestone_line().is_none());
    }

    #[test]
    fn test_no_active_sequence_stamp_emits_nothing() {
        let data = StampingData::new();

        let with_variable = MilestoneWithVariable::new("Q6", &FormatterConfig::default());
        assert!(with_variable
            .create_milestone_stamp_line(minutes(5), &data)
            .is_none());

        let with_stamp = MilestoneWithStamp::new("Q5", &FormatterConfig::default());
        assert!(with_stamp
            .create_milestone_stamp_line(minutes(5), &data)
            .is_none());
    }

    #[test]
    fn test_auto_requires_some_variable() {
        let creator =
            MilestoneStampLineCreator::auto(&StampVariableSet::default(), &FormatterConfig::default());
        assert!(creator.is_none());
    }
}
