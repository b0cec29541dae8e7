//! Configuration validation.

use crate::config::StampingConfig;

/// Result of validating a run configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// True when no error was found (warnings do not fail validation).
    pub passed: bool,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
    /// Fatal findings; the orchestrator refuses to start with any.
    pub errors: Vec<String>,
}

/// Validate a stamping configuration before a run starts.
pub fn validate_config(config: &StampingConfig) -> ValidationResult {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    if config.variables.is_empty() {
        errors.push(
            "no stamp variable configured; the run would not instrument anything".to_string(),
        );
    }

    if config.time.milestone_frequency_minutes <= 0.0 {
        errors.push(format!(
            "milestone frequency must be positive, got {}",
            config.time.milestone_frequency_minutes
        ));
    }

    if config.variables.stop_cycle_variable.is_none()
        && config.variables.start_cycle_variable.is_some()
    {
        warnings.push("no stop-cycle variable: cycle ends will not be stamped".to_string());
    }

    if config.variables.milestone_variable.is_none() {
        if config.variables.sequence_stamp_variable.is_some() {
            warnings.push(
                "no milestone variable: milestones will be folded into the sequence stamp"
                    .to_string(),
            );
        } else {
            warnings.push("no milestone or sequence variable: milestones disabled".to_string());
        }
    }

    if !config.formatter.format.contains("{variable}")
        || !config.formatter.format.contains("{value}")
    {
        errors.push(format!(
            "format string must contain {{variable}} and {{value}} placeholders, got {:?}",
            config.formatter.format
        ));
    }

    if config.formatter.multiplier == 0.0 {
        errors.push("formatter multiplier must not be zero".to_string());
    }

    ValidationResult {
        passed: errors.is_empty(),
        warnings,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StampingConfig;

    #[test]
    fn test_empty_variable_set_fails() {
        let result = validate_config(&StampingConfig::default());
        assert!(!result.passed);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn test_sequence_only_config_passes_with_warnings() {
        let config = StampingConfig::with_sequence_variable("Q5");
        let result = validate_config(&config);
        assert!(result.passed);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("folded into the sequence stamp")));
    }

    #[test]
    fn test_bad_format_string_fails() {
        let mut config = StampingConfig::with_sequence_variable("Q5");
        config.formatter.format = "Q5 = value".to_string();
        let result = validate_config(&config);
        assert!(!result.passed);
    }

    #[test]
    fn test_non_positive_frequency_fails() {
        let mut config = StampingConfig::with_sequence_variable("Q5");
        config.time.milestone_frequency_minutes = 0.0;
        let result = validate_config(&config);
        assert!(!result.passed);
    }
}
