//! Rendering of `(variable, value)` pairs into literal program lines.

use crate::config::FormatterConfig;

/// Placeholder for the variable name in a format string.
pub const VARIABLE_PLACEHOLDER: &str = "{variable}";

/// Placeholder for the rendered value in a format string.
pub const VALUE_PLACEHOLDER: &str = "{value}";

/// Renders a variable assignment as one literal program line.
///
/// The numeric rendering is locale-invariant: the decimal separator is
/// always `.`, whatever the host locale says. The target controller
/// parses the emitted text with a fixed numeric grammar, so any other
/// separator corrupts the program.
#[derive(Debug, Clone)]
pub struct StampLineFormatter {
    format: String,
    fraction_digits: u8,
    multiplier: f64,
}

impl StampLineFormatter {
    /// Create a formatter with the given format string.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            fraction_digits: 0,
            multiplier: 1.0,
        }
    }

    /// Create a formatter from run configuration.
    pub fn from_config(config: &FormatterConfig) -> Self {
        Self {
            format: config.format.clone(),
            fraction_digits: config.fraction_digits,
            multiplier: config.multiplier,
        }
    }

    /// Number of fractional digits kept after rounding.
    pub fn with_fraction_digits(mut self, fraction_digits: u8) -> Self {
        self.fraction_digits = fraction_digits;
        self
    }

    /// Multiplier applied to the value before rounding.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Render one stamp line for `variable` and `value`.
    pub fn format_line(&self, variable: &str, value: f64) -> String {
        self.format
            .replace(VARIABLE_PLACEHOLDER, variable)
            .replace(VALUE_PLACEHOLDER, &self.format_value(value))
    }

    /// Render the numeric part: `round(value * multiplier, digits)` with a
    /// `.` separator and trailing zeros trimmed.
    pub fn format_value(&self, value: f64) -> String {
        let scaled = value * self.multiplier;
        let factor = 10f64.powi(i32::from(self.fraction_digits));
        // Round half away from zero, like the controllers expect.
        let rounded = (scaled * factor).round() / factor;

        if rounded == 0.0 {
            return "0".to_string();
        }
        if rounded.fract() == 0.0 && rounded.abs() < 1e15 {
            return format!("{}", rounded as i64);
        }

        let formatted = format!("{:.prec$}", rounded, prec = self.fraction_digits as usize);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        if trimmed.is_empty() || trimmed == "-" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl Default for StampLineFormatter {
    fn default() -> Self {
        Self::from_config(&FormatterConfig::default())
    }
}
