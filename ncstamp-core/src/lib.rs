//! ncstamp-core - NC program stamping pipeline.
//!
//! This library instruments NC (numerically-controlled) machining
//! programs with variable-assignment lines ("stamps") so that, when the
//! instrumented program runs on the machine controller, the controller
//! itself reports machining progress back to the monitoring system.
//!
//! The pipeline streams the program line by line through a
//! position-addressable pipe ([`stamper`]), recognizes machining
//! constructs with a pluggable parser ([`parser`]), and lets an ordered
//! set of event handlers ([`handlers`]) inject stamp lines produced by
//! the generators ([`generator`]).
//!
//! # Example
//!
//! ```no_run
//! use ncstamp_core::{stamp_file, StampingConfig};
//! use std::path::Path;
//!
//! # async fn demo() -> ncstamp_core::Result<()> {
//! let config = StampingConfig::with_sequence_variable("Q5");
//! let summary = stamp_file(
//!     Path::new("wheel.h"),
//!     Path::new("wheel.stamped.h"),
//!     config,
//! )
//! .await?;
//! println!("{} stamps injected", summary.stamps_written);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod model;
pub mod parser;
pub mod stamper;
pub mod validation;

// Re-exports for convenience
pub use app::{StampingApplication, StampingApplicationBuilder, StampingSummary};
pub use config::{FormatterConfig, StampVariableSet, StampingConfig, TimeConfig, Unit};
pub use error::{Result, StampingError};
pub use model::{Line, Position, SequenceKind, StampingData, StampingEvent, StampingEventKind};
pub use stamper::{pipe, LineEnding, LineSender, Stamper};
pub use validation::{validate_config, ValidationResult};

use std::path::Path;

use tokio::io::BufWriter;

/// Stamp an NC program file.
///
/// This is the main high-level entry point: it validates the
/// configuration, streams `input` through the stamping pipeline and
/// writes the instrumented program to `output`.
pub async fn stamp_file(
    input: &Path,
    output: &Path,
    config: StampingConfig,
) -> Result<StampingSummary> {
    if !input.exists() {
        return Err(StampingError::FileNotFound {
            path: input.to_path_buf(),
        });
    }

    let mut app = StampingApplicationBuilder::new(config)
        .register_default_handlers()
        .build()?;

    let source = tokio::io::BufReader::new(tokio::fs::File::open(input).await?);
    let mut sink = BufWriter::new(tokio::fs::File::create(output).await?);
    let summary = app.run(source, &mut sink).await?;
    Ok(summary)
}

/// Stamp an in-memory NC program, returning the instrumented text.
pub async fn stamp_string(
    input: &str,
    config: StampingConfig,
) -> Result<(String, StampingSummary)> {
    let mut app = StampingApplicationBuilder::new(config)
        .register_default_handlers()
        .build()?;

    let source = std::io::Cursor::new(input.as_bytes().to_vec());
    let mut sink = Vec::new();
    let summary = app.run(source, &mut sink).await?;
    let text = String::from_utf8(sink)
        .map_err(|e| StampingError::Io(std::io::Error::other(e)))?;
    Ok((text, summary))
}
