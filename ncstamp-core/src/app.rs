//! Orchestration: wiring a parser, handlers and a pipe into a run.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{debug, info};

use crate::config::{StampingConfig, DEFAULT_PIPE_CAPACITY};
use crate::error::{Result, StampingError};
use crate::handlers::{
    EventLogger, HandlerPipeline, MilestoneHandler, SequenceStampHandler, StampingEventHandler,
    TagHandler,
};
use crate::model::StampingData;
use crate::parser::{HeidenhainParser, StampingParser};
use crate::stamper::pipe;
use crate::validation::validate_config;

/// Outcome of a completed stamping run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StampingSummary {
    /// Lines read from the source.
    pub lines_read: u64,
    /// Lines released to the sink verbatim.
    pub lines_released: u64,
    /// Lines discarded (existing stamps).
    pub lines_skipped: u64,
    /// Generated stamp lines written.
    pub stamps_written: u64,
    /// Machining sequences stamped.
    pub sequences: u32,
    /// Total machining time recognized, in seconds.
    pub machining_time_s: f64,
    /// Recoverable parse errors.
    pub parse_errors: u32,
}

/// Builder wiring a run together.
///
/// Handlers are dispatched in registration order;
/// [`StampingApplicationBuilder::register_default_handlers`] installs the
/// standard order (logging, sequence stamps, milestones, tags). Time
/// recording has to observe tool-change detection, so the milestone
/// handler always comes after the sequence handler.
pub struct StampingApplicationBuilder {
    config: StampingConfig,
    pipeline: HandlerPipeline,
    pipe_capacity: usize,
}

impl StampingApplicationBuilder {
    /// Start building a run with the given configuration.
    pub fn new(config: StampingConfig) -> Self {
        Self {
            config,
            pipeline: HandlerPipeline::new(),
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
        }
    }

    /// Install the standard handler set in its contractual order.
    pub fn register_default_handlers(mut self) -> Self {
        self.pipeline.register(Box::new(EventLogger::new()));
        self.pipeline
            .register(Box::new(SequenceStampHandler::new(&self.config)));
        self.pipeline
            .register(Box::new(MilestoneHandler::new(&self.config)));
        self.pipeline.register(Box::new(TagHandler::new()));
        self
    }

    /// Append a custom handler after the ones registered so far.
    pub fn register_handler(mut self, handler: Box<dyn StampingEventHandler>) -> Self {
        self.pipeline.register(handler);
        self
    }

    /// Capacity of the pipe's pending line buffer.
    pub fn pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity;
        self
    }

    /// Validate the configuration and build the application.
    ///
    /// Fails fast when the configuration makes the run meaningless, so
    /// no pipe is ever created for a doomed run.
    pub fn build(self) -> Result<StampingApplication> {
        let validation = validate_config(&self.config);
        for warning in &validation.warnings {
            tracing::warn!("{warning}");
        }
        if !validation.passed {
            let message = validation.errors.join("; ");
            if self.config.variables.is_empty() {
                return Err(StampingError::NoVariablesConfigured);
            }
            return Err(StampingError::InvalidConfig { message });
        }
        Ok(StampingApplication {
            config: self.config,
            pipeline: self.pipeline,
            pipe_capacity: self.pipe_capacity,
        })
    }
}

/// A fully wired stamping run.
pub struct StampingApplication {
    config: StampingConfig,
    pipeline: HandlerPipeline,
    pipe_capacity: usize,
}

impl std::fmt::Debug for StampingApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StampingApplication")
            .field("config", &self.config)
            .field("handlers", &self.pipeline.len())
            .field("pipe_capacity", &self.pipe_capacity)
            .finish()
    }
}

impl StampingApplication {
    /// Run configuration.
    pub fn config(&self) -> &StampingConfig {
        &self.config
    }

    /// Drive the default parser over `source`, writing the instrumented
    /// program to `sink`.
    pub async fn run<R, W>(&mut self, source: R, sink: W) -> Result<StampingSummary>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send,
    {
        let mut parser = HeidenhainParser::new(&self.config);
        self.run_with_parser(&mut parser, source, sink).await
    }

    /// Drive a custom parser over `source`.
    ///
    /// The producer feeding the pipe runs on its own task; the parser and
    /// the handler pipeline run on the caller's task. Dropping the
    /// returned future cancels the run; nothing past the last released
    /// span reaches the sink in that case.
    pub async fn run_with_parser<P, R, W>(
        &mut self,
        parser: &mut P,
        source: R,
        sink: W,
    ) -> Result<StampingSummary>
    where
        P: StampingParser,
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send,
    {
        let (sender, mut stamper) = pipe(sink, self.config.line_ending, self.pipe_capacity);

        let producer = tokio::spawn(async move {
            let mut lines = source.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if sender.send(line).await.is_err() {
                            // Consumer is gone; stop feeding.
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        });

        let mut data = StampingData::new();
        parser
            .parse(&mut stamper, &mut self.pipeline, &mut data)
            .await?;
        stamper.finish().await?;

        match producer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(StampingError::Io(e)),
            Err(e) => {
                return Err(StampingError::Io(std::io::Error::other(format!(
                    "producer task failed: {e}"
                ))))
            }
        }

        let summary = StampingSummary {
            lines_read: stamper.lines_read(),
            lines_released: stamper.lines_released(),
            lines_skipped: stamper.lines_skipped(),
            stamps_written: stamper.stamps_written(),
            sequences: data.sequence_count(),
            machining_time_s: data.machining_time().as_secs_f64(),
            parse_errors: data.parse_errors(),
        };
        debug!(?summary, "stamping run finished");
        info!(
            "stamped {} line(s): {} released, {} skipped, {} stamp(s) injected",
            summary.lines_read, summary.lines_released, summary.lines_skipped, summary.stamps_written
        );
        Ok(summary)
    }
}
