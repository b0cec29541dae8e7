//! Machining time recording and milestone stamp emission.

use std::time::Duration;

use tracing::debug;

use crate::config::StampingConfig;
use crate::error::Result;
use crate::generator::MilestoneStampLineCreator;
use crate::model::{StampingEvent, StampingEventKind};

use super::{EventContext, StampingEventHandler};

/// Accumulates machining time and emits milestone stamps.
///
/// Must be registered after [`super::SequenceStampHandler`]: the
/// milestone value references the active sequence stamp value, which the
/// sequence handler maintains.
#[derive(Debug)]
pub struct MilestoneHandler {
    creator: Option<MilestoneStampLineCreator>,
    frequency: Duration,
    /// Machining time since the sequence started.
    sequence_elapsed: Duration,
    /// Machining time since the last milestone stamp.
    since_milestone: Duration,
}

impl MilestoneHandler {
    /// Build from the run configuration.
    pub fn new(config: &StampingConfig) -> Self {
        Self {
            creator: MilestoneStampLineCreator::auto(&config.variables, &config.formatter),
            frequency: config.time.milestone_frequency(),
            sequence_elapsed: Duration::ZERO,
            since_milestone: Duration::ZERO,
        }
    }

    fn reset(&mut self) {
        self.sequence_elapsed = Duration::ZERO;
        self.since_milestone = Duration::ZERO;
    }
}

impl StampingEventHandler for MilestoneHandler {
    fn name(&self) -> &'static str {
        "milestone"
    }

    fn handle(&mut self, event: &StampingEvent, ctx: &mut EventContext<'_>) -> Result<()> {
        match &event.kind {
            StampingEventKind::StartSequence { .. } => {
                self.reset();
                if let Some(creator) = &self.creator {
                    if let Some(line) = creator.create_reset_milestone_line() {
                        ctx.emit_after(line);
                    }
                }
            }
            StampingEventKind::EndSequence => {
                self.reset();
            }
            StampingEventKind::MachiningTime { elapsed } => {
                ctx.data.add_machining_time(*elapsed);
                self.sequence_elapsed += *elapsed;
                self.since_milestone += *elapsed;
                if self.frequency > Duration::ZERO && self.since_milestone >= self.frequency {
                    if let Some(creator) = &self.creator {
                        if let Some(line) =
                            creator.create_milestone_stamp_line(self.sequence_elapsed, ctx.data)
                        {
                            debug!(
                                elapsed_s = self.sequence_elapsed.as_secs(),
                                "emitting milestone stamp"
                            );
                            ctx.emit_after(line);
                        }
                    }
                    self.since_milestone = Duration::ZERO;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
