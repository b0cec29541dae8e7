//! Diagnostics-only event logger.

use tracing::debug;

use crate::error::Result;
use crate::model::StampingEvent;

use super::{EventContext, StampingEventHandler};

/// Logs every event it sees. Produces no output lines.
#[derive(Debug, Default)]
pub struct EventLogger;

impl EventLogger {
    pub fn new() -> Self {
        Self
    }
}

impl StampingEventHandler for EventLogger {
    fn name(&self) -> &'static str {
        "event-log"
    }

    fn handle(&mut self, event: &StampingEvent, _ctx: &mut EventContext<'_>) -> Result<()> {
        debug!(
            position = %event.position,
            kind = event.kind.label(),
            "stamping event: {:?}",
            event.kind
        );
        Ok(())
    }
}
