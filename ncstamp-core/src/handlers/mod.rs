//! Ordered event handler pipeline.
//!
//! Handlers are independent and composable: they react to the events the
//! parser raises, request stamp lines relative to the triggering line,
//! and share state only through [`StampingData`]. Registration order is
//! part of the run contract; handlers are invoked strictly in that order
//! for every event.

pub mod log_events;
pub mod milestone;
pub mod sequence_stamp;
pub mod tags;

pub use log_events::EventLogger;
pub use milestone::MilestoneHandler;
pub use sequence_stamp::SequenceStampHandler;
pub use tags::TagHandler;

use crate::error::Result;
use crate::model::{StampingData, StampingEvent};

/// Stamp lines requested during one event dispatch, split by placement
/// relative to the triggering line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StampBatch {
    /// Lines to write before the triggering line is released.
    pub before: Vec<String>,
    /// Lines to write after the triggering line is released.
    pub after: Vec<String>,
}

impl StampBatch {
    /// True when no stamp line was requested.
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.after.is_empty()
    }

    /// Append another batch, keeping order.
    pub fn extend(&mut self, other: StampBatch) {
        self.before.extend(other.before);
        self.after.extend(other.after);
    }
}

/// Context handed to each handler during dispatch.
pub struct EventContext<'a> {
    /// Run-scoped shared state.
    pub data: &'a mut StampingData,
    batch: &'a mut StampBatch,
}

impl<'a> EventContext<'a> {
    fn new(data: &'a mut StampingData, batch: &'a mut StampBatch) -> Self {
        Self { data, batch }
    }

    /// Request a stamp line before the triggering line.
    pub fn emit_before(&mut self, line: impl Into<String>) {
        self.batch.before.push(line.into());
    }

    /// Request a stamp line after the triggering line.
    pub fn emit_after(&mut self, line: impl Into<String>) {
        self.batch.after.push(line.into());
    }
}

/// One member of the event handler pipeline.
///
/// Handlers must not assume the presence of any other handler; whatever
/// has to cross a handler boundary goes through [`StampingData`].
pub trait StampingEventHandler: Send {
    /// Handler name, used in diagnostics and error reports.
    fn name(&self) -> &'static str;

    /// React to one event.
    fn handle(&mut self, event: &StampingEvent, ctx: &mut EventContext<'_>) -> Result<()>;
}

/// Ordered, statically configured handler registry.
#[derive(Default)]
pub struct HandlerPipeline {
    handlers: Vec<Box<dyn StampingEventHandler>>,
}

impl HandlerPipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler; dispatch order is registration order.
    pub fn register(&mut self, handler: Box<dyn StampingEventHandler>) {
        self.handlers.push(handler);
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatch one event to every handler, in registration order, and
    /// collect the requested stamp lines.
    pub fn dispatch(
        &mut self,
        event: &StampingEvent,
        data: &mut StampingData,
    ) -> Result<StampBatch> {
        let mut batch = StampBatch::default();
        for handler in &mut self.handlers {
            let mut ctx = EventContext::new(data, &mut batch);
            handler.handle(event, &mut ctx)?;
        }
        Ok(batch)
    }
}

impl std::fmt::Debug for HandlerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("HandlerPipeline")
            .field("handlers", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Position, StampingEventKind};

    struct Recorder {
        tag: &'static str,
    }

    impl StampingEventHandler for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn handle(&mut self, _event: &StampingEvent, ctx: &mut EventContext<'_>) -> Result<()> {
            ctx.emit_after(self.tag);
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_preserves_registration_order() {
        let mut pipeline = HandlerPipeline::new();
        pipeline.register(Box::new(Recorder { tag: "first" }));
        pipeline.register(Box::new(Recorder { tag: "second" }));

        let mut data = StampingData::new();
        let event = StampingEvent::new(Position::START, StampingEventKind::StartCycle);
        let batch = pipeline.dispatch(&event, &mut data).unwrap();

        assert_eq!(batch.after, vec!["first".to_string(), "second".to_string()]);
        assert!(batch.before.is_empty());
    }
}
