//! Cycle and sequence stamp emission.

use tracing::debug;

use crate::config::StampingConfig;
use crate::error::Result;
use crate::generator::{CycleStampLineCreator, SequenceStampLineCreator};
use crate::model::{StampingEvent, StampingEventKind};

use super::{EventContext, StampingEventHandler};

/// Emits the start/stop-cycle stamps and one sequence stamp per
/// machining sequence.
///
/// With `defer_until_machining` the sequence stamp is held back until
/// the sequence's first machining instruction, so a sequence that never
/// machines anything (tool call immediately followed by another tool
/// call, or by the program end) is not stamped at all.
#[derive(Debug)]
pub struct SequenceStampHandler {
    sequence_creator: SequenceStampLineCreator,
    cycle_creator: CycleStampLineCreator,
    defer_until_machining: bool,
    sequence_pending: bool,
}

impl SequenceStampHandler {
    /// Build from the run configuration.
    pub fn new(config: &StampingConfig) -> Self {
        Self {
            sequence_creator: SequenceStampLineCreator::new(&config.variables, &config.formatter),
            cycle_creator: CycleStampLineCreator::new(&config.variables, &config.formatter),
            defer_until_machining: config.defer_sequence_stamp,
            sequence_pending: false,
        }
    }
}

impl StampingEventHandler for SequenceStampHandler {
    fn name(&self) -> &'static str {
        "sequence-stamp"
    }

    fn handle(&mut self, event: &StampingEvent, ctx: &mut EventContext<'_>) -> Result<()> {
        match &event.kind {
            StampingEventKind::StartCycle => {
                if let Some(line) = self.cycle_creator.create_start_cycle_stamp_line(ctx.data) {
                    ctx.emit_after(line);
                }
            }
            StampingEventKind::StopCycle => {
                if let Some(line) = self.cycle_creator.create_stop_cycle_stamp_line(ctx.data) {
                    ctx.emit_before(line);
                }
            }
            StampingEventKind::StartSequence { .. } => {
                if self.defer_until_machining {
                    self.sequence_pending = true;
                } else if let Some(line) =
                    self.sequence_creator.create_sequence_stamp_line(ctx.data)
                {
                    ctx.emit_after(line);
                }
            }
            StampingEventKind::Machining => {
                if self.sequence_pending {
                    self.sequence_pending = false;
                    if let Some(line) =
                        self.sequence_creator.create_sequence_stamp_line(ctx.data)
                    {
                        ctx.emit_before(line);
                    }
                }
            }
            StampingEventKind::EndSequence => {
                if self.sequence_pending {
                    // The sequence never reached a machining instruction:
                    // drop the pending stamp.
                    debug!("dropping sequence stamp for an empty sequence");
                    self.sequence_pending = false;
                }
                ctx.data.clear_sequence_stamp_value();
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StampingConfig;
    use crate::handlers::HandlerPipeline;
    use crate::model::{Position, SequenceKind, StampingData};

    fn config() -> StampingConfig {
        StampingConfig::with_sequence_variable("Q5")
    }

    fn event(kind: StampingEventKind) -> StampingEvent {
        StampingEvent::new(Position::START, kind)
    }

    #[test]
    fn test_immediate_sequence_stamp() {
        let mut pipeline = HandlerPipeline::new();
        pipeline.register(Box::new(SequenceStampHandler::new(&config())));
        let mut data = StampingData::new();

        let batch = pipeline
            .dispatch(
                &event(StampingEventKind::StartSequence {
                    kind: SequenceKind::Machining,
                }),
                &mut data,
            )
            .unwrap();
        assert_eq!(batch.after, vec!["FN 0: Q5 = 1".to_string()]);
    }

    #[test]
    fn test_deferred_stamp_waits_for_machining() {
        let mut cfg = config();
        cfg.defer_sequence_stamp = true;
        let mut pipeline = HandlerPipeline::new();
        pipeline.register(Box::new(SequenceStampHandler::new(&cfg)));
        let mut data = StampingData::new();

        let batch = pipeline
            .dispatch(
                &event(StampingEventKind::StartSequence {
                    kind: SequenceKind::Machining,
                }),
                &mut data,
            )
            .unwrap();
        assert!(batch.is_empty());

        let batch = pipeline
            .dispatch(&event(StampingEventKind::Machining), &mut data)
            .unwrap();
        assert_eq!(batch.before, vec!["FN 0: Q5 = 1".to_string()]);
    }

    #[test]
    fn test_deferred_stamp_dropped_for_empty_sequence() {
        let mut cfg = config();
        cfg.defer_sequence_stamp = true;
        let mut pipeline = HandlerPipeline::new();
        pipeline.register(Box::new(SequenceStampHandler::new(&cfg)));
        let mut data = StampingData::new();

        pipeline
            .dispatch(
                &event(StampingEventKind::StartSequence {
                    kind: SequenceKind::Machining,
                }),
                &mut data,
            )
            .unwrap();
        let batch = pipeline
            .dispatch(&event(StampingEventKind::EndSequence), &mut data)
            .unwrap();
        assert!(batch.is_empty());

        // The next sequence still gets the first stamp value.
        pipeline
            .dispatch(
                &event(StampingEventKind::StartSequence {
                    kind: SequenceKind::Machining,
                }),
                &mut data,
            )
            .unwrap();
        let batch = pipeline
            .dispatch(&event(StampingEventKind::Machining), &mut data)
            .unwrap();
        assert_eq!(batch.before, vec!["FN 0: Q5 = 1".to_string()]);
    }
}
