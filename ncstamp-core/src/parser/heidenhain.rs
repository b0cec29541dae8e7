//! Single-pass parser for Heidenhain-style conversational programs.

use std::time::Duration;

use serde_json::json;
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

use crate::config::StampingConfig;
use crate::error::Result;
use crate::handlers::{HandlerPipeline, StampBatch};
use crate::model::{Line, SequenceKind, StampingData, StampingEvent, StampingEventKind};
use crate::stamper::Stamper;

use super::blocks::{self, CycleBlock, LabelBlock, MoveBlock};
use super::StampingParser;

/// Line-oriented parser for Heidenhain-style NC programs.
///
/// Reads the program once, front to back, raising events as constructs
/// are recognized. Unrecognized lines pass through verbatim; malformed
/// constructs are reported as recoverable errors and never abort the
/// run.
#[derive(Debug)]
pub struct HeidenhainParser {
    strip_variables: Vec<String>,
    strip_existing_stamps: bool,
    /// Modal axis positions (X, Y, Z).
    position: [Option<f64>; 3],
    /// Modal feed in units/min.
    modal_feed: Option<f64>,
    program_depth: u32,
    cycle_started: bool,
    cycle_stopped: bool,
    in_sequence: bool,
    machining_triggered: bool,
    label_stack: Vec<String>,
}

impl HeidenhainParser {
    /// Build a parser honoring the run configuration.
    pub fn new(config: &StampingConfig) -> Self {
        Self {
            strip_variables: config
                .variables
                .configured_variables()
                .into_iter()
                .map(str::to_string)
                .collect(),
            strip_existing_stamps: config.strip_existing_stamps,
            position: [None; 3],
            modal_feed: None,
            program_depth: 0,
            cycle_started: false,
            cycle_stopped: false,
            in_sequence: false,
            machining_triggered: false,
            label_stack: Vec::new(),
        }
    }

    /// Machining time of a movement block, updating the modal state.
    ///
    /// Rapid moves and moves without a known feed contribute no time.
    /// Circular moves use the chord length.
    fn advance_position(&mut self, block: &MoveBlock) -> Option<Duration> {
        let targets = [block.x, block.y, block.z];
        let mut distance_sq = 0.0;
        for (current, target) in self.position.iter_mut().zip(targets) {
            if let Some(target) = target {
                if let Some(from) = *current {
                    let delta = target - from;
                    distance_sq += delta * delta;
                }
                *current = Some(target);
            }
        }
        if let Some(feed) = block.feed {
            if !block.rapid {
                self.modal_feed = Some(feed);
            }
        }
        if block.rapid {
            return None;
        }
        let feed = self.modal_feed.filter(|f| *f > 0.0)?;
        let distance = distance_sq.sqrt();
        if distance <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(distance / feed * 60.0))
    }

    /// Events raised when the current sequence and cycle wind down.
    fn closing_events(&mut self, end_of_file: bool) -> Vec<StampingEventKind> {
        let mut events = Vec::new();
        if self.in_sequence {
            self.in_sequence = false;
            events.push(StampingEventKind::EndSequence);
        }
        if self.cycle_started && !self.cycle_stopped {
            self.cycle_stopped = true;
            events.push(StampingEventKind::StopCycle);
        }
        if self.program_depth > 0 {
            self.program_depth = 0;
            events.push(StampingEventKind::EndProgram { end_of_file });
        }
        events
    }

    /// Classify one line, returning the events it raises.
    ///
    /// A `None` return means the line is an existing stamp to discard.
    fn classify(&mut self, line: &Line, data: &mut StampingData) -> Option<Vec<StampingEventKind>> {
        let block = blocks::split_block(&line.text);
        let body = block.body;
        let mut events = Vec::new();

        if body.is_empty() {
            return Some(events);
        }

        if let Some(text) = blocks::parse_comment(body) {
            if !text.is_empty() {
                events.push(StampingEventKind::Comment {
                    text: text.to_string(),
                });
            }
            return Some(events);
        }

        if let Some(header) = blocks::parse_begin_pgm(body) {
            self.program_depth += 1;
            if self.program_depth == 1 {
                events.push(StampingEventKind::StartProgram {
                    name: header.name.clone(),
                });
                if let Some(unit) = header.unit {
                    events.push(StampingEventKind::Data {
                        key: "unit".to_string(),
                        value: json!(unit.to_string()),
                    });
                }
                if !self.cycle_started {
                    self.cycle_started = true;
                    events.push(StampingEventKind::StartCycle);
                }
            }
            return Some(events);
        }

        if blocks::parse_end_pgm(body).is_some() {
            if self.program_depth <= 1 {
                events.extend(self.closing_events(false));
            } else {
                self.program_depth -= 1;
            }
            return Some(events);
        }

        if let Some(result) = blocks::parse_tool_call(body) {
            match result {
                Ok(call) => {
                    if self.in_sequence {
                        events.push(StampingEventKind::EndSequence);
                    }
                    events.push(StampingEventKind::ToolChange {
                        tool_number: call.tool.clone(),
                    });
                    events.push(StampingEventKind::StartSequence {
                        kind: SequenceKind::Machining,
                    });
                    self.in_sequence = true;
                    self.machining_triggered = false;
                }
                Err(message) => {
                    warn!(position = %line.position, "{message}: {:?}", line.text);
                    data.record_parse_error();
                }
            }
            return Some(events);
        }

        if let Some(result) = blocks::parse_label(body) {
            match result {
                Ok(LabelBlock::Set(label)) => {
                    self.label_stack.push(label.clone());
                    events.push(StampingEventKind::Data {
                        key: "label".to_string(),
                        value: json!(label),
                    });
                }
                Ok(LabelBlock::End) => {
                    if self.label_stack.pop().is_none() {
                        warn!(position = %line.position, "LBL 0 with no open label");
                        data.record_parse_error();
                    }
                }
                Ok(LabelBlock::Call { label, repeats }) => {
                    events.push(StampingEventKind::Data {
                        key: "label_call".to_string(),
                        value: json!({ "label": label, "repeats": repeats }),
                    });
                }
                Err(message) => {
                    warn!(position = %line.position, "{message}: {:?}", line.text);
                    data.record_parse_error();
                }
            }
            return Some(events);
        }

        if let Some(cycle) = blocks::parse_cycle(body) {
            match cycle {
                CycleBlock::Def(id) => {
                    events.push(StampingEventKind::Data {
                        key: "cycle_def".to_string(),
                        value: json!(id),
                    });
                }
                CycleBlock::Call => {
                    if self.in_sequence && !self.machining_triggered {
                        self.machining_triggered = true;
                        events.push(StampingEventKind::Machining);
                    }
                }
            }
            return Some(events);
        }

        if blocks::is_pattern_def(body) {
            events.push(StampingEventKind::Data {
                key: "pattern_def".to_string(),
                value: json!(body),
            });
            return Some(events);
        }

        if let Some((variable, value)) = blocks::parse_fn_assignment(body) {
            if self.strip_existing_stamps && self.strip_variables.contains(&variable) {
                debug!(position = %line.position, "dropping existing stamp for {variable}");
                return None;
            }
            events.push(StampingEventKind::Data {
                key: variable,
                value: json!(value),
            });
            return Some(events);
        }

        if let Some(mv) = blocks::parse_move(body) {
            if !mv.center_definition {
                let machining_time = self.advance_position(&mv);
                if self.in_sequence && !self.machining_triggered && !mv.rapid {
                    self.machining_triggered = true;
                    events.push(StampingEventKind::Machining);
                }
                if let Some(elapsed) = machining_time {
                    events.push(StampingEventKind::MachiningTime { elapsed });
                }
            }
        }

        // Program-stop M functions may ride on any block.
        let m_words = blocks::m_words(body);
        if m_words.iter().any(|m| *m == 30 || *m == 2) {
            events.extend(self.closing_events(false));
        }

        Some(events)
    }

    /// Dispatch the events of one line and emit the requested stamps
    /// around it.
    async fn emit<W>(
        &mut self,
        line: &Line,
        events: Vec<StampingEventKind>,
        stamper: &mut Stamper<W>,
        pipeline: &mut HandlerPipeline,
        data: &mut StampingData,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut batch = StampBatch::default();
        for kind in events {
            let event = StampingEvent::new(line.position, kind);
            batch.extend(pipeline.dispatch(&event, data)?);
        }
        for stamp in &batch.before {
            stamper.write_stamp(stamp).await?;
        }
        stamper.release(line.position.next()).await?;
        for stamp in &batch.after {
            stamper.write_stamp(stamp).await?;
        }
        Ok(())
    }
}

impl StampingParser for HeidenhainParser {
    async fn parse<W>(
        &mut self,
        stamper: &mut Stamper<W>,
        pipeline: &mut HandlerPipeline,
        data: &mut StampingData,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        while let Some(line) = stamper.read_line().await {
            match self.classify(&line, data) {
                Some(events) => {
                    self.emit(&line, events, stamper, pipeline, data).await?;
                }
                None => {
                    // Existing stamp line: drop it from the output.
                    stamper.skip(line.position.next()).await?;
                }
            }
        }

        if !self.label_stack.is_empty() {
            warn!(
                "unterminated label scope(s) at end of program: {:?}",
                self.label_stack
            );
            data.record_parse_error();
            self.label_stack.clear();
        }

        // Wind down whatever is still open at end of input.
        let closing = self.closing_events(true);
        let position = stamper.cursor();
        let mut batch = StampBatch::default();
        for kind in closing {
            let event = StampingEvent::new(position, kind);
            batch.extend(pipeline.dispatch(&event, data)?);
        }
        for stamp in batch.before.iter().chain(batch.after.iter()) {
            stamper.write_stamp(stamp).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{EventContext, StampingEventHandler};
    use crate::stamper::{pipe, LineEnding};

    /// Records every event kind label it sees.
    struct EventRecorder {
        seen: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl StampingEventHandler for EventRecorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn handle(&mut self, event: &StampingEvent, _ctx: &mut EventContext<'_>) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(event.kind.label().to_string());
            Ok(())
        }
    }

    async fn run_program(program: &[&str], config: &StampingConfig) -> (Vec<String>, String) {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipeline = HandlerPipeline::new();
        pipeline.register(Box::new(EventRecorder { seen: seen.clone() }));

        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 16);
        for line in program {
            tx.send(*line).await.unwrap();
        }
        tx.complete();

        let mut parser = HeidenhainParser::new(config);
        let mut data = StampingData::new();
        parser
            .parse(&mut stamper, &mut pipeline, &mut data)
            .await
            .unwrap();
        stamper.finish().await.unwrap();

        let events = seen.lock().unwrap().clone();
        let output = String::from_utf8(stamper.into_sink()).unwrap();
        (events, output)
    }

    #[tokio::test]
    async fn test_event_sequence_for_simple_program() {
        let program = [
            "0 BEGIN PGM WHEEL MM",
            "1 TOOL CALL 1 Z S4000",
            "2 L X+0 Y+0 FMAX",
            "3 L X+100 F100",
            "4 END PGM WHEEL MM",
        ];
        let config = StampingConfig::with_sequence_variable("Q5");
        let (events, output) = run_program(&program, &config).await;

        assert_eq!(
            events,
            vec![
                "start-program",
                "data",
                "start-cycle",
                "tool-change",
                "start-sequence",
                "machining",
                "machining-time",
                "end-sequence",
                "stop-cycle",
                "end-program",
            ]
        );
        // Every input line passes through verbatim.
        for line in program {
            assert!(output.contains(line), "missing line: {line}");
        }
    }

    #[tokio::test]
    async fn test_existing_stamps_are_stripped() {
        let program = [
            "0 BEGIN PGM OLD MM",
            "1 TOOL CALL 1 Z",
            "FN 0: Q5 = 3",
            "2 L X+10 F100",
            "3 END PGM OLD MM",
        ];
        let mut config = StampingConfig::with_sequence_variable("Q5");
        config.strip_existing_stamps = true;
        let (_, output) = run_program(&program, &config).await;
        assert!(!output.contains("FN 0: Q5 = 3"));
        assert!(output.contains("TOOL CALL 1 Z"));
    }

    #[tokio::test]
    async fn test_malformed_tool_call_is_recoverable() {
        let program = ["0 BEGIN PGM BAD MM", "1 TOOL CALL", "2 END PGM BAD MM"];
        let config = StampingConfig::with_sequence_variable("Q5");

        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 16);
        for line in program {
            tx.send(line).await.unwrap();
        }
        tx.complete();

        let mut parser = HeidenhainParser::new(&config);
        let mut pipeline = HandlerPipeline::new();
        let mut data = StampingData::new();
        parser
            .parse(&mut stamper, &mut pipeline, &mut data)
            .await
            .unwrap();
        stamper.finish().await.unwrap();

        assert_eq!(data.parse_errors(), 1);
        let output = String::from_utf8(stamper.into_sink()).unwrap();
        assert!(output.contains("1 TOOL CALL"));
    }

    #[tokio::test]
    async fn test_machining_time_from_feed_and_distance() {
        let mut parser = HeidenhainParser::new(&StampingConfig::default());

        // Establish a datum; no previous position, no time.
        assert!(parser
            .advance_position(&MoveBlock {
                x: Some(0.0),
                y: Some(0.0),
                feed: Some(100.0),
                ..Default::default()
            })
            .is_none());

        // 100 mm at 100 mm/min = 1 minute.
        let elapsed = parser
            .advance_position(&MoveBlock {
                x: Some(100.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(elapsed, Duration::from_secs(60));

        // Rapid moves contribute no time but update the position.
        assert!(parser
            .advance_position(&MoveBlock {
                x: Some(0.0),
                rapid: true,
                ..Default::default()
            })
            .is_none());
    }
}
