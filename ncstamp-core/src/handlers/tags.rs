//! Cross-reference metadata recording.

use std::time::Duration;

use serde_json::json;

use crate::error::Result;
use crate::model::{StampingEvent, StampingEventKind};

use super::{EventContext, StampingEventHandler};

/// Keyword introducing a correlation tag inside a program comment.
const PPR_TAG_KEYWORD: &str = "[PPR]";

/// Records correlation metadata into the shared run data: program name,
/// tool numbers, per-sequence machining time and `[PPR] = <destination>`
/// comment tags. Produces no output lines.
#[derive(Debug, Default)]
pub struct TagHandler {
    sequence_elapsed: Duration,
}

impl TagHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the destination of a `[PPR] = <destination>` comment tag.
    fn parse_ppr_tag(comment: &str) -> Option<&str> {
        let rest = comment.split(PPR_TAG_KEYWORD).nth(1)?;
        let rest = rest.trim_start();
        let rest = rest.strip_prefix('=')?.trim_start();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' '))
            .unwrap_or(rest.len());
        let destination = rest[..end].trim();
        if destination.is_empty() {
            None
        } else {
            Some(destination)
        }
    }
}

impl StampingEventHandler for TagHandler {
    fn name(&self) -> &'static str {
        "tags"
    }

    fn handle(&mut self, event: &StampingEvent, ctx: &mut EventContext<'_>) -> Result<()> {
        match &event.kind {
            StampingEventKind::StartProgram { name } => {
                if let Some(name) = name {
                    ctx.data.set_tag("program_name", json!(name));
                }
            }
            StampingEventKind::ToolChange { tool_number } => {
                ctx.data.set_tool_number(tool_number.clone());
            }
            StampingEventKind::StartSequence { .. } => {
                self.sequence_elapsed = Duration::ZERO;
            }
            StampingEventKind::MachiningTime { elapsed } => {
                self.sequence_elapsed += *elapsed;
            }
            StampingEventKind::EndSequence => {
                let sequence = ctx.data.sequence_count();
                if sequence > 0 {
                    ctx.data.set_tag(
                        format!("sequence_{sequence}_machining_time_s"),
                        json!(self.sequence_elapsed.as_secs_f64()),
                    );
                    if let Some(tool) = ctx.data.tool_number().map(str::to_string) {
                        ctx.data
                            .set_tag(format!("sequence_{sequence}_tool"), json!(tool));
                    }
                }
                self.sequence_elapsed = Duration::ZERO;
            }
            StampingEventKind::Comment { text } => {
                if let Some(destination) = Self::parse_ppr_tag(text) {
                    ctx.data.set_tag("ppr_destination", json!(destination));
                }
            }
            StampingEventKind::Data { key, value } => {
                ctx.data.set_tag(key.clone(), value.clone());
            }
            _ => {}
        }
        Ok(())
    }
}
