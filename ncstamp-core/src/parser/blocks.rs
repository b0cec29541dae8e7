//! Block-level helpers for the Heidenhain conversational dialect.
//!
//! Each helper looks at one block body (the line without its leading
//! block number) and returns `None` when the construct does not match.

/// A program line split into its block number and body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Block<'a> {
    /// Leading block number, when the line carries one.
    pub number: Option<u32>,
    /// Remainder of the line.
    pub body: &'a str,
}

/// Split a raw line into block number and body.
pub fn split_block(line: &str) -> Block<'_> {
    let trimmed = line.trim();
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(number) = first.parse() {
            return Block {
                number: Some(number),
                body: parts.next().unwrap_or("").trim(),
            };
        }
    }
    Block {
        number: None,
        body: trimmed,
    }
}

/// Comment text of a `;` or `*` block, when the body is a comment.
pub fn parse_comment(body: &str) -> Option<&str> {
    body.strip_prefix(';')
        .or_else(|| body.strip_prefix('*'))
        .map(str::trim)
}

/// A `TOOL CALL` block.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Tool identifier as written (number or name).
    pub tool: String,
    /// Programmed spindle speed (`S` word), when present.
    pub spindle_speed: Option<f64>,
    /// Programmed feed (`F` word), when present.
    pub feed: Option<f64>,
}

/// Recognize a `TOOL CALL` block.
///
/// Returns `Some(Err(message))` for a malformed call (missing tool
/// identifier) so callers can report it and pass the line through.
pub fn parse_tool_call(body: &str) -> Option<Result<ToolCall, String>> {
    let rest = body.strip_prefix("TOOL CALL")?;
    let mut tokens = rest.split_whitespace();
    let tool = match tokens.next() {
        Some(token) => token.to_string(),
        None => return Some(Err("TOOL CALL without a tool identifier".to_string())),
    };
    let mut spindle_speed = None;
    let mut feed = None;
    for token in tokens {
        if let Some(value) = token.strip_prefix('S') {
            spindle_speed = value.parse().ok();
        } else if let Some(value) = token.strip_prefix('F') {
            feed = value.parse().ok();
        }
    }
    Some(Ok(ToolCall {
        tool,
        spindle_speed,
        feed,
    }))
}

/// A `BEGIN PGM` header.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramHeader {
    /// Program name.
    pub name: Option<String>,
    /// Unit suffix (`MM` / `INCH`), when present.
    pub unit: Option<crate::config::Unit>,
}

/// Recognize a `BEGIN PGM` block.
pub fn parse_begin_pgm(body: &str) -> Option<ProgramHeader> {
    let rest = body.strip_prefix("BEGIN PGM")?;
    let mut tokens = rest.split_whitespace();
    let name = tokens.next().map(str::to_string);
    let unit = tokens.next().and_then(crate::config::Unit::from_program_header);
    Some(ProgramHeader { name, unit })
}

/// Recognize an `END PGM` block.
pub fn parse_end_pgm(body: &str) -> Option<Option<String>> {
    let rest = body.strip_prefix("END PGM")?;
    Some(rest.split_whitespace().next().map(str::to_string))
}

/// A label scope block.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelBlock {
    /// `LBL n` or `LBL "NAME"`: opens a label scope.
    Set(String),
    /// `LBL 0`: closes the innermost label scope.
    End,
    /// `CALL LBL n [REP m]`.
    Call { label: String, repeats: u32 },
}

/// Recognize `LBL` and `CALL LBL` blocks.
pub fn parse_label(body: &str) -> Option<Result<LabelBlock, String>> {
    if let Some(rest) = body.strip_prefix("CALL LBL") {
        let mut tokens = rest.split_whitespace();
        let label = match tokens.next() {
            Some(token) => token.trim_matches('"').to_string(),
            None => return Some(Err("CALL LBL without a label".to_string())),
        };
        let mut repeats = 1;
        while let Some(token) = tokens.next() {
            if token == "REP" {
                if let Some(value) = tokens.next().and_then(|t| t.parse().ok()) {
                    repeats = value;
                }
            } else if let Some(value) = token.strip_prefix("REP").and_then(|t| t.parse().ok()) {
                repeats = value;
            }
        }
        return Some(Ok(LabelBlock::Call { label, repeats }));
    }
    let rest = body.strip_prefix("LBL")?;
    let mut tokens = rest.split_whitespace();
    let label = match tokens.next() {
        Some(token) => token.trim_matches('"').to_string(),
        None => return Some(Err("LBL without a label".to_string())),
    };
    if label == "0" {
        Some(Ok(LabelBlock::End))
    } else {
        Some(Ok(LabelBlock::Set(label)))
    }
}

/// A cycle block.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleBlock {
    /// `CYCL DEF n ...`: defines a cycle, no motion.
    Def(String),
    /// `CYCL CALL`: executes the defined cycle.
    Call,
}

/// Recognize `CYCL DEF` and `CYCL CALL` blocks.
pub fn parse_cycle(body: &str) -> Option<CycleBlock> {
    if body.starts_with("CYCL CALL") {
        return Some(CycleBlock::Call);
    }
    let rest = body.strip_prefix("CYCL DEF")?;
    let id = rest.split_whitespace().next().unwrap_or("").to_string();
    Some(CycleBlock::Def(id))
}

/// True for a `PATTERN DEF` block.
pub fn is_pattern_def(body: &str) -> bool {
    body.starts_with("PATTERN DEF")
}

/// A movement block (`L`, `C`, `CC`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveBlock {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    /// Programmed feed in units/min; `None` when the block has no `F`
    /// word (the modal feed applies).
    pub feed: Option<f64>,
    /// True for `FMAX` rapid positioning.
    pub rapid: bool,
    /// True for a `CC` center definition (no motion).
    pub center_definition: bool,
    /// True for circular motion (`C`).
    pub circular: bool,
}

/// Parse a signed axis value like `+12.5` or `-3`.
fn parse_axis_value(token: &str) -> Option<f64> {
    token.parse().ok()
}

/// Recognize a movement block.
pub fn parse_move(body: &str) -> Option<MoveBlock> {
    let mut tokens = body.split_whitespace();
    let head = tokens.next()?;
    let mut block = MoveBlock::default();
    match head {
        "L" => {}
        "C" | "CT" | "CP" => block.circular = true,
        "CC" => block.center_definition = true,
        _ => return None,
    }
    for token in tokens {
        if token == "FMAX" {
            block.rapid = true;
        } else if let Some(value) = token.strip_prefix('X').and_then(parse_axis_value) {
            block.x = Some(value);
        } else if let Some(value) = token.strip_prefix('Y').and_then(parse_axis_value) {
            block.y = Some(value);
        } else if let Some(value) = token.strip_prefix('Z').and_then(parse_axis_value) {
            block.z = Some(value);
        } else if let Some(rest) = token.strip_prefix('F') {
            if rest == "MAX" {
                block.rapid = true;
            } else if let Ok(value) = rest.parse() {
                block.feed = Some(value);
            }
        }
    }
    Some(block)
}

/// Recognize an `FN 0:` variable assignment, returning `(variable, value)`.
pub fn parse_fn_assignment(body: &str) -> Option<(String, f64)> {
    let rest = body
        .strip_prefix("FN 0:")
        .or_else(|| body.strip_prefix("FN0:"))?;
    let mut parts = rest.splitn(2, '=');
    let variable = parts.next()?.trim().to_string();
    if variable.is_empty() {
        return None;
    }
    let value = parts.next()?.trim().parse().ok()?;
    Some((variable, value))
}

/// All `M` words of a block.
pub fn m_words(body: &str) -> Vec<u16> {
    body.split_whitespace()
        .filter_map(|token| token.strip_prefix('M'))
        .filter_map(|rest| rest.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_block() {
        let block = split_block("12 TOOL CALL 7 Z S2000");
        assert_eq!(block.number, Some(12));
        assert_eq!(block.body, "TOOL CALL 7 Z S2000");

        let block = split_block("BEGIN PGM WHEEL MM");
        assert_eq!(block.number, None);
        assert_eq!(block.body, "BEGIN PGM WHEEL MM");
    }

    #[test]
    fn test_parse_tool_call() {
        let call = parse_tool_call("TOOL CALL 7 Z S2000 F150").unwrap().unwrap();
        assert_eq!(call.tool, "7");
        assert_eq!(call.spindle_speed, Some(2000.0));
        assert_eq!(call.feed, Some(150.0));

        assert!(parse_tool_call("TOOL CALL").unwrap().is_err());
        assert!(parse_tool_call("L X+1").is_none());
    }

    #[test]
    fn test_parse_move() {
        let block = parse_move("L X+50 Y-30.5 R0 F250 M3").unwrap();
        assert_eq!(block.x, Some(50.0));
        assert_eq!(block.y, Some(-30.5));
        assert_eq!(block.feed, Some(250.0));
        assert!(!block.rapid);

        let block = parse_move("L Z+100 FMAX").unwrap();
        assert!(block.rapid);
        assert_eq!(block.feed, None);

        let block = parse_move("CC X+25 Y+25").unwrap();
        assert!(block.center_definition);

        assert!(parse_move("TOOL CALL 7 Z").is_none());
    }

    #[test]
    fn test_parse_fn_assignment() {
        assert_eq!(
            parse_fn_assignment("FN 0: Q5 = +12.35"),
            Some(("Q5".to_string(), 12.35))
        );
        assert_eq!(
            parse_fn_assignment("FN0: Q980 = 3"),
            Some(("Q980".to_string(), 3.0))
        );
        assert_eq!(parse_fn_assignment("FN 0: Q5 ="), None);
        assert_eq!(parse_fn_assignment("L X+1"), None);
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(
            parse_label("LBL 1").unwrap().unwrap(),
            LabelBlock::Set("1".to_string())
        );
        assert_eq!(parse_label("LBL 0").unwrap().unwrap(), LabelBlock::End);
        assert_eq!(
            parse_label("CALL LBL 1 REP 5").unwrap().unwrap(),
            LabelBlock::Call {
                label: "1".to_string(),
                repeats: 5
            }
        );
        assert!(parse_label("LBL").unwrap().is_err());
    }

    #[test]
    fn test_parse_cycle_and_pattern() {
        assert_eq!(
            parse_cycle("CYCL DEF 200 DRILLING"),
            Some(CycleBlock::Def("200".to_string()))
        );
        assert_eq!(parse_cycle("CYCL CALL"), Some(CycleBlock::Call));
        assert!(is_pattern_def("PATTERN DEF POS1 (X+25 Y+33.5)"));
    }

    #[test]
    fn test_m_words() {
        assert_eq!(m_words("L X+1 M3"), vec![3]);
        assert_eq!(m_words("M30"), vec![30]);
        assert!(m_words("L X+1 F100").is_empty());
    }
}
