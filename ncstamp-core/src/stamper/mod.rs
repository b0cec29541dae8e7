//! Streaming stamper: a buffered, position-addressable pipe between the
//! raw program source and the instrumented program sink.
//!
//! [`pipe`] splits the stream into a producer half ([`LineSender`]) and a
//! consumer half ([`Stamper`]). The producer feeds raw program lines; the
//! consumer (the parser) reads them through a sequential facade, then
//! resolves each span either by releasing it to the sink verbatim or by
//! skipping it. Generated stamp lines are interleaved with the released
//! spans through [`Stamper::write_stamp`].
//!
//! Resolution is strictly monotonic: a span, once resolved, can never be
//! resolved again, and every released line reaches the sink exactly once.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::config::DEFAULT_PIPE_CAPACITY;
use crate::error::{Result, StampingError};
use crate::model::{Line, Position};

/// Line-ending convention applied when writing to the sink.
///
/// Machine controllers reject programs with mixed or unexpected line
/// endings, so the convention is fixed per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineEnding {
    /// Unix convention (`\n`).
    #[default]
    Lf,
    /// DOS convention (`\r\n`).
    CrLf,
}

impl LineEnding {
    /// The line terminator bytes.
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Create a stamping pipe writing to `sink`.
///
/// `capacity` bounds the number of unread lines buffered between the
/// producer and the consumer; a full buffer suspends the producer
/// (backpressure). Use [`DEFAULT_PIPE_CAPACITY`] unless the run has
/// special needs.
pub fn pipe<W>(sink: W, line_ending: LineEnding, capacity: usize) -> (LineSender, Stamper<W>)
where
    W: AsyncWrite + Unpin,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let sender = LineSender { tx };
    let stamper = Stamper {
        rx,
        sink,
        line_ending,
        pending: VecDeque::new(),
        next_accept: Position::START,
        cursor: Position::START,
        resolved: Position::START,
        completed: false,
        lines_read: 0,
        lines_released: 0,
        lines_skipped: 0,
        stamps_written: 0,
    };
    (sender, stamper)
}

/// Create a stamping pipe with the default capacity.
pub fn pipe_with_defaults<W>(sink: W) -> (LineSender, Stamper<W>)
where
    W: AsyncWrite + Unpin,
{
    pipe(sink, LineEnding::default(), DEFAULT_PIPE_CAPACITY)
}

/// Producer half of the stamping pipe.
///
/// Deliberately not `Clone`: a run has exactly one line source, and
/// consuming the sender in [`LineSender::complete`] makes "add after
/// complete" unrepresentable.
#[derive(Debug)]
pub struct LineSender {
    tx: mpsc::Sender<String>,
}

impl LineSender {
    /// Append one line to the tail of the pending buffer.
    ///
    /// Suspends while the buffer is at capacity. Fails with
    /// [`StampingError::PipeClosed`] once the consumer is gone or has
    /// closed its end.
    pub async fn send(&self, line: impl Into<String>) -> Result<()> {
        self.tx
            .send(line.into())
            .await
            .map_err(|_| StampingError::PipeClosed)
    }

    /// Blocking variant of [`LineSender::send`] for synchronous producers.
    ///
    /// Must not be called from an async context.
    pub fn blocking_send(&self, line: impl Into<String>) -> Result<()> {
        self.tx
            .blocking_send(line.into())
            .map_err(|_| StampingError::PipeClosed)
    }

    /// Signal that no more input will be added.
    pub fn complete(self) {
        // Dropping the sender closes the channel; the consumer observes
        // end of stream once the buffered lines are drained.
    }
}

/// Consumer half of the stamping pipe.
///
/// Owns the pending buffer, the read cursor, the resolved position and
/// the sink. The parser is the single consumer; `&mut self` on every
/// operation enforces that.
#[derive(Debug)]
pub struct Stamper<W> {
    rx: mpsc::Receiver<String>,
    sink: W,
    line_ending: LineEnding,
    /// Lines accepted from the source but not yet resolved.
    pending: VecDeque<Line>,
    /// Position assigned to the next accepted line.
    next_accept: Position,
    /// Position of the next unread line.
    cursor: Position,
    /// Position up to which lines have been resolved (exclusive).
    resolved: Position,
    completed: bool,
    lines_read: u64,
    lines_released: u64,
    lines_skipped: u64,
    stamps_written: u64,
}

impl<W> Stamper<W>
where
    W: AsyncWrite + Unpin,
{
    /// Position of the next line a read would return.
    pub fn cursor(&self) -> Position {
        self.cursor
    }

    /// Position up to which the stream has been resolved (exclusive).
    pub fn resolved(&self) -> Position {
        self.resolved
    }

    /// Line-ending convention of the sink.
    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    /// True once [`Stamper::finish`] has run to completion.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Number of lines read through the facade.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Number of lines released to the sink.
    pub fn lines_released(&self) -> u64 {
        self.lines_released
    }

    /// Number of lines discarded by skips.
    pub fn lines_skipped(&self) -> u64 {
        self.lines_skipped
    }

    /// Number of injected stamp lines.
    pub fn stamps_written(&self) -> u64 {
        self.stamps_written
    }

    /// Make sure the line at `pos` is in the pending buffer.
    ///
    /// Suspends until the producer delivers enough lines or signals
    /// completion. Returns false when the source is exhausted before
    /// `pos` is reached.
    async fn fill_to(&mut self, pos: Position) -> bool {
        while self.next_accept <= pos {
            match self.rx.recv().await {
                Some(text) => {
                    self.pending.push_back(Line::new(self.next_accept, text));
                    self.next_accept = self.next_accept.next();
                }
                None => return false,
            }
        }
        true
    }

    /// Index of `pos` within the pending buffer.
    fn pending_index(&self, pos: Position) -> usize {
        pos.lines_since(self.resolved) as usize
    }

    /// Read the next line, advancing the cursor.
    ///
    /// Suspends until input is available; yields `None` at end of stream.
    pub async fn read_line(&mut self) -> Option<Line> {
        if !self.fill_to(self.cursor).await {
            return None;
        }
        let idx = self.pending_index(self.cursor);
        let line = self.pending[idx].clone();
        self.cursor = self.cursor.next();
        self.lines_read += 1;
        Some(line)
    }

    /// Look at the next line without advancing the cursor.
    pub async fn peek_line(&mut self) -> Option<&Line> {
        if !self.fill_to(self.cursor).await {
            return None;
        }
        let idx = self.pending_index(self.cursor);
        Some(&self.pending[idx])
    }

    /// Validate a positional resolve request.
    fn check_resolve(&self, end: Position) -> Result<()> {
        if self.completed {
            error!("resolve to {end} requested on a completed pipe");
            return Err(StampingError::PipeCompleted);
        }
        if end <= self.resolved {
            error!(
                "resolve position {end} does not advance past {}",
                self.resolved
            );
            return Err(StampingError::PositionRegression {
                requested: end,
                resolved: self.resolved,
            });
        }
        if end > self.cursor {
            error!("resolve position {end} is beyond the read cursor {}", self.cursor);
            return Err(StampingError::PositionBeyondCursor {
                requested: end,
                cursor: self.cursor,
            });
        }
        Ok(())
    }

    async fn write_text(&mut self, text: &str) -> Result<()> {
        self.sink.write_all(text.as_bytes()).await?;
        self.sink.write_all(self.line_ending.as_str().as_bytes()).await?;
        Ok(())
    }

    /// Advance the resolved position to `end`, writing the spanned lines
    /// to the sink verbatim, then flush.
    pub async fn release(&mut self, end: Position) -> Result<()> {
        self.check_resolve(end)?;
        while let Some(front) = self.pending.front() {
            if front.position >= end {
                break;
            }
            if let Some(line) = self.pending.pop_front() {
                self.write_text(&line.text).await?;
                self.lines_released += 1;
            }
        }
        self.resolved = end;
        self.sink.flush().await?;
        Ok(())
    }

    /// Advance the resolved position to `end`, discarding the spanned
    /// lines, then flush.
    pub async fn skip(&mut self, end: Position) -> Result<()> {
        self.check_resolve(end)?;
        while let Some(front) = self.pending.front() {
            if front.position >= end {
                break;
            }
            self.pending.pop_front();
            self.lines_skipped += 1;
        }
        self.resolved = end;
        self.sink.flush().await?;
        Ok(())
    }

    /// Release everything read so far. No-op when nothing is unresolved.
    pub async fn release_read(&mut self) -> Result<()> {
        if self.cursor > self.resolved {
            self.release(self.cursor).await?;
        }
        Ok(())
    }

    /// Skip everything read so far. No-op when nothing is unresolved.
    pub async fn skip_read(&mut self) -> Result<()> {
        if self.cursor > self.resolved {
            self.skip(self.cursor).await?;
        }
        Ok(())
    }

    /// Write one generated stamp line at the current emission point.
    pub async fn write_stamp(&mut self, line: &str) -> Result<()> {
        if self.completed {
            return Err(StampingError::PipeCompleted);
        }
        debug!("injecting stamp line: {line}");
        self.write_text(line).await?;
        self.sink.flush().await?;
        self.stamps_written += 1;
        Ok(())
    }

    /// Release everything read, copy the remainder of the source to the
    /// sink verbatim and flush.
    ///
    /// After `finish` the pipe is completed: further resolves fail with
    /// [`StampingError::PipeCompleted`] and pending producers observe a
    /// closed pipe.
    pub async fn finish(&mut self) -> Result<()> {
        self.release_read().await?;
        while self.read_line().await.is_some() {
            self.release(self.cursor).await?;
        }
        self.sink.flush().await?;
        self.rx.close();
        self.completed = true;
        Ok(())
    }

    /// Consume the pipe and hand back the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(buf: &[u8]) -> String {
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_release_writes_verbatim() {
        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 8);
        tx.send("N10 L X+1").await.unwrap();
        tx.send("N20 L X+2").await.unwrap();
        tx.complete();

        assert_eq!(stamper.read_line().await.unwrap().text, "N10 L X+1");
        assert_eq!(stamper.read_line().await.unwrap().text, "N20 L X+2");
        stamper.release_read().await.unwrap();
        assert!(stamper.read_line().await.is_none());

        assert_eq!(output(stamper.into_sink().as_slice()), "N10 L X+1\nN20 L X+2\n");
    }

    #[tokio::test]
    async fn test_skip_discards_span() {
        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 8);
        tx.send("keep me").await.unwrap();
        tx.send("drop me").await.unwrap();
        tx.send("keep me too").await.unwrap();
        tx.complete();

        stamper.read_line().await.unwrap();
        stamper.release_read().await.unwrap();
        stamper.read_line().await.unwrap();
        stamper.skip_read().await.unwrap();
        stamper.read_line().await.unwrap();
        stamper.release_read().await.unwrap();

        assert_eq!(stamper.lines_skipped(), 1);
        assert_eq!(output(stamper.into_sink().as_slice()), "keep me\nkeep me too\n");
    }

    #[tokio::test]
    async fn test_stamp_interleaving() {
        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 8);
        tx.send("TOOL CALL 1 Z").await.unwrap();
        tx.send("L X+10 F100").await.unwrap();
        tx.complete();

        stamper.read_line().await.unwrap();
        stamper.release_read().await.unwrap();
        stamper.write_stamp("FN 0: Q5 = 1").await.unwrap();
        stamper.finish().await.unwrap();

        assert_eq!(
            output(stamper.into_sink().as_slice()),
            "TOOL CALL 1 Z\nFN 0: Q5 = 1\nL X+10 F100\n"
        );
    }

    #[tokio::test]
    async fn test_monotonic_resolution_rejected() {
        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 8);
        tx.send("a").await.unwrap();
        tx.send("b").await.unwrap();
        tx.complete();

        stamper.read_line().await.unwrap();
        stamper.read_line().await.unwrap();
        stamper.release(Position::new(2)).await.unwrap();

        // Same or earlier position must be rejected, never clamped.
        let err = stamper.release(Position::new(2)).await.unwrap_err();
        assert!(matches!(err, StampingError::PositionRegression { .. }));
        let err = stamper.skip(Position::new(1)).await.unwrap_err();
        assert!(matches!(err, StampingError::PositionRegression { .. }));
    }

    #[tokio::test]
    async fn test_resolve_beyond_cursor_rejected() {
        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 8);
        tx.send("a").await.unwrap();
        tx.complete();

        stamper.read_line().await.unwrap();
        let err = stamper.release(Position::new(5)).await.unwrap_err();
        assert!(matches!(err, StampingError::PositionBeyondCursor { .. }));
    }

    #[tokio::test]
    async fn test_finish_copies_remainder() {
        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::CrLf, 8);
        tx.send("one").await.unwrap();
        tx.send("two").await.unwrap();
        tx.send("three").await.unwrap();
        tx.complete();

        stamper.read_line().await.unwrap();
        stamper.release_read().await.unwrap();
        stamper.finish().await.unwrap();

        assert!(stamper.completed());
        assert_eq!(output(stamper.into_sink().as_slice()), "one\r\ntwo\r\nthree\r\n");
    }

    #[tokio::test]
    async fn test_resolve_after_finish_rejected() {
        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 8);
        tx.send("a").await.unwrap();
        tx.complete();
        stamper.finish().await.unwrap();

        let err = stamper.release(Position::new(1)).await.unwrap_err();
        assert!(matches!(err, StampingError::PipeCompleted));
        let err = stamper.write_stamp("x").await.unwrap_err();
        assert!(matches!(err, StampingError::PipeCompleted));
    }

    #[tokio::test]
    async fn test_send_after_consumer_dropped_fails() {
        let (tx, stamper) = pipe(Vec::new(), LineEnding::Lf, 8);
        drop(stamper);
        let err = tx.send("late").await.unwrap_err();
        assert!(matches!(err, StampingError::PipeClosed));
    }

    #[tokio::test]
    async fn test_peek_does_not_advance() {
        let (tx, mut stamper) = pipe(Vec::new(), LineEnding::Lf, 8);
        tx.send("a").await.unwrap();
        tx.complete();

        assert_eq!(stamper.peek_line().await.unwrap().text, "a");
        assert_eq!(stamper.cursor(), Position::START);
        assert_eq!(stamper.read_line().await.unwrap().text, "a");
        assert_eq!(stamper.cursor(), Position::new(1));
    }
}
