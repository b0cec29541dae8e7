//! Stamping parsers.
//!
//! A parser reads the program through the pipe's reader facade, raises
//! [`crate::model::StampingEvent`]s to the handler pipeline and decides
//! which spans to release or skip. It never writes program content to
//! the sink itself.

pub mod blocks;
pub mod heidenhain;

pub use heidenhain::HeidenhainParser;

use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::handlers::HandlerPipeline;
use crate::model::StampingData;
use crate::stamper::Stamper;

/// Pluggable parser contract.
///
/// A parser drives the pipe's consumer side to completion: once `parse`
/// returns, every accepted line has been read, and all spans up to the
/// cursor have been resolved.
pub trait StampingParser {
    /// Read the whole program, raising events and resolving spans.
    fn parse<W>(
        &mut self,
        stamper: &mut Stamper<W>,
        pipeline: &mut HandlerPipeline,
        data: &mut StampingData,
    ) -> impl std::future::Future<Output = Result<()>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}
