//! Streaming transfer decoders.
//!
//! Response bodies arrive wrapped in transfer framings (HTTP chunked
//! encoding, gzip content encoding). Filters peel those off incrementally
//! as bytes arrive and hand the payload to the next filter in the chain,
//! with a sink at the end committing decoded bytes to a
//! [`BinaryStream`](crate::disk::BinaryStream) at the current segment
//! position. Filters never buffer whole bodies; arbitrary input slicing
//! is part of the contract.
//!
//! # Components
//!
//! - [`StreamFilter`] - The chainable decoder interface
//! - [`ChunkedDecodingStreamFilter`] - HTTP chunked transfer framing
//! - [`GzipDecodingStreamFilter`] - gzip content encoding
//! - [`SinkStreamFilter`] / [`NullSinkStreamFilter`] - Chain terminators
//!
//! # Examples
//!
//! ```no_run
//! use fanout::disk::MemoryStream;
//! use fanout::filter::{ChunkedDecodingStreamFilter, SinkStreamFilter, StreamFilter};
//! use fanout::segment::PieceSegment;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut filter = ChunkedDecodingStreamFilter::new(Box::new(SinkStreamFilter::new()));
//! filter.init();
//!
//! let mut out = MemoryStream::new();
//! let mut segment = PieceSegment::new(0, 10);
//! filter
//!     .transform(&mut out, &mut segment, b"a\r\n1234567890\r\n0\r\n\r\n")
//!     .await?;
//! assert!(filter.finished());
//! assert_eq!(out.data(), b"1234567890");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::disk::BinaryStream;
use crate::segment::Segment;

mod chunked;
mod error;
mod gzip;
mod sink;

pub use chunked::ChunkedDecodingStreamFilter;
pub use error::FilterError;
pub use gzip::GzipDecodingStreamFilter;
pub use sink::{NullSinkStreamFilter, SinkStreamFilter};

/// One stage of a streaming decode chain.
///
/// `transform` consumes a slice of encoded input and forwards whatever
/// payload it uncovered to the next stage, ultimately landing in `out` at
/// the position tracked by `segment`. Implementations must accept input
/// split at arbitrary byte boundaries.
#[async_trait]
pub trait StreamFilter: Send {
    /// Prepares the filter (and its delegates) for a fresh body.
    fn init(&mut self);

    /// Feeds `inbuf` through this stage. Returns the number of decoded
    /// bytes that reached the end of the chain during this call.
    async fn transform(
        &mut self,
        out: &mut dyn BinaryStream,
        segment: &mut dyn Segment,
        inbuf: &[u8],
    ) -> Result<usize, FilterError>;

    /// Whether the framing this filter decodes has been fully consumed.
    fn finished(&self) -> bool;

    /// Drops decoder state (and that of delegates).
    fn release(&mut self);

    /// Input bytes consumed by the most recent
    /// [`transform`](Self::transform) call.
    fn bytes_processed(&self) -> usize;

    /// Short stable name for logs.
    fn name(&self) -> &'static str;
}
