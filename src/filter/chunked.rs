use async_trait::async_trait;

use super::error::FilterError;
use super::StreamFilter;
use crate::disk::BinaryStream;
use crate::segment::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading hex digits of the chunk-size line.
    ChunkSize,
    /// Skipping a chunk extension up to CR.
    ChunkExtension,
    /// Saw CR after the size line, expecting LF.
    ChunkSizeLf,
    /// Forwarding chunk payload bytes.
    Chunk,
    /// Expecting the CR that terminates a chunk's payload.
    ChunkCr,
    /// Expecting the LF after that CR.
    ChunkLf,
    /// Start of a line after the last (zero-size) chunk.
    TrailerStart,
    /// Skipping a trailer header line up to CR.
    Trailer,
    /// Expecting the LF terminating a trailer line.
    TrailerLf,
    /// Expecting the final LF of the terminating empty line.
    EndLf,
    /// The encoding is fully consumed.
    Complete,
}

/// Decodes HTTP `Transfer-Encoding: chunked` framing, forwarding payload
/// bytes to the delegate filter.
///
/// Input may be fed in arbitrary slices; framing state carries across
/// calls. Chunk extensions and trailer headers are tolerated and
/// discarded.
pub struct ChunkedDecodingStreamFilter {
    delegate: Box<dyn StreamFilter>,
    state: State,
    chunk_size: u64,
    chunk_remaining: u64,
    bytes_processed: usize,
}

impl ChunkedDecodingStreamFilter {
    pub fn new(delegate: Box<dyn StreamFilter>) -> Self {
        Self {
            delegate,
            state: State::ChunkSize,
            chunk_size: 0,
            chunk_remaining: 0,
            bytes_processed: 0,
        }
    }

    fn consume(&mut self, c: u8) -> Result<(), FilterError> {
        match self.state {
            State::ChunkSize => match c {
                b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => {
                    let digit = match c {
                        b'0'..=b'9' => u64::from(c - b'0'),
                        b'a'..=b'f' => u64::from(c - b'a' + 10),
                        _ => u64::from(c - b'A' + 10),
                    };
                    if self.chunk_size > (i64::MAX as u64 - digit) / 16 {
                        return Err(FilterError::ChunkSizeOverflow);
                    }
                    self.chunk_size = self.chunk_size * 16 + digit;
                }
                b';' => self.state = State::ChunkExtension,
                b'\r' => self.state = State::ChunkSizeLf,
                _ => return Err(FilterError::InvalidChunkSizeDigit(c)),
            },
            State::ChunkExtension => {
                if c == b'\r' {
                    self.state = State::ChunkSizeLf;
                }
            }
            State::ChunkSizeLf => {
                if c != b'\n' {
                    return Err(FilterError::ExpectedLf(c));
                }
                if self.chunk_size == 0 {
                    self.state = State::TrailerStart;
                } else {
                    self.chunk_remaining = self.chunk_size;
                    self.chunk_size = 0;
                    self.state = State::Chunk;
                }
            }
            // Payload bytes are forwarded in bulk by `transform`.
            State::Chunk | State::Complete => {}
            State::ChunkCr => {
                if c != b'\r' {
                    return Err(FilterError::ExpectedCr(c));
                }
                self.state = State::ChunkLf;
            }
            State::ChunkLf => {
                if c != b'\n' {
                    return Err(FilterError::ExpectedLf(c));
                }
                self.state = State::ChunkSize;
            }
            State::TrailerStart => {
                if c == b'\r' {
                    self.state = State::EndLf;
                } else {
                    self.state = State::Trailer;
                }
            }
            State::Trailer => {
                if c == b'\r' {
                    self.state = State::TrailerLf;
                }
            }
            State::TrailerLf => {
                if c != b'\n' {
                    return Err(FilterError::ExpectedLf(c));
                }
                self.state = State::TrailerStart;
            }
            State::EndLf => {
                if c != b'\n' {
                    return Err(FilterError::ExpectedLf(c));
                }
                self.state = State::Complete;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StreamFilter for ChunkedDecodingStreamFilter {
    fn init(&mut self) {
        self.state = State::ChunkSize;
        self.chunk_size = 0;
        self.chunk_remaining = 0;
        self.bytes_processed = 0;
        self.delegate.init();
    }

    async fn transform(
        &mut self,
        out: &mut dyn BinaryStream,
        segment: &mut dyn Segment,
        inbuf: &[u8],
    ) -> Result<usize, FilterError> {
        let mut outlen = 0;
        let mut i = 0;
        while i < inbuf.len() {
            match self.state {
                State::Chunk => {
                    let n = (self.chunk_remaining).min((inbuf.len() - i) as u64) as usize;
                    outlen += self
                        .delegate
                        .transform(out, segment, &inbuf[i..i + n])
                        .await?;
                    self.chunk_remaining -= n as u64;
                    i += n;
                    if self.chunk_remaining == 0 {
                        self.state = State::ChunkCr;
                    }
                }
                State::Complete => break,
                _ => {
                    self.consume(inbuf[i])?;
                    i += 1;
                }
            }
        }
        self.bytes_processed = i;
        Ok(outlen)
    }

    fn finished(&self) -> bool {
        self.state == State::Complete && self.delegate.finished()
    }

    fn release(&mut self) {
        self.delegate.release();
    }

    fn bytes_processed(&self) -> usize {
        self.bytes_processed
    }

    fn name(&self) -> &'static str {
        "chunked"
    }
}
