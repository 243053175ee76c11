use async_trait::async_trait;

use super::error::FilterError;
use super::StreamFilter;
use crate::disk::BinaryStream;
use crate::segment::Segment;

/// Terminal filter that commits bytes to the output stream at the
/// segment's write position.
///
/// When the segment has a known length the write is clamped to the bytes
/// still missing from it; a zero-length segment accepts everything
/// (unbounded transfers).
#[derive(Debug, Default)]
pub struct SinkStreamFilter {
    bytes_processed: usize,
}

impl SinkStreamFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamFilter for SinkStreamFilter {
    fn init(&mut self) {
        self.bytes_processed = 0;
    }

    async fn transform(
        &mut self,
        out: &mut dyn BinaryStream,
        segment: &mut dyn Segment,
        inbuf: &[u8],
    ) -> Result<usize, FilterError> {
        let wlen = if segment.length() > 0 {
            let missing = segment.length() - segment.written_length();
            (inbuf.len() as u64).min(missing) as usize
        } else {
            inbuf.len()
        };

        out.write_data(&inbuf[..wlen], segment.position_to_write())
            .await?;
        segment.update_hash(&inbuf[..wlen]);
        segment.update_written_length(wlen as u64);

        self.bytes_processed = wlen;
        Ok(wlen)
    }

    fn finished(&self) -> bool {
        true
    }

    fn release(&mut self) {}

    fn bytes_processed(&self) -> usize {
        self.bytes_processed
    }

    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Terminal filter that discards everything. Used when a response body
/// must be drained but its content is irrelevant.
#[derive(Debug, Default)]
pub struct NullSinkStreamFilter {
    bytes_processed: usize,
}

impl NullSinkStreamFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StreamFilter for NullSinkStreamFilter {
    fn init(&mut self) {
        self.bytes_processed = 0;
    }

    async fn transform(
        &mut self,
        _out: &mut dyn BinaryStream,
        _segment: &mut dyn Segment,
        inbuf: &[u8],
    ) -> Result<usize, FilterError> {
        self.bytes_processed = inbuf.len();
        Ok(inbuf.len())
    }

    fn finished(&self) -> bool {
        true
    }

    fn release(&mut self) {}

    fn bytes_processed(&self) -> usize {
        self.bytes_processed
    }

    fn name(&self) -> &'static str {
        "null-sink"
    }
}
