use async_trait::async_trait;
use flate2::{Decompress, FlushDecompress, Status};

use super::error::FilterError;
use super::StreamFilter;
use crate::disk::BinaryStream;
use crate::segment::Segment;

const INFLATE_BUF_SIZE: usize = 16 * 1024;

/// Inflates a gzip-encoded body, forwarding decoded bytes to the delegate
/// filter.
///
/// The inflater is created by [`init`](StreamFilter::init) and torn down
/// by [`release`](StreamFilter::release); feeding data outside that
/// window is an error.
pub struct GzipDecodingStreamFilter {
    delegate: Box<dyn StreamFilter>,
    inflater: Option<Decompress>,
    stream_end: bool,
    bytes_processed: usize,
}

impl GzipDecodingStreamFilter {
    pub fn new(delegate: Box<dyn StreamFilter>) -> Self {
        Self {
            delegate,
            inflater: None,
            stream_end: false,
            bytes_processed: 0,
        }
    }
}

#[async_trait]
impl StreamFilter for GzipDecodingStreamFilter {
    fn init(&mut self) {
        self.inflater = Some(Decompress::new_gzip(15));
        self.stream_end = false;
        self.bytes_processed = 0;
        self.delegate.init();
    }

    async fn transform(
        &mut self,
        out: &mut dyn BinaryStream,
        segment: &mut dyn Segment,
        inbuf: &[u8],
    ) -> Result<usize, FilterError> {
        let inflater = self.inflater.as_mut().ok_or(FilterError::NotInitialized)?;

        let mut outlen = 0;
        let mut consumed = 0;
        let mut buf = vec![0u8; INFLATE_BUF_SIZE];
        while consumed < inbuf.len() && !self.stream_end {
            let in_before = inflater.total_in();
            let out_before = inflater.total_out();
            let status =
                inflater.decompress(&inbuf[consumed..], &mut buf, FlushDecompress::None)?;
            let used = (inflater.total_in() - in_before) as usize;
            let produced = (inflater.total_out() - out_before) as usize;
            consumed += used;

            if produced > 0 {
                outlen += self
                    .delegate
                    .transform(out, segment, &buf[..produced])
                    .await?;
            }
            if status == Status::StreamEnd {
                self.stream_end = true;
                break;
            }
            // Inflater wants more input than this call has.
            if used == 0 && produced == 0 {
                break;
            }
        }
        self.bytes_processed = consumed;
        Ok(outlen)
    }

    fn finished(&self) -> bool {
        self.stream_end && self.delegate.finished()
    }

    fn release(&mut self) {
        self.inflater = None;
        self.delegate.release();
    }

    fn bytes_processed(&self) -> usize {
        self.bytes_processed
    }

    fn name(&self) -> &'static str {
        "gzip"
    }
}
