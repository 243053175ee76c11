use async_trait::async_trait;
use bytes::Bytes;

use super::error::DiskError;

/// Offset-addressed byte sink/source over which decoded data is committed.
///
/// Implemented by [`MultiDiskAdaptor`](super::MultiDiskAdaptor) for
/// multi-file downloads and by [`MemoryStream`] for in-memory drains.
#[async_trait]
pub trait BinaryStream: Send {
    /// Writes all of `data` at `offset`.
    async fn write_data(&mut self, data: &[u8], offset: u64) -> Result<(), DiskError>;

    /// Reads into `buf` from `offset`, returning the bytes read. A short
    /// count means the stream ended before `buf` was filled.
    async fn read_data(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, DiskError>;
}

/// In-memory [`BinaryStream`]. Writes past the current end grow the buffer
/// with zero fill.
#[derive(Debug, Default)]
pub struct MemoryStream {
    buf: Vec<u8>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

#[async_trait]
impl BinaryStream for MemoryStream {
    async fn write_data(&mut self, data: &[u8], offset: u64) -> Result<(), DiskError> {
        let offset = offset as usize;
        let end = offset + data.len();
        if self.buf.len() < end {
            self.buf.resize(end, 0);
        }
        self.buf[offset..end].copy_from_slice(data);
        Ok(())
    }

    async fn read_data(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, DiskError> {
        let offset = (offset as usize).min(self.buf.len());
        let n = buf.len().min(self.buf.len() - offset);
        buf[..n].copy_from_slice(&self.buf[offset..offset + n]);
        Ok(n)
    }
}
