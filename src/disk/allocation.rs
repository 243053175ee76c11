use std::collections::VecDeque;

use async_trait::async_trait;

use super::adaptor::{AllocationMethod, MultiDiskAdaptor};
use super::entry::OpenMode;
use super::error::DiskError;
use super::writer::DiskWriter;

/// Bytes zero-filled per [`AdaptiveAllocationIterator`] chunk.
const ADAPTIVE_CHUNK_SIZE: u64 = 256 * 1024;

/// Incremental file pre-allocation.
///
/// Each [`allocate_chunk`](Self::allocate_chunk) call performs one bounded
/// unit of work so callers can interleave allocation with other activity
/// and abandon or resume it at any point.
#[async_trait]
pub trait FileAllocationIterator: Send {
    /// Performs one bounded unit of allocation work. No-op once
    /// [`finished`](Self::finished).
    async fn allocate_chunk(&mut self) -> Result<(), DiskError>;

    fn finished(&self) -> bool;

    /// Bytes allocated so far for the file currently being worked on.
    fn current_length(&self) -> u64;

    /// Target size of the file currently being worked on.
    fn total_length(&self) -> u64;
}

/// Zero-fills the file in fixed-size chunks. Portable and resumable at
/// chunk granularity.
pub struct AdaptiveAllocationIterator<'a> {
    writer: &'a mut dyn DiskWriter,
    current_length: u64,
    total_length: u64,
}

impl<'a> AdaptiveAllocationIterator<'a> {
    pub fn new(writer: &'a mut dyn DiskWriter, current_length: u64, total_length: u64) -> Self {
        Self {
            writer,
            current_length,
            total_length,
        }
    }
}

#[async_trait]
impl FileAllocationIterator for AdaptiveAllocationIterator<'_> {
    async fn allocate_chunk(&mut self) -> Result<(), DiskError> {
        if self.finished() {
            return Ok(());
        }
        let n = ADAPTIVE_CHUNK_SIZE.min(self.total_length - self.current_length);
        let zeroes = vec![0u8; n as usize];
        self.writer.write_data(&zeroes, self.current_length).await?;
        self.current_length += n;
        Ok(())
    }

    fn finished(&self) -> bool {
        self.current_length >= self.total_length
    }

    fn current_length(&self) -> u64 {
        self.current_length
    }

    fn total_length(&self) -> u64 {
        self.total_length
    }
}

/// Reserves the remaining range with a single filesystem allocation call.
pub struct FallocAllocationIterator<'a> {
    writer: &'a mut dyn DiskWriter,
    current_length: u64,
    total_length: u64,
}

impl<'a> FallocAllocationIterator<'a> {
    pub fn new(writer: &'a mut dyn DiskWriter, current_length: u64, total_length: u64) -> Self {
        Self {
            writer,
            current_length,
            total_length,
        }
    }
}

#[async_trait]
impl FileAllocationIterator for FallocAllocationIterator<'_> {
    async fn allocate_chunk(&mut self) -> Result<(), DiskError> {
        if self.finished() {
            return Ok(());
        }
        self.writer
            .allocate(self.current_length, self.total_length - self.current_length, false)
            .await?;
        self.current_length = self.total_length;
        Ok(())
    }

    fn finished(&self) -> bool {
        self.current_length >= self.total_length
    }

    fn current_length(&self) -> u64 {
        self.current_length
    }

    fn total_length(&self) -> u64 {
        self.total_length
    }
}

/// Extends the file to its target size with one truncate call, leaving it
/// sparse.
pub struct TruncAllocationIterator<'a> {
    writer: &'a mut dyn DiskWriter,
    current_length: u64,
    total_length: u64,
}

impl<'a> TruncAllocationIterator<'a> {
    pub fn new(writer: &'a mut dyn DiskWriter, current_length: u64, total_length: u64) -> Self {
        Self {
            writer,
            current_length,
            total_length,
        }
    }
}

#[async_trait]
impl FileAllocationIterator for TruncAllocationIterator<'_> {
    async fn allocate_chunk(&mut self) -> Result<(), DiskError> {
        if self.finished() {
            return Ok(());
        }
        self.writer.truncate(self.total_length).await?;
        self.current_length = self.total_length;
        Ok(())
    }

    fn finished(&self) -> bool {
        self.current_length >= self.total_length
    }

    fn current_length(&self) -> u64 {
        self.current_length
    }

    fn total_length(&self) -> u64 {
        self.total_length
    }
}

struct CurrentAllocation {
    index: usize,
    current_length: u64,
    total_length: u64,
}

/// Walks every entry of a [`MultiDiskAdaptor`] that was marked as needing
/// allocation and brings each up to its declared length using the
/// adaptor's [`AllocationMethod`].
///
/// Entries already at or above their declared size are skipped, which is
/// what makes interrupted allocation runs cheap to resume.
pub struct MultiFileAllocationIterator<'a> {
    adaptor: &'a mut MultiDiskAdaptor,
    queue: VecDeque<usize>,
    current: Option<CurrentAllocation>,
}

impl<'a> MultiFileAllocationIterator<'a> {
    pub(crate) fn new(adaptor: &'a mut MultiDiskAdaptor) -> Self {
        let queue = adaptor
            .disk_writer_entries()
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.needs_file_allocation() && e.has_disk_writer() && e.file_entry().length > 0
            })
            .map(|(i, _)| i)
            .collect();
        Self {
            adaptor,
            queue,
            current: None,
        }
    }

    /// Pops queued entries until one actually needs bytes.
    async fn advance(&mut self) -> Result<(), DiskError> {
        while let Some(index) = self.queue.pop_front() {
            self.adaptor.open_if_not(index, OpenMode::Open).await?;
            let entry = self.adaptor.entry_mut(index);
            let total_length = entry.file_entry().length;
            let writer = entry.try_disk_writer_mut()?;
            let current_length = writer.size().await?;
            if current_length < total_length {
                self.current = Some(CurrentAllocation {
                    index,
                    current_length,
                    total_length,
                });
                return Ok(());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FileAllocationIterator for MultiFileAllocationIterator<'_> {
    async fn allocate_chunk(&mut self) -> Result<(), DiskError> {
        if self.current.is_none() {
            self.advance().await?;
        }
        let method = self.adaptor.allocation_method();
        let Some(cur) = &mut self.current else {
            return Ok(());
        };
        self.adaptor.open_if_not(cur.index, OpenMode::Open).await?;
        let entry = self.adaptor.entry_mut(cur.index);
        let writer = entry.try_disk_writer_mut()?;

        match method {
            AllocationMethod::Adaptive => {
                let mut it =
                    AdaptiveAllocationIterator::new(writer, cur.current_length, cur.total_length);
                it.allocate_chunk().await?;
                cur.current_length = it.current_length();
            }
            AllocationMethod::Falloc => {
                let mut it =
                    FallocAllocationIterator::new(writer, cur.current_length, cur.total_length);
                it.allocate_chunk().await?;
                cur.current_length = it.current_length();
            }
            AllocationMethod::Trunc => {
                let mut it =
                    TruncAllocationIterator::new(writer, cur.current_length, cur.total_length);
                it.allocate_chunk().await?;
                cur.current_length = it.current_length();
            }
        }

        if cur.current_length >= cur.total_length {
            self.current = None;
        }
        Ok(())
    }

    fn finished(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    fn current_length(&self) -> u64 {
        self.current.as_ref().map_or(0, |c| c.current_length)
    }

    fn total_length(&self) -> u64 {
        self.current.as_ref().map_or(0, |c| c.total_length)
    }
}
