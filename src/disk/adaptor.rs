use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng as _;

use super::allocation::MultiFileAllocationIterator;
use super::entry::{DiskWriterEntry, FileEntry, OpenMode};
use super::error::DiskError;
use super::open_files::{OpenedFileCounter, DEFAULT_MAX_OPEN_FILES};
use super::stream::BinaryStream;
use super::writer::DefaultDiskWriter;

/// Strategy used to pre-allocate file space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationMethod {
    /// Incremental zero-fill writes; portable and resumable.
    #[default]
    Adaptive,
    /// One filesystem allocation call per file (`posix_fallocate` where
    /// available).
    Falloc,
    /// Extend to full size via truncate; leaves the file sparse.
    Trunc,
}

fn validate_file_path(file_path: &Path) -> Result<(), DiskError> {
    for component in file_path.components() {
        match component {
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DiskError::PathTraversal(file_path.display().to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Presents a single contiguous address space over N physical files.
///
/// File entries are kept sorted by offset so any valid global offset
/// resolves to the entry whose byte range contains it by binary search.
/// Files are opened lazily, and the number of simultaneously open entries
/// is kept within the budget of the shared [`OpenedFileCounter`] by
/// randomly evicting open entries before each new open.
pub struct MultiDiskAdaptor {
    base_path: PathBuf,
    file_entries: Vec<Arc<FileEntry>>,
    entries: Vec<DiskWriterEntry>,
    /// Indices of currently open entries.
    opened: Vec<usize>,
    piece_length: u64,
    total_length: u64,
    allocation_method: AllocationMethod,
    open_counter: Arc<OpenedFileCounter>,
    read_only: bool,
}

impl MultiDiskAdaptor {
    /// Creates an adaptor over `file_entries`, which must be sorted by
    /// offset and form a gapless partition starting at 0. A
    /// `piece_length` of 0 disables shared-piece detection entirely.
    pub fn new(
        base_path: PathBuf,
        file_entries: Vec<FileEntry>,
        piece_length: u64,
    ) -> Result<Self, DiskError> {
        let mut position = 0u64;
        for fe in &file_entries {
            validate_file_path(&fe.path)?;
            if fe.offset != position {
                return Err(DiskError::InvalidFileLayout {
                    path: fe.path.display().to_string(),
                    actual: fe.offset,
                    expected: position,
                });
            }
            position += fe.length;
        }

        Ok(Self {
            base_path,
            file_entries: file_entries.into_iter().map(Arc::new).collect(),
            entries: Vec::new(),
            opened: Vec::new(),
            piece_length,
            total_length: position,
            allocation_method: AllocationMethod::Adaptive,
            open_counter: OpenedFileCounter::new(DEFAULT_MAX_OPEN_FILES),
            read_only: false,
        })
    }

    pub fn with_allocation_method(mut self, method: AllocationMethod) -> Self {
        self.allocation_method = method;
        self
    }

    /// Shares an open-file budget with other adaptors.
    pub fn with_open_file_counter(mut self, counter: Arc<OpenedFileCounter>) -> Self {
        self.open_counter = counter;
        self
    }

    pub fn with_max_open_files(self, max_open_files: usize) -> Self {
        self.with_open_file_counter(OpenedFileCounter::new(max_open_files))
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    pub fn allocation_method(&self) -> AllocationMethod {
        self.allocation_method
    }

    pub fn file_entries(&self) -> &[Arc<FileEntry>] {
        &self.file_entries
    }

    pub fn disk_writer_entries(&self) -> &[DiskWriterEntry] {
        &self.entries
    }

    pub fn open_file_counter(&self) -> &Arc<OpenedFileCounter> {
        &self.open_counter
    }

    /// Number of entries currently open in this adaptor.
    pub fn num_open(&self) -> usize {
        self.opened.len()
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> &mut DiskWriterEntry {
        &mut self.entries[index]
    }

    /// Rebuilds the [`DiskWriterEntry`] list from the current file-entry
    /// set and decides which entries get a writer and which need space
    /// allocation.
    ///
    /// With a non-zero piece length a file gets a writer iff it is
    /// requested, shares a piece boundary with a requested file, or
    /// already exists on disk. Files preceding a requested file whose
    /// first piece reaches back into them additionally need allocation so
    /// the shared piece lands in reserved space.
    async fn reset_disk_writer_entries(&mut self) -> Result<(), DiskError> {
        debug_assert!(self.opened.is_empty(), "entries open from a prior session");
        self.entries.clear();
        self.opened.clear();

        for fe in &self.file_entries {
            let path = self.base_path.join(&fe.path);
            self.entries.push(DiskWriterEntry::new(fe.clone(), path));
        }
        if self.entries.is_empty() {
            return Ok(());
        }

        if self.piece_length == 0 {
            for entry in &mut self.entries {
                if entry.file_entry().requested {
                    entry.set_needs_file_allocation(true);
                }
            }
        } else {
            let piece_length = self.piece_length;
            for i in 0..self.entries.len() {
                let fe = Arc::clone(self.entries[i].file_entry());
                if !fe.requested {
                    continue;
                }
                self.entries[i].set_needs_file_allocation(true);
                if fe.length == 0 {
                    continue;
                }

                // The piece holding this file's last byte may spill into
                // the files that follow.
                let last_piece_end = ((fe.offset + fe.length - 1) / piece_length + 1) * piece_length;
                for j in i + 1..self.entries.len() {
                    if self.entries[j].file_entry().offset >= last_piece_end {
                        break;
                    }
                    self.entries[j].set_needs_disk_writer(true);
                }

                // The piece holding this file's first byte may start in
                // the files before it.
                let first_piece_start = fe.offset / piece_length * piece_length;
                for j in (0..i).rev() {
                    let prev = self.entries[j].file_entry();
                    if prev.offset + prev.length <= first_piece_start {
                        break;
                    }
                    self.entries[j].set_needs_file_allocation(true);
                }
            }
        }

        let mut num_writers = 0;
        for entry in &mut self.entries {
            let wanted = entry.file_entry().requested
                || entry.needs_disk_writer()
                || entry.needs_file_allocation()
                || matches!(tokio::fs::try_exists(entry.path()).await, Ok(true));
            if wanted {
                let writer =
                    DefaultDiskWriter::new(entry.path().to_path_buf()).with_read_only(self.read_only);
                entry.set_disk_writer(Box::new(writer));
                num_writers += 1;
            }
        }
        tracing::debug!(
            entries = self.entries.len(),
            writers = num_writers,
            "rebuilt disk writer entries"
        );
        Ok(())
    }

    async fn open_all(&mut self, mode: OpenMode) -> Result<(), DiskError> {
        for i in 0..self.entries.len() {
            if self.entries[i].has_disk_writer() {
                self.open_if_not(i, mode).await?;
            }
        }
        Ok(())
    }

    /// Rebuilds entries and opens every entry backed by a writer, creating
    /// zero-length files so they exist on disk. Existing content is kept.
    pub async fn open_file(&mut self) -> Result<(), DiskError> {
        self.reset_disk_writer_entries().await?;
        self.open_all(OpenMode::Open).await
    }

    /// Like [`open_file`](Self::open_file) but truncates existing files.
    pub async fn init_and_open_file(&mut self) -> Result<(), DiskError> {
        self.reset_disk_writer_entries().await?;
        self.open_all(OpenMode::Truncate).await
    }

    /// Rebuilds entries without touching the disk; files are opened
    /// lazily on first access.
    pub async fn open_existing_file(&mut self) -> Result<(), DiskError> {
        self.reset_disk_writer_entries().await
    }

    /// Closes every open entry and releases its share of the open-file
    /// budget. Idempotent.
    pub async fn close_file(&mut self) {
        let opened = std::mem::take(&mut self.opened);
        let count = opened.len();
        for i in opened {
            self.entries[i].close_file().await;
        }
        if count > 0 {
            self.open_counter.reduce_num_of_opened_file(count);
        }
    }

    /// The sole closed-to-open transition. Reserves budget first and
    /// evicts other open entries of this adaptor when over it.
    pub(crate) async fn open_if_not(&mut self, index: usize, mode: OpenMode) -> Result<(), DiskError> {
        if self.entries[index].is_open() || !self.entries[index].has_disk_writer() {
            return Ok(());
        }
        let num_close = self.open_counter.ensure_max_open_file_limit(1);
        if num_close > 0 {
            self.try_close_file(num_close).await;
        }
        match self.entries[index].open_file(mode).await {
            Ok(()) => {
                self.opened.push(index);
                Ok(())
            }
            Err(e) => {
                self.open_counter.reduce_num_of_opened_file(1);
                Err(e)
            }
        }
    }

    /// Closes up to `num_close` randomly chosen open entries and returns
    /// the number actually closed. Random choice avoids pathological
    /// always-reopen-the-same-file patterns.
    pub async fn try_close_file(&mut self, num_close: usize) -> usize {
        let mut closed = 0;
        while closed < num_close && !self.opened.is_empty() {
            let pick = rand::rng().random_range(0..self.opened.len());
            let index = self.opened.swap_remove(pick);
            self.entries[index].close_file().await;
            closed += 1;
        }
        if closed > 0 {
            self.open_counter.reduce_num_of_opened_file(closed);
            tracing::trace!(closed, "evicted open entries under descriptor pressure");
        }
        closed
    }

    /// Index of the entry whose byte range contains `offset`.
    fn first_entry_index(&self, offset: u64) -> Result<usize, DiskError> {
        if offset >= self.total_length {
            return Err(DiskError::OffsetOutOfRange {
                offset,
                total_length: self.total_length,
            });
        }
        // Last entry starting at or before `offset`; zero-length entries
        // sort before the entry that consumes bytes at the same point.
        let i = self
            .entries
            .partition_point(|e| e.file_entry().offset <= offset);
        Ok(i - 1)
    }

    /// Clamps a request of `rem` bytes at `file_offset` within entry `i`
    /// to that entry's remaining capacity.
    fn calculate_length(&self, index: usize, file_offset: u64, rem: usize) -> usize {
        let available = self.entries[index].file_entry().length - file_offset;
        (rem as u64).min(available) as usize
    }

    /// Writes `data` at the global `offset`, fanning the write out across
    /// file boundaries. Writes either fully complete or fail.
    pub async fn write_data(&mut self, data: &[u8], offset: u64) -> Result<(), DiskError> {
        let mut index = self.first_entry_index(offset)?;
        let mut file_offset = offset - self.entries[index].file_entry().offset;
        let len = data.len();
        let mut rem = len;

        while rem > 0 {
            if index == self.entries.len() {
                return Err(DiskError::OffsetOutOfRange {
                    offset,
                    total_length: self.total_length,
                });
            }
            let write_length = self.calculate_length(index, file_offset, rem);
            self.open_if_not(index, OpenMode::Open).await?;

            let entry = self.entry_mut(index);
            let writer = entry.try_disk_writer_mut()?;
            let pos = len - rem;
            writer
                .write_data(&data[pos..pos + write_length], file_offset)
                .await?;

            rem -= write_length;
            file_offset = 0;
            index += 1;
        }
        Ok(())
    }

    async fn read_data_internal(
        &mut self,
        buf: &mut [u8],
        offset: u64,
        drop_cache: bool,
    ) -> Result<usize, DiskError> {
        let mut index = self.first_entry_index(offset)?;
        let mut file_offset = offset - self.entries[index].file_entry().offset;
        let len = buf.len();
        let mut rem = len;

        while rem > 0 && index < self.entries.len() {
            let read_length = self.calculate_length(index, file_offset, rem);
            self.open_if_not(index, OpenMode::Open).await?;

            let entry = self.entry_mut(index);
            let writer = entry.try_disk_writer_mut()?;
            let pos = len - rem;
            let n = writer
                .read_data(&mut buf[pos..pos + read_length], file_offset)
                .await?;
            if drop_cache {
                writer.drop_cache(read_length as u64, file_offset).await;
            }

            rem -= n;
            // A short read means the file ends before its declared
            // length; report what we have.
            if n < read_length {
                break;
            }
            file_offset = 0;
            index += 1;
        }
        Ok(len - rem)
    }

    /// Reads into `buf` from the global `offset`, returning the number of
    /// bytes read. A short count means the on-disk data ended early.
    pub async fn read_data(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, DiskError> {
        self.read_data_internal(buf, offset, false).await
    }

    /// Like [`read_data`](Self::read_data), additionally hinting the OS
    /// to drop cached pages for the range just read.
    pub async fn read_data_drop_cache(
        &mut self,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize, DiskError> {
        self.read_data_internal(buf, offset, true).await
    }

    /// Reads up to `length` bytes at `offset` into an owned buffer.
    pub async fn read_range(&mut self, offset: u64, length: usize) -> Result<Bytes, DiskError> {
        let mut buf = vec![0u8; length];
        let n = self.read_data(&mut buf, offset).await?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    /// Truncates every file whose on-disk size exceeds its declared
    /// length, reconciling resumed downloads that wrote past the final
    /// piece boundary.
    pub async fn cut_trailing_garbage(&mut self) -> Result<(), DiskError> {
        for index in 0..self.entries.len() {
            let declared = self.entries[index].file_entry().length;
            let on_disk = self.entries[index].size().await?;
            if on_disk > declared {
                self.open_if_not(index, OpenMode::Open).await?;
                let entry = self.entry_mut(index);
                tracing::debug!(
                    path = %entry.path().display(),
                    on_disk,
                    declared,
                    "cutting trailing garbage"
                );
                let writer = entry.try_disk_writer_mut()?;
                writer.truncate(declared).await?;
            }
        }
        Ok(())
    }

    /// Sum of on-disk sizes across all entries.
    pub async fn size(&self) -> Result<u64, DiskError> {
        let mut total = 0;
        for entry in &self.entries {
            total += entry.size().await?;
        }
        Ok(total)
    }

    /// Flushes OS write buffers for every open entry.
    pub async fn flush_os_buffers(&mut self) -> Result<(), DiskError> {
        for index in self.opened.clone() {
            if let Some(writer) = self.entries[index].disk_writer_mut() {
                writer.flush_os_buffers().await?;
            }
        }
        Ok(())
    }

    /// Returns a resumable iterator pre-allocating space for every entry
    /// that needs it, one bounded chunk at a time.
    pub fn file_allocation_iterator(&mut self) -> MultiFileAllocationIterator<'_> {
        MultiFileAllocationIterator::new(self)
    }
}

#[async_trait]
impl BinaryStream for MultiDiskAdaptor {
    async fn write_data(&mut self, data: &[u8], offset: u64) -> Result<(), DiskError> {
        MultiDiskAdaptor::write_data(self, data, offset).await
    }

    async fn read_data(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, DiskError> {
        MultiDiskAdaptor::read_data(self, buf, offset).await
    }
}
