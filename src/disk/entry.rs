use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::DiskError;
use super::writer::DiskWriter;

/// Metadata for one physical file within a multi-file logical download.
///
/// `offset` is the absolute start of this file within the logical byte
/// stream. Entries handed to an adaptor must form a gapless partition of
/// `[0, total_length)`; zero-length files occupy a single point.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path relative to the adaptor's base directory.
    pub path: PathBuf,
    pub length: u64,
    pub offset: u64,
    /// Whether bytes destined for this file should be materialized.
    pub requested: bool,
}

impl FileEntry {
    pub fn new(path: PathBuf, length: u64, offset: u64) -> Self {
        Self {
            path,
            length,
            offset,
            requested: true,
        }
    }

    pub fn with_requested(mut self, requested: bool) -> Self {
        self.requested = requested;
        self
    }

    pub fn byte_range(&self) -> std::ops::Range<u64> {
        self.offset..self.offset + self.length
    }

    pub fn contains_offset(&self, offset: u64) -> bool {
        offset >= self.offset && offset < self.offset + self.length
    }
}

/// How an entry's file should be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create if missing, keep existing content.
    Open,
    /// Create or truncate.
    Truncate,
    /// Fail if the file does not exist.
    Existing,
}

/// Pairs one [`FileEntry`] with its lazily created [`DiskWriter`].
///
/// An entry may legitimately have no writer at all: files that are neither
/// requested, nor share a piece with a requested neighbor, nor already
/// exist on disk are tracked but never touched.
pub struct DiskWriterEntry {
    file_entry: Arc<FileEntry>,
    path: PathBuf,
    disk_writer: Option<Box<dyn DiskWriter>>,
    open: bool,
    needs_file_allocation: bool,
    needs_disk_writer: bool,
}

impl DiskWriterEntry {
    /// `path` is the resolved on-disk location (base directory joined with
    /// the entry's relative path).
    pub fn new(file_entry: Arc<FileEntry>, path: PathBuf) -> Self {
        Self {
            file_entry,
            path,
            disk_writer: None,
            open: false,
            needs_file_allocation: false,
            needs_disk_writer: false,
        }
    }

    pub fn file_entry(&self) -> &Arc<FileEntry> {
        &self.file_entry
    }

    /// Resolved on-disk path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_disk_writer(&mut self, writer: Box<dyn DiskWriter>) {
        self.disk_writer = Some(writer);
    }

    pub fn disk_writer(&self) -> Option<&dyn DiskWriter> {
        self.disk_writer.as_deref()
    }

    pub fn disk_writer_mut(&mut self) -> Option<&mut Box<dyn DiskWriter>> {
        self.disk_writer.as_mut()
    }

    /// Mutable writer access for operations where a missing writer is a
    /// hard error rather than a skip.
    pub fn try_disk_writer_mut(&mut self) -> Result<&mut dyn DiskWriter, DiskError> {
        match &mut self.disk_writer {
            Some(writer) => Ok(writer.as_mut()),
            None => Err(DiskError::NoDiskWriter(self.path.display().to_string())),
        }
    }

    pub fn has_disk_writer(&self) -> bool {
        self.disk_writer.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn needs_file_allocation(&self) -> bool {
        self.needs_file_allocation
    }

    pub fn set_needs_file_allocation(&mut self, needs: bool) {
        self.needs_file_allocation = needs;
    }

    pub fn needs_disk_writer(&self) -> bool {
        self.needs_disk_writer
    }

    pub fn set_needs_disk_writer(&mut self, needs: bool) {
        self.needs_disk_writer = needs;
    }

    /// Opens the underlying writer, if one exists. No-op otherwise.
    pub async fn open_file(&mut self, mode: OpenMode) -> Result<(), DiskError> {
        if let Some(writer) = &mut self.disk_writer {
            match mode {
                OpenMode::Open => writer.open_file().await?,
                OpenMode::Truncate => writer.init_and_open_file().await?,
                OpenMode::Existing => writer.open_existing_file().await?,
            }
            self.open = true;
        }
        Ok(())
    }

    /// Closes the underlying writer. Idempotent.
    pub async fn close_file(&mut self) {
        if !self.open {
            return;
        }
        if let Some(writer) = &mut self.disk_writer {
            writer.close_file().await;
        }
        self.open = false;
    }

    /// On-disk size, queried from the filesystem. A missing file counts
    /// as zero bytes.
    pub async fn size(&self) -> Result<u64, DiskError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(DiskError::Io(e)),
        }
    }
}
