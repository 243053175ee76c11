//! Multi-file disk I/O behind a single contiguous byte address space.
//!
//! A download made of many physical files is addressed here as one logical
//! byte stream. The adaptor maps any global offset to the right file,
//! fans writes and reads out across file boundaries, opens files lazily
//! under a shared descriptor budget, and pre-allocates space for the
//! files a caller asked for.
//!
//! # Components
//!
//! - [`MultiDiskAdaptor`] - The contiguous view over N files
//! - [`FileEntry`] - Per-file metadata (path, length, logical offset)
//! - [`DiskWriter`] / [`DefaultDiskWriter`] - Offset-addressed single-file I/O
//! - [`OpenedFileCounter`] - Shared open-descriptor budget
//! - [`FileAllocationIterator`] - Resumable space pre-allocation
//! - [`BinaryStream`] / [`MemoryStream`] - Offset-addressed sink abstraction
//!
//! # Examples
//!
//! ```no_run
//! use fanout::disk::{FileEntry, MultiDiskAdaptor};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let files = vec![
//!     FileEntry::new(PathBuf::from("part1.bin"), 1000, 0),
//!     FileEntry::new(PathBuf::from("part2.bin"), 500, 1000),
//! ];
//!
//! let mut adaptor = MultiDiskAdaptor::new(PathBuf::from("./downloads"), files, 512)?;
//! adaptor.open_file().await?;
//!
//! // Spans the boundary between part1.bin and part2.bin.
//! adaptor.write_data(b"hello", 998).await?;
//!
//! let mut buf = [0u8; 5];
//! adaptor.read_data(&mut buf, 998).await?;
//! adaptor.close_file().await;
//! # Ok(())
//! # }
//! ```

mod adaptor;
mod allocation;
mod entry;
mod error;
mod open_files;
mod stream;
mod writer;

pub use adaptor::{AllocationMethod, MultiDiskAdaptor};
pub use allocation::{
    AdaptiveAllocationIterator, FallocAllocationIterator, FileAllocationIterator,
    MultiFileAllocationIterator, TruncAllocationIterator,
};
pub use entry::{DiskWriterEntry, FileEntry, OpenMode};
pub use error::DiskError;
pub use open_files::{OpenedFileCounter, DEFAULT_MAX_OPEN_FILES};
pub use stream::{BinaryStream, MemoryStream};
pub use writer::{DefaultDiskWriter, DiskWriter};

#[cfg(test)]
mod tests;
