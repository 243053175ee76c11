//! fanout - storage and decoding for segmented downloads
//!
//! This library maps a single logical byte-range download onto a set of
//! physical files and decodes data as it streams off the wire, before it
//! is written to disk.
//!
//! # Modules
//!
//! - [`disk`] - Multi-file disk adaptor, lazy file handles, space allocation
//! - [`filter`] - Layered stream decoding (chunked transfer-encoding, gzip)
//! - [`segment`] - Write-progress tracking for one contiguous download range

pub mod disk;
pub mod filter;
pub mod segment;

pub use disk::{
    AdaptiveAllocationIterator, AllocationMethod, BinaryStream, DefaultDiskWriter, DiskError,
    DiskWriter, DiskWriterEntry, FallocAllocationIterator, FileAllocationIterator, FileEntry,
    MemoryStream, MultiDiskAdaptor, MultiFileAllocationIterator, OpenMode, OpenedFileCounter,
    TruncAllocationIterator,
};
pub use filter::{
    ChunkedDecodingStreamFilter, FilterError, GzipDecodingStreamFilter, NullSinkStreamFilter,
    SinkStreamFilter, StreamFilter,
};
pub use segment::{PieceSegment, Segment};
