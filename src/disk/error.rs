use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("offset {offset} out of range (total length {total_length})")]
    OffsetOutOfRange { offset: u64, total_length: u64 },

    #[error("no disk writer for {0}")]
    NoDiskWriter(String),

    #[error("writer for {0} is not opened")]
    WriterNotOpened(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("path traversal detected in file path: {0}")]
    PathTraversal(String),

    #[error("file layout not contiguous at {path}: offset {actual}, expected {expected}")]
    InvalidFileLayout {
        path: String,
        actual: u64,
        expected: u64,
    },
}
