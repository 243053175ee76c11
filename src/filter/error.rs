use thiserror::Error;

use crate::disk::DiskError;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid chunk size digit: 0x{0:02x}")]
    InvalidChunkSizeDigit(u8),

    #[error("chunk size overflows")]
    ChunkSizeOverflow,

    #[error("expected CR, got 0x{0:02x}")]
    ExpectedCr(u8),

    #[error("expected LF, got 0x{0:02x}")]
    ExpectedLf(u8),

    #[error("gzip decode error: {0}")]
    Gzip(#[from] flate2::DecompressError),

    #[error("filter used before init")]
    NotInitialized,

    #[error(transparent)]
    Disk(#[from] DiskError),
}
