//! Write-progress tracking for one contiguous range of a download.
//!
//! A segment describes the piece of the logical download currently being
//! filled: how many bytes it expects, how many have been committed, and
//! where the next write lands. Sink filters consult it to clamp writes and
//! to advance progress; file boundaries are invisible at this level.

use sha1::{Digest, Sha1};

/// One contiguous range of the logical download currently being written.
///
/// A `length()` of zero means the segment is unbounded (e.g. a response
/// with unknown content length).
pub trait Segment: Send {
    /// Expected number of bytes for this segment, 0 for unbounded.
    fn length(&self) -> u64;

    /// Bytes committed so far.
    fn written_length(&self) -> u64;

    /// Records that `n` more bytes were committed.
    fn update_written_length(&mut self, n: u64);

    /// Absolute offset the next write should land at.
    fn position_to_write(&self) -> u64;

    /// Feeds written bytes into the running content hash, if any.
    fn update_hash(&mut self, data: &[u8]);
}

/// Standard [`Segment`] implementation backed by an absolute position and
/// an optional running SHA-1 over the bytes written through it.
pub struct PieceSegment {
    position: u64,
    length: u64,
    written_length: u64,
    hasher: Option<Sha1>,
}

impl PieceSegment {
    /// Creates a segment starting at absolute offset `position` expecting
    /// `length` bytes (0 for unbounded).
    pub fn new(position: u64, length: u64) -> Self {
        Self {
            position,
            length,
            written_length: 0,
            hasher: None,
        }
    }

    /// Enables the running content hash.
    pub fn with_hash(mut self) -> Self {
        self.hasher = Some(Sha1::new());
        self
    }

    /// Finalizes and returns the content hash, if hashing was enabled.
    pub fn finish_hash(&mut self) -> Option<[u8; 20]> {
        self.hasher.take().map(|h| h.finalize().into())
    }
}

impl Segment for PieceSegment {
    fn length(&self) -> u64 {
        self.length
    }

    fn written_length(&self) -> u64 {
        self.written_length
    }

    fn update_written_length(&mut self, n: u64) {
        self.written_length += n;
    }

    fn position_to_write(&self) -> u64 {
        self.position + self.written_length
    }

    fn update_hash(&mut self, data: &[u8]) {
        if let Some(hasher) = &mut self.hasher {
            hasher.update(data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advances_with_written_length() {
        let mut segment = PieceSegment::new(1000, 64);
        assert_eq!(segment.position_to_write(), 1000);

        segment.update_written_length(10);
        assert_eq!(segment.written_length(), 10);
        assert_eq!(segment.position_to_write(), 1010);
    }

    #[test]
    fn test_hash_over_written_bytes() {
        let mut segment = PieceSegment::new(0, 0).with_hash();
        segment.update_hash(b"hello ");
        segment.update_hash(b"world");

        let expected: [u8; 20] = Sha1::digest(b"hello world").into();
        assert_eq!(segment.finish_hash(), Some(expected));
        // Hash state is consumed.
        assert_eq!(segment.finish_hash(), None);
    }

    #[test]
    fn test_unbounded_segment() {
        let segment = PieceSegment::new(0, 0);
        assert_eq!(segment.length(), 0);
    }
}
