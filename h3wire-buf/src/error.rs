//! Error types for cursor reads and writes.
//!
//! Both failure classes are recoverable: a reader that runs out of data can
//! be rebuilt once more bytes arrive, and a writer that runs out of room can
//! be retried against a larger buffer. Neither moves the cursor.

use thiserror::Error;

/// Result type for reader and writer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by [`ByteReader`](crate::ByteReader) and
/// [`ByteWriter`](crate::ByteWriter).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A read asked for more bytes than remain in the buffer.
    #[error("insufficient data: requested {requested} bytes, {remaining} remaining")]
    InsufficientData { requested: usize, remaining: usize },

    /// A write needs more room than the buffer has left.
    #[error("insufficient capacity: requested {requested} bytes, {remaining} remaining")]
    InsufficientCapacity { requested: usize, remaining: usize },

    /// A 16-bit length-prefixed string longer than 65535 bytes.
    #[error("string of {0} bytes does not fit a 16-bit length prefix")]
    StringTooLong(usize),

    /// A value above 2^62 - 1 cannot be a QUIC variable-length integer.
    #[error("value {0} exceeds the variable-length integer range")]
    VarIntOutOfRange(u64),

    /// An integer width outside 1..=8 bytes (or an unsupported varint length).
    #[error("invalid integer width: {0} bytes")]
    InvalidWidth(usize),

    /// A value that needs more bytes than the requested width.
    #[error("value {value} does not fit in {width} bytes")]
    ValueTooWide { value: u64, width: usize },
}

impl Error {
    /// Returns true if supplying more input (or a larger buffer) could
    /// make the same operation succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::InsufficientData { .. } | Error::InsufficientCapacity { .. }
        )
    }
}
