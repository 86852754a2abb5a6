//! Bounds-checked byte cursors for QUIC and HTTP/3 wire formats.
//!
//! This crate provides the two serialization primitives the rest of the
//! workspace is built on:
//!
//! - [`ByteReader`]: a zero-copy cursor over a borrowed, immutable buffer.
//! - [`ByteWriter`]: a cursor into a caller-owned, fixed-capacity buffer.
//!
//! Both fail closed. A read or write that does not fit returns an error and
//! leaves the cursor untouched, so a streaming decoder can retry once more
//! input is available.
//!
//! Fixed-width integers default to network byte order; QUIC
//! variable-length integers (RFC 9000 Section 16) are always big-endian.

#![forbid(unsafe_code)]

pub mod error;
pub mod reader;
pub mod varint;
pub mod writer;

pub use error::{Error, Result};
pub use reader::ByteReader;
pub use writer::ByteWriter;

/// Byte order for fixed-width integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Big-endian, as used on the wire.
    #[default]
    Network,
    /// The byte order of the running machine, for non-wire uses.
    Host,
}

impl Endianness {
    #[inline]
    pub(crate) fn is_big(self) -> bool {
        match self {
            Endianness::Network => true,
            Endianness::Host => cfg!(target_endian = "big"),
        }
    }
}
