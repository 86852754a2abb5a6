//! Error types for QPACK decoding.
//!
//! The variants carry the diagnostic reported through delegate callbacks.
//! Error types map to the HTTP/3 error codes specified in RFC 9204
//! Section 6.

use thiserror::Error;

/// Result type for QPACK operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during QPACK operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A prefix integer does not fit in 64 bits or uses more than ten
    /// continuation bytes.
    #[error("Encoded integer too large.")]
    IntegerTooLarge,

    /// A string literal announces a length above the configured limit.
    #[error("String literal too long.")]
    StringLiteralTooLong { length: u64, limit: usize },

    /// A Huffman-encoded string contains EOS or has invalid padding.
    #[error("Error in Huffman-encoded string.")]
    HuffmanEncodingError,

    /// Decoding of a field section failed.
    ///
    /// Maps to HTTP/3 error code `QPACK_DECOMPRESSION_FAILED` (0x0200).
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    /// Error on the encoder stream.
    ///
    /// Maps to HTTP/3 error code `QPACK_ENCODER_STREAM_ERROR` (0x0201).
    #[error("encoder stream error: {0}")]
    EncoderStreamError(String),

    /// Error on the decoder stream.
    ///
    /// Maps to HTTP/3 error code `QPACK_DECODER_STREAM_ERROR` (0x0202).
    #[error("decoder stream error: {0}")]
    DecoderStreamError(String),

    /// A delegate refused a decoded instruction.
    #[error("{0}")]
    Rejected(String),

    /// An instruction language does not match every leading byte exactly
    /// once, or no instruction matches a byte.
    #[error("invalid instruction language: {0}")]
    InvalidGrammar(String),
}

impl Error {
    /// Returns the HTTP/3 error code for this error.
    pub fn error_code(&self) -> u64 {
        match self {
            Error::DecompressionFailed(_) => 0x0200,
            Error::EncoderStreamError(_) => 0x0201,
            Error::DecoderStreamError(_) => 0x0202,
            _ => 0x0200, // Default to decompression failed
        }
    }
}
