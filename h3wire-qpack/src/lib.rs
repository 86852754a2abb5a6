//! Incremental QPACK decoding for HTTP/3 (RFC 9204).
//!
//! This crate provides the parsing half of QPACK as a set of byte-driven
//! state machines that accept input in fragments of any size:
//!
//! - [`huffman`]: the static Huffman code of RFC 7541 Appendix B, with an
//!   incremental [`HuffmanDecoder`].
//! - [`integer`]: prefix integers, with an incremental [`VarintDecoder`].
//! - [`instructions`]: the instruction grammar and the encoder stream,
//!   decoder stream and field section languages.
//! - [`InstructionDecoder`] / [`InstructionEncoder`]: grammar-driven
//!   decoding and encoding of any language.
//! - [`EncoderStreamReceiver`] / [`DecoderStreamReceiver`]: typed
//!   callbacks for the two QPACK unidirectional streams.
//! - [`FieldSectionDecoder`] / [`FieldSectionEncoder`]: field sections
//!   resolved against the static table.
//!
//! # Example
//!
//! ```rust
//! use h3wire_qpack::{decode_field_section, FieldLine, FieldSectionEncoder};
//!
//! let headers = [
//!     (b":method".as_slice(), b"GET".as_slice()),
//!     (b":path".as_slice(), b"/".as_slice()),
//! ];
//! let mut encoded = Vec::new();
//! FieldSectionEncoder::default().encode(headers, &mut encoded);
//!
//! let decoded = decode_field_section(&encoded).unwrap();
//! assert_eq!(decoded, vec![FieldLine::new(":method", "GET"), FieldLine::new(":path", "/")]);
//! ```

pub mod config;
pub mod error;
pub mod field_line;
pub mod field_section;
pub mod huffman;
pub mod instruction_decoder;
pub mod instruction_encoder;
pub mod instructions;
pub mod integer;
pub mod receiver;
pub mod static_table;

// Re-export main types
pub use config::QpackConfig;
pub use error::{Error, Result};
pub use field_line::FieldLine;
pub use field_section::{
    decode_field_section, FieldSectionDecoder, FieldSectionEncoder, FieldSectionHandler,
};
pub use huffman::{HuffmanBitBuffer, HuffmanDecoder};
pub use instruction_decoder::{DecodedInstruction, InstructionDecoder, InstructionDelegate};
pub use instruction_encoder::{InstructionEncoder, InstructionValues};
pub use instructions::{Field, FieldType, Instruction, Language, Opcode};
pub use integer::{DecodeStatus, VarintDecoder};
pub use receiver::{
    DecoderStreamDelegate, DecoderStreamReceiver, EncoderStreamDelegate, EncoderStreamReceiver,
};
