//! Grammar-driven QPACK instruction encoder.
//!
//! The inverse of [`InstructionDecoder`](crate::InstructionDecoder): fields
//! are written in the order the [`Instruction`] lists them, sharing bytes
//! with the opcode and with flag bits exactly as the decoder reads them.

use bytes::BufMut;

use crate::config::QpackConfig;
use crate::huffman;
use crate::instructions::{FieldType, Instruction};
use crate::integer;

/// Field values for one instruction. Fields the instruction does not
/// carry are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstructionValues<'a> {
    pub s_bit: bool,
    pub varint: u64,
    pub varint2: u64,
    pub name: &'a [u8],
    pub value: &'a [u8],
}

/// Serializes instructions according to their grammar.
#[derive(Debug, Clone, Copy)]
pub struct InstructionEncoder {
    huffman_encoding: bool,
}

impl Default for InstructionEncoder {
    fn default() -> Self {
        Self::with_config(&QpackConfig::default())
    }
}

impl InstructionEncoder {
    pub fn new(huffman_encoding: bool) -> Self {
        Self { huffman_encoding }
    }

    pub fn with_config(config: &QpackConfig) -> Self {
        Self::new(config.huffman_encoding)
    }

    /// Appends `instruction` with `values` to `out`. Returns the number of
    /// bytes written.
    pub fn encode<B: BufMut>(
        &self,
        instruction: &Instruction,
        values: &InstructionValues<'_>,
        out: &mut B,
    ) -> usize {
        let mut written = 0;
        // Bits accumulated for the byte the next integer starts on.
        let mut byte = instruction.opcode.value;
        let mut pending = true;

        for field in instruction.fields {
            match field.ty {
                FieldType::SBit => {
                    if values.s_bit {
                        byte |= field.param;
                    }
                    pending = true;
                }
                FieldType::Varint | FieldType::Varint2 => {
                    let value = if field.ty == FieldType::Varint {
                        values.varint
                    } else {
                        values.varint2
                    };
                    written += integer::encode(value, field.param, byte, out);
                    byte = 0;
                    pending = false;
                }
                FieldType::Name | FieldType::Value => {
                    let string = if field.ty == FieldType::Name {
                        values.name
                    } else {
                        values.value
                    };
                    written += self.encode_string(string, field.param, byte, out);
                    byte = 0;
                    pending = false;
                }
            }
        }

        if pending {
            out.put_u8(byte);
            written += 1;
        }
        written
    }

    fn encode_string<B: BufMut>(&self, string: &[u8], prefix_bits: u8, byte: u8, out: &mut B) -> usize {
        let huffman_len = huffman::encoded_size(string);
        if self.huffman_encoding && huffman_len < string.len() {
            let mut encoded = Vec::with_capacity(huffman_len);
            huffman::encode(string, &mut encoded);
            let flag = 1u8 << prefix_bits;
            let n = integer::encode(encoded.len() as u64, prefix_bits, byte | flag, out);
            out.put_slice(&encoded);
            n + encoded.len()
        } else {
            let n = integer::encode(string.len() as u64, prefix_bits, byte, out);
            out.put_slice(string);
            n + string.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::*;

    fn encode(encoder: InstructionEncoder, instruction: &Instruction, values: InstructionValues<'_>) -> Vec<u8> {
        let mut out = Vec::new();
        let n = encoder.encode(instruction, &values, &mut out);
        assert_eq!(n, out.len());
        out
    }

    #[test]
    fn test_set_capacity() {
        let out = encode(
            InstructionEncoder::default(),
            &SET_DYNAMIC_TABLE_CAPACITY,
            InstructionValues {
                varint: 220,
                ..Default::default()
            },
        );
        assert_eq!(out, [0x3f, 0xbd, 0x01]);
    }

    #[test]
    fn test_insert_with_literal_name_raw() {
        let out = encode(
            InstructionEncoder::new(false),
            &INSERT_WITH_LITERAL_NAME,
            InstructionValues {
                name: b"custom-key",
                value: b"custom-value",
                ..Default::default()
            },
        );
        assert_eq!(out[0], 0x4a);
        assert_eq!(&out[1..11], b"custom-key");
        assert_eq!(out[11], 0x0c);
        assert_eq!(&out[12..], b"custom-value");
    }

    #[test]
    fn test_huffman_when_shorter() {
        let out = encode(
            InstructionEncoder::default(),
            &INSERT_WITH_NAME_REFERENCE,
            InstructionValues {
                s_bit: true,
                varint: 0,
                value: b"www.example.com",
                ..Default::default()
            },
        );
        assert_eq!(out[..2], [0xc0, 0x8c]);
        assert_eq!(out.len(), 2 + 12);
    }

    #[test]
    fn test_raw_when_huffman_is_longer() {
        // Bytes with long codes grow under Huffman coding.
        let value = [0u8; 4];
        let out = encode(
            InstructionEncoder::default(),
            &LITERAL_WITH_LITERAL_NAME,
            InstructionValues {
                name: b"x",
                value: &value,
                ..Default::default()
            },
        );
        assert_eq!(out[2], 0x04);
        assert_eq!(&out[3..], &value);
    }

    #[test]
    fn test_field_section_prefix() {
        let out = encode(
            InstructionEncoder::default(),
            &FIELD_SECTION_PREFIX,
            InstructionValues {
                varint: 3,
                s_bit: true,
                varint2: 1,
                ..Default::default()
            },
        );
        assert_eq!(out, [0x03, 0x81]);
    }
}
