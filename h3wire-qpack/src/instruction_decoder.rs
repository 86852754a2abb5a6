//! Incremental, grammar-driven QPACK instruction decoder.
//!
//! [`InstructionDecoder`] accepts input in fragments of any size, down to a
//! single byte, and reports each complete instruction to its
//! [`InstructionDelegate`]. The decoder never buffers more than the string
//! literal currently being read.
//!
//! # Example
//!
//! ```
//! use h3wire_qpack::instructions::{DECODER_STREAM_LANGUAGE, SECTION_ACKNOWLEDGMENT};
//! use h3wire_qpack::{DecodedInstruction, Error, InstructionDecoder, InstructionDelegate};
//!
//! #[derive(Default)]
//! struct Acks(Vec<u64>);
//!
//! impl InstructionDelegate for Acks {
//!     fn on_instruction_decoded(&mut self, decoded: &DecodedInstruction<'_>) -> h3wire_qpack::Result<()> {
//!         if *decoded.instruction == SECTION_ACKNOWLEDGMENT {
//!             self.0.push(decoded.varint);
//!         }
//!         Ok(())
//!     }
//!
//!     fn on_instruction_decoding_error(&mut self, _error: &Error) {}
//! }
//!
//! let mut decoder = InstructionDecoder::new(DECODER_STREAM_LANGUAGE, Acks::default());
//! assert!(decoder.decode(&[0x84, 0xff]));
//! assert!(decoder.decode(&[0x05]));
//! assert_eq!(decoder.delegate().0, vec![4, 132]);
//! ```

use tracing::{debug, trace};

use crate::config::QpackConfig;
use crate::error::{Error, Result};
use crate::huffman::HuffmanDecoder;
use crate::instructions::{Field, FieldType, Instruction, Language};
use crate::integer::{DecodeStatus, VarintDecoder};

/// Fields of a fully decoded instruction.
///
/// Fields the instruction does not carry are `false`, zero or empty.
#[derive(Debug, Clone, Copy)]
pub struct DecodedInstruction<'a> {
    pub instruction: &'static Instruction,
    pub s_bit: bool,
    pub varint: u64,
    pub varint2: u64,
    pub name: &'a [u8],
    pub value: &'a [u8],
}

/// Receives decoded instructions and errors from an [`InstructionDecoder`].
pub trait InstructionDelegate {
    /// Called once per complete instruction. Returning an error rejects the
    /// instruction: the decoder stops and reports the error through
    /// [`on_instruction_decoding_error`](Self::on_instruction_decoding_error).
    fn on_instruction_decoded(&mut self, decoded: &DecodedInstruction<'_>) -> Result<()>;

    /// Called at most once, when decoding fails.
    fn on_instruction_decoding_error(&mut self, error: &Error);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Identify the instruction from its first byte.
    StartInstruction,
    /// Start the next field, or finish the instruction after the last one.
    StartField,
    /// Read a flag bit: the S bit or the Huffman flag of a string.
    ReadBit,
    /// Start a prefix integer on the current byte.
    VarintStart,
    /// Continue a prefix integer across fragments.
    VarintResume,
    /// Store the finished integer.
    VarintDone,
    /// Accumulate string literal bytes.
    ReadString,
    /// Huffman-decode the literal if flagged.
    ReadStringDone,
}

/// Decodes a stream of instructions of one [`Language`].
pub struct InstructionDecoder<D> {
    language: Language,
    delegate: D,
    max_string_literal_length: usize,

    state: State,
    instruction: Option<&'static Instruction>,
    field_index: usize,

    s_bit: bool,
    varint: u64,
    varint2: u64,
    name: Vec<u8>,
    value: Vec<u8>,

    is_huffman_encoded: bool,
    string_length: usize,
    varint_decoder: VarintDecoder,
    huffman_decoder: HuffmanDecoder,

    error_detected: bool,
}

impl<D: InstructionDelegate> InstructionDecoder<D> {
    /// Creates a decoder with the default string literal limit.
    pub fn new(language: Language, delegate: D) -> Self {
        Self::with_config(language, delegate, &QpackConfig::default())
    }

    pub fn with_config(language: Language, delegate: D, config: &QpackConfig) -> Self {
        Self {
            language,
            delegate,
            max_string_literal_length: config.max_string_literal_length,
            state: State::StartInstruction,
            instruction: None,
            field_index: 0,
            s_bit: false,
            varint: 0,
            varint2: 0,
            name: Vec::new(),
            value: Vec::new(),
            is_huffman_encoded: false,
            string_length: 0,
            varint_decoder: VarintDecoder::new(),
            huffman_decoder: HuffmanDecoder::new(),
            error_detected: false,
        }
    }

    /// Decodes one fragment of input.
    ///
    /// Returns `true` if the fragment was consumed without error, whether
    /// or not it ended on an instruction boundary. Returns `false` once an
    /// error has been reported; the decoder ignores all later input.
    pub fn decode(&mut self, mut data: &[u8]) -> bool {
        if self.error_detected {
            return false;
        }

        while !data.is_empty() || self.can_advance_without_input() {
            let step = match self.state {
                State::StartInstruction => self.do_start_instruction(data),
                State::StartField => self.do_start_field(),
                State::ReadBit => self.do_read_bit(data),
                State::VarintStart => self.do_varint_start(data),
                State::VarintResume => self.do_varint_resume(data),
                State::VarintDone => self.do_varint_done(),
                State::ReadString => self.do_read_string(data),
                State::ReadStringDone => self.do_read_string_done(),
            };

            match step {
                Ok(consumed) => data = &data[consumed..],
                Err(error) => {
                    self.on_error(error);
                    return false;
                }
            }
        }

        true
    }

    /// True if the decoder is between instructions, so the input seen so
    /// far ends cleanly.
    pub fn at_instruction_boundary(&self) -> bool {
        self.state == State::StartInstruction
    }

    pub fn error_detected(&self) -> bool {
        self.error_detected
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// S bit of the last decoded instruction.
    pub fn s_bit(&self) -> bool {
        self.s_bit
    }

    /// First integer of the last decoded instruction.
    pub fn varint(&self) -> u64 {
        self.varint
    }

    /// Second integer of the last decoded instruction.
    pub fn varint2(&self) -> u64 {
        self.varint2
    }

    /// Name literal of the last decoded instruction, Huffman-decoded.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Value literal of the last decoded instruction, Huffman-decoded.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    pub fn into_delegate(self) -> D {
        self.delegate
    }

    fn can_advance_without_input(&self) -> bool {
        matches!(
            self.state,
            State::StartField | State::VarintDone | State::ReadStringDone
        )
    }

    fn current_field(&self) -> Option<Field> {
        self.instruction
            .and_then(|instruction| instruction.fields.get(self.field_index).copied())
    }

    fn next_field(&mut self) {
        self.field_index += 1;
        self.state = State::StartField;
    }

    fn do_start_instruction(&mut self, data: &[u8]) -> Result<usize> {
        let byte = data[0];
        let instruction = self.language.lookup(byte).ok_or_else(|| {
            Error::InvalidGrammar(format!(
                "{}: no instruction matches byte {byte:#04x}",
                self.language.name()
            ))
        })?;

        self.instruction = Some(instruction);
        self.field_index = 0;
        self.s_bit = false;
        self.varint = 0;
        self.varint2 = 0;
        self.name.clear();
        self.value.clear();
        self.state = State::StartField;
        Ok(0)
    }

    fn do_start_field(&mut self) -> Result<usize> {
        let Some(instruction) = self.instruction else {
            self.state = State::StartInstruction;
            return Ok(0);
        };

        let Some(field) = instruction.fields.get(self.field_index) else {
            trace!(
                language = self.language.name(),
                instruction = instruction.name,
                "instruction decoded"
            );
            self.state = State::StartInstruction;
            let decoded = DecodedInstruction {
                instruction,
                s_bit: self.s_bit,
                varint: self.varint,
                varint2: self.varint2,
                name: &self.name,
                value: &self.value,
            };
            self.delegate.on_instruction_decoded(&decoded)?;
            return Ok(0);
        };

        self.state = match field.ty {
            FieldType::SBit | FieldType::Name | FieldType::Value => State::ReadBit,
            FieldType::Varint | FieldType::Varint2 => State::VarintStart,
        };
        Ok(0)
    }

    fn do_read_bit(&mut self, data: &[u8]) -> Result<usize> {
        let Some(field) = self.current_field() else {
            self.state = State::StartField;
            return Ok(0);
        };

        match field.ty {
            FieldType::SBit => {
                self.s_bit = data[0] & field.param == field.param;
                self.next_field();
            }
            FieldType::Name | FieldType::Value => {
                let bit = field.huffman_bit();
                self.is_huffman_encoded = data[0] & bit == bit;
                self.state = State::VarintStart;
            }
            FieldType::Varint | FieldType::Varint2 => self.state = State::VarintStart,
        }
        Ok(0)
    }

    fn do_varint_start(&mut self, data: &[u8]) -> Result<usize> {
        let prefix_bits = self.current_field().map_or(8, |field| field.param);
        let (status, consumed) = self.varint_decoder.start(data[0], prefix_bits, &data[1..]);
        self.on_varint_status(status)?;
        Ok(consumed + 1)
    }

    fn do_varint_resume(&mut self, data: &[u8]) -> Result<usize> {
        let (status, consumed) = self.varint_decoder.resume(data);
        self.on_varint_status(status)?;
        Ok(consumed)
    }

    fn on_varint_status(&mut self, status: DecodeStatus) -> Result<()> {
        self.state = match status {
            DecodeStatus::Done => State::VarintDone,
            DecodeStatus::InProgress => State::VarintResume,
            DecodeStatus::Error => return Err(Error::IntegerTooLarge),
        };
        Ok(())
    }

    fn do_varint_done(&mut self) -> Result<usize> {
        let Some(field) = self.current_field() else {
            self.state = State::StartField;
            return Ok(0);
        };
        let value = self.varint_decoder.value();

        match field.ty {
            FieldType::Varint => self.varint = value,
            FieldType::Varint2 => self.varint2 = value,
            FieldType::Name | FieldType::Value => {
                let length = usize::try_from(value)
                    .ok()
                    .filter(|&length| length <= self.max_string_literal_length)
                    .ok_or(Error::StringLiteralTooLong {
                        length: value,
                        limit: self.max_string_literal_length,
                    })?;

                self.string_length = length;
                self.string_mut(field.ty).clear();
                if length > 0 {
                    self.state = State::ReadString;
                    return Ok(0);
                }
            }
            FieldType::SBit => {}
        }

        self.next_field();
        Ok(0)
    }

    fn do_read_string(&mut self, data: &[u8]) -> Result<usize> {
        let Some(field) = self.current_field() else {
            self.state = State::StartField;
            return Ok(0);
        };
        let length = self.string_length;
        let string = self.string_mut(field.ty);

        let take = (length - string.len()).min(data.len());
        string.extend_from_slice(&data[..take]);
        if string.len() == length {
            self.state = State::ReadStringDone;
        }
        Ok(take)
    }

    fn do_read_string_done(&mut self) -> Result<usize> {
        let Some(field) = self.current_field() else {
            self.state = State::StartField;
            return Ok(0);
        };

        if self.is_huffman_encoded {
            let string = match field.ty {
                FieldType::Name => &mut self.name,
                _ => &mut self.value,
            };
            let decoder = &mut self.huffman_decoder;
            decoder.reset();

            let mut decoded = Vec::with_capacity(string.len() * 8 / 5);
            decoder
                .decode(string, &mut decoded)
                .map_err(|_| Error::HuffmanEncodingError)?;
            if !decoder.input_properly_terminated() {
                return Err(Error::HuffmanEncodingError);
            }
            *string = decoded;
        }

        self.next_field();
        Ok(0)
    }

    fn string_mut(&mut self, ty: FieldType) -> &mut Vec<u8> {
        match ty {
            FieldType::Name => &mut self.name,
            _ => &mut self.value,
        }
    }

    fn on_error(&mut self, error: Error) {
        debug_assert!(!self.error_detected);
        debug!(
            language = self.language.name(),
            instruction = self.instruction.map(|i| i.name),
            %error,
            "QPACK instruction decoding failed"
        );
        self.error_detected = true;
        self.delegate.on_instruction_decoding_error(&error);
    }
}

impl<D> std::fmt::Debug for InstructionDecoder<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionDecoder")
            .field("language", &self.language.name())
            .field("state", &self.state)
            .field("instruction", &self.instruction.map(|i| i.name))
            .field("field_index", &self.field_index)
            .field("error_detected", &self.error_detected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Decoded {
        name: &'static str,
        s_bit: bool,
        varint: u64,
        varint2: u64,
        literal_name: Vec<u8>,
        literal_value: Vec<u8>,
    }

    #[derive(Default)]
    struct Recorder {
        decoded: Vec<Decoded>,
        errors: Vec<Error>,
        reject: bool,
    }

    impl InstructionDelegate for Recorder {
        fn on_instruction_decoded(&mut self, d: &DecodedInstruction<'_>) -> Result<()> {
            if self.reject {
                return Err(Error::Rejected("no thanks".into()));
            }
            self.decoded.push(Decoded {
                name: d.instruction.name,
                s_bit: d.s_bit,
                varint: d.varint,
                varint2: d.varint2,
                literal_name: d.name.to_vec(),
                literal_value: d.value.to_vec(),
            });
            Ok(())
        }

        fn on_instruction_decoding_error(&mut self, error: &Error) {
            self.errors.push(error.clone());
        }
    }

    fn decoder(language: Language) -> InstructionDecoder<Recorder> {
        InstructionDecoder::new(language, Recorder::default())
    }

    fn hex(s: &str) -> Vec<u8> {
        let s: String = s.split_whitespace().collect();
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_set_capacity() {
        let mut d = decoder(ENCODER_STREAM_LANGUAGE);
        assert!(d.decode(&hex("3fbd01")));
        assert!(d.at_instruction_boundary());
        let got = &d.delegate().decoded;
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, SET_DYNAMIC_TABLE_CAPACITY.name);
        assert_eq!(got[0].varint, 220);
        assert_eq!(d.varint(), 220);
    }

    #[test]
    fn test_insert_with_name_reference_huffman_value() {
        // Static :authority with a Huffman-coded value.
        let mut d = decoder(ENCODER_STREAM_LANGUAGE);
        assert!(d.decode(&hex("c0 8c f1e3c2e5f23a6ba0ab90f4ff")));
        let got = &d.delegate().decoded[0];
        assert!(got.s_bit);
        assert_eq!(got.varint, 0);
        assert_eq!(got.literal_value, b"www.example.com");
        assert_eq!(d.value(), b"www.example.com");
    }

    #[test]
    fn test_insert_with_literal_name() {
        // RFC 9204 B.3
        let mut d = decoder(ENCODER_STREAM_LANGUAGE);
        assert!(d.decode(&hex("4a 637573746f6d2d6b6579 0c 637573746f6d2d76616c7565")));
        let got = &d.delegate().decoded[0];
        assert_eq!(got.name, INSERT_WITH_LITERAL_NAME.name);
        assert_eq!(got.literal_name, b"custom-key");
        assert_eq!(got.literal_value, b"custom-value");
    }

    #[test]
    fn test_field_section_prefix() {
        let mut d = decoder(FIELD_SECTION_PREFIX_LANGUAGE);
        assert!(d.decode(&[0x05, 0x82]));
        let got = &d.delegate().decoded[0];
        assert_eq!(got.varint, 5);
        assert!(got.s_bit);
        assert_eq!(got.varint2, 2);
    }

    #[test]
    fn test_byte_at_a_time() {
        let input = hex("c0 8c f1e3c2e5f23a6ba0ab90f4ff 4a 637573746f6d2d6b6579 0c 637573746f6d2d76616c7565 02 3fbd01");
        let mut whole = decoder(ENCODER_STREAM_LANGUAGE);
        assert!(whole.decode(&input));

        let mut split = decoder(ENCODER_STREAM_LANGUAGE);
        for byte in &input {
            assert!(split.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(split.delegate().decoded, whole.delegate().decoded);
        assert_eq!(split.delegate().decoded.len(), 4);
    }

    #[test]
    fn test_suspends_mid_instruction() {
        let mut d = decoder(ENCODER_STREAM_LANGUAGE);
        assert!(d.decode(&[0x4a, b'c', b'u']));
        assert!(!d.at_instruction_boundary());
        assert!(d.delegate().decoded.is_empty());
        assert!(d.decode(&[]));
    }

    #[test]
    fn test_empty_literals() {
        let mut d = decoder(ENCODER_STREAM_LANGUAGE);
        assert!(d.decode(&[0x40, 0x00]));
        let got = &d.delegate().decoded[0];
        assert!(got.literal_name.is_empty());
        assert!(got.literal_value.is_empty());
    }

    #[test]
    fn test_integer_too_large() {
        let mut d = decoder(DECODER_STREAM_LANGUAGE);
        let mut input = vec![0xff];
        input.extend_from_slice(&[0x80; 10]);
        assert!(!d.decode(&input));
        assert_eq!(d.delegate().errors, vec![Error::IntegerTooLarge]);
        assert_eq!(d.delegate().errors[0].to_string(), "Encoded integer too large.");
    }

    #[test]
    fn test_string_literal_too_long() {
        let config = QpackConfig {
            max_string_literal_length: 4,
            ..Default::default()
        };
        let mut d = InstructionDecoder::with_config(
            ENCODER_STREAM_LANGUAGE,
            Recorder::default(),
            &config,
        );
        assert!(!d.decode(&[0x45]));
        assert_eq!(
            d.delegate().errors,
            vec![Error::StringLiteralTooLong { length: 5, limit: 4 }]
        );
    }

    #[test]
    fn test_default_literal_limit() {
        let mut d = decoder(ENCODER_STREAM_LANGUAGE);
        // Value length 2^20 + 1 with a 7-bit prefix.
        let mut input = vec![0xc0];
        crate::integer::encode((1 << 20) + 1, 7, 0, &mut input);
        assert!(!d.decode(&input));
        assert_eq!(d.delegate().errors[0].to_string(), "String literal too long.");
    }

    #[test]
    fn test_bad_huffman() {
        let mut d = decoder(ENCODER_STREAM_LANGUAGE);
        // Huffman flag set, value is 4 bytes of EOS.
        assert!(!d.decode(&[0xc0, 0x84, 0xff, 0xff, 0xff, 0xff]));
        assert_eq!(d.delegate().errors, vec![Error::HuffmanEncodingError]);
    }

    #[test]
    fn test_error_is_sticky() {
        let mut d = decoder(DECODER_STREAM_LANGUAGE);
        let mut input = vec![0xff];
        input.extend_from_slice(&[0x80; 10]);
        assert!(!d.decode(&input));
        assert!(d.error_detected());
        assert!(!d.decode(&[0x81]));
        assert!(!d.decode(&[]));
        assert_eq!(d.delegate().errors.len(), 1);
        assert!(d.delegate().decoded.is_empty());
    }

    #[test]
    fn test_delegate_rejection_is_fatal() {
        let mut d = InstructionDecoder::new(
            DECODER_STREAM_LANGUAGE,
            Recorder {
                reject: true,
                ..Default::default()
            },
        );
        assert!(!d.decode(&[0x81, 0x82]));
        assert_eq!(d.delegate().errors, vec![Error::Rejected("no thanks".into())]);
        assert!(!d.decode(&[0x83]));
        assert_eq!(d.delegate().errors.len(), 1);
    }

    #[test]
    fn test_stops_at_rejected_instruction() {
        struct OneOnly(usize);
        impl InstructionDelegate for OneOnly {
            fn on_instruction_decoded(&mut self, _: &DecodedInstruction<'_>) -> Result<()> {
                self.0 += 1;
                if self.0 > 1 {
                    return Err(Error::Rejected("second".into()));
                }
                Ok(())
            }
            fn on_instruction_decoding_error(&mut self, _: &Error) {}
        }

        let mut d = InstructionDecoder::new(DECODER_STREAM_LANGUAGE, OneOnly(0));
        assert!(!d.decode(&[0x81, 0x82, 0x83]));
        assert_eq!(d.delegate().0, 2);
    }
}
