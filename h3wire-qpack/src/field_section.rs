//! Encoded field sections (RFC 9204 Section 4.5) against the static table.
//!
//! [`FieldSectionDecoder`] decodes the payload of a HEADERS frame for a
//! decoder that advertised a dynamic table capacity of zero: every
//! reference must resolve in the static table, and the Required Insert
//! Count must be zero. [`FieldSectionEncoder`] produces such sections.

use bytes::BufMut;
use tracing::{debug, trace};

use crate::config::QpackConfig;
use crate::error::{Error, Result};
use crate::field_line::FieldLine;
use crate::instruction_decoder::{DecodedInstruction, InstructionDecoder, InstructionDelegate};
use crate::instruction_encoder::{InstructionEncoder, InstructionValues};
use crate::instructions::{
    FIELD_LINE_LANGUAGE, FIELD_SECTION_PREFIX, FIELD_SECTION_PREFIX_LANGUAGE, INDEXED_FIELD_LINE,
    INDEXED_FIELD_LINE_POST_BASE, LITERAL_WITH_LITERAL_NAME, LITERAL_WITH_NAME_REFERENCE,
    LITERAL_WITH_POST_BASE_NAME_REFERENCE,
};
use crate::static_table::{self, StaticMatch};

/// Receives the field lines of one field section.
pub trait FieldSectionHandler {
    fn on_header_decoded(&mut self, name: &[u8], value: &[u8]);

    /// Called after [`FieldSectionDecoder::end_field_section`] when the
    /// section was complete and valid.
    fn on_decoding_completed(&mut self);

    /// Called at most once; the error is an [`Error::DecompressionFailed`].
    fn on_decoding_error(&mut self, error: &Error);
}

/// Collects the prefix of a field section.
#[derive(Default)]
struct PrefixSink {
    decoded: Option<(u64, bool, u64)>,
    error: Option<Error>,
}

impl InstructionDelegate for PrefixSink {
    fn on_instruction_decoded(&mut self, decoded: &DecodedInstruction<'_>) -> Result<()> {
        self.decoded = Some((decoded.varint, decoded.s_bit, decoded.varint2));
        Ok(())
    }

    fn on_instruction_decoding_error(&mut self, error: &Error) {
        self.error = Some(error.clone());
    }
}

fn no_dynamic_table() -> Error {
    Error::DecompressionFailed("Dynamic table reference without a dynamic table.".into())
}

/// Resolves field lines against the static table.
struct FieldLineSink<H> {
    handler: H,
    error: Option<Error>,
}

impl<H: FieldSectionHandler> InstructionDelegate for FieldLineSink<H> {
    fn on_instruction_decoded(&mut self, decoded: &DecodedInstruction<'_>) -> Result<()> {
        let instruction = decoded.instruction;

        if *instruction == INDEXED_FIELD_LINE {
            if !decoded.s_bit {
                return Err(no_dynamic_table());
            }
            let entry = static_entry(decoded.varint)?;
            self.handler.on_header_decoded(entry.name, entry.value);
        } else if *instruction == LITERAL_WITH_NAME_REFERENCE {
            if !decoded.s_bit {
                return Err(no_dynamic_table());
            }
            let entry = static_entry(decoded.varint)?;
            self.handler.on_header_decoded(entry.name, decoded.value);
        } else if *instruction == LITERAL_WITH_LITERAL_NAME {
            self.handler.on_header_decoded(decoded.name, decoded.value);
        } else if *instruction == INDEXED_FIELD_LINE_POST_BASE
            || *instruction == LITERAL_WITH_POST_BASE_NAME_REFERENCE
        {
            return Err(no_dynamic_table());
        }
        Ok(())
    }

    fn on_instruction_decoding_error(&mut self, error: &Error) {
        self.error = Some(match error {
            Error::DecompressionFailed(_) => error.clone(),
            other => Error::DecompressionFailed(other.to_string()),
        });
    }
}

fn static_entry(index: u64) -> Result<&'static static_table::StaticEntry> {
    static_table::get(index)
        .ok_or_else(|| Error::DecompressionFailed("Static table entry not found.".into()))
}

/// Incremental decoder for one encoded field section.
///
/// Feed the HEADERS payload in fragments with [`decode`](Self::decode), then
/// call [`end_field_section`](Self::end_field_section) once the frame ends.
pub struct FieldSectionDecoder<H> {
    prefix_decoder: InstructionDecoder<PrefixSink>,
    line_decoder: InstructionDecoder<FieldLineSink<H>>,
    prefix_decoded: bool,
    error_detected: bool,
    completed: bool,
}

impl<H: FieldSectionHandler> FieldSectionDecoder<H> {
    pub fn new(handler: H) -> Self {
        Self::with_config(handler, &QpackConfig::default())
    }

    pub fn with_config(handler: H, config: &QpackConfig) -> Self {
        Self {
            prefix_decoder: InstructionDecoder::with_config(
                FIELD_SECTION_PREFIX_LANGUAGE,
                PrefixSink::default(),
                config,
            ),
            line_decoder: InstructionDecoder::with_config(
                FIELD_LINE_LANGUAGE,
                FieldLineSink {
                    handler,
                    error: None,
                },
                config,
            ),
            prefix_decoded: false,
            error_detected: false,
            completed: false,
        }
    }

    /// Decodes a fragment of the field section.
    pub fn decode(&mut self, mut data: &[u8]) {
        if self.error_detected || self.completed {
            return;
        }

        // The prefix is fed one byte at a time so that no field line byte
        // reaches the prefix decoder.
        while !self.prefix_decoded {
            let Some((first, rest)) = data.split_first() else {
                return;
            };
            data = rest;

            if !self.prefix_decoder.decode(std::slice::from_ref(first)) {
                let error = self.prefix_decoder.delegate_mut().error.take();
                self.fail(error);
                return;
            }

            if let Some(prefix) = self.prefix_decoder.delegate_mut().decoded.take() {
                if let Err(error) = check_prefix(prefix) {
                    self.fail(Some(error));
                    return;
                }
                self.prefix_decoded = true;
            }
        }

        if !data.is_empty() && !self.line_decoder.decode(data) {
            let error = self.line_decoder.delegate_mut().error.take();
            self.fail(error);
        }
    }

    /// Signals the end of the field section.
    pub fn end_field_section(&mut self) {
        if self.error_detected || self.completed {
            return;
        }

        if !self.prefix_decoded {
            self.fail(Some(Error::DecompressionFailed(
                "Incomplete header data prefix.".into(),
            )));
        } else if !self.line_decoder.at_instruction_boundary() {
            self.fail(Some(Error::DecompressionFailed(
                "Incomplete header block.".into(),
            )));
        } else {
            trace!("field section decoded");
            self.completed = true;
            self.handler_mut().on_decoding_completed();
        }
    }

    pub fn error_detected(&self) -> bool {
        self.error_detected
    }

    pub fn handler(&self) -> &H {
        &self.line_decoder.delegate().handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.line_decoder.delegate_mut().handler
    }

    pub fn into_handler(self) -> H {
        self.line_decoder.into_delegate().handler
    }

    fn fail(&mut self, error: Option<Error>) {
        let error = match error {
            Some(Error::DecompressionFailed(detail)) => Error::DecompressionFailed(detail),
            Some(other) => Error::DecompressionFailed(other.to_string()),
            None => Error::DecompressionFailed("field section decoding failed".into()),
        };
        debug!(%error, "field section error");
        self.error_detected = true;
        self.handler_mut().on_decoding_error(&error);
    }
}

/// Validates the section prefix for a decoder without a dynamic table.
fn check_prefix((required_insert_count, sign, delta_base): (u64, bool, u64)) -> Result<()> {
    if required_insert_count != 0 {
        return Err(Error::DecompressionFailed(
            "Required Insert Count too large.".into(),
        ));
    }
    // Base = Required Insert Count - Delta Base - 1 must not underflow.
    if sign {
        return Err(Error::DecompressionFailed("Error calculating Base.".into()));
    }
    trace!(delta_base, "field section prefix decoded");
    Ok(())
}

/// Decodes a complete field section into owned field lines.
pub fn decode_field_section(data: &[u8]) -> Result<Vec<FieldLine>> {
    #[derive(Default)]
    struct Collect {
        fields: Vec<FieldLine>,
        error: Option<Error>,
    }

    impl FieldSectionHandler for Collect {
        fn on_header_decoded(&mut self, name: &[u8], value: &[u8]) {
            self.fields.push(FieldLine::copy_from(name, value));
        }

        fn on_decoding_completed(&mut self) {}

        fn on_decoding_error(&mut self, error: &Error) {
            self.error = Some(error.clone());
        }
    }

    let mut decoder = FieldSectionDecoder::new(Collect::default());
    decoder.decode(data);
    decoder.end_field_section();

    let collect = decoder.into_handler();
    match collect.error {
        Some(error) => Err(error),
        None => Ok(collect.fields),
    }
}

/// Encodes field sections using only the static table.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSectionEncoder {
    encoder: InstructionEncoder,
}

impl FieldSectionEncoder {
    pub fn new(config: &QpackConfig) -> Self {
        Self {
            encoder: InstructionEncoder::with_config(config),
        }
    }

    /// Appends the encoded field section to `out`. Returns the number of
    /// bytes written.
    pub fn encode<'a, I, B>(&self, fields: I, out: &mut B) -> usize
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
        B: BufMut,
    {
        // Required Insert Count 0, Base 0.
        let mut written = self
            .encoder
            .encode(&FIELD_SECTION_PREFIX, &InstructionValues::default(), out);

        for (name, value) in fields {
            let (instruction, values) = match static_table::lookup(name, value) {
                Some(StaticMatch::Exact(index)) => (
                    &INDEXED_FIELD_LINE,
                    InstructionValues {
                        s_bit: true,
                        varint: index,
                        ..Default::default()
                    },
                ),
                Some(StaticMatch::Name(index)) => (
                    &LITERAL_WITH_NAME_REFERENCE,
                    InstructionValues {
                        s_bit: true,
                        varint: index,
                        value,
                        ..Default::default()
                    },
                ),
                None => (
                    &LITERAL_WITH_LITERAL_NAME,
                    InstructionValues {
                        name,
                        value,
                        ..Default::default()
                    },
                ),
            };
            written += self.encoder.encode(instruction, &values, out);
        }

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(fields: &[(&'static str, &'static str)]) -> Vec<u8> {
        let mut out = Vec::new();
        FieldSectionEncoder::default().encode(
            fields.iter().map(|(n, v)| (n.as_bytes(), v.as_bytes())),
            &mut out,
        );
        out
    }

    #[test]
    fn test_rfc_literal_example() {
        // RFC 9204 B.1: :path=/index.html with a static name reference.
        let mut data = vec![0x00, 0x00, 0x51, 0x0b];
        data.extend_from_slice(b"/index.html");
        let fields = decode_field_section(&data).unwrap();
        assert_eq!(fields, vec![FieldLine::new(":path", "/index.html")]);
    }

    #[test]
    fn test_roundtrip() {
        let fields = [
            (":method", "GET"),
            (":path", "/index.html"),
            (":scheme", "https"),
            (":authority", "example.com"),
            ("x-request-id", "1234"),
        ];
        let encoded = encode(&fields);
        let expected: Vec<FieldLine> = fields.iter().map(|&f| f.into()).collect();
        assert_eq!(decode_field_section(&encoded).unwrap(), expected);
    }

    #[test]
    fn test_exact_match_is_one_byte() {
        assert_eq!(encode(&[(":method", "GET")]), [0x00, 0x00, 0xd1]);
    }

    #[test]
    fn test_dynamic_reference_rejected() {
        // Indexed field line with T=0.
        let err = decode_field_section(&[0x00, 0x00, 0x81]).unwrap_err();
        assert_eq!(
            err,
            Error::DecompressionFailed("Dynamic table reference without a dynamic table.".into())
        );
        assert_eq!(err.error_code(), 0x0200);

        // Post-base index.
        assert!(decode_field_section(&[0x00, 0x00, 0x10]).is_err());
    }

    #[test]
    fn test_required_insert_count_rejected() {
        let err = decode_field_section(&[0x02, 0x00, 0xd1]).unwrap_err();
        assert_eq!(
            err,
            Error::DecompressionFailed("Required Insert Count too large.".into())
        );
    }

    #[test]
    fn test_bad_static_index() {
        // Index 99 needs continuation bytes with a 6-bit prefix: 63 + 36.
        let err = decode_field_section(&[0x00, 0x00, 0xff, 0x24]).unwrap_err();
        assert_eq!(
            err,
            Error::DecompressionFailed("Static table entry not found.".into())
        );
    }

    #[test]
    fn test_incomplete_prefix() {
        let err = decode_field_section(&[0x00]).unwrap_err();
        assert_eq!(
            err,
            Error::DecompressionFailed("Incomplete header data prefix.".into())
        );
    }

    #[test]
    fn test_incomplete_block() {
        let err = decode_field_section(&[0x00, 0x00, 0x51, 0x0b, b'/']).unwrap_err();
        assert_eq!(
            err,
            Error::DecompressionFailed("Incomplete header block.".into())
        );
    }

    #[test]
    fn test_instruction_error_is_wrapped() {
        let mut data = vec![0x00, 0x00, 0xff];
        data.extend_from_slice(&[0xff; 10]);
        let err = decode_field_section(&data).unwrap_err();
        assert_eq!(
            err,
            Error::DecompressionFailed("Encoded integer too large.".into())
        );
    }

    #[test]
    fn test_fragmented_decode() {
        #[derive(Default)]
        struct Count {
            fields: usize,
            completed: bool,
            errors: usize,
        }
        impl FieldSectionHandler for Count {
            fn on_header_decoded(&mut self, _: &[u8], _: &[u8]) {
                self.fields += 1;
            }
            fn on_decoding_completed(&mut self) {
                self.completed = true;
            }
            fn on_decoding_error(&mut self, _: &Error) {
                self.errors += 1;
            }
        }

        let encoded = encode(&[(":status", "200"), ("server", "h3wire"), ("etag", "abc")]);
        let mut decoder = FieldSectionDecoder::new(Count::default());
        for byte in &encoded {
            decoder.decode(std::slice::from_ref(byte));
        }
        decoder.end_field_section();
        decoder.end_field_section();

        let count = decoder.into_handler();
        assert_eq!(count.fields, 3);
        assert!(count.completed);
        assert_eq!(count.errors, 0);
    }
}
