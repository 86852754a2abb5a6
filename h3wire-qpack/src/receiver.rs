//! Typed receivers for the QPACK encoder and decoder streams.
//!
//! Each receiver runs an [`InstructionDecoder`] over the stream's language
//! and translates decoded instructions into calls on a stream-specific
//! delegate. Errors are reported once, wrapped with the error code of the
//! stream (RFC 9204 Section 6).

use tracing::debug;

use crate::config::QpackConfig;
use crate::error::{Error, Result};
use crate::instruction_decoder::{DecodedInstruction, InstructionDecoder, InstructionDelegate};
use crate::instructions::{
    DECODER_STREAM_LANGUAGE, DUPLICATE, ENCODER_STREAM_LANGUAGE, INSERT_COUNT_INCREMENT,
    INSERT_WITH_LITERAL_NAME, INSERT_WITH_NAME_REFERENCE, SECTION_ACKNOWLEDGMENT,
    SET_DYNAMIC_TABLE_CAPACITY, STREAM_CANCELLATION,
};

/// Handles instructions received on the encoder stream.
pub trait EncoderStreamDelegate {
    fn on_insert_with_name_reference(&mut self, is_static: bool, name_index: u64, value: &[u8]);
    fn on_insert_without_name_reference(&mut self, name: &[u8], value: &[u8]);
    fn on_duplicate(&mut self, index: u64);
    fn on_set_dynamic_table_capacity(&mut self, capacity: u64);
    /// Called once; the error is an [`Error::EncoderStreamError`].
    fn on_error_detected(&mut self, error: &Error);
}

/// Handles instructions received on the decoder stream.
pub trait DecoderStreamDelegate {
    fn on_insert_count_increment(&mut self, increment: u64);
    fn on_section_acknowledgment(&mut self, stream_id: u64);
    fn on_stream_cancellation(&mut self, stream_id: u64);
    /// Called once; the error is an [`Error::DecoderStreamError`].
    fn on_error_detected(&mut self, error: &Error);
}

struct EncoderStreamTranslator<D> {
    delegate: D,
}

impl<D: EncoderStreamDelegate> InstructionDelegate for EncoderStreamTranslator<D> {
    fn on_instruction_decoded(&mut self, decoded: &DecodedInstruction<'_>) -> Result<()> {
        let instruction = decoded.instruction;
        if *instruction == INSERT_WITH_NAME_REFERENCE {
            self.delegate
                .on_insert_with_name_reference(decoded.s_bit, decoded.varint, decoded.value);
        } else if *instruction == INSERT_WITH_LITERAL_NAME {
            self.delegate
                .on_insert_without_name_reference(decoded.name, decoded.value);
        } else if *instruction == DUPLICATE {
            self.delegate.on_duplicate(decoded.varint);
        } else if *instruction == SET_DYNAMIC_TABLE_CAPACITY {
            self.delegate.on_set_dynamic_table_capacity(decoded.varint);
        }
        Ok(())
    }

    fn on_instruction_decoding_error(&mut self, error: &Error) {
        let error = Error::EncoderStreamError(error.to_string());
        debug!(%error, "encoder stream error");
        self.delegate.on_error_detected(&error);
    }
}

/// Decodes the encoder stream sent by the peer's QPACK encoder.
pub struct EncoderStreamReceiver<D> {
    decoder: InstructionDecoder<EncoderStreamTranslator<D>>,
}

impl<D: EncoderStreamDelegate> EncoderStreamReceiver<D> {
    pub fn new(delegate: D) -> Self {
        Self::with_config(delegate, &QpackConfig::default())
    }

    pub fn with_config(delegate: D, config: &QpackConfig) -> Self {
        Self {
            decoder: InstructionDecoder::with_config(
                ENCODER_STREAM_LANGUAGE,
                EncoderStreamTranslator { delegate },
                config,
            ),
        }
    }

    /// Decodes a fragment of stream data. Returns false once an error has
    /// been detected.
    pub fn decode(&mut self, data: &[u8]) -> bool {
        self.decoder.decode(data)
    }

    pub fn error_detected(&self) -> bool {
        self.decoder.error_detected()
    }

    pub fn delegate(&self) -> &D {
        &self.decoder.delegate().delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.decoder.delegate_mut().delegate
    }

    pub fn into_delegate(self) -> D {
        self.decoder.into_delegate().delegate
    }
}

struct DecoderStreamTranslator<D> {
    delegate: D,
}

impl<D: DecoderStreamDelegate> InstructionDelegate for DecoderStreamTranslator<D> {
    fn on_instruction_decoded(&mut self, decoded: &DecodedInstruction<'_>) -> Result<()> {
        let instruction = decoded.instruction;
        if *instruction == INSERT_COUNT_INCREMENT {
            self.delegate.on_insert_count_increment(decoded.varint);
        } else if *instruction == SECTION_ACKNOWLEDGMENT {
            self.delegate.on_section_acknowledgment(decoded.varint);
        } else if *instruction == STREAM_CANCELLATION {
            self.delegate.on_stream_cancellation(decoded.varint);
        }
        Ok(())
    }

    fn on_instruction_decoding_error(&mut self, error: &Error) {
        let error = Error::DecoderStreamError(error.to_string());
        debug!(%error, "decoder stream error");
        self.delegate.on_error_detected(&error);
    }
}

/// Decodes the decoder stream sent by the peer's QPACK decoder.
pub struct DecoderStreamReceiver<D> {
    decoder: InstructionDecoder<DecoderStreamTranslator<D>>,
}

impl<D: DecoderStreamDelegate> DecoderStreamReceiver<D> {
    pub fn new(delegate: D) -> Self {
        Self {
            decoder: InstructionDecoder::new(
                DECODER_STREAM_LANGUAGE,
                DecoderStreamTranslator { delegate },
            ),
        }
    }

    /// Decodes a fragment of stream data. Returns false once an error has
    /// been detected.
    pub fn decode(&mut self, data: &[u8]) -> bool {
        self.decoder.decode(data)
    }

    pub fn error_detected(&self) -> bool {
        self.decoder.error_detected()
    }

    pub fn delegate(&self) -> &D {
        &self.decoder.delegate().delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.decoder.delegate_mut().delegate
    }

    pub fn into_delegate(self) -> D {
        self.decoder.into_delegate().delegate
    }
}
