//! Incremental HTTP/3 frame decoder (RFC 9114 Section 7).
//!
//! [`HttpDecoder`] consumes a stream's bytes in fragments of any size and
//! reports frames to a [`Visitor`]:
//!
//! - DATA, HEADERS, PUSH_PROMISE and unknown frames are streamed: a start
//!   callback, one payload callback per fragment, and an end callback. Their
//!   payload is never buffered.
//! - CANCEL_PUSH, SETTINGS, GOAWAY, MAX_PUSH_ID and PRIORITY_UPDATE are
//!   buffered up to a per-type limit, parsed, and delivered whole.
//!
//! The frame type and length varints may be split across calls; the
//! decoder keeps the partial bytes in fixed scratch buffers.
//!
//! Every visitor callback returns `Result<bool>`. `Ok(false)` pauses the
//! decoder: [`HttpDecoder::process_input`] returns the number of bytes
//! consumed and the caller resumes later with the rest. `Err` moves the
//! decoder into its error state like any protocol error.

use h3wire_buf::{varint, ByteReader};
use tracing::{debug, trace};

use crate::config::HttpDecoderConfig;
use crate::error::{Error, ErrorCode, Result};
use crate::frame::{
    settings, CancelPushFrame, FrameType, GoAwayFrame, MaxPushIdFrame, PrioritizedElementType,
    PriorityUpdateFrame, SettingsFrame,
};

/// Receives frames from an [`HttpDecoder`].
///
/// Every method except [`on_error`](Self::on_error) returns `Ok(true)` to
/// continue, `Ok(false)` to pause, or an error to abort decoding. The
/// defaults accept and ignore the frame.
#[allow(unused_variables)]
pub trait Visitor {
    /// Called once when decoding fails. The decoder processes no further
    /// input.
    fn on_error(&mut self, error: &Error);

    fn on_cancel_push_frame(&mut self, frame: CancelPushFrame) -> Result<bool> {
        Ok(true)
    }

    fn on_max_push_id_frame(&mut self, frame: MaxPushIdFrame) -> Result<bool> {
        Ok(true)
    }

    fn on_goaway_frame(&mut self, frame: GoAwayFrame) -> Result<bool> {
        Ok(true)
    }

    fn on_settings_frame_start(&mut self, header_length: u64) -> Result<bool> {
        Ok(true)
    }

    fn on_settings_frame(&mut self, frame: SettingsFrame) -> Result<bool> {
        Ok(true)
    }

    fn on_data_frame_start(&mut self, header_length: u64, payload_length: u64) -> Result<bool> {
        Ok(true)
    }

    fn on_data_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        Ok(true)
    }

    fn on_data_frame_end(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn on_headers_frame_start(&mut self, header_length: u64, payload_length: u64) -> Result<bool> {
        Ok(true)
    }

    fn on_headers_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        Ok(true)
    }

    fn on_headers_frame_end(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn on_push_promise_frame_start(&mut self, header_length: u64) -> Result<bool> {
        Ok(true)
    }

    /// Called once the push id of a PUSH_PROMISE frame is decoded.
    /// `header_block_length` is the length of the encoded field section
    /// that follows.
    fn on_push_promise_frame_push_id(
        &mut self,
        push_id: u64,
        push_id_length: u64,
        header_block_length: u64,
    ) -> Result<bool> {
        Ok(true)
    }

    fn on_push_promise_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        Ok(true)
    }

    fn on_push_promise_frame_end(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn on_priority_update_frame_start(&mut self, header_length: u64) -> Result<bool> {
        Ok(true)
    }

    fn on_priority_update_frame(&mut self, frame: PriorityUpdateFrame) -> Result<bool> {
        Ok(true)
    }

    fn on_unknown_frame_start(
        &mut self,
        frame_type: u64,
        header_length: u64,
        payload_length: u64,
    ) -> Result<bool> {
        Ok(true)
    }

    fn on_unknown_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        Ok(true)
    }

    fn on_unknown_frame_end(&mut self) -> Result<bool> {
        Ok(true)
    }
}

/// The role of the stream being decoded, which determines the frames it
/// may carry (RFC 9114 Section 7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamKind {
    /// No frame type restrictions.
    #[default]
    Any,
    /// The control stream: SETTINGS first and only once; no DATA, HEADERS
    /// or PUSH_PROMISE.
    Control,
    /// A request or push stream: no control-stream-only frames.
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ReadingFrameType,
    ReadingFrameLength,
    ReadingFramePayload,
    FinishParsing,
    Error,
}

/// Decodes the frames of one HTTP/3 stream.
pub struct HttpDecoder<V> {
    visitor: V,
    config: HttpDecoderConfig,
    stream_kind: StreamKind,

    state: State,
    current_frame_type: u64,

    current_type_field_length: usize,
    remaining_type_field_length: usize,
    type_buffer: [u8; varint::MAX_LEN],

    current_length_field_length: usize,
    remaining_length_field_length: usize,
    length_buffer: [u8; varint::MAX_LEN],

    current_frame_length: u64,
    remaining_frame_length: u64,

    current_push_id_length: usize,
    remaining_push_id_length: usize,
    push_id_buffer: [u8; varint::MAX_LEN],

    /// Payload of the buffered frame being read.
    buffer: Vec<u8>,
    settings_received: bool,
    error: Option<Error>,
}

impl<V: Visitor> HttpDecoder<V> {
    /// Creates a decoder that accepts every frame type.
    pub fn new(visitor: V) -> Self {
        Self::with_config(visitor, StreamKind::Any, HttpDecoderConfig::default())
    }

    pub fn for_control_stream(visitor: V) -> Self {
        Self::with_config(visitor, StreamKind::Control, HttpDecoderConfig::default())
    }

    pub fn for_request_stream(visitor: V) -> Self {
        Self::with_config(visitor, StreamKind::Request, HttpDecoderConfig::default())
    }

    pub fn with_config(visitor: V, stream_kind: StreamKind, config: HttpDecoderConfig) -> Self {
        Self {
            visitor,
            config,
            stream_kind,
            state: State::ReadingFrameType,
            current_frame_type: 0,
            current_type_field_length: 0,
            remaining_type_field_length: 0,
            type_buffer: [0; varint::MAX_LEN],
            current_length_field_length: 0,
            remaining_length_field_length: 0,
            length_buffer: [0; varint::MAX_LEN],
            current_frame_length: 0,
            remaining_frame_length: 0,
            current_push_id_length: 0,
            remaining_push_id_length: 0,
            push_id_buffer: [0; varint::MAX_LEN],
            buffer: Vec::new(),
            settings_received: false,
            error: None,
        }
    }

    /// Processes a fragment of stream data and returns the number of bytes
    /// consumed.
    ///
    /// Fewer than `data.len()` bytes are consumed only when a visitor
    /// paused; pass the rest on the next call. Returns 0 once an error has
    /// been reported.
    pub fn process_input(&mut self, data: &[u8]) -> usize {
        if self.error.is_some() {
            return 0;
        }

        let mut reader = ByteReader::new(data);
        let mut continue_processing = true;

        while continue_processing
            && (!reader.is_done_reading() || self.state == State::FinishParsing)
        {
            continue_processing = match self.state {
                State::ReadingFrameType => self.read_frame_type(&mut reader),
                State::ReadingFrameLength => self.read_frame_length(&mut reader),
                State::ReadingFramePayload => self.read_frame_payload(&mut reader),
                State::FinishParsing => self.finish_parsing(),
                State::Error => false,
            };
        }

        if self.error.is_some() {
            return 0;
        }
        data.len() - reader.bytes_remaining()
    }

    /// The error that stopped the decoder, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Detail string of the error, or an empty string.
    pub fn error_detail(&self) -> &str {
        self.error.as_ref().map_or("", |e| e.detail.as_str())
    }

    /// True if the input so far ends between frames.
    pub fn at_frame_boundary(&self) -> bool {
        self.state == State::ReadingFrameType && self.current_type_field_length == 0
    }

    pub fn stream_kind(&self) -> StreamKind {
        self.stream_kind
    }

    pub fn visitor(&self) -> &V {
        &self.visitor
    }

    pub fn visitor_mut(&mut self) -> &mut V {
        &mut self.visitor
    }

    pub fn into_visitor(self) -> V {
        self.visitor
    }

    fn read_frame_type(&mut self, reader: &mut ByteReader<'_>) -> bool {
        if self.current_type_field_length == 0 {
            // A new frame is coming.
            self.current_type_field_length = reader.peek_var_int62_length();
            if self.current_type_field_length > reader.bytes_remaining() {
                self.remaining_type_field_length = self.current_type_field_length;
                buffer_field(
                    reader,
                    &mut self.type_buffer,
                    self.current_type_field_length,
                    &mut self.remaining_type_field_length,
                );
                return true;
            }
            match reader.read_var_int62() {
                Ok(frame_type) => self.current_frame_type = frame_type,
                Err(_) => return self.raise_error(ErrorCode::FrameError, "Unable to read frame type."),
            }
        } else {
            buffer_field(
                reader,
                &mut self.type_buffer,
                self.current_type_field_length,
                &mut self.remaining_type_field_length,
            );
            if self.remaining_type_field_length != 0 {
                return true;
            }
            let mut type_reader =
                ByteReader::new(&self.type_buffer[..self.current_type_field_length]);
            match type_reader.read_var_int62() {
                Ok(frame_type) => self.current_frame_type = frame_type,
                Err(_) => return self.raise_error(ErrorCode::FrameError, "Unable to read frame type."),
            }
        }

        if FrameType::is_http2_only(self.current_frame_type) {
            return self.raise_error(
                ErrorCode::ReceiveSpdyFrame,
                format!(
                    "HTTP/2 frame received in a HTTP/3 connection: {}",
                    self.current_frame_type
                ),
            );
        }
        if let Err(error) = self.check_frame_allowed() {
            self.raise(error);
            return false;
        }

        self.state = State::ReadingFrameLength;
        true
    }

    fn check_frame_allowed(&mut self) -> Result<()> {
        let frame_type = FrameType::from(self.current_frame_type);
        match self.stream_kind {
            StreamKind::Any => Ok(()),
            StreamKind::Control => {
                if !self.settings_received {
                    if frame_type != FrameType::Settings {
                        return Err(Error::new(
                            ErrorCode::MissingSettings,
                            "First frame received on control stream is not SETTINGS.",
                        ));
                    }
                    self.settings_received = true;
                    return Ok(());
                }
                match frame_type {
                    FrameType::Settings => Err(Error::new(
                        ErrorCode::FrameUnexpected,
                        "SETTINGS frame received twice.",
                    )),
                    FrameType::Data | FrameType::Headers | FrameType::PushPromise => {
                        Err(Error::new(
                            ErrorCode::FrameUnexpected,
                            format!("{frame_type} frame received on control stream."),
                        ))
                    }
                    _ => Ok(()),
                }
            }
            StreamKind::Request => match frame_type {
                FrameType::CancelPush
                | FrameType::Settings
                | FrameType::GoAway
                | FrameType::MaxPushId
                | FrameType::PriorityUpdate => Err(Error::new(
                    ErrorCode::FrameUnexpected,
                    format!("{frame_type} frame received on request stream."),
                )),
                _ => Ok(()),
            },
        }
    }

    fn read_frame_length(&mut self, reader: &mut ByteReader<'_>) -> bool {
        if self.current_length_field_length == 0 {
            self.current_length_field_length = reader.peek_var_int62_length();
            if self.current_length_field_length > reader.bytes_remaining() {
                self.remaining_length_field_length = self.current_length_field_length;
                buffer_field(
                    reader,
                    &mut self.length_buffer,
                    self.current_length_field_length,
                    &mut self.remaining_length_field_length,
                );
                return true;
            }
            match reader.read_var_int62() {
                Ok(length) => self.current_frame_length = length,
                Err(_) => return self.raise_error(ErrorCode::FrameError, "Unable to read frame length."),
            }
        } else {
            buffer_field(
                reader,
                &mut self.length_buffer,
                self.current_length_field_length,
                &mut self.remaining_length_field_length,
            );
            if self.remaining_length_field_length != 0 {
                return true;
            }
            let mut length_reader =
                ByteReader::new(&self.length_buffer[..self.current_length_field_length]);
            match length_reader.read_var_int62() {
                Ok(length) => self.current_frame_length = length,
                Err(_) => return self.raise_error(ErrorCode::FrameError, "Unable to read frame length."),
            }
        }

        if self.current_frame_length > self.max_frame_length() {
            return self.raise_error(ErrorCode::FrameTooLarge, "Frame is too large.");
        }

        let header_length = (self.current_type_field_length + self.current_length_field_length) as u64;
        let payload_length = self.current_frame_length;
        trace!(
            frame_type = %FrameType::from(self.current_frame_type),
            header_length,
            payload_length,
            "frame start"
        );

        let result = match FrameType::from(self.current_frame_type) {
            FrameType::Data => self.visitor.on_data_frame_start(header_length, payload_length),
            FrameType::Headers => self
                .visitor
                .on_headers_frame_start(header_length, payload_length),
            FrameType::Settings => self.visitor.on_settings_frame_start(header_length),
            FrameType::PushPromise => {
                // The payload callbacks never run for an empty frame.
                if payload_length == 0 {
                    return self.raise_error(
                        ErrorCode::FrameError,
                        "PUSH_PROMISE frame with empty payload.",
                    );
                }
                self.visitor.on_push_promise_frame_start(header_length)
            }
            FrameType::PriorityUpdate => self.visitor.on_priority_update_frame_start(header_length),
            FrameType::CancelPush | FrameType::GoAway | FrameType::MaxPushId => Ok(true),
            FrameType::Unknown(frame_type) => {
                self.visitor
                    .on_unknown_frame_start(frame_type, header_length, payload_length)
            }
        };

        self.buffer.clear();
        self.remaining_frame_length = self.current_frame_length;
        self.state = if self.remaining_frame_length == 0 {
            State::FinishParsing
        } else {
            State::ReadingFramePayload
        };
        self.visit(result)
    }

    fn read_frame_payload(&mut self, reader: &mut ByteReader<'_>) -> bool {
        let result = match FrameType::from(self.current_frame_type) {
            FrameType::Data => {
                let payload = self.read_payload_chunk(reader);
                self.visitor.on_data_frame_payload(payload)
            }
            FrameType::Headers => {
                let payload = self.read_payload_chunk(reader);
                self.visitor.on_headers_frame_payload(payload)
            }
            FrameType::PushPromise => match self.read_push_promise_payload(reader) {
                Some(result) => result,
                None => return false,
            },
            FrameType::CancelPush
            | FrameType::Settings
            | FrameType::GoAway
            | FrameType::MaxPushId
            | FrameType::PriorityUpdate => {
                self.buffer_frame_payload(reader);
                Ok(true)
            }
            FrameType::Unknown(_) => {
                let payload = self.read_payload_chunk(reader);
                self.visitor.on_unknown_frame_payload(payload)
            }
        };

        if self.remaining_frame_length == 0 {
            self.state = State::FinishParsing;
        }
        self.visit(result)
    }

    /// Reads the push id, then the field section. Returns `None` after
    /// raising an error.
    fn read_push_promise_payload(&mut self, reader: &mut ByteReader<'_>) -> Option<Result<bool>> {
        let mut push_id = None;

        if self.current_frame_length == self.remaining_frame_length {
            // A new PUSH_PROMISE frame just arrived.
            self.current_push_id_length = reader.peek_var_int62_length();
            if self.current_push_id_length as u64 > self.remaining_frame_length {
                self.raise_error(ErrorCode::FrameError, "Unable to read PUSH_PROMISE push_id.");
                return None;
            }
            if self.current_push_id_length > reader.bytes_remaining() {
                // Not all bytes of the push id are present yet.
                self.remaining_push_id_length = self.current_push_id_length;
                self.buffer_push_id(reader);
                return Some(Ok(true));
            }
            match reader.read_var_int62() {
                Ok(id) => push_id = Some(id),
                Err(_) => {
                    self.raise_error(ErrorCode::FrameError, "Unable to read PUSH_PROMISE push_id.");
                    return None;
                }
            }
            self.remaining_frame_length -= self.current_push_id_length as u64;
        } else if self.remaining_push_id_length > 0 {
            self.buffer_push_id(reader);
            if self.remaining_push_id_length != 0 {
                return Some(Ok(true));
            }
            let mut push_id_reader =
                ByteReader::new(&self.push_id_buffer[..self.current_push_id_length]);
            match push_id_reader.read_var_int62() {
                Ok(id) => push_id = Some(id),
                Err(_) => {
                    self.raise_error(ErrorCode::FrameError, "Unable to read PUSH_PROMISE push_id.");
                    return None;
                }
            }
        }

        if let Some(push_id) = push_id {
            let push_id_length = self.current_push_id_length as u64;
            self.current_push_id_length = 0;
            match self.visitor.on_push_promise_frame_push_id(
                push_id,
                push_id_length,
                self.current_frame_length - push_id_length,
            ) {
                Ok(true) => {}
                paused_or_rejected => return Some(paused_or_rejected),
            }
        }

        // Field section bytes.
        let payload = self.read_payload_chunk(reader);
        if payload.is_empty() {
            return Some(Ok(true));
        }
        Some(self.visitor.on_push_promise_frame_payload(payload))
    }

    fn finish_parsing(&mut self) -> bool {
        let result = match FrameType::from(self.current_frame_type) {
            FrameType::Data => self.visitor.on_data_frame_end(),
            FrameType::Headers => self.visitor.on_headers_frame_end(),
            FrameType::PushPromise => self.visitor.on_push_promise_frame_end(),
            FrameType::Unknown(_) => self.visitor.on_unknown_frame_end(),
            FrameType::CancelPush => match parse_single_varint(&self.buffer, "CANCEL_PUSH", "push_id") {
                Ok(push_id) => self.visitor.on_cancel_push_frame(CancelPushFrame { push_id }),
                Err(error) => return self.raise(error),
            },
            FrameType::GoAway => match parse_single_varint(&self.buffer, "GOAWAY", "ID") {
                Ok(id) => self.visitor.on_goaway_frame(GoAwayFrame { id }),
                Err(error) => return self.raise(error),
            },
            FrameType::MaxPushId => match parse_single_varint(&self.buffer, "MAX_PUSH_ID", "push_id") {
                Ok(push_id) => self.visitor.on_max_push_id_frame(MaxPushIdFrame { push_id }),
                Err(error) => return self.raise(error),
            },
            FrameType::Settings => match parse_settings(&self.buffer) {
                Ok(frame) => self.visitor.on_settings_frame(frame),
                Err(error) => return self.raise(error),
            },
            FrameType::PriorityUpdate => match parse_priority_update(&self.buffer) {
                Ok(frame) => self.visitor.on_priority_update_frame(frame),
                Err(error) => return self.raise(error),
            },
        };

        self.buffer.clear();
        self.current_length_field_length = 0;
        self.current_type_field_length = 0;
        self.state = State::ReadingFrameType;
        self.visit(result)
    }

    fn max_frame_length(&self) -> u64 {
        match FrameType::from(self.current_frame_type) {
            FrameType::CancelPush | FrameType::GoAway | FrameType::MaxPushId => {
                varint::MAX_LEN as u64
            }
            FrameType::Settings => self.config.max_settings_frame_length,
            FrameType::PriorityUpdate => self.config.max_priority_update_frame_length,
            _ => u64::MAX,
        }
    }

    /// Takes up to the rest of the current frame from `reader`.
    fn read_payload_chunk<'a>(&mut self, reader: &mut ByteReader<'a>) -> &'a [u8] {
        let available = reader.bytes_remaining();
        let n = usize::try_from(self.remaining_frame_length).map_or(available, |r| r.min(available));
        let payload = reader.read_bytes(n).unwrap_or(&[]);
        self.remaining_frame_length -= payload.len() as u64;
        payload
    }

    fn buffer_frame_payload(&mut self, reader: &mut ByteReader<'_>) {
        let payload = self.read_payload_chunk(reader);
        self.buffer.extend_from_slice(payload);
    }

    fn buffer_push_id(&mut self, reader: &mut ByteReader<'_>) {
        let before = self.remaining_push_id_length;
        buffer_field(
            reader,
            &mut self.push_id_buffer,
            self.current_push_id_length,
            &mut self.remaining_push_id_length,
        );
        self.remaining_frame_length -= (before - self.remaining_push_id_length) as u64;
    }

    /// Maps a visitor result to the continue flag, raising rejections.
    fn visit(&mut self, result: Result<bool>) -> bool {
        match result {
            Ok(continue_processing) => continue_processing,
            Err(error) => self.raise(error),
        }
    }

    fn raise_error(&mut self, code: ErrorCode, detail: impl Into<String>) -> bool {
        self.raise(Error::new(code, detail))
    }

    /// Enters the error state and notifies the visitor. Always returns
    /// false.
    fn raise(&mut self, error: Error) -> bool {
        debug!(
            code = ?error.code,
            detail = %error.detail,
            frame_type = self.current_frame_type,
            "HTTP/3 decoding error"
        );
        self.state = State::Error;
        self.visitor.on_error(&error);
        self.error = Some(error);
        false
    }
}

impl<V> std::fmt::Debug for HttpDecoder<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDecoder")
            .field("stream_kind", &self.stream_kind)
            .field("state", &self.state)
            .field("current_frame_type", &self.current_frame_type)
            .field("remaining_frame_length", &self.remaining_frame_length)
            .field("error", &self.error)
            .finish()
    }
}

/// Copies up to `remaining` bytes of a split varint into `buf`.
fn buffer_field(
    reader: &mut ByteReader<'_>,
    buf: &mut [u8; varint::MAX_LEN],
    current: usize,
    remaining: &mut usize,
) {
    let n = (*remaining).min(reader.bytes_remaining());
    let start = current - *remaining;
    if reader.copy_bytes(&mut buf[start..start + n]).is_ok() {
        *remaining -= n;
    }
}

fn frame_error(detail: impl Into<String>) -> Error {
    Error::new(ErrorCode::FrameError, detail)
}

/// Parses a payload that is exactly one varint.
fn parse_single_varint(payload: &[u8], frame: &str, field: &str) -> Result<u64> {
    let mut reader = ByteReader::new(payload);
    let value = reader
        .read_var_int62()
        .map_err(|_| frame_error(format!("Unable to read {frame} {field}.")))?;
    if !reader.is_done_reading() {
        return Err(frame_error(format!("Superfluous data in {frame} frame.")));
    }
    Ok(value)
}

fn parse_settings(payload: &[u8]) -> Result<SettingsFrame> {
    let mut reader = ByteReader::new(payload);
    let mut frame = SettingsFrame::default();

    while !reader.is_done_reading() {
        let id = reader
            .read_var_int62()
            .map_err(|_| frame_error("Unable to read setting identifier."))?;
        let value = reader
            .read_var_int62()
            .map_err(|_| frame_error("Unable to read setting value."))?;

        if settings::is_http2_only(id) {
            return Err(Error::new(
                ErrorCode::ReceiveSpdySetting,
                format!("HTTP/2 setting received in HTTP/3 connection: {id}"),
            ));
        }
        if frame.values.insert(id, value).is_some() {
            return Err(Error::new(
                ErrorCode::DuplicateSettingIdentifier,
                "Duplicate setting identifier.",
            ));
        }
    }

    Ok(frame)
}

fn parse_priority_update(payload: &[u8]) -> Result<PriorityUpdateFrame> {
    let mut reader = ByteReader::new(payload);

    let element_type = reader
        .read_u8()
        .map_err(|_| frame_error("Unable to read prioritized element type."))?;
    let prioritized_element_type = PrioritizedElementType::from_u8(element_type)
        .ok_or_else(|| frame_error("Invalid prioritized element type."))?;
    let prioritized_element_id = reader
        .read_var_int62()
        .map_err(|_| frame_error("Unable to read prioritized element id."))?;
    let priority_field_value = String::from_utf8_lossy(reader.read_remaining_payload()).into_owned();

    Ok(PriorityUpdateFrame {
        prioritized_element_type,
        prioritized_element_id,
        priority_field_value,
    })
}
