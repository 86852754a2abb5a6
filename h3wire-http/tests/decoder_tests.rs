//! Integration tests for the HTTP/3 frame decoder.
//! Frames are produced with `HttpEncoder`, decoded whole, in arbitrary
//! fragments, and with a visitor that pauses after every callback.

use h3wire_buf::{varint, ByteWriter};
use h3wire_http::{
    CancelPushFrame, Error, ErrorCode, GoAwayFrame, HttpDecoder, HttpEncoder, MaxPushIdFrame,
    PrioritizedElementType, PriorityUpdateFrame, Result, SettingsFrame, Visitor,
};
use h3wire_qpack::{FieldLine, FieldSectionDecoder, FieldSectionEncoder, FieldSectionHandler};
use proptest::prelude::*;

static INIT_LOGGING: std::sync::Once = std::sync::Once::new();

/// Routes decoder `trace!`/`debug!` output to the test harness.
fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_ansi(false)
            .try_init();
    });
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Error(ErrorCode),
    CancelPush(u64),
    MaxPushId(u64),
    GoAway(u64),
    SettingsStart(u64),
    Settings(SettingsFrame),
    DataStart(u64, u64),
    DataPayload(Vec<u8>),
    DataEnd,
    HeadersStart(u64, u64),
    HeadersPayload(Vec<u8>),
    HeadersEnd,
    PushPromiseStart(u64),
    PushPromisePushId(u64, u64, u64),
    PushPromisePayload(Vec<u8>),
    PushPromiseEnd,
    PriorityUpdateStart(u64),
    PriorityUpdate(PriorityUpdateFrame),
    UnknownStart(u64, u64, u64),
    UnknownPayload(Vec<u8>),
    UnknownEnd,
}

/// Records events, merging adjacent payload fragments so that the
/// record does not depend on how input was split.
#[derive(Debug, Default)]
struct Recorder {
    events: Vec<Event>,
    /// Return value of every callback.
    pause: bool,
}

impl Recorder {
    fn pausing() -> Self {
        Self {
            events: Vec::new(),
            pause: true,
        }
    }

    fn push(&mut self, event: Event) -> Result<bool> {
        self.events.push(event);
        Ok(!self.pause)
    }

    fn payload(&mut self, chunk: &[u8], make: fn(Vec<u8>) -> Event) -> Result<bool> {
        let fresh = make(Vec::new());
        let merged = match (self.events.last_mut(), &fresh) {
            (Some(Event::DataPayload(p)), Event::DataPayload(_))
            | (Some(Event::HeadersPayload(p)), Event::HeadersPayload(_))
            | (Some(Event::PushPromisePayload(p)), Event::PushPromisePayload(_))
            | (Some(Event::UnknownPayload(p)), Event::UnknownPayload(_)) => {
                p.extend_from_slice(chunk);
                true
            }
            _ => false,
        };
        if !merged {
            self.events.push(make(chunk.to_vec()));
        }
        Ok(!self.pause)
    }
}

impl Visitor for Recorder {
    fn on_error(&mut self, error: &Error) {
        self.events.push(Event::Error(error.code));
    }
    fn on_cancel_push_frame(&mut self, frame: CancelPushFrame) -> Result<bool> {
        self.push(Event::CancelPush(frame.push_id))
    }
    fn on_max_push_id_frame(&mut self, frame: MaxPushIdFrame) -> Result<bool> {
        self.push(Event::MaxPushId(frame.push_id))
    }
    fn on_goaway_frame(&mut self, frame: GoAwayFrame) -> Result<bool> {
        self.push(Event::GoAway(frame.id))
    }
    fn on_settings_frame_start(&mut self, header_length: u64) -> Result<bool> {
        self.push(Event::SettingsStart(header_length))
    }
    fn on_settings_frame(&mut self, frame: SettingsFrame) -> Result<bool> {
        self.push(Event::Settings(frame))
    }
    fn on_data_frame_start(&mut self, header_length: u64, payload_length: u64) -> Result<bool> {
        self.push(Event::DataStart(header_length, payload_length))
    }
    fn on_data_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        self.payload(payload, Event::DataPayload)
    }
    fn on_data_frame_end(&mut self) -> Result<bool> {
        self.push(Event::DataEnd)
    }
    fn on_headers_frame_start(&mut self, header_length: u64, payload_length: u64) -> Result<bool> {
        self.push(Event::HeadersStart(header_length, payload_length))
    }
    fn on_headers_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        self.payload(payload, Event::HeadersPayload)
    }
    fn on_headers_frame_end(&mut self) -> Result<bool> {
        self.push(Event::HeadersEnd)
    }
    fn on_push_promise_frame_start(&mut self, header_length: u64) -> Result<bool> {
        self.push(Event::PushPromiseStart(header_length))
    }
    fn on_push_promise_frame_push_id(
        &mut self,
        push_id: u64,
        push_id_length: u64,
        header_block_length: u64,
    ) -> Result<bool> {
        self.push(Event::PushPromisePushId(push_id, push_id_length, header_block_length))
    }
    fn on_push_promise_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        self.payload(payload, Event::PushPromisePayload)
    }
    fn on_push_promise_frame_end(&mut self) -> Result<bool> {
        self.push(Event::PushPromiseEnd)
    }
    fn on_priority_update_frame_start(&mut self, header_length: u64) -> Result<bool> {
        self.push(Event::PriorityUpdateStart(header_length))
    }
    fn on_priority_update_frame(&mut self, frame: PriorityUpdateFrame) -> Result<bool> {
        self.push(Event::PriorityUpdate(frame))
    }
    fn on_unknown_frame_start(
        &mut self,
        frame_type: u64,
        header_length: u64,
        payload_length: u64,
    ) -> Result<bool> {
        self.push(Event::UnknownStart(frame_type, header_length, payload_length))
    }
    fn on_unknown_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        self.payload(payload, Event::UnknownPayload)
    }
    fn on_unknown_frame_end(&mut self) -> Result<bool> {
        self.push(Event::UnknownEnd)
    }
}

#[derive(Debug, Clone)]
enum Frame {
    Data(Vec<u8>),
    Headers(Vec<u8>),
    CancelPush(u64),
    Settings(SettingsFrame),
    PushPromise(u64, Vec<u8>),
    GoAway(u64),
    MaxPushId(u64),
    PriorityUpdate(PriorityUpdateFrame),
    Unknown(u64, Vec<u8>),
}

fn varint_bytes(value: u64) -> Vec<u8> {
    let mut buf = vec![0u8; varint::encoded_len(value)];
    ByteWriter::new(&mut buf).write_var_int62(value).unwrap();
    buf
}

fn header_length(frame_type: u64, payload_length: u64) -> u64 {
    (varint::encoded_len(frame_type) + varint::encoded_len(payload_length)) as u64
}

/// Wire bytes and the events a decoder reports for `frame`.
fn encode(frame: &Frame) -> (Vec<u8>, Vec<Event>) {
    let mut wire = Vec::new();
    let mut events = Vec::new();

    let streamed =
        |wire: &mut Vec<u8>, events: &mut Vec<Event>, payload: &[u8], make: fn(Vec<u8>) -> Event| {
            wire.extend_from_slice(payload);
            if !payload.is_empty() {
                events.push(make(payload.to_vec()));
            }
        };

    match frame {
        Frame::Data(payload) => {
            let len = payload.len() as u64;
            wire.extend_from_slice(&HttpEncoder::serialize_data_frame_header(len).unwrap());
            events.push(Event::DataStart(header_length(0x00, len), len));
            streamed(&mut wire, &mut events, payload.as_slice(), Event::DataPayload);
            events.push(Event::DataEnd);
        }
        Frame::Headers(payload) => {
            let len = payload.len() as u64;
            wire.extend_from_slice(&HttpEncoder::serialize_headers_frame_header(len).unwrap());
            events.push(Event::HeadersStart(header_length(0x01, len), len));
            streamed(&mut wire, &mut events, payload.as_slice(), Event::HeadersPayload);
            events.push(Event::HeadersEnd);
        }
        Frame::CancelPush(push_id) => {
            let frame = CancelPushFrame { push_id: *push_id };
            wire.extend_from_slice(&HttpEncoder::serialize_cancel_push_frame(&frame).unwrap());
            events.push(Event::CancelPush(*push_id));
        }
        Frame::Settings(frame) => {
            let bytes = HttpEncoder::serialize_settings_frame(frame).unwrap();
            let len = (bytes.len() - 1 - varint::len_from_first_byte(bytes[1])) as u64;
            wire.extend_from_slice(&bytes);
            events.push(Event::SettingsStart(header_length(0x04, len)));
            events.push(Event::Settings(frame.clone()));
        }
        Frame::PushPromise(push_id, block) => {
            let id_len = varint::encoded_len(*push_id) as u64;
            let len = id_len + block.len() as u64;
            wire.extend_from_slice(
                &HttpEncoder::serialize_push_promise_frame_with_only_push_id(
                    *push_id,
                    block.len() as u64,
                )
                .unwrap(),
            );
            events.push(Event::PushPromiseStart(header_length(0x05, len)));
            events.push(Event::PushPromisePushId(*push_id, id_len, block.len() as u64));
            streamed(&mut wire, &mut events, block.as_slice(), Event::PushPromisePayload);
            events.push(Event::PushPromiseEnd);
        }
        Frame::GoAway(id) => {
            wire.extend_from_slice(&HttpEncoder::serialize_goaway_frame(&GoAwayFrame { id: *id }).unwrap());
            events.push(Event::GoAway(*id));
        }
        Frame::MaxPushId(push_id) => {
            let frame = MaxPushIdFrame { push_id: *push_id };
            wire.extend_from_slice(&HttpEncoder::serialize_max_push_id_frame(&frame).unwrap());
            events.push(Event::MaxPushId(*push_id));
        }
        Frame::PriorityUpdate(frame) => {
            let len = 1
                + varint::encoded_len(frame.prioritized_element_id) as u64
                + frame.priority_field_value.len() as u64;
            wire.extend_from_slice(&HttpEncoder::serialize_priority_update_frame(frame).unwrap());
            events.push(Event::PriorityUpdateStart(header_length(0x0F, len)));
            events.push(Event::PriorityUpdate(frame.clone()));
        }
        Frame::Unknown(frame_type, payload) => {
            let len = payload.len() as u64;
            wire.extend_from_slice(&varint_bytes(*frame_type));
            wire.extend_from_slice(&varint_bytes(len));
            events.push(Event::UnknownStart(*frame_type, header_length(*frame_type, len), len));
            streamed(&mut wire, &mut events, payload.as_slice(), Event::UnknownPayload);
            events.push(Event::UnknownEnd);
        }
    }

    (wire, events)
}

fn varint_value() -> impl Strategy<Value = u64> {
    prop_oneof![0u64..64, 64u64..16384, 16384u64..(1 << 30), (1u64 << 30)..=varint::MAX]
}

fn frame() -> impl Strategy<Value = Frame> {
    let payload = proptest::collection::vec(any::<u8>(), 0..300);
    let setting_id = varint_value().prop_filter("HTTP/2 setting", |id| !(0x02..=0x05).contains(id));
    let settings = proptest::collection::btree_map(setting_id, varint_value(), 0..8)
        .prop_map(|values| SettingsFrame { values });
    let priority_update = (any::<bool>(), varint_value(), "[a-z0-9=, ]{0,24}").prop_map(
        |(push, id, value)| {
            Frame::PriorityUpdate(PriorityUpdateFrame {
                prioritized_element_type: if push {
                    PrioritizedElementType::PushStream
                } else {
                    PrioritizedElementType::RequestStream
                },
                prioritized_element_id: id,
                priority_field_value: value,
            })
        },
    );
    // Reserved grease types: 0x1f * N + 0x21.
    let grease = (0u64..1_000_000).prop_map(|n| 0x1f * n + 0x21);

    prop_oneof![
        payload.clone().prop_map(Frame::Data),
        payload.clone().prop_map(Frame::Headers),
        varint_value().prop_map(Frame::CancelPush),
        settings.prop_map(Frame::Settings),
        (varint_value(), payload.clone()).prop_map(|(id, block)| Frame::PushPromise(id, block)),
        varint_value().prop_map(Frame::GoAway),
        varint_value().prop_map(Frame::MaxPushId),
        priority_update,
        (grease, payload).prop_map(|(t, p)| Frame::Unknown(t, p)),
    ]
}

fn encode_all(frames: &[Frame]) -> (Vec<u8>, Vec<Event>) {
    let mut wire = Vec::new();
    let mut events = Vec::new();
    for frame in frames {
        let (w, e) = encode(frame);
        wire.extend(w);
        events.extend(e);
    }
    (wire, events)
}

/// Feeds `data` split at the given cut points.
fn decode_in_pieces(data: &[u8], cuts: &[usize]) -> Vec<Event> {
    let mut decoder = HttpDecoder::new(Recorder::default());
    let mut cuts: Vec<usize> = cuts.iter().map(|&c| c % (data.len() + 1)).collect();
    cuts.sort_unstable();

    let mut start = 0;
    for cut in cuts.into_iter().chain(std::iter::once(data.len())) {
        assert_eq!(decoder.process_input(&data[start..cut]), cut - start);
        start = cut;
    }
    assert!(decoder.at_frame_boundary());
    decoder.into_visitor().events
}

/// Feeds `data` to a decoder whose visitor pauses after every callback,
/// resuming with the unconsumed suffix each time.
fn decode_with_pauses(data: &[u8]) -> Vec<Event> {
    let mut decoder = HttpDecoder::new(Recorder::pausing());
    let mut offset = 0;
    for _ in 0..100_000 {
        offset += decoder.process_input(&data[offset..]);
        if offset == data.len() && decoder.at_frame_boundary() {
            break;
        }
    }
    assert_eq!(offset, data.len());
    assert!(decoder.at_frame_boundary());
    decoder.into_visitor().events
}

proptest! {
    #[test]
    fn prop_decoding_is_fragmentation_independent(
        frames in proptest::collection::vec(frame(), 0..8),
        cuts in proptest::collection::vec(any::<usize>(), 0..16),
    ) {
        let (wire, expected) = encode_all(&frames);
        prop_assert_eq!(decode_in_pieces(&wire, &[]), expected.clone());
        prop_assert_eq!(decode_in_pieces(&wire, &cuts), expected);
    }

    #[test]
    fn prop_pause_and_resume_loses_nothing(frames in proptest::collection::vec(frame(), 0..8)) {
        let (wire, expected) = encode_all(&frames);
        prop_assert_eq!(decode_with_pauses(&wire), expected);
    }

    #[test]
    fn prop_arbitrary_input_never_panics(
        data in proptest::collection::vec(any::<u8>(), 0..512),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let mut decoder = HttpDecoder::new(Recorder::default());
        let mut cuts: Vec<usize> = cuts.iter().map(|&c| c % (data.len() + 1)).collect();
        cuts.sort_unstable();
        let mut start = 0;
        for cut in cuts.into_iter().chain(std::iter::once(data.len())) {
            decoder.process_input(&data[start..cut]);
            start = cut;
        }
        let errors = decoder
            .visitor()
            .events
            .iter()
            .filter(|e| matches!(e, Event::Error(_)))
            .count();
        prop_assert!(errors <= 1);
        prop_assert_eq!(errors == 1, decoder.error().is_some());
    }
}

#[test]
fn test_settings_then_more_input() {
    let mut decoder = HttpDecoder::new(Recorder::default());
    assert_eq!(decoder.process_input(&[0x04, 0x02, 0x01, 0x00]), 4);
    assert_eq!(
        decoder.visitor().events,
        vec![
            Event::SettingsStart(2),
            Event::Settings(SettingsFrame::from([(1, 0)])),
        ]
    );
}

#[test]
fn test_error_is_sticky() {
    init_test_logging();
    let mut decoder = HttpDecoder::new(Recorder::default());
    // GOAWAY longer than eight bytes.
    assert_eq!(decoder.process_input(&[0x07, 0x0A, 0x00]), 0);
    assert_eq!(decoder.error_detail(), "Frame is too large.");

    // A valid frame afterwards is ignored.
    assert_eq!(decoder.process_input(&[0x00, 0x00]), 0);
    assert_eq!(
        decoder.visitor().events,
        vec![Event::Error(ErrorCode::FrameTooLarge)]
    );
}

#[test]
fn test_error_after_earlier_frames() {
    let mut input = HttpEncoder::serialize_goaway_frame(&GoAwayFrame { id: 4 })
        .unwrap()
        .to_vec();
    input.extend_from_slice(&[0x06, 0x00]);

    let mut decoder = HttpDecoder::new(Recorder::default());
    assert_eq!(decoder.process_input(&input), 0);
    assert_eq!(
        decoder.visitor().events,
        vec![Event::GoAway(4), Event::Error(ErrorCode::ReceiveSpdyFrame)]
    );
    assert_eq!(
        decoder.error_detail(),
        "HTTP/2 frame received in a HTTP/3 connection: 6"
    );
}

// ============================================================================
// HEADERS payload into QPACK
// ============================================================================

#[derive(Default)]
struct Fields {
    lines: Vec<FieldLine>,
    completed: bool,
}

impl FieldSectionHandler for Fields {
    fn on_header_decoded(&mut self, name: &[u8], value: &[u8]) {
        self.lines.push(FieldLine::copy_from(name, value));
    }

    fn on_decoding_completed(&mut self) {
        self.completed = true;
    }

    fn on_decoding_error(&mut self, error: &h3wire_qpack::Error) {
        panic!("unexpected QPACK error: {error}");
    }
}

/// Routes HEADERS payload into a field section decoder.
struct RequestStream {
    fields: Option<FieldSectionDecoder<Fields>>,
    sections: Vec<Vec<FieldLine>>,
    body: Vec<u8>,
}

impl Visitor for RequestStream {
    fn on_error(&mut self, error: &Error) {
        panic!("unexpected HTTP/3 error: {error}");
    }

    fn on_headers_frame_start(&mut self, _: u64, _: u64) -> Result<bool> {
        self.fields = Some(FieldSectionDecoder::new(Fields::default()));
        Ok(true)
    }

    fn on_headers_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        if let Some(fields) = self.fields.as_mut() {
            fields.decode(payload);
        }
        Ok(true)
    }

    fn on_headers_frame_end(&mut self) -> Result<bool> {
        let mut fields = self
            .fields
            .take()
            .ok_or_else(|| Error::rejected("HEADERS end without start"))?;
        fields.end_field_section();
        let handler = fields.into_handler();
        assert!(handler.completed);
        self.sections.push(handler.lines);
        Ok(true)
    }

    fn on_data_frame_payload(&mut self, payload: &[u8]) -> Result<bool> {
        self.body.extend_from_slice(payload);
        Ok(true)
    }
}

#[test]
fn test_request_stream_pipeline() {
    init_test_logging();
    let request = [
        (b":method".as_slice(), b"POST".as_slice()),
        (b":path".as_slice(), b"/upload".as_slice()),
        (b"content-type".as_slice(), b"text/plain".as_slice()),
    ];
    let trailers = [(b"x-checksum".as_slice(), b"abc123".as_slice())];

    let mut wire = Vec::new();
    for (section, body) in [(&request[..], b"hello world".as_slice()), (&trailers[..], b"".as_slice())] {
        let mut block = Vec::new();
        FieldSectionEncoder::default().encode(section.iter().copied(), &mut block);
        wire.extend_from_slice(&HttpEncoder::serialize_headers_frame_header(block.len() as u64).unwrap());
        wire.extend_from_slice(&block);
        if !body.is_empty() {
            wire.extend_from_slice(&HttpEncoder::serialize_data_frame_header(body.len() as u64).unwrap());
            wire.extend_from_slice(body);
        }
    }

    let mut decoder = HttpDecoder::for_request_stream(RequestStream {
        fields: None,
        sections: Vec::new(),
        body: Vec::new(),
    });
    for byte in &wire {
        assert_eq!(decoder.process_input(std::slice::from_ref(byte)), 1);
    }

    let stream = decoder.into_visitor();
    assert_eq!(stream.body, b"hello world");
    assert_eq!(
        stream.sections,
        vec![
            vec![
                FieldLine::new(":method", "POST"),
                FieldLine::new(":path", "/upload"),
                FieldLine::new("content-type", "text/plain"),
            ],
            vec![FieldLine::new("x-checksum", "abc123")],
        ]
    );
}
