//! HTTP/3 frame types and the payloads of buffered frames (RFC 9114
//! Section 7.2, RFC 9218 Section 7).

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Data,
    Headers,
    CancelPush,
    Settings,
    PushPromise,
    GoAway,
    MaxPushId,
    PriorityUpdate,
    /// Any other type, including reserved grease types. Skipped by the
    /// decoder unless reserved for HTTP/2.
    Unknown(u64),
}

impl FrameType {
    pub const DATA: u64 = 0x00;
    pub const HEADERS: u64 = 0x01;
    pub const CANCEL_PUSH: u64 = 0x03;
    pub const SETTINGS: u64 = 0x04;
    pub const PUSH_PROMISE: u64 = 0x05;
    pub const GOAWAY: u64 = 0x07;
    pub const MAX_PUSH_ID: u64 = 0x0D;
    pub const PRIORITY_UPDATE: u64 = 0x0F;

    pub fn value(self) -> u64 {
        match self {
            FrameType::Data => Self::DATA,
            FrameType::Headers => Self::HEADERS,
            FrameType::CancelPush => Self::CANCEL_PUSH,
            FrameType::Settings => Self::SETTINGS,
            FrameType::PushPromise => Self::PUSH_PROMISE,
            FrameType::GoAway => Self::GOAWAY,
            FrameType::MaxPushId => Self::MAX_PUSH_ID,
            FrameType::PriorityUpdate => Self::PRIORITY_UPDATE,
            FrameType::Unknown(v) => v,
        }
    }

    /// Frame types that exist only in HTTP/2: PRIORITY, PING, WINDOW_UPDATE
    /// and CONTINUATION (RFC 9114 Section 7.2.8).
    pub fn is_http2_only(value: u64) -> bool {
        matches!(value, 0x02 | 0x06 | 0x08 | 0x09)
    }

    /// Reserved types of the form `0x1f * N + 0x21`, sent to exercise the
    /// requirement that unknown types are ignored.
    pub fn is_grease(value: u64) -> bool {
        value >= 0x21 && (value - 0x21) % 0x1f == 0
    }
}

impl From<u64> for FrameType {
    fn from(v: u64) -> Self {
        match v {
            FrameType::DATA => FrameType::Data,
            FrameType::HEADERS => FrameType::Headers,
            FrameType::CANCEL_PUSH => FrameType::CancelPush,
            FrameType::SETTINGS => FrameType::Settings,
            FrameType::PUSH_PROMISE => FrameType::PushPromise,
            FrameType::GOAWAY => FrameType::GoAway,
            FrameType::MAX_PUSH_ID => FrameType::MaxPushId,
            FrameType::PRIORITY_UPDATE => FrameType::PriorityUpdate,
            other => FrameType::Unknown(other),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Data => f.write_str("DATA"),
            FrameType::Headers => f.write_str("HEADERS"),
            FrameType::CancelPush => f.write_str("CANCEL_PUSH"),
            FrameType::Settings => f.write_str("SETTINGS"),
            FrameType::PushPromise => f.write_str("PUSH_PROMISE"),
            FrameType::GoAway => f.write_str("GOAWAY"),
            FrameType::MaxPushId => f.write_str("MAX_PUSH_ID"),
            FrameType::PriorityUpdate => f.write_str("PRIORITY_UPDATE"),
            FrameType::Unknown(v) => write!(f, "UNKNOWN({v:#x})"),
        }
    }
}

/// Setting identifiers (RFC 9114 Section 7.2.4.1, RFC 9204 Section 5,
/// RFC 9220 Section 3, RFC 9297 Section 2.1.1).
pub mod settings {
    pub const QPACK_MAX_TABLE_CAPACITY: u64 = 0x01;
    pub const MAX_FIELD_SECTION_SIZE: u64 = 0x06;
    pub const QPACK_BLOCKED_STREAMS: u64 = 0x07;
    pub const ENABLE_CONNECT_PROTOCOL: u64 = 0x08;
    pub const H3_DATAGRAM: u64 = 0x33;

    /// HTTP/2 settings with no HTTP/3 counterpart: ENABLE_PUSH,
    /// MAX_CONCURRENT_STREAMS, INITIAL_WINDOW_SIZE and MAX_FRAME_SIZE.
    pub fn is_http2_only(id: u64) -> bool {
        matches!(id, 0x02..=0x05)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelPushFrame {
    pub push_id: u64,
}

/// SETTINGS payload. Identifiers are unique; the decoder rejects repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsFrame {
    pub values: BTreeMap<u64, u64>,
}

impl SettingsFrame {
    pub fn get(&self, id: u64) -> Option<u64> {
        self.values.get(&id).copied()
    }
}

impl<const N: usize> From<[(u64, u64); N]> for SettingsFrame {
    fn from(pairs: [(u64, u64); N]) -> Self {
        Self {
            values: pairs.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoAwayFrame {
    /// A stream id when sent by a server, a push id when sent by a client.
    pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPushIdFrame {
    pub push_id: u64,
}

/// What a PRIORITY_UPDATE frame refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrioritizedElementType {
    RequestStream = 0x00,
    PushStream = 0x80,
}

impl PrioritizedElementType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x00 => Some(Self::RequestStream),
            0x80 => Some(Self::PushStream),
            _ => None,
        }
    }
}

/// PRIORITY_UPDATE payload as carried on the control stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityUpdateFrame {
    pub prioritized_element_type: PrioritizedElementType,
    pub prioritized_element_id: u64,
    /// Priority Field Value, an ASCII structured field dictionary.
    pub priority_field_value: String,
}
