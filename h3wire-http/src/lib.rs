//! Incremental HTTP/3 framing (RFC 9114).
//!
//! This crate parses and serializes the frame layer of HTTP/3 streams.
//! It does no I/O: the caller feeds each stream's bytes to an
//! [`HttpDecoder`] as they arrive and receives frames through a
//! [`Visitor`]. Field sections carried in HEADERS and PUSH_PROMISE frames
//! are passed through as raw bytes for a QPACK decoder.
//!
//! # Example
//!
//! ```rust
//! use h3wire_http::{Error, HttpDecoder, HttpEncoder, Result, SettingsFrame, Visitor};
//!
//! #[derive(Default)]
//! struct Settings(Option<SettingsFrame>);
//!
//! impl Visitor for Settings {
//!     fn on_error(&mut self, _error: &Error) {}
//!
//!     fn on_settings_frame(&mut self, frame: SettingsFrame) -> Result<bool> {
//!         self.0 = Some(frame);
//!         Ok(true)
//!     }
//! }
//!
//! let bytes = HttpEncoder::serialize_settings_frame(&SettingsFrame::from([(0x06, 16384)])).unwrap();
//! let mut decoder = HttpDecoder::for_control_stream(Settings::default());
//! assert_eq!(decoder.process_input(&bytes), bytes.len());
//! assert_eq!(decoder.visitor().0.as_ref().and_then(|f| f.get(0x06)), Some(16384));
//! ```

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod priority;

// Re-export main types
pub use config::HttpDecoderConfig;
pub use decoder::{HttpDecoder, StreamKind, Visitor};
pub use encoder::HttpEncoder;
pub use error::{Error, ErrorCode, Result};
pub use frame::{
    CancelPushFrame, FrameType, GoAwayFrame, MaxPushIdFrame, PrioritizedElementType,
    PriorityUpdateFrame, SettingsFrame,
};
