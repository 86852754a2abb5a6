use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an HTTP/3 decoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A frame exceeds the maximum length for its type.
    FrameTooLarge,
    /// A frame payload is malformed.
    FrameError,
    /// A frame type reserved for HTTP/2 was received.
    ReceiveSpdyFrame,
    /// A setting reserved for HTTP/2 was received.
    ReceiveSpdySetting,
    /// A SETTINGS frame repeats an identifier.
    DuplicateSettingIdentifier,
    /// A frame is not permitted on this stream or at this point.
    FrameUnexpected,
    /// The first frame on a control stream is not SETTINGS.
    MissingSettings,
    /// The visitor rejected a frame.
    Rejected,
}

impl ErrorCode {
    /// HTTP/3 application error code (RFC 9114 Section 8.1) that a
    /// connection closed for this error carries.
    pub fn wire_code(self) -> u64 {
        match self {
            ErrorCode::FrameTooLarge => 0x0107,     // H3_EXCESSIVE_LOAD
            ErrorCode::FrameError => 0x0106,        // H3_FRAME_ERROR
            ErrorCode::ReceiveSpdyFrame => 0x0105,  // H3_FRAME_UNEXPECTED
            ErrorCode::FrameUnexpected => 0x0105,   // H3_FRAME_UNEXPECTED
            ErrorCode::ReceiveSpdySetting => 0x0109, // H3_SETTINGS_ERROR
            ErrorCode::DuplicateSettingIdentifier => 0x0109,
            ErrorCode::MissingSettings => 0x010a,   // H3_MISSING_SETTINGS
            ErrorCode::Rejected => 0x0101,          // H3_GENERAL_PROTOCOL_ERROR
        }
    }
}

/// An HTTP/3 decoding error with its diagnostic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{detail}")]
pub struct Error {
    pub code: ErrorCode,
    pub detail: String,
}

impl Error {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    /// Error for a visitor that refuses a frame.
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::Rejected, detail)
    }

    pub fn wire_code(&self) -> u64 {
        self.code.wire_code()
    }
}
