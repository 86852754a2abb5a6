//! HTTP/3 frame decoder limits.
//!
//! Frames that are buffered in full before parsing (SETTINGS and
//! PRIORITY_UPDATE) are bounded here. CANCEL_PUSH, GOAWAY and MAX_PUSH_ID
//! carry a single varint and are always limited to eight bytes; streamed
//! frames are never buffered and have no limit.

use serde::{Deserialize, Serialize};

/// Configuration for [`HttpDecoder`](crate::HttpDecoder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpDecoderConfig {
    /// Maximum SETTINGS payload length (default: 1 MB).
    ///
    /// RFC 9114 Section 7.2.4: the payload is a list of settings the peer
    /// has no reason to make long.
    pub max_settings_frame_length: u64,

    /// Maximum PRIORITY_UPDATE payload length (default: 1 MB).
    ///
    /// RFC 9218 Section 7: the payload ends in a Priority Field Value.
    pub max_priority_update_frame_length: u64,
}

impl Default for HttpDecoderConfig {
    fn default() -> Self {
        Self {
            max_settings_frame_length: 1024 * 1024,        // 1 MB
            max_priority_update_frame_length: 1024 * 1024, // 1 MB
        }
    }
}

impl HttpDecoderConfig {
    /// Create a configuration for memory-constrained environments.
    ///
    /// Suitable for servers handling very many connections.
    pub fn low_memory() -> Self {
        Self {
            max_settings_frame_length: 4096,
            max_priority_update_frame_length: 1024,
        }
    }

    /// Validate configuration values are within reasonable bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_settings_frame_length == 0 {
            return Err("max_settings_frame_length must be non-zero".into());
        }
        if self.max_settings_frame_length > 16 * 1024 * 1024 {
            return Err("max_settings_frame_length too large (max 16 MB)".into());
        }
        // Element type plus a one-byte element id.
        if self.max_priority_update_frame_length < 2 {
            return Err("max_priority_update_frame_length must be at least 2".into());
        }
        if self.max_priority_update_frame_length > 16 * 1024 * 1024 {
            return Err("max_priority_update_frame_length too large (max 16 MB)".into());
        }
        Ok(())
    }
}
