//! QPACK decoding and encoding limits.

use serde::{Deserialize, Serialize};

/// Default cap on a single string literal (1 MiB).
pub const DEFAULT_MAX_STRING_LITERAL_LENGTH: usize = 1024 * 1024;

/// Configuration shared by the QPACK instruction decoder and encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QpackConfig {
    /// Largest string literal length the decoder accepts (default: 1 MiB).
    ///
    /// The length is checked before any of the literal is buffered, so a
    /// peer cannot make the decoder allocate more than this per string.
    pub max_string_literal_length: usize,

    /// Huffman-encode string literals when it makes them shorter
    /// (default: true).
    pub huffman_encoding: bool,
}

impl Default for QpackConfig {
    fn default() -> Self {
        Self {
            max_string_literal_length: DEFAULT_MAX_STRING_LITERAL_LENGTH,
            huffman_encoding: true,
        }
    }
}

impl QpackConfig {
    /// Configuration for peers that must stay within a small memory budget.
    pub fn low_memory() -> Self {
        Self {
            max_string_literal_length: 16 * 1024,
            ..Default::default()
        }
    }

    /// Validate configuration values are within reasonable bounds.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_string_literal_length == 0 {
            return Err("max_string_literal_length must be non-zero".into());
        }
        if self.max_string_literal_length > 64 * 1024 * 1024 {
            return Err("max_string_literal_length too large (max 64 MB)".into());
        }
        Ok(())
    }
}
