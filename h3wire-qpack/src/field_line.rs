//! Decoded field lines.

use bytes::Bytes;
use std::fmt;

/// An HTTP field line (name-value pair) as produced by
/// [`decode_field_section`](crate::field_section::decode_field_section).
#[derive(Clone, PartialEq, Eq)]
pub struct FieldLine {
    pub name: Bytes,
    pub value: Bytes,
}

impl FieldLine {
    /// Creates a new field line.
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Copies a borrowed name and value out of a decoder callback.
    pub fn copy_from(name: &[u8], value: &[u8]) -> Self {
        Self {
            name: Bytes::copy_from_slice(name),
            value: Bytes::copy_from_slice(value),
        }
    }

    /// True for pseudo-header fields such as `:method`.
    pub fn is_pseudo(&self) -> bool {
        self.name.first() == Some(&b':')
    }
}

impl fmt::Debug for FieldLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FieldLine({:?}: {:?})",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value)
        )
    }
}

impl From<(&'static str, &'static str)> for FieldLine {
    fn from((name, value): (&'static str, &'static str)) -> Self {
        Self::new(name, value)
    }
}
