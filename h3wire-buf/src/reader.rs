//! Zero-copy cursor over an immutable byte buffer.
//!
//! Every read is all-or-nothing: if the buffer does not hold enough bytes
//! the read fails with [`Error::InsufficientData`] and the cursor stays
//! where it was. Slices handed out borrow from the input with lifetime `'a`
//! and are never copied.

use crate::error::{Error, Result};
use crate::varint;
use crate::Endianness;

/// Cursor-based reader over a borrowed buffer.
///
/// # Example
///
/// ```
/// use h3wire_buf::ByteReader;
///
/// let mut reader = ByteReader::new(&[0x00, 0x05]);
/// assert_eq!(reader.read_u16().unwrap(), 5);
/// assert_eq!(reader.bytes_remaining(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    endianness: Endianness,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader that decodes integers in network byte order.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endianness(data, Endianness::Network)
    }

    /// Creates a reader with an explicit integer byte order.
    pub fn with_endianness(data: &'a [u8], endianness: Endianness) -> Self {
        Self {
            data,
            pos: 0,
            endianness,
        }
    }

    /// Byte order used for fixed-width integers.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    #[inline]
    pub fn bytes_remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true once every byte has been consumed.
    #[inline]
    pub fn is_done_reading(&self) -> bool {
        self.pos == self.data.len()
    }

    /// The unread portion of the buffer. Does not advance the cursor.
    pub fn remaining_payload(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// The already consumed portion of the buffer.
    pub fn previously_read(&self) -> &'a [u8] {
        &self.data[..self.pos]
    }

    /// Returns the next byte without consuming it, or `None` when empty.
    #[inline]
    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    #[inline]
    fn ensure(&self, requested: usize) -> Result<()> {
        let remaining = self.bytes_remaining();
        if requested > remaining {
            return Err(Error::InsufficientData {
                requested,
                remaining,
            });
        }
        Ok(())
    }

    /// Reads `n` bytes as a slice borrowed from the input.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Fills `dest` with the next `dest.len()` bytes.
    pub fn copy_bytes(&mut self, dest: &mut [u8]) -> Result<()> {
        let bytes = self.read_bytes(dest.len())?;
        dest.copy_from_slice(bytes);
        Ok(())
    }

    /// Advances the cursor by `n` bytes without looking at them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Consumes and returns everything left in the buffer.
    pub fn read_remaining_payload(&mut self) -> &'a [u8] {
        let rest = self.remaining_payload();
        self.pos = self.data.len();
        rest
    }

    /// Shrinks the readable region to the next `n` bytes.
    ///
    /// Fails without effect if fewer than `n` bytes remain.
    pub fn truncate(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.data = &self.data[..self.pos + n];
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        self.copy_bytes(&mut out)?;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_array::<2>()?;
        Ok(if self.endianness.is_big() {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_array::<4>()?;
        Ok(if self.endianness.is_big() {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_array::<8>()?;
        Ok(if self.endianness.is_big() {
            u64::from_be_bytes(bytes)
        } else {
            u64::from_le_bytes(bytes)
        })
    }

    /// Reads `n` (at most 8) bytes and zero-extends them to a `u64` in the
    /// reader's byte order.
    pub fn read_bytes_to_uint(&mut self, n: usize) -> Result<u64> {
        if n > 8 {
            return Err(Error::InvalidWidth(n));
        }
        let bytes = self.read_bytes(n)?;
        let fold = |acc: u64, &b: &u8| (acc << 8) | u64::from(b);
        Ok(if self.endianness.is_big() {
            bytes.iter().fold(0, fold)
        } else {
            bytes.iter().rev().fold(0, fold)
        })
    }

    /// Reads a 16-bit length followed by that many bytes.
    ///
    /// The length prefix is not consumed if the body is incomplete.
    pub fn read_length_prefixed_str16(&mut self) -> Result<&'a [u8]> {
        let mut probe = self.clone();
        let len = probe.read_u16()?;
        let body = probe.read_bytes(usize::from(len))?;
        *self = probe;
        Ok(body)
    }

    /// Returns the encoded length of the varint at the cursor, or 0 if the
    /// buffer is empty.
    pub fn peek_var_int62_length(&self) -> usize {
        self.peek_byte().map_or(0, varint::len_from_first_byte)
    }

    /// Reads a QUIC variable-length integer (always network byte order).
    pub fn read_var_int62(&mut self) -> Result<u64> {
        let len = self.peek_var_int62_length();
        if len == 0 {
            return Err(Error::InsufficientData {
                requested: 1,
                remaining: 0,
            });
        }
        let bytes = self.read_bytes(len)?;
        let value = bytes[1..]
            .iter()
            .fold(u64::from(bytes[0] & 0x3f), |acc, &b| (acc << 8) | u64::from(b));
        Ok(value)
    }

    /// Reads a varint length followed by that many bytes.
    pub fn read_length_prefixed_str_var_int62(&mut self) -> Result<&'a [u8]> {
        let mut probe = self.clone();
        let len = probe.read_var_int62()?;
        let len = usize::try_from(len).map_err(|_| Error::InsufficientData {
            requested: usize::MAX,
            remaining: probe.bytes_remaining(),
        })?;
        let body = probe.read_bytes(len)?;
        *self = probe;
        Ok(body)
    }
}
