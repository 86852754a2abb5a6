//! Cursor-based writer into a caller-owned, fixed-capacity buffer.
//!
//! Writes fail closed: when the remaining capacity cannot hold the whole
//! value, nothing is written and the cursor does not move.

use crate::error::{Error, Result};
use crate::varint;
use crate::Endianness;

/// Writer over a borrowed mutable buffer.
///
/// # Example
///
/// ```
/// use h3wire_buf::{ByteReader, ByteWriter};
///
/// let mut buf = [0u8; 4];
/// let mut writer = ByteWriter::new(&mut buf);
/// writer.write_u16(0xabcd).unwrap();
/// writer.write_var_int62(37).unwrap();
/// assert_eq!(writer.length(), 3);
///
/// let mut reader = ByteReader::new(&buf[..3]);
/// assert_eq!(reader.read_u16().unwrap(), 0xabcd);
/// assert_eq!(reader.read_var_int62().unwrap(), 37);
/// ```
#[derive(Debug)]
pub struct ByteWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    endianness: Endianness,
}

impl<'a> ByteWriter<'a> {
    /// Creates a writer that encodes integers in network byte order.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self::with_endianness(buf, Endianness::Network)
    }

    /// Creates a writer with an explicit integer byte order.
    pub fn with_endianness(buf: &'a mut [u8], endianness: Endianness) -> Self {
        Self {
            buf,
            len: 0,
            endianness,
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Bytes written (or skipped) so far.
    #[inline]
    pub fn length(&self) -> usize {
        self.len
    }

    /// Total size of the underlying buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes still available for writing.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// The written portion of the buffer.
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Reserves `n` bytes at the cursor and returns them for filling.
    fn begin_write(&mut self, requested: usize) -> Result<&mut [u8]> {
        let remaining = self.remaining();
        if requested > remaining {
            return Err(Error::InsufficientCapacity {
                requested,
                remaining,
            });
        }
        let start = self.len;
        self.len += requested;
        Ok(&mut self.buf[start..start + requested])
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.begin_write(data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        if self.endianness.is_big() {
            self.write_bytes(&value.to_be_bytes())
        } else {
            self.write_bytes(&value.to_le_bytes())
        }
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        if self.endianness.is_big() {
            self.write_bytes(&value.to_be_bytes())
        } else {
            self.write_bytes(&value.to_le_bytes())
        }
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        if self.endianness.is_big() {
            self.write_bytes(&value.to_be_bytes())
        } else {
            self.write_bytes(&value.to_le_bytes())
        }
    }

    /// Writes the low `n` bytes of `value` in the writer's byte order.
    ///
    /// Fails if `n > 8` or if `value` does not fit in `n` bytes.
    pub fn write_bytes_to_uint(&mut self, n: usize, value: u64) -> Result<()> {
        if n > 8 {
            return Err(Error::InvalidWidth(n));
        }
        if n < 8 && value >> (8 * n) != 0 {
            return Err(Error::ValueTooWide { value, width: n });
        }
        let big = self.endianness.is_big();
        let out = self.begin_write(n)?;
        if big {
            out.copy_from_slice(&value.to_be_bytes()[8 - n..]);
        } else {
            out.copy_from_slice(&value.to_le_bytes()[..n]);
        }
        Ok(())
    }

    /// Writes a 16-bit length prefix followed by `data`.
    pub fn write_length_prefixed_str16(&mut self, data: &[u8]) -> Result<()> {
        let len = u16::try_from(data.len()).map_err(|_| Error::StringTooLong(data.len()))?;
        let requested = 2 + data.len();
        let remaining = self.remaining();
        if requested > remaining {
            return Err(Error::InsufficientCapacity {
                requested,
                remaining,
            });
        }
        self.write_u16(len)?;
        self.write_bytes(data)
    }

    /// Writes `count` copies of `byte`.
    pub fn write_repeated_byte(&mut self, byte: u8, count: usize) -> Result<()> {
        self.begin_write(count)?.fill(byte);
        Ok(())
    }

    /// Zero-fills the rest of the buffer.
    pub fn write_padding(&mut self) {
        let start = self.len;
        self.buf[start..].fill(0);
        self.len = self.buf.len();
    }

    /// Writes `count` zero bytes.
    pub fn write_padding_bytes(&mut self, count: usize) -> Result<()> {
        self.write_repeated_byte(0x00, count)
    }

    /// Advances the cursor by `n` bytes without writing, leaving room to
    /// patch a header in later.
    pub fn seek(&mut self, n: usize) -> Result<()> {
        self.begin_write(n).map(|_| ())
    }

    /// Writes a QUIC variable-length integer in its shortest encoding.
    pub fn write_var_int62(&mut self, value: u64) -> Result<()> {
        let len = varint::encoded_len(value);
        if len == 0 {
            return Err(Error::VarIntOutOfRange(value));
        }
        self.write_var_int62_with_forced_length(value, len)
    }

    /// Writes a varint using exactly `len` bytes (1, 2, 4 or 8).
    ///
    /// `len` must be at least the minimal encoding length of `value`.
    pub fn write_var_int62_with_forced_length(&mut self, value: u64, len: usize) -> Result<()> {
        let minimal = varint::encoded_len(value);
        if minimal == 0 {
            return Err(Error::VarIntOutOfRange(value));
        }
        if !varint::is_valid_len(len) || len < minimal {
            return Err(Error::InvalidWidth(len));
        }
        let out = self.begin_write(len)?;
        out.copy_from_slice(&value.to_be_bytes()[8 - len..]);
        out[0] |= (len.trailing_zeros() as u8) << 6;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_integers_network_order() {
        let mut buf = [0u8; 15];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u8(0x01).unwrap();
        writer.write_u16(0x0203).unwrap();
        writer.write_u32(0x0405_0607).unwrap();
        writer.write_u64(0x0809_0a0b_0c0d_0e0f).unwrap();
        assert_eq!(writer.remaining(), 0);
        assert_eq!(
            buf,
            [
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
                0x0f
            ]
        );
    }

    #[test]
    fn test_write_fails_closed() {
        let mut buf = [0xeeu8; 3];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_u8(0x11).unwrap();
        assert_eq!(
            writer.write_u32(1),
            Err(Error::InsufficientCapacity {
                requested: 4,
                remaining: 2
            })
        );
        assert_eq!(writer.length(), 1);
        assert_eq!(buf, [0x11, 0xee, 0xee]);
    }

    #[test]
    fn test_write_bytes_to_uint() {
        let mut buf = [0u8; 6];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_bytes_to_uint(3, 0x0a0b0c).unwrap();
        assert_eq!(
            writer.write_bytes_to_uint(2, 0x10000),
            Err(Error::ValueTooWide {
                value: 0x10000,
                width: 2
            })
        );
        assert_eq!(writer.write_bytes_to_uint(9, 0), Err(Error::InvalidWidth(9)));
        writer.write_bytes_to_uint(3, 0xffffff).unwrap();
        assert_eq!(buf, [0x0a, 0x0b, 0x0c, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_write_bytes_to_uint_host_order() {
        let mut buf = [0u8; 2];
        let mut writer = ByteWriter::with_endianness(&mut buf, Endianness::Host);
        writer.write_bytes_to_uint(2, 0x0102).unwrap();
        assert_eq!(buf, 0x0102u16.to_ne_bytes());
    }

    #[test]
    fn test_length_prefixed_str16() {
        let mut buf = [0u8; 5];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_length_prefixed_str16(b"abc").unwrap();
        assert_eq!(buf, [0x00, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn test_length_prefixed_str16_no_partial_write() {
        let mut buf = [0u8; 4];
        let mut writer = ByteWriter::new(&mut buf);
        assert!(writer.write_length_prefixed_str16(b"abc").is_err());
        assert_eq!(writer.length(), 0);
    }

    #[test]
    fn test_length_prefixed_str16_too_long() {
        let mut buf = vec![0u8; 70_000];
        let mut writer = ByteWriter::new(&mut buf);
        let data = vec![b'x'; 65_536];
        assert_eq!(
            writer.write_length_prefixed_str16(&data),
            Err(Error::StringTooLong(65_536))
        );
        assert_eq!(writer.length(), 0);
    }

    #[test]
    fn test_repeated_byte_and_padding() {
        let mut buf = [0xffu8; 6];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_repeated_byte(0xaa, 2).unwrap();
        assert!(writer.write_repeated_byte(0xbb, 5).is_err());
        writer.write_padding();
        assert_eq!(writer.remaining(), 0);
        assert_eq!(buf, [0xaa, 0xaa, 0, 0, 0, 0]);
    }

    #[test]
    fn test_seek() {
        let mut buf = [0u8; 4];
        let mut writer = ByteWriter::new(&mut buf);
        writer.seek(2).unwrap();
        writer.write_u8(0x7f).unwrap();
        assert_eq!(writer.length(), 3);
        assert!(writer.seek(2).is_err());
        assert_eq!(writer.length(), 3);
        assert_eq!(buf, [0, 0, 0x7f, 0]);
    }

    #[test]
    fn test_var_int62_layouts() {
        let cases: &[(u64, &[u8])] = &[
            (151_288_809_941_952_652, &[0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]),
            (494_878_333, &[0x9d, 0x7f, 0x3e, 0x7d]),
            (15_293, &[0x7b, 0xbd]),
            (37, &[0x25]),
        ];
        for (value, expected) in cases {
            let mut buf = [0u8; 8];
            let mut writer = ByteWriter::new(&mut buf);
            writer.write_var_int62(*value).unwrap();
            assert_eq!(writer.data(), *expected);
        }
    }

    #[test]
    fn test_var_int62_forced_length() {
        let mut buf = [0u8; 2];
        let mut writer = ByteWriter::new(&mut buf);
        writer.write_var_int62_with_forced_length(37, 2).unwrap();
        assert_eq!(buf, [0x40, 0x25]);

        let mut buf = [0u8; 8];
        let mut writer = ByteWriter::new(&mut buf);
        assert_eq!(
            writer.write_var_int62_with_forced_length(16_384, 2),
            Err(Error::InvalidWidth(2))
        );
        assert_eq!(
            writer.write_var_int62_with_forced_length(1, 3),
            Err(Error::InvalidWidth(3))
        );
        assert_eq!(writer.length(), 0);
    }

    #[test]
    fn test_var_int62_out_of_range() {
        let mut buf = [0u8; 8];
        let mut writer = ByteWriter::new(&mut buf);
        assert_eq!(
            writer.write_var_int62(varint::MAX + 1),
            Err(Error::VarIntOutOfRange(varint::MAX + 1))
        );
    }
}
