//! Variable-length integer encoding per RFC 9000 Section 16.
//!
//! The two most significant bits of the first byte carry the base-2
//! logarithm of the encoded length (1, 2, 4 or 8 bytes); the remaining bits
//! hold the value in network byte order.
//!
//! ```text
//! 2MSB  Length  Usable Bits  Range
//! 00    1       6            0-63
//! 01    2       14           0-16383
//! 10    4       30           0-1073741823
//! 11    8       62           0-4611686018427387903
//! ```

/// Maximum value that can be encoded (2^62 - 1).
pub const MAX: u64 = (1u64 << 62) - 1;

/// Largest encoded length of a varint.
pub const MAX_LEN: usize = 8;

/// Returns the number of bytes needed to encode `value`, or 0 if the value
/// exceeds [`MAX`].
pub fn encoded_len(value: u64) -> usize {
    if value < 64 {
        1
    } else if value < 16384 {
        2
    } else if value < 1073741824 {
        4
    } else if value <= MAX {
        8
    } else {
        0
    }
}

/// Returns the total encoded length announced by the first byte of a varint.
#[inline]
pub fn len_from_first_byte(first: u8) -> usize {
    1 << (first >> 6)
}

/// Returns true if `len` is a legal varint encoding length.
#[inline]
pub fn is_valid_len(len: usize) -> bool {
    matches!(len, 1 | 2 | 4 | 8)
}
