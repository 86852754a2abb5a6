//! HPACK/QPACK prefix integers (RFC 7541 Section 5.1).
//!
//! The first byte carries `N` low bits of the value next to `8 - N` flag
//! bits owned by the instruction. Values below `2^N - 1` fit there. Larger
//! values fill the prefix with ones and continue in little-endian groups of
//! seven bits, the high bit of each byte marking that another follows.
//!
//! [`VarintDecoder`] decodes incrementally and accepts at most ten
//! continuation bytes, which is enough for any `u64`.

use bytes::BufMut;

/// Bit offset of the tenth continuation byte.
const MAX_OFFSET: u32 = 63;

/// Appends `value` as an integer with a `prefix_bits`-bit prefix (1..=8)
/// to `buf`, OR-ing the first byte with the instruction bits in
/// `prefix_mask`. Returns the number of bytes written.
///
/// ```
/// use h3wire_qpack::integer::encode;
///
/// let mut buf = Vec::new();
/// assert_eq!(encode(10, 5, 0b001_00000, &mut buf), 1);
/// assert_eq!(buf, [0b001_01010]);
/// ```
pub fn encode<B: BufMut>(value: u64, prefix_bits: u8, prefix_mask: u8, buf: &mut B) -> usize {
    debug_assert!((1..=8).contains(&prefix_bits), "prefix_bits must be 1-8");

    let max_prefix = max_prefix(prefix_bits);

    if value < u64::from(max_prefix) {
        buf.put_u8(prefix_mask | value as u8);
        return 1;
    }

    buf.put_u8(prefix_mask | max_prefix);
    let mut remaining = value - u64::from(max_prefix);
    let mut written = 1;

    while remaining >= 128 {
        buf.put_u8(((remaining & 0x7F) | 0x80) as u8);
        remaining >>= 7;
        written += 1;
    }

    buf.put_u8(remaining as u8);
    written + 1
}

/// Largest value the N-bit prefix can hold on its own.
#[inline]
fn max_prefix(prefix_bits: u8) -> u8 {
    // Avoid shift overflow when prefix_bits == 8
    (0xFFu16 >> (8 - prefix_bits.clamp(1, 8))) as u8
}

/// Outcome of one [`VarintDecoder`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// The integer is complete; read it with [`VarintDecoder::value`].
    Done,
    /// All input was consumed and more continuation bytes are needed.
    InProgress,
    /// The encoding is longer than ten continuation bytes or overflows `u64`.
    Error,
}

/// Incremental prefix integer decoder.
///
/// Decoding begins with [`start`](Self::start) on the byte holding the
/// prefix and continues with [`resume`](Self::resume) for every later
/// fragment until it reports [`DecodeStatus::Done`].
#[derive(Debug, Clone, Default)]
pub struct VarintDecoder {
    value: u64,
    offset: u32,
}

impl VarintDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts decoding an integer whose prefix occupies the low
    /// `prefix_bits` bits of `prefix_byte`. `data` holds the bytes that
    /// follow the prefix byte.
    ///
    /// Returns the status and the number of bytes consumed from `data`.
    pub fn start(&mut self, prefix_byte: u8, prefix_bits: u8, data: &[u8]) -> (DecodeStatus, usize) {
        debug_assert!((1..=8).contains(&prefix_bits), "prefix_bits must be 1-8");

        let max_prefix = max_prefix(prefix_bits);
        self.value = u64::from(prefix_byte & max_prefix);
        self.offset = 0;

        if self.value < u64::from(max_prefix) {
            return (DecodeStatus::Done, 0);
        }

        self.resume(data)
    }

    /// Continues a decode that previously returned
    /// [`DecodeStatus::InProgress`].
    pub fn resume(&mut self, data: &[u8]) -> (DecodeStatus, usize) {
        for (i, &byte) in data.iter().enumerate() {
            let consumed = i + 1;
            let summand = u64::from(byte & 0x7F);

            if self.offset == MAX_OFFSET {
                // Only a single value bit fits in the tenth byte.
                if byte & 0x80 != 0 || summand > 1 {
                    return (DecodeStatus::Error, consumed);
                }
                return match self.value.checked_add(summand << MAX_OFFSET) {
                    Some(value) => {
                        self.value = value;
                        (DecodeStatus::Done, consumed)
                    }
                    None => (DecodeStatus::Error, consumed),
                };
            }

            // Cannot overflow: at most 255 + (2^63 - 1) after nine bytes.
            self.value += summand << self.offset;
            if byte & 0x80 == 0 {
                return (DecodeStatus::Done, consumed);
            }
            self.offset += 7;
        }

        (DecodeStatus::InProgress, data.len())
    }

    /// The decoded value. Only meaningful after [`DecodeStatus::Done`].
    pub fn value(&self) -> u64 {
        self.value
    }
}
