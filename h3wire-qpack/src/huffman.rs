//! Huffman coding for QPACK string literals.
//!
//! Implements the static Huffman code defined in RFC 7541 Appendix B, which
//! QPACK reuses without modification (RFC 9204 Section 4.1.2).
//!
//! Decoding is incremental. [`HuffmanDecoder`] keeps undecoded bits in a
//! 64-bit [`HuffmanBitBuffer`] between calls, so an encoded string may be
//! fed in arbitrary fragments. Symbols are matched against the canonical
//! form of the code: the code is canonical, so the length of the next
//! symbol follows from comparing the 32 high-order buffered bits against the
//! first code of each length, with no tree walk.

use crate::error::{Error, Result};
use std::sync::OnceLock;

/// Huffman code entry: (code, code_length_in_bits)
#[derive(Clone, Copy)]
struct HuffmanEntry {
    code: u32,
    len: u8,
}

/// Symbol value of the end-of-string marker.
const EOS: u16 = 256;

// Huffman encoding table (RFC 7541 Appendix B)
// Each entry is (code, bit_length) for symbols 0-255, plus EOS (256)
static ENCODE_TABLE: [HuffmanEntry; 257] = [
    HuffmanEntry { code: 0x1ff8, len: 13 },     // 0
    HuffmanEntry { code: 0x7fffd8, len: 23 },   // 1
    HuffmanEntry { code: 0xfffffe2, len: 28 },  // 2
    HuffmanEntry { code: 0xfffffe3, len: 28 },  // 3
    HuffmanEntry { code: 0xfffffe4, len: 28 },  // 4
    HuffmanEntry { code: 0xfffffe5, len: 28 },  // 5
    HuffmanEntry { code: 0xfffffe6, len: 28 },  // 6
    HuffmanEntry { code: 0xfffffe7, len: 28 },  // 7
    HuffmanEntry { code: 0xfffffe8, len: 28 },  // 8
    HuffmanEntry { code: 0xffffea, len: 24 },   // 9
    HuffmanEntry { code: 0x3ffffffc, len: 30 }, // 10
    HuffmanEntry { code: 0xfffffe9, len: 28 },  // 11
    HuffmanEntry { code: 0xfffffea, len: 28 },  // 12
    HuffmanEntry { code: 0x3ffffffd, len: 30 }, // 13
    HuffmanEntry { code: 0xfffffeb, len: 28 },  // 14
    HuffmanEntry { code: 0xfffffec, len: 28 },  // 15
    HuffmanEntry { code: 0xfffffed, len: 28 },  // 16
    HuffmanEntry { code: 0xfffffee, len: 28 },  // 17
    HuffmanEntry { code: 0xfffffef, len: 28 },  // 18
    HuffmanEntry { code: 0xffffff0, len: 28 },  // 19
    HuffmanEntry { code: 0xffffff1, len: 28 },  // 20
    HuffmanEntry { code: 0xffffff2, len: 28 },  // 21
    HuffmanEntry { code: 0x3ffffffe, len: 30 }, // 22
    HuffmanEntry { code: 0xffffff3, len: 28 },  // 23
    HuffmanEntry { code: 0xffffff4, len: 28 },  // 24
    HuffmanEntry { code: 0xffffff5, len: 28 },  // 25
    HuffmanEntry { code: 0xffffff6, len: 28 },  // 26
    HuffmanEntry { code: 0xffffff7, len: 28 },  // 27
    HuffmanEntry { code: 0xffffff8, len: 28 },  // 28
    HuffmanEntry { code: 0xffffff9, len: 28 },  // 29
    HuffmanEntry { code: 0xffffffa, len: 28 },  // 30
    HuffmanEntry { code: 0xffffffb, len: 28 },  // 31
    HuffmanEntry { code: 0x14, len: 6 },        // 32
    HuffmanEntry { code: 0x3f8, len: 10 },      // 33
    HuffmanEntry { code: 0x3f9, len: 10 },      // 34
    HuffmanEntry { code: 0xffa, len: 12 },      // 35
    HuffmanEntry { code: 0x1ff9, len: 13 },     // 36
    HuffmanEntry { code: 0x15, len: 6 },        // 37
    HuffmanEntry { code: 0xf8, len: 8 },        // 38
    HuffmanEntry { code: 0x7fa, len: 11 },      // 39
    HuffmanEntry { code: 0x3fa, len: 10 },      // 40
    HuffmanEntry { code: 0x3fb, len: 10 },      // 41
    HuffmanEntry { code: 0xf9, len: 8 },        // 42
    HuffmanEntry { code: 0x7fb, len: 11 },      // 43
    HuffmanEntry { code: 0xfa, len: 8 },        // 44
    HuffmanEntry { code: 0x16, len: 6 },        // 45
    HuffmanEntry { code: 0x17, len: 6 },        // 46
    HuffmanEntry { code: 0x18, len: 6 },        // 47
    HuffmanEntry { code: 0x0, len: 5 },         // 48
    HuffmanEntry { code: 0x1, len: 5 },         // 49
    HuffmanEntry { code: 0x2, len: 5 },         // 50
    HuffmanEntry { code: 0x19, len: 6 },        // 51
    HuffmanEntry { code: 0x1a, len: 6 },        // 52
    HuffmanEntry { code: 0x1b, len: 6 },        // 53
    HuffmanEntry { code: 0x1c, len: 6 },        // 54
    HuffmanEntry { code: 0x1d, len: 6 },        // 55
    HuffmanEntry { code: 0x1e, len: 6 },        // 56
    HuffmanEntry { code: 0x1f, len: 6 },        // 57
    HuffmanEntry { code: 0x5c, len: 7 },        // 58
    HuffmanEntry { code: 0xfb, len: 8 },        // 59
    HuffmanEntry { code: 0x7ffc, len: 15 },     // 60
    HuffmanEntry { code: 0x20, len: 6 },        // 61
    HuffmanEntry { code: 0xffb, len: 12 },      // 62
    HuffmanEntry { code: 0x3fc, len: 10 },      // 63
    HuffmanEntry { code: 0x1ffa, len: 13 },     // 64
    HuffmanEntry { code: 0x21, len: 6 },        // 65
    HuffmanEntry { code: 0x5d, len: 7 },        // 66
    HuffmanEntry { code: 0x5e, len: 7 },        // 67
    HuffmanEntry { code: 0x5f, len: 7 },        // 68
    HuffmanEntry { code: 0x60, len: 7 },        // 69
    HuffmanEntry { code: 0x61, len: 7 },        // 70
    HuffmanEntry { code: 0x62, len: 7 },        // 71
    HuffmanEntry { code: 0x63, len: 7 },        // 72
    HuffmanEntry { code: 0x64, len: 7 },        // 73
    HuffmanEntry { code: 0x65, len: 7 },        // 74
    HuffmanEntry { code: 0x66, len: 7 },        // 75
    HuffmanEntry { code: 0x67, len: 7 },        // 76
    HuffmanEntry { code: 0x68, len: 7 },        // 77
    HuffmanEntry { code: 0x69, len: 7 },        // 78
    HuffmanEntry { code: 0x6a, len: 7 },        // 79
    HuffmanEntry { code: 0x6b, len: 7 },        // 80
    HuffmanEntry { code: 0x6c, len: 7 },        // 81
    HuffmanEntry { code: 0x6d, len: 7 },        // 82
    HuffmanEntry { code: 0x6e, len: 7 },        // 83
    HuffmanEntry { code: 0x6f, len: 7 },        // 84
    HuffmanEntry { code: 0x70, len: 7 },        // 85
    HuffmanEntry { code: 0x71, len: 7 },        // 86
    HuffmanEntry { code: 0x72, len: 7 },        // 87
    HuffmanEntry { code: 0xfc, len: 8 },        // 88
    HuffmanEntry { code: 0x73, len: 7 },        // 89
    HuffmanEntry { code: 0xfd, len: 8 },        // 90
    HuffmanEntry { code: 0x1ffb, len: 13 },     // 91
    HuffmanEntry { code: 0x7fff0, len: 19 },    // 92
    HuffmanEntry { code: 0x1ffc, len: 13 },     // 93
    HuffmanEntry { code: 0x3ffc, len: 14 },     // 94
    HuffmanEntry { code: 0x22, len: 6 },        // 95
    HuffmanEntry { code: 0x7ffd, len: 15 },     // 96
    HuffmanEntry { code: 0x3, len: 5 },         // 97
    HuffmanEntry { code: 0x23, len: 6 },        // 98
    HuffmanEntry { code: 0x4, len: 5 },         // 99
    HuffmanEntry { code: 0x24, len: 6 },        // 100
    HuffmanEntry { code: 0x5, len: 5 },         // 101
    HuffmanEntry { code: 0x25, len: 6 },        // 102
    HuffmanEntry { code: 0x26, len: 6 },        // 103
    HuffmanEntry { code: 0x27, len: 6 },        // 104
    HuffmanEntry { code: 0x6, len: 5 },         // 105
    HuffmanEntry { code: 0x74, len: 7 },        // 106
    HuffmanEntry { code: 0x75, len: 7 },        // 107
    HuffmanEntry { code: 0x28, len: 6 },        // 108
    HuffmanEntry { code: 0x29, len: 6 },        // 109
    HuffmanEntry { code: 0x2a, len: 6 },        // 110
    HuffmanEntry { code: 0x7, len: 5 },         // 111
    HuffmanEntry { code: 0x2b, len: 6 },        // 112
    HuffmanEntry { code: 0x76, len: 7 },        // 113
    HuffmanEntry { code: 0x2c, len: 6 },        // 114
    HuffmanEntry { code: 0x8, len: 5 },         // 115
    HuffmanEntry { code: 0x9, len: 5 },         // 116
    HuffmanEntry { code: 0x2d, len: 6 },        // 117
    HuffmanEntry { code: 0x77, len: 7 },        // 118
    HuffmanEntry { code: 0x78, len: 7 },        // 119
    HuffmanEntry { code: 0x79, len: 7 },        // 120
    HuffmanEntry { code: 0x7a, len: 7 },        // 121
    HuffmanEntry { code: 0x7b, len: 7 },        // 122
    HuffmanEntry { code: 0x7ffe, len: 15 },     // 123
    HuffmanEntry { code: 0x7fc, len: 11 },      // 124
    HuffmanEntry { code: 0x3ffd, len: 14 },     // 125
    HuffmanEntry { code: 0x1ffd, len: 13 },     // 126
    HuffmanEntry { code: 0xffffffc, len: 28 },  // 127
    HuffmanEntry { code: 0xfffe6, len: 20 },    // 128
    HuffmanEntry { code: 0x3fffd2, len: 22 },   // 129
    HuffmanEntry { code: 0xfffe7, len: 20 },    // 130
    HuffmanEntry { code: 0xfffe8, len: 20 },    // 131
    HuffmanEntry { code: 0x3fffd3, len: 22 },   // 132
    HuffmanEntry { code: 0x3fffd4, len: 22 },   // 133
    HuffmanEntry { code: 0x3fffd5, len: 22 },   // 134
    HuffmanEntry { code: 0x7fffd9, len: 23 },   // 135
    HuffmanEntry { code: 0x3fffd6, len: 22 },   // 136
    HuffmanEntry { code: 0x7fffda, len: 23 },   // 137
    HuffmanEntry { code: 0x7fffdb, len: 23 },   // 138
    HuffmanEntry { code: 0x7fffdc, len: 23 },   // 139
    HuffmanEntry { code: 0x7fffdd, len: 23 },   // 140
    HuffmanEntry { code: 0x7fffde, len: 23 },   // 141
    HuffmanEntry { code: 0xffffeb, len: 24 },   // 142
    HuffmanEntry { code: 0x7fffdf, len: 23 },   // 143
    HuffmanEntry { code: 0xffffec, len: 24 },   // 144
    HuffmanEntry { code: 0xffffed, len: 24 },   // 145
    HuffmanEntry { code: 0x3fffd7, len: 22 },   // 146
    HuffmanEntry { code: 0x7fffe0, len: 23 },   // 147
    HuffmanEntry { code: 0xffffee, len: 24 },   // 148
    HuffmanEntry { code: 0x7fffe1, len: 23 },   // 149
    HuffmanEntry { code: 0x7fffe2, len: 23 },   // 150
    HuffmanEntry { code: 0x7fffe3, len: 23 },   // 151
    HuffmanEntry { code: 0x7fffe4, len: 23 },   // 152
    HuffmanEntry { code: 0x1fffdc, len: 21 },   // 153
    HuffmanEntry { code: 0x3fffd8, len: 22 },   // 154
    HuffmanEntry { code: 0x7fffe5, len: 23 },   // 155
    HuffmanEntry { code: 0x3fffd9, len: 22 },   // 156
    HuffmanEntry { code: 0x7fffe6, len: 23 },   // 157
    HuffmanEntry { code: 0x7fffe7, len: 23 },   // 158
    HuffmanEntry { code: 0xffffef, len: 24 },   // 159
    HuffmanEntry { code: 0x3fffda, len: 22 },   // 160
    HuffmanEntry { code: 0x1fffdd, len: 21 },   // 161
    HuffmanEntry { code: 0xfffe9, len: 20 },    // 162
    HuffmanEntry { code: 0x3fffdb, len: 22 },   // 163
    HuffmanEntry { code: 0x3fffdc, len: 22 },   // 164
    HuffmanEntry { code: 0x7fffe8, len: 23 },   // 165
    HuffmanEntry { code: 0x7fffe9, len: 23 },   // 166
    HuffmanEntry { code: 0x1fffde, len: 21 },   // 167
    HuffmanEntry { code: 0x7fffea, len: 23 },   // 168
    HuffmanEntry { code: 0x3fffdd, len: 22 },   // 169
    HuffmanEntry { code: 0x3fffde, len: 22 },   // 170
    HuffmanEntry { code: 0xfffff0, len: 24 },   // 171
    HuffmanEntry { code: 0x1fffdf, len: 21 },   // 172
    HuffmanEntry { code: 0x3fffdf, len: 22 },   // 173
    HuffmanEntry { code: 0x7fffeb, len: 23 },   // 174
    HuffmanEntry { code: 0x7fffec, len: 23 },   // 175
    HuffmanEntry { code: 0x1fffe0, len: 21 },   // 176
    HuffmanEntry { code: 0x1fffe1, len: 21 },   // 177
    HuffmanEntry { code: 0x3fffe0, len: 22 },   // 178
    HuffmanEntry { code: 0x1fffe2, len: 21 },   // 179
    HuffmanEntry { code: 0x7fffed, len: 23 },   // 180
    HuffmanEntry { code: 0x3fffe1, len: 22 },   // 181
    HuffmanEntry { code: 0x7fffee, len: 23 },   // 182
    HuffmanEntry { code: 0x7fffef, len: 23 },   // 183
    HuffmanEntry { code: 0xfffea, len: 20 },    // 184
    HuffmanEntry { code: 0x3fffe2, len: 22 },   // 185
    HuffmanEntry { code: 0x3fffe3, len: 22 },   // 186
    HuffmanEntry { code: 0x3fffe4, len: 22 },   // 187
    HuffmanEntry { code: 0x7ffff0, len: 23 },   // 188
    HuffmanEntry { code: 0x3fffe5, len: 22 },   // 189
    HuffmanEntry { code: 0x3fffe6, len: 22 },   // 190
    HuffmanEntry { code: 0x7ffff1, len: 23 },   // 191
    HuffmanEntry { code: 0x3ffffe0, len: 26 },  // 192
    HuffmanEntry { code: 0x3ffffe1, len: 26 },  // 193
    HuffmanEntry { code: 0xfffeb, len: 20 },    // 194
    HuffmanEntry { code: 0x7fff1, len: 19 },    // 195
    HuffmanEntry { code: 0x3fffe7, len: 22 },   // 196
    HuffmanEntry { code: 0x7ffff2, len: 23 },   // 197
    HuffmanEntry { code: 0x3fffe8, len: 22 },   // 198
    HuffmanEntry { code: 0x1ffffec, len: 25 },  // 199
    HuffmanEntry { code: 0x3ffffe2, len: 26 },  // 200
    HuffmanEntry { code: 0x3ffffe3, len: 26 },  // 201
    HuffmanEntry { code: 0x3ffffe4, len: 26 },  // 202
    HuffmanEntry { code: 0x7ffffde, len: 27 },  // 203
    HuffmanEntry { code: 0x7ffffdf, len: 27 },  // 204
    HuffmanEntry { code: 0x3ffffe5, len: 26 },  // 205
    HuffmanEntry { code: 0xfffff1, len: 24 },   // 206
    HuffmanEntry { code: 0x1ffffed, len: 25 },  // 207
    HuffmanEntry { code: 0x7fff2, len: 19 },    // 208
    HuffmanEntry { code: 0x1fffe3, len: 21 },   // 209
    HuffmanEntry { code: 0x3ffffe6, len: 26 },  // 210
    HuffmanEntry { code: 0x7ffffe0, len: 27 },  // 211
    HuffmanEntry { code: 0x7ffffe1, len: 27 },  // 212
    HuffmanEntry { code: 0x3ffffe7, len: 26 },  // 213
    HuffmanEntry { code: 0x7ffffe2, len: 27 },  // 214
    HuffmanEntry { code: 0xfffff2, len: 24 },   // 215
    HuffmanEntry { code: 0x1fffe4, len: 21 },   // 216
    HuffmanEntry { code: 0x1fffe5, len: 21 },   // 217
    HuffmanEntry { code: 0x3ffffe8, len: 26 },  // 218
    HuffmanEntry { code: 0x3ffffe9, len: 26 },  // 219
    HuffmanEntry { code: 0xffffffd, len: 28 },  // 220
    HuffmanEntry { code: 0x7ffffe3, len: 27 },  // 221
    HuffmanEntry { code: 0x7ffffe4, len: 27 },  // 222
    HuffmanEntry { code: 0x7ffffe5, len: 27 },  // 223
    HuffmanEntry { code: 0xfffec, len: 20 },    // 224
    HuffmanEntry { code: 0xfffff3, len: 24 },   // 225
    HuffmanEntry { code: 0xfffed, len: 20 },    // 226
    HuffmanEntry { code: 0x1fffe6, len: 21 },   // 227
    HuffmanEntry { code: 0x3fffe9, len: 22 },   // 228
    HuffmanEntry { code: 0x1fffe7, len: 21 },   // 229
    HuffmanEntry { code: 0x1fffe8, len: 21 },   // 230
    HuffmanEntry { code: 0x7ffff3, len: 23 },   // 231
    HuffmanEntry { code: 0x3fffea, len: 22 },   // 232
    HuffmanEntry { code: 0x3fffeb, len: 22 },   // 233
    HuffmanEntry { code: 0x1ffffee, len: 25 },  // 234
    HuffmanEntry { code: 0x1ffffef, len: 25 },  // 235
    HuffmanEntry { code: 0xfffff4, len: 24 },   // 236
    HuffmanEntry { code: 0xfffff5, len: 24 },   // 237
    HuffmanEntry { code: 0x3ffffea, len: 26 },  // 238
    HuffmanEntry { code: 0x7ffff4, len: 23 },   // 239
    HuffmanEntry { code: 0x3ffffeb, len: 26 },  // 240
    HuffmanEntry { code: 0x7ffffe6, len: 27 },  // 241
    HuffmanEntry { code: 0x3ffffec, len: 26 },  // 242
    HuffmanEntry { code: 0x3ffffed, len: 26 },  // 243
    HuffmanEntry { code: 0x7ffffe7, len: 27 },  // 244
    HuffmanEntry { code: 0x7ffffe8, len: 27 },  // 245
    HuffmanEntry { code: 0x7ffffe9, len: 27 },  // 246
    HuffmanEntry { code: 0x7ffffea, len: 27 },  // 247
    HuffmanEntry { code: 0x7ffffeb, len: 27 },  // 248
    HuffmanEntry { code: 0xffffffe, len: 28 },  // 249
    HuffmanEntry { code: 0x7ffffec, len: 27 },  // 250
    HuffmanEntry { code: 0x7ffffed, len: 27 },  // 251
    HuffmanEntry { code: 0x7ffffee, len: 27 },  // 252
    HuffmanEntry { code: 0x7ffffef, len: 27 },  // 253
    HuffmanEntry { code: 0x7fffff0, len: 27 },  // 254
    HuffmanEntry { code: 0x3ffffee, len: 26 },  // 255
    HuffmanEntry { code: 0x3fffffff, len: 30 }, // 256 EOS
];

/// Codes of one bit length, in canonical order.
#[derive(Debug, Clone, Copy)]
struct LengthGroup {
    len: u8,
    /// First code of this length, right-aligned.
    first_code: u32,
    /// Exclusive upper bound of this group's codes, left-aligned in 32 bits.
    limit: u64,
    /// Canonical rank of `first_code`.
    base: u16,
}

struct CanonicalTable {
    groups: Vec<LengthGroup>,
    /// Symbols ordered by canonical rank.
    symbols: Vec<u16>,
}

impl CanonicalTable {
    fn build() -> Self {
        let mut symbols: Vec<u16> = (0..=EOS).collect();
        symbols.sort_by_key(|&s| {
            let entry = ENCODE_TABLE[s as usize];
            (entry.len, entry.code)
        });

        let mut groups: Vec<LengthGroup> = Vec::new();
        for (rank, &symbol) in symbols.iter().enumerate() {
            let entry = ENCODE_TABLE[symbol as usize];
            match groups.last_mut() {
                Some(group) if group.len == entry.len => {
                    group.limit += 1u64 << (32 - entry.len);
                }
                _ => groups.push(LengthGroup {
                    len: entry.len,
                    first_code: entry.code,
                    limit: u64::from(entry.code + 1) << (32 - entry.len),
                    base: rank as u16,
                }),
            }
        }

        Self { groups, symbols }
    }

    /// Returns `(code_length, symbol)` for the code at the top of `bits`.
    ///
    /// The code is complete, so every 32-bit pattern starts with some code.
    fn lookup(&self, bits: u32) -> (u8, u16) {
        let wide = u64::from(bits);
        let group = self
            .groups
            .iter()
            .find(|group| wide < group.limit)
            .unwrap_or(&self.groups[self.groups.len() - 1]);
        let offset = (bits >> (32 - group.len)) - group.first_code;
        let symbol = self.symbols[usize::from(group.base) + offset as usize];
        (group.len, symbol)
    }
}

static CANONICAL_TABLE: OnceLock<CanonicalTable> = OnceLock::new();

fn canonical_table() -> &'static CanonicalTable {
    CANONICAL_TABLE.get_or_init(CanonicalTable::build)
}

/// Up to 64 bits of Huffman-encoded input, left-aligned.
///
/// Bits enter at the low end of the valid region and leave from the top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanBitBuffer {
    accumulator: u64,
    count: u32,
}

impl HuffmanBitBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Appends whole bytes from `input` while they fit. Returns the number
    /// of bytes taken.
    pub fn append_bytes(&mut self, input: &[u8]) -> usize {
        let mut free = self.free_count();
        let mut used = 0;
        for &byte in input {
            if free < 8 {
                break;
            }
            free -= 8;
            self.accumulator |= u64::from(byte) << free;
            used += 1;
        }
        self.count += 8 * used as u32;
        used
    }

    /// Drops `n` bits from the top of the buffer.
    pub fn consume_bits(&mut self, n: u32) {
        debug_assert!(n <= self.count);
        self.accumulator = self.accumulator.checked_shl(n).unwrap_or(0);
        self.count -= n.min(self.count);
    }

    /// True if the buffered bits are valid end-of-string padding: fewer than
    /// eight bits, all of them ones.
    pub fn input_properly_terminated(&self) -> bool {
        match self.count {
            0 => true,
            count if count < 8 => self.accumulator == !(u64::MAX >> count),
            _ => false,
        }
    }

    /// The buffered bits, left-aligned; unused low bits are zero.
    pub fn value(&self) -> u64 {
        self.accumulator
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn free_count(&self) -> u32 {
        64 - self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Renders the buffered bits as a string of `0`/`1`, for diagnostics.
    pub fn debug_string(&self) -> String {
        (0..self.count)
            .map(|i| if self.accumulator >> (63 - i) & 1 == 1 { '1' } else { '0' })
            .collect()
    }
}

/// Incremental decoder for one Huffman-encoded string.
///
/// Feed fragments with [`decode`](Self::decode), then check
/// [`input_properly_terminated`](Self::input_properly_terminated) once the
/// whole string has been seen. Call [`reset`](Self::reset) before reusing
/// the decoder for the next string.
#[derive(Debug, Clone, Default)]
pub struct HuffmanDecoder {
    bit_buffer: HuffmanBitBuffer,
}

impl HuffmanDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.bit_buffer.reset();
    }

    /// Decodes as many complete symbols as `input` and the buffered bits
    /// allow, appending them to `output`. Trailing bits of an incomplete
    /// symbol stay buffered for the next call.
    ///
    /// Fails if the input contains the EOS symbol.
    pub fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let table = canonical_table();
        let mut input = &input[self.bit_buffer.append_bytes(input)..];

        loop {
            let (len, symbol) = table.lookup((self.bit_buffer.value() >> 32) as u32);
            if u32::from(len) <= self.bit_buffer.count() {
                if symbol == EOS {
                    return Err(Error::HuffmanEncodingError);
                }
                output.push(symbol as u8);
                self.bit_buffer.consume_bits(u32::from(len));
                continue;
            }

            let appended = self.bit_buffer.append_bytes(input);
            if appended == 0 {
                return Ok(());
            }
            input = &input[appended..];
        }
    }

    /// True if the bits left over after the last call form valid padding.
    pub fn input_properly_terminated(&self) -> bool {
        self.bit_buffer.input_properly_terminated()
    }

    pub fn debug_string(&self) -> String {
        self.bit_buffer.debug_string()
    }
}

/// Encode data using Huffman coding.
///
/// Returns the number of bytes written to output.
pub fn encode(data: &[u8], output: &mut Vec<u8>) -> usize {
    let initial_len = output.len();
    let mut acc: u64 = 0;
    let mut bits: u8 = 0;

    for &byte in data {
        let entry = &ENCODE_TABLE[byte as usize];
        acc = (acc << entry.len) | u64::from(entry.code);
        bits += entry.len;

        while bits >= 8 {
            bits -= 8;
            output.push((acc >> bits) as u8);
        }
    }

    // Pad with the most significant bits of EOS.
    if bits > 0 {
        acc <<= 8 - bits;
        acc |= (1u64 << (8 - bits)) - 1;
        output.push(acc as u8);
    }

    output.len() - initial_len
}

/// Decode a complete Huffman-encoded string.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = HuffmanDecoder::new();
    let mut output = Vec::with_capacity(data.len() * 8 / 5);
    decoder.decode(data, &mut output)?;
    if !decoder.input_properly_terminated() {
        return Err(Error::HuffmanEncodingError);
    }
    Ok(output)
}

/// Calculate the encoded size of data without actually encoding.
pub fn encoded_size(data: &[u8]) -> usize {
    let bits: usize = data
        .iter()
        .map(|&byte| usize::from(ENCODE_TABLE[byte as usize].len))
        .sum();
    (bits + 7) / 8
}
