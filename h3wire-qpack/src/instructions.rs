//! QPACK instruction grammar and the instruction languages of RFC 9204.
//!
//! An instruction is identified by the bits of its first byte selected by
//! an opcode mask, followed by an ordered list of fields. A [`Language`] is
//! the set of instructions that may appear on one kind of input:
//!
//! - Encoder stream instructions (Section 4.3):
//!   Insert With Name Reference, Insert With Literal Name, Duplicate,
//!   Set Dynamic Table Capacity
//! - Decoder stream instructions (Section 4.4):
//!   Section Acknowledgment, Stream Cancellation, Insert Count Increment
//! - The encoded field section prefix (Section 4.5.1)
//! - Field line representations (Sections 4.5.2 - 4.5.6)
//!
//! Every language must match each possible first byte with exactly one
//! instruction. [`Language::new`] checks this at compile time for the
//! languages defined here; [`Language::try_new`] checks it at run time.

use crate::error::{Error, Result};

/// Kind of an instruction field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// A single flag bit. `param` is the bit mask within the current byte.
    SBit,
    /// A prefix integer. `param` is the prefix length in bits (1-8).
    Varint,
    /// A second prefix integer, stored separately from [`FieldType::Varint`].
    Varint2,
    /// A length-prefixed string stored as the name. `param` is the prefix
    /// length of the string length; the Huffman flag is the bit just above.
    Name,
    /// A length-prefixed string stored as the value. Same layout as
    /// [`FieldType::Name`].
    Value,
}

/// One field of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub ty: FieldType,
    pub param: u8,
}

impl Field {
    pub const fn sbit(mask: u8) -> Self {
        Self { ty: FieldType::SBit, param: mask }
    }

    pub const fn varint(prefix_bits: u8) -> Self {
        Self { ty: FieldType::Varint, param: prefix_bits }
    }

    pub const fn varint2(prefix_bits: u8) -> Self {
        Self { ty: FieldType::Varint2, param: prefix_bits }
    }

    pub const fn name(prefix_bits: u8) -> Self {
        Self { ty: FieldType::Name, param: prefix_bits }
    }

    pub const fn value(prefix_bits: u8) -> Self {
        Self { ty: FieldType::Value, param: prefix_bits }
    }

    /// Mask of the Huffman flag of a string field.
    #[inline]
    pub const fn huffman_bit(self) -> u8 {
        1 << self.param
    }

    const fn is_well_formed(self) -> bool {
        match self.ty {
            FieldType::SBit => self.param != 0,
            FieldType::Varint | FieldType::Varint2 => self.param >= 1 && self.param <= 8,
            FieldType::Name | FieldType::Value => self.param >= 1 && self.param <= 7,
        }
    }
}

/// Bits identifying an instruction: `(byte & mask) == value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub value: u8,
    pub mask: u8,
}

impl Opcode {
    #[inline]
    pub const fn matches(self, byte: u8) -> bool {
        byte & self.mask == self.value
    }
}

/// An instruction: opcode plus the fields decoded after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub name: &'static str,
    pub opcode: Opcode,
    pub fields: &'static [Field],
}

/// A set of instructions that together match every first byte exactly once.
#[derive(Debug, Clone, Copy)]
pub struct Language {
    name: &'static str,
    instructions: &'static [Instruction],
}

impl Language {
    /// Creates a language, panicking if it is not well formed. In a `const`
    /// or `static` initializer the panic is a compile error.
    pub const fn new(name: &'static str, instructions: &'static [Instruction]) -> Self {
        assert!(
            first_violation(instructions).is_none(),
            "instruction language must match every byte exactly once"
        );
        assert!(
            fields_well_formed(instructions),
            "instruction field parameter out of range"
        );
        Self { name, instructions }
    }

    /// Creates a language, reporting an ill-formed one as
    /// [`Error::InvalidGrammar`].
    pub fn try_new(name: &'static str, instructions: &'static [Instruction]) -> Result<Self> {
        if let Some(byte) = first_violation(instructions) {
            return Err(Error::InvalidGrammar(format!(
                "{name}: byte {byte:#04x} matches {} instructions",
                match_count(instructions, byte)
            )));
        }
        if !fields_well_formed(instructions) {
            return Err(Error::InvalidGrammar(format!(
                "{name}: field parameter out of range"
            )));
        }
        Ok(Self { name, instructions })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn instructions(&self) -> &'static [Instruction] {
        self.instructions
    }

    /// Returns the instruction whose opcode matches `byte`.
    pub fn lookup(&self, byte: u8) -> Option<&'static Instruction> {
        self.instructions.iter().find(|i| i.opcode.matches(byte))
    }
}

const fn match_count(instructions: &[Instruction], byte: u8) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i < instructions.len() {
        if instructions[i].opcode.matches(byte) {
            count += 1;
        }
        i += 1;
    }
    count
}

/// First byte matched by zero or several instructions.
const fn first_violation(instructions: &[Instruction]) -> Option<u8> {
    let mut byte: u16 = 0;
    while byte <= 0xFF {
        if match_count(instructions, byte as u8) != 1 {
            return Some(byte as u8);
        }
        byte += 1;
    }
    None
}

const fn fields_well_formed(instructions: &[Instruction]) -> bool {
    let mut i = 0;
    while i < instructions.len() {
        let fields = instructions[i].fields;
        let mut j = 0;
        while j < fields.len() {
            if !fields[j].is_well_formed() {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

// ============================================================================
// Encoder stream (RFC 9204 Section 4.3)
// ============================================================================

/// `1 T NameIndex(6+) H ValueLength(7+) Value`
pub const INSERT_WITH_NAME_REFERENCE: Instruction = Instruction {
    name: "Insert With Name Reference",
    opcode: Opcode { value: 0x80, mask: 0x80 },
    fields: &[Field::sbit(0x40), Field::varint(6), Field::value(7)],
};

/// `01 H NameLength(5+) Name H ValueLength(7+) Value`
pub const INSERT_WITH_LITERAL_NAME: Instruction = Instruction {
    name: "Insert With Literal Name",
    opcode: Opcode { value: 0x40, mask: 0xC0 },
    fields: &[Field::name(5), Field::value(7)],
};

/// `000 Index(5+)`
pub const DUPLICATE: Instruction = Instruction {
    name: "Duplicate",
    opcode: Opcode { value: 0x00, mask: 0xE0 },
    fields: &[Field::varint(5)],
};

/// `001 Capacity(5+)`
pub const SET_DYNAMIC_TABLE_CAPACITY: Instruction = Instruction {
    name: "Set Dynamic Table Capacity",
    opcode: Opcode { value: 0x20, mask: 0xE0 },
    fields: &[Field::varint(5)],
};

pub static ENCODER_STREAM_LANGUAGE: Language = Language::new(
    "encoder stream",
    &[
        INSERT_WITH_NAME_REFERENCE,
        INSERT_WITH_LITERAL_NAME,
        DUPLICATE,
        SET_DYNAMIC_TABLE_CAPACITY,
    ],
);

// ============================================================================
// Decoder stream (RFC 9204 Section 4.4)
// ============================================================================

/// `00 Increment(6+)`
pub const INSERT_COUNT_INCREMENT: Instruction = Instruction {
    name: "Insert Count Increment",
    opcode: Opcode { value: 0x00, mask: 0xC0 },
    fields: &[Field::varint(6)],
};

/// `1 StreamID(7+)`
pub const SECTION_ACKNOWLEDGMENT: Instruction = Instruction {
    name: "Section Acknowledgment",
    opcode: Opcode { value: 0x80, mask: 0x80 },
    fields: &[Field::varint(7)],
};

/// `01 StreamID(6+)`
pub const STREAM_CANCELLATION: Instruction = Instruction {
    name: "Stream Cancellation",
    opcode: Opcode { value: 0x40, mask: 0xC0 },
    fields: &[Field::varint(6)],
};

pub static DECODER_STREAM_LANGUAGE: Language = Language::new(
    "decoder stream",
    &[
        INSERT_COUNT_INCREMENT,
        SECTION_ACKNOWLEDGMENT,
        STREAM_CANCELLATION,
    ],
);

// ============================================================================
// Field section (RFC 9204 Section 4.5)
// ============================================================================

/// `EncodedRequiredInsertCount(8+) S DeltaBase(7+)`
pub const FIELD_SECTION_PREFIX: Instruction = Instruction {
    name: "Encoded Field Section Prefix",
    opcode: Opcode { value: 0x00, mask: 0x00 },
    fields: &[Field::varint(8), Field::sbit(0x80), Field::varint2(7)],
};

pub static FIELD_SECTION_PREFIX_LANGUAGE: Language =
    Language::new("field section prefix", &[FIELD_SECTION_PREFIX]);

/// `1 T Index(6+)`
pub const INDEXED_FIELD_LINE: Instruction = Instruction {
    name: "Indexed Field Line",
    opcode: Opcode { value: 0x80, mask: 0x80 },
    fields: &[Field::sbit(0x40), Field::varint(6)],
};

/// `0001 Index(4+)`
pub const INDEXED_FIELD_LINE_POST_BASE: Instruction = Instruction {
    name: "Indexed Field Line With Post-Base Index",
    opcode: Opcode { value: 0x10, mask: 0xF0 },
    fields: &[Field::varint(4)],
};

/// `01 N T NameIndex(4+) H ValueLength(7+) Value`
pub const LITERAL_WITH_NAME_REFERENCE: Instruction = Instruction {
    name: "Literal Field Line With Name Reference",
    opcode: Opcode { value: 0x40, mask: 0xC0 },
    fields: &[Field::sbit(0x10), Field::varint(4), Field::value(7)],
};

/// `0000 N NameIndex(3+) H ValueLength(7+) Value`
pub const LITERAL_WITH_POST_BASE_NAME_REFERENCE: Instruction = Instruction {
    name: "Literal Field Line With Post-Base Name Reference",
    opcode: Opcode { value: 0x00, mask: 0xF0 },
    fields: &[Field::varint(3), Field::value(7)],
};

/// `001 N H NameLength(3+) Name H ValueLength(7+) Value`
pub const LITERAL_WITH_LITERAL_NAME: Instruction = Instruction {
    name: "Literal Field Line With Literal Name",
    opcode: Opcode { value: 0x20, mask: 0xE0 },
    fields: &[Field::name(3), Field::value(7)],
};

pub static FIELD_LINE_LANGUAGE: Language = Language::new(
    "field lines",
    &[
        INDEXED_FIELD_LINE,
        INDEXED_FIELD_LINE_POST_BASE,
        LITERAL_WITH_NAME_REFERENCE,
        LITERAL_WITH_POST_BASE_NAME_REFERENCE,
        LITERAL_WITH_LITERAL_NAME,
    ],
);
