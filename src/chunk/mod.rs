use serde::Serialize;

use crate::memory::GrowableBuffer;
use crate::value::Value;

// ── Opcodes ──────────────────────────────────────────────────────────
//
// Variable-width encoding: [OP] or [OP | operand bytes...]
// CONSTANT:       [OP | idx:8]
// CONSTANT_LONG:  [OP | idx:24 little-endian]

/// Largest constant index addressable by `OP_CONSTANT`.
pub const MAX_SHORT_CONSTANT: usize = u8::MAX as usize;
/// Number of constants addressable by `OP_CONSTANT_LONG`.
pub const MAX_CONSTANTS: usize = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum OpCode {
    Constant = 0,
    ConstantLong = 1,
    Nil = 2,
    True = 3,
    False = 4,
    Pop = 5,
    Equal = 6,
    Greater = 7,
    Less = 8,
    Add = 9,
    Subtract = 10,
    Multiply = 11,
    Divide = 12,
    Not = 13,
    Negate = 14,
    Print = 15,
    Return = 16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown opcode {0}")]
pub struct UnknownOpcode(pub u8);

impl OpCode {
    pub const ALL: [OpCode; 17] = [
        OpCode::Constant,
        OpCode::ConstantLong,
        OpCode::Nil,
        OpCode::True,
        OpCode::False,
        OpCode::Pop,
        OpCode::Equal,
        OpCode::Greater,
        OpCode::Less,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Not,
        OpCode::Negate,
        OpCode::Print,
        OpCode::Return,
    ];

    /// Number of inline operand bytes that follow the opcode byte.
    pub fn operand_width(self) -> usize {
        match self {
            OpCode::Constant => 1,
            OpCode::ConstantLong => 3,
            _ => 0,
        }
    }

    /// Opcode byte plus operand bytes.
    pub fn width(self) -> usize {
        1 + self.operand_width()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Constant => "OP_CONSTANT",
            OpCode::ConstantLong => "OP_CONSTANT_LONG",
            OpCode::Nil => "OP_NIL",
            OpCode::True => "OP_TRUE",
            OpCode::False => "OP_FALSE",
            OpCode::Pop => "OP_POP",
            OpCode::Equal => "OP_EQUAL",
            OpCode::Greater => "OP_GREATER",
            OpCode::Less => "OP_LESS",
            OpCode::Add => "OP_ADD",
            OpCode::Subtract => "OP_SUBTRACT",
            OpCode::Multiply => "OP_MULTIPLY",
            OpCode::Divide => "OP_DIVIDE",
            OpCode::Not => "OP_NOT",
            OpCode::Negate => "OP_NEGATE",
            OpCode::Print => "OP_PRINT",
            OpCode::Return => "OP_RETURN",
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = UnknownOpcode;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::ALL.get(byte as usize).copied().ok_or(UnknownOpcode(byte))
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

// ── Chunk ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChunkError {
    #[error("too many constants in one chunk: index {index} exceeds {}", MAX_CONSTANTS - 1)]
    TooManyConstants { index: usize },
}

/// Encoded instructions, the source line of every byte, and a constant pool.
///
/// `code` and `lines` always have the same length; nothing already written
/// is ever rewritten.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    code: GrowableBuffer<u8>,
    lines: GrowableBuffer<u32>,
    constants: GrowableBuffer<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk {
            code: GrowableBuffer::new(),
            lines: GrowableBuffer::new(),
            constants: GrowableBuffer::new(),
        }
    }

    /// Appends one raw byte produced by source `line`.
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.write(op.into(), line);
    }

    /// Appends to the constant pool and returns the new slot. Never deduplicates.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Adds `value` to the pool and emits the load for it: `OP_CONSTANT` when
    /// the index fits in a byte, `OP_CONSTANT_LONG` otherwise.
    pub fn write_constant(&mut self, value: Value, line: u32) -> Result<usize, ChunkError> {
        let index = self.add_constant(value);
        if index <= MAX_SHORT_CONSTANT {
            self.write_op(OpCode::Constant, line);
            self.write(index as u8, line);
            Ok(index)
        } else {
            self.write_long_index(index, line)
        }
    }

    /// Like `write_constant`, but always emits `OP_CONSTANT_LONG`, even for
    /// indices that would fit in a byte.
    pub fn write_constant_long(&mut self, value: Value, line: u32) -> Result<usize, ChunkError> {
        let index = self.add_constant(value);
        self.write_long_index(index, line)
    }

    fn write_long_index(&mut self, index: usize, line: u32) -> Result<usize, ChunkError> {
        if index >= MAX_CONSTANTS {
            return Err(ChunkError::TooManyConstants { index });
        }
        self.write_op(OpCode::ConstantLong, line);
        let [b0, b1, b2, _] = (index as u32).to_le_bytes();
        self.write(b0, line);
        self.write(b1, line);
        self.write(b2, line);
        Ok(index)
    }

    /// Reads the constant-pool index of a constant-bearing instruction whose
    /// operand starts at `operand_offset`. Returns `None` for opcodes without
    /// a constant operand, or when the operand bytes run past the code.
    pub fn read_constant_index(&self, op: OpCode, operand_offset: usize) -> Option<usize> {
        let code = self.code.as_slice();
        match op {
            OpCode::Constant => code.get(operand_offset).map(|&b| b as usize),
            OpCode::ConstantLong => {
                let bytes = code.get(operand_offset..operand_offset + 3)?;
                Some(bytes[0] as usize | (bytes[1] as usize) << 8 | (bytes[2] as usize) << 16)
            }
            _ => None,
        }
    }

    /// Releases all three buffers. The chunk is empty afterwards.
    pub fn free(&mut self) {
        self.code.free();
        self.lines.free();
        self.constants.free();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn code(&self) -> &[u8] {
        self.code.as_slice()
    }

    pub fn lines(&self) -> &[u32] {
        self.lines.as_slice()
    }

    pub fn constants(&self) -> &[Value] {
        self.constants.as_slice()
    }

    pub fn code_capacity(&self) -> usize {
        self.code.capacity()
    }

    pub fn constants_capacity(&self) -> usize {
        self.constants.capacity()
    }

    #[inline]
    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    #[inline]
    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    #[inline]
    pub fn constant(&self, index: usize) -> Option<Value> {
        self.constants.get(index).copied()
    }
}
