//! Disassembler: the reference decoder for the variable-width encoding.
//!
//! `decode` produces a structured [`Instruction`]; the text and JSON dumps
//! are both renderings of it. The VM's fetch step reads operands through the
//! same `Chunk::read_constant_index`, so both sides agree on widths.

use std::io::{self, Write};

use serde::Serialize;

use crate::chunk::{Chunk, OpCode};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoded {
    /// A zero-operand instruction.
    Simple { op: OpCode },
    /// A constant load. `value` is `None` if the index is outside the pool.
    Constant { op: OpCode, index: usize, value: Option<Value> },
    /// A byte that is not an opcode.
    Unknown { byte: u8 },
    /// An opcode whose operand bytes run past the end of the code.
    Truncated { op: OpCode },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub offset: usize,
    pub line: u32,
    /// True when this instruction shares the previous byte's source line.
    pub same_line: bool,
    pub width: usize,
    #[serde(flatten)]
    pub decoded: Decoded,
}

impl Instruction {
    pub fn next_offset(&self) -> usize {
        self.offset + self.width
    }
}

/// Decodes the instruction starting at `offset`.
///
/// # Panics
///
/// Panics if `offset` is not inside the chunk's code.
pub fn decode(chunk: &Chunk, offset: usize) -> Instruction {
    let code = chunk.code();
    let lines = chunk.lines();
    let byte = code[offset];
    let line = lines[offset];
    let same_line = offset > 0 && lines[offset - 1] == line;

    let (decoded, width) = match OpCode::try_from(byte) {
        Err(_) => (Decoded::Unknown { byte }, 1),
        Ok(op) if op.operand_width() == 0 => (Decoded::Simple { op }, 1),
        Ok(op) => match chunk.read_constant_index(op, offset + 1) {
            Some(index) => {
                let value = chunk.constant(index);
                (Decoded::Constant { op, index, value }, op.width())
            }
            None => (Decoded::Truncated { op }, code.len() - offset),
        },
    };

    Instruction { offset, line, same_line, width, decoded }
}

/// Decodes every instruction from offset 0 to the end of the code.
pub fn decode_all(chunk: &Chunk) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < chunk.len() {
        let inst = decode(chunk, offset);
        offset = inst.next_offset();
        out.push(inst);
    }
    out
}

fn write_instruction(inst: &Instruction, out: &mut impl Write) -> io::Result<()> {
    write!(out, "{:04} ", inst.offset)?;
    if inst.same_line {
        write!(out, "   | ")?;
    } else {
        write!(out, "{:4} ", inst.line)?;
    }

    match &inst.decoded {
        Decoded::Simple { op } => writeln!(out, "{}", op.mnemonic()),
        Decoded::Constant { op, index, value } => {
            write!(out, "{:<16} {:4} '", op.mnemonic(), index)?;
            match value {
                Some(v) => write!(out, "{}", v)?,
                None => write!(out, "<invalid>")?,
            }
            writeln!(out, "'")
        }
        Decoded::Unknown { byte } => writeln!(out, "Unknown opcode {}", byte),
        Decoded::Truncated { op } => writeln!(out, "{:<16} <truncated>", op.mnemonic()),
    }
}

/// Prints the instruction at `offset` and returns the offset of the next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut impl Write) -> io::Result<usize> {
    let inst = decode(chunk, offset);
    write_instruction(&inst, out)?;
    Ok(inst.next_offset())
}

/// Prints `== name ==` followed by every instruction in the chunk.
pub fn disassemble_chunk(chunk: &Chunk, name: &str, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "== {} ==", name)?;
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, out)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct ChunkDump<'a> {
    name: &'a str,
    constants: &'a [Value],
    instructions: Vec<Instruction>,
}

/// The full decode of a chunk as one line of JSON.
pub fn dump_json(chunk: &Chunk, name: &str) -> serde_json::Result<String> {
    serde_json::to_string(&ChunkDump {
        name,
        constants: chunk.constants(),
        instructions: decode_all(chunk),
    })
}

/// The stack line printed before each instruction while tracing execution.
pub fn trace_stack(stack: &[Value], out: &mut impl Write) -> io::Result<()> {
    write!(out, "          ")?;
    for value in stack {
        write!(out, "[ {} ]", value)?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(chunk: &Chunk) -> String {
        let mut out = Vec::new();
        disassemble_chunk(chunk, "test", &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn simple_instruction() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Return, 1);
        let mut out = Vec::new();
        let next = disassemble_instruction(&chunk, 0, &mut out).unwrap();
        assert_eq!(next, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "0000    1 OP_RETURN\n");
    }

    #[test]
    fn constant_instruction() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.2), 123).unwrap();
        let mut out = Vec::new();
        let next = disassemble_instruction(&chunk, 0, &mut out).unwrap();
        assert_eq!(next, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "0000  123 OP_CONSTANT         0 '1.2'\n"
        );
    }

    #[test]
    fn long_constant_instruction() {
        let mut chunk = Chunk::new();
        for _ in 0..256 {
            chunk.add_constant(Value::Nil);
        }
        chunk.write_constant(Value::Bool(true), 4).unwrap();
        let inst = decode(&chunk, 0);
        assert_eq!(inst.width, 4);
        assert_eq!(
            inst.decoded,
            Decoded::Constant { op: OpCode::ConstantLong, index: 256, value: Some(Value::Bool(true)) }
        );
        let text = render(&chunk);
        assert!(text.contains("OP_CONSTANT_LONG  256 'true'"), "got:\n{text}");
    }

    #[test]
    fn repeated_line_uses_marker() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.0), 1).unwrap();
        chunk.write_op(OpCode::Negate, 1);
        chunk.write_op(OpCode::Return, 2);
        let text = render(&chunk);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "== test ==");
        assert_eq!(lines[1], "0000    1 OP_CONSTANT         0 '1'");
        assert_eq!(lines[2], "0002    | OP_NEGATE");
        assert_eq!(lines[3], "0003    2 OP_RETURN");
    }

    #[test]
    fn unknown_opcode_advances_one_byte() {
        let mut chunk = Chunk::new();
        chunk.write(200, 1);
        chunk.write_op(OpCode::Return, 1);
        let mut out = Vec::new();
        let next = disassemble_instruction(&chunk, 0, &mut out).unwrap();
        assert_eq!(next, 1);
        assert!(String::from_utf8(out).unwrap().contains("Unknown opcode 200"));
        let text = render(&chunk);
        assert!(text.contains("OP_RETURN"), "dump should continue past unknown byte");
    }

    #[test]
    fn truncated_operand_consumes_rest() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, 1);
        chunk.write_op(OpCode::ConstantLong, 1);
        chunk.write(0, 1);
        let inst = decode(&chunk, 1);
        assert_eq!(inst.decoded, Decoded::Truncated { op: OpCode::ConstantLong });
        assert_eq!(inst.next_offset(), chunk.len());
        assert!(render(&chunk).contains("<truncated>"));
    }

    #[test]
    fn constant_index_outside_pool() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(9, 1);
        let inst = decode(&chunk, 0);
        assert_eq!(inst.decoded, Decoded::Constant { op: OpCode::Constant, index: 9, value: None });
        assert!(render(&chunk).contains("'<invalid>'"));
    }

    #[test]
    fn decode_all_walks_whole_chunk() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.0), 1).unwrap();
        chunk.write_constant(Value::Number(2.0), 1).unwrap();
        chunk.write_op(OpCode::Add, 1);
        chunk.write_op(OpCode::Return, 1);
        let offsets: Vec<usize> = decode_all(&chunk).iter().map(|i| i.offset).collect();
        assert_eq!(offsets, vec![0, 2, 4, 5]);
    }

    #[test]
    fn constant_text_uses_full_number_formatting() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(2f64.powi(63)), 1).unwrap();
        chunk.write_constant(Value::Number(-0.0), 1).unwrap();
        let text = render(&chunk);
        assert!(text.contains("'9223372036854776000'"), "got:\n{text}");
        assert!(text.contains("'-0'"), "got:\n{text}");
    }

    #[test]
    fn empty_chunk_prints_header_only() {
        assert_eq!(render(&Chunk::new()), "== test ==\n");
    }

    #[test]
    fn json_dump_is_valid() {
        let mut chunk = Chunk::new();
        chunk.write_constant(Value::Number(1.5), 3).unwrap();
        chunk.write_op(OpCode::Return, 3);
        let json = dump_json(&chunk, "demo").unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["name"], "demo");
        let insts = v["instructions"].as_array().unwrap();
        assert_eq!(insts.len(), 2);
        assert_eq!(insts[0]["kind"], "constant");
        assert_eq!(insts[0]["index"], 0);
        assert_eq!(insts[0]["line"], 3);
        assert_eq!(insts[1]["kind"], "simple");
        assert_eq!(insts[1]["same_line"], true);
    }

    #[test]
    fn trace_stack_format() {
        let mut out = Vec::new();
        trace_stack(&[Value::Number(1.0), Value::Nil], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "          [ 1 ][ nil ]\n");
    }
}
