use std::io::{self, Write};

use crate::chunk::{Chunk, OpCode, UnknownOpcode};
use crate::config::VmConfig;
use crate::debug;
use crate::diagnostic::Diagnostic;
use crate::value::Value;

pub mod stack;

pub use stack::Stack;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("unknown opcode: {op}")]
    UnknownOpcode { op: u8 },
    #[error("constant index {index} is outside the constant pool")]
    ConstantOutOfRange { index: usize },
    #[error("instruction pointer ran past the end of the chunk")]
    UnexpectedEnd,
    #[error("failed to write output: {message}")]
    Output { message: String },
}

impl VmError {
    /// Stable identifier shown in diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            VmError::OperandsMustBeNumbers => "EMB-R001",
            VmError::OperandMustBeNumber => "EMB-R002",
            VmError::UnknownOpcode { .. } => "EMB-R003",
            VmError::ConstantOutOfRange { .. } => "EMB-R004",
            VmError::UnexpectedEnd => "EMB-R005",
            VmError::Output { .. } => "EMB-R006",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            VmError::OperandsMustBeNumbers => {
                Some("arithmetic and comparison only accept two numbers")
            }
            VmError::OperandMustBeNumber => Some("only numbers can be negated"),
            VmError::UnexpectedEnd => Some("every chunk must end in OP_RETURN"),
            _ => None,
        }
    }
}

type VmResult<T> = Result<T, VmError>;

/// A `VmError` attributed to the source line of the faulting instruction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}\n[line {line}] in script")]
pub struct RuntimeError {
    pub kind: VmError,
    pub line: u32,
}

/// Failure reported by a front end plugged in through [`Compile`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    pub line: Option<u32>,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        CompileError { message: message.into(), line: None }
    }

    pub fn at_line(message: impl Into<String>, line: u32) -> Self {
        CompileError { message: message.into(), line: Some(line) }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpretError {
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Source-to-chunk front end.
pub trait Compile {
    fn compile(&mut self, source: &str) -> Result<Chunk, CompileError>;
}

impl<F> Compile for F
where
    F: FnMut(&str) -> Result<Chunk, CompileError>,
{
    fn compile(&mut self, source: &str) -> Result<Chunk, CompileError> {
        self(source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Ready,
    Running,
    HaltedOk,
    HaltedCompileError,
    HaltedRuntimeError,
}

// ── VM ───────────────────────────────────────────────────────────────

/// Executes one chunk at a time. `out` receives `OP_PRINT` output; `err`
/// receives diagnostics and the execution trace.
pub struct Vm<O: Write = io::Stdout, E: Write = io::Stderr> {
    stack: Stack,
    ip: usize,
    state: VmState,
    config: VmConfig,
    out: O,
    err: E,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        Vm::with_output(config, io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Vm<O, E> {
    pub fn with_output(config: VmConfig, out: O, err: E) -> Self {
        Vm { stack: Stack::new(), ip: 0, state: VmState::Ready, config, out, err }
    }

    /// Runs `chunk` from its first byte until `OP_RETURN` or an error.
    ///
    /// On error the diagnostic has already been written to the error sink
    /// and the stack is empty, so the next call starts clean.
    pub fn interpret(&mut self, chunk: &Chunk) -> Result<Value, InterpretError> {
        log::debug!("interpret: {} bytes, {} constants", chunk.len(), chunk.constants().len());
        self.ip = 0;
        self.stack.reset();
        self.state = VmState::Running;

        match self.run(chunk) {
            Ok(value) => {
                self.state = VmState::HaltedOk;
                log::debug!("halted ok: {}", value);
                Ok(value)
            }
            Err(e) => {
                log::warn!("runtime error at line {}: {}", e.line, e.kind);
                self.report(Diagnostic::from(&e));
                self.stack.reset();
                self.state = VmState::HaltedRuntimeError;
                Err(e.into())
            }
        }
    }

    /// Compiles `source` with `compiler` and runs the result. A compile
    /// failure is reported and returned without executing anything.
    pub fn interpret_source<C>(&mut self, source: &str, compiler: &mut C) -> Result<Value, InterpretError>
    where
        C: Compile + ?Sized,
    {
        let mut chunk = match compiler.compile(source) {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("compile error: {}", e);
                self.report(Diagnostic::from(&e));
                self.state = VmState::HaltedCompileError;
                return Err(e.into());
            }
        };
        let result = self.interpret(&chunk);
        chunk.free();
        result
    }

    /// Releases the stack buffer. The VM can still be reused afterwards.
    pub fn free(&mut self) {
        self.stack.free();
        self.ip = 0;
        self.state = VmState::Ready;
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn output(&self) -> &O {
        &self.out
    }

    pub fn errors(&self) -> &E {
        &self.err
    }

    fn report(&mut self, d: Diagnostic) {
        let text = d.render(&self.config);
        if let Err(e) = self.err.write_all(text.as_bytes()).and_then(|_| self.err.flush()) {
            log::warn!("could not write diagnostic: {}", e);
        }
    }

    fn run(&mut self, chunk: &Chunk) -> Result<Value, RuntimeError> {
        loop {
            if self.config.trace_execution {
                self.trace(chunk);
            }

            let start = self.ip;
            match self.step(chunk) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(kind) => {
                    let line = chunk
                        .line_at(start)
                        .or_else(|| chunk.lines().last().copied())
                        .unwrap_or(0);
                    return Err(RuntimeError { kind, line });
                }
            }
        }
    }

    #[inline]
    fn read_byte(&mut self, chunk: &Chunk) -> VmResult<u8> {
        let byte = chunk.byte(self.ip).ok_or(VmError::UnexpectedEnd)?;
        self.ip += 1;
        Ok(byte)
    }

    /// Executes one instruction. Returns the program result on `OP_RETURN`.
    fn step(&mut self, chunk: &Chunk) -> VmResult<Option<Value>> {
        let byte = self.read_byte(chunk)?;
        let op = OpCode::try_from(byte).map_err(|UnknownOpcode(op)| VmError::UnknownOpcode { op })?;
        log::trace!("{:04} {}", self.ip - 1, op);

        match op {
            OpCode::Constant | OpCode::ConstantLong => {
                let index = chunk.read_constant_index(op, self.ip).ok_or(VmError::UnexpectedEnd)?;
                self.ip += op.operand_width();
                let value = chunk.constant(index).ok_or(VmError::ConstantOutOfRange { index })?;
                self.stack.push(value);
            }
            OpCode::Nil => self.stack.push(Value::Nil),
            OpCode::True => self.stack.push(Value::Bool(true)),
            OpCode::False => self.stack.push(Value::Bool(false)),
            OpCode::Pop => {
                self.stack.pop();
            }
            OpCode::Equal => {
                let b = self.stack.pop();
                let a = self.stack.pop();
                self.stack.push(Value::Bool(a == b));
            }
            OpCode::Greater => self.binary_op(|a, b| Value::Bool(a > b))?,
            OpCode::Less => self.binary_op(|a, b| Value::Bool(a < b))?,
            OpCode::Add => self.binary_op(|a, b| Value::Number(a + b))?,
            OpCode::Subtract => self.binary_op(|a, b| Value::Number(a - b))?,
            OpCode::Multiply => self.binary_op(|a, b| Value::Number(a * b))?,
            OpCode::Divide => self.binary_op(|a, b| Value::Number(a / b))?,
            OpCode::Not => {
                let v = self.stack.pop();
                self.stack.push(Value::Bool(v.is_falsey()));
            }
            OpCode::Negate => {
                let n = self.stack.peek(0).as_number().ok_or(VmError::OperandMustBeNumber)?;
                self.stack.pop();
                self.stack.push(Value::Number(-n));
            }
            OpCode::Print => {
                let v = self.stack.pop();
                writeln!(self.out, "{}", v).map_err(|e| VmError::Output { message: e.to_string() })?;
            }
            OpCode::Return => return Ok(Some(self.stack.pop())),
        }

        Ok(None)
    }

    /// Type-checks both operands in place before consuming them, so a
    /// failure leaves the stack untouched.
    #[inline]
    fn binary_op(&mut self, apply: impl FnOnce(f64, f64) -> Value) -> VmResult<()> {
        match (self.stack.peek(1).as_number(), self.stack.peek(0).as_number()) {
            (Some(a), Some(b)) => {
                self.stack.pop();
                self.stack.pop();
                self.stack.push(apply(a, b));
                Ok(())
            }
            _ => Err(VmError::OperandsMustBeNumbers),
        }
    }

    fn trace(&mut self, chunk: &Chunk) {
        if self.ip >= chunk.len() {
            return;
        }
        let written = debug::trace_stack(self.stack.as_slice(), &mut self.err)
            .and_then(|_| debug::disassemble_instruction(chunk, self.ip, &mut self.err).map(|_| ()));
        if let Err(e) = written {
            log::warn!("could not write trace: {}", e);
        }
    }
}
