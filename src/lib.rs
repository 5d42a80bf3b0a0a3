//! ember — a compact stack-based bytecode virtual machine.
//!
//! A front end writes instructions and constants into a [`Chunk`]; the
//! [`Vm`] walks it byte by byte with an operand stack. The [`debug`]
//! module decodes the same encoding for dumps and execution traces.

pub mod chunk;
pub mod config;
pub mod debug;
pub mod diagnostic;
pub mod memory;
pub mod value;
pub mod vm;

pub use chunk::{Chunk, ChunkError, OpCode};
pub use config::{ErrorFormat, VmConfig};
pub use value::Value;
pub use vm::{Compile, CompileError, InterpretError, RuntimeError, Vm, VmError, VmState};
