//! Operand stack for the VM.

use crate::memory::GrowableBuffer;
use crate::value::Value;

/// LIFO working storage. Grows by the shared buffer rule, never shrinks
/// except through `free`.
#[derive(Debug, Default)]
pub struct Stack {
    values: GrowableBuffer<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Stack { values: GrowableBuffer::new() }
    }

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Removes and returns the top value.
    ///
    /// # Panics
    ///
    /// Panics on an empty stack. Well-formed chunks never pop more than they
    /// pushed, so underflow means the bytecode itself is broken.
    #[inline]
    pub fn pop(&mut self) -> Value {
        match self.values.pop() {
            Some(v) => v,
            None => panic!("operand stack underflow"),
        }
    }

    /// Reads the value `distance` slots below the top without removing it.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `distance + 1` values are on the stack.
    #[inline]
    pub fn peek(&self, distance: usize) -> Value {
        let len = self.values.len();
        if distance >= len {
            panic!("operand stack underflow: peek({distance}) with {len} values");
        }
        self.values[len - 1 - distance]
    }

    /// Drops every value; capacity is retained.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Releases the backing storage.
    pub fn free(&mut self) {
        self.values.free();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn as_slice(&self) -> &[Value] {
        self.values.as_slice()
    }
}
