//! WebAssembly call frame
//!
//! A frame marks the operand stack region owned by one function activation.
//! Locals live at the base of that region, directly below `value_base`.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Module instance address - index into the embedder's instance table
///
/// Frames only carry the address. The table that owns the instances is
/// managed by the instantiation logic and must outlive any frame that
/// refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleAddr(pub usize);

/// Resume position inside an instruction sequence
///
/// The stack treats cursors as opaque return addresses. The only question it
/// asks is whether the instruction under the cursor ends its sequence, which
/// drives the implicit return in [`ExecutionStack::maybe_pop_frame`].
///
/// [`ExecutionStack::maybe_pop_frame`]: super::stack::ExecutionStack::maybe_pop_frame
pub trait Cursor: Copy + Debug {
    /// True if the instruction at this position is the last of its sequence
    fn is_last(&self) -> bool;
}

/// A program counter into a function body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pc {
    /// Function index in the module
    pub func_idx: u32,
    /// Instruction index in the function body
    pub ip: u32,
    /// Index of the body's final `end` instruction
    pub end: u32,
}

impl Pc {
    pub fn new(func_idx: u32, ip: u32, end: u32) -> Self {
        Pc { func_idx, ip, end }
    }

    /// The position of the next instruction in the same body
    pub fn next(self) -> Self {
        Pc { ip: self.ip + 1, ..self }
    }
}

impl Cursor for Pc {
    fn is_last(&self) -> bool {
        self.ip >= self.end
    }
}

/// Call frame for one function activation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "C: Serialize", deserialize = "C: Deserialize<'de>"))]
pub struct Frame<C> {
    /// Module instance the running function belongs to
    pub module: ModuleAddr,
    /// Where the caller continues once this frame is popped
    pub resume: C,
    /// Number of local slots (parameters + declared locals) below `value_base`
    pub locals: usize,
    /// Number of values this function should return
    pub arity: usize,
    /// Operand stack height when the frame was created
    pub value_base: usize,
}

impl<C> Frame<C> {
    /// Operand stack height of the region below this frame's locals
    pub fn region_start(&self) -> usize {
        self.value_base - self.locals
    }

    /// True if `value_base - locals` does not underflow
    pub fn is_well_formed(&self) -> bool {
        self.value_base >= self.locals
    }
}
