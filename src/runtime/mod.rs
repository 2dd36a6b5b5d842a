//! WebAssembly execution state
//!
//! This module provides the stack machine state an interpreter loop drives:
//! the operand stack, its parallel width tag stack and the call frame stack,
//! along with labels for structured control flow and checkpoint support.

/// Check a precondition of an unchecked stack operation.
///
/// The check is compiled in for debug builds and for the `strict-invariants`
/// feature. Release builds rely on validation having happened upstream.
macro_rules! assume {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(any(debug_assertions, feature = "strict-invariants")) && !($cond) {
            $crate::runtime::contract_violation(format_args!($($arg)+));
        }
    };
}

pub mod config;
pub mod control;
pub mod frame;
pub mod snapshot;
pub mod stack;
pub mod value;

pub use config::StackConfig;
pub use control::{Label, LabelKind, LabelStack};
pub use frame::{Cursor, Frame, ModuleAddr, Pc};
pub use snapshot::Snapshot;
pub use stack::{CallKind, ExecutionStack};
pub use value::{NativeValue, TypeTag, Value};

use std::collections::TryReserveError;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack offset {offset} out of range for stack of {size} values")]
    OffsetOutOfRange { offset: usize, size: usize },
    #[error("Erase range [{begin}, {end}) from top out of range for stack of {size} values")]
    EraseOutOfRange { begin: usize, end: usize, size: usize },
    #[error("No active frame")]
    NoActiveFrame,
    #[error("Local {idx} out of range for frame with {locals} locals")]
    LocalOutOfRange { idx: usize, locals: usize },
    #[error("Label at height {height} with arity {arity} out of range for stack of {size} values")]
    LabelOutOfRange { height: usize, arity: usize, size: usize },
    #[error("Frame region underflow: base {base}, locals {locals}, height {height}, keep {keep}")]
    FrameRegion {
        base: usize,
        locals: usize,
        height: usize,
        keep: usize,
    },
    #[error("Value stack exhausted: limit of {limit} values reached")]
    ValueStackExhausted { limit: usize },
    #[error("Call stack exhausted: limit of {limit} frames reached")]
    CallStackExhausted { limit: usize },
    #[error("Out of memory growing stack: {0}")]
    OutOfMemory(#[from] TryReserveError),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StackError {
    /// True for errors that come from running out of stack space rather than
    /// from a broken caller
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            StackError::ValueStackExhausted { .. } | StackError::CallStackExhausted { .. } | StackError::OutOfMemory(_)
        )
    }
}

/// Abort on a broken stack precondition.
///
/// Validated code never reaches this, so hitting it means the validator or
/// decoder driving the stack has a bug.
#[cold]
#[track_caller]
pub(crate) fn contract_violation(args: fmt::Arguments<'_>) -> ! {
    log::error!("execution stack contract violation: {args}");
    panic!("execution stack contract violation: {args}");
}
