//! WebAssembly label stack for control flow
//!
//! See: <https://webassembly.github.io/spec/core/exec/runtime.html#labels>
//!
//! > "Labels carry an arity n and their associated branch target"
//!
//! A label records the operand stack height at block entry. Exiting or
//! branching to the block unwinds the operand stack to that height while
//! keeping the label's arity worth of values on top.

use super::frame::Cursor;
use super::stack::ExecutionStack;
use super::StackError;

/// Type of label construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Branches target the end of the block
    Block,
    /// Branches target the beginning of the loop
    Loop,
    If,
}

/// A label on the label stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub kind: LabelKind,
    /// Operand stack height below the block's parameters
    pub stack_height: usize,
    pub params: usize,
    pub results: usize,
}

impl Label {
    /// Label for a block entered at the current height of `stack`, whose
    /// `params` parameters are already on top of it
    pub fn enter<C: Cursor>(kind: LabelKind, stack: &ExecutionStack<C>, params: usize, results: usize) -> Self {
        Label {
            kind,
            stack_height: stack.size() - params,
            params,
            results,
        }
    }

    /// Number of values a branch to this label carries
    ///
    /// Branching to a loop restarts it, so it carries the loop's parameters.
    pub fn arity(&self) -> usize {
        if self.kind == LabelKind::Loop {
            self.params
        } else {
            self.results
        }
    }
}

/// The label stack for managing nested control structures
#[derive(Debug, Default)]
pub struct LabelStack {
    labels: Vec<Label>,
}

impl LabelStack {
    pub fn new() -> Self {
        LabelStack { labels: Vec::new() }
    }

    pub fn push(&mut self, label: Label) {
        self.labels.push(label);
    }

    /// Pop a label from the stack
    ///
    /// Used when exiting control constructs
    pub fn pop(&mut self) -> Option<Label> {
        self.labels.pop()
    }

    /// Get the nth label from the top (0 = top)
    pub fn get(&self, depth: u32) -> Option<&Label> {
        let len = self.labels.len();
        if depth as usize >= len {
            return None;
        }
        self.labels.get(len - 1 - depth as usize)
    }

    /// Resolve `br depth`: drop the labels the branch leaves and return the
    /// target. A loop target stays on the stack since the branch re-enters it.
    pub fn branch(&mut self, depth: u32) -> Option<Label> {
        let target = *self.get(depth)?;
        let keep = self.labels.len() - 1 - depth as usize;
        self.labels.truncate(if target.kind == LabelKind::Loop { keep + 1 } else { keep });
        Some(target)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Get the current depth (number of labels)
    pub fn depth(&self) -> usize {
        self.labels.len()
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }
}

impl<C: Cursor> ExecutionStack<C> {
    /// Unwind the operand stack to `label`'s entry height, keeping the top
    /// `label.arity()` values.
    ///
    /// # Panics
    /// If fewer than `label.arity()` values sit above the label's height.
    #[track_caller]
    pub fn unwind_to_label(&mut self, label: &Label) {
        assume!(
            label.stack_height + label.arity() <= self.size(),
            "label at height {} with arity {} over {} values",
            label.stack_height,
            label.arity(),
            self.size()
        );
        self.erase_range(self.size() - label.stack_height, label.arity());
    }

    pub fn try_unwind_to_label(&mut self, label: &Label) -> Result<(), StackError> {
        let fits = label
            .stack_height
            .checked_add(label.arity())
            .map_or(false, |top| top <= self.size());
        if !fits {
            return Err(StackError::LabelOutOfRange {
                height: label.stack_height,
                arity: label.arity(),
                size: self.size(),
            });
        }
        self.try_erase_range(self.size() - label.stack_height, label.arity())
    }
}
