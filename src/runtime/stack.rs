//! WebAssembly execution stack
//!
//! [`ExecutionStack`] owns three stacks that move together:
//!
//! ```text
//!   values:  [ .. caller .. | locals (L) | working values ... ]
//!   tags:    [ .. caller .. | locals (L) | working values ... ]   (same length)
//!                           ^            ^
//!           value_base - locals       value_base
//!   frames:  [ base frame, ..., current frame ]
//! ```
//!
//! The stack trusts its caller. Code reaching it has been validated, so the
//! plain operations only check their preconditions in debug builds (or with
//! the `strict-invariants` feature) and panic on a broken one. The `try_*`
//! variants check everything and report a [`StackError`] instead, for
//! embedders that drive the stack with unvalidated input.
//!
//! Growth is the one failure validated code can still hit: pushes go through
//! `try_reserve` and the configured limits, and report resource exhaustion.

use super::config::StackConfig;
use super::frame::{Cursor, Frame, ModuleAddr, Pc};
use super::value::{NativeValue, TypeTag, Value};
use super::{contract_violation, StackError};

/// How [`ExecutionStack::push_frame`] enters the callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Push a new frame on top of the caller's
    Call,
    /// Replace the current frame, the call stack does not grow
    TailCall,
}

/// Operand, type tag and frame stacks of one execution context
#[derive(Debug)]
pub struct ExecutionStack<C = Pc> {
    pub(super) values: Vec<Value>,
    pub(super) tags: Vec<TypeTag>,
    pub(super) frames: Vec<Frame<C>>,
    config: StackConfig,
}

impl<C: Cursor> Default for ExecutionStack<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Cursor> ExecutionStack<C> {
    /// Create an empty stack with the default capacity hints
    pub fn new() -> Self {
        Self::with_config(StackConfig::default())
    }

    pub fn with_config(config: StackConfig) -> Self {
        ExecutionStack {
            values: Vec::with_capacity(config.value_capacity),
            tags: Vec::with_capacity(config.value_capacity),
            frames: Vec::with_capacity(config.frame_capacity),
            config,
        }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Number of values on the operand stack
    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of frames on the call stack
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame<C>] {
        &self.frames
    }

    pub fn current_frame(&self) -> Option<&Frame<C>> {
        self.frames.last()
    }

    /// Push a value with an explicit width tag
    pub fn push(&mut self, value: Value, tag: TypeTag) -> Result<(), StackError> {
        self.reserve_value()?;
        self.values.push(value);
        self.tags.push(tag);
        Ok(())
    }

    /// Push a value tagged by its variant
    pub fn push_value(&mut self, value: Value) -> Result<(), StackError> {
        self.push(value, value.tag())
    }

    /// Push a native value tagged by its storage size
    pub fn push_native<T: NativeValue>(&mut self, value: T) -> Result<(), StackError> {
        self.push(value.into(), TypeTag::of::<T>())
    }

    /// Push multiple values, each tagged by its variant
    pub fn push_all(&mut self, values: impl IntoIterator<Item = Value>) -> Result<(), StackError> {
        for value in values {
            self.push_value(value)?;
        }
        Ok(())
    }

    /// Pop the top value
    ///
    /// # Panics
    /// If the operand stack is empty.
    #[track_caller]
    pub fn pop(&mut self) -> Value {
        match self.values.pop() {
            Some(value) => {
                self.tags.pop();
                value
            }
            None => contract_violation(format_args!("pop from an empty operand stack")),
        }
    }

    pub fn try_pop(&mut self) -> Result<Value, StackError> {
        if self.values.is_empty() {
            return Err(StackError::StackUnderflow);
        }
        Ok(self.pop())
    }

    /// Top value of the stack
    #[track_caller]
    pub fn top(&self) -> &Value {
        self.top_n(1)
    }

    #[track_caller]
    pub fn top_mut(&mut self) -> &mut Value {
        self.top_n_mut(1)
    }

    /// The `offset`-th value from the top, `1` being the top itself
    ///
    /// # Panics
    /// Unless `1 <= offset <= size()`.
    #[track_caller]
    pub fn top_n(&self, offset: usize) -> &Value {
        assume!(
            0 < offset && offset <= self.values.len(),
            "top offset {offset} out of range for {} values",
            self.values.len()
        );
        &self.values[self.values.len() - offset]
    }

    #[track_caller]
    pub fn top_n_mut(&mut self, offset: usize) -> &mut Value {
        assume!(
            0 < offset && offset <= self.values.len(),
            "top offset {offset} out of range for {} values",
            self.values.len()
        );
        let idx = self.values.len() - offset;
        &mut self.values[idx]
    }

    pub fn try_top_n(&self, offset: usize) -> Result<&Value, StackError> {
        self.check_offset(offset)?;
        Ok(self.top_n(offset))
    }

    #[track_caller]
    pub fn top_tag(&self) -> TypeTag {
        self.top_tag_n(1)
    }

    /// Width tag of the `offset`-th value from the top
    #[track_caller]
    pub fn top_tag_n(&self, offset: usize) -> TypeTag {
        assume!(
            0 < offset && offset <= self.tags.len(),
            "tag offset {offset} out of range for {} tags",
            self.tags.len()
        );
        self.tags[self.tags.len() - offset]
    }

    /// Mutable width tag, for instructions that change a slot's type in place
    #[track_caller]
    pub fn top_tag_n_mut(&mut self, offset: usize) -> &mut TypeTag {
        assume!(
            0 < offset && offset <= self.tags.len(),
            "tag offset {offset} out of range for {} tags",
            self.tags.len()
        );
        let idx = self.tags.len() - offset;
        &mut self.tags[idx]
    }

    pub fn try_top_tag_n(&self, offset: usize) -> Result<TypeTag, StackError> {
        self.check_offset(offset)?;
        Ok(self.top_tag_n(offset))
    }

    /// The top `n` values, bottom to top
    #[track_caller]
    pub fn top_span(&self, n: usize) -> &[Value] {
        assume!(n <= self.values.len(), "span of {n} over {} values", self.values.len());
        &self.values[self.values.len() - n..]
    }

    #[track_caller]
    pub fn top_span_mut(&mut self, n: usize) -> &mut [Value] {
        assume!(n <= self.values.len(), "span of {n} over {} values", self.values.len());
        let start = self.values.len() - n;
        &mut self.values[start..]
    }

    /// Width tags of the top `n` values, bottom to top
    #[track_caller]
    pub fn top_tag_span(&self, n: usize) -> &[TypeTag] {
        assume!(n <= self.tags.len(), "span of {n} over {} tags", self.tags.len());
        &self.tags[self.tags.len() - n..]
    }

    pub fn try_top_span(&self, n: usize) -> Result<&[Value], StackError> {
        if n > self.values.len() {
            return Err(StackError::OffsetOutOfRange {
                offset: n,
                size: self.values.len(),
            });
        }
        Ok(self.top_span(n))
    }

    /// Remove the values between `begin` and `end` counted from the top,
    /// i.e. the range `[size() - begin, size() - end)`.
    ///
    /// A block exit with `n` results over a region of `m` values erases with
    /// `erase_range(m, n)`, keeping the results on top.
    ///
    /// # Panics
    /// Unless `end <= begin <= size()`.
    #[track_caller]
    pub fn erase_range(&mut self, begin: usize, end: usize) {
        assume!(
            end <= begin && begin <= self.values.len(),
            "erase range [{begin}, {end}) out of range for {} values",
            self.values.len()
        );
        let height = self.values.len();
        self.erase_absolute(height - begin, height - end);
    }

    pub fn try_erase_range(&mut self, begin: usize, end: usize) -> Result<(), StackError> {
        if end > begin || begin > self.values.len() {
            return Err(StackError::EraseOutOfRange {
                begin,
                end,
                size: self.values.len(),
            });
        }
        self.erase_range(begin, end);
        Ok(())
    }

    /// Enter a function.
    ///
    /// For [`CallKind::Call`] a new frame is pushed with its value base at the
    /// current height; the callee's arguments and locals sit directly below it.
    ///
    /// For [`CallKind::TailCall`] the current frame is reused: its locals and
    /// everything above them except the top `locals` values (the callee's
    /// arguments) are erased, and the frame takes the callee's module, locals
    /// and arity. The resume position is kept, so the callee returns straight
    /// to the original caller.
    ///
    /// # Errors
    /// Resource exhaustion when a new frame would exceed the frame limit or
    /// cannot be allocated.
    ///
    /// # Panics
    /// When the callee's `locals` values are not on the stack (above the
    /// current frame's region, for a tail call) or a tail call has no frame
    /// to reuse.
    #[track_caller]
    pub fn push_frame(
        &mut self,
        module: ModuleAddr,
        resume: C,
        locals: usize,
        arity: usize,
        kind: CallKind,
    ) -> Result<(), StackError> {
        match kind {
            CallKind::Call => {
                // checked in every build, frames rely on value_base >= locals
                if locals > self.values.len() {
                    contract_violation(format_args!(
                        "call with {locals} locals over {} values",
                        self.values.len()
                    ));
                }
                if let Some(limit) = self.config.max_frames {
                    if self.frames.len() >= limit {
                        log::warn!("call stack limit of {limit} frames reached");
                        return Err(StackError::CallStackExhausted { limit });
                    }
                }
                if self.frames.len() == self.frames.capacity() {
                    self.frames.try_reserve(1)?;
                }
                log::trace!(
                    "push frame {}: module {:?}, locals {locals}, arity {arity}, base {}",
                    self.frames.len(),
                    module,
                    self.values.len()
                );
                self.frames.push(Frame {
                    module,
                    resume,
                    locals,
                    arity,
                    value_base: self.values.len(),
                });
            }
            CallKind::TailCall => {
                self.unwind_current_frame(locals);
                let value_base = self.values.len();
                let frame = self.current_frame_mut();
                frame.module = module;
                frame.locals = locals;
                frame.arity = arity;
                frame.value_base = value_base;
                log::trace!("tail call: module {module:?}, locals {locals}, arity {arity}, base {value_base}");
            }
        }
        Ok(())
    }

    /// [`push_frame`](Self::push_frame) that reports a broken precondition
    /// instead of panicking: locals missing from the stack, or a tail call
    /// with no frame to reuse
    pub fn try_push_frame(
        &mut self,
        module: ModuleAddr,
        resume: C,
        locals: usize,
        arity: usize,
        kind: CallKind,
    ) -> Result<(), StackError> {
        match kind {
            CallKind::Call if locals > self.values.len() => {
                return Err(StackError::FrameRegion {
                    base: self.values.len(),
                    locals,
                    height: self.values.len(),
                    keep: 0,
                });
            }
            CallKind::Call => {}
            CallKind::TailCall => {
                let frame = self.frames.last().ok_or(StackError::NoActiveFrame)?;
                self.check_region(frame, locals)?;
            }
        }
        self.push_frame(module, resume, locals, arity, kind)
    }

    /// Leave the current function.
    ///
    /// Erases the frame's locals and working values, keeping its top `arity`
    /// results, pops the frame and returns where the caller resumes.
    ///
    /// # Panics
    /// With no active frame, or fewer than `arity` values above the frame's
    /// region.
    #[track_caller]
    pub fn pop_frame(&mut self) -> C {
        let arity = self.current_frame_mut().arity;
        self.unwind_current_frame(arity);
        match self.frames.pop() {
            Some(frame) => {
                log::trace!("pop frame {}: resume at {:?}", self.frames.len(), frame.resume);
                frame.resume
            }
            None => contract_violation(format_args!("pop_frame with no active frame")),
        }
    }

    pub fn try_pop_frame(&mut self) -> Result<C, StackError> {
        let frame = self.frames.last().ok_or(StackError::NoActiveFrame)?;
        self.check_region(frame, frame.arity)?;
        Ok(self.pop_frame())
    }

    /// Pop the current frame if `pc` ends its instruction sequence.
    ///
    /// The base frame is never popped here. Returns the caller's resume
    /// position when a frame was popped, `pc` otherwise.
    #[track_caller]
    pub fn maybe_pop_frame(&mut self, pc: C) -> C {
        if self.frames.len() > 1 && pc.is_last() {
            self.pop_frame()
        } else {
            pc
        }
    }

    /// [`maybe_pop_frame`](Self::maybe_pop_frame) that reports a frame too
    /// short for its results instead of panicking
    pub fn try_maybe_pop_frame(&mut self, pc: C) -> Result<C, StackError> {
        if self.frames.len() > 1 && pc.is_last() {
            self.try_pop_frame()
        } else {
            Ok(pc)
        }
    }

    /// Module instance of the current frame
    ///
    /// # Panics
    /// With no active frame.
    #[track_caller]
    pub fn module(&self) -> ModuleAddr {
        match self.frames.last() {
            Some(frame) => frame.module,
            None => contract_violation(format_args!("module lookup with no active frame")),
        }
    }

    pub fn try_module(&self) -> Result<ModuleAddr, StackError> {
        self.frames
            .last()
            .map(|frame| frame.module)
            .ok_or(StackError::NoActiveFrame)
    }

    /// Local slot `idx` of the current frame
    ///
    /// # Panics
    /// With no active frame, or `idx` not below the frame's local count.
    #[track_caller]
    pub fn local(&self, idx: usize) -> &Value {
        let (start, end) = self.locals_bounds(idx);
        &self.values[start..end][idx]
    }

    #[track_caller]
    pub fn local_mut(&mut self, idx: usize) -> &mut Value {
        let (start, end) = self.locals_bounds(idx);
        &mut self.values[start..end][idx]
    }

    pub fn try_local(&self, idx: usize) -> Result<&Value, StackError> {
        let pos = self.try_local_position(idx)?;
        Ok(&self.values[pos])
    }

    pub fn try_local_mut(&mut self, idx: usize) -> Result<&mut Value, StackError> {
        let pos = self.try_local_position(idx)?;
        Ok(&mut self.values[pos])
    }

    /// Clear all three stacks
    pub fn reset(&mut self) {
        if !self.values.is_empty() || !self.frames.is_empty() {
            log::debug!(
                "reset execution stack: {} values, {} frames",
                self.values.len(),
                self.frames.len()
            );
        }
        self.values.clear();
        self.tags.clear();
        self.frames.clear();
    }

    fn reserve_value(&mut self) -> Result<(), StackError> {
        if let Some(limit) = self.config.max_values {
            if self.values.len() >= limit {
                log::warn!("value stack limit of {limit} values reached");
                return Err(StackError::ValueStackExhausted { limit });
            }
        }
        if self.values.len() == self.values.capacity() {
            self.values.try_reserve(1)?;
        }
        if self.tags.len() == self.tags.capacity() {
            self.tags.try_reserve(1)?;
        }
        Ok(())
    }

    fn check_offset(&self, offset: usize) -> Result<(), StackError> {
        if offset == 0 || offset > self.values.len() {
            return Err(StackError::OffsetOutOfRange {
                offset,
                size: self.values.len(),
            });
        }
        Ok(())
    }

    /// Check that `frame` can unwind its region with `keep` values surviving
    fn check_region(&self, frame: &Frame<C>, keep: usize) -> Result<(), StackError> {
        let height = self.values.len();
        if !frame.is_well_formed() || keep > height || frame.region_start() > height - keep {
            return Err(StackError::FrameRegion {
                base: frame.value_base,
                locals: frame.locals,
                height,
                keep,
            });
        }
        Ok(())
    }

    /// Erase the current frame's locals and working values except the top
    /// `keep`. Shared by returns and tail calls.
    #[track_caller]
    fn unwind_current_frame(&mut self, keep: usize) {
        let frame = *self.current_frame_mut();
        assume!(
            frame.is_well_formed(),
            "frame base {} below its {} locals",
            frame.value_base,
            frame.locals
        );
        assume!(
            keep <= self.values.len() && frame.region_start() <= self.values.len() - keep,
            "frame region from {} cannot keep {keep} of {} values",
            frame.region_start(),
            self.values.len()
        );
        let end = self.values.len() - keep;
        self.erase_absolute(frame.region_start(), end);
    }

    #[track_caller]
    fn current_frame_mut(&mut self) -> &mut Frame<C> {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => contract_violation(format_args!("no active frame")),
        }
    }

    /// Bounds of the current frame's locals. Callers index the slice, so an
    /// out-of-range `idx` panics in every build.
    #[track_caller]
    fn locals_bounds(&self, idx: usize) -> (usize, usize) {
        let frame = match self.frames.last() {
            Some(frame) => frame,
            None => contract_violation(format_args!("local {idx} accessed with no active frame")),
        };
        assume!(idx < frame.locals, "local {idx} out of range for {} locals", frame.locals);
        match frame.value_base.checked_sub(frame.locals) {
            Some(start) => (start, frame.value_base),
            None => contract_violation(format_args!(
                "frame base {} below its {} locals",
                frame.value_base, frame.locals
            )),
        }
    }

    fn try_local_position(&self, idx: usize) -> Result<usize, StackError> {
        let frame = self.frames.last().ok_or(StackError::NoActiveFrame)?;
        if idx >= frame.locals {
            return Err(StackError::LocalOutOfRange {
                idx,
                locals: frame.locals,
            });
        }
        if !frame.is_well_formed() || frame.value_base > self.values.len() {
            return Err(StackError::FrameRegion {
                base: frame.value_base,
                locals: frame.locals,
                height: self.values.len(),
                keep: 0,
            });
        }
        Ok(frame.region_start() + idx)
    }

    fn erase_absolute(&mut self, start: usize, end: usize) {
        self.values.drain(start..end);
        self.tags.drain(start..end);
        assume!(
            self.values.len() == self.tags.len(),
            "value and tag stacks diverged: {} values, {} tags",
            self.values.len(),
            self.tags.len()
        );
    }
}
