//! Common test utilities shared between integration tests
//!
//! [`Machine`] is a minimal interpreter loop over a handful of i32
//! instructions. It drives the execution stack the way a real decoder does:
//! arguments are pushed before a call, frames are pushed and popped around
//! function bodies, and block labels unwind the operand stack on exit.

#![allow(dead_code)]

use execstack::runtime::{
    CallKind, Cursor, ExecutionStack, Label, LabelKind, LabelStack, ModuleAddr, Pc, StackConfig, StackError, Value,
};

/// Resume position of the entry call, returning to it ends the run
pub const HALT: Pc = Pc {
    func_idx: u32::MAX,
    ip: 0,
    end: 0,
};

#[derive(Debug, Clone, Copy)]
pub enum Op {
    I32Const(i32),
    LocalGet(usize),
    LocalSet(usize),
    I32Add,
    I32Sub,
    I32Mul,
    I32Eqz,
    Drop,
    /// Pop a condition, return from the function if it is non-zero
    ReturnIf,
    Call(u32),
    ReturnCall(u32),
    Block { params: usize, results: usize },
    End,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub params: usize,
    /// Zero-initialised locals after the parameters
    pub locals: usize,
    pub results: usize,
    pub body: Vec<Op>,
}

impl Function {
    pub fn new(params: usize, locals: usize, results: usize, body: Vec<Op>) -> Self {
        Function {
            params,
            locals,
            results,
            body,
        }
    }

    fn start(&self, func_idx: u32) -> Pc {
        Pc::new(func_idx, 0, self.body.len() as u32 - 1)
    }
}

pub struct Machine {
    pub stack: ExecutionStack,
    pub functions: Vec<Function>,
    labels: LabelStack,
    /// Label stack depth at entry of each active call
    label_bases: Vec<usize>,
    /// Deepest call stack seen during the last run
    pub max_frame_depth: usize,
    /// Operand stack height after each tail call of the last run
    pub tail_call_heights: Vec<usize>,
}

impl Machine {
    pub fn new(functions: Vec<Function>) -> Self {
        Self::with_config(functions, StackConfig::default())
    }

    pub fn with_config(functions: Vec<Function>, config: StackConfig) -> Self {
        Machine {
            stack: ExecutionStack::with_config(config),
            functions,
            labels: LabelStack::new(),
            label_bases: Vec::new(),
            max_frame_depth: 0,
            tail_call_heights: Vec::new(),
        }
    }

    /// Invoke `func_idx` with `args` and return its results
    ///
    /// On error the stack is reset, as any interpreter loop must do when it
    /// abandons an execution.
    pub fn invoke(&mut self, func_idx: u32, args: &[i32]) -> Result<Vec<Value>, StackError> {
        let result = self.run(func_idx, args);
        if result.is_err() {
            self.stack.reset();
            self.labels.clear();
            self.label_bases.clear();
        }
        result
    }

    fn run(&mut self, func_idx: u32, args: &[i32]) -> Result<Vec<Value>, StackError> {
        self.stack.reset();
        self.max_frame_depth = 0;
        self.tail_call_heights.clear();

        // base frame standing in for the host
        self.stack.push_frame(ModuleAddr(0), HALT, 0, 0, CallKind::Call)?;
        self.stack.push_all(args.iter().copied().map(Value::I32))?;
        let arity = self.functions[func_idx as usize].results;
        let mut pc = self.enter(func_idx, HALT, CallKind::Call)?;

        while pc != HALT {
            self.max_frame_depth = self.max_frame_depth.max(self.stack.frame_depth());
            let op = self.functions[pc.func_idx as usize].body[pc.ip as usize];
            pc = match op {
                Op::I32Const(v) => {
                    self.stack.push_native(v)?;
                    pc.next()
                }
                Op::LocalGet(idx) => {
                    let value = *self.stack.local(idx);
                    self.stack.push_value(value)?;
                    pc.next()
                }
                Op::LocalSet(idx) => {
                    let value = self.stack.pop();
                    *self.stack.local_mut(idx) = value;
                    pc.next()
                }
                Op::I32Add => self.binary(pc, i32::wrapping_add),
                Op::I32Sub => self.binary(pc, i32::wrapping_sub),
                Op::I32Mul => self.binary(pc, i32::wrapping_mul),
                Op::I32Eqz => {
                    let top = self.stack.top_mut();
                    *top = Value::I32((i32_of(top) == 0) as i32);
                    pc.next()
                }
                Op::Drop => {
                    self.stack.pop();
                    pc.next()
                }
                Op::ReturnIf => {
                    if i32_of(&self.stack.pop()) != 0 {
                        self.leave_function();
                        self.stack.pop_frame()
                    } else {
                        pc.next()
                    }
                }
                Op::Call(callee) => self.enter(callee, pc.next(), CallKind::Call)?,
                Op::ReturnCall(callee) => {
                    let next = self.enter(callee, pc, CallKind::TailCall)?;
                    self.tail_call_heights.push(self.stack.size());
                    next
                }
                Op::Block { params, results } => {
                    self.labels
                        .push(Label::enter(LabelKind::Block, &self.stack, params, results));
                    pc.next()
                }
                Op::End if pc.is_last() => {
                    self.leave_function();
                    self.stack.maybe_pop_frame(pc)
                }
                Op::End => {
                    if let Some(label) = self.labels.pop() {
                        self.stack.unwind_to_label(&label);
                    }
                    pc.next()
                }
            };
        }

        let results = self.stack.top_span(arity).to_vec();
        Ok(results)
    }

    /// Place the callee's zeroed locals and push (or reuse) its frame
    fn enter(&mut self, func_idx: u32, resume: Pc, kind: CallKind) -> Result<Pc, StackError> {
        let func = &self.functions[func_idx as usize];
        let (locals, arity, start) = (func.params + func.locals, func.results, func.start(func_idx));
        for _ in 0..func.locals {
            self.stack.push_native(0i32)?;
        }
        match kind {
            CallKind::Call => self.label_bases.push(self.labels.depth()),
            CallKind::TailCall => {
                let base = self.label_bases.last().copied().unwrap_or(0);
                while self.labels.depth() > base {
                    self.labels.pop();
                }
            }
        }
        self.stack.push_frame(ModuleAddr(func_idx as usize), resume, locals, arity, kind)?;
        Ok(start)
    }

    fn leave_function(&mut self) {
        let base = self.label_bases.pop().unwrap_or(0);
        while self.labels.depth() > base {
            self.labels.pop();
        }
    }

    fn binary(&mut self, pc: Pc, op: fn(i32, i32) -> i32) -> Pc {
        let rhs = i32_of(&self.stack.pop());
        let lhs = self.stack.top_mut();
        *lhs = Value::I32(op(i32_of(lhs), rhs));
        pc.next()
    }
}

pub fn i32_of(value: &Value) -> i32 {
    value.as_i32().expect("validated i32 operand")
}

/// sum(n, acc): tail recursive sum of 1..=n
pub fn tail_sum(func_idx: u32) -> Function {
    use Op::*;
    Function::new(
        2,
        0,
        1,
        vec![
            LocalGet(1),
            LocalGet(0),
            I32Eqz,
            ReturnIf,
            Drop,
            LocalGet(0),
            I32Const(1),
            I32Sub,
            LocalGet(1),
            LocalGet(0),
            I32Add,
            ReturnCall(func_idx),
            End,
        ],
    )
}

/// fact(n), recursing through ordinary calls
pub fn factorial(func_idx: u32) -> Function {
    use Op::*;
    Function::new(
        1,
        0,
        1,
        vec![
            I32Const(1),
            LocalGet(0),
            I32Eqz,
            ReturnIf,
            Drop,
            LocalGet(0),
            LocalGet(0),
            I32Const(1),
            I32Sub,
            Call(func_idx),
            I32Mul,
            End,
        ],
    )
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
