//! Execution state for a WebAssembly stack-machine interpreter.
//!
//! execstack holds the state an interpreter loop mutates while running
//! validated WebAssembly code: the operand stack, a parallel stack of width
//! tags, and the call frame stack. It does no decoding and knows nothing of
//! opcodes; the interpreter drives it through stack-discipline operations.
//!
//! # Modules
//!
//! - [`runtime::stack`] -- [`runtime::ExecutionStack`], operand and frame operations.
//! - [`runtime::value`] -- [`runtime::Value`] and its [`runtime::TypeTag`] width class.
//! - [`runtime::frame`] -- call frames, module addresses and resume cursors.
//! - [`runtime::control`] -- block labels and unwinding to them.
//! - [`runtime::snapshot`] -- checkpoint and restore.
//!
//! # Example
//!
//! Call a function taking one argument and returning one result:
//!
//! ```
//! use execstack::runtime::{CallKind, ExecutionStack, ModuleAddr, Pc, Value};
//!
//! let mut stack: ExecutionStack = ExecutionStack::new();
//! // the base frame stands in for the host
//! stack.push_frame(ModuleAddr(0), Pc::new(0, 0, 0), 0, 0, CallKind::Call).unwrap();
//!
//! // caller places the argument, then enters the callee
//! stack.push_value(Value::I32(20)).unwrap();
//! stack.push_frame(ModuleAddr(0), Pc::new(0, 1, 5), 1, 1, CallKind::Call).unwrap();
//!
//! // callee body: local.get 0, i32.const 22, i32.add
//! let arg = *stack.local(0);
//! stack.push_value(arg).unwrap();
//! stack.push_value(Value::I32(22)).unwrap();
//! let rhs = stack.pop().as_i32().unwrap();
//! let lhs = stack.top_mut();
//! *lhs = Value::I32(lhs.as_i32().unwrap() + rhs);
//!
//! // return: the argument is dropped, the result stays
//! assert_eq!(stack.pop_frame(), Pc::new(0, 1, 5));
//! assert_eq!(stack.top_span(stack.size()), &[Value::I32(42)]);
//! ```

pub mod runtime;
