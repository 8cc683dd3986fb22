//! # lama-vm
//!
//! Interpreter for Lama stack-machine bytecode.
//!
//! - [`stack`] / [`frame`]: the operand stack and activation records
//! - [`vm`]: the dispatch loop, errors and configuration
//! - [`exec`]: instruction handlers
//! - [`trace`] / [`disasm`]: instruction traces and static listings

pub mod disasm;
pub mod exec;
pub mod frame;
pub mod gc_roots;
pub mod stack;
pub mod trace;
pub mod vm;

pub use stack::Stack;
pub use trace::{Tracer, WriterTracer};
pub use vm::{ExecResult, Fault, Vm, VmConfig, VmError};
