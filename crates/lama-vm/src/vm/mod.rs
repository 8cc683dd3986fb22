//! The execution engine.

pub mod helpers;
mod types;

pub use types::*;

use lama_common_core::{Instruction, Mode, Module, Value};
use lama_runtime::Runtime;
use tracing::{debug, trace};

use crate::exec::{arith, array, call, io, load, pattern, string};
use crate::stack::Stack;
use crate::trace::Tracer;

/// Arguments the entry function is called with.
const ENTRY_ARGS: i64 = 2;

/// One interpreter instance: the module, its stack and the runtime it
/// calls into.
pub struct Vm<'m, R: Runtime> {
    module: &'m Module,
    runtime: R,
    stack: Stack,
    config: VmConfig,
    ip: usize,
    /// Offset of the instruction being executed.
    current: usize,
    line: Option<i32>,
    tracer: Option<Box<dyn Tracer + 'm>>,
    steps: u64,
}

impl<'m, R: Runtime> Vm<'m, R> {
    pub fn new(module: &'m Module, runtime: R) -> Self {
        Self::with_config(module, runtime, VmConfig::default())
    }

    pub fn with_config(module: &'m Module, runtime: R, config: VmConfig) -> Self {
        Self {
            module,
            runtime,
            stack: Stack::new(config.stack_capacity),
            config,
            ip: 0,
            current: 0,
            line: None,
            tracer: None,
            steps: 0,
        }
    }

    pub fn set_tracer(&mut self, tracer: impl Tracer + 'm) {
        self.tracer = Some(Box::new(tracer));
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run the configured entry point to completion. Returns the value left
    /// on top of the stack, or null if the stack is empty.
    pub fn run(&mut self) -> Result<Value, Fault> {
        self.prepare().map_err(|error| Fault {
            offset: None,
            line: None,
            error,
        })?;
        self.resume()
    }

    /// Reset the stack and seed the entry frame: globals, two boxed-zero
    /// arguments, a null callee slot and a null return address.
    pub fn prepare(&mut self) -> Result<(), VmError> {
        self.line = None;
        self.steps = 0;
        let entry = self
            .module
            .find_public(&self.config.entry)
            .ok_or_else(|| VmError::NoEntryPoint(self.config.entry.clone()))?;
        debug!(entry = %self.config.entry, offset = entry, "entry resolved");

        self.stack = Stack::new(self.config.stack_capacity);
        self.runtime.register_stack(self.stack.capacity());
        self.stack.reserve_globals(self.module.global_area_size())?;
        for _ in 0..ENTRY_ARGS {
            self.stack.push_int(0)?;
        }
        self.stack.push(Value::NULL, Mode::Opaque)?;
        self.stack.push(Value::NULL, Mode::Opaque)?;
        self.stack.gc_sync(&mut self.runtime);

        self.ip = entry;
        self.current = entry;
        Ok(())
    }

    /// Continue from the current instruction pointer until halt.
    pub fn resume(&mut self) -> Result<Value, Fault> {
        loop {
            match self.step() {
                Ok(ExecResult::Halt) => break,
                Ok(_) => continue,
                Err(e) => return Err(self.fault(e)),
            }
        }
        let result = self.stack.peek(Mode::Opaque).unwrap_or(Value::NULL);
        debug!(steps = self.steps, ?result, "halted");
        if let Some(t) = self.tracer.as_mut() {
            t.on_halt(result);
        }
        Ok(result)
    }

    fn fault(&self, error: VmError) -> Fault {
        Fault {
            offset: Some(self.current),
            line: self.line,
            error,
        }
    }

    /// Decode and execute one instruction.
    pub fn step(&mut self) -> Result<ExecResult, VmError> {
        let module = self.module;
        self.current = self.ip;
        let (inst, next) = Instruction::decode(module.code(), self.ip)?;
        trace!(offset = self.current, "{}", inst.display_with(module));
        if let Some(t) = self.tracer.as_mut() {
            t.on_instruction(self.current, &inst, module);
        }
        self.ip = next;
        self.steps += 1;

        let result = self.execute(&inst, next)?;
        if let ExecResult::Jump(target) = result {
            self.ip = target;
        }
        Ok(result)
    }

    fn execute(&mut self, inst: &Instruction, next: usize) -> Result<ExecResult, VmError> {
        let module = self.module;
        let stack = &mut self.stack;
        let rt = &mut self.runtime;

        match inst {
            Instruction::Binop(op) => arith::exec_binop(stack, *op)?,

            // ============ Misc ============
            Instruction::Const(n) => stack.push_int(*n as i64)?,
            Instruction::String(s) => string::exec_string(stack, rt, module, *s)?,
            Instruction::Sexp { tag, arity } => array::exec_sexp(stack, rt, module, *tag, *arity)?,
            Instruction::Sti => load::exec_sti(stack)?,
            Instruction::Sta => load::exec_sta(stack, rt)?,
            Instruction::Jmp(t) => return call::exec_jmp(module, *t),
            Instruction::End | Instruction::Ret => return call::exec_end(stack, rt),
            Instruction::Drop => {
                stack.pop(Mode::Opaque)?;
            }
            Instruction::Dup => load::exec_dup(stack)?,
            Instruction::Swap => load::exec_swap(stack)?,
            Instruction::Elem => array::exec_elem(stack, rt)?,

            // ============ Variables ============
            Instruction::Ld(v) => load::exec_ld(stack, rt, *v)?,
            Instruction::Lda(v) => load::exec_lda(stack, *v)?,
            Instruction::St(v) => load::exec_st(stack, rt, *v)?,

            // ============ Control ============
            Instruction::CJmpZ(t) => return call::exec_cjmp(stack, module, *t, true),
            Instruction::CJmpNz(t) => return call::exec_cjmp(stack, module, *t, false),
            Instruction::Begin { args, locals } | Instruction::CBegin { args, locals } => {
                call::exec_begin(stack, rt, *args, *locals)?
            }
            Instruction::Closure { target, captures } => {
                call::exec_closure(stack, rt, module, *target, captures)?
            }
            Instruction::CallC { args } => return call::exec_callc(stack, rt, module, *args, next),
            Instruction::Call { target, args } => {
                return call::exec_call(stack, module, *target, *args, next)
            }
            Instruction::Tag { tag, arity } => pattern::exec_tag(stack, rt, module, *tag, *arity)?,
            Instruction::Array(n) => pattern::exec_array_patt(stack, rt, *n)?,
            Instruction::Fail { line, col } => return Err(pattern::exec_fail(stack, rt, *line, *col)),
            Instruction::Line(n) => self.line = Some(*n),

            Instruction::Patt(p) => pattern::exec_patt(stack, rt, *p)?,

            // ============ Runtime calls ============
            Instruction::Read => io::exec_read(stack, rt)?,
            Instruction::Write => io::exec_write(stack, rt)?,
            Instruction::Length => array::exec_length(stack, rt)?,
            Instruction::Stringify => string::exec_stringify(stack, rt)?,
            Instruction::Barray(n) => array::exec_barray(stack, rt, *n)?,

            Instruction::Stop => return Ok(ExecResult::Halt),
        }
        Ok(ExecResult::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lama_common_core::ModuleBuilder;
    use lama_runtime::{Heap, IoHost};
    use pretty_assertions::assert_eq;
    use std::io::{empty, Empty};

    type TestHeap = Heap<IoHost<Empty, Vec<u8>>>;

    fn heap() -> TestHeap {
        Heap::new(IoHost::new(empty(), Vec::new()))
    }

    #[test]
    fn test_prepare_seeds_entry_frame() {
        let mut b = ModuleBuilder::new();
        b.globals(3);
        b.public("main", 0);
        b.emit(Instruction::Stop);
        let module = b.build().unwrap();
        let config = VmConfig {
            stack_capacity: 32,
            ..VmConfig::default()
        };
        let mut vm = Vm::with_config(&module, heap(), config);
        vm.prepare().unwrap();

        let s = vm.stack();
        assert_eq!(s.base(), 29);
        assert_eq!(s.depth(), 4);
        let top = s.top_slice(4).unwrap();
        assert!(top[0].is_null() && top[1].is_null());
        assert_eq!(top[2].as_int(), Some(0));
        assert_eq!(top[3].as_int(), Some(0));
        assert_eq!(vm.runtime().stack_capacity(), Some(32));
        assert_eq!(vm.runtime().reported_top(), Some(25));
    }

    #[test]
    fn test_missing_entry() {
        let mut b = ModuleBuilder::new();
        b.public("start", 0);
        b.emit(Instruction::Stop);
        let module = b.build().unwrap();
        let err = Vm::new(&module, heap()).run().unwrap_err();
        assert!(matches!(err.error, VmError::NoEntryPoint(ref name) if name == "main"));
        assert_eq!(err.offset, None);
        assert_eq!(err.to_string(), "no public entry point named \"main\"");
    }

    #[test]
    fn test_setup_fault_after_earlier_run_has_no_offset() {
        let mut b = ModuleBuilder::new();
        b.public("main", 0);
        b.globals(64);
        b.emit(Instruction::Const(1));
        b.emit(Instruction::Const(0));
        b.emit(Instruction::Binop(lama_common_core::BinOp::Div));
        let module = b.build().unwrap();
        let config = VmConfig { stack_capacity: 128, ..VmConfig::default() };
        let mut vm = Vm::with_config(&module, heap(), config);
        assert!(vm.run().unwrap_err().offset.is_some());

        vm.config.stack_capacity = 32;
        let err = vm.run().unwrap_err();
        assert!(matches!(err.error, VmError::StackOverflow { .. }));
        assert_eq!(err.offset, None);
        assert_eq!(err.line, None);
    }

    #[test]
    fn test_fault_carries_offset_and_line() {
        let mut b = ModuleBuilder::new();
        b.public("main", 0);
        b.emit(Instruction::Line(7));
        b.emit(Instruction::Const(1));
        b.emit(Instruction::Const(0));
        let at = b.emit(Instruction::Binop(lama_common_core::BinOp::Div));
        let module = b.build().unwrap();
        let err = Vm::new(&module, heap()).run().unwrap_err();
        assert_eq!(err.offset, Some(at as usize));
        assert_eq!(err.line, Some(7));
        assert!(matches!(err.error, VmError::DivisionByZero));
        assert_eq!(err.to_string(), format!("division by zero (at 0x{:08x}, line 7)", at));
    }

    #[test]
    fn test_running_off_the_end_is_truncation() {
        let mut b = ModuleBuilder::new();
        b.public("main", 0);
        b.emit(Instruction::Const(1));
        let module = b.build().unwrap();
        let err = Vm::new(&module, heap()).run().unwrap_err();
        assert!(matches!(err.error, VmError::TruncatedInstruction { offset: 5 }));
    }
}
