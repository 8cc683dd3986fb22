//! Control transfer: jumps, calls, closures, prologue and epilogue.
//!
//! Both call forms leave `[ret][callee][arg0]..[argN-1]` on the stack,
//! `ret` on top, so `BEGIN` finds the same shape either way.

use lama_common_core::{Mode, Module, Value, Var};
use lama_runtime::Runtime;

use super::build_from_top;
use super::load::read_var;
use crate::stack::Stack;
use crate::vm::helpers::{check_target, count};
use crate::vm::{ExecResult, VmError};

pub fn exec_jmp(module: &Module, target: i32) -> Result<ExecResult, VmError> {
    Ok(ExecResult::Jump(check_target(module, target as i64)?))
}

/// `CJMPz` when `on_zero`, `CJMPnz` otherwise.
pub fn exec_cjmp(stack: &mut Stack, module: &Module, target: i32, on_zero: bool) -> Result<ExecResult, VmError> {
    let target = check_target(module, target as i64)?;
    let cond = stack.pop_int()?;
    if (cond == 0) == on_zero {
        Ok(ExecResult::Jump(target))
    } else {
        Ok(ExecResult::Continue)
    }
}

pub fn exec_begin<R: Runtime + ?Sized>(stack: &mut Stack, rt: &mut R, args: i32, locals: i32) -> Result<(), VmError> {
    stack.enter(count("argument", args)?, count("local", locals)?)?;
    stack.gc_sync(rt);
    Ok(())
}

pub fn exec_end<R: Runtime + ?Sized>(stack: &mut Stack, rt: &mut R) -> Result<ExecResult, VmError> {
    let ret = stack.leave()?;
    stack.gc_sync(rt);
    Ok(match ret {
        Some(ip) => ExecResult::Jump(ip),
        None => ExecResult::Halt,
    })
}

/// Static call. Arguments were pushed first to last.
pub fn exec_call(stack: &mut Stack, module: &Module, target: i32, args: i32, next_ip: usize) -> Result<ExecResult, VmError> {
    let target = check_target(module, target as i64)?;
    stack.reverse_top_n(count("argument", args)?)?;
    stack.push(Value::NULL, Mode::Opaque)?;
    stack.push(Value::code(next_ip), Mode::Opaque)?;
    Ok(ExecResult::Jump(target))
}

/// Closure call. The closure was pushed before its arguments.
pub fn exec_callc<R: Runtime + ?Sized>(
    stack: &mut Stack,
    rt: &R,
    module: &Module,
    args: i32,
    next_ip: usize,
) -> Result<ExecResult, VmError> {
    let n = count("argument", args)?;
    let closure = stack.top_slice(n + 1)?[n];
    if !rt.closure_tag_patt(closure) {
        return Err(VmError::NotAClosure(rt.render(closure)));
    }
    let target = check_target(module, rt.closure_code(closure)? as i64)?;

    // [aN-1 .. a0][clo] -> [a0 .. aN-1][clo] -> [clo][a0 .. aN-1]
    let window = stack.top_slice_mut(n + 1)?;
    window[..n].reverse();
    window.rotate_right(1);
    stack.push(Value::code(next_ip), Mode::Opaque)?;
    Ok(ExecResult::Jump(target))
}

/// Build a closure from the listed variables of the current frame.
pub fn exec_closure<R: Runtime + ?Sized>(
    stack: &mut Stack,
    rt: &mut R,
    module: &Module,
    target: i32,
    captures: &[Var],
) -> Result<(), VmError> {
    let code = check_target(module, target as i64)?;
    for var in captures {
        let v = read_var(stack, rt, *var)?;
        stack.push(v, Mode::Opaque)?;
    }
    build_from_top(stack, rt, captures.len(), |rt, values| rt.closure(code, values))
}
