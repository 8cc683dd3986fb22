//! Variable access: LD, LDA, ST, STI, STA and the stack shuffles.

use lama_common_core::{Mode, Value, Var, VarKind};
use lama_runtime::Runtime;

use crate::stack::Stack;
use crate::vm::VmError;

/// The closure running in the current frame.
pub fn current_closure<R: Runtime + ?Sized>(stack: &Stack, rt: &R) -> Result<Value, VmError> {
    let callee = stack.callee()?;
    if !rt.closure_tag_patt(callee) {
        return Err(VmError::NotAClosure(rt.render(callee)));
    }
    Ok(callee)
}

fn capture_index<R: Runtime + ?Sized>(rt: &R, closure: Value, index: i32) -> Result<i64, VmError> {
    let len = rt.length(closure)?;
    if index < 0 || index as i64 >= len {
        return Err(VmError::IndexOutOfRange {
            what: "capture",
            index: index as i64,
            limit: len.max(0) as usize,
        });
    }
    Ok(index as i64)
}

/// Stack slot a non-capture variable lives in.
pub fn var_slot(stack: &Stack, var: Var) -> Result<usize, VmError> {
    match var.kind {
        VarKind::Global => stack.global_slot(var.index),
        VarKind::Local => stack.local_slot(var.index),
        VarKind::Arg => stack.arg_slot(var.index),
        VarKind::Capture => Err(VmError::InvalidOperand(format!(
            "closure capture {} has no stack address",
            var
        ))),
    }
}

/// Read a variable without touching the stack.
pub fn read_var<R: Runtime + ?Sized>(stack: &Stack, rt: &R, var: Var) -> Result<Value, VmError> {
    match var.kind {
        VarKind::Capture => {
            let closure = current_closure(stack, rt)?;
            let i = capture_index(rt, closure, var.index)?;
            Ok(rt.capture(closure, i)?)
        }
        _ => stack.get(var_slot(stack, var)?, Mode::Opaque),
    }
}

pub fn exec_ld<R: Runtime + ?Sized>(stack: &mut Stack, rt: &R, var: Var) -> Result<(), VmError> {
    let v = read_var(stack, rt, var)?;
    stack.push(v, Mode::Opaque)
}

pub fn exec_lda(stack: &mut Stack, var: Var) -> Result<(), VmError> {
    let slot = var_slot(stack, var)?;
    stack.push(Value::slot_address(slot), Mode::Opaque)
}

/// The stored value stays on the stack.
pub fn exec_st<R: Runtime + ?Sized>(stack: &mut Stack, rt: &mut R, var: Var) -> Result<(), VmError> {
    let v = stack.peek(Mode::Opaque)?;
    match var.kind {
        VarKind::Capture => {
            let closure = current_closure(stack, rt)?;
            let i = capture_index(rt, closure, var.index)?;
            rt.set_capture(closure, i, v)?;
            Ok(())
        }
        _ => stack.set(var_slot(stack, var)?, v, Mode::Opaque),
    }
}

fn address_slot(stack: &Stack, addr: Value) -> Result<usize, VmError> {
    addr.as_slot_address()
        .filter(|&slot| slot < stack.capacity())
        .ok_or_else(|| VmError::InvalidOperand(format!("{:?} is not a variable address", addr)))
}

pub fn exec_sti(stack: &mut Stack) -> Result<(), VmError> {
    let v = stack.pop(Mode::Opaque)?;
    let addr = stack.pop(Mode::Opaque)?;
    let slot = address_slot(stack, addr)?;
    stack.set(slot, v, Mode::Opaque)?;
    stack.push(v, Mode::Opaque)
}

/// Store into an aggregate element (`agg idx v`) or, when the index
/// operand is a variable address, into that variable (`addr v`).
pub fn exec_sta<R: Runtime + ?Sized>(stack: &mut Stack, rt: &mut R) -> Result<(), VmError> {
    let v = stack.pop(Mode::Opaque)?;
    let index = stack.pop(Mode::Opaque)?;
    match index.as_int() {
        Some(i) => {
            let aggregate = stack.pop(Mode::Reference)?;
            rt.sta(aggregate, i, v)?;
        }
        None => {
            let slot = address_slot(stack, index)?;
            stack.set(slot, v, Mode::Opaque)?;
        }
    }
    stack.push(v, Mode::Opaque)
}

pub fn exec_dup(stack: &mut Stack) -> Result<(), VmError> {
    let v = stack.peek(Mode::Opaque)?;
    stack.push(v, Mode::Opaque)
}

pub fn exec_swap(stack: &mut Stack) -> Result<(), VmError> {
    let a = stack.pop(Mode::Opaque)?;
    let b = stack.pop(Mode::Opaque)?;
    stack.push(a, Mode::Opaque)?;
    stack.push(b, Mode::Opaque)
}
