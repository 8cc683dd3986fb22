//! Aggregates: `Barray`, SEXP, ELEM, `Llength`.

use lama_common_core::{Mode, Module, Value};
use lama_runtime::Runtime;

use super::build_from_top;
use crate::stack::Stack;
use crate::vm::helpers::count;
use crate::vm::VmError;

pub fn exec_barray<R: Runtime + ?Sized>(stack: &mut Stack, rt: &mut R, n: i32) -> Result<(), VmError> {
    let n = count("array element", n)?;
    build_from_top(stack, rt, n, |rt, elems| rt.array(elems))
}

pub fn exec_sexp<R: Runtime + ?Sized>(
    stack: &mut Stack,
    rt: &mut R,
    module: &Module,
    tag: i32,
    arity: i32,
) -> Result<(), VmError> {
    let n = count("s-expression field", arity)?;
    let hash = rt.tag_hash(module.resolve_string(tag)?)?;
    build_from_top(stack, rt, n, |rt, fields| rt.sexp(hash, fields))
}

pub fn exec_elem<R: Runtime + ?Sized>(stack: &mut Stack, rt: &R) -> Result<(), VmError> {
    let index = stack.pop_int()?;
    let aggregate = stack.pop(Mode::Reference)?;
    let v = rt.elem(aggregate, index)?;
    stack.push(v, Mode::Opaque)
}

pub fn exec_length<R: Runtime + ?Sized>(stack: &mut Stack, rt: &R) -> Result<(), VmError> {
    let v = stack.pop(Mode::Reference)?;
    let len = rt.length(v)?;
    stack.push(Value::from_int(len), Mode::Integer)
}
