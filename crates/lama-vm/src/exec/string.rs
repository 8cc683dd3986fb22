//! String literals and `Lstring`.

use lama_common_core::{Mode, Module};
use lama_runtime::Runtime;

use crate::stack::Stack;
use crate::vm::VmError;

pub fn exec_string<R: Runtime + ?Sized>(
    stack: &mut Stack,
    rt: &mut R,
    module: &Module,
    offset: i32,
) -> Result<(), VmError> {
    let bytes = module.resolve_string(offset)?;
    stack.gc_sync(rt);
    let s = rt.string(bytes);
    stack.push(s, Mode::Reference)
}

/// The operand stays on the stack while its rendering is allocated.
pub fn exec_stringify<R: Runtime + ?Sized>(stack: &mut Stack, rt: &mut R) -> Result<(), VmError> {
    let v = stack.peek(Mode::Opaque)?;
    stack.gc_sync(rt);
    let s = rt.stringify(v);
    stack.pop(Mode::Opaque)?;
    stack.push(s, Mode::Reference)
}
