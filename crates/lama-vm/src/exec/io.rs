//! `Lread` and `Lwrite`.

use lama_runtime::Runtime;

use crate::stack::Stack;
use crate::vm::VmError;

pub fn exec_read<R: Runtime + ?Sized>(stack: &mut Stack, rt: &mut R) -> Result<(), VmError> {
    let n = rt.read()?;
    stack.push_int(n)
}

/// Like every call, `Lwrite` leaves a result: boxed 0.
pub fn exec_write<R: Runtime + ?Sized>(stack: &mut Stack, rt: &mut R) -> Result<(), VmError> {
    let n = stack.pop_int()?;
    rt.write(n)?;
    stack.push_int(0)
}
