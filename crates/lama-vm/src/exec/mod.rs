//! Instruction handlers, grouped by what they touch.

pub mod arith;
pub mod array;
pub mod call;
pub mod io;
pub mod load;
pub mod pattern;
pub mod string;

use lama_common_core::{Mode, Value};
use lama_runtime::Runtime;

use crate::stack::Stack;
use crate::vm::VmError;

/// Replace the top `n` operands with an object built from them.
///
/// The operands are put in push order and the top is reported first, so the
/// runtime sees the exact live stack while it allocates.
pub(crate) fn build_from_top<R, F>(stack: &mut Stack, rt: &mut R, n: usize, build: F) -> Result<(), VmError>
where
    R: Runtime + ?Sized,
    F: FnOnce(&mut R, &[Value]) -> Value,
{
    stack.reverse_top_n(n)?;
    stack.gc_sync(rt);
    let obj = build(rt, stack.top_slice(n)?);
    stack.drop_n(n)?;
    stack.push(obj, Mode::Reference)
}
