//! BINOP: integer arithmetic, comparison and logic.

use lama_common_core::BinOp;

use crate::stack::Stack;
use crate::vm::VmError;

/// Arithmetic wraps at 63 bits; `/` and `%` truncate toward zero.
pub fn eval(op: BinOp, l: i64, r: i64) -> Result<i64, VmError> {
    let v = match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div | BinOp::Mod if r == 0 => return Err(VmError::DivisionByZero),
        BinOp::Div => l.wrapping_div(r),
        BinOp::Mod => l.wrapping_rem(r),
        BinOp::Lt => (l < r) as i64,
        BinOp::Le => (l <= r) as i64,
        BinOp::Gt => (l > r) as i64,
        BinOp::Ge => (l >= r) as i64,
        BinOp::Eq => (l == r) as i64,
        BinOp::Ne => (l != r) as i64,
        BinOp::And => (l != 0 && r != 0) as i64,
        BinOp::Or => (l != 0 || r != 0) as i64,
    };
    Ok(v)
}

#[inline]
pub fn exec_binop(stack: &mut Stack, op: BinOp) -> Result<(), VmError> {
    let r = stack.pop_int()?;
    let l = stack.pop_int()?;
    stack.push_int(eval(op, l, r)?)
}
