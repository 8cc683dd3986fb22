//! Pattern tests: PATT, TAG, ARRAY and FAIL.

use lama_common_core::{Mode, Module, Pattern, Value};
use lama_runtime::Runtime;

use crate::stack::Stack;
use crate::vm::VmError;

pub fn exec_patt<R: Runtime + ?Sized>(stack: &mut Stack, rt: &R, p: Pattern) -> Result<(), VmError> {
    let v = stack.pop(Mode::Opaque)?;
    let hit = match p {
        Pattern::StrEq => {
            let other = stack.pop(Mode::Opaque)?;
            rt.string_patt(v, other)
        }
        Pattern::String => rt.string_tag_patt(v),
        Pattern::Array => rt.array_tag_patt(v),
        Pattern::Sexp => rt.sexp_tag_patt(v),
        Pattern::Boxed => rt.boxed_patt(v),
        Pattern::Unboxed => rt.unboxed_patt(v),
        Pattern::Closure => rt.closure_tag_patt(v),
    };
    stack.push(Value::from_bool(hit), Mode::Integer)
}

pub fn exec_tag<R: Runtime + ?Sized>(
    stack: &mut Stack,
    rt: &R,
    module: &Module,
    tag: i32,
    arity: i32,
) -> Result<(), VmError> {
    let hash = rt.tag_hash(module.resolve_string(tag)?)?;
    let v = stack.pop(Mode::Opaque)?;
    stack.push(Value::from_bool(rt.tag(v, hash, arity as i64)), Mode::Integer)
}

pub fn exec_array_patt<R: Runtime + ?Sized>(stack: &mut Stack, rt: &R, len: i32) -> Result<(), VmError> {
    let v = stack.pop(Mode::Opaque)?;
    stack.push(Value::from_bool(rt.array_patt(v, len as i64)), Mode::Integer)
}

pub fn exec_fail<R: Runtime + ?Sized>(stack: &mut Stack, rt: &R, line: i32, col: i32) -> VmError {
    match stack.pop(Mode::Opaque) {
        Ok(v) => VmError::PatternMatchFailure {
            line,
            col,
            value: rt.render(v),
        },
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lama_common_core::ModuleBuilder;
    use lama_runtime::{Heap, IoHost};
    use std::io::{empty, Empty};

    fn heap() -> Heap<IoHost<Empty, Vec<u8>>> {
        Heap::new(IoHost::new(empty(), Vec::new()))
    }

    fn run_patt(rt: &Heap<IoHost<Empty, Vec<u8>>>, p: Pattern, operands: &[Value]) -> i64 {
        let mut s = Stack::new(8);
        for v in operands {
            s.push(*v, Mode::Opaque).unwrap();
        }
        exec_patt(&mut s, rt, p).unwrap();
        s.pop_int().unwrap()
    }

    #[test]
    fn test_kind_patterns() {
        let mut rt = heap();
        let s = rt.string(b"a");
        let a = rt.array(&[]);
        let clo = rt.closure(0, &[]);
        let n = Value::from_int(3);

        assert_eq!(run_patt(&rt, Pattern::String, &[s]), 1);
        assert_eq!(run_patt(&rt, Pattern::String, &[a]), 0);
        assert_eq!(run_patt(&rt, Pattern::Array, &[a]), 1);
        assert_eq!(run_patt(&rt, Pattern::Sexp, &[a]), 0);
        assert_eq!(run_patt(&rt, Pattern::Closure, &[clo]), 1);
        assert_eq!(run_patt(&rt, Pattern::Boxed, &[n]), 0);
        assert_eq!(run_patt(&rt, Pattern::Unboxed, &[n]), 1);
        assert_eq!(run_patt(&rt, Pattern::Boxed, &[s]), 1);
    }

    #[test]
    fn test_string_equality_consumes_both() {
        let mut rt = heap();
        let x = rt.string(b"abc");
        let y = rt.string(b"abc");
        let mut s = Stack::new(8);
        s.push(x, Mode::Reference).unwrap();
        s.push(y, Mode::Reference).unwrap();
        exec_patt(&mut s, &rt, Pattern::StrEq).unwrap();
        assert_eq!(s.pop_int().unwrap(), 1);
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn test_tag_and_array_arity() {
        let mut b = ModuleBuilder::new();
        let tag = b.string("Cons");
        let module = b.build().unwrap();
        let mut rt = heap();
        let h = rt.tag_hash(b"Cons").unwrap();
        let sx = rt.sexp(h, &[Value::from_int(1), Value::from_int(2)]);

        let mut s = Stack::new(8);
        s.push(sx, Mode::Reference).unwrap();
        exec_tag(&mut s, &rt, &module, tag, 2).unwrap();
        assert_eq!(s.pop_int().unwrap(), 1);
        s.push(sx, Mode::Reference).unwrap();
        exec_tag(&mut s, &rt, &module, tag, 1).unwrap();
        assert_eq!(s.pop_int().unwrap(), 0);

        let arr = rt.array(&[Value::from_int(1)]);
        s.push(arr, Mode::Reference).unwrap();
        exec_array_patt(&mut s, &rt, 1).unwrap();
        assert_eq!(s.pop_int().unwrap(), 1);
    }

    #[test]
    fn test_fail_renders_scrutinee() {
        let mut rt = heap();
        let v = rt.array(&[Value::from_int(5)]);
        let mut s = Stack::new(8);
        s.push(v, Mode::Reference).unwrap();
        match exec_fail(&mut s, &rt, 3, 7) {
            VmError::PatternMatchFailure { line, col, value } => {
                assert_eq!((line, col, value.as_str()), (3, 7, "[5]"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
