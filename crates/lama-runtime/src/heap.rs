//! Reference runtime library: an object arena that never collects.
//!
//! Handles are `(index + 1) << 2`, which keeps the low two bits clear and
//! never produces the null word.

use std::io::{Stdout, StdinLock};

use lama_common_core::Value;
use tracing::{debug, trace};

use crate::api::{Collector, Runtime};
use crate::error::RuntimeError;
use crate::host::{Host, IoHost};
use crate::objects::{self, Object};
use crate::tag;

pub type StdioHeap = Heap<IoHost<StdinLock<'static>, Stdout>>;

pub struct Heap<H> {
    objects: Vec<Object>,
    host: H,
    stack_capacity: Option<usize>,
    reported_top: Option<usize>,
    /// Reported top at the most recent allocation.
    last_alloc_top: Option<usize>,
    allocations: usize,
}

impl StdioHeap {
    pub fn stdio() -> Self {
        Heap::new(IoHost::stdio())
    }
}

impl<H: Host> Heap<H> {
    pub fn new(host: H) -> Self {
        Self {
            objects: Vec::new(),
            host,
            stack_capacity: None,
            reported_top: None,
            last_alloc_top: None,
            allocations: 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn stack_capacity(&self) -> Option<usize> {
        self.stack_capacity
    }

    pub fn reported_top(&self) -> Option<usize> {
        self.reported_top
    }

    pub fn last_alloc_top(&self) -> Option<usize> {
        self.last_alloc_top
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Resolve a handle. `None` for integers, addresses and unknown handles.
    pub fn get(&self, v: Value) -> Option<&Object> {
        self.index_of(v).and_then(|i| self.objects.get(i))
    }

    fn index_of(&self, v: Value) -> Option<usize> {
        if v.is_heap_ref() {
            Some((v.raw() as u64 >> 2) as usize - 1)
        } else {
            None
        }
    }

    fn object(&self, v: Value) -> Result<&Object, RuntimeError> {
        let i = self.index_of(v).ok_or(RuntimeError::NotAReference(v))?;
        self.objects.get(i).ok_or(RuntimeError::Dangling(v))
    }

    fn object_mut(&mut self, v: Value) -> Result<&mut Object, RuntimeError> {
        let i = self.index_of(v).ok_or(RuntimeError::NotAReference(v))?;
        self.objects.get_mut(i).ok_or(RuntimeError::Dangling(v))
    }

    fn alloc(&mut self, obj: Object) -> Value {
        self.last_alloc_top = self.reported_top;
        self.allocations += 1;
        let index = self.objects.len();
        trace!(kind = obj.kind_name(), index, "alloc");
        self.objects.push(obj);
        Value::from_raw(((index as i64) + 1) << 2)
    }

    fn closure_parts(&self, op: &'static str, v: Value) -> Result<(usize, &[Value]), RuntimeError> {
        match self.object(v)? {
            Object::Closure { code, captures } => Ok((*code, captures.as_slice())),
            other => Err(wrong_kind(op, "closure", other)),
        }
    }
}

fn wrong_kind(op: &'static str, expected: &'static str, found: &Object) -> RuntimeError {
    RuntimeError::WrongKind {
        op,
        expected,
        found: found.kind_name(),
    }
}

fn checked_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or(RuntimeError::IndexOutOfBounds { index, len })
}

impl<H> Collector for Heap<H> {
    fn register_stack(&mut self, capacity: usize) {
        debug!(capacity, "stack registered");
        self.stack_capacity = Some(capacity);
    }

    fn report_stack_top(&mut self, top: usize) {
        self.reported_top = Some(top);
    }
}

impl<H: Host> Runtime for Heap<H> {
    // === Allocation ===

    fn string(&mut self, bytes: &[u8]) -> Value {
        self.alloc(Object::String(bytes.to_vec()))
    }

    fn array(&mut self, elems: &[Value]) -> Value {
        self.alloc(Object::Array(elems.to_vec()))
    }

    fn sexp(&mut self, tag: i64, fields: &[Value]) -> Value {
        self.alloc(Object::Sexp {
            tag,
            fields: fields.to_vec(),
        })
    }

    fn closure(&mut self, code: usize, captures: &[Value]) -> Value {
        self.alloc(Object::Closure {
            code,
            captures: captures.to_vec(),
        })
    }

    fn stringify(&mut self, v: Value) -> Value {
        let text = self.render(v);
        self.alloc(Object::String(text.into_bytes()))
    }

    // === Access ===

    fn elem(&self, aggregate: Value, index: i64) -> Result<Value, RuntimeError> {
        match self.object(aggregate)? {
            Object::String(bytes) => {
                let i = checked_index(index, bytes.len())?;
                Ok(Value::from_int(bytes[i] as i64))
            }
            Object::Array(items) | Object::Sexp { fields: items, .. } => {
                let i = checked_index(index, items.len())?;
                Ok(items[i])
            }
            other => Err(wrong_kind("elem", "string, array or sexp", other)),
        }
    }

    fn sta(&mut self, aggregate: Value, index: i64, value: Value) -> Result<(), RuntimeError> {
        match self.object_mut(aggregate)? {
            Object::String(bytes) => {
                let i = checked_index(index, bytes.len())?;
                let n = value.as_int().ok_or(RuntimeError::NotAByte(value.raw()))?;
                bytes[i] = u8::try_from(n).map_err(|_| RuntimeError::NotAByte(n))?;
                Ok(())
            }
            Object::Array(items) | Object::Sexp { fields: items, .. } => {
                let i = checked_index(index, items.len())?;
                items[i] = value;
                Ok(())
            }
            other => Err(wrong_kind("sta", "string, array or sexp", other)),
        }
    }

    fn length(&self, v: Value) -> Result<i64, RuntimeError> {
        Ok(self.object(v)?.len() as i64)
    }

    fn closure_code(&self, closure: Value) -> Result<usize, RuntimeError> {
        self.closure_parts("callc", closure).map(|(code, _)| code)
    }

    fn capture(&self, closure: Value, index: i64) -> Result<Value, RuntimeError> {
        let (_, captures) = self.closure_parts("ld", closure)?;
        let i = checked_index(index, captures.len())?;
        Ok(captures[i])
    }

    fn set_capture(&mut self, closure: Value, index: i64, v: Value) -> Result<(), RuntimeError> {
        match self.object_mut(closure)? {
            Object::Closure { captures, .. } => {
                let i = checked_index(index, captures.len())?;
                captures[i] = v;
                Ok(())
            }
            other => Err(wrong_kind("st", "closure", other)),
        }
    }

    // === Tags and patterns ===

    fn tag_hash(&self, name: &[u8]) -> Result<i64, RuntimeError> {
        tag::tag_hash(name)
    }

    fn tag(&self, v: Value, tag: i64, arity: i64) -> bool {
        matches!(self.get(v), Some(Object::Sexp { tag: t, fields })
            if *t == tag && fields.len() as i64 == arity)
    }

    fn array_patt(&self, v: Value, len: i64) -> bool {
        matches!(self.get(v), Some(Object::Array(items)) if items.len() as i64 == len)
    }

    fn string_patt(&self, x: Value, y: Value) -> bool {
        match (self.get(x), self.get(y)) {
            (Some(Object::String(a)), Some(Object::String(b))) => a == b,
            _ => false,
        }
    }

    fn string_tag_patt(&self, v: Value) -> bool {
        matches!(self.get(v), Some(Object::String(_)))
    }

    fn array_tag_patt(&self, v: Value) -> bool {
        matches!(self.get(v), Some(Object::Array(_)))
    }

    fn sexp_tag_patt(&self, v: Value) -> bool {
        matches!(self.get(v), Some(Object::Sexp { .. }))
    }

    fn closure_tag_patt(&self, v: Value) -> bool {
        matches!(self.get(v), Some(Object::Closure { .. }))
    }

    // === I/O ===

    fn read(&mut self) -> Result<i64, RuntimeError> {
        self.host.read_int()
    }

    fn write(&mut self, n: i64) -> Result<(), RuntimeError> {
        self.host.write_int(n)
    }

    fn render(&self, v: Value) -> String {
        objects::render(v, &|v| self.get(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    type TestHeap = Heap<IoHost<Cursor<Vec<u8>>, Vec<u8>>>;

    fn heap(input: &str) -> TestHeap {
        Heap::new(IoHost::new(Cursor::new(input.as_bytes().to_vec()), Vec::new()).without_prompt())
    }

    fn ints(ns: &[i64]) -> Vec<Value> {
        ns.iter().map(|&n| Value::from_int(n)).collect()
    }

    #[test]
    fn test_handles_are_references() {
        let mut h = heap("");
        let a = h.array(&ints(&[1]));
        let b = h.string(b"x");
        assert!(a.is_heap_ref() && b.is_heap_ref());
        assert_ne!(a, b);
        assert_eq!(h.allocations(), 2);
    }

    #[test]
    fn test_elem_and_sta() {
        let mut h = heap("");
        let arr = h.array(&ints(&[10, 20, 30]));
        assert_eq!(h.elem(arr, 1).unwrap(), Value::from_int(20));
        h.sta(arr, 1, Value::from_int(99)).unwrap();
        assert_eq!(h.elem(arr, 1).unwrap(), Value::from_int(99));
        assert!(matches!(
            h.elem(arr, 3),
            Err(RuntimeError::IndexOutOfBounds { index: 3, len: 3 })
        ));
        assert!(matches!(h.elem(arr, -1), Err(RuntimeError::IndexOutOfBounds { .. })));

        let s = h.string(b"abc");
        assert_eq!(h.elem(s, 0).unwrap(), Value::from_int('a' as i64));
        h.sta(s, 0, Value::from_int('z' as i64)).unwrap();
        assert_eq!(h.render(s), "\"zbc\"");
        assert!(matches!(h.sta(s, 0, Value::from_int(300)), Err(RuntimeError::NotAByte(300))));
    }

    #[test]
    fn test_non_reference_is_rejected() {
        let h = heap("");
        assert!(matches!(
            h.elem(Value::from_int(3), 0),
            Err(RuntimeError::NotAReference(_))
        ));
        assert!(matches!(
            h.length(Value::from_raw(0x400)),
            Err(RuntimeError::Dangling(_))
        ));
    }

    #[test]
    fn test_closure_captures() {
        let mut h = heap("");
        let c = h.closure(0x40, &ints(&[7, 8]));
        assert_eq!(h.closure_code(c).unwrap(), 0x40);
        assert_eq!(h.capture(c, 1).unwrap(), Value::from_int(8));
        h.set_capture(c, 0, Value::from_int(1)).unwrap();
        assert_eq!(h.capture(c, 0).unwrap(), Value::from_int(1));
        assert!(h.closure_tag_patt(c));

        let arr = h.array(&[]);
        assert!(matches!(
            h.closure_code(arr),
            Err(RuntimeError::WrongKind { expected: "closure", found: "array", .. })
        ));
    }

    #[test]
    fn test_patterns() {
        let mut h = heap("");
        let cons = h.tag_hash(b"cons").unwrap();
        let sx = h.sexp(cons, &ints(&[1, 2]));
        assert!(h.tag(sx, cons, 2));
        assert!(!h.tag(sx, cons, 1));
        assert!(h.sexp_tag_patt(sx));
        assert!(!h.array_tag_patt(sx));

        let a = h.string(b"foo");
        let b = h.string(b"foo");
        let c = h.string(b"bar");
        assert!(h.string_patt(a, b));
        assert!(!h.string_patt(a, c));
        assert!(!h.string_patt(Value::from_int(1), a));

        let arr = h.array(&ints(&[1, 2]));
        assert!(h.array_patt(arr, 2));
        assert!(!h.array_patt(sx, 2));
        assert!(h.boxed_patt(arr));
        assert!(h.unboxed_patt(Value::from_int(5)));
    }

    #[test]
    fn test_stringify() {
        let mut h = heap("");
        let some = h.tag_hash(b"Some").unwrap();
        let inner = h.string(b"a");
        let sx = h.sexp(some, &[inner, Value::from_int(3)]);
        let s = h.stringify(sx);
        assert_eq!(h.get(s), Some(&Object::String(b"Some (\"a\", 3)".to_vec())));
    }

    #[test]
    fn test_records_reported_top_at_allocation() {
        let mut h = heap("");
        h.register_stack(16);
        h.report_stack_top(12);
        h.array(&[]);
        assert_eq!(h.last_alloc_top(), Some(12));
        h.report_stack_top(10);
        assert_eq!(h.last_alloc_top(), Some(12));
        assert_eq!(h.reported_top(), Some(10));
        assert_eq!(h.stack_capacity(), Some(16));
    }

    #[test]
    fn test_io_through_host() {
        let mut h = heap("4\n");
        assert_eq!(h.read().unwrap(), 4);
        h.write(-2).unwrap();
        assert_eq!(h.into_host().into_output(), b"-2\n");
    }
}
