//! Interfaces the engine consumes: the runtime library and the collector.
//!
//! Allocating operations take slices straight out of the operand stack; the
//! engine reports its stack top through [`Collector`] before every one of
//! them, so a collection triggered inside sees the live region
//! `[top, capacity)` exactly.

use lama_common_core::Value;

use crate::error::RuntimeError;

/// Stack-boundary notifications for the garbage collector.
pub trait Collector {
    /// Called once before execution with the physical stack size in words.
    fn register_stack(&mut self, _capacity: usize) {}

    /// The live stack region is now `[top, capacity)`.
    fn report_stack_top(&mut self, top: usize);
}

/// Runtime support library.
///
/// Values cross this boundary tagged: integers boxed, references as handed
/// out by the allocating calls.
pub trait Runtime: Collector {
    // === Allocation (may collect) ===

    /// `Bstring`: fresh mutable string.
    fn string(&mut self, bytes: &[u8]) -> Value;

    /// `Barray`: array of `elems`, first element first.
    fn array(&mut self, elems: &[Value]) -> Value;

    /// `Bsexp`: s-expression with hashed `tag`.
    fn sexp(&mut self, tag: i64, fields: &[Value]) -> Value;

    /// `Bclosure`: closure entering at code offset `code`.
    fn closure(&mut self, code: usize, captures: &[Value]) -> Value;

    /// `Lstring`: printable representation of any value.
    fn stringify(&mut self, v: Value) -> Value;

    // === Access ===

    /// `Belem`: element `index` of a string, array or s-expression.
    fn elem(&self, aggregate: Value, index: i64) -> Result<Value, RuntimeError>;

    /// `Bsta`: store into element `index`.
    fn sta(&mut self, aggregate: Value, index: i64, value: Value) -> Result<(), RuntimeError>;

    /// `Llength`.
    fn length(&self, v: Value) -> Result<i64, RuntimeError>;

    /// Entry offset of a closure.
    fn closure_code(&self, closure: Value) -> Result<usize, RuntimeError>;

    fn capture(&self, closure: Value, index: i64) -> Result<Value, RuntimeError>;

    fn set_capture(&mut self, closure: Value, index: i64, v: Value) -> Result<(), RuntimeError>;

    // === Tags and patterns ===

    /// `LtagHash`.
    fn tag_hash(&self, name: &[u8]) -> Result<i64, RuntimeError>;

    /// `Btag`: s-expression with this tag and arity.
    fn tag(&self, v: Value, tag: i64, arity: i64) -> bool;

    /// `Barray_patt`: array of exactly `len` elements.
    fn array_patt(&self, v: Value, len: i64) -> bool;

    /// `Bstring_patt`: two strings with equal contents.
    fn string_patt(&self, x: Value, y: Value) -> bool;

    fn string_tag_patt(&self, v: Value) -> bool;

    fn array_tag_patt(&self, v: Value) -> bool;

    fn sexp_tag_patt(&self, v: Value) -> bool;

    fn closure_tag_patt(&self, v: Value) -> bool;

    fn boxed_patt(&self, v: Value) -> bool {
        !v.is_int()
    }

    fn unboxed_patt(&self, v: Value) -> bool {
        v.is_int()
    }

    // === I/O ===

    /// `Lread`: blocking read of one integer.
    fn read(&mut self) -> Result<i64, RuntimeError>;

    /// `Lwrite`.
    fn write(&mut self, n: i64) -> Result<(), RuntimeError>;

    /// Human-readable rendering, used in diagnostics.
    fn render(&self, v: Value) -> String;
}
