//! Tagged machine words.
//!
//! Every stack slot is one `Value`. The low bit separates the two kinds:
//!
//! - `...xxxx1` - unboxed integer, payload in the upper 63 bits
//! - `...xxx00` - heap reference handed out by the runtime library
//! - `...xxx10` - engine-internal address (return address or variable slot)
//! - `0`        - null; doubles as the "no caller" return address
//!
//! Only the first distinction is load-bearing for the collector: a word
//! with the low bit clear may point into the heap.

use core::fmt;

/// Access mode used by every stack primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Slot must hold an unboxed integer.
    Integer,
    /// Slot is expected to hold a heap reference; not enforced.
    Reference,
    /// No assertion at all.
    Opaque,
}

#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Value(i64);

impl Value {
    pub const NULL: Value = Value(0);

    /// `true` as produced by comparisons and pattern tests.
    pub const TRUE: Value = Value::from_int(1);
    pub const FALSE: Value = Value::from_int(0);

    /// Range of integers that survive boxing.
    pub const MIN_INT: i64 = -(1 << 62);
    pub const MAX_INT: i64 = (1 << 62) - 1;

    #[inline]
    pub const fn fits_int(n: i64) -> bool {
        n >= Self::MIN_INT && n <= Self::MAX_INT
    }

    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Value(raw)
    }

    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Box an integer. The top bit is lost, so arithmetic wraps at 63 bits.
    #[inline]
    pub const fn from_int(n: i64) -> Self {
        Value(((n as u64) << 1 | 1) as i64)
    }

    #[inline]
    pub const fn from_bool(b: bool) -> Self {
        Value::from_int(b as i64)
    }

    /// Unbox without checking the tag.
    #[inline]
    pub const fn int_unchecked(self) -> i64 {
        self.0 >> 1
    }

    /// Unbox, or `None` if the word holds a reference.
    #[inline]
    pub const fn as_int(self) -> Option<i64> {
        if self.is_int() {
            Some(self.0 >> 1)
        } else {
            None
        }
    }

    #[inline]
    pub const fn is_int(self) -> bool {
        self.0 & 1 == 1
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Heap reference shape: non-null, both low bits clear.
    #[inline]
    pub const fn is_heap_ref(self) -> bool {
        self.0 != 0 && self.0 & 0b11 == 0
    }

    // =========================================================================
    // Engine-internal addresses
    // =========================================================================

    /// Encode a code offset as a return address.
    #[inline]
    pub const fn code(offset: usize) -> Self {
        Value(((offset as i64) << 2) | 0b10)
    }

    /// Decode a return address. `None` for the terminal (null) word.
    #[inline]
    pub const fn as_code(self) -> Option<usize> {
        if self.0 & 0b11 == 0b10 {
            Some((self.0 >> 2) as usize)
        } else {
            None
        }
    }

    /// Encode the address of a stack slot (result of `LDA`).
    #[inline]
    pub const fn slot_address(index: usize) -> Self {
        Value::code(index)
    }

    #[inline]
    pub const fn as_slot_address(self) -> Option<usize> {
        self.as_code()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(n) = self.as_int() {
            write!(f, "Int({})", n)
        } else if self.is_null() {
            write!(f, "Null")
        } else if let Some(addr) = self.as_code() {
            write!(f, "Addr(0x{:x})", addr)
        } else {
            write!(f, "Ref(0x{:x})", self.0)
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::from_int(n)
    }
}
