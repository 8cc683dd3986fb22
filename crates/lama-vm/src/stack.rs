//! The operand stack.
//!
//! One fixed array serves as expression stack, frame stack and global
//! area. It grows toward index 0: `top` is the lowest occupied slot and an
//! empty stack has `top == capacity`. Globals occupy the highest
//! `globals` slots and sit below `base`, which pops never cross.

use lama_common_core::{Mode, Value};

use crate::vm::VmError;

#[derive(Debug)]
pub struct Stack {
    pub(crate) slots: Vec<Value>,
    pub(crate) top: usize,
    /// Lowest index of the global area; operands live in `[top, base)`.
    pub(crate) base: usize,
    pub(crate) fp: Option<usize>,
    /// Top moved since the collector last heard about it.
    pub(crate) dirty: bool,
}

#[inline]
fn check(mode: Mode, slot: usize, v: Value) -> Result<Value, VmError> {
    match mode {
        Mode::Integer if !v.is_int() => Err(VmError::TypeTagViolation { slot, found: v }),
        _ => Ok(v),
    }
}

impl Stack {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Value::NULL; capacity],
            top: capacity,
            base: capacity,
            fp: None,
            dirty: true,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the lowest occupied slot.
    #[inline]
    pub fn top_index(&self) -> usize {
        self.top
    }

    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub fn fp(&self) -> Option<usize> {
        self.fp
    }

    /// Number of operands above the global area.
    #[inline]
    pub fn depth(&self) -> usize {
        self.base - self.top
    }

    #[inline]
    pub fn global_count(&self) -> usize {
        self.capacity() - self.base
    }

    /// Reserve `count` global slots at the high end, initialised to boxed 0.
    pub fn reserve_globals(&mut self, count: usize) -> Result<(), VmError> {
        if count > self.capacity() {
            return Err(VmError::StackOverflow {
                capacity: self.capacity(),
            });
        }
        let capacity = self.capacity();
        self.base = capacity - count;
        self.top = self.base;
        self.fp = None;
        self.slots[self.base..].fill(Value::from_int(0));
        self.dirty = true;
        Ok(())
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    #[inline]
    pub fn push(&mut self, v: Value, mode: Mode) -> Result<(), VmError> {
        if self.top == 0 {
            return Err(VmError::StackOverflow {
                capacity: self.capacity(),
            });
        }
        let v = check(mode, self.top - 1, v)?;
        self.top -= 1;
        self.slots[self.top] = v;
        self.dirty = true;
        Ok(())
    }

    #[inline]
    pub fn push_int(&mut self, n: i64) -> Result<(), VmError> {
        self.push(Value::from_int(n), Mode::Integer)
    }

    #[inline]
    pub fn peek(&self, mode: Mode) -> Result<Value, VmError> {
        if self.top >= self.base {
            return Err(VmError::StackUnderflow);
        }
        check(mode, self.top, self.slots[self.top])
    }

    #[inline]
    pub fn pop(&mut self, mode: Mode) -> Result<Value, VmError> {
        let v = self.peek(mode)?;
        self.top += 1;
        self.dirty = true;
        Ok(v)
    }

    /// Pop an unboxed integer.
    #[inline]
    pub fn pop_int(&mut self) -> Result<i64, VmError> {
        self.pop(Mode::Integer).map(Value::int_unchecked)
    }

    pub fn get(&self, index: usize, mode: Mode) -> Result<Value, VmError> {
        let v = *self.slots.get(index).ok_or(VmError::IndexOutOfRange {
            what: "stack",
            index: index as i64,
            limit: self.capacity(),
        })?;
        check(mode, index, v)
    }

    pub fn set(&mut self, index: usize, v: Value, mode: Mode) -> Result<(), VmError> {
        let capacity = self.capacity();
        let v = check(mode, index, v)?;
        let slot = self.slots.get_mut(index).ok_or(VmError::IndexOutOfRange {
            what: "stack",
            index: index as i64,
            limit: capacity,
        })?;
        *slot = v;
        Ok(())
    }

    // =========================================================================
    // Bulk operations
    // =========================================================================

    fn require(&self, n: usize) -> Result<(), VmError> {
        if n > self.depth() {
            return Err(VmError::InsufficientOperands {
                needed: n,
                available: self.depth(),
            });
        }
        Ok(())
    }

    /// Reverse the top `n` operands in place. Afterwards the operand pushed
    /// first is at the top.
    pub fn reverse_top_n(&mut self, n: usize) -> Result<(), VmError> {
        self.top_slice_mut(n)?.reverse();
        Ok(())
    }

    /// The top `n` operands, topmost first.
    pub fn top_slice(&self, n: usize) -> Result<&[Value], VmError> {
        self.require(n)?;
        Ok(&self.slots[self.top..self.top + n])
    }

    pub fn top_slice_mut(&mut self, n: usize) -> Result<&mut [Value], VmError> {
        self.require(n)?;
        Ok(&mut self.slots[self.top..self.top + n])
    }

    /// Discard the top `n` operands.
    pub fn drop_n(&mut self, n: usize) -> Result<(), VmError> {
        self.require(n)?;
        self.top += n;
        self.dirty = true;
        Ok(())
    }

    /// The live region `[top, capacity)`, topmost first.
    pub fn live(&self) -> &[Value] {
        &self.slots[self.top..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(stack: &Stack) -> Vec<i64> {
        stack.live().iter().map(|v| v.int_unchecked()).collect()
    }

    #[test]
    fn test_push_pop() {
        let mut s = Stack::new(4);
        s.push_int(1).unwrap();
        s.push_int(2).unwrap();
        assert_eq!(s.top_index(), 2);
        assert_eq!(s.pop_int().unwrap(), 2);
        assert_eq!(s.pop_int().unwrap(), 1);
        assert!(matches!(s.pop(Mode::Opaque), Err(VmError::StackUnderflow)));
    }

    #[test]
    fn test_overflow() {
        let mut s = Stack::new(2);
        s.push_int(1).unwrap();
        s.push_int(2).unwrap();
        assert!(matches!(
            s.push_int(3),
            Err(VmError::StackOverflow { capacity: 2 })
        ));
        assert_eq!(s.top_index(), 0);
    }

    #[test]
    fn test_integer_mode_rejects_references() {
        let mut s = Stack::new(4);
        let r = Value::from_raw(0x40);
        assert!(matches!(
            s.push(r, Mode::Integer),
            Err(VmError::TypeTagViolation { .. })
        ));
        s.push(r, Mode::Reference).unwrap();
        assert!(matches!(
            s.peek(Mode::Integer),
            Err(VmError::TypeTagViolation { slot: 3, .. })
        ));
        assert_eq!(s.pop(Mode::Opaque).unwrap(), r);
    }

    #[test]
    fn test_get_set_bounds() {
        let mut s = Stack::new(4);
        s.set(3, Value::from_int(9), Mode::Integer).unwrap();
        assert_eq!(s.get(3, Mode::Integer).unwrap(), Value::from_int(9));
        assert!(matches!(
            s.get(4, Mode::Opaque),
            Err(VmError::IndexOutOfRange { index: 4, limit: 4, .. })
        ));
        assert!(matches!(
            s.set(usize::MAX, Value::NULL, Mode::Opaque),
            Err(VmError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_reverse_top_n() {
        let mut s = Stack::new(8);
        for n in 1..=4 {
            s.push_int(n).unwrap();
        }
        s.reverse_top_n(3).unwrap();
        assert_eq!(ints(&s), vec![2, 3, 4, 1]);
        assert!(matches!(
            s.reverse_top_n(5),
            Err(VmError::InsufficientOperands { needed: 5, available: 4 })
        ));
        s.reverse_top_n(0).unwrap();
    }

    #[test]
    fn test_globals_are_below_base() {
        let mut s = Stack::new(8);
        s.reserve_globals(3).unwrap();
        assert_eq!(s.base(), 5);
        assert_eq!(s.depth(), 0);
        assert_eq!(s.global_count(), 3);
        assert!(matches!(s.pop(Mode::Opaque), Err(VmError::StackUnderflow)));
        assert!(matches!(s.drop_n(1), Err(VmError::InsufficientOperands { .. })));
        assert!(s.reserve_globals(9).is_err());
    }
}
