//! Activation records.
//!
//! Layout relative to `fp`, which stays fixed for the frame's lifetime:
//!
//! ```text
//! fp + 3 + k   argument k
//! fp + 2       callee slot: closure for CALLC, placeholder for CALL
//! fp + 1       argument count
//! fp           saved fp (-1: no caller frame)
//! fp - 1       return address (null: return to host)
//! fp - 2       local count
//! fp - 3 - k   local k, initialised to -1
//! ```

use lama_common_core::{Mode, Value};

use crate::stack::Stack;
use crate::vm::VmError;

/// Slots `enter` pushes besides the locals.
const FRAME_HEADER: usize = 4;

impl Stack {
    /// Function prologue. Expects the return address on top, the callee slot
    /// beneath it and `args` arguments beneath that.
    pub fn enter(&mut self, args: usize, locals: usize) -> Result<(), VmError> {
        let needed = args.saturating_add(2);
        if needed > self.depth() {
            return Err(VmError::InsufficientOperands {
                needed,
                available: self.depth(),
            });
        }
        // One slot is freed by popping the return address.
        if locals.saturating_add(FRAME_HEADER) > self.top + 1 {
            return Err(VmError::StackOverflow {
                capacity: self.capacity(),
            });
        }

        let ret = self.pop(Mode::Opaque)?;
        let saved = self.fp.map_or(-1, |fp| fp as i64);
        self.push_int(args as i64)?;
        self.push_int(saved)?;
        self.fp = Some(self.top);
        self.push(ret, Mode::Opaque)?;
        self.push_int(locals as i64)?;
        for _ in 0..locals {
            self.push_int(-1)?;
        }
        Ok(())
    }

    /// Function epilogue. Pops the result, discards the frame with its
    /// callee slot and arguments, restores the caller's `fp` and pushes the
    /// result back. Returns the return address; `None` means there is no
    /// caller and execution should halt.
    ///
    /// Without an active frame the stack is cut back to its base.
    pub fn leave(&mut self) -> Result<Option<usize>, VmError> {
        let result = self.pop(Mode::Opaque)?;
        let Some(fp) = self.fp else {
            self.top = self.base;
            self.dirty = true;
            self.push(result, Mode::Opaque)?;
            return Ok(None);
        };

        let ret = self.get(fp.checked_sub(1).ok_or(VmError::StackUnderflow)?, Mode::Opaque)?;
        let saved = self.get(fp, Mode::Integer)?.int_unchecked();
        let args = self.get(fp + 1, Mode::Integer)?.int_unchecked();
        let new_top = usize::try_from(args)
            .ok()
            .and_then(|n| (fp + 3).checked_add(n))
            .filter(|&t| t <= self.base)
            .ok_or(VmError::StackUnderflow)?;

        self.top = new_top;
        self.fp = usize::try_from(saved).ok();
        self.dirty = true;
        self.push(result, Mode::Opaque)?;

        if ret.is_null() {
            return Ok(None);
        }
        ret.as_code()
            .map(Some)
            .ok_or_else(|| VmError::InvalidOperand(format!("corrupt return address {:?}", ret)))
    }

    fn frame(&self, what: &'static str, index: i32) -> Result<usize, VmError> {
        self.fp.ok_or(VmError::IndexOutOfRange {
            what,
            index: index as i64,
            limit: 0,
        })
    }

    fn counted_slot(&self, what: &'static str, index: i32, count: Value) -> Result<usize, VmError> {
        let limit = count.int_unchecked().max(0) as usize;
        usize::try_from(index)
            .ok()
            .filter(|&i| i < limit)
            .ok_or(VmError::IndexOutOfRange {
                what,
                index: index as i64,
                limit,
            })
    }

    pub fn global_slot(&self, index: i32) -> Result<usize, VmError> {
        let count = self.global_count();
        let i = usize::try_from(index)
            .ok()
            .filter(|&i| i < count)
            .ok_or(VmError::IndexOutOfRange {
                what: "global",
                index: index as i64,
                limit: count,
            })?;
        Ok(self.capacity() - 1 - i)
    }

    pub fn local_slot(&self, index: i32) -> Result<usize, VmError> {
        let fp = self.frame("local", index)?;
        let count = self.get(fp.checked_sub(2).ok_or(VmError::StackUnderflow)?, Mode::Integer)?;
        let k = self.counted_slot("local", index, count)?;
        fp.checked_sub(3 + k).ok_or(VmError::IndexOutOfRange {
            what: "local",
            index: index as i64,
            limit: fp.saturating_sub(2),
        })
    }

    pub fn arg_slot(&self, index: i32) -> Result<usize, VmError> {
        let fp = self.frame("argument", index)?;
        let count = self.get(fp + 1, Mode::Integer)?;
        let k = self.counted_slot("argument", index, count)?;
        let slot = fp + 3 + k;
        if slot >= self.capacity() {
            return Err(VmError::IndexOutOfRange {
                what: "stack",
                index: slot as i64,
                limit: self.capacity(),
            });
        }
        Ok(slot)
    }

    /// Contents of the callee slot: the running closure under `CALLC`.
    pub fn callee(&self) -> Result<Value, VmError> {
        let fp = self.frame("capture", 0)?;
        self.get(fp + 2, Mode::Opaque)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Stack as a CALL leaves it: arguments, placeholder, return address.
    fn called(args: &[i64], ret: usize) -> Stack {
        let mut s = Stack::new(64);
        s.reserve_globals(2).unwrap();
        for &a in args.iter().rev() {
            s.push_int(a).unwrap();
        }
        s.push(Value::NULL, Mode::Opaque).unwrap();
        s.push(Value::code(ret), Mode::Opaque).unwrap();
        s
    }

    #[test]
    fn test_enter_layout() {
        let mut s = called(&[10, 20], 0x30);
        s.enter(2, 3).unwrap();
        let fp = s.fp().unwrap();
        assert_eq!(s.get(fp + 1, Mode::Integer).unwrap().as_int(), Some(2));
        assert_eq!(s.get(fp, Mode::Integer).unwrap().as_int(), Some(-1));
        assert_eq!(s.get(fp - 1, Mode::Opaque).unwrap().as_code(), Some(0x30));
        assert_eq!(s.get(fp - 2, Mode::Integer).unwrap().as_int(), Some(3));
        assert_eq!(s.get(s.arg_slot(0).unwrap(), Mode::Integer).unwrap().as_int(), Some(10));
        assert_eq!(s.get(s.arg_slot(1).unwrap(), Mode::Integer).unwrap().as_int(), Some(20));
        for k in 0..3 {
            assert_eq!(s.get(s.local_slot(k).unwrap(), Mode::Integer).unwrap().as_int(), Some(-1));
        }
        assert_eq!(s.top_index(), fp - 5);
    }

    #[test]
    fn test_enter_leave_symmetry() {
        let mut s = Stack::new(64);
        s.reserve_globals(1).unwrap();
        s.push_int(7).unwrap();
        let before_top = s.top_index();
        let before_fp = s.fp();

        // CALL with no arguments, then BEGIN 0 2; CONST 42; END.
        s.push(Value::NULL, Mode::Opaque).unwrap();
        s.push(Value::code(0x10), Mode::Opaque).unwrap();
        s.enter(0, 2).unwrap();
        s.push_int(42).unwrap();
        let ret = s.leave().unwrap();

        assert_eq!(ret, Some(0x10));
        assert_eq!(s.fp(), before_fp);
        assert_eq!(s.top_index(), before_top - 1);
        assert_eq!(s.peek(Mode::Integer).unwrap().as_int(), Some(42));
        assert_eq!(s.get(before_top, Mode::Integer).unwrap().as_int(), Some(7));
    }

    #[test]
    fn test_nested_frames_restore_fp() {
        let mut s = called(&[1], 0x8);
        s.enter(1, 0).unwrap();
        let outer = s.fp();
        s.push(Value::NULL, Mode::Opaque).unwrap();
        s.push(Value::code(0x20), Mode::Opaque).unwrap();
        s.enter(0, 1).unwrap();
        assert_ne!(s.fp(), outer);
        s.push_int(5).unwrap();
        assert_eq!(s.leave().unwrap(), Some(0x20));
        assert_eq!(s.fp(), outer);
    }

    #[test]
    fn test_leave_without_frame_resets_to_base() {
        let mut s = Stack::new(16);
        s.reserve_globals(2).unwrap();
        s.push_int(1).unwrap();
        s.push_int(2).unwrap();
        s.push_int(8).unwrap();
        assert_eq!(s.leave().unwrap(), None);
        assert_eq!(s.depth(), 1);
        assert_eq!(s.peek(Mode::Integer).unwrap().as_int(), Some(8));
    }

    #[test]
    fn test_null_return_address_halts() {
        let mut s = Stack::new(16);
        s.push(Value::NULL, Mode::Opaque).unwrap();
        s.push(Value::NULL, Mode::Opaque).unwrap();
        s.enter(0, 0).unwrap();
        s.push_int(3).unwrap();
        assert_eq!(s.leave().unwrap(), None);
        assert_eq!(s.fp(), None);
    }

    #[test]
    fn test_declared_counts_bound_access() {
        let mut s = called(&[1, 2], 0);
        s.enter(2, 1).unwrap();
        assert!(matches!(
            s.arg_slot(2),
            Err(VmError::IndexOutOfRange { what: "argument", index: 2, limit: 2 })
        ));
        assert!(matches!(
            s.local_slot(1),
            Err(VmError::IndexOutOfRange { what: "local", index: 1, limit: 1 })
        ));
        assert!(matches!(s.local_slot(-1), Err(VmError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_global_slots() {
        let mut s = Stack::new(16);
        s.reserve_globals(3).unwrap();
        assert_eq!(s.global_slot(0).unwrap(), 15);
        assert_eq!(s.global_slot(2).unwrap(), 13);
        assert!(matches!(
            s.global_slot(3),
            Err(VmError::IndexOutOfRange { what: "global", index: 3, limit: 3 })
        ));
    }

    #[test]
    fn test_enter_checks_operands() {
        let mut s = Stack::new(16);
        s.push(Value::code(4), Mode::Opaque).unwrap();
        assert!(matches!(
            s.enter(1, 0),
            Err(VmError::InsufficientOperands { needed: 3, available: 1 })
        ));
    }

    #[test]
    fn test_no_frame_has_no_locals() {
        let s = Stack::new(16);
        assert!(matches!(
            s.local_slot(0),
            Err(VmError::IndexOutOfRange { what: "local", limit: 0, .. })
        ));
    }
}
