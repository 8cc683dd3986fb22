//! Operand validation shared by the instruction handlers.

use lama_common_core::Module;

use super::VmError;

/// Validate a jump, call or closure target against the code segment.
#[inline]
pub fn check_target(module: &Module, target: i64) -> Result<usize, VmError> {
    let len = module.code().len();
    usize::try_from(target)
        .ok()
        .filter(|&t| t < len)
        .ok_or(VmError::InvalidJumpTarget { target, len })
}

/// Element, argument or local count carried as an immediate.
#[inline]
pub fn count(what: &str, n: i32) -> Result<usize, VmError> {
    usize::try_from(n).map_err(|_| VmError::InvalidOperand(format!("negative {} count {}", what, n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lama_common_core::{Instruction, ModuleBuilder};

    #[test]
    fn test_check_target() {
        let mut b = ModuleBuilder::new();
        b.emit(Instruction::Const(1));
        b.emit(Instruction::End);
        let module = b.build().unwrap();
        assert_eq!(check_target(&module, 5).unwrap(), 5);
        assert!(matches!(
            check_target(&module, 6),
            Err(VmError::InvalidJumpTarget { target: 6, len: 6 })
        ));
        assert!(check_target(&module, -1).is_err());
    }

    #[test]
    fn test_count() {
        assert_eq!(count("field", 3).unwrap(), 3);
        assert!(matches!(count("field", -1), Err(VmError::InvalidOperand(_))));
    }
}
