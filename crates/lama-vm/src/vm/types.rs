//! VM types: errors, execution results, configuration.

use core::fmt;

use lama_common_core::{BytecodeError, DecodeError, Value};
use lama_runtime::RuntimeError;
use thiserror::Error;

pub const DEFAULT_STACK_CAPACITY: usize = 65536;
pub const DEFAULT_ENTRY: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecResult {
    Continue,
    Jump(usize),
    Halt,
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error("malformed module: {0}")]
    MalformedModule(#[from] BytecodeError),
    #[error("no public entry point named {0:?}")]
    NoEntryPoint(String),
    #[error("operand stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },
    #[error("operand stack underflow")]
    StackUnderflow,
    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        limit: usize,
    },
    #[error("expected an integer in slot {slot}, found {found:?}")]
    TypeTagViolation { slot: usize, found: Value },
    #[error("not a closure: {0}")]
    NotAClosure(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("jump target 0x{target:08x} is outside the code (0x{len:08x} bytes)")]
    InvalidJumpTarget { target: i64, len: usize },
    #[error("truncated instruction at 0x{offset:08x}")]
    TruncatedInstruction { offset: usize },
    #[error("invalid opcode {high}-{low}")]
    InvalidOpcode { high: u8, low: u8 },
    #[error("{needed} operands needed, {available} on the stack")]
    InsufficientOperands { needed: usize, available: usize },
    #[error("invalid operand: {0}")]
    InvalidOperand(String),
    #[error("match failure at {line}:{col}, value {value}")]
    PatternMatchFailure { line: i32, col: i32, value: String },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DecodeError> for VmError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Truncated { offset } => VmError::TruncatedInstruction { offset },
            DecodeError::InvalidOpcode { high, low, .. } => VmError::InvalidOpcode { high, low },
            other => VmError::InvalidOperand(other.to_string()),
        }
    }
}

/// A fatal error with the location of the instruction that raised it.
/// `offset` is `None` for failures while seeding the entry frame.
#[derive(Debug)]
pub struct Fault {
    pub offset: Option<usize>,
    /// Last `LINE` annotation executed, if any.
    pub line: Option<i32>,
    pub error: VmError,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let Some(offset) = self.offset else {
            return Ok(());
        };
        write!(f, " (at 0x{:08x}", offset)?;
        if let Some(line) = self.line {
            write!(f, ", line {}", line)?;
        }
        write!(f, ")")
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Operand stack size in words, globals included.
    pub stack_capacity: usize,
    /// Public symbol execution starts at.
    pub entry: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            stack_capacity: DEFAULT_STACK_CAPACITY,
            entry: DEFAULT_ENTRY.to_string(),
        }
    }
}
