//! Runtime library errors.

use lama_common_core::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("expected a heap reference, found {0:?}")]
    NotAReference(Value),
    #[error("dangling heap reference {0:?}")]
    Dangling(Value),
    #[error("{op}: expected {expected}, found {found}")]
    WrongKind {
        op: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("character {0:?} is not allowed in a tag")]
    BadTagChar(char),
    #[error("tag {0:?} cannot be told apart from a shorter tag")]
    AmbiguousTag(String),
    #[error("empty tag")]
    EmptyTag,
    #[error("value {0} does not fit in a string byte")]
    NotAByte(i64),
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("input {0:?} is not an integer")]
    BadInput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
