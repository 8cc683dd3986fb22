//! # lama-common-core
//!
//! Core types shared by the Lama stack machine crates:
//! - `value` - tagged machine words and stack access modes
//! - `instruction` - opcode tables, decoder, encoder and disassembly
//! - `bytecode` - module image loading and assembly

pub mod bytecode;
pub mod instruction;
pub mod value;

pub use bytecode::{BytecodeError, Module, ModuleBuilder, PublicSymbol};
pub use instruction::{BinOp, DecodeError, Decoder, Instruction, Pattern, Var, VarKind};
pub use value::{Mode, Value};
