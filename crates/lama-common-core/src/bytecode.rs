//! Bytecode module format.
//!
//! Layout of a compiled file (all words little-endian `i32`):
//!
//! ```text
//! [string_table_size][global_area_size][public_symbol_count]
//! [public_symbol_count x (name_offset, code_offset)]
//! [string table: string_table_size bytes, NUL-terminated entries]
//! [code: everything up to end of file]
//! ```

use std::ops::Range;
use std::path::Path;

use hashbrown::HashMap;
use thiserror::Error;

use crate::instruction::Instruction;

const HEADER_SIZE: usize = 12;
const PUBLIC_ENTRY_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("cannot read module: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is {len} bytes, shorter than the 12-byte header")]
    TooShort { len: usize },
    #[error("{field} is negative ({value})")]
    NegativeField { field: &'static str, value: i32 },
    #[error("{field} needs {needed} bytes but only {available} remain")]
    ExceedsFile {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("string offset {offset} is outside the string table ({size} bytes)")]
    StringOutOfRange { offset: i64, size: usize },
    #[error("string at offset {offset} is not NUL-terminated")]
    UnterminatedString { offset: usize },
    #[error("public symbol {index} points at code offset {offset} outside the code ({len} bytes)")]
    PublicOutOfRange { index: usize, offset: i32, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicSymbol {
    pub name_offset: u32,
    pub code_offset: u32,
}

/// A loaded, validated module image. Read-only after construction.
#[derive(Debug, Clone)]
pub struct Module {
    data: Vec<u8>,
    strings: Range<usize>,
    code: Range<usize>,
    global_area_size: usize,
    publics: Vec<PublicSymbol>,
    public_index: HashMap<Vec<u8>, usize>,
}

fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn non_negative(field: &'static str, value: i32) -> Result<usize, BytecodeError> {
    usize::try_from(value).map_err(|_| BytecodeError::NegativeField { field, value })
}

impl Module {
    /// Read and validate a module file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BytecodeError> {
        Self::load(std::fs::read(path)?)
    }

    /// Validate a module image and take ownership of its bytes.
    pub fn load(data: Vec<u8>) -> Result<Self, BytecodeError> {
        if data.len() < HEADER_SIZE {
            return Err(BytecodeError::TooShort { len: data.len() });
        }
        let string_table_size = non_negative("string table size", read_i32(&data, 0))?;
        let global_area_size = non_negative("global area size", read_i32(&data, 4))?;
        let public_count = non_negative("public symbol count", read_i32(&data, 8))?;

        let available = data.len() - HEADER_SIZE;
        let publics_size = public_count
            .checked_mul(PUBLIC_ENTRY_SIZE)
            .filter(|&n| n <= available)
            .ok_or(BytecodeError::ExceedsFile {
                field: "public symbol table",
                needed: public_count.saturating_mul(PUBLIC_ENTRY_SIZE),
                available,
            })?;

        let strings_start = HEADER_SIZE + publics_size;
        let available = data.len() - strings_start;
        if string_table_size > available {
            return Err(BytecodeError::ExceedsFile {
                field: "string table",
                needed: string_table_size,
                available,
            });
        }
        let strings = strings_start..strings_start + string_table_size;
        let code = strings.end..data.len();

        let mut module = Module {
            data,
            strings,
            code,
            global_area_size,
            publics: Vec::with_capacity(public_count),
            public_index: HashMap::with_capacity(public_count),
        };

        let code_len = module.code.len();
        for index in 0..public_count {
            let at = HEADER_SIZE + index * PUBLIC_ENTRY_SIZE;
            let name_offset = read_i32(&module.data, at);
            let code_offset = read_i32(&module.data, at + 4);

            let name = module.resolve_string(name_offset)?.to_vec();
            if code_offset < 0 || code_offset as usize >= code_len {
                return Err(BytecodeError::PublicOutOfRange {
                    index,
                    offset: code_offset,
                    len: code_len,
                });
            }
            module.publics.push(PublicSymbol {
                name_offset: name_offset as u32,
                code_offset: code_offset as u32,
            });
            module.public_index.entry(name).or_insert(index);
        }

        Ok(module)
    }

    #[inline]
    pub fn code(&self) -> &[u8] {
        &self.data[self.code.clone()]
    }

    #[inline]
    pub fn string_table(&self) -> &[u8] {
        &self.data[self.strings.clone()]
    }

    #[inline]
    pub fn global_area_size(&self) -> usize {
        self.global_area_size
    }

    #[inline]
    pub fn public_count(&self) -> usize {
        self.publics.len()
    }

    /// Bytes of the NUL-terminated string starting at `offset`.
    pub fn resolve_string(&self, offset: i32) -> Result<&[u8], BytecodeError> {
        let table = self.string_table();
        let start = usize::try_from(offset)
            .ok()
            .filter(|&o| o < table.len())
            .ok_or(BytecodeError::StringOutOfRange {
                offset: offset as i64,
                size: table.len(),
            })?;
        let len = table[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(BytecodeError::UnterminatedString { offset: start })?;
        Ok(&table[start..start + len])
    }

    /// Name and code offset of the `i`-th public symbol.
    pub fn public_symbol(&self, i: usize) -> Option<(&[u8], usize)> {
        let sym = self.publics.get(i)?;
        let name = self.resolve_string(sym.name_offset as i32).ok()?;
        Some((name, sym.code_offset as usize))
    }

    /// Code offset of the public symbol named `name`.
    pub fn find_public(&self, name: &str) -> Option<usize> {
        let index = *self.public_index.get(name.as_bytes())?;
        Some(self.publics[index].code_offset as usize)
    }
}

/// Assembles module images. Used by tests and tooling.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    strings: Vec<u8>,
    interned: HashMap<String, i32>,
    publics: Vec<(i32, i32)>,
    global_area_size: i32,
    code: Vec<u8>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn globals(&mut self, n: i32) -> &mut Self {
        self.global_area_size = n;
        self
    }

    /// Intern a string; returns its string-table offset.
    pub fn string(&mut self, s: &str) -> i32 {
        if let Some(&offset) = self.interned.get(s) {
            return offset;
        }
        let offset = self.strings.len() as i32;
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.interned.insert(s.to_string(), offset);
        offset
    }

    pub fn public(&mut self, name: &str, code_offset: i32) -> &mut Self {
        let name = self.string(name);
        self.publics.push((name, code_offset));
        self
    }

    /// Offset the next emitted instruction will occupy.
    pub fn here(&self) -> i32 {
        self.code.len() as i32
    }

    /// Emit an instruction; returns its offset.
    pub fn emit(&mut self, inst: Instruction) -> i32 {
        let at = self.here();
        inst.encode(&mut self.code);
        at
    }

    /// Rewrite the first immediate of the instruction at `at`. Used to
    /// resolve forward jump, call and closure targets.
    pub fn patch_target(&mut self, at: i32, target: i32) {
        let start = at as usize + 1;
        self.code[start..start + 4].copy_from_slice(&target.to_le_bytes());
    }

    /// Append raw bytes to the code segment.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_SIZE + self.publics.len() * PUBLIC_ENTRY_SIZE + self.strings.len() + self.code.len(),
        );
        out.extend_from_slice(&(self.strings.len() as i32).to_le_bytes());
        out.extend_from_slice(&self.global_area_size.to_le_bytes());
        out.extend_from_slice(&(self.publics.len() as i32).to_le_bytes());
        for &(name, offset) in &self.publics {
            out.extend_from_slice(&name.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&self.strings);
        out.extend_from_slice(&self.code);
        out
    }

    pub fn build(&self) -> Result<Module, BytecodeError> {
        Module::load(self.finish())
    }
}
