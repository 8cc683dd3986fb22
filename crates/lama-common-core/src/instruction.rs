//! Instruction format and opcodes.
//!
//! One opcode byte: high nibble selects the group, low nibble the operation.
//! Immediates follow as little-endian `i32`s; `CLOSURE` additionally carries
//! a list of `(kind byte, i32 index)` capture descriptors.

use core::fmt;

use num_enum::TryFromPrimitive;
use thiserror::Error;

use crate::bytecode::Module;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Group {
    Binop = 0,
    Misc = 1,
    Ld = 2,
    Lda = 3,
    St = 4,
    Control = 5,
    Patt = 6,
    Builtin = 7,
    Stop = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum BinOp {
    Add = 1,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "!!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
enum MiscOp {
    Const = 0,
    String,
    Sexp,
    Sti,
    Sta,
    Jmp,
    End,
    Ret,
    Drop,
    Dup,
    Swap,
    Elem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
enum ControlOp {
    CJmpZ = 0,
    CJmpNz,
    Begin,
    CBegin,
    Closure,
    CallC,
    Call,
    Tag,
    Array,
    Fail,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
enum BuiltinOp {
    Read = 0,
    Write,
    Length,
    String,
    Array,
}

/// Variable designator shared by `LD`, `LDA`, `ST` and closure captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum VarKind {
    Global = 0,
    Local,
    Arg,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Var {
    pub kind: VarKind,
    pub index: i32,
}

impl Var {
    pub const fn new(kind: VarKind, index: i32) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self.kind {
            VarKind::Global => 'G',
            VarKind::Local => 'L',
            VarKind::Arg => 'A',
            VarKind::Capture => 'C',
        };
        write!(f, "{}({})", c, self.index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Pattern {
    StrEq = 0,
    String,
    Array,
    Sexp,
    Boxed,
    Unboxed,
    Closure,
}

impl Pattern {
    pub fn symbol(self) -> &'static str {
        match self {
            Pattern::StrEq => "=str",
            Pattern::String => "#string",
            Pattern::Array => "#array",
            Pattern::Sexp => "#sexp",
            Pattern::Boxed => "#ref",
            Pattern::Unboxed => "#val",
            Pattern::Closure => "#fun",
        }
    }
}

/// A decoded instruction. Immediates are kept exactly as encoded; range
/// checks belong to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Binop(BinOp),

    // === Misc group ===
    Const(i32),
    /// String-table offset of the literal.
    String(i32),
    Sexp { tag: i32, arity: i32 },
    Sti,
    Sta,
    Jmp(i32),
    End,
    Ret,
    Drop,
    Dup,
    Swap,
    Elem,

    // === Variables ===
    Ld(Var),
    Lda(Var),
    St(Var),

    // === Control group ===
    CJmpZ(i32),
    CJmpNz(i32),
    Begin { args: i32, locals: i32 },
    CBegin { args: i32, locals: i32 },
    Closure { target: i32, captures: Vec<Var> },
    CallC { args: i32 },
    Call { target: i32, args: i32 },
    Tag { tag: i32, arity: i32 },
    Array(i32),
    Fail { line: i32, col: i32 },
    Line(i32),

    Patt(Pattern),

    // === Runtime calls ===
    Read,
    Write,
    Length,
    Stringify,
    Barray(i32),

    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated instruction at 0x{offset:08x}")]
    Truncated { offset: usize },
    #[error("invalid opcode {high}-{low} at 0x{offset:08x}")]
    InvalidOpcode { offset: usize, high: u8, low: u8 },
    #[error("invalid capture kind {kind} at 0x{offset:08x}")]
    InvalidCapture { offset: usize, kind: u8 },
    #[error("invalid capture count {count} at 0x{offset:08x}")]
    InvalidCaptureCount { offset: usize, count: i32 },
}

/// Bounds-checked reader over a code segment.
pub struct Decoder<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(code: &'a [u8], pos: usize) -> Self {
        Self { code, pos }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .code
            .get(self.pos)
            .ok_or(DecodeError::Truncated { offset: self.pos })?;
        self.pos += 1;
        Ok(b)
    }

    fn int(&mut self) -> Result<i32, DecodeError> {
        let end = self.pos + 4;
        let bytes = self
            .code
            .get(self.pos..end)
            .ok_or(DecodeError::Truncated { offset: self.pos })?;
        self.pos = end;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn var(&mut self, kind: u8, at: usize) -> Result<Var, DecodeError> {
        let kind = VarKind::try_from(kind)
            .map_err(|_| DecodeError::InvalidCapture { offset: at, kind })?;
        Ok(Var::new(kind, self.int()?))
    }

    /// Decode the instruction at the current position and advance past it.
    pub fn next_instruction(&mut self) -> Result<Instruction, DecodeError> {
        let offset = self.pos;
        let x = self.byte()?;
        let (high, low) = (x >> 4, x & 0x0F);
        let invalid = DecodeError::InvalidOpcode { offset, high, low };

        let group = Group::try_from(high).map_err(|_| invalid.clone())?;
        let inst = match group {
            Group::Stop => Instruction::Stop,
            Group::Binop => Instruction::Binop(BinOp::try_from(low).map_err(|_| invalid)?),
            Group::Misc => match MiscOp::try_from(low).map_err(|_| invalid)? {
                MiscOp::Const => Instruction::Const(self.int()?),
                MiscOp::String => Instruction::String(self.int()?),
                MiscOp::Sexp => Instruction::Sexp {
                    tag: self.int()?,
                    arity: self.int()?,
                },
                MiscOp::Sti => Instruction::Sti,
                MiscOp::Sta => Instruction::Sta,
                MiscOp::Jmp => Instruction::Jmp(self.int()?),
                MiscOp::End => Instruction::End,
                MiscOp::Ret => Instruction::Ret,
                MiscOp::Drop => Instruction::Drop,
                MiscOp::Dup => Instruction::Dup,
                MiscOp::Swap => Instruction::Swap,
                MiscOp::Elem => Instruction::Elem,
            },
            Group::Ld | Group::Lda | Group::St => {
                if low > VarKind::Capture as u8 {
                    return Err(invalid);
                }
                let var = self.var(low, offset)?;
                match group {
                    Group::Ld => Instruction::Ld(var),
                    Group::Lda => Instruction::Lda(var),
                    _ => Instruction::St(var),
                }
            }
            Group::Control => match ControlOp::try_from(low).map_err(|_| invalid)? {
                ControlOp::CJmpZ => Instruction::CJmpZ(self.int()?),
                ControlOp::CJmpNz => Instruction::CJmpNz(self.int()?),
                ControlOp::Begin => Instruction::Begin {
                    args: self.int()?,
                    locals: self.int()?,
                },
                ControlOp::CBegin => Instruction::CBegin {
                    args: self.int()?,
                    locals: self.int()?,
                },
                ControlOp::Closure => {
                    let target = self.int()?;
                    let count = self.int()?;
                    let remaining = self.code.len() - self.pos;
                    // Each descriptor is 5 bytes.
                    if count < 0 {
                        return Err(DecodeError::InvalidCaptureCount { offset, count });
                    }
                    if count as usize > remaining / 5 {
                        return Err(DecodeError::Truncated { offset: self.code.len() });
                    }
                    let mut captures = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        let at = self.pos;
                        let kind = self.byte()?;
                        captures.push(self.var(kind, at)?);
                    }
                    Instruction::Closure { target, captures }
                }
                ControlOp::CallC => Instruction::CallC { args: self.int()? },
                ControlOp::Call => Instruction::Call {
                    target: self.int()?,
                    args: self.int()?,
                },
                ControlOp::Tag => Instruction::Tag {
                    tag: self.int()?,
                    arity: self.int()?,
                },
                ControlOp::Array => Instruction::Array(self.int()?),
                ControlOp::Fail => Instruction::Fail {
                    line: self.int()?,
                    col: self.int()?,
                },
                ControlOp::Line => Instruction::Line(self.int()?),
            },
            Group::Patt => Instruction::Patt(Pattern::try_from(low).map_err(|_| invalid)?),
            Group::Builtin => match BuiltinOp::try_from(low).map_err(|_| invalid)? {
                BuiltinOp::Read => Instruction::Read,
                BuiltinOp::Write => Instruction::Write,
                BuiltinOp::Length => Instruction::Length,
                BuiltinOp::String => Instruction::Stringify,
                BuiltinOp::Array => Instruction::Barray(self.int()?),
            },
        };
        Ok(inst)
    }
}

impl Instruction {
    /// Decode a single instruction at `offset`; returns it with the offset
    /// of the following instruction.
    pub fn decode(code: &[u8], offset: usize) -> Result<(Instruction, usize), DecodeError> {
        let mut decoder = Decoder::new(code, offset);
        let inst = decoder.next_instruction()?;
        Ok((inst, decoder.pos()))
    }

    fn opcode(&self) -> u8 {
        let (group, low) = match self {
            Instruction::Binop(op) => (Group::Binop, *op as u8),
            Instruction::Const(_) => (Group::Misc, MiscOp::Const as u8),
            Instruction::String(_) => (Group::Misc, MiscOp::String as u8),
            Instruction::Sexp { .. } => (Group::Misc, MiscOp::Sexp as u8),
            Instruction::Sti => (Group::Misc, MiscOp::Sti as u8),
            Instruction::Sta => (Group::Misc, MiscOp::Sta as u8),
            Instruction::Jmp(_) => (Group::Misc, MiscOp::Jmp as u8),
            Instruction::End => (Group::Misc, MiscOp::End as u8),
            Instruction::Ret => (Group::Misc, MiscOp::Ret as u8),
            Instruction::Drop => (Group::Misc, MiscOp::Drop as u8),
            Instruction::Dup => (Group::Misc, MiscOp::Dup as u8),
            Instruction::Swap => (Group::Misc, MiscOp::Swap as u8),
            Instruction::Elem => (Group::Misc, MiscOp::Elem as u8),
            Instruction::Ld(v) => (Group::Ld, v.kind as u8),
            Instruction::Lda(v) => (Group::Lda, v.kind as u8),
            Instruction::St(v) => (Group::St, v.kind as u8),
            Instruction::CJmpZ(_) => (Group::Control, ControlOp::CJmpZ as u8),
            Instruction::CJmpNz(_) => (Group::Control, ControlOp::CJmpNz as u8),
            Instruction::Begin { .. } => (Group::Control, ControlOp::Begin as u8),
            Instruction::CBegin { .. } => (Group::Control, ControlOp::CBegin as u8),
            Instruction::Closure { .. } => (Group::Control, ControlOp::Closure as u8),
            Instruction::CallC { .. } => (Group::Control, ControlOp::CallC as u8),
            Instruction::Call { .. } => (Group::Control, ControlOp::Call as u8),
            Instruction::Tag { .. } => (Group::Control, ControlOp::Tag as u8),
            Instruction::Array(_) => (Group::Control, ControlOp::Array as u8),
            Instruction::Fail { .. } => (Group::Control, ControlOp::Fail as u8),
            Instruction::Line(_) => (Group::Control, ControlOp::Line as u8),
            Instruction::Patt(p) => (Group::Patt, *p as u8),
            Instruction::Read => (Group::Builtin, BuiltinOp::Read as u8),
            Instruction::Write => (Group::Builtin, BuiltinOp::Write as u8),
            Instruction::Length => (Group::Builtin, BuiltinOp::Length as u8),
            Instruction::Stringify => (Group::Builtin, BuiltinOp::String as u8),
            Instruction::Barray(_) => (Group::Builtin, BuiltinOp::Array as u8),
            Instruction::Stop => (Group::Stop, 0),
        };
        ((group as u8) << 4) | low
    }

    /// Append the binary encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        fn int(out: &mut Vec<u8>, v: i32) {
            out.extend_from_slice(&v.to_le_bytes());
        }

        out.push(self.opcode());
        match self {
            Instruction::Const(n)
            | Instruction::String(n)
            | Instruction::Jmp(n)
            | Instruction::CJmpZ(n)
            | Instruction::CJmpNz(n)
            | Instruction::Array(n)
            | Instruction::Line(n)
            | Instruction::Barray(n)
            | Instruction::CallC { args: n } => int(out, *n),
            Instruction::Ld(v) | Instruction::Lda(v) | Instruction::St(v) => int(out, v.index),
            Instruction::Sexp { tag: a, arity: b }
            | Instruction::Tag { tag: a, arity: b }
            | Instruction::Begin { args: a, locals: b }
            | Instruction::CBegin { args: a, locals: b }
            | Instruction::Call { target: a, args: b }
            | Instruction::Fail { line: a, col: b } => {
                int(out, *a);
                int(out, *b);
            }
            Instruction::Closure { target, captures } => {
                int(out, *target);
                int(out, captures.len() as i32);
                for cap in captures {
                    out.push(cap.kind as u8);
                    int(out, cap.index);
                }
            }
            _ => {}
        }
    }

    /// Render with string-table immediates resolved against `module`.
    pub fn display_with<'a>(&'a self, module: &'a Module) -> Disasm<'a> {
        Disasm {
            inst: self,
            module: Some(module),
        }
    }
}

/// Disassembly view of an instruction.
pub struct Disasm<'a> {
    inst: &'a Instruction,
    module: Option<&'a Module>,
}

impl Disasm<'_> {
    fn string(&self, f: &mut fmt::Formatter<'_>, offset: i32) -> fmt::Result {
        match self.module.and_then(|m| m.resolve_string(offset).ok()) {
            Some(s) => write!(f, "{}", String::from_utf8_lossy(s)),
            None => write!(f, "#{}", offset),
        }
    }
}

impl fmt::Display for Disasm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inst {
            Instruction::Binop(op) => write!(f, "BINOP\t{}", op.symbol()),
            Instruction::Const(n) => write!(f, "CONST\t{}", n),
            Instruction::String(s) => {
                write!(f, "STRING\t")?;
                self.string(f, *s)
            }
            Instruction::Sexp { tag, arity } => {
                write!(f, "SEXP\t")?;
                self.string(f, *tag)?;
                write!(f, " {}", arity)
            }
            Instruction::Sti => write!(f, "STI"),
            Instruction::Sta => write!(f, "STA"),
            Instruction::Jmp(t) => write!(f, "JMP\t0x{:08x}", t),
            Instruction::End => write!(f, "END"),
            Instruction::Ret => write!(f, "RET"),
            Instruction::Drop => write!(f, "DROP"),
            Instruction::Dup => write!(f, "DUP"),
            Instruction::Swap => write!(f, "SWAP"),
            Instruction::Elem => write!(f, "ELEM"),
            Instruction::Ld(v) => write!(f, "LD\t{}", v),
            Instruction::Lda(v) => write!(f, "LDA\t{}", v),
            Instruction::St(v) => write!(f, "ST\t{}", v),
            Instruction::CJmpZ(t) => write!(f, "CJMPz\t0x{:08x}", t),
            Instruction::CJmpNz(t) => write!(f, "CJMPnz\t0x{:08x}", t),
            Instruction::Begin { args, locals } => write!(f, "BEGIN\t{} {}", args, locals),
            Instruction::CBegin { args, locals } => write!(f, "CBEGIN\t{} {}", args, locals),
            Instruction::Closure { target, captures } => {
                write!(f, "CLOSURE\t0x{:08x}", target)?;
                for cap in captures {
                    write!(f, " {}", cap)?;
                }
                Ok(())
            }
            Instruction::CallC { args } => write!(f, "CALLC\t{}", args),
            Instruction::Call { target, args } => write!(f, "CALL\t0x{:08x} {}", target, args),
            Instruction::Tag { tag, arity } => {
                write!(f, "TAG\t")?;
                self.string(f, *tag)?;
                write!(f, " {}", arity)
            }
            Instruction::Array(n) => write!(f, "ARRAY\t{}", n),
            Instruction::Fail { line, col } => write!(f, "FAIL\t{} {}", line, col),
            Instruction::Line(n) => write!(f, "LINE\t{}", n),
            Instruction::Patt(p) => write!(f, "PATT\t{}", p.symbol()),
            Instruction::Read => write!(f, "CALL\tLread"),
            Instruction::Write => write!(f, "CALL\tLwrite"),
            Instruction::Length => write!(f, "CALL\tLlength"),
            Instruction::Stringify => write!(f, "CALL\tLstring"),
            Instruction::Barray(n) => write!(f, "CALL\tBarray\t{}", n),
            Instruction::Stop => write!(f, "<end>"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let disasm = Disasm {
            inst: self,
            module: None,
        };
        fmt::Display::fmt(&disasm, f)
    }
}
