//! Heap object kinds and their printed form.

use std::fmt::Write as _;

use lama_common_core::Value;

use crate::tag;

/// Nesting depth past which rendering prints `...`.
pub const MAX_RENDER_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    String(Vec<u8>),
    Array(Vec<Value>),
    Sexp { tag: i64, fields: Vec<Value> },
    Closure { code: usize, captures: Vec<Value> },
}

impl Object {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Object::String(_) => "string",
            Object::Array(_) => "array",
            Object::Sexp { .. } => "sexp",
            Object::Closure { .. } => "closure",
        }
    }

    /// Element count as seen by `length`.
    pub fn len(&self) -> usize {
        match self {
            Object::String(bytes) => bytes.len(),
            Object::Array(elems) => elems.len(),
            Object::Sexp { fields, .. } => fields.len(),
            Object::Closure { captures, .. } => captures.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Render `v` the way `Lstring` prints it. `lookup` resolves references.
pub fn render<'a, F>(v: Value, lookup: &F) -> String
where
    F: Fn(Value) -> Option<&'a Object>,
{
    let mut out = String::new();
    render_into(&mut out, v, lookup, 0);
    out
}

fn render_into<'a, F>(out: &mut String, v: Value, lookup: &F, depth: usize)
where
    F: Fn(Value) -> Option<&'a Object>,
{
    if depth > MAX_RENDER_DEPTH {
        out.push_str("...");
        return;
    }
    if let Some(n) = v.as_int() {
        let _ = write!(out, "{}", n);
        return;
    }
    let Some(obj) = lookup(v) else {
        let _ = write!(out, "0x{:x}", v.raw());
        return;
    };
    match obj {
        Object::String(bytes) => {
            out.push('"');
            out.push_str(&String::from_utf8_lossy(bytes));
            out.push('"');
        }
        Object::Array(elems) => {
            out.push('[');
            render_seq(out, elems, lookup, depth);
            out.push(']');
        }
        Object::Sexp { tag: h, fields } => {
            let name = tag::de_hash(*h);
            if name == "cons" && fields.len() == 2 {
                render_list(out, v, lookup, depth);
            } else {
                out.push_str(&name);
                if !fields.is_empty() {
                    out.push_str(" (");
                    render_seq(out, fields, lookup, depth);
                    out.push(')');
                }
            }
        }
        Object::Closure { code, .. } => {
            let _ = write!(out, "<closure 0x{:x}>", code);
        }
    }
}

fn render_seq<'a, F>(out: &mut String, items: &[Value], lookup: &F, depth: usize)
where
    F: Fn(Value) -> Option<&'a Object>,
{
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        render_into(out, *item, lookup, depth + 1);
    }
}

/// `cons` chains print as `{a, b, c}`; the chain ends at any non-cons tail.
fn render_list<'a, F>(out: &mut String, mut v: Value, lookup: &F, depth: usize)
where
    F: Fn(Value) -> Option<&'a Object>,
{
    out.push('{');
    let mut first = true;
    let mut steps = 0;
    loop {
        match lookup(v) {
            Some(Object::Sexp { tag: h, fields })
                if fields.len() == 2 && tag::de_hash(*h) == "cons" =>
            {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                render_into(out, fields[0], lookup, depth + 1);
                v = fields[1];
                steps += 1;
                if steps > MAX_RENDER_DEPTH * 16 {
                    out.push_str(", ...");
                    break;
                }
            }
            _ => break,
        }
    }
    out.push('}');
}
