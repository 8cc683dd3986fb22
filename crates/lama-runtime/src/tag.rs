//! S-expression tag hashing.
//!
//! A tag name packs into an integer six bits per character, first character
//! most significant. Only the first `MAX_TAG_LEN` characters take part, and
//! a name is accepted only if it survives the round trip through [`de_hash`]
//! (leading `_`s would otherwise vanish into the zero digit).

use crate::error::RuntimeError;

const ALPHABET: &[u8; 64] = b"_abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789'";

pub const MAX_TAG_LEN: usize = 10;

pub fn tag_hash(name: &[u8]) -> Result<i64, RuntimeError> {
    if name.is_empty() {
        return Err(RuntimeError::EmptyTag);
    }
    let mut h = 0i64;
    for &c in name.iter().take(MAX_TAG_LEN) {
        let pos = ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or(RuntimeError::BadTagChar(c as char))?;
        h = (h << 6) | pos as i64;
    }
    let kept = &name[..name.len().min(MAX_TAG_LEN)];
    if de_hash(h).as_bytes() != kept {
        return Err(RuntimeError::AmbiguousTag(
            String::from_utf8_lossy(kept).into_owned(),
        ));
    }
    Ok(h)
}

/// Recover the (possibly truncated) tag name.
pub fn de_hash(mut h: i64) -> String {
    let mut out = Vec::with_capacity(MAX_TAG_LEN);
    while h > 0 {
        out.push(ALPHABET[(h & 0x3F) as usize]);
        h >>= 6;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
