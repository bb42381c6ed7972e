//! Canonical JSON encoding and SHA-256 hashing.
//!
//! Every binding hash and signature in the protocol is computed over the
//! output of [`canonical_json`]: object keys sorted by byte order at every
//! level, arrays in element order, no insignificant whitespace, and primitive
//! encoding delegated to `serde_json` so two implementations produce
//! byte-identical output for the same logical document.
//!
//! Unknown fields are not stripped. A verifier hashes exactly what it
//! received, so tampering with a field it does not understand still changes
//! the hash.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

/// Deterministic encoding of a JSON value.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    // serde_json string escaping cannot fail for a &str
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        Err(_) => out.push_str("\"\""),
    }
}

/// Canonical encoding of any serializable message.
pub fn canonicalize<T: Serialize + ?Sized>(message: &T) -> CoreResult<String> {
    let value = serde_json::to_value(message)
        .map_err(|e| CoreError::Serialization(format!("canonicalize: {}", e)))?;
    Ok(canonical_json(&value))
}

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 of the canonical encoding of a JSON value, 64 lowercase hex chars.
pub fn hash_value(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}

/// SHA-256 of the canonical encoding of a serializable message.
pub fn hash_canonical<T: Serialize + ?Sized>(message: &T) -> CoreResult<String> {
    Ok(sha256_hex(canonicalize(message)?.as_bytes()))
}

/// True if `value` has the shape of a hash produced by this module.
pub fn is_hash_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
