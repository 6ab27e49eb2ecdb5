//! Module: db::hkey::codec
//! Responsibility: order-preserving byte encoding for hkeys and index keys.
//! Does not own: decoding; stored records keep their typed form alongside.
//! Boundary: byte order of encodings equals `Ord` order of the typed keys.

use crate::{db::hkey::HKey, value::Value};

/// Introduces one hkey segment; sorts below every value tag so a shorter
/// segment precedes its extensions.
pub(crate) const SEGMENT_MARKER: u8 = 0x01;

/// Appended to a prefix encoding to bound all of its extensions from above.
pub(crate) const PREFIX_UPPER: u8 = 0xFF;

const TAG_NULL: u8 = 0x10;
const TAG_BOOL: u8 = 0x20;
const TAG_INT: u8 = 0x30;
const TAG_UINT: u8 = 0x40;
const TAG_FLOAT: u8 = 0x50;
const TAG_TEXT: u8 = 0x60;
const TAG_BLOB: u8 = 0x70;

const ESCAPE: u8 = 0x00;
const ESCAPED_ZERO: u8 = 0xFF;
const TERMINATOR: u8 = 0x00;

/// Encode one value as tag + ordered payload.
pub(crate) fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*v));
        }
        Value::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&ordered_i64_bytes(*v));
        }
        Value::Uint(v) => {
            out.push(TAG_UINT);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&ordered_f64_bytes(*v));
        }
        Value::Text(v) => {
            out.push(TAG_TEXT);
            push_terminated_bytes(out, v.as_bytes());
        }
        Value::Blob(v) => {
            out.push(TAG_BLOB);
            push_terminated_bytes(out, v);
        }
    }
}

pub(crate) fn encode_values<'a>(values: impl IntoIterator<Item = &'a Value>, out: &mut Vec<u8>) {
    for value in values {
        encode_value(value, out);
    }
}

pub(crate) fn encode_hkey_into(hkey: &HKey, out: &mut Vec<u8>) {
    for segment in hkey.iter() {
        out.push(SEGMENT_MARKER);
        out.extend_from_slice(&segment.ordinal().get().to_be_bytes());
        encode_values(segment.values(), out);
    }
}

#[must_use]
pub(crate) fn encode_hkey(hkey: &HKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(hkey.len() * 12);
    encode_hkey_into(hkey, &mut out);
    out
}

/// Smallest byte string greater than every extension of `prefix`.
#[must_use]
pub(crate) fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + 1);
    out.extend_from_slice(prefix);
    out.push(PREFIX_UPPER);
    out
}

const fn ordered_i64_bytes(value: i64) -> [u8; 8] {
    (value.cast_unsigned() ^ (1_u64 << 63)).to_be_bytes()
}

fn ordered_f64_bytes(value: f64) -> [u8; 8] {
    let bits = value.to_bits();
    let ordered = if bits & (1_u64 << 63) == 0 {
        bits ^ (1_u64 << 63)
    } else {
        !bits
    };
    ordered.to_be_bytes()
}

fn push_terminated_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        if byte == ESCAPE {
            out.extend_from_slice(&[ESCAPE, ESCAPED_ZERO]);
        } else {
            out.push(byte);
        }
    }
    out.extend_from_slice(&[TERMINATOR, TERMINATOR]);
}
