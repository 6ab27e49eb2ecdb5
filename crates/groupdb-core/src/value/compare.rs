use crate::{db::direction::Direction, value::Value};
use std::cmp::Ordering;

/// Total canonical comparator used by keys, merges and sorts.
///
/// Ordering rules:
/// 1. Canonical variant rank (`Null` lowest)
/// 2. Variant-specific comparison for same-ranked values
///
/// Floats compare with `total_cmp` so the order stays total and agrees
/// with the encoded key bytes.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = left.canonical_rank().cmp(&right.canonical_rank());
    if rank != Ordering::Equal {
        return rank;
    }

    canonical_cmp_same_rank(left, right)
}

/// Compare two values under a column direction. `Null` sorts low in the
/// ascending order and therefore high in the descending one.
#[must_use]
pub fn compare_nullable(left: &Value, right: &Value, direction: Direction) -> Ordering {
    direction.apply(canonical_cmp(left, right))
}

fn canonical_cmp_same_rank(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
        (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}
