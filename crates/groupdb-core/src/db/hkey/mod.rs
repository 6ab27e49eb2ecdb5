//! Module: db::hkey
//! Responsibility: hierarchical keys, their order and ancestry tests.
//! Does not own: how hkeys are computed for new rows (see `db::write`).

pub(crate) mod codec;

#[cfg(test)]
mod tests;

use crate::{
    db::schema::{HKeyLevel, Ordinal},
    error::InternalError,
    value::Value,
};
use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// HKeySegment
///
/// One ancestor level: the level's table ordinal and its key values.
/// A segment may be partial (fewer values than the table's key) when an
/// hkey names a position rather than a row, e.g. a branch root.
///

#[derive(Clone, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub struct HKeySegment {
    ordinal: Ordinal,
    values: Vec<Value>,
}

impl HKeySegment {
    #[must_use]
    pub const fn new(ordinal: Ordinal, values: Vec<Value>) -> Self {
        Self { ordinal, values }
    }

    #[must_use]
    pub const fn ordinal(&self) -> Ordinal {
        self.ordinal
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn is_prefix_of(&self, other: &Self) -> bool {
        self.ordinal == other.ordinal && other.values.starts_with(&self.values)
    }
}

///
/// HKey
///
/// Root-first sequence of segments. The derived order (segment by
/// segment, ordinal then values) matches physical storage order, so a
/// prefix always sorts at or before its extensions.
///

#[derive(
    Clone,
    Debug,
    Default,
    Deref,
    Deserialize,
    Eq,
    IntoIterator,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[into_iterator(owned, ref)]
pub struct HKey {
    segments: Vec<HKeySegment>,
}

impl HKey {
    #[must_use]
    pub const fn new(segments: Vec<HKeySegment>) -> Self {
        Self { segments }
    }

    /// Start an hkey at the group root.
    #[must_use]
    pub fn root(ordinal: Ordinal, values: Vec<Value>) -> Self {
        Self::new(vec![HKeySegment::new(ordinal, values)])
    }

    /// Append a full segment.
    #[must_use]
    pub fn child(mut self, ordinal: Ordinal, values: Vec<Value>) -> Self {
        self.segments.push(HKeySegment::new(ordinal, values));
        self
    }

    /// Rebuild an hkey from the flattened value list carried by index and
    /// hkey rows.
    pub fn from_layout(layout: &[HKeyLevel], values: &[Value]) -> Result<Self, InternalError> {
        let expected: usize = layout.iter().map(|level| level.key_len).sum();
        if values.len() != expected {
            return Err(InternalError::executor_invariant(format!(
                "hkey layout expects {expected} values, found {}",
                values.len()
            )));
        }

        let mut offset = 0;
        let segments = layout
            .iter()
            .map(|level| {
                let segment =
                    HKeySegment::new(level.ordinal, values[offset..offset + level.key_len].to_vec());
                offset += level.key_len;
                segment
            })
            .collect();

        Ok(Self::new(segments))
    }

    /// Ordinal of the deepest segment.
    #[must_use]
    pub fn table_ordinal(&self) -> Option<Ordinal> {
        self.segments.last().map(HKeySegment::ordinal)
    }

    /// All key values, root level first.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.segments.iter().flat_map(|segment| segment.values.iter())
    }

    /// True when `self` equals `other` or names one of its ancestors (or
    /// an incomplete position above it).
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        let Some((last, leading)) = self.segments.split_last() else {
            return true;
        };
        if self.segments.len() > other.segments.len() {
            return false;
        }
        if leading != &other.segments[..leading.len()] {
            return false;
        }

        let peer = &other.segments[leading.len()];
        if self.segments.len() == other.segments.len() {
            last.is_prefix_of(peer)
        } else {
            last == peer
        }
    }

    /// Strict ancestry: a proper prefix covering fewer levels.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.segments.len() < other.segments.len() && self.is_prefix_of(other)
    }

    /// The hkey of the ancestor at `depth` (0 = group root).
    #[must_use]
    pub fn ancestor(&self, depth: usize) -> Self {
        let keep = (depth + 1).min(self.segments.len());
        Self::new(self.segments[..keep].to_vec())
    }

    /// Append an empty segment naming a child table position.
    #[must_use]
    pub fn extend_with_ordinal(mut self, ordinal: Ordinal) -> Self {
        self.segments.push(HKeySegment::new(ordinal, Vec::new()));
        self
    }

    /// Pad the deepest segment with `count` null key values.
    #[must_use]
    pub fn extend_with_nulls(mut self, count: usize) -> Self {
        if let Some(last) = self.segments.last_mut() {
            last.values.extend(std::iter::repeat_n(Value::Null, count));
        }
        self
    }

    /// Order-preserving byte form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        codec::encode_hkey(self)
    }
}

impl fmt::Display for HKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", segment.ordinal)?;
            for value in &segment.values {
                write!(f, ",{value}")?;
            }
        }
        f.write_str("}")
    }
}
