//! Module: db::executor
//! Responsibility: physical operators and the cursors that run them.
//! Does not own: planning; operator trees arrive fully built and validated.
//! Boundary: `Operator::cursor` is the only way a plan becomes runnable.

pub mod cursor;
pub mod flatten;
pub mod kernel;
pub mod lookup;
pub mod merge;
pub mod operator;
pub mod scan;
pub mod sort;
pub mod update;

pub use cursor::{Cursor, CursorBox, CursorState, collect_rows};
pub use flatten::{Flatten, FlattenOptions};
pub use kernel::{Count, CountTableStatus, Filter, Limit, LimitBound, Product, Select};
pub use lookup::{AncestorLookup, BranchLookup, InputPreservation};
pub use merge::{
    Except, HKeyUnion, Intersect, IntersectOptions, IntersectOutput, MergeKeys, ScanMode, Union,
};
pub use operator::{Operator, OperatorRef, explain};
pub use scan::{GroupScan, GroupScanRange, IndexScan, ValuesScan};
pub use sort::{DuplicatePolicy, SortInsertionLimited, SortTree};
pub use update::{Delete, Insert, Update, UpdateFunction, UpdatePlannable, UpdateResult};

///
/// JoinType
///
/// Which unmatched rows a join keeps besides the matched ones.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    #[must_use]
    pub const fn keeps_left(self) -> bool {
        matches!(self, Self::Left | Self::Full)
    }

    #[must_use]
    pub const fn keeps_right(self) -> bool {
        matches!(self, Self::Right | Self::Full)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
        }
    }
}
