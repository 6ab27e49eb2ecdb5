//! Physical query execution for a hierarchical, group-clustered relational
//! engine: hkeys, cursors, scans, lookups, flattening, ordered merges and
//! sorts, plus the schema, storage and configuration they run against.

// public exports are one module level down
pub mod config;
pub mod db;
pub mod error;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Vocabulary needed to build and run an operator tree.
///

pub mod prelude {
    pub use crate::{
        config::EngineConfig,
        db::{
            Direction, QueryContext, Row,
            executor::{Cursor, CursorBox, Operator, OperatorRef, collect_rows},
            schema::{RowTypeRef, Schema, SchemaBuilder},
        },
        error::InternalError,
        value::Value,
    };
}
