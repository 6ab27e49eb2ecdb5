//! Module: db
//! Responsibility: the data model, storage boundary and physical executor
//! of a group-clustered relational engine.

pub mod context;
pub mod direction;
pub mod executor;
pub mod expr;
pub mod hkey;
pub mod index_range;
pub mod ordering;
pub mod row;
pub mod schema;
pub mod store;
pub mod write;

pub use context::{CancellationHandle, QueryContext, SessionId};
pub use direction::Direction;
pub use row::{ColumnSelector, Row};
