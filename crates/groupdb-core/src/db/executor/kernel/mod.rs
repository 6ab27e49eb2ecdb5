//! Module: executor::kernel
//! Responsibility: single-input operators that filter, bound, count or
//! cross the rows of one stream.
//! Does not own: row ordering; each operator preserves its input order.

mod count;
mod filter;
mod limit;
mod product;
mod select;

#[cfg(test)]
mod tests;

pub use count::{Count, CountTableStatus};
pub use filter::Filter;
pub use limit::{Limit, LimitBound};
pub use product::Product;
pub use select::Select;
