//! Module: executor::update
//! Responsibility: DML plans that drain an input and write each row.
//! Does not own: transaction boundaries; the caller begins and commits
//! around `run`.
//! Boundary: the input is fully read before the first write, so rows
//! written by a plan are never fed back into it.

use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::collect_rows,
            operator::{OperatorRef, explain},
        },
        row::Row,
        schema::RowTypeRef,
        write::RowWriter,
    },
    error::InternalError,
};
use std::{fmt, sync::Arc};
use tracing::debug;

///
/// UpdateResult
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UpdateResult {
    /// Input rows examined.
    pub rows_touched: u64,

    /// Rows actually written or removed.
    pub rows_modified: u64,
}

impl UpdateResult {
    const fn record(&mut self, modified: bool) {
        self.rows_touched += 1;
        if modified {
            self.rows_modified += 1;
        }
    }
}

///
/// UpdatePlannable
///
/// A plan that runs to completion and reports counts instead of rows.
///

pub trait UpdatePlannable: Send + Sync + fmt::Debug {
    fn run(&self, context: &Arc<QueryContext>) -> Result<UpdateResult, InternalError>;

    fn describe(&self) -> String;
}

///
/// UpdateFunction
///
/// Row-level logic of an update plan.
///

pub trait UpdateFunction: Send + Sync + fmt::Debug {
    /// True when `row` should be rewritten.
    fn rows_to_update(&self, row: &Row, context: &QueryContext) -> Result<bool, InternalError>;

    /// The replacement row; must be of the same table type.
    fn evaluate(&self, row: &Row, context: &QueryContext) -> Result<Row, InternalError>;
}

/// Drain `input` and hand each row to `apply`, polling cancellation as
/// rows are written.
fn drive(
    name: &str,
    input: &OperatorRef,
    context: &Arc<QueryContext>,
    mut apply: impl FnMut(&RowWriter<'_>, &Row) -> Result<bool, InternalError>,
) -> Result<UpdateResult, InternalError> {
    let mut cursor = input.cursor(context)?;
    let rows = collect_rows(cursor.as_mut());
    cursor.destroy();
    let rows = rows?;

    let writer = RowWriter::new(context.schema(), context.store().as_ref());
    let mut poller = context.poller();
    let mut result = UpdateResult::default();
    for row in &rows {
        result.record(apply(&writer, row)?);
        poller.tick(context)?;
    }
    debug!(
        plan = name,
        touched = result.rows_touched,
        modified = result.rows_modified,
        "update plan finished"
    );

    Ok(result)
}

fn check_table_row(table_type: &RowTypeRef, row: &Row) -> Result<(), InternalError> {
    if row.is_type(table_type) {
        return Ok(());
    }

    Err(InternalError::incompatible_row(format!(
        "{row:?} is not a row of {table_type}"
    )))
}

///
/// Insert
///
/// Inserts the values of every input row into `table_type`. Input rows
/// may be of any type with the table's field count.
///

#[derive(Debug)]
pub struct Insert {
    input: OperatorRef,
    table_type: RowTypeRef,
}

impl Insert {
    pub fn new(input: OperatorRef, table_type: RowTypeRef) -> Result<Self, InternalError> {
        if !table_type.is_table() {
            return Err(InternalError::plan_invalid(format!(
                "cannot insert into {table_type}"
            )));
        }

        Ok(Self { input, table_type })
    }
}

impl UpdatePlannable for Insert {
    fn run(&self, context: &Arc<QueryContext>) -> Result<UpdateResult, InternalError> {
        drive("Insert", &self.input, context, |writer, row| {
            writer.insert(&self.table_type, row.values().to_vec())?;
            Ok(true)
        })
    }

    fn describe(&self) -> String {
        format!("Insert({})\n{}", self.table_type, explain(self.input.as_ref()))
    }
}

///
/// Update
///

#[derive(Debug)]
pub struct Update {
    input: OperatorRef,
    table_type: RowTypeRef,
    function: Arc<dyn UpdateFunction>,
}

impl Update {
    pub fn new(
        input: OperatorRef,
        table_type: RowTypeRef,
        function: impl UpdateFunction + 'static,
    ) -> Result<Self, InternalError> {
        if !table_type.is_table() {
            return Err(InternalError::plan_invalid(format!(
                "cannot update {table_type}"
            )));
        }

        Ok(Self {
            input,
            table_type,
            function: Arc::new(function),
        })
    }
}

impl UpdatePlannable for Update {
    fn run(&self, context: &Arc<QueryContext>) -> Result<UpdateResult, InternalError> {
        drive("Update", &self.input, context, |writer, row| {
            check_table_row(&self.table_type, row)?;
            if !self.function.rows_to_update(row, context)? {
                return Ok(false);
            }
            let new_row = self.function.evaluate(row, context)?;
            check_table_row(&self.table_type, &new_row)?;
            writer.update(row, new_row.values().to_vec())?;

            Ok(true)
        })
    }

    fn describe(&self) -> String {
        format!(
            "Update({}, {:?})\n{}",
            self.table_type,
            self.function,
            explain(self.input.as_ref())
        )
    }
}

///
/// Delete
///

#[derive(Debug)]
pub struct Delete {
    input: OperatorRef,
    table_type: RowTypeRef,
}

impl Delete {
    pub fn new(input: OperatorRef, table_type: RowTypeRef) -> Result<Self, InternalError> {
        if !table_type.is_table() {
            return Err(InternalError::plan_invalid(format!(
                "cannot delete from {table_type}"
            )));
        }

        Ok(Self { input, table_type })
    }
}

impl UpdatePlannable for Delete {
    fn run(&self, context: &Arc<QueryContext>) -> Result<UpdateResult, InternalError> {
        drive("Delete", &self.input, context, |writer, row| {
            check_table_row(&self.table_type, row)?;
            writer.delete(row)
        })
    }

    fn describe(&self) -> String {
        format!("Delete({})\n{}", self.table_type, explain(self.input.as_ref()))
    }
}

///
/// TESTS
///
