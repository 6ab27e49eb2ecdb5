use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
            operator::{Operator, OperatorRef},
        },
        row::Row,
        schema::{Ordinal, RowTypeRef, Schema},
    },
    error::InternalError,
    value::Value,
};
use std::sync::Arc;

fn count_row(row_type: &RowTypeRef, count: u64) -> Row {
    Row::new(row_type.clone(), vec![Value::Uint(count)], None)
}

///
/// Count
///
/// Counts the rows of `count_type` and emits the total as one row after
/// the input is exhausted. Rows of other types pass through.
///

#[derive(Debug)]
pub struct Count {
    input: OperatorRef,
    count_type: RowTypeRef,
    result_type: RowTypeRef,
}

impl Count {
    #[must_use]
    pub fn new(schema: &Schema, input: OperatorRef, count_type: RowTypeRef) -> Self {
        let result_type = schema.values_type(&format!("count({count_type})"), 1);

        Self {
            input,
            count_type,
            result_type,
        }
    }
}

impl Operator for Count {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(CountCursor {
            context: context.clone(),
            input: self.input.cursor(context)?,
            count_type: self.count_type.clone(),
            result_type: self.result_type.clone(),
            count: 0,
            emitted: false,
            lifecycle: CursorLifecycle::new("Count"),
        }))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.result_type.clone())
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        format!("Count({})", self.count_type)
    }
}

struct CountCursor {
    context: Arc<QueryContext>,
    input: CursorBox,
    count_type: RowTypeRef,
    result_type: RowTypeRef,
    count: u64,
    emitted: bool,
    lifecycle: CursorLifecycle,
}

impl CountCursor {
    fn pull(&mut self) -> Result<Option<Row>, InternalError> {
        let mut poller = self.context.poller();
        while let Some(row) = self.input.next()? {
            if !row.is_type(&self.count_type) {
                return Ok(Some(row));
            }
            self.count += 1;
            poller.tick(&self.context)?;
        }

        if self.emitted {
            return Ok(None);
        }
        self.emitted = true;

        Ok(Some(count_row(&self.result_type, self.count)))
    }
}

impl Cursor for CountCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.input.open()?;
        self.count = 0;
        self.emitted = false;
        self.lifecycle.set_active();

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }
        self.context.check_cancelation()?;

        match self.pull() {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.lifecycle.set_idle();
                Ok(None)
            }
            Err(err) => {
                close_quietly(&mut self.input);
                self.lifecycle.set_idle();
                Err(err)
            }
        }
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        if self.lifecycle.state().is_open() {
            self.input.close()?;
            self.lifecycle.set_idle();
        }

        Ok(())
    }

    fn destroy(&mut self) {
        self.input.destroy();
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}

///
/// CountTableStatus
///
/// Emits the maintained row count of one table without scanning it.
/// The count is whatever was last published by a committed transaction
/// and may disagree with the rows visible to this query.
///

#[derive(Debug)]
pub struct CountTableStatus {
    table_type: RowTypeRef,
    table: Ordinal,
    result_type: RowTypeRef,
}

impl CountTableStatus {
    pub fn new(schema: &Schema, table_type: RowTypeRef) -> Result<Self, InternalError> {
        let table = table_type
            .table()
            .map(|table| table.ordinal)
            .ok_or_else(|| {
                InternalError::plan_invalid(format!("{table_type} is not a table type"))
            })?;
        let result_type = schema.values_type(&format!("count({table_type})"), 1);

        Ok(Self {
            table_type,
            table,
            result_type,
        })
    }
}

impl Operator for CountTableStatus {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(TableStatusCursor {
            context: context.clone(),
            table: self.table,
            result_type: self.result_type.clone(),
            emitted: false,
            lifecycle: CursorLifecycle::new("CountTableStatus"),
        }))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.result_type.clone())
    }

    fn describe(&self) -> String {
        format!("CountTableStatus({})", self.table_type)
    }
}

struct TableStatusCursor {
    context: Arc<QueryContext>,
    table: Ordinal,
    result_type: RowTypeRef,
    emitted: bool,
    lifecycle: CursorLifecycle,
}

impl Cursor for TableStatusCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.emitted = false;
        self.lifecycle.set_active();

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }
        self.context.check_cancelation()?;

        if self.emitted {
            self.lifecycle.set_idle();
            return Ok(None);
        }
        let count = self.context.store().table_status().row_count(self.table)?;
        self.emitted = true;

        Ok(Some(count_row(&self.result_type, count)))
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        self.lifecycle.set_idle();

        Ok(())
    }

    fn destroy(&mut self) {
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}
