use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState},
            operator::Operator,
        },
        row::Row,
        schema::RowTypeRef,
    },
    error::InternalError,
    value::Value,
};
use std::sync::Arc;

///
/// ValuesScan
///
/// Literal rows of one row type, in the order given.
///

#[derive(Debug)]
pub struct ValuesScan {
    row_type: RowTypeRef,
    rows: Vec<Row>,
}

impl ValuesScan {
    pub fn new(row_type: RowTypeRef, rows: Vec<Vec<Value>>) -> Result<Self, InternalError> {
        let rows = rows
            .into_iter()
            .map(|values| {
                if values.len() == row_type.nfields() {
                    Ok(Row::new(row_type.clone(), values, None))
                } else {
                    Err(InternalError::plan_invalid(format!(
                        "{row_type} expects {} values, got {}",
                        row_type.nfields(),
                        values.len()
                    )))
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { row_type, rows })
    }

    /// Pre-built rows; each must already be of a type the consumer accepts.
    #[must_use]
    pub fn from_rows(row_type: RowTypeRef, rows: Vec<Row>) -> Self {
        Self { row_type, rows }
    }
}

impl Operator for ValuesScan {
    fn cursor(&self, _context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(ValuesCursor {
            rows: self.rows.clone(),
            position: 0,
            lifecycle: CursorLifecycle::new("ValuesScan"),
        }))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.row_type.clone())
    }

    fn describe(&self) -> String {
        format!("ValuesScan({}, {} rows)", self.row_type, self.rows.len())
    }
}

struct ValuesCursor {
    rows: Vec<Row>,
    position: usize,
    lifecycle: CursorLifecycle,
}

impl Cursor for ValuesCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.position = 0;
        if self.rows.is_empty() {
            self.lifecycle.set_active();
            self.lifecycle.set_idle();
        } else {
            self.lifecycle.set_active();
        }

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }

        let row = self.rows.get(self.position).cloned();
        self.position += 1;
        if row.is_none() {
            self.lifecycle.set_idle();
        }

        Ok(row)
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        self.lifecycle.set_idle();

        Ok(())
    }

    fn destroy(&mut self) {
        self.rows.clear();
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}
