use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
            operator::{Operator, OperatorRef},
        },
        row::{ColumnSelector, Row},
        schema::RowTypeRef,
    },
    error::InternalError,
};
use std::sync::Arc;

///
/// Filter
///
/// Keeps only rows whose type is one of `keep_types`.
///

#[derive(Debug)]
pub struct Filter {
    input: OperatorRef,
    keep_types: Vec<RowTypeRef>,
}

impl Filter {
    pub fn new(input: OperatorRef, keep_types: Vec<RowTypeRef>) -> Result<Self, InternalError> {
        if keep_types.is_empty() {
            return Err(InternalError::plan_invalid("filter keeps no row types"));
        }

        Ok(Self { input, keep_types })
    }
}

impl Operator for Filter {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(FilterCursor {
            context: context.clone(),
            input: self.input.cursor(context)?,
            keep_types: self.keep_types.clone(),
            lifecycle: CursorLifecycle::new("Filter"),
        }))
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        let names = self
            .keep_types
            .iter()
            .map(|row_type| row_type.name())
            .collect::<Vec<_>>();
        format!("Filter({})", names.join(", "))
    }
}

struct FilterCursor {
    context: Arc<QueryContext>,
    input: CursorBox,
    keep_types: Vec<RowTypeRef>,
    lifecycle: CursorLifecycle,
}

impl FilterCursor {
    fn keeps(&self, row: &Row) -> bool {
        self.keep_types.iter().any(|row_type| row.is_type(row_type))
    }

    fn pull(&mut self) -> Result<Option<Row>, InternalError> {
        let mut poller = self.context.poller();
        while let Some(row) = self.input.next()? {
            if self.keeps(&row) {
                return Ok(Some(row));
            }
            poller.tick(&self.context)?;
        }

        Ok(None)
    }
}

impl Cursor for FilterCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.input.open()?;
        self.lifecycle.set_active();
        if self.input.is_idle() {
            self.lifecycle.set_idle();
        }

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

    fn jump(&mut self, row: &Row, selector: ColumnSelector) -> Result<(), InternalError> {
        self.lifecycle.check_open("jump")?;
        self.input.jump(row, selector)?;
        self.lifecycle.set_active();

        Ok(())
    }

    fn supports_jump(&self) -> bool {
        self.input.supports_jump()
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
