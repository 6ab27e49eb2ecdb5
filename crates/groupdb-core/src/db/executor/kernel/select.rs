use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
            operator::{Operator, OperatorRef},
        },
        expr::Evaluator,
        row::{ColumnSelector, Row},
        schema::RowTypeRef,
    },
    error::InternalError,
    value::Value,
};
use std::sync::Arc;

///
/// Select
///
/// Keeps rows of `predicate_type` for which the predicate is `TRUE`.
/// Rows of every other type pass through untouched.
///

#[derive(Debug)]
pub struct Select {
    input: OperatorRef,
    predicate_type: RowTypeRef,
    predicate: Arc<dyn Evaluator>,
}

impl Select {
    #[must_use]
    pub fn new(
        input: OperatorRef,
        predicate_type: RowTypeRef,
        predicate: impl Evaluator + 'static,
    ) -> Self {
        Self {
            input,
            predicate_type,
            predicate: Arc::new(predicate),
        }
    }
}

impl Operator for Select {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(SelectCursor {
            context: context.clone(),
            input: self.input.cursor(context)?,
            predicate_type: self.predicate_type.clone(),
            predicate: self.predicate.clone(),
            lifecycle: CursorLifecycle::new("Select"),
        }))
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        format!("Select({}: {:?})", self.predicate_type, self.predicate)
    }
}

struct SelectCursor {
    context: Arc<QueryContext>,
    input: CursorBox,
    predicate_type: RowTypeRef,
    predicate: Arc<dyn Evaluator>,
    lifecycle: CursorLifecycle,
}

impl SelectCursor {
    fn pull(&mut self) -> Result<Option<Row>, InternalError> {
        let mut poller = self.context.poller();
        while let Some(row) = self.input.next()? {
            if !row.is_type(&self.predicate_type) {
                return Ok(Some(row));
            }
            if matches!(
                self.predicate.evaluate(&row, &self.context)?,
                Value::Bool(true)
            ) {
                return Ok(Some(row));
            }
            poller.tick(&self.context)?;
        }

        Ok(None)
    }
}

impl Cursor for SelectCursor {
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
