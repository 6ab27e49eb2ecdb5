use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
            operator::{Operator, OperatorRef},
        },
        hkey::HKey,
        row::Row,
        schema::{Ordinal, RowTypeRef, Schema},
    },
    error::InternalError,
};
use std::{collections::VecDeque, sync::Arc};
use tracing::trace;

///
/// Product
///
/// Crosses two sibling branches of one hkey-ordered stream. A run is the
/// set of rows sharing the hkey of their ancestor in the `branch` table;
/// every left row of a run is paired with every right row of the same
/// run, as soon as both are seen.
///

#[derive(Debug)]
pub struct Product {
    input: OperatorRef,
    left_type: RowTypeRef,
    right_type: RowTypeRef,
    product_type: RowTypeRef,
    branch_depth: usize,
}

impl Product {
    pub fn new(
        schema: &Schema,
        input: OperatorRef,
        left_type: RowTypeRef,
        right_type: RowTypeRef,
        branch: Ordinal,
    ) -> Result<Self, InternalError> {
        if left_type == right_type {
            return Err(InternalError::plan_invalid(format!(
                "product of {left_type} with itself"
            )));
        }
        let product_type = schema.product_type(&left_type, &right_type, branch)?;
        let branch_depth = schema
            .group_of(branch)
            .and_then(|group| group.depth(branch))
            .ok_or_else(|| InternalError::plan_invalid(format!("unknown branch table {branch}")))?;

        Ok(Self {
            input,
            left_type,
            right_type,
            product_type,
            branch_depth,
        })
    }
}

impl Operator for Product {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(ProductCursor {
            context: context.clone(),
            input: self.input.cursor(context)?,
            left_type: self.left_type.clone(),
            right_type: self.right_type.clone(),
            product_type: self.product_type.clone(),
            branch_depth: self.branch_depth,
            run: None,
            left_run: Vec::new(),
            right_run: Vec::new(),
            pending: VecDeque::new(),
            lifecycle: CursorLifecycle::new("Product"),
        }))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.product_type.clone())
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        format!("Product({} x {})", self.left_type, self.right_type)
    }
}

struct ProductCursor {
    context: Arc<QueryContext>,
    input: CursorBox,
    left_type: RowTypeRef,
    right_type: RowTypeRef,
    product_type: RowTypeRef,
    branch_depth: usize,
    run: Option<HKey>,
    left_run: Vec<Row>,
    right_run: Vec<Row>,
    pending: VecDeque<Row>,
    lifecycle: CursorLifecycle,
}

impl ProductCursor {
    fn reset(&mut self) {
        self.run = None;
        self.left_run.clear();
        self.right_run.clear();
        self.pending.clear();
    }

    fn combine(&self, left: &Row, right: &Row) -> Row {
        let mut values = left.values().to_vec();
        values.extend_from_slice(right.values());

        Row::new(self.product_type.clone(), values, left.hkey().cloned())
    }

    fn enter_run(&mut self, row: &Row) -> Result<(), InternalError> {
        let run = row
            .hkey()
            .ok_or_else(|| {
                InternalError::incompatible_row(format!("{row:?} reached Product without an hkey"))
            })?
            .ancestor(self.branch_depth);

        match self.run.as_ref() {
            Some(current) if *current == run => return Ok(()),
            Some(current) if *current > run => {
                return Err(InternalError::incompatible_row(format!(
                    "{row:?} is out of run order after {current}"
                )));
            }
            _ => {}
        }
        trace!(run = %run, "product run started");
        self.left_run.clear();
        self.right_run.clear();
        self.run = Some(run);

        Ok(())
    }

    fn consume(&mut self, row: Row) -> Result<(), InternalError> {
        let is_left = row.is_type(&self.left_type);
        if !is_left && !row.is_type(&self.right_type) {
            return Err(InternalError::incompatible_row(format!(
                "{row:?} is neither {} nor {}",
                self.left_type, self.right_type
            )));
        }
        self.enter_run(&row)?;

        if is_left {
            let products = self
                .right_run
                .iter()
                .map(|right| self.combine(&row, right))
                .collect::<Vec<_>>();
            self.pending.extend(products);
            self.left_run.push(row);
        } else {
            let products = self
                .left_run
                .iter()
                .map(|left| self.combine(left, &row))
                .collect::<Vec<_>>();
            self.pending.extend(products);
            self.right_run.push(row);
        }

        Ok(())
    }

    fn pull(&mut self) -> Result<Option<Row>, InternalError> {
        let mut poller = self.context.poller();
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            let Some(row) = self.input.next()? else {
                return Ok(None);
            };
            self.consume(row)?;
            poller.tick(&self.context)?;
        }
    }
}

impl Cursor for ProductCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.input.open()?;
        self.reset();
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
                self.reset();
                self.lifecycle.set_idle();
                Ok(None)
            }
            Err(err) => {
                self.reset();
                close_quietly(&mut self.input);
                self.lifecycle.set_idle();
                Err(err)
            }
        }
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        if self.lifecycle.state().is_open() {
            self.reset();
            self.input.close()?;
            self.lifecycle.set_idle();
        }

        Ok(())
    }

    fn destroy(&mut self) {
        self.reset();
        self.input.destroy();
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}
