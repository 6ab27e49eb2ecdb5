use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
            operator::{Operator, OperatorRef},
        },
        row::Row,
    },
    error::InternalError,
    value::Value,
};
use std::{fmt, sync::Arc};
use tracing::trace;

///
/// LimitBound
///
/// A row count fixed in the plan or read from a bound query parameter
/// when the cursor opens. A `NULL` parameter means no bound.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LimitBound {
    Literal(i64),
    Parameter(usize),
}

impl LimitBound {
    pub(crate) fn check_literal(self, what: &str) -> Result<(), InternalError> {
        match self {
            Self::Literal(value) if value < 0 => Err(InternalError::negative_limit(what, value)),
            _ => Ok(()),
        }
    }

    /// `None` when the bound resolves to `NULL`.
    pub(crate) fn resolve(
        self,
        what: &str,
        context: &QueryContext,
    ) -> Result<Option<usize>, InternalError> {
        let value = match self {
            Self::Literal(value) => value,
            Self::Parameter(position) => match context.parameter(position)? {
                Value::Null => return Ok(None),
                other => other.as_i64().ok_or_else(|| {
                    InternalError::executor_invariant(format!(
                        "{what} parameter {position} is not an integer: {other}"
                    ))
                })?,
            },
        };
        if value < 0 {
            return Err(InternalError::negative_limit(what, value));
        }

        Ok(Some(usize::try_from(value).unwrap_or(usize::MAX)))
    }
}

impl fmt::Display for LimitBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Parameter(position) => write!(f, "${position}"),
        }
    }
}

///
/// Limit
///
/// Skips the first `skip` rows and then passes at most `take` rows.
///

#[derive(Debug)]
pub struct Limit {
    input: OperatorRef,
    skip: Option<LimitBound>,
    take: Option<LimitBound>,
}

impl Limit {
    pub fn new(
        input: OperatorRef,
        skip: Option<LimitBound>,
        take: Option<LimitBound>,
    ) -> Result<Self, InternalError> {
        if let Some(skip) = skip {
            skip.check_literal("skip")?;
        }
        if let Some(take) = take {
            take.check_literal("limit")?;
        }

        Ok(Self { input, skip, take })
    }

    #[must_use]
    pub fn take(input: OperatorRef, rows: usize) -> Self {
        Self {
            input,
            skip: None,
            take: Some(LimitBound::Literal(i64::try_from(rows).unwrap_or(i64::MAX))),
        }
    }
}

impl Operator for Limit {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(LimitCursor {
            context: context.clone(),
            input: self.input.cursor(context)?,
            skip: self.skip,
            take: self.take,
            to_skip: 0,
            remaining: None,
            lifecycle: CursorLifecycle::new("Limit"),
        }))
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        let show = |bound: Option<LimitBound>| bound.map_or_else(|| "-".to_string(), |b| b.to_string());
        format!("Limit(skip {}, take {})", show(self.skip), show(self.take))
    }
}

struct LimitCursor {
    context: Arc<QueryContext>,
    input: CursorBox,
    skip: Option<LimitBound>,
    take: Option<LimitBound>,
    to_skip: usize,
    remaining: Option<usize>,
    lifecycle: CursorLifecycle,
}

impl LimitCursor {
    fn resolve(&mut self) -> Result<(), InternalError> {
        self.to_skip = match self.skip {
            Some(bound) => bound.resolve("skip", &self.context)?.unwrap_or(0),
            None => 0,
        };
        self.remaining = match self.take {
            Some(bound) => bound.resolve("limit", &self.context)?,
            None => None,
        };
        trace!(skip = self.to_skip, take = ?self.remaining, "limit resolved");

        Ok(())
    }

    fn pull(&mut self) -> Result<Option<Row>, InternalError> {
        if self.remaining == Some(0) {
            return Ok(None);
        }

        let mut poller = self.context.poller();
        while self.to_skip > 0 {
            if self.input.next()?.is_none() {
                return Ok(None);
            }
            self.to_skip -= 1;
            poller.tick(&self.context)?;
        }

        let row = self.input.next()?;
        if row.is_some() {
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
        }

        Ok(row)
    }
}

impl Cursor for LimitCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.resolve()?;
        if self.remaining == Some(0) {
            self.lifecycle.set_active();
            self.lifecycle.set_idle();
            return Ok(());
        }
        self.input.open()?;
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
                self.input.close()?;
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
