//! Module: executor::flatten
//! Responsibility: structural parent/child join over one hkey-ordered stream.
//! Does not own: ordering of its input; out-of-order rows are rejected.
//! Boundary: single forward pass holding at most the current parent.


use crate::{
    db::{
        context::QueryContext,
        executor::{
            JoinType,
            cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
            operator::{Operator, OperatorRef},
        },
        hkey::HKey,
        row::Row,
        schema::{Ordinal, RowTypeRef, Schema},
    },
    error::InternalError,
    value::Value,
};
use std::{collections::VecDeque, sync::Arc};
use tracing::trace;

///
/// FlattenOptions
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FlattenOptions {
    /// Emit each parent row as well as the rows flattened from it.
    pub keep_parent: bool,

    /// Emit each child row as well as the rows flattened from it.
    pub keep_child: bool,

    /// Left-join rows carry the parent hkey unchanged instead of the
    /// parent hkey extended with a null child position.
    pub left_join_shortens_hkey: bool,
}

impl FlattenOptions {
    #[must_use]
    pub const fn keep_parent(mut self) -> Self {
        self.keep_parent = true;
        self
    }

    #[must_use]
    pub const fn keep_child(mut self) -> Self {
        self.keep_child = true;
        self
    }

    #[must_use]
    pub const fn left_join_shortens_hkey(mut self) -> Self {
        self.left_join_shortens_hkey = true;
        self
    }
}

///
/// Flatten
///
/// Combines parent rows with rows of their immediate child table into
/// rows of the flattened type. Rows of any other type pass through in
/// place.
///

#[derive(Debug)]
pub struct Flatten {
    input: OperatorRef,
    parent_type: RowTypeRef,
    child_type: RowTypeRef,
    flatten_type: RowTypeRef,
    child_ordinal: Ordinal,
    join: JoinType,
    options: FlattenOptions,
}

impl Flatten {
    pub fn new(
        schema: &Schema,
        input: OperatorRef,
        parent_type: RowTypeRef,
        child_type: RowTypeRef,
        join: JoinType,
        options: FlattenOptions,
    ) -> Result<Self, InternalError> {
        let flatten_type = schema.flattened_type(&parent_type, &child_type)?;
        let child_ordinal = child_type.hkey_table().ok_or_else(|| {
            InternalError::plan_invalid(format!("{child_type} carries no hkey"))
        })?;

        Ok(Self {
            input,
            parent_type,
            child_type,
            flatten_type,
            child_ordinal,
            join,
            options,
        })
    }
}

impl Operator for Flatten {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        Ok(Box::new(FlattenCursor {
            context: context.clone(),
            input: self.input.cursor(context)?,
            parent_type: self.parent_type.clone(),
            child_type: self.child_type.clone(),
            flatten_type: self.flatten_type.clone(),
            child_ordinal: self.child_ordinal,
            left_join: self.join.keeps_left(),
            right_join: self.join.keeps_right(),
            options: self.options,
            lifecycle: CursorLifecycle::new("Flatten"),
            parent: None,
            childless_parent: false,
            last_hkey: None,
            pending: VecDeque::new(),
        }))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.flatten_type.clone())
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.input]
    }

    fn describe(&self) -> String {
        let mut out = format!("Flatten({}", self.parent_type);
        if self.options.keep_parent {
            out.push_str(" KEEP");
        }
        out.push_str(&format!(" {} {}", self.join.label(), self.child_type));
        if self.options.keep_child {
            out.push_str(" KEEP");
        }
        out.push(')');
        out
    }
}

///
/// FlattenCursor
///

struct FlattenCursor {
    context: Arc<QueryContext>,
    input: CursorBox,
    parent_type: RowTypeRef,
    child_type: RowTypeRef,
    flatten_type: RowTypeRef,
    child_ordinal: Ordinal,
    left_join: bool,
    right_join: bool,
    options: FlattenOptions,
    lifecycle: CursorLifecycle,

    parent: Option<Row>,

    /// The current parent has produced no row yet.
    childless_parent: bool,

    /// Last parent or child hkey seen, for the ordering check.
    last_hkey: Option<HKey>,
    pending: VecDeque<Row>,
}

impl FlattenCursor {
    fn reset(&mut self) {
        self.parent = None;
        self.childless_parent = false;
        self.last_hkey = None;
        self.pending.clear();
    }

    fn abort(&mut self) {
        self.reset();
        close_quietly(&mut self.input);
        self.lifecycle.set_idle();
    }

    fn flattened(&self, parent: Option<&Row>, child: Option<&Row>, hkey: HKey) -> Row {
        let mut values = Vec::with_capacity(self.flatten_type.nfields());
        match parent {
            Some(parent) => values.extend_from_slice(parent.values()),
            None => values.extend(std::iter::repeat_n(Value::Null, self.parent_type.nfields())),
        }
        match child {
            Some(child) => values.extend_from_slice(child.values()),
            None => values.extend(std::iter::repeat_n(Value::Null, self.child_type.nfields())),
        }

        Row::new(self.flatten_type.clone(), values, Some(hkey))
    }

    fn left_join_hkey(&self, parent: &Row) -> Option<HKey> {
        let hkey = parent.hkey()?.clone();
        if self.options.left_join_shortens_hkey {
            Some(hkey)
        } else {
            Some(hkey.extend_with_ordinal(self.child_ordinal).extend_with_nulls(1))
        }
    }

    /// A childless parent's left-join row is due once the input moves
    /// past everything that could still be its child.
    fn ready_for_left_join_row(&self, input: Option<&Row>) -> bool {
        let Some(parent) = self.parent.as_ref() else {
            return false;
        };
        if !self.left_join || !self.childless_parent {
            return false;
        }
        let Some(input) = input else {
            return true;
        };
        if input.is_type(&self.parent_type) || !parent.is_ancestor_of(input) {
            return true;
        }
        if input.is_type(&self.child_type) {
            return false;
        }

        match (self.left_join_hkey(parent), input.hkey()) {
            (Some(left_join_hkey), Some(hkey)) => left_join_hkey < *hkey,
            _ => false,
        }
    }

    fn emit_left_join_row(&mut self) {
        let Some(parent) = self.parent.clone() else {
            return;
        };
        if let Some(hkey) = self.left_join_hkey(&parent) {
            let row = self.flattened(Some(&parent), None, hkey);
            self.pending.push_back(row);
        }
        self.childless_parent = false;
    }

    fn set_parent(&mut self, parent: Option<Row>) {
        self.childless_parent = self.left_join && parent.is_some();
        self.parent = parent;
    }

    /// Parent and child rows must arrive in nondecreasing hkey order.
    fn check_order(&mut self, row: &Row) -> Result<(), InternalError> {
        let hkey = row.hkey().ok_or_else(|| {
            InternalError::incompatible_row(format!("flatten input {row:?} carries no hkey"))
        })?;
        if let Some(last) = &self.last_hkey
            && hkey < last
        {
            return Err(InternalError::incompatible_row(format!(
                "flatten input out of hkey order: {row:?} after {last}"
            )));
        }
        self.last_hkey = Some(hkey.clone());

        Ok(())
    }

    fn consume(&mut self, input: Option<Row>) -> Result<(), InternalError> {
        if self.ready_for_left_join_row(input.as_ref()) {
            self.emit_left_join_row();
        }

        let Some(row) = input else {
            self.set_parent(None);
            return Ok(());
        };

        if row.is_type(&self.parent_type) {
            self.check_order(&row)?;
            if self.options.keep_parent {
                self.pending.push_back(row.clone());
            }
            self.set_parent(Some(row));
        } else if row.is_type(&self.child_type) {
            self.check_order(&row)?;
            if self.options.keep_child {
                self.pending.push_back(row.clone());
            }
            let hkey = row.hkey().cloned().unwrap_or_default();
            match self.parent.clone() {
                Some(parent) if parent.is_ancestor_of(&row) => {
                    let flattened = self.flattened(Some(&parent), Some(&row), hkey);
                    self.pending.push_back(flattened);
                    self.childless_parent = false;
                }
                _ => {
                    trace!(child = ?row, "orphan child in flatten");
                    self.set_parent(None);
                    if self.right_join {
                        let flattened = self.flattened(None, Some(&row), hkey);
                        self.pending.push_back(flattened);
                    }
                }
            }
        } else {
            self.pending.push_back(row);
        }

        Ok(())
    }

    fn advance(&mut self) -> Result<Option<Row>, InternalError> {
        let mut poller = self.context.poller();
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(row));
            }
            let input = self.input.next()?;
            if input.is_none() && self.parent.is_none() {
                return Ok(None);
            }
            self.consume(input)?;
            poller.tick(&self.context)?;
        }
    }
}

impl Cursor for FlattenCursor {
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

        let result = self
            .context
            .check_cancelation()
            .and_then(|()| self.advance());
        match result {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.lifecycle.set_idle();
                Ok(None)
            }
            Err(err) => {
                self.abort();
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
