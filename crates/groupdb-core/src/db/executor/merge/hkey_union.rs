use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::CursorBox,
            merge::{MergeCursor, MergeKeys, MergeStep, ScanMode, Sides},
            operator::{Operator, OperatorRef},
        },
        hkey::HKey,
        row::Row,
        schema::{Ordinal, RowTypeRef, Schema},
    },
    error::InternalError,
};
use std::{cmp::Ordering, sync::Arc};

///
/// HKeyUnion
///
/// Unions the hkeys of two index streams after cutting each one back to
/// an ancestor table. The ordering fields of each input are its trailing
/// hkey values; the compared prefix must not reach below the output
/// table's own key.
///
/// Output rows are `hkey_type(output_table)` rows, one per distinct
/// ancestor hkey, in hkey order.
///

#[derive(Debug)]
pub struct HKeyUnion {
    left: OperatorRef,
    left_type: RowTypeRef,
    right: OperatorRef,
    right_type: RowTypeRef,
    keys: MergeKeys,
    output_type: RowTypeRef,
    output_depth: usize,
}

impl HKeyUnion {
    pub fn new(
        schema: &Schema,
        left: OperatorRef,
        left_type: RowTypeRef,
        right: OperatorRef,
        right_type: RowTypeRef,
        keys: MergeKeys,
        output_table: Ordinal,
    ) -> Result<Self, InternalError> {
        keys.validate(&left_type, &right_type)?;
        let group = schema.group_of(output_table).ok_or_else(|| {
            InternalError::plan_invalid(format!("unknown output table {output_table}"))
        })?;
        for input in [&left_type, &right_type] {
            let covered = input.hkey_table().is_some_and(|table| {
                table == output_table || group.is_ancestor(output_table, table)
            });
            if !covered {
                return Err(InternalError::plan_invalid(format!(
                    "{input} rows do not descend from table {output_table}"
                )));
            }
        }
        let output_depth = group.depth(output_table).ok_or_else(|| {
            InternalError::plan_invalid(format!("table {output_table} has no group depth"))
        })?;
        let output_type = schema.hkey_type(output_table)?;
        if keys.directions.len() > output_type.nfields() {
            return Err(InternalError::plan_invalid(format!(
                "{} compared fields exceed the {} hkey values of {output_type}",
                keys.directions.len(),
                output_type.nfields()
            )));
        }

        Ok(Self {
            left,
            left_type,
            right,
            right_type,
            keys,
            output_type,
            output_depth,
        })
    }
}

impl Operator for HKeyUnion {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let left = self.left.cursor(context)?;
        let right = self.right.cursor(context)?;
        let step = HKeyUnionStep {
            output_type: self.output_type.clone(),
            output_depth: self.output_depth,
            last: None,
        };

        Ok(Box::new(MergeCursor::new(
            "HKeyUnion",
            context,
            (left, self.left_type.clone()),
            (right, self.right_type.clone()),
            &self.keys,
            ScanMode::SkipScan,
            step,
        )))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.output_type.clone())
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.left, &self.right]
    }

    fn describe(&self) -> String {
        format!(
            "HKeyUnion({}, {} -> {})",
            self.left_type, self.right_type, self.output_type
        )
    }
}

struct HKeyUnionStep {
    output_type: RowTypeRef,
    output_depth: usize,
    last: Option<HKey>,
}

impl HKeyUnionStep {
    fn output_row(&mut self, input: &Row) -> Result<Option<Row>, InternalError> {
        let hkey = input
            .hkey()
            .ok_or_else(|| {
                InternalError::incompatible_row(format!("{input:?} reached HKeyUnion without an hkey"))
            })?
            .ancestor(self.output_depth);
        if self.last.as_ref() == Some(&hkey) {
            return Ok(None);
        }

        let values = hkey.values().cloned().collect::<Vec<_>>();
        if values.len() != self.output_type.nfields() {
            return Err(InternalError::incompatible_row(format!(
                "{input:?} cannot be cut back to {}",
                self.output_type
            )));
        }
        self.last = Some(hkey.clone());

        Ok(Some(Row::new(self.output_type.clone(), values, Some(hkey))))
    }
}

impl MergeStep for HKeyUnionStep {
    fn step(&mut self, sides: &mut Sides) -> Result<Option<Row>, InternalError> {
        let input = match sides.compare() {
            Ordering::Less => sides.left.take()?,
            Ordering::Greater => sides.right.take()?,
            Ordering::Equal => {
                sides.right.advance()?;
                sides.left.take()?
            }
        };

        match input {
            Some(input) => self.output_row(&input),
            None => Ok(None),
        }
    }

    fn finished(&self, sides: &Sides) -> bool {
        sides.left.is_exhausted() && sides.right.is_exhausted()
    }

    /// Jump rows are output hkey rows, compared from their first field.
    fn jump_fixed(&self, _sides: &Sides) -> usize {
        0
    }

    fn reset(&mut self) {
        self.last = None;
    }
}
