use crate::{
    db::{
        context::QueryContext,
        executor::{
            cursor::CursorBox,
            merge::{MergeCursor, MergeKeys, MergeStep, ScanMode, Sides},
            operator::{Operator, OperatorRef},
        },
        row::Row,
        schema::RowTypeRef,
    },
    error::InternalError,
};
use std::{cmp::Ordering, sync::Arc};

///
/// Union
///
/// Ordered merge of both inputs. On equal keys the left row is emitted;
/// the right row is dropped unless `output_equal` is set, in which case
/// it follows later.
///

#[derive(Debug)]
pub struct Union {
    left: OperatorRef,
    left_type: RowTypeRef,
    right: OperatorRef,
    right_type: RowTypeRef,
    keys: MergeKeys,
    output_equal: bool,
}

impl Union {
    pub fn new(
        left: OperatorRef,
        left_type: RowTypeRef,
        right: OperatorRef,
        right_type: RowTypeRef,
        keys: MergeKeys,
        output_equal: bool,
    ) -> Result<Self, InternalError> {
        keys.validate(&left_type, &right_type)?;
        if keys.left_ordering_fields != keys.right_ordering_fields {
            return Err(InternalError::plan_invalid(format!(
                "union inputs order on {} and {} fields",
                keys.left_ordering_fields, keys.right_ordering_fields
            )));
        }

        Ok(Self {
            left,
            left_type,
            right,
            right_type,
            keys,
            output_equal,
        })
    }
}

impl Operator for Union {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let left = self.left.cursor(context)?;
        let right = self.right.cursor(context)?;

        Ok(Box::new(MergeCursor::new(
            "Union",
            context,
            (left, self.left_type.clone()),
            (right, self.right_type.clone()),
            &self.keys,
            ScanMode::SequentialScan,
            UnionStep {
                output_equal: self.output_equal,
            },
        )))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.left_type.clone())
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.left, &self.right]
    }

    fn describe(&self) -> String {
        format!(
            "Union({}, {}, compare {})",
            self.left_type,
            self.right_type,
            self.keys.directions.len()
        )
    }
}

struct UnionStep {
    output_equal: bool,
}

impl MergeStep for UnionStep {
    fn step(&mut self, sides: &mut Sides) -> Result<Option<Row>, InternalError> {
        match sides.compare() {
            Ordering::Less => sides.left.take(),
            Ordering::Greater => sides.right.take(),
            Ordering::Equal => {
                if !self.output_equal {
                    sides.right.advance()?;
                }
                sides.left.take()
            }
        }
    }

    fn finished(&self, sides: &Sides) -> bool {
        sides.left.is_exhausted() && sides.right.is_exhausted()
    }
}
