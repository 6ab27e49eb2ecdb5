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
/// Except
///
/// Left rows whose compared key has no equal among the right rows. The
/// right side skip-scans to each left key when it can seek.
///

#[derive(Debug)]
pub struct Except {
    left: OperatorRef,
    left_type: RowTypeRef,
    right: OperatorRef,
    right_type: RowTypeRef,
    keys: MergeKeys,
    scan: ScanMode,
}

impl Except {
    pub fn new(
        left: OperatorRef,
        left_type: RowTypeRef,
        right: OperatorRef,
        right_type: RowTypeRef,
        keys: MergeKeys,
        scan: ScanMode,
    ) -> Result<Self, InternalError> {
        keys.validate(&left_type, &right_type)?;

        Ok(Self {
            left,
            left_type,
            right,
            right_type,
            keys,
            scan,
        })
    }
}

impl Operator for Except {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let left = self.left.cursor(context)?;
        let right = self.right.cursor(context)?;

        Ok(Box::new(MergeCursor::new(
            "Except",
            context,
            (left, self.left_type.clone()),
            (right, self.right_type.clone()),
            &self.keys,
            self.scan,
            ExceptStep,
        )))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        Some(self.left_type.clone())
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.left, &self.right]
    }

    fn describe(&self) -> String {
        format!("Except({} - {})", self.left_type, self.right_type)
    }
}

struct ExceptStep;

impl MergeStep for ExceptStep {
    fn step(&mut self, sides: &mut Sides) -> Result<Option<Row>, InternalError> {
        match sides.compare() {
            Ordering::Less => sides.left.take(),
            Ordering::Greater => sides.skip_right().map(|()| None),
            Ordering::Equal => sides.left.advance().map(|()| None),
        }
    }

    fn finished(&self, sides: &Sides) -> bool {
        sides.left.is_exhausted()
    }
}
