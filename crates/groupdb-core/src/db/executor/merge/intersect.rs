use crate::{
    db::{
        context::QueryContext,
        executor::{
            JoinType,
            cursor::CursorBox,
            merge::{MergeCursor, MergeKeys, MergeStep, ScanMode, Sides},
            operator::{Operator, OperatorRef},
        },
        row::Row,
        schema::RowTypeRef,
    },
    error::InternalError,
};
use std::{cmp::Ordering, collections::VecDeque, sync::Arc};

///
/// IntersectOutput
///
/// Which side's row a match produces. `Both` emits the left row and then
/// the right row.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum IntersectOutput {
    #[default]
    Left,
    Right,
    Both,
}

///
/// IntersectOptions
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IntersectOptions {
    pub join: JoinType,
    pub output: IntersectOutput,
    pub scan: ScanMode,

    /// On a match only the output side advances, so every output-side
    /// row equal to one other-side row is emitted.
    pub output_equal: bool,
}

impl IntersectOptions {
    #[must_use]
    pub const fn output(mut self, output: IntersectOutput) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub const fn join(mut self, join: JoinType) -> Self {
        self.join = join;
        self
    }

    #[must_use]
    pub const fn scan(mut self, scan: ScanMode) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub const fn output_equal(mut self) -> Self {
        self.output_equal = true;
        self
    }

    fn validate(&self) -> Result<(), InternalError> {
        let consistent = match self.join {
            JoinType::Inner => true,
            JoinType::Left => self.output == IntersectOutput::Left,
            JoinType::Right => self.output == IntersectOutput::Right,
            JoinType::Full => {
                return Err(InternalError::plan_invalid(
                    "intersect does not support a full join",
                ));
            }
        };
        if !consistent {
            return Err(InternalError::plan_invalid(format!(
                "intersect {:?} join cannot output {:?} rows",
                self.join, self.output
            )));
        }
        if self.output == IntersectOutput::Both && self.output_equal {
            return Err(InternalError::plan_invalid(
                "intersect cannot output equal rows of both sides",
            ));
        }

        Ok(())
    }
}

///
/// Intersect
///
/// Rows whose compared key appears in both ordered inputs.
///

#[derive(Debug)]
pub struct Intersect {
    left: OperatorRef,
    left_type: RowTypeRef,
    right: OperatorRef,
    right_type: RowTypeRef,
    keys: MergeKeys,
    options: IntersectOptions,
}

impl Intersect {
    pub fn new(
        left: OperatorRef,
        left_type: RowTypeRef,
        right: OperatorRef,
        right_type: RowTypeRef,
        keys: MergeKeys,
        options: IntersectOptions,
    ) -> Result<Self, InternalError> {
        keys.validate(&left_type, &right_type)?;
        options.validate()?;

        Ok(Self {
            left,
            left_type,
            right,
            right_type,
            keys,
            options,
        })
    }
}

impl Operator for Intersect {
    fn cursor(&self, context: &Arc<QueryContext>) -> Result<CursorBox, InternalError> {
        let left = self.left.cursor(context)?;
        let right = self.right.cursor(context)?;
        let step = IntersectStep {
            options: self.options,
            pending: VecDeque::new(),
        };

        Ok(Box::new(MergeCursor::new(
            "Intersect",
            context,
            (left, self.left_type.clone()),
            (right, self.right_type.clone()),
            &self.keys,
            self.options.scan,
            step,
        )))
    }

    fn row_type(&self) -> Option<RowTypeRef> {
        match self.options.output {
            IntersectOutput::Right => Some(self.right_type.clone()),
            IntersectOutput::Left | IntersectOutput::Both => Some(self.left_type.clone()),
        }
    }

    fn inputs(&self) -> Vec<&OperatorRef> {
        vec![&self.left, &self.right]
    }

    fn describe(&self) -> String {
        format!(
            "Intersect({} {} {}, compare {}, {:?}, {:?})",
            self.left_type,
            self.options.join.label(),
            self.right_type,
            self.keys.directions.len(),
            self.options.output,
            self.options.scan
        )
    }
}

struct IntersectStep {
    options: IntersectOptions,
    pending: VecDeque<Row>,
}

impl MergeStep for IntersectStep {
    fn step(&mut self, sides: &mut Sides) -> Result<Option<Row>, InternalError> {
        if let Some(row) = self.pending.pop_front() {
            return Ok(Some(row));
        }

        let output_equal = self.options.output_equal;
        match sides.compare() {
            Ordering::Less if self.options.join.keeps_left() => sides.left.take(),
            Ordering::Less => sides.skip_left().map(|()| None),
            Ordering::Greater if self.options.join.keeps_right() => sides.right.take(),
            Ordering::Greater => sides.skip_right().map(|()| None),
            Ordering::Equal => match self.options.output {
                IntersectOutput::Left => {
                    if !output_equal {
                        sides.right.advance()?;
                    }
                    sides.left.take()
                }
                IntersectOutput::Right => {
                    if !output_equal {
                        sides.left.advance()?;
                    }
                    sides.right.take()
                }
                IntersectOutput::Both => {
                    let left = sides.left.take()?;
                    let right = sides.right.take()?;
                    self.pending.extend(right);
                    Ok(left)
                }
            },
        }
    }

    fn finished(&self, sides: &Sides) -> bool {
        if !self.pending.is_empty() {
            return false;
        }
        let left_done = sides.left.is_exhausted();
        let right_done = sides.right.is_exhausted();

        (left_done && right_done)
            || (left_done && !self.options.join.keeps_right())
            || (right_done && !self.options.join.keeps_left())
    }

    fn jump_fixed(&self, sides: &Sides) -> usize {
        match self.options.output {
            IntersectOutput::Right => sides.right.fixed,
            IntersectOutput::Left | IntersectOutput::Both => sides.left.fixed,
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
    }
}
