//! Module: db::expr
//! Responsibility: the evaluate/compare capability used by Select, Sort and merges.
//! Does not own: type coercion; comparisons use the canonical value order.

use crate::{
    db::{context::QueryContext, row::Row},
    error::InternalError,
    value::{Value, canonical_cmp},
};
use std::{cmp::Ordering, fmt};

///
/// Evaluator
///
/// Produces one comparable value from a row.
///

pub trait Evaluator: Send + Sync + fmt::Debug {
    fn evaluate(&self, row: &Row, context: &QueryContext) -> Result<Value, InternalError>;
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Ne => !matches!(ordering, Ordering::Equal),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::Lte => !matches!(ordering, Ordering::Greater),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Gte => !matches!(ordering, Ordering::Less),
        }
    }

    const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

///
/// Expression
///
/// Small expression tree sufficient for predicates and sort keys.
/// Comparisons involving `NULL` yield `NULL`; boolean connectives follow
/// three-valued logic.
///

#[derive(Clone, Debug)]
pub enum Expression {
    Field(usize),
    Literal(Value),
    Parameter(usize),
    Compare {
        op: CompareOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    IsNull(Box<Self>),
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
}

impl Expression {
    #[must_use]
    pub const fn field(position: usize) -> Self {
        Self::Field(position)
    }

    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    #[must_use]
    pub const fn parameter(position: usize) -> Self {
        Self::Parameter(position)
    }

    #[must_use]
    pub fn compare(op: CompareOp, left: Self, right: Self) -> Self {
        Self::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn equals(left: Self, right: Self) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    #[must_use]
    pub fn is_null(inner: Self) -> Self {
        Self::IsNull(Box::new(inner))
    }

    /// Evaluate as a filter condition: only `TRUE` passes.
    pub fn test(&self, row: &Row, context: &QueryContext) -> Result<bool, InternalError> {
        Ok(matches!(self.evaluate(row, context)?, Value::Bool(true)))
    }

    fn truth(value: &Value) -> Result<Option<bool>, InternalError> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(v) => Ok(Some(*v)),
            other => Err(InternalError::executor_invariant(format!(
                "expected a boolean operand, found {other}"
            ))),
        }
    }

    fn from_truth(truth: Option<bool>) -> Value {
        truth.map_or(Value::Null, Value::Bool)
    }
}

impl Evaluator for Expression {
    fn evaluate(&self, row: &Row, context: &QueryContext) -> Result<Value, InternalError> {
        match self {
            Self::Field(position) => row.value(*position).cloned().ok_or_else(|| {
                InternalError::executor_invariant(format!(
                    "field {position} out of range for {row:?}"
                ))
            }),
            Self::Literal(value) => Ok(value.clone()),
            Self::Parameter(position) => context.parameter(*position).cloned(),
            Self::Compare { op, left, right } => {
                let left = left.evaluate(row, context)?;
                let right = right.evaluate(row, context)?;
                if left.is_null() || right.is_null() {
                    return Ok(Value::Null);
                }

                Ok(Value::Bool(op.accepts(canonical_cmp(&left, &right))))
            }
            Self::IsNull(inner) => Ok(Value::Bool(inner.evaluate(row, context)?.is_null())),
            Self::And(terms) => {
                let mut result = Some(true);
                for term in terms {
                    match Self::truth(&term.evaluate(row, context)?)? {
                        Some(false) => return Ok(Value::Bool(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(Self::from_truth(result))
            }
            Self::Or(terms) => {
                let mut result = Some(false);
                for term in terms {
                    match Self::truth(&term.evaluate(row, context)?)? {
                        Some(true) => return Ok(Value::Bool(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(Self::from_truth(result))
            }
            Self::Not(inner) => {
                let truth = Self::truth(&inner.evaluate(row, context)?)?;
                Ok(Self::from_truth(truth.map(|v| !v)))
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(position) => write!(f, "Field({position})"),
            Self::Literal(value) => write!(f, "{value}"),
            Self::Parameter(position) => write!(f, "${position}"),
            Self::Compare { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Self::IsNull(inner) => write!(f, "{inner} IS NULL"),
            Self::And(terms) => write_joined(f, terms, " AND "),
            Self::Or(terms) => write_joined(f, terms, " OR "),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Expression], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{term}")?;
    }
    f.write_str(")")
}
