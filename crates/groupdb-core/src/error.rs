use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Callers discriminate kinds through `class` or the `is_*` predicates,
/// never by matching on `message`.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Optional structured error detail.
    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl InternalError {
    /// Construct an InternalError with optional origin-specific detail.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        let message = message.into();

        let detail = match (class, origin) {
            (ErrorClass::Corruption, ErrorOrigin::Store) => {
                Some(ErrorDetail::Store(StoreError::Corrupt {
                    message: message.clone(),
                }))
            }
            (ErrorClass::InvariantViolation, ErrorOrigin::Store) => {
                Some(ErrorDetail::Store(StoreError::InvariantViolation {
                    message: message.clone(),
                }))
            }
            _ => None,
        };

        Self {
            class,
            origin,
            message,
            detail,
        }
    }

    /// Construct a construction-time validation error.
    pub(crate) fn invalid_argument(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidArgument, origin, message.into())
    }

    /// Construct a plan-origin validation error.
    pub(crate) fn plan_invalid(message: impl Into<String>) -> Self {
        Self::invalid_argument(ErrorOrigin::Plan, message)
    }

    /// A row reached an operator that cannot accept it at that position.
    pub(crate) fn incompatible_row(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::IncompatibleRow,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    pub(crate) fn negative_limit(what: &str, value: i64) -> Self {
        Self::new(
            ErrorClass::NegativeLimit,
            ErrorOrigin::Executor,
            format!("{what} must not be negative, resolved to {value}"),
        )
    }

    pub(crate) fn query_cancelled() -> Self {
        Self::new(
            ErrorClass::Cancelled,
            ErrorOrigin::Context,
            "query was cancelled",
        )
    }

    pub(crate) fn query_timeout(elapsed_ms: u128, timeout_ms: u128) -> Self {
        Self::new(
            ErrorClass::Timeout,
            ErrorOrigin::Context,
            format!("query timed out after {elapsed_ms}ms (limit {timeout_ms}ms)"),
        )
    }

    /// Construct a cursor protocol violation.
    pub(crate) fn cursor_lifecycle(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::CursorLifecycle,
            ErrorOrigin::Cursor,
            message.into(),
        )
    }

    /// Construct an executor-origin invariant violation.
    pub(crate) fn executor_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct an executor-origin internal error.
    pub(crate) fn executor_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Executor, message.into())
    }

    /// Construct an executor-origin unsupported error.
    pub(crate) fn executor_unsupported(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct a store-origin internal error.
    pub(crate) fn store_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Store, message.into())
    }

    /// Construct a store-origin invariant violation.
    pub(crate) fn store_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Store,
            message.into(),
        )
    }

    /// Construct a store-origin corruption error.
    pub(crate) fn store_corruption(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, ErrorOrigin::Store, message.into())
    }

    /// Construct a primary-key uniqueness conflict.
    pub(crate) fn store_conflict(table: &str, key: impl fmt::Debug) -> Self {
        Self::new(
            ErrorClass::Conflict,
            ErrorOrigin::Store,
            format!("duplicate primary key in {table}: {key:?}"),
        )
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.class == ErrorClass::Cancelled
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.class == ErrorClass::Timeout
    }

    #[must_use]
    pub fn is_incompatible_row(&self) -> bool {
        self.class == ErrorClass::IncompatibleRow
    }

    #[must_use]
    pub fn is_negative_limit(&self) -> bool {
        self.class == ErrorClass::NegativeLimit
    }

    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        self.class == ErrorClass::CursorLifecycle
    }

    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        self.class == ErrorClass::InvalidArgument
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorDetail
///
/// Structured, origin-specific error detail carried by [`InternalError`].
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Store(StoreError),
}

///
/// StoreError
///
/// Store-specific structured error detail.
/// Never returned directly; always wrapped in [`ErrorDetail::Store`].
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("store corruption: {message}")]
    Corrupt { message: String },

    #[error("store invariant violation: {message}")]
    InvariantViolation { message: String },
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    InvalidArgument,
    IncompatibleRow,
    NegativeLimit,
    Cancelled,
    Timeout,
    CursorLifecycle,
    Unsupported,
    Conflict,
    Corruption,
    Internal,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::IncompatibleRow => "incompatible_row",
            Self::NegativeLimit => "negative_limit",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::CursorLifecycle => "cursor_lifecycle",
            Self::Unsupported => "unsupported",
            Self::Conflict => "conflict",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Plan,
    Cursor,
    Executor,
    Store,
    Context,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Plan => "plan",
            Self::Cursor => "cursor",
            Self::Executor => "executor",
            Self::Store => "store",
            Self::Context => "context",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
