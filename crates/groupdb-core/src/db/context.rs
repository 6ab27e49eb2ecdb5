//! Module: db::context
//! Responsibility: per-execution state shared by every cursor of one plan.
//! Does not own: row state; cursors own their own positions and buffers.
//! Boundary: cancellation and timeout are observed only through `check_cancelation`.

use crate::{
    config::EngineConfig,
    db::{schema::Schema, store::StorageAdapter},
    error::InternalError,
    value::Value,
};
use derive_more::Display;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tracing::debug;
use ulid::Ulid;

const NO_TIMEOUT: u64 = u64::MAX;

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

///
/// SessionId
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub struct SessionId(Ulid);

impl SessionId {
    /// Time-ordered id; the random half is a process-wide sequence.
    #[must_use]
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
            });
        let sequence = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let random = (u128::from(std::process::id()) << 64) | u128::from(sequence);

        Self(Ulid::from_parts(millis, random))
    }
}

///
/// CancellationHandle
///
/// Clonable flag a caller keeps to cancel a running query from another
/// thread.
///

#[derive(Clone, Debug, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

///
/// QueryContext
///
/// Schema, storage, parameters and execution control for one query.
/// Shared by reference count between the cursors of a plan and the
/// lookahead tasks they spawn.
///

pub struct QueryContext {
    schema: Arc<Schema>,
    store: Arc<dyn StorageAdapter>,
    config: EngineConfig,
    parameters: Vec<Value>,
    session: SessionId,
    cancellation: CancellationHandle,
    started_at: Instant,
    timeout_ms: AtomicU64,
}

impl QueryContext {
    #[must_use]
    pub fn new(schema: Arc<Schema>, store: Arc<dyn StorageAdapter>) -> Self {
        Self::with_config(schema, store, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(
        schema: Arc<Schema>,
        store: Arc<dyn StorageAdapter>,
        config: EngineConfig,
    ) -> Self {
        let timeout_ms = config.query_timeout_ms.unwrap_or(NO_TIMEOUT);

        Self {
            schema,
            store,
            config,
            parameters: Vec::new(),
            session: SessionId::generate(),
            cancellation: CancellationHandle::default(),
            started_at: Instant::now(),
            timeout_ms: AtomicU64::new(timeout_ms),
        }
    }

    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = session;
        self
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StorageAdapter> {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    pub fn parameter(&self, position: usize) -> Result<&Value, InternalError> {
        self.parameters.get(position).ok_or_else(|| {
            InternalError::executor_invariant(format!(
                "parameter {position} is not bound ({} bound)",
                self.parameters.len()
            ))
        })
    }

    #[must_use]
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Install, shorten, extend or remove the timeout. Measured from the
    /// query start; effective at the next poll.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        let millis = timeout.map_or(NO_TIMEOUT, |timeout| {
            u64::try_from(timeout.as_millis()).unwrap_or(NO_TIMEOUT - 1)
        });
        self.timeout_ms.store(millis, Ordering::Release);
        debug!(session = %self.session, ?timeout, "query timeout changed");
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms.load(Ordering::Acquire) {
            NO_TIMEOUT => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    /// Fail with the cancellation or timeout error kind if either applies.
    pub fn check_cancelation(&self) -> Result<(), InternalError> {
        if self.cancellation.is_cancelled() {
            debug!(session = %self.session, "query cancellation observed");
            return Err(InternalError::query_cancelled());
        }

        if let Some(timeout) = self.timeout() {
            let elapsed = self.started_at.elapsed();
            if elapsed >= timeout {
                debug!(session = %self.session, ?elapsed, "query timeout observed");
                return Err(InternalError::query_timeout(
                    elapsed.as_millis(),
                    timeout.as_millis(),
                ));
            }
        }

        Ok(())
    }

    pub(crate) fn poller(&self) -> CancelPoller {
        CancelPoller::new(self.config.cancel_poll_interval)
    }
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("session", &self.session)
            .field("parameters", &self.parameters)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("timeout", &self.timeout())
            .finish_non_exhaustive()
    }
}

///
/// CancelPoller
///
/// Counts work done inside a loop and polls the context every
/// `interval` units.
///

pub(crate) struct CancelPoller {
    interval: usize,
    since_poll: usize,
}

impl CancelPoller {
    const fn new(interval: usize) -> Self {
        Self {
            interval: if interval == 0 { 1 } else { interval },
            since_poll: 0,
        }
    }

    pub(crate) fn tick(&mut self, context: &QueryContext) -> Result<(), InternalError> {
        self.since_poll += 1;
        if self.since_poll >= self.interval {
            self.since_poll = 0;
            context.check_cancelation()?;
        }

        Ok(())
    }
}

///
/// TESTS
///
