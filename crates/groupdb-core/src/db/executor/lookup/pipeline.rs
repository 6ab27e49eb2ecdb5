use crate::{
    db::{
        context::QueryContext,
        executor::cursor::{Cursor, CursorBox, CursorLifecycle, CursorState, close_quietly},
        row::Row,
        schema::RowTypeRef,
    },
    error::InternalError,
};
use crossbeam_channel::{self as xchan, RecvTimeoutError};
use std::{collections::VecDeque, fmt, sync::Arc};
use tracing::{debug, trace};

///
/// Fetcher
///
/// The storage work done for one input row. Returns every output row
/// that input produces, the input itself included when it is kept.
///

pub(super) trait Fetcher: Send + Sync + fmt::Debug {
    fn fetch(&self, context: &Arc<QueryContext>, row: &Row) -> Result<Vec<Row>, InternalError>;
}

type FetchResult = Result<Vec<Row>, InternalError>;

enum Pending {
    Ready(Vec<Row>),
    InFlight(xchan::Receiver<FetchResult>),
}

///
/// LookupCursor
///
/// Drives the input and runs one fetch per input row of the lookup's
/// input type. With a lookahead quantum of N > 0, up to N fetches run on
/// the rayon pool ahead of the consumer; their results are drained in
/// input order. Dropping the queue abandons in-flight work.
///

pub(super) struct LookupCursor {
    name: &'static str,
    context: Arc<QueryContext>,
    input: CursorBox,
    input_type: RowTypeRef,
    fetcher: Arc<dyn Fetcher>,
    keep_input: bool,
    quantum: usize,
    lifecycle: CursorLifecycle,
    pending: VecDeque<Pending>,
    output: VecDeque<Row>,
    input_exhausted: bool,
}

impl LookupCursor {
    pub(super) fn new(
        name: &'static str,
        context: Arc<QueryContext>,
        input: CursorBox,
        input_type: RowTypeRef,
        fetcher: Arc<dyn Fetcher>,
        keep_input: bool,
        quantum: usize,
    ) -> Self {
        Self {
            name,
            context,
            input,
            input_type,
            fetcher,
            keep_input,
            quantum,
            lifecycle: CursorLifecycle::new(name),
            pending: VecDeque::new(),
            output: VecDeque::new(),
            input_exhausted: false,
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.output.clear();
        self.input_exhausted = false;
    }

    /// Release buffers and the input after a failure.
    fn abort(&mut self) {
        self.pending.clear();
        self.output.clear();
        close_quietly(&mut self.input);
        self.lifecycle.set_idle();
    }

    /// Produce the next batch of output rows. `false` once input and
    /// queue are both exhausted.
    fn advance(&mut self) -> Result<bool, InternalError> {
        if self.quantum == 0 {
            let Some(row) = self.input.next()? else {
                return Ok(false);
            };
            let rows = self.resolve(row)?;
            self.output.extend(rows);
            return Ok(true);
        }

        while self.pending.len() < self.quantum && !self.input_exhausted {
            match self.input.next()? {
                Some(row) => {
                    let pending = self.dispatch(row);
                    self.pending.push_back(pending);
                }
                None => self.input_exhausted = true,
            }
        }

        match self.pending.pop_front() {
            None => Ok(false),
            Some(Pending::Ready(rows)) => {
                self.output.extend(rows);
                Ok(true)
            }
            Some(Pending::InFlight(receiver)) => {
                let rows = self.wait(&receiver)?;
                self.output.extend(rows);
                Ok(true)
            }
        }
    }

    fn resolve(&self, row: Row) -> FetchResult {
        if row.is_type(&self.input_type) {
            self.fetcher.fetch(&self.context, &row)
        } else if self.keep_input {
            Ok(vec![row])
        } else {
            Ok(Vec::new())
        }
    }

    fn dispatch(&self, row: Row) -> Pending {
        if !row.is_type(&self.input_type) {
            return Pending::Ready(if self.keep_input { vec![row] } else { Vec::new() });
        }

        let (sender, receiver) = xchan::bounded(1);
        let context = self.context.clone();
        let fetcher = self.fetcher.clone();
        trace!(cursor = self.name, input = ?row, "lookahead fetch dispatched");

        rayon::spawn(move || {
            let result = context
                .check_cancelation()
                .and_then(|()| fetcher.fetch(&context, &row));
            // the consumer may have closed; nobody is waiting then
            let _ = sender.send(result);
        });

        Pending::InFlight(receiver)
    }

    /// Block on one fetch, re-polling cancellation between waits.
    fn wait(&self, receiver: &xchan::Receiver<FetchResult>) -> FetchResult {
        let wait = self.context.config().lookahead_wait();
        loop {
            match receiver.recv_timeout(wait) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => self.context.check_cancelation()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(InternalError::executor_internal(format!(
                        "{}: lookahead task ended without a result",
                        self.name
                    )));
                }
            }
        }
    }
}

impl Cursor for LookupCursor {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        self.input.open()?;
        self.reset();
        self.lifecycle.set_active();
        if self.input.is_idle() {
            self.lifecycle.set_idle();
        }
        debug!(cursor = self.name, quantum = self.quantum, "lookup open");

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }
        if let Err(err) = self.context.check_cancelation() {
            self.abort();
            return Err(err);
        }

        loop {
            if let Some(row) = self.output.pop_front() {
                return Ok(Some(row));
            }
            match self.advance() {
                Ok(true) => {}
                Ok(false) => {
                    self.lifecycle.set_idle();
                    return Ok(None);
                }
                Err(err) => {
                    self.abort();
                    return Err(err);
                }
            }
        }
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        if self.lifecycle.state().is_open() {
            self.pending.clear();
            self.output.clear();
            self.input.close()?;
            self.lifecycle.set_idle();
        }

        Ok(())
    }

    fn destroy(&mut self) {
        self.pending.clear();
        self.output.clear();
        self.input.destroy();
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}
