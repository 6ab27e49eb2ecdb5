use super::*;
use crate::{error::ErrorClass, test_support::Fixture, value::Value};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

///
/// Scripted
///
/// Emits `rows` integers, optionally failing to open, at a given row or
/// on close, and counts how often it is closed.
///

struct Scripted {
    fixture_rows: Vec<Row>,
    position: usize,
    fail_open: bool,
    fail_at: Option<usize>,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
    lifecycle: CursorLifecycle,
}

impl Scripted {
    fn new(rows: i64) -> Self {
        let fixture = Fixture::empty();
        let row_type = fixture.schema.values_type("scripted", 1);
        let fixture_rows = (0..rows)
            .map(|n| Row::new(row_type.clone(), vec![Value::Int(n)], None))
            .collect();

        Self {
            fixture_rows,
            position: 0,
            fail_open: false,
            fail_at: None,
            fail_close: false,
            closes: Arc::new(AtomicUsize::new(0)),
            lifecycle: CursorLifecycle::new("Scripted"),
        }
    }

    fn closes(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

impl Cursor for Scripted {
    fn open(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_openable()?;
        if self.fail_open {
            return Err(InternalError::executor_internal("scripted open failure"));
        }
        self.position = 0;
        self.lifecycle.set_active();

        Ok(())
    }

    fn next(&mut self) -> Result<Option<Row>, InternalError> {
        self.lifecycle.check_open("next")?;
        if !self.lifecycle.is_active() {
            return Ok(None);
        }
        if self.fail_at == Some(self.position) {
            return Err(InternalError::executor_internal("scripted next failure"));
        }
        let row = self.fixture_rows.get(self.position).cloned();
        self.position += 1;
        if row.is_none() {
            self.lifecycle.set_idle();
        }

        Ok(row)
    }

    fn close(&mut self) -> Result<(), InternalError> {
        self.lifecycle.check_not_destroyed("close")?;
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.lifecycle.set_idle();
        if self.fail_close {
            return Err(InternalError::executor_internal("scripted close failure"));
        }

        Ok(())
    }

    fn destroy(&mut self) {
        self.lifecycle.set_destroyed();
    }

    fn state(&self) -> CursorState {
        self.lifecycle.state()
    }
}

#[test]
fn lifecycle_moves_through_every_state() {
    let mut cursor = Scripted::new(1);
    assert_eq!(cursor.state(), CursorState::NeverOpened);

    cursor.open().expect("open should succeed");
    assert!(cursor.is_active());

    cursor.next().expect("next should succeed").expect("one row");
    assert!(cursor.next().expect("end should succeed").is_none());
    assert!(cursor.is_idle());
    assert!(cursor.next().expect("idle next should succeed").is_none());

    cursor.open().expect("idle cursors can reopen");
    assert!(cursor.is_active());

    cursor.destroy();
    assert!(cursor.is_destroyed());
}

#[test]
fn calls_outside_the_protocol_are_lifecycle_errors() {
    let mut cursor = Scripted::new(1);
    let err = cursor.next().expect_err("next before open");
    assert!(err.is_lifecycle());

    cursor.open().expect("open should succeed");
    let err = cursor.open().expect_err("open while active");
    assert_eq!(err.class, ErrorClass::CursorLifecycle);

    cursor.destroy();
    for err in [
        cursor.open().expect_err("open after destroy"),
        cursor.next().expect_err("next after destroy"),
        cursor.close().expect_err("close after destroy"),
    ] {
        assert!(err.is_lifecycle());
        assert!(err.message.contains("after destroy()"));
    }
}

#[test]
fn set_idle_leaves_a_never_opened_cursor_alone() {
    let mut lifecycle = CursorLifecycle::new("Bare");
    lifecycle.set_idle();

    assert_eq!(lifecycle.state(), CursorState::NeverOpened);
}

#[test]
fn jump_is_unsupported_by_default() {
    let mut cursor = Scripted::new(2);
    cursor.open().expect("open should succeed");
    let row = cursor.next().expect("next should succeed").expect("a row");

    assert!(!cursor.supports_jump());
    let err = cursor
        .jump(&row, ColumnSelector::leading(1))
        .expect_err("default jump should fail");
    assert_eq!(err.class, ErrorClass::Unsupported);
}

#[test]
fn collect_rows_drains_and_closes() {
    let mut cursor = Scripted::new(3);
    let closes = cursor.closes();

    let rows = collect_rows(&mut cursor).expect("collect should succeed");

    assert_eq!(rows.len(), 3);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(cursor.is_idle());
}

#[test]
fn collect_rows_closes_after_a_failing_next() {
    let mut cursor = Scripted::new(3);
    cursor.fail_at = Some(1);
    let closes = cursor.closes();

    let err = collect_rows(&mut cursor).expect_err("second row should fail");

    assert_eq!(err.class, ErrorClass::Internal);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn collect_rows_keeps_the_next_error_when_close_also_fails() {
    let mut cursor = Scripted::new(3);
    cursor.fail_at = Some(0);
    cursor.fail_close = true;
    let closes = cursor.closes();

    let err = collect_rows(&mut cursor).expect_err("first row should fail");

    assert!(err.message.contains("scripted next failure"));
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(cursor.is_idle());
}
