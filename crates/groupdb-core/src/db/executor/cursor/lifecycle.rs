use crate::error::InternalError;

///
/// CursorState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorState {
    NeverOpened,
    Active,
    Idle,
    Destroyed,
}

impl CursorState {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Active | Self::Idle)
    }
}

///
/// CursorLifecycle
///
/// State holder embedded in every cursor; validates each protocol call
/// before the cursor does any work.
///

#[derive(Debug)]
pub(crate) struct CursorLifecycle {
    name: &'static str,
    state: CursorState,
}

impl CursorLifecycle {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self {
            name,
            state: CursorState::NeverOpened,
        }
    }

    pub(crate) const fn state(&self) -> CursorState {
        self.state
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == CursorState::Active
    }

    pub(crate) fn check_openable(&self) -> Result<(), InternalError> {
        match self.state {
            CursorState::NeverOpened | CursorState::Idle => Ok(()),
            CursorState::Active => Err(InternalError::cursor_lifecycle(format!(
                "{}: open() on a cursor that is already active",
                self.name
            ))),
            CursorState::Destroyed => Err(self.destroyed("open")),
        }
    }

    /// `next`/`jump` precondition.
    pub(crate) fn check_open(&self, call: &str) -> Result<(), InternalError> {
        match self.state {
            CursorState::Active | CursorState::Idle => Ok(()),
            CursorState::NeverOpened => Err(InternalError::cursor_lifecycle(format!(
                "{}: {call}() before open()",
                self.name
            ))),
            CursorState::Destroyed => Err(self.destroyed(call)),
        }
    }

    pub(crate) fn check_not_destroyed(&self, call: &str) -> Result<(), InternalError> {
        if self.state == CursorState::Destroyed {
            return Err(self.destroyed(call));
        }

        Ok(())
    }

    fn destroyed(&self, call: &str) -> InternalError {
        InternalError::cursor_lifecycle(format!("{}: {call}() after destroy()", self.name))
    }

    pub(crate) const fn set_active(&mut self) {
        self.state = CursorState::Active;
    }

    /// Open cursors become idle; a never-opened cursor stays as it is.
    pub(crate) fn set_idle(&mut self) {
        if self.state.is_open() {
            self.state = CursorState::Idle;
        }
    }

    pub(crate) const fn set_destroyed(&mut self) {
        self.state = CursorState::Destroyed;
    }
}
