use std::borrow::Cow;
use std::fmt;

use crate::error::StateError;
use crate::kind::StateKind;
use crate::snapshot::StateLike;

/// Canonical state names. Reconstruction maps these back to the shared
/// canonical values; anything else is a user-named variant of its kind.
pub mod names {
    pub const UNSTARTED: &str = "Unstarted";
    pub const STARTED: &str = "Started";
    pub const COMPLETED: &str = "Completed";
    pub const SUCCEEDED: &str = "Succeeded";
    pub const TIMED_OUT: &str = "TimedOut";
    pub const FAILED: &str = "Failed";
    pub const REJECTED: &str = "Rejected";
    pub const DISCARDED: &str = "Discarded";
    pub const ABANDONED: &str = "Abandoned";
}

/// The immutable lifecycle state of a task.
///
/// A state is a value: once constructed it never changes, and tasks swap
/// whole states rather than editing one. Attached errors are stored in their
/// display form, never as a live error object, so that every state value
/// survives a serialization round trip unchanged.
///
/// The canonical states are associated constants handing out shared
/// `'static` names; user-named variants allocate their name once at
/// construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskState {
    name: Cow<'static, str>,
    kind: StateKind,
    error: Option<String>,
    reason: Option<String>,
}

impl TaskState {
    pub const UNSTARTED: TaskState = TaskState::canonical(names::UNSTARTED, StateKind::Unstarted);
    pub const STARTED: TaskState = TaskState::canonical(names::STARTED, StateKind::Started);
    pub const COMPLETED: TaskState = TaskState::canonical(names::COMPLETED, StateKind::Completed);
    pub const SUCCEEDED: TaskState = TaskState::canonical(names::SUCCEEDED, StateKind::Completed);
    pub const TIMED_OUT: TaskState = TaskState::canonical(names::TIMED_OUT, StateKind::TimedOut);
    pub const REJECTED: TaskState = TaskState::canonical(names::REJECTED, StateKind::Rejected);
    pub const DISCARDED: TaskState = TaskState::canonical(names::DISCARDED, StateKind::Rejected);
    pub const ABANDONED: TaskState = TaskState::canonical(names::ABANDONED, StateKind::Rejected);

    const fn canonical(name: &'static str, kind: StateKind) -> Self {
        Self {
            name: Cow::Borrowed(name),
            kind,
            error: None,
            reason: None,
        }
    }

    fn named(name: impl Into<String>) -> Result<Cow<'static, str>, StateError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StateError::BlankName);
        }
        Ok(Cow::Owned(name))
    }

    /// A completed-family state with a user name. Canonical names normalise
    /// to the shared values.
    pub fn completed_as(name: impl Into<String>) -> Result<Self, StateError> {
        let name = Self::named(name)?;
        Ok(match name.as_ref() {
            names::COMPLETED => Self::COMPLETED,
            names::SUCCEEDED => Self::SUCCEEDED,
            _ => Self {
                name,
                kind: StateKind::Completed,
                error: None,
                reason: None,
            },
        })
    }

    /// The canonical timed-out state carrying the cause in string form.
    pub fn timed_out(error: impl fmt::Display) -> Self {
        Self {
            name: Cow::Borrowed(names::TIMED_OUT),
            kind: StateKind::TimedOut,
            error: Some(error.to_string()),
            reason: None,
        }
    }

    /// A timed-out-family state with a user name and optional cause.
    pub fn timed_out_as(
        name: impl Into<String>,
        error: Option<String>,
    ) -> Result<Self, StateError> {
        Ok(Self {
            name: Self::named(name)?,
            kind: StateKind::TimedOut,
            error,
            reason: None,
        })
    }

    /// The canonical failed state. The error is required and stored in its
    /// display form.
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            name: Cow::Borrowed(names::FAILED),
            kind: StateKind::Failed,
            error: Some(error.to_string()),
            reason: None,
        }
    }

    /// A failed-family state with a user name. The error is required.
    pub fn failed_as(name: impl Into<String>, error: impl fmt::Display) -> Result<Self, StateError> {
        Ok(Self {
            name: Self::named(name)?,
            kind: StateKind::Failed,
            error: Some(error.to_string()),
            reason: None,
        })
    }

    /// The canonical rejected state. A rejected state keeps at most one of
    /// {reason, error}; when both are supplied the reason wins.
    pub fn rejected(reason: Option<String>, error: Option<String>) -> Self {
        Self::rejection(Cow::Borrowed(names::REJECTED), reason, error)
    }

    /// The canonical discarded state (rejected kind).
    pub fn discarded(reason: Option<String>, error: Option<String>) -> Self {
        Self::rejection(Cow::Borrowed(names::DISCARDED), reason, error)
    }

    /// The canonical abandoned state (rejected kind).
    pub fn abandoned(reason: Option<String>, error: Option<String>) -> Self {
        Self::rejection(Cow::Borrowed(names::ABANDONED), reason, error)
    }

    /// A rejected-family state with a user name.
    pub fn rejected_as(
        name: impl Into<String>,
        reason: Option<String>,
        error: Option<String>,
    ) -> Result<Self, StateError> {
        Ok(Self::rejection(Self::named(name)?, reason, error))
    }

    fn rejection(
        name: Cow<'static, str>,
        reason: Option<String>,
        error: Option<String>,
    ) -> Self {
        // At most one of {reason, error} is kept; the reason wins.
        let (reason, error) = match reason {
            Some(reason) => (Some(reason), None),
            None => (None, error),
        };
        Self {
            name,
            kind: StateKind::Rejected,
            error,
            reason,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    /// The attached error in string form, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_unstarted(&self) -> bool {
        self.kind == StateKind::Unstarted
    }

    pub fn is_started(&self) -> bool {
        self.kind == StateKind::Started
    }

    pub fn is_completed(&self) -> bool {
        self.kind == StateKind::Completed
    }

    pub fn is_timed_out(&self) -> bool {
        self.kind == StateKind::TimedOut
    }

    pub fn is_failed(&self) -> bool {
        self.kind == StateKind::Failed
    }

    pub fn is_rejected(&self) -> bool {
        self.kind == StateKind::Rejected
    }

    /// Whether this state ends a task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// The serialized record form of this state.
    pub fn to_state_like(&self) -> StateLike {
        StateLike {
            name: self.name.to_string(),
            kind: self.kind,
            error: self.error.clone(),
            reason: self.reason.clone(),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
