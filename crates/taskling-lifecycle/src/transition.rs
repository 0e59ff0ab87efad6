//! The authoritative transition guard for task states.
//!
//! Rules, in transition strength order:
//! - Completed never replaces a terminal failure, timeout, or rejection
//!   (timed-out is replaceable only with an explicit override).
//! - Failed replaces anything except an earlier failure or a rejection;
//!   the earliest failure wins.
//! - TimedOut replaces non-terminal states only (completed is replaceable
//!   only with an explicit override); it never replaces Failed or Rejected.
//! - Rejected replaces everything except an earlier rejection.

use taskling_types::{StateKind, TaskState};

/// Outcome of a transition request against a task.
///
/// `Kept` is the allowed no-op: the prior state had equal-or-higher
/// standing and stands unchanged.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The requested state was applied.
    Applied,
    /// The prior state was kept; nothing changed.
    Kept,
}

impl Transition {
    pub fn applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A requested target family plus its override knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Completed { override_timed_out: bool },
    Failed,
    TimedOut { override_completed: bool },
    Rejected,
}

/// Whether a transition from `from` into the `target` family may be applied.
///
/// A denied transition is not an error; callers keep the prior state.
pub fn permits(from: &TaskState, target: Target) -> bool {
    match target {
        Target::Completed { override_timed_out } => match from.kind() {
            StateKind::Unstarted | StateKind::Started | StateKind::Completed => true,
            StateKind::TimedOut => override_timed_out,
            StateKind::Failed | StateKind::Rejected => false,
        },
        Target::Failed => !matches!(from.kind(), StateKind::Failed | StateKind::Rejected),
        Target::TimedOut { override_completed } => match from.kind() {
            StateKind::Unstarted | StateKind::Started | StateKind::TimedOut => true,
            StateKind::Completed => override_completed,
            StateKind::Failed | StateKind::Rejected => false,
        },
        Target::Rejected => from.kind() != StateKind::Rejected,
    }
}
