use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical category for a fault surfaced through task outcomes.
///
/// This is intentionally coarse-grained: it is used for transition policy
/// (for example whether a frozen task was touched) and for observability
/// dimensions in logs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// A timer fired before the awaited outcome arrived.
    Timeout,
    /// A mutating operation reached a task after `freeze`.
    Frozen,
    /// A mutating operation reached a task after `finalise`.
    Finalised,
    /// The task definition cannot support the requested operation.
    Definition,
    /// A state value could not be constructed or reconstructed.
    State,
    /// An error raised by user execute code or passed into `fail`/`reject`.
    User,
}

/// Structured payload for task failures.
///
/// This replaces raw string errors with a stable shape that is easy to:
/// - classify (`kind`) for policy decisions,
/// - render (`message`) for user-facing summaries,
/// - enrich (`detail`) with optional low-level diagnostics.
///
/// States never store a `TaskFault`; they keep its `Display` form only, so
/// that state values round-trip through serialization. The live fault stays
/// on the task for the current attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFault {
    /// Coarse failure category used by policy and observability.
    pub kind: FaultKind,
    /// Human-readable summary safe to display in normal logs.
    pub message: String,
    /// Optional diagnostic detail for debugging and deep triage.
    pub detail: Option<String>,
}

impl TaskFault {
    /// Creates a [`TaskFault`] with required fields only.
    ///
    /// Use [`Self::with_detail`] to attach optional diagnostic context.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Adds or replaces the optional diagnostic detail.
    ///
    /// If called multiple times, the last value wins.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// A timer fired before the awaited outcome arrived.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Timeout, message)
    }

    /// A mutating operation reached task `task` after `freeze`.
    pub fn frozen(task: &str) -> Self {
        Self::new(FaultKind::Frozen, format!("task '{task}' is frozen"))
    }

    /// A mutating operation reached task `task` after `finalise`.
    pub fn finalised(task: &str) -> Self {
        Self::new(FaultKind::Finalised, format!("task '{task}' is finalised"))
    }

    /// An error originating in user execute code.
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(FaultKind::User, message)
    }
}

impl fmt::Display for TaskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for TaskFault {}
