//! Reconstruction of state values and validation of snapshot trees.
//!
//! This is the canonical recovery path: a serialized task-like record is
//! validated structurally, then each node's state-like record is dispatched
//! by kind back to a canonical or user-named state value. Foreign names for
//! the non-terminal kinds are normalised to the canonical ones.

use std::collections::HashSet;

use taskling_types::{
    SnapshotError, StateError, StateKind, StateLike, TaskLike, TaskState, names,
};

/// Reconstruct the canonical state value for a state-like record.
///
/// Dispatch is by `kind`; the `name` selects the canonical value or names a
/// user variant of that kind. A blank name falls back to the canonical name
/// for the kind. FAILED records without an error are impossible combinations
/// and are rejected.
pub fn state_from_like(like: &StateLike) -> Result<TaskState, StateError> {
    let name = like.name.trim();
    match like.kind {
        StateKind::Unstarted => Ok(TaskState::UNSTARTED),
        StateKind::Started => Ok(TaskState::STARTED),
        StateKind::Completed => match name {
            "" | names::COMPLETED => Ok(TaskState::COMPLETED),
            names::SUCCEEDED => Ok(TaskState::SUCCEEDED),
            _ => TaskState::completed_as(like.name.clone()),
        },
        StateKind::TimedOut => match name {
            "" | names::TIMED_OUT => Ok(match &like.error {
                Some(error) => TaskState::timed_out(error),
                None => TaskState::TIMED_OUT,
            }),
            _ => TaskState::timed_out_as(like.name.clone(), like.error.clone()),
        },
        StateKind::Failed => {
            let error = like.error.as_ref().ok_or_else(|| StateError::MissingError {
                name: like.name.clone(),
                kind: StateKind::Failed,
            })?;
            match name {
                "" | names::FAILED => Ok(TaskState::failed(error)),
                _ => TaskState::failed_as(like.name.clone(), error),
            }
        }
        StateKind::Rejected => {
            let reason = like.reason.clone();
            let error = like.error.clone();
            match name {
                "" | names::REJECTED => Ok(TaskState::rejected(reason, error)),
                names::DISCARDED => Ok(TaskState::discarded(reason, error)),
                names::ABANDONED => Ok(TaskState::abandoned(reason, error)),
                _ => TaskState::rejected_as(like.name.clone(), reason, error),
            }
        }
    }
}

/// Validate the structural rules of a snapshot tree: non-blank names and
/// sibling uniqueness, recursively.
pub fn validate_task_like(root: &TaskLike) -> Result<(), SnapshotError> {
    if root.name.trim().is_empty() {
        return Err(SnapshotError::BlankName);
    }
    let mut seen = HashSet::new();
    for sub in &root.sub_tasks {
        if !seen.insert(sub.name.as_str()) {
            return Err(SnapshotError::DuplicateSubTask {
                parent: root.name.clone(),
                name: sub.name.clone(),
            });
        }
        validate_task_like(sub)?;
    }
    Ok(())
}

/// True when every node in the tree is in a terminal state.
///
/// Reconstruction marks the whole tree finalised exactly when this holds;
/// otherwise the tree stays mutable pending further attempts.
pub fn tree_is_terminal(root: &TaskLike) -> bool {
    root.state.kind.is_terminal() && root.sub_tasks.iter().all(tree_is_terminal)
}
