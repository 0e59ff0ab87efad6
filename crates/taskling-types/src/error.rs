use crate::fault::{FaultKind, TaskFault};
use crate::kind::StateKind;

/// Errors from constructing or reconstructing state values.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("state name must not be blank")]
    BlankName,
    #[error("{kind} state '{name}' requires an error")]
    MissingError { name: String, kind: StateKind },
}

/// Errors from building task definitions.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("task definition name must not be blank")]
    BlankName,
    #[error("'{parent}' already has a sub-task definition named '{name}'")]
    DuplicateSubDef { parent: String, name: String },
    #[error("task definition '{name}' is frozen")]
    FrozenDefinition { name: String },
    #[error("task definition '{name}' has no execute function")]
    MissingExecuteFn { name: String },
}

/// Errors from rebuilding a task tree out of a serialized snapshot.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("task-like record has a blank name")]
    BlankName,
    #[error("'{parent}' has duplicate sub-task name '{name}'")]
    DuplicateSubTask { parent: String, name: String },
    #[error(transparent)]
    State(#[from] StateError),
}

impl From<StateError> for TaskFault {
    fn from(error: StateError) -> Self {
        TaskFault::new(FaultKind::State, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_error_mentions_kind_and_name() {
        let error = StateError::MissingError {
            name: "Failed".to_string(),
            kind: StateKind::Failed,
        };
        assert_eq!(error.to_string(), "FAILED state 'Failed' requires an error");
    }

    #[test]
    fn snapshot_error_wraps_state_error_transparently() {
        let error = SnapshotError::from(StateError::BlankName);
        assert_eq!(error.to_string(), "state name must not be blank");
    }

    #[test]
    fn state_error_converts_to_a_state_fault() {
        let fault = TaskFault::from(StateError::BlankName);
        assert_eq!(fault.kind, FaultKind::State);
        assert_eq!(fault.message, "state name must not be blank");
    }
}
