use serde::{Deserialize, Serialize};

use crate::kind::StateKind;

/// Serialized form of a task state.
///
/// `error` and `reason` are always strings when present; a live error never
/// crosses the serialization boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateLike {
    pub name: String,
    pub kind: StateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Serialized form of a task tree. Persistence-level struct.
///
/// Sub-tasks keep their creation order so that a reconstruction preserves
/// the original structure exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLike {
    pub name: String,
    pub state: StateLike,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_tasks: Vec<TaskLike>,
}
