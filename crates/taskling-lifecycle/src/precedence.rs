use std::cmp::Ordering;

use taskling_types::{StateKind, TaskState};

/// Rank of a state kind on the precedence ladder:
///
/// ```text
/// Unstarted < Started < Completed < TimedOut < Failed < Rejected
/// ```
///
/// The terminal ordering reflects transition strength: a rejection beats a
/// failure beats a timeout beats a completion.
pub fn precedence(kind: StateKind) -> u8 {
    match kind {
        StateKind::Unstarted => 0,
        StateKind::Started => 1,
        StateKind::Completed => 2,
        StateKind::TimedOut => 3,
        StateKind::Failed => 4,
        StateKind::Rejected => 5,
    }
}

/// Total order over states by precedence.
///
/// States of the same kind compare equal regardless of their names; the
/// name is a label, not a ranking.
pub fn compare_states(a: &TaskState, b: &TaskState) -> Ordering {
    precedence(a.kind()).cmp(&precedence(b.kind()))
}
