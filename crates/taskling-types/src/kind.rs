use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator over the families of task states.
///
/// The wire form is SCREAMING_SNAKE_CASE (`TIMED_OUT` etc.) to match the
/// serialized state-like records. Sub-typing between user-named states and
/// their family is expressed as kind equality, never as a separate type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateKind {
    Unstarted,
    Started,
    Completed,
    TimedOut,
    Failed,
    Rejected,
}

impl StateKind {
    /// Returns the wire form of the kind for error messages and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unstarted => "UNSTARTED",
            Self::Started => "STARTED",
            Self::Completed => "COMPLETED",
            Self::TimedOut => "TIMED_OUT",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether this kind ends a task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unstarted | Self::Started)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_form_is_screaming_snake_case() {
        assert_eq!(json!(StateKind::Unstarted), json!("UNSTARTED"));
        assert_eq!(json!(StateKind::TimedOut), json!("TIMED_OUT"));
        assert_eq!(json!(StateKind::Rejected), json!("REJECTED"));
    }

    #[test]
    fn wire_form_round_trips() {
        for kind in [
            StateKind::Unstarted,
            StateKind::Started,
            StateKind::Completed,
            StateKind::TimedOut,
            StateKind::Failed,
            StateKind::Rejected,
        ] {
            let encoded = serde_json::to_string(&kind).unwrap();
            let decoded: StateKind = serde_json::from_str(&encoded).unwrap();
            assert_eq!(decoded, kind);
            assert_eq!(encoded, format!("\"{}\"", kind.name()));
        }
    }

    #[test]
    fn only_unstarted_and_started_are_non_terminal() {
        assert!(!StateKind::Unstarted.is_terminal());
        assert!(!StateKind::Started.is_terminal());
        assert!(StateKind::Completed.is_terminal());
        assert!(StateKind::TimedOut.is_terminal());
        assert!(StateKind::Failed.is_terminal());
        assert!(StateKind::Rejected.is_terminal());
    }
}
