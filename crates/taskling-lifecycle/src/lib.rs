pub mod precedence;
pub mod restore;
pub mod transition;

pub use precedence::{compare_states, precedence};
pub use restore::{state_from_like, tree_is_terminal, validate_task_like};
pub use transition::{Target, Transition, permits};
