pub mod error;
pub mod fault;
pub mod kind;
pub mod outcome;
pub mod snapshot;
pub mod state;

pub use error::{DefinitionError, SnapshotError, StateError};
pub use fault::{FaultKind, TaskFault};
pub use kind::StateKind;
pub use outcome::Outcome;
pub use snapshot::{StateLike, TaskLike};
pub use state::{TaskState, names};
