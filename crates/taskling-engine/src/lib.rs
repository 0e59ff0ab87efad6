pub mod def;
pub mod execute;
pub mod factory;
pub mod task;

pub use def::{TaskDef, define_task};
pub use execute::{ExecuteItem, ExecuteReturn, SyncReturn, TaskFuture};
pub use factory::{FactoryOptions, TaskFactory};
pub use task::{CompleteOpts, Task, TaskId, TimeoutOpts};
