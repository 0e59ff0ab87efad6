//! Task construction and reconstruction.
//!
//! The factory owns the wrapping policy: whether execute captures failures
//! or propagates them, how invocation arguments are described in logs, and
//! how long the done future waits for sub-tasks to settle.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use taskling_lifecycle::{tree_is_terminal, validate_task_like};
use taskling_types::{DefinitionError, SnapshotError, TaskLike};
use tracing::debug;

use crate::def::TaskDef;
use crate::task::Task;

/// Describe-item hook: renders execute arguments for the log line.
pub type DescribeFn = Arc<dyn Fn(&[Value]) -> String + Send + Sync>;

/// Wrapping policy for the tasks a factory produces.
pub struct FactoryOptions {
    return_success_or_failure: bool,
    describe_item: Option<DescribeFn>,
    done_flatten_timeout: Option<Duration>,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            return_success_or_failure: true,
            describe_item: None,
            done_flatten_timeout: None,
        }
    }
}

impl FactoryOptions {
    /// The documented normal mode: execute always hands back an outcome,
    /// capturing frozen faults and sync throws as failures. Set to `false`
    /// for the legacy mode in which execute propagates them as errors.
    pub fn return_success_or_failure(mut self, capture: bool) -> Self {
        self.return_success_or_failure = capture;
        self
    }

    /// Custom rendering of execute arguments for the log line.
    pub fn describe_item(
        mut self,
        describe: impl Fn(&[Value]) -> String + Send + Sync + 'static,
    ) -> Self {
        self.describe_item = Some(Arc::new(describe));
        self
    }

    /// Bound on how long a done future waits for sub-tasks to settle;
    /// sub-tasks still running when it elapses are timed out.
    pub fn done_flatten_timeout(mut self, limit: Duration) -> Self {
        self.done_flatten_timeout = Some(limit);
        self
    }
}

/// Configures and constructs tasks.
///
/// Cheap clone handle; every task produced keeps a reference back to its
/// factory, and the factory never mutates task internals after
/// construction.
#[derive(Clone)]
pub struct TaskFactory {
    options: Arc<FactoryOptions>,
}

impl Default for TaskFactory {
    fn default() -> Self {
        Self::new(FactoryOptions::default())
    }
}

impl TaskFactory {
    pub fn new(options: FactoryOptions) -> Self {
        Self {
            options: Arc::new(options),
        }
    }

    pub(crate) fn return_success_or_failure(&self) -> bool {
        self.options.return_success_or_failure
    }

    pub(crate) fn done_flatten_timeout(&self) -> Option<Duration> {
        self.options.done_flatten_timeout
    }

    pub(crate) fn describe(&self, args: &[Value]) -> String {
        match &self.options.describe_item {
            Some(describe) => describe(args),
            None => default_describe(args),
        }
    }

    /// Build a fresh Unstarted task tree mirroring the definition.
    ///
    /// The definition is frozen on first use; the root must carry an
    /// execute function.
    pub fn create_task(&self, def: &TaskDef) -> Result<Task, DefinitionError> {
        if def.node().execute.is_none() {
            return Err(DefinitionError::MissingExecuteFn {
                name: def.name().to_string(),
            });
        }
        def.freeze();
        let task = Task::from_def(def, self.clone(), Weak::new());
        debug!(task = %task.name(), id = %task.id(), "created task");
        Ok(task)
    }

    /// Rebuild a task tree from a serialized snapshot.
    ///
    /// States are reconstructed through their record form, attempts and
    /// structure are preserved exactly, and execute functions are bound
    /// only where a matching definition node is supplied. The whole tree is
    /// marked finalised (and frozen) exactly when every node is terminal;
    /// otherwise it stays mutable pending further attempts.
    pub fn reconstruct_tasks_from_root_task_like(
        &self,
        like: &TaskLike,
        def: Option<&TaskDef>,
    ) -> Result<Task, SnapshotError> {
        validate_task_like(like)?;
        let def = def.filter(|d| d.name() == like.name);
        if let Some(def) = def {
            def.freeze();
        }
        let finalised = tree_is_terminal(like);
        let task = Task::from_like(like, self.clone(), def, Weak::new(), finalised)?;
        debug!(task = %task.name(), finalised, "reconstructed task");
        Ok(task)
    }
}

/// Default item description: compact JSON of the arguments, truncated.
fn default_describe(args: &[Value]) -> String {
    let mut rendered =
        serde_json::to_string(args).unwrap_or_else(|_| format!("<{} args>", args.len()));
    if rendered.chars().count() > 120 {
        rendered = rendered.chars().take(119).collect();
        rendered.push('\u{2026}');
    }
    rendered
}
