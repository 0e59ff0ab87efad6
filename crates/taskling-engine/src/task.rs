//! Runtime tasks: lifecycle state, attempts, outcomes, and composition.
//!
//! A task is a runtime instance of a definition. Every mutating operation is
//! serialized on the task's own lock so that the transition tie-breaks stay
//! deterministic on parallel runtimes. The done future settles once the
//! awaitables armed by the most recent execute and every sub-task have
//! settled; only then does the auto-outcome policy run.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use taskling_lifecycle::{Target, Transition, permits, state_from_like};
use taskling_types::{
    FaultKind, Outcome, SnapshotError, TaskFault, TaskLike, TaskState, names,
};
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::def::{DefNode, TaskDef};
use crate::execute::{ExecuteFn, PendingWork, SyncReturn, normalise, settle};
use crate::factory::TaskFactory;

/// Unique identifier for a runtime task instance.
///
/// Used for log correlation only; identity on the wire is the task's name
/// and position in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Override knobs for completed-family transitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompleteOpts {
    /// Allow the completion to replace a timed-out state.
    pub override_timed_out: bool,
}

/// Override knobs for timed-out transitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeoutOpts {
    /// Allow the timeout to replace a completed state.
    pub override_completed: bool,
    /// Walk the sub-task tree bottom-up, timing out non-terminal
    /// descendants first. The parent inherits the first timed-out leaf's
    /// error when it has no cause of its own.
    pub recurse: bool,
}

struct TaskCell {
    state: TaskState,
    attempts: u32,
    began: Option<DateTime<Utc>>,
    ended: Option<DateTime<Utc>>,
    result: Option<Value>,
    error: Option<TaskFault>,
    outcome: Option<Outcome<SyncReturn>>,
    frozen: bool,
    finalised: bool,
}

impl TaskCell {
    fn unstarted() -> Self {
        Self {
            state: TaskState::UNSTARTED,
            attempts: 0,
            began: None,
            ended: None,
            result: None,
            error: None,
            outcome: None,
            frozen: false,
            finalised: false,
        }
    }
}

enum DoneState {
    /// Nothing executed yet.
    Idle,
    /// An execute armed work that no done call has claimed.
    Armed(PendingWork),
    /// A spawned driver owns the work.
    Driving,
    /// Resolutions of the most recent settled attempt.
    Settled(Vec<Outcome<Value>>),
}

struct DoneCell {
    /// Bumped by every execute; a driver only stores results for its own
    /// epoch so a re-execute mid-drive is never clobbered.
    epoch: u64,
    state: DoneState,
}

pub(crate) struct TaskCore {
    id: TaskId,
    name: String,
    def: Option<Arc<DefNode>>,
    factory: TaskFactory,
    execute_fn: Option<ExecuteFn>,
    parent: Weak<TaskCore>,
    children: OnceLock<Vec<Task>>,
    cell: Mutex<TaskCell>,
    done: Mutex<DoneCell>,
    settled: Notify,
}

/// A runtime instance of a task definition.
///
/// Cheap clone handle; all handles share one task and its lock.
#[derive(Clone)]
pub struct Task {
    core: Arc<TaskCore>,
}

impl Task {
    pub(crate) fn from_def(def: &TaskDef, factory: TaskFactory, parent: Weak<TaskCore>) -> Task {
        let node = Arc::clone(def.node());
        let core = Arc::new(TaskCore {
            id: TaskId::new(),
            name: node.name.clone(),
            execute_fn: node.execute.clone(),
            def: Some(node),
            factory: factory.clone(),
            parent,
            children: OnceLock::new(),
            cell: Mutex::new(TaskCell::unstarted()),
            done: Mutex::new(DoneCell {
                epoch: 0,
                state: DoneState::Idle,
            }),
            settled: Notify::new(),
        });
        let children = def
            .sub_defs()
            .iter()
            .map(|sub| Task::from_def(sub, factory.clone(), Arc::downgrade(&core)))
            .collect();
        let _ = core.children.set(children);
        Task { core }
    }

    pub(crate) fn from_like(
        like: &TaskLike,
        factory: TaskFactory,
        def: Option<&TaskDef>,
        parent: Weak<TaskCore>,
        finalised: bool,
    ) -> Result<Task, SnapshotError> {
        let state = state_from_like(&like.state)?;
        let node = def.map(|d| Arc::clone(d.node()));
        let core = Arc::new(TaskCore {
            id: TaskId::new(),
            name: like.name.clone(),
            execute_fn: node.as_ref().and_then(|n| n.execute.clone()),
            def: node,
            factory: factory.clone(),
            parent,
            children: OnceLock::new(),
            cell: Mutex::new(TaskCell {
                state,
                attempts: like.attempts,
                frozen: finalised,
                finalised,
                ..TaskCell::unstarted()
            }),
            done: Mutex::new(DoneCell {
                epoch: 0,
                state: DoneState::Idle,
            }),
            settled: Notify::new(),
        });
        let children = like
            .sub_tasks
            .iter()
            .map(|sub| {
                let sub_def = def.and_then(|d| d.sub_def(&sub.name));
                Task::from_like(
                    sub,
                    factory.clone(),
                    sub_def.as_ref(),
                    Arc::downgrade(&core),
                    finalised,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let _ = core.children.set(children);
        Ok(Task { core })
    }

    pub fn id(&self) -> TaskId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The definition this task was created from. Reconstructed tasks
    /// without a matching definition have none.
    pub fn definition(&self) -> Option<TaskDef> {
        self.core.def.as_ref().map(|node| TaskDef::from_node(Arc::clone(node)))
    }

    /// The owning task, if this is a sub-task.
    pub fn parent(&self) -> Option<Task> {
        self.core.parent.upgrade().map(|core| Task { core })
    }

    /// Direct sub-tasks in definition order.
    pub fn sub_tasks(&self) -> Vec<Task> {
        self.core.children.get().cloned().unwrap_or_default()
    }

    /// Sub-task by name.
    pub fn sub_task(&self, name: &str) -> Option<Task> {
        self.core
            .children
            .get()
            .and_then(|children| children.iter().find(|task| task.name() == name))
            .cloned()
    }

    pub fn state(&self) -> TaskState {
        self.core.cell.lock().state.clone()
    }

    pub fn attempts(&self) -> u32 {
        self.core.cell.lock().attempts
    }

    pub fn began(&self) -> Option<DateTime<Utc>> {
        self.core.cell.lock().began
    }

    pub fn ended(&self) -> Option<DateTime<Utc>> {
        self.core.cell.lock().ended
    }

    /// The value recorded by the latest completion.
    pub fn result(&self) -> Option<Value> {
        self.core.cell.lock().result.clone()
    }

    /// The live fault recorded by the latest failure, timeout, or rejection
    /// of the current attempt. Never survives serialization; the state
    /// keeps the string form.
    pub fn error(&self) -> Option<TaskFault> {
        self.core.cell.lock().error.clone()
    }

    /// The synchronous outcome of the most recent execute.
    pub fn outcome(&self) -> Option<Outcome<SyncReturn>> {
        self.core.cell.lock().outcome.clone()
    }

    pub fn frozen(&self) -> bool {
        self.core.cell.lock().frozen
    }

    pub fn finalised(&self) -> bool {
        self.core.cell.lock().finalised
    }

    pub fn unstarted(&self) -> bool {
        self.state().is_unstarted()
    }

    pub fn started(&self) -> bool {
        self.state().is_started()
    }

    pub fn completed(&self) -> bool {
        self.state().is_completed()
    }

    pub fn failed(&self) -> bool {
        self.state().is_failed()
    }

    pub fn timed_out(&self) -> bool {
        self.state().is_timed_out()
    }

    pub fn rejected(&self) -> bool {
        self.state().is_rejected()
    }

    /// The serialized record form of this task tree.
    pub fn to_task_like(&self) -> TaskLike {
        let (state, attempts) = {
            let cell = self.core.cell.lock();
            (cell.state.to_state_like(), cell.attempts)
        };
        TaskLike {
            name: self.core.name.clone(),
            state,
            attempts,
            sub_tasks: self
                .sub_tasks()
                .iter()
                .map(|task| task.to_task_like())
                .collect(),
        }
    }

    /// Single invocation of the wrapped execute.
    ///
    /// Synchronously: rejects when frozen (no attempt recorded), records an
    /// attempt, transitions Unstarted to Started stamping `began`, invokes
    /// the user function with this task's handle, captures a sync throw,
    /// normalises the return into ordered awaitables, records the outcome,
    /// and arms the done future.
    ///
    /// With the factory's `return_success_or_failure` left at its default,
    /// the `Err` arm is never produced: failures come back as
    /// `Ok(Outcome::Failure)`. The legacy mode propagates the frozen fault
    /// and sync throws as `Err` instead.
    pub fn execute(&self, args: Vec<Value>) -> Result<Outcome<SyncReturn>, TaskFault> {
        let capture = self.core.factory.return_success_or_failure();

        {
            let cell = self.core.cell.lock();
            if cell.frozen || cell.finalised {
                let fault = if cell.finalised {
                    TaskFault::finalised(&self.core.name)
                } else {
                    TaskFault::frozen(&self.core.name)
                };
                debug!(task = %self.core.name, %fault, "execute refused");
                return if capture {
                    Ok(Outcome::Failure(fault))
                } else {
                    Err(fault)
                };
            }
        }

        let Some(execute_fn) = self.core.execute_fn.clone() else {
            let fault = TaskFault::new(
                FaultKind::Definition,
                format!("task '{}' has no execute function", self.core.name),
            );
            return if capture {
                Ok(Outcome::Failure(fault))
            } else {
                Err(fault)
            };
        };

        let attempt = {
            let mut cell = self.core.cell.lock();
            cell.attempts += 1;
            if cell.state.is_unstarted() {
                cell.state = TaskState::STARTED;
                cell.began = Some(Utc::now());
            }
            cell.attempts
        };
        debug!(
            task = %self.core.name,
            id = %self.core.id,
            attempt,
            item = %self.core.factory.describe(&args),
            "executing task"
        );

        let outcome = match execute_fn(self.clone(), args) {
            Err(fault) => {
                // Sync throw: the attempt fails now and the done future
                // settles with this single failure.
                self.arm(PendingWork::failed(fault.clone()));
                let _ = self.fail(fault.clone());
                Outcome::Failure(fault)
            }
            Ok(ret) => {
                let (shape, work) = normalise(ret);
                self.arm(work);
                Outcome::Success(shape)
            }
        };

        debug!(task = %self.core.name, outcome = %outcome.describe(), "execute returned");
        self.core.cell.lock().outcome = Some(outcome.clone());

        match (&outcome, capture) {
            (Outcome::Failure(fault), false) => Err(fault.clone()),
            _ => Ok(outcome),
        }
    }

    fn arm(&self, work: PendingWork) {
        let mut done = self.core.done.lock();
        done.epoch = done.epoch.wrapping_add(1);
        done.state = DoneState::Armed(work);
    }

    /// The done future: resolves with the input-ordered resolutions of the
    /// most recent execute once those awaitables and every sub-task have
    /// settled, after applying the auto-outcome policy.
    ///
    /// Repeated and concurrent calls observe the same settled list. A task
    /// that never executed resolves with an empty list once its sub-tasks
    /// settle.
    pub fn done(&self) -> std::pin::Pin<Box<dyn Future<Output = Vec<Outcome<Value>>> + Send + '_>> {
        Box::pin(async move {
            loop {
                let mut notified = std::pin::pin!(self.core.settled.notified());
                notified.as_mut().enable();
                {
                    let mut done = self.core.done.lock();
                    if let DoneState::Settled(resolutions) = &done.state {
                        return resolutions.clone();
                    }
                    if !matches!(done.state, DoneState::Driving) {
                        let work = match std::mem::replace(&mut done.state, DoneState::Driving) {
                            DoneState::Armed(work) => Some(work),
                            _ => None,
                        };
                        let epoch = done.epoch;
                        let driver = self.clone();
                        tokio::spawn(async move { driver.drive(work, epoch).await });
                    }
                }
                notified.await;
            }
        })
    }

    async fn drive(self, work: Option<PendingWork>, epoch: u64) {
        let (resolutions, list) = match work {
            Some(work) => {
                let list = work.list;
                (settle(work.items).await, list)
            }
            None => (Vec::new(), false),
        };

        self.await_sub_tasks().await;

        let fresh = self.core.done.lock().epoch == epoch;
        if fresh {
            self.apply_auto_outcome(&resolutions, list);
        }

        {
            let mut done = self.core.done.lock();
            if done.epoch == epoch && matches!(done.state, DoneState::Driving) {
                done.state = DoneState::Settled(resolutions);
            }
        }
        self.core.settled.notify_waiters();
    }

    async fn await_sub_tasks(&self) {
        let sub_tasks = self.sub_tasks();
        if sub_tasks.is_empty() {
            return;
        }
        let all = join_all(sub_tasks.iter().map(|task| task.done()));
        match self.core.factory.done_flatten_timeout() {
            None => {
                all.await;
            }
            Some(limit) => {
                if tokio::time::timeout(limit, all).await.is_err() {
                    warn!(task = %self.core.name, ?limit, "sub-tasks did not settle in time");
                    for sub in &sub_tasks {
                        if !sub.state().is_terminal() {
                            let fault = TaskFault::timeout(format!(
                                "sub-task '{}' did not settle within {:?}",
                                sub.name(),
                                limit
                            ));
                            let _ = sub.timeout_as(
                                names::TIMED_OUT,
                                Some(fault),
                                TimeoutOpts {
                                    override_completed: false,
                                    recurse: true,
                                },
                            );
                        }
                    }
                }
            }
        }
    }

    /// After all resolutions and sub-tasks settle: any failure fails the
    /// task under the usual transition rules; an all-success attempt
    /// completes it only when no internal state management happened (the
    /// task is still Started). Suppressed entirely once frozen.
    fn apply_auto_outcome(&self, resolutions: &[Outcome<Value>], list: bool) {
        if resolutions.is_empty() {
            return;
        }
        {
            let cell = self.core.cell.lock();
            if cell.frozen || cell.finalised {
                return;
            }
        }
        if let Some(fault) = resolutions.iter().find_map(|r| r.failure().cloned()) {
            let _ = self.fail(fault);
            return;
        }
        if !self.started() {
            return;
        }
        let values: Vec<Value> = resolutions
            .iter()
            .filter_map(|r| r.success().cloned())
            .collect();
        let value = if list {
            Value::Array(values)
        } else {
            values.into_iter().next().unwrap_or(Value::Null)
        };
        let _ = self.complete(value);
    }

    fn guard_mutable(&self, cell: &TaskCell) -> Result<(), TaskFault> {
        if cell.finalised {
            return Err(TaskFault::finalised(&self.core.name));
        }
        if cell.frozen {
            return Err(TaskFault::frozen(&self.core.name));
        }
        Ok(())
    }

    /// Transition to the canonical Completed state, recording the result.
    pub fn complete(&self, value: Value) -> Result<Transition, TaskFault> {
        self.apply_completion(TaskState::COMPLETED, value, CompleteOpts::default())
    }

    /// Transition to the canonical Succeeded state, recording the result.
    pub fn succeed(&self, value: Value) -> Result<Transition, TaskFault> {
        self.apply_completion(TaskState::SUCCEEDED, value, CompleteOpts::default())
    }

    /// Transition to a completed-family state with the given name.
    pub fn complete_as(
        &self,
        name: &str,
        value: Value,
        opts: CompleteOpts,
    ) -> Result<Transition, TaskFault> {
        let state = TaskState::completed_as(name).map_err(TaskFault::from)?;
        self.apply_completion(state, value, opts)
    }

    fn apply_completion(
        &self,
        state: TaskState,
        value: Value,
        opts: CompleteOpts,
    ) -> Result<Transition, TaskFault> {
        let mut cell = self.core.cell.lock();
        self.guard_mutable(&cell)?;
        if !permits(
            &cell.state,
            Target::Completed {
                override_timed_out: opts.override_timed_out,
            },
        ) {
            return Ok(Transition::Kept);
        }
        debug!(task = %self.core.name, from = %cell.state, to = %state, "completing task");
        cell.state = state;
        cell.result = Some(value);
        cell.ended = Some(Utc::now());
        Ok(Transition::Applied)
    }

    /// Transition to the canonical Failed state. The earliest failure wins;
    /// rejections are never overridden.
    pub fn fail(&self, error: TaskFault) -> Result<Transition, TaskFault> {
        self.apply_failure(TaskState::failed(&error), error)
    }

    /// Transition to a failed-family state with the given name.
    pub fn fail_as(&self, name: &str, error: TaskFault) -> Result<Transition, TaskFault> {
        let state = if name == names::FAILED {
            TaskState::failed(&error)
        } else {
            TaskState::failed_as(name, &error).map_err(TaskFault::from)?
        };
        self.apply_failure(state, error)
    }

    fn apply_failure(&self, state: TaskState, error: TaskFault) -> Result<Transition, TaskFault> {
        let mut cell = self.core.cell.lock();
        self.guard_mutable(&cell)?;
        if !permits(&cell.state, Target::Failed) {
            return Ok(Transition::Kept);
        }
        warn!(task = %self.core.name, from = %cell.state, %error, "failing task");
        cell.state = state;
        cell.error = Some(error);
        cell.ended = Some(Utc::now());
        Ok(Transition::Applied)
    }

    /// Transition to the canonical TimedOut state.
    pub fn timeout(&self, error: Option<TaskFault>) -> Result<Transition, TaskFault> {
        self.timeout_as(names::TIMED_OUT, error, TimeoutOpts::default())
    }

    /// Transition to a timed-out-family state with the given name.
    ///
    /// With `recurse`, non-terminal sub-tasks are timed out first,
    /// bottom-up; a parent without a cause of its own then inherits the
    /// first timed-out leaf's error, so the leaf cause is preserved.
    pub fn timeout_as(
        &self,
        name: &str,
        error: Option<TaskFault>,
        opts: TimeoutOpts,
    ) -> Result<Transition, TaskFault> {
        if opts.recurse {
            for sub in self.sub_tasks() {
                if !sub.state().is_terminal() {
                    let _ = sub.timeout_as(name, error.clone(), opts);
                }
            }
        }
        let error = match error {
            Some(error) => Some(error),
            None => self.leaf_timeout_cause(),
        };
        let state = if name == names::TIMED_OUT {
            match &error {
                Some(fault) => TaskState::timed_out(fault),
                None => TaskState::TIMED_OUT,
            }
        } else {
            TaskState::timed_out_as(name, error.as_ref().map(|f| f.to_string()))
                .map_err(TaskFault::from)?
        };

        let mut cell = self.core.cell.lock();
        self.guard_mutable(&cell)?;
        if !permits(
            &cell.state,
            Target::TimedOut {
                override_completed: opts.override_completed,
            },
        ) {
            return Ok(Transition::Kept);
        }
        // Re-marking an existing timeout with no new cause keeps the first.
        if cell.state.is_timed_out() && error.is_none() {
            return Ok(Transition::Kept);
        }
        debug!(task = %self.core.name, from = %cell.state, to = %state, "timing out task");
        cell.state = state;
        if error.is_some() {
            cell.error = error;
        }
        cell.ended = Some(Utc::now());
        Ok(Transition::Applied)
    }

    /// The deepest timed-out descendant's error, if any. Leaf causes are
    /// preferred over intermediate ones.
    fn leaf_timeout_cause(&self) -> Option<TaskFault> {
        for sub in self.sub_tasks() {
            if let Some(fault) = sub.leaf_timeout_cause() {
                return Some(fault);
            }
            if sub.timed_out() {
                if let Some(fault) = sub.error() {
                    return Some(fault);
                }
            }
        }
        None
    }

    /// Transition to the canonical Rejected state. Rejections override
    /// every non-rejected state; the first rejection stands.
    pub fn reject(
        &self,
        reason: impl Into<String>,
        error: Option<TaskFault>,
    ) -> Result<Transition, TaskFault> {
        let state = TaskState::rejected(Some(reason.into()), error.as_ref().map(|f| f.to_string()));
        self.apply_rejection(state, error)
    }

    /// Transition to the canonical Discarded state (rejected kind).
    pub fn discard(
        &self,
        reason: impl Into<String>,
        error: Option<TaskFault>,
    ) -> Result<Transition, TaskFault> {
        let state = TaskState::discarded(Some(reason.into()), error.as_ref().map(|f| f.to_string()));
        self.apply_rejection(state, error)
    }

    /// Transition to the canonical Abandoned state (rejected kind).
    pub fn abandon(
        &self,
        reason: impl Into<String>,
        error: Option<TaskFault>,
    ) -> Result<Transition, TaskFault> {
        let state = TaskState::abandoned(Some(reason.into()), error.as_ref().map(|f| f.to_string()));
        self.apply_rejection(state, error)
    }

    /// Transition to a rejected-family state with the given name.
    pub fn reject_as(
        &self,
        name: &str,
        reason: impl Into<String>,
        error: Option<TaskFault>,
    ) -> Result<Transition, TaskFault> {
        let state = TaskState::rejected_as(
            name,
            Some(reason.into()),
            error.as_ref().map(|f| f.to_string()),
        )
        .map_err(TaskFault::from)?;
        self.apply_rejection(state, error)
    }

    fn apply_rejection(&self, state: TaskState, error: Option<TaskFault>) -> Result<Transition, TaskFault> {
        let mut cell = self.core.cell.lock();
        self.guard_mutable(&cell)?;
        if !permits(&cell.state, Target::Rejected) {
            return Ok(Transition::Kept);
        }
        debug!(task = %self.core.name, from = %cell.state, to = %state, "rejecting task");
        cell.state = state;
        if error.is_some() {
            cell.error = error;
        }
        cell.ended = Some(Utc::now());
        Ok(Transition::Applied)
    }

    /// One-way seal against further state mutation. Idempotent; the current
    /// state is preserved and sub-tasks are left alone.
    pub fn freeze(&self) {
        let mut cell = self.core.cell.lock();
        if !cell.frozen {
            debug!(task = %self.core.name, state = %cell.state, "freezing task");
            cell.frozen = true;
        }
    }

    /// Walks the sub-task tree bottom-up: every non-terminal task fails
    /// with a finalised fault, terminal tasks are left alone, then every
    /// node is frozen. Idempotent.
    pub fn finalise(&self) {
        for sub in self.sub_tasks() {
            sub.finalise();
        }
        let mut cell = self.core.cell.lock();
        if cell.finalised {
            return;
        }
        if !cell.state.is_terminal() && !cell.frozen {
            let fault = TaskFault::finalised(&self.core.name);
            warn!(task = %self.core.name, from = %cell.state, "finalising non-terminal task as failed");
            cell.state = TaskState::failed(&fault);
            cell.error = Some(fault);
            cell.ended = Some(Utc::now());
        }
        cell.finalised = true;
        cell.frozen = true;
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.core.cell.lock();
        f.debug_struct("Task")
            .field("name", &self.core.name)
            .field("state", &cell.state.name())
            .field("attempts", &cell.attempts)
            .field("frozen", &cell.frozen)
            .field("finalised", &cell.finalised)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::define_task;
    use crate::execute::{ExecuteItem, ExecuteReturn};
    use crate::factory::TaskFactory;
    use std::time::Duration;
    use taskling_types::StateKind;

    fn val(s: &str) -> Value {
        Value::String(s.to_string())
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn task_of<F>(name: &str, execute: F) -> Task
    where
        F: Fn(Task, Vec<Value>) -> Result<ExecuteReturn, TaskFault> + Send + Sync + 'static,
    {
        let def = define_task(name, execute).unwrap();
        TaskFactory::default().create_task(&def).unwrap()
    }

    #[test_log::test(tokio::test)]
    async fn a_single_resolving_future_completes_with_its_value() {
        let task = task_of("fetch", |_task, _args| {
            Ok(ExecuteReturn::future(async {
                sleep_ms(10).await;
                Ok(val("A"))
            }))
        });

        let outcome = task.execute(Vec::new()).unwrap();
        assert!(outcome.is_success());
        assert_eq!(task.attempts(), 1);
        assert!(task.started());
        assert!(task.began().is_some());

        let resolutions = task.done().await;
        assert_eq!(resolutions, vec![Outcome::Success(val("A"))]);
        assert!(task.completed());
        assert_eq!(task.state().name(), "Completed");
        assert_eq!(task.result(), Some(val("A")));
        assert!(task.ended().is_some());
    }

    #[test_log::test(tokio::test)]
    async fn a_chain_of_futures_resolves_to_the_final_value() {
        async fn append(base: String, suffix: &str) -> Result<String, TaskFault> {
            sleep_ms(2).await;
            Ok(format!("{base}{suffix}"))
        }

        let task = task_of("chain", |_task, _args| {
            Ok(ExecuteReturn::future(async {
                let a = append(String::new(), "A").await?;
                let ab = append(a, "B").await?;
                let abc = append(ab, "C").await?;
                Ok(Value::String(abc))
            }))
        });

        task.execute(Vec::new()).unwrap();
        let resolutions = task.done().await;
        assert_eq!(resolutions, vec![Outcome::Success(val("ABC"))]);
        assert_eq!(task.result(), Some(val("ABC")));
    }

    #[test_log::test(tokio::test)]
    async fn a_list_of_futures_completes_with_the_list() {
        let task = task_of("batch", |_task, _args| {
            Ok(ExecuteReturn::list(vec![
                ExecuteItem::future(async {
                    sleep_ms(10).await;
                    Ok(val("A"))
                }),
                ExecuteItem::future(async { Ok(val("B")) }),
                ExecuteItem::future(async {
                    sleep_ms(5).await;
                    Ok(val("C"))
                }),
            ]))
        });

        task.execute(Vec::new()).unwrap();
        let resolutions = task.done().await;
        assert_eq!(
            resolutions,
            vec![
                Outcome::Success(val("A")),
                Outcome::Success(val("B")),
                Outcome::Success(val("C")),
            ]
        );
        assert_eq!(
            task.result(),
            Some(Value::Array(vec![val("A"), val("B"), val("C")]))
        );
    }

    #[test_log::test(tokio::test)]
    async fn a_single_rejecting_future_fails_the_task() {
        let task = task_of("doomed", |_task, _args| {
            Ok(ExecuteReturn::future(async {
                sleep_ms(5).await;
                Err(TaskFault::user("Boom"))
            }))
        });

        task.execute(Vec::new()).unwrap();
        let resolutions = task.done().await;
        assert_eq!(resolutions, vec![Outcome::Failure(TaskFault::user("Boom"))]);

        let state = task.state();
        assert_eq!(state.kind(), StateKind::Failed);
        assert_eq!(state.name(), "Failed");
        assert_eq!(state.error(), Some("User: Boom"));
        assert_eq!(task.error(), Some(TaskFault::user("Boom")));
    }

    #[test_log::test(tokio::test)]
    async fn a_sync_throw_is_captured_and_fails_the_task() {
        let task = task_of("thrower", |_task, _args| Err(TaskFault::user("Boom")));

        let outcome = task.execute(Vec::new()).unwrap();
        assert_eq!(outcome, Outcome::Failure(TaskFault::user("Boom")));
        assert!(task.failed());
        assert_eq!(task.attempts(), 1);

        let resolutions = task.done().await;
        assert_eq!(resolutions, vec![Outcome::Failure(TaskFault::user("Boom"))]);
    }

    #[test_log::test(tokio::test)]
    async fn an_async_rejection_overrides_an_internal_succeed() {
        let task = task_of("flaky", |task, _args| {
            let _ = task.succeed(val("A"));
            Ok(ExecuteReturn::future(async {
                sleep_ms(5).await;
                Err(TaskFault::user("Boom"))
            }))
        });

        task.execute(Vec::new()).unwrap();
        task.done().await;
        assert!(task.failed());
        assert_eq!(task.error(), Some(TaskFault::user("Boom")));
    }

    #[test_log::test(tokio::test)]
    async fn an_async_value_is_discarded_after_an_internal_succeed() {
        let task = task_of("eager", |task, _args| {
            let _ = task.succeed(val("A"));
            Ok(ExecuteReturn::future(async {
                sleep_ms(5).await;
                Ok(val("Z"))
            }))
        });

        task.execute(Vec::new()).unwrap();
        let resolutions = task.done().await;
        assert_eq!(resolutions, vec![Outcome::Success(val("Z"))]);
        assert_eq!(task.state().name(), "Succeeded");
        assert_eq!(task.result(), Some(val("A")));
    }

    #[test_log::test(tokio::test)]
    async fn an_internal_rejection_wins_over_a_later_async_failure() {
        let internal = TaskFault::user("bad input");
        let task = task_of("unusable", move |task, _args| {
            let _ = task.reject_as("ThrownAway", "unusable", Some(internal.clone()));
            Ok(ExecuteReturn::future(async {
                sleep_ms(5).await;
                Err(TaskFault::user("Boom"))
            }))
        });

        task.execute(Vec::new()).unwrap();
        let resolutions = task.done().await;
        assert_eq!(resolutions, vec![Outcome::Failure(TaskFault::user("Boom"))]);

        let state = task.state();
        assert_eq!(state.kind(), StateKind::Rejected);
        assert_eq!(state.name(), "ThrownAway");
        assert_eq!(state.reason(), Some("unusable"));
        assert_eq!(task.error(), Some(TaskFault::user("bad input")));
    }

    #[test_log::test(tokio::test)]
    async fn an_internal_failure_stands_over_a_later_async_failure() {
        let task = task_of("fragile", |task, _args| {
            let _ = task.fail_as("Broken", TaskFault::user("first"));
            Ok(ExecuteReturn::future(async {
                Err(TaskFault::user("second"))
            }))
        });

        task.execute(Vec::new()).unwrap();
        task.done().await;
        assert_eq!(task.state().name(), "Broken");
        assert_eq!(task.error(), Some(TaskFault::user("first")));
    }

    #[test_log::test(tokio::test)]
    async fn executing_a_frozen_task_is_refused_without_an_attempt() {
        let task = task_of("iced", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        task.freeze();

        let outcome = task.execute(Vec::new()).unwrap();
        assert_eq!(outcome.failure().map(|f| f.kind.clone()), Some(FaultKind::Frozen));
        assert_eq!(task.attempts(), 0);
        assert!(task.unstarted());
        assert_eq!(task.done().await, Vec::new());
    }

    #[test_log::test(tokio::test)]
    async fn freezing_mid_flight_suppresses_the_auto_outcome() {
        let task = task_of("self-freeze", |task, _args| {
            Ok(ExecuteReturn::future(async move {
                sleep_ms(5).await;
                task.freeze();
                Ok(val("A"))
            }))
        });

        let outcome = task.execute(Vec::new()).unwrap();
        assert!(outcome.is_success());
        let resolutions = task.done().await;
        assert_eq!(resolutions, vec![Outcome::Success(val("A"))]);
        assert!(task.started());
        assert_eq!(task.result(), None);
    }

    #[test]
    fn mutators_on_a_frozen_task_fail_and_change_nothing() {
        let task = task_of("iced", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        task.execute(Vec::new()).unwrap();
        task.freeze();
        let before = task.to_task_like();

        assert_eq!(
            task.complete(val("X")).unwrap_err().kind,
            FaultKind::Frozen
        );
        assert_eq!(
            task.fail(TaskFault::user("boom")).unwrap_err().kind,
            FaultKind::Frozen
        );
        assert_eq!(task.timeout(None).unwrap_err().kind, FaultKind::Frozen);
        assert_eq!(
            task.reject("late", None).unwrap_err().kind,
            FaultKind::Frozen
        );
        similar_asserts::assert_eq!(task.to_task_like(), before);
    }

    #[test]
    fn freeze_is_idempotent_and_preserves_state() {
        let task = task_of("t", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        let _ = task.succeed(val("A"));
        task.freeze();
        task.freeze();
        assert!(task.frozen());
        assert_eq!(task.state().name(), "Succeeded");
    }

    #[test]
    fn external_failure_overrides_a_prior_success() {
        let task = task_of("t", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        let _ = task.succeed(val("A"));
        assert!(task.fail(TaskFault::user("late boom")).unwrap().applied());
        assert!(task.failed());
    }

    #[test]
    fn completion_is_a_no_op_on_a_failed_task() {
        let task = task_of("t", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        let _ = task.fail(TaskFault::user("boom"));
        assert_eq!(task.complete(val("X")).unwrap(), Transition::Kept);
        assert!(task.failed());
        assert_eq!(task.result(), None);
    }

    #[test]
    fn timeout_does_not_override_completed_without_the_flag() {
        let task = task_of("t", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        let _ = task.complete(val("A"));
        assert_eq!(task.timeout(None).unwrap(), Transition::Kept);
        assert!(task.completed());

        let opts = TimeoutOpts {
            override_completed: true,
            recurse: false,
        };
        assert!(
            task.timeout_as("TimedOut", Some(TaskFault::timeout("slow")), opts)
                .unwrap()
                .applied()
        );
        assert!(task.timed_out());
    }

    #[test]
    fn completion_overrides_a_timeout_only_with_the_flag() {
        let task = task_of("t", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        let _ = task.timeout(Some(TaskFault::timeout("slow")));
        assert_eq!(task.complete(val("A")).unwrap(), Transition::Kept);

        let opts = CompleteOpts {
            override_timed_out: true,
        };
        assert!(task.complete_as("Completed", val("A"), opts).unwrap().applied());
        assert!(task.completed());
    }

    #[test]
    fn rejection_wins_and_the_first_rejection_stands() {
        let task = task_of("t", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        let _ = task.fail(TaskFault::user("boom"));
        assert!(task.discard("stale", None).unwrap().applied());
        assert_eq!(task.state().name(), "Discarded");

        assert_eq!(task.abandon("again", None).unwrap(), Transition::Kept);
        assert_eq!(task.state().name(), "Discarded");

        assert_eq!(
            task.fail(TaskFault::user("late")).unwrap(),
            Transition::Kept
        );
        assert_eq!(task.state().name(), "Discarded");
    }

    #[test]
    fn a_recursive_timeout_prefers_the_leaf_cause() {
        let def = define_task("root", |_task, _args| Ok(ExecuteReturn::value(val("R"))))
            .unwrap();
        let group = def.define_sub_container("group").unwrap();
        group
            .define_sub_task("leaf", |_task, _args| Ok(ExecuteReturn::value(val("L"))))
            .unwrap();
        let root = TaskFactory::default().create_task(&def).unwrap();

        let leaf = root.sub_task("group").unwrap().sub_task("leaf").unwrap();
        let leaf_fault = TaskFault::timeout("leaf deadline passed");
        let _ = leaf.timeout(Some(leaf_fault.clone()));

        let opts = TimeoutOpts {
            override_completed: false,
            recurse: true,
        };
        assert!(root.timeout_as("TimedOut", None, opts).unwrap().applied());

        let group = root.sub_task("group").unwrap();
        assert!(group.timed_out());
        assert_eq!(group.error(), Some(leaf_fault.clone()));
        assert!(root.timed_out());
        assert_eq!(root.error(), Some(leaf_fault.clone()));
        assert_eq!(root.state().error(), Some(leaf_fault.to_string().as_str()));
    }

    #[test]
    fn finalise_fails_non_terminal_tasks_bottom_up_and_freezes_the_tree() {
        let def = define_task("root", |_task, _args| Ok(ExecuteReturn::value(val("R"))))
            .unwrap();
        def.define_sub_task("done", |_task, _args| Ok(ExecuteReturn::value(val("D"))))
            .unwrap();
        def.define_sub_task("pending", |_task, _args| Ok(ExecuteReturn::value(val("P"))))
            .unwrap();
        let root = TaskFactory::default().create_task(&def).unwrap();
        let _ = root.sub_task("done").unwrap().succeed(val("D"));

        root.finalise();

        let pending = root.sub_task("pending").unwrap();
        assert!(pending.failed());
        assert_eq!(pending.error().map(|f| f.kind), Some(FaultKind::Finalised));

        let done = root.sub_task("done").unwrap();
        assert_eq!(done.state().name(), "Succeeded");

        assert!(root.failed());
        assert!(root.finalised() && root.frozen());
        assert!(pending.finalised() && pending.frozen());
        assert!(done.finalised() && done.frozen());

        assert_eq!(
            root.complete(val("X")).unwrap_err().kind,
            FaultKind::Finalised
        );

        // Idempotent.
        root.finalise();
        assert!(root.failed());
    }

    #[test_log::test(tokio::test)]
    async fn executing_a_finalised_task_reports_the_finalised_fault() {
        let task = task_of("t", |_task, _args| Ok(ExecuteReturn::value(val("A"))));
        task.finalise();
        let outcome = task.execute(Vec::new()).unwrap();
        assert_eq!(
            outcome.failure().map(|f| f.kind.clone()),
            Some(FaultKind::Finalised)
        );
        assert_eq!(task.attempts(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn a_container_sub_task_cannot_execute() {
        let def = define_task("root", |_task, _args| Ok(ExecuteReturn::value(val("R"))))
            .unwrap();
        def.define_sub_container("group").unwrap();
        let root = TaskFactory::default().create_task(&def).unwrap();
        let group = root.sub_task("group").unwrap();

        let outcome = group.execute(Vec::new()).unwrap();
        assert_eq!(
            outcome.failure().map(|f| f.kind.clone()),
            Some(FaultKind::Definition)
        );
        assert_eq!(group.attempts(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn the_done_future_waits_for_sub_tasks() {
        let def = define_task("root", |_task, _args| Ok(ExecuteReturn::value(val("R"))))
            .unwrap();
        def.define_sub_task("slow", |_task, _args| {
            Ok(ExecuteReturn::future(async {
                sleep_ms(20).await;
                Ok(val("S"))
            }))
        })
        .unwrap();
        let root = TaskFactory::default().create_task(&def).unwrap();
        let slow = root.sub_task("slow").unwrap();

        root.execute(Vec::new()).unwrap();
        slow.execute(Vec::new()).unwrap();

        root.done().await;
        assert!(slow.completed());
        assert_eq!(slow.result(), Some(val("S")));
        assert!(root.completed());
    }

    #[test_log::test(tokio::test)]
    async fn each_execute_records_a_new_attempt_and_done_follows_the_latest() {
        let task = task_of("retry", |_task, _args| {
            Ok(ExecuteReturn::future(async { Ok(val("ok")) }))
        });

        task.execute(Vec::new()).unwrap();
        assert_eq!(task.attempts(), 1);
        task.done().await;

        task.execute(Vec::new()).unwrap();
        assert_eq!(task.attempts(), 2);
        let resolutions = task.done().await;
        assert_eq!(resolutions, vec![Outcome::Success(val("ok"))]);
    }
}
