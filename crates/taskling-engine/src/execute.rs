//! The execute surface: what user functions return and how the engine
//! normalises it into ordered, awaitable work.
//!
//! A user function hands back a plain value, a single future, or an ordered
//! list mixing both. The engine flattens every shape into a list of
//! awaitables whose resolutions are recorded in input order regardless of
//! settle order.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use taskling_types::{Outcome, TaskFault};

use crate::task::Task;

/// A unit of asynchronous work produced by a user execute function.
pub type TaskFuture = BoxFuture<'static, Result<Value, TaskFault>>;

/// The user execute function.
///
/// The task handle takes the place of the receiver so that user code can
/// drive its own state management (`succeed`, `fail`, `reject_as`, ...)
/// mid-execution. A synchronous `Err` is the sync-throw path: the wrapped
/// execute captures it instead of propagating.
pub type ExecuteFn = Arc<dyn Fn(Task, Vec<Value>) -> Result<ExecuteReturn, TaskFault> + Send + Sync>;

/// One element of a list-shaped execute return.
pub enum ExecuteItem {
    /// Already settled.
    Value(Value),
    /// Settles later.
    Future(TaskFuture),
}

impl ExecuteItem {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, TaskFault>> + Send + 'static,
    {
        Self::Future(Box::pin(future))
    }
}

/// What a user execute function hands back synchronously.
pub enum ExecuteReturn {
    /// A plain value.
    Value(Value),
    /// A single future.
    Future(TaskFuture),
    /// An ordered list of futures and plain values.
    List(Vec<ExecuteItem>),
}

impl ExecuteReturn {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, TaskFault>> + Send + 'static,
    {
        Self::Future(Box::pin(future))
    }

    pub fn list(items: Vec<ExecuteItem>) -> Self {
        Self::List(items)
    }
}

/// The synchronous part of an execute invocation, as stored in the task's
/// outcome. The futures themselves are consumed into the pending work; only
/// the shape survives.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncReturn {
    /// The user returned this value directly.
    Value(Value),
    /// The user returned a single, still-pending future.
    Future,
    /// The user returned a list of this many awaitables.
    List(usize),
}

/// An awaitable armed for the done future. Already-settled entries keep
/// their slot in input order next to still-pending futures.
pub(crate) enum Awaitable {
    Ready(Outcome<Value>),
    Future(TaskFuture),
}

/// Pending work captured by one execute invocation.
pub(crate) struct PendingWork {
    pub(crate) items: Vec<Awaitable>,
    /// Whether the user returned a list; list results stay lists even when
    /// they hold a single entry.
    pub(crate) list: bool,
}

impl PendingWork {
    /// A single already-failed entry, the sync-throw shape.
    pub(crate) fn failed(fault: TaskFault) -> Self {
        Self {
            items: vec![Awaitable::Ready(Outcome::Failure(fault))],
            list: false,
        }
    }
}

/// Normalise a user return into its outcome shape plus the armed awaitables.
pub(crate) fn normalise(ret: ExecuteReturn) -> (SyncReturn, PendingWork) {
    match ret {
        ExecuteReturn::Value(value) => (
            SyncReturn::Value(value.clone()),
            PendingWork {
                items: vec![Awaitable::Ready(Outcome::Success(value))],
                list: false,
            },
        ),
        ExecuteReturn::Future(future) => (
            SyncReturn::Future,
            PendingWork {
                items: vec![Awaitable::Future(future)],
                list: false,
            },
        ),
        ExecuteReturn::List(items) => {
            let shape = SyncReturn::List(items.len());
            let items = items
                .into_iter()
                .map(|item| match item {
                    ExecuteItem::Value(value) => Awaitable::Ready(Outcome::Success(value)),
                    ExecuteItem::Future(future) => Awaitable::Future(future),
                })
                .collect();
            (shape, PendingWork { items, list: true })
        }
    }
}

/// Settle all awaitables, recording resolutions in input order regardless
/// of settle order.
pub(crate) async fn settle(items: Vec<Awaitable>) -> Vec<Outcome<Value>> {
    join_all(items.into_iter().map(|item| async move {
        match item {
            Awaitable::Ready(outcome) => outcome,
            Awaitable::Future(future) => match future.await {
                Ok(value) => Outcome::Success(value),
                Err(fault) => Outcome::Failure(fault),
            },
        }
    }))
    .await
}
