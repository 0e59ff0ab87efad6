//! Declarative task definitions.
//!
//! A definition is a reusable blueprint: a name, an optional execute
//! function, and an ordered tree of sub-definitions with sibling-unique
//! names. Definitions freeze on first factory use; acyclicity is structural
//! because children are always freshly created and never re-parented.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use taskling_types::{DefinitionError, TaskFault};

use crate::execute::{ExecuteFn, ExecuteReturn};
use crate::task::Task;

pub(crate) struct DefNode {
    pub(crate) name: String,
    pub(crate) execute: Option<ExecuteFn>,
    parent: Weak<DefNode>,
    children: Mutex<Vec<Arc<DefNode>>>,
    frozen: AtomicBool,
}

/// A declarative, reusable blueprint for producing tasks.
///
/// Cheap clone handle; all handles share one definition node.
#[derive(Clone)]
pub struct TaskDef {
    node: Arc<DefNode>,
}

/// Define a new root task.
///
/// Roots always carry an execute function; only sub-definitions may be pure
/// containers.
pub fn define_task<F>(name: impl Into<String>, execute: F) -> Result<TaskDef, DefinitionError>
where
    F: Fn(Task, Vec<Value>) -> Result<ExecuteReturn, TaskFault> + Send + Sync + 'static,
{
    Ok(TaskDef {
        node: Arc::new(DefNode {
            name: non_blank(name.into())?,
            execute: Some(Arc::new(execute)),
            parent: Weak::new(),
            children: Mutex::new(Vec::new()),
            frozen: AtomicBool::new(false),
        }),
    })
}

fn non_blank(name: String) -> Result<String, DefinitionError> {
    if name.trim().is_empty() {
        Err(DefinitionError::BlankName)
    } else {
        Ok(name)
    }
}

impl TaskDef {
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Append a child definition with its own execute function.
    ///
    /// Fails when a sibling of the same name exists or this definition is
    /// frozen.
    pub fn define_sub_task<F>(
        &self,
        name: impl Into<String>,
        execute: F,
    ) -> Result<TaskDef, DefinitionError>
    where
        F: Fn(Task, Vec<Value>) -> Result<ExecuteReturn, TaskFault> + Send + Sync + 'static,
    {
        self.append(name.into(), Some(Arc::new(execute) as ExecuteFn))
    }

    /// Append a pure container node: no execute function of its own, its
    /// outcome derives entirely from its children.
    pub fn define_sub_container(&self, name: impl Into<String>) -> Result<TaskDef, DefinitionError> {
        self.append(name.into(), None)
    }

    fn append(&self, name: String, execute: Option<ExecuteFn>) -> Result<TaskDef, DefinitionError> {
        let name = non_blank(name)?;
        if self.frozen() {
            return Err(DefinitionError::FrozenDefinition {
                name: self.node.name.clone(),
            });
        }
        let mut children = self.node.children.lock();
        if children.iter().any(|child| child.name == name) {
            return Err(DefinitionError::DuplicateSubDef {
                parent: self.node.name.clone(),
                name,
            });
        }
        let child = Arc::new(DefNode {
            name,
            execute,
            parent: Arc::downgrade(&self.node),
            children: Mutex::new(Vec::new()),
            frozen: AtomicBool::new(false),
        });
        children.push(Arc::clone(&child));
        Ok(TaskDef { node: child })
    }

    /// Child definition by name.
    pub fn sub_def(&self, name: &str) -> Option<TaskDef> {
        self.node
            .children
            .lock()
            .iter()
            .find(|child| child.name == name)
            .map(|node| TaskDef {
                node: Arc::clone(node),
            })
    }

    /// Direct children in insertion order.
    pub fn sub_defs(&self) -> Vec<TaskDef> {
        self.node
            .children
            .lock()
            .iter()
            .map(|node| TaskDef {
                node: Arc::clone(node),
            })
            .collect()
    }

    /// The owning definition, if this is a sub-definition.
    pub fn parent(&self) -> Option<TaskDef> {
        self.node.parent.upgrade().map(|node| TaskDef { node })
    }

    pub fn frozen(&self) -> bool {
        self.node.frozen.load(Ordering::Acquire)
    }

    /// Seal the whole definition tree against further sub-definitions.
    /// Invoked on first factory use; idempotent.
    pub(crate) fn freeze(&self) {
        self.node.frozen.store(true, Ordering::Release);
        for child in self.sub_defs() {
            child.freeze();
        }
    }

    pub(crate) fn node(&self) -> &Arc<DefNode> {
        &self.node
    }

    pub(crate) fn from_node(node: Arc<DefNode>) -> TaskDef {
        TaskDef { node }
    }
}

impl fmt::Debug for TaskDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDef")
            .field("name", &self.node.name)
            .field("sub_defs", &self.node.children.lock().len())
            .field("frozen", &self.frozen())
            .finish()
    }
}
