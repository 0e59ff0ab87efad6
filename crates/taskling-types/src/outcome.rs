use std::fmt;

use crate::fault::TaskFault;

/// The uniform return of an execute invocation: a success carrying a value
/// or a failure carrying a fault.
///
/// Wrapped executes never propagate user errors directly; they hand back an
/// `Outcome` so that the caller always gets a value to inspect.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(TaskFault),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// The success value, if any.
    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    /// The failure fault, if any.
    pub fn failure(&self) -> Option<&TaskFault> {
        match self {
            Self::Success(_) => None,
            Self::Failure(fault) => Some(fault),
        }
    }

    /// Maps the success value, leaving failures untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success(value) => Outcome::Success(f(value)),
            Self::Failure(fault) => Outcome::Failure(fault),
        }
    }

    /// Maps the failure fault, leaving successes untouched.
    pub fn map_failure(self, f: impl FnOnce(TaskFault) -> TaskFault) -> Outcome<T> {
        match self {
            Self::Success(value) => Outcome::Success(value),
            Self::Failure(fault) => Outcome::Failure(f(fault)),
        }
    }

    /// Converts into a plain `Result`, the awaitable form: a success becomes
    /// `Ok` and flows through `?`/`.await` chains, a failure becomes `Err`.
    pub fn into_result(self) -> Result<T, TaskFault> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(fault) => Err(fault),
        }
    }
}

impl<T: fmt::Debug> Outcome<T> {
    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Success(value) => format!("Success({value:?})"),
            Self::Failure(fault) => format!("Failure({fault})"),
        }
    }
}

impl<T> From<Result<T, TaskFault>> for Outcome<T> {
    fn from(result: Result<T, TaskFault>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(fault) => Self::Failure(fault),
        }
    }
}
