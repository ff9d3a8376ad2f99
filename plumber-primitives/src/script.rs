//! Executable fragments carried by environment definitions.
//!
//! Definitions bind three kinds of functions at load time: lifecycle
//! [`Script`]s that receive the session [`Context`], launch-option
//! [`Formatter`]s that turn a raw answer into a stored value, and
//! [`ContextFunction`]s stored as context entries for scripts to call.

use std::any::Any;
use std::fmt;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::context::Context;

/// Result alias for script, formatter, and context function execution.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors raised by executable fragments.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ScriptError {
    /// The script reported a failure.
    #[error("script failed: {reason}")]
    Failed {
        /// Human-readable reason returned by the script.
        reason: String,
    },

    /// A context key the script depends on is absent.
    #[error("context key `{key}` is not set")]
    MissingKey {
        /// Name of the missing key.
        key: String,
    },

    /// A context entry holds a different kind of value than expected.
    #[error("context key `{key}` is not {expected}")]
    TypeMismatch {
        /// Name of the offending key.
        key: String,
        /// Description of the expected value kind.
        expected: &'static str,
    },

    /// The script panicked while running.
    #[error("script panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The script did not finish within its time budget.
    #[error("script timed out after {millis} ms")]
    TimedOut {
        /// Elapsed budget in milliseconds.
        millis: u64,
    },
}

impl ScriptError {
    /// Creates a failure from the supplied reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Converts a caught panic payload into an error.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self::Panicked { message }
    }
}

/// A lifecycle script run against the session context.
#[async_trait]
pub trait Script: Send + Sync {
    /// Runs the script to completion.
    async fn run(&self, context: &mut Context) -> ScriptResult<()>;
}

/// Synchronous closure adapter, see [`script_fn`].
pub struct FnScript<F> {
    f: F,
}

impl<F> fmt::Debug for FnScript<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnScript").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Script for FnScript<F>
where
    F: Fn(&mut Context) -> ScriptResult<()> + Send + Sync,
{
    async fn run(&self, context: &mut Context) -> ScriptResult<()> {
        (self.f)(context)
    }
}

/// Wraps a synchronous closure as a [`Script`].
#[must_use]
pub fn script_fn<F>(f: F) -> FnScript<F>
where
    F: Fn(&mut Context) -> ScriptResult<()> + Send + Sync,
{
    FnScript { f }
}

/// Asynchronous closure adapter, see [`async_script`].
pub struct AsyncFnScript<F> {
    f: F,
}

impl<F> fmt::Debug for AsyncFnScript<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnScript").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Script for AsyncFnScript<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ScriptResult<()>> + Send + Sync,
{
    async fn run(&self, context: &mut Context) -> ScriptResult<()> {
        (self.f)(context).await
    }
}

/// Wraps a closure returning a boxed future as a [`Script`].
#[must_use]
pub fn async_script<F>(f: F) -> AsyncFnScript<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, ScriptResult<()>> + Send + Sync,
{
    AsyncFnScript { f }
}

/// Converts a raw launch-option answer into the value stored in the context.
pub trait Formatter: Send + Sync {
    /// Formats the raw answer.
    ///
    /// # Errors
    ///
    /// Returns a [`ScriptError`] when the answer cannot be converted.
    fn format(&self, raw: &str) -> ScriptResult<Value>;
}

impl<F> Formatter for F
where
    F: Fn(&str) -> ScriptResult<Value> + Send + Sync,
{
    fn format(&self, raw: &str) -> ScriptResult<Value> {
        (self)(raw)
    }
}

/// A zero- or one-argument function stored as a context entry.
pub trait ContextFunction: Send + Sync {
    /// Invokes the function; `None` means it was called without an argument.
    ///
    /// # Errors
    ///
    /// Returns a [`ScriptError`] when the function fails.
    fn call(&self, arg: Option<Value>) -> ScriptResult<Value>;
}

impl<F> ContextFunction for F
where
    F: Fn(Option<Value>) -> ScriptResult<Value> + Send + Sync,
{
    fn call(&self, arg: Option<Value>) -> ScriptResult<Value> {
        (self)(arg)
    }
}
