//! Session runtime for Plumber environments.
//!
//! [`EnvironmentRuntime::start`] turns an environment definition into a
//! [`Session`]: it validates the definition, resolves its modules against the
//! capability registry, prompts for launch options, and assembles the
//! context. [`Session::run_with`] then drives on-load scripts, host
//! interaction, and on-exit scripts, which run however the session ends.
//! The host's termination hook is latched from the start of prompting until
//! the exit scripts have run.

#![warn(missing_docs, clippy::pedantic)]

pub mod context_builder;
mod error;
mod lifecycle;
pub mod resolver;
pub mod runtime;
pub mod scripts;
pub mod session;
pub mod termination;

pub use context_builder::ContextBuilder;
pub use error::{SessionError, SessionResult, Stage};
pub use lifecycle::{Lifecycle, LifecycleError, LifecycleResult, SessionEvent, SessionState};
pub use resolver::{ResolvedModule, resolve_modules};
pub use runtime::{EnvironmentRuntime, RuntimeConfig};
pub use scripts::{ExitScriptFailure, LifecycleScriptRunner, RunnerConfig};
pub use session::{Session, SessionOutcome, SessionReport};
pub use termination::{
    NeverTerminate, ShutdownSignal, TerminationHook, TerminationLatch, TerminationTrigger,
};
