//! Core shared types and traits for the Plumber environment runtime.

#![warn(missing_docs, clippy::pedantic)]

mod capability;
mod context;
mod error;
mod ids;
mod script;

/// Capability keys and the trait implemented by host capabilities.
pub use capability::{Capability, CapabilityHandle, CapabilityKey};
/// Session context and its entries.
pub use context::{Context, ContextSource, ContextValue};
/// Error type and result alias shared across the runtime.
pub use error::{Error, Result};
/// Unique identifier for one environment session.
pub use ids::SessionId;
/// Executable fragments bound into environment definitions.
pub use script::{
    AsyncFnScript, ContextFunction, FnScript, Formatter, Script, ScriptError, ScriptResult,
    async_script, script_fn,
};
