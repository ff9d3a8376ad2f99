//! Error types for session start-up and execution.

use std::fmt;

use plumber_capabilities::CapabilityError;
use plumber_config::{DefinitionError, RegistryError};
use plumber_primitives::{CapabilityKey, ContextSource, ScriptError};
use plumber_prompts::PromptError;
use serde::Serialize;
use thiserror::Error;

use crate::scripts::ExitScriptFailure;

/// Result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Phase of a session a failure or abort is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Definition validation before anything is shown.
    Validation,
    /// Capability lookup for the `modules` map.
    ModuleResolution,
    /// Launch-option prompting.
    Prompting,
    /// On-load scripts.
    OnLoad,
    /// Host interaction after on-load completed.
    Active,
    /// On-exit scripts.
    OnExit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validation => "validation",
            Self::ModuleResolution => "module resolution",
            Self::Prompting => "prompting",
            Self::OnLoad => "on-load",
            Self::Active => "active",
            Self::OnExit => "on-exit",
        })
    }
}

/// Errors surfaced while starting or driving a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Runtime configuration was invalid.
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(&'static str),

    /// The environment definition failed validation.
    #[error("environment `{environment}` is invalid: {source}")]
    InvalidDefinition {
        /// Environment name.
        environment: String,
        /// Validation failure.
        #[source]
        source: DefinitionError,
    },

    /// A module names a capability the registry does not know.
    #[error("environment `{environment}`: module `{alias}` requires unknown capability `{key}`")]
    UnknownCapability {
        /// Environment name.
        environment: String,
        /// Alias the capability was to be injected under.
        alias: String,
        /// Unresolved capability key.
        key: CapabilityKey,
    },

    /// A capability provider failed.
    #[error("environment `{environment}`: module `{alias}` could not be resolved: {source}")]
    Capability {
        /// Environment name.
        environment: String,
        /// Alias being resolved.
        alias: String,
        /// Provider failure.
        #[source]
        source: CapabilityError,
    },

    /// Two context sources claimed the same key.
    #[error(
        "environment `{environment}`: context key `{key}` from {incoming} is already set by {existing}"
    )]
    ContextKeyConflict {
        /// Environment name.
        environment: String,
        /// Contested key.
        key: String,
        /// Source that populated the key first.
        existing: ContextSource,
        /// Source that tried to populate it again.
        incoming: ContextSource,
    },

    /// The context rejected an entry for another reason.
    #[error("environment `{environment}`: {source}")]
    Context {
        /// Environment name.
        environment: String,
        /// Underlying context error.
        #[source]
        source: plumber_primitives::Error,
    },

    /// Prompting failed.
    #[error("environment `{environment}`: {source}")]
    Prompt {
        /// Environment name.
        environment: String,
        /// Prompt failure.
        #[source]
        source: PromptError,
    },

    /// An on-load script failed; later on-load scripts were skipped.
    #[error("environment `{environment}`: on-load script #{index} failed: {source}")]
    OnLoadScriptFailed {
        /// Environment name.
        environment: String,
        /// Zero-based position of the failing script.
        index: usize,
        /// Script failure.
        #[source]
        source: ScriptError,
    },

    /// The host asked to terminate.
    #[error("environment `{environment}` terminated during {stage}")]
    Aborted {
        /// Environment name.
        environment: String,
        /// Stage that was interrupted.
        stage: Stage,
        /// On-exit scripts that failed during the abort, in order.
        exit_failures: Vec<ExitScriptFailure>,
    },

    /// Environment lookup failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SessionError {
    /// Stage the error belongs to, when it is tied to one.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::InvalidDefinition { .. } => Some(Stage::Validation),
            Self::UnknownCapability { .. } | Self::Capability { .. } => {
                Some(Stage::ModuleResolution)
            }
            Self::Prompt { .. } | Self::ContextKeyConflict { .. } | Self::Context { .. } => {
                Some(Stage::Prompting)
            }
            Self::OnLoadScriptFailed { .. } => Some(Stage::OnLoad),
            Self::Aborted { stage, .. } => Some(*stage),
            Self::InvalidConfig(_) | Self::Registry(_) => None,
        }
    }
}
