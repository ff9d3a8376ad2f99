//! Shared error definitions for runtime primitives.

use thiserror::Error;
use uuid::Error as UuidError;

use crate::context::ContextSource;

/// Result alias used throughout the environment runtime.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided session identifier could not be parsed.
    #[error("invalid session id: {source}")]
    InvalidSessionId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Capability key or context key failed validation.
    #[error("invalid key `{key}`: {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A load-time context entry collided with an existing one.
    #[error("context key `{key}` is already provided by {existing}; {incoming} cannot overwrite it")]
    ContextKeyConflict {
        /// The contested key.
        key: String,
        /// Source that populated the key first.
        existing: ContextSource,
        /// Source that attempted the overwrite.
        incoming: ContextSource,
    },
}
