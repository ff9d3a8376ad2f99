//! Error types for launch-option prompting.

use plumber_primitives::ScriptError;
use thiserror::Error;

/// Result alias for prompt operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Errors raised while collecting launch-option answers.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Two options share a name; detected before anything is asked.
    #[error("launch option `{name}` is declared more than once")]
    DuplicateOptionName {
        /// The repeated option name.
        name: String,
    },

    /// A choice answer is not one of the declared choices.
    #[error("`{answer}` is not a valid choice for `{option}` (expected one of: {})", .choices.join(", "))]
    InvalidChoice {
        /// Name of the option.
        option: String,
        /// Raw answer returned by the adapter.
        answer: String,
        /// Declared choices.
        choices: Vec<String>,
    },

    /// The option's formatter rejected the answer.
    #[error("formatter for `{option}` failed: {source}")]
    FormatterFailed {
        /// Name of the option.
        option: String,
        /// Error returned by the formatter.
        #[source]
        source: ScriptError,
    },

    /// Sequencer configuration is invalid.
    #[error("invalid sequencer configuration: {0}")]
    InvalidConfig(&'static str),

    /// The adapter has no more input to read.
    #[error("prompt input closed")]
    InputClosed,

    /// The adapter failed to present the prompt or read the answer.
    #[error("prompt adapter error: {reason}")]
    Adapter {
        /// Human-readable reason reported by the adapter.
        reason: String,
    },
}

impl PromptError {
    /// Creates an adapter failure from the supplied reason.
    #[must_use]
    pub fn adapter(reason: impl Into<String>) -> Self {
        Self::Adapter {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(value: std::io::Error) -> Self {
        Self::adapter(value.to_string())
    }
}
