//! Error types for definition loading and the environment registry.

use std::path::PathBuf;

use plumber_primitives::ContextSource;
use thiserror::Error;

use crate::format::DefinitionFormat;

/// Result alias for definition operations.
pub type DefinitionResult<T> = Result<T, DefinitionError>;

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while building, parsing, or validating a definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The environment name is empty.
    #[error("environment name cannot be empty")]
    EmptyName,

    /// A static context key, module alias, or option name is empty.
    #[error("{origin} key cannot be empty")]
    EmptyKey {
        /// Where the empty key was declared.
        origin: ContextSource,
    },

    /// Two launch options share a name.
    #[error("launch option `{name}` is declared more than once")]
    DuplicateOptionName {
        /// The repeated option name.
        name: String,
    },

    /// A `choice` option has no choices.
    #[error("choice option `{option}` must declare at least one choice")]
    MissingChoices {
        /// Name of the offending option.
        option: String,
    },

    /// A `text` option declares choices.
    #[error("text option `{option}` cannot declare choices")]
    UnexpectedChoices {
        /// Name of the offending option.
        option: String,
    },

    /// Two load-time sources populate the same context key.
    #[error("context key `{key}` is declared by both {existing} and {incoming}")]
    ContextKeyConflict {
        /// The contested key.
        key: String,
        /// Source that declared the key first.
        existing: ContextSource,
        /// Source that declared it again.
        incoming: ContextSource,
    },

    /// A capability key failed validation.
    #[error(transparent)]
    InvalidKey(#[from] plumber_primitives::Error),

    /// A launch option references a formatter the catalog does not know.
    #[error("launch option `{option}` references unknown formatter `{name}`")]
    UnknownFormatter {
        /// Name of the option.
        option: String,
        /// Formatter name that failed to bind.
        name: String,
    },

    /// A lifecycle stage references a script the catalog does not know.
    #[error("{stage} script `{name}` is not in the script catalog")]
    UnknownScript {
        /// `on-load` or `on-exit`.
        stage: &'static str,
        /// Script name that failed to bind.
        name: String,
    },

    /// A context entry references a function the catalog does not know.
    #[error("context key `{key}` references unknown function `{name}`")]
    UnknownFunction {
        /// Context key holding the reference.
        key: String,
        /// Function name that failed to bind.
        name: String,
    },

    /// The catalog already holds an entry of this kind and name.
    #[error("{kind} `{name}` is already in the script catalog")]
    DuplicateCatalogEntry {
        /// `formatter`, `script`, or `function`.
        kind: &'static str,
        /// The repeated name.
        name: String,
    },

    /// The definition text could not be parsed.
    #[error("failed to parse {format} definition {origin}: {reason}")]
    Parse {
        /// File path or `<inline>`.
        origin: String,
        /// Format used for parsing.
        format: DefinitionFormat,
        /// Parser error message.
        reason: String,
    },

    /// The definition file could not be read.
    #[error("failed to read definition {}: {source}", .path.display())]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file extension does not map to a supported format.
    #[error("unsupported definition format for {}", .path.display())]
    UnsupportedFormat {
        /// Path with the unrecognised extension.
        path: PathBuf,
    },
}

/// Errors produced by the environment registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No environment is registered under the requested name.
    #[error("environment `{name}` not found")]
    EnvironmentNotFound {
        /// Requested environment name.
        name: String,
    },

    /// Another loaded source already declared this environment name.
    #[error("environment `{name}` is already registered")]
    DuplicateEnvironmentName {
        /// The repeated environment name.
        name: String,
    },

    /// The definition failed to load or validate.
    #[error("invalid environment definition: {source}")]
    Definition {
        /// Underlying definition error.
        #[from]
        source: DefinitionError,
    },
}
