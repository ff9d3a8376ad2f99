//! Environment definitions and the registry that holds them.
//!
//! A definition is built either in code through
//! [`EnvironmentDefinition::builder`] or from a JSON/YAML file whose named
//! formatters, scripts, and functions are bound through a [`ScriptCatalog`].

#![warn(missing_docs, clippy::pedantic)]

pub mod catalog;
pub mod definition;
mod error;
pub mod format;
pub mod registry;

pub use catalog::ScriptCatalog;
pub use definition::{EnvironmentDefinition, EnvironmentDefinitionBuilder, LaunchOption, OptionKind};
pub use error::{DefinitionError, DefinitionResult, RegistryError, RegistryResult};
pub use format::{DefinitionFormat, parse_definition};
pub use registry::{DefinitionSource, EnvironmentRegistry};
