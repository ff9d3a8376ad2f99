//! On-disk definition format.
//!
//! A definition file is a record with the top-level keys `environment-name`,
//! `modules`, `context`, `launch-options`, `on-load-scripts`, and
//! `on-exit-scripts`. Executable fragments are names bound through a
//! [`ScriptCatalog`]; a context entry of the form `{"$function": "name"}`
//! binds a context function.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use plumber_primitives::{ContextValue, Script};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::catalog::ScriptCatalog;
use crate::definition::{EnvironmentDefinition, LaunchOption, OptionKind};
use crate::error::{DefinitionError, DefinitionResult};

/// Serialisation format of a definition file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionFormat {
    /// JSON document.
    Json,
    /// YAML document.
    Yaml,
}

impl DefinitionFormat {
    /// Picks the format from a file extension (`json`, `yaml`, `yml`).
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for DefinitionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct DefinitionFile {
    environment_name: String,
    #[serde(default)]
    modules: Entries<String>,
    #[serde(default)]
    context: Entries<ContextEntry>,
    #[serde(default)]
    launch_options: Vec<LaunchOptionFile>,
    #[serde(default)]
    on_load_scripts: Vec<String>,
    #[serde(default)]
    on_exit_scripts: Vec<String>,
}

/// Map entries in document order. Repeated keys are kept so the builder can
/// reject them.
#[derive(Debug)]
struct Entries<V>(Vec<(String, V)>);

impl<V> Default for Entries<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or_default());
                while let Some(entry) = map.next_entry()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContextEntry {
    Function(FunctionRef),
    Data(Value),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionRef {
    #[serde(rename = "$function")]
    function: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct LaunchOptionFile {
    option_name: String,
    #[serde(default)]
    prompt: String,
    #[serde(rename = "type")]
    kind: OptionKind,
    #[serde(default)]
    choices: Option<Vec<String>>,
    #[serde(default)]
    formatter: Option<String>,
}

/// Parses definition text and binds its named fragments against `catalog`.
///
/// `origin` names the source in error messages (a path or `<inline>`).
///
/// # Errors
///
/// Returns [`DefinitionError::Parse`] for malformed text, an `Unknown*`
/// variant for names missing from the catalog, or any validation error.
pub fn parse_definition(
    text: &str,
    format: DefinitionFormat,
    origin: &str,
    catalog: &ScriptCatalog,
) -> DefinitionResult<EnvironmentDefinition> {
    let file: DefinitionFile = match format {
        DefinitionFormat::Json => {
            serde_json::from_str::<DefinitionFile>(text).map_err(|err| err.to_string())
        }
        DefinitionFormat::Yaml => {
            serde_yaml::from_str::<DefinitionFile>(text).map_err(|err| err.to_string())
        }
    }
    .map_err(|reason| DefinitionError::Parse {
        origin: origin.to_owned(),
        format,
        reason,
    })?;

    bind(file, catalog)
}

fn bind(file: DefinitionFile, catalog: &ScriptCatalog) -> DefinitionResult<EnvironmentDefinition> {
    let mut builder = EnvironmentDefinition::builder(file.environment_name);

    for (alias, key) in file.modules.0 {
        builder = builder.module(alias, &key)?;
    }

    for (key, entry) in file.context.0 {
        let value = match entry {
            ContextEntry::Data(value) => ContextValue::Data(value),
            ContextEntry::Function(FunctionRef { function }) => {
                let Some(bound) = catalog.function(&function) else {
                    return Err(DefinitionError::UnknownFunction {
                        key,
                        name: function,
                    });
                };
                ContextValue::Function(bound)
            }
        };
        builder = builder.entry(key, value);
    }

    for option in file.launch_options {
        builder = builder.launch_option(bind_option(option, catalog)?);
    }

    for script in bind_scripts("on-load", file.on_load_scripts, catalog)? {
        builder = builder.on_load_shared(script);
    }
    for script in bind_scripts("on-exit", file.on_exit_scripts, catalog)? {
        builder = builder.on_exit_shared(script);
    }

    builder.build()
}

fn bind_option(
    option: LaunchOptionFile,
    catalog: &ScriptCatalog,
) -> DefinitionResult<LaunchOption> {
    let choices = option.choices.unwrap_or_default();
    let mut bound = match option.kind {
        OptionKind::Text if choices.is_empty() => {
            LaunchOption::text(&option.option_name, option.prompt)
        }
        OptionKind::Text => {
            return Err(DefinitionError::UnexpectedChoices {
                option: option.option_name,
            });
        }
        OptionKind::Choice => {
            LaunchOption::choice(&option.option_name, option.prompt, choices)
        }
    };

    if let Some(name) = option.formatter {
        let Some(formatter) = catalog.formatter(&name) else {
            return Err(DefinitionError::UnknownFormatter {
                option: option.option_name,
                name,
            });
        };
        bound = bound.with_shared_formatter(formatter);
    }

    Ok(bound)
}

fn bind_scripts(
    stage: &'static str,
    names: Vec<String>,
    catalog: &ScriptCatalog,
) -> DefinitionResult<Vec<Arc<dyn Script>>> {
    names
        .into_iter()
        .map(|name| {
            catalog
                .script(&name)
                .ok_or(DefinitionError::UnknownScript { stage, name })
        })
        .collect()
}
