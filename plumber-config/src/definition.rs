//! Environment definitions: modules, static context, launch options, and
//! lifecycle scripts.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use plumber_primitives::{
    CapabilityKey, ContextSource, ContextValue, Formatter, Script, ScriptResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DefinitionError, DefinitionResult};

/// How a launch option's answer is collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    /// Free-form answer.
    Text,
    /// Answer picked from a declared set of choices.
    Choice,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Choice => "choice",
        })
    }
}

/// An interactive prompt shown when the environment launches.
#[derive(Clone)]
pub struct LaunchOption {
    name: String,
    prompt: String,
    kind: OptionKind,
    choices: Vec<String>,
    formatter: Option<Arc<dyn Formatter>>,
}

impl LaunchOption {
    /// Creates a free-form text option.
    #[must_use]
    pub fn text(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            kind: OptionKind::Text,
            choices: Vec::new(),
            formatter: None,
        }
    }

    /// Creates an option restricted to `choices`.
    #[must_use]
    pub fn choice<I, S>(name: impl Into<String>, prompt: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            kind: OptionKind::Choice,
            choices: choices.into_iter().map(Into::into).collect(),
            formatter: None,
        }
    }

    /// Attaches a formatter closure applied to the raw answer.
    #[must_use]
    pub fn with_formatter<F>(self, formatter: F) -> Self
    where
        F: Fn(&str) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        self.with_shared_formatter(Arc::new(formatter))
    }

    /// Attaches an already shared formatter.
    #[must_use]
    pub fn with_shared_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Option name; also the context key its answer is stored under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Text shown to the user.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Option kind.
    #[must_use]
    pub const fn kind(&self) -> OptionKind {
        self.kind
    }

    /// Declared choices, empty for text options.
    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// Returns `true` when a formatter is attached.
    #[must_use]
    pub fn has_formatter(&self) -> bool {
        self.formatter.is_some()
    }

    /// Converts a raw answer into the stored value.
    ///
    /// Without a formatter the raw answer is stored unchanged as a string.
    ///
    /// # Errors
    ///
    /// Propagates the formatter's failure.
    pub fn format(&self, raw: &str) -> ScriptResult<Value> {
        match &self.formatter {
            Some(formatter) => formatter.format(raw),
            None => Ok(Value::String(raw.to_owned())),
        }
    }

    fn validate(&self) -> DefinitionResult<()> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyKey {
                origin: ContextSource::LaunchOption,
            });
        }
        match (self.kind, self.choices.is_empty()) {
            (OptionKind::Choice, true) => Err(DefinitionError::MissingChoices {
                option: self.name.clone(),
            }),
            (OptionKind::Text, false) => Err(DefinitionError::UnexpectedChoices {
                option: self.name.clone(),
            }),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for LaunchOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchOption")
            .field("name", &self.name)
            .field("prompt", &self.prompt)
            .field("kind", &self.kind)
            .field("choices", &self.choices)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

/// A named, immutable environment definition.
pub struct EnvironmentDefinition {
    name: String,
    modules: BTreeMap<String, CapabilityKey>,
    context: BTreeMap<String, ContextValue>,
    launch_options: Vec<LaunchOption>,
    on_load: Vec<Arc<dyn Script>>,
    on_exit: Vec<Arc<dyn Script>>,
}

impl EnvironmentDefinition {
    /// Starts building a definition named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> EnvironmentDefinitionBuilder {
        EnvironmentDefinitionBuilder {
            name: name.into(),
            modules: Vec::new(),
            context: Vec::new(),
            launch_options: Vec::new(),
            on_load: Vec::new(),
            on_exit: Vec::new(),
        }
    }

    /// Environment name, unique within a registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module aliases mapped to capability keys.
    #[must_use]
    pub fn modules(&self) -> &BTreeMap<String, CapabilityKey> {
        &self.modules
    }

    /// Static context entries.
    #[must_use]
    pub fn context(&self) -> &BTreeMap<String, ContextValue> {
        &self.context
    }

    /// Launch options in declaration order.
    #[must_use]
    pub fn launch_options(&self) -> &[LaunchOption] {
        &self.launch_options
    }

    /// On-load scripts in declaration order.
    #[must_use]
    pub fn on_load(&self) -> &[Arc<dyn Script>] {
        &self.on_load
    }

    /// On-exit scripts in declaration order.
    #[must_use]
    pub fn on_exit(&self) -> &[Arc<dyn Script>] {
        &self.on_exit
    }

    /// Checks the definition's shape before any session is started.
    ///
    /// # Errors
    ///
    /// Returns the first problem found: an empty name or key, a malformed or
    /// duplicated launch option, or a context key claimed by more than one of
    /// static context, modules, and launch options.
    pub fn validate(&self) -> DefinitionResult<()> {
        if self.name.trim().is_empty() {
            return Err(DefinitionError::EmptyName);
        }

        let mut claimed: BTreeMap<&str, ContextSource> = BTreeMap::new();
        let statics = self
            .context
            .keys()
            .map(|key| (key.as_str(), ContextSource::Static));
        let modules = self
            .modules
            .keys()
            .map(|alias| (alias.as_str(), ContextSource::Module));

        for (key, origin) in statics.chain(modules) {
            if key.trim().is_empty() {
                return Err(DefinitionError::EmptyKey { origin });
            }
            claim(&mut claimed, key, origin)?;
        }

        let mut option_names = BTreeSet::new();
        for option in &self.launch_options {
            option.validate()?;
            if !option_names.insert(option.name()) {
                return Err(DefinitionError::DuplicateOptionName {
                    name: option.name().to_owned(),
                });
            }
            claim(&mut claimed, option.name(), ContextSource::LaunchOption)?;
        }

        Ok(())
    }
}

fn claim<'a>(
    claimed: &mut BTreeMap<&'a str, ContextSource>,
    key: &'a str,
    incoming: ContextSource,
) -> DefinitionResult<()> {
    match claimed.entry(key) {
        Entry::Occupied(entry) => Err(DefinitionError::ContextKeyConflict {
            key: key.to_owned(),
            existing: *entry.get(),
            incoming,
        }),
        Entry::Vacant(entry) => {
            entry.insert(incoming);
            Ok(())
        }
    }
}

impl fmt::Debug for EnvironmentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentDefinition")
            .field("name", &self.name)
            .field("modules", &self.modules)
            .field("context", &self.context)
            .field("launch_options", &self.launch_options)
            .field("on_load", &self.on_load.len())
            .field("on_exit", &self.on_exit.len())
            .finish()
    }
}

/// Builder for [`EnvironmentDefinition`].
pub struct EnvironmentDefinitionBuilder {
    name: String,
    modules: Vec<(String, CapabilityKey)>,
    context: Vec<(String, ContextValue)>,
    launch_options: Vec<LaunchOption>,
    on_load: Vec<Arc<dyn Script>>,
    on_exit: Vec<Arc<dyn Script>>,
}

impl EnvironmentDefinitionBuilder {
    /// Injects the capability `key` under `alias`.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::InvalidKey`] when `key` is not a valid
    /// capability key.
    pub fn module(mut self, alias: impl Into<String>, key: &str) -> DefinitionResult<Self> {
        self.modules.push((alias.into(), CapabilityKey::new(key)?));
        Ok(self)
    }

    /// Adds a static data entry.
    #[must_use]
    pub fn value(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entry(key, ContextValue::data(value))
    }

    /// Adds a static function entry.
    #[must_use]
    pub fn function<F>(self, key: impl Into<String>, function: F) -> Self
    where
        F: Fn(Option<Value>) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        self.entry(key, ContextValue::function(function))
    }

    /// Adds a static entry of any kind.
    #[must_use]
    pub fn entry(mut self, key: impl Into<String>, value: ContextValue) -> Self {
        self.context.push((key.into(), value));
        self
    }

    /// Appends a launch option.
    #[must_use]
    pub fn launch_option(mut self, option: LaunchOption) -> Self {
        self.launch_options.push(option);
        self
    }

    /// Appends an on-load script.
    #[must_use]
    pub fn on_load(self, script: impl Script + 'static) -> Self {
        self.on_load_shared(Arc::new(script))
    }

    /// Appends a shared on-load script.
    #[must_use]
    pub fn on_load_shared(mut self, script: Arc<dyn Script>) -> Self {
        self.on_load.push(script);
        self
    }

    /// Appends an on-exit script.
    #[must_use]
    pub fn on_exit(self, script: impl Script + 'static) -> Self {
        self.on_exit_shared(Arc::new(script))
    }

    /// Appends a shared on-exit script.
    #[must_use]
    pub fn on_exit_shared(mut self, script: Arc<dyn Script>) -> Self {
        self.on_exit.push(script);
        self
    }

    /// Finalises and validates the definition.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::ContextKeyConflict`] when a static key or
    /// module alias is declared twice, or any error from
    /// [`EnvironmentDefinition::validate`].
    pub fn build(self) -> DefinitionResult<EnvironmentDefinition> {
        let context = collect_unique(self.context, ContextSource::Static)?;
        let modules = collect_unique(self.modules, ContextSource::Module)?;

        let definition = EnvironmentDefinition {
            name: self.name,
            modules,
            context,
            launch_options: self.launch_options,
            on_load: self.on_load,
            on_exit: self.on_exit,
        };
        definition.validate()?;
        Ok(definition)
    }
}

fn collect_unique<V>(
    entries: Vec<(String, V)>,
    origin: ContextSource,
) -> DefinitionResult<BTreeMap<String, V>> {
    let mut map = BTreeMap::new();
    for (key, value) in entries {
        if map.contains_key(&key) {
            return Err(DefinitionError::ContextKeyConflict {
                key,
                existing: origin,
                incoming: origin,
            });
        }
        map.insert(key, value);
    }
    Ok(map)
}
