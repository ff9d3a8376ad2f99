//! Named executable fragments that definition files bind at load time.
//!
//! Definition files cannot carry code, so formatters, lifecycle scripts, and
//! context functions are referenced by name and looked up here.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::sync::Arc;

use plumber_primitives::{ContextFunction, Formatter, Script, ScriptError, ScriptResult};
use serde_json::{Number, Value};
use tracing::info;

use crate::error::{DefinitionError, DefinitionResult};

/// Lookup table of formatters, scripts, and context functions.
#[derive(Default)]
pub struct ScriptCatalog {
    formatters: BTreeMap<String, Arc<dyn Formatter>>,
    scripts: BTreeMap<String, Arc<dyn Script>>,
    functions: BTreeMap<String, Arc<dyn ContextFunction>>,
}

impl ScriptCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the built-in fragments.
    ///
    /// Formatters: `yes-no`, `trim`, `lowercase`, `number`. Functions: `log`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.formatters.insert("yes-no".to_owned(), Arc::new(yes_no));
        catalog.formatters.insert("trim".to_owned(), Arc::new(trim));
        catalog.formatters.insert("lowercase".to_owned(), Arc::new(lowercase));
        catalog.formatters.insert("number".to_owned(), Arc::new(number));
        catalog.functions.insert("log".to_owned(), Arc::new(log));
        catalog
    }

    /// Adds a formatter under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::DuplicateCatalogEntry`] when the name is taken.
    pub fn register_formatter<F>(
        &mut self,
        name: impl Into<String>,
        formatter: F,
    ) -> DefinitionResult<()>
    where
        F: Fn(&str) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        let formatter: Arc<dyn Formatter> = Arc::new(formatter);
        insert_unique(&mut self.formatters, "formatter", name.into(), formatter)
    }

    /// Adds a lifecycle script under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::DuplicateCatalogEntry`] when the name is taken.
    pub fn register_script(
        &mut self,
        name: impl Into<String>,
        script: impl Script + 'static,
    ) -> DefinitionResult<()> {
        let script: Arc<dyn Script> = Arc::new(script);
        insert_unique(&mut self.scripts, "script", name.into(), script)
    }

    /// Adds a context function under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::DuplicateCatalogEntry`] when the name is taken.
    pub fn register_function<F>(
        &mut self,
        name: impl Into<String>,
        function: F,
    ) -> DefinitionResult<()>
    where
        F: Fn(Option<Value>) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        let function: Arc<dyn ContextFunction> = Arc::new(function);
        insert_unique(&mut self.functions, "function", name.into(), function)
    }

    /// Looks up a formatter.
    #[must_use]
    pub fn formatter(&self, name: &str) -> Option<Arc<dyn Formatter>> {
        self.formatters.get(name).cloned()
    }

    /// Looks up a lifecycle script.
    #[must_use]
    pub fn script(&self, name: &str) -> Option<Arc<dyn Script>> {
        self.scripts.get(name).cloned()
    }

    /// Looks up a context function.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<Arc<dyn ContextFunction>> {
        self.functions.get(name).cloned()
    }
}

impl fmt::Debug for ScriptCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptCatalog")
            .field("formatters", &self.formatters.keys().collect::<Vec<_>>())
            .field("scripts", &self.scripts.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn insert_unique<T: ?Sized>(
    map: &mut BTreeMap<String, Arc<T>>,
    kind: &'static str,
    name: String,
    value: Arc<T>,
) -> DefinitionResult<()> {
    match map.entry(name) {
        Entry::Occupied(entry) => Err(DefinitionError::DuplicateCatalogEntry {
            kind,
            name: entry.key().clone(),
        }),
        Entry::Vacant(entry) => {
            entry.insert(value);
            Ok(())
        }
    }
}

fn yes_no(raw: &str) -> ScriptResult<Value> {
    Ok(Value::Bool(raw == "yes"))
}

fn trim(raw: &str) -> ScriptResult<Value> {
    Ok(Value::from(raw.trim()))
}

fn lowercase(raw: &str) -> ScriptResult<Value> {
    Ok(Value::from(raw.to_lowercase()))
}

fn number(raw: &str) -> ScriptResult<Value> {
    let raw = raw.trim();
    if let Ok(int) = raw.parse::<i64>() {
        return Ok(Value::from(int));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ScriptError::failed(format!("`{raw}` is not a number")))
}

fn log(arg: Option<Value>) -> ScriptResult<Value> {
    match arg {
        Some(Value::String(message)) => info!(target: "plumber::script", "{message}"),
        Some(value) => info!(target: "plumber::script", "{value}"),
        None => info!(target: "plumber::script", ""),
    }
    Ok(Value::Null)
}
