//! Registry of named environment definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::catalog::ScriptCatalog;
use crate::definition::EnvironmentDefinition;
use crate::error::{DefinitionError, RegistryError, RegistryResult};
use crate::format::{DefinitionFormat, parse_definition};

/// Where a definition is loaded from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefinitionSource {
    /// A definition file; the format follows the extension.
    File(PathBuf),
    /// Definition text held in memory.
    Inline {
        /// Definition text.
        text: String,
        /// Format of `text`.
        format: DefinitionFormat,
    },
}

impl DefinitionSource {
    /// Source reading the file at `path`.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Inline JSON source.
    #[must_use]
    pub fn json(text: impl Into<String>) -> Self {
        Self::Inline {
            text: text.into(),
            format: DefinitionFormat::Json,
        }
    }

    /// Inline YAML source.
    #[must_use]
    pub fn yaml(text: impl Into<String>) -> Self {
        Self::Inline {
            text: text.into(),
            format: DefinitionFormat::Yaml,
        }
    }

    fn read(&self) -> Result<(String, DefinitionFormat, String), DefinitionError> {
        match self {
            Self::File(path) => {
                let format = DefinitionFormat::from_path(path)
                    .ok_or_else(|| DefinitionError::UnsupportedFormat { path: path.clone() })?;
                let text = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok((text, format, path.display().to_string()))
            }
            Self::Inline { text, format } => Ok((text.clone(), *format, "<inline>".to_owned())),
        }
    }
}

/// Stores environment definitions keyed by their unique name.
pub struct EnvironmentRegistry {
    catalog: ScriptCatalog,
    inner: RwLock<BTreeMap<String, Arc<EnvironmentDefinition>>>,
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::new(ScriptCatalog::with_builtins())
    }
}

impl std::fmt::Debug for EnvironmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentRegistry")
            .field("environments", &self.list())
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl EnvironmentRegistry {
    /// Creates an empty registry that binds file fragments against `catalog`.
    #[must_use]
    pub fn new(catalog: ScriptCatalog) -> Self {
        Self {
            catalog,
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Catalog used to bind named fragments in definition files.
    #[must_use]
    pub fn catalog(&self) -> &ScriptCatalog {
        &self.catalog
    }

    /// Loads, validates, and registers a definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Definition`] when the source cannot be read,
    /// parsed, bound, or validated, and
    /// [`RegistryError::DuplicateEnvironmentName`] when its name is taken.
    pub fn load(&self, source: &DefinitionSource) -> RegistryResult<Arc<EnvironmentDefinition>> {
        let (text, format, origin) = source.read()?;
        let definition = parse_definition(&text, format, &origin, &self.catalog)?;
        debug!(environment = definition.name(), %origin, "parsed environment definition");
        self.register(definition)
    }

    /// Validates and registers an already built definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Definition`] when validation fails and
    /// [`RegistryError::DuplicateEnvironmentName`] when the name is taken.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register(
        &self,
        definition: EnvironmentDefinition,
    ) -> RegistryResult<Arc<EnvironmentDefinition>> {
        definition.validate()?;

        let mut inner = self.inner.write().expect("environment registry poisoned");
        let name = definition.name().to_owned();
        if inner.contains_key(&name) {
            return Err(RegistryError::DuplicateEnvironmentName { name });
        }

        let definition = Arc::new(definition);
        inner.insert(name.clone(), Arc::clone(&definition));
        info!(environment = %name, "registered environment");
        Ok(definition)
    }

    /// Returns the definition registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EnvironmentNotFound`] for unknown names.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn get(&self, name: &str) -> RegistryResult<Arc<EnvironmentDefinition>> {
        let inner = self.inner.read().expect("environment registry poisoned");
        inner
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::EnvironmentNotFound {
                name: name.to_owned(),
            })
    }

    /// Names of all registered environments.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn list(&self) -> BTreeSet<String> {
        let inner = self.inner.read().expect("environment registry poisoned");
        inner.keys().cloned().collect()
    }
}
