//! The mutable state shared by every script of one environment session.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::{Capability, CapabilityHandle};
use crate::error::{Error, Result};
use crate::ids::SessionId;
use crate::script::{ContextFunction, ScriptError, ScriptResult};

/// Origin of a context entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSource {
    /// Declared in the environment's static `context` map.
    Static,
    /// Injected capability bound under a module alias.
    Module,
    /// Answer collected from a launch option.
    LaunchOption,
    /// Written by a script while the session was running.
    Script,
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static context",
            Self::Module => "module",
            Self::LaunchOption => "launch option",
            Self::Script => "script",
        })
    }
}

/// A value stored in the context.
#[derive(Clone)]
pub enum ContextValue {
    /// Plain data.
    Data(Value),
    /// Callable entry, invoked through [`Context::call`].
    Function(Arc<dyn ContextFunction>),
    /// Host capability injected by the module resolver.
    Capability(CapabilityHandle),
}

impl ContextValue {
    /// Wraps plain data.
    #[must_use]
    pub fn data(value: impl Into<Value>) -> Self {
        Self::Data(value.into())
    }

    /// Wraps a closure as a callable entry.
    #[must_use]
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Option<Value>) -> ScriptResult<Value> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// Short description of the value kind, used in diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Function(_) => "a function",
            Self::Capability(_) => "a capability",
        }
    }

    /// Returns the data payload, if any.
    #[must_use]
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Capability(handle) => f.debug_tuple("Capability").field(handle.key()).finish(),
        }
    }
}

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

#[derive(Debug)]
struct Entry {
    value: ContextValue,
    source: ContextSource,
}

/// Mutable key/value state owned by exactly one session.
///
/// Load-time sources go through [`Context::insert`], which refuses to
/// overwrite an existing key. Scripts use [`Context::set`] afterwards and may
/// replace data freely.
pub struct Context {
    environment: String,
    session_id: SessionId,
    entries: BTreeMap<String, Entry>,
}

impl Context {
    /// Creates an empty context for the given environment session.
    #[must_use]
    pub fn new(environment: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            environment: environment.into(),
            session_id,
            entries: BTreeMap::new(),
        }
    }

    /// Name of the environment this context belongs to.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Identifier of the owning session.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Inserts a load-time entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] for an empty key and
    /// [`Error::ContextKeyConflict`] when the key is already populated.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
        source: ContextSource,
    ) -> Result<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(Error::InvalidKey {
                key,
                reason: "context key cannot be empty".into(),
            });
        }
        if let Some(existing) = self.entries.get(&key) {
            return Err(Error::ContextKeyConflict {
                key,
                existing: existing.source,
                incoming: source,
            });
        }
        self.entries.insert(
            key,
            Entry {
                value: value.into(),
                source,
            },
        );
        Ok(())
    }

    /// Writes data from a script, returning the previous value if any.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<ContextValue> {
        self.entries
            .insert(
                key.into(),
                Entry {
                    value: ContextValue::Data(value.into()),
                    source: ContextSource::Script,
                },
            )
            .map(|entry| entry.value)
    }

    /// Removes an entry, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Returns the entry stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Returns the source that populated `key`.
    #[must_use]
    pub fn source_of(&self, key: &str) -> Option<ContextSource> {
        self.entries.get(key).map(|entry| entry.source)
    }

    /// Returns the data stored under `key`, if the entry holds data.
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(ContextValue::as_data)
    }

    /// Returns the data stored under `key` or a script error.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::MissingKey`] or [`ScriptError::TypeMismatch`].
    pub fn require(&self, key: &str) -> ScriptResult<&Value> {
        match self.get(key) {
            Some(ContextValue::Data(value)) => Ok(value),
            Some(_) => Err(ScriptError::TypeMismatch {
                key: key.to_owned(),
                expected: "data",
            }),
            None => Err(ScriptError::MissingKey {
                key: key.to_owned(),
            }),
        }
    }

    /// Invokes the function stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::MissingKey`] or [`ScriptError::TypeMismatch`]
    /// when no function is stored there, otherwise whatever the function
    /// returns.
    pub fn call(&self, key: &str, arg: Option<Value>) -> ScriptResult<Value> {
        match self.get(key) {
            Some(ContextValue::Function(function)) => function.call(arg),
            Some(_) => Err(ScriptError::TypeMismatch {
                key: key.to_owned(),
                expected: "a function",
            }),
            None => Err(ScriptError::MissingKey {
                key: key.to_owned(),
            }),
        }
    }

    /// Returns the capability bound under `key`, downcast to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::MissingKey`] when nothing is bound and
    /// [`ScriptError::TypeMismatch`] when the entry is not a `T` capability.
    pub fn capability<T: Capability>(&self, key: &str) -> ScriptResult<&T> {
        let mismatch = || ScriptError::TypeMismatch {
            key: key.to_owned(),
            expected: std::any::type_name::<T>(),
        };
        match self.get(key) {
            Some(ContextValue::Capability(handle)) => {
                handle.as_any().downcast_ref::<T>().ok_or_else(mismatch)
            }
            Some(_) => Err(mismatch()),
            None => Err(ScriptError::MissingKey {
                key: key.to_owned(),
            }),
        }
    }

    /// Returns `true` if `key` is populated.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates over the populated keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of populated keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no key is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("environment", &self.environment)
            .field("session_id", &self.session_id)
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::CapabilityKey;

    #[derive(Debug)]
    struct Clock {
        key: CapabilityKey,
    }

    impl Capability for Clock {
        fn key(&self) -> &CapabilityKey {
            &self.key
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn context() -> Context {
        Context::new("unit", SessionId::random())
    }

    #[test]
    fn insert_refuses_to_overwrite() {
        let mut ctx = context();
        ctx.insert("name", Value::from("a"), ContextSource::Static)
            .unwrap();

        let err = ctx
            .insert("name", Value::from("b"), ContextSource::LaunchOption)
            .expect_err("conflict");
        assert!(matches!(
            err,
            Error::ContextKeyConflict {
                ref key,
                existing: ContextSource::Static,
                incoming: ContextSource::LaunchOption,
            } if key == "name"
        ));
        assert_eq!(ctx.data("name"), Some(&Value::from("a")));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let mut ctx = context();
        let err = ctx
            .insert(" ", Value::Null, ContextSource::Static)
            .expect_err("empty");
        assert!(matches!(err, Error::InvalidKey { .. }));
    }

    #[test]
    fn scripts_may_overwrite_with_set() {
        let mut ctx = context();
        ctx.insert("count", Value::from(1), ContextSource::Static)
            .unwrap();
        let previous = ctx.set("count", 2);
        assert!(matches!(previous, Some(ContextValue::Data(ref v)) if v == &Value::from(1)));
        assert_eq!(ctx.source_of("count"), Some(ContextSource::Script));
        assert_eq!(ctx.require("count").unwrap(), &Value::from(2));
    }

    #[test]
    fn functions_are_callable() {
        let mut ctx = context();
        ctx.insert(
            "double",
            ContextValue::function(|arg| {
                let n = arg.and_then(|v| v.as_i64()).unwrap_or_default();
                Ok(Value::from(n * 2))
            }),
            ContextSource::Static,
        )
        .unwrap();

        assert_eq!(ctx.call("double", Some(Value::from(21))).unwrap(), 42);
        assert_eq!(ctx.call("double", None).unwrap(), 0);
        assert!(matches!(
            ctx.call("missing", None),
            Err(ScriptError::MissingKey { .. })
        ));
        assert!(matches!(
            ctx.require("double"),
            Err(ScriptError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn capabilities_downcast() {
        let mut ctx = context();
        let handle: CapabilityHandle = Arc::new(Clock {
            key: CapabilityKey::new("clock").unwrap(),
        });
        ctx.insert("c", ContextValue::Capability(handle), ContextSource::Module)
            .unwrap();

        let clock = ctx.capability::<Clock>("c").unwrap();
        assert_eq!(clock.key().as_str(), "clock");
        assert_eq!(ctx.source_of("c"), Some(ContextSource::Module));
        assert!(ctx.data("c").is_none());
    }

    #[test]
    fn keys_are_sorted() {
        let mut ctx = context();
        for key in ["b", "a", "c"] {
            ctx.insert(key, Value::Null, ContextSource::Static).unwrap();
        }
        assert_eq!(ctx.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(ctx.len(), 3);
    }
}
