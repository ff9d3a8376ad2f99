//! Runtime registry mapping capability keys to providers.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use plumber_primitives::{Capability, CapabilityHandle, CapabilityKey};
use thiserror::Error;
use tracing::debug;

use crate::process::ProcessCapability;

/// Result alias for capability operations.
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Produces capability handles on demand.
///
/// The registry calls [`CapabilityProvider::provide`] once per resolution, so
/// providers that build a fresh handle keep sessions isolated from each other.
pub trait CapabilityProvider: Send + Sync {
    /// Creates (or hands out) the capability registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::Provider`] when the capability cannot be
    /// constructed.
    fn provide(&self, key: &CapabilityKey) -> CapabilityResult<CapabilityHandle>;
}

impl<F> CapabilityProvider for F
where
    F: Fn(&CapabilityKey) -> CapabilityResult<CapabilityHandle> + Send + Sync,
{
    fn provide(&self, key: &CapabilityKey) -> CapabilityResult<CapabilityHandle> {
        (self)(key)
    }
}

struct SharedInstance(CapabilityHandle);

impl CapabilityProvider for SharedInstance {
    fn provide(&self, _key: &CapabilityKey) -> CapabilityResult<CapabilityHandle> {
        Ok(Arc::clone(&self.0))
    }
}

/// Registry that stores capability providers keyed by capability key.
#[derive(Default)]
pub struct CapabilityRegistry {
    inner: RwLock<BTreeMap<CapabilityKey, Arc<dyn CapabilityProvider>>>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("registered", &self.keys())
            .finish()
    }
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in capabilities registered.
    ///
    /// Currently this is `process`, see [`ProcessCapability`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry
            .inner
            .write()
            .expect("capability registry poisoned")
            .insert(
                ProcessCapability::capability_key(),
                Arc::new(|_key: &CapabilityKey| -> CapabilityResult<CapabilityHandle> {
                    Ok(Arc::new(ProcessCapability::new()))
                }),
            );
        registry
    }

    /// Registers a provider under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::DuplicateCapability`] if the key is already
    /// present.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    pub fn register_provider<P>(&self, key: CapabilityKey, provider: P) -> CapabilityResult<()>
    where
        P: CapabilityProvider + 'static,
    {
        let mut inner = self.inner.write().expect("capability registry poisoned");
        if inner.contains_key(&key) {
            return Err(CapabilityError::DuplicateCapability { key });
        }
        debug!(%key, "registered capability provider");
        inner.insert(key, Arc::new(provider));
        Ok(())
    }

    /// Registers a single instance shared by every resolution of its key.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::DuplicateCapability`] if the key is already
    /// present.
    pub fn register_instance(&self, handle: CapabilityHandle) -> CapabilityResult<()> {
        let key = handle.key().clone();
        self.register_provider(key, SharedInstance(handle))
    }

    /// Resolves `key` to a capability handle.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::UnknownCapability`] when no provider is
    /// registered, or propagates the provider's failure.
    pub fn resolve(&self, key: &CapabilityKey) -> CapabilityResult<CapabilityHandle> {
        let provider = self
            .inner
            .read()
            .ok()
            .and_then(|inner| inner.get(key).cloned())
            .ok_or_else(|| CapabilityError::UnknownCapability { key: key.clone() })?;
        provider.provide(key)
    }

    /// Returns `true` if a provider is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.inner
            .read()
            .map(|inner| inner.contains_key(key))
            .unwrap_or(false)
    }

    /// Lists the registered keys in sorted order.
    ///
    /// # Panics
    ///
    /// Panics if the internal registry lock is poisoned.
    #[must_use]
    pub fn keys(&self) -> Vec<CapabilityKey> {
        let inner = self.inner.read().expect("capability registry poisoned");
        inner.keys().cloned().collect()
    }
}

/// Errors produced by capability registration and resolution.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Requested capability has no registered provider.
    #[error("capability `{key}` is not registered")]
    UnknownCapability {
        /// Key that failed to resolve.
        key: CapabilityKey,
    },

    /// Capability key collided with an existing registration.
    #[error("capability `{key}` is already registered")]
    DuplicateCapability {
        /// Key of the offending registration.
        key: CapabilityKey,
    },

    /// Provider failed to produce the capability.
    #[error("capability `{key}` could not be provided: {reason}")]
    Provider {
        /// Key being resolved.
        key: CapabilityKey,
        /// Human-readable error returned by the provider.
        reason: String,
    },
}

impl CapabilityError {
    /// Creates a provider failure for `key`.
    #[must_use]
    pub fn provider(key: &CapabilityKey, reason: impl Into<String>) -> Self {
        Self::Provider {
            key: key.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;

    #[derive(Debug)]
    struct Greeter {
        key: CapabilityKey,
    }

    impl Capability for Greeter {
        fn key(&self) -> &CapabilityKey {
            &self.key
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn key(raw: &str) -> CapabilityKey {
        CapabilityKey::new(raw).unwrap()
    }

    #[test]
    fn defaults_provide_process() {
        let registry = CapabilityRegistry::with_defaults();
        let handle = registry.resolve(&key("process")).unwrap();
        assert!(handle.as_any().downcast_ref::<ProcessCapability>().is_some());
        assert_eq!(registry.keys(), vec![key("process")]);
    }

    #[test]
    fn providers_build_fresh_handles() {
        let registry = CapabilityRegistry::new();
        registry
            .register_provider(
                key("greeter"),
                |k: &CapabilityKey| -> CapabilityResult<CapabilityHandle> {
                    Ok(Arc::new(Greeter { key: k.clone() }))
                },
            )
            .unwrap();

        let first = registry.resolve(&key("greeter")).unwrap();
        let second = registry.resolve(&key("greeter")).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn instances_are_shared() {
        let registry = CapabilityRegistry::new();
        let handle: CapabilityHandle = Arc::new(Greeter { key: key("greeter") });
        registry.register_instance(Arc::clone(&handle)).unwrap();

        let resolved = registry.resolve(&key("greeter")).unwrap();
        assert!(Arc::ptr_eq(&handle, &resolved));
    }

    #[test]
    fn duplicate_registration_errors() {
        let registry = CapabilityRegistry::with_defaults();
        let err = registry
            .register_instance(Arc::new(ProcessCapability::new()))
            .expect_err("duplicate");
        assert!(matches!(err, CapabilityError::DuplicateCapability { key } if key.as_str() == "process"));
    }

    #[test]
    fn unknown_capability_errors() {
        let registry = CapabilityRegistry::new();
        let err = registry.resolve(&key("missing")).expect_err("unknown");
        assert!(matches!(err, CapabilityError::UnknownCapability { key } if key.as_str() == "missing"));
        assert!(!registry.contains(&key("missing")));
    }

    #[test]
    fn provider_failures_propagate() {
        let registry = CapabilityRegistry::new();
        registry
            .register_provider(
                key("broken"),
                |k: &CapabilityKey| -> CapabilityResult<CapabilityHandle> {
                    Err(CapabilityError::provider(k, "offline"))
                },
            )
            .unwrap();

        let err = registry.resolve(&key("broken")).expect_err("provider error");
        assert!(matches!(err, CapabilityError::Provider { reason, .. } if reason == "offline"));
    }
}
