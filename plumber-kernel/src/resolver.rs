//! Resolves an environment's `modules` map against the capability registry.

use std::collections::BTreeMap;

use plumber_capabilities::{CapabilityError, CapabilityRegistry};
use plumber_primitives::{CapabilityHandle, CapabilityKey};
use tracing::debug;

use crate::error::{SessionError, SessionResult};

/// A capability handle ready to be injected under `alias`.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    /// Context key the capability is injected under.
    pub alias: String,
    /// Resolved capability.
    pub handle: CapabilityHandle,
}

/// Resolves every module of `environment`, in alias order.
///
/// # Errors
///
/// Returns [`SessionError::UnknownCapability`] for keys with no provider and
/// [`SessionError::Capability`] when a provider fails.
pub fn resolve_modules(
    environment: &str,
    modules: &BTreeMap<String, CapabilityKey>,
    registry: &CapabilityRegistry,
) -> SessionResult<Vec<ResolvedModule>> {
    modules
        .iter()
        .map(|(alias, key)| {
            let handle = registry.resolve(key).map_err(|source| match source {
                CapabilityError::UnknownCapability { key } => SessionError::UnknownCapability {
                    environment: environment.to_owned(),
                    alias: alias.clone(),
                    key,
                },
                source => SessionError::Capability {
                    environment: environment.to_owned(),
                    alias: alias.clone(),
                    source,
                },
            })?;
            debug!(environment, %alias, %key, "resolved module");
            Ok(ResolvedModule {
                alias: alias.clone(),
                handle,
            })
        })
        .collect()
}
