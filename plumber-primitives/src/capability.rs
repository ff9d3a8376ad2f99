//! Host capability descriptors injected into environment contexts.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_KEY_LEN: usize = 64;

/// Key naming a capability in the host registry (for example `process`).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityKey(String);

impl CapabilityKey {
    /// Creates a new capability key after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if the supplied key is empty, too long, or
    /// contains unsupported characters.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self(key))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CapabilityKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CapabilityKey> for String {
    fn from(value: CapabilityKey) -> Self {
        value.0
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey {
            key: String::new(),
            reason: "capability key cannot be empty".into(),
        });
    }

    if key.len() > MAX_KEY_LEN {
        return Err(Error::InvalidKey {
            key: key.into(),
            reason: format!("capability key length must be <= {MAX_KEY_LEN}"),
        });
    }

    if !key
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(Error::InvalidKey {
            key: key.into(),
            reason: "capability key must contain lowercase alphanumeric, dash, underscore, or dot"
                .into(),
        });
    }

    Ok(())
}

/// A host-provided service that can be bound into a session context.
///
/// Implementations expose their concrete API through [`Capability::as_any`],
/// which [`crate::Context::capability`] uses for typed access.
pub trait Capability: Any + Send + Sync + fmt::Debug {
    /// Registry key this capability was resolved from.
    fn key(&self) -> &CapabilityKey;

    /// Returns `self` as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a resolved capability.
pub type CapabilityHandle = Arc<dyn Capability>;
