//! Host capabilities that environments inject into their context.
//!
//! Environment definitions name capabilities by key in their `modules` map.
//! The [`registry::CapabilityRegistry`] maps those keys to providers, and
//! [`process`] holds the built-in process capability.

#![warn(missing_docs, clippy::pedantic)]

pub mod process;
pub mod registry;

pub use process::ProcessCapability;
pub use registry::{CapabilityError, CapabilityProvider, CapabilityRegistry, CapabilityResult};
