//! Plumber: load named environments, prompt for launch options, inject host
//! capabilities, and run lifecycle scripts with guaranteed cleanup.
//!
//! This crate bundles the runtime crates behind feature flags so hosts can
//! pull in only what they need.

#![warn(missing_docs, clippy::pedantic)]

/// Shared primitives: context, scripts, capability handles.
pub use plumber_primitives as primitives;

/// Session runtime (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use plumber_kernel as kernel;

/// Capability registry and built-in capabilities (enabled by `capabilities` feature).
#[cfg(feature = "capabilities")]
pub use plumber_capabilities as capabilities;

/// Environment definitions, file format, and registry (enabled by `config` feature).
#[cfg(feature = "config")]
pub use plumber_config as config;

/// Launch-option prompting (enabled by `prompts` feature).
#[cfg(feature = "prompts")]
pub use plumber_prompts as prompts;

/// Logging setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use plumber_telemetry as telemetry;
