//! Built-in `process` capability.

use std::any::Any;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use plumber_primitives::{Capability, CapabilityKey};
use tracing::info;

const PROCESS_KEY: &str = "process";

/// Access to the host process: identity, arguments, environment variables,
/// working directory, and a requested exit code the host honours once the
/// session has ended.
#[derive(Debug)]
pub struct ProcessCapability {
    key: CapabilityKey,
    exit_code: Mutex<Option<i32>>,
}

impl ProcessCapability {
    /// Creates a handle onto the current process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: Self::capability_key(),
            exit_code: Mutex::new(None),
        }
    }

    /// Registry key the capability is published under.
    #[must_use]
    pub fn capability_key() -> CapabilityKey {
        CapabilityKey::new(PROCESS_KEY).expect("static capability key is valid")
    }

    /// Operating system process identifier.
    #[must_use]
    pub fn id(&self) -> u32 {
        std::process::id()
    }

    /// Command-line arguments the host was started with.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        std::env::args().collect()
    }

    /// Reads an environment variable; `None` when unset or not valid unicode.
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    /// Current working directory.
    ///
    /// # Errors
    ///
    /// Propagates the I/O error when the directory cannot be determined.
    pub fn current_dir(&self) -> std::io::Result<PathBuf> {
        std::env::current_dir()
    }

    /// Name of the operating system (`linux`, `macos`, `windows`, ...).
    #[must_use]
    pub fn platform(&self) -> &'static str {
        std::env::consts::OS
    }

    /// Asks the host to exit with `code` after the session ends.
    pub fn request_exit(&self, code: i32) {
        info!(code, "exit requested through process capability");
        *self.exit_code.lock().unwrap_or_else(PoisonError::into_inner) = Some(code);
    }

    /// Exit code requested by a script, if any.
    #[must_use]
    pub fn requested_exit_code(&self) -> Option<i32> {
        *self.exit_code.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ProcessCapability {
    fn default() -> Self {
        Self::new()
    }
}

impl Capability for ProcessCapability {
    fn key(&self) -> &CapabilityKey {
        &self.key
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
