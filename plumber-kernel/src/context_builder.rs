//! Assembles a session [`Context`] from its three load-time sources.

use plumber_config::EnvironmentDefinition;
use plumber_primitives::{Context, ContextSource, ContextValue, SessionId};
use plumber_prompts::LaunchValues;

use crate::error::{SessionError, SessionResult};
use crate::resolver::ResolvedModule;

/// Builds the context for one session.
///
/// Entries are inserted as static context first, then resolved modules, then
/// launch-option answers. A key populated twice is an error; nothing is ever
/// overwritten.
#[derive(Debug)]
pub struct ContextBuilder<'a> {
    definition: &'a EnvironmentDefinition,
    session_id: SessionId,
    modules: Vec<ResolvedModule>,
}

impl<'a> ContextBuilder<'a> {
    /// Starts a builder for `definition`.
    #[must_use]
    pub fn new(definition: &'a EnvironmentDefinition, session_id: SessionId) -> Self {
        Self {
            definition,
            session_id,
            modules: Vec::new(),
        }
    }

    /// Supplies the modules resolved for this session.
    #[must_use]
    pub fn with_modules(mut self, modules: Vec<ResolvedModule>) -> Self {
        self.modules = modules;
        self
    }

    /// Builds the context.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ContextKeyConflict`] when two sources claim the
    /// same key.
    pub fn build(self, launch_values: LaunchValues) -> SessionResult<Context> {
        let environment = self.definition.name();
        let mut context = Context::new(environment, self.session_id);
        let mut insert = |key: String, value: ContextValue, source: ContextSource| {
            context
                .insert(key, value, source)
                .map_err(|err| match err {
                    plumber_primitives::Error::ContextKeyConflict {
                        key,
                        existing,
                        incoming,
                    } => SessionError::ContextKeyConflict {
                        environment: environment.to_owned(),
                        key,
                        existing,
                        incoming,
                    },
                    source => SessionError::Context {
                        environment: environment.to_owned(),
                        source,
                    },
                })
        };

        for (key, value) in self.definition.context() {
            insert(key.clone(), value.clone(), ContextSource::Static)?;
        }
        for module in self.modules {
            insert(
                module.alias,
                ContextValue::Capability(module.handle),
                ContextSource::Module,
            )?;
        }
        for (name, value) in launch_values {
            insert(name, ContextValue::Data(value), ContextSource::LaunchOption)?;
        }

        Ok(context)
    }
}
