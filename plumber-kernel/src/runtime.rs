//! Starts environment sessions.

use std::sync::Arc;

use plumber_capabilities::CapabilityRegistry;
use plumber_config::{EnvironmentDefinition, EnvironmentRegistry};
use plumber_primitives::SessionId;
use plumber_prompts::{
    LaunchOptionSequencer, LaunchValues, PromptAdapter, PromptError, SequencerConfig,
};
use tracing::{info, warn};

use crate::context_builder::ContextBuilder;
use crate::error::{SessionError, SessionResult, Stage};
use crate::resolver::{ResolvedModule, resolve_modules};
use crate::scripts::{ExitScriptFailure, LifecycleScriptRunner, RunnerConfig};
use crate::session::Session;
use crate::termination::{TerminationHook, TerminationLatch};

/// Runtime configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    runner: RunnerConfig,
    sequencer: SequencerConfig,
}

impl RuntimeConfig {
    /// Creates a configuration from its parts.
    #[must_use]
    pub const fn new(runner: RunnerConfig, sequencer: SequencerConfig) -> Self {
        Self { runner, sequencer }
    }

    /// Script runner configuration.
    #[must_use]
    pub const fn runner(self) -> RunnerConfig {
        self.runner
    }

    /// Launch-option sequencer configuration.
    #[must_use]
    pub const fn sequencer(self) -> SequencerConfig {
        self.sequencer
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when the exit timeout is zero or
    /// a re-prompt policy allows zero attempts.
    pub fn validate(self) -> SessionResult<()> {
        self.runner.validate()?;
        self.sequencer.validate().map_err(|err| match err {
            PromptError::InvalidConfig(reason) => SessionError::InvalidConfig(reason),
            _ => SessionError::InvalidConfig("invalid sequencer configuration"),
        })
    }
}

/// Turns environment definitions into ready-to-run [`Session`]s.
pub struct EnvironmentRuntime {
    capabilities: Arc<CapabilityRegistry>,
    sequencer: LaunchOptionSequencer,
    termination: Arc<dyn TerminationHook>,
    runner: LifecycleScriptRunner,
}

impl std::fmt::Debug for EnvironmentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentRuntime")
            .field("capabilities", &self.capabilities)
            .field("sequencer", &self.sequencer)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl EnvironmentRuntime {
    /// Creates a runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when `config` fails validation.
    pub fn new(
        capabilities: Arc<CapabilityRegistry>,
        prompts: Arc<dyn PromptAdapter>,
        termination: Arc<dyn TerminationHook>,
        config: RuntimeConfig,
    ) -> SessionResult<Self> {
        config.validate()?;
        Ok(Self {
            capabilities,
            sequencer: LaunchOptionSequencer::with_config(prompts, config.sequencer()),
            termination,
            runner: LifecycleScriptRunner::new(config.runner()),
        })
    }

    /// Capability registry used for module resolution.
    #[must_use]
    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    /// Validates `definition`, resolves its modules, prompts for its launch
    /// options, and assembles the session context.
    ///
    /// Nothing is shown to the user when validation or module resolution
    /// fails. The termination hook is latched once validation passes and
    /// stays armed in the returned session.
    ///
    /// When the hook fires while prompting, the on-exit scripts run against a
    /// context holding the static entries and modules only, and their
    /// failures are returned in [`SessionError::Aborted`]. Other failures run
    /// no script.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidDefinition`],
    /// [`SessionError::UnknownCapability`], [`SessionError::Capability`],
    /// [`SessionError::Prompt`], [`SessionError::ContextKeyConflict`], or
    /// [`SessionError::Aborted`] when the termination hook fires while
    /// prompting.
    pub async fn start(&self, definition: Arc<EnvironmentDefinition>) -> SessionResult<Session> {
        let environment = definition.name().to_owned();
        definition
            .validate()
            .map_err(|source| SessionError::InvalidDefinition {
                environment: environment.clone(),
                source,
            })?;

        let session_id = SessionId::random();
        info!(%environment, %session_id, "starting environment");
        let latch = TerminationLatch::arm(Arc::clone(&self.termination));

        let modules = resolve_modules(&environment, definition.modules(), &self.capabilities)?;

        let collected = tokio::select! {
            biased;
            () = latch.tripped() => None,
            result = self.sequencer.collect(definition.launch_options()) => Some(result),
        };
        let Some(result) = collected else {
            warn!(%environment, %session_id, "termination requested while prompting");
            let exit_failures = self
                .exit_without_launch_values(&definition, session_id, modules)
                .await;
            return Err(SessionError::Aborted {
                environment,
                stage: Stage::Prompting,
                exit_failures,
            });
        };
        let values = result.map_err(|source| SessionError::Prompt {
            environment: environment.clone(),
            source,
        })?;

        let context = ContextBuilder::new(&definition, session_id)
            .with_modules(modules)
            .build(values)?;

        Ok(Session::new(definition, context, self.runner, latch))
    }

    async fn exit_without_launch_values(
        &self,
        definition: &EnvironmentDefinition,
        session_id: SessionId,
        modules: Vec<ResolvedModule>,
    ) -> Vec<ExitScriptFailure> {
        match ContextBuilder::new(definition, session_id)
            .with_modules(modules)
            .build(LaunchValues::default())
        {
            Ok(mut context) => {
                self.runner
                    .run_on_exit(definition.name(), definition.on_exit(), &mut context)
                    .await
            }
            Err(err) => {
                warn!(%err, "could not assemble a context, exit scripts skipped");
                Vec::new()
            }
        }
    }

    /// Looks up `name` in `registry` and starts it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Registry`] for unknown names, or any error from
    /// [`EnvironmentRuntime::start`].
    pub async fn launch(&self, registry: &EnvironmentRegistry, name: &str) -> SessionResult<Session> {
        let definition = registry.get(name)?;
        self.start(definition).await
    }
}
