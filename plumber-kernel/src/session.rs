//! A running environment session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use plumber_config::EnvironmentDefinition;
use plumber_primitives::{Context, Script, ScriptError, SessionId, script_fn};
use plumber_telemetry::session_span;
use serde::Serialize;
use tracing::{Instrument, info, warn};

use crate::error::Stage;
use crate::lifecycle::{Lifecycle, SessionEvent, SessionState};
use crate::scripts::{ExitScriptFailure, LifecycleScriptRunner, run_guarded};
use crate::termination::TerminationLatch;

/// How the load and interaction phases ended.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SessionOutcome {
    /// On-load and host interaction both succeeded.
    Completed,
    /// An on-load script failed; later on-load scripts were skipped.
    LoadFailed {
        /// Zero-based position of the failing script.
        index: usize,
        /// Script failure.
        error: ScriptError,
    },
    /// Host interaction failed.
    HostFailed {
        /// Host failure.
        error: ScriptError,
    },
    /// The termination hook fired, or [`Session::abort`] was called.
    Aborted {
        /// Stage that was interrupted.
        stage: Stage,
    },
}

impl SessionOutcome {
    /// Returns `true` for [`SessionOutcome::Completed`].
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Summary returned once a session has finished.
#[derive(Debug, Serialize)]
pub struct SessionReport {
    /// Session identifier.
    pub session_id: SessionId,
    /// Environment name.
    pub environment: String,
    /// How load and interaction ended.
    pub outcome: SessionOutcome,
    /// On-exit scripts that failed, in order.
    pub exit_failures: Vec<ExitScriptFailure>,
    /// Final lifecycle state.
    pub state: SessionState,
    /// Wall-clock start time.
    pub started_at: DateTime<Utc>,
    /// Time spent in [`Session::run_with`].
    pub elapsed: Duration,
}

impl SessionReport {
    /// Returns `true` when the session completed and every exit script
    /// succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcome.is_completed() && self.exit_failures.is_empty()
    }
}

/// An environment session with its context fully assembled.
///
/// Created by [`EnvironmentRuntime::start`](crate::EnvironmentRuntime::start),
/// which hands over the termination latch it armed before prompting. Exit
/// scripts run through [`Session::run`], [`Session::run_with`] or
/// [`Session::abort`]. A session dropped without any of them skips its exit
/// scripts and logs a warning.
pub struct Session {
    definition: Arc<EnvironmentDefinition>,
    context: Context,
    lifecycle: Lifecycle,
    runner: LifecycleScriptRunner,
    termination: TerminationLatch,
    started_at: DateTime<Utc>,
    ran: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("environment", &self.definition.name())
            .field("state", &self.state())
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        definition: Arc<EnvironmentDefinition>,
        context: Context,
        runner: LifecycleScriptRunner,
        termination: TerminationLatch,
    ) -> Self {
        Self {
            lifecycle: Lifecycle::new(context.session_id()),
            definition,
            context,
            runner,
            termination,
            started_at: Utc::now(),
            ran: false,
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.context.session_id()
    }

    /// Environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        self.definition.name()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    /// The assembled context.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Runs on-load scripts, then on-exit scripts, with no host interaction.
    pub async fn run(self) -> SessionReport {
        self.run_with(&script_fn(|_ctx: &mut Context| Ok(()))).await
    }

    /// Runs on-load scripts, then `host`, then on-exit scripts.
    ///
    /// On-exit scripts run however the first two phases end: success, a
    /// failure, a panic, or the termination hook firing. A termination
    /// request latched before this call skips on-load and the host.
    pub async fn run_with(mut self, host: &dyn Script) -> SessionReport {
        let span = session_span(self.environment(), self.id());
        self.ran = true;
        self.drive(Some(host)).instrument(span).await
    }

    /// Runs the on-exit scripts without on-load or host interaction.
    ///
    /// The report's outcome is [`SessionOutcome::Aborted`] at
    /// [`Stage::OnLoad`].
    pub async fn abort(mut self) -> SessionReport {
        let span = session_span(self.environment(), self.id());
        self.ran = true;
        self.drive(None).instrument(span).await
    }

    async fn drive(mut self, host: Option<&dyn Script>) -> SessionReport {
        let clock = Instant::now();
        let definition = Arc::clone(&self.definition);
        info!("session starting");

        self.advance(SessionEvent::Load);
        let interrupted = match host {
            Some(host) => {
                let work = load_and_interact(
                    &self.runner,
                    &definition,
                    &mut self.context,
                    &mut self.lifecycle,
                    host,
                );
                tokio::select! {
                    biased;
                    () = self.termination.tripped() => Err(()),
                    outcome = work => Ok(outcome),
                }
            }
            None => Err(()),
        };

        let outcome = match interrupted {
            Ok(outcome) => {
                self.advance(SessionEvent::Exit);
                outcome
            }
            Err(()) => {
                let stage = match self.lifecycle.state() {
                    SessionState::Active => Stage::Active,
                    _ => Stage::OnLoad,
                };
                warn!(%stage, "session aborted, running exit scripts");
                self.advance(SessionEvent::Abort);
                SessionOutcome::Aborted { stage }
            }
        };

        let exit_failures = self
            .runner
            .run_on_exit(definition.name(), definition.on_exit(), &mut self.context)
            .await;
        self.advance(SessionEvent::Terminate);

        let elapsed = clock.elapsed();
        info!(
            ?outcome,
            exit_failures = exit_failures.len(),
            elapsed_ms = elapsed.as_millis(),
            "session finished"
        );

        SessionReport {
            session_id: self.id(),
            environment: definition.name().to_owned(),
            outcome,
            exit_failures,
            state: self.lifecycle.state(),
            started_at: self.started_at,
            elapsed,
        }
    }

    fn advance(&mut self, event: SessionEvent) {
        advance(&mut self.lifecycle, event);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.ran {
            warn!(
                environment = %self.definition.name(),
                session_id = %self.id(),
                "session dropped without running, exit scripts skipped"
            );
        }
    }
}

async fn load_and_interact(
    runner: &LifecycleScriptRunner,
    definition: &EnvironmentDefinition,
    context: &mut Context,
    lifecycle: &mut Lifecycle,
    host: &dyn Script,
) -> SessionOutcome {
    if let Err((index, error)) = runner.load(definition.on_load(), context).await {
        warn!(index, %error, "on-load script failed, skipping the rest");
        return SessionOutcome::LoadFailed { index, error };
    }
    advance(lifecycle, SessionEvent::Activate);
    info!("environment active");

    match run_guarded(host, context).await {
        Ok(()) => SessionOutcome::Completed,
        Err(error) => {
            warn!(%error, "host interaction failed");
            SessionOutcome::HostFailed { error }
        }
    }
}

fn advance(lifecycle: &mut Lifecycle, event: SessionEvent) {
    if let Err(err) = lifecycle.transition(event) {
        warn!(%err, "ignored lifecycle event");
    }
}
