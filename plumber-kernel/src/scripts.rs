//! Runs on-load and on-exit scripts.
//!
//! On-load scripts run strictly in order and the first failure stops the
//! rest. On-exit scripts always all run; each failure is logged and collected
//! so one broken cleanup cannot starve its siblings. Panics are caught and
//! reported as [`ScriptError::Panicked`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use plumber_primitives::{Context, Script, ScriptError, ScriptResult};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};

/// Script runner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    exit_script_timeout: Option<Duration>,
}

impl RunnerConfig {
    /// Creates a configuration; `None` lets exit scripts run unbounded.
    #[must_use]
    pub const fn new(exit_script_timeout: Option<Duration>) -> Self {
        Self {
            exit_script_timeout,
        }
    }

    /// Returns the per-script exit timeout.
    #[must_use]
    pub const fn exit_script_timeout(self) -> Option<Duration> {
        self.exit_script_timeout
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when the exit timeout is zero.
    pub fn validate(self) -> SessionResult<()> {
        if self.exit_script_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(SessionError::InvalidConfig(
                "exit script timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(30)))
    }
}

/// An on-exit script that did not complete.
#[derive(Debug, Serialize)]
pub struct ExitScriptFailure {
    /// Zero-based position of the script.
    pub index: usize,
    /// What went wrong.
    pub error: ScriptError,
}

/// Executes lifecycle scripts against a session context.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleScriptRunner {
    config: RunnerConfig,
}

impl LifecycleScriptRunner {
    /// Creates a runner with the supplied configuration.
    #[must_use]
    pub const fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Returns the associated configuration.
    #[must_use]
    pub const fn config(&self) -> RunnerConfig {
        self.config
    }

    /// Runs on-load scripts in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::OnLoadScriptFailed`] naming the failing script.
    pub async fn run_on_load(
        &self,
        environment: &str,
        scripts: &[Arc<dyn Script>],
        context: &mut Context,
    ) -> SessionResult<()> {
        self.load(scripts, context)
            .await
            .map_err(|(index, source)| SessionError::OnLoadScriptFailed {
                environment: environment.to_owned(),
                index,
                source,
            })
    }

    pub(crate) async fn load(
        &self,
        scripts: &[Arc<dyn Script>],
        context: &mut Context,
    ) -> Result<(), (usize, ScriptError)> {
        for (index, script) in scripts.iter().enumerate() {
            debug!(index, "running on-load script");
            run_guarded(script.as_ref(), context)
                .await
                .map_err(|err| (index, err))?;
        }
        Ok(())
    }

    /// Runs every on-exit script in order and returns the failures.
    pub async fn run_on_exit(
        &self,
        environment: &str,
        scripts: &[Arc<dyn Script>],
        context: &mut Context,
    ) -> Vec<ExitScriptFailure> {
        let mut failures = Vec::new();
        for (index, script) in scripts.iter().enumerate() {
            debug!(environment, index, "running on-exit script");
            let result = match self.config.exit_script_timeout {
                Some(limit) => tokio::time::timeout(limit, run_guarded(script.as_ref(), context))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ScriptError::TimedOut {
                            millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        })
                    }),
                None => run_guarded(script.as_ref(), context).await,
            };
            if let Err(error) = result {
                warn!(environment, index, %error, "on-exit script failed");
                failures.push(ExitScriptFailure { index, error });
            }
        }
        failures
    }
}

/// Runs `script`, turning a panic into [`ScriptError::Panicked`].
pub(crate) async fn run_guarded(script: &dyn Script, context: &mut Context) -> ScriptResult<()> {
    match AssertUnwindSafe(script.run(context)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ScriptError::from_panic(payload.as_ref())),
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt as _;
    use plumber_primitives::{SessionId, async_script, script_fn};
    use serde_json::Value;

    use super::*;

    fn context() -> Context {
        Context::new("runner", SessionId::random())
    }

    fn push(marker: &'static str) -> Arc<dyn Script> {
        Arc::new(script_fn(move |ctx: &mut Context| {
            let mut seen = ctx
                .data("seen")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            seen.push(Value::from(marker));
            ctx.set("seen", seen);
            Ok(())
        }))
    }

    fn fail(reason: &'static str) -> Arc<dyn Script> {
        Arc::new(script_fn(move |_ctx: &mut Context| {
            Err(ScriptError::failed(reason))
        }))
    }

    fn seen(ctx: &Context) -> Vec<&str> {
        ctx.data("seen")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn on_load_stops_at_first_failure() {
        let runner = LifecycleScriptRunner::default();
        let mut ctx = context();
        let scripts = vec![push("load-0"), fail("boom"), push("load-2")];

        let err = runner
            .run_on_load("runner", &scripts, &mut ctx)
            .await
            .expect_err("second script fails");

        assert!(matches!(
            err,
            SessionError::OnLoadScriptFailed { index: 1, ref environment, .. } if environment == "runner"
        ));
        assert_eq!(seen(&ctx), vec!["load-0"]);
    }

    #[tokio::test]
    async fn on_load_panics_are_caught() {
        let runner = LifecycleScriptRunner::default();
        let mut ctx = context();
        let scripts: Vec<Arc<dyn Script>> = vec![Arc::new(script_fn(|_ctx: &mut Context| {
            panic!("script exploded")
        }))];

        let err = runner
            .run_on_load("runner", &scripts, &mut ctx)
            .await
            .expect_err("panic");
        assert!(matches!(
            err,
            SessionError::OnLoadScriptFailed {
                source: ScriptError::Panicked { ref message },
                ..
            } if message == "script exploded"
        ));
    }

    #[tokio::test]
    async fn exit_failures_do_not_stop_siblings() {
        let runner = LifecycleScriptRunner::default();
        let mut ctx = context();
        let scripts: Vec<Arc<dyn Script>> = vec![
            push("exit-0"),
            fail("cleanup failed"),
            Arc::new(script_fn(|_ctx: &mut Context| panic!("cleanup panicked"))),
            push("exit-3"),
        ];

        let failures = runner.run_on_exit("runner", &scripts, &mut ctx).await;

        assert_eq!(seen(&ctx), vec!["exit-0", "exit-3"]);
        let indices: Vec<_> = failures.iter().map(|failure| failure.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(matches!(failures[0].error, ScriptError::Failed { .. }));
        assert!(matches!(failures[1].error, ScriptError::Panicked { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_exit_script_times_out() {
        let runner = LifecycleScriptRunner::new(RunnerConfig::new(Some(Duration::from_secs(1))));
        let mut ctx = context();
        let hang: Arc<dyn Script> = Arc::new(async_script(|_ctx: &mut Context| {
            async {
                std::future::pending::<()>().await;
                Ok(())
            }
            .boxed()
        }));
        let scripts = vec![hang, push("after")];

        let failures = runner.run_on_exit("runner", &scripts, &mut ctx).await;

        assert_eq!(failures.len(), 1);
        assert!(matches!(
            failures[0].error,
            ScriptError::TimedOut { millis: 1000 }
        ));
        assert_eq!(seen(&ctx), vec!["after"]);
    }

    #[test]
    fn zero_timeout_is_invalid() {
        assert!(RunnerConfig::default().validate().is_ok());
        assert!(RunnerConfig::new(None).validate().is_ok());
        assert!(matches!(
            RunnerConfig::new(Some(Duration::ZERO)).validate(),
            Err(SessionError::InvalidConfig(_))
        ));
    }
}
