use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use plumber::capabilities::CapabilityRegistry;
use plumber::config::{
    DefinitionError, DefinitionSource, EnvironmentRegistry, RegistryError, ScriptCatalog,
};
use plumber::kernel::{
    EnvironmentRuntime, RunnerConfig, RuntimeConfig, SessionError, SessionOutcome, Stage,
    TerminationTrigger,
};
use plumber::primitives::{Context, async_script, script_fn};
use plumber::prompts::{PromptAdapter, ScriptedPromptAdapter, SequencerConfig};
use serde_json::json;

type Journal = Arc<Mutex<Vec<String>>>;

fn recording_catalog(journal: &Journal) -> ScriptCatalog {
    let mut catalog = ScriptCatalog::with_builtins();
    for name in ["load", "exit-0", "exit-1"] {
        let journal = Arc::clone(journal);
        catalog
            .register_script(
                name,
                script_fn(move |_ctx: &mut Context| {
                    journal.lock().unwrap().push(name.to_owned());
                    Ok(())
                }),
            )
            .unwrap();
    }
    catalog
        .register_script(
            "stall",
            async_script(|_ctx: &mut Context| {
                async {
                    std::future::pending::<()>().await;
                    Ok(())
                }
                .boxed()
            }),
        )
        .unwrap();
    catalog
}

fn runtime(answers: &[&str], trigger: &TerminationTrigger) -> EnvironmentRuntime {
    let adapter: Arc<dyn PromptAdapter> =
        Arc::new(ScriptedPromptAdapter::new(answers.iter().copied()));
    EnvironmentRuntime::new(
        Arc::new(CapabilityRegistry::with_defaults()),
        adapter,
        Arc::new(trigger.clone()),
        RuntimeConfig::new(
            RunnerConfig::new(Some(Duration::from_secs(5))),
            SequencerConfig::default(),
        ),
    )
    .unwrap()
}

#[tokio::test]
async fn termination_during_on_load_runs_exit_scripts() {
    let journal = Journal::default();
    let registry = EnvironmentRegistry::new(recording_catalog(&journal));
    registry
        .load(&DefinitionSource::json(
            r#"{
                "environment-name": "stalls",
                "on-load-scripts": ["load", "stall", "load"],
                "on-exit-scripts": ["exit-0", "exit-1"]
            }"#,
        ))
        .unwrap();

    let trigger = TerminationTrigger::new();
    let session = runtime(&[], &trigger)
        .launch(&registry, "stalls")
        .await
        .unwrap();
    let run = tokio::spawn(session.run());
    tokio::time::sleep(Duration::from_millis(20)).await;
    trigger.trigger();
    let report = run.await.unwrap();

    assert!(matches!(
        report.outcome,
        SessionOutcome::Aborted {
            stage: Stage::OnLoad
        }
    ));
    assert_eq!(*journal.lock().unwrap(), vec!["load", "exit-0", "exit-1"]);
}

#[tokio::test]
async fn definitions_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("dev.json");
    std::fs::write(
        &json_path,
        r#"{ "environment-name": "dev", "context": { "answer": 42 } }"#,
    )
    .unwrap();
    let yaml_path = dir.path().join("ops.yml");
    std::fs::write(&yaml_path, "environment-name: ops\nmodules:\n  p: process\n").unwrap();

    let registry = EnvironmentRegistry::default();
    registry.load(&DefinitionSource::file(&json_path)).unwrap();
    registry.load(&DefinitionSource::file(&yaml_path)).unwrap();
    assert_eq!(
        registry.list().into_iter().collect::<Vec<_>>(),
        vec!["dev", "ops"]
    );

    let trigger = TerminationTrigger::new();
    let runtime = runtime(&[], &trigger);
    let dev = runtime.launch(&registry, "dev").await.unwrap();
    assert_eq!(dev.context().data("answer"), Some(&json!(42)));
    dev.run().await;

    let ops = runtime.launch(&registry, "ops").await.unwrap();
    assert!(ops.context().contains_key("p"));
    ops.run().await;
}

#[tokio::test]
async fn registry_errors_surface() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dev.json");
    std::fs::write(&path, r#"{ "environment-name": "dev" }"#).unwrap();

    let registry = EnvironmentRegistry::default();
    registry.load(&DefinitionSource::file(&path)).unwrap();

    let err = registry
        .load(&DefinitionSource::file(&path))
        .expect_err("duplicate");
    assert!(matches!(err, RegistryError::DuplicateEnvironmentName { ref name } if name == "dev"));

    let err = registry.get("staging").expect_err("not registered");
    assert!(matches!(err, RegistryError::EnvironmentNotFound { ref name } if name == "staging"));

    std::fs::write(&path, r#"{ "environment-name": "broken", "unknown": 1 }"#).unwrap();
    let err = registry
        .load(&DefinitionSource::file(&path))
        .expect_err("unknown key");
    assert!(matches!(
        err,
        RegistryError::Definition {
            source: DefinitionError::Parse { .. }
        }
    ));
    assert_eq!(registry.list().len(), 1);

    let trigger = TerminationTrigger::new();
    let err = runtime(&[], &trigger)
        .launch(&registry, "staging")
        .await
        .expect_err("not registered");
    assert!(matches!(
        err,
        SessionError::Registry(RegistryError::EnvironmentNotFound { .. })
    ));
}
