use std::sync::{Arc, Mutex};

use plumber::capabilities::{CapabilityRegistry, ProcessCapability};
use plumber::config::{DefinitionSource, EnvironmentRegistry, ScriptCatalog};
use plumber::kernel::{
    EnvironmentRuntime, NeverTerminate, RuntimeConfig, SessionOutcome, SessionState,
};
use plumber::primitives::{Context, ContextSource, ScriptError, script_fn};
use plumber::prompts::{PromptAdapter, ScriptedPromptAdapter};
use serde_json::{Value, json};

const SAMPLE: &str = r#"{
    "environment-name": "sample-environment",
    "modules": { "p": "process" },
    "context": {
        "welcomeText": "Welcome to the sample environment",
        "sayHello": { "$function": "log" }
    },
    "launch-options": [
        { "option-name": "username", "prompt": "What is your name? ", "type": "text" },
        {
            "option-name": "isDevelopment",
            "prompt": "Load development environment? ",
            "type": "choice",
            "choices": ["yes", "no"],
            "formatter": "yes-no"
        }
    ],
    "on-load-scripts": ["announce"],
    "on-exit-scripts": ["goodbye"]
}"#;

type Journal = Arc<Mutex<Vec<String>>>;

fn catalog(journal: &Journal) -> ScriptCatalog {
    let mut catalog = ScriptCatalog::with_builtins();

    let on_load = Arc::clone(journal);
    catalog
        .register_script(
            "announce",
            script_fn(move |ctx: &mut Context| {
                let welcome = ctx.require("welcomeText")?.as_str().unwrap_or_default().to_owned();
                let pid = ctx.capability::<ProcessCapability>("p")?.id();
                ctx.call("sayHello", Some(Value::from(welcome.clone())))?;
                ctx.set("pid", pid);
                on_load.lock().unwrap().push(format!("load: {welcome}"));
                Ok(())
            }),
        )
        .unwrap();

    let on_exit = Arc::clone(journal);
    catalog
        .register_script(
            "goodbye",
            script_fn(move |ctx: &mut Context| {
                let name = ctx.require("username")?.as_str().unwrap_or_default().to_owned();
                on_exit.lock().unwrap().push(format!("exit: {name}"));
                Ok(())
            }),
        )
        .unwrap();

    catalog
}

fn runtime(answers: &[&str]) -> (EnvironmentRuntime, Arc<ScriptedPromptAdapter>) {
    let adapter = Arc::new(ScriptedPromptAdapter::new(answers.iter().copied()));
    let runtime = EnvironmentRuntime::new(
        Arc::new(CapabilityRegistry::with_defaults()),
        Arc::clone(&adapter) as Arc<dyn PromptAdapter>,
        Arc::new(NeverTerminate),
        RuntimeConfig::default(),
    )
    .unwrap();
    (runtime, adapter)
}

#[tokio::test]
async fn sample_environment_end_to_end() {
    let journal = Journal::default();
    let registry = EnvironmentRegistry::new(catalog(&journal));
    registry.load(&DefinitionSource::json(SAMPLE)).unwrap();

    let (runtime, adapter) = runtime(&["Alice", "yes"]);
    let session = runtime
        .launch(&registry, "sample-environment")
        .await
        .unwrap();

    let context = session.context();
    assert_eq!(context.data("username"), Some(&json!("Alice")));
    assert_eq!(context.data("isDevelopment"), Some(&json!(true)));
    assert_eq!(
        context.data("welcomeText"),
        Some(&json!("Welcome to the sample environment"))
    );
    assert_eq!(context.source_of("p"), Some(ContextSource::Module));
    let keys: Vec<_> = context.keys().collect();
    assert_eq!(
        keys,
        vec!["isDevelopment", "p", "sayHello", "username", "welcomeText"]
    );
    let prompts: Vec<_> = adapter.asked().into_iter().map(|asked| asked.prompt).collect();
    assert_eq!(
        prompts,
        vec!["What is your name? ", "Load development environment? "]
    );

    let seen_pid = Arc::new(Mutex::new(None));
    let host = {
        let seen_pid = Arc::clone(&seen_pid);
        script_fn(move |ctx: &mut Context| {
            *seen_pid.lock().unwrap() = ctx.data("pid").cloned();
            Ok(())
        })
    };
    let report = session.run_with(&host).await;

    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.state, SessionState::Terminated);
    assert_eq!(
        *seen_pid.lock().unwrap(),
        Some(json!(std::process::id()))
    );
    assert_eq!(
        *journal.lock().unwrap(),
        vec![
            "load: Welcome to the sample environment".to_owned(),
            "exit: Alice".to_owned()
        ]
    );
}

#[tokio::test]
async fn answering_no_stores_false() {
    let journal = Journal::default();
    let registry = EnvironmentRegistry::new(catalog(&journal));
    registry.load(&DefinitionSource::json(SAMPLE)).unwrap();

    let (runtime, _) = runtime(&["Bob", "no"]);
    let session = runtime
        .launch(&registry, "sample-environment")
        .await
        .unwrap();
    assert_eq!(session.context().data("isDevelopment"), Some(&json!(false)));
    session.run().await;
}

#[tokio::test]
async fn failing_on_load_script_still_runs_every_exit_script() {
    let journal = Journal::default();
    let mut catalog = ScriptCatalog::with_builtins();
    for (name, fails) in [
        ("load-0", false),
        ("load-1", true),
        ("load-2", false),
        ("exit-0", false),
        ("exit-1", false),
    ] {
        let journal = Arc::clone(&journal);
        catalog
            .register_script(
                name,
                script_fn(move |_ctx: &mut Context| {
                    journal.lock().unwrap().push(name.to_owned());
                    if fails {
                        return Err(ScriptError::failed("on-load broke"));
                    }
                    Ok(())
                }),
            )
            .unwrap();
    }

    let registry = EnvironmentRegistry::new(catalog);
    registry
        .load(&DefinitionSource::yaml(
            "environment-name: fragile\n\
             on-load-scripts: [load-0, load-1, load-2]\n\
             on-exit-scripts: [exit-0, exit-1]\n",
        ))
        .unwrap();

    let (runtime, _) = runtime(&[]);
    let report = runtime.launch(&registry, "fragile").await.unwrap().run().await;

    assert!(matches!(
        report.outcome,
        SessionOutcome::LoadFailed { index: 1, .. }
    ));
    assert!(report.exit_failures.is_empty());
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["load-0", "load-1", "exit-0", "exit-1"]
    );
}
