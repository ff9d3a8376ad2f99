//! Collects launch-option answers in declaration order.

use std::collections::BTreeSet;
use std::sync::Arc;

use plumber_config::{LaunchOption, OptionKind};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::PromptAdapter;
use crate::error::{PromptError, PromptResult};

/// What happens when a choice answer is not one of the declared choices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChoicePolicy {
    /// Fail immediately with [`PromptError::InvalidChoice`].
    #[default]
    Fail,
    /// Ask again, up to `max_attempts` answers in total.
    Reprompt {
        /// Answers accepted before giving up.
        max_attempts: u32,
    },
}

/// Sequencer configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SequencerConfig {
    choice_policy: ChoicePolicy,
}

impl SequencerConfig {
    /// Creates a configuration with the given choice policy.
    #[must_use]
    pub const fn new(choice_policy: ChoicePolicy) -> Self {
        Self { choice_policy }
    }

    /// Returns the choice policy.
    #[must_use]
    pub const fn choice_policy(self) -> ChoicePolicy {
        self.choice_policy
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::InvalidConfig`] when a re-prompt policy allows
    /// zero attempts.
    pub fn validate(self) -> PromptResult<()> {
        if let ChoicePolicy::Reprompt { max_attempts: 0 } = self.choice_policy {
            return Err(PromptError::InvalidConfig(
                "re-prompt attempts must be greater than zero",
            ));
        }
        Ok(())
    }

    const fn attempts(self) -> u32 {
        match self.choice_policy {
            ChoicePolicy::Fail => 1,
            ChoicePolicy::Reprompt { max_attempts } => max_attempts,
        }
    }
}

/// Launch-option answers keyed by option name, in prompt order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaunchValues {
    values: Vec<(String, Value)>,
}

impl LaunchValues {
    /// Value collected for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Iterates answers in prompt order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of collected answers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no option was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl IntoIterator for LaunchValues {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl FromIterator<(String, Value)> for LaunchValues {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Presents launch options through a [`PromptAdapter`] and formats the
/// answers.
#[derive(Clone)]
pub struct LaunchOptionSequencer {
    adapter: Arc<dyn PromptAdapter>,
    config: SequencerConfig,
}

impl std::fmt::Debug for LaunchOptionSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchOptionSequencer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LaunchOptionSequencer {
    /// Creates a sequencer with the default configuration.
    #[must_use]
    pub fn new(adapter: Arc<dyn PromptAdapter>) -> Self {
        Self::with_config(adapter, SequencerConfig::default())
    }

    /// Creates a sequencer with an explicit configuration.
    #[must_use]
    pub fn with_config(adapter: Arc<dyn PromptAdapter>, config: SequencerConfig) -> Self {
        Self { adapter, config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> SequencerConfig {
        self.config
    }

    /// Asks every option in order and returns the formatted answers.
    ///
    /// Choice answers are checked against the declared choices only when the
    /// option has no formatter.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::DuplicateOptionName`] before any prompt is shown
    /// when two options share a name, [`PromptError::InvalidChoice`] once the
    /// choice policy is exhausted, [`PromptError::FormatterFailed`] when a
    /// formatter rejects an answer, or any adapter error.
    pub async fn collect(&self, options: &[LaunchOption]) -> PromptResult<LaunchValues> {
        let mut seen = BTreeSet::new();
        for option in options {
            if !seen.insert(option.name()) {
                return Err(PromptError::DuplicateOptionName {
                    name: option.name().to_owned(),
                });
            }
        }

        let mut values = Vec::with_capacity(options.len());
        for option in options {
            let raw = self.ask(option).await?;
            let value = option
                .format(&raw)
                .map_err(|source| PromptError::FormatterFailed {
                    option: option.name().to_owned(),
                    source,
                })?;
            debug!(option = option.name(), "collected launch option");
            values.push((option.name().to_owned(), value));
        }

        Ok(LaunchValues { values })
    }

    async fn ask(&self, option: &LaunchOption) -> PromptResult<String> {
        let validate = option.kind() == OptionKind::Choice && !option.has_formatter();
        let attempts = self.config.attempts().max(1);

        let mut attempt = 1;
        loop {
            let answer = self
                .adapter
                .ask(option.prompt(), option.kind(), option.choices())
                .await?;
            if !validate || option.choices().iter().any(|choice| *choice == answer) {
                return Ok(answer);
            }
            if attempt >= attempts {
                return Err(PromptError::InvalidChoice {
                    option: option.name().to_owned(),
                    answer,
                    choices: option.choices().to_vec(),
                });
            }
            warn!(
                option = option.name(),
                %answer,
                attempt,
                "answer is not a declared choice, asking again"
            );
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use plumber_primitives::ScriptError;

    use super::*;
    use crate::adapter::ScriptedPromptAdapter;

    fn yes_no(raw: &str) -> plumber_primitives::ScriptResult<Value> {
        Ok(Value::Bool(raw == "yes"))
    }

    fn sample_options() -> Vec<LaunchOption> {
        vec![
            LaunchOption::text("username", "What is your name? "),
            LaunchOption::choice("isDevelopment", "Development? ", ["yes", "no"])
                .with_formatter(yes_no),
        ]
    }

    fn sequencer(adapter: &Arc<ScriptedPromptAdapter>) -> LaunchOptionSequencer {
        LaunchOptionSequencer::new(Arc::clone(adapter) as Arc<dyn PromptAdapter>)
    }

    fn asked_prompts(adapter: &ScriptedPromptAdapter) -> Vec<String> {
        adapter.asked().into_iter().map(|asked| asked.prompt).collect()
    }

    #[tokio::test]
    async fn collects_in_declaration_order() {
        let adapter = Arc::new(ScriptedPromptAdapter::new(["Alice", "yes"]));
        let values = sequencer(&adapter).collect(&sample_options()).await.unwrap();

        assert_eq!(values.get("username"), Some(&Value::from("Alice")));
        assert_eq!(values.get("isDevelopment"), Some(&Value::Bool(true)));
        let names: Vec<_> = values.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["username", "isDevelopment"]);
        assert_eq!(
            asked_prompts(&adapter),
            vec!["What is your name? ", "Development? "]
        );
    }

    #[tokio::test]
    async fn reordering_options_reorders_prompts() {
        let mut options = sample_options();
        options.reverse();

        let adapter = Arc::new(ScriptedPromptAdapter::new(["no", "Bob"]));
        let values = sequencer(&adapter).collect(&options).await.unwrap();

        assert_eq!(
            asked_prompts(&adapter),
            vec!["Development? ", "What is your name? "]
        );
        assert_eq!(values.get("isDevelopment"), Some(&Value::Bool(false)));
        assert_eq!(values.get("username"), Some(&Value::from("Bob")));
    }

    #[tokio::test]
    async fn choice_without_formatter_rejects_unknown_answer() {
        let options = vec![LaunchOption::choice("mode", "Mode? ", ["fast", "slow"])];
        let adapter = Arc::new(ScriptedPromptAdapter::new(["Fast"]));

        let err = sequencer(&adapter)
            .collect(&options)
            .await
            .expect_err("case-sensitive choice");
        assert!(matches!(
            err,
            PromptError::InvalidChoice { ref option, ref answer, .. } if option == "mode" && answer == "Fast"
        ));
    }

    #[tokio::test]
    async fn choice_with_formatter_skips_membership_check() {
        let options = vec![
            LaunchOption::choice("isDevelopment", "Development? ", ["yes", "no"])
                .with_formatter(yes_no),
        ];
        let adapter = Arc::new(ScriptedPromptAdapter::new(["maybe"]));

        let values = sequencer(&adapter).collect(&options).await.unwrap();
        assert_eq!(values.get("isDevelopment"), Some(&Value::Bool(false)));
    }

    #[tokio::test]
    async fn duplicate_names_fail_before_prompting() {
        let options = vec![
            LaunchOption::text("name", "First? "),
            LaunchOption::text("name", "Second? "),
        ];
        let adapter = Arc::new(ScriptedPromptAdapter::new(["a", "b"]));

        let err = sequencer(&adapter)
            .collect(&options)
            .await
            .expect_err("duplicate");
        assert!(matches!(err, PromptError::DuplicateOptionName { ref name } if name == "name"));
        assert!(adapter.asked().is_empty());
        assert_eq!(adapter.remaining(), 2);
    }

    #[tokio::test]
    async fn reprompt_policy_asks_again() {
        let options = vec![LaunchOption::choice("mode", "Mode? ", ["fast", "slow"])];
        let adapter = Arc::new(ScriptedPromptAdapter::new(["quick", "slow"]));
        let config = SequencerConfig::new(ChoicePolicy::Reprompt { max_attempts: 3 });

        let values =
            LaunchOptionSequencer::with_config(Arc::clone(&adapter) as Arc<dyn PromptAdapter>, config)
                .collect(&options)
                .await
                .unwrap();
        assert_eq!(values.get("mode"), Some(&Value::from("slow")));
        assert_eq!(adapter.asked().len(), 2);
    }

    #[tokio::test]
    async fn reprompt_policy_gives_up_after_max_attempts() {
        let options = vec![LaunchOption::choice("mode", "Mode? ", ["fast", "slow"])];
        let adapter = Arc::new(ScriptedPromptAdapter::new(["a", "b", "fast"]));
        let config = SequencerConfig::new(ChoicePolicy::Reprompt { max_attempts: 2 });

        let err =
            LaunchOptionSequencer::with_config(Arc::clone(&adapter) as Arc<dyn PromptAdapter>, config)
                .collect(&options)
                .await
                .expect_err("exhausted");
        assert!(matches!(err, PromptError::InvalidChoice { ref answer, .. } if answer == "b"));
        assert_eq!(adapter.remaining(), 1);
    }

    #[tokio::test]
    async fn formatter_failure_is_reported() {
        let options = vec![LaunchOption::text("port", "Port? ").with_formatter(|raw: &str| {
            raw.parse::<u16>()
                .map(Value::from)
                .map_err(|err| ScriptError::failed(err.to_string()))
        })];
        let adapter = Arc::new(ScriptedPromptAdapter::new(["http"]));

        let err = sequencer(&adapter)
            .collect(&options)
            .await
            .expect_err("not a port");
        assert!(matches!(err, PromptError::FormatterFailed { ref option, .. } if option == "port"));
    }

    #[tokio::test]
    async fn exhausted_input_surfaces_input_closed() {
        let adapter = Arc::new(ScriptedPromptAdapter::new(["Alice"]));
        let err = sequencer(&adapter)
            .collect(&sample_options())
            .await
            .expect_err("no second answer");
        assert!(matches!(err, PromptError::InputClosed));
    }

    #[test]
    fn zero_attempts_fail_validation() {
        assert!(SequencerConfig::default().validate().is_ok());
        let config = SequencerConfig::new(ChoicePolicy::Reprompt { max_attempts: 0 });
        assert!(matches!(config.validate(), Err(PromptError::InvalidConfig(_))));
    }
}
