//! Prompt adapters: the seam between the sequencer and whatever presents
//! prompts to the user.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use plumber_config::OptionKind;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};

use crate::error::{PromptError, PromptResult};

/// Presents one prompt and returns the raw answer.
#[async_trait]
pub trait PromptAdapter: Send + Sync {
    /// Shows `prompt` and waits for an answer.
    ///
    /// `choices` is empty for [`OptionKind::Text`] prompts.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::InputClosed`] when no more input is available,
    /// or [`PromptError::Adapter`] when the prompt cannot be presented.
    async fn ask(
        &self,
        prompt: &str,
        kind: OptionKind,
        choices: &[String],
    ) -> PromptResult<String>;
}

/// A prompt recorded by [`ScriptedPromptAdapter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AskedPrompt {
    /// Prompt text.
    pub prompt: String,
    /// Option kind.
    pub kind: OptionKind,
    /// Choices offered.
    pub choices: Vec<String>,
}

/// Answers prompts from a fixed queue and records what was asked.
///
/// Used for automation and tests.
#[derive(Debug, Default)]
pub struct ScriptedPromptAdapter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<AskedPrompt>>,
}

impl ScriptedPromptAdapter {
    /// Creates an adapter that replies with `answers` in order.
    #[must_use]
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Prompts asked so far, in order.
    #[must_use]
    pub fn asked(&self) -> Vec<AskedPrompt> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of answers not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl PromptAdapter for ScriptedPromptAdapter {
    async fn ask(
        &self,
        prompt: &str,
        kind: OptionKind,
        choices: &[String],
    ) -> PromptResult<String> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AskedPrompt {
                prompt: prompt.to_owned(),
                kind,
                choices: choices.to_vec(),
            });
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(PromptError::InputClosed)
    }
}

/// Line-oriented adapter: writes the prompt, reads one line back.
///
/// Choice prompts list their choices as `[a/b]` after the prompt text.
#[derive(Debug)]
pub struct LinePromptAdapter<R, W> {
    reader: tokio::sync::Mutex<R>,
    writer: tokio::sync::Mutex<W>,
}

impl<R, W> LinePromptAdapter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Creates an adapter over the given reader and writer.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: tokio::sync::Mutex::new(reader),
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    /// Consumes the adapter, returning the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}

impl LinePromptAdapter<BufReader<Stdin>, Stdout> {
    /// Adapter over the process's standard input and output.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> PromptAdapter for LinePromptAdapter<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(
        &self,
        prompt: &str,
        kind: OptionKind,
        choices: &[String],
    ) -> PromptResult<String> {
        let rendered = match kind {
            OptionKind::Text => prompt.to_owned(),
            OptionKind::Choice => format!("{prompt}[{}] ", choices.join("/")),
        };

        {
            let mut writer = self.writer.lock().await;
            writer.write_all(rendered.as_bytes()).await?;
            writer.flush().await?;
        }

        let mut line = String::new();
        let read = self.reader.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Err(PromptError::InputClosed);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_adapter_replays_answers() {
        let adapter = ScriptedPromptAdapter::new(["Alice"]);
        let answer = adapter.ask("Name? ", OptionKind::Text, &[]).await.unwrap();
        assert_eq!(answer, "Alice");
        assert_eq!(adapter.remaining(), 0);
        assert_eq!(adapter.asked()[0].prompt, "Name? ");

        let err = adapter
            .ask("Again? ", OptionKind::Text, &[])
            .await
            .expect_err("exhausted");
        assert!(matches!(err, PromptError::InputClosed));
        assert_eq!(adapter.asked().len(), 2);
    }

    #[tokio::test]
    async fn line_adapter_reads_lines() {
        let input: &[u8] = b"Alice\r\nyes\n";
        let adapter = LinePromptAdapter::new(input, Vec::new());

        let name = adapter.ask("Name? ", OptionKind::Text, &[]).await.unwrap();
        let choices = vec!["yes".to_owned(), "no".to_owned()];
        let dev = adapter
            .ask("Dev? ", OptionKind::Choice, &choices)
            .await
            .unwrap();
        assert_eq!(name, "Alice");
        assert_eq!(dev, "yes");

        let err = adapter
            .ask("More? ", OptionKind::Text, &[])
            .await
            .expect_err("eof");
        assert!(matches!(err, PromptError::InputClosed));

        let (_, output) = adapter.into_inner();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Name? Dev? [yes/no] More? "
        );
    }
}
