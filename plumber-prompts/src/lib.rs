//! Launch-option prompting for Plumber environments.
//!
//! A [`LaunchOptionSequencer`] walks an environment's launch options in
//! declaration order, asks each one through a [`PromptAdapter`], validates
//! choice answers, and applies formatters.

#![warn(missing_docs, clippy::pedantic)]

pub mod adapter;
mod error;
pub mod sequencer;

pub use adapter::{AskedPrompt, LinePromptAdapter, PromptAdapter, ScriptedPromptAdapter};
pub use error::{PromptError, PromptResult};
pub use sequencer::{ChoicePolicy, LaunchOptionSequencer, LaunchValues, SequencerConfig};
