//! Timed, reaction-driven single-choice prompts.
//!
//! A prompt lists up to 26 labeled options, attaches one letter marker per
//! option and resolves on the first qualifying reaction from the requesting
//! identity, or times out.

mod machine;

pub use machine::{marker, marker_index, SelectorMachine, SelectorState, Transition, MAX_OPTIONS};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ephemeral::EphemeralScheduler;
use crate::metrics;
use crate::platform::{MessageRef, Platform, PlatformError, ReactionEvent};

/// Errors that can abort a selection before it is armed.
#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("cannot offer {0} options, the marker alphabet has {max}", max = MAX_OPTIONS)]
    TooManyOptions(usize),

    #[error("platform failure: {0}")]
    Platform(#[from] PlatformError),
}

/// Parameters for one selection prompt.
#[derive(Debug, Clone)]
pub struct SelectPrompt {
    /// Channel the prompt is posted in.
    pub channel: String,
    /// Identity whose reactions resolve the prompt.
    pub requester: String,
    /// The message that triggered the prompt, deleted together with the
    /// prompt on timeout.
    pub origin: MessageRef,
    /// Text above the option list.
    pub header: String,
    /// Text the prompt is edited to when it times out.
    pub timeout_notice: String,
    /// Option labels, in offer order.
    pub options: Vec<String>,
}

/// How a selection ended. Exactly one outcome fires per prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The requester picked option `index`.
    Selected {
        index: usize,
        /// The prompt message, left for the caller to edit and clean up.
        prompt: MessageRef,
    },
    /// The deadline passed with no valid reaction; the prompt was edited to
    /// the timeout notice and its deletion scheduled.
    TimedOut,
    /// A qualifying marker resolved to no known option (defensive).
    Invalid,
}

/// Drives a timed, reaction-based single-choice prompt.
pub struct CategorySelector {
    platform: Arc<dyn Platform>,
    scheduler: EphemeralScheduler,
    timeout: Duration,
    marker_delay: Duration,
    cleanup_delay: Duration,
}

impl CategorySelector {
    pub fn new(
        platform: Arc<dyn Platform>,
        scheduler: EphemeralScheduler,
        timeout: Duration,
        marker_delay: Duration,
        cleanup_delay: Duration,
    ) -> Self {
        Self {
            platform,
            scheduler,
            timeout,
            marker_delay,
            cleanup_delay,
        }
    }

    /// Run one selection to completion.
    ///
    /// Markers are attached strictly in option order with a fixed delay
    /// between additions; reaction intake is live from the moment the prompt
    /// is posted, so a reaction to an early marker resolves the prompt even
    /// while later markers are still being added.
    pub async fn run(
        &self,
        prompt: SelectPrompt,
        events: &mut mpsc::Receiver<ReactionEvent>,
    ) -> Result<SelectionOutcome, SelectorError> {
        if prompt.options.len() > MAX_OPTIONS {
            return Err(SelectorError::TooManyOptions(prompt.options.len()));
        }

        let content = render_prompt(&prompt.header, &prompt.options);
        let prompt_message = self
            .platform
            .send_message(&prompt.channel, &content)
            .await?;

        debug!(
            "Armed selector {} with {} options for {}",
            prompt_message.id,
            prompt.options.len(),
            prompt.requester
        );

        // Markers go on concurrently with event intake, in strict list
        // order with a fixed delay per addition to stay inside the
        // platform's reaction rate limit.
        let marker_task = {
            let platform = self.platform.clone();
            let message = prompt_message.clone();
            let count = prompt.options.len();
            let delay = self.marker_delay;
            tokio::spawn(async move {
                for index in 0..count {
                    let Some(emoji) = marker(index) else { break };
                    if let Err(e) = platform.add_reaction(&message, &emoji).await {
                        warn!("Failed to add marker {} to prompt {}: {}", emoji, message.id, e);
                    }
                    tokio::time::sleep(delay).await;
                }
            })
        };

        let mut machine = SelectorMachine::new(&prompt.requester, prompt.options.len());
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let transition = loop {
            tokio::select! {
                _ = &mut deadline => {
                    if let Some(transition) = machine.expire() {
                        break transition;
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(event) if event.message == prompt_message => {
                            if let Some(transition) =
                                machine.handle_reaction(&event.user, &event.emoji)
                            {
                                break transition;
                            }
                        }
                        // Reactions to other messages are not ours to consume.
                        Some(_) => {}
                        // The gateway feed closed; treat it as expiry.
                        None => {
                            if let Some(transition) = machine.expire() {
                                break transition;
                            }
                        }
                    }
                }
            }
        };

        marker_task.abort();

        match transition {
            Transition::Resolve(index) => {
                if let Err(e) = self.platform.remove_all_reactions(&prompt_message).await {
                    warn!("Failed to clear markers on prompt {}: {}", prompt_message.id, e);
                }
                metrics::SELECTOR_OUTCOMES.with_label_values(&["selected"]).inc();
                Ok(SelectionOutcome::Selected {
                    index,
                    prompt: prompt_message,
                })
            }
            Transition::Expire => {
                if let Err(e) = self.platform.remove_all_reactions(&prompt_message).await {
                    warn!("Failed to clear markers on prompt {}: {}", prompt_message.id, e);
                }
                if let Err(e) = self
                    .platform
                    .edit_message(&prompt_message, &prompt.timeout_notice)
                    .await
                {
                    warn!("Failed to edit prompt {} to timeout notice: {}", prompt_message.id, e);
                }
                self.scheduler
                    .schedule_delete(prompt_message, self.cleanup_delay);
                self.scheduler
                    .schedule_delete(prompt.origin, self.cleanup_delay);
                metrics::SELECTOR_OUTCOMES.with_label_values(&["timed_out"]).inc();
                Ok(SelectionOutcome::TimedOut)
            }
            Transition::Invalidate => {
                self.scheduler
                    .schedule_delete(prompt_message, self.cleanup_delay);
                metrics::SELECTOR_OUTCOMES.with_label_values(&["invalid"]).inc();
                Ok(SelectionOutcome::Invalid)
            }
        }
    }
}

fn render_prompt(header: &str, options: &[String]) -> String {
    let mut lines = Vec::with_capacity(options.len() + 1);
    lines.push(header.to_string());
    for (index, label) in options.iter().enumerate() {
        // marker() cannot run out: the option count is capped at MAX_OPTIONS
        if let Some(emoji) = marker(index) {
            lines.push(format!("{} » {}", emoji, label));
        }
    }
    lines.join("\n")
}
