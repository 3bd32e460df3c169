//! The ticket creation flow.
//!
//! Loads the guild's categories, bypasses the selector when there is exactly
//! one, drives the reaction prompt when there are several, then hands the
//! chosen category to the provisioner and schedules cleanup of the transient
//! UI artifacts.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::IntakeConfig;
use crate::ephemeral::EphemeralScheduler;
use crate::platform::{MessageRef, Platform, ReactionEvent};
use crate::provisioner::{CreateOutcome, ProvisionError, TicketProvisioner};
use crate::quota::QuotaDenial;
use crate::records::{Category, RecordStore, StoreError, Ticket};
use crate::selector::{CategorySelector, SelectPrompt, SelectionOutcome, SelectorError};

/// A request to open a ticket.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    /// Guild the request originates from.
    pub guild: String,
    /// Channel the request was made in; prompts are posted here.
    pub channel: String,
    /// The requesting message, cleaned up together with the prompt.
    pub origin: MessageRef,
    /// User opening the ticket.
    pub creator: String,
    /// Optional topic argument.
    pub topic: Option<String>,
}

/// Terminal outcomes of the creation flow.
#[derive(Debug)]
pub enum OpenOutcome {
    /// The guild has no categories; nothing was changed.
    NoCategories,
    /// The chosen category requires a topic and none was supplied.
    TopicRequired,
    /// A ticket was provisioned.
    Created(Ticket),
    /// Admission was denied by the quota policy.
    Denied(QuotaDenial),
    /// The category prompt expired unanswered.
    SelectionTimedOut,
    /// The category prompt resolved to no known category (defensive).
    SelectionInvalid,
}

/// Errors that can abort the creation flow.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("record store failure: {0}")]
    Store(#[from] StoreError),

    #[error("category selection failed: {0}")]
    Selector(#[from] SelectorError),

    #[error("ticket provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
}

/// Coordinates category selection, quota-checked provisioning and cleanup.
pub struct TicketIntake {
    store: Arc<dyn RecordStore>,
    provisioner: TicketProvisioner,
    selector: CategorySelector,
    scheduler: EphemeralScheduler,
    cleanup_delay: Duration,
}

impl TicketIntake {
    pub fn new(
        store: Arc<dyn RecordStore>,
        platform: Arc<dyn Platform>,
        config: &IntakeConfig,
    ) -> Self {
        let scheduler = EphemeralScheduler::new(platform.clone());
        let selector = CategorySelector::new(
            platform.clone(),
            scheduler.clone(),
            Duration::from_secs(config.selector_timeout_secs),
            Duration::from_millis(config.marker_delay_ms),
            Duration::from_secs(config.cleanup_delay_secs),
        );
        let provisioner = TicketProvisioner::new(store.clone(), platform);

        Self {
            store,
            provisioner,
            selector,
            scheduler,
            cleanup_delay: Duration::from_secs(config.cleanup_delay_secs),
        }
    }

    /// Run the creation flow for one request.
    ///
    /// `events` is the gateway's reaction feed for the requesting channel;
    /// it is only consumed while a category prompt is armed.
    pub async fn open(
        &self,
        request: OpenRequest,
        events: &mut mpsc::Receiver<ReactionEvent>,
    ) -> Result<OpenOutcome, IntakeError> {
        let categories = self.store.categories(&request.guild)?;

        match categories.len() {
            0 => {
                debug!("No categories configured for guild {}", request.guild);
                Ok(OpenOutcome::NoCategories)
            }
            1 => self.provision(&request, &categories[0], None).await,
            _ => {
                let prompt = SelectPrompt {
                    channel: request.channel.clone(),
                    requester: request.creator.clone(),
                    origin: request.origin.clone(),
                    header: "Please react to this message to select a category:".to_string(),
                    timeout_notice:
                        "Category selection timed out. Use the command again to open a ticket."
                            .to_string(),
                    options: categories.iter().map(|c| c.name.clone()).collect(),
                };

                match self.selector.run(prompt, events).await? {
                    SelectionOutcome::Selected { index, prompt } => match categories.get(index) {
                        Some(category) => {
                            self.provision(&request, category, Some(prompt)).await
                        }
                        // The machine guards against this; mirror its
                        // defensive exit anyway
                        None => {
                            self.scheduler.schedule_delete(prompt, self.cleanup_delay);
                            Ok(OpenOutcome::SelectionInvalid)
                        }
                    },
                    SelectionOutcome::TimedOut => Ok(OpenOutcome::SelectionTimedOut),
                    SelectionOutcome::Invalid => Ok(OpenOutcome::SelectionInvalid),
                }
            }
        }
    }

    async fn provision(
        &self,
        request: &OpenRequest,
        category: &Category,
        prompt: Option<MessageRef>,
    ) -> Result<OpenOutcome, IntakeError> {
        // The prompt and the requesting message are transient either way;
        // the presentation layer edits them with the result in the meantime.
        if let Some(prompt) = prompt {
            self.scheduler.schedule_delete(prompt, self.cleanup_delay);
        }
        self.scheduler
            .schedule_delete(request.origin.clone(), self.cleanup_delay);

        if category.require_topic && request.topic.is_none() {
            return Ok(OpenOutcome::TopicRequired);
        }

        let outcome = self
            .provisioner
            .create(
                &request.guild,
                &request.creator,
                category,
                request.topic.as_deref(),
            )
            .await?;

        Ok(match outcome {
            CreateOutcome::Created(ticket) => OpenOutcome::Created(ticket),
            CreateOutcome::Denied(denial) => OpenOutcome::Denied(denial),
        })
    }
}
