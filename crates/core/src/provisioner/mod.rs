//! Ticket provisioning: admission, channel creation and record persistence.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::metrics;
use crate::platform::{
    ChannelKind, CreateChannelRequest, Permission, PermissionOverwrite, Platform, PlatformError,
};
use crate::quota::{Admission, DenialReason, QuotaDenial, QuotaEnforcer};
use crate::records::{Category, CreateTicketRecord, RecordStore, StoreError, Ticket};

/// Which provisioning steps completed before a failure.
///
/// The sequence has no rollback; callers decide on compensating action from
/// this report rather than losing the partial state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionSteps {
    /// Handle of the channel that was created, if creation got that far.
    pub channel_created: Option<String>,
    /// Whether the ticket record was written.
    pub record_written: bool,
}

/// Errors that can occur while provisioning a ticket.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Reading records failed before anything was mutated.
    #[error("record store failure: {0}")]
    Store(#[from] StoreError),

    /// The creator could not be fetched from the platform.
    #[error("failed to fetch creator: {0}")]
    MemberLookup(#[source] PlatformError),

    /// Channel creation failed; nothing was mutated.
    #[error("channel creation failed: {0}")]
    ChannelCreate(#[source] PlatformError),

    /// The channel exists but the ticket record write failed.
    #[error("record write failed after channel {channel} was created: {source}")]
    RecordWrite {
        channel: String,
        #[source]
        source: StoreError,
    },
}

impl ProvisionError {
    /// The partial state achieved before this failure.
    pub fn steps(&self) -> ProvisionSteps {
        match self {
            ProvisionError::Store(_)
            | ProvisionError::MemberLookup(_)
            | ProvisionError::ChannelCreate(_) => ProvisionSteps::default(),
            ProvisionError::RecordWrite { channel, .. } => ProvisionSteps {
                channel_created: Some(channel.clone()),
                record_written: false,
            },
        }
    }
}

/// Result of a creation request. A quota denial is an expected outcome, not
/// a failure.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Ticket),
    Denied(QuotaDenial),
}

/// Creates the backing channel for a ticket and persists its record.
pub struct TicketProvisioner {
    store: Arc<dyn RecordStore>,
    platform: Arc<dyn Platform>,
    quota: QuotaEnforcer,
}

impl TicketProvisioner {
    pub fn new(store: Arc<dyn RecordStore>, platform: Arc<dyn Platform>) -> Self {
        let quota = QuotaEnforcer::new(store.clone());
        Self {
            store,
            platform,
            quota,
        }
    }

    /// Create a ticket for `creator` in `category`.
    ///
    /// The admission check and the provisioning write are separate steps: a
    /// concurrent duplicate request can pass admission twice and exceed the
    /// configured quota. If the channel is created but the record write
    /// fails, the error reports the orphaned channel; nothing is rolled
    /// back.
    pub async fn create(
        &self,
        guild: &str,
        creator: &str,
        category: &Category,
        topic: Option<&str>,
    ) -> Result<CreateOutcome, ProvisionError> {
        match self.quota.admit(category, creator)? {
            Admission::Denied(denial) => {
                let reason = match denial.reason {
                    DenialReason::AlreadyHasTicket => "already_has_ticket",
                    DenialReason::MaxReached => "max_reached",
                };
                metrics::QUOTA_DENIALS.with_label_values(&[reason]).inc();
                info!(
                    "Denied ticket for {} in category {} ({})",
                    creator, category.id, reason
                );
                return Ok(CreateOutcome::Denied(denial));
            }
            Admission::Allowed => {}
        }

        let member = self
            .platform
            .fetch_member(guild, creator)
            .await
            .map_err(|e| {
                metrics::PROVISION_FAILURES
                    .with_label_values(&["member_lookup"])
                    .inc();
                ProvisionError::MemberLookup(e)
            })?;

        let number = self.store.next_ticket_number(guild)?;
        let name = render_channel_name(&category.name_format, number, &member.username);

        let mut overwrites = vec![
            // The everyone role shares its handle with the guild
            PermissionOverwrite::deny_role(guild, vec![Permission::ViewChannel]),
            PermissionOverwrite::allow_member(creator, Permission::participant_set()),
        ];
        for role in &category.roles {
            overwrites.push(PermissionOverwrite::allow_role(
                role,
                Permission::participant_set(),
            ));
        }

        let request = CreateChannelRequest {
            guild: guild.to_string(),
            name,
            kind: ChannelKind::Text,
            parent: Some(category.id.clone()),
            topic: topic.map(String::from),
            overwrites,
        };

        let channel = self.platform.create_channel(&request).await.map_err(|e| {
            metrics::PROVISION_FAILURES
                .with_label_values(&["channel_create"])
                .inc();
            ProvisionError::ChannelCreate(e)
        })?;

        let mut ticket = self
            .store
            .create_ticket(CreateTicketRecord {
                id: channel.id.clone(),
                guild: guild.to_string(),
                number,
                creator: creator.to_string(),
                category: category.id.clone(),
                topic: topic.map(String::from),
            })
            .map_err(|e| {
                metrics::PROVISION_FAILURES
                    .with_label_values(&["record_write"])
                    .inc();
                ProvisionError::RecordWrite {
                    channel: channel.id.clone(),
                    source: e,
                }
            })?;

        self.post_opening_message(category, &mut ticket).await;

        metrics::TICKETS_CREATED.inc();
        info!(
            "Created ticket #{} ({}) for {} in category {}",
            ticket.number, ticket.id, creator, category.id
        );

        Ok(CreateOutcome::Created(ticket))
    }

    /// Post the category's opening message into the new channel and anchor
    /// it on the ticket row. Best effort: a failure leaves the ticket
    /// without an opening message reference.
    async fn post_opening_message(&self, category: &Category, ticket: &mut Ticket) {
        let content = render_opening_message(category);

        let message = match self.platform.send_message(&ticket.id, &content).await {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to post opening message in {}: {}", ticket.id, e);
                return;
            }
        };

        ticket.opening_message = Some(message.id);
        if let Err(e) = self.store.update_ticket(ticket) {
            warn!(
                "Failed to record opening message for ticket {}: {}",
                ticket.id, e
            );
        }
    }
}

static NAME_SANITIZER: Lazy<Regex> = Lazy::new(|| Regex::new("[^a-z0-9-]+").unwrap());
static DASH_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new("-{2,}").unwrap());

/// Render a ticket channel name from a category's `name_format`.
///
/// Supports `{number}` and `{username}` placeholders, then collapses the
/// result into the platform's channel-name alphabet.
pub fn render_channel_name(format: &str, number: u32, username: &str) -> String {
    let rendered = format
        .replace("{number}", &number.to_string())
        .replace("{username}", username)
        .to_lowercase();

    let sanitized = NAME_SANITIZER.replace_all(&rendered, "-");
    let collapsed = DASH_RUNS.replace_all(&sanitized, "-");
    let trimmed = collapsed.trim_matches('-');

    if trimmed.is_empty() {
        format!("ticket-{}", number)
    } else {
        trimmed.to_string()
    }
}

fn render_opening_message(category: &Category) -> String {
    let mut content = category.opening_message.clone();
    if let Some(questions) = &category.opening_questions {
        for (index, question) in questions.iter().enumerate() {
            content.push_str(&format!("\n{}. {}", index + 1, question));
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OverwriteKind;
    use crate::records::{SqliteRecordStore, TicketQuery};
    use crate::testing::{fixtures, MockPlatform};

    fn setup() -> (Arc<SqliteRecordStore>, Arc<MockPlatform>, TicketProvisioner) {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let platform = Arc::new(MockPlatform::new());
        let provisioner = TicketProvisioner::new(store.clone(), platform.clone());
        (store, platform, provisioner)
    }

    #[tokio::test]
    async fn test_create_on_allow() {
        let (store, platform, provisioner) = setup();
        let category = fixtures::category("cat-1", "guild-1", "Support");
        store.create_category(&category).unwrap();

        let outcome = provisioner
            .create("guild-1", "user-1", &category, Some("printer on fire"))
            .await
            .unwrap();

        let ticket = match outcome {
            CreateOutcome::Created(ticket) => ticket,
            CreateOutcome::Denied(_) => panic!("expected creation"),
        };

        // The ticket id is the handle of the channel that was created
        assert_eq!(ticket.id, "channel-1");
        assert!(ticket.open);
        assert_eq!(ticket.number, 1);
        assert_eq!(ticket.topic.as_deref(), Some("printer on fire"));

        let request = &platform.created_channels().await[0];
        assert_eq!(request.kind, ChannelKind::Text);
        assert_eq!(request.parent.as_deref(), Some("cat-1"));
        assert_eq!(request.name, "ticket-1");

        // Overwrites: deny everyone, allow creator, allow each support role
        assert_eq!(request.overwrites.len(), 3);
        assert_eq!(request.overwrites[0].id, "guild-1");
        assert_eq!(request.overwrites[0].deny, vec![Permission::ViewChannel]);
        assert_eq!(request.overwrites[1].id, "user-1");
        assert_eq!(request.overwrites[1].kind, OverwriteKind::Member);
        assert_eq!(request.overwrites[2].id, "role-support");

        // The record landed in the store
        let stored = store.ticket("channel-1").unwrap().unwrap();
        assert!(stored.open);
    }

    #[tokio::test]
    async fn test_create_posts_opening_message() {
        let (store, platform, provisioner) = setup();
        let mut category = fixtures::category("cat-1", "guild-1", "Support");
        category.opening_questions = Some(vec!["What happened?".to_string()]);
        store.create_category(&category).unwrap();

        provisioner
            .create("guild-1", "user-1", &category, None)
            .await
            .unwrap();

        let sent = platform.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "channel-1");
        assert!(sent[0].1.contains("A member of staff"));
        assert!(sent[0].1.contains("1. What happened?"));

        // The opening message is anchored on the ticket row
        let stored = store.ticket("channel-1").unwrap().unwrap();
        assert!(stored.opening_message.is_some());
    }

    #[tokio::test]
    async fn test_denied_performs_no_resource_calls() {
        let (store, platform, provisioner) = setup();
        let category = fixtures::category("cat-1", "guild-1", "Support");
        store.create_category(&category).unwrap();

        store
            .create_ticket(CreateTicketRecord {
                id: "chan-42".to_string(),
                guild: "guild-1".to_string(),
                number: 42,
                creator: "user-1".to_string(),
                category: "cat-1".to_string(),
                topic: None,
            })
            .unwrap();

        let outcome = provisioner
            .create("guild-1", "user-1", &category, None)
            .await
            .unwrap();

        let denial = match outcome {
            CreateOutcome::Denied(denial) => denial,
            CreateOutcome::Created(_) => panic!("expected denial"),
        };
        assert_eq!(denial.reason, DenialReason::AlreadyHasTicket);
        assert_eq!(denial.existing[0].channel, "chan-42");

        // Zero platform calls, zero new ticket rows
        assert!(platform.calls().await.is_empty());
        let count = store
            .count_tickets(&TicketQuery::new().in_guild("guild-1"))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_record_write_failure_reports_orphaned_channel() {
        let (store, _platform, provisioner) = setup();
        let category = fixtures::category("cat-1", "guild-1", "Support");
        store.create_category(&category).unwrap();

        // Occupy the handle the mock will hand out, forcing the insert to
        // collide after the channel exists
        store
            .create_ticket(CreateTicketRecord {
                id: "channel-1".to_string(),
                guild: "guild-2".to_string(),
                number: 1,
                creator: "user-9".to_string(),
                category: "cat-9".to_string(),
                topic: None,
            })
            .unwrap();

        let error = provisioner
            .create("guild-1", "user-1", &category, None)
            .await
            .unwrap_err();

        let steps = error.steps();
        assert_eq!(steps.channel_created.as_deref(), Some("channel-1"));
        assert!(!steps.record_written);
    }

    #[tokio::test]
    async fn test_platform_failure_before_channel_has_no_partial_state() {
        let (store, platform, provisioner) = setup();
        let category = fixtures::category("cat-1", "guild-1", "Support");
        store.create_category(&category).unwrap();

        platform.set_next_error(PlatformError::RateLimited).await;

        let error = provisioner
            .create("guild-1", "user-1", &category, None)
            .await
            .unwrap_err();

        assert!(matches!(error, ProvisionError::MemberLookup(_)));
        assert_eq!(error.steps(), ProvisionSteps::default());
        let count = store
            .count_tickets(&TicketQuery::new().in_guild("guild-1"))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_steps_report_per_failure_stage() {
        let channel_create = ProvisionError::ChannelCreate(PlatformError::RateLimited);
        assert_eq!(channel_create.steps(), ProvisionSteps::default());

        let record_write = ProvisionError::RecordWrite {
            channel: "channel-7".to_string(),
            source: StoreError::Database("disk full".to_string()),
        };
        let steps = record_write.steps();
        assert_eq!(steps.channel_created.as_deref(), Some("channel-7"));
        assert!(!steps.record_written);
    }

    #[test]
    fn test_render_channel_name_number() {
        assert_eq!(render_channel_name("ticket-{number}", 7, "alice"), "ticket-7");
    }

    #[test]
    fn test_render_channel_name_username_sanitized() {
        assert_eq!(
            render_channel_name("{username}-help", 1, "Alice Smith!"),
            "alice-smith-help"
        );
    }

    #[test]
    fn test_render_channel_name_fallback_when_empty() {
        assert_eq!(render_channel_name("!!!", 3, "???"), "ticket-3");
    }

    #[test]
    fn test_render_channel_name_collapses_dashes() {
        assert_eq!(
            render_channel_name("ticket - {number}", 2, "alice"),
            "ticket-2"
        );
    }
}
