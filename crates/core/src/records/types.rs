//! Persisted record types for guilds, categories, tickets and surveys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A configured ticket category.
///
/// The `id` is the platform handle of the live category channel backing this
/// row. Rows whose channel has been deleted out from under us are tolerated
/// by the reconciler as no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Category channel handle (primary key).
    pub id: String,
    /// Owning guild.
    pub guild: String,
    /// Display name, kept in sync with the live channel name.
    pub name: String,
    /// Per-member open-ticket limit.
    pub max_per_member: u32,
    /// Whether staff can claim tickets in this category.
    pub claiming: bool,
    /// Optional image shown in the opening message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Ticket channel name template (`{number}`, `{username}`).
    pub name_format: String,
    /// Message posted when a ticket opens.
    pub opening_message: String,
    /// Questions appended to the opening message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_questions: Option<Vec<String>>,
    /// Role or user pinged on ticket creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<String>,
    /// Whether a topic argument is mandatory.
    pub require_topic: bool,
    /// Support role handles granted access to ticket channels.
    pub roles: Vec<String>,
    /// Survey sent when a ticket closes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey: Option<String>,
}

/// A single support ticket, backed by one text channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Backing channel handle (primary key).
    pub id: String,
    /// Owning guild.
    pub guild: String,
    /// Per-guild ordinal, used by `name_format`.
    pub number: u32,
    /// User who opened the ticket.
    pub creator: String,
    /// Category this ticket belongs to (same guild).
    pub category: String,
    /// Topic supplied at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// False once the ticket is closed.
    pub open: bool,
    /// Staff member currently claiming the ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    /// Handle of the opening message, the anchor for claim reactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_message: Option<String>,
    /// When the ticket was created.
    pub created_at: DateTime<Utc>,
}

/// A post-ticket survey definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    /// Owning guild.
    pub guild: String,
    /// Survey name, unique per guild.
    pub name: String,
    /// Ordered question prompts.
    pub questions: Vec<String>,
}

/// Per-guild singleton settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    /// Owning guild.
    pub guild: String,
    pub colour: String,
    pub command_prefix: String,
    pub error_colour: String,
    pub footer: String,
    pub locale: String,
    pub log_messages: bool,
    pub success_colour: String,
    /// Tag name to tag content.
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl GuildSettings {
    /// Settings used for a guild with no persisted row yet.
    pub fn defaults(guild: impl Into<String>) -> Self {
        Self {
            guild: guild.into(),
            colour: "#009999".to_string(),
            command_prefix: "-".to_string(),
            error_colour: "RED".to_string(),
            footer: "Powered by deskbot".to_string(),
            locale: "en-GB".to_string(),
            log_messages: false,
            success_colour: "GREEN".to_string(),
            tags: HashMap::new(),
        }
    }
}
