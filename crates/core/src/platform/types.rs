//! Types for platform resource operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during platform operations.
///
/// Every operation can fail with a network/permission error or be
/// rate-limited; failures are logged and the operation abandoned, no
/// automatic retry happens in this core.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited")]
    RateLimited,

    #[error("missing permission: {0}")]
    Permission(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError::Network(err.to_string())
    }
}

/// Kind of channel-like resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Plain text channel.
    Text,
    /// Category container channel.
    Category,
}

/// Whether a permission overwrite targets a role or a single member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteKind {
    Role,
    Member,
}

/// Channel permissions this core cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewChannel,
    SendMessages,
    ReadMessageHistory,
    EmbedLinks,
    AttachFiles,
}

impl Permission {
    /// The permission set granted to ticket participants.
    pub fn participant_set() -> Vec<Permission> {
        vec![
            Permission::ViewChannel,
            Permission::SendMessages,
            Permission::ReadMessageHistory,
            Permission::EmbedLinks,
            Permission::AttachFiles,
        ]
    }
}

/// A permission overwrite on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    /// Role or member handle the overwrite applies to.
    pub id: String,
    pub kind: OverwriteKind,
    #[serde(default)]
    pub allow: Vec<Permission>,
    #[serde(default)]
    pub deny: Vec<Permission>,
}

impl PermissionOverwrite {
    /// Grant `allow` to a role.
    pub fn allow_role(id: impl Into<String>, allow: Vec<Permission>) -> Self {
        Self {
            id: id.into(),
            kind: OverwriteKind::Role,
            allow,
            deny: Vec::new(),
        }
    }

    /// Grant `allow` to a member.
    pub fn allow_member(id: impl Into<String>, allow: Vec<Permission>) -> Self {
        Self {
            id: id.into(),
            kind: OverwriteKind::Member,
            allow,
            deny: Vec::new(),
        }
    }

    /// Deny `deny` to a role.
    pub fn deny_role(id: impl Into<String>, deny: Vec<Permission>) -> Self {
        Self {
            id: id.into(),
            kind: OverwriteKind::Role,
            allow: Vec::new(),
            deny,
        }
    }
}

/// Request to create a new channel-like resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChannelRequest {
    /// Owning guild.
    pub guild: String,
    /// Channel name.
    pub name: String,
    pub kind: ChannelKind,
    /// Parent category handle, for text channels inside a category.
    pub parent: Option<String>,
    /// Channel topic.
    pub topic: Option<String>,
    pub overwrites: Vec<PermissionOverwrite>,
}

/// A created channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Platform handle.
    pub id: String,
    pub name: String,
    pub kind: ChannelKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Reference to a message within a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Channel handle.
    pub channel: String,
    /// Message handle.
    pub id: String,
}

impl MessageRef {
    pub fn new(channel: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            id: id.into(),
        }
    }
}

/// A guild member as seen by this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// User handle.
    pub id: String,
    pub username: String,
    /// Role handles held in the guild.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A reaction added to or removed from a message.
///
/// Delivered by the gateway layer through an mpsc channel; this core never
/// listens to the gateway itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message: MessageRef,
    /// User who reacted.
    pub user: String,
    /// Unicode emoji of the reaction.
    pub emoji: String,
}
