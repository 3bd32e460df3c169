//! Discord REST API client.
//!
//! Implements the [`Platform`] trait over the v10 REST API. Reaction pacing
//! and retry decisions live with the callers; this client performs one
//! request per operation and reports rate limits as errors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DiscordConfig;

use super::{
    ChannelInfo, ChannelKind, CreateChannelRequest, Member, MessageRef, OverwriteKind, Permission,
    PermissionOverwrite, Platform, PlatformError,
};

const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;
const EMBED_LINKS: u64 = 1 << 14;
const ATTACH_FILES: u64 = 1 << 15;
const READ_MESSAGE_HISTORY: u64 = 1 << 16;

fn permission_bits(permissions: &[Permission]) -> u64 {
    permissions.iter().fold(0, |bits, p| {
        bits | match p {
            Permission::ViewChannel => VIEW_CHANNEL,
            Permission::SendMessages => SEND_MESSAGES,
            Permission::ReadMessageHistory => READ_MESSAGE_HISTORY,
            Permission::EmbedLinks => EMBED_LINKS,
            Permission::AttachFiles => ATTACH_FILES,
        }
    })
}

fn channel_type(kind: ChannelKind) -> u8 {
    match kind {
        ChannelKind::Text => 0,
        ChannelKind::Category => 4,
    }
}

fn overwrite_type(kind: OverwriteKind) -> u8 {
    match kind {
        OverwriteKind::Role => 0,
        OverwriteKind::Member => 1,
    }
}

#[derive(Debug, Serialize)]
struct OverwritePayload {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    /// Bitfields are serialized as decimal strings on the wire.
    allow: String,
    deny: String,
}

impl From<&PermissionOverwrite> for OverwritePayload {
    fn from(overwrite: &PermissionOverwrite) -> Self {
        Self {
            id: overwrite.id.clone(),
            kind: overwrite_type(overwrite.kind),
            allow: permission_bits(&overwrite.allow).to_string(),
            deny: permission_bits(&overwrite.deny).to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateChannelPayload {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<String>,
    permission_overwrites: Vec<OverwritePayload>,
}

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    id: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct MemberResponse {
    user: MemberUser,
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MemberUser {
    id: String,
    username: String,
}

/// Discord REST API client.
pub struct DiscordRestClient {
    client: Client,
    base_url: String,
    token: String,
}

impl DiscordRestClient {
    /// Create a new client from the Discord configuration section.
    pub fn new(config: &DiscordConfig) -> Result<Self, PlatformError> {
        if config.token.is_empty() {
            return Err(PlatformError::Permission(
                "a bot token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        let base_url = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Map non-success statuses onto the error taxonomy.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
        let status = response.status();
        if status == 401 || status == 403 {
            return Err(PlatformError::Permission(format!("status {}", status)));
        }
        if status == 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::NotFound(body));
        }
        if status == 429 {
            return Err(PlatformError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Platform for DiscordRestClient {
    async fn create_channel(
        &self,
        request: &CreateChannelRequest,
    ) -> Result<ChannelInfo, PlatformError> {
        let url = format!("{}/guilds/{}/channels", self.base_url, request.guild);

        debug!("Creating channel '{}' in guild {}", request.name, request.guild);

        let payload = CreateChannelPayload {
            name: request.name.clone(),
            kind: channel_type(request.kind),
            parent_id: request.parent.clone(),
            topic: request.topic.clone(),
            permission_overwrites: request.overwrites.iter().map(Into::into).collect(),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&payload)
            .send()
            .await?;

        let channel: ChannelResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Parse(format!("channel response: {}", e)))?;

        Ok(ChannelInfo {
            id: channel.id,
            name: channel.name,
            kind: if channel.kind == 4 {
                ChannelKind::Category
            } else {
                ChannelKind::Text
            },
            parent: channel.parent_id,
        })
    }

    async fn rename_channel(&self, channel: &str, name: &str) -> Result<(), PlatformError> {
        let url = format!("{}/channels/{}", self.base_url, channel);

        debug!("Renaming channel {} to '{}'", channel, name);

        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn set_permission_overwrite(
        &self,
        channel: &str,
        overwrite: &PermissionOverwrite,
    ) -> Result<(), PlatformError> {
        let url = format!(
            "{}/channels/{}/permissions/{}",
            self.base_url, channel, overwrite.id
        );

        let payload = OverwritePayload::from(overwrite);

        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({
                "type": payload.kind,
                "allow": payload.allow,
                "deny": payload.deny,
            }))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete_permission_overwrite(
        &self,
        channel: &str,
        overwrite_id: &str,
    ) -> Result<(), PlatformError> {
        let url = format!(
            "{}/channels/{}/permissions/{}",
            self.base_url, channel, overwrite_id
        );

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel: &str,
        content: &str,
    ) -> Result<MessageRef, PlatformError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;

        let message: MessageResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Parse(format!("message response: {}", e)))?;

        Ok(MessageRef::new(message.channel_id, message.id))
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        content: &str,
    ) -> Result<(), PlatformError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.base_url, message.channel, message.id
        );

        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), PlatformError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.base_url, message.channel, message.id
        );

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn add_reaction(&self, message: &MessageRef, emoji: &str) -> Result<(), PlatformError> {
        // Unicode emoji must be percent-encoded in the path segment.
        let url = format!(
            "{}/channels/{}/messages/{}/reactions/{}/@me",
            self.base_url,
            message.channel,
            message.id,
            urlencoding::encode(emoji)
        );

        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Length", "0")
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn remove_all_reactions(&self, message: &MessageRef) -> Result<(), PlatformError> {
        let url = format!(
            "{}/channels/{}/messages/{}/reactions",
            self.base_url, message.channel, message.id
        );

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_member(&self, guild: &str, user: &str) -> Result<Member, PlatformError> {
        let url = format!("{}/guilds/{}/members/{}", self.base_url, guild, user);

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let member: MemberResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| PlatformError::Parse(format!("member response: {}", e)))?;

        Ok(Member {
            id: member.user.id,
            username: member.user.username,
            roles: member.roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_bits() {
        assert_eq!(permission_bits(&[Permission::ViewChannel]), 1 << 10);
        assert_eq!(
            permission_bits(&[Permission::ViewChannel, Permission::SendMessages]),
            (1 << 10) | (1 << 11)
        );
        assert_eq!(permission_bits(&[]), 0);
    }

    #[test]
    fn test_participant_set_bits() {
        let bits = permission_bits(&Permission::participant_set());
        assert_eq!(
            bits,
            VIEW_CHANNEL | SEND_MESSAGES | READ_MESSAGE_HISTORY | EMBED_LINKS | ATTACH_FILES
        );
    }

    #[test]
    fn test_overwrite_payload_serializes_bitfields_as_strings() {
        let overwrite = PermissionOverwrite::deny_role("everyone", vec![Permission::ViewChannel]);
        let payload = OverwritePayload::from(&overwrite);
        assert_eq!(payload.allow, "0");
        assert_eq!(payload.deny, (1u64 << 10).to_string());
        assert_eq!(payload.kind, 0);
    }

    #[test]
    fn test_channel_and_overwrite_type_codes() {
        assert_eq!(channel_type(ChannelKind::Text), 0);
        assert_eq!(channel_type(ChannelKind::Category), 4);
        assert_eq!(overwrite_type(OverwriteKind::Role), 0);
        assert_eq!(overwrite_type(OverwriteKind::Member), 1);
    }

    #[test]
    fn test_client_requires_token() {
        let config = DiscordConfig {
            token: String::new(),
            api_base: None,
            timeout_secs: 30,
        };
        assert!(DiscordRestClient::new(&config).is_err());
    }
}
