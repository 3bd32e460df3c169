//! Mock platform for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::platform::{
    ChannelInfo, CreateChannelRequest, Member, MessageRef, PermissionOverwrite, Platform,
    PlatformError,
};

/// A recorded platform operation, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    CreateChannel(CreateChannelRequest),
    RenameChannel { channel: String, name: String },
    SetOverwrite { channel: String, overwrite: PermissionOverwrite },
    DeleteOverwrite { channel: String, overwrite_id: String },
    SendMessage { channel: String, content: String },
    EditMessage { message: MessageRef, content: String },
    DeleteMessage(MessageRef),
    AddReaction { message: MessageRef, emoji: String },
    RemoveAllReactions(MessageRef),
    FetchMember { guild: String, user: String },
}

/// Mock implementation of the Platform trait.
///
/// Provides controllable behavior for testing:
/// - Records every operation for assertions
/// - Generates deterministic handles (`channel-1`, `message-1`, ...)
/// - Simulates one-shot failures via [`MockPlatform::set_next_error`]
///
/// # Example
///
/// ```rust,ignore
/// let platform = MockPlatform::new();
///
/// platform.send_message("channel-9", "hello").await?;
///
/// let sent = platform.sent_messages().await;
/// assert_eq!(sent.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockPlatform {
    /// Recorded operations, in call order.
    calls: Arc<RwLock<Vec<PlatformCall>>>,
    /// If set, the next operation fails with this error.
    next_error: Arc<RwLock<Option<PlatformError>>>,
    /// Members returned by fetch_member; unknown users are synthesized.
    members: Arc<RwLock<HashMap<String, Member>>>,
    /// Counter for generating unique handles.
    handle_counter: AtomicU64,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Create a new mock platform.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            members: Arc::new(RwLock::new(HashMap::new())),
            handle_counter: AtomicU64::new(0),
        }
    }

    /// Make the next platform operation fail with `error`.
    pub async fn set_next_error(&self, error: PlatformError) {
        *self.next_error.write().await = Some(error);
    }

    /// Register a member returned by `fetch_member`.
    pub async fn add_member(&self, member: Member) {
        self.members.write().await.insert(member.id.clone(), member);
    }

    /// All recorded operations, in call order.
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.calls.read().await.clone()
    }

    /// Clear recorded operations.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Recorded channel creation requests.
    pub async fn created_channels(&self) -> Vec<CreateChannelRequest> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                PlatformCall::CreateChannel(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded message sends as (channel, content) pairs.
    pub async fn sent_messages(&self) -> Vec<(String, String)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                PlatformCall::SendMessage { channel, content } => {
                    Some((channel.clone(), content.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Recorded reaction additions as (message, emoji) pairs, in call order.
    pub async fn added_reactions(&self) -> Vec<(MessageRef, String)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                PlatformCall::AddReaction { message, emoji } => {
                    Some((message.clone(), emoji.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Recorded message deletions.
    pub async fn deleted_messages(&self) -> Vec<MessageRef> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                PlatformCall::DeleteMessage(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded permission overwrites as (channel, overwrite) pairs.
    pub async fn overwrites_set(&self) -> Vec<(String, PermissionOverwrite)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                PlatformCall::SetOverwrite { channel, overwrite } => {
                    Some((channel.clone(), overwrite.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn next_handle(&self, prefix: &str) -> String {
        let n = self.handle_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }

    async fn record(&self, call: PlatformCall) -> Result<(), PlatformError> {
        self.calls.write().await.push(call);
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn create_channel(
        &self,
        request: &CreateChannelRequest,
    ) -> Result<ChannelInfo, PlatformError> {
        self.record(PlatformCall::CreateChannel(request.clone()))
            .await?;

        Ok(ChannelInfo {
            id: self.next_handle("channel"),
            name: request.name.clone(),
            kind: request.kind,
            parent: request.parent.clone(),
        })
    }

    async fn rename_channel(&self, channel: &str, name: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::RenameChannel {
            channel: channel.to_string(),
            name: name.to_string(),
        })
        .await
    }

    async fn set_permission_overwrite(
        &self,
        channel: &str,
        overwrite: &PermissionOverwrite,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::SetOverwrite {
            channel: channel.to_string(),
            overwrite: overwrite.clone(),
        })
        .await
    }

    async fn delete_permission_overwrite(
        &self,
        channel: &str,
        overwrite_id: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::DeleteOverwrite {
            channel: channel.to_string(),
            overwrite_id: overwrite_id.to_string(),
        })
        .await
    }

    async fn send_message(
        &self,
        channel: &str,
        content: &str,
    ) -> Result<MessageRef, PlatformError> {
        self.record(PlatformCall::SendMessage {
            channel: channel.to_string(),
            content: content.to_string(),
        })
        .await?;

        Ok(MessageRef::new(channel, self.next_handle("message")))
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        content: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::EditMessage {
            message: message.clone(),
            content: content.to_string(),
        })
        .await
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), PlatformError> {
        self.record(PlatformCall::DeleteMessage(message.clone())).await
    }

    async fn add_reaction(&self, message: &MessageRef, emoji: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::AddReaction {
            message: message.clone(),
            emoji: emoji.to_string(),
        })
        .await
    }

    async fn remove_all_reactions(&self, message: &MessageRef) -> Result<(), PlatformError> {
        self.record(PlatformCall::RemoveAllReactions(message.clone()))
            .await
    }

    async fn fetch_member(&self, guild: &str, user: &str) -> Result<Member, PlatformError> {
        self.record(PlatformCall::FetchMember {
            guild: guild.to_string(),
            user: user.to_string(),
        })
        .await?;

        if let Some(member) = self.members.read().await.get(user) {
            return Ok(member.clone());
        }

        // Unknown users are synthesized so tests only register members when
        // roles matter.
        Ok(Member {
            id: user.to_string(),
            username: format!("member-{}", user),
            roles: Vec::new(),
        })
    }
}
