//! The platform resource collaborator trait.

use async_trait::async_trait;

use super::{
    ChannelInfo, CreateChannelRequest, Member, MessageRef, PermissionOverwrite, PlatformError,
};

/// Asynchronous operations against the chat platform's resource graph.
///
/// Each operation can fail (network/permission error) or be rate-limited.
/// Implementations do not retry; callers decide what a failure means.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create a channel-like resource.
    async fn create_channel(
        &self,
        request: &CreateChannelRequest,
    ) -> Result<ChannelInfo, PlatformError>;

    /// Rename an existing channel.
    async fn rename_channel(&self, channel: &str, name: &str) -> Result<(), PlatformError>;

    /// Create or replace a permission overwrite on a channel.
    async fn set_permission_overwrite(
        &self,
        channel: &str,
        overwrite: &PermissionOverwrite,
    ) -> Result<(), PlatformError>;

    /// Delete a permission overwrite from a channel.
    async fn delete_permission_overwrite(
        &self,
        channel: &str,
        overwrite_id: &str,
    ) -> Result<(), PlatformError>;

    /// Send a plain text message to a channel.
    async fn send_message(&self, channel: &str, content: &str)
        -> Result<MessageRef, PlatformError>;

    /// Edit a previously sent message.
    async fn edit_message(&self, message: &MessageRef, content: &str)
        -> Result<(), PlatformError>;

    /// Delete a message.
    async fn delete_message(&self, message: &MessageRef) -> Result<(), PlatformError>;

    /// Add a unicode emoji reaction to a message as the bot identity.
    async fn add_reaction(&self, message: &MessageRef, emoji: &str) -> Result<(), PlatformError>;

    /// Remove every reaction from a message.
    async fn remove_all_reactions(&self, message: &MessageRef) -> Result<(), PlatformError>;

    /// Fetch a guild member.
    async fn fetch_member(&self, guild: &str, user: &str) -> Result<Member, PlatformError>;
}
