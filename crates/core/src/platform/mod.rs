//! Platform resource collaborator: trait, types and the Discord REST client.

mod discord;
mod traits;
mod types;

pub use discord::DiscordRestClient;
pub use traits::Platform;
pub use types::{
    ChannelInfo, ChannelKind, CreateChannelRequest, Member, MessageRef, OverwriteKind, Permission,
    PermissionOverwrite, PlatformError, ReactionEvent,
};
