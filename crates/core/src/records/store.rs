//! Record store trait and query types.

use thiserror::Error;

use super::{Category, GuildSettings, Survey, Ticket};

/// Error type for record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// A stored JSON column failed to round-trip.
    #[error("corrupt record data: {0}")]
    Corrupt(String),
}

/// Request to persist a new ticket record.
///
/// The `id` is the handle of the already-created backing channel; the store
/// never invents ticket ids.
#[derive(Debug, Clone)]
pub struct CreateTicketRecord {
    /// Backing channel handle.
    pub id: String,
    /// Owning guild.
    pub guild: String,
    /// Per-guild ordinal (see [`RecordStore::next_ticket_number`]).
    pub number: u32,
    /// User opening the ticket.
    pub creator: String,
    /// Category handle.
    pub category: String,
    /// Optional topic.
    pub topic: Option<String>,
}

/// Filter for querying tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    /// Filter by guild.
    pub guild: Option<String>,
    /// Filter by category handle.
    pub category: Option<String>,
    /// Filter by creator.
    pub creator: Option<String>,
    /// Filter by open flag.
    pub open: Option<bool>,
}

impl TicketQuery {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by guild.
    pub fn in_guild(mut self, guild: impl Into<String>) -> Self {
        self.guild = Some(guild.into());
        self
    }

    /// Filter by category handle.
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Filter by creator.
    pub fn by_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Filter by open flag.
    pub fn open(mut self, open: bool) -> Self {
        self.open = Some(open);
        self
    }
}

/// Trait for record storage backends.
///
/// Exposes narrow find/create/update/count operations over Category, Ticket,
/// Survey and Settings records. No cross-operation transaction guarantees are
/// assumed by callers; each method is individually atomic at best.
pub trait RecordStore: Send + Sync {
    /// Get a category by channel handle.
    fn category(&self, id: &str) -> Result<Option<Category>, StoreError>;

    /// List all categories for a guild, in insertion order.
    fn categories(&self, guild: &str) -> Result<Vec<Category>, StoreError>;

    /// Persist a new category row. The row carries its channel handle.
    fn create_category(&self, category: &Category) -> Result<(), StoreError>;

    /// Overwrite an existing category row in place.
    fn update_category(&self, category: &Category) -> Result<(), StoreError>;

    /// Persist a new ticket record with `open = true`.
    fn create_ticket(&self, request: CreateTicketRecord) -> Result<Ticket, StoreError>;

    /// Get a ticket by channel handle.
    fn ticket(&self, id: &str) -> Result<Option<Ticket>, StoreError>;

    /// List tickets matching the query, oldest first.
    fn tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError>;

    /// Count tickets matching the query.
    fn count_tickets(&self, query: &TicketQuery) -> Result<i64, StoreError>;

    /// Overwrite a ticket row in place (claim/release/close mutations).
    fn update_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Next per-guild ticket ordinal (1-based).
    fn next_ticket_number(&self, guild: &str) -> Result<u32, StoreError>;

    /// Get a survey by (guild, name).
    fn survey(&self, guild: &str, name: &str) -> Result<Option<Survey>, StoreError>;

    /// List all surveys for a guild.
    fn surveys(&self, guild: &str) -> Result<Vec<Survey>, StoreError>;

    /// Find-or-create a survey and overwrite its question list.
    fn upsert_survey(
        &self,
        guild: &str,
        name: &str,
        questions: &[String],
    ) -> Result<Survey, StoreError>;

    /// Get the settings singleton for a guild, defaults when absent.
    fn settings(&self, guild: &str) -> Result<GuildSettings, StoreError>;

    /// Overwrite the settings singleton for a guild.
    fn save_settings(&self, settings: &GuildSettings) -> Result<(), StoreError>;
}
