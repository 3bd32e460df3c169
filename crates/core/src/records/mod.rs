//! Record storage for categories, tickets, surveys and guild settings.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteRecordStore;
pub use store::{CreateTicketRecord, RecordStore, StoreError, TicketQuery};
pub use types::{Category, GuildSettings, Survey, Ticket};
