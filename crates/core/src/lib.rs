//! deskbot-core: support ticket management for Discord guilds.
//!
//! Provisions ticket channels with per-member quotas and a reaction-driven
//! category prompt, and reconciles declarative settings documents against
//! persisted records and live guild resources. The command/presentation
//! layer, the gateway connection and localization live outside this crate;
//! they reach the core through [`intake`], [`reconciler`] and [`lifecycle`]
//! and feed reaction events in through plain channels.

pub mod config;
pub mod ephemeral;
pub mod intake;
pub mod lifecycle;
pub mod metrics;
pub mod platform;
pub mod provisioner;
pub mod quota;
pub mod reconciler;
pub mod records;
pub mod selector;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use ephemeral::EphemeralScheduler;
pub use intake::{IntakeError, OpenOutcome, OpenRequest, TicketIntake};
pub use lifecycle::{LifecycleError, TicketLifecycle};
pub use platform::{DiscordRestClient, Platform, PlatformError, ReactionEvent};
pub use provisioner::{CreateOutcome, ProvisionError, TicketProvisioner};
pub use quota::{Admission, DenialReason, QuotaDenial, QuotaEnforcer};
pub use reconciler::{ReconcileError, SettingsReconciler, ValidationError};
pub use records::{Category, GuildSettings, RecordStore, SqliteRecordStore, Survey, Ticket};
pub use selector::{CategorySelector, SelectionOutcome, SelectorError};
