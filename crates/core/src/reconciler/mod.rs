//! Declarative settings reconciliation.
//!
//! `apply` diffs a validated settings document against persisted
//! configuration and the live platform resources, performing idempotent
//! create/update operations. `export` is the inverse projection.

mod document;
mod validate;

pub use document::{CategoryEntry, SettingsDocument};
pub use validate::{validate_document, SCHEMA_VERSION};

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::platform::{
    ChannelKind, CreateChannelRequest, Permission, PermissionOverwrite, Platform, PlatformError,
};
use crate::records::{RecordStore, StoreError};

/// A non-conforming settings document. Nothing was mutated.
#[derive(Debug, Error)]
#[error("settings document failed validation: {}", .violations.join(", "))]
pub struct ValidationError {
    /// Every violation found, in document order.
    pub violations: Vec<String>,
}

/// Errors that can abort an apply or export.
///
/// A failure partway through `apply` leaves the steps already performed in
/// place; there is no cross-step transaction.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("record store failure: {0}")]
    Store(#[from] StoreError),

    #[error("platform failure on {resource}: {source}")]
    Platform {
        resource: String,
        #[source]
        source: PlatformError,
    },
}

/// What an apply changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub categories_created: usize,
    pub categories_updated: usize,
    pub surveys_written: usize,
}

/// The export artifact: the document plus a suggested attachment filename.
#[derive(Debug, Clone)]
pub struct SettingsExport {
    pub document: SettingsDocument,
    pub filename: String,
}

/// Reconciles declarative settings documents for a guild.
pub struct SettingsReconciler {
    store: Arc<dyn RecordStore>,
    platform: Arc<dyn Platform>,
    /// The bot's own user handle, granted access on created categories.
    self_user: String,
}

impl SettingsReconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        platform: Arc<dyn Platform>,
        self_user: impl Into<String>,
    ) -> Self {
        Self {
            store,
            platform,
            self_user: self_user.into(),
        }
    }

    /// Apply a raw settings document to `guild`.
    ///
    /// Validation failures report every violation and mutate nothing. After
    /// validation the steps run in order (settings, categories, surveys);
    /// a mid-sequence failure leaves prior steps applied.
    pub async fn apply(&self, guild: &str, document: &Value) -> Result<ApplyReport, ReconcileError> {
        let result = self.apply_inner(guild, document).await;

        let label = match &result {
            Ok(_) => "applied",
            Err(ReconcileError::Validation(_)) => "validation_failed",
            Err(_) => "error",
        };
        metrics::RECONCILE_APPLIES.with_label_values(&[label]).inc();

        result
    }

    async fn apply_inner(
        &self,
        guild: &str,
        document: &Value,
    ) -> Result<ApplyReport, ReconcileError> {
        let violations = validate_document(document);
        if !violations.is_empty() {
            warn!(
                "Settings document for guild {} failed validation with {} violations",
                guild,
                violations.len()
            );
            return Err(ValidationError { violations }.into());
        }

        // Validation passed, so this cannot fail; a mismatch between the
        // schema table and the document type still reports cleanly.
        let document: SettingsDocument =
            serde_json::from_value(document.clone()).map_err(|e| ValidationError {
                violations: vec![e.to_string()],
            })?;

        let mut report = ApplyReport::default();

        let mut settings = self.store.settings(guild)?;
        document.apply_to_settings(&mut settings);
        self.store.save_settings(&settings)?;

        for entry in &document.categories {
            match &entry.id {
                Some(id) => self.update_category(id, entry, &mut report).await?,
                None => self.create_category(guild, entry, &mut report).await?,
            }
        }

        for (name, questions) in &document.surveys {
            self.store.upsert_survey(guild, name, questions)?;
            report.surveys_written += 1;
        }

        info!(
            "Applied settings for guild {}: {} categories updated, {} created, {} surveys",
            guild, report.categories_updated, report.categories_created, report.surveys_written
        );

        Ok(report)
    }

    /// Update path: overwrite the row, then reconcile the live resource.
    /// A row whose backing channel is gone is tolerated as a no-op.
    async fn update_category(
        &self,
        id: &str,
        entry: &CategoryEntry,
        report: &mut ApplyReport,
    ) -> Result<(), ReconcileError> {
        let Some(mut row) = self.store.category(id)? else {
            warn!("Settings document references unknown category {}, skipping", id);
            return Ok(());
        };

        // The row mirrors the live channel name; it only diverges when the
        // document changes it.
        let live_name = row.name.clone();
        entry.apply_to_row(&mut row);
        self.store.update_category(&row)?;
        report.categories_updated += 1;

        if entry.name != live_name {
            match self.platform.rename_channel(id, &entry.name).await {
                Ok(()) => {}
                Err(PlatformError::NotFound(_)) => {
                    debug!("Category channel {} is gone, skipping rename", id);
                    return Ok(());
                }
                Err(source) => {
                    return Err(ReconcileError::Platform {
                        resource: id.to_string(),
                        source,
                    });
                }
            }
        }

        for role in &entry.roles {
            let overwrite =
                PermissionOverwrite::allow_role(role, Permission::participant_set());
            match self.platform.set_permission_overwrite(id, &overwrite).await {
                Ok(()) => {}
                Err(PlatformError::NotFound(_)) => {
                    debug!("Category channel {} is gone, skipping grants", id);
                    return Ok(());
                }
                Err(source) => {
                    return Err(ReconcileError::Platform {
                        resource: id.to_string(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    /// Create path: a new category resource hidden from everyone, visible to
    /// the bot and the listed roles, then a row keyed by the new handle.
    async fn create_category(
        &self,
        guild: &str,
        entry: &CategoryEntry,
        report: &mut ApplyReport,
    ) -> Result<(), ReconcileError> {
        let mut overwrites = vec![
            // The everyone role shares its handle with the guild
            PermissionOverwrite::deny_role(guild, vec![Permission::ViewChannel]),
            PermissionOverwrite::allow_member(&self.self_user, Permission::participant_set()),
        ];
        for role in &entry.roles {
            overwrites.push(PermissionOverwrite::allow_role(
                role,
                Permission::participant_set(),
            ));
        }

        let request = CreateChannelRequest {
            guild: guild.to_string(),
            name: entry.name.clone(),
            kind: ChannelKind::Category,
            parent: None,
            topic: None,
            overwrites,
        };

        let channel =
            self.platform
                .create_channel(&request)
                .await
                .map_err(|source| ReconcileError::Platform {
                    resource: entry.name.clone(),
                    source,
                })?;

        self.store
            .create_category(&entry.into_row(&channel.id, guild))?;
        report.categories_created += 1;

        info!("Created category '{}' ({}) in guild {}", entry.name, channel.id, guild);

        Ok(())
    }

    /// Serialize the guild's categories, surveys and settings into a
    /// document, the inverse projection of `apply`.
    pub fn export(&self, guild: &str) -> Result<SettingsExport, StoreError> {
        let settings = self.store.settings(guild)?;
        let categories = self.store.categories(guild)?;
        let surveys = self.store.surveys(guild)?;

        let document = SettingsDocument {
            categories: categories.iter().map(CategoryEntry::from_row).collect(),
            colour: settings.colour,
            command_prefix: settings.command_prefix,
            error_colour: settings.error_colour,
            footer: settings.footer,
            locale: settings.locale,
            log_messages: settings.log_messages,
            success_colour: settings.success_colour,
            surveys: surveys
                .into_iter()
                .map(|s| (s.name, s.questions))
                .collect(),
            tags: settings.tags,
        };

        Ok(SettingsExport {
            filename: format!("Settings for {}.json", guild),
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SqliteRecordStore;
    use crate::testing::{fixtures, MockPlatform, PlatformCall};

    fn setup() -> (Arc<SqliteRecordStore>, Arc<MockPlatform>, SettingsReconciler) {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let platform = Arc::new(MockPlatform::new());
        let reconciler = SettingsReconciler::new(store.clone(), platform.clone(), "bot-user");
        (store, platform, reconciler)
    }

    #[tokio::test]
    async fn test_invalid_document_is_total_noop() {
        let (store, platform, reconciler) = setup();

        let mut document = fixtures::settings_document();
        document["colour"] = serde_json::json!(42);
        document["log_messages"] = serde_json::json!("yes");

        let error = reconciler.apply("guild-1", &document).await.unwrap_err();
        match error {
            ReconcileError::Validation(validation) => {
                assert_eq!(validation.violations.len(), 2);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        // Zero record writes, zero resource calls
        assert!(platform.calls().await.is_empty());
        let settings = store.settings("guild-1").unwrap();
        assert_eq!(settings, crate::records::GuildSettings::defaults("guild-1"));
    }

    #[tokio::test]
    async fn test_apply_overwrites_settings() {
        let (store, _platform, reconciler) = setup();

        let mut document = fixtures::settings_document();
        document["colour"] = serde_json::json!("#123456");
        document["command_prefix"] = serde_json::json!("!");
        document["tags"] = serde_json::json!({ "faq": "See pins" });

        reconciler.apply("guild-1", &document).await.unwrap();

        let settings = store.settings("guild-1").unwrap();
        assert_eq!(settings.colour, "#123456");
        assert_eq!(settings.command_prefix, "!");
        assert_eq!(settings.tags.get("faq").unwrap(), "See pins");
    }

    #[tokio::test]
    async fn test_entry_without_id_creates_resource_and_row() {
        let (store, platform, reconciler) = setup();

        let mut document = fixtures::settings_document();
        document["categories"] = serde_json::json!([fixtures::category_entry(None, "Support")]);

        let report = reconciler.apply("guild-1", &document).await.unwrap();
        assert_eq!(report.categories_created, 1);
        assert_eq!(report.categories_updated, 0);

        // Exactly one category-type resource was created
        let created = platform.created_channels().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, ChannelKind::Category);
        assert_eq!(created[0].name, "Support");

        // Everyone is denied view, the bot and the listed role are allowed
        assert_eq!(created[0].overwrites[0].id, "guild-1");
        assert_eq!(created[0].overwrites[0].deny, vec![Permission::ViewChannel]);
        assert_eq!(created[0].overwrites[1].id, "bot-user");
        assert_eq!(created[0].overwrites[2].id, "role-support");

        // Exactly one row, keyed by the new handle
        let categories = store.categories("guild-1").unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, "channel-1");
        assert_eq!(categories[0].name, "Support");
    }

    #[tokio::test]
    async fn test_entry_with_id_updates_row_in_place() {
        let (store, platform, reconciler) = setup();
        store
            .create_category(&fixtures::category("cat-1", "guild-1", "Support"))
            .unwrap();

        let mut entry = fixtures::category_entry(Some("cat-1"), "Billing");
        entry["max_per_member"] = serde_json::json!(3);
        let mut document = fixtures::settings_document();
        document["categories"] = serde_json::json!([entry]);

        let report = reconciler.apply("guild-1", &document).await.unwrap();
        assert_eq!(report.categories_updated, 1);
        assert_eq!(report.categories_created, 0);

        let row = store.category("cat-1").unwrap().unwrap();
        assert_eq!(row.name, "Billing");
        assert_eq!(row.max_per_member, 3);

        // The live resource was renamed because the name differed
        assert!(platform.calls().await.iter().any(|c| matches!(
            c,
            PlatformCall::RenameChannel { channel, name } if channel == "cat-1" && name == "Billing"
        )));

        // Role grants were reconciled
        let overwrites = platform.overwrites_set().await;
        assert_eq!(overwrites.len(), 1);
        assert_eq!(overwrites[0].0, "cat-1");
        assert_eq!(overwrites[0].1.id, "role-support");
    }

    #[tokio::test]
    async fn test_unchanged_name_is_not_renamed() {
        let (store, platform, reconciler) = setup();
        store
            .create_category(&fixtures::category("cat-1", "guild-1", "Support"))
            .unwrap();

        let mut document = fixtures::settings_document();
        document["categories"] =
            serde_json::json!([fixtures::category_entry(Some("cat-1"), "Support")]);

        reconciler.apply("guild-1", &document).await.unwrap();

        assert!(!platform
            .calls()
            .await
            .iter()
            .any(|c| matches!(c, PlatformCall::RenameChannel { .. })));
    }

    #[tokio::test]
    async fn test_dangling_row_is_tolerated() {
        let (store, platform, reconciler) = setup();
        store
            .create_category(&fixtures::category("cat-1", "guild-1", "Support"))
            .unwrap();

        // The backing channel is gone; the rename fails with NotFound
        platform
            .set_next_error(PlatformError::NotFound("unknown channel".to_string()))
            .await;

        let mut document = fixtures::settings_document();
        document["categories"] =
            serde_json::json!([fixtures::category_entry(Some("cat-1"), "Billing")]);

        let report = reconciler.apply("guild-1", &document).await.unwrap();
        assert_eq!(report.categories_updated, 1);

        // The row was still updated
        let row = store.category("cat-1").unwrap().unwrap();
        assert_eq!(row.name, "Billing");
    }

    #[tokio::test]
    async fn test_unknown_category_reference_is_skipped() {
        let (store, platform, reconciler) = setup();

        let mut document = fixtures::settings_document();
        document["categories"] =
            serde_json::json!([fixtures::category_entry(Some("missing"), "Ghost")]);

        let report = reconciler.apply("guild-1", &document).await.unwrap();
        assert_eq!(report.categories_updated, 0);
        assert_eq!(report.categories_created, 0);
        assert!(platform.calls().await.is_empty());
        assert!(store.categories("guild-1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_surveys_found_or_created_and_overwritten() {
        let (store, _platform, reconciler) = setup();
        store
            .upsert_survey("guild-1", "feedback", &["Old question?".to_string()])
            .unwrap();

        let mut document = fixtures::settings_document();
        document["surveys"] = serde_json::json!({
            "feedback": ["Was this helpful?", "Any comments?"],
            "exit": ["Why are you leaving?"]
        });

        let report = reconciler.apply("guild-1", &document).await.unwrap();
        assert_eq!(report.surveys_written, 2);

        let feedback = store.survey("guild-1", "feedback").unwrap().unwrap();
        assert_eq!(
            feedback.questions,
            vec!["Was this helpful?", "Any comments?"]
        );
        let exit = store.survey("guild-1", "exit").unwrap().unwrap();
        assert_eq!(exit.questions, vec!["Why are you leaving?"]);
    }

    #[tokio::test]
    async fn test_mid_sequence_failure_leaves_prior_steps_applied() {
        let (store, platform, reconciler) = setup();

        let mut document = fixtures::settings_document();
        document["colour"] = serde_json::json!("#ABCDEF");
        document["categories"] = serde_json::json!([fixtures::category_entry(None, "Support")]);

        // Settings save succeeds, then channel creation fails
        platform.set_next_error(PlatformError::RateLimited).await;

        let error = reconciler.apply("guild-1", &document).await.unwrap_err();
        assert!(matches!(error, ReconcileError::Platform { .. }));

        // The settings overwrite from step two is still in place
        let settings = store.settings("guild-1").unwrap();
        assert_eq!(settings.colour, "#ABCDEF");
        // No category row was written for the failed resource
        assert!(store.categories("guild-1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_then_apply_is_idempotent() {
        let (store, platform, reconciler) = setup();
        store
            .create_category(&fixtures::category("cat-1", "guild-1", "Support"))
            .unwrap();
        store
            .upsert_survey("guild-1", "feedback", &["Was this helpful?".to_string()])
            .unwrap();

        let export = reconciler.export("guild-1").unwrap();
        assert_eq!(export.filename, "Settings for guild-1.json");

        let document = serde_json::to_value(&export.document).unwrap();
        reconciler.apply("guild-1", &document).await.unwrap();

        // No new resources were created and the records round-tripped
        assert!(platform.created_channels().await.is_empty());
        let reexport = reconciler.export("guild-1").unwrap();
        assert_eq!(reexport.document, export.document);
    }
}
