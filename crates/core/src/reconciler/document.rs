//! The declarative settings document.
//!
//! The document is the external data contract for settings import/export.
//! [`super::validate_document`] checks a raw JSON value against the schema
//! before anything is deserialized or mutated.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::records::{Category, GuildSettings};

/// A category entry in the settings document.
///
/// Presence of `id` selects the update path during apply, absence selects
/// the create path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub claiming: bool,
    pub image: Option<String>,
    pub max_per_member: u32,
    pub name: String,
    pub name_format: String,
    pub opening_message: String,
    pub opening_questions: Option<Vec<String>>,
    pub ping: Option<String>,
    pub require_topic: bool,
    pub roles: Vec<String>,
    pub survey: Option<String>,
}

impl CategoryEntry {
    /// Project a persisted category row into a document entry.
    pub fn from_row(row: &Category) -> Self {
        Self {
            id: Some(row.id.clone()),
            claiming: row.claiming,
            image: row.image.clone(),
            max_per_member: row.max_per_member,
            name: row.name.clone(),
            name_format: row.name_format.clone(),
            opening_message: row.opening_message.clone(),
            opening_questions: row.opening_questions.clone(),
            ping: row.ping.clone(),
            require_topic: row.require_topic,
            roles: row.roles.clone(),
            survey: row.survey.clone(),
        }
    }

    /// Overwrite a category row's fields from this entry. The row keeps its
    /// handle and guild.
    pub fn apply_to_row(&self, row: &mut Category) {
        row.claiming = self.claiming;
        row.image = self.image.clone();
        row.max_per_member = self.max_per_member;
        row.name = self.name.clone();
        row.name_format = self.name_format.clone();
        row.opening_message = self.opening_message.clone();
        row.opening_questions = self.opening_questions.clone();
        row.ping = self.ping.clone();
        row.require_topic = self.require_topic;
        row.roles = self.roles.clone();
        row.survey = self.survey.clone();
    }

    /// Build a new category row keyed by a freshly created channel handle.
    pub fn into_row(&self, id: impl Into<String>, guild: impl Into<String>) -> Category {
        Category {
            id: id.into(),
            guild: guild.into(),
            name: self.name.clone(),
            max_per_member: self.max_per_member,
            claiming: self.claiming,
            image: self.image.clone(),
            name_format: self.name_format.clone(),
            opening_message: self.opening_message.clone(),
            opening_questions: self.opening_questions.clone(),
            ping: self.ping.clone(),
            require_topic: self.require_topic,
            roles: self.roles.clone(),
            survey: self.survey.clone(),
        }
    }
}

/// The declarative settings document for one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    pub categories: Vec<CategoryEntry>,
    pub colour: String,
    pub command_prefix: String,
    pub error_colour: String,
    pub footer: String,
    pub locale: String,
    pub log_messages: bool,
    pub success_colour: String,
    /// Survey name to its ordered question prompts. A BTreeMap keeps the
    /// export stable.
    pub surveys: BTreeMap<String, Vec<String>>,
    pub tags: HashMap<String, String>,
}

impl SettingsDocument {
    /// Overwrite the settings singleton's fields verbatim.
    pub fn apply_to_settings(&self, settings: &mut GuildSettings) {
        settings.colour = self.colour.clone();
        settings.command_prefix = self.command_prefix.clone();
        settings.error_colour = self.error_colour.clone();
        settings.footer = self.footer.clone();
        settings.locale = self.locale.clone();
        settings.log_messages = self.log_messages;
        settings.success_colour = self.success_colour.clone();
        settings.tags = self.tags.clone();
    }
}
