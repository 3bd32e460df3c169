//! Testing utilities and mock implementations for integration tests.
//!
//! Provides a mock implementation of the [`Platform`](crate::platform::Platform)
//! trait plus record fixtures, allowing the ticket flows to be exercised
//! without real infrastructure.

mod mock_platform;

pub use mock_platform::{MockPlatform, PlatformCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::records::Category;

    /// Create a test category with reasonable defaults.
    pub fn category(id: &str, guild: &str, name: &str) -> Category {
        Category {
            id: id.to_string(),
            guild: guild.to_string(),
            name: name.to_string(),
            max_per_member: 1,
            claiming: false,
            image: None,
            name_format: "ticket-{number}".to_string(),
            opening_message: "A member of staff will be with you shortly.".to_string(),
            opening_questions: None,
            ping: None,
            require_topic: false,
            roles: vec!["role-support".to_string()],
            survey: None,
        }
    }

    /// A minimal settings document that passes schema validation.
    pub fn settings_document() -> serde_json::Value {
        serde_json::json!({
            "colour": "#009999",
            "command_prefix": "-",
            "error_colour": "RED",
            "footer": "Support",
            "locale": "en-GB",
            "log_messages": false,
            "success_colour": "GREEN",
            "tags": {},
            "categories": [],
            "surveys": {}
        })
    }

    /// A category entry for a settings document. `id: None` selects the
    /// create path.
    pub fn category_entry(id: Option<&str>, name: &str) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "claiming": false,
            "image": null,
            "max_per_member": 1,
            "name": name,
            "name_format": "ticket-{number}",
            "opening_message": "A member of staff will be with you shortly.",
            "opening_questions": null,
            "ping": null,
            "require_topic": false,
            "roles": ["role-support"],
            "survey": null
        });
        if let Some(id) = id {
            entry["id"] = serde_json::Value::String(id.to_string());
        }
        entry
    }
}
