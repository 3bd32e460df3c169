//! Pure schema validation for settings documents.
//!
//! The schema is a versioned table of field specifications, external to the
//! reconciliation logic. Validation is a pure function from a raw document
//! to the full list of violations; nothing is mutated until it returns
//! empty.

use serde_json::Value;

/// Bumped whenever the document contract changes shape.
pub const SCHEMA_VERSION: u32 = 1;

/// Value shapes a field can require.
#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    /// String or null.
    OptStr,
    Bool,
    /// Non-negative integer.
    UInt,
    /// List of strings.
    StrList,
    /// List of strings or null.
    OptStrList,
    /// Object mapping strings to strings.
    StrMap,
}

impl Kind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Kind::Str => value.is_string(),
            Kind::OptStr => value.is_string() || value.is_null(),
            Kind::Bool => value.is_boolean(),
            Kind::UInt => value.as_u64().is_some(),
            Kind::StrList => is_string_list(value),
            Kind::OptStrList => value.is_null() || is_string_list(value),
            Kind::StrMap => match value.as_object() {
                Some(map) => map.values().all(Value::is_string),
                None => false,
            },
        }
    }

    fn expected(self) -> &'static str {
        match self {
            Kind::Str => "expected a string",
            Kind::OptStr => "expected a string or null",
            Kind::Bool => "expected a boolean",
            Kind::UInt => "expected a non-negative integer",
            Kind::StrList => "expected a list of strings",
            Kind::OptStrList => "expected a list of strings or null",
            Kind::StrMap => "expected a map of strings",
        }
    }
}

fn is_string_list(value: &Value) -> bool {
    match value.as_array() {
        Some(items) => items.iter().all(Value::is_string),
        None => false,
    }
}

struct FieldSpec {
    name: &'static str,
    kind: Kind,
    required: bool,
}

const fn field(name: &'static str, kind: Kind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: Kind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

const TOP_LEVEL_FIELDS: &[FieldSpec] = &[
    field("colour", Kind::Str),
    field("command_prefix", Kind::Str),
    field("error_colour", Kind::Str),
    field("footer", Kind::Str),
    field("locale", Kind::Str),
    field("log_messages", Kind::Bool),
    field("success_colour", Kind::Str),
    field("tags", Kind::StrMap),
];

const CATEGORY_FIELDS: &[FieldSpec] = &[
    optional("id", Kind::Str),
    field("claiming", Kind::Bool),
    field("image", Kind::OptStr),
    field("max_per_member", Kind::UInt),
    field("name", Kind::Str),
    field("name_format", Kind::Str),
    field("opening_message", Kind::Str),
    field("opening_questions", Kind::OptStrList),
    field("ping", Kind::OptStr),
    field("require_topic", Kind::Bool),
    field("roles", Kind::StrList),
    field("survey", Kind::OptStr),
];

fn check_fields(
    object: &serde_json::Map<String, Value>,
    specs: &[FieldSpec],
    prefix: &str,
    violations: &mut Vec<String>,
) {
    for spec in specs {
        match object.get(spec.name) {
            None => {
                if spec.required {
                    violations.push(format!("{}{}: required field is missing", prefix, spec.name));
                }
            }
            Some(value) => {
                if !spec.kind.matches(value) {
                    violations.push(format!(
                        "{}{}: {}",
                        prefix,
                        spec.name,
                        spec.kind.expected()
                    ));
                }
            }
        }
    }
}

/// Validate a raw settings document against the schema.
///
/// Returns every violation found; an empty list means the document conforms.
pub fn validate_document(document: &Value) -> Vec<String> {
    let mut violations = Vec::new();

    let Some(object) = document.as_object() else {
        violations.push("document: expected an object".to_string());
        return violations;
    };

    check_fields(object, TOP_LEVEL_FIELDS, "", &mut violations);

    match object.get("categories") {
        None => violations.push("categories: required field is missing".to_string()),
        Some(Value::Array(entries)) => {
            for (index, entry) in entries.iter().enumerate() {
                match entry.as_object() {
                    Some(entry) => {
                        let prefix = format!("categories[{}].", index);
                        check_fields(entry, CATEGORY_FIELDS, &prefix, &mut violations);
                    }
                    None => violations.push(format!("categories[{}]: expected an object", index)),
                }
            }
        }
        Some(_) => violations.push("categories: expected a list".to_string()),
    }

    match object.get("surveys") {
        None => violations.push("surveys: required field is missing".to_string()),
        Some(Value::Object(surveys)) => {
            for (name, questions) in surveys {
                if !is_string_list(questions) {
                    violations.push(format!(
                        "surveys.{}: expected a list of question strings",
                        name
                    ));
                }
            }
        }
        Some(_) => violations.push("surveys: expected an object".to_string()),
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_valid_document_has_no_violations() {
        let mut document = fixtures::settings_document();
        document["categories"] = serde_json::json!([
            fixtures::category_entry(Some("cat-1"), "Support"),
            fixtures::category_entry(None, "Billing"),
        ]);
        document["surveys"] = serde_json::json!({
            "feedback": ["Was this helpful?"]
        });

        assert!(validate_document(&document).is_empty());
    }

    #[test]
    fn test_non_object_document() {
        let violations = validate_document(&serde_json::json!([1, 2, 3]));
        assert_eq!(violations, vec!["document: expected an object"]);
    }

    #[test]
    fn test_all_violations_reported() {
        // Three independent problems: bad colour type, missing footer,
        // negative quota
        let mut document = fixtures::settings_document();
        document["colour"] = serde_json::json!(42);
        document.as_object_mut().unwrap().remove("footer");
        let mut entry = fixtures::category_entry(None, "Support");
        entry["max_per_member"] = serde_json::json!(-1);
        document["categories"] = serde_json::json!([entry]);

        let violations = validate_document(&document);
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().any(|v| v.starts_with("colour:")));
        assert!(violations.iter().any(|v| v.starts_with("footer:")));
        assert!(violations
            .iter()
            .any(|v| v.starts_with("categories[0].max_per_member:")));
    }

    #[test]
    fn test_entry_id_is_optional() {
        let mut document = fixtures::settings_document();
        document["categories"] = serde_json::json!([fixtures::category_entry(None, "Support")]);
        assert!(validate_document(&document).is_empty());
    }

    #[test]
    fn test_entry_id_must_be_string_when_present() {
        let mut document = fixtures::settings_document();
        let mut entry = fixtures::category_entry(None, "Support");
        entry["id"] = serde_json::json!(12345);
        document["categories"] = serde_json::json!([entry]);

        let violations = validate_document(&document);
        assert_eq!(violations, vec!["categories[0].id: expected a string"]);
    }

    #[test]
    fn test_nullable_fields_accept_null() {
        let mut document = fixtures::settings_document();
        let entry = fixtures::category_entry(None, "Support");
        // image, opening_questions, ping and survey are null in the fixture
        document["categories"] = serde_json::json!([entry]);
        assert!(validate_document(&document).is_empty());
    }

    #[test]
    fn test_surveys_must_map_to_question_lists() {
        let mut document = fixtures::settings_document();
        document["surveys"] = serde_json::json!({
            "feedback": "not a list"
        });

        let violations = validate_document(&document);
        assert_eq!(
            violations,
            vec!["surveys.feedback: expected a list of question strings"]
        );
    }

    #[test]
    fn test_tags_values_must_be_strings() {
        let mut document = fixtures::settings_document();
        document["tags"] = serde_json::json!({ "faq": 7 });

        let violations = validate_document(&document);
        assert_eq!(violations, vec!["tags: expected a map of strings"]);
    }
}
