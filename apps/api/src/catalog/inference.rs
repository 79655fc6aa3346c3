//! Field inference from failed-submission error payloads.
//!
//! When metadata discovery fails, the only signal left about a project's
//! fields is the error response the tracker returns for a rejected create.
//! This module parses those payloads into usable descriptors, and guarantees
//! a non-empty minimal field set when nothing at all is parseable — discovery
//! never yields zero usable fields.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde_json::Value;

use crate::catalog::normalizer::{AllowedValue, FieldDescriptor, FieldType};

// ────────────────────────────────────────────────────────────────────────────
// Message patterns
// ────────────────────────────────────────────────────────────────────────────

/// Ordered extraction rules for free-text error messages.
/// Evaluated in sequence; the first rule that matches a message wins.
struct ErrorPatterns {
    rules: Vec<Regex>,
}

impl ErrorPatterns {
    fn new() -> Self {
        Self {
            rules: vec![
                // "Field 'Sprint' is required"
                Regex::new(r"(?i)field\s+'([^']+)'\s+is\s+required").unwrap(),
                // "\"Story Points\" is required"
                Regex::new(r#"(?i)"([^"]+)"\s+is\s+required"#).unwrap(),
                // "Sprint is required."
                Regex::new(r"(?i)^\s*([A-Za-z][A-Za-z0-9 _/-]{0,60}?)\s+is\s+required").unwrap(),
                // "Missing required field: duedate"
                Regex::new(r#"(?i)missing\s+(?:required\s+)?field[:\s]+['"]?([A-Za-z0-9_ -]+)"#)
                    .unwrap(),
                // "You must specify a summary of the issue"
                Regex::new(
                    r"(?i)you\s+must\s+specify\s+(?:a|an|the)\s+([A-Za-z][A-Za-z0-9 _-]{0,60}?)(?:\s+(?:of|for)\b|[.!,]|$)",
                )
                .unwrap(),
            ],
        }
    }

    /// Extracts a field display name from one error message, if any rule hits.
    fn field_name_in(&self, message: &str) -> Option<String> {
        for rule in &self.rules {
            if let Some(caps) = rule.captures(message) {
                if let Some(name) = caps.get(1) {
                    return Some(name.as_str().trim().to_string());
                }
            }
        }
        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inference entry point
// ────────────────────────────────────────────────────────────────────────────

/// Parses a failure payload into field descriptors.
///
/// Accepts the shapes trackers actually produce: an object with `errors`
/// (field id → message) and/or `errorMessages` (free-text strings), a bare
/// field-id → message object, an array of strings, or a single string.
/// Deduplicates by field id. Never errors and never returns empty — an
/// unparseable payload yields the hardcoded minimal set.
pub fn infer_from_error(payload: &Value, today: NaiveDate) -> Vec<FieldDescriptor> {
    let patterns = ErrorPatterns::new();
    let mut fields: Vec<FieldDescriptor> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    collect_from_payload(payload, &patterns, &mut fields, &mut seen);

    if fields.is_empty() {
        return fallback_minimal_fields();
    }

    for field in &mut fields {
        backfill_allowed_values(field, today);
    }

    fields
}

fn collect_from_payload(
    payload: &Value,
    patterns: &ErrorPatterns,
    fields: &mut Vec<FieldDescriptor>,
    seen: &mut HashSet<String>,
) {
    match payload {
        Value::Object(obj) => {
            let has_tracker_shape = obj.contains_key("errors") || obj.contains_key("errorMessages");

            if let Some(Value::Object(errors)) = obj.get("errors") {
                for (field_id, message) in errors {
                    let message = message.as_str().unwrap_or_default();
                    push_field(fields, seen, from_keyed_error(field_id, message, patterns));
                }
            }
            if let Some(Value::Array(messages)) = obj.get("errorMessages") {
                for message in messages {
                    if let Some(text) = message.as_str() {
                        push_free_text(fields, seen, text, patterns);
                    }
                }
            }

            // A flat field-id → message map (no tracker envelope)
            if !has_tracker_shape {
                for (field_id, message) in obj {
                    let message = message.as_str().unwrap_or_default();
                    push_field(fields, seen, from_keyed_error(field_id, message, patterns));
                }
            }
        }
        Value::Array(messages) => {
            for message in messages {
                if let Some(text) = message.as_str() {
                    push_free_text(fields, seen, text, patterns);
                }
            }
        }
        Value::String(text) => push_free_text(fields, seen, text, patterns),
        _ => {}
    }
}

fn push_field(
    fields: &mut Vec<FieldDescriptor>,
    seen: &mut HashSet<String>,
    field: FieldDescriptor,
) {
    if seen.insert(field.id.clone()) {
        fields.push(field);
    }
}

fn push_free_text(
    fields: &mut Vec<FieldDescriptor>,
    seen: &mut HashSet<String>,
    message: &str,
    patterns: &ErrorPatterns,
) {
    if let Some(name) = patterns.field_name_in(message) {
        let field = FieldDescriptor {
            id: field_id_from_name(&name),
            name: display_name(&name),
            field_type: FieldType::Text,
            required: true,
            allowed_values: None,
            description: None,
        };
        push_field(fields, seen, field);
    }
}

/// Builds a descriptor from a fieldId-keyed error entry.
/// The display name comes from the message when it names the field, else
/// from the id itself.
fn from_keyed_error(field_id: &str, message: &str, patterns: &ErrorPatterns) -> FieldDescriptor {
    let name = patterns
        .field_name_in(message)
        .map(|n| display_name(&n))
        .unwrap_or_else(|| display_name(field_id));
    let message_lower = message.to_lowercase();
    let required =
        message_lower.contains("required") || message_lower.contains("must specify");

    FieldDescriptor {
        id: field_id.to_string(),
        name,
        field_type: FieldType::Text,
        required,
        allowed_values: None,
        description: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Name / id derivation
// ────────────────────────────────────────────────────────────────────────────

/// Derives a stable field id from a display name ("Due Date" → "due_date").
/// Raw ids like "customfield_10020" pass through unchanged.
fn field_id_from_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return trimmed.to_string();
    }
    trimmed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Title-cases an id-ish token for display ("due_date" → "Due date").
fn display_name(raw: &str) -> String {
    let spaced = raw.replace('_', " ");
    let trimmed = spaced.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Allowed-value backfill
// ────────────────────────────────────────────────────────────────────────────

/// Backfills default allowed values for well-known field name patterns, so
/// inferred fields are immediately usable in a picker.
fn backfill_allowed_values(field: &mut FieldDescriptor, today: NaiveDate) {
    if field.allowed_values.is_some() {
        return;
    }
    let name = field.name.to_lowercase();

    if name.contains("quarter") {
        field.field_type = FieldType::Select;
        field.allowed_values = Some(
            quarter_labels(today)
                .into_iter()
                .map(AllowedValue::Plain)
                .collect(),
        );
    } else if suggests_yes_no(&name) {
        field.field_type = FieldType::Select;
        field.allowed_values = Some(vec![AllowedValue::plain("Yes"), AllowedValue::plain("No")]);
    }
}

/// Quarter labels for the current and next year: "Q1 2025" … "Q4 2026".
pub fn quarter_labels(today: NaiveDate) -> Vec<String> {
    let mut labels = Vec::with_capacity(8);
    for year in [today.year(), today.year() + 1] {
        for quarter in 1..=4 {
            labels.push(format!("Q{quarter} {year}"));
        }
    }
    labels
}

fn suggests_yes_no(name: &str) -> bool {
    name.contains("yes/no")
        || name.ends_with('?')
        || ["flag", "enabled", "approved", "confirmed"]
            .iter()
            .any(|kw| name.contains(kw))
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal fallback set
// ────────────────────────────────────────────────────────────────────────────

/// The hardcoded minimal field set returned when nothing is parseable.
/// Guarantees the caller always has a usable, non-empty catalog.
pub fn fallback_minimal_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor {
            id: "summary".to_string(),
            name: "Summary".to_string(),
            field_type: FieldType::Text,
            required: true,
            allowed_values: None,
            description: Some("One-line summary of the issue".to_string()),
        },
        FieldDescriptor {
            id: "description".to_string(),
            name: "Description".to_string(),
            field_type: FieldType::Textarea,
            required: false,
            allowed_values: None,
            description: None,
        },
        FieldDescriptor {
            id: "issuetype".to_string(),
            name: "Issue Type".to_string(),
            field_type: FieldType::Select,
            required: true,
            allowed_values: Some(vec![
                AllowedValue::plain("Task"),
                AllowedValue::plain("Story"),
                AllowedValue::plain("Bug"),
                AllowedValue::plain("Epic"),
            ]),
            description: None,
        },
        FieldDescriptor {
            id: "project".to_string(),
            name: "Project".to_string(),
            field_type: FieldType::Select,
            required: true,
            allowed_values: None,
            description: None,
        },
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
