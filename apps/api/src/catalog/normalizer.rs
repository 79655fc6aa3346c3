//! Field Catalog Normalizer — turns raw, heterogeneous tracker field metadata
//! into uniform descriptors the extraction pipeline can work with.
//!
//! Raw metadata arrives with varying key names for type, required flag, and
//! allowed values depending on which discovery endpoint produced it. All of
//! that variance is resolved here, once — downstream code only ever sees
//! `FieldDescriptor`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Normalized field type. Unknown raw types fall back to `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Multiselect,
}

/// One permissible value for an enumerated field.
///
/// Raw metadata carries these either as bare strings or as objects with some
/// subset of {id, name, value}. The variant is resolved here in the
/// normalizer; consumers use `label()` instead of re-interpreting shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedValue {
    Plain(String),
    Option {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl AllowedValue {
    pub fn plain(label: &str) -> Self {
        AllowedValue::Plain(label.to_string())
    }

    /// Human-readable label for this value: name, then value, then id.
    pub fn label(&self) -> &str {
        match self {
            AllowedValue::Plain(s) => s,
            AllowedValue::Option { id, name, value } => name
                .as_deref()
                .or(value.as_deref())
                .or(id.as_deref())
                .unwrap_or(""),
        }
    }
}

/// Normalized representation of one tracker field's metadata.
///
/// Constructed fresh on every discovery call and immutable thereafter; the
/// core never persists descriptors itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<AllowedValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDescriptor {
    /// Labels of all allowed values, empty when the field is free-form.
    pub fn allowed_labels(&self) -> Vec<&str> {
        self.allowed_values
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(AllowedValue::label)
            .collect()
    }
}

/// Usage category for the field-discovery UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    CommonlyUsed,
    ProjectSpecific,
    StandardOptional,
    System,
}

// ────────────────────────────────────────────────────────────────────────────
// Type mapping
// ────────────────────────────────────────────────────────────────────────────

/// Raw schema type → normalized type. Anything not listed maps to Text.
const TYPE_MAP: &[(&str, FieldType)] = &[
    ("string", FieldType::Text),
    ("text", FieldType::Textarea),
    ("textarea", FieldType::Textarea),
    ("description", FieldType::Textarea),
    ("number", FieldType::Number),
    ("integer", FieldType::Number),
    ("float", FieldType::Number),
    ("date", FieldType::Date),
    ("datetime", FieldType::Date),
    ("option", FieldType::Select),
    ("select", FieldType::Select),
    ("priority", FieldType::Select),
    ("radio", FieldType::Select),
    ("issuetype", FieldType::Select),
    ("array", FieldType::Multiselect),
    ("multiselect", FieldType::Multiselect),
    ("checkbox", FieldType::Multiselect),
    ("labels", FieldType::Multiselect),
    ("option-with-child", FieldType::Multiselect),
];

/// Maps a raw type string onto a normalized `FieldType`.
/// Unknown types fall back to Text — this must never fail.
pub fn map_raw_type(raw: &str) -> FieldType {
    let raw = raw.trim().to_lowercase();
    TYPE_MAP
        .iter()
        .find(|(key, _)| *key == raw)
        .map(|(_, ty)| *ty)
        .unwrap_or(FieldType::Text)
}

// ────────────────────────────────────────────────────────────────────────────
// Normalization
// ────────────────────────────────────────────────────────────────────────────

/// Normalizes a raw field-id → metadata map into ordered descriptors.
///
/// Ordering: required fields first, then alphabetical by display name.
/// Pure transformation — never errors; fields with missing metadata get
/// conservative defaults instead.
pub fn normalize(raw_fields: &Map<String, Value>) -> Vec<FieldDescriptor> {
    let mut fields: Vec<FieldDescriptor> = raw_fields
        .iter()
        .map(|(id, meta)| normalize_one(id, meta))
        .collect();

    fields.sort_by(|a, b| {
        b.required
            .cmp(&a.required)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    fields
}

/// Normalizes a single raw metadata object, tolerating the key-name variance
/// the discovery endpoints produce.
fn normalize_one(id: &str, meta: &Value) -> FieldDescriptor {
    let name = meta
        .get("name")
        .or_else(|| meta.get("fieldName"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| prettify_field_id(id));

    let raw_type = meta
        .get("schema")
        .and_then(|s| s.get("type"))
        .or_else(|| meta.get("type"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let required = meta
        .get("required")
        .or_else(|| meta.get("isRequired"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let allowed_values = meta
        .get("allowedValues")
        .or_else(|| meta.get("allowed_values"))
        .or_else(|| meta.get("options"))
        .and_then(|v| v.as_array())
        .map(|values| values.iter().filter_map(parse_allowed_value).collect())
        .filter(|v: &Vec<AllowedValue>| !v.is_empty());

    let description = meta
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    FieldDescriptor {
        id: id.to_string(),
        name,
        field_type: map_raw_type(raw_type),
        required,
        allowed_values,
        description,
    }
}

/// Resolves one raw allowed value (string or {id, name, value} object) into
/// the tagged variant. Unrecognized shapes are dropped.
fn parse_allowed_value(raw: &Value) -> Option<AllowedValue> {
    match raw {
        Value::String(s) => Some(AllowedValue::Plain(s.clone())),
        Value::Object(obj) => {
            let pick = |key: &str| obj.get(key).and_then(|v| v.as_str()).map(str::to_string);
            let (id, name, value) = (pick("id"), pick("name"), pick("value"));
            if id.is_none() && name.is_none() && value.is_none() {
                return None;
            }
            Some(AllowedValue::Option { id, name, value })
        }
        _ => None,
    }
}

/// Derives a display name from a raw field id ("customfield_10020" → "Customfield 10020").
fn prettify_field_id(id: &str) -> String {
    id.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .enumerate()
        .map(|(i, part)| {
            if i == 0 {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ────────────────────────────────────────────────────────────────────────────
// Usage categories
// ────────────────────────────────────────────────────────────────────────────

/// Fields most teams fill on every issue.
const COMMON_FIELDS: &[&str] = &[
    "summary",
    "description",
    "priority",
    "labels",
    "components",
    "fixversions",
    "fix versions",
    "assignee",
    "duedate",
    "due date",
    "epic",
    "story point",
    "sprint",
];

/// Tracker-managed fields users never set on creation.
const SYSTEM_FIELDS: &[&str] = &[
    "status",
    "created",
    "updated",
    "creator",
    "reporter",
    "resolution",
    "resolutiondate",
    "votes",
    "watches",
    "workratio",
    "lastviewed",
    "issuelinks",
    "subtasks",
    "attachment",
    "timetracking",
    "worklog",
];

/// Classifies a field for the discovery UI.
pub fn classify(field: &FieldDescriptor) -> FieldCategory {
    let id = field.id.to_lowercase();
    let name = field.name.to_lowercase();

    if SYSTEM_FIELDS.iter().any(|s| id == *s || name == *s) {
        return FieldCategory::System;
    }
    if COMMON_FIELDS.iter().any(|s| id == *s || name.contains(s)) {
        return FieldCategory::CommonlyUsed;
    }
    if id.starts_with("customfield_") {
        return FieldCategory::ProjectSpecific;
    }
    FieldCategory::StandardOptional
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
