//! Pattern Extractor — deterministic, field-type-keyed heuristic extraction.
//!
//! No external calls: a pure function of (text, field descriptors, today).
//! Dispatch is an explicit ordered rule chain — the first rule whose field
//! matcher claims a field handles it, so the priority order stays auditable
//! and each rule is testable on its own. A field no rule matches, or whose
//! rule finds nothing in the text, is omitted from the result entirely.

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::catalog::normalizer::{FieldDescriptor, FieldType};
use crate::extraction::{CandidateValue, ExtractedFieldValue, ExtractionMethod};

// ────────────────────────────────────────────────────────────────────────────
// Vocabulary tables
// ────────────────────────────────────────────────────────────────────────────

/// Priority vocabulary, canonical level → synonyms, scanned highest-first.
const PRIORITY_SYNONYMS: &[(&str, &[&str])] = &[
    ("highest", &["highest", "critical"]),
    ("high", &["high", "major"]),
    ("medium", &["medium"]),
    ("low", &["low", "minor"]),
    ("lowest", &["lowest", "trivial"]),
];

/// Words indicating internal-only audience for roadmap-style fields.
const INTERNAL_WORDS: &[&str] = &["internal", "private", "confidential", "company", "team", "staff"];

/// Words indicating external/public audience for roadmap-style fields.
const EXTERNAL_WORDS: &[&str] = &[
    "external", "public", "customer", "client", "visible", "roadmap", "showcase",
];

/// Common English words never emitted as labels.
const LABEL_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "has", "had", "have", "was",
    "were", "will", "with", "this", "that", "from", "they", "been", "their", "there", "which",
    "would", "should", "could", "when", "what", "where", "into", "also", "more", "some", "than",
    "then", "them", "these", "those", "only", "over", "such", "very", "must", "just", "each",
    "other", "about", "while", "after", "before", "between", "during", "through", "your", "our",
    "its", "out", "new", "need", "needs", "like", "want", "who", "how", "why", "does", "per",
    "via", "etc", "may", "using", "use",
];

// ────────────────────────────────────────────────────────────────────────────
// Rule chain
// ────────────────────────────────────────────────────────────────────────────

/// One extraction rule: a field matcher plus an extractor function.
/// Rules are evaluated in declaration order with early exit.
struct FieldRule {
    name: &'static str,
    applies: fn(&FieldDescriptor) -> bool,
    extract: fn(&PatternExtractor, &str, &FieldDescriptor, NaiveDate) -> Option<(CandidateValue, f64)>,
}

const FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        name: "priority",
        applies: |f| name_contains(f, &["priority"]),
        extract: PatternExtractor::extract_priority,
    },
    FieldRule {
        name: "quarter",
        applies: |f| name_contains(f, &["quarter"]),
        extract: PatternExtractor::extract_quarter,
    },
    FieldRule {
        name: "roadmap",
        applies: |f| name_contains(f, &["roadmap", "visibility", "audience"]),
        extract: PatternExtractor::extract_roadmap,
    },
    FieldRule {
        name: "story_points",
        applies: |f| name_contains(f, &["point", "estimate"]),
        extract: PatternExtractor::extract_story_points,
    },
    FieldRule {
        name: "components",
        applies: |f| name_contains(f, &["component"]),
        extract: PatternExtractor::extract_components,
    },
    FieldRule {
        name: "epic_link",
        applies: |f| name_contains(f, &["epic", "parent link"]),
        extract: PatternExtractor::extract_epic_link,
    },
    FieldRule {
        name: "labels",
        applies: |f| name_contains(f, &["label", "tag"]),
        extract: PatternExtractor::extract_labels,
    },
];

/// Case-insensitive substring match against the field's name or id.
fn name_contains(field: &FieldDescriptor, needles: &[&str]) -> bool {
    let name = field.name.to_lowercase();
    let id = field.id.to_lowercase();
    needles.iter().any(|n| name.contains(n) || id.contains(n))
}

// ────────────────────────────────────────────────────────────────────────────
// Extractor
// ────────────────────────────────────────────────────────────────────────────

/// Compiled patterns for heuristic field extraction. Construct once, reuse
/// across runs; extraction itself holds no state.
pub struct PatternExtractor {
    priority_levels: Vec<(&'static str, Regex)>,
    quarter_patterns: Vec<Regex>,
    year_pattern: Regex,
    story_points_pattern: Regex,
    issue_key_pattern: Regex,
    label_patterns: Vec<Regex>,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor {
    pub fn new() -> Self {
        let priority_levels = PRIORITY_SYNONYMS
            .iter()
            .map(|(level, synonyms)| {
                let pattern = format!(r"(?i)\b(?:{})\b", synonyms.join("|"));
                (*level, Regex::new(&pattern).unwrap())
            })
            .collect();

        Self {
            priority_levels,
            // Tried in order; each yields (quarter, optional year) captures.
            quarter_patterns: vec![
                // "Q3 2025", "Q3, 2025"
                Regex::new(r"(?i)\bq([1-4])\s*,?\s+(\d{4})\b").unwrap(),
                // "quarter 3 2025", "quarter 3 of 2025"
                Regex::new(r"(?i)\bquarter\s+([1-4])\s+(?:of\s+)?(\d{4})\b").unwrap(),
                // "3rd quarter 2025", "1st quarter"
                Regex::new(r"(?i)\b([1-4])(?:st|nd|rd|th)\s+quarter(?:\s+(?:of\s+)?(\d{4}))?")
                    .unwrap(),
                // "third quarter of 2025", "first quarter"
                Regex::new(
                    r"(?i)\b(first|second|third|fourth)\s+quarter(?:\s+(?:of\s+)?(\d{4}))?",
                )
                .unwrap(),
                // bare "Q3"
                Regex::new(r"(?i)\bq([1-4])\b").unwrap(),
                // bare "quarter 3"
                Regex::new(r"(?i)\bquarter\s+([1-4])\b").unwrap(),
            ],
            year_pattern: Regex::new(r"\b(20\d{2})\b").unwrap(),
            story_points_pattern: Regex::new(r"(?i)\b(\d+)\s*(?:story\s*)?points?\b").unwrap(),
            issue_key_pattern: Regex::new(r"\b([A-Z]+-\d+)\b").unwrap(),
            label_patterns: vec![
                // quarter-like tokens ("Q3-2025", "q1 2026")
                Regex::new(r"(?i)\b(q[1-4][- ]\d{4})\b").unwrap(),
                // hyphenated project-code-like tokens ("auth-service", "v2-rollout")
                Regex::new(r"(?i)\b([a-z][a-z0-9]*(?:-[a-z0-9]+)+)\b").unwrap(),
                // explicit "label: x", "tag: x", "#x"
                Regex::new(r"(?i)(?:\blabel:\s*|\btag:\s*|#)([a-z0-9][a-z0-9_-]+)").unwrap(),
                // generic alphanumeric tokens, 3+ chars
                Regex::new(r"(?i)\b([a-z][a-z0-9]{2,})\b").unwrap(),
            ],
        }
    }

    /// Runs the rule chain over every field, in the order fields were
    /// supplied. Byte-identical output for identical (text, fields, today).
    pub fn extract(
        &self,
        text: &str,
        fields: &[FieldDescriptor],
        today: NaiveDate,
    ) -> Vec<ExtractedFieldValue> {
        fields
            .iter()
            .filter_map(|field| self.extract_field(text, field, today))
            .collect()
    }

    /// Applies the first matching rule for a single field.
    pub fn extract_field(
        &self,
        text: &str,
        field: &FieldDescriptor,
        today: NaiveDate,
    ) -> Option<ExtractedFieldValue> {
        let rule = FIELD_RULES.iter().find(|rule| (rule.applies)(field))?;
        let (value, confidence) = (rule.extract)(self, text, field, today)?;
        tracing::debug!(
            "pattern rule '{}' matched field '{}' (confidence {confidence})",
            rule.name,
            field.id
        );
        Some(ExtractedFieldValue {
            field_id: field.id.clone(),
            value,
            confidence,
            method: ExtractionMethod::Pattern,
            suggestion: None,
        })
    }

    // ── Rule 1: priority ────────────────────────────────────────────────────

    /// Scans the priority vocabulary highest-first and maps the canonical
    /// level onto the field's allowed values.
    fn extract_priority(
        &self,
        text: &str,
        field: &FieldDescriptor,
        _today: NaiveDate,
    ) -> Option<(CandidateValue, f64)> {
        let level = self
            .priority_levels
            .iter()
            .find(|(_, pattern)| pattern.is_match(text))
            .map(|(level, _)| *level)?;

        let matched = field
            .allowed_labels()
            .iter()
            .find(|label| label.to_lowercase().contains(level))
            .map(|label| label.to_string())?;

        Some((CandidateValue::Text(matched), 0.8))
    }

    // ── Rule 2: quarter / date-period ───────────────────────────────────────

    /// Quarter extraction with graceful degradation:
    /// explicit quarter+year (0.8) → bare year + current quarter (0.6) →
    /// current quarter + current year (0.4) → nothing.
    /// Every candidate is validated against the field's allowed values
    /// before acceptance.
    fn extract_quarter(
        &self,
        text: &str,
        field: &FieldDescriptor,
        today: NaiveDate,
    ) -> Option<(CandidateValue, f64)> {
        let current_quarter = (today.month0() / 3) + 1;
        let current_year = today.year();

        for pattern in &self.quarter_patterns {
            for caps in pattern.captures_iter(text) {
                let quarter = caps.get(1).and_then(|m| parse_quarter_token(m.as_str()))?;
                let year = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse::<i32>().ok())
                    .unwrap_or(current_year);
                let candidate = format!("Q{quarter} {year}");
                if let Some(label) = resolve_against_allowed(field, &candidate) {
                    return Some((CandidateValue::Text(label), 0.8));
                }
            }
        }

        // No explicit quarter — a bare year combines with the current quarter.
        for caps in self.year_pattern.captures_iter(text) {
            let year: i32 = caps[1].parse().ok()?;
            let candidate = format!("Q{current_quarter} {year}");
            if let Some(label) = resolve_against_allowed(field, &candidate) {
                return Some((CandidateValue::Text(label), 0.6));
            }
        }

        // Nothing in the text at all — current quarter and year, if offered.
        let candidate = format!("Q{current_quarter} {current_year}");
        if field.allowed_values.is_some() {
            if let Some(label) = resolve_against_allowed(field, &candidate) {
                return Some((CandidateValue::Text(label), 0.4));
            }
        }

        None
    }

    // ── Rule 3: roadmap-style audience fields ───────────────────────────────

    /// Scans for internal- and external-indicating words. Multiselect fields
    /// collect every matched category; legacy single-value fields return the
    /// first matched keyword as a scalar.
    fn extract_roadmap(
        &self,
        text: &str,
        field: &FieldDescriptor,
        _today: NaiveDate,
    ) -> Option<(CandidateValue, f64)> {
        let text_lower = text.to_lowercase();
        let first_keyword = |words: &[&str]| {
            words
                .iter()
                .find(|w| contains_word(&text_lower, w))
                .map(|w| w.to_string())
        };
        let internal_hit = first_keyword(INTERNAL_WORDS);
        let external_hit = first_keyword(EXTERNAL_WORDS);

        if internal_hit.is_none() && external_hit.is_none() {
            return None;
        }

        if field.field_type == FieldType::Multiselect {
            // Resolve category names onto the field's own labels when offered
            let resolve_category = |category: &str| {
                field
                    .allowed_labels()
                    .iter()
                    .find(|label| label.to_lowercase().contains(&category.to_lowercase()))
                    .map(|label| label.to_string())
                    .unwrap_or_else(|| category.to_string())
            };
            let mut categories = Vec::new();
            if internal_hit.is_some() {
                categories.push(resolve_category("Internal"));
            }
            if external_hit.is_some() {
                categories.push(resolve_category("External"));
            }
            return Some((CandidateValue::List(categories), 0.8));
        }

        let keyword = internal_hit.or(external_hit)?;
        Some((CandidateValue::Text(keyword), 0.8))
    }

    // ── Rule 4: story points ────────────────────────────────────────────────

    fn extract_story_points(
        &self,
        text: &str,
        _field: &FieldDescriptor,
        _today: NaiveDate,
    ) -> Option<(CandidateValue, f64)> {
        let caps = self.story_points_pattern.captures(text)?;
        let points: f64 = caps[1].parse().ok()?;
        Some((CandidateValue::Number(points), 0.9))
    }

    // ── Rule 5: components ──────────────────────────────────────────────────

    /// First allowed value found verbatim (case-insensitive) in the text wins.
    fn extract_components(
        &self,
        text: &str,
        field: &FieldDescriptor,
        _today: NaiveDate,
    ) -> Option<(CandidateValue, f64)> {
        let text_lower = text.to_lowercase();
        let matched = field
            .allowed_labels()
            .iter()
            .find(|label| !label.is_empty() && text_lower.contains(&label.to_lowercase()))
            .map(|label| label.to_string())?;

        let value = if field.field_type == FieldType::Multiselect {
            CandidateValue::List(vec![matched])
        } else {
            CandidateValue::Text(matched)
        };
        Some((value, 0.7))
    }

    // ── Rule 6: epic link ───────────────────────────────────────────────────

    fn extract_epic_link(
        &self,
        text: &str,
        _field: &FieldDescriptor,
        _today: NaiveDate,
    ) -> Option<(CandidateValue, f64)> {
        let caps = self.issue_key_pattern.captures(text)?;
        Some((CandidateValue::Text(caps[1].to_string()), 0.8))
    }

    // ── Rule 7: labels ──────────────────────────────────────────────────────

    /// Runs all four label-shaped patterns, accumulating a de-duplicated,
    /// case-folded set with stop words removed.
    fn extract_labels(
        &self,
        text: &str,
        _field: &FieldDescriptor,
        _today: NaiveDate,
    ) -> Option<(CandidateValue, f64)> {
        let mut labels: Vec<String> = Vec::new();

        for pattern in &self.label_patterns {
            for caps in pattern.captures_iter(text) {
                let token = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let folded = token.to_lowercase().replace(' ', "-");
                if folded.len() < 3 || LABEL_STOP_WORDS.contains(&folded.as_str()) {
                    continue;
                }
                if !labels.contains(&folded) {
                    labels.push(folded);
                }
            }
        }

        if labels.is_empty() {
            return None;
        }
        Some((CandidateValue::List(labels), 0.7))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// "3" → 3, "third" → 3.
fn parse_quarter_token(token: &str) -> Option<u32> {
    match token.to_lowercase().as_str() {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        digit => digit.parse().ok().filter(|q| (1..=4).contains(q)),
    }
}

/// Validates a candidate against the field's allowed values, returning the
/// allowed label's own casing. Free-form fields accept the candidate as-is.
fn resolve_against_allowed(field: &FieldDescriptor, candidate: &str) -> Option<String> {
    match &field.allowed_values {
        None => Some(candidate.to_string()),
        Some(_) => field
            .allowed_labels()
            .iter()
            .find(|label| label.eq_ignore_ascii_case(candidate))
            .map(|label| label.to_string()),
    }
}

/// Whole-word containment check over pre-lowercased text.
fn contains_word(text_lower: &str, word: &str) -> bool {
    text_lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == word)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
