//! Suggestion Ranker — scores a field's allowed values against the
//! description text and returns a ranked top-N list.
//!
//! Independent of the main extraction pipeline: used standalone to assist
//! manual entry, and by the policy engine to build the "Consider: …" hint
//! attached to confirmation-bucket candidates.

use crate::catalog::normalizer::FieldDescriptor;

/// Maximum suggestions returned.
const MAX_SUGGESTIONS: usize = 5;

/// Ranks the field's allowed values against the text.
///
/// Scoring per value: +10 for the full value appearing verbatim, +3 for each
/// individual word (length > 2) of the value found in the text, plus
/// priority-domain bonuses. Zero-score values are excluded; ties keep the
/// original allowed-value order (stable sort); result truncated to top 5.
pub fn suggest(field: &FieldDescriptor, text: &str) -> Vec<String> {
    let text_lower = text.to_lowercase();

    let mut scored: Vec<(String, u32)> = field
        .allowed_labels()
        .iter()
        .filter(|label| !label.is_empty())
        .map(|label| (label.to_string(), score_value(label, &text_lower)))
        .filter(|(_, score)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(MAX_SUGGESTIONS);
    scored.into_iter().map(|(label, _)| label).collect()
}

fn score_value(label: &str, text_lower: &str) -> u32 {
    let label_lower = label.to_lowercase();
    let mut score = 0;

    if text_lower.contains(&label_lower) {
        score += 10;
    }

    for word in label_lower.split_whitespace().filter(|w| w.len() > 2) {
        if text_lower.contains(word) {
            score += 3;
        }
    }

    // Priority synonyms the verbatim rules can't see
    if text_lower.contains("urgent") && label_lower.contains("high") {
        score += 5;
    }
    if text_lower.contains("important") && label_lower.contains("high") {
        score += 3;
    }
    if text_lower.contains("later") && label_lower.contains("low") {
        score += 3;
    }

    score
}
