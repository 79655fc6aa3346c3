//! Work-item type mapping — resolves abstract work-item categories onto the
//! issue type names a given project actually offers.

use serde::{Deserialize, Serialize};

/// Abstract work-item category, independent of any one project's naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkItemType {
    Epic,
    Story,
    Task,
    Initiative,
    Bug,
}

/// Acceptable target-type name substrings per work-item type, tried in
/// priority order. First case-insensitive substring match wins.
fn type_preferences(work_item: WorkItemType) -> &'static [&'static str] {
    match work_item {
        WorkItemType::Epic => &["epic"],
        WorkItemType::Story => &["story", "user story"],
        WorkItemType::Task => &["task"],
        // Projects without an initiative type usually file these as epics
        WorkItemType::Initiative => &["initiative", "theme", "epic"],
        WorkItemType::Bug => &["bug", "defect", "fault"],
    }
}

/// Resolves a work-item type against the project's available issue types.
///
/// Tries each preferred substring in order; if none match, the first
/// available type is used as a last resort. Returns None only when the
/// project offered no types at all.
pub fn resolve_issue_type(work_item: WorkItemType, available: &[String]) -> Option<String> {
    for preference in type_preferences(work_item) {
        if let Some(matched) = available
            .iter()
            .find(|candidate| candidate.to_lowercase().contains(preference))
        {
            return Some(matched.clone());
        }
    }
    available.first().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_exact_type_preferred() {
        let available = types(&["Bug", "Task", "Story", "Epic"]);
        assert_eq!(
            resolve_issue_type(WorkItemType::Story, &available),
            Some("Story".to_string())
        );
        assert_eq!(
            resolve_issue_type(WorkItemType::Bug, &available),
            Some("Bug".to_string())
        );
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let available = types(&["Product Bug", "Engineering Task"]);
        assert_eq!(
            resolve_issue_type(WorkItemType::Bug, &available),
            Some("Product Bug".to_string())
        );
    }

    #[test]
    fn test_initiative_falls_back_to_epic() {
        let available = types(&["Task", "Epic"]);
        assert_eq!(
            resolve_issue_type(WorkItemType::Initiative, &available),
            Some("Epic".to_string())
        );
    }

    #[test]
    fn test_bug_synonym_defect_matches() {
        let available = types(&["Defect", "Task"]);
        assert_eq!(
            resolve_issue_type(WorkItemType::Bug, &available),
            Some("Defect".to_string())
        );
    }

    #[test]
    fn test_no_match_uses_first_available() {
        let available = types(&["Incident", "Change"]);
        assert_eq!(
            resolve_issue_type(WorkItemType::Epic, &available),
            Some("Incident".to_string())
        );
    }

    #[test]
    fn test_empty_available_returns_none() {
        assert_eq!(resolve_issue_type(WorkItemType::Task, &[]), None);
    }

    #[test]
    fn test_work_item_type_serde_lowercase() {
        let parsed: WorkItemType = serde_json::from_str("\"initiative\"").unwrap();
        assert_eq!(parsed, WorkItemType::Initiative);
    }
}
