// Field catalog — normalization of raw tracker metadata, recovery inference
// from failed-submission error payloads, and work-item type mapping.

pub mod inference;
pub mod issue_types;
pub mod normalizer;
