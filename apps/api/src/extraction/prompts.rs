// All LLM prompt constants for the Extraction module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for field extraction — enforces JSON-only output.
pub const EXTRACTION_SYSTEM: &str =
    "You are an expert issue-tracker analyst. \
    Extract structured field values from a free-text feature description. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Extraction prompt template.
/// Replace: {fidelity_instruction}, {fields_json}, {description}
pub const EXTRACTION_PROMPT_TEMPLATE: &str = r#"{fidelity_instruction}

TARGET FIELDS (extract a value for each field the description supports):
{fields_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "extractions": [
    {"fieldId": "priority", "value": "High", "confidence": 0.9}
  ]
}

Rules:
- Include ONLY fields whose value the description text supports; omit the rest
- "fieldId" must be one of the ids listed above — no exceptions
- "value" is a string, a number, or an array of strings (arrays for multiselect fields)
- "confidence" is your certainty in [0, 1]; if it would be 0.5 or below, omit the field instead
- For fields listing allowed values, "value" MUST be one of them verbatim

FEATURE DESCRIPTION:
{description}"#;
