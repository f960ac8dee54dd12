//! Structured-Output Recovery
//!
//! Models are asked for JSON but frequently wrap it in code fences or
//! prose. `parse_lenient` recovers the object when possible and otherwise
//! returns the caller's default - structured-output parsing never fails
//! the pipeline.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Strip markdown code fences and surrounding prose, then parse.
pub fn extract_json_value(raw: &str) -> Option<Value> {
    let cleaned = preprocess(raw);

    if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
        return Some(value);
    }

    // Fall back to the outermost object embedded in mixed content
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&cleaned[start..=end]).ok()
}

/// Parse a typed structure with graceful degradation: any recovery failure
/// yields `T::default()`.
pub fn parse_lenient<T: DeserializeOwned + Default>(raw: &str) -> T {
    match extract_json_value(raw) {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            debug!("Structured output did not match schema, using defaults: {}", e);
            T::default()
        }),
        None => {
            debug!("No JSON object found in response, using defaults");
            T::default()
        }
    }
}

fn preprocess(raw: &str) -> String {
    let trimmed = raw.trim();

    // ```json ... ``` or ``` ... ```
    if let Some(stripped) = trimmed.strip_prefix("```") {
        let stripped = stripped
            .strip_prefix("json")
            .unwrap_or(stripped)
            .trim_start();
        if let Some(end) = stripped.rfind("```") {
            return stripped[..end].trim().to_string();
        }
        return stripped.trim().to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Probe {
        #[serde(default)]
        passed: bool,
        #[serde(default)]
        errors: Vec<String>,
    }

    #[test]
    fn test_plain_json() {
        let probe: Probe = parse_lenient(r#"{"passed": true, "errors": []}"#);
        assert!(probe.passed);
    }

    #[test]
    fn test_fenced_json() {
        let probe: Probe = parse_lenient("```json\n{\"passed\": true}\n```");
        assert!(probe.passed);
    }

    #[test]
    fn test_json_in_prose() {
        let probe: Probe =
            parse_lenient("Here is the verdict:\n{\"passed\": false, \"errors\": [\"x\"]}\nDone.");
        assert!(!probe.passed);
        assert_eq!(probe.errors, vec!["x"]);
    }

    #[test]
    fn test_garbage_degrades_to_default() {
        let probe: Probe = parse_lenient("no json here at all");
        assert_eq!(probe, Probe::default());
    }

    #[test]
    fn test_missing_fields_use_field_defaults() {
        let probe: Probe = parse_lenient(r#"{"passed": true}"#);
        assert!(probe.passed);
        assert!(probe.errors.is_empty());
    }
}
