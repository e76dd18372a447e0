//! Raw result entries as returned by a provider.

use serde::Deserialize;
use serde_json::Value;

/// One element of a provider's result payload.
///
/// Echo fields (`index`, `prompt`) are unreliable: they may be absent, zero
/// or duplicated. Error-shaped entries carry them under a nested `input`
/// object instead of at the top level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawResultEntry {
    body: Value,
}

impl RawResultEntry {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Top-level string field, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.body.get(key).and_then(Value::as_str)
    }

    /// Echoed correlation index.
    ///
    /// Reads the top-level `index`, then `input.index` when the top level is
    /// missing or zero.
    pub fn echoed_index(&self) -> Option<i64> {
        let top = self.body.get("index").and_then(Value::as_i64);
        match top {
            Some(index) if index != 0 => Some(index),
            _ => self.input_field("index").and_then(Value::as_i64).or(top),
        }
    }

    /// Echoed prompt text, top-level first, then `input.prompt`.
    pub fn echoed_prompt(&self) -> Option<&str> {
        self.body
            .get("prompt")
            .and_then(non_empty_str)
            .or_else(|| self.input_field("prompt").and_then(non_empty_str))
    }

    /// Error reported by the provider for this item, if any.
    pub fn error_message(&self) -> Option<String> {
        match self.body.get("error")? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Bool(false) => None,
            other => Some(other.to_string()),
        }
    }

    fn input_field(&self, key: &str) -> Option<&Value> {
        self.body.get("input").and_then(|input| input.get(key))
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_top_level_echo() {
        let entry = RawResultEntry::new(json!({"index": 3, "prompt": "best crm?"}));
        assert_eq!(entry.echoed_index(), Some(3));
        assert_eq!(entry.echoed_prompt(), Some("best crm?"));
        assert_eq!(entry.error_message(), None);
    }

    #[test]
    fn test_error_shaped_entry_reads_nested_input() {
        let entry = RawResultEntry::new(json!({
            "index": 0,
            "error": "Timed out waiting for answer",
            "input": {"index": 2, "prompt": "best ats?", "country": "US"}
        }));
        assert_eq!(entry.echoed_index(), Some(2));
        assert_eq!(entry.echoed_prompt(), Some("best ats?"));
        assert_eq!(
            entry.error_message().as_deref(),
            Some("Timed out waiting for answer")
        );
    }

    #[test]
    fn test_zero_index_without_nested_stays_zero() {
        let entry = RawResultEntry::new(json!({"index": 0, "prompt": "x"}));
        assert_eq!(entry.echoed_index(), Some(0));
        let entry = RawResultEntry::new(json!({"prompt": "x"}));
        assert_eq!(entry.echoed_index(), None);
    }

    #[test]
    fn test_blank_error_is_not_an_error() {
        let entry = RawResultEntry::new(json!({"error": "  ", "prompt": ""}));
        assert_eq!(entry.error_message(), None);
        assert_eq!(entry.echoed_prompt(), None);

        let entry = RawResultEntry::new(json!({"error": {"code": "blocked"}}));
        assert_eq!(entry.error_message().as_deref(), Some(r#"{"code":"blocked"}"#));
    }

    #[test]
    fn test_deserializes_transparently() {
        let entries: Vec<RawResultEntry> =
            serde_json::from_str(r#"[{"index":1},{"index":2}]"#).unwrap();
        assert_eq!(entries[1].echoed_index(), Some(2));
    }
}
