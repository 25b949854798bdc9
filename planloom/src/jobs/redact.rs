//! Redaction of sensitive fields before an action's parameters/result are
//! persisted to `plan_action_logs.details_json` (spec §4.3, §9 "Redaction":
//! sensitive keys are masked, oversize strings are truncated, oversize
//! arrays are summarised).

use serde_json::Value;

const REDACTED: &str = "[redacted]";

/// Strings longer than this are truncated with a trailing marker noting how
/// much was cut.
const MAX_STRING_LEN: usize = 2000;

/// Arrays longer than this are summarised down to a leading sample plus a
/// count of the elements omitted.
const MAX_ARRAY_LEN: usize = 50;

const SENSITIVE_KEYS: &[&str] = &[
    "api_key",
    "apikey",
    "token",
    "access_token",
    "refresh_token",
    "password",
    "secret",
    "authorization",
    "client_secret",
];

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|k| lower.contains(k))
}

fn truncate_string(s: &str) -> Value {
    if s.chars().count() <= MAX_STRING_LEN {
        return Value::String(s.to_string());
    }
    let truncated: String = s.chars().take(MAX_STRING_LEN).collect();
    let omitted = s.chars().count() - MAX_STRING_LEN;
    Value::String(format!("{truncated}... [truncated, {omitted} more chars]"))
}

/// Recursively mask values under keys that look like credentials, truncate
/// oversize strings, and summarise oversize arrays.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact(v));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            if items.len() > MAX_ARRAY_LEN {
                let omitted = items.len() - MAX_ARRAY_LEN;
                let mut sample: Vec<Value> = items.iter().take(MAX_ARRAY_LEN).map(redact).collect();
                sample.push(Value::String(format!("[summarised: {omitted} more items omitted]")));
                Value::Array(sample)
            } else {
                Value::Array(items.iter().map(redact).collect())
            }
        }
        Value::String(s) => truncate_string(s),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_known_sensitive_keys_at_any_depth() {
        let input = json!({
            "query": "weather",
            "auth": { "api_key": "sk-abc123", "nested": { "password": "hunter2" } }
        });
        let redacted = redact(&input);
        assert_eq!(redacted["query"], json!("weather"));
        assert_eq!(redacted["auth"]["api_key"], json!(REDACTED));
        assert_eq!(redacted["auth"]["nested"]["password"], json!(REDACTED));
    }

    #[test]
    fn leaves_non_sensitive_values_untouched() {
        let input = json!({"name": "create_plan", "count": 3});
        assert_eq!(redact(&input), input);
    }

    #[test]
    fn truncates_oversize_strings() {
        let long = "x".repeat(MAX_STRING_LEN + 100);
        let redacted = redact(&json!({"content": long}));
        let content = redacted["content"].as_str().unwrap();
        assert!(content.len() < MAX_STRING_LEN + 100);
        assert!(content.contains("truncated"));
    }

    #[test]
    fn summarises_oversize_arrays() {
        let items: Vec<Value> = (0..MAX_ARRAY_LEN + 10).map(|i| json!(i)).collect();
        let redacted = redact(&json!({"items": items}));
        let array = redacted["items"].as_array().unwrap();
        assert_eq!(array.len(), MAX_ARRAY_LEN + 1);
        assert!(array.last().unwrap().as_str().unwrap().contains("summarised"));
    }
}
