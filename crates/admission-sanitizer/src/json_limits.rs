//! JSON recursive-descent shape limits.
//!
//! Depth violations truncate the offending subtree to `null` and record a
//! "high" threat. Array-length violations truncate to the cap and record a
//! "medium" threat. Per-field string-length violations record a "medium"
//! threat but the field is left untouched, not truncated.

use serde_json::Value;

use admission_context::{Severity, ThreatKind, ThreatRecord};

use crate::config::JsonLimits;

/// Walks `value` depth-first, enforcing `limits`, returning the
/// (possibly truncated) value and every threat recorded along the way.
pub fn enforce(value: Value, limits: &JsonLimits) -> (Value, Vec<ThreatRecord>) {
    let mut threats = Vec::new();
    let truncated = walk(value, limits, 0, "$", &mut threats);
    (truncated, threats)
}

fn walk(value: Value, limits: &JsonLimits, depth: usize, path: &str, threats: &mut Vec<ThreatRecord>) -> Value {
    if depth > limits.max_depth {
        threats.push(ThreatRecord::new(
            ThreatKind::OversizedPayload,
            Severity::High,
            path,
            format!("depth > {}", limits.max_depth),
            "<subtree truncated>",
        ));
        return Value::Null;
    }

    match value {
        Value::String(s) => {
            if s.len() > limits.max_string_len {
                threats.push(ThreatRecord::new(
                    ThreatKind::OversizedPayload,
                    Severity::Medium,
                    path,
                    format!("string length > {}", limits.max_string_len),
                    &s[..s.len().min(80)],
                ));
            }
            Value::String(s)
        }
        Value::Array(items) => {
            let overflowed = items.len() > limits.max_array_len;
            let capped: Vec<Value> = items
                .into_iter()
                .take(limits.max_array_len)
                .enumerate()
                .map(|(i, item)| walk(item, limits, depth + 1, &format!("{path}[{i}]"), threats))
                .collect();
            if overflowed {
                threats.push(ThreatRecord::new(
                    ThreatKind::OversizedPayload,
                    Severity::Medium,
                    path,
                    format!("array length > {}", limits.max_array_len),
                    format!("truncated to {} elements", limits.max_array_len),
                ));
            }
            Value::Array(capped)
        }
        Value::Object(map) => {
            let walked = map
                .into_iter()
                .map(|(k, v)| {
                    let field_path = format!("{path}.{k}");
                    let v = walk(v, limits, depth + 1, &field_path, threats);
                    (k, v)
                })
                .collect();
            Value::Object(walked)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn depth_violation_truncates_to_null_and_records_high_threat() {
        let limits = JsonLimits {
            max_depth: 1,
            ..JsonLimits::default()
        };
        let value = json!({"a": {"b": {"c": 1}}});
        let (out, threats) = enforce(value, &limits);
        assert_eq!(out["a"]["b"], Value::Null);
        assert!(threats.iter().any(|t| t.severity == Severity::High));
    }

    #[test]
    fn array_overflow_truncates_and_records_medium_threat() {
        let limits = JsonLimits {
            max_array_len: 2,
            ..JsonLimits::default()
        };
        let value = json!([1, 2, 3, 4]);
        let (out, threats) = enforce(value, &limits);
        assert_eq!(out.as_array().unwrap().len(), 2);
        assert!(threats.iter().any(|t| t.severity == Severity::Medium));
    }

    #[test]
    fn oversized_string_records_threat_but_is_not_truncated() {
        let limits = JsonLimits {
            max_string_len: 4,
            ..JsonLimits::default()
        };
        let value = json!({"q": "hello world"});
        let (out, threats) = enforce(value, &limits);
        assert_eq!(out["q"], "hello world");
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].severity, Severity::Medium);
    }

    #[test]
    fn well_formed_small_documents_produce_no_threats() {
        let limits = JsonLimits::default();
        let value = json!({"q": "search term", "tags": ["a", "b"]});
        let (out, threats) = enforce(value.clone(), &limits);
        assert_eq!(out, value);
        assert!(threats.is_empty());
    }
}
