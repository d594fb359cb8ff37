//! Recursive payload sanitizing.
//!
//! Every string leaf of a decoded request payload is run through the
//! detector. A single suspicious leaf rejects the whole payload; otherwise a
//! cleaned copy is returned with a fixed set of characters stripped from
//! every string.

use serde_json::{Map, Value};

use crate::detector;
use crate::error::{ServiceError, ServiceResult};

/// Characters removed from strings that passed detection.
const STRIPPED: &[char] = &[
    '<', '>', '"', '\'', ';', '\\', '(', ')', '{', '}', '[', ']', '|', '&', '$',
];

/// Sanitizes a single string leaf.
///
/// The `field` of a rejection is empty; callers walking a tree prefix it.
pub fn sanitize_str(input: &str) -> ServiceResult<String> {
    let verdict = detector::classify(input);
    if verdict.suspicious {
        return Err(ServiceError::MaliciousInputDetected {
            field: String::new(),
            category: verdict.category,
        });
    }
    Ok(input.chars().filter(|c| !STRIPPED.contains(c)).collect())
}

/// Returns a cleaned copy of `value`, or the first offending field.
///
/// Field paths are dotted for object keys and bracketed for array indices,
/// e.g. `items[2].note`.
pub fn sanitize(value: &Value) -> ServiceResult<Value> {
    match value {
        Value::String(s) => sanitize_str(s).map(Value::String),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| sanitize(item).map_err(|e| e.within(&format!("[{i}]"))))
            .collect::<ServiceResult<Vec<_>>>()
            .map(Value::Array),
        Value::Object(fields) => {
            let mut cleaned = Map::with_capacity(fields.len());
            for (key, item) in fields {
                let item = sanitize(item).map_err(|e| e.within(key))?;
                cleaned.insert(key.clone(), item);
            }
            Ok(Value::Object(cleaned))
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => Ok(value.clone()),
    }
}

/// Non-failing outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Validation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Validation {
    pub(crate) fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub(crate) fn invalid(err: &ServiceError) -> Self {
        Self {
            is_valid: false,
            error: Some(err.to_string()),
        }
    }
}

/// Runs [`sanitize`] and reports the outcome as a value.
pub fn validate(value: &Value) -> Validation {
    match sanitize(value) {
        Ok(_) => Validation::valid(),
        Err(e) => Validation::invalid(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Category;
    use proptest::prelude::*;
    use serde_json::json;

    fn rejected_field(value: &Value) -> (String, Category) {
        match sanitize(value) {
            Err(ServiceError::MaliciousInputDetected { field, category }) => (field, category),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn rejects_payload_naming_field() {
        let payload = json!({"name": "Ana", "note": "DROP TABLE users;"});
        let (field, category) = rejected_field(&payload);
        assert_eq!(field, "note");
        assert_eq!(category, Category::Sql);
    }

    #[test]
    fn nested_paths() {
        let payload = json!({
            "customer": {"address": {"street": "<script>alert(1)</script>"}}
        });
        assert_eq!(rejected_field(&payload).0, "customer.address.street");

        let payload = json!({"items": [{"sku": "A1"}, {"sku": "B2"}, {"note": "1 OR 1=1"}]});
        assert_eq!(rejected_field(&payload).0, "items[2].note");

        let payload = json!([["ok", "x--"]]);
        assert_eq!(rejected_field(&payload).0, "[0][1]");

        assert_eq!(rejected_field(&json!("javascript:void")), (String::new(), Category::Xss));
    }

    #[test]
    fn clean_payload_is_preserved() {
        let payload = json!({
            "name": "Ana Souza",
            "quantity": 3,
            "gift": false,
            "coupon": null,
            "tags": ["summer", "sale"],
            "address": {"city": "Lisboa"}
        });
        assert_eq!(sanitize(&payload).unwrap(), payload);
    }

    #[test]
    fn stripping_applies_to_clean_strings() {
        // None of these characters trip a detection rule.
        assert_eq!(sanitize_str("a{b}c[d]e|f&g").unwrap(), "abcdefg");
        assert_eq!(sanitize_str("R& D").unwrap(), "R D");
    }

    #[test]
    fn validate_reports_instead_of_failing() {
        let ok = validate(&json!({"name": "Ana"}));
        assert!(ok.is_valid);
        assert!(ok.error.is_none());

        let bad = validate(&json!({"comment": "<iframe src=x>"}));
        assert!(!bad.is_valid);
        assert!(bad.error.unwrap().contains("comment"));
    }

    #[test]
    fn legitimate_punctuation_is_rejected() {
        assert!(sanitize(&json!({"surname": "O'Neil"})).is_err());
        assert!(sanitize(&json!({"review": "Great product, fast shipping!"})).is_err());
    }

    proptest! {
        #[test]
        fn idempotent_on_unflagged_strings(s in "[a-zA-Z0-9 .@_:!?%#-]{0,40}") {
            if let Ok(once) = sanitize_str(&s) {
                prop_assert_eq!(&once, &s);
                let twice = sanitize_str(&once).unwrap();
                prop_assert_eq!(twice, once);
            }
        }

        #[test]
        fn non_string_scalars_pass_through(n in any::<i64>(), b in any::<bool>()) {
            prop_assert_eq!(sanitize(&json!(n)).unwrap(), json!(n));
            prop_assert_eq!(sanitize(&json!(b)).unwrap(), json!(b));
        }
    }
}
