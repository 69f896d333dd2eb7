use serde_json::Value;

/// A row of a remote collection (a person, a leader, a tag...).
pub type Entity = Value;

/// Returns the primary identifier of an entity.
///
/// Ids may be strings or numbers on the wire; numbers are normalized to
/// their decimal form so `7` and `"7"` address the same entity.
pub fn entity_id(entity: &Value) -> Option<String> {
    match entity.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_id() {
        assert_eq!(entity_id(&json!({"id": "t1"})), Some("t1".to_string()));
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(entity_id(&json!({"id": 42})), Some("42".to_string()));
    }

    #[test]
    fn test_missing_or_invalid_id() {
        assert_eq!(entity_id(&json!({"name": "VIP"})), None);
        assert_eq!(entity_id(&json!({"id": ""})), None);
        assert_eq!(entity_id(&json!({"id": null})), None);
        assert_eq!(entity_id(&json!("not an object")), None);
    }
}
