use serde_json::Value;

/// A PATCH field that may be left out, explicitly nulled, or set.
#[derive(Debug, PartialEq, Eq)]
pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}

/// Tag colours are stored as `#rrggbb`.
pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn classifies_patch_fields() {
        let body = json!({ "label": "x", "color": null, "count": 3 });
        assert_eq!(classify_nullable(body.get("missing")), Ok(NullableValue::Omitted));
        assert_eq!(classify_nullable(body.get("color")), Ok(NullableValue::Null));
        assert_eq!(
            classify_nullable(body.get("label")),
            Ok(NullableValue::String("x".into()))
        );
        assert!(classify_nullable(body.get("count")).is_err());
    }

    #[test]
    fn validates_hex_colors() {
        assert!(is_hex_color("#00FFaa"));
        assert!(!is_hex_color("00FFaa"));
        assert!(!is_hex_color("#00FFa"));
        assert!(!is_hex_color("#00FFgg"));
    }
}
