use serde::{Deserialize, Deserializer, Serialize};

/// A remote theme as reported by `shopify theme list --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSummary {
    pub name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub role: String,
}

/// Theme ids come back as JSON numbers from the CLI but are handled as
/// opaque strings everywhere else.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

/// Normalise a JSON id value into a non-empty string.
pub(crate) fn id_from_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_summary_accepts_numeric_id() {
        let theme: ThemeSummary =
            serde_json::from_str(r#"{"name": "Dawn", "id": 128, "role": "live"}"#).unwrap();
        assert_eq!(theme.id, "128");
    }

    #[test]
    fn test_theme_summary_accepts_string_id() {
        let theme: ThemeSummary =
            serde_json::from_str(r#"{"name": "Dawn", "id": "128", "role": "unpublished"}"#)
                .unwrap();
        assert_eq!(theme.id, "128");
        assert_eq!(theme.role, "unpublished");
    }

    #[test]
    fn test_id_from_value() {
        assert_eq!(id_from_value(&serde_json::json!(999)), Some("999".into()));
        assert_eq!(id_from_value(&serde_json::json!(" 7 ")), Some("7".into()));
        assert_eq!(id_from_value(&serde_json::json!("")), None);
        assert_eq!(id_from_value(&serde_json::json!(null)), None);
    }
}
