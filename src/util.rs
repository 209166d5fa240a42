//! Shared helpers for parsing text-mode CLI output.

/// Extract the first complete JSON object or array from text that may carry
/// banners, warnings or trailing noise around it.
///
/// Brackets inside string literals are ignored.
pub fn extract_json_value(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Collapse an output blob to a single line, capped for log and error text.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_simple() {
        let text = r#"{"key": "value"}"#;
        assert_eq!(extract_json_value(text), Some(r#"{"key": "value"}"#));
    }

    #[test]
    fn test_extract_json_array_with_banner() {
        let text = "╭─ info ─╮\nUsing store demo\n[{\"id\": 1}]\n";
        assert_eq!(extract_json_value(text), Some(r#"[{"id": 1}]"#));
    }

    #[test]
    fn test_extract_json_object_with_suffix() {
        let text = r#"{"key": "value"} and some more text"#;
        assert_eq!(extract_json_value(text), Some(r#"{"key": "value"}"#));
    }

    #[test]
    fn test_extract_json_ignores_brackets_in_strings() {
        let text = r#"{"name": "a } tricky [name", "nested": {"x": "\"}"}}"#;
        assert_eq!(extract_json_value(text), Some(text));
    }

    #[test]
    fn test_extract_json_no_json() {
        assert_eq!(extract_json_value("No JSON here"), None);
    }

    #[test]
    fn test_extract_json_unclosed() {
        assert_eq!(extract_json_value(r#"{"key": "value""#), None);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("a\n  b\tc", 10), "a b c");
        assert_eq!(truncate_for_log("abcdefghij", 4), "abcd…");
    }
}
