//! `{{field}}` substitution from a source record.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("placeholder regex"));

/// Replace every `{{field}}` with the record's value for `field`.
///
/// Missing or null fields render as an empty string.
pub fn render(template: &str, record: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| display(record.get(&caps[1])))
        .into_owned()
}

/// Render every string found in `value`, recursing into arrays and objects.
pub fn render_value(value: &Value, record: &Value) -> Value {
    match value {
        Value::String(s) if PLACEHOLDER.is_match(s) => Value::String(render(s, record)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, record)).collect()),
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(k, v)| (k.clone(), render_value(v, record)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn display(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render() {
        let record = json!({ "title": "A", "subtitle": "B", "year": 2024 });
        assert_eq!(render("{{title}}: {{ subtitle }}", &record), "A: B");
        assert_eq!(render("{{year}}", &record), "2024");
        assert_eq!(render("[{{missing}}]", &record), "[]");
    }

    #[test]
    fn test_render_nested() {
        let record = json!({ "author": "Jo" });
        let value = json!({ "name": "{{author}}", "tags": ["by {{author}}"], "n": 1 });
        assert_eq!(
            render_value(&value, &record),
            json!({ "name": "Jo", "tags": ["by Jo"], "n": 1 })
        );
    }
}
