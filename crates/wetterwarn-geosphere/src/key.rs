//! Stable identity of a warning across update cycles.

use serde_json::Value;

use crate::types::Warning;

const COMPOSITE_SEPARATOR: &str = "|";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WarningKey(String);

impl WarningKey {
    /// Derive the key of `warning`.
    ///
    /// The first truthy identity field (`id`, `awcode`, `warnid`, `wcode`) wins
    /// and yields `"<field>:<value>"`. Without one, the key is the
    /// `|`-joined `wtype`, `wlevel`, `start` and `end`, missing fields empty.
    pub fn derive(warning: &Warning) -> Self {
        let raw = warning.rawinfo();

        for (field, value) in raw.identity_fields() {
            if let Some(value) = value.filter(|v| is_truthy(v)) {
                return Self(format!("{}:{}", field, render(value)));
            }
        }

        let composite = raw
            .descriptive_fields()
            .into_iter()
            .map(|value| value.map(render).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(COMPOSITE_SEPARATOR);
        Self(composite)
    }
}

impl std::fmt::Display for WarningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
