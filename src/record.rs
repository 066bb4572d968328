//! `RawRecord` — the loosely-typed unit one extractor run produces per
//! listing. A thin wrapper over a JSON object map with total accessors:
//! absent or wrongly-typed fields read as `None` / defaults, never as
//! errors. Records are ephemeral and discarded after normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from any JSON value; non-objects yield an empty record.
    pub fn from_value(v: Value) -> Self {
        match v {
            Value::Object(map) => Self(map),
            _ => Self(Map::new()),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field, `None` when absent or not a string.
    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// First non-empty string among `keys` (source shapes disagree on
    /// naming: `positionName` vs `title`, `url` vs `link`).
    pub fn text_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.str(k))
            .map(str::trim)
            .find(|s| !s.is_empty())
    }

    /// Numeric field read permissively: accepts numbers and numeric
    /// strings with thousands separators ("1,024").
    pub fn f64_like(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', "").parse().ok(),
            _ => None,
        }
    }

    /// Non-negative integer field; negative and junk values read as `None`.
    pub fn u64_like(&self, key: &str) -> Option<u64> {
        let v = self.f64_like(key)?;
        if v.is_finite() && v >= 0.0 {
            Some(v as u64)
        } else {
            None
        }
    }

    /// List-of-strings field. Accepts a JSON array of strings (the Apify
    /// `jobType` shape) or a comma-joined string (the event `themes` shape).
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessors_tolerate_missing_and_mistyped_fields() {
        let r = RawRecord::from_value(json!({
            "title": "AI Hackathon",
            "participants": "1,204",
            "rating": 4.5,
            "themes": "AI, Machine Learning, ",
            "job_types": ["Full-time", " Internship ", ""],
            "weird": { "nested": true }
        }));

        assert_eq!(r.str("title"), Some("AI Hackathon"));
        assert_eq!(r.str("missing"), None);
        assert_eq!(r.str("weird"), None);
        assert_eq!(r.u64_like("participants"), Some(1204));
        assert_eq!(r.f64_like("rating"), Some(4.5));
        assert_eq!(r.u64_like("rating"), Some(4));
        assert_eq!(r.string_list("themes"), vec!["AI", "Machine Learning"]);
        assert_eq!(r.string_list("job_types"), vec!["Full-time", "Internship"]);
        assert!(r.string_list("absent").is_empty());
    }

    #[test]
    fn text_any_picks_first_non_empty_alias() {
        let r = RawRecord::from_value(json!({
            "positionName": "  ",
            "title": "Software Intern",
            "url": "https://example.test/j/1"
        }));
        assert_eq!(r.text_any(&["positionName", "title"]), Some("Software Intern"));
        assert_eq!(r.text_any(&["link", "url"]), Some("https://example.test/j/1"));
        assert_eq!(r.text_any(&["nope"]), None);
    }

    #[test]
    fn negative_counts_read_as_none() {
        let r = RawRecord::from_value(json!({ "participants": -3 }));
        assert_eq!(r.u64_like("participants"), None);
    }

    #[test]
    fn non_object_value_yields_empty_record() {
        let r = RawRecord::from_value(json!(["not", "an", "object"]));
        assert!(r.is_empty());
    }
}
