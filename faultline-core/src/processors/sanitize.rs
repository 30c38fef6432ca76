use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{EventProcessor, ELISION_PLACEHOLDER, MASK};
use crate::protocol::{Context, Event, Value};

/// Key patterns that are always considered sensitive.
const DEFAULT_SENSITIVE_KEYS: &str = "authorization|password|passwd|secret|ssn|social[-_ ]?security";

static CARD_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{16}$").expect("static regex is valid"));

// Recursion bound for hostile or degenerate value trees; anything
// deeper becomes the elision placeholder.
const MAX_DEPTH: usize = 16;

/// Scrubs values whose key matches a sensitive pattern, and values that
/// look like card numbers, from every value tree of an event.
///
/// Strings that themselves parse as JSON objects or arrays are sanitized
/// and re-serialized in place.
pub struct SanitizeSensitiveData {
    key_re: Regex,
}

impl Default for SanitizeSensitiveData {
    fn default() -> Self {
        Self::new()
    }
}

impl SanitizeSensitiveData {
    /// Creates the sanitizer with the built-in key patterns.
    pub fn new() -> Self {
        Self::with_extra_patterns(&[])
    }

    /// Creates the sanitizer with additional configured key patterns.
    pub fn with_extra_patterns(extra: &[Cow<'static, str>]) -> Self {
        let mut pattern = String::from(DEFAULT_SENSITIVE_KEYS);
        for field in extra {
            pattern.push('|');
            pattern.push_str(&regex::escape(field));
        }
        let key_re =
            Regex::new(&format!("(?i)({pattern})")).expect("sensitive key pattern is valid");
        SanitizeSensitiveData { key_re }
    }

    fn key_is_sensitive(&self, key: &str) -> bool {
        self.key_re.is_match(key)
    }

    fn sanitize_value(&self, key: Option<&str>, value: &mut Value, depth: usize) {
        if depth >= MAX_DEPTH {
            *value = Value::String(ELISION_PLACEHOLDER.into());
            return;
        }
        let sensitive = key.is_some_and(|key| self.key_is_sensitive(key));
        match value {
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    self.sanitize_value(Some(key), value, depth + 1);
                }
            }
            Value::Array(values) => {
                for value in values {
                    self.sanitize_value(key, value, depth + 1);
                }
            }
            Value::String(s) => {
                if sensitive || looks_like_card_number(s) {
                    *s = MASK.into();
                } else if let Some(sanitized) = self.sanitize_embedded_json(s, depth) {
                    *s = sanitized;
                }
            }
            Value::Number(number) => {
                if sensitive && (number.is_i64() || number.is_u64()) {
                    *value = Value::from(0);
                }
            }
            _ => {}
        }
    }

    fn sanitize_embedded_json(&self, s: &str, depth: usize) -> Option<String> {
        let trimmed = s.trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return None;
        }
        let mut parsed: Value = serde_json::from_str(s).ok()?;
        self.sanitize_value(None, &mut parsed, depth + 1);
        serde_json::to_string(&parsed).ok()
    }

    fn sanitize_string_map<'m>(
        &self,
        entries: impl Iterator<Item = (&'m String, &'m mut String)>,
    ) {
        for (key, value) in entries {
            if self.key_is_sensitive(key) || looks_like_card_number(value) {
                *value = MASK.into();
            }
        }
    }
}

fn looks_like_card_number(value: &str) -> bool {
    if value.len() > 32 {
        return false;
    }
    let cleaned: String = value.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    CARD_NUMBER_RE.is_match(&cleaned)
}

impl EventProcessor for SanitizeSensitiveData {
    fn name(&self) -> &'static str {
        "sanitize-sensitive-data"
    }

    fn process(&self, mut event: Event<'static>) -> Event<'static> {
        for (key, value) in event.extra.iter_mut() {
            self.sanitize_value(Some(key), value, 0);
        }
        for breadcrumb in event.breadcrumbs.iter_mut() {
            for (key, value) in breadcrumb.data.iter_mut() {
                self.sanitize_value(Some(key), value, 0);
            }
        }
        if let Some(user) = event.user.as_mut() {
            for (key, value) in user.other.iter_mut() {
                self.sanitize_value(Some(key), value, 0);
            }
        }
        for context in event.contexts.values_mut() {
            if let Context::Other(map) = context {
                for (key, value) in map.iter_mut() {
                    self.sanitize_value(Some(key), value, 0);
                }
            }
        }
        self.sanitize_string_map(event.tags.iter_mut());
        if let Some(request) = event.request.as_mut() {
            self.sanitize_string_map(request.headers.iter_mut());
            if let Some(data) = request.data.as_mut() {
                if looks_like_card_number(data) {
                    *data = MASK.into();
                } else if let Some(sanitized) = self.sanitize_embedded_json(data, 0) {
                    *data = sanitized;
                }
            }
            if let Some(query) = request.query_string.as_mut() {
                if looks_like_card_number(query) {
                    *query = MASK.into();
                }
            }
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Map;
    use serde_json::json;

    fn sanitize(event: Event<'static>) -> Event<'static> {
        SanitizeSensitiveData::new().process(event)
    }

    fn event_with_extra(entries: &[(&str, Value)]) -> Event<'static> {
        Event {
            extra: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_masks_sensitive_keys() {
        let event = sanitize(event_with_extra(&[
            ("password", json!("hunter2")),
            ("Session-Secret", json!("deadbeef")),
            ("user_ssn", json!(123456789)),
            ("harmless", json!("kept")),
        ]));
        assert_eq!(event.extra["password"], json!(MASK));
        assert_eq!(event.extra["Session-Secret"], json!(MASK));
        assert_eq!(event.extra["user_ssn"], json!(0));
        assert_eq!(event.extra["harmless"], json!("kept"));
    }

    #[test]
    fn test_masks_nested_structures() {
        let event = sanitize(event_with_extra(&[(
            "settings",
            json!({"authorization": "Bearer x", "list": [{"passwd": "y"}]}),
        )]));
        assert_eq!(
            event.extra["settings"],
            json!({"authorization": MASK, "list": [{"passwd": MASK}]})
        );
    }

    #[test]
    fn test_masks_card_numbers() {
        let event = sanitize(event_with_extra(&[
            ("card", json!("4242424242424242")),
            ("spaced", json!("4242 4242 4242 4242")),
            ("not_a_card", json!("424242")),
        ]));
        assert_eq!(event.extra["card"], json!(MASK));
        assert_eq!(event.extra["spaced"], json!(MASK));
        assert_eq!(event.extra["not_a_card"], json!("424242"));
    }

    #[test]
    fn test_sanitizes_embedded_json() {
        let event = sanitize(event_with_extra(&[(
            "body",
            json!(r#"{"password":"hunter2","ok":"yes"}"#),
        )]));
        let embedded: Value =
            serde_json::from_str(event.extra["body"].as_str().unwrap()).unwrap();
        assert_eq!(embedded, json!({"password": MASK, "ok": "yes"}));
    }

    #[test]
    fn test_idempotent() {
        let event = event_with_extra(&[
            ("password", json!("hunter2")),
            ("card", json!("4242424242424242")),
            ("nested", json!({"secret": 42})),
        ]);
        let once = sanitize(event);
        let twice = sanitize(once.clone());
        assert_eq!(once.extra, twice.extra);
    }

    #[test]
    fn test_mask_does_not_match_card_pattern() {
        assert!(!looks_like_card_number(MASK));
    }

    #[test]
    fn test_depth_bound_inserts_placeholder() {
        let mut deep = json!("leaf");
        for _ in 0..64 {
            deep = json!({ "level": deep });
        }
        let event = sanitize(event_with_extra(&[("deep", deep)]));
        // the processor terminated, and the excess depth was elided
        let serialized = serde_json::to_string(&event.extra["deep"]).unwrap();
        assert!(serialized.contains(ELISION_PLACEHOLDER));
    }

    #[test]
    fn test_masks_request_and_tags() {
        let mut tags = Map::new();
        tags.insert("password".to_string(), "hunter2".to_string());
        let mut headers = Map::new();
        headers.insert("X-Card".to_string(), "4242-4242-4242-4242".to_string());
        let event = sanitize(Event {
            tags,
            request: Some(crate::protocol::Request {
                headers,
                data: Some(r#"{"secret":"x"}"#.into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert_eq!(event.tags["password"], MASK);
        let request = event.request.unwrap();
        assert_eq!(request.headers["X-Card"], MASK);
        assert_eq!(request.data.unwrap(), r#"{"secret":"********"}"#);
    }
}
