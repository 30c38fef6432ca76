use super::{for_each_string, EventProcessor};
use crate::protocol::{Context, Event};

/// Truncates a string to at most `max_bytes` bytes.
///
/// The cut is byte-exact for ASCII input; if the ceiling falls inside a
/// multi-byte sequence the cut backs up to the previous char boundary so
/// the result is always valid UTF-8.
pub fn truncate_to_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

/// Truncates every string value of an event to the configured byte
/// ceiling.
///
/// Runs last in the chain so the ceilings apply to data the earlier
/// processors have already reduced.
pub struct TruncateStrings {
    max_bytes: usize,
}

impl TruncateStrings {
    /// Creates the processor with the given byte ceiling.
    pub fn new(max_bytes: usize) -> Self {
        TruncateStrings { max_bytes }
    }
}

impl EventProcessor for TruncateStrings {
    fn name(&self) -> &'static str {
        "truncate-strings"
    }

    fn process(&self, mut event: Event<'static>) -> Event<'static> {
        if self.max_bytes == 0 {
            return event;
        }
        let mut truncate = |s: &mut String| truncate_to_char_boundary(s, self.max_bytes);

        if let Some(message) = event.message.as_mut() {
            truncate(message);
        }
        for exception in event.exception.iter_mut() {
            if let Some(value) = exception.value.as_mut() {
                truncate(value);
            }
        }
        for breadcrumb in event.breadcrumbs.iter_mut() {
            if let Some(message) = breadcrumb.message.as_mut() {
                truncate(message);
            }
            for value in breadcrumb.data.values_mut() {
                for_each_string(value, &mut truncate);
            }
        }
        for value in event.extra.values_mut() {
            for_each_string(value, &mut truncate);
        }
        for value in event.tags.values_mut() {
            truncate(value);
        }
        for context in event.contexts.values_mut() {
            if let Context::Other(map) = context {
                for value in map.values_mut() {
                    for_each_string(value, &mut truncate);
                }
            }
        }
        if let Some(user) = event.user.as_mut() {
            for value in user.other.values_mut() {
                for_each_string(value, &mut truncate);
            }
        }
        if let Some(request) = event.request.as_mut() {
            if let Some(data) = request.data.as_mut() {
                truncate(data);
            }
            if let Some(query) = request.query_string.as_mut() {
                truncate(query);
            }
            if let Some(cookies) = request.cookies.as_mut() {
                truncate(cookies);
            }
            for value in request.headers.values_mut() {
                truncate(value);
            }
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_cut_is_byte_exact() {
        let mut s = "x".repeat(1000);
        truncate_to_char_boundary(&mut s, 100);
        assert_eq!(s.len(), 100);
    }

    #[test]
    fn test_multibyte_cut_stays_valid() {
        // 'é' is two bytes; a 100 byte ceiling lands mid-character.
        let mut s = "é".repeat(500);
        truncate_to_char_boundary(&mut s, 101);
        assert_eq!(s.len(), 100);
        assert!(s.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_short_strings_are_untouched() {
        let mut s = String::from("short");
        truncate_to_char_boundary(&mut s, 100);
        assert_eq!(s, "short");
    }

    #[test]
    fn test_event_strings_are_truncated() {
        let mut event = Event {
            message: Some("m".repeat(64)),
            ..Default::default()
        };
        event.extra.insert("blob".into(), "e".repeat(64).into());
        let event = TruncateStrings::new(16).process(event);
        assert_eq!(event.message.unwrap().len(), 16);
        assert_eq!(event.extra["blob"].as_str().unwrap().len(), 16);
    }
}
