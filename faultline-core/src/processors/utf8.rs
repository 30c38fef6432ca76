//! UTF-8 repair at the byte ingress points.
//!
//! Strings inside an event are valid UTF-8 by construction, so repair
//! happens where raw bytes enter the pipeline: captured request bodies
//! and textual attachments. Invalid sequences are replaced instead of
//! raised.

/// Decodes bytes as UTF-8, replacing invalid sequences with U+FFFD.
pub fn repair_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Builds a request body string from captured raw bytes.
///
/// This is the ingress helper request-interface adapters use so a body
/// with broken encoding degrades to a replaced character instead of an
/// error.
pub fn request_body_from_bytes(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        Some(repair_lossy(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_input_is_unchanged() {
        assert_eq!(repair_lossy(b"hello"), "hello");
        assert_eq!(repair_lossy("héllo".as_bytes()), "héllo");
    }

    #[test]
    fn test_invalid_sequences_are_replaced() {
        let repaired = repair_lossy(b"f\xf8\xa1\xa1\xa1\xa1o");
        assert!(repaired.starts_with('f'));
        assert!(repaired.ends_with('o'));
        assert!(repaired.contains('\u{FFFD}'));
        // the repaired string is valid by construction
        assert!(String::from_utf8(repaired.into_bytes()).is_ok());
    }

    #[test]
    fn test_empty_body_is_none() {
        assert_eq!(request_body_from_bytes(b""), None);
        assert_eq!(request_body_from_bytes(b"a=1"), Some("a=1".into()));
    }
}
