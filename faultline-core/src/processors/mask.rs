use std::borrow::Cow;

use super::{EventProcessor, MASK};
use crate::protocol::Event;

/// Masks sensitive request headers and all cookie values.
///
/// Operates on both the structured header map and the duplicate cookie
/// representation of the request interface, so a value can not survive
/// in one place while being masked in the other.
pub struct MaskHeadersAndCookies {
    sensitive: Vec<Cow<'static, str>>,
}

impl MaskHeadersAndCookies {
    /// Creates the processor masking the given header names.
    pub fn new(sensitive: Vec<Cow<'static, str>>) -> Self {
        MaskHeadersAndCookies { sensitive }
    }

    fn is_sensitive(&self, header: &str) -> bool {
        self.sensitive
            .iter()
            .any(|name| name.eq_ignore_ascii_case(header))
    }
}

fn mask_cookie_string(cookies: &str) -> String {
    cookies
        .split(';')
        .map(|pair| match pair.trim().split_once('=') {
            Some((name, _)) => format!("{name}={MASK}"),
            None => MASK.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl EventProcessor for MaskHeadersAndCookies {
    fn name(&self) -> &'static str {
        "mask-headers-and-cookies"
    }

    fn process(&self, mut event: Event<'static>) -> Event<'static> {
        if let Some(request) = event.request.as_mut() {
            for (key, value) in request.headers.iter_mut() {
                if self.is_sensitive(key) {
                    *value = MASK.into();
                } else if key.eq_ignore_ascii_case("cookie") {
                    *value = mask_cookie_string(value);
                }
            }
            if let Some(cookies) = request.cookies.as_mut() {
                *cookies = mask_cookie_string(cookies);
            }
        }
        event
    }
}

/// Replaces the entire captured request body with the mask token for
/// methods that carry one.
pub struct MaskRequestBodies;

const BODY_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

impl EventProcessor for MaskRequestBodies {
    fn name(&self) -> &'static str {
        "mask-request-bodies"
    }

    fn process(&self, mut event: Event<'static>) -> Event<'static> {
        if let Some(request) = event.request.as_mut() {
            let matches_method = request
                .method
                .as_deref()
                .is_some_and(|method| {
                    BODY_METHODS
                        .iter()
                        .any(|candidate| candidate.eq_ignore_ascii_case(method))
                });
            if matches_method && request.data.is_some() {
                request.data = Some(MASK.into());
            }
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Map, Request};

    fn request_event(request: Request) -> Event<'static> {
        Event {
            request: Some(request),
            ..Default::default()
        }
    }

    #[test]
    fn test_masks_authorization_and_cookies() {
        let mut headers = Map::new();
        headers.insert("Authorization".to_string(), "Bearer token".to_string());
        headers.insert("Cookie".to_string(), "sid=abc; theme=dark".to_string());
        headers.insert("Accept".to_string(), "text/html".to_string());

        let processor = MaskHeadersAndCookies::new(vec![Cow::Borrowed("authorization")]);
        let event = processor.process(request_event(Request {
            headers,
            cookies: Some("sid=abc; theme=dark".into()),
            ..Default::default()
        }));

        let request = event.request.unwrap();
        assert_eq!(request.headers["Authorization"], MASK);
        assert_eq!(request.headers["Cookie"], "sid=********; theme=********");
        assert_eq!(request.headers["Accept"], "text/html");
        assert_eq!(request.cookies.unwrap(), "sid=********; theme=********");
    }

    #[test]
    fn test_masks_post_body_only() {
        for (method, expect_masked) in [("POST", true), ("put", true), ("GET", false)] {
            let event = MaskRequestBodies.process(request_event(Request {
                method: Some(method.into()),
                data: Some("a=1&b=2".into()),
                ..Default::default()
            }));
            let data = event.request.unwrap().data.unwrap();
            if expect_masked {
                assert_eq!(data, MASK);
            } else {
                assert_eq!(data, "a=1&b=2");
            }
        }
    }
}
