use std::time::{Duration, SystemTime};

use httpdate::parse_http_date;

use crate::protocol::{DiscardReason, Envelope, EnvelopeItem};
use crate::LostEventLog;

// Applied when the server answers 429 without any explicit window.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// A utility that tracks per-category send cooldowns.
///
/// When the server communicates a rate limit the affected categories are
/// not even attempted until the deadline passes; the skipped items are
/// counted as rate-limited lost events.
#[derive(Debug, Default)]
pub struct RateLimiter {
    global: Option<SystemTime>,
    error: Option<SystemTime>,
    transaction: Option<SystemTime>,
    attachment: Option<SystemTime>,
}

impl RateLimiter {
    /// Creates a new RateLimiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the RateLimiter with information from a `Retry-After`
    /// header, which carries either a number of seconds or an HTTP date.
    pub fn update_from_retry_after(&mut self, header: &str) {
        let new_time = if let Ok(value) = header.trim().parse::<f64>() {
            Some(SystemTime::now() + Duration::from_secs(value.ceil() as u64))
        } else if let Ok(value) = parse_http_date(header.trim()) {
            Some(value)
        } else {
            None
        };

        if new_time.is_some() {
            self.global = new_time;
        }
    }

    /// Updates the RateLimiter with information from an
    /// `x-faultline-rate-limits` header.
    ///
    /// The header is a comma separated list of `category:seconds` pairs;
    /// an empty category names the global window.
    pub fn update_from_rate_limits_header(&mut self, header: &str) {
        let mut parse_pair = |pair: &str| {
            let (category, seconds) = pair.split_once(':')?;
            let seconds = seconds.trim().parse::<f64>().ok()?;
            let new_time = Some(SystemTime::now() + Duration::from_secs(seconds.ceil() as u64));

            match category.trim() {
                "" => self.global = new_time,
                "error" => self.error = new_time,
                "transaction" => self.transaction = new_time,
                "attachment" => self.attachment = new_time,
                _ => {}
            }
            Some(())
        };

        for pair in header.split(',') {
            parse_pair(pair.trim());
        }
    }

    /// Applies the default cooldown after a 429 without explicit headers.
    pub fn update_from_429(&mut self) {
        self.global = Some(SystemTime::now() + DEFAULT_COOLDOWN);
    }

    /// Queries the RateLimiter for a certain category of item.
    ///
    /// Returns the remaining cooldown if the category is currently
    /// limited.
    pub fn is_disabled(&self, category: RateLimitingCategory) -> Option<Duration> {
        if let Some(ts) = self.global {
            let time_left = ts.duration_since(SystemTime::now()).ok();
            if time_left.is_some() {
                return time_left;
            }
        }
        let time_left = match category {
            RateLimitingCategory::Any => self.global,
            RateLimitingCategory::Error => self.error,
            RateLimitingCategory::Transaction => self.transaction,
            RateLimitingCategory::Attachment => self.attachment,
        }?;
        time_left.duration_since(SystemTime::now()).ok()
    }

    /// Removes rate-limited items from the envelope, recording each as a
    /// lost event. `None` means nothing is left to send.
    pub fn filter_envelope(&self, envelope: Envelope, lost: &LostEventLog) -> Option<Envelope> {
        envelope.filter(|item| match self.is_disabled(categorize(item)) {
            Some(_) => {
                lost.record(DiscardReason::RateLimited);
                false
            }
            None => true,
        })
    }
}

fn categorize(item: &EnvelopeItem) -> RateLimitingCategory {
    match item {
        EnvelopeItem::Event(_) => RateLimitingCategory::Error,
        EnvelopeItem::Transaction(_) => RateLimitingCategory::Transaction,
        EnvelopeItem::Attachment(_) => RateLimitingCategory::Attachment,
        _ => RateLimitingCategory::Any,
    }
}

/// The category of payload that a rate limit refers to.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitingCategory {
    /// Rate limit for any kind of payload.
    Any,
    /// Rate limit pertaining to errors.
    Error,
    /// Rate limit pertaining to transactions.
    Transaction,
    /// Rate limit pertaining to attachments.
    Attachment,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Event;

    #[test]
    fn test_rate_limits_header() {
        let mut rl = RateLimiter::new();
        rl.update_from_rate_limits_header("error:120, transaction:60");

        assert!(rl.is_disabled(RateLimitingCategory::Error).unwrap() <= Duration::from_secs(120));
        assert!(
            rl.is_disabled(RateLimitingCategory::Transaction).unwrap() <= Duration::from_secs(60)
        );
        assert!(rl.is_disabled(RateLimitingCategory::Attachment).is_none());
        assert!(rl.is_disabled(RateLimitingCategory::Any).is_none());

        rl.update_from_rate_limits_header(":30, bogus, unknown:10");
        assert!(rl.is_disabled(RateLimitingCategory::Any).unwrap() <= Duration::from_secs(30));
        assert!(rl.is_disabled(RateLimitingCategory::Attachment).unwrap() <= Duration::from_secs(30));
    }

    #[test]
    fn test_retry_after() {
        let mut rl = RateLimiter::new();
        rl.update_from_retry_after("60");

        for category in [
            RateLimitingCategory::Any,
            RateLimitingCategory::Error,
            RateLimitingCategory::Transaction,
            RateLimitingCategory::Attachment,
        ] {
            assert!(rl.is_disabled(category).unwrap() <= Duration::from_secs(60));
        }
    }

    #[test]
    fn test_garbage_headers_are_ignored() {
        let mut rl = RateLimiter::new();
        rl.update_from_retry_after("not a time");
        rl.update_from_rate_limits_header("complete garbage");
        assert!(rl.is_disabled(RateLimitingCategory::Any).is_none());
    }

    #[test]
    fn test_filter_envelope_records_losses() {
        let mut rl = RateLimiter::new();
        rl.update_from_rate_limits_header("error:60");

        let mut envelope = Envelope::new();
        envelope.add_item(Event::default());

        let lost = LostEventLog::new();
        assert!(rl.filter_envelope(envelope, &lost).is_none());
        assert_eq!(lost.count(DiscardReason::RateLimited), 1);
    }
}
