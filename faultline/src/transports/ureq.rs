use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use ureq::{Agent, AgentBuilder, Proxy};

use faultline_core::faultline_debug;

use super::ratelimit::RateLimiter;
use super::state::ClientState;
use super::thread::TransportThread;
use crate::protocol::SizeLimits;
use crate::types::Scheme;
use crate::{ClientOptions, Envelope, LostEventLog, Transport};

const ENVELOPE_CONTENT_TYPE: &str = "application/x-faultline-envelope";

/// A [`Transport`] that sends envelopes via the [`ureq`] library.
///
/// All I/O happens on the background worker thread; the capturing
/// thread only performs a non-blocking enqueue. This is enabled by the
/// `transport` feature flag.
pub struct UreqHttpTransport {
    thread: TransportThread,
    lost: LostEventLog,
}

impl UreqHttpTransport {
    /// Creates a new Transport.
    pub fn new(options: &ClientOptions) -> Self {
        Self::new_internal(options, None)
    }

    /// Creates a new Transport that uses the specified [`ureq::Agent`].
    pub fn with_agent(options: &ClientOptions, agent: Agent) -> Self {
        Self::new_internal(options, Some(agent))
    }

    fn new_internal(options: &ClientOptions, agent: Option<Agent>) -> Self {
        let dsn = options.dsn.as_ref().unwrap();
        let scheme = dsn.scheme();
        let agent = agent.unwrap_or_else(|| {
            let mut builder = AgentBuilder::new()
                .timeout_connect(options.connect_timeout)
                .timeout_read(options.read_timeout);

            match (scheme, &options.http_proxy, &options.https_proxy) {
                (Scheme::Https, _, Some(proxy)) => match Proxy::new(proxy) {
                    Ok(proxy) => {
                        builder = builder.proxy(proxy);
                    }
                    Err(err) => {
                        faultline_debug!("invalid proxy: {:?}", err);
                    }
                },
                (_, Some(proxy), _) => match Proxy::new(proxy) {
                    Ok(proxy) => {
                        builder = builder.proxy(proxy);
                    }
                    Err(err) => {
                        faultline_debug!("invalid proxy: {:?}", err);
                    }
                },
                _ => {}
            }

            builder.build()
        });

        let dsn = dsn.clone();
        let user_agent = options.user_agent.clone();
        let url = dsn.envelope_api_url().to_string();
        let compression_threshold = options.compression_threshold;
        let limits = SizeLimits::default();
        let lost = LostEventLog::new();

        let worker_lost = lost.clone();
        let thread = TransportThread::new(
            options.queue_size,
            lost.clone(),
            move |envelope: Envelope, rl: &mut RateLimiter, state: &mut ClientState| {
                let mut body = Vec::new();
                let written = match envelope.to_writer_with_limits(
                    &mut body,
                    limits,
                    &mut |_item, reason| worker_lost.record(reason),
                ) {
                    Ok(written) => written,
                    Err(err) => {
                        faultline_debug!("failed to serialize envelope: {}", err);
                        return;
                    }
                };
                if written == 0 {
                    return;
                }

                // the auth header is computed per request so the embedded
                // timestamp stays fresh
                let auth = dsn.to_auth(Some(&user_agent)).to_string();
                let mut request = agent
                    .post(&url)
                    .set("X-Faultline-Auth", &auth)
                    .set("Content-Type", ENVELOPE_CONTENT_TYPE);

                let body = if body.len() > compression_threshold {
                    match compress(&body) {
                        Ok(compressed) => {
                            request = request.set("Content-Encoding", "gzip");
                            compressed
                        }
                        Err(err) => {
                            faultline_debug!("failed to compress envelope: {}", err);
                            body
                        }
                    }
                } else {
                    body
                };

                match request.send_bytes(&body) {
                    Ok(response) => {
                        state.record_success();
                        if let Some(header) = response.header("x-faultline-rate-limits") {
                            rl.update_from_rate_limits_header(header);
                        } else if let Some(header) = response.header("retry-after") {
                            rl.update_from_retry_after(header);
                        }
                    }
                    Err(ureq::Error::Status(code, response)) => {
                        let rate_limits = response
                            .header("x-faultline-rate-limits")
                            .map(str::to_owned);
                        let retry_after = response.header("retry-after").map(str::to_owned);

                        if let Some(header) = rate_limits.as_deref() {
                            rl.update_from_rate_limits_header(header);
                        } else if let Some(header) = retry_after.as_deref() {
                            rl.update_from_retry_after(header);
                        } else if code == 429 {
                            rl.update_from_429();
                        }
                        state.record_failure(None);

                        faultline_debug!(
                            "failed to send envelope: status {} (rate limits: {:?})",
                            code,
                            rate_limits.or(retry_after)
                        );
                    }
                    Err(err) => {
                        state.record_failure(None);
                        faultline_debug!("failed to send envelope: {}", err);
                    }
                }
            },
        );
        Self { thread, lost }
    }

    /// Returns a snapshot of the envelopes this transport dropped, by
    /// reason.
    pub fn lost_events(&self) -> std::collections::BTreeMap<crate::protocol::DiscardReason, usize>
    {
        self.lost.snapshot()
    }
}

impl Transport for UreqHttpTransport {
    fn send_envelope(&self, envelope: Envelope) {
        self.thread.send(envelope)
    }

    fn flush(&self, timeout: Duration) -> bool {
        self.thread.flush(timeout)
    }

    fn shutdown(&self, timeout: Duration) -> bool {
        self.thread.shutdown(timeout)
    }
}

fn compress(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn test_compress_roundtrip() {
        let body = b"some envelope body that should survive the roundtrip".repeat(10);
        let compressed = compress(&body).unwrap();
        assert!(compressed.len() < body.len());

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();
        assert_eq!(decompressed, body);
    }
}
