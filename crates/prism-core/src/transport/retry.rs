//! Retrying transport for transient upstream failures.
//!
//! Buffers the request body once, then replays an identical request while the
//! upstream answers with a retryable status or the connection fails.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Body, Method, Request, Response, StatusCode, Url};

use super::Transport;
use crate::config::TransportConfig;
use crate::error::TransportError;

/// Status codes treated as transient unless configured otherwise:
/// forbidden, internal server error, bad gateway, service unavailable,
/// gateway timeout.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [403, 500, 502, 503, 504];

/// How many times to try a request and which responses warrant another try.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_tries: u32,
    retry_delay: Duration,
    retryable: BTreeSet<u16>,
}

impl RetryPolicy {
    /// Policy with the default retryable codes and immediate retries.
    pub fn new(max_tries: u32) -> Self {
        Self {
            max_tries: max_tries.max(1),
            retry_delay: Duration::ZERO,
            retryable: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.max_tries)
            .with_retry_delay(Duration::from_millis(config.retry_delay_ms))
            .with_retryable_codes(config.retryable_status_codes.iter().copied())
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_retryable_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable = codes.into_iter().collect();
        self
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn is_retryable(&self, status: StatusCode) -> bool {
        self.retryable.contains(&status.as_u16())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// A [`Transport`] that retries the wrapped transport up to `max_tries` times.
pub struct RetryTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

/// Everything needed to rebuild a request for another attempt.
struct ReplayableRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    timeout: Option<Duration>,
    body: Option<Vec<u8>>,
}

impl ReplayableRequest {
    fn capture(request: &Request) -> Result<Self, TransportError> {
        let body = match request.body() {
            None => None,
            Some(body) => match body.as_bytes() {
                Some(bytes) => Some(bytes.to_vec()),
                None => {
                    return Err(TransportError::UnbufferedBody {
                        url: request.url().to_string(),
                    })
                }
            },
        };
        Ok(Self {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            timeout: request.timeout().copied(),
            body,
        })
    }

    fn rebuild(&self) -> Request {
        let mut request = Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.timeout_mut() = self.timeout;
        if let Some(body) = &self.body {
            *request.body_mut() = Some(Body::from(body.clone()));
        }
        request
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let replay = ReplayableRequest::capture(&request)?;
        let mut next = request;
        let mut attempt = 1;

        loop {
            let outcome = self.inner.execute(next).await;
            let retry = match &outcome {
                Ok(response) => self.policy.is_retryable(response.status()),
                Err(_) => true,
            };
            if !retry || attempt >= self.policy.max_tries {
                return outcome;
            }

            match &outcome {
                Ok(response) => tracing::debug!(
                    "{} {} returned {}, retrying ({attempt}/{})",
                    replay.method,
                    replay.url,
                    response.status(),
                    self.policy.max_tries
                ),
                Err(e) => tracing::debug!(
                    "{} {} failed: {e}, retrying ({attempt}/{})",
                    replay.method,
                    replay.url,
                    self.policy.max_tries
                ),
            }
            // Dropping the response closes its body before the next attempt.
            drop(outcome);

            if !self.policy.retry_delay.is_zero() {
                tokio::time::sleep(self.policy.retry_delay).await;
            }
            attempt += 1;
            next = replay.rebuild();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, ScriptedUpstream};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Counts calls before delegating to the wrapped transport.
    struct Counting<T> {
        inner: T,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl<T: Transport> Transport for Counting<T> {
        async fn execute(&self, request: Request) -> Result<Response, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.execute(request).await
        }
    }

    fn post(url: &str, body: &'static str) -> Request {
        reqwest::Client::new()
            .post(url)
            .header("x-request-tag", "abc")
            .body(body)
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_tries(), 5);
        for code in DEFAULT_RETRYABLE_STATUS_CODES {
            assert!(policy.is_retryable(StatusCode::from_u16(code).unwrap()));
        }
        assert!(!policy.is_retryable(StatusCode::OK));
        assert!(!policy.is_retryable(StatusCode::NOT_FOUND));
        assert!(!policy.is_retryable(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_zero_max_tries_still_attempts_once() {
        assert_eq!(RetryPolicy::new(0).max_tries(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_non_retryable_status() {
        let upstream = ScriptedUpstream::new(&[503, 500, 502, 200]);
        let base = serve(upstream.router()).await;
        let transport = RetryTransport::new(reqwest::Client::new(), RetryPolicy::new(5));

        let response = transport
            .execute(post(&format!("{base}/echo"), "payload"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let seen = upstream.requests();
        assert_eq!(seen.len(), 4);
        for request in &seen {
            assert_eq!(request.body, b"payload");
            assert_eq!(request.tag.as_deref(), Some("abc"));
            assert_eq!(request.method, "POST");
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_last_response() {
        let upstream = ScriptedUpstream::new(&[503, 503, 504]);
        let base = serve(upstream.router()).await;
        let transport = RetryTransport::new(reqwest::Client::new(), RetryPolicy::new(3));

        let response = transport
            .execute(post(&format!("{base}/echo"), "payload"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.text().await.unwrap(), "attempt 3");
        assert_eq!(upstream.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_status_is_returned_immediately() {
        let upstream = ScriptedUpstream::new(&[404, 200]);
        let base = serve(upstream.router()).await;
        let transport = RetryTransport::new(reqwest::Client::new(), RetryPolicy::new(5));

        let response = transport
            .execute(post(&format!("{base}/echo"), "payload"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(upstream.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_retryable_codes() {
        let upstream = ScriptedUpstream::new(&[429, 200]);
        let base = serve(upstream.router()).await;
        let policy = RetryPolicy::new(3).with_retryable_codes([429]);
        let transport = RetryTransport::new(reqwest::Client::new(), policy);

        let response = transport
            .execute(post(&format!("{base}/echo"), "payload"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(upstream.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_connection_errors_are_retried() {
        // Reserve a port, then close it so every connection is refused.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let calls = Arc::new(AtomicU32::new(0));
        let inner = Counting {
            inner: reqwest::Client::new(),
            calls: calls.clone(),
        };
        let transport = RetryTransport::new(inner, RetryPolicy::new(4));

        let result = transport
            .execute(post(&format!("http://{addr}/echo"), "payload"))
            .await;

        assert!(matches!(result, Err(TransportError::Http(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_streaming_body_is_rejected() {
        let calls = Arc::new(AtomicU32::new(0));
        let inner = Counting {
            inner: reqwest::Client::new(),
            calls: calls.clone(),
        };
        let transport = RetryTransport::new(inner, RetryPolicy::new(3));

        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![Ok(b"chunk".to_vec())];
        let request = reqwest::Client::new()
            .post("http://127.0.0.1:9/upload")
            .body(Body::wrap_stream(futures_util::stream::iter(chunks)))
            .build()
            .unwrap();

        let err = transport.execute(request).await.unwrap_err();
        assert!(matches!(err, TransportError::UnbufferedBody { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
