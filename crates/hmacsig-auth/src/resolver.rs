//! Resolving access key ids to secrets.
//!
//! A [`SecretSource`] performs a single lookup. [`SecretResolver`] wraps a
//! source with the retry policy: bounded attempts, a per-attempt timeout,
//! exponential backoff between attempts, and cancellation at any point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmacsig_core::VerifierConfig;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ResolveError;

/// A single-shot lookup of the secret belonging to an access key id.
///
/// Implementations may be backed by an HTTP service, a database, a
/// configuration file or an in-memory map.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// Fetch the secret for `access_key_id`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] describing why the lookup failed.
    async fn fetch_secret(&self, access_key_id: &str) -> Result<String, ResolveError>;
}

#[async_trait]
impl<S: SecretSource + ?Sized> SecretSource for Arc<S> {
    async fn fetch_secret(&self, access_key_id: &str) -> Result<String, ResolveError> {
        (**self).fetch_secret(access_key_id).await
    }
}

#[derive(Debug, Serialize)]
struct SecretRequest<'a> {
    access_key_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    secret_access_key: String,
}

/// Fetches secrets from an HTTP endpoint.
///
/// Each lookup is a `POST` of `{"access_key_id": "..."}`. A `200 OK` answer
/// must carry `{"secret_access_key": "..."}`; any other status is a failure
/// that keeps the status code and body for diagnostics.
#[derive(Debug, Clone)]
pub struct HttpSecretSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSecretSource {
    /// Create a source for `url` with a client-level request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    /// Create a source that reuses an existing client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// The endpoint this source posts to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SecretSource for HttpSecretSource {
    async fn fetch_secret(&self, access_key_id: &str) -> Result<String, ResolveError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SecretRequest { access_key_id })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_secret_response(status, &body)
    }
}

fn parse_secret_response(status: http::StatusCode, body: &str) -> Result<String, ResolveError> {
    if status != http::StatusCode::OK {
        return Err(ResolveError::Status {
            status: status.as_u16(),
            body: body.to_owned(),
        });
    }

    let parsed: SecretResponse = serde_json::from_str(body)?;
    if parsed.secret_access_key.is_empty() {
        return Err(ResolveError::EmptySecret);
    }
    Ok(parsed.secret_access_key)
}

/// An in-memory secret source backed by a `HashMap`.
///
/// Suitable for tests and development.
///
/// # Examples
///
/// ```
/// use hmacsig_auth::{SecretSource, StaticSecretSource};
///
/// # tokio_test::block_on(async {
/// let source = StaticSecretSource::new([("AKID".to_owned(), "secret".to_owned())]);
/// assert_eq!(source.fetch_secret("AKID").await.unwrap(), "secret");
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticSecretSource {
    secrets: HashMap<String, String>,
}

impl StaticSecretSource {
    /// Create a source from `(access_key_id, secret)` pairs.
    pub fn new(secrets: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            secrets: secrets.into_iter().collect(),
        }
    }
}

#[async_trait]
impl SecretSource for StaticSecretSource {
    async fn fetch_secret(&self, access_key_id: &str) -> Result<String, ResolveError> {
        self.secrets
            .get(access_key_id)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownAccessKey(access_key_id.to_owned()))
    }
}

/// How secret lookups are retried.
///
/// The default waits 1s then 2s between three attempts. Services that sign
/// against peers expecting the slower 2s then 4s schedule set
/// `initial_backoff` to 2s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
    /// Delay after the first failed attempt; doubles after each later one.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(15),
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Take the retry settings from a verifier configuration.
    #[must_use]
    pub fn from_config(config: &VerifierConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            attempt_timeout: config.attempt_timeout,
            initial_backoff: config.initial_backoff,
        }
    }

    /// The delay after failed attempt number `attempt` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use hmacsig_auth::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_secs(1));
    /// assert_eq!(policy.backoff(2), Duration::from_secs(2));
    /// ```
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

impl ResolveError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::UnknownAccessKey(_) | Self::Cancelled | Self::MaxAttemptsExceeded { .. }
        )
    }
}

/// A [`SecretSource`] with retries, timeouts and cancellation.
#[derive(Debug, Clone)]
pub struct SecretResolver<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: SecretSource> SecretResolver<S> {
    /// Wrap `source` with the given retry policy.
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// The retry policy in effect.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The wrapped source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Resolve the secret for `access_key_id`.
    ///
    /// Attempts run one at a time, each bounded by the per-attempt timeout.
    /// After failed attempt `n` the resolver sleeps `initial_backoff * 2^(n-1)`
    /// unless it was the last one. An empty secret counts as a failed attempt.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Cancelled`] as soon as `cancel` fires, whether during
    ///   an attempt or during a backoff sleep.
    /// - [`ResolveError::MaxAttemptsExceeded`] carrying the last failure once
    ///   every attempt has failed.
    /// - Errors that cannot succeed on retry, such as
    ///   [`ResolveError::UnknownAccessKey`], are returned immediately.
    pub async fn resolve(
        &self,
        access_key_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ResolveError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ResolveError::Cancelled),
                result = tokio::time::timeout(
                    self.policy.attempt_timeout,
                    self.source.fetch_secret(access_key_id),
                ) => result.unwrap_or_else(|_| Err(ResolveError::Timeout(self.policy.attempt_timeout))),
            };

            let err = match outcome {
                Ok(secret) if !secret.is_empty() => {
                    debug!(access_key_id, attempt, "Resolved secret");
                    return Ok(secret);
                }
                Ok(_) => ResolveError::EmptySecret,
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            if attempt >= max_attempts {
                warn!(access_key_id, attempt, error = %err, "Secret retrieval failed, giving up");
                return Err(ResolveError::MaxAttemptsExceeded {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.policy.backoff(attempt);
            warn!(
                access_key_id,
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Secret retrieval failed, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ResolveError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}
