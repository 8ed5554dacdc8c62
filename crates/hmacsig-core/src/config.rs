//! Signer and verifier configuration.
//!
//! Every struct here can be loaded from environment variables. The variable
//! names for credentials (`ACCESS_KEY_ID`, `SECRET_ACCESS_KEY`, `REGION`) are
//! shared with other tooling; everything else is prefixed with `HMACSIG_`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{ConfigError, ConfigResult};

/// Organization tag used when none is configured.
pub const DEFAULT_ORG: &str = "AWS";

/// Header abbreviation used when none is configured.
pub const DEFAULT_ABBR: &str = "amz";

/// Client-side signing configuration.
///
/// # Examples
///
/// ```
/// use hmacsig_core::SigningConfig;
///
/// let config = SigningConfig::builder().service("s3").build();
/// assert_eq!(config.org, "AWS");
/// assert_eq!(config.abbr, "amz");
/// assert!(!config.hash_payload);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SigningConfig {
    /// Organization tag (e.g. `AWS`). Drives the algorithm identifier, the
    /// signing-key prefix, and the termination literal.
    #[builder(default = String::from(DEFAULT_ORG), setter(into))]
    pub org: String,

    /// Header abbreviation (e.g. `amz` for `x-amz-date`).
    #[builder(default = String::from(DEFAULT_ABBR), setter(into))]
    pub abbr: String,

    /// Service name placed in the credential scope.
    #[builder(setter(into))]
    pub service: String,

    /// Whether to add a signed `x-<abbr>-content-sha256` header.
    #[builder(default = false)]
    pub hash_payload: bool,
}

impl SigningConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HMACSIG_ORG` | `AWS` |
    /// | `HMACSIG_ABBR` | `amz` |
    /// | `HMACSIG_SERVICE` | *(required)* |
    /// | `HMACSIG_HASH_PAYLOAD` | `false` |
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let config = Self {
            org: lookup("HMACSIG_ORG").unwrap_or_default(),
            abbr: lookup("HMACSIG_ABBR").unwrap_or_default(),
            service: lookup("HMACSIG_SERVICE").unwrap_or_default(),
            hash_payload: lookup("HMACSIG_HASH_PAYLOAD").is_some_and(|v| parse_bool(&v)),
        };
        config.validated()
    }

    /// Fill in defaults for empty optional fields and check required ones.
    pub fn validated(mut self) -> ConfigResult<Self> {
        fill_default(&mut self.org, DEFAULT_ORG);
        fill_default(&mut self.abbr, DEFAULT_ABBR);
        require("service", &self.service)?;
        Ok(self)
    }
}

/// Resolved client credentials: the access key, its secret, and the region
/// to sign for.
///
/// The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    /// Public access key identifier.
    pub access_key_id: String,
    /// Shared secret key.
    pub secret_key: String,
    /// Region placed in the credential scope.
    pub region: String,
}

impl SigningCredentials {
    /// Create credentials from their three parts.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    /// Load credentials from `ACCESS_KEY_ID`, `SECRET_ACCESS_KEY` and `REGION`.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load credentials from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let credentials = Self {
            access_key_id: lookup("ACCESS_KEY_ID").unwrap_or_default(),
            secret_key: lookup("SECRET_ACCESS_KEY").unwrap_or_default(),
            region: lookup("REGION").unwrap_or_default(),
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Check that no part of the credentials is empty.
    pub fn validate(&self) -> ConfigResult<()> {
        require("access_key_id", &self.access_key_id)?;
        require("secret_key", &self.secret_key)?;
        require("region", &self.region)
    }
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// Server-side verification configuration.
///
/// # Examples
///
/// ```
/// use hmacsig_core::VerifierConfig;
///
/// let config = VerifierConfig::builder()
///     .service("s3")
///     .secret_retrieval_url("http://127.0.0.1:9000/secret")
///     .build();
/// assert_eq!(config.max_attempts, 3);
/// assert!(config.max_clock_skew.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct VerifierConfig {
    /// Organization tag expected in the algorithm identifier.
    #[builder(default = String::from(DEFAULT_ORG), setter(into))]
    pub org: String,

    /// Header abbreviation used to find the date header.
    #[builder(default = String::from(DEFAULT_ABBR), setter(into))]
    pub abbr: String,

    /// Name of the service this verifier fronts.
    #[builder(setter(into))]
    pub service: String,

    /// Endpoint that resolves an access key id to its secret.
    #[builder(setter(into))]
    pub secret_retrieval_url: String,

    /// Total secret-retrieval attempts, including the first.
    #[builder(default = 3)]
    pub max_attempts: u32,

    /// Upper bound for a single secret-retrieval attempt.
    #[builder(default = Duration::from_secs(15))]
    pub attempt_timeout: Duration,

    /// Delay before the second attempt; doubles for each later attempt.
    #[builder(default = Duration::from_secs(1))]
    pub initial_backoff: Duration,

    /// Reject requests whose signed timestamp is further than this from now.
    #[builder(default, setter(strip_option))]
    pub max_clock_skew: Option<Duration>,
}

impl VerifierConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HMACSIG_ORG` | `AWS` |
    /// | `HMACSIG_ABBR` | `amz` |
    /// | `HMACSIG_SERVICE` | *(required)* |
    /// | `HMACSIG_SECRET_RETRIEVAL_URL` | *(required)* |
    /// | `HMACSIG_MAX_ATTEMPTS` | `3` |
    /// | `HMACSIG_ATTEMPT_TIMEOUT_SECS` | `15` |
    /// | `HMACSIG_INITIAL_BACKOFF_MS` | `1000` |
    /// | `HMACSIG_MAX_CLOCK_SKEW_SECS` | *(unset: no check)* |
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let mut config = Self::builder()
            .org(lookup("HMACSIG_ORG").unwrap_or_default())
            .abbr(lookup("HMACSIG_ABBR").unwrap_or_default())
            .service(lookup("HMACSIG_SERVICE").unwrap_or_default())
            .secret_retrieval_url(lookup("HMACSIG_SECRET_RETRIEVAL_URL").unwrap_or_default())
            .build();

        if let Some(v) = lookup("HMACSIG_MAX_ATTEMPTS") {
            config.max_attempts = parse_number("max_attempts", &v)?;
        }
        if let Some(v) = lookup("HMACSIG_ATTEMPT_TIMEOUT_SECS") {
            config.attempt_timeout = Duration::from_secs(parse_number("attempt_timeout", &v)?);
        }
        if let Some(v) = lookup("HMACSIG_INITIAL_BACKOFF_MS") {
            config.initial_backoff = Duration::from_millis(parse_number("initial_backoff", &v)?);
        }
        if let Some(v) = lookup("HMACSIG_MAX_CLOCK_SKEW_SECS") {
            config.max_clock_skew = Some(Duration::from_secs(parse_number("max_clock_skew", &v)?));
        }

        config.validated()
    }

    /// Fill in defaults for empty optional fields and check required ones.
    pub fn validated(mut self) -> ConfigResult<Self> {
        fill_default(&mut self.org, DEFAULT_ORG);
        fill_default(&mut self.abbr, DEFAULT_ABBR);
        require("service", &self.service)?;
        require("secret_retrieval_url", &self.secret_retrieval_url)?;
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "at least one attempt is required".to_owned(),
            });
        }
        Ok(self)
    }
}

fn fill_default(field: &mut String, default: &str) {
    if field.trim().is_empty() {
        *field = default.to_owned();
    }
}

fn require(field: &'static str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingField(field))
    } else {
        Ok(())
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v, "1" | "true" | "yes" | "TRUE" | "YES")
}

fn parse_number<T: std::str::FromStr>(field: &'static str, v: &str) -> ConfigResult<T> {
    v.trim().parse().map_err(|_| ConfigError::Invalid {
        field,
        reason: format!("expected a non-negative integer, got {v:?}"),
    })
}
