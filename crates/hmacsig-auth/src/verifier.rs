//! Server-side request verification.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Utc};
use http::{Request, header::AUTHORIZATION};
use subtle::ConstantTimeEq;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use hmacsig_core::VerifierConfig;

use crate::canonical::CanonicalRequest;
use crate::crypto::hash_payload;
use crate::error::AuthError;
use crate::header::AuthorizationHeader;
use crate::resolver::{HttpSecretSource, RetryPolicy, SecretResolver, SecretSource};
use crate::scheme::SigningScheme;
use crate::scope::{build_string_to_sign, parse_timestamp, scope_date};
use crate::sigv4::{compute_signature, derive_signing_key};

/// Identity established by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedRequest {
    /// The access key id that signed the request.
    pub access_key_id: String,
    /// The region from the credential scope.
    pub region: String,
    /// The service from the credential scope.
    pub service: String,
    /// The header names covered by the signature.
    pub signed_headers: Vec<String>,
}

/// Anything that can authenticate an incoming request.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verify `request`, returning the signer's identity.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] naming the first check that failed.
    async fn verify(&self, request: &Request<Bytes>) -> Result<VerifiedRequest, AuthError>;
}

/// Verifies SigV4-style signatures, resolving secrets through a
/// [`SecretSource`].
///
/// The resolved secret lives only for the duration of one call, so a single
/// verifier can check requests from different access keys concurrently.
#[derive(Debug)]
pub struct SigV4Verifier<S> {
    scheme: SigningScheme,
    resolver: SecretResolver<S>,
    max_clock_skew: Option<Duration>,
}

impl SigV4Verifier<HttpSecretSource> {
    /// Create a verifier that fetches secrets from the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] for invalid configuration and
    /// [`AuthError::SecretResolution`] if the HTTP client cannot be built.
    pub fn from_config(config: VerifierConfig) -> Result<Self, AuthError> {
        let config = config.validated()?;
        let source = HttpSecretSource::new(&config.secret_retrieval_url, config.attempt_timeout)?;
        Self::with_source(config, source)
    }
}

impl<S: SecretSource> SigV4Verifier<S> {
    /// Create a verifier over any secret source.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] for invalid configuration.
    pub fn with_source(config: VerifierConfig, source: S) -> Result<Self, AuthError> {
        let config = config.validated()?;
        let scheme = SigningScheme::new(&config.org, &config.abbr)?;
        debug!(
            algorithm = scheme.algorithm(),
            service = %config.service,
            "Created verifier"
        );

        Ok(Self {
            scheme,
            resolver: SecretResolver::new(source, RetryPolicy::from_config(&config)),
            max_clock_skew: config.max_clock_skew,
        })
    }

    /// The naming scheme this verifier expects.
    #[must_use]
    pub fn scheme(&self) -> &SigningScheme {
        &self.scheme
    }

    /// The secret resolver in use.
    #[must_use]
    pub fn resolver(&self) -> &SecretResolver<S> {
        &self.resolver
    }

    /// Verify `request`, abandoning secret resolution when `cancel` fires.
    ///
    /// Structural problems with the `Authorization` header are reported before
    /// any secret lookup. The canonical request is rebuilt from the request as
    /// received, using the region and service of the decoded credential scope.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] for the first failed check:
    /// missing or malformed header, unexpected algorithm, secret resolution
    /// failure (including cancellation), bad or mismatched timestamp, payload
    /// hash mismatch, and finally signature mismatch.
    pub async fn verify_with_cancellation(
        &self,
        request: &Request<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<VerifiedRequest, AuthError> {
        let value = request
            .headers()
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidHeaderValue(AUTHORIZATION.to_string()))?;
        let header = AuthorizationHeader::decode(value, &self.scheme)?;

        if header.algorithm != self.scheme.algorithm() {
            return Err(AuthError::UnsupportedAlgorithm(header.algorithm));
        }

        debug!(
            access_key_id = %header.scope.access_key_id,
            date = %header.scope.date,
            region = %header.scope.region,
            service = %header.scope.service,
            "Verifying signature"
        );

        let secret = self
            .resolver
            .resolve(&header.scope.access_key_id, cancel)
            .await?;

        let raw_timestamp = self.date_header_value(request)?;
        let timestamp = parse_timestamp(raw_timestamp)?;
        let request_date = scope_date(&timestamp);
        if request_date != header.scope.date {
            return Err(AuthError::ScopeMismatch {
                scope_date: header.scope.date,
                request_date,
            });
        }
        if let Some(skew) = self.max_clock_skew {
            check_clock_skew(&timestamp, skew)?;
        }

        if let Some(declared) = request.headers().get(self.scheme.content_hash_header()) {
            let actual = hash_payload(request.body());
            if !bool::from(declared.as_bytes().ct_eq(actual.as_bytes())) {
                return Err(AuthError::ContentHashMismatch);
            }
        }

        let canonical = CanonicalRequest::build(
            request.method(),
            request.uri(),
            request.headers(),
            request.body(),
        )?;
        if canonical.signed_headers() != header.signed_headers.as_slice() {
            debug!(
                received = %header.signed_headers.join(";"),
                present = %canonical.signed_headers().join(";"),
                "Signed header set differs from headers present"
            );
            return Err(AuthError::SignatureMismatch);
        }

        let string_to_sign = build_string_to_sign(
            self.scheme.algorithm(),
            raw_timestamp,
            &header.scope.scope(),
            &canonical.hash(),
        );
        debug!(string_to_sign = %string_to_sign, "Built string to sign");

        let signing_key = derive_signing_key(
            &self.scheme,
            &secret,
            &header.scope.date,
            &header.scope.region,
            &header.scope.service,
        );
        let expected = compute_signature(&signing_key, &string_to_sign);

        if !bool::from(header.signature.as_bytes().ct_eq(expected.as_bytes())) {
            debug!(
                expected = %expected,
                provided = %header.signature,
                "Signature mismatch"
            );
            return Err(AuthError::SignatureMismatch);
        }

        debug!(access_key_id = %header.scope.access_key_id, "Signature verification succeeded");
        Ok(VerifiedRequest {
            access_key_id: header.scope.access_key_id,
            region: header.scope.region,
            service: header.scope.service,
            signed_headers: header.signed_headers,
        })
    }

    fn date_header_value<'r>(&self, request: &'r Request<Bytes>) -> Result<&'r str, AuthError> {
        let name = self.scheme.date_header();
        request
            .headers()
            .get(name)
            .ok_or_else(|| AuthError::InvalidTimestamp(format!("missing {name} header")))?
            .to_str()
            .map_err(|_| AuthError::InvalidTimestamp(format!("{name} is not ASCII")))
    }
}

#[async_trait]
impl<S: SecretSource> Verifier for SigV4Verifier<S> {
    async fn verify(&self, request: &Request<Bytes>) -> Result<VerifiedRequest, AuthError> {
        self.verify_with_cancellation(request, &CancellationToken::new())
            .await
    }
}

fn check_clock_skew(timestamp: &DateTime<FixedOffset>, skew: Duration) -> Result<(), AuthError> {
    let drift = (Utc::now() - timestamp.with_timezone(&Utc)).abs();
    match drift.to_std() {
        Ok(drift) if drift <= skew => Ok(()),
        _ => Err(AuthError::RequestExpired),
    }
}
