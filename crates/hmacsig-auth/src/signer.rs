//! Client-side request signing.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderValue, Request, header::AUTHORIZATION};
use tracing::debug;

use hmacsig_core::{SigningConfig, SigningCredentials};

use crate::canonical::CanonicalRequest;
use crate::crypto::hash_payload;
use crate::error::AuthError;
use crate::header::AuthorizationHeader;
use crate::scheme::SigningScheme;
use crate::scope::{CredentialScope, build_string_to_sign, format_timestamp, scope_date};
use crate::sigv4::{compute_signature, derive_signing_key};

/// Anything that can attach authentication to an outgoing request.
pub trait Signer: Send + Sync {
    /// Sign `request` in place.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the request cannot be canonicalized. The
    /// request is left untouched in that case.
    fn sign(&self, request: &mut Request<Bytes>) -> Result<(), AuthError>;
}

/// HMAC-SHA256 signer producing SigV4-style `Authorization` headers.
///
/// The signer owns its credentials and is immutable after construction, so
/// one instance can sign from many tasks at once.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    scheme: SigningScheme,
    service: String,
    hash_payload: bool,
    credentials: SigningCredentials,
}

impl SigV4Signer {
    /// Create a signer from configuration and resolved credentials.
    ///
    /// Empty `org`/`abbr` fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the service or any credential part is
    /// empty, or the abbreviation cannot form a header name.
    pub fn new(config: SigningConfig, credentials: SigningCredentials) -> Result<Self, AuthError> {
        let config = config.validated()?;
        credentials.validate()?;
        let scheme = SigningScheme::new(&config.org, &config.abbr)?;

        Ok(Self {
            scheme,
            service: config.service,
            hash_payload: config.hash_payload,
            credentials,
        })
    }

    /// Create a signer from `HMACSIG_*` settings and `ACCESS_KEY_ID` /
    /// `SECRET_ACCESS_KEY` / `REGION` credentials in the environment.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a required variable is missing.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::new(SigningConfig::from_env()?, SigningCredentials::from_env()?)
    }

    /// The naming scheme this signer uses.
    #[must_use]
    pub fn scheme(&self) -> &SigningScheme {
        &self.scheme
    }

    /// The access key id placed in every credential.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.credentials.access_key_id
    }

    /// Sign `request` as if the current time were `time`.
    ///
    /// Sets the date header, the payload hash header when enabled, and the
    /// `Authorization` header. Everything is computed before the first header
    /// is written, so an error leaves the request exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingHeader`] if neither the URI nor a `Host` header
    ///   names the target host.
    /// - [`AuthError::InvalidHeaderValue`] if a header value is not visible ASCII.
    pub fn sign_at(&self, request: &mut Request<Bytes>, time: DateTime<Utc>) -> Result<(), AuthError> {
        let timestamp = format_timestamp(time);
        let date_value = header_value(self.scheme.date_header().as_str(), &timestamp)?;

        let mut headers = request.headers().clone();
        headers.insert(self.scheme.date_header().clone(), date_value.clone());

        let content_hash = if self.hash_payload {
            let name = self.scheme.content_hash_header();
            let value = header_value(name.as_str(), &hash_payload(request.body()))?;
            headers.insert(name.clone(), value.clone());
            Some(value)
        } else {
            None
        };

        let canonical =
            CanonicalRequest::build(request.method(), request.uri(), &headers, request.body())?;

        let scope = CredentialScope::new(
            self.credentials.access_key_id.as_str(),
            scope_date(&time.fixed_offset()),
            self.credentials.region.as_str(),
            self.service.as_str(),
        );
        let string_to_sign = build_string_to_sign(
            self.scheme.algorithm(),
            &timestamp,
            &scope.scope(),
            &canonical.hash(),
        );
        debug!(string_to_sign = %string_to_sign, "Built string to sign");

        let signing_key = derive_signing_key(
            &self.scheme,
            &self.credentials.secret_key,
            &scope.date,
            &scope.region,
            &scope.service,
        );
        let signature = compute_signature(&signing_key, &string_to_sign);

        let authorization = AuthorizationHeader {
            algorithm: self.scheme.algorithm().to_owned(),
            scope,
            termination: self.scheme.termination().to_owned(),
            signed_headers: canonical.signed_headers().to_vec(),
            signature,
        }
        .to_header_value()?;

        let headers = request.headers_mut();
        headers.insert(self.scheme.date_header().clone(), date_value);
        if let Some(value) = content_hash {
            headers.insert(self.scheme.content_hash_header().clone(), value);
        }
        headers.insert(AUTHORIZATION, authorization);

        debug!(
            access_key_id = %self.credentials.access_key_id,
            signed_headers = %canonical.signed_headers().join(";"),
            "Signed request"
        );
        Ok(())
    }
}

impl Signer for SigV4Signer {
    fn sign(&self, request: &mut Request<Bytes>) -> Result<(), AuthError> {
        self.sign_at(request, Utc::now())
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(value).map_err(|_| AuthError::InvalidHeaderValue(name.to_owned()))
}
