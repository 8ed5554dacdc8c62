//! Error types for request signing and verification.
//!
//! Every failure is terminal for the request at hand. [`AuthError`] keeps the
//! kinds apart so a boundary layer can tell a malformed request from an
//! unavailable secret service from a bad signature; see
//! [`AuthError::status_code`].

use std::time::Duration;

use hmacsig_core::ConfigError;

/// Errors that can occur while signing or verifying a request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header is missing from the request.
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    /// The `Authorization` header could not be decoded.
    #[error("Malformed Authorization header: {0}")]
    MalformedAuthHeader(#[from] MalformedHeader),

    /// The algorithm identifier is not the one this verifier expects.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The secret for the access key could not be resolved.
    #[error("Secret resolution failed: {0}")]
    SecretResolution(#[source] ResolveError),

    /// The recomputed signature differs from the one received.
    #[error("Signature does not match")]
    SignatureMismatch,

    /// The date header is missing or not a valid timestamp.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A header needed for canonicalization is missing.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// A header value contains bytes that cannot be canonicalized.
    #[error("Invalid value for header: {0}")]
    InvalidHeaderValue(String),

    /// The credential scope disagrees with the signed timestamp.
    #[error("Credential scope date {scope_date} does not match request date {request_date}")]
    ScopeMismatch {
        /// Date carried in the `Credential` component.
        scope_date: String,
        /// Date derived from the signed timestamp header.
        request_date: String,
    },

    /// The signed payload hash header does not match the body.
    #[error("Content hash does not match the request body")]
    ContentHashMismatch,

    /// The signed timestamp is outside the accepted clock-skew window.
    #[error("Request has expired")]
    RequestExpired,

    /// The request body could not be read.
    #[error("Failed to read request body: {0}")]
    Body(String),

    /// The signer or verifier was constructed from invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AuthError {
    /// The HTTP status a boundary layer should answer with.
    ///
    /// Malformed requests map to 400, missing credentials to 401, requests
    /// that were understood but not authorized to 403, and an unreachable
    /// secret service to 502.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        match self {
            Self::MissingAuthHeader => http::StatusCode::UNAUTHORIZED,
            Self::MalformedAuthHeader(_)
            | Self::InvalidTimestamp(_)
            | Self::MissingHeader(_)
            | Self::InvalidHeaderValue(_)
            | Self::Body(_) => http::StatusCode::BAD_REQUEST,
            Self::UnsupportedAlgorithm(_)
            | Self::SignatureMismatch
            | Self::ScopeMismatch { .. }
            | Self::ContentHashMismatch
            | Self::RequestExpired => http::StatusCode::FORBIDDEN,
            Self::SecretResolution(ResolveError::UnknownAccessKey(_)) => {
                http::StatusCode::FORBIDDEN
            }
            Self::SecretResolution(_) => http::StatusCode::BAD_GATEWAY,
            Self::Config(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A short, stable identifier for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingAuthHeader => "MissingAuthorizationHeader",
            Self::MalformedAuthHeader(_) => "MalformedAuthorizationHeader",
            Self::UnsupportedAlgorithm(_) => "UnsupportedAlgorithm",
            Self::SecretResolution(_) => "SecretResolutionFailure",
            Self::SignatureMismatch => "SignatureMismatch",
            Self::InvalidTimestamp(_) => "InvalidTimestamp",
            Self::MissingHeader(_) => "MissingHeader",
            Self::InvalidHeaderValue(_) => "InvalidHeaderValue",
            Self::ScopeMismatch { .. } => "ScopeMismatch",
            Self::ContentHashMismatch => "ContentHashMismatch",
            Self::RequestExpired => "RequestExpired",
            Self::Body(_) => "InvalidBody",
            Self::Config(_) => "InvalidConfiguration",
        }
    }
}

/// The specific way an `Authorization` header failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedHeader {
    /// No space separates the algorithm from the credential components.
    #[error("missing algorithm separator")]
    MissingAlgorithm,

    /// The header does not carry exactly three comma-separated components.
    #[error("expected 3 components, found {0}")]
    ComponentCount(usize),

    /// A component does not start with the tag expected at its position.
    #[error("expected component tagged {expected}")]
    UnexpectedTag {
        /// The tag that should have prefixed the component.
        expected: &'static str,
    },

    /// The `Credential` value does not have five slash-delimited parts.
    #[error("expected 5 credential parts, found {0}")]
    CredentialParts(usize),

    /// The credential's termination literal is not the expected one.
    #[error("unexpected credential termination {0:?}")]
    TerminationToken(String),

    /// A component is present but empty.
    #[error("empty {0}")]
    EmptyField(&'static str),

    /// The signed header list is not lowercase and unique.
    #[error("invalid signed header list: {0}")]
    InvalidSignedHeaders(String),

    /// The signature is not 64 lowercase hex digits.
    #[error("signature is not lowercase hex SHA-256")]
    InvalidSignature,
}

/// Errors from resolving an access key id to its secret.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The request to the secret-retrieval endpoint failed in transport.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A single attempt did not complete within the per-attempt timeout.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with a non-200 status.
    #[error("non-OK HTTP status: {status}, body: {body}")]
    Status {
        /// The status code received.
        status: u16,
        /// The response body, kept for diagnostics.
        body: String,
    },

    /// The success response body was not the expected JSON document.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The endpoint reported success but returned an empty secret.
    #[error("empty secret returned")]
    EmptySecret,

    /// The secret source does not know the access key id.
    #[error("access key not found: {0}")]
    UnknownAccessKey(String),

    /// The caller cancelled resolution.
    #[error("secret resolution cancelled")]
    Cancelled,

    /// Every attempt failed; carries the last underlying error.
    #[error("exceeded maximum attempts ({attempts}): {source}")]
    MaxAttemptsExceeded {
        /// How many attempts were made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        source: Box<ResolveError>,
    },
}

impl From<ResolveError> for AuthError {
    fn from(err: ResolveError) -> Self {
        Self::SecretResolution(err)
    }
}
