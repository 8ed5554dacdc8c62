//! Fixed strings of the signing scheme, derived from the organization tag.

use http::HeaderName;

use hmacsig_core::ConfigError;

use crate::error::AuthError;

/// The named constants a signer and verifier must agree on.
///
/// With the default organization tag `AWS` and abbreviation `amz` these are
/// `AWS4-HMAC-SHA256`, `AWS4`, `aws4_request`, `x-amz-date` and
/// `x-amz-content-sha256`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningScheme {
    algorithm: String,
    key_prefix: String,
    termination: String,
    date_header: HeaderName,
    content_hash_header: HeaderName,
}

impl SigningScheme {
    /// Build the scheme for an organization tag and header abbreviation.
    ///
    /// # Examples
    ///
    /// ```
    /// use hmacsig_auth::SigningScheme;
    ///
    /// let scheme = SigningScheme::new("AWS", "amz").unwrap();
    /// assert_eq!(scheme.algorithm(), "AWS4-HMAC-SHA256");
    /// assert_eq!(scheme.termination(), "aws4_request");
    /// assert_eq!(scheme.date_header().as_str(), "x-amz-date");
    /// ```
    pub fn new(org: &str, abbr: &str) -> Result<Self, AuthError> {
        let org = org.trim();
        let abbr = abbr.trim().to_ascii_lowercase();
        if org.is_empty() {
            return Err(ConfigError::MissingField("org").into());
        }

        Ok(Self {
            algorithm: format!("{}4-HMAC-SHA256", org.to_ascii_uppercase()),
            key_prefix: format!("{}4", org.to_ascii_uppercase()),
            termination: format!("{}4_request", org.to_ascii_lowercase()),
            date_header: header_name(&format!("x-{abbr}-date"))?,
            content_hash_header: header_name(&format!("x-{abbr}-content-sha256"))?,
        })
    }

    /// Algorithm identifier placed at the start of the `Authorization` header.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Prefix prepended to the secret to form the first HMAC key.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Literal that closes the credential and the key derivation chain.
    #[must_use]
    pub fn termination(&self) -> &str {
        &self.termination
    }

    /// Header carrying the signing timestamp.
    #[must_use]
    pub fn date_header(&self) -> &HeaderName {
        &self.date_header
    }

    /// Header carrying the hex SHA-256 of the payload.
    #[must_use]
    pub fn content_hash_header(&self) -> &HeaderName {
        &self.content_hash_header
    }
}

fn header_name(name: &str) -> Result<HeaderName, AuthError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        AuthError::Config(ConfigError::Invalid {
            field: "abbr",
            reason: format!("{name:?} is not a valid header name: {e}"),
        })
    })
}
