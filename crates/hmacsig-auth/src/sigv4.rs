//! Signing-key derivation and signature computation.
//!
//! The signing key is a four-step HMAC-SHA256 chain over the credential
//! scope, each step keyed by the previous step's output:
//!
//! ```text
//! DateKey              = HMAC-SHA256(<prefix> + secret_key, date)
//! DateRegionKey        = HMAC-SHA256(DateKey, region)
//! DateRegionServiceKey = HMAC-SHA256(DateRegionKey, service)
//! SigningKey           = HMAC-SHA256(DateRegionServiceKey, <termination>)
//! ```

use crate::crypto::hmac_sha256;
use crate::scheme::SigningScheme;

/// Derive the signing key for a secret and a credential scope.
///
/// # Examples
///
/// ```
/// use hmacsig_auth::SigningScheme;
/// use hmacsig_auth::sigv4::derive_signing_key;
///
/// let scheme = SigningScheme::new("AWS", "amz").unwrap();
/// let key = derive_signing_key(
///     &scheme,
///     "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
///     "20130524",
///     "us-east-1",
///     "s3",
/// );
/// assert_eq!(key.len(), 32);
/// ```
#[must_use]
pub fn derive_signing_key(
    scheme: &SigningScheme,
    secret_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Vec<u8> {
    let seed = format!("{}{secret_key}", scheme.key_prefix());
    let date_key = hmac_sha256(seed.as_bytes(), date.as_bytes());
    let date_region_key = hmac_sha256(&date_key, region.as_bytes());
    let date_region_service_key = hmac_sha256(&date_region_key, service.as_bytes());
    hmac_sha256(&date_region_service_key, scheme.termination().as_bytes())
}

/// Compute the HMAC-SHA256 signature of `data` using the given `signing_key`.
///
/// Returns the lowercase hex-encoded signature.
#[must_use]
pub fn compute_signature(signing_key: &[u8], data: &str) -> String {
    hex::encode(hmac_sha256(signing_key, data.as_bytes()))
}
