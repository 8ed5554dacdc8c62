//! Credential scope, signing timestamps, and the string to sign.

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};

use crate::error::AuthError;

/// Where a signature is valid: an access key, a calendar day, a region and a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialScope {
    /// The access key id that signed the request.
    pub access_key_id: String,
    /// The calendar day in `YYYYMMDD` form.
    pub date: String,
    /// The region the signature is scoped to.
    pub region: String,
    /// The service the signature is scoped to.
    pub service: String,
}

impl CredentialScope {
    /// Create a scope from its parts.
    pub fn new(
        access_key_id: impl Into<String>,
        date: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            date: date.into(),
            region: region.into(),
            service: service.into(),
        }
    }

    /// The `date/region/service` string used in the string to sign.
    ///
    /// # Examples
    ///
    /// ```
    /// use hmacsig_auth::CredentialScope;
    ///
    /// let scope = CredentialScope::new("AKID", "20240105", "us-east-1", "s3");
    /// assert_eq!(scope.scope(), "20240105/us-east-1/s3");
    /// ```
    #[must_use]
    pub fn scope(&self) -> String {
        format!("{}/{}/{}", self.date, self.region, self.service)
    }
}

/// Render a signing timestamp: RFC 3339 in UTC with nanosecond precision.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use hmacsig_auth::scope::format_timestamp;
///
/// let time = Utc.with_ymd_and_hms(2024, 1, 5, 10, 20, 30).unwrap();
/// assert_eq!(format_timestamp(time), "2024-01-05T10:20:30.000000000Z");
/// ```
#[must_use]
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a signing timestamp from the date header.
///
/// # Errors
///
/// Returns [`AuthError::InvalidTimestamp`] if the value is not RFC 3339.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, AuthError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map_err(|e| AuthError::InvalidTimestamp(format!("{value:?}: {e}")))
}

/// The zero-padded `YYYYMMDD` calendar day of a timestamp, in its own offset.
///
/// # Examples
///
/// ```
/// use hmacsig_auth::scope::{parse_timestamp, scope_date};
///
/// let time = parse_timestamp("2024-01-05T23:30:00-02:00").unwrap();
/// assert_eq!(scope_date(&time), "20240105");
/// ```
#[must_use]
pub fn scope_date(time: &DateTime<FixedOffset>) -> String {
    time.format("%Y%m%d").to_string()
}

/// Build the string to sign.
///
/// Format:
/// ```text
/// <algorithm>\n
/// <timestamp>\n
/// <date/region/service>\n
/// <hex(SHA256(canonical_request))>
/// ```
#[must_use]
pub fn build_string_to_sign(
    algorithm: &str,
    timestamp: &str,
    credential_scope: &str,
    canonical_request_hash: &str,
) -> String {
    format!("{algorithm}\n{timestamp}\n{credential_scope}\n{canonical_request_hash}")
}
