//! Encoding and decoding of the `Authorization` header.
//!
//! Wire format:
//! ```text
//! <Algorithm> Credential=<AKID>/<YYYYMMDD>/<region>/<service>/<termination>,
//!   SignedHeaders=<name;name;...>,Signature=<lowercase hex>
//! ```
//! (on a single line; the break above is for readability).

use std::collections::HashSet;
use std::fmt;

use http::HeaderValue;

use crate::error::{AuthError, MalformedHeader};
use crate::scheme::SigningScheme;
use crate::scope::CredentialScope;

const CREDENTIAL_TAG: &str = "Credential";
const SIGNED_HEADERS_TAG: &str = "SignedHeaders";
const SIGNATURE_TAG: &str = "Signature";

/// Structured contents of an `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationHeader {
    /// The algorithm identifier, e.g. `AWS4-HMAC-SHA256`.
    pub algorithm: String,
    /// Access key id and the date/region/service scope.
    pub scope: CredentialScope,
    /// The literal closing the credential, e.g. `aws4_request`.
    pub termination: String,
    /// Lowercase signed header names, in the order received.
    pub signed_headers: Vec<String>,
    /// The lowercase hex signature.
    pub signature: String,
}

impl AuthorizationHeader {
    /// Decode a header value, validating its structure before any
    /// cryptographic work happens.
    ///
    /// The value must be `<algorithm> <components>` where the components are
    /// exactly `Credential=...`, `SignedHeaders=...` and `Signature=...` in
    /// that order. The credential must have five `/`-separated parts ending
    /// in the scheme's termination literal.
    ///
    /// # Errors
    ///
    /// Returns the [`MalformedHeader`] variant describing the first
    /// structural problem found.
    ///
    /// # Examples
    ///
    /// ```
    /// use hmacsig_auth::{AuthorizationHeader, SigningScheme};
    ///
    /// let scheme = SigningScheme::new("AWS", "amz").unwrap();
    /// let header = AuthorizationHeader::decode(
    ///     "AWS4-HMAC-SHA256 Credential=AKID/20240105/us-east-1/s3/aws4_request,\
    ///      SignedHeaders=host;x-amz-date,\
    ///      Signature=f0e8bdb87c964420e857bd35b5d6ed310bd44f0170aba48dd91039c6036bdb41",
    ///     &scheme,
    /// )
    /// .unwrap();
    /// assert_eq!(header.scope.access_key_id, "AKID");
    /// assert_eq!(header.signed_headers, vec!["host", "x-amz-date"]);
    /// ```
    pub fn decode(value: &str, scheme: &SigningScheme) -> Result<Self, MalformedHeader> {
        let (algorithm, rest) = value
            .trim()
            .split_once(' ')
            .ok_or(MalformedHeader::MissingAlgorithm)?;
        if algorithm.is_empty() {
            return Err(MalformedHeader::MissingAlgorithm);
        }

        let components: Vec<&str> = rest.split(',').map(str::trim).collect();
        let [credential, signed_headers, signature] = components.as_slice() else {
            return Err(MalformedHeader::ComponentCount(components.len()));
        };

        let credential = strip_tag(credential, CREDENTIAL_TAG)?;
        let (scope, termination) = parse_credential(credential, scheme)?;

        let signed_headers = strip_tag(signed_headers, SIGNED_HEADERS_TAG)?;
        let signed_headers = parse_signed_headers(signed_headers)?;

        let signature = strip_tag(signature, SIGNATURE_TAG)?;
        if signature.is_empty() {
            return Err(MalformedHeader::EmptyField(SIGNATURE_TAG));
        }
        if signature.len() != 64
            || !signature
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(MalformedHeader::InvalidSignature);
        }

        Ok(Self {
            algorithm: algorithm.to_owned(),
            scope,
            termination,
            signed_headers,
            signature: signature.to_owned(),
        })
    }

    /// Encode the header as an HTTP header value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidHeaderValue`] if a scope component contains
    /// bytes that are not allowed in a header value.
    pub fn to_header_value(&self) -> Result<HeaderValue, AuthError> {
        HeaderValue::from_str(&self.to_string())
            .map_err(|_| AuthError::InvalidHeaderValue("authorization".to_owned()))
    }
}

impl fmt::Display for AuthorizationHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {CREDENTIAL_TAG}={}/{}/{}/{}/{},{SIGNED_HEADERS_TAG}={},{SIGNATURE_TAG}={}",
            self.algorithm,
            self.scope.access_key_id,
            self.scope.date,
            self.scope.region,
            self.scope.service,
            self.termination,
            self.signed_headers.join(";"),
            self.signature,
        )
    }
}

fn strip_tag<'a>(component: &'a str, tag: &'static str) -> Result<&'a str, MalformedHeader> {
    component
        .strip_prefix(tag)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or(MalformedHeader::UnexpectedTag { expected: tag })
}

fn parse_credential(
    credential: &str,
    scheme: &SigningScheme,
) -> Result<(CredentialScope, String), MalformedHeader> {
    let parts: Vec<&str> = credential.split('/').collect();
    let [access_key_id, date, region, service, termination] = parts.as_slice() else {
        return Err(MalformedHeader::CredentialParts(parts.len()));
    };

    if [access_key_id, date, region, service]
        .iter()
        .any(|part| part.is_empty())
    {
        return Err(MalformedHeader::EmptyField(CREDENTIAL_TAG));
    }
    if *termination != scheme.termination() {
        return Err(MalformedHeader::TerminationToken((*termination).to_owned()));
    }

    Ok((
        CredentialScope::new(*access_key_id, *date, *region, *service),
        (*termination).to_owned(),
    ))
}

fn parse_signed_headers(list: &str) -> Result<Vec<String>, MalformedHeader> {
    if list.is_empty() {
        return Err(MalformedHeader::EmptyField(SIGNED_HEADERS_TAG));
    }

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for name in list.split(';') {
        if name.is_empty() || name.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(MalformedHeader::InvalidSignedHeaders(list.to_owned()));
        }
        if !seen.insert(name) {
            return Err(MalformedHeader::InvalidSignedHeaders(list.to_owned()));
        }
        names.push(name.to_owned());
    }
    Ok(names)
}
