//! Canonical request construction.
//!
//! The canonical request is the six fields below, joined by single newlines:
//!
//! ```text
//! HTTPMethod
//! CanonicalURI
//! CanonicalQueryString
//! CanonicalHeaders
//! SignedHeaders
//! HexEncode(SHA256(Payload))
//! ```
//!
//! Signer and verifier must produce this string byte for byte, so every
//! component is normalized independently of header and query insertion order.

use http::uri::Authority;
use http::{HeaderMap, Method, Uri};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tracing::debug;

use crate::crypto::hash_payload;
use crate::error::AuthError;

/// The set of characters that must be percent-encoded in URI path segments.
///
/// Everything except the unreserved characters (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`)
/// is encoded. Forward slashes separate segments and are never encoded.
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Headers that never take part in the canonical header block.
///
/// `authorization` carries the signature itself; the rest are added or
/// rewritten by HTTP transports after signing.
pub const UNSIGNED_HEADERS: [&str; 5] = [
    "authorization",
    "accept-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
];

/// Ports left out of the canonical host.
const DEFAULT_PORTS: [u16; 2] = [80, 443];

/// A fully built canonical request together with the header names it signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    canonical: String,
    signed_headers: Vec<String>,
}

impl CanonicalRequest {
    /// Canonicalize a request from its method, target, headers and body.
    ///
    /// A synthetic `host` header is always part of the signed set: it comes
    /// from the URI authority when present (client side), otherwise from the
    /// `Host` header (server side).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingHeader`] when no host can be determined and
    /// [`AuthError::InvalidHeaderValue`] when a header value is not visible ASCII.
    pub fn build(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Self, AuthError> {
        let host = request_host(uri, headers)?;
        let (canonical_headers, signed_headers) = build_canonical_headers(headers, &host)?;
        let signed_refs: Vec<&str> = signed_headers.iter().map(String::as_str).collect();

        let canonical = format!(
            "{method}\n{uri}\n{query}\n{canonical_headers}\n{signed}\n{payload}",
            method = method.as_str(),
            uri = build_canonical_uri(uri.path()),
            query = build_canonical_query_string(uri.query().unwrap_or("")),
            signed = build_signed_headers_string(&signed_refs),
            payload = hash_payload(body),
        );

        debug!(canonical_request = %canonical, "Built canonical request");

        Ok(Self {
            canonical,
            signed_headers,
        })
    }

    /// The canonical request string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Lowercase, sorted names of the signed headers.
    #[must_use]
    pub fn signed_headers(&self) -> &[String] {
        &self.signed_headers
    }

    /// Hex-encoded SHA-256 of the canonical request string.
    #[must_use]
    pub fn hash(&self) -> String {
        hash_payload(self.canonical.as_bytes())
    }
}

/// Build the canonical URI by URI-encoding each path segment individually.
///
/// Forward slashes (`/`) are preserved. Empty paths are normalized to `/`.
/// Each segment is decoded first so an already-encoded path and its raw form
/// canonicalize identically.
///
/// # Examples
///
/// ```
/// use hmacsig_auth::canonical::build_canonical_uri;
///
/// assert_eq!(build_canonical_uri("/examplebucket/myphoto.jpg"), "/examplebucket/myphoto.jpg");
/// assert_eq!(build_canonical_uri("/my photo.jpg"), "/my%20photo.jpg");
/// assert_eq!(build_canonical_uri(""), "/");
/// ```
#[must_use]
pub fn build_canonical_uri(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    path.split('/')
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            utf8_percent_encode(&decoded, URI_ENCODE_SET).to_string()
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the canonical query string.
///
/// The raw query is decoded, then every key and value is form-encoded on its
/// own. Pairs are sorted by encoded key, then by encoded value, and joined
/// with `&`. A parameter without a value canonicalizes as `key=`.
///
/// # Examples
///
/// ```
/// use hmacsig_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(
///     build_canonical_query_string("prefix=somePrefix&marker=someMarker&max-keys=2"),
///     "marker=someMarker&max-keys=2&prefix=somePrefix"
/// );
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (form_encode(&key), form_encode(&value)))
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical header block and the matching signed header names.
///
/// Every header except [`UNSIGNED_HEADERS`] contributes one line
/// `lowercase(name):trim(values joined by ",")`. The supplied `host` replaces
/// any `Host` header present. Lines are sorted and joined by newlines; names
/// are returned sorted.
///
/// # Errors
///
/// Returns [`AuthError::InvalidHeaderValue`] if a value is not visible ASCII.
pub fn build_canonical_headers(
    headers: &HeaderMap,
    host: &str,
) -> Result<(String, Vec<String>), AuthError> {
    let mut lines = vec![format!("host:{}", host.trim())];
    let mut names = vec!["host".to_owned()];

    for name in headers.keys() {
        let name = name.as_str();
        if name == "host" || UNSIGNED_HEADERS.contains(&name) {
            continue;
        }

        let values = headers
            .get_all(name)
            .iter()
            .map(|value| {
                value
                    .to_str()
                    .map_err(|_| AuthError::InvalidHeaderValue(name.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        lines.push(format!("{name}:{}", values.join(",").trim()));
        names.push(name.to_owned());
    }

    lines.sort_unstable();
    names.sort_unstable();

    Ok((lines.join("\n"), names))
}

/// Build the signed headers string as a semicolon-separated list of lowercase header names.
///
/// The header names are sorted lexicographically.
///
/// # Examples
///
/// ```
/// use hmacsig_auth::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["x-amz-date", "host"]),
///     "host;x-amz-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted: Vec<&str> = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.join(";")
}

/// Determine the request's target host.
///
/// The host is lowercased and the ports 80 and 443 are dropped, the way HTTP
/// clients rewrite the authority before sending it as `Host`. The header
/// carries no scheme, so both ports are dropped regardless of scheme.
fn request_host(uri: &Uri, headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(authority) = uri.authority() {
        return Ok(normalize_authority(authority));
    }

    let authority = headers
        .get(http::header::HOST)
        .ok_or_else(|| AuthError::MissingHeader("host".to_owned()))?
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<Authority>().ok())
        .ok_or_else(|| AuthError::InvalidHeaderValue("host".to_owned()))?;
    Ok(normalize_authority(&authority))
}

fn normalize_authority(authority: &Authority) -> String {
    let host = authority.host().to_ascii_lowercase();
    match authority.port_u16() {
        Some(port) if !DEFAULT_PORTS.contains(&port) => format!("{host}:{port}"),
        _ => host,
    }
}

fn form_encode(input: &str) -> String {
    form_urlencoded::byte_serialize(input.as_bytes()).collect()
}
