//! Request body buffering.
//!
//! Signing and verification both hash the body, and the request still has to
//! be forwarded afterwards, so the body is collected once into [`Bytes`].
//! Cloning `Bytes` is a reference-count bump, so the buffered body can be read
//! any number of times.

use bytes::Bytes;
use http::Request;
use http_body_util::BodyExt;

use crate::error::AuthError;

/// Collect a streaming request body into memory.
///
/// The returned request carries the same head (method, URI, version, headers,
/// extensions) and a fully buffered body.
///
/// # Errors
///
/// Returns [`AuthError::Body`] if reading the body fails.
pub async fn buffer_request<B>(request: Request<B>) -> Result<Request<Bytes>, AuthError>
where
    B: http_body::Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = request.into_parts();
    let bytes = body
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| AuthError::Body(e.to_string()))?;
    Ok(Request::from_parts(parts, bytes))
}
