//! Symmetric HMAC-SHA256 request signing and verification.
//!
//! A client holding an access key id and a shared secret signs each outgoing
//! HTTP request; a server recomputes the signature, fetching the secret for
//! the access key from a secret-retrieval service, and accepts the request
//! only if both sides agree byte for byte.
//!
//! # Overview
//!
//! The scheme follows the shape of AWS Signature Version 4, with every fixed
//! string derived from an organization tag (see [`SigningScheme`]):
//!
//! 1. Canonicalize the request ([`canonical`]).
//! 2. Build the string to sign from the algorithm, the timestamp, the
//!    `date/region/service` scope and the canonical request hash ([`scope`]).
//! 3. Derive a per-day, per-region, per-service signing key ([`sigv4`]).
//! 4. Carry the result in the `Authorization` header ([`AuthorizationHeader`]).
//!
//! # Usage
//!
//! ```rust
//! use bytes::Bytes;
//! use hmacsig_auth::{
//!     SigV4Signer, SigV4Verifier, Signer, StaticSecretSource, Verifier,
//! };
//! use hmacsig_core::{SigningConfig, SigningCredentials, VerifierConfig};
//!
//! # tokio_test::block_on(async {
//! let signer = SigV4Signer::new(
//!     SigningConfig::builder().service("s3").build(),
//!     SigningCredentials::new("AKID", "secret", "us-east-1"),
//! )
//! .unwrap();
//!
//! let mut request = http::Request::builder()
//!     .uri("http://s3.example.com/bucket/key")
//!     .body(Bytes::new())
//!     .unwrap();
//! signer.sign(&mut request).unwrap();
//!
//! let verifier = SigV4Verifier::with_source(
//!     VerifierConfig::builder()
//!         .service("s3")
//!         .secret_retrieval_url("http://127.0.0.1:9000/secret")
//!         .build(),
//!     StaticSecretSource::new([("AKID".to_owned(), "secret".to_owned())]),
//! )
//! .unwrap();
//! let verified = verifier.verify(&request).await.unwrap();
//! assert_eq!(verified.access_key_id, "AKID");
//! # });
//! ```
//!
//! # Modules
//!
//! - [`body`] - Buffering streaming bodies so they can be hashed and replayed
//! - [`canonical`] - Canonical request construction
//! - [`crypto`] - SHA-256 and HMAC-SHA256 primitives
//! - [`error`] - Error types and their HTTP status mapping
//! - [`header`] - `Authorization` header codec
//! - [`resolver`] - Secret sources and the retrying resolver
//! - [`scheme`] - Names derived from the organization tag
//! - [`scope`] - Credential scope, timestamps and the string to sign
//! - [`signer`] - Client-side signing
//! - [`sigv4`] - Signing-key derivation
//! - [`verifier`] - Server-side verification

pub mod body;
pub mod canonical;
pub mod crypto;
pub mod error;
pub mod header;
pub mod resolver;
pub mod scheme;
pub mod scope;
pub mod signer;
pub mod sigv4;
pub mod verifier;

pub use body::buffer_request;
pub use canonical::CanonicalRequest;
pub use crypto::{hash_payload, hmac_sha256};
pub use error::{AuthError, MalformedHeader, ResolveError};
pub use header::AuthorizationHeader;
pub use resolver::{
    HttpSecretSource, RetryPolicy, SecretResolver, SecretSource, StaticSecretSource,
};
pub use scheme::SigningScheme;
pub use scope::CredentialScope;
pub use signer::{SigV4Signer, Signer};
pub use verifier::{SigV4Verifier, VerifiedRequest, Verifier};
pub use tokio_util::sync::CancellationToken;
