//! Gateway service that verifies every incoming request.
//!
//! Health-check probes (`GET /health`, `GET /_health`) are answered directly.
//! Every other request has its body buffered and its signature verified; the
//! response is the verified identity as JSON, or the error kind with the
//! status code the error maps to.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::Service;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hmacsig_auth::{AuthError, SecretSource, SigV4Verifier, VerifiedRequest, buffer_request};

/// Response body type for every gateway response.
pub type GatewayBody = Full<Bytes>;

/// Server version reported in health check responses.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Gateway that verifies each request with a shared [`SigV4Verifier`].
///
/// Secret lookups in flight are abandoned once `shutdown` is cancelled.
#[derive(Debug)]
pub struct GatewayService<S> {
    verifier: Arc<SigV4Verifier<S>>,
    shutdown: CancellationToken,
}

impl<S> GatewayService<S> {
    /// Create a gateway around a verifier.
    pub fn new(verifier: Arc<SigV4Verifier<S>>, shutdown: CancellationToken) -> Self {
        Self { verifier, shutdown }
    }
}

impl<S> Clone for GatewayService<S> {
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<S: SecretSource + 'static> Service<http::Request<Incoming>> for GatewayService<S> {
    type Response = http::Response<GatewayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        if is_health_check(req.method(), req.uri().path()) {
            return Box::pin(async { Ok(health_check_response()) });
        }

        let gateway = self.clone();
        Box::pin(async move { Ok(gateway.handle(req).await) })
    }
}

impl<S: SecretSource> GatewayService<S> {
    /// Buffer, verify and answer a single request.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<GatewayBody>
    where
        B: http_body::Body,
        B::Error: std::fmt::Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let result = match buffer_request(req).await {
            Ok(req) => {
                self.verifier
                    .verify_with_cancellation(&req, &self.shutdown)
                    .await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(verified) => {
                info!(
                    %method,
                    %path,
                    access_key_id = %verified.access_key_id,
                    region = %verified.region,
                    service = %verified.service,
                    "request verified"
                );
                json_response(http::StatusCode::OK, &VerifiedBody::from(verified))
            }
            Err(err) => {
                warn!(%method, %path, kind = err.kind(), error = %err, "request rejected");
                error_response(&err)
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifiedBody {
    access_key_id: String,
    region: String,
    service: String,
    signed_headers: Vec<String>,
}

impl From<VerifiedRequest> for VerifiedBody {
    fn from(verified: VerifiedRequest) -> Self {
        Self {
            access_key_id: verified.access_key_id,
            region: verified.region,
            service: verified.service,
            signed_headers: verified.signed_headers,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

/// Map an [`AuthError`] to its status code and a JSON error document.
fn error_response(err: &AuthError) -> http::Response<GatewayBody> {
    json_response(
        err.status_code(),
        &ErrorBody {
            error: err.kind(),
            message: err.to_string(),
        },
    )
}

fn json_response<T: Serialize>(
    status: http::StatusCode,
    body: &T,
) -> http::Response<GatewayBody> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(_) => (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            br#"{"error":"InternalError"}"#.to_vec(),
        ),
    };

    let mut response = http::Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET && (path == "/health" || path == "/_health")
}

fn health_check_response() -> http::Response<GatewayBody> {
    json_response(
        http::StatusCode::OK,
        &serde_json::json!({ "status": "running", "version": VERSION }),
    )
}
