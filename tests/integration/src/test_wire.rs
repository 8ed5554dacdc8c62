//! Signed requests sent over real HTTP to a verifying service.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hmacsig_auth::Signer;

    use crate::{
        ACCESS_KEY_ID, SECRET_KEY, SecretServer, VerifyingServer, request, test_signer,
        test_verifier,
    };

    async fn send(req: http::Request<bytes::Bytes>) -> (http::StatusCode, String) {
        let req = reqwest::Request::try_from(req).unwrap();
        let response = reqwest::Client::new().execute(req).await.unwrap();
        let status = response.status();
        (status, response.text().await.unwrap())
    }

    async fn servers() -> (SecretServer, VerifyingServer) {
        let secrets = SecretServer::start(&[(ACCESS_KEY_ID, SECRET_KEY)])
            .await
            .unwrap();
        let service = VerifyingServer::start(test_verifier(&secrets.url(), Duration::from_millis(10)))
            .await
            .unwrap();
        (secrets, service)
    }

    /// Requests signed client-side; `accept` is set explicitly so the client
    /// library does not add it after signing.
    fn signed(method: &str, url: &str, body: &'static [u8], hash_payload: bool) -> http::Request<bytes::Bytes> {
        let mut req = request(method, url, body);
        req.headers_mut()
            .insert(http::header::ACCEPT, "*/*".parse().unwrap());
        test_signer(hash_payload).sign(&mut req).unwrap();
        req
    }

    #[tokio::test]
    async fn test_should_accept_signed_get_over_http() {
        let (_secrets, service) = servers().await;
        let url = format!("{}/examplebucket/myphoto.jpg?prefix=somePrefix&marker=someMarker&max-keys=2", service.base_url());

        let (status, body) = send(signed("GET", &url, b"", false)).await;

        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(body, ACCESS_KEY_ID);
    }

    #[tokio::test]
    async fn test_should_accept_signed_put_with_body_over_http() {
        let (_secrets, service) = servers().await;
        let url = format!("{}/examplebucket/notes.txt", service.base_url());

        let (status, _) = send(signed("PUT", &url, b"Welcome to Amazon S3.", true)).await;

        assert_eq!(status, http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_should_accept_request_signed_with_uppercase_host() {
        let (_secrets, service) = servers().await;
        let url = format!(
            "{}/examplebucket/key",
            service.base_url().replace("127.0.0.1", "LOCALHOST")
        );

        let (status, body) = send(signed("GET", &url, b"", false)).await;

        assert_eq!(status, http::StatusCode::OK);
        assert_eq!(body, ACCESS_KEY_ID);
    }

    #[tokio::test]
    async fn test_should_answer_unauthorized_for_unsigned_request() {
        let (secrets, service) = servers().await;
        let url = format!("{}/examplebucket", service.base_url());

        let (status, body) = send(request("GET", &url, b"")).await;

        assert_eq!(status, http::StatusCode::UNAUTHORIZED);
        assert_eq!(body, "MissingAuthorizationHeader");
        assert_eq!(secrets.calls(), 0);
    }

    #[tokio::test]
    async fn test_should_answer_forbidden_for_header_added_after_signing() {
        let (_secrets, service) = servers().await;
        let url = format!("{}/examplebucket", service.base_url());
        let mut req = signed("GET", &url, b"", false);
        req.headers_mut()
            .insert("x-added-later", "1".parse().unwrap());

        let (status, body) = send(req).await;

        assert_eq!(status, http::StatusCode::FORBIDDEN);
        assert_eq!(body, "SignatureMismatch");
    }

    #[tokio::test]
    async fn test_should_answer_bad_gateway_when_secret_service_is_down() {
        let secrets = SecretServer::start_failing(
            &[(ACCESS_KEY_ID, SECRET_KEY)],
            usize::MAX,
            http::StatusCode::SERVICE_UNAVAILABLE,
        )
        .await
        .unwrap();
        let service = VerifyingServer::start(test_verifier(&secrets.url(), Duration::from_millis(5)))
            .await
            .unwrap();
        let url = format!("{}/examplebucket", service.base_url());

        let (status, body) = send(signed("GET", &url, b"", false)).await;

        assert_eq!(status, http::StatusCode::BAD_GATEWAY);
        assert_eq!(body, "SecretResolutionFailure");
        assert_eq!(secrets.calls(), 3);
    }
}
