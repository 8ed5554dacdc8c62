//! Secret retrieval retries against a real HTTP endpoint.

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use hmacsig_auth::{AuthError, ResolveError, Signer, Verifier};
    use tokio_util::sync::CancellationToken;

    use crate::{
        ACCESS_KEY_ID, SECRET_KEY, SecretServer, request, test_signer, test_verifier,
    };

    fn signed_request() -> http::Request<bytes::Bytes> {
        let mut req = request("GET", "http://s3.example.com/bucket/key", b"");
        test_signer(false).sign(&mut req).unwrap();
        req
    }

    #[tokio::test]
    async fn test_should_call_failing_endpoint_exactly_three_times() {
        let secrets = SecretServer::start_failing(
            &[(ACCESS_KEY_ID, SECRET_KEY)],
            usize::MAX,
            http::StatusCode::INTERNAL_SERVER_ERROR,
        )
        .await
        .unwrap();
        let verifier = test_verifier(&secrets.url(), Duration::from_millis(20));

        let started = Instant::now();
        let err = verifier.verify(&signed_request()).await.unwrap_err();

        assert_eq!(secrets.calls(), 3);
        // 20ms then 40ms of backoff.
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert_eq!(err.status_code(), http::StatusCode::BAD_GATEWAY);
        match err {
            AuthError::SecretResolution(ResolveError::MaxAttemptsExceeded { attempts, source }) => {
                assert_eq!(attempts, 3);
                match *source {
                    ResolveError::Status { status, body } => {
                        assert_eq!(status, 500);
                        assert_eq!(body, "secret service unavailable");
                    }
                    other => panic!("expected Status, got {other:?}"),
                }
            }
            other => panic!("expected MaxAttemptsExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_recover_when_endpoint_comes_back() {
        let secrets = SecretServer::start_failing(
            &[(ACCESS_KEY_ID, SECRET_KEY)],
            2,
            http::StatusCode::SERVICE_UNAVAILABLE,
        )
        .await
        .unwrap();
        let verifier = test_verifier(&secrets.url(), Duration::from_millis(10));

        let verified = verifier.verify(&signed_request()).await.unwrap();

        assert_eq!(verified.access_key_id, ACCESS_KEY_ID);
        assert_eq!(secrets.calls(), 3);
    }

    #[tokio::test]
    async fn test_should_exhaust_attempts_for_unknown_key() {
        let secrets = SecretServer::start(&[]).await.unwrap();
        let verifier = test_verifier(&secrets.url(), Duration::from_millis(10));

        let err = verifier.verify(&signed_request()).await.unwrap_err();

        assert_eq!(secrets.calls(), 3);
        assert!(matches!(
            err,
            AuthError::SecretResolution(ResolveError::MaxAttemptsExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_report_transport_errors_for_unreachable_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/secret", listener.local_addr().unwrap());
        drop(listener);
        let verifier = test_verifier(&url, Duration::from_millis(10));

        let err = verifier.verify(&signed_request()).await.unwrap_err();

        match err {
            AuthError::SecretResolution(ResolveError::MaxAttemptsExceeded { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, ResolveError::Transport(_)));
            }
            other => panic!("expected MaxAttemptsExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_abort_backoff_when_cancelled() {
        let secrets = SecretServer::start_failing(
            &[(ACCESS_KEY_ID, SECRET_KEY)],
            usize::MAX,
            http::StatusCode::SERVICE_UNAVAILABLE,
        )
        .await
        .unwrap();
        let verifier = test_verifier(&secrets.url(), Duration::from_secs(30));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let err = verifier
            .verify_with_cancellation(&signed_request(), &token)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::SecretResolution(ResolveError::Cancelled)
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(secrets.calls(), 1);
    }
}
