//! Requests altered after signing must never verify.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use hmacsig_auth::{AuthError, MalformedHeader, Signer, Verifier};

    use crate::{ACCESS_KEY_ID, SECRET_KEY, SecretServer, request, test_signer, test_verifier};

    const URI: &str = "http://s3.example.com/examplebucket/myphoto.jpg?max-keys=2";

    async fn setup() -> (SecretServer, http::Request<Bytes>) {
        let secrets = SecretServer::start(&[(ACCESS_KEY_ID, SECRET_KEY)])
            .await
            .unwrap();
        let mut req = request("PUT", URI, b"original body");
        req.headers_mut()
            .insert("x-amz-meta-owner", "alice".parse().unwrap());
        test_signer(false).sign(&mut req).unwrap();
        (secrets, req)
    }

    async fn verify(secrets: &SecretServer, req: &http::Request<Bytes>) -> Result<(), AuthError> {
        test_verifier(&secrets.url(), Duration::from_millis(10))
            .verify(req)
            .await
            .map(|_| ())
    }

    #[tokio::test]
    async fn test_should_verify_untampered_request() {
        let (secrets, req) = setup().await;
        assert!(verify(&secrets, &req).await.is_ok());
    }

    #[tokio::test]
    async fn test_should_reject_changed_header_value() {
        let (secrets, mut req) = setup().await;
        req.headers_mut()
            .insert("x-amz-meta-owner", "mallory".parse().unwrap());

        let result = verify(&secrets, &req).await;
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[tokio::test]
    async fn test_should_reject_changed_body() {
        let (secrets, req) = setup().await;
        let (parts, _) = req.into_parts();
        let req = http::Request::from_parts(parts, Bytes::from_static(b"modified body"));

        let result = verify(&secrets, &req).await;
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[tokio::test]
    async fn test_should_reject_changed_path() {
        let (secrets, req) = setup().await;
        let (mut parts, body) = req.into_parts();
        parts.uri = "http://s3.example.com/examplebucket/other.jpg?max-keys=2"
            .parse()
            .unwrap();

        let result = verify(&secrets, &http::Request::from_parts(parts, body)).await;
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[tokio::test]
    async fn test_should_reject_changed_query() {
        let (secrets, req) = setup().await;
        let (mut parts, body) = req.into_parts();
        parts.uri = "http://s3.example.com/examplebucket/myphoto.jpg?max-keys=1000"
            .parse()
            .unwrap();

        let result = verify(&secrets, &http::Request::from_parts(parts, body)).await;
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[tokio::test]
    async fn test_should_reject_changed_method() {
        let (secrets, req) = setup().await;
        let (mut parts, body) = req.into_parts();
        parts.method = http::Method::POST;

        let result = verify(&secrets, &http::Request::from_parts(parts, body)).await;
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[tokio::test]
    async fn test_should_reject_changed_signature() {
        let (secrets, mut req) = setup().await;
        let value = req.headers()[http::header::AUTHORIZATION]
            .to_str()
            .unwrap()
            .to_owned();
        let (prefix, signature) = value.rsplit_once("Signature=").unwrap();
        let flipped: String = signature
            .chars()
            .map(|c| if c == '0' { '1' } else { '0' })
            .collect();
        req.headers_mut().insert(
            http::header::AUTHORIZATION,
            format!("{prefix}Signature={flipped}").parse().unwrap(),
        );

        let result = verify(&secrets, &req).await;
        assert!(matches!(result, Err(AuthError::SignatureMismatch)));
    }

    #[tokio::test]
    async fn test_should_reject_malformed_header_before_any_lookup() {
        let (secrets, mut req) = setup().await;
        let value = req.headers()[http::header::AUTHORIZATION]
            .to_str()
            .unwrap()
            .replace("/aws4_request", "");
        req.headers_mut()
            .insert(http::header::AUTHORIZATION, value.parse().unwrap());

        let result = verify(&secrets, &req).await;

        assert!(matches!(
            result,
            Err(AuthError::MalformedAuthHeader(MalformedHeader::CredentialParts(4)))
        ));
        assert_eq!(secrets.calls(), 0);
    }

    #[tokio::test]
    async fn test_should_reject_credential_for_other_key() {
        let (secrets, mut req) = setup().await;
        let value = req.headers()[http::header::AUTHORIZATION]
            .to_str()
            .unwrap()
            .replace(ACCESS_KEY_ID, "AKIDOTHER");
        req.headers_mut()
            .insert(http::header::AUTHORIZATION, value.parse().unwrap());

        let result = verify(&secrets, &req).await;

        assert!(matches!(result, Err(AuthError::SecretResolution(_))));
        assert_eq!(secrets.requested_ids()[0], "AKIDOTHER");
    }
}
