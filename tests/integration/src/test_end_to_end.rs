//! Sign, then verify against a real secret-retrieval endpoint.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hmacsig_auth::{Signer, Verifier};

    use crate::{
        ACCESS_KEY_ID, REGION, SECRET_KEY, SERVICE, SecretServer, request, test_signer,
        test_verifier,
    };

    async fn sign_and_verify(method: &str, uri: &str, body: &'static [u8]) {
        let secrets = SecretServer::start(&[(ACCESS_KEY_ID, SECRET_KEY)])
            .await
            .unwrap();
        let verifier = test_verifier(&secrets.url(), Duration::from_millis(10));

        let mut req = request(method, uri, body);
        test_signer(false).sign(&mut req).unwrap();

        let verified = verifier
            .verify(&req)
            .await
            .unwrap_or_else(|e| panic!("{uri} should verify: {e}"));
        assert_eq!(verified.access_key_id, ACCESS_KEY_ID);
        assert_eq!(verified.region, REGION);
        assert_eq!(verified.service, SERVICE);
        assert_eq!(secrets.calls(), 1);
        assert_eq!(secrets.requested_ids(), vec![ACCESS_KEY_ID]);
    }

    #[tokio::test]
    async fn test_should_verify_url_with_query() {
        sign_and_verify(
            "GET",
            "http://s3.example.com/examplebucket/myphoto.jpg?prefix=somePrefix&marker=someMarker&max-keys=2",
            b"",
        )
        .await;
    }

    #[tokio::test]
    async fn test_should_verify_url_without_query() {
        sign_and_verify("GET", "http://s3.example.com/examplebucket/myphoto.jpg", b"").await;
    }

    #[tokio::test]
    async fn test_should_verify_url_with_single_flag() {
        sign_and_verify("GET", "http://s3.example.com/examplebucket?acl", b"").await;
    }

    #[tokio::test]
    async fn test_should_verify_request_with_body() {
        sign_and_verify(
            "PUT",
            "http://s3.example.com/examplebucket/notes.txt",
            b"Welcome to Amazon S3.",
        )
        .await;
    }

    #[tokio::test]
    async fn test_should_verify_encoded_path_and_query() {
        sign_and_verify(
            "GET",
            "http://s3.example.com/bucket/my%20photo.jpg?name=a%20b&name=a+a",
            b"",
        )
        .await;
    }

    #[tokio::test]
    async fn test_should_verify_with_payload_hash_header() {
        let secrets = SecretServer::start(&[(ACCESS_KEY_ID, SECRET_KEY)])
            .await
            .unwrap();
        let verifier = test_verifier(&secrets.url(), Duration::from_millis(10));

        let mut req = request("POST", "http://s3.example.com/upload", b"{\"k\":1}");
        test_signer(true).sign(&mut req).unwrap();
        assert!(req.headers().contains_key("x-amz-content-sha256"));

        let verified = verifier.verify(&req).await.unwrap();
        assert!(
            verified
                .signed_headers
                .contains(&"x-amz-content-sha256".to_owned())
        );
    }

    #[tokio::test]
    async fn test_should_verify_many_keys_concurrently_with_one_verifier() {
        let keys: Vec<(String, String)> = (0..8)
            .map(|i| (format!("AKID{i}"), format!("secret-{i}")))
            .collect();
        let pairs: Vec<(&str, &str)> = keys
            .iter()
            .map(|(id, secret)| (id.as_str(), secret.as_str()))
            .collect();
        let secrets = SecretServer::start(&pairs).await.unwrap();
        let verifier =
            std::sync::Arc::new(test_verifier(&secrets.url(), Duration::from_millis(10)));

        let mut tasks = Vec::new();
        for (id, secret) in keys {
            let verifier = std::sync::Arc::clone(&verifier);
            tasks.push(tokio::spawn(async move {
                let signer = hmacsig_auth::SigV4Signer::new(
                    hmacsig_core::SigningConfig::builder().service(SERVICE).build(),
                    hmacsig_core::SigningCredentials::new(id.as_str(), secret.as_str(), REGION),
                )
                .unwrap();
                let mut req = request("GET", "http://s3.example.com/shared", b"");
                signer.sign(&mut req).unwrap();
                let verified = verifier.verify(&req).await.unwrap();
                assert_eq!(verified.access_key_id, id);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(secrets.calls(), 8);
    }
}
