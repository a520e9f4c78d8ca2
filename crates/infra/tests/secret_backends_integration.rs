//! Integration tests for the AWS secret backends
//!
//! A wiremock server stands in for SSM and Secrets Manager; requests are
//! checked for the JSON 1.1 protocol headers and a SigV4 signature.

mod support;

use std::sync::Arc;

use sentinel_core::credentials::UnavailableReason;
use sentinel_core::{CredentialResolver, SecretBackend, SecretBackendError};
use sentinel_domain::GlobalCredentialsConfig;
use sentinel_infra::http::HttpClient;
use sentinel_infra::{SecretsManagerBackend, SsmParameterBackend};
use serde_json::json;
use support::{aws_config, test_credentials};
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> HttpClient {
    HttpClient::builder().max_attempts(1).build().unwrap()
}

async fn ssm_backend(server: &MockServer) -> SsmParameterBackend {
    SsmParameterBackend::new(http(), &aws_config(server)).unwrap().with_credentials(test_credentials())
}

#[tokio::test]
async fn test_ssm_reads_decrypted_parameter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-amz-target", "AmazonSSM.GetParameter"))
        .and(header("content-type", "application/x-amz-json-1.1"))
        .and(header_exists("authorization"))
        .and(header_exists("x-amz-date"))
        .and(body_partial_json(json!({ "Name": "/sentinel/shodan", "WithDecryption": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Parameter": { "Name": "/sentinel/shodan", "Type": "SecureString", "Value": "shodan-key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let secret = ssm_backend(&server).await.fetch("/sentinel/shodan").await.unwrap();

    assert_eq!(secret.expose(), "shodan-key");
    let requests = server.received_requests().await.unwrap();
    let authorization = requests[0].headers.get("authorization").unwrap().to_str().unwrap();
    assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
    assert!(authorization.contains("/us-east-1/ssm/aws4_request"));
}

#[tokio::test]
async fn test_ssm_missing_parameter_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "ParameterNotFound",
            "message": "Parameter /sentinel/absent not found."
        })))
        .mount(&server)
        .await;

    let err = ssm_backend(&server).await.fetch("/sentinel/absent").await.unwrap_err();

    assert!(matches!(err, SecretBackendError::NotFound { locator } if locator == "/sentinel/absent"));
}

#[tokio::test]
async fn test_ssm_access_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "AccessDeniedException",
            "message": "not authorized to perform: ssm:GetParameter"
        })))
        .mount(&server)
        .await;

    let err = ssm_backend(&server).await.fetch("/sentinel/shodan").await.unwrap_err();

    assert!(matches!(err, SecretBackendError::AccessDenied { .. }));
}

#[tokio::test]
async fn test_secrets_manager_reads_secret_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "secretsmanager.GetSecretValue"))
        .and(body_partial_json(json!({ "SecretId": "sentinel/shodan" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ARN": "arn:aws:secretsmanager:us-east-1:111111111111:secret:sentinel/shodan-AbCdEf",
            "Name": "sentinel/shodan",
            "SecretString": "sm-key"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = SecretsManagerBackend::new(http(), &aws_config(&server))
        .unwrap()
        .with_credentials(test_credentials());
    let secret = backend.fetch("sentinel/shodan").await.unwrap();

    assert_eq!(secret.expose(), "sm-key");
}

#[tokio::test]
async fn test_secrets_manager_binary_secret_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Name": "sentinel/cert",
            "SecretBinary": "AAEC"
        })))
        .mount(&server)
        .await;

    let backend = SecretsManagerBackend::new(http(), &aws_config(&server))
        .unwrap()
        .with_credentials(test_credentials());
    let err = backend.fetch("sentinel/cert").await.unwrap_err();

    assert!(matches!(err, SecretBackendError::EmptySecret { .. }));
}

/// Through the resolver: a backend failure becomes "unavailable" and the
/// value is fetched once no matter how many callers ask.
#[tokio::test]
async fn test_resolver_over_ssm_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "Name": "/sentinel/shodan" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Parameter": { "Value": "shodan-key" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "Name": "/sentinel/greynoise" })))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "__type": "InternalServerError",
            "message": "try again"
        })))
        .mount(&server)
        .await;

    let global = GlobalCredentialsConfig::new("AWS_SSM")
        .with_value("shodan_api_key", "/sentinel/shodan")
        .with_value("greynoise_api_key", "/sentinel/greynoise");
    let backend = Arc::new(ssm_backend(&server).await);
    let resolver = Arc::new(CredentialResolver::new(&global, backend).unwrap());

    let lookups = (0..4).map(|_| {
        let resolver = Arc::clone(&resolver);
        async move { resolver.resolve("shodan_api_key").await }
    });
    let results = futures::future::join_all(lookups).await;
    assert!(results.iter().all(|credential| credential.is_available()));

    let greynoise = resolver.resolve("greynoise_api_key").await;
    assert!(matches!(greynoise.unavailable_reason(), Some(UnavailableReason::Backend(_))));
}

#[tokio::test]
async fn test_missing_aws_credentials_degrade_to_unavailable() {
    let server = MockServer::start().await;
    std::env::remove_var("AWS_ACCESS_KEY_ID");
    let backend = Arc::new(SsmParameterBackend::new(http(), &aws_config(&server)).unwrap());
    let global = GlobalCredentialsConfig::new("AWS_SSM").with_value("shodan_api_key", "/sentinel/shodan");
    let resolver = CredentialResolver::new(&global, backend).unwrap();

    let credential = resolver.resolve("shodan_api_key").await;

    assert!(!credential.is_available());
    assert!(server.received_requests().await.unwrap().is_empty());
}
