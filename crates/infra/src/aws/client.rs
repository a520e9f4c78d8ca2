use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use sentinel_common::CommonError;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::sigv4::{self, SigningParams};
use super::{regional_endpoint, AwsCredentials};
use crate::http::HttpClient;

const JSON_1_1: &str = "application/x-amz-json-1.1";

/// Failure of one AWS JSON-protocol call.
#[derive(Debug, Error)]
pub enum AwsServiceError {
    /// The service answered with an error document.
    #[error("{operation} failed with {code} (HTTP {status}): {message}")]
    Service { operation: String, status: u16, code: String, message: String },

    /// No credentials were found in the environment.
    #[error("no AWS credentials available for {operation}")]
    MissingCredentials { operation: String },

    /// The request never produced a usable response.
    #[error(transparent)]
    Transport(#[from] CommonError),
}

impl AwsServiceError {
    /// Error code without the `namespace#` prefix some services add.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => Some(code.rsplit('#').next().unwrap_or(code)),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(rename = "__type", default)]
    code: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// Client for one AWS service speaking JSON 1.1 with `X-Amz-Target`.
#[derive(Debug, Clone)]
pub struct AwsJsonClient {
    http: HttpClient,
    signing_name: &'static str,
    target_prefix: &'static str,
    region: String,
    endpoint: Url,
    credentials: Option<AwsCredentials>,
}

impl AwsJsonClient {
    /// Client for `signing_name` in `region`.
    ///
    /// `endpoint` overrides the regional endpoint; credentials come from the
    /// environment.
    ///
    /// # Errors
    /// `CommonError::Config` if the endpoint is not a valid URL.
    pub fn new(
        http: HttpClient,
        signing_name: &'static str,
        target_prefix: &'static str,
        region: impl Into<String>,
        endpoint: Option<&str>,
    ) -> Result<Self, CommonError> {
        let region = region.into();
        let endpoint = match endpoint {
            Some(url) => url.to_string(),
            None => regional_endpoint(signing_name, &region),
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|err| CommonError::config_field("aws.endpoint_url", err.to_string()))?;

        Ok(Self {
            http,
            signing_name,
            target_prefix,
            region,
            endpoint,
            credentials: AwsCredentials::resolve(),
        })
    }

    /// Replace the credentials read from the environment.
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Call `operation` with `body` and return the parsed response document.
    ///
    /// # Errors
    /// See [`AwsServiceError`].
    pub async fn call(&self, operation: &str, body: &Value) -> Result<Value, AwsServiceError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| AwsServiceError::MissingCredentials { operation: operation.to_string() })?;

        let payload = serde_json::to_vec(body)
            .map_err(|err| CommonError::serialization_format("json", err.to_string()))?;
        let amz_target = format!("{}.{operation}", self.target_prefix);
        let host = self.host_header();

        let params = SigningParams {
            service: self.signing_name,
            region: &self.region,
            host: &host,
            content_type: JSON_1_1,
            amz_target: &amz_target,
        };
        let signed = sigv4::sign(credentials, &params, &payload, Utc::now())?;

        let mut request = self
            .http
            .request(Method::POST, self.endpoint.clone())
            .header(CONTENT_TYPE, JSON_1_1)
            .header("x-amz-target", &amz_target)
            .header("x-amz-date", &signed.amz_date)
            .header("authorization", &signed.authorization)
            .body(payload);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        debug!(service = self.signing_name, operation, region = %self.region, "calling AWS");
        let response = self
            .http
            .send(request)
            .await
            .map_err(|err| CommonError::backend(self.signing_name, err.to_string(), true))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| CommonError::backend(self.signing_name, err.to_string(), true))?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|err| {
                CommonError::serialization_format("json", format!("{operation} response: {err}")).into()
            });
        }

        Err(service_error(operation, status, &text))
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

fn service_error(operation: &str, status: StatusCode, body: &str) -> AwsServiceError {
    let document = serde_json::from_str::<ErrorDocument>(body).unwrap_or(ErrorDocument {
        code: String::new(),
        message: body.chars().take(256).collect(),
    });
    let code = if document.code.is_empty() {
        status.canonical_reason().unwrap_or("UnknownError").replace(' ', "")
    } else {
        document.code
    };

    AwsServiceError::Service {
        operation: operation.to_string(),
        status: status.as_u16(),
        code,
        message: document.message,
    }
}
