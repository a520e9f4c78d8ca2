//! AWS Signature Version 4 for JSON-protocol POST requests.
//!
//! Requests are always `POST /` without a query string, so only the header
//! and payload parts of the canonical request vary.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sentinel_common::CommonError;
use sha2::{Digest, Sha256};

use super::AwsCredentials;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// Headers to attach to a signed request, lower-case names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub amz_date: String,
    pub security_token: Option<String>,
}

/// What is being signed.
#[derive(Debug, Clone, Copy)]
pub struct SigningParams<'a> {
    pub service: &'a str,
    pub region: &'a str,
    pub host: &'a str,
    pub content_type: &'a str,
    pub amz_target: &'a str,
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CommonError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| CommonError::internal(format!("HMAC key rejected: {err}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Derive the signing key for `date` (`YYYYMMDD`), region and service.
pub fn signing_key(
    secret_access_key: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, CommonError> {
    let k_date = hmac(format!("AWS4{secret_access_key}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

/// Sign a `POST /` request carrying `payload`.
pub fn sign(
    credentials: &AwsCredentials,
    params: &SigningParams<'_>,
    payload: &[u8],
    now: DateTime<Utc>,
) -> Result<SignedHeaders, CommonError> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let security_token = credentials.session_token.as_ref().map(|t| t.expose().to_string());

    let mut headers: Vec<(&str, &str)> = vec![
        ("content-type", params.content_type),
        ("host", params.host),
        ("x-amz-date", amz_date.as_str()),
        ("x-amz-target", params.amz_target),
    ];
    if let Some(token) = &security_token {
        headers.push(("x-amz-security-token", token.as_str()));
    }
    headers.sort_by_key(|(name, _)| *name);

    let canonical_headers: String =
        headers.iter().map(|(name, value)| format!("{name}:{}\n", value.trim())).collect();
    let signed_headers = headers.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "POST\n/\n\n{canonical_headers}\n{signed_headers}\n{}",
        sha256_hex(payload)
    );

    let scope = format!("{date}/{}/{}/aws4_request", params.region, params.service);
    let string_to_sign =
        format!("{ALGORITHM}\n{amz_date}\n{scope}\n{}", sha256_hex(canonical_request.as_bytes()));

    let key = signing_key(
        credentials.secret_access_key.expose(),
        &date,
        params.region,
        params.service,
    )?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );

    Ok(SignedHeaders { authorization, amz_date, security_token })
}
