//! Shared helpers for `sentinel-infra` integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use sentinel_domain::AwsConfig;
use sentinel_infra::aws::AwsCredentials;
use tempfile::TempDir;
use wiremock::MockServer;

/// AWS settings pointing every backend at `server`.
pub fn aws_config(server: &MockServer) -> AwsConfig {
    AwsConfig {
        region: "us-east-1".to_string(),
        endpoint_url: Some(server.uri()),
        request_timeout_secs: 5,
    }
}

/// Fixed test credentials, so tests never depend on the environment.
pub fn test_credentials() -> AwsCredentials {
    AwsCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY")
}

/// Config file written into its own temporary directory.
pub struct TempConfig {
    pub path: PathBuf,
    _dir: TempDir,
}

impl TempConfig {
    pub fn new(file_name: &str, contents: &str) -> Self {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join(file_name);
        let mut file = std::fs::File::create(&path).expect("config file should be created");
        file.write_all(contents.as_bytes()).expect("config file should be written");
        Self { path, _dir: dir }
    }
}
