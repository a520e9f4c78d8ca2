//! AWS credentials for signing secret backend requests.
//!
//! Looked up in order: the `AWS_*` environment variables, then the profile
//! named by `AWS_PROFILE` (or `default`) in the shared credentials file
//! (`AWS_SHARED_CREDENTIALS_FILE`, else `~/.aws/credentials`). Instance
//! roles and SSO profiles are not consulted.

use std::fmt;
use std::path::{Path, PathBuf};

use sentinel_domain::SecureString;
use tracing::debug;

const ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
const SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
const SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
const PROFILE: &str = "AWS_PROFILE";
const SHARED_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";
const DEFAULT_PROFILE: &str = "default";

/// Static AWS credentials used to sign requests.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecureString,
    pub session_token: Option<SecureString>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecureString::new(secret_access_key),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(SecureString::new(token));
        self
    }

    /// Read `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
    /// `AWS_SESSION_TOKEN`. `None` when either key is missing or blank.
    pub fn from_env() -> Option<Self> {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let credentials = Self::new(read(ACCESS_KEY_ID)?, read(SECRET_ACCESS_KEY)?);
        Some(match read(SESSION_TOKEN) {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        })
    }

    /// Environment first, then the shared credentials file.
    pub fn resolve() -> Option<Self> {
        if let Some(credentials) = Self::from_env() {
            return Some(credentials);
        }
        let path = shared_credentials_path()?;
        let profile = std::env::var(PROFILE)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        let credentials = Self::from_profile_file(&path, &profile);
        if credentials.is_some() {
            debug!(profile = %profile, path = %path.display(), "AWS credentials loaded from profile");
        }
        credentials
    }

    /// Read `profile` from a shared credentials file. `None` when the file
    /// is unreadable or the profile lacks either key.
    pub fn from_profile_file(path: &Path, profile: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        Self::from_profile_str(&contents, profile)
    }

    fn from_profile_str(contents: &str, profile: &str) -> Option<Self> {
        let mut in_profile = false;
        let (mut key_id, mut secret, mut token) = (None, None, None);

        for line in contents.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_profile = section.trim() == profile;
                continue;
            }
            if !in_profile {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().to_string();
                match key.trim().to_ascii_lowercase().as_str() {
                    "aws_access_key_id" => key_id = Some(value),
                    "aws_secret_access_key" => secret = Some(value),
                    "aws_session_token" => token = Some(value),
                    _ => {}
                }
            }
        }

        let nonblank = |v: Option<String>| v.filter(|v| !v.is_empty());
        let credentials = Self::new(nonblank(key_id)?, nonblank(secret)?);
        Some(match nonblank(token) {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        })
    }
}

fn shared_credentials_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(SHARED_CREDENTIALS_FILE).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    Some(PathBuf::from(home).join(".aws").join("credentials"))
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key)
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}
