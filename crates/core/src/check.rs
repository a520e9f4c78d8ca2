//! Check contract
//!
//! A check inspects one aspect of a target and yields zero or more raw
//! findings as a stream. The orchestrator drains the stream as it is
//! produced, so a check that fails midway keeps the findings it already
//! yielded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use sentinel_common::cache::{CacheError, RunCache};
use sentinel_common::{CommonError, ErrorClassification, ErrorSeverity};
use sentinel_domain::{RawFinding, RunContext, SecureString, SentinelError};
use thiserror::Error;

use crate::credentials::ResolvedCredentials;

/// Lazy sequence of raw findings produced by one check invocation.
pub type FindingStream = BoxStream<'static, Result<RawFinding, CheckError>>;

/// Errors that end a single check invocation.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("provider call '{operation}' failed: {message}")]
    Provider { operation: String, message: String },

    #[error("malformed response from '{operation}': {message}")]
    MalformedResponse { operation: String, message: String },

    #[error("pagination of '{operation}' failed: {message}")]
    Pagination { operation: String, message: String },

    #[error("cached fetch '{key}' failed: {source}")]
    CachedFetch {
        key: String,
        #[source]
        source: Arc<CheckError>,
    },

    #[error("run cache error: {0}")]
    Cache(String),

    #[error("run deadline exceeded")]
    DeadlineExceeded,

    #[error("check panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CheckError {
    pub fn provider(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { operation: operation.into(), message: message.into() }
    }

    pub fn malformed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse { operation: operation.into(), message: message.into() }
    }

    pub fn pagination(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pagination { operation: operation.into(), message: message.into() }
    }
}

impl ErrorClassification for CheckError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { .. } | Self::Pagination { .. } => true,
            Self::CachedFetch { source, .. } => source.is_retryable(),
            Self::Common(e) => e.is_retryable(),
            Self::MalformedResponse { .. }
            | Self::Cache(_)
            | Self::DeadlineExceeded
            | Self::Panicked(_)
            | Self::Other(_) => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::DeadlineExceeded => ErrorSeverity::Warning,
            Self::Panicked(_) => ErrorSeverity::Critical,
            Self::Common(e) => e.severity(),
            Self::CachedFetch { source, .. } => source.severity(),
            _ => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Common(e) => e.retry_after(),
            _ => None,
        }
    }
}

impl From<CheckError> for SentinelError {
    fn from(err: CheckError) -> Self {
        SentinelError::Check(err.to_string())
    }
}

/// Everything a check invocation may use.
///
/// Cheap to clone; the check moves it into the stream it returns.
#[derive(Debug, Clone)]
pub struct CheckContext {
    cache: RunCache,
    target: Arc<RunContext>,
    credentials: Arc<ResolvedCredentials>,
}

impl CheckContext {
    pub fn new(
        cache: RunCache,
        target: Arc<RunContext>,
        credentials: Arc<ResolvedCredentials>,
    ) -> Self {
        Self { cache, target, credentials }
    }

    /// Run cache of the current target.
    pub fn cache(&self) -> &RunCache {
        &self.cache
    }

    pub fn target(&self) -> &RunContext {
        &self.target
    }

    pub fn account_id(&self) -> &str {
        self.target.account_id()
    }

    pub fn region(&self) -> &str {
        self.target.region()
    }

    pub fn partition(&self) -> &str {
        self.target.partition()
    }

    pub fn credentials(&self) -> &ResolvedCredentials {
        &self.credentials
    }

    /// Value of an available credential. `None` means the check must skip
    /// whatever depends on it.
    pub fn credential(&self, name: &str) -> Option<&SecureString> {
        self.credentials.value(name)
    }

    /// Fetch through the run cache. Checks asking for the same `key` within
    /// one target share a single call of `fetch`.
    pub async fn cached<T, F, Fut>(&self, key: &str, fetch: F) -> Result<Arc<T>, CheckError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CheckError>>,
    {
        self.cache.get_or_compute(key, fetch).await.map_err(|err| match err {
            CacheError::Compute { key, source } => CheckError::CachedFetch { key, source },
            mismatch @ CacheError::TypeMismatch { .. } => CheckError::Cache(mismatch.to_string()),
        })
    }
}

/// A unit of audit logic.
pub trait AuditCheck: Send + Sync {
    /// Unique name within its category, e.g. `mq_broker_public_access_check`.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Start the check. Nothing should happen until the stream is polled.
    fn run(&self, ctx: CheckContext) -> FindingStream;
}

/// Stream the findings of a check that computes them all at once.
///
/// An error from `fut` becomes the single item of the stream.
pub fn findings_from<F>(fut: F) -> FindingStream
where
    F: Future<Output = Result<Vec<RawFinding>, CheckError>> + Send + 'static,
{
    stream::once(fut)
        .flat_map(|result| match result {
            Ok(findings) => stream::iter(findings.into_iter().map(Ok)).left_stream(),
            Err(err) => stream::iter(vec![Err(err)]).right_stream(),
        })
        .boxed()
}

/// Check backed by an async closure. Built by
/// [`CheckRegistry::register_fn`](crate::registry::CheckRegistry::register_fn).
pub(crate) struct FnCheck<F> {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) body: F,
}

impl<F, Fut> AuditCheck for FnCheck<F>
where
    F: Fn(CheckContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<RawFinding>, CheckError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn run(&self, ctx: CheckContext) -> FindingStream {
        findings_from((self.body)(ctx))
    }
}
