//! Finding sink port
//!
//! Delivery to a findings database or alerting system lives outside the
//! engine. A sink failure is logged and counted; it never aborts the run.

use async_trait::async_trait;
use parking_lot::Mutex;
use sentinel_domain::{Finding, SentinelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink rejected finding '{id}': {message}")]
    Rejected { id: String, message: String },

    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<SinkError> for SentinelError {
    fn from(err: SinkError) -> Self {
        SentinelError::Sink(err.to_string())
    }
}

/// Downstream consumer of canonical findings.
#[async_trait]
pub trait FindingSink: Send + Sync {
    /// Deliver one finding.
    async fn deliver(&self, finding: Finding) -> Result<(), SinkError>;

    /// Called once after the last target completes.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Sink that keeps findings in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    findings: Mutex<Vec<Finding>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything delivered so far, in delivery order.
    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().clone()
    }

    /// Ids of everything delivered so far, in delivery order.
    pub fn ids(&self) -> Vec<String> {
        self.findings.lock().iter().map(|finding| finding.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.lock().is_empty()
    }

    /// Remove and return everything delivered so far.
    pub fn drain(&self) -> Vec<Finding> {
        std::mem::take(&mut *self.findings.lock())
    }
}

#[async_trait]
impl FindingSink for MemorySink {
    async fn deliver(&self, finding: Finding) -> Result<(), SinkError> {
        self.findings.lock().push(finding);
        Ok(())
    }
}
