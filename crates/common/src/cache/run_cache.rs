//! Single-flight, type-erased memoization scoped to one target traversal.

use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use moka::future::Cache;
use thiserror::Error;

use super::stats::{CacheStats, MetricsCollector};

/// Type-erased memoized value.
type Slot = Arc<dyn Any + Send + Sync>;

/// Errors returned by [`RunCache::get_or_compute`].
#[derive(Debug, Error)]
pub enum CacheError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The compute future for `key` failed. The key stays vacant.
    #[error("computing cache entry '{key}' failed: {source}")]
    Compute {
        key: String,
        #[source]
        source: Arc<E>,
    },

    /// A value already memoized under `key` has a different type.
    #[error("cache entry '{key}' does not hold a value of type {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Memoizes expensive provider calls for the duration of one target run.
///
/// Cloning is cheap and yields a handle to the same entries; the orchestrator
/// hands a clone to every check of the target and drops the last handle once
/// the target completes.
#[derive(Clone)]
pub struct RunCache {
    entries: Cache<String, Slot>,
    metrics: MetricsCollector,
    scope: Arc<str>,
}

impl RunCache {
    /// Creates an empty cache. `scope` labels log events (usually the target).
    pub fn new(scope: impl Into<Arc<str>>) -> Self {
        Self { entries: Cache::builder().build(), metrics: MetricsCollector::new(), scope: scope.into() }
    }

    /// Returns the memoized value for `key`, computing it once if vacant.
    ///
    /// Concurrent callers for the same vacant key share one computation: the
    /// first caller runs `compute`, the others await its result. A failing
    /// computation is reported to the caller and not stored.
    ///
    /// # Errors
    /// [`CacheError::Compute`] when `compute` fails, and
    /// [`CacheError::TypeMismatch`] when `key` already holds another type.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
    ) -> Result<Arc<T>, CacheError<E>>
    where
        T: Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let metrics = self.metrics.clone();
        let scope = Arc::clone(&self.scope);
        let owned_key = key.to_owned();

        let init = async move {
            metrics.record_computation();
            tracing::debug!(scope = %scope, key = %owned_key, "computing run cache entry");
            match compute().await {
                Ok(value) => Ok(Arc::new(value) as Slot),
                Err(err) => {
                    metrics.record_failure();
                    Err(err)
                }
            }
        };

        let entry = match self.entries.entry(key.to_owned()).or_try_insert_with(init).await {
            Ok(entry) => entry,
            Err(source) => {
                self.metrics.record_miss();
                return Err(CacheError::Compute { key: key.to_owned(), source });
            }
        };

        if entry.is_fresh() {
            self.metrics.record_miss();
        } else {
            self.metrics.record_hit();
        }

        entry.into_value().downcast::<T>().map_err(|_| CacheError::TypeMismatch {
            key: key.to_owned(),
            expected: type_name::<T>(),
        })
    }

    /// Whether `key` currently holds a memoized value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of memoized keys.
    pub fn len(&self) -> u64 {
        self.metrics.snapshot().entries
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label this cache was created with.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }
}

impl fmt::Debug for RunCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCache").field("scope", &self.scope).field("stats", &self.stats()).finish()
    }
}
