//! Run-scoped memoization for provider lookups.
//!
//! Many checks in one category need the same expensive listing (every
//! broker, every distribution, every bucket policy). [`RunCache`] lets the
//! first check that asks pay for the fetch and hands the memoized value to
//! everyone else for the rest of the target traversal.
//!
//! # Guarantees
//!
//! - **Single-flight**: for a given key the compute future runs at most once
//!   per cache instance, including when several tasks ask concurrently. Late
//!   callers wait for the in-flight computation instead of starting another.
//! - **Empty is a value**: an empty listing is memoized like any other result.
//! - **Failures are not memoized**: a failed computation leaves the key
//!   vacant so the next caller retries.
//! - **Scoped**: instances are created per target and dropped afterwards;
//!   nothing is shared across targets or runs.
//!
//! # Example
//!
//! ```
//! use sentinel_common::cache::RunCache;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = RunCache::new("123456789012/us-east-1");
//!
//! let brokers = cache
//!     .get_or_compute("list-brokers", || async {
//!         Ok::<_, std::io::Error>(vec!["broker-a".to_string()])
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(brokers.len(), 1);
//! assert_eq!(cache.stats().computations, 1);
//! # }
//! ```

mod run_cache;
mod stats;

// Re-export public API
pub use run_cache::{CacheError, RunCache};
pub use stats::CacheStats;
