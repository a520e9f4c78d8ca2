//! Observability infrastructure
//!
//! Structured logging through `tracing`. Every crate emits events with named
//! fields; this module installs the subscriber that formats them.

pub mod logging;

pub use logging::init_logging;
