//! Configuration loading
//!
//! Loads [`SentinelConfig`](sentinel_domain::SentinelConfig) from a TOML or
//! JSON file and applies environment overrides.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, load, load_from_file, load_from_str, search_config_paths, ConfigFormat,
};
