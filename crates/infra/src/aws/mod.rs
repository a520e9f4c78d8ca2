//! AWS JSON-1.1 protocol plumbing for the secret backends.
//!
//! Only what the backends need: environment credentials, SigV4 request
//! signing and a small client posting `X-Amz-Target` operations.

mod client;
mod credentials;
pub mod sigv4;

pub use client::{AwsJsonClient, AwsServiceError};
pub use credentials::AwsCredentials;

use sentinel_domain::Partition;

/// DNS suffix of regional endpoints in `partition`.
pub const fn dns_suffix(partition: Partition) -> &'static str {
    match partition {
        Partition::Aws | Partition::AwsUsGov => "amazonaws.com",
        Partition::AwsCn => "amazonaws.com.cn",
        Partition::AwsIso => "c2s.ic.gov",
        Partition::AwsIsoB => "sc2s.sgov.gov",
        Partition::AwsIsoE => "cloud.adc-e.uk",
    }
}

/// Default endpoint of `service` in `region`.
pub fn regional_endpoint(service: &str, region: &str) -> String {
    format!("https://{service}.{region}.{}", dns_suffix(Partition::from_region(region)))
}
