//! Service availability backed by the provider endpoint catalog.

mod endpoint_catalog;

pub use endpoint_catalog::{EndpointCatalog, BOTOCORE_ENDPOINTS_URL};
