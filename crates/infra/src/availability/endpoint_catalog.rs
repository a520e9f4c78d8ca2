//! Endpoint catalog
//!
//! Parses botocore's `endpoints.json` once per run and answers whether a
//! service has an endpoint in a partition and region. Category names are
//! matched against catalog service names after a few aliases, and services
//! that expose a global pseudo-region count as available everywhere in
//! their partition.

use std::collections::{BTreeMap, HashMap, HashSet};

use reqwest::Method;
use sentinel_core::ServiceAvailability;
use sentinel_domain::{RunContext, SentinelError};
use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::InfraError;
use crate::http::HttpClient;

/// Published location of the catalog.
pub const BOTOCORE_ENDPOINTS_URL: &str =
    "https://raw.githubusercontent.com/boto/botocore/develop/botocore/data/endpoints.json";

const GLOBAL_PSEUDO_REGIONS: &[&str] = &[
    "aws-global",
    "fips-aws-global",
    "aws-cn-global",
    "aws-us-gov-global",
    "aws-us-gov-global-fips",
    "iam-govcloud",
    "iam-govcloud-fips",
    "aws-iso-global",
    "aws-iso-b-global",
    "aws-iso-e-global",
];

// FIS is missing from the catalog.
const FIS_REGIONS: &[&str] = &[
    "us-east-2", "us-east-1", "us-west-2", "us-west-1", "af-south-1", "ap-east-1", "ap-south-1",
    "ap-northeast-2", "ap-southeast-1", "ap-southeast-2", "ap-northeast-1", "ca-central-1",
    "eu-central-1", "eu-west-1", "eu-west-2", "eu-south-1", "eu-west-3", "eu-north-1",
    "me-south-1", "sa-east-1", "us-gov-east-1", "us-gov-west-1",
];

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    partitions: Vec<PartitionDocument>,
}

#[derive(Debug, Deserialize)]
struct PartitionDocument {
    partition: String,
    #[serde(default)]
    services: BTreeMap<String, ServiceDocument>,
}

#[derive(Debug, Deserialize)]
struct ServiceDocument {
    #[serde(default)]
    endpoints: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Clone)]
struct ServiceEndpoints {
    regions: HashSet<String>,
    global: bool,
}

/// Service → regions index per partition.
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    partitions: HashMap<String, HashMap<String, ServiceEndpoints>>,
}

impl EndpointCatalog {
    /// Parse an `endpoints.json` document.
    ///
    /// # Errors
    /// `SentinelError::Config` if the document does not have the expected
    /// shape.
    pub fn from_json(json: &str) -> Result<Self, SentinelError> {
        let document: CatalogDocument = serde_json::from_str(json).map_err(InfraError::from)?;

        let mut partitions = HashMap::new();
        for partition in document.partitions {
            let mut services: HashMap<String, ServiceEndpoints> = HashMap::new();
            for (name, service) in partition.services {
                let name = name.strip_prefix("api.").unwrap_or(&name).to_string();
                let entry = services.entry(name).or_default();
                for region in service.endpoints.into_keys() {
                    entry.global |= GLOBAL_PSEUDO_REGIONS.contains(&region.as_str());
                    entry.regions.insert(region);
                }
            }
            partitions.insert(partition.partition, services);
        }

        Ok(Self { partitions })
    }

    /// Download and parse the catalog from `url`.
    ///
    /// # Errors
    /// `SentinelError::Network` on transport failure, an error mapped from the
    /// status for non-success responses, `SentinelError::Config` if the body
    /// is not a catalog.
    pub async fn fetch(http: &HttpClient, url: &str) -> Result<Self, SentinelError> {
        let response = http.send(http.request(Method::GET, url)).await?;
        let response = response.error_for_status().map_err(InfraError::from)?;
        let body = response.text().await.map_err(InfraError::from)?;

        let catalog = Self::from_json(&body)?;
        info!(partitions = catalog.partitions.len(), "endpoint catalog loaded");
        Ok(catalog)
    }

    /// Whether `service` has an endpoint in `partition`/`region`.
    pub fn is_service_available(&self, partition: &str, service: &str, region: &str) -> bool {
        let service = match service {
            "globalaccelerator" => "iam",
            "imagebuilder" => "ec2",
            "elasticloadbalancingv2" => "elasticloadbalancing",
            "fis" => return FIS_REGIONS.contains(&region),
            other => other,
        };

        let Some(endpoints) = self.partitions.get(partition).and_then(|services| services.get(service))
        else {
            debug!(partition, service, "service not in endpoint catalog");
            return false;
        };

        endpoints.global || endpoints.regions.contains(region)
    }

    /// Number of partitions in the catalog.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

impl ServiceAvailability for EndpointCatalog {
    /// Non-AWS targets are not described by the catalog and always pass.
    fn is_available(&self, category: &str, target: &RunContext) -> bool {
        match target.aws_partition() {
            Some(partition) => self.is_service_available(partition.as_str(), category, target.region()),
            None => true,
        }
    }
}
