//! HTTP plumbing shared by the AWS backends and the endpoint catalog.

mod client;

pub use client::{HttpClient, HttpClientBuilder};
