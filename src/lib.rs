//! Terraform-style provider exposing Kubernetes custom resources.
//!
//! Every served version of a bound CRD becomes three types:
//!
//! - a managed resource (`k8s_<group>_<kind>_<version>`) applied with
//!   server-side apply,
//! - a data source of the same name reading an existing object,
//! - a manifest data source (`..._manifest`) rendering the object as YAML.
//!
//! Attribute schemas are generated from the CRD's OpenAPI v3 schema.
//!
//! # Examples
//!
//! ## Managing a resource
//!
//! ```rust
//! use k8s_crd_provider::fake::FakeCluster;
//! use k8s_crd_provider::Provider;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cluster = FakeCluster::new();
//! let provider = Provider::builder().with_client(cluster.client()).build()?;
//! let vpc = provider.resource("k8s_ec2_services_k8s_aws_vpc_v1alpha1")?;
//!
//! let config = json!({
//!     "metadata": {"name": "main", "namespace": "default"},
//!     "spec": {"cidr_blocks": ["10.0.0.0/16"]}
//! });
//! let plan = vpc.plan(None, &config);
//! let created = vpc.create(plan.planned_state.as_ref().unwrap()).await;
//!
//! assert!(!created.has_error());
//! assert_eq!(created.state.unwrap()["id"], "default/main");
//! # Ok(())
//! # }
//! ```
//!
//! ## Rendering a manifest
//!
//! ```rust
//! use k8s_crd_provider::Provider;
//! use serde_json::json;
//!
//! let provider = Provider::builder().build().unwrap();
//! let manifest = provider
//!     .manifest("k8s_nfd_k8s_sigs_io_node_feature_rule_v1alpha1_manifest")
//!     .unwrap();
//!
//! let response = manifest.read(&json!({
//!     "metadata": {"name": "gpu"},
//!     "spec": {"rules": [{"name": "gpu", "labels": {"gpu": "true"}}]}
//! }));
//! let yaml = response.state.unwrap()["yaml"].as_str().unwrap().to_string();
//! assert!(yaml.contains("kind: NodeFeatureRule"));
//! ```

pub mod binding;
pub mod client;
pub mod convert;
pub mod crds;
pub mod data_source;
pub mod diagnostics;
pub mod docs;
mod error;
pub mod fake;
pub mod gvk;
pub mod id;
pub mod jsonpath;
pub mod manifest;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod validator;
pub mod wait;

#[cfg(test)]
mod manifest_test;
#[cfg(test)]
mod resource_test;
#[cfg(test)]
mod schema_test;

pub use binding::CrdBinding;
pub use data_source::CrdDataSource;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, Result};
pub use kube::Client;
pub use manifest::CrdManifest;
pub use provider::{Provider, ProviderBuilder, ProviderConfig};
pub use resource::{CrdResource, PlanResponse, Response};
