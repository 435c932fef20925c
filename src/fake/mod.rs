//! In-memory Kubernetes API server for exercising the provider without a cluster
//!
//! [`FakeCluster::client`] returns a real `kube::Client` whose requests are
//! answered from memory, so the provider's dynamic client runs unchanged.
//!
//! ```rust
//! use k8s_crd_provider::fake::FakeCluster;
//! use k8s_crd_provider::gvk::GVR;
//! use serde_json::json;
//!
//! let cluster = FakeCluster::new();
//! let gvr = GVR::new("ec2.services.k8s.aws", "v1alpha1", "vpcs");
//! cluster
//!     .add(&gvr, "default", json!({
//!         "apiVersion": "ec2.services.k8s.aws/v1alpha1",
//!         "kind": "VPC",
//!         "metadata": {"name": "main"},
//!         "spec": {"cidrBlocks": ["10.0.0.0/16"]}
//!     }))
//!     .unwrap();
//! assert!(cluster.get(&gvr, "default", "main").is_ok());
//! ```

mod service;
mod store;

#[cfg(test)]
mod service_test;

pub use service::FakeApiServer;
pub use store::ObjectStore;

use crate::gvk::GVR;
use crate::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Handle to an in-memory cluster; clones share the same objects
#[derive(Clone, Default)]
pub struct FakeCluster {
    store: Arc<ObjectStore>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A `kube::Client` backed by this cluster
    pub fn client(&self) -> kube::Client {
        kube::Client::new(FakeApiServer::new(Arc::clone(&self.store)), "default")
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Seed an object, e.g. one created outside Terraform
    pub fn add(&self, gvr: &GVR, namespace: &str, object: Value) -> Result<Value> {
        self.store.add(gvr, namespace, object)
    }

    /// Builder-style [`FakeCluster::add`]
    pub fn with_object(self, gvr: &GVR, namespace: &str, object: Value) -> Result<Self> {
        self.store.add(gvr, namespace, object)?;
        Ok(self)
    }

    /// Seed every document of a multi-document YAML fixture.
    ///
    /// The resource of each document is derived from its kind with
    /// [`crate::gvk::pluralize`].
    pub fn load_fixture(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Internal(format!("Failed to read fixture file {:?}: {}", path, e))
        })?;

        for document in serde_yaml::Deserializer::from_str(&content) {
            let object = Value::deserialize(document)?;
            if object.is_null() {
                continue;
            }
            let gvk = crate::gvk::extract_gvk(&object)?;
            let gvr = GVR::new(&gvk.group, &gvk.version, crate::gvk::pluralize(&gvk.kind));
            let namespace = object
                .pointer("/metadata/namespace")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            self.store.add(&gvr, &namespace, object)?;
        }
        debug!("Loaded fixture {:?}", path);
        Ok(self)
    }

    pub fn get(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        self.store.get(gvr, namespace, name)
    }

    /// Merge `status` into the status stanza, as a controller would
    pub fn set_status(&self, gvr: &GVR, namespace: &str, name: &str, status: Value) -> Result<Value> {
        self.store
            .merge_patch(gvr, namespace, name, &serde_json::json!({ "status": status }), true)
    }

    /// Merge patch an object outside of server-side apply
    pub fn patch(&self, gvr: &GVR, namespace: &str, name: &str, patch: &Value) -> Result<Value> {
        self.store.merge_patch(gvr, namespace, name, patch, false)
    }
}
