//! Dynamic Kubernetes client addressing custom resources through their binding

use crate::binding::CrdBinding;
use crate::id::ResourceId;
use crate::Result;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PropagationPolicy};
use serde_json::Value;
use tracing::debug;

/// Thin wrapper over `kube::Client` doing GET, server-side apply and DELETE
/// on any bound custom resource
#[derive(Clone)]
pub struct DynamicClient {
    client: kube::Client,
}

impl DynamicClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    pub fn inner(&self) -> &kube::Client {
        &self.client
    }

    fn api(&self, binding: &CrdBinding, id: &ResourceId) -> Api<DynamicObject> {
        let resource = binding.api_resource();
        match (&id.namespace, binding.namespaced) {
            (Some(namespace), true) => Api::namespaced_with(self.client.clone(), namespace, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }

    /// Fetch an object; `None` when it does not exist
    pub async fn get(&self, binding: &CrdBinding, id: &ResourceId) -> Result<Option<Value>> {
        debug!("GET {} {}", binding.gvk, id);
        let object = self.api(binding, id).get_opt(&id.name).await?;
        object.map(serde_json::to_value).transpose().map_err(Into::into)
    }

    /// Server-side apply `object` as `field_manager`
    pub async fn apply(
        &self,
        binding: &CrdBinding,
        id: &ResourceId,
        object: &Value,
        field_manager: &str,
        force: bool,
    ) -> Result<Value> {
        debug!(
            "PATCH (apply) {} {} as {} (force: {})",
            binding.gvk, id, field_manager, force
        );
        let mut params = PatchParams::apply(field_manager);
        if force {
            params = params.force();
        }
        let applied = self
            .api(binding, id)
            .patch(&id.name, &params, &Patch::Apply(object))
            .await?;
        Ok(serde_json::to_value(applied)?)
    }

    /// Delete an object; `false` when it was already gone
    pub async fn delete(
        &self,
        binding: &CrdBinding,
        id: &ResourceId,
        propagation: Option<PropagationPolicy>,
    ) -> Result<bool> {
        debug!("DELETE {} {} (propagation: {:?})", binding.gvk, id, propagation);
        let params = DeleteParams {
            propagation_policy: propagation,
            ..DeleteParams::default()
        };
        match self.api(binding, id).delete(&id.name, &params).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(resp)) if resp.code == 404 => {
                debug!("{} {} was already deleted", binding.gvk, id);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse a `deletion_propagation` value
pub fn propagation_policy(value: &str) -> Option<PropagationPolicy> {
    match value {
        "Orphan" => Some(PropagationPolicy::Orphan),
        "Background" => Some(PropagationPolicy::Background),
        "Foreground" => Some(PropagationPolicy::Foreground),
        _ => None,
    }
}
