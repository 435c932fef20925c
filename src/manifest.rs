//! Manifest data sources: render configuration as a Kubernetes YAML manifest
//! without talking to the cluster

use crate::binding::{CrdBinding, Surface};
use crate::convert;
use crate::resource::Response;
use crate::schema::Schema;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct CrdManifest {
    binding: Arc<CrdBinding>,
    schema: Arc<Schema>,
}

impl CrdManifest {
    pub fn new(binding: Arc<CrdBinding>) -> Self {
        Self {
            schema: Arc::new(binding.manifest_schema()),
            binding,
        }
    }

    pub fn type_name(&self) -> String {
        self.binding.manifest_type_name()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn read(&self, config: &Value) -> Response {
        let diagnostics = self.schema.validate_value(config);
        if diagnostics.has_error() {
            return Response::from_diagnostics(diagnostics);
        }
        self.render(config).into()
    }

    fn render(&self, config: &Value) -> Result<Value> {
        let (id, object) = self.binding.build_object(config, Surface::Manifest)?;
        let yaml = serde_yaml::to_string(&object)?;

        let mut state = convert::normalize(&self.schema.attributes, config);
        state["id"] = json!(id.to_string());
        state["yaml"] = json!(yaml);
        Ok(state)
    }
}
