//! Read-only lookups of existing custom resources

use crate::binding::{CrdBinding, Surface};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::provider::ProviderData;
use crate::resource::Response;
use crate::schema::Schema;
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct CrdDataSource {
    binding: Arc<CrdBinding>,
    schema: Arc<Schema>,
    data: Arc<ProviderData>,
}

impl CrdDataSource {
    pub fn new(binding: Arc<CrdBinding>, data: Arc<ProviderData>) -> Self {
        Self {
            schema: Arc::new(binding.data_source_schema()),
            binding,
            data,
        }
    }

    pub fn type_name(&self) -> String {
        self.binding.type_name()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Look up the object named by `config.metadata`
    pub async fn read(&self, config: &Value) -> Response {
        let diagnostics = self.schema.validate_value(config);
        if diagnostics.has_error() {
            return Response::from_diagnostics(diagnostics);
        }

        match self.try_read(config).await {
            Ok(Some(state)) => Response::ok(state),
            Ok(None) => {
                let id = self
                    .binding
                    .resource_id(config)
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                Response::from_diagnostics(Diagnostics::from_iter([Diagnostic::error(
                    "Unable to find resource",
                    format!("{} {} does not exist", self.binding.gvk, id),
                )
                .at("metadata.name")]))
            }
            Err(e) => e.into(),
        }
    }

    async fn try_read(&self, config: &Value) -> Result<Option<Value>> {
        let client = self.data.client()?;
        let id = self.binding.resource_id(config)?;

        let Some(object) = client.get(&self.binding, &id).await? else {
            return Ok(None);
        };
        debug!("Read {} {}", self.binding.gvk, id);

        let mut state = self.binding.object_state(&object, Surface::DataSource)?;
        state["id"] = json!(id.to_string());
        state["api_version"] = json!(self.binding.gvk.api_version());
        state["kind"] = json!(self.binding.gvk.kind);
        Ok(Some(state))
    }
}
