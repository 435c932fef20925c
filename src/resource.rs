//! Managed resources: plan, create, read, update, delete and import
//!
//! State is a JSON object keyed by attribute name with every root attribute
//! of [`CrdBinding::resource_schema`] present. Operations never return a bare
//! error; failures are reported through [`Response::diagnostics`].

use crate::binding::{CrdBinding, Surface};
use crate::client::propagation_policy;
use crate::convert;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::id::ResourceId;
use crate::provider::ProviderData;
use crate::schema::openapi::Target;
use crate::schema::{AttributeType, Attributes, Schema};
use crate::wait;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of an operation: the new state (`None` when there is none) and
/// the diagnostics raised along the way
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}

impl Response {
    pub fn ok(state: Value) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn from_diagnostics(diagnostics: Diagnostics) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics.has_error()
    }
}

impl From<Error> for Response {
    fn from(err: Error) -> Self {
        Self::from_diagnostics(err.into())
    }
}

impl From<Result<Value>> for Response {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(state) => Self::ok(state),
            Err(e) => e.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanResponse {
    pub planned_state: Option<Value>,
    /// Attribute paths whose change forces the object to be replaced
    pub requires_replace: Vec<String>,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct CrdResource {
    binding: Arc<CrdBinding>,
    schema: Arc<Schema>,
    data: Arc<ProviderData>,
}

impl CrdResource {
    pub fn new(binding: Arc<CrdBinding>, data: Arc<ProviderData>) -> Self {
        Self {
            schema: Arc::new(binding.resource_schema()),
            binding,
            data,
        }
    }

    pub fn type_name(&self) -> String {
        self.binding.type_name()
    }

    pub fn binding(&self) -> &CrdBinding {
        &self.binding
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate user configuration: required arguments, read-only attributes,
    /// attribute validators, `wait_for` expressions and durations
    pub fn validate_config(&self, config: &Value) -> Diagnostics {
        let mut diagnostics = self.schema.validate_value(config);
        if let Err(e) = wait::conditions_from_state(config) {
            diagnostics.push(e.into());
        }
        if let Err(e) = wait::delete_wait_from_state(config) {
            diagnostics.push(e.into());
        }
        diagnostics
    }

    /// Compute the planned state for `config`, given the prior state if the
    /// resource exists
    pub fn plan(&self, prior: Option<&Value>, config: &Value) -> PlanResponse {
        let diagnostics = self.validate_config(config);
        if diagnostics.has_error() {
            return PlanResponse {
                diagnostics,
                ..PlanResponse::default()
            };
        }

        let mut planned = self.complete(config);
        let id = match self.binding.resource_id(&planned) {
            Ok(id) => id,
            Err(e) => {
                return PlanResponse {
                    diagnostics: e.into(),
                    ..PlanResponse::default()
                }
            }
        };
        planned["id"] = json!(id.to_string());

        let requires_replace = match prior {
            Some(prior) => {
                let mut paths = Vec::new();
                replace_paths(&self.schema.attributes, prior, &planned, "", &mut paths);
                paths
            }
            None => Vec::new(),
        };

        PlanResponse {
            planned_state: Some(planned),
            requires_replace,
            diagnostics,
        }
    }

    pub async fn create(&self, plan: &Value) -> Response {
        self.apply(plan).await
    }

    pub async fn update(&self, prior: &Value, plan: &Value) -> Response {
        let mut paths = Vec::new();
        replace_paths(&self.schema.attributes, prior, plan, "", &mut paths);
        if !paths.is_empty() {
            let mut diagnostics = Diagnostics::new();
            for path in paths {
                diagnostics.push(
                    Diagnostic::error(
                        "Resource requires replacement",
                        format!("{path} cannot be changed in place; the object must be recreated"),
                    )
                    .at(path),
                );
            }
            return Response::from_diagnostics(diagnostics);
        }
        self.apply(plan).await
    }

    async fn apply(&self, plan: &Value) -> Response {
        let config = self.user_config(plan);
        let diagnostics = self.validate_config(&config);
        if diagnostics.has_error() {
            return Response::from_diagnostics(diagnostics);
        }

        let (id, applied, state) = match self.try_apply(&config).await {
            Ok(applied) => applied,
            Err(e) => {
                let mut response: Response = e.into();
                response.diagnostics.extend(diagnostics);
                return response;
            }
        };

        // applied objects keep their state even when waiting fails
        let ready = self.wait_until_ready(&id, &state, applied).await;
        let mut response = Response::ok(state);
        if let Err(e) = ready {
            warn!("{} {} was applied but is not ready: {}", self.binding.gvk, id, e);
            response.diagnostics.push(e.into());
        }
        response.diagnostics.extend(diagnostics);
        response
    }

    /// Apply the object; returns its ID, the object the server returned and
    /// the new state
    async fn try_apply(&self, config: &Value) -> Result<(ResourceId, Value, Value)> {
        let client = self.data.client()?;
        let planned = self.complete(config);
        let (id, object) = self.binding.build_object(&planned, Surface::Resource)?;

        if let Some(validator) = &self.data.validator {
            validator.validate(&self.binding.gvk, &object)?;
        }

        let field_manager = planned["field_manager"]
            .as_str()
            .unwrap_or(self.data.field_manager.as_str())
            .to_string();
        let force = planned["force_conflicts"].as_bool().unwrap_or(false);

        let applied = client
            .apply(&self.binding, &id, &object, &field_manager, force)
            .await?;
        debug!("Applied {} {}", self.binding.gvk, id);

        let mut state = planned;
        state["id"] = json!(id.to_string());
        Ok((id, applied, state))
    }

    async fn wait_until_ready(&self, id: &ResourceId, state: &Value, applied: Value) -> Result<()> {
        let client = self.data.client()?;
        let conditions = wait::conditions_from_state(state)?;
        wait::wait_for(client, &self.binding, id, &conditions, applied).await?;
        Ok(())
    }

    /// Refresh `state` from the cluster.
    ///
    /// An object that no longer exists is removed from state with a warning.
    pub async fn read(&self, state: &Value) -> Response {
        match self.try_read(state).await {
            Ok(Some(state)) => Response::ok(state),
            Ok(None) => {
                let id = state["id"].as_str().unwrap_or_default();
                warn!("{} {} no longer exists, removing from state", self.binding.gvk, id);
                let mut diagnostics = Diagnostics::new();
                diagnostics.add_warning(
                    "Resource not found",
                    format!(
                        "{} {} no longer exists and has been removed from state",
                        self.binding.gvk.kind, id
                    ),
                );
                Response::from_diagnostics(diagnostics)
            }
            Err(e) => e.into(),
        }
    }

    async fn try_read(&self, state: &Value) -> Result<Option<Value>> {
        let client = self.data.client()?;
        let id = self.state_id(state)?;

        let Some(object) = client.get(&self.binding, &id).await? else {
            return Ok(None);
        };

        let mut refreshed = self.complete(state);
        if let Value::Object(body) = convert::refresh(
            self.binding.body_attributes(Target::Configurable),
            state,
            &object,
        ) {
            refreshed
                .as_object_mut()
                .ok_or_else(|| Error::Internal("state is not an object".to_string()))?
                .extend(body);
        }
        refreshed["metadata"] = convert::refresh(
            &self.binding.metadata_attributes(Surface::Resource),
            &state["metadata"],
            object.get("metadata").unwrap_or(&Value::Null),
        );
        refreshed["id"] = json!(id.to_string());
        Ok(Some(refreshed))
    }

    pub async fn delete(&self, state: &Value) -> Response {
        match self.try_delete(state).await {
            Ok(()) => Response::default(),
            Err(e) => e.into(),
        }
    }

    async fn try_delete(&self, state: &Value) -> Result<()> {
        let client = self.data.client()?;
        let id = self.state_id(state)?;

        let propagation = match state["deletion_propagation"].as_str() {
            Some(policy) => Some(propagation_policy(policy).ok_or_else(|| {
                Error::invalid_attribute(
                    "deletion_propagation",
                    format!("unknown propagation policy {policy:?}"),
                )
            })?),
            None => None,
        };

        if !client.delete(&self.binding, &id, propagation).await? {
            return Ok(());
        }
        if let Some(wait) = wait::delete_wait_from_state(state)? {
            wait::wait_for_deletion(client, &self.binding, &id, wait).await?;
        }
        Ok(())
    }

    /// Import an existing object by its composite ID
    pub async fn import_state(&self, id: &str) -> Response {
        self.try_import(id).await.into()
    }

    async fn try_import(&self, id: &str) -> Result<Value> {
        let client = self.data.client()?;
        let id = ResourceId::parse(id, self.binding.namespaced)?;

        let object = client
            .get(&self.binding, &id)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: self.binding.gvk.kind.clone(),
                id: id.to_string(),
            })?;

        let mut state = self.complete(&self.binding.object_state(&object, Surface::Resource)?);
        state["id"] = json!(id.to_string());
        debug!("Imported {} {}", self.binding.gvk, id);
        Ok(state)
    }

    /// Every root attribute present, computed values filled in
    fn complete(&self, value: &Value) -> Value {
        let mut state: Map<String, Value> = self
            .schema
            .attributes
            .iter()
            .map(|(name, attribute)| {
                let value = value.get(name).unwrap_or(&Value::Null);
                (name.clone(), convert::normalize_value(&attribute.ty, value))
            })
            .collect();

        state.insert("api_version".to_string(), json!(self.binding.gvk.api_version()));
        state.insert("kind".to_string(), json!(self.binding.gvk.kind));
        if state["field_manager"].is_null() {
            state.insert("field_manager".to_string(), json!(self.data.field_manager));
        }
        if state["force_conflicts"].is_null() {
            state.insert("force_conflicts".to_string(), json!(false));
        }
        Value::Object(state)
    }

    /// A plan or state with the read-only root attributes removed
    fn user_config(&self, value: &Value) -> Value {
        Value::Object(
            self.schema
                .attributes
                .iter()
                .filter(|(_, attribute)| !attribute.is_read_only())
                .filter_map(|(name, _)| value.get(name).map(|v| (name.clone(), v.clone())))
                .collect(),
        )
    }

    fn state_id(&self, state: &Value) -> Result<ResourceId> {
        match state["id"].as_str() {
            Some(id) => ResourceId::parse(id, self.binding.namespaced),
            None => self.binding.resource_id(state),
        }
    }
}

/// Paths of `requires_replace` attributes whose value differs
fn replace_paths(
    attributes: &Attributes,
    prior: &Value,
    planned: &Value,
    prefix: &str,
    paths: &mut Vec<String>,
) {
    for (name, attribute) in attributes {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        let before = prior.get(name).unwrap_or(&Value::Null);
        let after = planned.get(name).unwrap_or(&Value::Null);

        if attribute.requires_replace && before != after {
            paths.push(path);
        } else if let AttributeType::Object { attributes } = &attribute.ty {
            replace_paths(attributes, before, after, &path, paths);
        }
    }
}
