//! Binding of one CRD version to a resource, data source and manifest
//!
//! A [`CrdBinding`] carries everything the provider needs about a custom
//! resource: where it lives in the API, whether it is namespaced, and the
//! OpenAPI schema its attribute schemas are derived from.

use crate::convert;
use crate::gvk::{GVK, GVR};
use crate::id::ResourceId;
use crate::schema::openapi::{self, Target};
use crate::schema::{Attribute, AttributeType, Attributes, Schema, Validator};
use crate::{Error, Result};
use heck::ToSnakeCase;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    CustomResourceDefinition, JSONSchemaProps,
};
use kube::core::Resource;
use kube::discovery::ApiResource;
use kube::CustomResourceExt;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Root attribute names used by the provider itself; CRD fields that would
/// collide are renamed with a trailing `_`
pub const BOOKKEEPING_ATTRIBUTES: &[&str] = &[
    "api_version",
    "deletion_propagation",
    "field_manager",
    "force_conflicts",
    "id",
    "kind",
    "metadata",
    "wait_for",
    "wait_for_delete",
    "yaml",
];

pub const DELETION_PROPAGATION_POLICIES: &[&str] = &["Orphan", "Background", "Foreground"];

/// Which surface a schema is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Resource,
    DataSource,
    Manifest,
}

impl Surface {
    fn target(self) -> Target {
        match self {
            Surface::DataSource => Target::ReadOnly,
            Surface::Resource | Surface::Manifest => Target::Configurable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrdBinding {
    pub gvk: GVK,
    pub plural: String,
    pub namespaced: bool,
    pub description: Option<String>,
    /// Root OpenAPI v3 schema of this version
    pub schema: JSONSchemaProps,
    configurable: Attributes,
    read_only: Attributes,
}

impl CrdBinding {
    pub fn new(gvk: GVK, plural: impl Into<String>, namespaced: bool, schema: JSONSchemaProps) -> Self {
        let configurable = openapi::attributes_from_properties(
            &schema,
            Target::Configurable,
            &["apiVersion", "kind", "metadata", "status"],
            BOOKKEEPING_ATTRIBUTES,
        );
        let read_only = openapi::attributes_from_properties(
            &schema,
            Target::ReadOnly,
            &["apiVersion", "kind", "metadata"],
            BOOKKEEPING_ATTRIBUTES,
        );

        Self {
            description: schema.description.clone(),
            gvk,
            plural: plural.into(),
            namespaced,
            schema,
            configurable,
            read_only,
        }
    }

    /// Binding for one version of a CRD
    pub fn from_crd(crd: &CustomResourceDefinition, version: &str) -> Result<Self> {
        let spec = &crd.spec;
        let crd_version = spec
            .versions
            .iter()
            .find(|v| v.name == version)
            .ok_or_else(|| {
                Error::UnknownType(format!(
                    "{} has no version {}",
                    crd.metadata.name.as_deref().unwrap_or(&spec.names.plural),
                    version
                ))
            })?;

        let schema = crd_version
            .schema
            .as_ref()
            .and_then(|s| s.open_api_v3_schema.clone())
            .ok_or_else(|| {
                Error::Internal(format!(
                    "{}/{} {} has no OpenAPI v3 schema",
                    spec.group, version, spec.names.kind
                ))
            })?;

        let gvk = GVK::new(&spec.group, &crd_version.name, &spec.names.kind);
        debug!("Binding {} ({})", gvk, spec.names.plural);
        Ok(Self::new(gvk, &spec.names.plural, spec.scope == "Namespaced", schema))
    }

    /// One binding per served version
    pub fn all_from_crd(crd: &CustomResourceDefinition) -> Result<Vec<Self>> {
        crd.spec
            .versions
            .iter()
            .filter(|v| v.served)
            .map(|v| Self::from_crd(crd, &v.name))
            .collect()
    }

    /// Binding for a typed `#[derive(CustomResource)]` struct
    pub fn from_resource<K>() -> Result<Self>
    where
        K: CustomResourceExt + Resource<DynamicType = ()>,
    {
        Self::from_crd(&K::crd(), &K::version(&()))
    }

    /// `k8s_<group>_<kind>_<version>`, e.g. `k8s_ec2_services_k8s_aws_vpc_v1alpha1`
    pub fn type_name(&self) -> String {
        let kind = self.gvk.kind.to_snake_case();
        if self.gvk.group.is_empty() {
            format!("k8s_{}_{}", kind, self.gvk.version)
        } else {
            format!(
                "k8s_{}_{}_{}",
                self.gvk.group.replace(['.', '-'], "_"),
                kind,
                self.gvk.version
            )
        }
    }

    pub fn manifest_type_name(&self) -> String {
        format!("{}_manifest", self.type_name())
    }

    pub fn gvr(&self) -> GVR {
        GVR::new(&self.gvk.group, &self.gvk.version, &self.plural)
    }

    pub fn api_resource(&self) -> ApiResource {
        self.gvr().api_resource(&self.gvk)
    }

    /// Attributes converted from the CRD's root properties
    pub fn body_attributes(&self, target: Target) -> &Attributes {
        match target {
            Target::Configurable => &self.configurable,
            Target::ReadOnly => &self.read_only,
        }
    }

    pub fn metadata_attributes(&self, surface: Surface) -> Attributes {
        let mut attributes = Attributes::new();

        let mut name = Attribute::required_string()
            .with_description("Unique name of the object within its namespace or the cluster.")
            .with_validator(Validator::DnsSubdomain);
        if surface == Surface::Resource {
            name = name.requires_replace();
        }
        attributes.insert("name".to_string(), name);

        if self.namespaced {
            let mut namespace = Attribute::required_string()
                .with_description("Namespace the object lives in.")
                .with_validator(Validator::DnsLabel);
            if surface == Surface::Resource {
                namespace = namespace.requires_replace();
            }
            attributes.insert("namespace".to_string(), namespace);
        }

        let labels = Attribute::new(AttributeType::map(AttributeType::String))
            .with_description("Map of string keys and values used to organize and select objects.");
        let annotations = Attribute::new(AttributeType::map(AttributeType::String))
            .with_description("Map of string keys and values storing arbitrary non-identifying metadata.");

        let (labels, annotations) = match surface {
            Surface::DataSource => (labels.computed(), annotations.computed()),
            Surface::Resource | Surface::Manifest => (
                labels
                    .optional()
                    .with_validator(Validator::QualifiedKeys { check_values: true }),
                annotations
                    .optional()
                    .with_validator(Validator::QualifiedKeys { check_values: false }),
            ),
        };
        attributes.insert("labels".to_string(), labels);
        attributes.insert("annotations".to_string(), annotations);

        attributes
    }

    pub fn resource_schema(&self) -> Schema {
        let wait_for = Attribute::list_nested(Attributes::from([
            (
                "jsonpath".to_string(),
                Attribute::required_string()
                    .with_description("JSONPath expression evaluated against the object, e.g. `.status.state`."),
            ),
            (
                "value".to_string(),
                Attribute::required_string().with_description("Value the expression must render as."),
            ),
            (
                "timeout".to_string(),
                Attribute::optional_string().with_description("How long to wait, e.g. `30s` or `5m`. Defaults to `30s`."),
            ),
            (
                "poll_interval".to_string(),
                Attribute::optional_string().with_description("Time between polls. Defaults to `5s`."),
            ),
        ]))
        .optional()
        .with_description("Conditions the object must satisfy before create or update completes.");

        let wait_for_delete = Attribute::object(Attributes::from([
            (
                "timeout".to_string(),
                Attribute::optional_string().with_description("How long to wait for the object to disappear. Defaults to `30s`."),
            ),
            (
                "poll_interval".to_string(),
                Attribute::optional_string().with_description("Time between polls. Defaults to `5s`."),
            ),
        ]))
        .optional()
        .with_description("Wait until the object is gone from the API after delete.");

        let mut schema = Schema::new()
            .with_description(self.schema_description())
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(
                    "The ID of this resource: `namespace/name`, or `name` when cluster-scoped.",
                ),
            )
            .with_attribute(
                "api_version",
                Attribute::computed_string().with_description("The API group and version of the object."),
            )
            .with_attribute(
                "kind",
                Attribute::computed_string().with_description("The kind of the object."),
            )
            .with_attribute(
                "force_conflicts",
                Attribute::optional_bool().computed().with_description(
                    "Take ownership of fields managed by other field managers. Defaults to `false`.",
                ),
            )
            .with_attribute(
                "field_manager",
                Attribute::optional_string().computed().with_description(
                    "Field manager used for server-side apply. Defaults to the provider's field manager.",
                ),
            )
            .with_attribute(
                "deletion_propagation",
                Attribute::optional_string()
                    .with_description("Propagation policy used on delete: `Orphan`, `Background` or `Foreground`.")
                    .with_validator(Validator::OneOf {
                        values: DELETION_PROPAGATION_POLICIES.iter().map(|s| s.to_string()).collect(),
                    }),
            )
            .with_attribute("wait_for", wait_for)
            .with_attribute("wait_for_delete", wait_for_delete)
            .with_attribute(
                "metadata",
                Attribute::object(self.metadata_attributes(Surface::Resource))
                    .required()
                    .with_description("Data that helps uniquely identify the object."),
            );
        schema.attributes.extend(self.configurable.clone());
        schema
    }

    pub fn data_source_schema(&self) -> Schema {
        let mut schema = Schema::new()
            .with_description(self.schema_description())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("api_version", Attribute::computed_string())
            .with_attribute("kind", Attribute::computed_string())
            .with_attribute(
                "metadata",
                Attribute::object(self.metadata_attributes(Surface::DataSource))
                    .required()
                    .with_description("Name (and namespace) of the object to read."),
            );
        schema.attributes.extend(self.read_only.clone());
        schema
    }

    pub fn manifest_schema(&self) -> Schema {
        let mut schema = Schema::new()
            .with_description(self.schema_description())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "yaml",
                Attribute::computed_string().with_description("The object rendered as a Kubernetes YAML manifest."),
            )
            .with_attribute(
                "metadata",
                Attribute::object(self.metadata_attributes(Surface::Manifest))
                    .required()
                    .with_description("Data that helps uniquely identify the object."),
            );
        schema.attributes.extend(self.configurable.clone());
        schema
    }

    fn schema_description(&self) -> String {
        match &self.description {
            Some(description) => format!("{} ({})", description, self.gvk),
            None => self.gvk.to_string(),
        }
    }

    /// Composite ID from the `metadata` block of a state or configuration
    pub fn resource_id(&self, state: &Value) -> Result<ResourceId> {
        let metadata = state.get("metadata").unwrap_or(&Value::Null);
        let name = metadata
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::invalid_attribute("metadata.name", "a name is required"))?;

        if !self.namespaced {
            return Ok(ResourceId::cluster(name));
        }
        let namespace = metadata
            .get("namespace")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                Error::invalid_attribute("metadata.namespace", "a namespace is required")
            })?;
        Ok(ResourceId::namespaced(namespace, name))
    }

    /// Marshal a resource or manifest state into the Kubernetes object to apply
    pub fn build_object(&self, state: &Value, surface: Surface) -> Result<(ResourceId, Value)> {
        let id = self.resource_id(state)?;

        let metadata = convert::to_kubernetes(
            &self.metadata_attributes(surface),
            state.get("metadata").unwrap_or(&Value::Null),
        )?;
        let body = convert::to_kubernetes(&self.configurable, &select(&self.configurable, state))?;

        let mut object = Map::new();
        object.insert("apiVersion".to_string(), json!(self.gvk.api_version()));
        object.insert("kind".to_string(), json!(self.gvk.kind));
        object.insert("metadata".to_string(), metadata);
        if let Value::Object(body) = body {
            object.extend(body);
        }
        Ok((id, Value::Object(object)))
    }

    /// Unmarshal the user-facing part of a Kubernetes object into state
    pub fn object_state(&self, object: &Value, surface: Surface) -> Result<Value> {
        let metadata = object
            .get("metadata")
            .filter(|m| m.is_object())
            .ok_or_else(|| Error::MetadataError("Object missing metadata field".to_string()))?;

        let body = match surface.target() {
            Target::Configurable => convert::from_kubernetes(&self.configurable, object),
            Target::ReadOnly => convert::from_kubernetes(&self.read_only, object),
        };

        let mut state = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        state.insert(
            "metadata".to_string(),
            convert::from_kubernetes(&self.metadata_attributes(surface), metadata),
        );
        Ok(Value::Object(state))
    }
}

/// Only the keys of `state` that `attributes` declares
pub(crate) fn select(attributes: &Attributes, state: &Value) -> Value {
    Value::Object(
        attributes
            .keys()
            .filter_map(|name| state.get(name).map(|v| (name.clone(), v.clone())))
            .collect(),
    )
}

/// Bindings for every served version of every CRD in a multi-document YAML file
pub fn bindings_from_yaml(content: &str) -> Result<Vec<CrdBinding>> {
    let mut bindings = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        let crd: CustomResourceDefinition = serde_yaml::from_value(value)?;
        bindings.extend(CrdBinding::all_from_crd(&crd)?);
    }
    Ok(bindings)
}
