//! Conversion of CRD OpenAPI v3 schemas into attribute schemas

use super::{Attribute, AttributeType, Attributes, Validator};
use heck::ToSnakeCase;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
    JSONSchemaProps, JSONSchemaPropsOrArray, JSONSchemaPropsOrBool,
};
use std::collections::BTreeSet;

/// What the converted attributes are used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Resources and manifests: required per the CRD, everything else optional
    Configurable,
    /// Data sources: every attribute is computed
    ReadOnly,
}

/// Snake-case attribute name for a Kubernetes field name
pub fn terraform_name(json_name: &str) -> String {
    let mut name = json_name.to_snake_case();
    if name.is_empty() {
        name.push('_');
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Convert the `properties` of an object schema.
///
/// `skip` lists JSON names that are handled elsewhere (e.g. `metadata`), and
/// `taken` lists attribute names already used by the caller, which converted
/// names must not collide with.
pub fn attributes_from_properties(
    props: &JSONSchemaProps,
    target: Target,
    skip: &[&str],
    taken: &[&str],
) -> Attributes {
    let props = flatten(props);
    let required: BTreeSet<&str> = props
        .required
        .iter()
        .flatten()
        .map(String::as_str)
        .collect();

    let mut used: BTreeSet<String> = taken.iter().map(|s| s.to_string()).collect();
    let mut attributes = Attributes::new();

    for (json_name, child) in props.properties.iter().flatten() {
        if skip.contains(&json_name.as_str()) {
            continue;
        }

        let mut name = terraform_name(json_name);
        while used.contains(&name) {
            name.push('_');
        }
        used.insert(name.clone());

        let mut attribute = attribute_from_props(child, required.contains(json_name.as_str()), target);
        if &name != json_name {
            attribute.json_name = Some(json_name.clone());
        }
        attributes.insert(name, attribute);
    }

    attributes
}

/// Convert a single property schema into an attribute
pub fn attribute_from_props(props: &JSONSchemaProps, required: bool, target: Target) -> Attribute {
    let props = flatten(props);
    let mut attribute = Attribute::new(attribute_type(&props, target));
    attribute.description = props.description.clone();

    match target {
        Target::Configurable if required => attribute = attribute.required(),
        Target::Configurable => attribute = attribute.optional(),
        Target::ReadOnly => attribute = attribute.computed(),
    }

    if target == Target::Configurable {
        attribute.validators = validators(&props);
    }
    attribute
}

fn attribute_type(props: &JSONSchemaProps, target: Target) -> AttributeType {
    if props.x_kubernetes_int_or_string == Some(true) {
        return AttributeType::String;
    }

    match props.type_.as_deref() {
        Some("string") => AttributeType::String,
        Some("integer") => AttributeType::Int64,
        Some("number") => AttributeType::Float64,
        Some("boolean") => AttributeType::Bool,
        Some("array") => match &props.items {
            Some(JSONSchemaPropsOrArray::Schema(items)) => {
                match attribute_type(&flatten(items), target) {
                    AttributeType::Object { attributes } => {
                        AttributeType::ListNested { attributes }
                    }
                    element => AttributeType::list(as_element(element)),
                }
            }
            _ => AttributeType::list(AttributeType::Dynamic),
        },
        Some("object") | None if has_properties(props) => AttributeType::Object {
            attributes: attributes_from_properties(props, target, &[], &[]),
        },
        Some("object") => match &props.additional_properties {
            Some(JSONSchemaPropsOrBool::Schema(values)) => {
                match attribute_type(&flatten(values), target) {
                    AttributeType::Object { attributes } => AttributeType::MapNested { attributes },
                    element => AttributeType::map(as_element(element)),
                }
            }
            _ if props.x_kubernetes_preserve_unknown_fields == Some(true) => AttributeType::Dynamic,
            Some(JSONSchemaPropsOrBool::Bool(true)) => AttributeType::Dynamic,
            _ => AttributeType::map(AttributeType::String),
        },
        _ => AttributeType::Dynamic,
    }
}

fn has_properties(props: &JSONSchemaProps) -> bool {
    props.properties.as_ref().is_some_and(|p| !p.is_empty())
}

/// Collections cannot hold nested attributes; fall back to dynamic values
fn as_element(ty: AttributeType) -> AttributeType {
    match ty {
        AttributeType::List { element } => AttributeType::list(as_element(*element)),
        AttributeType::Map { element } => AttributeType::map(as_element(*element)),
        other if other.is_nested() => AttributeType::Dynamic,
        other => other,
    }
}

/// Fold single-element `allOf`/`anyOf`/`oneOf` wrappers into the schema itself.
///
/// schemars wraps documented struct fields as `{description, allOf: [<struct>]}`.
pub(crate) fn flatten(props: &JSONSchemaProps) -> JSONSchemaProps {
    if props.type_.is_some() || props.properties.is_some() {
        return props.clone();
    }

    let single = [&props.all_of, &props.any_of, &props.one_of]
        .into_iter()
        .find_map(|s| s.as_ref().filter(|v| v.len() == 1).map(|v| &v[0]));

    match single {
        Some(inner) => {
            let mut merged = flatten(inner);
            if props.description.is_some() {
                merged.description = props.description.clone();
            }
            if props.nullable.is_some() {
                merged.nullable = props.nullable;
            }
            merged
        }
        None => props.clone(),
    }
}

fn validators(props: &JSONSchemaProps) -> Vec<Validator> {
    let mut validators = Vec::new();

    if let Some(values) = &props.enum_ {
        let values: Vec<String> = values
            .iter()
            .filter_map(|v| v.0.as_str().map(str::to_string))
            .collect();
        if !values.is_empty() {
            validators.push(Validator::OneOf { values });
        }
    }
    if props.min_length.is_some() || props.max_length.is_some() {
        validators.push(Validator::LengthBetween {
            min: props.min_length.map(|v| v.max(0) as u64),
            max: props.max_length.map(|v| v.max(0) as u64),
        });
    }
    if props.minimum.is_some() || props.maximum.is_some() {
        validators.push(Validator::Between {
            min: props.minimum,
            max: props.maximum,
        });
    }
    if let Some(pattern) = &props.pattern {
        validators.push(Validator::Pattern {
            pattern: pattern.clone(),
        });
    }

    validators
}
