//! Attribute schemas for resources, data sources and the provider block
//!
//! A [`Schema`] is a tree of named [`Attribute`]s. Attribute names are the
//! Terraform-facing snake_case names; when the Kubernetes field is spelled
//! differently the original name is kept in [`Attribute::json_name`] so state
//! can be marshalled back and forth.

pub mod openapi;
mod validators;

pub use validators::Validator;

use crate::diagnostics::{Diagnostic, Diagnostics};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub type Attributes = BTreeMap<String, Attribute>;

/// Root attribute names Terraform reserves for meta-arguments
pub const RESERVED_ROOT_NAMES: &[&str] = &[
    "connection",
    "count",
    "depends_on",
    "for_each",
    "lifecycle",
    "provider",
    "provisioner",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Int64,
    Float64,
    Bool,
    /// Arbitrary JSON, used for `x-kubernetes-preserve-unknown-fields`
    Dynamic,
    List { element: Box<AttributeType> },
    Map { element: Box<AttributeType> },
    Object { attributes: Attributes },
    ListNested { attributes: Attributes },
    MapNested { attributes: Attributes },
}

impl AttributeType {
    pub fn list(element: AttributeType) -> Self {
        AttributeType::List {
            element: Box::new(element),
        }
    }

    pub fn map(element: AttributeType) -> Self {
        AttributeType::Map {
            element: Box::new(element),
        }
    }

    /// Nested attributes for `Object`, `ListNested` and `MapNested`
    pub fn nested(&self) -> Option<&Attributes> {
        match self {
            AttributeType::Object { attributes }
            | AttributeType::ListNested { attributes }
            | AttributeType::MapNested { attributes } => Some(attributes),
            _ => None,
        }
    }

    pub fn nested_mut(&mut self) -> Option<&mut Attributes> {
        match self {
            AttributeType::Object { attributes }
            | AttributeType::ListNested { attributes }
            | AttributeType::MapNested { attributes } => Some(attributes),
            _ => None,
        }
    }

    pub fn is_nested(&self) -> bool {
        self.nested().is_some()
    }

    /// Human readable type, as printed in generated documentation
    pub fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int64 => "Number".to_string(),
            AttributeType::Float64 => "Number".to_string(),
            AttributeType::Bool => "Boolean".to_string(),
            AttributeType::Dynamic => "Dynamic".to_string(),
            AttributeType::List { element } => format!("List of {}", element.type_name()),
            AttributeType::Map { element } => format!("Map of {}", element.type_name()),
            AttributeType::Object { .. } => "Attributes".to_string(),
            AttributeType::ListNested { .. } => "Attributes List".to_string(),
            AttributeType::MapNested { .. } => "Attributes Map".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    #[serde(flatten)]
    pub ty: AttributeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_replace: bool,
    /// Kubernetes field name when it differs from the attribute name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
}

impl Attribute {
    pub fn new(ty: AttributeType) -> Self {
        Self {
            ty,
            description: None,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            requires_replace: false,
            json_name: None,
            validators: Vec::new(),
        }
    }

    pub fn required_string() -> Self {
        Self::new(AttributeType::String).required()
    }

    pub fn optional_string() -> Self {
        Self::new(AttributeType::String).optional()
    }

    pub fn computed_string() -> Self {
        Self::new(AttributeType::String).computed()
    }

    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool).optional()
    }

    pub fn object(attributes: Attributes) -> Self {
        Self::new(AttributeType::Object { attributes })
    }

    pub fn list_nested(attributes: Attributes) -> Self {
        Self::new(AttributeType::ListNested { attributes })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self.computed = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.required = false;
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_json_name(mut self, json_name: impl Into<String>) -> Self {
        self.json_name = Some(json_name.into());
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// The key this attribute is stored under in the Kubernetes object
    pub fn json_key<'a>(&'a self, name: &'a str) -> &'a str {
        self.json_name.as_deref().unwrap_or(name)
    }

    /// Computed attributes the user cannot set in configuration
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attributes: Attributes,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Look up an attribute by dotted path, e.g. `metadata.name`
    pub fn attribute(&self, path: &str) -> Option<&Attribute> {
        let mut attributes = &self.attributes;
        let mut found = None;
        for segment in path.split('.') {
            let attribute = attributes.get(segment)?;
            found = Some(attribute);
            if let Some(nested) = attribute.ty.nested() {
                attributes = nested;
            }
        }
        found
    }

    /// Check that the schema itself is well formed.
    ///
    /// Every violation is reported as a separate error diagnostic; an empty
    /// result means the schema can be served.
    pub fn validate_implementation(&self) -> Diagnostics {
        let mut diags = Diagnostics::new();
        for name in self.attributes.keys() {
            if RESERVED_ROOT_NAMES.contains(&name.as_str()) {
                diags.push(
                    Diagnostic::error(
                        "Invalid schema implementation",
                        format!("root attribute {name:?} is a reserved meta-argument name"),
                    )
                    .at(name.clone()),
                );
            }
        }
        validate_attributes(&self.attributes, "", &mut diags);
        diags
    }

    /// Validate a configuration or plan value against the schema.
    ///
    /// Checks required attributes, rejects unknown attributes and values for
    /// read-only attributes, and runs attribute validators. Type mismatches
    /// are reported by the marshaller.
    pub fn validate_value(&self, value: &Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        validate_object_value(&self.attributes, value, "", &mut diags);
        diags
    }
}

fn is_valid_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_attributes(attributes: &Attributes, prefix: &str, diags: &mut Diagnostics) {
    for (name, attribute) in attributes {
        let path = join_path(prefix, name);
        let mut fail = |detail: String| {
            diags.push(Diagnostic::error("Invalid schema implementation", detail).at(path.clone()));
        };

        if !is_valid_attribute_name(name) {
            fail(format!(
                "attribute name {name:?} must match ^[a-z_][a-z0-9_]*$"
            ));
        }
        if !attribute.required && !attribute.optional && !attribute.computed {
            fail("attribute must be required, optional or computed".to_string());
        }
        if attribute.required && (attribute.optional || attribute.computed) {
            fail("required attributes cannot also be optional or computed".to_string());
        }
        match &attribute.ty {
            AttributeType::List { element } | AttributeType::Map { element } => {
                if element_is_invalid(element) {
                    fail("collection element types cannot be nested attributes".to_string());
                }
            }
            _ => {}
        }
        if let Some(nested) = attribute.ty.nested() {
            if nested.is_empty() {
                fail("nested attributes must declare at least one attribute".to_string());
            }
            validate_attributes(nested, &path, diags);
        }
    }
}

fn element_is_invalid(element: &AttributeType) -> bool {
    match element {
        AttributeType::List { element } | AttributeType::Map { element } => {
            element_is_invalid(element)
        }
        other => other.is_nested(),
    }
}

fn validate_object_value(
    attributes: &Attributes,
    value: &Value,
    prefix: &str,
    diags: &mut Diagnostics,
) {
    let object = match value {
        Value::Object(object) => object,
        Value::Null => return,
        _ => {
            diags.push(
                Diagnostic::error("Invalid attribute value", "expected an object")
                    .at(prefix.to_string()),
            );
            return;
        }
    };

    for name in object.keys().filter(|k| !attributes.contains_key(*k)) {
        diags.push(
            Diagnostic::error(
                "Unsupported argument",
                format!("an argument named {name:?} is not expected here"),
            )
            .at(join_path(prefix, name)),
        );
    }

    for (name, attribute) in attributes {
        let path = join_path(prefix, name);
        let child = object.get(name).unwrap_or(&Value::Null);

        if child.is_null() {
            if attribute.required {
                diags.push(
                    Diagnostic::error(
                        "Missing required argument",
                        format!("the argument {path:?} is required, but no definition was found"),
                    )
                    .at(path),
                );
            }
            continue;
        }

        if attribute.is_read_only() {
            diags.push(
                Diagnostic::error(
                    "Invalid configuration for read-only attribute",
                    format!("{path:?} is computed and cannot be set in configuration"),
                )
                .at(path),
            );
            continue;
        }

        for validator in &attribute.validators {
            if let Err(detail) = validator.validate(child) {
                diags.push(Diagnostic::error("Invalid attribute value", detail).at(path.clone()));
            }
        }

        match (&attribute.ty, child) {
            (AttributeType::Object { attributes }, _) => {
                validate_object_value(attributes, child, &path, diags);
            }
            (AttributeType::ListNested { attributes }, Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    validate_object_value(attributes, item, &format!("{path}[{i}]"), diags);
                }
            }
            (AttributeType::MapNested { attributes }, Value::Object(entries)) => {
                for (key, item) in entries {
                    validate_object_value(attributes, item, &format!("{path}[{key:?}]"), diags);
                }
            }
            _ => {}
        }
    }
}
