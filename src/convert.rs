//! Marshalling between attribute state and Kubernetes JSON
//!
//! State objects use attribute names and always carry every attribute of the
//! schema (`null` when unset). Kubernetes objects use the original JSON field
//! names and omit unset fields.

use crate::schema::{Attribute, AttributeType, Attributes};
use crate::{Error, Result};
use serde_json::{Map, Value};

/// Convert a state object into its Kubernetes representation.
///
/// Nulls are dropped, keys are renamed to their JSON names and scalar types
/// are checked. Keys unknown to the schema are rejected.
pub fn to_kubernetes(attributes: &Attributes, state: &Value) -> Result<Value> {
    object_to_kubernetes(attributes, state, "")
}

fn object_to_kubernetes(attributes: &Attributes, state: &Value, path: &str) -> Result<Value> {
    let object = state
        .as_object()
        .ok_or_else(|| Error::invalid_attribute(display_path(path), "expected an object"))?;

    let mut out = Map::new();
    for (name, value) in object {
        let child_path = join(path, name);
        let attribute = attributes.get(name).ok_or_else(|| {
            Error::invalid_attribute(&child_path, "unsupported attribute")
        })?;
        if value.is_null() {
            continue;
        }
        out.insert(
            attribute.json_key(name).to_string(),
            value_to_kubernetes(&attribute.ty, value, &child_path)?,
        );
    }
    Ok(Value::Object(out))
}

fn value_to_kubernetes(ty: &AttributeType, value: &Value, path: &str) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = |expected: &str| {
        Error::invalid_attribute(path, format!("expected {}, got {}", expected, kind_of(value)))
    };

    match ty {
        AttributeType::String => value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| mismatch("a string")),
        AttributeType::Int64 => as_integer(value)
            .map(Value::from)
            .ok_or_else(|| mismatch("an integer")),
        AttributeType::Float64 => value
            .as_f64()
            .map(Value::from)
            .ok_or_else(|| mismatch("a number")),
        AttributeType::Bool => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch("a bool")),
        AttributeType::Dynamic => Ok(value.clone()),
        AttributeType::List { element } => {
            let items = value.as_array().ok_or_else(|| mismatch("a list"))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| value_to_kubernetes(element, item, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        AttributeType::Map { element } => {
            let entries = value.as_object().ok_or_else(|| mismatch("a map"))?;
            let mut out = Map::new();
            for (key, item) in entries {
                out.insert(
                    key.clone(),
                    value_to_kubernetes(element, item, &format!("{path}[{key:?}]"))?,
                );
            }
            Ok(Value::Object(out))
        }
        AttributeType::Object { attributes } => object_to_kubernetes(attributes, value, path),
        AttributeType::ListNested { attributes } => {
            let items = value.as_array().ok_or_else(|| mismatch("a list"))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| object_to_kubernetes(attributes, item, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        AttributeType::MapNested { attributes } => {
            let entries = value.as_object().ok_or_else(|| mismatch("a map"))?;
            let mut out = Map::new();
            for (key, item) in entries {
                out.insert(
                    key.clone(),
                    object_to_kubernetes(attributes, item, &format!("{path}[{key:?}]"))?,
                );
            }
            Ok(Value::Object(out))
        }
    }
}

/// Convert a Kubernetes object into a full state object.
///
/// Every attribute is present in the result; fields the schema does not know
/// about are ignored.
pub fn from_kubernetes(attributes: &Attributes, object: &Value) -> Value {
    let mut out = Map::new();
    for (name, attribute) in attributes {
        let observed = object.get(attribute.json_key(name)).unwrap_or(&Value::Null);
        out.insert(name.clone(), value_from_kubernetes(&attribute.ty, observed));
    }
    Value::Object(out)
}

fn value_from_kubernetes(ty: &AttributeType, value: &Value) -> Value {
    match (ty, value) {
        (_, Value::Null) => Value::Null,
        (AttributeType::String, Value::String(_)) => value.clone(),
        // int-or-string fields come back as numbers
        (AttributeType::String, Value::Number(n)) => Value::String(n.to_string()),
        (AttributeType::String, Value::Bool(b)) => Value::String(b.to_string()),
        (AttributeType::Int64, _) => as_integer(value).map(Value::from).unwrap_or(Value::Null),
        (AttributeType::Float64, Value::Number(_)) => value.clone(),
        (AttributeType::Bool, Value::Bool(_)) => value.clone(),
        (AttributeType::Dynamic, _) => value.clone(),
        (AttributeType::List { element }, Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| value_from_kubernetes(element, item))
                .collect(),
        ),
        (AttributeType::Map { element }, Value::Object(entries)) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), value_from_kubernetes(element, v)))
                .collect(),
        ),
        (AttributeType::Object { attributes }, Value::Object(_)) => {
            from_kubernetes(attributes, value)
        }
        (AttributeType::ListNested { attributes }, Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| from_kubernetes(attributes, item))
                .collect(),
        ),
        (AttributeType::MapNested { attributes }, Value::Object(entries)) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), from_kubernetes(attributes, v)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// Give a configuration the shape of state: every attribute of every nested
/// object present, `null` where unset.
pub fn normalize(attributes: &Attributes, value: &Value) -> Value {
    let Value::Object(object) = value else {
        return value.clone();
    };
    Value::Object(
        attributes
            .iter()
            .map(|(name, attribute)| {
                let child = object.get(name).unwrap_or(&Value::Null);
                (name.clone(), normalize_value(&attribute.ty, child))
            })
            .collect(),
    )
}

pub(crate) fn normalize_value(ty: &AttributeType, value: &Value) -> Value {
    match (ty, value) {
        (AttributeType::Object { attributes }, Value::Object(_)) => normalize(attributes, value),
        (AttributeType::ListNested { attributes }, Value::Array(items)) => Value::Array(
            items.iter().map(|item| normalize(attributes, item)).collect(),
        ),
        (AttributeType::MapNested { attributes }, Value::Object(entries)) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), normalize(attributes, v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Refresh prior state from an observed Kubernetes object.
///
/// Attributes that were null in the prior state stay null unless they are
/// computed, so server-side defaults do not show up as drift. Maps only keep
/// the keys the prior state managed.
pub fn refresh(attributes: &Attributes, prior: &Value, observed: &Value) -> Value {
    let mut out = Map::new();
    for (name, attribute) in attributes {
        let prior_value = prior.get(name).unwrap_or(&Value::Null);
        let observed_value = observed
            .get(attribute.json_key(name))
            .unwrap_or(&Value::Null);
        out.insert(
            name.clone(),
            refresh_value(attribute, prior_value, observed_value),
        );
    }
    Value::Object(out)
}

fn refresh_value(attribute: &Attribute, prior: &Value, observed: &Value) -> Value {
    if prior.is_null() && !attribute.computed {
        return Value::Null;
    }

    match (&attribute.ty, prior, observed) {
        (AttributeType::Object { attributes }, Value::Object(_), Value::Object(_)) => {
            refresh(attributes, prior, observed)
        }
        (AttributeType::ListNested { attributes }, Value::Array(p), Value::Array(o))
            if p.len() == o.len() =>
        {
            Value::Array(
                p.iter()
                    .zip(o)
                    .map(|(p, o)| refresh(attributes, p, o))
                    .collect(),
            )
        }
        (AttributeType::MapNested { attributes }, Value::Object(p), Value::Object(o)) => {
            Value::Object(
                o.iter()
                    .filter_map(|(k, v)| p.get(k).map(|pv| (k.clone(), refresh(attributes, pv, v))))
                    .collect(),
            )
        }
        (AttributeType::Map { element }, Value::Object(p), Value::Object(o)) => Value::Object(
            o.iter()
                .filter(|(k, _)| p.contains_key(*k))
                .map(|(k, v)| (k.clone(), value_from_kubernetes(element, v)))
                .collect(),
        ),
        (ty, _, _) => value_from_kubernetes(ty, observed),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<root>"
    } else {
        path
    }
}
