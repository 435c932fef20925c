//! Composite identifier stored as the `id` attribute

use crate::{Error, Result};
use std::fmt;

/// `namespace/name` for namespaced objects, `name` for cluster-scoped ones
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceId {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Parse an ID produced by `Display`, as given to `terraform import`.
    pub fn parse(id: &str, namespaced: bool) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidImportId {
            id: id.to_string(),
            message: message.to_string(),
        };

        if namespaced {
            let (namespace, name) = id
                .split_once('/')
                .ok_or_else(|| invalid("expected <namespace>/<name>"))?;
            if namespace.is_empty() || name.is_empty() || name.contains('/') {
                return Err(invalid("expected <namespace>/<name>"));
            }
            Ok(Self::namespaced(namespace, name))
        } else {
            if id.is_empty() || id.contains('/') {
                return Err(invalid("expected <name> for a cluster-scoped resource"));
            }
            Ok(Self::cluster(id))
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}
