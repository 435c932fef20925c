//! Group/version/kind and group/version/resource identifiers

use crate::{Error, Result};
use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GVK {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GVK {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GVK {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GVR {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GVR {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// Build the `ApiResource` used to address this resource through `Api<DynamicObject>`
    pub fn api_resource(&self, gvk: &GVK) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: gvk.api_version(),
            kind: gvk.kind.clone(),
            plural: self.resource.clone(),
        }
    }
}

/// Pluralize a Kubernetes Kind name to its resource plural form.
///
/// Follows the kube-rs rules (kube-core/src/discovery.rs, Apache-2.0):
/// - Special cases for already-plural words (endpoints, endpointslices)
/// - Words ending in s, x, z, ch, sh get -es suffix
/// - Words ending in consonant+y get -ies suffix
/// - All other words get -s suffix
pub fn pluralize(kind: &str) -> String {
    let word = kind.to_ascii_lowercase();

    if word == "endpoints" || word == "endpointslices" {
        return word;
    } else if word == "nodemetrics" {
        return "nodes".to_string();
    } else if word == "podmetrics" {
        return "pods".to_string();
    }

    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }

    if word.ends_with('y') {
        if let Some(c) = word.chars().nth(word.len() - 2) {
            if !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u') {
                let mut chars = word.chars();
                chars.next_back();
                return format!("{}ies", chars.as_str());
            }
        }
    }

    format!("{word}s")
}

/// Split an `apiVersion` string into group and version
pub fn split_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

pub fn extract_gvk(value: &Value) -> Result<GVK> {
    let api_version = value
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidRequest("Missing apiVersion".to_string()))?;

    let kind = value
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidRequest("Missing kind".to_string()))?;

    let (group, version) = split_api_version(api_version);
    Ok(GVK::new(group, version, kind))
}
