//! Diagnostics returned to the caller of provider operations
//!
//! Operations never fail with a bare `Error`: every failure is reported as an
//! error diagnostic with a stable summary, the way the plugin framework surfaces
//! problems to the user. Warnings travel alongside successful results.

use crate::Error;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    /// Attribute path the diagnostic refers to, e.g. `spec.cidr_blocks`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn at(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        match &self.attribute {
            Some(attr) => write!(f, "{}: {} ({}): {}", level, self.summary, attr, self.detail),
            None => write!(f, "{}: {}: {}", level, self.summary, self.detail),
        }
    }
}

impl From<&Error> for Diagnostic {
    fn from(err: &Error) -> Self {
        let summary = match err {
            Error::SerializationError(_) | Error::YamlError(_) | Error::PatchError(_) => {
                "Unable to marshal resource"
            }
            Error::MetadataError(_) => "Unable to unmarshal resource",
            Error::NotFound { .. } => "Resource not found",
            Error::Kube(kube::Error::Api(resp)) if resp.code == 404 => "Resource not found",
            Error::Kube(_) | Error::Conflict(_) | Error::AlreadyExists { .. } => {
                "Error from Kubernetes API"
            }
            Error::InvalidAttribute { .. } | Error::InvalidRequest(_) => "Invalid attribute value",
            Error::InvalidImportId { .. } => "Invalid import ID",
            Error::NotConfigured | Error::Kubeconfig(_) => "Provider not configured",
            Error::Http(_) => "Unable to load CRD definitions",
            Error::UnknownType(_) => "Unknown resource type",
            Error::WaitTimeout { .. } | Error::DeleteTimeout { .. } => {
                "Timed out waiting for condition"
            }
            Error::JsonPath { .. } => "Invalid JSONPath expression",
            Error::ValidationFailed { .. } => "Schema validation failed",
            Error::Template(_) | Error::Io(_) | Error::Internal(_) => "Internal provider error",
        };

        let diagnostic = Diagnostic::error(summary, err.to_string());
        match err {
            Error::InvalidAttribute { path, .. } => diagnostic.at(path.clone()),
            _ => diagnostic,
        }
    }
}

impl From<Error> for Diagnostic {
    fn from(err: Error) -> Self {
        Diagnostic::from(&err)
    }
}

/// Ordered collection of diagnostics produced by a single operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::error(summary, detail));
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::warning(summary, detail));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_error(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Error> for Diagnostics {
    fn from(err: Error) -> Self {
        Self(vec![err.into()])
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
