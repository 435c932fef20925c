use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Resource not found: {kind} {id}")]
    NotFound { kind: String, id: String },

    #[error("Resource already exists: {kind} {name} in namespace {namespace}")]
    AlreadyExists {
        kind: String,
        name: String,
        namespace: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid value for attribute {path}: {message}")]
    InvalidAttribute { path: String, message: String },

    #[error("Invalid import ID {id:?}: {message}")]
    InvalidImportId { id: String, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON patch error: {0}")]
    PatchError(#[from] json_patch::PatchError),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to load kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("Provider has not been configured with a Kubernetes client")]
    NotConfigured,

    #[error("Unknown type {0}")]
    UnknownType(String),

    #[error("Timed out after {timeout:?} waiting for {jsonpath} to equal {expected:?} (last observed {observed:?})")]
    WaitTimeout {
        jsonpath: String,
        expected: String,
        observed: Option<String>,
        timeout: std::time::Duration,
    },

    #[error("Timed out after {timeout:?} waiting for {id} to be deleted")]
    DeleteTimeout {
        id: String,
        timeout: std::time::Duration,
    },

    #[error("Invalid JSONPath {expression:?}: {message}")]
    JsonPath { expression: String, message: String },

    #[error("Schema validation failed for {kind}: {}", .errors.join(", "))]
    ValidationFailed { kind: String, errors: Vec<String> },

    #[error("Failed to fetch CRDs: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Failed to access object metadata: {0}")]
    MetadataError(String),
}

impl Error {
    /// True for 404 responses, whether from the API server or the local store.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }

    /// HTTP status code and Kubernetes `Status.reason` for this error
    pub(crate) fn status(&self) -> (u16, &'static str) {
        match self {
            Error::NotFound { .. } => (404, "NotFound"),
            Error::AlreadyExists { .. } => (409, "AlreadyExists"),
            Error::Conflict(_) => (409, "Conflict"),
            Error::InvalidRequest(_)
            | Error::MetadataError(_)
            | Error::SerializationError(_)
            | Error::YamlError(_) => (400, "BadRequest"),
            Error::PatchError(_) | Error::ValidationFailed { .. } => (422, "Invalid"),
            Error::Kube(kube::Error::Api(resp)) => (resp.code, "Unknown"),
            _ => (500, "InternalError"),
        }
    }

    pub(crate) fn invalid_attribute(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidAttribute {
            path: path.into(),
            message: message.into(),
        }
    }
}
