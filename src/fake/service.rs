//! Tower service that answers Kubernetes REST requests from an [`ObjectStore`]

use super::store::ObjectStore;
use crate::error::Error;
use crate::gvk::GVR;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use kube::client::Body as KubeBody;
use serde_json::{json, Value};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::trace;

type ServiceResult = std::result::Result<Response<Full<Bytes>>, Box<dyn std::error::Error + Send + Sync>>;

macro_rules! handle_error {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => return FakeApiServer::error_to_response(e),
        }
    };
}

/// Parsed Kubernetes API path information
#[derive(Debug, PartialEq)]
pub(super) struct ParsedPath {
    pub(super) group: Option<String>,
    pub(super) version: String,
    pub(super) namespace: Option<String>,
    pub(super) resource: String,
    pub(super) name: Option<String>,
    pub(super) status: bool,
}

impl ParsedPath {
    fn gvr(&self) -> GVR {
        GVR::new(
            self.group.clone().unwrap_or_default(),
            self.version.clone(),
            self.resource.clone(),
        )
    }

    fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub(super) enum PatchType {
    JsonPatch,
    MergePatch,
    ApplyPatch,
}

#[derive(Debug, Default, PartialEq)]
pub(super) struct PatchQuery {
    pub(super) field_manager: Option<String>,
    pub(super) force: bool,
}

#[derive(Clone)]
pub struct FakeApiServer {
    store: Arc<ObjectStore>,
}

impl FakeApiServer {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }

    /// Parse URL paths such as
    /// - /apis/ec2.services.k8s.aws/v1alpha1/namespaces/default/vpcs/main
    /// - /apis/nfd.k8s-sigs.io/v1alpha1/nodefeaturerules/gpu
    /// - /api/v1/namespaces/default/configmaps/settings/status
    pub(super) fn parse_path(path: &str) -> Option<ParsedPath> {
        let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (group, version_idx) = match parts.first() {
            Some(&"api") => (None, 1),
            Some(&"apis") if parts.len() > 2 => (Some(parts[1].to_string()), 2),
            _ => return None,
        };

        if parts.len() < version_idx + 2 {
            return None;
        }
        let version = parts[version_idx].to_string();

        let rest_idx = if parts.get(version_idx + 1) == Some(&"namespaces")
            && parts.len() >= version_idx + 4
        {
            version_idx + 3
        } else {
            version_idx + 1
        };
        let namespace = (rest_idx == version_idx + 3).then(|| parts[version_idx + 2].to_string());

        let status = parts.len() == rest_idx + 3 && parts.last() == Some(&"status");
        if status {
            parts.pop();
        }
        if parts.len() > rest_idx + 2 {
            return None;
        }

        Some(ParsedPath {
            group,
            version,
            namespace,
            resource: parts[rest_idx].to_string(),
            name: parts.get(rest_idx + 1).map(|s| s.to_string()),
            status,
        })
    }

    pub(super) fn parse_patch_query(query: Option<&str>) -> PatchQuery {
        let mut params = PatchQuery::default();
        for pair in query.unwrap_or("").split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let decoded = urlencoding::decode(value).unwrap_or(std::borrow::Cow::Borrowed(value));
            match key {
                "fieldManager" => params.field_manager = Some(decoded.to_string()),
                "force" => params.force = decoded == "true",
                _ => {}
            }
        }
        params
    }

    pub(super) fn determine_patch_type(content_type: Option<&str>) -> PatchType {
        match content_type {
            Some(ct) if ct.contains("application/json-patch+json") => PatchType::JsonPatch,
            Some(ct) if ct.contains("application/apply-patch+yaml") => PatchType::ApplyPatch,
            // strategic merge is treated as a plain merge patch
            _ => PatchType::MergePatch,
        }
    }

    async fn handle_request(&self, req: Request<KubeBody>) -> ServiceResult {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(|s| s.to_string());
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body_bytes = {
            use http_body_util::BodyExt;
            req.into_body().collect().await?.to_bytes()
        };

        trace!("{} {}", method, path);

        let Some(parsed) = Self::parse_path(&path) else {
            return Self::error_response(StatusCode::NOT_FOUND, "NotFound", "the server could not find the requested resource");
        };

        match method.as_str() {
            "GET" => self.handle_get(&parsed),
            "POST" => self.handle_post(&parsed, body_bytes),
            "PATCH" => self.handle_patch(
                &parsed,
                body_bytes,
                content_type.as_deref(),
                query.as_deref(),
            ),
            "DELETE" => self.handle_delete(&parsed),
            _ => Self::error_response(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", "Method not allowed"),
        }
    }

    fn handle_get(&self, parsed: &ParsedPath) -> ServiceResult {
        let gvr = parsed.gvr();

        if let Some(name) = &parsed.name {
            let obj = handle_error!(self.store.get(&gvr, parsed.namespace(), name));
            return Self::success_response(obj);
        }

        let items = self.store.list(&gvr, parsed.namespace.as_deref());
        let api_version = match &parsed.group {
            Some(g) => format!("{}/{}", g, parsed.version),
            None => parsed.version.clone(),
        };
        Self::success_response(json!({
            "kind": "List",
            "apiVersion": api_version,
            "metadata": { "resourceVersion": "1" },
            "items": items,
        }))
    }

    fn handle_post(&self, parsed: &ParsedPath, body: Bytes) -> ServiceResult {
        let obj: Value = handle_error!(serde_json::from_slice(&body).map_err(Error::from));
        let created = handle_error!(self.store.create(&parsed.gvr(), parsed.namespace(), obj));
        Self::response(StatusCode::CREATED, created)
    }

    fn handle_patch(
        &self,
        parsed: &ParsedPath,
        body: Bytes,
        content_type: Option<&str>,
        query: Option<&str>,
    ) -> ServiceResult {
        let Some(name) = &parsed.name else {
            return Self::error_response(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", "Name required for PATCH");
        };
        let gvr = parsed.gvr();
        let namespace = parsed.namespace();

        let updated = match Self::determine_patch_type(content_type) {
            PatchType::ApplyPatch => {
                let params = Self::parse_patch_query(query);
                let Some(manager) = params.field_manager else {
                    return Self::error_response(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "Invalid",
                        "fieldManager is required for apply requests",
                    );
                };
                // apply bodies are YAML, which JSON bodies also parse as
                let applied: Value = handle_error!(serde_yaml::from_slice(&body).map_err(Error::from));
                handle_error!(self
                    .store
                    .apply(&gvr, namespace, name, applied, &manager, params.force))
            }
            PatchType::MergePatch => {
                let patch: Value = handle_error!(serde_json::from_slice(&body).map_err(Error::from));
                handle_error!(self
                    .store
                    .merge_patch(&gvr, namespace, name, &patch, parsed.status))
            }
            PatchType::JsonPatch => {
                let patch: json_patch::Patch =
                    handle_error!(serde_json::from_slice(&body).map_err(Error::from));
                handle_error!(self.store.json_patch(&gvr, namespace, name, &patch))
            }
        };

        Self::success_response(updated)
    }

    fn handle_delete(&self, parsed: &ParsedPath) -> ServiceResult {
        let Some(name) = &parsed.name else {
            return Self::error_response(StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed", "Name required for DELETE");
        };
        let deleted = handle_error!(self.store.delete(&parsed.gvr(), parsed.namespace(), name));
        Self::success_response(deleted)
    }

    /// Render a crate error as a Kubernetes `Status` object
    fn error_to_response(err: Error) -> ServiceResult {
        let (code, reason) = err.status();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::error_response(status, reason, &err.to_string())
    }

    fn error_response(status: StatusCode, reason: &str, message: &str) -> ServiceResult {
        let body = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": status.as_u16()
        });
        Self::response(status, body)
    }

    fn success_response(data: Value) -> ServiceResult {
        Self::response(StatusCode::OK, data)
    }

    fn response(status: StatusCode, data: Value) -> ServiceResult {
        Ok(Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(data.to_string())))?)
    }
}

impl Service<Request<KubeBody>> for FakeApiServer {
    type Response = Response<Full<Bytes>>;
    type Error = Box<dyn std::error::Error + Send + Sync>;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<KubeBody>) -> Self::Future {
        let this = self.clone();
        async move { this.handle_request(req).await }.boxed()
    }
}
