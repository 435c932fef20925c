//! In-memory object storage backing the fake API server
//!
//! Objects are stored as raw JSON keyed by resource, namespace and name.
//! Server-side apply is modelled with per-leaf field ownership: every leaf
//! JSON pointer a manager applied is recorded against that manager.

use crate::gvk::GVR;
use crate::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Value,
    /// Leaf JSON pointer -> field manager that owns it
    owners: BTreeMap<String, String>,
}

type ObjectsByName = HashMap<String, StoredObject>;
type ObjectsByNamespace = HashMap<String, ObjectsByName>;
type ObjectStorage = HashMap<GVR, ObjectsByNamespace>;

#[derive(Debug, Default)]
pub struct ObjectStore {
    objects: RwLock<ObjectStorage>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without any field ownership, as fixtures do
    pub fn add(&self, gvr: &GVR, namespace: &str, mut object: Value) -> Result<Value> {
        let mut meta = extract_metadata(&object)?;
        let name = required_name(&meta)?;

        if meta.resource_version.as_ref().is_none_or(|rv| rv.is_empty()) {
            meta.resource_version = Some("1".to_string());
        }
        ensure_metadata(&mut meta, namespace);
        object["metadata"] = serde_json::to_value(&meta)?;

        self.store(gvr, namespace, &name, StoredObject {
            data: object.clone(),
            owners: BTreeMap::new(),
        });
        debug!("Added object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn create(&self, gvr: &GVR, namespace: &str, mut object: Value) -> Result<Value> {
        trace!("Creating object: {:?} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = required_name(&meta)?;

        if meta.resource_version.as_ref().is_some_and(|rv| !rv.is_empty()) {
            return Err(Error::InvalidRequest(
                "resourceVersion can not be set for Create requests".to_string(),
            ));
        }
        if self.get(gvr, namespace, &name).is_ok() {
            return Err(Error::AlreadyExists {
                kind: gvr.resource.clone(),
                name,
                namespace: namespace.to_string(),
            });
        }

        meta.resource_version = Some("1".to_string());
        meta.deletion_timestamp = None;
        ensure_metadata(&mut meta, namespace);
        object["metadata"] = serde_json::to_value(&meta)?;

        self.store(gvr, namespace, &name, StoredObject {
            data: object.clone(),
            owners: BTreeMap::new(),
        });
        debug!("Created object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn get(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Getting object: {:?} {}/{}", gvr, namespace, name);
        self.stored(gvr, namespace, name).map(|s| s.data)
    }

    pub fn list(&self, gvr: &GVR, namespace: Option<&str>) -> Vec<Value> {
        let objects = self.objects.read().expect("ObjectStore lock poisoned");
        let Some(by_namespace) = objects.get(gvr) else {
            return Vec::new();
        };
        by_namespace
            .iter()
            .filter(|(ns, _)| namespace.is_none_or(|wanted| wanted == ns.as_str()))
            .flat_map(|(_, by_name)| by_name.values().map(|s| s.data.clone()))
            .collect()
    }

    /// Server-side apply `applied` on behalf of `manager`.
    ///
    /// Leaves owned by another manager with a different value are conflicts
    /// unless `force` is set. Leaves this manager applied before but omitted
    /// now are removed.
    pub fn apply(
        &self,
        gvr: &GVR,
        namespace: &str,
        name: &str,
        mut applied: Value,
        manager: &str,
        force: bool,
    ) -> Result<Value> {
        trace!("Applying object: {:?} {}/{} as {}", gvr, namespace, name, manager);

        if applied.get("apiVersion").is_none() || applied.get("kind").is_none() {
            return Err(Error::InvalidRequest(
                "apply requests must set apiVersion and kind".to_string(),
            ));
        }
        let meta = extract_metadata(&applied)?;
        if meta.name.as_deref() != Some(name) {
            return Err(Error::InvalidRequest(format!(
                "metadata.name must be {:?} to match the request path",
                name
            )));
        }
        if let Some(m) = applied.get_mut("metadata").and_then(Value::as_object_mut) {
            for server_field in ["resourceVersion", "managedFields", "uid", "creationTimestamp"] {
                m.remove(server_field);
            }
        }

        let leaves = owned_leaves(&applied);

        let mut stored = match self.stored(gvr, namespace, name) {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => {
                let mut object = applied;
                let mut meta = extract_metadata(&object)?;
                meta.resource_version = Some("1".to_string());
                ensure_metadata(&mut meta, namespace);
                object["metadata"] = serde_json::to_value(&meta)?;

                let owners = leaves
                    .keys()
                    .map(|ptr| (ptr.clone(), manager.to_string()))
                    .collect();
                let mut stored = StoredObject {
                    data: object,
                    owners,
                };
                set_managed_fields(&mut stored);
                self.store(gvr, namespace, name, stored.clone());
                debug!("Created object via apply: {}/{}", namespace, name);
                return Ok(stored.data);
            }
            Err(e) => return Err(e),
        };

        let conflicts: Vec<String> = leaves
            .iter()
            .filter_map(|(ptr, value)| {
                let owner = stored.owners.get(ptr)?;
                if owner == manager || stored.data.pointer(ptr) == Some(value) {
                    return None;
                }
                Some(format!("conflict with {:?}: {}", owner, pointer_to_path(ptr)))
            })
            .collect();
        if !conflicts.is_empty() && !force {
            return Err(Error::Conflict(format!(
                "Apply failed with {} conflict{}: {}",
                conflicts.len(),
                if conflicts.len() == 1 { "" } else { "s" },
                conflicts.join(", ")
            )));
        }

        let dropped: Vec<String> = stored
            .owners
            .iter()
            .filter(|(ptr, owner)| owner.as_str() == manager && !leaves.contains_key(*ptr))
            .map(|(ptr, _)| ptr.clone())
            .collect();
        for ptr in dropped {
            remove_pointer(&mut stored.data, &ptr);
            stored.owners.remove(&ptr);
        }

        json_patch::merge(&mut stored.data, &applied);
        for ptr in leaves.keys() {
            stored.owners.insert(ptr.clone(), manager.to_string());
        }

        bump_resource_version(&mut stored.data)?;
        set_managed_fields(&mut stored);
        self.store(gvr, namespace, name, stored.clone());

        debug!("Applied object: {}/{}", namespace, name);
        Ok(stored.data)
    }

    /// RFC 7386 merge patch; with `status_only` only the status stanza changes
    pub fn merge_patch(
        &self,
        gvr: &GVR,
        namespace: &str,
        name: &str,
        patch: &Value,
        status_only: bool,
    ) -> Result<Value> {
        let mut stored = self.stored(gvr, namespace, name)?;
        let mut patched = stored.data.clone();
        json_patch::merge(&mut patched, patch);

        if status_only {
            match patched.get("status") {
                Some(status) => stored.data["status"] = status.clone(),
                None => {
                    if let Some(m) = stored.data.as_object_mut() {
                        m.remove("status");
                    }
                }
            }
        } else {
            stored.data = patched;
        }
        self.update(gvr, namespace, name, stored)
    }

    /// RFC 6902 JSON patch
    pub fn json_patch(
        &self,
        gvr: &GVR,
        namespace: &str,
        name: &str,
        patch: &json_patch::Patch,
    ) -> Result<Value> {
        let mut stored = self.stored(gvr, namespace, name)?;
        json_patch::patch(&mut stored.data, patch)?;
        self.update(gvr, namespace, name, stored)
    }

    /// Delete an object; objects with finalizers are only marked for deletion
    pub fn delete(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Deleting object: {:?} {}/{}", gvr, namespace, name);

        let mut stored = self.stored(gvr, namespace, name)?;
        let mut meta = extract_metadata(&stored.data)?;

        if meta.finalizers.as_ref().is_some_and(|f| !f.is_empty()) {
            if meta.deletion_timestamp.is_none() {
                meta.deletion_timestamp = Some(Time(chrono::Utc::now()));
                stored.data["metadata"] = serde_json::to_value(&meta)?;
                bump_resource_version(&mut stored.data)?;
                self.store(gvr, namespace, name, stored.clone());
            }
            debug!("Marked object for deletion: {}/{}", namespace, name);
            return Ok(stored.data);
        }

        self.remove(gvr, namespace, name)
    }

    fn update(&self, gvr: &GVR, namespace: &str, name: &str, mut stored: StoredObject) -> Result<Value> {
        bump_resource_version(&mut stored.data)?;
        let meta = extract_metadata(&stored.data)?;
        if should_be_deleted(&meta) {
            return self.remove(gvr, namespace, name);
        }
        self.store(gvr, namespace, name, stored.clone());
        debug!("Updated object: {}/{}", namespace, name);
        Ok(stored.data)
    }

    fn stored(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<StoredObject> {
        let objects = self.objects.read().expect("ObjectStore lock poisoned");
        objects
            .get(gvr)
            .and_then(|by_ns| by_ns.get(namespace))
            .and_then(|by_name| by_name.get(name))
            .cloned()
            .ok_or_else(|| not_found(gvr, namespace, name))
    }

    fn store(&self, gvr: &GVR, namespace: &str, name: &str, stored: StoredObject) {
        let mut objects = self.objects.write().expect("ObjectStore lock poisoned");
        objects
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), stored);
    }

    fn remove(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        let mut objects = self.objects.write().expect("ObjectStore lock poisoned");
        let stored = objects
            .get_mut(gvr)
            .and_then(|by_ns| by_ns.get_mut(namespace))
            .and_then(|by_name| by_name.remove(name))
            .ok_or_else(|| not_found(gvr, namespace, name))?;
        debug!("Deleted object: {}/{}", namespace, name);
        Ok(stored.data)
    }
}

fn not_found(gvr: &GVR, namespace: &str, name: &str) -> Error {
    Error::NotFound {
        kind: gvr.resource.clone(),
        id: if namespace.is_empty() {
            name.to_string()
        } else {
            format!("{namespace}/{name}")
        },
    }
}

fn extract_metadata(object: &Value) -> Result<ObjectMeta> {
    let meta_value = object
        .get("metadata")
        .ok_or_else(|| Error::MetadataError("Object missing metadata field".to_string()))?;

    serde_json::from_value(meta_value.clone())
        .map_err(|e| Error::MetadataError(format!("Failed to parse metadata: {}", e)))
}

fn required_name(meta: &ObjectMeta) -> Result<String> {
    meta.name
        .clone()
        .ok_or_else(|| Error::InvalidRequest("Object name is required".to_string()))
}

pub(crate) fn increment_resource_version(current: &str) -> Result<String> {
    if current.is_empty() {
        return Ok("1".to_string());
    }
    let num: u64 = current
        .parse()
        .map_err(|_| Error::Internal(format!("Invalid resource version: {}", current)))?;
    Ok((num + 1).to_string())
}

fn bump_resource_version(object: &mut Value) -> Result<()> {
    let current = object
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    object["metadata"]["resourceVersion"] = Value::String(increment_resource_version(&current)?);
    Ok(())
}

fn should_be_deleted(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some() && meta.finalizers.as_ref().is_none_or(Vec::is_empty)
}

fn ensure_metadata(meta: &mut ObjectMeta, namespace: &str) {
    // cluster-scoped objects never carry a namespace
    if namespace.is_empty() {
        meta.namespace = None;
    } else if meta.namespace.is_none() {
        meta.namespace = Some(namespace.to_string());
    }
    if meta.creation_timestamp.is_none() {
        meta.creation_timestamp = Some(Time(chrono::Utc::now()));
    }
    if meta.uid.is_none() {
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
    }
}

fn set_managed_fields(stored: &mut StoredObject) {
    let api_version = stored
        .data
        .get("apiVersion")
        .cloned()
        .unwrap_or(Value::Null);
    let managers: BTreeSet<&String> = stored.owners.values().collect();
    let entries: Vec<Value> = managers
        .into_iter()
        .map(|manager| {
            json!({
                "manager": manager,
                "operation": "Apply",
                "apiVersion": api_version,
                "fieldsType": "FieldsV1",
            })
        })
        .collect();
    stored.data["metadata"]["managedFields"] = Value::Array(entries);
}

/// Leaf pointers of an applied configuration; lists are atomic
fn owned_leaves(applied: &Value) -> BTreeMap<String, Value> {
    let mut leaves = BTreeMap::new();
    let Some(object) = applied.as_object() else {
        return leaves;
    };
    for (key, value) in object {
        match key.as_str() {
            "apiVersion" | "kind" | "status" => {}
            "metadata" => {
                for section in ["labels", "annotations"] {
                    if let Some(entries) = value.get(section) {
                        collect_leaves(entries, &format!("/metadata/{section}"), &mut leaves);
                    }
                }
            }
            _ => collect_leaves(value, &format!("/{}", escape(key)), &mut leaves),
        }
    }
    leaves
}

fn collect_leaves(value: &Value, pointer: &str, leaves: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(entries) if !entries.is_empty() => {
            for (key, child) in entries {
                collect_leaves(child, &format!("{pointer}/{}", escape(key)), leaves);
            }
        }
        _ => {
            leaves.insert(pointer.to_string(), value.clone());
        }
    }
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn remove_pointer(value: &mut Value, pointer: &str) {
    let Some((parent, last)) = pointer.rsplit_once('/') else {
        return;
    };
    let parent_value = if parent.is_empty() {
        Some(value)
    } else {
        value.pointer_mut(parent)
    };
    if let Some(Value::Object(map)) = parent_value {
        map.remove(&unescape(last));
    }
}

fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .skip(1)
        .map(unescape)
        .fold(String::new(), |mut acc, segment| {
            acc.push('.');
            acc.push_str(&segment);
            acc
        })
}
