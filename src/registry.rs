//! Registry of CRD bindings
//!
//! Bindings are looked up by the type name Terraform configuration refers to
//! (resource, data source or manifest) and by group/version/kind. Like CRDs in
//! a cluster, a type must be registered before it can be used.

use crate::binding::CrdBinding;
use crate::gvk::GVK;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct BindingRegistry {
    /// Resource / data source type name -> binding
    by_type_name: RwLock<BTreeMap<String, Arc<CrdBinding>>>,
    by_gvk: RwLock<BTreeMap<GVK, Arc<CrdBinding>>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding, replacing any binding for the same GVK
    pub fn register(&self, binding: CrdBinding) -> Arc<CrdBinding> {
        let binding = Arc::new(binding);
        let type_name = binding.type_name();

        let previous = self
            .by_gvk
            .write()
            .expect("BindingRegistry lock poisoned")
            .insert(binding.gvk.clone(), Arc::clone(&binding));
        if previous.is_some() {
            warn!("Replacing binding for {}", binding.gvk);
        }

        self.by_type_name
            .write()
            .expect("BindingRegistry lock poisoned")
            .insert(type_name.clone(), Arc::clone(&binding));

        debug!("Registered {} as {}", binding.gvk, type_name);
        binding
    }

    /// Look up by resource or data source type name
    pub fn lookup(&self, type_name: &str) -> Option<Arc<CrdBinding>> {
        self.by_type_name
            .read()
            .expect("BindingRegistry lock poisoned")
            .get(type_name)
            .cloned()
    }

    /// Look up by manifest type name (`<type name>_manifest`)
    pub fn lookup_manifest(&self, type_name: &str) -> Option<Arc<CrdBinding>> {
        type_name
            .strip_suffix("_manifest")
            .and_then(|base| self.lookup(base))
    }

    pub fn lookup_by_gvk(&self, gvk: &GVK) -> Option<Arc<CrdBinding>> {
        self.by_gvk
            .read()
            .expect("BindingRegistry lock poisoned")
            .get(gvk)
            .cloned()
    }

    /// All bindings, ordered by type name
    pub fn bindings(&self) -> Vec<Arc<CrdBinding>> {
        self.by_type_name
            .read()
            .expect("BindingRegistry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_gvk.read().expect("BindingRegistry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
