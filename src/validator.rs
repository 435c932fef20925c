use crate::binding::CrdBinding;
use crate::error::Result;
use crate::gvk::GVK;
#[cfg(feature = "validation")]
use crate::error::Error;
use serde_json::Value;

/// Trait for client-side validation of objects before they are applied
pub trait SchemaValidator: Send + Sync {
    /// Validate a Kubernetes object against the schema registered for `gvk`.
    ///
    /// Kinds without a registered schema pass.
    fn validate(&self, gvk: &GVK, value: &Value) -> Result<()>;
}

#[cfg(feature = "validation")]
mod openapi_validator {
    use super::*;
    use jsonschema::JSONSchema;
    use std::collections::HashMap;
    use std::sync::RwLock;
    use tracing::debug;

    /// Validates objects against the OpenAPI v3 schemas of registered CRDs.
    ///
    /// Schemas are compiled on first use and cached.
    #[derive(Default)]
    pub struct OpenApiValidator {
        definitions: RwLock<HashMap<GVK, Value>>,
        schemas: RwLock<HashMap<GVK, JSONSchema>>,
    }

    impl OpenApiValidator {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register the root schema of a binding.
        ///
        /// `metadata` is left to the API server, which validates it against
        /// `ObjectMeta` rather than the CRD.
        pub fn register(&self, binding: &CrdBinding) -> Result<()> {
            let mut definition = serde_json::to_value(&binding.schema)?;
            if let Some(props) = definition.get_mut("properties").and_then(Value::as_object_mut) {
                props.remove("metadata");
            }
            if let Some(required) = definition.get_mut("required").and_then(Value::as_array_mut) {
                required.retain(|r| r != "metadata");
            }

            self.definitions
                .write()
                .map_err(|e| Error::Internal(format!("Failed to acquire write lock: {}", e)))?
                .insert(binding.gvk.clone(), definition);
            self.schemas
                .write()
                .map_err(|e| Error::Internal(format!("Failed to acquire write lock: {}", e)))?
                .remove(&binding.gvk);

            debug!("Registered validation schema for {}", binding.gvk);
            Ok(())
        }

        fn get_or_compile_schema(&self, gvk: &GVK) -> Result<bool> {
            {
                let cache = self
                    .schemas
                    .read()
                    .map_err(|e| Error::Internal(format!("Failed to acquire read lock: {}", e)))?;
                if cache.contains_key(gvk) {
                    return Ok(true);
                }
            }

            let definitions = self
                .definitions
                .read()
                .map_err(|e| Error::Internal(format!("Failed to acquire read lock: {}", e)))?;
            let Some(definition) = definitions.get(gvk) else {
                return Ok(false);
            };

            let mut schema = definition.clone();
            schema["$schema"] = Value::String("http://json-schema.org/draft-04/schema#".to_string());

            let compiled = JSONSchema::compile(&schema).map_err(|e| {
                Error::Internal(format!("Failed to compile schema for '{}': {}", gvk, e))
            })?;

            self.schemas
                .write()
                .map_err(|e| Error::Internal(format!("Failed to acquire write lock: {}", e)))?
                .insert(gvk.clone(), compiled);

            Ok(true)
        }
    }

    impl SchemaValidator for OpenApiValidator {
        fn validate(&self, gvk: &GVK, value: &Value) -> Result<()> {
            if !self.get_or_compile_schema(gvk)? {
                return Ok(());
            }

            let schemas = self
                .schemas
                .read()
                .map_err(|e| Error::Internal(format!("Failed to acquire read lock: {}", e)))?;

            if let Some(schema) = schemas.get(gvk) {
                if let Err(validation_errors) = schema.validate(value) {
                    let errors: Vec<String> = validation_errors
                        .map(|e| format!("{}: {}", e.instance_path, e))
                        .collect();

                    return Err(Error::ValidationFailed {
                        kind: gvk.kind.clone(),
                        errors,
                    });
                }
            }

            Ok(())
        }
    }
}

#[cfg(feature = "validation")]
pub use openapi_validator::OpenApiValidator;

impl<T: SchemaValidator + ?Sized> SchemaValidator for std::sync::Arc<T> {
    fn validate(&self, gvk: &GVK, value: &Value) -> Result<()> {
        (**self).validate(gvk, value)
    }
}

/// Builds a validator for `bindings`, or `None` without the `validation` feature
pub fn validator_for(bindings: &[CrdBinding]) -> Result<Option<std::sync::Arc<dyn SchemaValidator>>> {
    #[cfg(feature = "validation")]
    {
        let validator = OpenApiValidator::new();
        for binding in bindings {
            validator.register(binding)?;
        }
        Ok(Some(std::sync::Arc::new(validator)))
    }
    #[cfg(not(feature = "validation"))]
    {
        let _ = bindings;
        Ok(None)
    }
}
