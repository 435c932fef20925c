//! Provider configuration, binding registry and type lookup

use crate::binding::{bindings_from_yaml, CrdBinding};
use crate::client::DynamicClient;
use crate::crds::builtin_bindings;
use crate::data_source::CrdDataSource;
use crate::diagnostics::Diagnostics;
use crate::manifest::CrdManifest;
use crate::registry::BindingRegistry;
use crate::resource::CrdResource;
use crate::schema::{Attribute, AttributeType, Schema};
use crate::validator::{validator_for, SchemaValidator};
use crate::{Error, Result};
use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_FIELD_MANAGER: &str = "k8s-crd-provider";

/// The provider configuration block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Path to a kubeconfig file; falls back to `KUBE_CONFIG_PATH`
    pub config_path: Option<PathBuf>,
    /// Context to use from the kubeconfig; falls back to `KUBE_CTX`
    pub config_context: Option<String>,
    pub field_manager: Option<String>,
    /// Extra CRD manifests to bind
    pub crd_files: Vec<PathBuf>,
    pub crd_urls: Vec<String>,
}

impl ProviderConfig {
    /// Parse a configuration object; `null` attributes count as unset
    pub fn from_value(value: &Value) -> Result<Self> {
        let stripped: serde_json::Map<String, Value> = match value {
            Value::Object(map) => map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Value::Null => serde_json::Map::new(),
            _ => return Err(Error::invalid_attribute("<root>", "expected an object")),
        };
        Ok(serde_json::from_value(Value::Object(stripped))?)
    }

    /// Fill unset attributes from `KUBE_CONFIG_PATH` and `KUBE_CTX`
    pub fn with_env_fallbacks(mut self) -> Self {
        if self.config_path.is_none() {
            self.config_path = std::env::var_os("KUBE_CONFIG_PATH").map(PathBuf::from);
        }
        if self.config_context.is_none() {
            self.config_context = std::env::var("KUBE_CTX").ok();
        }
        self
    }

    pub fn schema() -> Schema {
        Schema::new()
            .with_description("Manage Kubernetes custom resources.")
            .with_attribute(
                "config_path",
                Attribute::optional_string().with_description(
                    "Path to the kubeconfig file. Can also be set with the `KUBE_CONFIG_PATH` environment variable.",
                ),
            )
            .with_attribute(
                "config_context",
                Attribute::optional_string().with_description(
                    "Context to use from the kubeconfig. Can also be set with the `KUBE_CTX` environment variable.",
                ),
            )
            .with_attribute(
                "field_manager",
                Attribute::optional_string().with_description(format!(
                    "Default field manager for server-side apply. Defaults to `{DEFAULT_FIELD_MANAGER}`."
                )),
            )
            .with_attribute(
                "crd_files",
                Attribute::new(AttributeType::list(AttributeType::String))
                    .optional()
                    .with_description("CRD manifest files whose types are added to the provider."),
            )
            .with_attribute(
                "crd_urls",
                Attribute::new(AttributeType::list(AttributeType::String))
                    .optional()
                    .with_description("URLs of CRD manifests whose types are added to the provider."),
            )
    }
}

/// State shared by every resource and data source once the provider is configured
pub struct ProviderData {
    pub(crate) client: Option<DynamicClient>,
    pub(crate) field_manager: String,
    pub(crate) validator: Option<Arc<dyn SchemaValidator>>,
}

impl ProviderData {
    pub(crate) fn client(&self) -> Result<&DynamicClient> {
        self.client.as_ref().ok_or(Error::NotConfigured)
    }
}

/// Schemas served by the provider, keyed by type name
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSchema {
    pub provider: Schema,
    pub resource_schemas: BTreeMap<String, Schema>,
    pub data_source_schemas: BTreeMap<String, Schema>,
}

pub struct Provider {
    registry: BindingRegistry,
    client: Option<kube::Client>,
    data: Arc<ProviderData>,
}

impl Provider {
    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::new()
    }

    pub fn registry(&self) -> &BindingRegistry {
        &self.registry
    }

    pub fn is_configured(&self) -> bool {
        self.data.client.is_some()
    }

    /// Apply the provider block: load extra CRDs and connect to the cluster.
    ///
    /// A client injected with [`ProviderBuilder::with_client`] takes precedence
    /// over kubeconfig.
    pub async fn configure(&mut self, config: ProviderConfig) -> Diagnostics {
        match self.try_configure(config).await {
            Ok(()) => Diagnostics::new(),
            Err(e) => e.into(),
        }
    }

    async fn try_configure(&mut self, config: ProviderConfig) -> Result<()> {
        let config = config.with_env_fallbacks();

        for path in &config.crd_files {
            for binding in read_crd_file(path)? {
                self.registry.register(binding);
            }
        }
        for url in &config.crd_urls {
            for binding in fetch_crds(url).await? {
                self.registry.register(binding);
            }
        }

        let client = match &self.client {
            Some(client) => client.clone(),
            None => kube_client(&config).await?,
        };

        let bindings: Vec<CrdBinding> = self.registry.bindings().iter().map(|b| (**b).clone()).collect();
        self.data = Arc::new(ProviderData {
            client: Some(DynamicClient::new(client)),
            field_manager: config
                .field_manager
                .unwrap_or_else(|| self.data.field_manager.clone()),
            validator: validator_for(&bindings)?,
        });

        info!("Configured provider with {} CRD bindings", self.registry.len());
        Ok(())
    }

    pub fn schema(&self) -> ProviderSchema {
        let mut resource_schemas = BTreeMap::new();
        let mut data_source_schemas = BTreeMap::new();
        for binding in self.registry.bindings() {
            resource_schemas.insert(binding.type_name(), binding.resource_schema());
            data_source_schemas.insert(binding.type_name(), binding.data_source_schema());
            data_source_schemas.insert(binding.manifest_type_name(), binding.manifest_schema());
        }
        ProviderSchema {
            provider: ProviderConfig::schema(),
            resource_schemas,
            data_source_schemas,
        }
    }

    /// Run `validate_implementation` on every schema the provider serves
    pub fn validate_schemas(&self) -> Diagnostics {
        let schema = self.schema();
        let mut diagnostics = Diagnostics::new();

        let all = std::iter::once(("provider".to_string(), &schema.provider))
            .chain(schema.resource_schemas.iter().map(|(k, v)| (k.clone(), v)))
            .chain(schema.data_source_schemas.iter().map(|(k, v)| (k.clone(), v)));
        for (type_name, schema) in all {
            for mut diagnostic in schema.validate_implementation() {
                diagnostic.detail = format!("{type_name}: {}", diagnostic.detail);
                diagnostics.push(diagnostic);
            }
        }
        diagnostics
    }

    pub fn resource(&self, type_name: &str) -> Result<CrdResource> {
        let binding = self
            .registry
            .lookup(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        Ok(CrdResource::new(binding, Arc::clone(&self.data)))
    }

    pub fn data_source(&self, type_name: &str) -> Result<CrdDataSource> {
        let binding = self
            .registry
            .lookup(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        Ok(CrdDataSource::new(binding, Arc::clone(&self.data)))
    }

    pub fn manifest(&self, type_name: &str) -> Result<CrdManifest> {
        let binding = self
            .registry
            .lookup_manifest(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))?;
        Ok(CrdManifest::new(binding))
    }
}

/// Builder for [`Provider`]
///
/// ```rust
/// use k8s_crd_provider::Provider;
///
/// let provider = Provider::builder().build().unwrap();
/// assert!(provider.resource("k8s_ec2_services_k8s_aws_vpc_v1alpha1").is_ok());
/// ```
pub struct ProviderBuilder {
    builtin: bool,
    bindings: Vec<CrdBinding>,
    client: Option<kube::Client>,
    field_manager: String,
}

impl ProviderBuilder {
    pub fn new() -> Self {
        Self {
            builtin: true,
            bindings: Vec::new(),
            client: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
        }
    }

    /// Leave out the built-in EC2 and NFD bindings
    pub fn without_builtin(mut self) -> Self {
        self.builtin = false;
        self
    }

    pub fn with_binding(mut self, binding: CrdBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Bind every CRD in a multi-document YAML file
    pub fn with_crd_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.bindings.extend(read_crd_file(path.as_ref())?);
        Ok(self)
    }

    /// Use `client` instead of building one from kubeconfig.
    ///
    /// The provider is configured right away, so resources work without
    /// calling [`Provider::configure`].
    pub fn with_client(mut self, client: kube::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    pub fn build(self) -> Result<Provider> {
        let registry = BindingRegistry::new();
        if self.builtin {
            for binding in builtin_bindings()? {
                registry.register(binding);
            }
        }
        for binding in self.bindings {
            registry.register(binding);
        }

        let bindings: Vec<CrdBinding> = registry.bindings().iter().map(|b| (**b).clone()).collect();
        let data = ProviderData {
            client: self.client.clone().map(DynamicClient::new),
            field_manager: self.field_manager,
            validator: validator_for(&bindings)?,
        };
        debug!("Built provider with {} CRD bindings", registry.len());

        Ok(Provider {
            registry,
            client: self.client,
            data: Arc::new(data),
        })
    }
}

impl Default for ProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn read_crd_file(path: &Path) -> Result<Vec<CrdBinding>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Internal(format!("Failed to read CRD file {:?}: {}", path, e)))?;
    let bindings = bindings_from_yaml(&content)?;
    debug!("Loaded {} bindings from {:?}", bindings.len(), path);
    Ok(bindings)
}

async fn fetch_crds(url: &str) -> Result<Vec<CrdBinding>> {
    let content = reqwest::get(url).await?.error_for_status()?.text().await?;
    let bindings = bindings_from_yaml(&content)?;
    debug!("Loaded {} bindings from {}", bindings.len(), url);
    Ok(bindings)
}

async fn kube_client(config: &ProviderConfig) -> Result<kube::Client> {
    let options = KubeConfigOptions {
        context: config.config_context.clone(),
        ..KubeConfigOptions::default()
    };

    let kube_config = match &config.config_path {
        Some(path) => {
            let kubeconfig =
                Kubeconfig::read_from(path).map_err(|e| Error::Kubeconfig(e.to_string()))?;
            Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| Error::Kubeconfig(e.to_string()))?
        }
        None if config.config_context.is_some() => Config::from_kubeconfig(&options)
            .await
            .map_err(|e| Error::Kubeconfig(e.to_string()))?,
        None => Config::infer()
            .await
            .map_err(|e| Error::Kubeconfig(e.to_string()))?,
    };

    Ok(kube::Client::try_from(kube_config)?)
}
