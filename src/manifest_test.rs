#[cfg(test)]
mod tests {
    use crate::Provider;
    use serde_json::{json, Value};

    const VPC_MANIFEST: &str = "k8s_ec2_services_k8s_aws_vpc_v1alpha1_manifest";

    #[test]
    fn test_render_manifest() {
        let provider = Provider::builder().build().unwrap();
        let manifest = provider.manifest(VPC_MANIFEST).unwrap();
        assert_eq!(manifest.type_name(), VPC_MANIFEST);

        let response = manifest.read(&json!({
            "metadata": {"name": "main", "namespace": "default", "labels": {"team": "network"}},
            "spec": {
                "cidr_blocks": ["10.0.0.0/16"],
                "enable_dns_support": true,
                "tags": [{"key": "env", "value": "prod"}]
            }
        }));
        assert!(!response.has_error(), "{:?}", response.diagnostics);

        let state = response.state.unwrap();
        assert_eq!(state["id"], "default/main");
        assert_eq!(state["metadata"]["annotations"], Value::Null);
        assert_eq!(state["spec"]["instance_tenancy"], Value::Null);

        let yaml = state["yaml"].as_str().unwrap();
        assert!(yaml.contains("kind: VPC"));
        assert!(yaml.contains("enableDNSSupport: true"));

        let object: Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            object,
            json!({
                "apiVersion": "ec2.services.k8s.aws/v1alpha1",
                "kind": "VPC",
                "metadata": {
                    "name": "main",
                    "namespace": "default",
                    "labels": {"team": "network"}
                },
                "spec": {
                    "cidrBlocks": ["10.0.0.0/16"],
                    "enableDNSSupport": true,
                    "tags": [{"key": "env", "value": "prod"}]
                }
            })
        );
    }

    #[test]
    fn test_render_cluster_scoped_manifest() {
        let provider = Provider::builder().build().unwrap();
        let manifest = provider
            .manifest("k8s_nfd_k8s_sigs_io_node_feature_rule_v1alpha1_manifest")
            .unwrap();

        let response = manifest.read(&json!({
            "metadata": {"name": "gpu"},
            "spec": {"rules": [{"name": "gpu"}]}
        }));
        let state = response.state.unwrap();
        assert_eq!(state["id"], "gpu");

        let object: Value = serde_yaml::from_str(state["yaml"].as_str().unwrap()).unwrap();
        assert_eq!(object["metadata"], json!({"name": "gpu"}));
        assert_eq!(object["spec"]["rules"][0]["name"], "gpu");
    }

    #[test]
    fn test_missing_required_argument() {
        let provider = Provider::builder().build().unwrap();
        let manifest = provider.manifest(VPC_MANIFEST).unwrap();

        let response = manifest.read(&json!({"metadata": {"name": "main", "namespace": "default"}}));
        assert!(response.state.is_none());
        let diagnostic = response.diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Missing required argument");
        assert_eq!(diagnostic.attribute.as_deref(), Some("spec"));
    }

    #[test]
    fn test_yaml_is_read_only() {
        let provider = Provider::builder().build().unwrap();
        let manifest = provider.manifest(VPC_MANIFEST).unwrap();

        let response = manifest.read(&json!({
            "metadata": {"name": "main", "namespace": "default"},
            "spec": {"cidr_blocks": []},
            "yaml": "kind: VPC"
        }));
        assert!(response.has_error());
        assert_eq!(
            response.diagnostics.iter().next().unwrap().attribute.as_deref(),
            Some("yaml")
        );
    }

    #[test]
    fn test_unknown_manifest_type() {
        let provider = Provider::builder().build().unwrap();
        assert!(provider.manifest("k8s_ec2_services_k8s_aws_vpc_v1alpha1").is_err());
        assert!(provider.manifest("k8s_unknown_manifest").is_err());
    }
}
