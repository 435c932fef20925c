//! Tests for request routing in the fake API server

#[cfg(test)]
mod tests {
    use crate::fake::service::*;

    #[test]
    fn test_parse_namespaced_path() {
        let parsed =
            FakeApiServer::parse_path("/apis/ec2.services.k8s.aws/v1alpha1/namespaces/default/vpcs/main")
                .unwrap();
        assert_eq!(parsed.group.as_deref(), Some("ec2.services.k8s.aws"));
        assert_eq!(parsed.version, "v1alpha1");
        assert_eq!(parsed.namespace.as_deref(), Some("default"));
        assert_eq!(parsed.resource, "vpcs");
        assert_eq!(parsed.name.as_deref(), Some("main"));
        assert!(!parsed.status);
    }

    #[test]
    fn test_parse_cluster_scoped_path() {
        let parsed = FakeApiServer::parse_path("/apis/nfd.k8s-sigs.io/v1alpha1/nodefeaturerules/gpu").unwrap();
        assert_eq!(parsed.namespace, None);
        assert_eq!(parsed.resource, "nodefeaturerules");
        assert_eq!(parsed.name.as_deref(), Some("gpu"));
    }

    #[test]
    fn test_parse_status_and_list_paths() {
        let status = FakeApiServer::parse_path("/api/v1/namespaces/default/configmaps/settings/status").unwrap();
        assert!(status.status);
        assert_eq!(status.group, None);
        assert_eq!(status.name.as_deref(), Some("settings"));

        let list = FakeApiServer::parse_path("/apis/ec2.services.k8s.aws/v1alpha1/namespaces/default/vpcs").unwrap();
        assert_eq!(list.name, None);

        assert!(FakeApiServer::parse_path("/healthz").is_none());
    }

    #[test]
    fn test_parse_patch_query() {
        let params = FakeApiServer::parse_patch_query(Some("fieldManager=my%20manager&force=true"));
        assert_eq!(params.field_manager.as_deref(), Some("my manager"));
        assert!(params.force);

        assert_eq!(FakeApiServer::parse_patch_query(None), PatchQuery::default());
    }

    #[test]
    fn test_determine_patch_type() {
        assert_eq!(
            FakeApiServer::determine_patch_type(Some("application/apply-patch+yaml")),
            PatchType::ApplyPatch
        );
        assert_eq!(
            FakeApiServer::determine_patch_type(Some("application/json-patch+json")),
            PatchType::JsonPatch
        );
        assert_eq!(
            FakeApiServer::determine_patch_type(Some("application/strategic-merge-patch+json")),
            PatchType::MergePatch
        );
    }
}
