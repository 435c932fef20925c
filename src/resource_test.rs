#[cfg(test)]
mod tests {
    use crate::fake::FakeCluster;
    use crate::gvk::GVR;
    use crate::resource::*;
    use crate::Provider;
    use serde_json::{json, Value};
    use std::time::Duration;

    const VPC: &str = "k8s_ec2_services_k8s_aws_vpc_v1alpha1";
    const NODE_FEATURE_RULE: &str = "k8s_nfd_k8s_sigs_io_node_feature_rule_v1alpha1";

    fn vpcs() -> GVR {
        GVR::new("ec2.services.k8s.aws", "v1alpha1", "vpcs")
    }

    fn vpc_config(name: &str, cidr: &str) -> Value {
        json!({
            "metadata": {"name": name, "namespace": "default"},
            "spec": {"cidr_blocks": [cidr], "enable_dns_support": true}
        })
    }

    fn setup() -> (FakeCluster, CrdResource) {
        let cluster = FakeCluster::new();
        let provider = Provider::builder()
            .with_client(cluster.client())
            .build()
            .unwrap();
        let resource = provider.resource(VPC).unwrap();
        (cluster, resource)
    }

    fn planned(resource: &CrdResource, config: &Value) -> Value {
        let plan = resource.plan(None, config);
        assert!(!plan.diagnostics.has_error(), "{:?}", plan.diagnostics);
        plan.planned_state.unwrap()
    }

    async fn create(resource: &CrdResource, config: &Value) -> Value {
        let response = resource.create(&planned(resource, config)).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        response.state.unwrap()
    }

    fn summaries(response: &Response) -> Vec<String> {
        response
            .diagnostics
            .iter()
            .map(|d| d.summary.clone())
            .collect()
    }

    #[test]
    fn test_plan_fills_computed_values() {
        let provider = Provider::builder().build().unwrap();
        let resource = provider.resource(VPC).unwrap();

        let plan = resource.plan(None, &vpc_config("main", "10.0.0.0/16"));
        let state = plan.planned_state.unwrap();

        assert_eq!(state["id"], "default/main");
        assert_eq!(state["api_version"], "ec2.services.k8s.aws/v1alpha1");
        assert_eq!(state["kind"], "VPC");
        assert_eq!(state["field_manager"], "k8s-crd-provider");
        assert_eq!(state["force_conflicts"], false);
        assert_eq!(state["wait_for"], Value::Null);
        assert_eq!(state["metadata"]["labels"], Value::Null);
        assert_eq!(state["spec"]["instance_tenancy"], Value::Null);
        assert!(plan.requires_replace.is_empty());
    }

    #[test]
    fn test_plan_keeps_configured_field_manager() {
        let provider = Provider::builder().build().unwrap();
        let resource = provider.resource(VPC).unwrap();

        let mut config = vpc_config("main", "10.0.0.0/16");
        config["field_manager"] = json!("platform-team");
        config["force_conflicts"] = json!(true);

        let state = resource.plan(None, &config).planned_state.unwrap();
        assert_eq!(state["field_manager"], "platform-team");
        assert_eq!(state["force_conflicts"], true);
    }

    #[test]
    fn test_plan_lists_requires_replace_paths() {
        let provider = Provider::builder().build().unwrap();
        let resource = provider.resource(VPC).unwrap();
        let prior = resource
            .plan(None, &vpc_config("main", "10.0.0.0/16"))
            .planned_state
            .unwrap();

        let plan = resource.plan(Some(&prior), &vpc_config("main", "10.1.0.0/16"));
        assert!(plan.requires_replace.is_empty());

        let plan = resource.plan(Some(&prior), &vpc_config("other", "10.0.0.0/16"));
        assert_eq!(plan.requires_replace, vec!["metadata.name"]);
    }

    #[test]
    fn test_validate_config() {
        let provider = Provider::builder().build().unwrap();
        let resource = provider.resource(VPC).unwrap();

        let mut config = vpc_config("Not_A_Name", "10.0.0.0/16");
        config["metadata"]["labels"] = json!({"bad key": "x"});
        config["deletion_propagation"] = json!("Sometimes");
        config["spec"]["instance_tenancy"] = json!("shared");
        config["wait_for"] = json!([{"jsonpath": "..status", "value": "x"}]);
        config["wait_for_delete"] = json!({"timeout": "soon"});
        config["id"] = json!("default/main");

        let diagnostics = resource.validate_config(&config);
        let attributes: Vec<Option<String>> =
            diagnostics.iter().map(|d| d.attribute.clone()).collect();

        assert!(attributes.contains(&Some("metadata.name".to_string())));
        assert!(attributes.contains(&Some("metadata.labels".to_string())));
        assert!(attributes.contains(&Some("deletion_propagation".to_string())));
        assert!(attributes.contains(&Some("spec.instance_tenancy".to_string())));
        assert!(attributes.contains(&Some("wait_for_delete.timeout".to_string())));
        assert!(attributes.contains(&Some("id".to_string())));
        assert!(diagnostics
            .iter()
            .any(|d| d.summary == "Invalid JSONPath expression"));
    }

    #[test]
    fn test_namespace_must_be_dns_label() {
        let provider = Provider::builder().build().unwrap();
        let resource = provider.resource(VPC).unwrap();

        let mut config = vpc_config("main.v2", "10.0.0.0/16");
        config["metadata"]["namespace"] = json!("team.prod");

        let diagnostics = resource.validate_config(&config);
        let attributes: Vec<Option<String>> =
            diagnostics.iter().map(|d| d.attribute.clone()).collect();
        assert_eq!(attributes, vec![Some("metadata.namespace".to_string())]);

        config["metadata"]["namespace"] = json!("team-prod");
        assert!(!resource.validate_config(&config).has_error());
    }

    #[test]
    fn test_missing_required_spec_field() {
        let provider = Provider::builder().build().unwrap();
        let resource = provider.resource(VPC).unwrap();

        let plan = resource.plan(
            None,
            &json!({"metadata": {"name": "main", "namespace": "default"}, "spec": {}}),
        );
        assert!(plan.planned_state.is_none());
        let diagnostic = plan.diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Missing required argument");
        assert_eq!(diagnostic.attribute.as_deref(), Some("spec.cidr_blocks"));
    }

    #[tokio::test]
    async fn test_create() {
        let (cluster, resource) = setup();
        let state = create(&resource, &vpc_config("main", "10.0.0.0/16")).await;

        assert_eq!(state["id"], "default/main");
        assert_eq!(state["spec"]["cidr_blocks"], json!(["10.0.0.0/16"]));

        let object = cluster.get(&vpcs(), "default", "main").unwrap();
        assert_eq!(object["spec"]["cidrBlocks"], json!(["10.0.0.0/16"]));
        assert_eq!(object["spec"]["enableDNSSupport"], true);
        assert_eq!(object["metadata"]["managedFields"][0]["manager"], "k8s-crd-provider");
        assert_eq!(object["metadata"]["managedFields"][0]["operation"], "Apply");
    }

    #[tokio::test]
    async fn test_create_cluster_scoped() {
        let cluster = FakeCluster::new();
        let provider = Provider::builder()
            .with_client(cluster.client())
            .build()
            .unwrap();
        let resource = provider.resource(NODE_FEATURE_RULE).unwrap();

        let config = json!({
            "metadata": {"name": "gpu"},
            "spec": {"rules": [{"name": "gpu", "labels": {"nvidia.com/gpu": "true"}}]}
        });
        let state = create(&resource, &config).await;
        assert_eq!(state["id"], "gpu");

        let gvr = GVR::new("nfd.k8s-sigs.io", "v1alpha1", "nodefeaturerules");
        let object = cluster.get(&gvr, "", "gpu").unwrap();
        assert_eq!(object["spec"]["rules"][0]["labels"]["nvidia.com/gpu"], "true");
        assert!(object["metadata"].get("namespace").is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_spec_attribute() {
        let (cluster, resource) = setup();

        let mut plan = planned(&resource, &vpc_config("main", "10.0.0.0/16"));
        plan["spec"]["bogus"] = json!(true);

        let response = resource.create(&plan).await;
        assert_eq!(summaries(&response), vec!["Unsupported argument"]);
        assert!(cluster.get(&vpcs(), "default", "main").is_err());
    }

    #[tokio::test]
    async fn test_update() {
        let (cluster, resource) = setup();
        let prior = create(&resource, &vpc_config("main", "10.0.0.0/16")).await;

        let plan = resource.plan(Some(&prior), &vpc_config("main", "10.1.0.0/16"));
        let response = resource
            .update(&prior, plan.planned_state.as_ref().unwrap())
            .await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);

        let object = cluster.get(&vpcs(), "default", "main").unwrap();
        assert_eq!(object["spec"]["cidrBlocks"], json!(["10.1.0.0/16"]));
        assert_eq!(object["metadata"]["resourceVersion"], "2");
    }

    #[tokio::test]
    async fn test_update_drops_removed_fields() {
        let (cluster, resource) = setup();
        let prior = create(&resource, &vpc_config("main", "10.0.0.0/16")).await;

        let config = json!({
            "metadata": {"name": "main", "namespace": "default"},
            "spec": {"cidr_blocks": ["10.0.0.0/16"]}
        });
        let plan = planned(&resource, &config);
        let response = resource.update(&prior, &plan).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);

        let object = cluster.get(&vpcs(), "default", "main").unwrap();
        assert!(object["spec"].get("enableDNSSupport").is_none());
    }

    #[tokio::test]
    async fn test_update_refuses_replacement() {
        let (_cluster, resource) = setup();
        let prior = create(&resource, &vpc_config("main", "10.0.0.0/16")).await;

        let plan = planned(&resource, &vpc_config("renamed", "10.0.0.0/16"));
        let response = resource.update(&prior, &plan).await;

        assert_eq!(summaries(&response), vec!["Resource requires replacement"]);
        assert_eq!(
            response.diagnostics.iter().next().unwrap().attribute.as_deref(),
            Some("metadata.name")
        );
    }

    #[tokio::test]
    async fn test_apply_conflict_with_other_manager() {
        let (cluster, resource) = setup();
        cluster
            .store()
            .apply(
                &vpcs(),
                "default",
                "main",
                json!({
                    "apiVersion": "ec2.services.k8s.aws/v1alpha1",
                    "kind": "VPC",
                    "metadata": {"name": "main", "namespace": "default"},
                    "spec": {"cidrBlocks": ["10.9.0.0/16"]}
                }),
                "kubectl",
                false,
            )
            .unwrap();

        let response = resource
            .create(&planned(&resource, &vpc_config("main", "10.0.0.0/16")))
            .await;
        assert_eq!(summaries(&response), vec!["Error from Kubernetes API"]);
        let detail = &response.diagnostics.iter().next().unwrap().detail;
        assert!(detail.contains(r#"conflict with "kubectl""#), "{detail}");

        let object = cluster.get(&vpcs(), "default", "main").unwrap();
        assert_eq!(object["spec"]["cidrBlocks"], json!(["10.9.0.0/16"]));
    }

    #[tokio::test]
    async fn test_apply_force_conflicts() {
        let (cluster, resource) = setup();
        cluster
            .store()
            .apply(
                &vpcs(),
                "default",
                "main",
                json!({
                    "apiVersion": "ec2.services.k8s.aws/v1alpha1",
                    "kind": "VPC",
                    "metadata": {"name": "main", "namespace": "default"},
                    "spec": {"cidrBlocks": ["10.9.0.0/16"]}
                }),
                "kubectl",
                false,
            )
            .unwrap();

        let mut config = vpc_config("main", "10.0.0.0/16");
        config["force_conflicts"] = json!(true);
        let state = create(&resource, &config).await;
        assert_eq!(state["force_conflicts"], true);

        let object = cluster.get(&vpcs(), "default", "main").unwrap();
        assert_eq!(object["spec"]["cidrBlocks"], json!(["10.0.0.0/16"]));
    }

    #[tokio::test]
    async fn test_custom_field_manager() {
        let (cluster, resource) = setup();
        let mut config = vpc_config("main", "10.0.0.0/16");
        config["field_manager"] = json!("platform-team");
        create(&resource, &config).await;

        let object = cluster.get(&vpcs(), "default", "main").unwrap();
        assert_eq!(object["metadata"]["managedFields"][0]["manager"], "platform-team");
    }

    #[tokio::test]
    async fn test_wait_for_condition() {
        let (cluster, resource) = setup();

        let controller = {
            let cluster = cluster.clone();
            tokio::spawn(async move {
                loop {
                    let status = json!({"state": "available", "vpcID": "vpc-0abc"});
                    if cluster.set_status(&vpcs(), "default", "main", status).is_ok() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        let mut config = vpc_config("main", "10.0.0.0/16");
        config["wait_for"] = json!([{
            "jsonpath": ".status.state",
            "value": "available",
            "timeout": "5s",
            "poll_interval": "10ms"
        }]);
        let state = create(&resource, &config).await;
        controller.await.unwrap();

        assert_eq!(state["wait_for"][0]["value"], "available");
        let object = cluster.get(&vpcs(), "default", "main").unwrap();
        assert_eq!(object["status"]["state"], "available");
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let (_cluster, resource) = setup();

        let mut config = vpc_config("main", "10.0.0.0/16");
        config["wait_for"] = json!([{
            "jsonpath": "{.status.state}",
            "value": "available",
            "timeout": "50ms",
            "poll_interval": "10ms"
        }]);
        let response = resource.create(&planned(&resource, &config)).await;

        assert_eq!(summaries(&response), vec!["Timed out waiting for condition"]);
        assert!(response.diagnostics.iter().next().unwrap().detail.contains("{.status.state}"));
    }

    #[tokio::test]
    async fn test_wait_for_timeout_keeps_state() {
        let (cluster, resource) = setup();

        let mut config = vpc_config("main", "10.0.0.0/16");
        config["wait_for"] = json!([{
            "jsonpath": ".status.state",
            "value": "available",
            "timeout": "50ms",
            "poll_interval": "10ms"
        }]);
        let response = resource.create(&planned(&resource, &config)).await;

        assert!(response.has_error());
        let state = response.state.unwrap();
        assert_eq!(state["id"], "default/main");
        assert_eq!(state["spec"]["cidr_blocks"], json!(["10.0.0.0/16"]));
        assert!(cluster.get(&vpcs(), "default", "main").is_ok());

        let refreshed = resource.read(&state).await;
        assert_eq!(refreshed.state.unwrap()["id"], "default/main");
    }

    #[tokio::test]
    async fn test_wait_for_timeout_shorter_than_poll_interval() {
        let (cluster, resource) = setup();

        let controller = {
            let cluster = cluster.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let status = json!({"state": "available"});
                while cluster.set_status(&vpcs(), "default", "main", status.clone()).is_err() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        let mut config = vpc_config("main", "10.0.0.0/16");
        config["wait_for"] = json!([{
            "jsonpath": ".status.state",
            "value": "available",
            "timeout": "1500ms",
            "poll_interval": "2s"
        }]);
        let started = tokio::time::Instant::now();
        let response = resource.create(&planned(&resource, &config)).await;
        controller.await.unwrap();

        assert!(!response.has_error(), "{:?}", response.diagnostics);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_read_unchanged() {
        let (_cluster, resource) = setup();
        let state = create(&resource, &vpc_config("main", "10.0.0.0/16")).await;

        let response = resource.read(&state).await;
        assert!(response.diagnostics.is_empty());
        assert_eq!(response.state.unwrap(), state);
    }

    #[tokio::test]
    async fn test_read_detects_drift() {
        let (cluster, resource) = setup();
        let state = create(&resource, &vpc_config("main", "10.0.0.0/16")).await;

        cluster
            .patch(
                &vpcs(),
                "default",
                "main",
                &json!({
                    "metadata": {"labels": {"injected": "by-webhook"}},
                    "spec": {"cidrBlocks": ["10.2.0.0/16"], "instanceTenancy": "dedicated"}
                }),
            )
            .unwrap();

        let refreshed = resource.read(&state).await.state.unwrap();
        assert_eq!(refreshed["spec"]["cidr_blocks"], json!(["10.2.0.0/16"]));
        // fields the configuration never set are not tracked
        assert_eq!(refreshed["spec"]["instance_tenancy"], Value::Null);
        assert_eq!(refreshed["metadata"]["labels"], Value::Null);
    }

    #[tokio::test]
    async fn test_read_missing_object_removes_state() {
        let (cluster, resource) = setup();
        let state = create(&resource, &vpc_config("main", "10.0.0.0/16")).await;
        cluster.store().delete(&vpcs(), "default", "main").unwrap();

        let response = resource.read(&state).await;
        assert!(response.state.is_none());
        assert!(!response.has_error());
        let warning = response.diagnostics.warnings().next().unwrap();
        assert_eq!(warning.summary, "Resource not found");
    }

    #[tokio::test]
    async fn test_delete() {
        let (cluster, resource) = setup();
        let state = create(&resource, &vpc_config("main", "10.0.0.0/16")).await;

        let response = resource.delete(&state).await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert!(response.state.is_none());
        assert!(cluster.get(&vpcs(), "default", "main").unwrap_err().is_not_found());

        // already gone
        let response = resource.delete(&state).await;
        assert!(!response.has_error());
    }

    #[tokio::test]
    async fn test_delete_with_propagation_and_wait() {
        let (cluster, resource) = setup();
        let mut config = vpc_config("main", "10.0.0.0/16");
        config["deletion_propagation"] = json!("Foreground");
        config["wait_for_delete"] = json!({"timeout": "1s", "poll_interval": "10ms"});
        let state = create(&resource, &config).await;

        let response = resource.delete(&state).await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        assert!(cluster.get(&vpcs(), "default", "main").is_err());
    }

    #[tokio::test]
    async fn test_delete_wait_times_out_on_finalizers() {
        let (cluster, resource) = setup();
        let mut config = vpc_config("main", "10.0.0.0/16");
        config["wait_for_delete"] = json!({"timeout": "50ms", "poll_interval": "10ms"});
        let state = create(&resource, &config).await;

        cluster
            .patch(
                &vpcs(),
                "default",
                "main",
                &json!({"metadata": {"finalizers": ["services.k8s.aws/resources"]}}),
            )
            .unwrap();

        let response = resource.delete(&state).await;
        assert_eq!(summaries(&response), vec!["Timed out waiting for condition"]);

        let object = cluster.get(&vpcs(), "default", "main").unwrap();
        assert!(object["metadata"]["deletionTimestamp"].is_string());
    }

    #[tokio::test]
    async fn test_import() {
        let (cluster, resource) = setup();
        cluster
            .add(
                &vpcs(),
                "default",
                json!({
                    "apiVersion": "ec2.services.k8s.aws/v1alpha1",
                    "kind": "VPC",
                    "metadata": {"name": "legacy", "labels": {"team": "network"}},
                    "spec": {"cidrBlocks": ["172.16.0.0/16"], "instanceTenancy": "default"},
                    "status": {"vpcID": "vpc-0legacy"}
                }),
            )
            .unwrap();

        let response = resource.import_state("default/legacy").await;
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        let state = response.state.unwrap();

        assert_eq!(state["id"], "default/legacy");
        assert_eq!(state["metadata"]["name"], "legacy");
        assert_eq!(state["metadata"]["namespace"], "default");
        assert_eq!(state["metadata"]["labels"], json!({"team": "network"}));
        assert_eq!(state["spec"]["cidr_blocks"], json!(["172.16.0.0/16"]));
        assert_eq!(state["spec"]["instance_tenancy"], "default");
        assert_eq!(state["field_manager"], "k8s-crd-provider");
        assert_eq!(state["force_conflicts"], false);
        assert!(state.get("status").is_none());

        // an imported state reads back unchanged
        let refreshed = resource.read(&state).await.state.unwrap();
        assert_eq!(refreshed, state);
    }

    #[tokio::test]
    async fn test_import_missing_object() {
        let (_cluster, resource) = setup();
        let response = resource.import_state("default/missing").await;
        assert_eq!(summaries(&response), vec!["Resource not found"]);
    }

    #[tokio::test]
    async fn test_import_invalid_id() {
        let (_cluster, resource) = setup();
        let response = resource.import_state("missing").await;
        assert_eq!(summaries(&response), vec!["Invalid import ID"]);
    }

    #[tokio::test]
    async fn test_not_configured() {
        let provider = Provider::builder().build().unwrap();
        let resource = provider.resource(VPC).unwrap();
        let plan = planned(&resource, &vpc_config("main", "10.0.0.0/16"));

        for response in [
            resource.create(&plan).await,
            resource.read(&plan).await,
            resource.delete(&plan).await,
            resource.import_state("default/main").await,
        ] {
            assert_eq!(summaries(&response), vec!["Provider not configured"]);
        }
    }
}
