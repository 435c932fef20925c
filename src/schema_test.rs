#[cfg(test)]
mod tests {
    use crate::schema::openapi::{attribute_from_props, attributes_from_properties, terraform_name, Target};
    use crate::schema::*;
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::JSONSchemaProps;
    use serde_json::json;

    fn props(value: serde_json::Value) -> JSONSchemaProps {
        serde_json::from_value(value).unwrap()
    }

    fn summaries(diags: &crate::Diagnostics) -> Vec<String> {
        diags.iter().map(|d| d.detail.clone()).collect()
    }

    #[test]
    fn test_valid_schema_has_no_diagnostics() {
        let schema = Schema::new()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "spec",
                Attribute::object(Attributes::from([(
                    "cidr_blocks".to_string(),
                    Attribute::new(AttributeType::list(AttributeType::String)).required(),
                )]))
                .required(),
            );
        assert!(schema.validate_implementation().is_empty());
    }

    #[test]
    fn test_invalid_attribute_name() {
        let schema = Schema::new().with_attribute("cidrBlocks", Attribute::optional_string());
        let diags = schema.validate_implementation();

        assert_eq!(diags.len(), 1);
        assert!(diags.has_error());
        assert!(summaries(&diags)[0].contains("cidrBlocks"));
    }

    #[test]
    fn test_attribute_without_flags() {
        let schema = Schema::new().with_attribute("name", Attribute::new(AttributeType::String));
        let diags = schema.validate_implementation();
        assert!(summaries(&diags)[0].contains("required, optional or computed"));
    }

    #[test]
    fn test_required_and_computed_conflict() {
        let mut attribute = Attribute::required_string();
        attribute.computed = true;
        let schema = Schema::new().with_attribute("name", attribute);

        let diags = schema.validate_implementation();
        assert!(summaries(&diags)[0].contains("cannot also be optional or computed"));
    }

    #[test]
    fn test_empty_nested_attributes() {
        let schema = Schema::new().with_attribute("spec", Attribute::object(Attributes::new()).optional());
        let diags = schema.validate_implementation();
        assert!(summaries(&diags)[0].contains("at least one attribute"));
    }

    #[test]
    fn test_nested_collection_element() {
        let nested = AttributeType::Object {
            attributes: Attributes::from([("key".to_string(), Attribute::optional_string())]),
        };
        let schema = Schema::new().with_attribute(
            "tags",
            Attribute::new(AttributeType::list(nested)).optional(),
        );
        let diags = schema.validate_implementation();
        assert!(summaries(&diags)[0].contains("collection element types"));
    }

    #[test]
    fn test_reserved_root_names() {
        let schema = Schema::new()
            .with_attribute("count", Attribute::optional_string())
            .with_attribute("lifecycle", Attribute::optional_string());
        let diags = schema.validate_implementation();
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| d.detail.contains("reserved")));
    }

    #[test]
    fn test_reserved_names_allowed_below_root() {
        let schema = Schema::new().with_attribute(
            "spec",
            Attribute::object(Attributes::from([("count".to_string(), Attribute::optional_string())]))
                .optional(),
        );
        assert!(schema.validate_implementation().is_empty());
    }

    #[test]
    fn test_errors_are_reported_per_violation() {
        let schema = Schema::new()
            .with_attribute("Bad", Attribute::new(AttributeType::String))
            .with_attribute("depends_on", Attribute::optional_string());
        // bad name, missing flags, reserved name
        assert_eq!(schema.validate_implementation().len(), 3);
    }

    #[test]
    fn test_attribute_lookup_by_path() {
        let schema = Schema::new().with_attribute(
            "metadata",
            Attribute::object(Attributes::from([("name".to_string(), Attribute::required_string())]))
                .required(),
        );
        assert!(schema.attribute("metadata.name").unwrap().required);
        assert!(schema.attribute("metadata.uid").is_none());
    }

    #[test]
    fn test_validate_value_required_and_read_only() {
        let schema = Schema::new()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string());

        let diags = schema.validate_value(&json!({"id": "x"}));
        let summaries: Vec<&str> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert!(summaries.contains(&"Missing required argument"));
        assert!(summaries.contains(&"Invalid configuration for read-only attribute"));
    }

    #[test]
    fn test_validate_value_unsupported_argument() {
        let schema = Schema::new().with_attribute(
            "metadata",
            Attribute::object(Attributes::from([(
                "name".to_string(),
                Attribute::required_string(),
            )]))
            .required(),
        );

        let diags = schema.validate_value(&json!({"metadata": {"name": "a", "nmae": "b"}}));
        assert_eq!(diags.len(), 1);
        let diagnostic = diags.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Unsupported argument");
        assert_eq!(diagnostic.attribute.as_deref(), Some("metadata.nmae"));
    }

    #[test]
    fn test_validate_value_runs_validators_in_nested_lists() {
        let schema = Schema::new().with_attribute(
            "tags",
            Attribute::list_nested(Attributes::from([(
                "key".to_string(),
                Attribute::optional_string().with_validator(Validator::LengthBetween {
                    min: Some(1),
                    max: Some(3),
                }),
            )]))
            .optional(),
        );

        let diags = schema.validate_value(&json!({"tags": [{"key": "ok"}, {"key": "toolong"}]}));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().attribute.as_deref(), Some("tags[1].key"));
    }

    #[test]
    fn test_validators() {
        let one_of = Validator::OneOf {
            values: vec!["default".to_string(), "dedicated".to_string()],
        };
        assert!(one_of.validate(&json!("default")).is_ok());
        assert!(one_of.validate(&json!("host")).is_err());

        let between = Validator::Between {
            min: Some(16.0),
            max: Some(28.0),
        };
        assert!(between.validate(&json!(24)).is_ok());
        assert!(between.validate(&json!(8)).is_err());

        let pattern = Validator::Pattern {
            pattern: "^vpc-[0-9a-f]+$".to_string(),
        };
        assert!(pattern.validate(&json!("vpc-0abc")).is_ok());
        assert!(pattern.validate(&json!("subnet-0abc")).is_err());

        // lookaround is not supported by the regex crate and is skipped
        let unsupported = Validator::Pattern {
            pattern: "^(?!kube-).*$".to_string(),
        };
        assert!(unsupported.validate(&json!("kube-system")).is_ok());
    }

    #[test]
    fn test_dns_subdomain() {
        let validator = Validator::DnsSubdomain;
        assert!(validator.validate(&json!("main")).is_ok());
        assert!(validator.validate(&json!("team-a.example.com")).is_ok());
        assert!(validator.validate(&json!("Main")).is_err());
        assert!(validator.validate(&json!("-main")).is_err());
        assert!(validator.validate(&json!("a".repeat(254))).is_err());
    }

    #[test]
    fn test_dns_label() {
        let validator = Validator::DnsLabel;
        assert!(validator.validate(&json!("default")).is_ok());
        assert!(validator.validate(&json!("team-a")).is_ok());
        assert!(validator.validate(&json!("a".repeat(63))).is_ok());
        assert!(validator.validate(&json!("team.prod")).is_err());
        assert!(validator.validate(&json!("Team")).is_err());
        assert!(validator.validate(&json!("team-")).is_err());
        assert!(validator.validate(&json!("a".repeat(64))).is_err());
        assert_eq!(validator.description(), "a DNS label");
    }

    #[test]
    fn test_qualified_keys() {
        let labels = Validator::QualifiedKeys { check_values: true };
        assert!(labels
            .validate(&json!({"app.kubernetes.io/name": "network", "tier": ""}))
            .is_ok());
        assert!(labels.validate(&json!({"bad key": "x"})).is_err());
        assert!(labels.validate(&json!({"/name": "x"})).is_err());
        assert!(labels.validate(&json!({"tier": "not valid!"})).is_err());

        let annotations = Validator::QualifiedKeys { check_values: false };
        assert!(annotations
            .validate(&json!({"example.com/notes": "free text, with spaces!"}))
            .is_ok());
    }

    #[test]
    fn test_validator_descriptions() {
        assert_eq!(
            Validator::OneOf {
                values: vec!["a".to_string(), "b".to_string()]
            }
            .description(),
            "one of a, b"
        );
        assert_eq!(
            Validator::LengthBetween { min: Some(1), max: None }.description(),
            "length between 1 and *"
        );
    }

    #[test]
    fn test_terraform_name() {
        assert_eq!(terraform_name("cidrBlocks"), "cidr_blocks");
        assert_eq!(terraform_name("enableDNSHostnames"), "enable_dns_hostnames");
        assert_eq!(terraform_name("vpcID"), "vpc_id");
        assert_eq!(terraform_name("3scale"), "_3scale");
    }

    #[test]
    fn test_openapi_scalars_and_flags() {
        let root = props(json!({
            "type": "object",
            "required": ["cidrBlocks"],
            "properties": {
                "cidrBlocks": {"type": "array", "items": {"type": "string"}},
                "ipv4NetmaskLength": {"type": "integer", "minimum": 16, "maximum": 28},
                "ratio": {"type": "number"},
                "enableDNSSupport": {"type": "boolean"},
                "port": {"x-kubernetes-int-or-string": true},
                "instanceTenancy": {"type": "string", "enum": ["default", "dedicated"]}
            }
        }));

        let attrs = attributes_from_properties(&root, Target::Configurable, &[], &[]);
        assert_eq!(attrs["cidr_blocks"].ty, AttributeType::list(AttributeType::String));
        assert!(attrs["cidr_blocks"].required);
        assert_eq!(attrs["cidr_blocks"].json_name.as_deref(), Some("cidrBlocks"));
        assert_eq!(attrs["ipv4_netmask_length"].ty, AttributeType::Int64);
        assert!(attrs["ipv4_netmask_length"].optional);
        assert_eq!(attrs["ratio"].ty, AttributeType::Float64);
        assert_eq!(attrs["enable_dns_support"].ty, AttributeType::Bool);
        assert_eq!(attrs["port"].ty, AttributeType::String);
        assert_eq!(attrs["port"].json_name, None);
        assert_eq!(
            attrs["instance_tenancy"].validators,
            vec![Validator::OneOf {
                values: vec!["default".to_string(), "dedicated".to_string()]
            }]
        );
        assert_eq!(attrs["ipv4_netmask_length"].validators.len(), 1);
    }

    #[test]
    fn test_openapi_read_only_target() {
        let root = props(json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": {"type": "string", "minLength": 1}
            }
        }));

        let attrs = attributes_from_properties(&root, Target::ReadOnly, &[], &[]);
        assert!(attrs["name"].computed);
        assert!(!attrs["name"].required);
        assert!(attrs["name"].validators.is_empty());
    }

    #[test]
    fn test_openapi_nested_types() {
        let root = props(json!({
            "type": "object",
            "properties": {
                "tags": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {"key": {"type": "string"}, "value": {"type": "string"}}
                    }
                },
                "labels": {
                    "type": "object",
                    "additionalProperties": {"type": "string"}
                },
                "matchExpressions": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "properties": {"op": {"type": "string"}}
                    }
                },
                "vars": {"type": "object"},
                "raw": {"type": "object", "x-kubernetes-preserve-unknown-fields": true},
                "matrix": {
                    "type": "array",
                    "items": {"type": "array", "items": {"type": "object", "properties": {"a": {"type": "string"}}}}
                }
            }
        }));

        let attrs = attributes_from_properties(&root, Target::Configurable, &[], &[]);
        assert!(matches!(attrs["tags"].ty, AttributeType::ListNested { .. }));
        assert_eq!(attrs["labels"].ty, AttributeType::map(AttributeType::String));
        assert!(matches!(attrs["match_expressions"].ty, AttributeType::MapNested { .. }));
        assert_eq!(attrs["vars"].ty, AttributeType::map(AttributeType::String));
        assert_eq!(attrs["raw"].ty, AttributeType::Dynamic);
        // lists of nested lists cannot be expressed, so the element is dynamic
        assert_eq!(attrs["matrix"].ty, AttributeType::list(AttributeType::Dynamic));
    }

    #[test]
    fn test_openapi_flattens_single_all_of() {
        let child = props(json!({
            "description": "The tenancy",
            "allOf": [{"type": "string", "enum": ["default"]}]
        }));
        let attribute = attribute_from_props(&child, false, Target::Configurable);

        assert_eq!(attribute.ty, AttributeType::String);
        assert_eq!(attribute.description.as_deref(), Some("The tenancy"));
        assert_eq!(attribute.validators.len(), 1);
    }

    #[test]
    fn test_openapi_skip_and_collisions() {
        let root = props(json!({
            "type": "object",
            "properties": {
                "metadata": {"type": "object"},
                "id": {"type": "string"},
                "kind": {"type": "string"}
            }
        }));

        let attrs = attributes_from_properties(&root, Target::Configurable, &["kind"], &["id", "metadata"]);
        assert!(attrs.contains_key("id_"));
        assert_eq!(attrs["id_"].json_name.as_deref(), Some("id"));
        assert!(attrs.contains_key("metadata_"));
        assert!(!attrs.contains_key("kind"));
    }
}
