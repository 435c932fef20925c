//! AWS Controllers for Kubernetes EC2 resources (`ec2.services.k8s.aws/v1alpha1`)

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// VpcSpec defines the desired state of a VPC.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "ec2.services.k8s.aws",
    version = "v1alpha1",
    kind = "VPC",
    plural = "vpcs",
    namespaced,
    status = "VPCStatus",
    doc = "VPC is the Schema for the VPCS API"
)]
#[serde(rename_all = "camelCase")]
pub struct VPCSpec {
    /// The IPv4 network ranges for the VPC, in CIDR notation.
    pub cidr_blocks: Vec<String>,
    /// The attribute value. The valid values are true or false.
    #[serde(rename = "enableDNSHostnames", skip_serializing_if = "Option::is_none")]
    pub enable_dns_hostnames: Option<bool>,
    /// The attribute value. The valid values are true or false.
    #[serde(rename = "enableDNSSupport", skip_serializing_if = "Option::is_none")]
    pub enable_dns_support: Option<bool>,
    /// The tenancy options for instances launched into the VPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_tenancy: Option<InstanceTenancy>,
    /// The ID of an IPv4 IPAM pool you want to use for allocating this VPC's CIDR.
    #[serde(rename = "ipv4IPAMPoolID", skip_serializing_if = "Option::is_none")]
    pub ipv4_ipam_pool_id: Option<String>,
    /// The netmask length of the IPv4 CIDR you want to allocate to this VPC from an IPAM pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_netmask_length: Option<i64>,
    /// The tags. The value parameter is required, but if you don't want the tag
    /// to have a value, specify the parameter with no value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceTenancy {
    #[default]
    Default,
    Dedicated,
    Host,
}

/// Describes a tag.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
pub struct Tag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VPCStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Indicates whether the VPC is the default VPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    /// The ID of the Amazon Web Services account that owns the VPC.
    #[serde(rename = "ownerID", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// The current state of the VPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// The ID of the VPC.
    #[serde(rename = "vpcID", skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
}

/// Condition is the common struct used by all CRDs managed by ACK service
/// controllers to indicate terminal states of the CR and its backend AWS
/// service API resource
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type is the type of the Condition
    #[serde(rename = "type")]
    pub type_: String,
    /// Status of the condition, one of True, False, Unknown.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// AWSResourceReferenceWrapper provides all the values necessary to reference
/// another k8s resource for finding the identifier(Id/ARN/Name)
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
pub struct ResourceReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NamespacedName>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
pub struct NamespacedName {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// SubnetSpec defines the desired state of a Subnet.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "ec2.services.k8s.aws",
    version = "v1alpha1",
    kind = "Subnet",
    plural = "subnets",
    namespaced,
    status = "SubnetStatus",
    doc = "Subnet is the Schema for the Subnets API"
)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// The Availability Zone or Local Zone for the subnet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// The IPv4 network range for the subnet, in CIDR notation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(rename = "mapPublicIPOnLaunch", skip_serializing_if = "Option::is_none")]
    pub map_public_ip_on_launch: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// The ID of the VPC.
    #[serde(rename = "vpcID", skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_ref: Option<ResourceReference>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetStatus {
    /// The number of unused private IPv4 addresses in the subnet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_ip_address_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// The current state of the subnet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// The ID of the subnet.
    #[serde(rename = "subnetID", skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
}

/// SecurityGroupSpec defines the desired state of a SecurityGroup.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "ec2.services.k8s.aws",
    version = "v1alpha1",
    kind = "SecurityGroup",
    plural = "securitygroups",
    namespaced,
    status = "SecurityGroupStatus",
    doc = "SecurityGroup is the Schema for the SecurityGroups API"
)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupSpec {
    /// A description for the security group.
    pub description: String,
    /// The name of the security group.
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress_rules: Vec<IPPermission>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress_rules: Vec<IPPermission>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// The ID of the VPC. Required for EC2-VPC.
    #[serde(rename = "vpcID", skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_ref: Option<ResourceReference>,
}

/// Describes a set of permissions for a security group rule.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IPPermission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_ranges: Vec<IPRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_port: Option<i64>,
}

/// Describes an IPv4 range.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IPRange {
    #[serde(rename = "cidrIP", skip_serializing_if = "Option::is_none")]
    pub cidr_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// The ID of the security group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}
