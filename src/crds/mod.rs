//! Typed custom resources shipped with the provider
//!
//! Each struct is declared with `#[derive(CustomResource)]`; the CRD kube
//! generates from it is what the bindings are built from, so the attribute
//! schemas follow the Rust types.

pub mod ec2_services_k8s_aws;
pub mod nfd_k8s_sigs_io;

use crate::binding::CrdBinding;
use crate::Result;

/// Bindings for every built-in custom resource
pub fn builtin_bindings() -> Result<Vec<CrdBinding>> {
    Ok(vec![
        CrdBinding::from_resource::<ec2_services_k8s_aws::VPC>()?,
        CrdBinding::from_resource::<ec2_services_k8s_aws::Subnet>()?,
        CrdBinding::from_resource::<ec2_services_k8s_aws::SecurityGroup>()?,
        CrdBinding::from_resource::<nfd_k8s_sigs_io::NodeFeatureRule>()?,
    ])
}
