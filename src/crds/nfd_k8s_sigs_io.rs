//! Node Feature Discovery rules (`nfd.k8s-sigs.io/v1alpha1`)

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// NodeFeatureRuleSpec describes a NodeFeatureRule.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "nfd.k8s-sigs.io",
    version = "v1alpha1",
    kind = "NodeFeatureRule",
    plural = "nodefeaturerules",
    shortname = "nfr",
    doc = "NodeFeatureRule resource specifies a configuration for feature-based customization of node objects, such as node labeling."
)]
#[serde(rename_all = "camelCase")]
pub struct NodeFeatureRuleSpec {
    /// Rules is a list of node customization rules.
    pub rules: Vec<Rule>,
}

/// Rule defines a rule for node customization such as labeling.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Name of the rule.
    pub name: String,
    /// Annotations to create if the rule matches.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// ExtendedResources to create if the rule matches.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extended_resources: BTreeMap<String, String>,
    /// Labels to create if the rule matches.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// LabelsTemplate specifies a template to expand for dynamically generating
    /// multiple labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels_template: Option<String>,
    /// MatchAny specifies a list of matchers one of which must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_any: Vec<MatchAnyElem>,
    /// MatchFeatures specifies a set of matcher terms all of which must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_features: Vec<FeatureMatcherTerm>,
    /// Taints to create if the rule matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
    /// Vars is the variables to store if the rule matches.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
}

/// MatchAnyElem specifies one sub-matcher of MatchAny.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchAnyElem {
    /// MatchFeatures specifies a set of matcher terms all of which must match.
    pub match_features: Vec<FeatureMatcherTerm>,
}

/// FeatureMatcherTerm defines requirements against one feature set.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMatcherTerm {
    /// Feature is the name of the feature set to match against.
    pub feature: String,
    /// MatchExpressions is the set of per-element expressions evaluated.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_expressions: BTreeMap<String, MatchExpression>,
    /// MatchName is an expression for matching the names of feature elements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_name: Option<MatchExpression>,
}

/// MatchExpression specifies an expression to evaluate against a set of input
/// values.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchExpression {
    /// Op is the operator to be applied.
    pub op: MatchOp,
    /// Value is the list of values that the operand evaluates the input against.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
pub enum MatchOp {
    #[default]
    In,
    NotIn,
    InRegexp,
    Exists,
    DoesNotExist,
    Gt,
    Lt,
    GtLt,
    IsTrue,
    IsFalse,
}

/// The node this Taint is attached to has the "effect" on any pod that does
/// not tolerate the Taint.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    /// Required. The effect of the taint on pods that do not tolerate the taint.
    pub effect: TaintEffect,
    /// Required. The taint key to be applied to a node.
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_added: Option<String>,
    /// The taint value corresponding to the taint key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize, PartialEq)]
pub enum TaintEffect {
    #[default]
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}
