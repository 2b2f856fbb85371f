//! Provisioned EventBridge resources
//!
//! These are the shared, append-mostly resources that many triggers reuse:
//! one [`ApiDestination`] per region and one [`RoutingRule`] per
//! (region, source) pair.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One provisioned EventBridge rule plus its webhook target
///
/// A rule covers a single event source and any number of detail types.
/// Adding a detail type is an update of the same rule, not a new rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Event namespace (e.g. `aws.codebuild`)
    pub source: String,

    /// Detail types this rule forwards
    pub detail_types: BTreeSet<String>,

    /// ARN returned by `PutRule`
    pub rule_arn: String,

    /// Id of the API destination target attached to the rule
    pub target_id: String,
}

impl RoutingRule {
    /// Create a rule covering a single detail type
    pub fn new(
        source: impl Into<String>,
        detail_type: impl Into<String>,
        rule_arn: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            detail_types: BTreeSet::from([detail_type.into()]),
            rule_arn: rule_arn.into(),
            target_id: target_id.into(),
        }
    }

    /// Whether the rule already forwards `detail_type`
    pub fn covers(&self, detail_type: &str) -> bool {
        self.detail_types.contains(detail_type)
    }

    /// Detail types after adding `detail_type`, sorted
    pub fn detail_types_with(&self, detail_type: &str) -> BTreeSet<String> {
        let mut types = self.detail_types.clone();
        types.insert(detail_type.to_string());
        types
    }
}

/// The signed HTTPS callback target EventBridge invokes for one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDestination {
    pub region: String,
    pub connection_arn: String,
    pub api_destination_arn: String,
}

impl ApiDestination {
    pub fn new(
        region: impl Into<String>,
        connection_arn: impl Into<String>,
        api_destination_arn: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            connection_arn: connection_arn.into(),
            api_destination_arn: api_destination_arn.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_covers() {
        let rule = RoutingRule::new(
            "aws.codebuild",
            "CodeBuild Build State Change",
            "arn:aws:events:us-east-1:1:rule/r",
            "webhook",
        );
        assert!(rule.covers("CodeBuild Build State Change"));
        assert!(!rule.covers("CodeBuild Build Phase Change"));
    }

    #[test]
    fn test_detail_types_with_is_union() {
        let rule = RoutingRule::new("aws.ecr", "ECR Image Action", "arn", "t");
        let types = rule.detail_types_with("ECR Image Scan");
        assert_eq!(types.len(), 2);

        let same = rule.detail_types_with("ECR Image Action");
        assert_eq!(same.len(), 1);
    }
}
