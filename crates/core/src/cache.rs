//! Per-region rule cache
//!
//! A serialisable snapshot, owned by the integration record, of what has
//! already been provisioned: one optional API destination per region and the
//! routing rules in that region keyed by event source. The cache does no
//! I/O. Provisioning code never mutates a snapshot it was handed; it returns
//! [`CacheUpdate`]s that the integration folds in with [`RuleCache::apply`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resources::{ApiDestination, RoutingRule};

/// What is provisioned in one region
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRouting {
    #[serde(default)]
    pub destination: Option<ApiDestination>,

    /// Rules keyed by event source
    #[serde(default)]
    pub rules: BTreeMap<String, RoutingRule>,
}

/// An instruction to record a successful provisioning call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheUpdate {
    /// The region now has an API destination
    DestinationProvisioned { destination: ApiDestination },

    /// The (region, source) rule now forwards exactly the listed detail types
    RuleProvisioned { region: String, rule: RoutingRule },
}

/// Integration-wide routing metadata, keyed by region
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCache {
    #[serde(default)]
    regions: BTreeMap<String, RegionRouting>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The API destination for `region`, if provisioned
    pub fn destination(&self, region: &str) -> Option<&ApiDestination> {
        self.regions.get(region)?.destination.as_ref()
    }

    /// The rule for (`region`, `source`), if provisioned
    pub fn rule(&self, region: &str, source: &str) -> Option<&RoutingRule> {
        self.regions.get(region)?.rules.get(source)
    }

    /// Whether `region` has a working rule for `source` covering `detail_type`
    pub fn covers(&self, region: &str, source: &str, detail_type: &str) -> bool {
        self.rule(region, source)
            .is_some_and(|rule| rule.covers(detail_type))
    }

    /// Everything known about `region`
    pub fn region(&self, region: &str) -> Option<&RegionRouting> {
        self.regions.get(region)
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Fold a provisioning result into the snapshot
    ///
    /// Both updates replace what was there. A rule update carries the full
    /// set of detail types that was put, so a put that overwrote a
    /// concurrent one leaves the loser uncovered and its next check puts
    /// the union again.
    pub fn apply(&mut self, update: CacheUpdate) {
        match update {
            CacheUpdate::DestinationProvisioned { destination } => {
                let region = destination.region.clone();
                self.regions.entry(region).or_default().destination = Some(destination);
            }
            CacheUpdate::RuleProvisioned { region, rule } => {
                self.regions
                    .entry(region)
                    .or_default()
                    .rules
                    .insert(rule.source.clone(), rule);
            }
        }
    }

    /// Builder form of [`RuleCache::apply`] for a destination
    pub fn with_destination(mut self, destination: ApiDestination) -> Self {
        self.apply(CacheUpdate::DestinationProvisioned { destination });
        self
    }

    /// Builder form of [`RuleCache::apply`] for a rule
    pub fn with_rule(mut self, region: impl Into<String>, rule: RoutingRule) -> Self {
        self.apply(CacheUpdate::RuleProvisioned {
            region: region.into(),
            rule,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILD_CHANGE: &str = "CodeBuild Build State Change";
    const PHASE_CHANGE: &str = "CodeBuild Build Phase Change";

    fn destination(region: &str) -> ApiDestination {
        ApiDestination::new(
            region,
            format!("arn:aws:events:{region}:1:connection/c"),
            format!("arn:aws:events:{region}:1:api-destination/d"),
        )
    }

    #[test]
    fn test_empty_cache() {
        let cache = RuleCache::new();
        assert!(cache.destination("us-east-1").is_none());
        assert!(cache.rule("us-east-1", "aws.codebuild").is_none());
        assert!(!cache.covers("us-east-1", "aws.codebuild", BUILD_CHANGE));
    }

    #[test]
    fn test_lookup_is_per_region() {
        let cache = RuleCache::new()
            .with_destination(destination("us-east-1"))
            .with_rule(
                "us-east-1",
                RoutingRule::new("aws.codebuild", BUILD_CHANGE, "arn:rule", "webhook"),
            );

        assert!(cache.destination("us-east-1").is_some());
        assert!(cache.destination("eu-west-1").is_none());
        assert!(cache.covers("us-east-1", "aws.codebuild", BUILD_CHANGE));
        assert!(!cache.covers("eu-west-1", "aws.codebuild", BUILD_CHANGE));
        assert!(!cache.covers("us-east-1", "aws.codebuild", PHASE_CHANGE));
    }

    #[test]
    fn test_rule_update_replaces_detail_types() {
        let mut cache = RuleCache::new().with_rule(
            "us-east-1",
            RoutingRule::new("aws.codebuild", BUILD_CHANGE, "arn:rule", "webhook"),
        );

        // A put that lost a race to a put of the other type
        cache.apply(CacheUpdate::RuleProvisioned {
            region: "us-east-1".into(),
            rule: RoutingRule::new("aws.codebuild", PHASE_CHANGE, "arn:rule", "webhook"),
        });
        assert!(!cache.covers("us-east-1", "aws.codebuild", BUILD_CHANGE));
        assert!(cache.covers("us-east-1", "aws.codebuild", PHASE_CHANGE));

        let mut both = RoutingRule::new("aws.codebuild", PHASE_CHANGE, "arn:rule", "webhook");
        both.detail_types.insert(BUILD_CHANGE.to_string());
        cache.apply(CacheUpdate::RuleProvisioned {
            region: "us-east-1".into(),
            rule: both,
        });

        let rule = cache.rule("us-east-1", "aws.codebuild").unwrap();
        assert_eq!(rule.detail_types.len(), 2);
        assert_eq!(cache.regions().count(), 1);
    }

    #[test]
    fn test_destination_update_keeps_rules() {
        let mut cache = RuleCache::new().with_rule(
            "us-east-1",
            RoutingRule::new("aws.codebuild", BUILD_CHANGE, "arn:rule", "webhook"),
        );
        cache.apply(CacheUpdate::DestinationProvisioned {
            destination: destination("us-east-1"),
        });

        assert!(cache.destination("us-east-1").is_some());
        assert!(cache.covers("us-east-1", "aws.codebuild", BUILD_CHANGE));
    }

    #[test]
    fn test_cache_serialization() {
        let cache = RuleCache::new()
            .with_destination(destination("us-east-1"))
            .with_rule(
                "us-east-1",
                RoutingRule::new("aws.ecr", "ECR Image Action", "arn:rule", "webhook"),
            );

        let json = serde_json::to_value(&cache).unwrap();
        assert!(json["regions"]["us-east-1"]["rules"]["aws.ecr"].is_object());

        let parsed: RuleCache = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, cache);
    }

    #[test]
    fn test_update_serialization() {
        let update = CacheUpdate::DestinationProvisioned {
            destination: destination("us-east-1"),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"type\":\"destination_provisioned\""));
    }
}
