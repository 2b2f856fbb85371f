//! Event filters and detail-field predicates
//!
//! An [`EventFilter`] is one trigger's narrowed view of the shared event
//! stream: the coarse routing slice (region, source, detail type, resource
//! reference) plus predicates on fields of the event `detail`.
//!
//! Predicates for one field are alternatives (any may match); predicates on
//! different fields must all pass. A field with no predicates matches any
//! value.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors raised while building or validating a filter
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// A regex predicate does not compile
    #[error("invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Routing is provisioned per region, so a routed filter needs one
    #[error("filter has no region")]
    MissingRegion,

    /// A required filter field is empty
    #[error("filter field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// The trigger configuration could not be turned into a filter
    #[error("invalid {kind} configuration: {reason}")]
    InvalidConfig { kind: String, reason: String },
}

/// A compiled regular expression that serialises as its source text
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compile a pattern
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        Regex::new(pattern)
            .map(Self)
            .map_err(|e| FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    /// The pattern source text
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Pattern").field(&self.as_str()).finish()
    }
}

impl Serialize for Pattern {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

/// A test applied to one detail field, after coercion to a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Equals(String),
    NotEquals(String),
    Matches(Pattern),
}

impl Predicate {
    pub fn equals(value: impl Into<String>) -> Self {
        Self::Equals(value.into())
    }

    pub fn not_equals(value: impl Into<String>) -> Self {
        Self::NotEquals(value.into())
    }

    /// Regex predicate; fails if the pattern does not compile
    pub fn pattern(pattern: &str) -> Result<Self, FilterError> {
        Pattern::new(pattern).map(Self::Matches)
    }

    /// Evaluate against a field value; `None` means the field is absent.
    ///
    /// An absent field never equals or matches anything, so it only passes
    /// `NotEquals`.
    pub fn evaluate(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Self::Equals(expected), Some(actual)) => expected == actual,
            (Self::NotEquals(unwanted), Some(actual)) => unwanted != actual,
            (Self::Matches(pattern), Some(actual)) => pattern.is_match(actual),
            (Self::NotEquals(_), None) => true,
            (Self::Equals(_) | Self::Matches(_), None) => false,
        }
    }
}

/// The identity of a routed slice of the event stream
///
/// Two filters with the same key share provisioning and a bus subscription;
/// predicates are not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingKey {
    pub region: String,
    pub source: String,
    pub detail_type: String,
    pub resource_ref: Option<String>,
}

impl std::fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.region, self.source, self.detail_type)?;
        if let Some(resource) = &self.resource_ref {
            write!(f, "@{resource}")?;
        }
        Ok(())
    }
}

/// A trigger's stored filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Region the event must originate from; `None` skips the region check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Event source (e.g. `aws.cloudwatch`)
    pub source: String,

    /// Event detail type (e.g. `CloudWatch Alarm State Change`)
    pub detail_type: String,

    /// The AWS resource the trigger is configured against (project, alarm, repository)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<String>,

    /// Predicates keyed by detail field path (`state.value` for one nested level)
    #[serde(default)]
    pub detail_predicates: BTreeMap<String, Vec<Predicate>>,
}

impl EventFilter {
    /// Create a filter for a source and detail type with no predicates
    pub fn new(source: impl Into<String>, detail_type: impl Into<String>) -> Self {
        Self {
            region: None,
            source: source.into(),
            detail_type: detail_type.into(),
            resource_ref: None,
            detail_predicates: BTreeMap::new(),
        }
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_resource_ref(mut self, resource_ref: impl Into<String>) -> Self {
        self.resource_ref = Some(resource_ref.into());
        self
    }

    /// Add one predicate for `field`
    pub fn with_predicate(mut self, field: impl Into<String>, predicate: Predicate) -> Self {
        self.detail_predicates
            .entry(field.into())
            .or_default()
            .push(predicate);
        self
    }

    /// Require `field` to equal one of `values`
    ///
    /// An empty `values` leaves the field unconstrained.
    pub fn with_any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let predicates: Vec<Predicate> = values.into_iter().map(Predicate::equals).collect();
        if !predicates.is_empty() {
            self.detail_predicates
                .entry(field.into())
                .or_default()
                .extend(predicates);
        }
        self
    }

    /// Predicates configured for `field` (empty means wildcard)
    pub fn predicates_for(&self, field: &str) -> &[Predicate] {
        self.detail_predicates
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check the filter can be routed
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.source.trim().is_empty() {
            return Err(FilterError::EmptyField("source"));
        }
        if self.detail_type.trim().is_empty() {
            return Err(FilterError::EmptyField("detail_type"));
        }
        match &self.region {
            Some(region) if region.trim().is_empty() => Err(FilterError::EmptyField("region")),
            Some(_) => Ok(()),
            None => Err(FilterError::MissingRegion),
        }
    }

    /// The routing identity of this filter
    pub fn routing_key(&self) -> Result<RoutingKey, FilterError> {
        self.validate()?;
        Ok(RoutingKey {
            region: self.region.clone().ok_or(FilterError::MissingRegion)?,
            source: self.source.clone(),
            detail_type: self.detail_type.clone(),
            resource_ref: self.resource_ref.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_predicate_evaluate() {
        assert!(Predicate::equals("ALARM").evaluate(Some("ALARM")));
        assert!(!Predicate::equals("ALARM").evaluate(Some("OK")));
        assert!(Predicate::not_equals("OK").evaluate(Some("ALARM")));
        assert!(!Predicate::not_equals("OK").evaluate(Some("OK")));

        let pattern = Predicate::pattern("^v[0-9]+$").unwrap();
        assert!(pattern.evaluate(Some("v12")));
        assert!(!pattern.evaluate(Some("latest")));
    }

    #[test]
    fn test_absent_field_only_passes_not_equals() {
        assert!(!Predicate::equals("x").evaluate(None));
        assert!(!Predicate::pattern(".*").unwrap().evaluate(None));
        assert!(Predicate::not_equals("x").evaluate(None));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let err = Predicate::pattern("(unclosed").unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { .. }));
    }

    #[test]
    fn test_with_any_of_empty_is_wildcard() {
        let filter = EventFilter::new("aws.ecr", "ECR Image Action")
            .with_any_of("image-tag", Vec::<String>::new());
        assert!(filter.detail_predicates.is_empty());
        assert!(filter.predicates_for("image-tag").is_empty());
    }

    #[test]
    fn test_routing_key_requires_region() {
        let filter = EventFilter::new("aws.codebuild", "CodeBuild Build State Change");
        assert_eq!(filter.routing_key(), Err(FilterError::MissingRegion));

        let key = filter
            .in_region("us-east-1")
            .with_resource_ref("backend-build")
            .routing_key()
            .unwrap();
        assert_eq!(
            key.to_string(),
            "us-east-1/aws.codebuild/CodeBuild Build State Change@backend-build"
        );
    }

    #[test]
    fn test_routing_key_ignores_predicates() {
        let base = EventFilter::new("aws.cloudwatch", "CloudWatch Alarm State Change")
            .in_region("eu-west-1");
        let narrowed = base.clone().with_any_of("state.value", ["ALARM"]);
        assert_eq!(base.routing_key(), narrowed.routing_key());
    }

    #[test]
    fn test_filter_serialization() {
        let filter = EventFilter::new("aws.ecr", "ECR Image Action")
            .in_region("us-west-2")
            .with_predicate("image-tag", Predicate::pattern("^release-").unwrap())
            .with_predicate("result", Predicate::equals("SUCCESS"));

        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(
            value["detail_predicates"]["image-tag"],
            json!([{ "op": "matches", "value": "^release-" }])
        );

        let parsed: EventFilter = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, filter);
    }

    #[test]
    fn test_garbled_pattern_fails_to_deserialize() {
        let value = json!({
            "source": "aws.ecr",
            "detail_type": "ECR Image Action",
            "detail_predicates": { "image-tag": [{ "op": "matches", "value": "(" }] }
        });
        assert!(serde_json::from_value::<EventFilter>(value).is_err());
    }
}
