//! Built-in trigger kinds
//!
//! Every trigger shares the same provisioning path; what differs is the
//! event slice it listens to, how its configuration turns into an
//! [`EventFilter`], and how patiently it waits for routing to appear.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::filter::{EventFilter, FilterError, Predicate};
use crate::retry::RetryPolicy;

/// The triggers that route through EventBridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// CodeBuild build state changes
    Build,
    /// CloudWatch alarm state changes
    Alarm,
    /// ECR image pushes
    ImagePush,
    /// CodeArtifact package versions
    PackageVersion,
    /// Messages published to an SNS topic
    TopicMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildConfig {
    project_name: String,
    #[serde(default)]
    build_statuses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlarmConfig {
    alarm_name: String,
    #[serde(default)]
    states: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagePushConfig {
    repository_name: String,
    #[serde(default)]
    tag_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicMessageConfig {
    topic_arn: String,
    #[serde(default)]
    subject_pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageVersionConfig {
    domain_name: String,
    repository_name: String,
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    package_format: Option<String>,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 5] = [
        TriggerKind::Build,
        TriggerKind::Alarm,
        TriggerKind::ImagePush,
        TriggerKind::PackageVersion,
        TriggerKind::TopicMessage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Build => "on_build",
            Self::Alarm => "on_alarm",
            Self::ImagePush => "on_image_push",
            Self::PackageVersion => "on_package_version",
            Self::TopicMessage => "on_topic_message",
        }
    }

    /// EventBridge source namespace
    pub fn source(self) -> &'static str {
        match self {
            Self::Build => "aws.codebuild",
            Self::Alarm => "aws.cloudwatch",
            Self::ImagePush => "aws.ecr",
            Self::PackageVersion => "aws.codeartifact",
            Self::TopicMessage => "aws.sns",
        }
    }

    pub fn detail_type(self) -> &'static str {
        match self {
            Self::Build => "CodeBuild Build State Change",
            Self::Alarm => "CloudWatch Alarm State Change",
            Self::ImagePush => "ECR Image Action",
            Self::PackageVersion => "CodeArtifact Package Version State Change",
            Self::TopicMessage => "SNS Topic Message",
        }
    }

    /// How long this trigger keeps checking for routing
    ///
    /// Alarm setup gives up after about a minute; the others wait indefinitely.
    pub fn retry_policy(self) -> RetryPolicy {
        match self {
            Self::Alarm => RetryPolicy::bounded(),
            Self::Build | Self::ImagePush | Self::PackageVersion | Self::TopicMessage => {
                RetryPolicy::unbounded()
            }
        }
    }

    /// Build the trigger's filter for `region` from its JSON configuration
    pub fn build_filter(self, region: &str, config: &Value) -> Result<EventFilter, FilterError> {
        let base = EventFilter::new(self.source(), self.detail_type()).in_region(region);

        let filter = match self {
            Self::Build => {
                let cfg: BuildConfig = self.decode(config)?;
                base.with_resource_ref(cfg.project_name.clone())
                    .with_any_of("project-name", [cfg.project_name])
                    .with_any_of("build-status", cfg.build_statuses)
            }
            Self::Alarm => {
                let cfg: AlarmConfig = self.decode(config)?;
                base.with_resource_ref(cfg.alarm_name.clone())
                    .with_any_of("alarmName", [cfg.alarm_name])
                    .with_any_of("state.value", cfg.states)
            }
            Self::ImagePush => {
                let cfg: ImagePushConfig = self.decode(config)?;
                let filter = base
                    .with_resource_ref(cfg.repository_name.clone())
                    .with_any_of("repository-name", [cfg.repository_name])
                    .with_any_of("action-type", ["PUSH"])
                    .with_any_of("result", ["SUCCESS"]);
                match cfg.tag_pattern {
                    Some(pattern) => {
                        filter.with_predicate("image-tag", Predicate::pattern(&pattern)?)
                    }
                    None => filter,
                }
            }
            Self::PackageVersion => {
                let cfg: PackageVersionConfig = self.decode(config)?;
                // A freshly published version arrives as Created + Published;
                // other combinations are status churn on existing versions.
                base.with_resource_ref(format!("{}/{}", cfg.domain_name, cfg.repository_name))
                    .with_any_of("domainName", [cfg.domain_name])
                    .with_any_of("repositoryName", [cfg.repository_name])
                    .with_any_of("packageName", cfg.package_name)
                    .with_any_of("packageFormat", cfg.package_format)
                    .with_any_of("operationType", ["Created"])
                    .with_any_of("packageVersionState", ["Published"])
            }
            Self::TopicMessage => {
                let cfg: TopicMessageConfig = self.decode(config)?;
                let filter = base
                    .with_resource_ref(cfg.topic_arn.clone())
                    .with_any_of("topicArn", [cfg.topic_arn]);
                match cfg.subject_pattern {
                    Some(pattern) => filter.with_predicate("subject", Predicate::pattern(&pattern)?),
                    None => filter,
                }
            }
        };

        filter.validate()?;
        Ok(filter)
    }

    fn decode<T: DeserializeOwned>(self, config: &Value) -> Result<T, FilterError> {
        T::deserialize(config).map_err(|e| FilterError::InvalidConfig {
            kind: self.name().to_string(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TriggerKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown trigger kind: {s}"))
    }
}
