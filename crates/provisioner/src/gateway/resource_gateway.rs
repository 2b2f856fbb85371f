//! Idempotent create-or-fetch operations over a [`ProvisioningApi`]

use std::collections::BTreeSet;
use std::sync::Arc;

use eventroute_core::{ApiDestination, CacheUpdate, RoutingRule};
use serde_json::json;
use tracing::{debug, info, instrument};

use super::api::{CreateApiDestination, CreateConnection, ProvisioningApi, PutRule, PutTarget, Tags};
use super::error::{GatewayError, ResourceKind};

/// Installation-wide naming, credentials and tags for provisioned resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Prefix for every resource name
    pub name_prefix: String,

    /// Platform webhook the API destinations invoke
    pub callback_url: String,

    /// IAM role EventBridge assumes to invoke the API destination
    pub invoker_role_arn: String,

    /// Header carrying the shared secret on every delivery
    pub auth_header: String,

    pub auth_secret: String,

    pub tags: Tags,
}

impl GatewaySettings {
    pub fn new(
        callback_url: impl Into<String>,
        invoker_role_arn: impl Into<String>,
        auth_secret: impl Into<String>,
    ) -> Self {
        Self {
            name_prefix: "eventroute".to_string(),
            callback_url: callback_url.into(),
            invoker_role_arn: invoker_role_arn.into(),
            auth_header: "x-eventroute-signature".to_string(),
            auth_secret: auth_secret.into(),
            tags: Tags::new(),
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = header.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn connection_name(&self, region: &str) -> String {
        format!("{}-{}-connection", self.name_prefix, region)
    }

    pub fn destination_name(&self, region: &str) -> String {
        format!("{}-{}-destination", self.name_prefix, region)
    }

    /// One rule per (region, source); dots are not allowed in rule names
    pub fn rule_name(&self, region: &str, source: &str) -> String {
        format!("{}-{}-{}", self.name_prefix, region, source.replace('.', "-"))
    }

    pub fn target_id(&self) -> String {
        format!("{}-webhook", self.name_prefix)
    }
}

/// EventBridge pattern forwarding `detail_types` from `source`
pub fn event_pattern(source: &str, detail_types: &BTreeSet<String>) -> String {
    json!({
        "source": [source],
        "detail-type": detail_types.iter().collect::<Vec<_>>(),
    })
    .to_string()
}

/// Create-or-fetch gateway shared by every trigger of an installation
///
/// Connection and API destination creation fall back to describe-by-name
/// when the create loses a race, so callers cannot tell a fresh resource
/// from an existing one. Rules and targets are put, which is idempotent on
/// the remote side.
pub struct ResourceGateway<A: ProvisioningApi> {
    api: Arc<A>,
    settings: GatewaySettings,
}

impl<A: ProvisioningApi> Clone for ResourceGateway<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            settings: self.settings.clone(),
        }
    }
}

impl<A: ProvisioningApi> ResourceGateway<A> {
    pub fn new(api: A, settings: GatewaySettings) -> Self {
        Self::from_arc(Arc::new(api), settings)
    }

    /// Share an API client the caller keeps a handle to
    pub fn from_arc(api: Arc<A>, settings: GatewaySettings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Create the connection or fetch the existing one's ARN, then tag it
    #[instrument(skip(self, auth_secret))]
    pub async fn ensure_connection(
        &self,
        region: &str,
        name: &str,
        auth_header: &str,
        auth_secret: &str,
    ) -> Result<String, GatewayError> {
        let request = CreateConnection {
            name: name.to_string(),
            auth_header: auth_header.to_string(),
            auth_secret: auth_secret.to_string(),
        };

        let arn = match self.api.create_connection(region, &request).await {
            Ok(arn) => {
                info!(%arn, "created connection");
                arn
            }
            Err(e) if e.is_already_exists() => {
                debug!("connection exists, describing");
                self.api.describe_connection(region, name).await?
            }
            Err(e) => return Err(e),
        };
        // Also on the describe branch: an earlier create may have failed to tag
        self.tag(region, &arn).await?;
        Ok(arn)
    }

    /// Create the API destination or fetch the existing one's ARN, then tag it
    #[instrument(skip(self))]
    pub async fn ensure_api_destination(
        &self,
        region: &str,
        name: &str,
        connection_arn: &str,
        callback_url: &str,
    ) -> Result<String, GatewayError> {
        let request = CreateApiDestination {
            name: name.to_string(),
            connection_arn: connection_arn.to_string(),
            invocation_endpoint: callback_url.to_string(),
        };

        let arn = match self.api.create_api_destination(region, &request).await {
            Ok(arn) => {
                info!(%arn, "created api destination");
                arn
            }
            Err(e) if e.is_already_exists() => {
                debug!("api destination exists, describing");
                self.api.describe_api_destination(region, name).await?
            }
            Err(e) => return Err(e),
        };
        self.tag(region, &arn).await?;
        Ok(arn)
    }

    /// Put the rule; there is no fallback branch
    #[instrument(skip(self, event_pattern, description))]
    pub async fn ensure_rule(
        &self,
        region: &str,
        name: &str,
        event_pattern: &str,
        description: &str,
    ) -> Result<String, GatewayError> {
        let request = PutRule {
            name: name.to_string(),
            event_pattern: event_pattern.to_string(),
            description: description.to_string(),
            tags: self.settings.tags.clone(),
        };
        let arn = self.api.put_rule(region, &request).await?;
        debug!(%arn, "put rule");
        Ok(arn)
    }

    /// Put the rule's webhook target; re-putting the same id overwrites it
    #[instrument(skip(self))]
    pub async fn ensure_target(
        &self,
        region: &str,
        rule_name: &str,
        target_id: &str,
        destination_arn: &str,
        invoker_role_arn: &str,
    ) -> Result<(), GatewayError> {
        let request = PutTarget {
            rule_name: rule_name.to_string(),
            target_id: target_id.to_string(),
            destination_arn: destination_arn.to_string(),
            role_arn: invoker_role_arn.to_string(),
        };
        self.api.put_target(region, &request).await
    }

    /// Connection then API destination for `region`
    ///
    /// Runs when the integration handles the `provisionDestination` action.
    #[instrument(skip(self))]
    pub async fn provision_destination(&self, region: &str) -> Result<CacheUpdate, GatewayError> {
        let s = &self.settings;
        let connection_arn = self
            .ensure_connection(
                region,
                &s.connection_name(region),
                &s.auth_header,
                &s.auth_secret,
            )
            .await?;
        let api_destination_arn = self
            .ensure_api_destination(
                region,
                &s.destination_name(region),
                &connection_arn,
                &s.callback_url,
            )
            .await?;

        Ok(CacheUpdate::DestinationProvisioned {
            destination: ApiDestination::new(region, connection_arn, api_destination_arn),
        })
    }

    /// Rule and target so that (`region`, `source`) forwards `detail_type`
    ///
    /// The pattern covers every detail type `existing` already forwards plus
    /// the new one, so an update never narrows a shared rule.
    #[instrument(skip(self, destination, existing))]
    pub async fn provision_rule(
        &self,
        region: &str,
        destination: &ApiDestination,
        existing: Option<&RoutingRule>,
        source: &str,
        detail_type: &str,
    ) -> Result<CacheUpdate, GatewayError> {
        let s = &self.settings;
        let detail_types = match existing {
            Some(rule) => rule.detail_types_with(detail_type),
            None => BTreeSet::from([detail_type.to_string()]),
        };

        let rule_name = s.rule_name(region, source);
        let target_id = s.target_id();
        let rule_arn = self
            .ensure_rule(
                region,
                &rule_name,
                &event_pattern(source, &detail_types),
                &format!("Routes {source} events to the platform webhook"),
            )
            .await?;
        self.ensure_target(
            region,
            &rule_name,
            &target_id,
            &destination.api_destination_arn,
            &s.invoker_role_arn,
        )
        .await?;

        info!(%rule_arn, detail_types = detail_types.len(), "rule provisioned");
        Ok(CacheUpdate::RuleProvisioned {
            region: region.to_string(),
            rule: RoutingRule {
                source: source.to_string(),
                detail_types,
                rule_arn,
                target_id,
            },
        })
    }

    async fn tag(&self, region: &str, arn: &str) -> Result<(), GatewayError> {
        if self.settings.tags.is_empty() {
            return Ok(());
        }
        self.api.tag_resource(region, arn, &self.settings.tags).await
    }
}

/// Resource kind for an EventBridge ARN, used when a call only has the ARN
pub(crate) fn kind_from_arn(arn: &str) -> ResourceKind {
    if arn.contains(":connection/") {
        ResourceKind::Connection
    } else if arn.contains(":api-destination/") {
        ResourceKind::ApiDestination
    } else {
        ResourceKind::Rule
    }
}
