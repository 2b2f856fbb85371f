//! Raw provisioning operations
//!
//! [`ProvisioningApi`] is the thin port under the resource gateway: one
//! method per remote call, no fallback logic. Create calls report
//! [`GatewayError::AlreadyExists`] and leave recovery to the gateway.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::GatewayError;

/// Tags applied to every created resource
pub type Tags = BTreeMap<String, String>;

/// Connection carrying the API-key header EventBridge signs requests with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateConnection {
    pub name: String,
    pub auth_header: String,
    pub auth_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateApiDestination {
    pub name: String,
    pub connection_arn: String,
    pub invocation_endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRule {
    pub name: String,
    /// JSON event pattern, as text
    pub event_pattern: String,
    pub description: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutTarget {
    pub rule_name: String,
    pub target_id: String,
    pub destination_arn: String,
    pub role_arn: String,
}

/// Remote provisioning calls, scoped by region
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    /// Create a connection, returning its ARN
    async fn create_connection(
        &self,
        region: &str,
        request: &CreateConnection,
    ) -> Result<String, GatewayError>;

    /// Look up a connection ARN by name
    async fn describe_connection(&self, region: &str, name: &str) -> Result<String, GatewayError>;

    async fn create_api_destination(
        &self,
        region: &str,
        request: &CreateApiDestination,
    ) -> Result<String, GatewayError>;

    async fn describe_api_destination(
        &self,
        region: &str,
        name: &str,
    ) -> Result<String, GatewayError>;

    /// Create or replace a rule, returning its ARN
    async fn put_rule(&self, region: &str, request: &PutRule) -> Result<String, GatewayError>;

    /// Create or replace a rule target
    async fn put_target(&self, region: &str, request: &PutTarget) -> Result<(), GatewayError>;

    async fn tag_resource(&self, region: &str, arn: &str, tags: &Tags)
        -> Result<(), GatewayError>;
}
