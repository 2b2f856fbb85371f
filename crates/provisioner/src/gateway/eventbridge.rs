//! EventBridge JSON 1.1 client
//!
//! Builds `AWSEvents.*` requests and classifies their responses. Signing
//! and transport belong to the [`CredentialedIssuer`], which the host
//! supplies with credentials for the customer's account.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::api::{CreateApiDestination, CreateConnection, ProvisioningApi, PutRule, PutTarget, Tags};
use super::error::{GatewayError, ResourceKind};
use super::resource_gateway::kind_from_arn;

const SERVICE: &str = "events";
const TARGET_PREFIX: &str = "AWSEvents";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// An unsigned AWS JSON request
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub region: String,
    pub service: &'static str,
    /// Value of the `X-Amz-Target` header
    pub target: String,
    pub content_type: &'static str,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    /// The request never got a response
    #[error("transport error: {0}")]
    Transport(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),
}

/// Signs and sends requests with credentials for the target account
#[async_trait]
pub trait CredentialedIssuer: Send + Sync {
    async fn execute(&self, request: ServiceRequest) -> Result<HttpResponse, IssuerError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

/// [`ProvisioningApi`] backed by the EventBridge control plane
pub struct EventBridgeApi<I: CredentialedIssuer> {
    issuer: I,
}

impl<I: CredentialedIssuer> EventBridgeApi<I> {
    pub fn new(issuer: I) -> Self {
        Self { issuer }
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    async fn call(
        &self,
        region: &str,
        operation: &str,
        body: Value,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Value, GatewayError> {
        let request = ServiceRequest {
            region: region.to_string(),
            service: SERVICE,
            target: format!("{TARGET_PREFIX}.{operation}"),
            content_type: CONTENT_TYPE,
            body,
        };

        let response = self.issuer.execute(request).await.map_err(|e| match e {
            IssuerError::Transport(message) => GatewayError::transient(kind, name, message),
            IssuerError::Credentials(message) => GatewayError::fatal(kind, name, message),
        })?;

        debug!(operation, status = response.status, "eventbridge response");
        if response.is_success() {
            if response.body.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&response.body)
                .map_err(|e| GatewayError::fatal(kind, name, format!("unreadable response: {e}")));
        }

        Err(classify(&response, kind, name))
    }
}

/// Map an error response onto the gateway taxonomy
fn classify(response: &HttpResponse, kind: ResourceKind, name: &str) -> GatewayError {
    let body: ErrorBody = serde_json::from_slice(&response.body).unwrap_or(ErrorBody {
        error_type: String::new(),
        message: String::from_utf8_lossy(&response.body).into_owned(),
    });
    // `__type` may be namespaced: "com.amazonaws.events#ResourceNotFoundException"
    let code = body
        .error_type
        .rsplit('#')
        .next()
        .unwrap_or_default()
        .to_string();

    match code.as_str() {
        "ResourceAlreadyExistsException" => GatewayError::already_exists(kind, name),
        "ResourceNotFoundException" => GatewayError::not_found(kind, name),
        "ThrottlingException" | "ConcurrentModificationException" => {
            GatewayError::transient(kind, name, format!("{code}: {}", body.message))
        }
        _ if response.status >= 500 => GatewayError::transient(
            kind,
            name,
            format!("HTTP {}: {}", response.status, body.message),
        ),
        _ => GatewayError::fatal(
            kind,
            name,
            format!("HTTP {} {code}: {}", response.status, body.message),
        ),
    }
}

fn tag_list(tags: &Tags) -> Vec<Value> {
    tags.iter()
        .map(|(key, value)| json!({ "Key": key, "Value": value }))
        .collect()
}

fn string_field(
    body: &Value,
    field: &str,
    kind: ResourceKind,
    name: &str,
) -> Result<String, GatewayError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::fatal(kind, name, format!("response is missing {field}")))
}

#[async_trait]
impl<I: CredentialedIssuer> ProvisioningApi for EventBridgeApi<I> {
    async fn create_connection(
        &self,
        region: &str,
        request: &CreateConnection,
    ) -> Result<String, GatewayError> {
        let kind = ResourceKind::Connection;
        let body = json!({
            "Name": request.name,
            "AuthorizationType": "API_KEY",
            "AuthParameters": {
                "ApiKeyAuthParameters": {
                    "ApiKeyName": request.auth_header,
                    "ApiKeyValue": request.auth_secret,
                }
            }
        });
        let response = self
            .call(region, "CreateConnection", body, kind, &request.name)
            .await?;
        string_field(&response, "ConnectionArn", kind, &request.name)
    }

    async fn describe_connection(&self, region: &str, name: &str) -> Result<String, GatewayError> {
        let kind = ResourceKind::Connection;
        let response = self
            .call(region, "DescribeConnection", json!({ "Name": name }), kind, name)
            .await?;
        string_field(&response, "ConnectionArn", kind, name)
    }

    async fn create_api_destination(
        &self,
        region: &str,
        request: &CreateApiDestination,
    ) -> Result<String, GatewayError> {
        let kind = ResourceKind::ApiDestination;
        let body = json!({
            "Name": request.name,
            "ConnectionArn": request.connection_arn,
            "InvocationEndpoint": request.invocation_endpoint,
            "HttpMethod": "POST",
        });
        let response = self
            .call(region, "CreateApiDestination", body, kind, &request.name)
            .await?;
        string_field(&response, "ApiDestinationArn", kind, &request.name)
    }

    async fn describe_api_destination(
        &self,
        region: &str,
        name: &str,
    ) -> Result<String, GatewayError> {
        let kind = ResourceKind::ApiDestination;
        let response = self
            .call(
                region,
                "DescribeApiDestination",
                json!({ "Name": name }),
                kind,
                name,
            )
            .await?;
        string_field(&response, "ApiDestinationArn", kind, name)
    }

    async fn put_rule(&self, region: &str, request: &PutRule) -> Result<String, GatewayError> {
        let kind = ResourceKind::Rule;
        let body = json!({
            "Name": request.name,
            "EventPattern": request.event_pattern,
            "Description": request.description,
            "State": "ENABLED",
            "Tags": tag_list(&request.tags),
        });
        let response = self
            .call(region, "PutRule", body, kind, &request.name)
            .await?;
        string_field(&response, "RuleArn", kind, &request.name)
    }

    async fn put_target(&self, region: &str, request: &PutTarget) -> Result<(), GatewayError> {
        let kind = ResourceKind::Target;
        let body = json!({
            "Rule": request.rule_name,
            "Targets": [{
                "Id": request.target_id,
                "Arn": request.destination_arn,
                "RoleArn": request.role_arn,
            }]
        });
        let response = self
            .call(region, "PutTargets", body, kind, &request.target_id)
            .await?;

        // PutTargets reports per-entry failures with a 200
        let failed = response
            .get("FailedEntryCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if failed > 0 {
            let reason = response
                .pointer("/FailedEntries/0/ErrorMessage")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            warn!(rule = %request.rule_name, failed, "put targets rejected entries");
            return Err(GatewayError::fatal(kind, &request.target_id, reason));
        }
        Ok(())
    }

    async fn tag_resource(
        &self,
        region: &str,
        arn: &str,
        tags: &Tags,
    ) -> Result<(), GatewayError> {
        let body = json!({ "ResourceARN": arn, "Tags": tag_list(tags) });
        self.call(region, "TagResource", body, kind_from_arn(arn), arn)
            .await
            .map(|_| ())
    }
}
