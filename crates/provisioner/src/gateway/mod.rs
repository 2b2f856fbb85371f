//! Resource gateway
//!
//! This module provides:
//! - [`ResourceGateway`] with create-or-describe semantics over a [`ProvisioningApi`]
//! - [`EventBridgeApi`] speaking AWS JSON 1.1 through a [`CredentialedIssuer`]
//! - [`InMemoryProvisioningApi`] for testing

mod api;
mod error;
mod eventbridge;
mod memory;
mod resource_gateway;

pub use api::{CreateApiDestination, CreateConnection, ProvisioningApi, PutRule, PutTarget, Tags};
pub use error::{GatewayError, ResourceKind};
pub use eventbridge::{CredentialedIssuer, EventBridgeApi, HttpResponse, IssuerError, ServiceRequest};
pub use memory::InMemoryProvisioningApi;
pub use resource_gateway::{event_pattern, GatewaySettings, ResourceGateway};
