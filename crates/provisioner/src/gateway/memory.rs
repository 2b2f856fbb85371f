//! In-memory implementation of ProvisioningApi for testing
//!
//! Behaves like EventBridge for the calls we make: creates fail with
//! `AlreadyExists` when the name is taken, puts overwrite. Failures can be
//! injected per operation to exercise error paths.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::api::{CreateApiDestination, CreateConnection, ProvisioningApi, PutRule, PutTarget, Tags};
use super::error::{GatewayError, ResourceKind};

type Scoped = (String, String);

#[derive(Default)]
struct State {
    connections: HashMap<Scoped, String>,
    destinations: HashMap<Scoped, String>,
    rules: HashMap<Scoped, (String, PutRule)>,
    targets: HashMap<Scoped, Vec<PutTarget>>,
    tags: HashMap<String, Tags>,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, VecDeque<GatewayError>>,
    next_id: u64,
}

impl State {
    /// Count the call and pop an injected failure, if any
    fn enter(&mut self, operation: &'static str) -> Result<(), GatewayError> {
        *self.calls.entry(operation).or_default() += 1;
        match self.failures.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn arn(&mut self, account: &str, region: &str, resource: &str, name: &str) -> String {
        self.next_id += 1;
        format!(
            "arn:aws:events:{region}:{account}:{resource}/{name}/{}",
            self.next_id
        )
    }
}

/// Thread-safe fake of the EventBridge control plane
pub struct InMemoryProvisioningApi {
    account_id: String,
    state: RwLock<State>,
}

impl InMemoryProvisioningApi {
    pub fn new() -> Self {
        Self::with_account("123456789012")
    }

    pub fn with_account(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            state: RwLock::new(State::default()),
        }
    }

    /// Make the next call to `operation` fail with `error`
    ///
    /// Operations are named after the [`ProvisioningApi`] methods.
    pub fn fail_next(&self, operation: &'static str, error: GatewayError) {
        self.state
            .write()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of calls made to `operation`, including failed ones
    pub fn calls(&self, operation: &str) -> usize {
        self.state.read().calls.get(operation).copied().unwrap_or(0)
    }

    /// Total number of calls across all operations
    pub fn total_calls(&self) -> usize {
        self.state.read().calls.values().sum()
    }

    pub fn tags_for(&self, arn: &str) -> Tags {
        self.state.read().tags.get(arn).cloned().unwrap_or_default()
    }

    pub fn rule_pattern(&self, region: &str, name: &str) -> Option<String> {
        self.state
            .read()
            .rules
            .get(&(region.to_string(), name.to_string()))
            .map(|(_, rule)| rule.event_pattern.clone())
    }

    pub fn targets_for(&self, region: &str, rule_name: &str) -> Vec<PutTarget> {
        self.state
            .read()
            .targets
            .get(&(region.to_string(), rule_name.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for InMemoryProvisioningApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProvisioningApi for InMemoryProvisioningApi {
    async fn create_connection(
        &self,
        region: &str,
        request: &CreateConnection,
    ) -> Result<String, GatewayError> {
        let mut state = self.state.write();
        state.enter("create_connection")?;

        let key = (region.to_string(), request.name.clone());
        if state.connections.contains_key(&key) {
            return Err(GatewayError::already_exists(
                ResourceKind::Connection,
                &request.name,
            ));
        }
        let arn = state.arn(&self.account_id, region, "connection", &request.name);
        state.connections.insert(key, arn.clone());
        Ok(arn)
    }

    async fn describe_connection(&self, region: &str, name: &str) -> Result<String, GatewayError> {
        let mut state = self.state.write();
        state.enter("describe_connection")?;
        state
            .connections
            .get(&(region.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| GatewayError::not_found(ResourceKind::Connection, name))
    }

    async fn create_api_destination(
        &self,
        region: &str,
        request: &CreateApiDestination,
    ) -> Result<String, GatewayError> {
        let mut state = self.state.write();
        state.enter("create_api_destination")?;

        let key = (region.to_string(), request.name.clone());
        if state.destinations.contains_key(&key) {
            return Err(GatewayError::already_exists(
                ResourceKind::ApiDestination,
                &request.name,
            ));
        }
        let arn = state.arn(&self.account_id, region, "api-destination", &request.name);
        state.destinations.insert(key, arn.clone());
        Ok(arn)
    }

    async fn describe_api_destination(
        &self,
        region: &str,
        name: &str,
    ) -> Result<String, GatewayError> {
        let mut state = self.state.write();
        state.enter("describe_api_destination")?;
        state
            .destinations
            .get(&(region.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| GatewayError::not_found(ResourceKind::ApiDestination, name))
    }

    async fn put_rule(&self, region: &str, request: &PutRule) -> Result<String, GatewayError> {
        let mut state = self.state.write();
        state.enter("put_rule")?;

        let key = (region.to_string(), request.name.clone());
        // Rule ARNs are stable across puts
        let arn = match state.rules.get(&key) {
            Some((arn, _)) => arn.clone(),
            None => format!(
                "arn:aws:events:{region}:{}:rule/{}",
                self.account_id, request.name
            ),
        };
        state.tags.insert(arn.clone(), request.tags.clone());
        state.rules.insert(key, (arn.clone(), request.clone()));
        Ok(arn)
    }

    async fn put_target(&self, region: &str, request: &PutTarget) -> Result<(), GatewayError> {
        let mut state = self.state.write();
        state.enter("put_target")?;

        let key = (region.to_string(), request.rule_name.clone());
        if !state.rules.contains_key(&key) {
            return Err(GatewayError::not_found(ResourceKind::Rule, &request.rule_name));
        }
        let targets = state.targets.entry(key).or_default();
        targets.retain(|t| t.target_id != request.target_id);
        targets.push(request.clone());
        Ok(())
    }

    async fn tag_resource(
        &self,
        _region: &str,
        arn: &str,
        tags: &Tags,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.write();
        state.enter("tag_resource")?;
        state
            .tags
            .entry(arn.to_string())
            .or_default()
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}
