//! Provisioner configuration
//!
//! Read from the environment (`EVENTROUTE_*`). The binary loads `.env`
//! first; library code only sees the lookup function.

use std::time::Duration;

use eventroute_core::RetryPolicy;

use crate::gateway::{GatewaySettings, Tags};

/// Error type for configuration loading
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Installation-wide adjustments to every trigger kind's retry policy
///
/// Unset fields keep the kind's own value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryOverrides {
    pub first_delay: Option<Duration>,
    pub interval: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl RetryOverrides {
    pub fn apply(&self, mut policy: RetryPolicy) -> RetryPolicy {
        if let Some(delay) = self.first_delay {
            policy = policy.with_first_delay(delay);
        }
        if let Some(interval) = self.interval {
            policy = policy.with_interval(interval);
        }
        if let Some(max) = self.max_attempts {
            policy = policy.with_max_attempts(Some(max));
        }
        policy
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Everything needed to build a router for one installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub gateway: GatewaySettings,
    pub retry: RetryOverrides,
}

impl ProvisionerConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `EVENTROUTE_CALLBACK_URL` (required): webhook the API destinations invoke
    /// - `EVENTROUTE_INVOKER_ROLE_ARN` (required): role EventBridge assumes
    /// - `EVENTROUTE_AUTH_SECRET` (required): shared secret sent on deliveries
    /// - `EVENTROUTE_AUTH_HEADER`: header name (default: "x-eventroute-signature")
    /// - `EVENTROUTE_NAME_PREFIX`: resource name prefix (default: "eventroute")
    /// - `EVENTROUTE_TAGS`: `key=value,key2=value2`
    /// - `EVENTROUTE_FIRST_CHECK_SECS`, `EVENTROUTE_RETRY_INTERVAL_SECS`,
    ///   `EVENTROUTE_MAX_ATTEMPTS`: retry overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ProvisionerConfig::from_env`] with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let mut gateway = GatewaySettings::new(
            required("EVENTROUTE_CALLBACK_URL")?,
            required("EVENTROUTE_INVOKER_ROLE_ARN")?,
            required("EVENTROUTE_AUTH_SECRET")?,
        );
        if !gateway.callback_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                key: "EVENTROUTE_CALLBACK_URL",
                reason: "API destinations require an https endpoint".to_string(),
            });
        }
        if let Some(header) = get("EVENTROUTE_AUTH_HEADER") {
            gateway = gateway.with_auth_header(header);
        }
        if let Some(prefix) = get("EVENTROUTE_NAME_PREFIX") {
            gateway = gateway.with_name_prefix(prefix);
        }
        if let Some(tags) = get("EVENTROUTE_TAGS") {
            gateway = gateway.with_tags(parse_tags(&tags)?);
        }

        let retry = RetryOverrides {
            first_delay: parse_u64(&get, "EVENTROUTE_FIRST_CHECK_SECS")?.map(Duration::from_secs),
            interval: parse_u64(&get, "EVENTROUTE_RETRY_INTERVAL_SECS")?.map(Duration::from_secs),
            max_attempts: parse_u64(&get, "EVENTROUTE_MAX_ATTEMPTS")?
                .map(|n| {
                    u32::try_from(n).map_err(|_| ConfigError::Invalid {
                        key: "EVENTROUTE_MAX_ATTEMPTS",
                        reason: "out of range".to_string(),
                    })
                })
                .transpose()?,
        };
        if retry.max_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                key: "EVENTROUTE_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self { gateway, retry })
    }
}

fn parse_u64<G>(get: &G, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        })
        .transpose()
}

/// Parse `key=value,key2=value2`
pub fn parse_tags(raw: &str) -> Result<Tags, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').ok_or_else(|| ConfigError::Invalid {
                key: "EVENTROUTE_TAGS",
                reason: format!("`{pair}` is not key=value"),
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "EVENTROUTE_TAGS",
                    reason: format!("`{pair}` has an empty key"),
                });
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}
