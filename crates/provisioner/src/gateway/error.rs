//! Gateway error taxonomy

/// The EventBridge resources the gateway manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Connection,
    ApiDestination,
    Rule,
    Target,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::ApiDestination => write!(f, "api destination"),
            Self::Rule => write!(f, "rule"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Typed failure of a provisioning call
///
/// Every variant names the resource so the error is actionable on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// A create call lost to an existing resource with the same name
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("{kind} {name} not found")]
    NotFound { kind: ResourceKind, name: String },

    /// Throttling, 5xx or transport failure
    #[error("transient failure on {kind} {name}: {message}")]
    Transient {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    #[error("{kind} {name} failed: {message}")]
    Fatal {
        kind: ResourceKind,
        name: String,
        message: String,
    },
}

impl GatewayError {
    pub fn already_exists(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn transient(
        kind: ResourceKind,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transient {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn fatal(kind: ResourceKind, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::AlreadyExists { kind, .. }
            | Self::NotFound { kind, .. }
            | Self::Transient { kind, .. }
            | Self::Fatal { kind, .. } => *kind,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Whether a later attempt may succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
