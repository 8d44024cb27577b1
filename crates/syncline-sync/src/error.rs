//! Sync error types.

use std::time::Duration;

use syncline_core::{Provider, TenantId};
use thiserror::Error;

/// Errors raised while talking to a remote HTTP endpoint.
///
/// Non-2xx responses are not transport errors; the transport hands them back
/// as an [`HttpResponse`](crate::http::HttpResponse) for the caller to judge.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection dropped.
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The request exceeded its timeout.
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// The response body could not be decoded.
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A non-success status after retries were exhausted.
    #[error("Request to {url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

impl TransportError {
    pub fn request(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Connection failures and timeouts may succeed on a later attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Timeout { .. })
    }
}

/// Errors from the token endpoint. Never retried.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// Token endpoint answered with a non-200 status or without an access token.
    #[error("Token refresh rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The credential has no refresh token, so nothing can be attempted.
    #[error("Credential has no refresh token")]
    NoRefreshToken,

    /// The token endpoint could not be reached.
    #[error("Token refresh transport failure: {0}")]
    Transport(#[from] TransportError),
}

impl RefreshError {
    /// HTTP status reported by the provider, when there was one.
    #[must_use]
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(TransportError::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend failed.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// An entity body could not be (de)serialized.
    #[error("Entity serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A batch tried to write an entity owned by another tenant.
    #[error("Entity belongs to tenant {found}, batch is for tenant {expected}")]
    TenantMismatch { expected: TenantId, found: TenantId },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Errors that can occur during a tenant sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No provider connection is linked for the tenant.
    #[error("No {provider} connection for tenant {tenant_id}")]
    ConnectionMissing {
        tenant_id: TenantId,
        provider: Provider,
    },

    /// The connection has no stored credential.
    #[error("No stored {provider} credential for tenant {tenant_id}")]
    CredentialMissing {
        tenant_id: TenantId,
        provider: Provider,
    },

    /// Token refresh failed.
    #[error("Token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    /// A fetcher could not even start.
    #[error("Fetch error ({kind}): {message}")]
    Fetch { kind: String, message: String },

    /// A record failed required-field validation.
    #[error("Validation error for {record_ref}: {message}")]
    Validation { record_ref: String, message: String },

    /// Unexpected write or read failure.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Transport failure outside of token refresh.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid wiring or settings.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The run state machine refused a phase change.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The tenant run exceeded its deadline.
    #[error("Tenant run timed out after {}s", after.as_secs())]
    Timeout { after: Duration },
}

impl SyncError {
    pub fn connection_missing(tenant_id: TenantId, provider: Provider) -> Self {
        Self::ConnectionMissing {
            tenant_id,
            provider,
        }
    }

    pub fn credential_missing(tenant_id: TenantId, provider: Provider) -> Self {
        Self::CredentialMissing {
            tenant_id,
            provider,
        }
    }

    pub fn fetch(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn validation(record_ref: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            record_ref: record_ref.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_state_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Whether a later run could succeed without operator action.
    ///
    /// Missing connections, rejected refreshes and bad configuration need a
    /// human; transient transport and storage failures do not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(e) => e.is_retryable(),
            SyncError::Refresh(RefreshError::Transport(e)) => e.is_retryable(),
            SyncError::Persistence(StoreError::Backend(_)) => true,
            SyncError::Fetch { .. } | SyncError::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
