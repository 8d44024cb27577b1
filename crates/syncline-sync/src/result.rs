//! Per-run results handed back to callers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use syncline_core::{Provider, TenantId};

use crate::error::{RefreshError, StoreError, SyncError};

/// A record the run could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub record_ref: String,
    pub reason: String,
}

/// Counts and errors for one tenant run. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub tenant_id: TenantId,
    pub provider: Provider,
    pub records_fetched: usize,
    pub records_created: usize,
    pub records_updated: usize,
    pub records_skipped: usize,
    /// In the order they occurred.
    pub errors: Vec<RecordError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncResult {
    #[must_use]
    pub fn new(tenant_id: TenantId, provider: Provider, started_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            provider,
            records_fetched: 0,
            records_created: 0,
            records_updated: 0,
            records_skipped: 0,
            errors: Vec::new(),
            started_at,
            finished_at: None,
        }
    }

    pub fn push_error(&mut self, record_ref: impl Into<String>, reason: impl Into<String>) {
        self.errors.push(RecordError {
            record_ref: record_ref.into(),
            reason: reason.into(),
        });
    }

    /// Records that were either created or updated.
    #[must_use]
    pub fn records_applied(&self) -> usize {
        self.records_created + self.records_updated
    }
}

/// Why a tenant run failed, in caller-facing terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The tenant has not linked this provider.
    ConnectionMissing,
    /// The connection exists but has no stored credential.
    CredentialMissing,
    /// The provider refused the refresh token, or had none to refuse.
    RefreshFailed {
        provider_status: Option<u16>,
        detail: String,
    },
    /// The fetch could not start.
    FetchFailed { detail: String },
    /// Writing the batch failed; nothing was committed.
    PersistenceFailed { detail: String },
    /// The run exceeded its deadline.
    Timeout { after_secs: u64 },
    /// Invalid settings or wiring.
    Misconfigured { detail: String },
    /// Anything else, including a panicked task.
    Internal { detail: String },
}

impl FailureReason {
    /// Whether re-linking the provider is the expected fix.
    #[must_use]
    pub fn needs_relink(&self) -> bool {
        matches!(
            self,
            Self::ConnectionMissing | Self::CredentialMissing | Self::RefreshFailed { .. }
        )
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionMissing => write!(f, "provider is not connected for this tenant"),
            Self::CredentialMissing => write!(f, "no stored credential for this connection"),
            Self::RefreshFailed {
                provider_status: Some(status),
                detail,
            } => write!(f, "token refresh rejected by provider (HTTP {status}): {detail}"),
            Self::RefreshFailed {
                provider_status: None,
                detail,
            } => write!(f, "token refresh failed: {detail}"),
            Self::FetchFailed { detail } => write!(f, "could not fetch remote data: {detail}"),
            Self::PersistenceFailed { detail } => write!(f, "could not save synced data: {detail}"),
            Self::Timeout { after_secs } => write!(f, "sync timed out after {after_secs}s"),
            Self::Misconfigured { detail } => write!(f, "sync is misconfigured: {detail}"),
            Self::Internal { detail } => write!(f, "internal error: {detail}"),
        }
    }
}

impl From<&SyncError> for FailureReason {
    fn from(err: &SyncError) -> Self {
        match err {
            SyncError::ConnectionMissing { .. } => Self::ConnectionMissing,
            SyncError::CredentialMissing { .. } => Self::CredentialMissing,
            SyncError::Refresh(refresh) => Self::RefreshFailed {
                provider_status: refresh.provider_status(),
                detail: match refresh {
                    RefreshError::Rejected { body, .. } => truncate(body, 500),
                    other => other.to_string(),
                },
            },
            SyncError::Fetch { .. } | SyncError::Transport(_) => Self::FetchFailed {
                detail: err.to_string(),
            },
            SyncError::Persistence(store) => Self::PersistenceFailed {
                detail: match store {
                    StoreError::Backend(message) => message.clone(),
                    other => other.to_string(),
                },
            },
            SyncError::Timeout { after } => Self::Timeout {
                after_secs: after.as_secs(),
            },
            SyncError::Configuration { message } => Self::Misconfigured {
                detail: message.clone(),
            },
            SyncError::Validation { .. } | SyncError::InvalidStateTransition { .. } => {
                Self::Internal {
                    detail: err.to_string(),
                }
            }
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

/// What a tenant run produced. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TenantOutcome {
    Completed(SyncResult),
    Failed {
        reason: FailureReason,
        partial: SyncResult,
    },
}

impl TenantOutcome {
    #[must_use]
    pub fn result(&self) -> &SyncResult {
        match self {
            Self::Completed(result) => result,
            Self::Failed { partial, .. } => partial,
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.result().tenant_id
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Completed(_) => None,
            Self::Failed { reason, .. } => Some(reason),
        }
    }
}

/// What a multi-tenant run produced.
///
/// `listing_error` is set when the connected tenants could not be listed, so
/// an empty `outcomes` is never mistaken for "nothing to do".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub provider: Provider,
    pub outcomes: BTreeMap<TenantId, TenantOutcome>,
    pub listing_error: Option<FailureReason>,
}

impl BatchOutcome {
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            outcomes: BTreeMap::new(),
            listing_error: None,
        }
    }

    #[must_use]
    pub fn listing_failed(provider: Provider, reason: FailureReason) -> Self {
        Self {
            listing_error: Some(reason),
            ..Self::new(provider)
        }
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes.values().filter(|o| !o.is_completed()).count()
    }

    /// No listing error and no failed tenant.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.listing_error.is_none() && self.failed_count() == 0
    }
}
