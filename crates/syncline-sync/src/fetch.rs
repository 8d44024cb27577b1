//! Remote fetcher contract.
//!
//! A fetcher turns a provider's pagination idiom into pages of
//! [`RemoteRecord`]s. Page failures are logged and recorded, never raised:
//! a failed page simply contributes no records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syncline_core::Provider;

use crate::credential::ProviderConnection;
use crate::error::Result;
use crate::record::{RecordKind, RemoteRecord};

/// A page that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub kind: RecordKind,
    /// Cursor, offset or metric name identifying the page.
    pub page_ref: String,
    pub reason: String,
}

/// Lazy, finite page cursor. Not restartable.
#[async_trait]
pub trait RecordPages: Send {
    /// Next page, or `None` when exhausted.
    async fn next_page(&mut self) -> Option<Vec<RemoteRecord>>;

    /// Pages that failed so far.
    fn failures(&self) -> &[PageFailure];
}

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    fn provider(&self) -> Provider;

    /// Kinds whose total absence after page failures must be reported.
    fn required_kinds(&self) -> &[RecordKind] {
        &[]
    }

    /// Start a fetch. Errors here mean the fetch cannot begin at all, e.g. an
    /// unparseable account reference.
    async fn open(
        &self,
        access_token: Option<&str>,
        connection: &ProviderConnection,
        since: Option<DateTime<Utc>>,
    ) -> Result<Box<dyn RecordPages>>;
}

/// Pages computed up front.
#[derive(Debug, Default)]
pub struct StaticPages {
    pages: std::collections::VecDeque<Vec<RemoteRecord>>,
    failures: Vec<PageFailure>,
}

impl StaticPages {
    #[must_use]
    pub fn new(pages: Vec<Vec<RemoteRecord>>, failures: Vec<PageFailure>) -> Self {
        Self {
            pages: pages.into(),
            failures,
        }
    }
}

#[async_trait]
impl RecordPages for StaticPages {
    async fn next_page(&mut self) -> Option<Vec<RemoteRecord>> {
        self.pages.pop_front()
    }

    fn failures(&self) -> &[PageFailure] {
        &self.failures
    }
}
