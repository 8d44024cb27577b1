//! [`RemoteFetcher`]s for spreadsheet exports and leadgen campaigns.
//!
//! Both sources answer with the whole dataset in one response. The response
//! is loaded on the first `next_page` call and handed out in chunks of
//! `page_size`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use syncline_core::{Clock, Provider, SystemClock};
use syncline_sync::{
    HttpRequest, HttpTransport, PageFailure, ProviderConnection, RecordKind, RecordPages,
    RemoteFetcher, RemoteRecord, Result, SyncError,
};
use tracing::{debug, info, instrument, warn};

use crate::campaign::{campaign_lead_record, CampaignResponse};
use crate::config::LeadgenConfig;
use crate::sheet::{extract_spreadsheet_id, parse_sheet_csv};

/// Produces the full record set in one request.
#[async_trait]
trait Loader: Send {
    async fn load(&mut self) -> std::result::Result<Vec<RemoteRecord>, PageFailure>;
}

struct ChunkedPages<L> {
    loader: Option<L>,
    page_size: usize,
    pending: VecDeque<RemoteRecord>,
    failures: Vec<PageFailure>,
}

impl<L: Loader> ChunkedPages<L> {
    fn new(loader: L, page_size: usize) -> Self {
        Self {
            loader: Some(loader),
            page_size: page_size.max(1),
            pending: VecDeque::new(),
            failures: Vec::new(),
        }
    }
}

#[async_trait]
impl<L: Loader> RecordPages for ChunkedPages<L> {
    async fn next_page(&mut self) -> Option<Vec<RemoteRecord>> {
        if let Some(mut loader) = self.loader.take() {
            match loader.load().await {
                Ok(records) => self.pending = records.into(),
                Err(failure) => {
                    warn!(page_ref = %failure.page_ref, reason = %failure.reason, "Lead source failed");
                    self.failures.push(failure);
                    return Some(Vec::new());
                }
            }
        }

        if self.pending.is_empty() {
            return None;
        }
        let take = self.page_size.min(self.pending.len());
        Some(self.pending.drain(..take).collect())
    }

    fn failures(&self) -> &[PageFailure] {
        &self.failures
    }
}

fn lead_failure(page_ref: &str, reason: impl Into<String>) -> PageFailure {
    PageFailure {
        kind: RecordKind::Lead,
        page_ref: page_ref.to_string(),
        reason: reason.into(),
    }
}

/// Imports leads from a publicly shared spreadsheet.
///
/// The connection's `external_account_ref` is the sheet URL or bare id.
pub struct SheetFetcher {
    transport: Arc<dyn HttpTransport>,
    config: Arc<LeadgenConfig>,
    clock: Arc<dyn Clock>,
}

impl SheetFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: LeadgenConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// CSV export URL for the first tab of `spreadsheet_id`.
    #[must_use]
    pub fn export_url(&self, spreadsheet_id: &str) -> String {
        format!(
            "{}/spreadsheets/d/{spreadsheet_id}/export?format=csv&gid=0",
            self.config.export_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl RemoteFetcher for SheetFetcher {
    fn provider(&self) -> Provider {
        Provider::LeadgenSheet
    }

    fn required_kinds(&self) -> &[RecordKind] {
        &[RecordKind::Lead]
    }

    #[instrument(skip(self, _access_token, connection, _since), fields(connection_id = %connection.id))]
    async fn open(
        &self,
        _access_token: Option<&str>,
        connection: &ProviderConnection,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Box<dyn RecordPages>> {
        let spreadsheet_id = extract_spreadsheet_id(&connection.external_account_ref)
            .ok_or_else(|| {
                SyncError::configuration(format!(
                    "Invalid spreadsheet reference: {}",
                    connection.external_account_ref
                ))
            })?;

        let loader = SheetLoader {
            transport: self.transport.clone(),
            url: self.export_url(&spreadsheet_id),
            timeout: self.config.sheet_timeout,
            spreadsheet_id,
            observed_at: self.clock.now(),
        };
        Ok(Box::new(ChunkedPages::new(loader, self.config.page_size)))
    }
}

struct SheetLoader {
    transport: Arc<dyn HttpTransport>,
    url: String,
    timeout: Duration,
    spreadsheet_id: String,
    observed_at: DateTime<Utc>,
}

#[async_trait]
impl Loader for SheetLoader {
    async fn load(&mut self) -> std::result::Result<Vec<RemoteRecord>, PageFailure> {
        let request = HttpRequest::get(self.url.clone()).timeout(self.timeout);
        let response = self
            .transport
            .send(request)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| lead_failure(&self.spreadsheet_id, e.to_string()))?;

        let records = parse_sheet_csv(&response.body, self.observed_at)
            .map_err(|reason| lead_failure(&self.spreadsheet_id, reason))?;
        debug!(spreadsheet_id = %self.spreadsheet_id, rows = records.len(), "Parsed sheet export");
        Ok(records)
    }
}

/// Imports the leads a leadgen campaign produced.
///
/// The connection's `external_account_ref` is the campaign id.
pub struct CampaignFetcher {
    transport: Arc<dyn HttpTransport>,
    config: Arc<LeadgenConfig>,
    clock: Arc<dyn Clock>,
}

impl CampaignFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: LeadgenConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn campaign_url(&self, campaign_id: &str) -> String {
        format!(
            "{}/api/campaigns/{}",
            self.config.service_base.trim_end_matches('/'),
            urlencoding::encode(campaign_id)
        )
    }
}

#[async_trait]
impl RemoteFetcher for CampaignFetcher {
    fn provider(&self) -> Provider {
        Provider::LeadgenCampaign
    }

    fn required_kinds(&self) -> &[RecordKind] {
        &[RecordKind::Lead]
    }

    #[instrument(skip(self, _access_token, connection, _since), fields(connection_id = %connection.id))]
    async fn open(
        &self,
        _access_token: Option<&str>,
        connection: &ProviderConnection,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Box<dyn RecordPages>> {
        let campaign_id = connection.external_account_ref.trim();
        if campaign_id.is_empty() {
            return Err(SyncError::configuration(
                "Leadgen campaign connection has no campaign id",
            ));
        }

        let loader = CampaignLoader {
            transport: self.transport.clone(),
            url: self.campaign_url(campaign_id),
            timeout: self.config.campaign_timeout,
            campaign_id: campaign_id.to_string(),
            observed_at: self.clock.now(),
        };
        Ok(Box::new(ChunkedPages::new(loader, self.config.page_size)))
    }
}

struct CampaignLoader {
    transport: Arc<dyn HttpTransport>,
    url: String,
    timeout: Duration,
    campaign_id: String,
    observed_at: DateTime<Utc>,
}

#[async_trait]
impl Loader for CampaignLoader {
    async fn load(&mut self) -> std::result::Result<Vec<RemoteRecord>, PageFailure> {
        let request = HttpRequest::get(self.url.clone()).timeout(self.timeout);
        let body: CampaignResponse = self
            .transport
            .send(request)
            .await
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| lead_failure(&self.campaign_id, e.to_string()))?;

        let leads = body
            .leads
            .ok_or_else(|| lead_failure(&self.campaign_id, "no leads returned from leadgen service"))?;

        info!(
            campaign_id = %self.campaign_id,
            reported_id = ?body.campaign_id,
            leads = leads.len(),
            "Loaded campaign results"
        );

        Ok(leads
            .into_iter()
            .enumerate()
            .filter_map(|(idx, lead)| match lead {
                Value::Object(lead) => Some(campaign_lead_record(
                    &lead,
                    idx + 1,
                    &self.campaign_id,
                    self.observed_at,
                )),
                other => {
                    warn!(position = idx + 1, item = %other, "Ignoring non-object campaign lead");
                    None
                }
            })
            .collect())
    }
}
