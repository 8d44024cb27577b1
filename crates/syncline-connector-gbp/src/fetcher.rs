//! [`RemoteFetcher`] for Google Business Profile.
//!
//! One page per configured metric (a `reportInsights` call each), then the
//! location's reviews following `nextPageToken`. Failed pages are recorded and
//! contribute nothing; a failed review page ends review paging since the next
//! token is unknown.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syncline_core::{Clock, Provider, SystemClock};
use syncline_sync::{
    HttpRequest, HttpTransport, PageFailure, ProviderConnection, RecordKind, RecordPages,
    RemoteFetcher, RemoteRecord, Result, SyncError, TransportError,
};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::GbpConfig;
use crate::insights::{report_request, ReportResponse, ReportWindow};
use crate::location::LocationRef;
use crate::reviews::ReviewsPage;

const REQUIRED_KINDS: &[RecordKind] = &[RecordKind::Metric];

pub struct GbpFetcher {
    transport: Arc<dyn HttpTransport>,
    config: Arc<GbpConfig>,
    clock: Arc<dyn Clock>,
}

impl GbpFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: GbpConfig) -> Self {
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

    pub fn config(&self) -> &GbpConfig {
        &self.config
    }
}

#[async_trait]
impl RemoteFetcher for GbpFetcher {
    fn provider(&self) -> Provider {
        Provider::GoogleGbp
    }

    fn required_kinds(&self) -> &[RecordKind] {
        REQUIRED_KINDS
    }

    /// Metrics are a trailing-window snapshot, so `since` is not used.
    #[instrument(skip(self, access_token, connection, _since), fields(connection_id = %connection.id))]
    async fn open(
        &self,
        access_token: Option<&str>,
        connection: &ProviderConnection,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Box<dyn RecordPages>> {
        let token = access_token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::configuration("Google Business Profile needs an access token"))?;
        let location: LocationRef = connection.external_account_ref.parse()?;
        let location_url = Url::parse(&format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            location.path()
        ))
        .map_err(|e| SyncError::configuration(format!("GBP API base: {e}")))?;

        let now = self.clock.now();
        let window = ReportWindow::trailing(now.date_naive(), self.config.window_days);
        debug!(location = %location, start = %window.start, end = %window.end, "Opening GBP fetch");

        Ok(Box::new(GbpPages {
            transport: self.transport.clone(),
            config: self.config.clone(),
            token: token.to_string(),
            location,
            location_url,
            window,
            observed_at: now,
            pending_metrics: self.config.metrics.iter().cloned().collect(),
            reviews: ReviewCursor::First,
            review_pages: 0,
            failures: Vec::new(),
        }))
    }
}

enum ReviewCursor {
    First,
    Next(String),
    Done,
}

struct GbpPages {
    transport: Arc<dyn HttpTransport>,
    config: Arc<GbpConfig>,
    token: String,
    location: LocationRef,
    location_url: Url,
    window: ReportWindow,
    observed_at: DateTime<Utc>,
    pending_metrics: VecDeque<String>,
    reviews: ReviewCursor,
    review_pages: u32,
    failures: Vec<PageFailure>,
}

impl GbpPages {
    fn endpoint(&self, suffix: &str) -> Url {
        let mut url = self.location_url.clone();
        let path = format!("{}/{suffix}", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url
    }

    async fn fetch_metric(&self, metric: &str) -> std::result::Result<RemoteRecord, TransportError> {
        let request = HttpRequest::post_json(
            self.endpoint("reportInsights").to_string(),
            report_request(&self.location, metric, &self.window),
        )
        .bearer(&self.token)
        .timeout(self.config.request_timeout);

        let response = self.transport.send(request).await?.error_for_status()?;
        let report: ReportResponse = response.json()?;
        Ok(report.into_record(metric, &self.window, self.observed_at))
    }

    async fn fetch_reviews(
        &self,
        page_token: Option<&str>,
    ) -> std::result::Result<ReviewsPage, TransportError> {
        let mut url = self.endpoint("reviews");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", &self.config.review_page_size.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let request = HttpRequest::get(url.to_string())
            .bearer(&self.token)
            .timeout(self.config.request_timeout);
        let response = self.transport.send(request).await?.error_for_status()?;
        response.json()
    }

    fn fail(&mut self, kind: RecordKind, page_ref: String, reason: String) {
        warn!(kind = %kind, page_ref = %page_ref, reason = %reason, "GBP page failed");
        self.failures.push(PageFailure {
            kind,
            page_ref,
            reason,
        });
    }
}

#[async_trait]
impl RecordPages for GbpPages {
    async fn next_page(&mut self) -> Option<Vec<RemoteRecord>> {
        if let Some(metric) = self.pending_metrics.pop_front() {
            return Some(match self.fetch_metric(&metric).await {
                Ok(record) => vec![record],
                Err(e) => {
                    self.fail(RecordKind::Metric, metric, e.to_string());
                    Vec::new()
                }
            });
        }

        let page_token = match std::mem::replace(&mut self.reviews, ReviewCursor::Done) {
            ReviewCursor::Done => return None,
            ReviewCursor::First => None,
            ReviewCursor::Next(token) => Some(token),
        };
        if self.review_pages >= self.config.max_review_pages {
            warn!(pages = self.review_pages, "Review page limit reached");
            return None;
        }
        self.review_pages += 1;

        let page_ref = page_token.clone().unwrap_or_else(|| "first".to_string());
        match self.fetch_reviews(page_token.as_deref()).await {
            Ok(page) => {
                if let Some(next) = page.next_page_token.filter(|t| !t.is_empty()) {
                    self.reviews = ReviewCursor::Next(next);
                }
                let observed_at = self.observed_at;
                Some(
                    page.reviews
                        .into_iter()
                        .filter_map(|r| r.into_record(observed_at))
                        .collect(),
                )
            }
            Err(e) => {
                self.fail(RecordKind::Review, page_ref, e.to_string());
                Some(Vec::new())
            }
        }
    }

    fn failures(&self) -> &[PageFailure] {
        &self.failures
    }
}
