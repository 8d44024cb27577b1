//! [`RemoteFetcher`] for OpenPhone call and message logs.
//!
//! Both streams use `limit`/`offset` paging on `phoneNumberId`. A stream ends
//! on a short page, on `max_pages`, or on the first failed page.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use syncline_core::{Clock, Provider, SystemClock};
use syncline_sync::{
    HttpRequest, HttpTransport, PageFailure, ProviderConnection, RecordKind, RecordPages,
    RemoteFetcher, RemoteRecord, Result, SyncError, TransportError,
};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::OpenPhoneConfig;
use crate::mapping::{call_record, message_record};

pub struct OpenPhoneFetcher {
    transport: Arc<dyn HttpTransport>,
    config: Arc<OpenPhoneConfig>,
    clock: Arc<dyn Clock>,
}

impl OpenPhoneFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: OpenPhoneConfig) -> Self {
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
}

#[async_trait]
impl RemoteFetcher for OpenPhoneFetcher {
    fn provider(&self) -> Provider {
        Provider::Openphone
    }

    #[instrument(skip(self, api_key, connection), fields(connection_id = %connection.id))]
    async fn open(
        &self,
        api_key: Option<&str>,
        connection: &ProviderConnection,
        since: Option<DateTime<Utc>>,
    ) -> Result<Box<dyn RecordPages>> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SyncError::configuration("OpenPhone needs an API key"))?;
        let phone_number_id = connection.external_account_ref.trim();
        if phone_number_id.is_empty() {
            return Err(SyncError::configuration(
                "OpenPhone connection has no phone number id",
            ));
        }
        let base = Url::parse(self.config.api_base.trim_end_matches('/'))
            .map_err(|e| SyncError::configuration(format!("OpenPhone API base: {e}")))?;

        Ok(Box::new(OpenPhonePages {
            transport: self.transport.clone(),
            config: self.config.clone(),
            base,
            api_key: api_key.to_string(),
            phone_number_id: phone_number_id.to_string(),
            since,
            observed_at: self.clock.now(),
            streams: vec![Stream::new(RecordKind::Call), Stream::new(RecordKind::Message)],
            current: 0,
            failures: Vec::new(),
        }))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: Vec<Value>,
}

struct Stream {
    kind: RecordKind,
    offset: u32,
    pages: u32,
    done: bool,
}

impl Stream {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            offset: 0,
            pages: 0,
            done: false,
        }
    }

    fn resource(&self) -> &'static str {
        match self.kind {
            RecordKind::Message => "messages",
            _ => "calls",
        }
    }
}

struct OpenPhonePages {
    transport: Arc<dyn HttpTransport>,
    config: Arc<OpenPhoneConfig>,
    base: Url,
    api_key: String,
    phone_number_id: String,
    since: Option<DateTime<Utc>>,
    observed_at: DateTime<Utc>,
    streams: Vec<Stream>,
    current: usize,
    failures: Vec<PageFailure>,
}

impl OpenPhonePages {
    async fn fetch(
        &self,
        resource: &str,
        offset: u32,
    ) -> std::result::Result<Vec<Value>, TransportError> {
        let mut url = self.base.clone();
        let path = format!("{}/{resource}", url.path().trim_end_matches('/'));
        url.set_path(&path);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("phoneNumberId", &self.phone_number_id)
                .append_pair("limit", &self.config.page_size.to_string())
                .append_pair("offset", &offset.to_string());
            if let Some(since) = self.since {
                query.append_pair(
                    "createdAfter",
                    &since.to_rfc3339_opts(SecondsFormat::Secs, true),
                );
            }
        }

        let request = HttpRequest::get(url.to_string())
            .bearer(&self.api_key)
            .timeout(self.config.request_timeout);
        let response = self.transport.send(request).await?.error_for_status()?;
        Ok(response.json::<ListResponse>()?.data)
    }

    fn map(&self, kind: RecordKind, items: Vec<Value>) -> Vec<RemoteRecord> {
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(object) => Some(object),
                other => {
                    warn!(kind = %kind, item = %other, "Ignoring non-object list item");
                    None
                }
            })
            .filter_map(|object: Map<String, Value>| match kind {
                RecordKind::Message => message_record(&object, self.observed_at),
                _ => call_record(&object, self.observed_at),
            })
            .collect()
    }
}

#[async_trait]
impl RecordPages for OpenPhonePages {
    async fn next_page(&mut self) -> Option<Vec<RemoteRecord>> {
        let page_size = self.config.page_size;
        let max_pages = self.config.max_pages;

        loop {
            let stream = self.streams.get(self.current)?;
            if stream.done || stream.pages >= max_pages {
                if !stream.done {
                    warn!(kind = %stream.kind, pages = stream.pages, "Page limit reached");
                }
                self.current += 1;
                continue;
            }

            let (kind, resource, offset) = (stream.kind, stream.resource(), stream.offset);
            let fetched = self.fetch(resource, offset).await;

            let stream = &mut self.streams[self.current];
            stream.pages += 1;
            return Some(match fetched {
                Ok(items) => {
                    let count = items.len();
                    stream.offset += page_size;
                    stream.done = count < page_size as usize;
                    debug!(kind = %kind, offset, count, "Fetched OpenPhone page");
                    self.map(kind, items)
                }
                Err(e) => {
                    stream.done = true;
                    let reason = e.to_string();
                    warn!(kind = %kind, offset, reason = %reason, "OpenPhone page failed");
                    self.failures.push(PageFailure {
                        kind,
                        page_ref: format!("{resource}@{offset}"),
                        reason,
                    });
                    Vec::new()
                }
            });
        }
    }

    fn failures(&self) -> &[PageFailure] {
        &self.failures
    }
}
