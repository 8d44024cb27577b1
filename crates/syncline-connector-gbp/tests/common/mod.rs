//! Common test utilities for GBP connector tests.
//!
//! Provides mock Business Profile responses and helpers to drive a fetch
//! against a wiremock server.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use syncline_connector_gbp::{GbpConfig, GbpFetcher};
use syncline_core::{ManualClock, Provider, TenantId};
use syncline_sync::{ProviderConnection, RecordPages, RemoteRecord, ReqwestTransport};
use wiremock::MockServer;

pub const LOCATION: &str = "accounts/111/locations/222";
pub const LOCATION_PATH: &str = "/v4/accounts/111/locations/222";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
}

pub fn config(server: &MockServer) -> GbpConfig {
    GbpConfig::new("client-1", "secret-1").with_base_urls(
        format!("{}/v4", server.uri()),
        format!("{}/token", server.uri()),
    )
}

pub fn fetcher(config: GbpConfig) -> GbpFetcher {
    GbpFetcher::new(Arc::new(ReqwestTransport::default()), config)
        .with_clock(Arc::new(ManualClock::new(now())))
}

pub fn connection(location: &str) -> ProviderConnection {
    ProviderConnection::new(TenantId::new(), Provider::GoogleGbp, location, now())
}

/// A `reportInsights` response with one daily value per entry.
pub fn report_response(metric: &str, values: &[i64]) -> Value {
    let points: Vec<Value> = values
        .iter()
        .enumerate()
        .map(|(day, value)| {
            json!({
                "value": value.to_string(),
                "timeDimension": {
                    "timeRange": {"startTime": format!("2024-06-{:02}T00:00:00Z", day + 1)}
                }
            })
        })
        .collect();
    json!({
        "locationMetrics": [{
            "locationName": LOCATION,
            "metricValues": [{"metric": metric, "dimensionalValues": points}]
        }]
    })
}

pub fn review(id: &str, rating: &str, created: &str) -> Value {
    json!({
        "reviewId": id,
        "name": format!("{LOCATION}/reviews/{id}"),
        "starRating": rating,
        "createTime": created,
        "reviewer": {"displayName": "Reviewer"}
    })
}

pub fn reviews_page(reviews: Vec<Value>, next: Option<&str>) -> Value {
    let total = reviews.len();
    let mut page = json!({"reviews": reviews, "totalReviewCount": total});
    if let Some(token) = next {
        page["nextPageToken"] = json!(token);
    }
    page
}

pub async fn drain(pages: &mut Box<dyn RecordPages>) -> Vec<RemoteRecord> {
    let mut records = Vec::new();
    while let Some(page) = pages.next_page().await {
        records.extend(page);
    }
    records
}
