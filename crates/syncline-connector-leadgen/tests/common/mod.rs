//! Common test utilities for leadgen connector tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use syncline_connector_leadgen::{CampaignFetcher, LeadgenConfig, SheetFetcher};
use syncline_core::{ManualClock, Provider, TenantId};
use syncline_sync::{ProviderConnection, RecordPages, RemoteRecord, ReqwestTransport};
use wiremock::MockServer;

pub const SHEET_ID: &str = "1SheetAbc_9";
pub const CAMPAIGN_ID: &str = "camp-42";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()
}

pub fn config(server: &MockServer, page_size: usize) -> LeadgenConfig {
    LeadgenConfig {
        page_size,
        ..LeadgenConfig::default().with_base_urls(server.uri(), server.uri())
    }
}

pub fn sheet_fetcher(config: LeadgenConfig) -> SheetFetcher {
    SheetFetcher::new(Arc::new(ReqwestTransport::default()), config)
        .with_clock(Arc::new(ManualClock::new(now())))
}

pub fn campaign_fetcher(config: LeadgenConfig) -> CampaignFetcher {
    CampaignFetcher::new(Arc::new(ReqwestTransport::default()), config)
        .with_clock(Arc::new(ManualClock::new(now())))
}

pub fn sheet_connection(tenant: TenantId) -> ProviderConnection {
    ProviderConnection::new(
        tenant,
        Provider::LeadgenSheet,
        format!("https://docs.google.com/spreadsheets/d/{SHEET_ID}/edit#gid=0"),
        now(),
    )
}

pub fn campaign_connection(tenant: TenantId) -> ProviderConnection {
    ProviderConnection::new(tenant, Provider::LeadgenCampaign, CAMPAIGN_ID, now())
}

pub fn export_path() -> String {
    format!("/spreadsheets/d/{SHEET_ID}/export")
}

pub fn campaign_lead(id: &str, email: &str, phone: &str) -> Value {
    json!({
        "id": id,
        "legal_entity": {"name": format!("{id} Legal")},
        "emails": [{"type": "personal", "value": email}],
        "phones": [{"type": "main", "value": phone}],
        "address": {"city": "Denver", "region": "CO", "postal": "80202"},
        "vertical": "local_services",
        "tags": ["Estate"],
        "lead_score": 70
    })
}

pub async fn drain(pages: &mut Box<dyn RecordPages>) -> Vec<Vec<RemoteRecord>> {
    let mut out = Vec::new();
    while let Some(page) = pages.next_page().await {
        out.push(page);
    }
    out
}
