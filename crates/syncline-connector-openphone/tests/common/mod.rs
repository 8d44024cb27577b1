//! Common test utilities for OpenPhone connector tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use syncline_connector_openphone::{OpenPhoneConfig, OpenPhoneFetcher};
use syncline_core::{ManualClock, Provider, TenantId};
use syncline_sync::{ProviderConnection, RecordPages, RemoteRecord, ReqwestTransport};
use wiremock::MockServer;

pub const PHONE_NUMBER_ID: &str = "PN123";
pub const API_KEY: &str = "op-key-1";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 15, 0, 0).unwrap()
}

pub fn config(server: &MockServer, page_size: u32) -> OpenPhoneConfig {
    OpenPhoneConfig {
        page_size,
        ..OpenPhoneConfig::default().with_api_base(format!("{}/v1", server.uri()))
    }
}

pub fn fetcher(config: OpenPhoneConfig) -> OpenPhoneFetcher {
    OpenPhoneFetcher::new(Arc::new(ReqwestTransport::default()), config)
        .with_clock(Arc::new(ManualClock::new(now())))
}

pub fn connection() -> ProviderConnection {
    ProviderConnection::new(TenantId::new(), Provider::Openphone, PHONE_NUMBER_ID, now())
}

pub fn call(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "phoneNumberId": PHONE_NUMBER_ID,
        "direction": "incoming",
        "status": status,
        "from": "+15550001",
        "to": ["+15550002"],
        "duration": 42,
        "createdAt": "2024-06-09T10:00:00Z"
    })
}

pub fn message(id: &str, text: &str) -> Value {
    json!({
        "id": id,
        "phoneNumberId": PHONE_NUMBER_ID,
        "direction": "outgoing",
        "status": "delivered",
        "from": "+15550002",
        "to": ["+15550001"],
        "text": text,
        "createdAt": "2024-06-09T11:00:00Z"
    })
}

pub fn list(items: Vec<Value>) -> Value {
    let total = items.len();
    json!({"data": items, "totalItems": total})
}

pub async fn drain(pages: &mut Box<dyn RecordPages>) -> Vec<RemoteRecord> {
    let mut records = Vec::new();
    while let Some(page) = pages.next_page().await {
        records.extend(page);
    }
    records
}
