//! OpenPhone connector for syncline
//!
//! Pulls call and message logs for a linked phone number and normalizes
//! webhook deliveries into records the sync engine can ingest. The tenant's
//! API key is stored as its credential and sent as a bearer token.

mod config;
mod fetcher;
mod mapping;
mod webhook;

pub use config::{OpenPhoneConfig, DEFAULT_API_BASE};
pub use fetcher::OpenPhoneFetcher;
pub use mapping::{call_record, message_record, object_id};
pub use webhook::{normalize_webhook, WebhookEvent};
