//! Durable local entities and their natural keys.
//!
//! Entities reference each other only by ID. The store indexes them by
//! `(tenant, NaturalKey)`; reconciliation relies on that index to keep
//! exactly one entity per key.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use syncline_core::{EntityId, Provider, TenantAware, TenantId};

use crate::merge::{merge_field, merge_metadata, merge_value, MergePolicy};
use crate::record::{RecordKind, RemoteRecord};
use crate::validation::{lead_email, normalize_email};

/// Name given to leads that arrive without one.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Lead,
    CallLog,
    MessageLog,
    Metrics,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Lead => "lead",
            EntityKind::CallLog => "call_log",
            EntityKind::MessageLog => "message_log",
            EntityKind::Metrics => "metrics",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead" => Ok(EntityKind::Lead),
            "call_log" => Ok(EntityKind::CallLog),
            "message_log" => Ok(EntityKind::MessageLog),
            "metrics" => Ok(EntityKind::Metrics),
            _ => Err(format!("Unknown entity kind: {s}")),
        }
    }
}

/// Business identity of an entity within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub kind: EntityKind,
    pub value: String,
}

impl NaturalKey {
    /// Lead key: the normalized email.
    #[must_use]
    pub fn lead(email: &str) -> Self {
        Self {
            kind: EntityKind::Lead,
            value: normalize_email(email),
        }
    }

    #[must_use]
    pub fn call(external_id: &str) -> Self {
        Self {
            kind: EntityKind::CallLog,
            value: external_id.trim().to_string(),
        }
    }

    #[must_use]
    pub fn message(external_id: &str) -> Self {
        Self {
            kind: EntityKind::MessageLog,
            value: external_id.trim().to_string(),
        }
    }

    /// One metrics blob per provider per tenant.
    #[must_use]
    pub fn metrics(provider: Provider) -> Self {
        Self {
            kind: EntityKind::Metrics,
            value: provider.as_str().to_string(),
        }
    }

    /// Derive the key for a record, or say why it has none.
    pub fn for_record(provider: Provider, record: &RemoteRecord) -> Result<Self, String> {
        match record.kind {
            RecordKind::Lead => {
                let email = lead_email(record.str_field("email"))?;
                Ok(Self::lead(&email))
            }
            RecordKind::Call => non_empty_id(record).map(Self::call),
            RecordKind::Message => non_empty_id(record).map(Self::message),
            RecordKind::Metric | RecordKind::Review => Ok(Self::metrics(provider)),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

fn non_empty_id(record: &RemoteRecord) -> Result<&str, String> {
    let id = record.external_id.trim();
    if id.is_empty() {
        Err(format!("{} record has no external id", record.kind))
    } else {
        Ok(id)
    }
}

/// A prospective client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: EntityId,
    pub tenant_id: TenantId,
    /// Normalized (trimmed, lowercased).
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub firm: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub message: Option<String>,
    pub practice_areas: Vec<String>,
    pub source: String,
    pub status: String,
    pub sync_metadata: Map<String, Value>,
    pub first_seen_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Lead {
    pub fn from_record(
        tenant_id: TenantId,
        provider: Provider,
        record: &RemoteRecord,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        let email = lead_email(record.str_field("email"))?;

        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            email,
            full_name: record
                .str_field("full_name")
                .unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            phone: record.str_field("phone"),
            firm: record.str_field("firm"),
            website: record.str_field("website"),
            city: record.str_field("city"),
            state: record.str_field("state"),
            zip_code: record.str_field("zip_code"),
            message: record.str_field("message"),
            practice_areas: record.string_list("practice_areas"),
            source: record
                .str_field("source")
                .unwrap_or_else(|| provider.as_str().to_string()),
            status: "new".to_string(),
            sync_metadata: sync_metadata(provider, record),
            first_seen_at: now,
            last_synced_at: now,
        })
    }

    /// Fill-empty merge for contact fields, refresh for sync bookkeeping.
    pub fn merge_record(
        &mut self,
        provider: Provider,
        record: &RemoteRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, String> {
        let incoming = Lead::from_record(self.tenant_id, provider, record, now)?;
        let mut changed = false;

        if self.full_name == UNKNOWN_NAME && incoming.full_name != UNKNOWN_NAME {
            self.full_name = incoming.full_name;
            changed = true;
        }

        changed |= merge_field(&mut self.phone, incoming.phone, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.firm, incoming.firm, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.website, incoming.website, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.city, incoming.city, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.state, incoming.state, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.zip_code, incoming.zip_code, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.message, incoming.message, MergePolicy::FillEmpty);
        changed |= merge_value(
            &mut self.practice_areas,
            Some(incoming.practice_areas),
            MergePolicy::FillEmpty,
        );

        changed |= merge_metadata(&mut self.sync_metadata, &incoming.sync_metadata);
        self.last_synced_at = now;

        Ok(changed)
    }
}

/// One phone call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub provider: Provider,
    pub external_id: String,
    pub direction: Option<String>,
    pub status: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub duration_secs: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    pub metadata: Map<String, Value>,
    pub first_seen_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl CallLog {
    pub fn from_record(
        tenant_id: TenantId,
        provider: Provider,
        record: &RemoteRecord,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        let external_id = non_empty_id(record)?.to_string();
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            provider,
            external_id,
            direction: record.str_field("direction"),
            status: record.str_field("status"),
            from_number: record.str_field("from"),
            to_number: record.str_field("to"),
            duration_secs: record.i64_field("duration"),
            started_at: record.datetime_field("started_at"),
            ended_at: record.datetime_field("ended_at"),
            recording_url: record.str_field("recording_url"),
            transcript: record.str_field("transcript"),
            metadata: record.object_field("metadata").cloned().unwrap_or_default(),
            first_seen_at: now,
            last_synced_at: now,
        })
    }

    /// Status, duration, end time, recording and transcript follow the
    /// provider; the call's parties and start never change once known.
    pub fn merge_record(&mut self, record: &RemoteRecord, now: DateTime<Utc>) -> Result<bool, String> {
        let incoming = CallLog::from_record(self.tenant_id, self.provider, record, now)?;
        let mut changed = false;

        changed |= merge_field(&mut self.status, incoming.status, MergePolicy::AlwaysRefresh);
        changed |= merge_field(
            &mut self.duration_secs,
            incoming.duration_secs,
            MergePolicy::AlwaysRefresh,
        );
        changed |= merge_field(&mut self.ended_at, incoming.ended_at, MergePolicy::AlwaysRefresh);
        changed |= merge_field(
            &mut self.recording_url,
            incoming.recording_url,
            MergePolicy::AlwaysRefresh,
        );
        changed |= merge_field(
            &mut self.transcript,
            incoming.transcript,
            MergePolicy::AlwaysRefresh,
        );

        changed |= merge_field(&mut self.direction, incoming.direction, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.from_number, incoming.from_number, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.to_number, incoming.to_number, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.started_at, incoming.started_at, MergePolicy::FillEmpty);

        changed |= merge_metadata(&mut self.metadata, &incoming.metadata);
        self.last_synced_at = now;

        Ok(changed)
    }
}

/// One SMS/MMS message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageLog {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub provider: Provider,
    pub external_id: String,
    pub direction: Option<String>,
    pub status: Option<String>,
    pub from_number: Option<String>,
    pub to_number: Option<String>,
    pub text: Option<String>,
    pub attachments: Vec<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub metadata: Map<String, Value>,
    pub first_seen_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl MessageLog {
    pub fn from_record(
        tenant_id: TenantId,
        provider: Provider,
        record: &RemoteRecord,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        let external_id = non_empty_id(record)?.to_string();
        Ok(Self {
            id: EntityId::new(),
            tenant_id,
            provider,
            external_id,
            direction: record.str_field("direction"),
            status: record.str_field("status"),
            from_number: record.str_field("from"),
            to_number: record.str_field("to"),
            text: record.str_field("text"),
            attachments: record.string_list("attachments"),
            sent_at: record.datetime_field("sent_at"),
            metadata: record.object_field("metadata").cloned().unwrap_or_default(),
            first_seen_at: now,
            last_synced_at: now,
        })
    }

    pub fn merge_record(&mut self, record: &RemoteRecord, now: DateTime<Utc>) -> Result<bool, String> {
        let incoming = MessageLog::from_record(self.tenant_id, self.provider, record, now)?;
        let mut changed = false;

        changed |= merge_field(&mut self.status, incoming.status, MergePolicy::AlwaysRefresh);

        changed |= merge_field(&mut self.direction, incoming.direction, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.from_number, incoming.from_number, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.to_number, incoming.to_number, MergePolicy::FillEmpty);
        changed |= merge_field(&mut self.text, incoming.text, MergePolicy::FillEmpty);
        changed |= merge_value(
            &mut self.attachments,
            Some(incoming.attachments),
            MergePolicy::FillEmpty,
        );
        changed |= merge_field(&mut self.sent_at, incoming.sent_at, MergePolicy::FillEmpty);

        changed |= merge_metadata(&mut self.metadata, &incoming.metadata);
        self.last_synced_at = now;

        Ok(changed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyValue {
    pub date: NaiveDate,
    pub value: i64,
}

/// Snapshot of one metric over a report window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub total: i64,
    pub daily: Vec<DailyValue>,
    pub window_start: Option<NaiveDate>,
    pub window_end: Option<NaiveDate>,
    pub period: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    /// 1 to 5.
    pub star_rating: u8,
    pub create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    /// Rounded to one decimal place; 0.0 without reviews.
    pub average_rating: f64,
    pub total: usize,
    pub new_in_window: usize,
}

/// Per-provider metrics attached to a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBlob {
    pub id: EntityId,
    pub tenant_id: TenantId,
    pub provider: Provider,
    pub metrics: BTreeMap<String, MetricSummary>,
    /// Keyed by provider review id, so re-fetching a review replaces it.
    pub reviews: BTreeMap<String, ReviewEntry>,
    pub review_summary: ReviewSummary,
    pub score: Option<i64>,
    pub last_updated: DateTime<Utc>,
}

impl MetricsBlob {
    #[must_use]
    pub fn new(tenant_id: TenantId, provider: Provider, now: DateTime<Utc>) -> Self {
        Self {
            id: EntityId::new(),
            tenant_id,
            provider,
            metrics: BTreeMap::new(),
            reviews: BTreeMap::new(),
            review_summary: ReviewSummary::default(),
            score: None,
            last_updated: now,
        }
    }

    /// Fold a metric or review record into the blob. Both always refresh.
    pub fn apply_record(&mut self, record: &RemoteRecord, now: DateTime<Utc>) -> Result<(), String> {
        match record.kind {
            RecordKind::Metric => {
                let name = record
                    .str_field("metric")
                    .or_else(|| Some(record.external_id.trim().to_string()).filter(|s| !s.is_empty()))
                    .ok_or_else(|| "Metric record has no metric name".to_string())?;
                let summary = MetricSummary {
                    total: record.i64_field("total").unwrap_or(0),
                    daily: parse_daily(record.payload.get("daily")),
                    window_start: date_field(record, "window_start"),
                    window_end: date_field(record, "window_end"),
                    period: record.str_field("period"),
                };
                self.metrics.insert(name, summary);
            }
            RecordKind::Review => {
                let review_id = record
                    .str_field("review_id")
                    .or_else(|| Some(record.external_id.trim().to_string()).filter(|s| !s.is_empty()))
                    .ok_or_else(|| "Review record has no review id".to_string())?;
                let rating = record
                    .i64_field("star_rating")
                    .filter(|r| (1..=5).contains(r))
                    .ok_or_else(|| format!("Review {review_id} has no valid star rating"))?;
                self.reviews.insert(
                    review_id,
                    ReviewEntry {
                        star_rating: rating as u8,
                        create_time: record.datetime_field("create_time"),
                    },
                );
            }
            other => return Err(format!("{other} records do not belong in a metrics blob")),
        }
        self.last_updated = now;
        Ok(())
    }

    /// Recompute the review summary relative to `now`.
    pub fn refresh_review_summary(&mut self, now: DateTime<Utc>, window_days: u32) {
        let total = self.reviews.len();
        let average_rating = if total == 0 {
            0.0
        } else {
            let sum: u32 = self.reviews.values().map(|r| u32::from(r.star_rating)).sum();
            (f64::from(sum) / total as f64 * 10.0).round() / 10.0
        };
        let cutoff = now
            .checked_sub_signed(Duration::days(i64::from(window_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let new_in_window = self
            .reviews
            .values()
            .filter(|r| r.create_time.is_some_and(|t| t >= cutoff))
            .count();

        self.review_summary = ReviewSummary {
            average_rating,
            total,
            new_in_window,
        };
    }

    #[must_use]
    pub fn metric_total(&self, name: &str) -> i64 {
        self.metrics.get(name).map_or(0, |m| m.total)
    }
}

fn date_field(record: &RemoteRecord, key: &str) -> Option<NaiveDate> {
    record
        .str_field(key)
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn parse_daily(value: Option<&Value>) -> Vec<DailyValue> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let date = item
                .get("date")
                .and_then(Value::as_str)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())?;
            let value = match item.get("value") {
                Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
                Some(Value::String(s)) => s.parse().unwrap_or(0),
                _ => 0,
            };
            Some(DailyValue { date, value })
        })
        .collect()
}

fn sync_metadata(provider: Provider, record: &RemoteRecord) -> Map<String, Value> {
    let mut meta = record
        .object_field("sync_metadata")
        .cloned()
        .unwrap_or_default();
    meta.insert("provider".into(), Value::from(provider.as_str()));
    meta.insert("external_id".into(), Value::from(record.external_id.clone()));
    meta.insert("observed_at".into(), Value::from(record.observed_at.to_rfc3339()));
    meta
}

/// Any durable entity the engine writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocalEntity {
    Lead(Lead),
    CallLog(CallLog),
    MessageLog(MessageLog),
    Metrics(MetricsBlob),
}

impl LocalEntity {
    /// Build a new entity of the key's kind from a record.
    pub fn from_record(
        key: &NaturalKey,
        tenant_id: TenantId,
        provider: Provider,
        record: &RemoteRecord,
        now: DateTime<Utc>,
    ) -> Result<Self, String> {
        match key.kind {
            EntityKind::Lead => Lead::from_record(tenant_id, provider, record, now).map(Self::Lead),
            EntityKind::CallLog => {
                CallLog::from_record(tenant_id, provider, record, now).map(Self::CallLog)
            }
            EntityKind::MessageLog => {
                MessageLog::from_record(tenant_id, provider, record, now).map(Self::MessageLog)
            }
            EntityKind::Metrics => {
                let mut blob = MetricsBlob::new(tenant_id, provider, now);
                blob.apply_record(record, now)?;
                Ok(Self::Metrics(blob))
            }
        }
    }

    /// Apply an incoming record to an existing entity. Returns true if any field changed.
    pub fn merge_record(
        &mut self,
        provider: Provider,
        record: &RemoteRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, String> {
        match self {
            Self::Lead(lead) => lead.merge_record(provider, record, now),
            Self::CallLog(call) => call.merge_record(record, now),
            Self::MessageLog(message) => message.merge_record(record, now),
            Self::Metrics(blob) => blob.apply_record(record, now).map(|()| true),
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Lead(e) => e.id,
            Self::CallLog(e) => e.id,
            Self::MessageLog(e) => e.id,
            Self::Metrics(e) => e.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Lead(_) => EntityKind::Lead,
            Self::CallLog(_) => EntityKind::CallLog,
            Self::MessageLog(_) => EntityKind::MessageLog,
            Self::Metrics(_) => EntityKind::Metrics,
        }
    }

    #[must_use]
    pub fn natural_key(&self) -> NaturalKey {
        match self {
            Self::Lead(e) => NaturalKey::lead(&e.email),
            Self::CallLog(e) => NaturalKey::call(&e.external_id),
            Self::MessageLog(e) => NaturalKey::message(&e.external_id),
            Self::Metrics(e) => NaturalKey::metrics(e.provider),
        }
    }

    #[must_use]
    pub fn as_lead(&self) -> Option<&Lead> {
        match self {
            Self::Lead(lead) => Some(lead),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_call(&self) -> Option<&CallLog> {
        match self {
            Self::CallLog(call) => Some(call),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_message(&self) -> Option<&MessageLog> {
        match self {
            Self::MessageLog(message) => Some(message),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_metrics(&self) -> Option<&MetricsBlob> {
        match self {
            Self::Metrics(blob) => Some(blob),
            _ => None,
        }
    }
}

impl TenantAware for LocalEntity {
    fn tenant_id(&self) -> TenantId {
        match self {
            Self::Lead(e) => e.tenant_id,
            Self::CallLog(e) => e.tenant_id,
            Self::MessageLog(e) => e.tenant_id,
            Self::Metrics(e) => e.tenant_id,
        }
    }
}
