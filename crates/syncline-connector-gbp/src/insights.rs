//! `reportInsights` request and response mapping.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use syncline_sync::{RecordKind, RemoteRecord};

use crate::location::LocationRef;

/// Inclusive date range of a daily report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
}

impl ReportWindow {
    /// The `days` days ending today. The start saturates at the earliest
    /// representable date.
    #[must_use]
    pub fn trailing(today: NaiveDate, days: u32) -> Self {
        Self {
            start: today
                .checked_sub_signed(Duration::days(i64::from(days)))
                .unwrap_or(NaiveDate::MIN),
            end: today,
            days,
        }
    }

    #[must_use]
    pub fn period(&self) -> String {
        format!("last_{}_days", self.days)
    }
}

fn date_json(date: NaiveDate) -> Value {
    json!({"year": date.year(), "month": date.month(), "day": date.day()})
}

/// Body for one metric over the window, aggregated daily.
#[must_use]
pub fn report_request(location: &LocationRef, metric: &str, window: &ReportWindow) -> Value {
    json!({
        "locationNames": [location.path()],
        "basicRequest": {
            "metricRequests": [{
                "metric": metric,
                "options": ["AGGREGATED_DAILY"]
            }],
            "timeRange": {
                "startDate": date_json(window.start),
                "endDate": date_json(window.end)
            }
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportResponse {
    #[serde(default)]
    location_metrics: Vec<LocationMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationMetrics {
    #[serde(default)]
    metric_values: Vec<MetricValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetricValue {
    #[serde(default)]
    dimensional_values: Vec<DimensionalValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DimensionalValue {
    value: Option<Value>,
    time_dimension: Option<TimeDimension>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeDimension {
    time_range: Option<TimeRange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeRange {
    start_time: Option<DateTime<Utc>>,
}

/// int64 values arrive as JSON strings.
fn count(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl ReportResponse {
    /// Fold the first location's first metric series into a `metric` record.
    pub(crate) fn into_record(
        self,
        metric: &str,
        window: &ReportWindow,
        observed_at: DateTime<Utc>,
    ) -> RemoteRecord {
        let values = self
            .location_metrics
            .into_iter()
            .next()
            .and_then(|l| l.metric_values.into_iter().next())
            .map(|m| m.dimensional_values)
            .unwrap_or_default();

        let mut total = 0i64;
        let mut daily = Vec::new();
        for point in &values {
            let value = count(point.value.as_ref());
            total += value;
            let date = point
                .time_dimension
                .as_ref()
                .and_then(|t| t.time_range.as_ref())
                .and_then(|r| r.start_time);
            if let Some(date) = date {
                daily.push(json!({
                    "date": date.date_naive().format("%Y-%m-%d").to_string(),
                    "value": value
                }));
            }
        }

        let mut payload = Map::new();
        payload.insert("metric".into(), Value::from(metric));
        payload.insert("total".into(), Value::from(total));
        payload.insert("daily".into(), Value::Array(daily));
        payload.insert(
            "window_start".into(),
            Value::from(window.start.format("%Y-%m-%d").to_string()),
        );
        payload.insert(
            "window_end".into(),
            Value::from(window.end.format("%Y-%m-%d").to_string()),
        );
        payload.insert("period".into(), Value::from(window.period()));

        RemoteRecord::new(metric, RecordKind::Metric, payload, observed_at)
    }
}
