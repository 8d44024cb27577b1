//! Review pages and star ratings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use syncline_sync::{RecordKind, RemoteRecord};
use tracing::warn;

/// One page of `GET .../reviews`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewsPage {
    #[serde(default)]
    pub reviews: Vec<Review>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Review {
    review_id: Option<String>,
    /// `accounts/../locations/../reviews/{id}`.
    name: Option<String>,
    star_rating: Option<Value>,
    create_time: Option<String>,
    update_time: Option<String>,
    comment: Option<String>,
    reviewer: Option<Reviewer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reviewer {
    display_name: Option<String>,
}

/// Parse a rating given as `ONE`..`FIVE` or a number.
#[must_use]
pub fn parse_star_rating(value: &Value) -> Option<u8> {
    let rating = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
            "ONE" => Some(1),
            "TWO" => Some(2),
            "THREE" => Some(3),
            "FOUR" => Some(4),
            "FIVE" => Some(5),
            other => other.parse().ok(),
        },
        _ => None,
    }?;
    (1..=5).contains(&rating).then_some(rating)
}

impl Review {
    fn id(&self) -> Option<String> {
        self.review_id
            .clone()
            .or_else(|| {
                self.name
                    .as_deref()
                    .and_then(|n| n.rsplit('/').next())
                    .map(str::to_string)
            })
            .filter(|id| !id.trim().is_empty())
    }

    /// `None` when the review carries no id. An unreadable rating is left out
    /// so reconciliation reports it.
    pub(crate) fn into_record(self, observed_at: DateTime<Utc>) -> Option<RemoteRecord> {
        let Some(id) = self.id() else {
            warn!("Dropping review without an id");
            return None;
        };

        let mut payload = Map::new();
        payload.insert("review_id".into(), Value::from(id.clone()));
        if let Some(rating) = self.star_rating.as_ref().and_then(parse_star_rating) {
            payload.insert("star_rating".into(), Value::from(rating));
        }
        if let Some(created) = self.create_time {
            payload.insert("create_time".into(), Value::from(created));
        }
        if let Some(updated) = self.update_time {
            payload.insert("update_time".into(), Value::from(updated));
        }
        if let Some(comment) = self.comment {
            payload.insert("comment".into(), Value::from(comment));
        }
        if let Some(name) = self.reviewer.and_then(|r| r.display_name) {
            payload.insert("reviewer".into(), Value::from(name));
        }

        Some(RemoteRecord::new(id, RecordKind::Review, payload, observed_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_star_rating_forms() {
        assert_eq!(parse_star_rating(&json!("FIVE")), Some(5));
        assert_eq!(parse_star_rating(&json!("three")), Some(3));
        assert_eq!(parse_star_rating(&json!(4)), Some(4));
        assert_eq!(parse_star_rating(&json!("2")), Some(2));
        assert_eq!(parse_star_rating(&json!("STAR_RATING_UNSPECIFIED")), None);
        assert_eq!(parse_star_rating(&json!(0)), None);
        assert_eq!(parse_star_rating(&json!(6)), None);
        assert_eq!(parse_star_rating(&json!(null)), None);
    }

    #[test]
    fn test_review_maps_to_record() {
        let review: Review = serde_json::from_value(json!({
            "name": "accounts/1/locations/2/reviews/abc",
            "starRating": "FOUR",
            "createTime": "2024-05-20T10:00:00Z",
            "comment": "Great help",
            "reviewer": {"displayName": "Sam"}
        }))
        .unwrap();

        let record = review.into_record(Utc::now()).unwrap();
        assert_eq!(record.external_id, "abc");
        assert_eq!(record.i64_field("star_rating"), Some(4));
        assert_eq!(record.str_field("reviewer").as_deref(), Some("Sam"));
        assert!(record.datetime_field("create_time").is_some());
    }

    #[test]
    fn test_review_without_id_dropped() {
        let review: Review = serde_json::from_value(json!({"starRating": "FIVE"})).unwrap();
        assert!(review.into_record(Utc::now()).is_none());
    }

    #[test]
    fn test_unreadable_rating_left_out() {
        let review: Review =
            serde_json::from_value(json!({"reviewId": "r9", "starRating": "ZERO"})).unwrap();
        let record = review.into_record(Utc::now()).unwrap();
        assert!(!record.payload.contains_key("star_rating"));
    }
}
