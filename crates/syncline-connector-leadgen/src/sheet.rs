//! Spreadsheet CSV export parsing.
//!
//! The first row holds the column headers. Headers are trimmed and lowercased,
//! then mapped to lead fields through [`lead_field_for`]. Unknown columns are
//! kept only in the record's `sync_metadata.original_data`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use syncline_sync::record::split_list;
use syncline_sync::{RecordKind, RemoteRecord};
use tracing::warn;

/// Value written to a sheet lead's `source`.
pub const SHEET_SOURCE: &str = "google_sheets";

const UTF8_BOM: char = '\u{feff}';

/// Header aliases, already lowercased.
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("name", "full_name"),
    ("full_name", "full_name"),
    ("fullname", "full_name"),
    ("contact_name", "full_name"),
    ("email", "email"),
    ("email_address", "email"),
    ("phone", "phone"),
    ("phone_number", "phone"),
    ("telephone", "phone"),
    ("firm", "firm"),
    ("company", "firm"),
    ("business", "firm"),
    ("law_firm", "firm"),
    ("website", "website"),
    ("url", "website"),
    ("web_site", "website"),
    ("city", "city"),
    ("state", "state"),
    ("zip", "zip_code"),
    ("zip_code", "zip_code"),
    ("postal_code", "zip_code"),
    ("message", "message"),
    ("notes", "message"),
    ("comments", "message"),
    ("practice_areas", "practice_areas"),
    ("practice_area", "practice_areas"),
    ("services", "practice_areas"),
    ("specialties", "practice_areas"),
];

/// Lead field a column header maps to, if any.
#[must_use]
pub fn lead_field_for(header: &str) -> Option<&'static str> {
    let header = header.trim().to_lowercase();
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == header)
        .map(|(_, field)| *field)
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn id_after<'a>(reference: &'a str, marker: &str) -> Option<&'a str> {
    reference.match_indices(marker).find_map(|(at, _)| {
        let rest = &reference[at + marker.len()..];
        let end = rest.find(|c: char| !is_id_char(c)).unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    })
}

/// Spreadsheet id from a sharing URL (`.../spreadsheets/d/{id}/edit`), a
/// short `/d/{id}` link, or a bare id.
#[must_use]
pub fn extract_spreadsheet_id(reference: &str) -> Option<String> {
    let reference = reference.trim();
    id_after(reference, "/spreadsheets/d/")
        .or_else(|| id_after(reference, "/d/"))
        .or_else(|| {
            (!reference.is_empty() && reference.chars().all(is_id_char)).then_some(reference)
        })
        .map(str::to_string)
}

/// Parse a CSV export into lead records, one per non-blank row.
///
/// Records are keyed `row-{n}` with `n` the sheet row number (the header is
/// row 1). Rows that cannot be read are logged and skipped. Fails only when
/// the body has no usable header row or is an HTML page, which is what the
/// export endpoint serves for sheets that are not shared publicly.
pub fn parse_sheet_csv(body: &str, observed_at: DateTime<Utc>) -> Result<Vec<RemoteRecord>, String> {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body);
    let head = body.trim_start();
    if head.is_empty() {
        return Ok(Vec::new());
    }
    if head.starts_with('<') {
        return Err("export returned HTML, the sheet is probably not shared publicly".to_string());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| format!("failed to read CSV headers: {e}"))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err("CSV header row is empty".to_string());
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(row = idx + 2, error = %e, "Skipping unreadable CSV row");
                continue;
            }
        };
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let line = row
            .position()
            .map_or(idx as u64 + 2, |position| position.line());
        records.push(RemoteRecord::new(
            format!("row-{line}"),
            RecordKind::Lead,
            row_payload(&headers, &row),
            observed_at,
        ));
    }
    Ok(records)
}

fn row_payload(headers: &[String], row: &csv::StringRecord) -> Map<String, Value> {
    let mut payload = Map::new();
    let mut original = Map::new();

    for (header, cell) in headers.iter().zip(row.iter()) {
        let value = cell.trim();
        if header.is_empty() {
            continue;
        }
        original.insert(header.clone(), Value::from(value));
        if value.is_empty() {
            continue;
        }
        match lead_field_for(header) {
            Some("practice_areas") => {
                payload.insert("practice_areas".into(), Value::from(split_list(value)));
            }
            Some(field) => {
                payload.insert(field.into(), Value::from(value));
            }
            None => {}
        }
    }

    payload.insert("source".into(), Value::from(SHEET_SOURCE));
    let mut meta = Map::new();
    meta.insert("source".into(), Value::from(SHEET_SOURCE));
    meta.insert("original_data".into(), Value::Object(original));
    payload.insert("sync_metadata".into(), Value::Object(meta));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_spreadsheet_id() {
        assert_eq!(
            extract_spreadsheet_id(
                "https://docs.google.com/spreadsheets/d/1AbC-d_9/edit#gid=0"
            )
            .as_deref(),
            Some("1AbC-d_9")
        );
        assert_eq!(
            extract_spreadsheet_id("https://drive.example/d/XYZ123/view").as_deref(),
            Some("XYZ123")
        );
        assert_eq!(extract_spreadsheet_id(" 1AbCdEf ").as_deref(), Some("1AbCdEf"));
        assert_eq!(extract_spreadsheet_id("not a sheet"), None);
        assert_eq!(extract_spreadsheet_id(""), None);
    }

    #[test]
    fn test_column_aliases() {
        assert_eq!(lead_field_for("Contact_Name"), Some("full_name"));
        assert_eq!(lead_field_for(" email_address "), Some("email"));
        assert_eq!(lead_field_for("law_firm"), Some("firm"));
        assert_eq!(lead_field_for("postal_code"), Some("zip_code"));
        assert_eq!(lead_field_for("specialties"), Some("practice_areas"));
        assert_eq!(lead_field_for("favourite_colour"), None);
    }

    #[test]
    fn test_parse_maps_aliases_and_skips_blank_rows() {
        let csv = "\u{feff}Name, Email ,Company,Services,Notes\n\
                   Jane Doe,jane@firm.com,Doe LLP,\"Tax, Estate\",call back\n\
                   ,,,,\n\
                   \n\
                   Bob,bob@law.com,,,\n";
        let records = parse_sheet_csv(csv, Utc::now()).unwrap();
        assert_eq!(records.len(), 2);

        let jane = &records[0];
        assert_eq!(jane.external_id, "row-2");
        assert_eq!(jane.kind, RecordKind::Lead);
        assert_eq!(jane.str_field("full_name").as_deref(), Some("Jane Doe"));
        assert_eq!(jane.str_field("email").as_deref(), Some("jane@firm.com"));
        assert_eq!(jane.str_field("firm").as_deref(), Some("Doe LLP"));
        assert_eq!(jane.str_field("message").as_deref(), Some("call back"));
        assert_eq!(jane.string_list("practice_areas"), vec!["Tax", "Estate"]);
        assert_eq!(jane.str_field("source").as_deref(), Some(SHEET_SOURCE));
        assert_eq!(
            jane.object_field("sync_metadata").unwrap()["original_data"]["company"],
            "Doe LLP"
        );

        assert_eq!(records[1].external_id, "row-5");
        assert_eq!(records[1].str_field("firm"), None);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let records = parse_sheet_csv("email,phone,city\na@x.com\n", Utc::now()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].str_field("email").as_deref(), Some("a@x.com"));
        assert_eq!(records[0].str_field("city"), None);
    }

    #[test]
    fn test_empty_and_html_bodies() {
        assert!(parse_sheet_csv("", Utc::now()).unwrap().is_empty());
        assert!(parse_sheet_csv("\u{feff}\n", Utc::now()).unwrap().is_empty());
        assert!(parse_sheet_csv("<!DOCTYPE html><html></html>", Utc::now()).is_err());
        assert!(parse_sheet_csv("email\n", Utc::now()).unwrap().is_empty());
    }
}
