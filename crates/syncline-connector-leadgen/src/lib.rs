//! Lead import connectors for syncline
//!
//! Two public sources produce `lead` records:
//!
//! - [`SheetFetcher`] reads a shared spreadsheet through its CSV export and
//!   maps common column names (`name`, `email_address`, `company`, ...) onto
//!   lead fields.
//! - [`CampaignFetcher`] pulls the leads a leadgen-service campaign found and
//!   picks each lead's preferred email and phone.
//!
//! Neither needs a stored credential. Leads merge by normalized email, so a
//! contact imported from both sources ends up as one entity.

mod campaign;
mod config;
mod fetcher;
mod sheet;

pub use campaign::{campaign_lead_record, vertical_label, CAMPAIGN_SOURCE};
pub use config::{LeadgenConfig, DEFAULT_EXPORT_BASE, DEFAULT_SERVICE_BASE};
pub use fetcher::{CampaignFetcher, SheetFetcher};
pub use sheet::{extract_spreadsheet_id, lead_field_for, parse_sheet_csv, SHEET_SOURCE};
