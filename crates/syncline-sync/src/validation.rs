//! Lead email checks.
//!
//! A lead's email is its natural key, so two rows that differ only in case or
//! padding must collapse to one lead, and a row whose address cannot be a key
//! is reported as a record error instead of creating an orphan lead.

/// RFC 5321 path limit.
const MAX_EMAIL_LENGTH: usize = 254;

/// Natural-key form of an email: trimmed and lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Turn the raw `email` field of a lead record into its natural key.
///
/// The error string becomes the record's error reason in the run result.
pub fn lead_email(raw: Option<String>) -> Result<String, String> {
    let email = raw
        .map(|e| normalize_email(&e))
        .ok_or_else(|| "Lead has no email".to_string())?;
    validate_email(&email)?;
    Ok(email)
}

/// Reject addresses that cannot identify a lead.
///
/// Deliberately loose: sheets and campaign exports carry hand-typed
/// addresses, and only values that can never be delivered to are refused.
/// Expects the normalized form.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Lead email is empty".to_string());
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(format!(
            "Lead email is longer than {MAX_EMAIL_LENGTH} characters"
        ));
    }
    if email.contains(char::is_whitespace) {
        return Err(format!("Lead email {email:?} contains whitespace"));
    }

    let (local, domain) = match email.split_once('@') {
        Some((local, domain)) if !domain.contains('@') => (local, domain),
        _ => return Err(format!("Lead email {email:?} needs exactly one '@'")),
    };
    if local.is_empty() {
        return Err(format!("Lead email {email:?} has no mailbox before '@'"));
    }

    // Every label must be non-empty, there must be at least two, and none
    // may start or end with a hyphen.
    let labels: Vec<&str> = domain.split('.').collect();
    let bad_label = labels
        .iter()
        .any(|l| l.is_empty() || l.starts_with('-') || l.ends_with('-'));
    if labels.len() < 2 || bad_label {
        return Err(format!("Lead email {email:?} has an invalid domain"));
    }

    Ok(())
}
