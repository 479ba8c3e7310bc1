//! Notification recipients of a copy job.
//!
//! Sending is done by the execution engine. This module only decides who gets
//! the mail.

use serde::Deserialize;

use crate::models::ActingUser;

/// Settings used when a submitter leaves the e-mail list empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationSettings {
    /// Domain appended to the user name when the user has no registered address.
    pub default_email_domain: Option<String>,
}

/// Returns the recipients of a job's completion mail.
///
/// An explicit list is kept as is. Otherwise the submitter's registered
/// address is used, then `<username>@<default_email_domain>`.
pub fn notification_recipients(
    requested: &[String],
    submitter: &ActingUser,
    settings: &NotificationSettings,
) -> Vec<String> {
    if !requested.is_empty() {
        return requested.to_vec();
    }
    if let Some(email) = submitter.email.as_ref().filter(|e| !e.trim().is_empty()) {
        return vec![email.trim().to_string()];
    }
    match settings
        .default_email_domain
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        Some(domain) => vec![format!("{}@{}", submitter.username, domain)],
        None => Vec::new(),
    }
}
