//! Common validation utilities for copy request form fields.

use std::collections::HashSet;
use validator::{ValidateEmail, ValidationError};

use crate::address::HostAddress;

/// Splits a comma-separated field into trimmed, non-empty, de-duplicated
/// entries. First occurrence wins, so the order of parallel lists is kept.
pub fn split_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

/// Validates a single `host:port` address.
pub fn validate_host_address(value: &str) -> Result<HostAddress, ValidationError> {
    value.parse::<HostAddress>().map_err(|e| {
        let mut err = ValidationError::new("host_format");
        err.message = Some(e.to_string().into());
        err
    })
}

/// Validates a list of `host:port` addresses; at least one is required.
pub fn validate_host_list(values: &[String]) -> Result<Vec<HostAddress>, ValidationError> {
    if values.is_empty() {
        let mut err = ValidationError::new("host_required");
        err.message = Some("At least one target host is required".into());
        return Err(err);
    }

    let mut hosts: Vec<HostAddress> = Vec::with_capacity(values.len());
    for value in values {
        let host = validate_host_address(value).map_err(|mut e| {
            e.message = Some(
                "Target hosts should be formatted like host:port or host1:port1,host2:port2".into(),
            );
            e
        })?;
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    Ok(hosts)
}

/// Validates that every entry of an e-mail list is a valid address.
pub fn validate_email_list(values: &[String]) -> Result<(), ValidationError> {
    if values.iter().all(|v| v.validate_email()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("email_list");
        err.message = Some(
            "Email list should contain one or more comma separated valid email addresses".into(),
        );
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::internet::en::SafeEmail;
    use fake::Fake;

    #[test]
    fn test_split_list_trims_and_drops_empty() {
        assert_eq!(split_list(" db1, ,db2,, db3 "), vec!["db1", "db2", "db3"]);
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_split_list_dedupes_keeping_order() {
        assert_eq!(split_list("db5,db1,db5"), vec!["db5", "db1"]);
    }

    #[test]
    fn test_validate_host_address() {
        assert!(validate_host_address("host1:3306").is_ok());
        let err = validate_host_address("host1").unwrap_err();
        assert_eq!(err.code, "host_format");
    }

    #[test]
    fn test_validate_host_list() {
        let hosts = validate_host_list(&split_list("host4:3306,host3:3306,HOST4:3306")).unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].to_string(), "host4:3306");

        assert!(validate_host_list(&[]).is_err());
        assert!(validate_host_list(&split_list("host4:3306,nope")).is_err());
    }

    #[test]
    fn test_validate_email_list() {
        let emails: Vec<String> = (0..3).map(|_| SafeEmail().fake()).collect();
        assert!(validate_email_list(&emails).is_ok());
        assert!(validate_email_list(&[]).is_ok());

        let err = validate_email_list(&["someone@example.org".into(), "not-an-email".into()])
            .unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Email list should contain one or more comma separated valid email addresses"
        );
    }
}
