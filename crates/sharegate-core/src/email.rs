//! Email address handling.
//!
//! Recipient matching is case-insensitive, so every comparison goes through
//! [`normalize_email`].

use crate::error::{CoreError, Result};

/// Lower-case and trim an address for comparison.
///
/// Only ASCII letters fold, matching SQLite's `NOCASE` and `LOWER()`.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Case-insensitive address equality.
pub fn emails_match(a: &str, b: &str) -> bool {
    normalize_email(a) == normalize_email(b)
}

/// Check that an address has the `local@domain` shape.
pub fn validate_email(email: &str) -> Result<()> {
    let trimmed = email.trim();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !trimmed.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidEmail(email.to_string()))
    }
}

/// Validate and collapse a recipient list.
///
/// Duplicates are removed case-insensitively, keeping the first spelling.
pub fn dedup_recipients(emails: &[String]) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(emails.len());
    for email in emails {
        validate_email(email)?;
        if seen.insert(normalize_email(email)) {
            out.push(email.trim().to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_ignores_case() {
        assert!(emails_match("R@X.com", "r@x.COM"));
        assert!(emails_match(" r@x.com", "r@x.com "));
        assert!(!emails_match("r@x.com", "s@x.com"));
    }

    #[test]
    fn test_only_ascii_folds() {
        assert!(emails_match("ÜLF@X.com", "Ülf@x.com"));
        assert!(!emails_match("Ülf@x.com", "ülf@x.com"));
    }

    #[test]
    fn test_validate() {
        assert!(validate_email("a@b.c").is_ok());
        assert!(validate_email("a@").is_err());
        assert!(validate_email("@b").is_err());
        assert!(validate_email("ab").is_err());
        assert!(validate_email("a b@c").is_err());
        assert!(validate_email("a@b@c").is_err());
    }

    #[test]
    fn test_dedup_recipients() {
        let out = dedup_recipients(&[
            "Alice@x.com".to_string(),
            "bob@x.com".to_string(),
            "alice@X.COM".to_string(),
        ])
        .unwrap();
        assert_eq!(out, vec!["Alice@x.com".to_string(), "bob@x.com".to_string()]);
    }
}
