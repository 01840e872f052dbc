//! Provider error classification.
//!
//! Every failed API call is mapped to one [`ProviderError`] variant, which
//! decides how the hunt loop recovers (cooldown, backoff, or ignore).

use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::OnceLock;
use thiserror::Error;

/// Error bodies mentioning these words are treated as quota/limit errors.
static QUOTA_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_quota_regex() -> &'static Regex {
    QUOTA_REGEX.get_or_init(|| Regex::new(r"(?i)quota|limit").expect("Invalid Regex"))
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// 401/403, or a 404 from the identity service.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response arrived but could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Map an HTTP status and body to an error.
    ///
    /// `identity` marks Keystone calls, where 404 means the user or project is unknown.
    pub fn from_status(status: u16, body: &str, identity: bool) -> ProviderError {
        let message = error_message(body);
        match status {
            401 | 403 => ProviderError::Unauthorized(message),
            404 if identity => ProviderError::Unauthorized(message),
            404 => ProviderError::NotFound(message),
            429 => ProviderError::Quota(message),
            // 409 is also used for plain conflicts, e.g. a port already associated
            _ if get_quota_regex().is_match(&message) => ProviderError::Quota(message),
            _ => ProviderError::Http { status, message },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Unauthorized(_))
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, ProviderError::Quota(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    /// Cooldown window in minutes for errors that suspend the account.
    pub fn cooldown_minutes(&self) -> Option<RangeInclusive<i64>> {
        match self {
            ProviderError::Unauthorized(_) => Some(15..=30),
            ProviderError::Quota(_) => Some(20..=40),
            _ => None,
        }
    }
}

/// Pull the human readable message out of an OpenStack error body.
///
/// Neutron wraps it as `{"NeutronError": {"message": ..}}`, Nova as
/// `{"itemNotFound": {"message": ..}}` and Keystone as `{"error": {"message": ..}}`.
/// Falls back to the raw body.
pub fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.get("message").and_then(|m| m.as_str()).or_else(|| {
            v.as_object()?
                .values()
                .find_map(|inner| inner.get("message").and_then(|m| m.as_str()))
        })
    });
    match message {
        Some(m) => m.to_string(),
        None => body.trim().chars().take(300).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_neutron() {
        let body = std::fs::read_to_string("src/tests/test_data/neutron_error_quota.json").unwrap();
        assert_eq!(
            error_message(&body),
            "Quota exceeded for resources: ['floatingip']."
        );
    }

    #[test]
    fn test_error_message_keystone_and_raw() {
        let body = r#"{"error": {"code": 401, "title": "Unauthorized", "message": "The request you have made requires authentication."}}"#;
        assert_eq!(
            error_message(body),
            "The request you have made requires authentication."
        );
        assert_eq!(error_message("  bad gateway \n"), "bad gateway");
    }

    #[test]
    fn test_from_status() {
        assert!(ProviderError::from_status(401, "", false).is_auth());
        assert!(ProviderError::from_status(403, "", false).is_auth());
        assert!(ProviderError::from_status(404, "", true).is_auth());
        assert!(ProviderError::from_status(404, "", false).is_not_found());
        let quota = std::fs::read_to_string("src/tests/test_data/neutron_error_quota.json").unwrap();
        assert!(ProviderError::from_status(409, &quota, false).is_quota());
        assert!(ProviderError::from_status(429, "", false).is_quota());
        assert!(
            ProviderError::from_status(400, r#"{"NeutronError": {"message": "Rate LIMIT hit"}}"#, false)
                .is_quota()
        );
        match ProviderError::from_status(500, "boom", false) {
            ProviderError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_conflict_is_not_quota() {
        let body = r#"{"NeutronError": {"type": "FloatingIPPortAlreadyAssociated", "message": "Cannot associate floating IP 95.163.248.17 with port p-active, it is already associated"}}"#;
        let err = ProviderError::from_status(409, body, false);
        assert!(!err.is_quota(), "got {err:?}");
        assert_eq!(err.cooldown_minutes(), None);
        match ProviderError::from_status(413, "too large", false) {
            ProviderError::Http { status, .. } => assert_eq!(status, 413),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cooldown_minutes() {
        assert_eq!(
            ProviderError::Unauthorized("x".into()).cooldown_minutes(),
            Some(15..=30)
        );
        assert_eq!(ProviderError::Quota("x".into()).cooldown_minutes(), Some(20..=40));
        assert_eq!(ProviderError::Malformed("x".into()).cooldown_minutes(), None);
    }
}
