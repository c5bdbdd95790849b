//! Parsing of the per-request inputs shared by every dashboard route.

use crate::errors::RequestError;
use serde::Deserialize;

/// Username used for logged-out requests.
pub const ANONYMOUS_USER: &str = "anonymous";
pub const DEFAULT_LIMIT: i64 = 10;
pub const DEFAULT_INTERVAL: &str = "1 year";
/// Lookback used by `/apps/recently-ran` when the caller does not pass one.
pub const RECENTLY_RAN_INTERVAL: &str = "1 week";

/// Raw query parameters. Kept as strings so that a malformed value is a
/// client error rather than a routing miss.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub limit: Option<String>,
    #[serde(rename = "start-date-interval")]
    pub start_date_interval: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DashboardRequest {
    /// Username without any `@domain` suffix, or [`ANONYMOUS_USER`].
    pub username: String,
    pub anonymous: bool,
    pub limit: i64,
    /// A PostgreSQL interval literal, e.g. `1 year` or `2 weeks 3 days`.
    pub start_date_interval: String,
    /// Whether the caller supplied `start_date_interval`. Route defaults are
    /// known to be valid; caller intervals must be checked before use.
    pub custom_interval: bool,
}

impl DashboardRequest {
    pub fn for_user(username: &str, params: &DashboardParams) -> Result<Self, RequestError> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(RequestError::MissingUsername);
        }

        let (start_date_interval, custom_interval) =
            parse_interval(params.start_date_interval.as_deref(), DEFAULT_INTERVAL);
        Ok(DashboardRequest {
            username: username.to_string(),
            anonymous: false,
            limit: parse_limit(params.limit.as_deref())?,
            start_date_interval,
            custom_interval,
        })
    }

    pub fn anonymous(params: &DashboardParams) -> Result<Self, RequestError> {
        Self::anonymous_with_interval(params, DEFAULT_INTERVAL)
    }

    pub fn anonymous_with_interval(
        params: &DashboardParams,
        default_interval: &str,
    ) -> Result<Self, RequestError> {
        let (start_date_interval, custom_interval) =
            parse_interval(params.start_date_interval.as_deref(), default_interval);
        Ok(DashboardRequest {
            username: ANONYMOUS_USER.to_string(),
            anonymous: true,
            limit: parse_limit(params.limit.as_deref())?,
            start_date_interval,
            custom_interval,
        })
    }
}

/// Strips an `@domain` suffix. `alice@example.org` becomes `alice`.
pub fn normalize_username(username: &str) -> &str {
    let username = username.trim();
    username.split('@').next().unwrap_or(username)
}

fn parse_limit(raw: Option<&str>) -> Result<i64, RequestError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_LIMIT);
    };
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|_| RequestError::InvalidLimit(raw.to_string()))?;
    if limit <= 0 {
        return Err(RequestError::NonPositiveLimit);
    }
    Ok(limit)
}

/// An empty or missing interval means the route default. Anything else is
/// only syntax checked later, by the database.
fn parse_interval(raw: Option<&str>, default: &str) -> (String, bool) {
    match raw.map(str::trim) {
        Some(interval) if !interval.is_empty() => (interval.to_string(), true),
        _ => (default.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<&str>, interval: Option<&str>) -> DashboardParams {
        DashboardParams {
            limit: limit.map(String::from),
            start_date_interval: interval.map(String::from),
        }
    }

    #[test]
    fn test_defaults() {
        let request = DashboardRequest::for_user("alice", &DashboardParams::default()).unwrap();
        assert_eq!(request.username, "alice");
        assert!(!request.anonymous);
        assert_eq!(request.limit, 10);
        assert_eq!(request.start_date_interval, "1 year");
    }

    #[test]
    fn test_username_domain_is_stripped() {
        let request =
            DashboardRequest::for_user("alice@example.org", &params(Some("5"), None)).unwrap();
        assert_eq!(request.username, "alice");
        assert_eq!(request.limit, 5);

        assert_eq!(normalize_username("bob"), "bob");
        assert_eq!(normalize_username("bob@iplantcollaborative.org"), "bob");
    }

    #[test]
    fn test_missing_username() {
        assert_eq!(
            DashboardRequest::for_user("", &DashboardParams::default()),
            Err(RequestError::MissingUsername)
        );
        assert_eq!(
            DashboardRequest::for_user("@example.org", &DashboardParams::default()),
            Err(RequestError::MissingUsername)
        );
    }

    #[test]
    fn test_invalid_limits() {
        assert_eq!(
            DashboardRequest::for_user("alice", &params(Some("ten"), None)),
            Err(RequestError::InvalidLimit("ten".into()))
        );
        assert_eq!(
            DashboardRequest::for_user("alice", &params(Some("2.5"), None)),
            Err(RequestError::InvalidLimit("2.5".into()))
        );
        assert_eq!(
            DashboardRequest::for_user("alice", &params(Some("0"), None)),
            Err(RequestError::NonPositiveLimit)
        );
        assert_eq!(
            DashboardRequest::anonymous(&params(Some("-3"), None)),
            Err(RequestError::NonPositiveLimit)
        );
    }

    #[test]
    fn test_anonymous_request() {
        let request = DashboardRequest::anonymous(&params(None, Some("2 weeks"))).unwrap();
        assert_eq!(request.username, ANONYMOUS_USER);
        assert!(request.anonymous);
        assert_eq!(request.start_date_interval, "2 weeks");
    }

    #[test]
    fn test_default_interval_override() {
        let request = DashboardRequest::anonymous_with_interval(
            &DashboardParams::default(),
            RECENTLY_RAN_INTERVAL,
        )
        .unwrap();
        assert_eq!(request.start_date_interval, "1 week");
    }

    #[test]
    fn test_interval_from_caller() {
        let request =
            DashboardRequest::for_user("alice", &params(None, Some(" 1 year 2 years "))).unwrap();
        assert_eq!(request.start_date_interval, "1 year 2 years");
        assert!(request.custom_interval);

        let request = DashboardRequest::for_user("alice", &params(None, Some("P1Y"))).unwrap();
        assert_eq!(request.start_date_interval, "P1Y");
        assert!(request.custom_interval);
    }

    #[test]
    fn test_empty_interval_uses_default() {
        let request = DashboardRequest::for_user("alice", &params(None, Some(""))).unwrap();
        assert_eq!(request.start_date_interval, "1 year");
        assert!(!request.custom_interval);

        let request =
            DashboardRequest::anonymous_with_interval(&params(None, Some("  ")), RECENTLY_RAN_INTERVAL)
                .unwrap();
        assert_eq!(request.start_date_interval, "1 week");
        assert!(!request.custom_interval);
    }
}
