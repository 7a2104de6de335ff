//! Rate limit snapshots parsed from response headers.
//!
//! Every response, successful or not, carries a [`RateLimitInfo`] derived from
//! its headers. On success it is attached to [`Response::rate_limit`]; on
//! failure it is attached to [`ApiError::rate_limit`].
//!
//! [`Response::rate_limit`]: crate::Response::rate_limit
//! [`ApiError::rate_limit`]: crate::ApiError::rate_limit

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Information extracted from rate limit headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Requests allowed in the current window (`X-RateLimit-Limit`).
    pub limit: Option<u64>,

    /// Number of requests remaining in the current window.
    pub remaining: Option<u64>,

    /// When the rate limit resets (from X-RateLimit-Reset or RateLimit-Reset headers).
    pub reset_at: Option<SystemTime>,

    /// How long the server asked us to wait (from Retry-After header).
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    /// Extracts rate limit information from HTTP response headers.
    ///
    /// Parses:
    /// - `X-RateLimit-Limit` / `RateLimit-Limit`
    /// - `X-RateLimit-Remaining` / `RateLimit-Remaining`
    /// - `X-RateLimit-Reset` / `RateLimit-Reset` (Unix timestamp)
    /// - `Retry-After` (seconds or HTTP date)
    ///
    /// Missing or unparsable headers leave the matching field `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stream_dispatch::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("x-ratelimit-limit", "1000".parse().unwrap());
    /// headers.insert("x-ratelimit-remaining", "999".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.limit, Some(1000));
    /// assert_eq!(info.remaining, Some(999));
    /// assert!(!info.is_rate_limited());
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: parse_u64(headers, &["x-ratelimit-limit", "ratelimit-limit"]),
            remaining: parse_u64(headers, &["x-ratelimit-remaining", "ratelimit-remaining"]),
            reset_at: parse_rate_limit_reset(headers),
            retry_after: parse_retry_after(headers),
        }
    }

    /// Returns `true` if no rate limit header was present.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Returns `true` if this represents an active rate limit.
    ///
    /// A rate limit is considered active if:
    /// - `retry_after` is specified, OR
    /// - `remaining` is Some(0)
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining == Some(0)
    }

    /// Returns how long until the window resets.
    ///
    /// Prefers `retry_after`, then `reset_at`. `None` when neither is known
    /// or the reset time is already in the past.
    pub fn time_until_reset(&self) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after);
        }
        self.reset_at?.duration_since(SystemTime::now()).ok()
    }
}

/// Parses the first header in `names` that holds an unsigned integer.
fn parse_u64(headers: &HeaderMap, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| {
        headers
            .get(*name)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    })
}

/// Parses the Retry-After header.
///
/// Supports both delay-seconds (integer) and HTTP-date formats.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // RFC 7231 date
    let date_time = httpdate::parse_http_date(header).ok()?;
    date_time.duration_since(SystemTime::now()).ok()
}

/// Parses X-RateLimit-Reset or RateLimit-Reset headers (Unix timestamp).
fn parse_rate_limit_reset(headers: &HeaderMap) -> Option<SystemTime> {
    let timestamp = parse_u64(headers, &["x-ratelimit-reset", "ratelimit-reset"])?;
    UNIX_EPOCH.checked_add(Duration::from_secs(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("60"));

        let delay = parse_retry_after(&headers);
        assert_eq!(delay, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_reset_beyond_system_time_range_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("100"));
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_static("18446744073709551615"),
        );

        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.reset_at, None);
        assert_eq!(info.limit, Some(100));
        assert_eq!(info.time_until_reset(), None);
    }

    #[test]
    fn test_parse_retry_after_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("soon"));

        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_full_snapshot() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("60"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.limit, Some(60));
        assert_eq!(info.remaining, Some(0));
        assert_eq!(
            info.reset_at,
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
        assert!(info.is_rate_limited());
        assert!(!info.is_empty());
        // reset is in the past
        assert_eq!(info.time_until_reset(), None);
    }

    #[test]
    fn test_draft_standard_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("ratelimit-limit", HeaderValue::from_static("100"));
        headers.insert("ratelimit-remaining", HeaderValue::from_static("7"));

        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.limit, Some(100));
        assert_eq!(info.remaining, Some(7));
        assert!(!info.is_rate_limited());
    }

    #[test]
    fn test_no_headers_is_empty() {
        let info = RateLimitInfo::from_headers(&HeaderMap::new());
        assert!(info.is_empty());
        assert!(!info.is_rate_limited());
    }

    #[test]
    fn test_time_until_reset_future() {
        let mut headers = HeaderMap::new();
        let future_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
            + 120;
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&future_timestamp.to_string()).unwrap(),
        );

        let info = RateLimitInfo::from_headers(&headers);
        let wait = info.time_until_reset().unwrap();
        assert!(wait > Duration::from_secs(100) && wait <= Duration::from_secs(120));
    }

    #[test]
    fn test_retry_after_wins_over_reset() {
        let info = RateLimitInfo {
            retry_after: Some(Duration::from_secs(5)),
            reset_at: Some(SystemTime::now() + Duration::from_secs(600)),
            ..Default::default()
        };
        assert_eq!(info.time_until_reset(), Some(Duration::from_secs(5)));
    }
}
