//! Error types for dispatched API calls.
//!
//! Every failure in the pipeline is returned to the immediate caller as an
//! [`Error`]. Nothing is retried or swallowed. Failures reported by the remote
//! service itself arrive as [`Error::Api`], carrying the structured
//! [`ApiError`] body (or a raw-text fallback when the body was not JSON).

use crate::rate_limit::RateLimitInfo;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The main error type for dispatched calls.
///
/// # Examples
///
/// ```no_run
/// use stream_dispatch::{CallContext, Client, Error};
///
/// # async fn example(client: Client) -> Result<(), Error> {
/// let ctx = CallContext::new();
/// match client.get::<serde_json::Value>(&ctx, "channels/{param1}", &["general"]).await {
///     Ok(response) => println!("Success: {:?}", response.data),
///     Err(Error::Api(api)) => {
///         eprintln!("API error {} ({}): {}", api.code, api.status_code, api.message);
///     }
///     Err(Error::Cancelled(reason)) => eprintln!("call aborted: {reason}"),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The base URL or the expanded path did not form a valid URL.
    #[error("Malformed URL {input:?}: {reason}")]
    MalformedUrl {
        /// The string that failed to parse.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A request body or query parameter struct could not be serialized to JSON.
    #[error("Failed to serialize request: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The response carried no body stream at all.
    #[error("HTTP response body is missing")]
    EmptyBody,

    /// The response body stream failed while being read.
    #[error("Failed to read HTTP response: {0}")]
    Read(#[source] reqwest::Error),

    /// The success body did not match the expected result type.
    #[error("Failed to deserialize response (status {status}): {source}")]
    Deserialization {
        /// The raw response body that failed to deserialize.
        raw_response: String,
        /// The HTTP status code.
        status: StatusCode,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A network-level failure (connection refused, DNS, TLS, timeout...).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller's cancellation signal fired before the call completed.
    #[error("Call cancelled: {0}")]
    Cancelled(CancelReason),

    /// The remote service answered with a status of 399 or above.
    #[error("API error (status {}): {}", .0.status_code, .0.message)]
    Api(Box<ApiError>),

    /// Invalid client configuration, such as a missing API key or a token
    /// that is not a valid header value.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api(api) => StatusCode::from_u16(api.status_code).ok(),
            Error::Deserialization { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body when it is part of the error.
    ///
    /// For [`Error::Api`] this is the message, which holds the raw body text
    /// whenever the error body was not structured JSON.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Api(api) => Some(&api.message),
            Error::Deserialization { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the structured API error, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }

    /// Returns rate limit information attached to an API error.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        self.api_error()?.rate_limit.as_ref()
    }

    /// Returns `true` if the call was aborted by its [`CallContext`](crate::CallContext).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

/// Why a call was aborted by its cancellation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// [`CallContext::cancel`](crate::CallContext::cancel) was invoked.
    Cancelled,
    /// The context's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context canceled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// The structured failure body returned by the remote service.
///
/// Wire shape:
/// `{"code":int,"message":string,"exception_fields":{...},"StatusCode":int,"duration":string,"more_info":string}`.
/// Rate limit facts are not on the wire; they come from the response headers
/// and are attached after decoding.
#[derive(thiserror::Error, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    /// Service-specific error code.
    #[serde(default)]
    pub code: i64,

    /// Human readable message, or the raw body text if it was not JSON.
    #[serde(default)]
    pub message: String,

    /// Per-field validation details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_fields: Option<HashMap<String, String>>,

    /// HTTP status code as reported by the service.
    ///
    /// A reported value outside `0..=65535` reads as 0, so the response's
    /// own status is used instead.
    #[serde(rename = "StatusCode", default, deserialize_with = "lenient_status_code")]
    pub status_code: u16,

    /// Server-side processing time, e.g. `"1.25ms"`.
    #[serde(default)]
    pub duration: String,

    /// Link to documentation about this error.
    #[serde(default)]
    pub more_info: String,

    /// Rate limit snapshot taken from the error response headers.
    #[serde(skip)]
    pub rate_limit: Option<RateLimitInfo>,
}

impl ApiError {
    /// Builds the fallback error used when the body is not structured JSON.
    pub fn from_raw(status: StatusCode, body: &[u8]) -> Self {
        Self {
            message: String::from_utf8_lossy(body).into_owned(),
            status_code: status.as_u16(),
            ..Default::default()
        }
    }

    /// Returns `true` for 429 responses or when the attached snapshot shows
    /// the quota is exhausted.
    pub fn is_rate_limited(&self) -> bool {
        self.status_code == 429
            || self
                .rate_limit
                .as_ref()
                .is_some_and(RateLimitInfo::is_rate_limited)
    }
}

fn lenient_status_code<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let reported = Option::<i64>::deserialize(deserializer)?;
    Ok(reported.and_then(|code| u16::try_from(code).ok()).unwrap_or(0))
}

/// A specialized `Result` type for dispatched calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_decodes_wire_shape() {
        let body = r#"{"code":4,"message":"bad input","exception_fields":{"name":"required"},"StatusCode":400,"duration":"0.5ms","more_info":"https://example.com/docs"}"#;
        let err: ApiError = serde_json::from_str(body).unwrap();

        assert_eq!(err.code, 4);
        assert_eq!(err.message, "bad input");
        assert_eq!(err.status_code, 400);
        assert_eq!(err.duration, "0.5ms");
        assert_eq!(err.more_info, "https://example.com/docs");
        assert_eq!(
            err.exception_fields.unwrap().get("name").map(String::as_str),
            Some("required")
        );
        assert!(err.rate_limit.is_none());
    }

    #[test]
    fn out_of_range_status_code_keeps_the_rest_of_the_body() {
        for reported in ["-1", "70000", "null"] {
            let body = format!(
                r#"{{"code":4,"message":"bad input","exception_fields":{{"name":"required"}},"StatusCode":{reported}}}"#
            );
            let err: ApiError = serde_json::from_str(&body).unwrap();

            assert_eq!(err.status_code, 0, "StatusCode {reported}");
            assert_eq!(err.code, 4);
            assert_eq!(err.message, "bad input");
            assert!(err.exception_fields.is_some());
        }
    }

    #[test]
    fn from_raw_keeps_text_and_status() {
        let err = ApiError::from_raw(StatusCode::BAD_GATEWAY, b"upstream down");
        assert_eq!(err.message, "upstream down");
        assert_eq!(err.status_code, 502);
        assert_eq!(err.code, 0);
        assert_eq!(err.to_string(), "upstream down");
    }

    #[test]
    fn accessors_on_api_variant() {
        let err = Error::Api(Box::new(ApiError {
            code: 9,
            message: "slow down".to_string(),
            status_code: 429,
            ..Default::default()
        }));

        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(err.raw_response(), Some("slow down"));
        assert!(err.api_error().unwrap().is_rate_limited());
        assert!(err.rate_limit_info().is_none());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancelled_display() {
        let err = Error::Cancelled(CancelReason::DeadlineExceeded);
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Call cancelled: context deadline exceeded");
        assert_eq!(err.status(), None);
    }
}
