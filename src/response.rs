//! Response classification, decoding, and the typed [`Response`] wrapper.
//!
//! A raw exchange is captured as [`ResponseParts`]. Classification is purely
//! by status: anything at or above [`ERROR_STATUS_THRESHOLD`] becomes an
//! [`Error::Api`], everything below it is decoded into the caller's type and
//! wrapped in a [`Response`] together with the rate limit snapshot taken from
//! the headers.

use crate::{rate_limit::RateLimitInfo, ApiError, Error, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Lowest status code treated as an API error.
pub const ERROR_STATUS_THRESHOLD: u16 = 399;

/// Marker result for operations that expect no payload.
///
/// Calls made with [`Client::call_no_content`](crate::Client::call_no_content)
/// never attempt to decode the body, so an empty or non-JSON success body is
/// not an error. Only the status, headers and rate limit data are returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoContent;

/// A raw HTTP response, fully read.
///
/// The dispatcher builds this from a `reqwest::Response`. Hosts that execute
/// requests themselves can build one directly and run it through
/// [`ResponseParts::into_json`] or [`ResponseParts::into_no_content`].
#[derive(Debug, Clone)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `None` when the transport delivered no body stream at all.
    pub body: Option<Bytes>,
    /// Time from send to fully-read body.
    pub latency: Duration,
}

impl ResponseParts {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Option<Bytes>) -> Self {
        Self {
            status,
            headers,
            body,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Drains a `reqwest` response into owned parts.
    ///
    /// The response (and with it the connection's body stream) is consumed
    /// here, so it is released whether or not reading succeeds.
    pub(crate) async fn read(response: reqwest::Response, sent_at: Instant) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::Read)?;

        Ok(Self {
            status,
            headers,
            body: Some(body),
            latency: sent_at.elapsed(),
        })
    }

    /// Returns `true` if the status classifies as an API error.
    pub fn is_api_error(&self) -> bool {
        self.status.as_u16() >= ERROR_STATUS_THRESHOLD
    }

    /// Classifies the response and decodes a success body as JSON into `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBody`] when `body` is `None`.
    /// - [`Error::Api`] when the status is 399 or higher.
    /// - [`Error::Deserialization`] when the success body does not match `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<Response<T>> {
        let success = self.classify()?;

        let data = match serde_json::from_slice::<T>(&success.body) {
            Ok(data) => data,
            Err(source) => {
                tracing::debug!(
                    status = success.status.as_u16(),
                    error = %source,
                    "response body did not match the expected type"
                );
                return Err(Error::Deserialization {
                    raw_response: String::from_utf8_lossy(&success.body).into_owned(),
                    status: success.status,
                    source,
                });
            }
        };

        Ok(success.into_response(data))
    }

    /// Classifies the response without decoding the success body.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyBody`] or [`Error::Api`], as for [`ResponseParts::into_json`].
    pub fn into_no_content(self) -> Result<Response<NoContent>> {
        Ok(self.classify()?.into_response(NoContent))
    }

    fn classify(self) -> Result<Success> {
        let body = self.body.ok_or(Error::EmptyBody)?;

        if self.status.as_u16() >= ERROR_STATUS_THRESHOLD {
            return Err(Error::Api(Box::new(decode_api_error(
                self.status,
                &self.headers,
                &body,
            ))));
        }

        Ok(Success {
            status: self.status,
            headers: self.headers,
            body,
            latency: self.latency,
        })
    }
}

/// Decodes an error body, falling back to the raw text when it is not JSON.
///
/// The HTTP status fills in `status_code` when the body omitted it.
fn decode_api_error(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> ApiError {
    let mut api_error = match serde_json::from_slice::<ApiError>(body) {
        Ok(decoded) => decoded,
        Err(_) => ApiError::from_raw(status, body),
    };
    if api_error.status_code == 0 {
        api_error.status_code = status.as_u16();
    }
    api_error.rate_limit = Some(RateLimitInfo::from_headers(headers));
    api_error
}

/// A classified success, body not yet decoded.
struct Success {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    latency: Duration,
}

impl Success {
    /// Wraps decoded data and attaches the header-derived rate limit snapshot.
    fn into_response<T>(self, data: T) -> Response<T> {
        let rate_limit = RateLimitInfo::from_headers(&self.headers);
        Response {
            data,
            rate_limit,
            raw_body: String::from_utf8_lossy(&self.body).into_owned(),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
        }
    }
}

/// A successful, decoded response.
///
/// `data` holds exactly what the body decoded into. Rate limit facts live
/// next to it in `rate_limit`, so decoded fields are never touched when the
/// snapshot is attached.
///
/// # Examples
///
/// ```no_run
/// use stream_dispatch::{CallContext, Client};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Channel {
///     id: String,
/// }
///
/// # async fn example(client: Client) -> Result<(), stream_dispatch::Error> {
/// let ctx = CallContext::new();
/// let response = client.get::<Channel>(&ctx, "channels/{param1}", &["general"]).await?;
///
/// println!("Channel: {}", response.data.id);
/// println!("Remaining quota: {:?}", response.rate_limit.remaining);
/// println!("Request took {:?}", response.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// Rate limit snapshot taken from the response headers.
    pub rate_limit: RateLimitInfo,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from sending the request until the body was fully read.
    pub latency: Duration,
}

impl<T> Response<T> {
    /// Maps the response data to a different type using the provided function.
    ///
    /// # Examples
    ///
    /// ```
    /// # use stream_dispatch::response::ResponseParts;
    /// # use http::{HeaderMap, StatusCode};
    /// let response = ResponseParts::new(StatusCode::OK, HeaderMap::new(), Some("42".into()))
    ///     .into_json::<u32>()
    ///     .unwrap();
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            rate_limit: self.rate_limit,
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
        }
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Splits off the decoded data and the rate limit snapshot.
    pub fn into_parts(self) -> (T, RateLimitInfo) {
        (self.data, self.rate_limit)
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Foo {
        foo: String,
    }

    fn parts(status: u16, body: &'static str) -> ResponseParts {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("1000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("998"));
        ResponseParts::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            Some(Bytes::from_static(body.as_bytes())),
        )
    }

    #[test]
    fn success_decodes_and_carries_rate_limit() {
        let response = parts(200, r#"{"foo":"bar"}"#).into_json::<Foo>().unwrap();

        assert_eq!(response.data.foo, "bar");
        assert_eq!(response.foo, "bar");
        assert_eq!(response.rate_limit.limit, Some(1000));
        assert_eq!(response.rate_limit.remaining, Some(998));
        assert!(!response.rate_limit.is_empty());
    }

    #[test]
    fn structured_error_body() {
        let body = r#"{"code":16,"message":"not found","StatusCode":404,"duration":"1ms","more_info":""}"#;
        let err = parts(404, body).into_json::<Foo>().unwrap_err();

        let api = err.api_error().expect("expected API error");
        assert_eq!(api.code, 16);
        assert_eq!(api.message, "not found");
        assert_eq!(api.status_code, 404);
        assert_eq!(api.duration, "1ms");
        assert_eq!(api.rate_limit.as_ref().unwrap().limit, Some(1000));
    }

    #[test]
    fn structured_error_without_status_code_takes_http_status() {
        let err = parts(422, r#"{"code":4,"message":"x"}"#)
            .into_json::<Foo>()
            .unwrap_err();

        let api = err.api_error().unwrap();
        assert_eq!(api.code, 4);
        assert_eq!(api.message, "x");
        assert_eq!(api.status_code, 422);
        assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
    }

    #[test]
    fn structured_error_with_bogus_status_code_keeps_fields() {
        let body = r#"{"code":4,"message":"x","exception_fields":{"id":"bad"},"StatusCode":-1}"#;
        let err = parts(400, body).into_json::<Foo>().unwrap_err();

        let api = err.api_error().unwrap();
        assert_eq!(api.code, 4);
        assert_eq!(api.status_code, 400);
        assert_eq!(
            api.exception_fields.as_ref().and_then(|f| f.get("id")).map(String::as_str),
            Some("bad")
        );
    }

    #[test]
    fn plain_text_error_body_falls_back_to_raw_message() {
        let err = parts(500, "internal error").into_json::<Foo>().unwrap_err();

        let api = err.api_error().unwrap();
        assert_eq!(api.message, "internal error");
        assert_eq!(api.status_code, 500);
        assert_eq!(api.code, 0);
        assert!(api.rate_limit.is_some());
    }

    #[test]
    fn error_status_wins_over_success_shaped_body() {
        let err = parts(400, r#"{"foo":"bar"}"#).into_json::<Foo>().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn status_399_is_an_error_398_is_not() {
        assert!(parts(399, "{}").into_no_content().is_err());
        assert!(parts(398, "").into_no_content().is_ok());
        assert!(parts(399, "").is_api_error());
        assert!(!parts(302, "").is_api_error());
    }

    #[test]
    fn missing_body_is_empty_body_error() {
        let parts = ResponseParts::new(StatusCode::OK, HeaderMap::new(), None);
        assert!(matches!(parts.into_json::<Foo>(), Err(Error::EmptyBody)));
    }

    #[test]
    fn mismatched_success_body_is_deserialization_error() {
        let err = parts(200, r#"{"bar":1}"#).into_json::<Foo>().unwrap_err();

        match err {
            Error::Deserialization {
                raw_response,
                status,
                ..
            } => {
                assert_eq!(raw_response, r#"{"bar":1}"#);
                assert_eq!(status, StatusCode::OK);
            }
            other => panic!("expected Deserialization, got {other:?}"),
        }
    }

    #[test]
    fn no_content_skips_decoding() {
        let response = parts(201, "").into_no_content().unwrap();
        assert_eq!(response.data, NoContent);
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.rate_limit.remaining, Some(998));

        let response = parts(200, "not json at all").into_no_content().unwrap();
        assert_eq!(response.raw_body, "not json at all");
    }

    #[test]
    fn map_keeps_metadata() {
        let response = parts(200, r#"{"foo":"bar"}"#)
            .into_json::<Foo>()
            .unwrap()
            .map(|f| f.foo.len());

        assert_eq!(response.data, 3);
        assert_eq!(response.header("x-ratelimit-limit"), Some("1000"));
        let (data, rate_limit) = response.into_parts();
        assert_eq!(data, 3);
        assert_eq!(rate_limit.limit, Some(1000));
    }
}
