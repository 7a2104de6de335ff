//! The fixed header set attached to every outgoing request.

use crate::{Error, Result};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};

/// Identifies this client and its version to the server.
pub const CLIENT_HEADER: HeaderName = HeaderName::from_static("x-stream-client");

/// Names the scheme of the `Authorization` token.
pub const AUTH_TYPE_HEADER: HeaderName = HeaderName::from_static("stream-auth-type");

/// Value of [`CLIENT_HEADER`], e.g. `stream-rust-client-0.1.0`.
pub fn client_version_header() -> String {
    format!("stream-rust-client-{}", env!("CARGO_PKG_VERSION"))
}

/// Validates an auth token as a header value, marked sensitive so it is
/// redacted from `Debug` output.
pub(crate) fn auth_header_value(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(token)
        .map_err(|e| Error::Configuration(format!("Invalid auth token: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Sets content type, client version, authorization and auth type,
/// overwriting whatever `headers` held for those names.
pub(crate) fn compose_headers(headers: &mut HeaderMap, auth: &HeaderValue) {
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        CLIENT_HEADER,
        HeaderValue::from_str(&client_version_header())
            .unwrap_or_else(|_| HeaderValue::from_static("stream-rust-client")),
    );
    headers.insert(AUTHORIZATION, auth.clone());
    headers.insert(AUTH_TYPE_HEADER, HeaderValue::from_static("jwt"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_exactly_four_headers() {
        let auth = auth_header_value("token-123").unwrap();
        let mut headers = HeaderMap::new();
        compose_headers(&mut headers, &auth);

        assert_eq!(headers.len(), 4);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[AUTHORIZATION], "token-123");
        assert_eq!(headers[&AUTH_TYPE_HEADER], "jwt");
        assert_eq!(
            headers[&CLIENT_HEADER],
            format!("stream-rust-client-{}", env!("CARGO_PKG_VERSION")).as_str()
        );
    }

    #[test]
    fn overwrites_prior_values() {
        let auth = auth_header_value("fresh").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.append(AUTHORIZATION, HeaderValue::from_static("stale-1"));
        headers.append(AUTHORIZATION, HeaderValue::from_static("stale-2"));

        compose_headers(&mut headers, &auth);

        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers[AUTHORIZATION], "fresh");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn rejects_token_with_newline() {
        assert!(matches!(
            auth_header_value("bad\ntoken"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn auth_value_is_sensitive() {
        assert!(auth_header_value("t").unwrap().is_sensitive());
    }
}
