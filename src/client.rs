//! The dispatcher: turns an [`Operation`] into one HTTP exchange and one
//! typed outcome.
//!
//! The [`Client`] type is the main entry point. Use [`ClientBuilder`] to
//! configure and create clients.

use crate::{
    body::RequestBody,
    context::CallContext,
    headers::{auth_header_value, compose_headers},
    operation::Operation,
    response::{NoContent, ResponseParts},
    route::{build_url, API_KEY_PARAM},
    Error, Response, Result,
};
use http::{HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://chat.stream-io-api.com";

/// A client for the Stream HTTP API.
///
/// Configuration is immutable once built and shared behind an `Arc`, so the
/// client is cheap to clone and safe to use from many tasks at once. Each
/// call is attempted exactly once.
///
/// # Examples
///
/// ```no_run
/// use stream_dispatch::{CallContext, Client, Response};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize)]
/// struct UpdateChannel {
///     name: String,
/// }
///
/// #[derive(Deserialize)]
/// struct Channel {
///     id: String,
/// }
///
/// # async fn example() -> Result<(), stream_dispatch::Error> {
/// let client = Client::builder()
///     .base_url("https://chat.stream-io-api.com")?
///     .api_key("my-api-key")
///     .auth_token("my-server-jwt")
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// let ctx = CallContext::with_timeout(Duration::from_secs(10));
///
/// let channel: Response<Channel> = client
///     .get(&ctx, "channels/{param1}/{param2}", &["messaging", "general"])
///     .await?;
/// println!("Channel: {}", channel.data.id);
///
/// let update = UpdateChannel { name: "General".to_string() };
/// let updated: Response<Channel> = client
///     .post(&ctx, "channels/{param1}/{param2}", &["messaging", "general"], &update)
///     .await?;
/// println!("Remaining quota: {:?}", updated.rate_limit.remaining);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    auth: HeaderValue,
    timeout: Option<Duration>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    /// Dispatches an operation and decodes the JSON success body into `Res`.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedUrl`] if the URL cannot be built.
    /// - [`Error::Cancelled`] if `ctx` ends before the call completes.
    /// - [`Error::Transport`] for network failures.
    /// - [`Error::Read`] if the response body cannot be read.
    /// - [`Error::Api`] for statuses of 399 and above.
    /// - [`Error::Deserialization`] if the body does not match `Res`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use http::Method;
    /// use stream_dispatch::{CallContext, Client, Operation};
    /// use serde::{Deserialize, Serialize};
    ///
    /// #[derive(Serialize)]
    /// struct QueryUsers {
    ///     filter_conditions: serde_json::Value,
    /// }
    ///
    /// #[derive(Deserialize)]
    /// struct Users {
    ///     users: Vec<serde_json::Value>,
    /// }
    ///
    /// # async fn example(client: Client) -> Result<(), stream_dispatch::Error> {
    /// let op = Operation::new(Method::GET, "users").query_struct(&QueryUsers {
    ///     filter_conditions: serde_json::json!({"id": "u1"}),
    /// })?;
    ///
    /// let response = client.call::<Users>(&CallContext::new(), op).await?;
    /// println!("Found {} users", response.data.users.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<Res>(&self, ctx: &CallContext, operation: Operation) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.dispatch(ctx, operation).await?.into_json()
    }

    /// Dispatches an operation whose success body is not needed.
    ///
    /// The body is still read and released, and an error body is still
    /// classified, but a success body is never decoded.
    pub async fn call_no_content(
        &self,
        ctx: &CallContext,
        operation: Operation,
    ) -> Result<Response<NoContent>> {
        self.dispatch(ctx, operation).await?.into_no_content()
    }

    /// Builds the authenticated request for `operation` without sending it.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedUrl`] if the URL cannot be built.
    pub fn build_request(&self, operation: Operation) -> Result<reqwest::Request> {
        let url = build_url(
            &self.inner.base_url,
            &self.inner.api_key,
            &operation.path,
            operation.path_params.as_slice(),
            Some(&operation.query),
        )?;

        let mut request = reqwest::Request::new(operation.method, url);
        compose_headers(request.headers_mut(), &self.inner.auth);
        *request.body_mut() = operation.body.into_reqwest();
        *request.timeout_mut() = self.inner.timeout;

        Ok(request)
    }

    /// Sends the request and reads the whole response, racing both steps
    /// against `ctx`.
    async fn dispatch(&self, ctx: &CallContext, operation: Operation) -> Result<ResponseParts> {
        let request = self.build_request(operation)?;

        tracing::debug!(
            method = %request.method(),
            url = %redact_api_key(request.url()),
            "Executing HTTP request"
        );

        let sent_at = Instant::now();
        let response = match ctx.run(self.inner.http_client.execute(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                // a send failure after cancellation is reported as the cancellation
                if let Some(reason) = ctx.reason() {
                    return Err(Error::Cancelled(reason));
                }
                return Err(Error::Transport(e));
            }
            Err(reason) => return Err(Error::Cancelled(reason)),
        };

        let parts = ctx
            .run(ResponseParts::read(response, sent_at))
            .await
            .map_err(Error::Cancelled)??;

        tracing::debug!(
            status = parts.status.as_u16(),
            latency_ms = parts.latency.as_millis() as u64,
            "Received HTTP response"
        );

        Ok(parts)
    }

    /// Makes a GET request.
    pub async fn get<Res>(
        &self,
        ctx: &CallContext,
        path: &str,
        path_params: &[impl AsRef<str>],
    ) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.call(ctx, operation(Method::GET, path, path_params)).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<Req, Res>(
        &self,
        ctx: &CallContext,
        path: &str,
        path_params: &[impl AsRef<str>],
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let op = operation(Method::POST, path, path_params).body(RequestBody::json(body)?);
        self.call(ctx, op).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<Req, Res>(
        &self,
        ctx: &CallContext,
        path: &str,
        path_params: &[impl AsRef<str>],
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let op = operation(Method::PUT, path, path_params).body(RequestBody::json(body)?);
        self.call(ctx, op).await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        ctx: &CallContext,
        path: &str,
        path_params: &[impl AsRef<str>],
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let op = operation(Method::PATCH, path, path_params).body(RequestBody::json(body)?);
        self.call(ctx, op).await
    }

    /// Makes a DELETE request.
    pub async fn delete<Res>(
        &self,
        ctx: &CallContext,
        path: &str,
        path_params: &[impl AsRef<str>],
    ) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.call(ctx, operation(Method::DELETE, path, path_params)).await
    }
}

fn operation(method: Method, path: &str, path_params: &[impl AsRef<str>]) -> Operation {
    Operation::new(method, path).path_params(path_params.iter().map(|p| p.as_ref().to_string()))
}

/// Renders `url` with the API key value masked, for logging.
fn redact_api_key(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == API_KEY_PARAM { "REDACTED".into() } else { v };
            (k.into_owned(), v.into_owned())
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use stream_dispatch::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), stream_dispatch::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://chat.stream-io-api.com")?
///     .api_key("key")
///     .auth_token("server-token")
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<Url>,
    api_key: Option<String>,
    auth_token: Option<String>,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the environment.
    ///
    /// Reads `STREAM_BASE_URL`, `STREAM_API_KEY`, `STREAM_AUTH_TOKEN` and
    /// `STREAM_TIMEOUT_SECS`. Unset variables are left for the caller to
    /// provide.
    ///
    /// # Errors
    ///
    /// Returns an error if `STREAM_BASE_URL` is not a valid URL or
    /// `STREAM_TIMEOUT_SECS` is not a whole number.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::new();

        if let Ok(url) = std::env::var("STREAM_BASE_URL") {
            builder = builder.base_url(url)?;
        }
        if let Ok(key) = std::env::var("STREAM_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Ok(token) = std::env::var("STREAM_AUTH_TOKEN") {
            builder = builder.auth_token(token);
        }
        if let Ok(secs) = std::env::var("STREAM_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                Error::Configuration(format!("Invalid STREAM_TIMEOUT_SECS {:?}: {}", secs, e))
            })?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(builder)
    }

    /// Sets the base URL for all requests. Defaults to [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        let url = url.as_ref();
        let parsed = Url::parse(url).map_err(|e| Error::MalformedUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;
        self.base_url = Some(parsed);
        Ok(self)
    }

    /// Sets the API key sent as the `api_key` query parameter.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the token sent in the `Authorization` header.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the per-request transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Uses a pre-configured `reqwest::Client` as the transport.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key or auth token is missing, the token
    /// is not a valid header value, or the HTTP client cannot be built.
    pub fn build(self) -> Result<Client> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Configuration("API key is required".to_string()))?;
        let auth_token = self
            .auth_token
            .ok_or_else(|| Error::Configuration("Auth token is required".to_string()))?;
        let auth = auth_header_value(&auth_token)?;

        let base_url = match self.base_url {
            Some(url) => url.as_str().trim_end_matches('/').to_string(),
            None => DEFAULT_BASE_URL.to_string(),
        };

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(|e| {
                Error::Configuration(format!("Failed to build HTTP client: {}", e))
            })?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                api_key,
                auth,
                timeout: self.timeout,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{AUTHORIZATION, CONTENT_TYPE};

    fn client() -> Client {
        Client::builder()
            .base_url("https://api.example.com/")
            .unwrap()
            .api_key("key-1")
            .auth_token("jwt-1")
            .build()
            .unwrap()
    }

    #[test]
    fn build_request_assembles_url_headers_and_body() {
        let op = Operation::new(Method::POST, "users/{param1}")
            .path_param("a b")
            .query_param("limit", 3)
            .json(&serde_json::json!({"name": "x"}))
            .unwrap();

        let request = client().build_request(op).unwrap();

        assert_eq!(request.method(), Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://api.example.com/users/a%20b?limit=3&api_key=key-1"
        );
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(request.headers()[AUTHORIZATION], "jwt-1");
        assert_eq!(request.headers()["stream-auth-type"], "jwt");
        assert_eq!(
            request.body().and_then(|b| b.as_bytes()),
            Some(&br#"{"name":"x"}"#[..])
        );
    }

    #[test]
    fn absent_body_builds_bodyless_request() {
        let request = client()
            .build_request(Operation::new(Method::GET, "app"))
            .unwrap();
        assert!(request.body().is_none());
    }

    #[test]
    fn missing_path_param_fails_before_sending() {
        let err = client()
            .build_request(Operation::new(Method::GET, "users/{param1}"))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedUrl { .. }));
    }

    #[test]
    fn builder_requires_credentials() {
        let err = Client::builder().auth_token("t").build().err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));

        let err = Client::builder().api_key("k").build().err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn builder_rejects_bad_base_url() {
        assert!(matches!(
            Client::builder().base_url("not a url"),
            Err(Error::MalformedUrl { .. })
        ));
    }

    #[test]
    fn default_base_url() {
        let client = Client::builder().api_key("k").auth_token("t").build().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.api_key(), "k");
    }

    #[test]
    fn redaction_hides_only_api_key() {
        let url = Url::parse("https://x.test/a?limit=1&api_key=secret").unwrap();
        let shown = redact_api_key(&url);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("limit=1"));
        assert!(shown.contains("api_key=REDACTED"));
    }
}
