//! # stream-dispatch
//!
//! The request/response core of a typed client for the Stream HTTP API.
//!
//! One generic entry point, [`Client::call`], turns a logical [`Operation`]
//! (method, path template, path and query parameters, body) into an
//! authenticated HTTP request, sends it once, and turns the answer into
//! either a typed [`Response<T>`] carrying rate limit data or an [`Error`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use stream_dispatch::{CallContext, Client, Operation, RequestBody};
//! use http::Method;
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct SendMessage {
//!     text: String,
//!     user_id: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct MessageResponse {
//!     message: serde_json::Value,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stream_dispatch::Error> {
//!     let client = Client::builder()
//!         .api_key("my-api-key")
//!         .auth_token("my-server-jwt")
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     let ctx = CallContext::with_timeout(Duration::from_secs(10));
//!
//!     let op = Operation::new(Method::POST, "channels/{param1}/{param2}/message")
//!         .path_params(["messaging", "general"])
//!         .json(&SendMessage {
//!             text: "hello".to_string(),
//!             user_id: "u1".to_string(),
//!         })?;
//!
//!     let sent = client.call::<MessageResponse>(&ctx, op).await?;
//!     println!("sent: {}", sent.data.message);
//!     println!("remaining quota: {:?}", sent.rate_limit.remaining);
//!
//!     // Upload a file without buffering it
//!     let file = tokio::fs::File::open("avatar.png").await.unwrap();
//!     let upload = Operation::new(Method::POST, "uploads/image").body(RequestBody::reader(file));
//!     client.call_no_content(&ctx, upload).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - [`route`] expands `{paramN}` placeholders, encodes the query in key
//!   order and appends `api_key`.
//! - [`RequestBody`] is empty, a stream, or JSON bytes.
//! - [`headers`] sets content type, client version, `Authorization` and the
//!   auth type on every request.
//! - [`response`] classifies by status (399 and above is an [`ApiError`]),
//!   decodes the body and attaches the [`RateLimitInfo`] from the headers.
//! - [`CallContext`] aborts the call when cancelled or past its deadline.
//!
//! ## Error Handling
//!
//! ```no_run
//! use stream_dispatch::{CallContext, Client, Error};
//!
//! # async fn example(client: Client) -> Result<(), Error> {
//! match client.get::<serde_json::Value>(&CallContext::new(), "users/{param1}", &["u1"]).await {
//!     Ok(response) => println!("Success: {:?}", response.data),
//!     Err(Error::Api(api)) if api.is_rate_limited() => {
//!         eprintln!("rate limited, retry in {:?}", api.rate_limit.and_then(|r| r.time_until_reset()));
//!     }
//!     Err(Error::Api(api)) => eprintln!("API error {}: {}", api.status_code, api.message),
//!     Err(Error::Deserialization { raw_response, source, .. }) => {
//!         eprintln!("unexpected body {raw_response}: {source}");
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

mod body;
mod client;
mod context;
mod error;
pub mod headers;
mod operation;
pub mod rate_limit;
pub mod response;
pub mod route;

pub use body::{ByteStream, RequestBody};
pub use client::{Client, ClientBuilder, DEFAULT_BASE_URL};
pub use context::CallContext;
pub use error::{ApiError, CancelReason, Error, Result};
pub use operation::Operation;
pub use rate_limit::RateLimitInfo;
pub use response::{NoContent, Response, ResponseParts};
pub use route::QueryParams;
