//! Request body encoding.
//!
//! A [`RequestBody`] is chosen once, when the operation is built. Streams and
//! readers are handed to the HTTP layer untouched, which takes ownership and
//! drops them once the request is sent; structured values are serialized to
//! JSON up front so serialization errors surface before anything goes on the
//! wire.

use crate::{Error, Result};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde::Serialize;
use std::fmt;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed byte stream used as a streaming request body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, BoxError>> + Send>>;

/// The payload of an outgoing request.
///
/// # Examples
///
/// ```
/// use stream_dispatch::RequestBody;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct SendMessage {
///     text: String,
/// }
///
/// let body = RequestBody::json(&SendMessage { text: "hi".to_string() })?;
/// assert_eq!(body.as_bytes().unwrap().as_ref(), br#"{"text":"hi"}"#);
///
/// assert!(RequestBody::from_option::<SendMessage>(None)?.is_empty());
/// # Ok::<(), stream_dispatch::Error>(())
/// ```
#[derive(Default)]
pub enum RequestBody {
    /// No body is sent.
    #[default]
    Empty,

    /// An owned byte stream, forwarded chunk by chunk.
    Stream(ByteStream),

    /// A JSON-encoded value or raw bytes, sent as-is.
    Bytes(Bytes),
}

impl RequestBody {
    /// Serializes `value` to JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if `value` cannot be serialized, e.g. a map
    /// with non-string keys.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value).map_err(Error::Serialization)?;
        Ok(RequestBody::Bytes(Bytes::from(encoded)))
    }

    /// `None` becomes [`RequestBody::Empty`], `Some` is JSON-encoded.
    pub fn from_option<T: Serialize + ?Sized>(value: Option<&T>) -> Result<Self> {
        match value {
            None => Ok(RequestBody::Empty),
            Some(value) => Self::json(value),
        }
    }

    /// Uses an existing byte stream, e.g. a file upload, as the body.
    pub fn stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        RequestBody::Stream(Box::pin(stream.map_err(|e| -> BoxError { e.into() })))
    }

    /// Streams everything readable from `reader` as the body.
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::stream(ReaderStream::new(reader))
    }

    /// Sends `bytes` unmodified.
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        RequestBody::Bytes(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// The buffered payload, if this body is not a stream.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Converts into a `reqwest` body, or `None` when there is no body.
    pub(crate) fn into_reqwest(self) -> Option<reqwest::Body> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Stream(stream) => Some(reqwest::Body::wrap_stream(stream)),
            RequestBody::Bytes(bytes) => Some(reqwest::Body::from(bytes)),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
        }
    }
}
