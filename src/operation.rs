//! Operation descriptors: everything needed to dispatch one call.

use crate::{body::RequestBody, route::QueryParams, Result};
use http::Method;
use serde::Serialize;

/// One logical API operation.
///
/// The path template uses positional placeholders `{param1}`, `{param2}`, ...
/// which are filled, in order, from [`Operation::path_params`].
///
/// # Examples
///
/// ```
/// use http::Method;
/// use stream_dispatch::Operation;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct SendReaction {
///     r#type: String,
/// }
///
/// let op = Operation::new(Method::POST, "messages/{param1}/reaction")
///     .path_param("msg-42")
///     .query_param("user_id", "u1")
///     .json(&SendReaction { r#type: "like".to_string() })?;
///
/// assert_eq!(op.path_params, vec!["msg-42".to_string()]);
/// assert!(!op.body.is_empty());
/// # Ok::<(), stream_dispatch::Error>(())
/// ```
#[derive(Debug)]
pub struct Operation {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The path template, relative to the base URL.
    pub path: String,

    /// Values for `{param1}`, `{param2}`, ... in order.
    pub path_params: Vec<String>,

    /// Query parameters; `api_key` is added at dispatch time.
    pub query: QueryParams,

    /// The request payload.
    pub body: RequestBody,
}

impl Operation {
    /// Creates a new `Operation` with the given method and path template.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: Vec::new(),
            query: QueryParams::new(),
            body: RequestBody::Empty,
        }
    }

    /// Appends the value for the next `{paramN}` placeholder.
    pub fn path_param(mut self, value: impl Into<String>) -> Self {
        self.path_params.push(value.into());
        self
    }

    /// Appends values for the next placeholders.
    pub fn path_params<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_params.extend(values.into_iter().map(Into::into));
        self
    }

    /// Adds a query parameter value.
    pub fn query_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.append(key, value);
        self
    }

    /// Replaces all query parameters.
    pub fn query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Folds a serializable parameter struct into the query string.
    ///
    /// # Errors
    ///
    /// See [`QueryParams::from_serialize`].
    pub fn query_struct<T: Serialize + ?Sized>(mut self, params: &T) -> Result<Self> {
        for (key, value) in QueryParams::from_serialize(params)?.iter() {
            self.query.append(key, value);
        }
        Ok(self)
    }

    /// Sets the request body.
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// JSON-encodes `value` as the request body.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`](crate::Error::Serialization) if encoding fails.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self> {
        Ok(self.body(RequestBody::json(value)?))
    }
}
