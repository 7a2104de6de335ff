//! URL construction: path templates, query strings, and API key injection.

use crate::{Error, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Name of the query parameter carrying the API key.
pub const API_KEY_PARAM: &str = "api_key";

/// Characters escaped inside a single path segment.
///
/// Unreserved characters plus `$ & + : = @` stay literal; `/`, `;`, `,`, `?`
/// and everything else is escaped so a value can never split or end the path.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Query parameters for one call.
///
/// Keys are kept sorted so encoded URLs are stable; the values of a single
/// key keep the order they were added in.
///
/// # Examples
///
/// ```
/// use stream_dispatch::QueryParams;
///
/// let query = QueryParams::new()
///     .with("limit", 10)
///     .with("filter", "active");
///
/// assert_eq!(query.encode(), "filter=active&limit=10");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to a single value, replacing any previous values.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.insert(key.into(), vec![value.to_string()]);
    }

    /// Adds another value for `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params
            .entry(key.into())
            .or_default()
            .push(value.to_string());
    }

    /// Removes every value of `key`, returning them.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        self.params.remove(key)
    }

    /// Builder form of [`QueryParams::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.params.get(key).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Iterates `(key, value)` pairs in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .flat_map(|(k, vs)| vs.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Folds a serializable parameter struct into query parameters.
    ///
    /// Each top-level field becomes a key. `null` fields are skipped, arrays
    /// become repeated keys, and nested objects are sent as JSON text.
    ///
    /// # Errors
    ///
    /// [`Error::Serialization`] if the value cannot be serialized, or if it
    /// is not a JSON object.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde::Serialize;
    /// use stream_dispatch::QueryParams;
    ///
    /// #[derive(Serialize)]
    /// struct GetReactionsParams {
    ///     limit: Option<u32>,
    ///     offset: Option<u32>,
    /// }
    ///
    /// let query = QueryParams::from_serialize(&GetReactionsParams {
    ///     limit: Some(25),
    ///     offset: None,
    /// })?;
    /// assert_eq!(query.encode(), "limit=25");
    /// # Ok::<(), stream_dispatch::Error>(())
    /// ```
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(Error::Serialization)?;
        let serde_json::Value::Object(fields) = value else {
            return Err(Error::Serialization(serde::ser::Error::custom(
                "query parameters must serialize to an object",
            )));
        };

        let mut query = Self::new();
        for (key, value) in fields {
            match value {
                serde_json::Value::Null => {}
                serde_json::Value::Array(items) => {
                    for item in items {
                        if let Some(text) = scalar_to_string(item) {
                            query.append(key.clone(), text);
                        }
                    }
                }
                other => {
                    if let Some(text) = scalar_to_string(other) {
                        query.append(key, text);
                    }
                }
            }
        }
        Ok(query)
    }

    /// Form-encodes the parameters in key order.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in self.iter() {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

fn scalar_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut query = Self::new();
        for (k, v) in iter {
            query.append(k, v);
        }
        query
    }
}

/// Percent-escapes a value for use as one path segment.
///
/// ```
/// use stream_dispatch::route::escape_path_param;
///
/// assert_eq!(escape_path_param("a b"), "a%20b");
/// assert_eq!(escape_path_param("x/y?z"), "x%2Fy%3Fz");
/// ```
pub fn escape_path_param(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Replaces `{param1}`, `{param2}`, ... with the escaped values, in order.
///
/// Values beyond the highest placeholder are ignored.
///
/// # Errors
///
/// [`Error::MalformedUrl`] if a `{paramN}` placeholder is left unfilled, or
/// if its value is `.` or `..`. URL parsing resolves dot segments (escaped
/// or not), which would send the request to a different path.
pub fn expand_path(template: &str, path_params: &[impl AsRef<str>]) -> Result<String> {
    let mut path = template.to_string();
    for (i, param) in path_params.iter().enumerate() {
        let placeholder = format!("{{param{}}}", i + 1);
        if !path.contains(&placeholder) {
            continue;
        }
        let value = param.as_ref();
        if matches!(value, "." | "..") {
            return Err(Error::MalformedUrl {
                input: template.to_string(),
                reason: format!("dot segment {value:?} is not a valid value for {placeholder}"),
            });
        }
        path = path.replace(&placeholder, &escape_path_param(value));
    }

    if let Some(start) = path.find("{param") {
        let end = path[start..].find('}').map_or(path.len(), |e| start + e + 1);
        return Err(Error::MalformedUrl {
            input: template.to_string(),
            reason: format!("no value supplied for placeholder {}", &path[start..end]),
        });
    }

    Ok(path)
}

/// Builds the full request URL.
///
/// The path template is expanded, joined onto `base_url` with a single `/`,
/// and parsed. Caller query parameters are encoded in key order, then
/// `api_key` is appended last. A caller-supplied `api_key` is dropped so the
/// parameter appears exactly once.
///
/// # Examples
///
/// ```
/// use stream_dispatch::route::build_url;
/// use stream_dispatch::QueryParams;
///
/// let url = build_url(
///     "https://api.example.com",
///     "secret",
///     "users/{param1}",
///     &["a b"],
///     Some(&QueryParams::new().with("limit", 5)),
/// )?;
/// assert_eq!(url.as_str(), "https://api.example.com/users/a%20b?limit=5&api_key=secret");
/// # Ok::<(), stream_dispatch::Error>(())
/// ```
///
/// # Errors
///
/// [`Error::MalformedUrl`] for an unparsable base URL or joined path, or an
/// unfilled placeholder.
pub fn build_url(
    base_url: &str,
    api_key: &str,
    template: &str,
    path_params: &[impl AsRef<str>],
    query: Option<&QueryParams>,
) -> Result<Url> {
    let path = expand_path(template, path_params)?;
    let raw = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );

    let mut url = Url::parse(&raw).map_err(|e| Error::MalformedUrl {
        input: raw.clone(),
        reason: e.to_string(),
    })?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        if let Some(query) = query {
            for (k, v) in query.iter().filter(|(k, _)| *k != API_KEY_PARAM) {
                pairs.append_pair(k, v);
            }
        }
        pairs.append_pair(API_KEY_PARAM, api_key);
    }

    Ok(url)
}
