use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// HTTP request methods.
///
/// The fixed verb set accepted by the parser. Anything else on the request
/// line is a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// DELETE - Delete a resource
    DELETE,
    /// CONNECT - Establish a tunnel
    CONNECT,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// TRACE - Message loop-back test
    TRACE,
}

impl Method {
    /// Parses an HTTP method from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the method (case-sensitive, uppercase)
    ///
    /// # Returns
    ///
    /// `Some(Method)` if the string matches a known method, `None` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use gantry::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "PATCH" => Some(Method::PATCH),
            "HEAD" => Some(Method::HEAD),
            "DELETE" => Some(Method::DELETE),
            "CONNECT" => Some(Method::CONNECT),
            "OPTIONS" => Some(Method::OPTIONS),
            "TRACE" => Some(Method::TRACE),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::HEAD => "HEAD",
            Method::DELETE => "DELETE",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed HTTP request head.
///
/// The body is not part of this struct: it stays on the wire until a handler
/// asks for it through the [`Context`](crate::http::context::Context).
#[derive(Debug)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The raw request target, query string included (e.g. "/search?q=x")
    pub target: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers; a repeated name keeps the last value
    pub headers: HashMap<String, String>,
    query: OnceLock<HashMap<String, String>>,
}

impl Request {
    pub fn new(
        method: Method,
        target: impl Into<String>,
        version: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            method,
            target: target.into(),
            version: version.into(),
            headers,
            query: OnceLock::new(),
        }
    }

    /// The target without its query portion.
    pub fn path(&self) -> &str {
        match self.target.split_once('?') {
            Some((path, _)) => path,
            None => &self.target,
        }
    }

    /// The raw query string, if the target has one.
    pub fn query_string(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    /// Query parameters with URL-decoded values, parsed on first use.
    pub fn query(&self) -> &HashMap<String, String> {
        self.query.get_or_init(|| {
            self.query_string()
                .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
                .unwrap_or_default()
        })
    }

    /// Looks up one query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query().get(name).map(|v| v.as_str())
    }

    /// Retrieves a header value by name.
    ///
    /// Tries the exact name first, then falls back to an ASCII
    /// case-insensitive match.
    pub fn header(&self, key: &str) -> Option<&str> {
        if let Some(v) = self.headers.get(key) {
            return Some(v.as_str());
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// The Content-Length header as a signed length.
    ///
    /// Returns -1 if the header is missing, malformed or negative, which
    /// means "unknown" rather than "empty".
    pub fn content_length(&self) -> i64 {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|n| *n >= 0)
            .unwrap_or(-1)
    }

    /// The Content-Type header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }
}
