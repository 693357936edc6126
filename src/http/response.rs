use std::collections::HashMap;
use std::path::Path;

use bytes::BytesMut;
use tokio::fs::File;

use crate::http::mime;

pub const HTTP_VERSION: &str = "HTTP/1.1";

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_HTML: &str = "text/html";
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP status codes used by the engine.
///
/// Common HTTP status codes used in responses:
/// - `Ok` (200): Request successful
/// - `Created` (201): Resource created successfully
/// - `NoContent` (204): Successful request with no content
/// - `BadRequest` (400): Malformed request
/// - `Forbidden` (403): Access refused
/// - `NotFound` (404): Resource not found
/// - `MethodNotAllowed` (405): HTTP method not supported
/// - `InternalServerError` (500): Server error
///
/// Any other code a handler asks for is carried as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
    /// Any other numeric code
    Other(u16),
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use gantry::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::Other(418).as_u16(), 418);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
            StatusCode::Other(code) => *code,
        }
    }

    /// Returns the reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use gantry::http::response::StatusCode;
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// assert_eq!(StatusCode::Other(299).reason_phrase(), "Unknown status");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::Other(_) => "Unknown status",
        }
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            400 => StatusCode::BadRequest,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            500 => StatusCode::InternalServerError,
            other => StatusCode::Other(other),
        }
    }
}

/// Response body: an in-memory buffer or an open file, never both.
#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Buffer(BytesMut),
    File { file: File, len: u64 },
}

impl Body {
    /// Byte length that will be written for this body.
    pub fn len(&self) -> u64 {
        match self {
            Body::Empty => 0,
            Body::Buffer(buf) => buf.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An HTTP response under construction.
///
/// Handlers mutate it through the [`Context`](crate::http::context::Context);
/// the connection hands it to the [`ResponseWriter`](crate::http::writer::ResponseWriter)
/// once, after the handler returns.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Protocol written on the status line
    pub version: String,
    /// HTTP headers as key-value pairs
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Body,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An empty 200 response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::Ok,
            version: HTTP_VERSION.to_string(),
            headers: HashMap::new(),
            body: Body::Empty,
        }
    }

    /// Adds or replaces a header.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn set_content_type(&mut self, value: impl Into<String>) {
        self.set_header(CONTENT_TYPE, value);
    }

    /// Sets the status and appends `bytes` to the in-memory body.
    ///
    /// A file body set earlier is discarded.
    pub fn set_bytes(&mut self, code: impl Into<StatusCode>, bytes: &[u8]) {
        self.status = code.into();
        match &mut self.body {
            Body::Buffer(buf) => buf.extend_from_slice(bytes),
            body => *body = Body::Buffer(BytesMut::from(bytes)),
        }
    }

    pub fn text(&mut self, code: impl Into<StatusCode>, s: &str) {
        self.set_content_type(TEXT_PLAIN);
        self.set_bytes(code, s.as_bytes());
    }

    pub fn html(&mut self, code: impl Into<StatusCode>, s: &str) {
        self.set_content_type(TEXT_HTML);
        self.set_bytes(code, s.as_bytes());
    }

    /// Wraps an HTML fragment in a minimal page.
    pub fn html_body(&mut self, code: impl Into<StatusCode>, s: &str) {
        let page = format!(
            "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\">\
             <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
             <title>Information</title></head><body>{s}</body></html>"
        );
        self.html(code, &page);
    }

    pub fn json(&mut self, code: impl Into<StatusCode>, s: &str) {
        self.set_content_type(APPLICATION_JSON);
        self.set_bytes(code, s.as_bytes());
    }

    /// Streams the file at `path` as the body.
    ///
    /// Content-Type comes from the file extension. A missing file, or a path
    /// that is not a regular file, turns the response into a 404 instead.
    pub async fn set_file(&mut self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        self.set_content_type(mime::from_path(path));

        let file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.not_found();
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            // Directories open fine on unix but fail on read
            self.not_found();
            return Ok(());
        }
        self.status = StatusCode::Ok;
        self.body = Body::File {
            file,
            len: metadata.len(),
        };
        Ok(())
    }

    pub fn bad_request(&mut self, msg: &str) {
        self.text(StatusCode::BadRequest, &format!("400 Bad Request: {msg}"));
    }

    pub fn forbidden(&mut self, msg: &str) {
        self.text(StatusCode::Forbidden, &format!("403 Forbidden: {msg}"));
    }

    pub fn not_found(&mut self) {
        self.text(StatusCode::NotFound, "404 not found");
    }

    pub fn method_not_allowed(&mut self) {
        self.text(StatusCode::MethodNotAllowed, StatusCode::MethodNotAllowed.reason_phrase());
    }

    pub fn internal_error(&mut self, msg: &str) {
        self.text(
            StatusCode::InternalServerError,
            &format!("500 Internal Server Error: {msg}"),
        );
    }

    /// Replaces whatever was set so far with a fresh error response.
    ///
    /// Used at the dispatch boundary, where a failed handler may have left a
    /// half-written body behind.
    pub fn reset(&mut self) {
        *self = Response::new();
    }
}
