use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter};
use uuid::Uuid;

use crate::http::multipart::{self, MultipartError, MultipartField};
use crate::http::parser::{ParseError, parse_request};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::scanner::ByteScanner;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Separator that ends a body of unknown length.
const BODY_END: &str = "\r\n\r\n";

/// Everything a handler sees for one request.
///
/// Owns the parsed [`Request`], the [`Response`] being built, and the read
/// side of the connection positioned at the start of the body. Body reads are
/// deferred: nothing past the headers is consumed until a handler calls
/// [`body_as_text`](Self::body_as_text),
/// [`body_copy_to_file`](Self::body_copy_to_file) or
/// [`multipart`](Self::multipart). All three share the same byte budget, so
/// together they never read past Content-Length.
pub struct Context {
    id: Uuid,
    request: Request,
    response: Response,
    body: ByteScanner<BoxedReader>,
    cache_dir: PathBuf,
}

impl Context {
    /// Parses a request head from `reader`.
    ///
    /// Returns `Ok(None)` if the peer sent nothing before closing.
    pub async fn read<R>(reader: R, cache_dir: impl Into<PathBuf>, id: Uuid) -> Result<Option<Self>, ParseError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut body = ByteScanner::new(Box::new(reader) as BoxedReader);
        let Some(request) = parse_request(&mut body).await? else {
            return Ok(None);
        };

        Ok(Some(Self {
            id,
            request,
            response: Response::new(),
            body,
            cache_dir: cache_dir.into(),
        }))
    }

    /// Connection id, also used to name staged upload files.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn method(&self) -> Method {
        self.request.method
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn target(&self) -> &str {
        &self.request.target
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.request.header(key)
    }

    pub fn query(&self) -> &HashMap<String, String> {
        self.request.query()
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.request.query_param(name)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Reads the body as text, up to CRLF CRLF or Content-Length.
    pub async fn body_as_text(&mut self) -> std::io::Result<String> {
        self.body.read_string_until(BODY_END, true).await
    }

    /// Copies the body into `dst`, replacing any existing file.
    ///
    /// With a known Content-Length the whole body is copied; otherwise the
    /// copy stops at CRLF CRLF or end of stream.
    pub async fn body_copy_to_file(&mut self, dst: impl AsRef<Path>) -> std::io::Result<u64> {
        let mut writer = BufWriter::new(File::create(dst.as_ref()).await?);
        let written = if self.body.remaining() > -1 {
            self.body.copy_remaining(&mut writer).await?
        } else {
            self.body.copy_until(&mut writer, BODY_END.as_bytes()).await?.0
        };
        writer.shutdown().await?;
        Ok(written)
    }

    /// Decodes the body as `multipart/form-data`.
    ///
    /// File fields are staged under the cache directory and handed over to
    /// the caller, who is responsible for removing them.
    pub async fn multipart(&mut self) -> Result<Vec<MultipartField>, MultipartError> {
        let id = self.id.simple().to_string();
        multipart::decode(&self.request, &mut self.body, &self.cache_dir, &id).await
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.response.set_header(key, value);
    }

    pub fn set_content_type(&mut self, value: impl Into<String>) {
        self.response.set_content_type(value);
    }

    pub fn bytes(&mut self, code: impl Into<StatusCode>, bytes: &[u8]) {
        self.response.set_bytes(code, bytes);
    }

    pub fn text(&mut self, code: impl Into<StatusCode>, s: &str) {
        self.response.text(code, s);
    }

    pub fn html(&mut self, code: impl Into<StatusCode>, s: &str) {
        self.response.html(code, s);
    }

    pub fn html_body(&mut self, code: impl Into<StatusCode>, s: &str) {
        self.response.html_body(code, s);
    }

    pub fn json(&mut self, code: impl Into<StatusCode>, s: &str) {
        self.response.json(code, s);
    }

    pub async fn serve_file(&mut self, path: impl AsRef<Path>) -> std::io::Result<()> {
        self.response.set_file(path).await
    }

    pub fn bad_request(&mut self, msg: &str) {
        self.response.bad_request(msg);
    }

    pub fn forbidden(&mut self, msg: &str) {
        self.response.forbidden(msg);
    }

    pub fn not_found(&mut self) {
        self.response.not_found();
    }

    pub fn internal_error(&mut self, msg: &str) {
        self.response.internal_error(msg);
    }

    /// Gives up the request side and returns the response for flushing.
    pub fn into_response(self) -> Response {
        self.response
    }
}
