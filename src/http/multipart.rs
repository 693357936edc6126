//! `multipart/form-data` decoding with on-disk staging.
//!
//! The decoder never holds an upload in memory. The whole body is first
//! streamed into a staging file under the cache directory, then re-read as a
//! forward-only byte source:
//!
//! ```text
//! --boundary\r\n
//! Content-Disposition: form-data; name="field1"\r\n
//! \r\n
//! value1\r\n
//! --boundary\r\n
//! Content-Disposition: form-data; name="file"; filename="example.txt"\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! file contents...\r\n
//! --boundary--\r\n
//! ```
//!
//! Text parts come back as strings. File parts are streamed into their own
//! files next to the staging file; once decoding succeeds those files belong
//! to the caller. On failure they are removed along with the staging file,
//! which is always removed.

use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader, BufWriter};

use crate::http::request::Request;
use crate::http::scanner::{ByteScanner, Stop};

const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Longest boundary or filename component used in a staged file name.
const MAX_NAME_COMPONENT: usize = 64;

/// Errors that can occur during multipart decoding.
#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("content type is not multipart/form-data: {0:?}")]
    NotMultipart(String),
    #[error("missing boundary in multipart Content-Type")]
    MissingBoundary,
    #[error("multipart body requires a known, non-zero Content-Length")]
    EmptyBody,
    #[error("multipart part has no name in Content-Disposition")]
    MissingName,
    #[error("unexpected end of multipart data")]
    UnexpectedEof,
    #[error("multipart i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl MultipartError {
    /// True for errors caused by the request itself rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, MultipartError::Io(_))
    }
}

/// Decoded value of one part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    /// Path of the staged file holding the part's content.
    File(PathBuf),
}

/// One named field from a multipart body.
#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    /// Present only for file parts, URL-decoded.
    pub filename: Option<String>,
    pub value: FieldValue,
    /// Byte length of the value.
    pub len: u64,
}

impl MultipartField {
    pub fn is_file(&self) -> bool {
        matches!(self.value, FieldValue::File(_))
    }

    pub fn text(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Text(s) => Some(s),
            FieldValue::File(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.value {
            FieldValue::File(p) => Some(p),
            FieldValue::Text(_) => None,
        }
    }
}

/// Extracts the boundary from a `multipart/form-data` Content-Type.
///
/// Content-Type format: `multipart/form-data; boundary=----WebKitFormBoundary...`
pub fn parse_boundary(content_type: &str) -> Result<String, MultipartError> {
    let content_type = content_type.trim();
    let is_multipart = content_type
        .get(..MULTIPART_FORM_DATA.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(MULTIPART_FORM_DATA));
    if !is_multipart {
        return Err(MultipartError::NotMultipart(content_type.to_string()));
    }

    param(content_type, "boundary")
        .filter(|b| !b.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

/// Decodes the request body as multipart form data.
///
/// `conn_id` makes staged file names unique per connection, so two requests
/// using the same boundary cannot overwrite each other's files.
pub async fn decode<R>(
    request: &Request,
    body: &mut ByteScanner<R>,
    cache_dir: &Path,
    conn_id: &str,
) -> Result<Vec<MultipartField>, MultipartError>
where
    R: AsyncRead + Unpin,
{
    let boundary = parse_boundary(request.content_type().unwrap_or_default())?;
    if request.content_length() <= 0 {
        return Err(MultipartError::EmptyBody);
    }

    fs::create_dir_all(cache_dir).await?;
    let prefix = format!("{}-{}", sanitize(&boundary), conn_id);
    let staging = cache_dir.join(format!("{prefix}.body"));

    let mut writer = BufWriter::new(File::create(&staging).await?);
    let staged = body.copy_remaining(&mut writer).await;
    let flushed = writer.shutdown().await;

    let result = match (staged, flushed) {
        (Ok(len), Ok(())) => {
            tracing::debug!(staging = %staging.display(), len, "Staged multipart body");
            decode_staged(&staging, &boundary, cache_dir, &prefix).await
        }
        (Err(e), _) | (_, Err(e)) => Err(e.into()),
    };

    if let Err(e) = fs::remove_file(&staging).await {
        tracing::warn!(staging = %staging.display(), error = %e, "Failed to remove staging file");
    }

    result
}

async fn decode_staged(
    staging: &Path,
    boundary: &str,
    cache_dir: &Path,
    prefix: &str,
) -> Result<Vec<MultipartField>, MultipartError> {
    let mut scanner = ByteScanner::new(BufReader::new(File::open(staging).await?));
    let mut fields = Vec::new();

    match decode_parts(&mut scanner, boundary, cache_dir, prefix, &mut fields).await {
        Ok(()) => Ok(fields),
        Err(e) => {
            // Nobody will own the files staged so far
            for path in fields.iter().filter_map(MultipartField::path) {
                if let Err(err) = fs::remove_file(path).await {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to remove staged field file");
                }
            }
            Err(e)
        }
    }
}

async fn decode_parts<R>(
    scanner: &mut ByteScanner<R>,
    boundary: &str,
    cache_dir: &Path,
    prefix: &str,
    fields: &mut Vec<MultipartField>,
) -> Result<(), MultipartError>
where
    R: AsyncRead + Unpin,
{
    let opening = format!("--{boundary}");
    let delimiter = format!("\r\n--{boundary}");

    scanner.read_until(opening.as_bytes(), false).await?;
    if scanner.last_stop() != Stop::Separator {
        return Err(MultipartError::UnexpectedEof);
    }

    loop {
        // Rest of the boundary line: empty between parts, "--" at the end
        let line = scanner.read_string_until("\r\n", true).await?;
        if line == "--" {
            break;
        }
        if scanner.last_stop() != Stop::Separator {
            return Err(MultipartError::UnexpectedEof);
        }

        let (name, filename) = read_part_headers(scanner).await?;
        let field = match filename {
            None => {
                let value = scanner.read_until(delimiter.as_bytes(), true).await?;
                if scanner.last_stop() != Stop::Separator {
                    return Err(MultipartError::UnexpectedEof);
                }
                MultipartField {
                    name,
                    filename: None,
                    len: value.len() as u64,
                    value: FieldValue::Text(String::from_utf8_lossy(&value).into_owned()),
                }
            }
            Some(filename) => {
                let path = cache_dir.join(format!(
                    "{}-{}-{}",
                    prefix,
                    fields.len(),
                    safe_file_name(&filename)
                ));
                let len = stage_part(scanner, &path, delimiter.as_bytes()).await?;
                MultipartField {
                    name,
                    filename: Some(filename),
                    len,
                    value: FieldValue::File(path),
                }
            }
        };

        tracing::debug!(
            name = %field.name,
            filename = ?field.filename,
            len = field.len,
            "Decoded multipart field"
        );
        fields.push(field);
    }

    Ok(())
}

/// Reads part headers up to the blank line; returns `(name, filename)`.
async fn read_part_headers<R>(
    scanner: &mut ByteScanner<R>,
) -> Result<(String, Option<String>), MultipartError>
where
    R: AsyncRead + Unpin,
{
    let mut name = None;
    let mut filename = None;
    loop {
        let line = scanner.read_string_until("\r\n", true).await?;
        if scanner.last_stop() != Stop::Separator {
            return Err(MultipartError::UnexpectedEof);
        }
        if line.is_empty() {
            break;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("Content-Disposition") {
            name = param(value, "name");
            filename = param(value, "filename").map(|f| url_decode(&f));
        }
    }

    let name = name.ok_or(MultipartError::MissingName)?;
    Ok((name, filename))
}

/// Streams one file part into `path`, without the trailing delimiter.
async fn stage_part<R>(
    scanner: &mut ByteScanner<R>,
    path: &Path,
    delimiter: &[u8],
) -> Result<u64, MultipartError>
where
    R: AsyncRead + Unpin,
{
    let mut writer = BufWriter::new(File::create(path).await?);
    let (written, stop) = scanner.copy_until(&mut writer, delimiter).await?;
    writer.flush().await?;
    let file = writer.into_inner();

    if stop != Stop::Separator {
        drop(file);
        let _ = fs::remove_file(path).await;
        return Err(MultipartError::UnexpectedEof);
    }

    let len = written - delimiter.len() as u64;
    file.set_len(len).await?;
    Ok(len)
}

/// Looks up `key=value` among `;`-separated parameters, honoring quotes.
fn param(header: &str, key: &str) -> Option<String> {
    split_params(header).into_iter().find_map(|part| {
        let (k, v) = part.split_once('=')?;
        if !k.trim().eq_ignore_ascii_case(key) {
            return None;
        }
        let v = v.trim();
        let v = v
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(v);
        Some(v.to_string())
    })
}

fn split_params(header: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in header.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&header[start..]);
    parts
}

/// Form-style URL decoding (`+` is a space).
fn url_decode(s: &str) -> String {
    // Keep '&' and '=' literal so the whole input decodes as one key.
    let escaped = s.replace('&', "%26").replace('=', "%3D");
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(k, _)| k.into_owned())
        .unwrap_or_default()
}

/// Maps `s` onto `[A-Za-z0-9._-]`, capped at [`MAX_NAME_COMPONENT`] bytes.
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .take(MAX_NAME_COMPONENT)
        .collect()
}

/// Last path component of a client-supplied filename, made filesystem-safe.
fn safe_file_name(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    match base {
        "" | "." | ".." => "upload".to_string(),
        base => sanitize(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(
            parse_boundary("multipart/form-data; boundary=----X").unwrap(),
            "----X"
        );
        assert_eq!(
            parse_boundary("Multipart/Form-Data; charset=utf-8; boundary=\"a b\"").unwrap(),
            "a b"
        );
        assert!(matches!(
            parse_boundary("multipart/form-data"),
            Err(MultipartError::MissingBoundary)
        ));
        assert!(matches!(
            parse_boundary("multipart/form-data; boundary="),
            Err(MultipartError::MissingBoundary)
        ));
        assert!(matches!(
            parse_boundary("application/json"),
            Err(MultipartError::NotMultipart(_))
        ));
    }

    #[test]
    fn disposition_params_respect_quotes() {
        let header = r#" form-data; name="file"; filename="semi;colon.txt""#;
        assert_eq!(param(header, "name").as_deref(), Some("file"));
        assert_eq!(param(header, "filename").as_deref(), Some("semi;colon.txt"));
        assert_eq!(param(" form-data; name=\"x\"", "filename"), None);
    }

    #[test]
    fn filenames_are_decoded_and_confined() {
        assert_eq!(url_decode("my%20file+1.txt"), "my file 1.txt");
        assert_eq!(url_decode("a&b=c.txt"), "a&b=c.txt");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("C:\\docs\\r\u{e9}sum\u{e9}.pdf"), "r_sum_.pdf");
        assert_eq!(safe_file_name(".."), "upload");
    }

    #[test]
    fn staged_name_components_are_capped() {
        let long = "x".repeat(300);
        assert_eq!(sanitize(&long).len(), MAX_NAME_COMPONENT);
        assert_eq!(safe_file_name(&format!("dir/{long}.txt")).len(), MAX_NAME_COMPONENT);
        assert_eq!(sanitize("\u{e9}t\u{e9}"), "_t_");
    }
}
