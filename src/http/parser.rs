use crate::http::request::{Method, Request};
use crate::http::scanner::{ByteScanner, Stop};
use std::collections::HashMap;
use tokio::io::AsyncRead;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid http method: {0:?}")]
    InvalidMethod(String),
    #[error("malformed header line: {0:?}")]
    InvalidHeader(String),
    #[error("i/o error while reading request: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads a request head off the scanner and starts the body phase.
///
/// Returns `Ok(None)` when the peer closed the connection before sending a
/// single byte; a request line starting with a space is an invalid method.
/// The body stays unread; the scanner's budget is set to the request's
/// Content-Length (`-1` when unknown).
pub async fn parse_request<R>(scanner: &mut ByteScanner<R>) -> Result<Option<Request>, ParseError>
where
    R: AsyncRead + Unpin,
{
    let method_str = scanner.read_string_until(" ", true).await?;
    if method_str.is_empty() && scanner.last_stop() == Stop::Eof {
        return Ok(None);
    }
    let method = Method::from_str(&method_str).ok_or(ParseError::InvalidMethod(method_str))?;

    let target = scanner.read_string_until(" ", true).await?;
    let version = scanner.read_string_until("\r\n", true).await?;

    // Headers, one line at a time until the blank line
    let mut headers = HashMap::new();
    loop {
        let line = scanner.read_string_until("\r\n", true).await?;
        if line.is_empty() {
            break;
        }
        let (key, value) = parse_header_line(&line)?;
        headers.insert(key, value);
    }

    let request = Request::new(method, target, version, headers);
    scanner.begin_body(request.content_length());

    tracing::debug!(
        method = %request.method,
        target = %request.target,
        content_length = request.content_length(),
        "Parsed request head"
    );

    Ok(Some(request))
}

/// Splits a header line on the first `": "`.
///
/// A line without the separator becomes a header with an empty value.
fn parse_header_line(line: &str) -> Result<(String, String), ParseError> {
    let (key, value) = line.split_once(": ").unwrap_or((line, ""));
    if key.is_empty() {
        return Err(ParseError::InvalidHeader(line.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let mut scanner = ByteScanner::new(Cursor::new(req.to_vec()));

        let parsed = parse_request(&mut scanner).await.unwrap().unwrap();

        assert_eq!(parsed.path(), "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert!(scanner.body_started());
        assert_eq!(scanner.remaining(), -1);
    }

    #[test]
    fn header_value_keeps_later_separators() {
        let (k, v) = parse_header_line("X-Note: a: b").unwrap();
        assert_eq!(k, "X-Note");
        assert_eq!(v, "a: b");
    }
}
