use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::http::response::{Body, CONTENT_LENGTH, Response};

/// Chunk size for streaming file bodies.
const BUFFER_SIZE: usize = 8192;

/// How a response ends on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFraming {
    /// Standard HTTP/1.1: nothing follows the body.
    #[default]
    Standard,
    /// Appends an extra CRLF CRLF after the body, for peers that expect the
    /// older wire format.
    Legacy,
}

/// Serializes the status line and headers.
///
/// Content-Length always reflects the body that will actually be written.
fn serialize_head(resp: &mut Response) -> Vec<u8> {
    resp.headers
        .retain(|k, _| !k.eq_ignore_ascii_case(CONTENT_LENGTH));
    resp.headers
        .insert(CONTENT_LENGTH.to_string(), resp.body.len().to_string());

    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        resp.version,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Writes one response to a stream.
///
/// Takes the [`Response`] by value, so a response can only be flushed once.
pub struct ResponseWriter {
    response: Response,
    framing: ResponseFraming,
}

impl ResponseWriter {
    pub fn new(response: Response, framing: ResponseFraming) -> Self {
        Self { response, framing }
    }

    /// Writes head, body and (for legacy framing) the trailer, then flushes.
    ///
    /// Returns the number of body bytes written.
    pub async fn write_to_stream<W>(mut self, stream: &mut W) -> anyhow::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let head = serialize_head(&mut self.response);
        stream.write_all(&head).await?;

        let body_len = match &mut self.response.body {
            Body::Empty => 0,
            // Zero-length buffer or file: nothing to send
            body if body.is_empty() => 0,
            Body::Buffer(buf) => {
                stream.write_all(&buf[..]).await?;
                buf.len() as u64
            }
            Body::File { file, len } => {
                let written = stream_file(file, stream).await?;
                if written != *len {
                    anyhow::bail!("file changed while streaming: expected {} bytes, wrote {}", len, written);
                }
                written
            }
        };

        if self.framing == ResponseFraming::Legacy {
            stream.write_all(b"\r\n\r\n").await?;
        }
        stream.flush().await?;

        Ok(body_len)
    }
}

async fn stream_file<W>(file: &mut tokio::fs::File, stream: &mut W) -> anyhow::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut chunk = vec![0u8; BUFFER_SIZE];
    let mut written = 0u64;
    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        stream.write_all(&chunk[..n]).await?;
        written += n as u64;
    }
    Ok(written)
}
