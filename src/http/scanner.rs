//! Delimiter-driven byte scanner.
//!
//! Every parsing step in the engine goes through [`ByteScanner`]: the request
//! line, the header block, deferred body reads and the multipart decoder. The
//! scanner consumes the stream one byte at a time and stops on whichever comes
//! first:
//!
//! - the separator has just been matched ([`Stop::Separator`])
//! - the body budget reached zero ([`Stop::Budget`])
//! - the stream ended ([`Stop::Eof`])
//!
//! The body budget only applies once [`ByteScanner::begin_body`] has been
//! called. A budget of `-1` means the length is unknown and disables it.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Chunk size used when streaming bytes into a writer.
const COPY_CHUNK: usize = 8192;

/// Why the last scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// The separator was matched.
    Separator,
    /// The body budget was exhausted.
    Budget,
    /// The underlying stream ended.
    Eof,
}

/// Incremental matcher for a literal separator.
///
/// Uses the prefix function of the separator so each pushed byte costs
/// amortized O(1) instead of shifting a window.
#[derive(Debug)]
struct SeparatorMatcher<'a> {
    sep: &'a [u8],
    fallback: Vec<usize>,
    matched: usize,
}

impl<'a> SeparatorMatcher<'a> {
    fn new(sep: &'a [u8]) -> Self {
        let mut fallback = vec![0; sep.len()];
        let mut k = 0;
        for i in 1..sep.len() {
            while k > 0 && sep[i] != sep[k] {
                k = fallback[k - 1];
            }
            if sep[i] == sep[k] {
                k += 1;
            }
            fallback[i] = k;
        }

        Self {
            sep,
            fallback,
            matched: 0,
        }
    }

    /// Feeds one byte; returns true when the separator has just completed.
    fn push(&mut self, byte: u8) -> bool {
        while self.matched > 0 && self.sep[self.matched] != byte {
            self.matched = self.fallback[self.matched - 1];
        }
        if self.sep[self.matched] == byte {
            self.matched += 1;
        }
        if self.matched == self.sep.len() {
            self.matched = self.fallback[self.matched - 1];
            return true;
        }
        false
    }
}

/// Budget-aware reader over an async byte stream.
pub struct ByteScanner<R> {
    inner: R,
    body_started: bool,
    remaining: i64,
    last_stop: Stop,
}

impl<R: AsyncRead + Unpin> ByteScanner<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            body_started: false,
            remaining: -1,
            last_stop: Stop::Eof,
        }
    }

    /// Starts the body phase with the given budget (`-1` = unbounded).
    pub fn begin_body(&mut self, content_length: i64) {
        self.body_started = true;
        self.remaining = if content_length < 0 { -1 } else { content_length };
    }

    /// True once [`begin_body`](Self::begin_body) has been called.
    pub fn body_started(&self) -> bool {
        self.body_started
    }

    /// Bytes left in the body budget, or `-1` when unbounded.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Reason the most recent scan stopped.
    pub fn last_stop(&self) -> Stop {
        self.last_stop
    }

    fn bounded(&self) -> bool {
        self.body_started && self.remaining > -1
    }

    fn exhausted(&self) -> bool {
        self.bounded() && self.remaining == 0
    }

    /// Reads a single byte, charging it against the budget.
    ///
    /// Returns `None` at end of stream or when the budget is already spent.
    async fn next_byte(&mut self) -> std::io::Result<Option<u8>> {
        if self.exhausted() {
            self.last_stop = Stop::Budget;
            return Ok(None);
        }
        match self.inner.read_u8().await {
            Ok(byte) => {
                if self.bounded() {
                    self.remaining -= 1;
                }
                Ok(Some(byte))
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.last_stop = Stop::Eof;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Reads up to and including `sep`, or until the budget or stream ends.
    ///
    /// With `exclude_sep` the separator is trimmed from the result when the
    /// bytes end with it.
    pub async fn read_until(&mut self, sep: &[u8], exclude_sep: bool) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        if sep.is_empty() {
            self.last_stop = Stop::Separator;
            return Ok(out);
        }

        let mut matcher = SeparatorMatcher::new(sep);
        loop {
            let Some(byte) = self.next_byte().await? else {
                break;
            };
            out.push(byte);

            if self.exhausted() {
                self.last_stop = Stop::Budget;
                break;
            }
            if matcher.push(byte) {
                self.last_stop = Stop::Separator;
                break;
            }
        }

        if exclude_sep && out.ends_with(sep) {
            out.truncate(out.len() - sep.len());
        }
        Ok(out)
    }

    /// Like [`read_until`](Self::read_until) with a string separator,
    /// decoding the result as lossy UTF-8.
    pub async fn read_string_until(&mut self, sep: &str, exclude_sep: bool) -> std::io::Result<String> {
        let bytes = self.read_until(sep.as_bytes(), exclude_sep).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Streams bytes into `writer` until `sep` is matched (separator
    /// included), the budget is spent, or the stream ends.
    ///
    /// Returns the number of bytes written and why the scan stopped.
    pub async fn copy_until<W>(&mut self, writer: &mut W, sep: &[u8]) -> std::io::Result<(u64, Stop)>
    where
        W: AsyncWrite + Unpin,
    {
        if sep.is_empty() {
            self.last_stop = Stop::Separator;
            return Ok((0, Stop::Separator));
        }

        let mut matcher = SeparatorMatcher::new(sep);
        let mut chunk = Vec::with_capacity(COPY_CHUNK);
        let mut written = 0u64;
        loop {
            let Some(byte) = self.next_byte().await? else {
                break;
            };
            chunk.push(byte);
            if chunk.len() == COPY_CHUNK {
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
                chunk.clear();
            }

            if self.exhausted() {
                self.last_stop = Stop::Budget;
                break;
            }
            if matcher.push(byte) {
                self.last_stop = Stop::Separator;
                break;
            }
        }

        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
        Ok((written, self.last_stop))
    }

    /// Streams the whole remaining body into `writer`.
    ///
    /// Bounded by the budget when one is set, otherwise reads to end of
    /// stream. No separator matching happens here.
    pub async fn copy_remaining<W>(&mut self, writer: &mut W) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut written = 0u64;
        loop {
            if self.exhausted() {
                self.last_stop = Stop::Budget;
                break;
            }
            let want = if self.bounded() {
                buf.len().min(self.remaining as usize)
            } else {
                buf.len()
            };
            let n = self.inner.read(&mut buf[..want]).await?;
            if n == 0 {
                self.last_stop = Stop::Eof;
                break;
            }
            if self.bounded() {
                self.remaining -= n as i64;
            }
            writer.write_all(&buf[..n]).await?;
            written += n as u64;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scanner(bytes: &[u8]) -> ByteScanner<Cursor<Vec<u8>>> {
        ByteScanner::new(Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn matcher_handles_overlapping_prefixes() {
        let mut m = SeparatorMatcher::new(b"\r\n\r\n");
        let hits: Vec<bool> = b"a\r\n\r\r\n\r\n".iter().map(|b| m.push(*b)).collect();
        assert_eq!(hits.iter().filter(|h| **h).count(), 1);
        assert!(hits[hits.len() - 1]);
    }

    #[tokio::test]
    async fn stops_at_separator_and_keeps_rest() {
        let mut s = scanner(b"GET /x HTTP/1.1");
        assert_eq!(s.read_until(b" ", true).await.unwrap(), b"GET");
        assert_eq!(s.last_stop(), Stop::Separator);
        assert_eq!(s.read_until(b" ", false).await.unwrap(), b"/x ");
    }

    #[tokio::test]
    async fn stops_at_eof_without_separator() {
        let mut s = scanner(b"no separator");
        assert_eq!(s.read_until(b"\r\n", true).await.unwrap(), b"no separator");
        assert_eq!(s.last_stop(), Stop::Eof);
    }

    #[tokio::test]
    async fn budget_bounds_every_scan() {
        let mut s = scanner(b"abcdefgh");
        s.begin_body(3);
        assert_eq!(s.read_until(b"\r\n\r\n", true).await.unwrap(), b"abc");
        assert_eq!(s.last_stop(), Stop::Budget);
        assert_eq!(s.remaining(), 0);

        // A spent budget yields nothing and leaves the stream untouched.
        assert!(s.read_until(b"\r\n", true).await.unwrap().is_empty());
        assert_eq!(s.last_stop(), Stop::Budget);
    }

    #[tokio::test]
    async fn unbounded_body_reads_to_separator() {
        let mut s = scanner(b"hello\r\n\r\ntrailing");
        s.begin_body(-1);
        assert_eq!(s.read_string_until("\r\n\r\n", true).await.unwrap(), "hello");
        assert_eq!(s.remaining(), -1);
    }

    #[tokio::test]
    async fn empty_separator_reads_nothing() {
        let mut s = scanner(b"abc");
        assert!(s.read_until(b"", false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn copy_until_reports_stop_reason() {
        let mut s = scanner(b"part-data\r\n--B--");
        let mut out = Vec::new();
        let (n, stop) = s.copy_until(&mut out, b"\r\n--B").await.unwrap();
        assert_eq!(stop, Stop::Separator);
        assert_eq!(n as usize, out.len());
        assert_eq!(out, b"part-data\r\n--B");
    }

    #[tokio::test]
    async fn copy_remaining_respects_budget() {
        let mut s = scanner(b"0123456789");
        s.begin_body(4);
        let mut out = Vec::new();
        assert_eq!(s.copy_remaining(&mut out).await.unwrap(), 4);
        assert_eq!(out, b"0123");
    }
}
